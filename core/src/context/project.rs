//! Project facet: manifests, dependencies, framework and test layout

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;
use tracing::debug;
use walkdir::WalkDir;

use crate::config::ContextConfig;
use crate::context::file::is_skipped_dir;
use crate::error::FacetError;
use crate::types::{Dependency, Language, ProjectContext};

const FACET: &str = "project";

/// Manifest files recognized at the project root, in precedence order.
const MANIFESTS: &[(&str, Language)] = &[
    ("Cargo.toml", Language::Rust),
    ("tsconfig.json", Language::TypeScript),
    ("package.json", Language::JavaScript),
    ("pyproject.toml", Language::Python),
    ("requirements.txt", Language::Python),
    ("Pipfile", Language::Python),
    ("setup.py", Language::Python),
    ("go.mod", Language::Go),
    ("pom.xml", Language::Java),
    ("build.gradle", Language::Java),
    ("build.gradle.kts", Language::Java),
    ("Gemfile", Language::Ruby),
    ("composer.json", Language::Php),
];

/// Dependency name → framework, first hit wins.
const FRAMEWORKS: &[(&str, &str)] = &[
    ("django", "Django"),
    ("fastapi", "FastAPI"),
    ("flask", "Flask"),
    ("next", "Next.js"),
    ("@nestjs/core", "NestJS"),
    ("@angular/core", "Angular"),
    ("react", "React"),
    ("vue", "Vue"),
    ("svelte", "Svelte"),
    ("express", "Express"),
    ("actix-web", "Actix Web"),
    ("axum", "Axum"),
    ("rocket", "Rocket"),
    ("rails", "Rails"),
    ("sinatra", "Sinatra"),
    ("github.com/gin-gonic/gin", "Gin"),
    ("github.com/labstack/echo/v4", "Echo"),
    ("github.com/gofiber/fiber/v2", "Fiber"),
    ("laravel/framework", "Laravel"),
    ("symfony/framework-bundle", "Symfony"),
];

/// Manifest content markers for ecosystems whose manifests are not parsed.
const CONTENT_FRAMEWORKS: &[(&str, &str)] = &[
    ("spring-boot", "Spring Boot"),
    ("io.quarkus", "Quarkus"),
    ("Microsoft.AspNetCore", "ASP.NET Core"),
];

const TEST_DIRS: &[&str] = &["tests", "test", "__tests__", "spec", "src/test"];

/// Inspect the project rooted at `root`.
pub(crate) fn extract(root: &Path, config: &ContextConfig) -> Result<ProjectContext, FacetError> {
    if !root.is_dir() {
        return Err(FacetError::unavailable(
            FACET,
            format!("{} is not a directory", root.display()),
        ));
    }
    // Surface permission errors instead of reporting an empty project
    fs::read_dir(root)?;

    let mut manifests: Vec<String> = MANIFESTS
        .iter()
        .filter(|(name, _)| root.join(name).is_file())
        .map(|(name, _)| name.to_string())
        .collect();
    let csproj = find_csproj(root);
    if let Some(name) = &csproj {
        manifests.push(name.clone());
    }

    if manifests.is_empty() {
        return Ok(ProjectContext {
            name: None,
            language: language_from_extensions(root, config.search_depth),
            framework: None,
            manifests,
            dependencies: Vec::new(),
            has_tests: false,
        });
    }

    let mut info = ManifestInfo::default();
    for manifest in &manifests {
        let path = root.join(manifest);
        let Ok(content) = fs::read_to_string(&path) else {
            debug!("Unreadable manifest {}", path.display());
            continue;
        };
        if let Err(e) = info.absorb(manifest, &content) {
            debug!("Could not parse {}: {}", path.display(), e);
        }
    }

    let language = if manifests.iter().any(|m| m == "tsconfig.json")
        || info.dependencies.iter().any(|d| d.name == "typescript")
    {
        Language::TypeScript
    } else {
        MANIFESTS
            .iter()
            .find(|(name, _)| manifests.iter().any(|m| m == name))
            .map(|(_, lang)| *lang)
            .unwrap_or(Language::CSharp)
    };

    let framework = FRAMEWORKS
        .iter()
        .find(|(dep, _)| info.dependencies.iter().any(|d| d.name.eq_ignore_ascii_case(dep)))
        .map(|(_, fw)| fw.to_string())
        .or(info.content_framework);

    Ok(ProjectContext {
        name: info.name.or_else(|| {
            csproj.and_then(|c| c.strip_suffix(".csproj").map(str::to_string))
        }),
        language,
        framework,
        manifests,
        dependencies: info.dependencies,
        has_tests: has_tests(root),
    })
}

#[derive(Default)]
struct ManifestInfo {
    name: Option<String>,
    dependencies: Vec<Dependency>,
    content_framework: Option<String>,
    seen: HashSet<String>,
}

impl ManifestInfo {
    fn absorb(&mut self, manifest: &str, content: &str) -> Result<(), String> {
        match manifest {
            "Cargo.toml" => self.absorb_cargo(content),
            "pyproject.toml" => self.absorb_pyproject(content),
            "package.json" => self.absorb_json(content, &["dependencies", "devDependencies"]),
            "composer.json" => self.absorb_json(content, &["require", "require-dev"]),
            "requirements.txt" => {
                for line in content.lines() {
                    if let Some(dep) = parse_requirement(line) {
                        self.add(dep);
                    }
                }
                Ok(())
            }
            "go.mod" => {
                self.absorb_go_mod(content);
                Ok(())
            }
            "Gemfile" => {
                let re = gem_regex().ok_or("gem regex unavailable")?;
                for caps in re.captures_iter(content) {
                    self.add(Dependency {
                        name: caps["name"].to_string(),
                        version: caps.name("version").map(|m| m.as_str().to_string()),
                    });
                }
                Ok(())
            }
            "pom.xml" => {
                if self.name.is_none() {
                    self.name = artifact_id(content);
                }
                self.absorb_markers(content);
                Ok(())
            }
            _ => {
                self.absorb_markers(content);
                Ok(())
            }
        }
    }

    fn add(&mut self, dep: Dependency) {
        let skip = matches!(dep.name.as_str(), "python" | "php") || dep.name.starts_with("ext-");
        if !skip && self.seen.insert(dep.name.clone()) {
            self.dependencies.push(dep);
        }
    }

    fn set_name(&mut self, name: Option<&str>) {
        if self.name.is_none() {
            self.name = name.filter(|n| !n.is_empty()).map(str::to_string);
        }
    }

    fn absorb_markers(&mut self, content: &str) {
        if self.content_framework.is_none() {
            self.content_framework = CONTENT_FRAMEWORKS
                .iter()
                .find(|(marker, _)| content.contains(marker))
                .map(|(_, fw)| fw.to_string());
        }
    }

    fn absorb_cargo(&mut self, content: &str) -> Result<(), String> {
        let doc: toml::Table = toml::from_str(content).map_err(|e| e.to_string())?;
        self.set_name(
            doc.get("package")
                .and_then(|p| p.get("name"))
                .and_then(|n| n.as_str()),
        );
        for section in ["dependencies", "dev-dependencies"] {
            if let Some(table) = doc.get(section).and_then(|t| t.as_table()) {
                for (name, spec) in table {
                    let version = match spec {
                        toml::Value::String(v) => Some(v.clone()),
                        toml::Value::Table(t) => t
                            .get("version")
                            .and_then(|v| v.as_str())
                            .map(str::to_string),
                        _ => None,
                    };
                    self.add(Dependency {
                        name: name.clone(),
                        version,
                    });
                }
            }
        }
        Ok(())
    }

    fn absorb_pyproject(&mut self, content: &str) -> Result<(), String> {
        let doc: toml::Table = toml::from_str(content).map_err(|e| e.to_string())?;
        let project = doc.get("project");
        let poetry = doc.get("tool").and_then(|t| t.get("poetry"));

        self.set_name(project.and_then(|p| p.get("name")).and_then(|n| n.as_str()));
        self.set_name(poetry.and_then(|p| p.get("name")).and_then(|n| n.as_str()));

        if let Some(deps) = project
            .and_then(|p| p.get("dependencies"))
            .and_then(|d| d.as_array())
        {
            for dep in deps.iter().filter_map(|d| d.as_str()) {
                if let Some(dep) = parse_requirement(dep) {
                    self.add(dep);
                }
            }
        }
        if let Some(deps) = poetry
            .and_then(|p| p.get("dependencies"))
            .and_then(|d| d.as_table())
        {
            for (name, spec) in deps {
                self.add(Dependency {
                    name: name.clone(),
                    version: spec.as_str().map(str::to_string),
                });
            }
        }
        Ok(())
    }

    fn absorb_json(&mut self, content: &str, sections: &[&str]) -> Result<(), String> {
        let doc: serde_json::Value = serde_json::from_str(content).map_err(|e| e.to_string())?;
        self.set_name(doc.get("name").and_then(|n| n.as_str()));
        for section in sections {
            if let Some(map) = doc.get(section).and_then(|s| s.as_object()) {
                for (name, version) in map {
                    self.add(Dependency {
                        name: name.clone(),
                        version: version.as_str().map(str::to_string),
                    });
                }
            }
        }
        Ok(())
    }

    fn absorb_go_mod(&mut self, content: &str) {
        let mut in_block = false;
        for line in content.lines().map(str::trim) {
            if let Some(module) = line.strip_prefix("module ") {
                self.set_name(module.trim().rsplit('/').next());
            } else if line.starts_with("require (") {
                in_block = true;
            } else if in_block && line.starts_with(')') {
                in_block = false;
            } else {
                let entry = if in_block { Some(line) } else { line.strip_prefix("require ") };
                if let Some(entry) = entry {
                    let mut parts = entry.split_whitespace();
                    if let Some(name) = parts.next().filter(|n| !n.starts_with("//")) {
                        self.add(Dependency {
                            name: name.to_string(),
                            version: parts.next().map(str::to_string),
                        });
                    }
                }
            }
        }
    }
}

/// Parse one requirement specifier (`requests>=2.0`, `flask==3.0.2 ; python_version>"3.8"`).
fn parse_requirement(line: &str) -> Option<Dependency> {
    let line = line.split('#').next()?.trim();
    if line.is_empty() || line.starts_with('-') {
        return None;
    }
    let spec = line.split(';').next()?.trim();
    let name_end = spec
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.'))
        .unwrap_or(spec.len());
    let name = &spec[..name_end];
    if name.is_empty() {
        return None;
    }
    let rest = spec[name_end..].trim();
    // Drop extras such as `uvicorn[standard]`
    let rest = match rest.strip_prefix('[') {
        Some(r) => r.split_once(']').map(|(_, v)| v.trim()).unwrap_or(""),
        None => rest,
    };
    let version = rest.trim_start_matches(['=', '>', '<', '!', '~', ' ']);
    Some(Dependency {
        name: name.to_ascii_lowercase(),
        version: (!version.is_empty()).then(|| version.to_string()),
    })
}

fn gem_regex() -> Option<&'static Regex> {
    static GEM: OnceLock<Option<Regex>> = OnceLock::new();
    GEM.get_or_init(|| {
        Regex::new(r#"(?m)^\s*gem\s+['"](?P<name>[^'"]+)['"](?:\s*,\s*['"](?P<version>[^'"]+)['"])?"#).ok()
    })
    .as_ref()
}

fn artifact_id(pom: &str) -> Option<String> {
    // Skip the <parent> block so its artifactId is not taken for ours
    let body = match pom.find("</parent>") {
        Some(end) => &pom[end..],
        None => pom,
    };
    let start = body.find("<artifactId>")? + "<artifactId>".len();
    let len = body[start..].find("</artifactId>")?;
    Some(body[start..start + len].trim().to_string())
}

fn find_csproj(root: &Path) -> Option<String> {
    let mut names: Vec<String> = fs::read_dir(root)
        .ok()?
        .filter_map(|e| e.ok())
        .filter_map(|e| e.file_name().into_string().ok())
        .filter(|n| n.ends_with(".csproj"))
        .collect();
    names.sort();
    names.into_iter().next()
}

fn has_tests(root: &Path) -> bool {
    if TEST_DIRS.iter().any(|d| root.join(d).is_dir()) {
        return true;
    }
    WalkDir::new(root)
        .max_depth(3)
        .into_iter()
        .filter_entry(|e| !is_skipped_dir(e))
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| e.file_name().to_str().map(str::to_string))
        .any(|name| is_test_file(&name))
}

fn is_test_file(name: &str) -> bool {
    (name.starts_with("test_") && name.ends_with(".py"))
        || name.ends_with("_test.py")
        || name.ends_with("_test.go")
        || name.ends_with("_spec.rb")
        || name.ends_with("Test.java")
        || [".test.", ".spec."].iter().any(|m| name.contains(m))
}

/// Most common source language by file extension.
fn language_from_extensions(root: &Path, max_depth: usize) -> Language {
    let mut tally: BTreeMap<Language, usize> = BTreeMap::new();
    for entry in WalkDir::new(root)
        .max_depth(max_depth)
        .into_iter()
        .filter_entry(|e| !is_skipped_dir(e))
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
    {
        if let Some(lang) = entry
            .path()
            .extension()
            .and_then(|e| e.to_str())
            .and_then(Language::from_extension)
        {
            *tally.entry(lang).or_default() += 1;
        }
    }

    // Ties go to the language declared first
    tally
        .into_iter()
        .fold(None, |best: Option<(Language, usize)>, (lang, n)| match best {
            Some((_, top)) if top >= n => best,
            _ => Some((lang, n)),
        })
        .map(|(lang, _)| lang)
        .unwrap_or(Language::Unknown)
}
