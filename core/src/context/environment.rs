//! Host environment facet

use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;
use tracing::debug;

use crate::config::ContextConfig;
use crate::context::command;
use crate::error::FacetError;
use crate::types::{EnvironmentContext, Language, RuntimeInfo};

/// Candidate runtime commands per language, tried in order.
fn runtime_commands(language: Language) -> &'static [(&'static str, &'static [&'static str])] {
    match language {
        Language::Python => &[("python3", &["--version"]), ("python", &["--version"])],
        Language::JavaScript | Language::TypeScript => &[("node", &["--version"])],
        Language::Java => &[("java", &["-version"])],
        Language::Rust => &[("rustc", &["--version"])],
        Language::Go => &[("go", &["version"])],
        Language::Ruby => &[("ruby", &["--version"])],
        Language::CSharp => &[("dotnet", &["--version"])],
        Language::Php => &[("php", &["--version"])],
        Language::Unknown => &[],
    }
}

/// Capture host facts, the runtime for `language` and any isolated
/// environment in effect.
pub(crate) fn extract(
    root: Option<&Path>,
    language: Option<Language>,
    config: &ContextConfig,
) -> Result<EnvironmentContext, FacetError> {
    let cpu_count = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);

    Ok(EnvironmentContext {
        os: std::env::consts::OS.to_string(),
        arch: std::env::consts::ARCH.to_string(),
        family: std::env::consts::FAMILY.to_string(),
        cpu_count,
        runtime: language.and_then(|l| runtime(l, config)),
        isolated_env: isolated_env(root, |key| std::env::var(key).ok()),
    })
}

fn runtime(language: Language, config: &ContextConfig) -> Option<RuntimeInfo> {
    for (program, args) in runtime_commands(language) {
        match command::run(program, args, None, config.command_timeout()) {
            Ok(output) => {
                if let Some(line) = output.first_line() {
                    return Some(RuntimeInfo {
                        name: program.to_string(),
                        version: parse_version(line),
                    });
                }
            }
            Err(e) => debug!("Runtime version check {} failed: {}", program, e),
        }
    }
    None
}

/// Pull the version number out of a `--version` banner, or keep the
/// banner when it has none.
fn parse_version(banner: &str) -> String {
    static VERSION: OnceLock<Option<Regex>> = OnceLock::new();
    VERSION
        .get_or_init(|| Regex::new(r"\d+\.\d+(?:\.\d+)?(?:[-+.][\w.]+)?").ok())
        .as_ref()
        .and_then(|re| re.find(banner))
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| banner.to_string())
}

/// Active virtualenv/conda prefix, else a project-local `.venv`/`venv`.
fn isolated_env(root: Option<&Path>, var: impl Fn(&str) -> Option<String>) -> Option<String> {
    ["VIRTUAL_ENV", "CONDA_PREFIX"]
        .iter()
        .find_map(|key| var(key).filter(|v| !v.is_empty()))
        .or_else(|| {
            let root = root?;
            [".venv", "venv"]
                .iter()
                .map(|d| root.join(d))
                .find(|p| p.join("pyvenv.cfg").is_file() || p.join("bin").is_dir() || p.join("Scripts").is_dir())
                .map(|p| p.display().to_string())
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_host_facts_are_present() {
        let env = extract(None, None, &ContextConfig::default()).unwrap();
        assert_eq!(env.os, std::env::consts::OS);
        assert!(!env.arch.is_empty());
        assert!(env.cpu_count >= 1);
        assert!(env.runtime.is_none());
    }

    #[test]
    fn test_parse_version_banners() {
        assert_eq!(parse_version("Python 3.12.1"), "3.12.1");
        assert_eq!(parse_version("v20.11.0"), "20.11.0");
        assert_eq!(parse_version("go version go1.22.0 linux/amd64"), "1.22.0");
        assert_eq!(parse_version("openjdk version \"21.0.2\" 2024-01-16"), "21.0.2");
        assert_eq!(parse_version("rustc 1.76.0 (07dca489a 2024-02-04)"), "1.76.0");
        assert_eq!(parse_version("nightly"), "nightly");
    }

    #[test]
    fn test_isolated_env_prefers_variables() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join(".venv/bin")).unwrap();

        let from_var = isolated_env(Some(dir.path()), |k| {
            (k == "CONDA_PREFIX").then(|| "/opt/conda/envs/ml".to_string())
        });
        assert_eq!(from_var.as_deref(), Some("/opt/conda/envs/ml"));

        let local = isolated_env(Some(dir.path()), |_| None).unwrap();
        assert!(local.ends_with(".venv"));

        assert!(isolated_env(None, |_| None).is_none());
    }

    #[test]
    fn test_missing_runtime_is_absent() {
        let config = ContextConfig::default();
        assert!(runtime(Language::Unknown, &config).is_none());
    }
}
