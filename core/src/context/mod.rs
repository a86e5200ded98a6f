//! Context extraction
//!
//! Collects up to four independent facets around an error location:
//! - File: the source window around the reported line
//! - VCS: branch, working tree status, recent commits
//! - Project: manifests, dependencies, framework, tests
//! - Environment: host facts, runtime version, isolated environment
//!
//! Each facet returns `Result<_, FacetError>`. [`BundleBuilder`] absorbs
//! failures (logged at debug) so one missing facet never removes another.
//! Extraction only reads the project tree.

mod command;
mod environment;
mod file;
mod project;
mod vcs;

use std::path::Path;
use std::thread::{self, ScopedJoinHandle};

use tracing::debug;

use crate::config::ContextConfig;
use crate::error::FacetError;
use crate::types::{
    ContextBundle, EnvironmentContext, FileContext, FileRef, Language, ProjectContext, VcsContext,
};

/// Assembles a [`ContextBundle`] from facet results, dropping failures.
#[derive(Debug, Default)]
pub struct BundleBuilder {
    bundle: ContextBundle,
}

impl BundleBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn file(mut self, result: Result<FileContext, FacetError>) -> Self {
        self.bundle.file = absorb("file", result);
        self
    }

    pub fn vcs(mut self, result: Result<VcsContext, FacetError>) -> Self {
        self.bundle.vcs = absorb("vcs", result);
        self
    }

    pub fn project(mut self, result: Result<ProjectContext, FacetError>) -> Self {
        self.bundle.project = absorb("project", result);
        self
    }

    pub fn environment(mut self, result: Result<EnvironmentContext, FacetError>) -> Self {
        self.bundle.environment = absorb("environment", result);
        self
    }

    pub fn build(self) -> ContextBundle {
        self.bundle
    }
}

fn absorb<T>(facet: &str, result: Result<T, FacetError>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            debug!("Context facet {} unavailable: {}", facet, e);
            None
        }
    }
}

fn joined<T>(
    facet: &'static str,
    handle: ScopedJoinHandle<'_, Result<T, FacetError>>,
) -> Result<T, FacetError> {
    handle
        .join()
        .unwrap_or_else(|_| Err(FacetError::unavailable(facet, "extraction thread panicked")))
}

/// Extracts development context for a diagnosis.
///
/// Stateless apart from its configuration; safe to share across threads.
#[derive(Debug, Clone, Default)]
pub struct ContextExtractor {
    config: ContextConfig,
}

impl ContextExtractor {
    pub fn new(config: ContextConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ContextConfig {
        &self.config
    }

    /// Extract every available facet for `location` under `project_root`.
    pub fn extract(&self, location: Option<&FileRef>, project_root: &Path) -> ContextBundle {
        self.extract_for(location, project_root, None)
    }

    /// Like [`extract`](Self::extract), with the error's language known.
    ///
    /// The language selects the runtime queried by the environment facet;
    /// without it the project's detected language is used.
    pub fn extract_for(
        &self,
        location: Option<&FileRef>,
        project_root: &Path,
        language: Option<Language>,
    ) -> ContextBundle {
        let config = &self.config;
        let root = project_root;
        let language = language.filter(|l| *l != Language::Unknown);

        // Resolve once so the file and VCS facets agree on the path
        let location = location.map(|loc| match file::resolve(&loc.path, root, config.search_depth) {
            Some(path) => FileRef {
                path,
                ..loc.clone()
            },
            None => loc.clone(),
        });
        let location = location.as_ref();

        thread::scope(|s| {
            let file = location.map(|loc| s.spawn(move || file::extract(loc, root, config)));
            let vcs = s.spawn(move || vcs::extract(root, location, config));
            let early_env = language
                .map(|lang| s.spawn(move || environment::extract(Some(root), Some(lang), config)));

            let project = project::extract(root, config);

            let environment = match early_env {
                Some(handle) => joined("environment", handle),
                None => {
                    let detected = project
                        .as_ref()
                        .ok()
                        .map(|p| p.language)
                        .filter(|l| *l != Language::Unknown);
                    environment::extract(Some(root), detected, config)
                }
            };

            let builder = BundleBuilder::new()
                .vcs(joined("vcs", vcs))
                .project(project)
                .environment(environment);

            let builder = match file {
                Some(handle) => builder.file(joined("file", handle)),
                None => builder,
            };
            builder.build()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn project() -> TempDir {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("requirements.txt"),
            "flask==3.0.0\n",
        )
        .unwrap();
        std::fs::write(
            dir.path().join("app.py"),
            "import flask\nitems = []\nprint(items[0])\n",
        )
        .unwrap();
        dir
    }

    fn broken_vcs() -> ContextConfig {
        ContextConfig {
            vcs_binary: "tracelens-no-such-vcs".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_builder_drops_failed_facets() {
        let bundle = BundleBuilder::new()
            .vcs(Err(FacetError::unavailable("vcs", "no repo")))
            .environment(Ok(EnvironmentContext {
                os: "linux".into(),
                arch: "x86_64".into(),
                family: "unix".into(),
                cpu_count: 4,
                runtime: None,
                isolated_env: None,
            }))
            .build();
        assert!(bundle.vcs.is_none());
        assert_eq!(bundle.facet_count(), 1);
    }

    #[test]
    fn test_broken_vcs_keeps_other_facets() {
        let dir = project();
        let extractor = ContextExtractor::new(broken_vcs());
        let loc = FileRef::new("app.py", Some(3));

        let bundle = extractor.extract(Some(&loc), dir.path());

        assert!(bundle.vcs.is_none());
        let file = bundle.file.expect("file facet");
        assert_eq!(file.highlighted.as_deref(), Some("print(items[0])"));
        let project = bundle.project.expect("project facet");
        assert_eq!(project.language, Language::Python);
        assert_eq!(project.framework.as_deref(), Some("Flask"));
        assert!(bundle.environment.is_some());
    }

    #[test]
    fn test_missing_file_keeps_other_facets() {
        let dir = project();
        let extractor = ContextExtractor::new(broken_vcs());
        let loc = FileRef::new("gone.py", Some(1));

        let bundle = extractor.extract_for(Some(&loc), dir.path(), Some(Language::Python));
        assert!(bundle.file.is_none());
        assert!(bundle.project.is_some());
        assert!(bundle.environment.is_some());
    }

    #[test]
    fn test_missing_root_still_yields_environment() {
        let dir = TempDir::new().unwrap();
        let extractor = ContextExtractor::new(broken_vcs());
        let bundle = extractor.extract(None, &dir.path().join("nowhere"));

        assert!(bundle.file.is_none());
        assert!(bundle.vcs.is_none());
        assert!(bundle.project.is_none());
        assert!(bundle.environment.is_some());
    }

    #[test]
    fn test_extraction_does_not_touch_project_tree() {
        let dir = project();
        let before: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();

        ContextExtractor::default().extract(Some(&FileRef::new("app.py", Some(2))), dir.path());

        let mut after: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        let mut before = before;
        before.sort();
        after.sort();
        assert_eq!(before, after);
    }
}
