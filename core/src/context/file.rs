//! Source window around the reported error line

use std::path::{Component, Path, PathBuf};

use walkdir::{DirEntry, WalkDir};

use crate::config::ContextConfig;
use crate::error::FacetError;
use crate::types::{FileContext, FileRef, SourceLine};

const FACET: &str = "file";

/// Directories never descended into when searching for a file by name.
pub(crate) const SKIP_DIRS: &[&str] = &[
    ".git",
    ".hg",
    ".svn",
    "node_modules",
    "target",
    "venv",
    ".venv",
    "__pycache__",
    ".tox",
    "dist",
    "build",
    "vendor",
];

pub(crate) fn is_skipped_dir(entry: &DirEntry) -> bool {
    entry.file_type().is_dir()
        && entry.depth() > 0
        && entry
            .file_name()
            .to_str()
            .is_some_and(|name| SKIP_DIRS.contains(&name))
}

/// Read the window of source lines around `location`.
pub(crate) fn extract(
    location: &FileRef,
    root: &Path,
    config: &ContextConfig,
) -> Result<FileContext, FacetError> {
    let path = resolve(&location.path, root, config.search_depth).ok_or_else(|| {
        FacetError::unavailable(FACET, format!("{} not found", location.path.display()))
    })?;

    let size = std::fs::metadata(&path)?.len();
    if size > config.max_file_bytes {
        return Err(FacetError::unavailable(
            FACET,
            format!("{} is {} bytes, limit {}", path.display(), size, config.max_file_bytes),
        ));
    }

    let bytes = std::fs::read(&path)?;
    let content = String::from_utf8_lossy(&bytes);
    let all: Vec<&str> = content.lines().collect();

    let (start, end) = match location.line {
        Some(line) => {
            let line = line as usize;
            if line == 0 || line > all.len() {
                return Err(FacetError::unavailable(
                    FACET,
                    format!("line {} past end of {} ({} lines)", line, path.display(), all.len()),
                ));
            }
            (
                line.saturating_sub(config.file_window).max(1),
                (line + config.file_window).min(all.len()),
            )
        }
        None => (1, (2 * config.file_window + 1).min(all.len())),
    };

    let target = location.line.map(|l| l as usize);
    let lines: Vec<SourceLine> = (start..=end)
        .filter_map(|number| {
            all.get(number - 1).map(|text| SourceLine {
                number: number as u32,
                text: text.to_string(),
                highlighted: Some(number) == target,
            })
        })
        .collect();

    let highlighted = lines
        .iter()
        .find(|l| l.highlighted)
        .map(|l| l.text.clone());

    Ok(FileContext {
        path: path.display().to_string(),
        line: location.line,
        lines,
        highlighted,
    })
}

/// Resolve a reported path to a readable file inside `root`.
///
/// Tried in order: the path as given (absolute, or relative to `root`),
/// its trailing components under `root` (traces from containers or CI
/// often carry a foreign prefix), then a bounded search by file name.
/// Candidates that resolve outside `root`, through `..` or symlinks, are
/// rejected; an absolute path elsewhere on the host is only used for its
/// trailing components.
pub(crate) fn resolve(reported: &Path, root: &Path, max_depth: usize) -> Option<PathBuf> {
    let root_real = root.canonicalize().ok()?;
    let inside = |candidate: &Path| {
        candidate.is_file()
            && candidate
                .canonicalize()
                .is_ok_and(|real| real.starts_with(&root_real))
    };

    if reported.is_absolute() && inside(reported) {
        return Some(reported.to_path_buf());
    }

    let parts: Vec<&std::ffi::OsStr> = reported
        .components()
        .filter_map(|c| match c {
            Component::Normal(p) => Some(p),
            _ => None,
        })
        .collect();

    for skip in 0..parts.len() {
        let candidate = parts[skip..]
            .iter()
            .fold(root.to_path_buf(), |acc, p| acc.join(p));
        if inside(&candidate) {
            return Some(candidate);
        }
    }

    let name = parts.last()?;
    WalkDir::new(root)
        .max_depth(max_depth)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_skipped_dir(e))
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file() && e.file_name() == *name)
        .filter(|e| inside(e.path()))
        .max_by_key(|e| suffix_overlap(e.path(), &parts))
        .map(|e| e.into_path())
}

/// Number of trailing components shared between `path` and `parts`.
fn suffix_overlap(path: &Path, parts: &[&std::ffi::OsStr]) -> usize {
    path.components()
        .rev()
        .zip(parts.iter().rev())
        .take_while(|(c, p)| c.as_os_str() == **p)
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn project() -> TempDir {
        let dir = TempDir::new().unwrap();
        let body: String = (1..=30).map(|i| format!("line {}\n", i)).collect();
        std::fs::create_dir_all(dir.path().join("src/app")).unwrap();
        std::fs::write(dir.path().join("src/app/main.py"), body).unwrap();
        dir
    }

    fn config() -> ContextConfig {
        ContextConfig::default()
    }

    #[test]
    fn test_window_around_line() {
        let dir = project();
        let loc = FileRef::new("src/app/main.py", Some(10));
        let ctx = extract(&loc, dir.path(), &config()).unwrap();

        assert_eq!(ctx.lines.first().unwrap().number, 5);
        assert_eq!(ctx.lines.last().unwrap().number, 15);
        assert_eq!(ctx.highlighted.as_deref(), Some("line 10"));
        assert_eq!(ctx.lines.iter().filter(|l| l.highlighted).count(), 1);
    }

    #[test]
    fn test_window_is_clamped_at_file_edges() {
        let dir = project();
        let ctx = extract(&FileRef::new("src/app/main.py", Some(2)), dir.path(), &config()).unwrap();
        assert_eq!(ctx.lines.first().unwrap().number, 1);
        assert_eq!(ctx.lines.last().unwrap().number, 7);

        let ctx = extract(&FileRef::new("src/app/main.py", Some(30)), dir.path(), &config()).unwrap();
        assert_eq!(ctx.lines.last().unwrap().number, 30);
    }

    #[test]
    fn test_no_line_reads_file_head() {
        let dir = project();
        let ctx = extract(&FileRef::new("src/app/main.py", None), dir.path(), &config()).unwrap();
        assert_eq!(ctx.lines.len(), 11);
        assert!(ctx.highlighted.is_none());
    }

    #[test]
    fn test_line_past_end_is_unavailable() {
        let dir = project();
        let err = extract(&FileRef::new("src/app/main.py", Some(31)), dir.path(), &config());
        assert!(matches!(err, Err(FacetError::Unavailable { .. })));
    }

    #[test]
    fn test_oversized_file_is_skipped() {
        let dir = project();
        let cfg = ContextConfig {
            max_file_bytes: 10,
            ..config()
        };
        let err = extract(&FileRef::new("src/app/main.py", Some(1)), dir.path(), &cfg);
        assert!(matches!(err, Err(FacetError::Unavailable { .. })));
    }

    #[test]
    fn test_resolves_foreign_prefix_and_bare_name() {
        let dir = project();
        let expected = dir.path().join("src/app/main.py");

        let found = resolve(Path::new("/srv/deploy/src/app/main.py"), dir.path(), 6);
        assert_eq!(found, Some(expected.clone()));

        let found = resolve(Path::new("main.py"), dir.path(), 6);
        assert_eq!(found, Some(expected));
    }

    #[test]
    fn test_host_file_outside_root_is_not_read() {
        let dir = project();
        let outside = TempDir::new().unwrap();
        let secret = outside.path().join("secret.txt");
        std::fs::write(&secret, "token=hunter2\n").unwrap();

        assert!(resolve(&secret, dir.path(), 6).is_none());
        let err = extract(&FileRef::new(&secret, Some(1)), dir.path(), &config());
        assert!(matches!(err, Err(FacetError::Unavailable { .. })));

        // Parent traversal out of the root is rejected as well
        let name = secret.file_name().unwrap().to_str().unwrap();
        let escaped = PathBuf::from("..")
            .join(outside.path().file_name().unwrap())
            .join(name);
        assert!(resolve(&escaped, dir.path(), 6).is_none());
    }

    #[test]
    fn test_absolute_path_inside_root_is_used() {
        let dir = project();
        let absolute = dir.path().join("src/app/main.py");
        assert_eq!(resolve(&absolute, dir.path(), 6), Some(absolute.clone()));
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_out_of_root_is_rejected() {
        let dir = project();
        let outside = TempDir::new().unwrap();
        std::fs::write(outside.path().join("creds.py"), "key = 1\n").unwrap();
        std::os::unix::fs::symlink(outside.path().join("creds.py"), dir.path().join("creds.py"))
            .unwrap();
        assert!(resolve(Path::new("creds.py"), dir.path(), 6).is_none());
    }

    #[test]
    fn test_name_search_skips_dependency_dirs() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("node_modules/lib")).unwrap();
        std::fs::write(dir.path().join("node_modules/lib/util.js"), "x").unwrap();
        assert!(resolve(Path::new("util.js"), dir.path(), 6).is_none());
    }
}
