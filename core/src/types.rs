//! Core data types for tracelens
//!
//! These types are shared between the matcher, the context extractor, the
//! analyzer and the log store.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Severity of a diagnosis, ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Trace,
    Debug,
    Info,
    Warning,
    Error,
    Critical,
}

impl Severity {
    /// All severities in ascending order.
    pub const ALL: [Severity; 6] = [
        Severity::Trace,
        Severity::Debug,
        Severity::Info,
        Severity::Warning,
        Severity::Error,
        Severity::Critical,
    ];

    /// Return the lowercase string representation used for storage.
    ///
    /// # Returns
    /// String slice for this severity.
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Trace => "trace",
            Severity::Debug => "debug",
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
            Severity::Critical => "critical",
        }
    }

    /// Parse a severity name, accepting common log-level aliases.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "trace" => Some(Severity::Trace),
            "debug" => Some(Severity::Debug),
            "info" | "information" | "notice" => Some(Severity::Info),
            "warning" | "warn" => Some(Severity::Warning),
            "error" | "err" => Some(Severity::Error),
            "critical" | "crit" | "fatal" | "panic" | "emergency" => Some(Severity::Critical),
            _ => None,
        }
    }

    /// Guess a severity from log-level keywords in free text.
    ///
    /// Used for input that no catalog pattern recognizes. Text without any
    /// level keyword is treated as an error, since it was submitted as one.
    pub fn sniff(text: &str) -> Self {
        let upper = text.to_ascii_uppercase();
        if ["FATAL", "CRITICAL", "PANIC", "EMERGENCY"]
            .iter()
            .any(|k| upper.contains(k))
        {
            Severity::Critical
        } else if upper.contains("ERROR") || upper.contains("EXCEPTION") {
            Severity::Error
        } else if upper.contains("WARN") {
            Severity::Warning
        } else if upper.contains("INFO") {
            Severity::Info
        } else if upper.contains("DEBUG") {
            Severity::Debug
        } else if upper.contains("TRACE") {
            Severity::Trace
        } else {
            Severity::Error
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Source language of an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Python,
    JavaScript,
    TypeScript,
    Java,
    Rust,
    Go,
    Ruby,
    CSharp,
    Php,
    Unknown,
}

impl Language {
    /// Every concrete language (excludes `Unknown`).
    pub const KNOWN: [Language; 9] = [
        Language::Python,
        Language::JavaScript,
        Language::TypeScript,
        Language::Java,
        Language::Rust,
        Language::Go,
        Language::Ruby,
        Language::CSharp,
        Language::Php,
    ];

    /// Return the lowercase string representation used for storage.
    ///
    /// # Returns
    /// String slice for this language.
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::Python => "python",
            Language::JavaScript => "javascript",
            Language::TypeScript => "typescript",
            Language::Java => "java",
            Language::Rust => "rust",
            Language::Go => "go",
            Language::Ruby => "ruby",
            Language::CSharp => "csharp",
            Language::Php => "php",
            Language::Unknown => "unknown",
        }
    }

    /// Parse a language name or common alias.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "python" | "py" | "python3" => Some(Language::Python),
            "javascript" | "js" | "node" | "nodejs" => Some(Language::JavaScript),
            "typescript" | "ts" => Some(Language::TypeScript),
            "java" | "kotlin" | "jvm" => Some(Language::Java),
            "rust" | "rs" => Some(Language::Rust),
            "go" | "golang" => Some(Language::Go),
            "ruby" | "rb" => Some(Language::Ruby),
            "csharp" | "c#" | "cs" | "dotnet" | ".net" => Some(Language::CSharp),
            "php" => Some(Language::Php),
            "unknown" => Some(Language::Unknown),
            _ => None,
        }
    }

    /// Map a file extension (without the dot) to a language.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "py" | "pyw" => Some(Language::Python),
            "js" | "mjs" | "cjs" | "jsx" => Some(Language::JavaScript),
            "ts" | "tsx" | "mts" | "cts" => Some(Language::TypeScript),
            "java" | "kt" | "kts" | "scala" => Some(Language::Java),
            "rs" => Some(Language::Rust),
            "go" => Some(Language::Go),
            "rb" => Some(Language::Ruby),
            "cs" => Some(Language::CSharp),
            "php" => Some(Language::Php),
            _ => None,
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse error category used for tagging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorCategory {
    LogicError,
    TypeError,
    IoError,
    NetworkError,
    SyntaxError,
    MemoryError,
    DependencyError,
    ConcurrencyError,
    PermissionError,
    RuntimeError,
}

impl ErrorCategory {
    /// Return the kebab-case string representation used for tags.
    ///
    /// # Returns
    /// String slice for this category.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::LogicError => "logic-error",
            ErrorCategory::TypeError => "type-error",
            ErrorCategory::IoError => "io-error",
            ErrorCategory::NetworkError => "network-error",
            ErrorCategory::SyntaxError => "syntax-error",
            ErrorCategory::MemoryError => "memory-error",
            ErrorCategory::DependencyError => "dependency-error",
            ErrorCategory::ConcurrencyError => "concurrency-error",
            ErrorCategory::PermissionError => "permission-error",
            ErrorCategory::RuntimeError => "runtime-error",
        }
    }

    /// Parse a category name.
    pub fn parse(value: &str) -> Option<Self> {
        let normalized = value.trim().to_ascii_lowercase().replace('_', "-");
        match normalized.as_str() {
            "logic-error" | "logic" => Some(ErrorCategory::LogicError),
            "type-error" | "type" => Some(ErrorCategory::TypeError),
            "io-error" | "io" => Some(ErrorCategory::IoError),
            "network-error" | "network" => Some(ErrorCategory::NetworkError),
            "syntax-error" | "syntax" => Some(ErrorCategory::SyntaxError),
            "memory-error" | "memory" => Some(ErrorCategory::MemoryError),
            "dependency-error" | "dependency" => Some(ErrorCategory::DependencyError),
            "concurrency-error" | "concurrency" => Some(ErrorCategory::ConcurrencyError),
            "permission-error" | "permission" => Some(ErrorCategory::PermissionError),
            "runtime-error" | "runtime" => Some(ErrorCategory::RuntimeError),
            _ => None,
        }
    }
}

/// How a diagnosis entered the system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IngestionSource {
    #[default]
    Api,
    Cli,
    Upload,
    Webhook,
}

impl IngestionSource {
    /// Return the lowercase string representation used for storage.
    ///
    /// # Returns
    /// String slice for this ingestion source.
    pub fn as_str(&self) -> &'static str {
        match self {
            IngestionSource::Api => "api",
            IngestionSource::Cli => "cli",
            IngestionSource::Upload => "upload",
            IngestionSource::Webhook => "webhook",
        }
    }

    /// Parse a stored ingestion source name.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "api" => Some(IngestionSource::Api),
            "cli" => Some(IngestionSource::Cli),
            "upload" => Some(IngestionSource::Upload),
            "webhook" => Some(IngestionSource::Webhook),
            _ => None,
        }
    }
}

/// A reference to a location in a source file, as reported by an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRef {
    pub path: PathBuf,
    /// 1-based line number
    pub line: Option<u32>,
    /// 1-based column number
    pub column: Option<u32>,
}

impl FileRef {
    pub fn new(path: impl Into<PathBuf>, line: Option<u32>) -> Self {
        Self {
            path: path.into(),
            line,
            column: None,
        }
    }
}

/// One numbered line of source in a [`FileContext`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLine {
    pub number: u32,
    pub text: String,
    pub highlighted: bool,
}

/// Source code surrounding the reported location.
///
/// # Fields
/// - `path`: Resolved path of the file that was read.
/// - `line`: Reported line, if the error carried one.
/// - `lines`: Window of numbered lines around `line`.
/// - `highlighted`: Text of the offending line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileContext {
    pub path: String,
    pub line: Option<u32>,
    pub lines: Vec<SourceLine>,
    pub highlighted: Option<String>,
}

/// A commit summary from the version-control history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitSummary {
    pub sha: String,
    pub author: String,
    pub date: String,
    pub subject: String,
}

/// Condensed working tree status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkingTreeStatus {
    pub modified: u32,
    pub added: u32,
    pub deleted: u32,
    pub renamed: u32,
    pub untracked: u32,
}

impl WorkingTreeStatus {
    pub fn is_dirty(&self) -> bool {
        self.modified + self.added + self.deleted + self.renamed + self.untracked > 0
    }

    /// Short human-readable form, e.g. `2 modified, 1 untracked`.
    pub fn short(&self) -> String {
        let parts: Vec<String> = [
            (self.modified, "modified"),
            (self.added, "added"),
            (self.deleted, "deleted"),
            (self.renamed, "renamed"),
            (self.untracked, "untracked"),
        ]
        .iter()
        .filter(|(count, _)| *count > 0)
        .map(|(count, label)| format!("{} {}", count, label))
        .collect();

        if parts.is_empty() {
            "clean".to_string()
        } else {
            parts.join(", ")
        }
    }
}

/// Version-control state of the project.
///
/// # Fields
/// - `branch`: Current branch, or the short HEAD SHA when detached.
/// - `status`: Working tree change counts.
/// - `recent_commits`: Most recent commits, newest first.
/// - `line_last_changed`: Commit that last touched the offending line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VcsContext {
    pub branch: String,
    pub detached: bool,
    pub status: WorkingTreeStatus,
    pub recent_commits: Vec<CommitSummary>,
    pub line_last_changed: Option<CommitSummary>,
}

/// A declared project dependency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependency {
    pub name: String,
    pub version: Option<String>,
}

/// Project layout and dependency facts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectContext {
    pub name: Option<String>,
    pub language: Language,
    pub framework: Option<String>,
    pub manifests: Vec<String>,
    pub dependencies: Vec<Dependency>,
    pub has_tests: bool,
}

/// A language runtime found on the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeInfo {
    pub name: String,
    pub version: String,
}

/// Facts about the host the error was analyzed on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentContext {
    pub os: String,
    pub arch: String,
    pub family: String,
    pub cpu_count: usize,
    pub runtime: Option<RuntimeInfo>,
    pub isolated_env: Option<String>,
}

/// Up to four independently optional context facets.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextBundle {
    pub file: Option<FileContext>,
    pub vcs: Option<VcsContext>,
    pub project: Option<ProjectContext>,
    pub environment: Option<EnvironmentContext>,
}

impl ContextBundle {
    pub fn is_empty(&self) -> bool {
        self.file.is_none()
            && self.vcs.is_none()
            && self.project.is_none()
            && self.environment.is_none()
    }

    /// Number of facets present.
    pub fn facet_count(&self) -> usize {
        [
            self.file.is_some(),
            self.vcs.is_some(),
            self.project.is_some(),
            self.environment.is_some(),
        ]
        .iter()
        .filter(|present| **present)
        .count()
    }
}

/// The structured result of analyzing one error input.
///
/// # Fields
/// - `id`: Content-derived identifier (hex SHA-256).
/// - `timestamp`: When the error was analyzed.
/// - `original_text`: Raw input text.
/// - `rendered_text`: Human-formatted report.
/// - `summary`: Short summary, `None` for unrecognized input.
/// - `tags`: Ordered set of tags.
/// - `severity`: Severity of the top match.
/// - `language`: Language of the top match, `unknown` without one.
/// - `error_kind`: Kind of the top match.
/// - `confidence`: Confidence of the top match.
/// - `context`: Extracted context facets.
/// - `project_name`: Optional project name.
/// - `source_file`: Optional file the error points at.
/// - `ingestion_source`: How the input arrived.
/// - `created_at`: Set by the store when the record is persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnosis {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub original_text: String,
    pub rendered_text: String,
    pub summary: Option<String>,
    pub tags: Vec<String>,
    pub severity: Severity,
    pub language: Language,
    pub error_kind: Option<String>,
    pub confidence: Option<f32>,
    pub context: ContextBundle,
    pub project_name: Option<String>,
    pub source_file: Option<String>,
    pub ingestion_source: IngestionSource,
    pub created_at: Option<DateTime<Utc>>,
}

/// Aggregate counts over the store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreStats {
    pub total: u64,
    pub by_severity: BTreeMap<String, u64>,
    pub by_language: BTreeMap<String, u64>,
    pub last_hour: u64,
    pub last_day: u64,
    pub last_week: u64,
    pub oldest: Option<DateTime<Utc>>,
    pub newest: Option<DateTime<Utc>>,
}

/// Result of a compaction pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompactionReport {
    /// Database size before compaction (bytes)
    pub size_before: u64,
    /// Database size after compaction (bytes)
    pub size_after: u64,
    /// Time taken (milliseconds)
    pub duration_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_ordering_and_aliases() {
        assert!(Severity::Critical > Severity::Error);
        assert!(Severity::Trace < Severity::Debug);
        assert_eq!(Severity::parse("WARN"), Some(Severity::Warning));
        assert_eq!(Severity::parse("fatal"), Some(Severity::Critical));
        assert_eq!(Severity::parse("loud"), None);
    }

    #[test]
    fn test_severity_sniff() {
        assert_eq!(Severity::sniff("FATAL: out of disk"), Severity::Critical);
        assert_eq!(Severity::sniff("[WARN] slow query"), Severity::Warning);
        assert_eq!(Severity::sniff("something odd happened"), Severity::Error);
    }

    #[test]
    fn test_language_round_trip_names() {
        for lang in Language::KNOWN {
            assert_eq!(Language::parse(lang.as_str()), Some(lang));
        }
        assert_eq!(Language::parse("C#"), Some(Language::CSharp));
        assert_eq!(Language::from_extension("tsx"), Some(Language::TypeScript));
    }

    #[test]
    fn test_working_tree_status_short() {
        let status = WorkingTreeStatus {
            modified: 2,
            untracked: 1,
            ..Default::default()
        };
        assert!(status.is_dirty());
        assert_eq!(status.short(), "2 modified, 1 untracked");
        assert_eq!(WorkingTreeStatus::default().short(), "clean");
    }
}
