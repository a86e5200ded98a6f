//! Pattern catalog: the immutable registry of error signatures
//!
//! The catalog is built once (builtin definitions, optionally followed by a
//! TOML catalog file) and shared read-only behind an `Arc`. Registration
//! order is significant: it breaks confidence ties in the matcher.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::{Arc, OnceLock};

use regex::Regex;
use serde::Deserialize;
use tracing::debug;

use crate::config::CatalogConfig;
use crate::error::{Error, Result};
use crate::patterns::builtin;
use crate::types::{ErrorCategory, Language, Severity};

/// A compiled error signature.
///
/// # Fields
/// - `language`: Language this signature belongs to.
/// - `name`: Exception identifier, e.g. `IndexError`.
/// - `error_kind`: Normalized kind, e.g. `index-out-of-range`.
/// - `matcher`: Regex with named capture groups.
/// - `severity`: Severity assigned to matches.
/// - `category`: Coarse category used for tagging.
/// - `suggested_fixes`: Ordered remediation hints.
/// - `doc_link`: Optional documentation URL.
#[derive(Debug)]
pub struct ErrorPattern {
    pub language: Language,
    pub name: String,
    pub error_kind: String,
    pub matcher: Regex,
    pub severity: Severity,
    pub category: ErrorCategory,
    pub suggested_fixes: Vec<String>,
    pub doc_link: Option<String>,
    group_count: usize,
    literal_chars: usize,
}

impl ErrorPattern {
    /// Number of named capture groups.
    pub fn group_count(&self) -> usize {
        self.group_count
    }

    /// Number of literal characters anchoring the regex.
    pub fn literal_chars(&self) -> usize {
        self.literal_chars
    }
}

/// Which frame a location rule prefers when a trace has several.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FramePreference {
    /// Outermost-first traces (Java, JS, Go): the first frame is the throw site
    First,
    /// Innermost-last traces (Python): the last frame is the throw site
    Last,
}

/// Extracts a file/line reference from a stack frame.
#[derive(Debug)]
pub struct LocationRule {
    pub language: Language,
    pub regex: Regex,
    pub prefer: FramePreference,
    /// Frames whose file contains any of these fragments are ignored
    pub skip: Vec<String>,
}

/// A pattern as written in a catalog file.
#[derive(Debug, Clone, Deserialize)]
pub struct PatternDef {
    pub language: String,
    pub name: String,
    pub error_kind: String,
    pub regex: String,
    #[serde(default = "default_severity")]
    pub severity: String,
    #[serde(default = "default_category")]
    pub category: String,
    #[serde(default)]
    pub fixes: Vec<String>,
    pub doc_link: Option<String>,
}

fn default_severity() -> String {
    "error".to_string()
}

fn default_category() -> String {
    "runtime-error".to_string()
}

#[derive(Debug, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    pattern: Vec<PatternDef>,
    /// Extra exception identifiers, keyed by language name
    #[serde(default)]
    known_exceptions: HashMap<String, Vec<String>>,
}

/// The registry of error signatures, location rules and known exception
/// identifiers.
#[derive(Debug, Default)]
pub struct PatternCatalog {
    patterns: Vec<Arc<ErrorPattern>>,
    locations: Vec<LocationRule>,
    known: HashMap<Language, HashSet<String>>,
}

static BUILTIN: OnceLock<Arc<PatternCatalog>> = OnceLock::new();

impl PatternCatalog {
    /// The builtin catalog, compiled on first use and shared afterwards.
    pub fn builtin() -> Arc<PatternCatalog> {
        BUILTIN
            .get_or_init(|| {
                let catalog = Self::compile_builtin();
                debug!(
                    "Compiled builtin pattern catalog ({} patterns)",
                    catalog.len()
                );
                Arc::new(catalog)
            })
            .clone()
    }

    /// Build the catalog described by `config`: builtin patterns followed by
    /// the optional catalog file.
    ///
    /// # Errors
    /// Returns [`Error::Catalog`] if the catalog file is malformed.
    pub fn load(config: &CatalogConfig) -> Result<Arc<PatternCatalog>> {
        match &config.path {
            None => Ok(Self::builtin()),
            Some(path) => {
                let mut catalog = Self::compile_builtin();
                catalog.extend_from_file(path)?;
                Ok(Arc::new(catalog))
            }
        }
    }

    fn compile_builtin() -> Self {
        let mut catalog = PatternCatalog::default();

        for entry in builtin::PATTERNS {
            // A bad builtin regex is skipped, not fatal
            match Regex::new(entry.regex) {
                Ok(matcher) => catalog.push(ErrorPattern::new(
                    entry.language,
                    entry.name.to_string(),
                    entry.error_kind.to_string(),
                    matcher,
                    entry.severity,
                    entry.category,
                    entry.fixes.iter().map(|f| f.to_string()).collect(),
                    entry.doc_link.map(str::to_string),
                )),
                Err(e) => debug!("Skipping builtin pattern {}: {}", entry.name, e),
            }
        }

        for entry in builtin::LOCATIONS {
            if let Ok(regex) = Regex::new(entry.regex) {
                catalog.locations.push(LocationRule {
                    language: entry.language,
                    regex,
                    prefer: entry.prefer,
                    skip: entry.skip.iter().map(|s| s.to_string()).collect(),
                });
            }
        }

        for (language, names) in builtin::KNOWN_EXCEPTIONS {
            catalog
                .known
                .entry(*language)
                .or_default()
                .extend(names.iter().map(|n| n.to_string()));
        }

        catalog
    }

    /// Append the patterns of a TOML catalog file.
    pub fn extend_from_file(&mut self, path: &Path) -> Result<()> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Catalog(format!("{}: {}", path.display(), e)))?;
        let added = self.extend_from_toml(&content)?;
        debug!("Loaded {} patterns from {}", added, path.display());
        Ok(())
    }

    /// Append the patterns of a TOML catalog document.
    ///
    /// # Returns
    /// Number of patterns added.
    pub fn extend_from_toml(&mut self, content: &str) -> Result<usize> {
        let file: CatalogFile =
            toml::from_str(content).map_err(|e| Error::Catalog(e.to_string()))?;

        // Validate everything before touching the catalog
        let known = file
            .known_exceptions
            .into_iter()
            .map(|(language, names)| Ok((parse_language(&language)?, names)))
            .collect::<Result<Vec<_>>>()?;
        let patterns = file
            .pattern
            .into_iter()
            .map(ErrorPattern::from_def)
            .collect::<Result<Vec<_>>>()?;

        for (language, names) in known {
            self.known.entry(language).or_default().extend(names);
        }
        let added = patterns.len();
        for pattern in patterns {
            self.push(pattern);
        }
        Ok(added)
    }

    fn push(&mut self, pattern: ErrorPattern) {
        self.known
            .entry(pattern.language)
            .or_default()
            .insert(pattern.name.clone());
        self.patterns.push(Arc::new(pattern));
    }

    /// All patterns in registration order.
    pub fn patterns(&self) -> &[Arc<ErrorPattern>] {
        &self.patterns
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Patterns applicable to `language`, paired with their registration
    /// index. JavaScript and TypeScript share their runtime patterns.
    pub fn scoped(&self, language: Language) -> impl Iterator<Item = (usize, &Arc<ErrorPattern>)> {
        self.patterns
            .iter()
            .enumerate()
            .filter(move |(_, p)| same_family(p.language, language))
    }

    /// Location rules for `language`, in registration order.
    pub fn location_rules(&self, language: Language) -> impl Iterator<Item = &LocationRule> {
        self.locations
            .iter()
            .filter(move |r| same_family(r.language, language))
    }

    /// Whether `name` is a known exception identifier for `language`.
    ///
    /// Qualified names (`java.lang.NullPointerException`,
    /// `ActiveRecord::RecordNotFound`) are also checked by their last segment.
    pub fn is_known_exception(&self, language: Language, name: &str) -> bool {
        let Some(known) = self.known.get(&language) else {
            return false;
        };
        if known.contains(name) {
            return true;
        }
        let simple = name
            .rsplit(|c: char| c == '.' || c == ':' || c == '\\')
            .next()
            .unwrap_or(name);
        known.contains(simple)
    }
}

fn same_family(a: Language, b: Language) -> bool {
    a == b
        || matches!(
            (a, b),
            (Language::JavaScript, Language::TypeScript) | (Language::TypeScript, Language::JavaScript)
        )
}

fn parse_language(value: &str) -> Result<Language> {
    Language::parse(value).ok_or_else(|| Error::Catalog(format!("unknown language: {}", value)))
}

impl ErrorPattern {
    #[allow(clippy::too_many_arguments)]
    fn new(
        language: Language,
        name: String,
        error_kind: String,
        matcher: Regex,
        severity: Severity,
        category: ErrorCategory,
        suggested_fixes: Vec<String>,
        doc_link: Option<String>,
    ) -> Self {
        let group_count = matcher.capture_names().flatten().count();
        let literal_chars = count_literal_chars(matcher.as_str());
        Self {
            language,
            name,
            error_kind,
            matcher,
            severity,
            category,
            suggested_fixes,
            doc_link,
            group_count,
            literal_chars,
        }
    }

    fn from_def(def: PatternDef) -> Result<Self> {
        let language = parse_language(&def.language)?;
        let severity = Severity::parse(&def.severity)
            .ok_or_else(|| Error::Catalog(format!("unknown severity: {}", def.severity)))?;
        let category = ErrorCategory::parse(&def.category)
            .ok_or_else(|| Error::Catalog(format!("unknown category: {}", def.category)))?;
        let matcher = Regex::new(&def.regex)
            .map_err(|e| Error::Catalog(format!("pattern {}: {}", def.name, e)))?;

        Ok(Self::new(
            language,
            def.name,
            def.error_kind,
            matcher,
            severity,
            category,
            def.fixes,
            def.doc_link,
        ))
    }
}

/// Count the literal characters of a regex source.
///
/// Escaped punctuation counts as literal; character classes, group syntax,
/// quantifiers and class escapes (`\d`, `\w`, ...) do not.
fn count_literal_chars(pattern: &str) -> usize {
    let mut count = 0;
    let mut chars = pattern.chars().peekable();
    let mut class_depth = 0usize;

    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                if let Some(next) = chars.next() {
                    if class_depth == 0 && !next.is_ascii_alphanumeric() {
                        count += 1;
                    }
                }
            }
            '[' => class_depth += 1,
            ']' if class_depth > 0 => class_depth -= 1,
            _ if class_depth > 0 => {}
            '(' => {
                // Skip group syntax such as `?:`, `?P<name>` or `?i`
                if chars.peek() == Some(&'?') {
                    for g in chars.by_ref() {
                        if g == '>' || g == ':' || g == ')' {
                            break;
                        }
                    }
                }
            }
            '{' => {
                for q in chars.by_ref() {
                    if q == '}' {
                        break;
                    }
                }
            }
            ')' | '|' | '.' | '*' | '+' | '?' | '^' | '$' => {}
            _ => count += 1,
        }
    }

    count
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_catalog_compiles_every_pattern() {
        let catalog = PatternCatalog::builtin();
        assert_eq!(catalog.len(), builtin::PATTERNS.len());
        for lang in Language::KNOWN {
            assert!(
                catalog.scoped(lang).next().is_some(),
                "no patterns for {}",
                lang
            );
        }
    }

    #[test]
    fn test_builtin_location_rules_compile() {
        let catalog = PatternCatalog::builtin();
        assert_eq!(catalog.locations.len(), builtin::LOCATIONS.len());
    }

    #[test]
    fn test_literal_char_counting() {
        assert_eq!(count_literal_chars(r"abc"), 3);
        assert_eq!(count_literal_chars(r"(?P<error>KeyError): (?P<key>.+)"), 10);
        assert_eq!(count_literal_chars(r"\d+\.\d+"), 1);
        assert_eq!(count_literal_chars(r"[a-z]+x{2,3}"), 1);
    }

    #[test]
    fn test_known_exception_matches_qualified_names() {
        let catalog = PatternCatalog::builtin();
        assert!(catalog.is_known_exception(Language::Python, "IndexError"));
        assert!(catalog.is_known_exception(
            Language::Java,
            "java.lang.NullPointerException"
        ));
        assert!(!catalog.is_known_exception(Language::Python, "MadeUpError"));
    }

    #[test]
    fn test_extend_from_toml_appends_after_builtins() {
        let mut catalog = PatternCatalog::compile_builtin();
        let before = catalog.len();
        let added = catalog
            .extend_from_toml(
                r#"
                [known_exceptions]
                python = ["CeleryTimeoutError"]

                [[pattern]]
                language = "python"
                name = "OperationalError"
                error_kind = "database-locked"
                regex = '(?P<error>OperationalError): database is locked'
                category = "concurrency-error"
                fixes = ["Use WAL mode"]
                "#,
            )
            .unwrap();

        assert_eq!(added, 1);
        assert_eq!(catalog.len(), before + 1);
        let last = catalog.patterns().last().unwrap();
        assert_eq!(last.error_kind, "database-locked");
        assert_eq!(last.category, ErrorCategory::ConcurrencyError);
        assert_eq!(last.severity, Severity::Error);
        assert!(catalog.is_known_exception(Language::Python, "CeleryTimeoutError"));
    }

    #[test]
    fn test_bad_catalog_entries_are_rejected() {
        let mut catalog = PatternCatalog::default();
        let err = catalog
            .extend_from_toml(
                r#"
                [[pattern]]
                language = "cobol"
                name = "X"
                error_kind = "x"
                regex = "x"
                "#,
            )
            .unwrap_err();
        assert!(matches!(err, Error::Catalog(_)));

        let err = catalog
            .extend_from_toml(
                r#"
                [[pattern]]
                language = "python"
                name = "X"
                error_kind = "x"
                regex = "(unclosed"
                "#,
            )
            .unwrap_err();
        assert!(matches!(err, Error::Catalog(_)));
    }
}
