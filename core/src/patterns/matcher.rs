//! Pattern matcher: runs input text against the catalog
//!
//! # Confidence scoring
//!
//! ```text
//! confidence = 0.30
//!            + 0.08 * min(named_groups, 4)
//!            + 0.20 * min(literal_chars, 40) / 40
//!            + 0.15 if the match confirms the pattern's own exception name
//!              and that name is a known identifier
//! ```
//!
//! clamped to `[0, 1]` and rounded to four decimals. The score only depends
//! on the pattern and the matched error name, so it is monotonic in
//! specificity and identical across runs. Catch-all patterns never earn the
//! bonus for the names they happen to capture. Equal scores are ordered by
//! registration index.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::debug;

use crate::patterns::catalog::{ErrorPattern, FramePreference, PatternCatalog};
use crate::patterns::detect::detect_language;
use crate::types::{FileRef, Language};

const BASE_SCORE: f32 = 0.30;
const GROUP_WEIGHT: f32 = 0.08;
const MAX_SCORED_GROUPS: usize = 4;
const LITERAL_WEIGHT: f32 = 0.20;
const MAX_SCORED_LITERALS: usize = 40;
const KNOWN_EXCEPTION_BONUS: f32 = 0.15;

/// One pattern matched against one input.
///
/// # Fields
/// - `pattern`: The matching catalog entry.
/// - `pattern_index`: Registration index of the pattern in the catalog.
/// - `confidence`: Score in `[0, 1]`.
/// - `captured_fields`: Named groups that participated, in group order.
/// - `matched_span`: Byte offsets `(start, end)` of the match.
#[derive(Debug, Clone)]
pub struct ErrorMatch {
    pub pattern: Arc<ErrorPattern>,
    pub pattern_index: usize,
    pub confidence: f32,
    pub captured_fields: Vec<(String, String)>,
    pub matched_span: (usize, usize),
}

impl ErrorMatch {
    /// Value of a named capture, if it participated in the match.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.captured_fields
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// The error name: the `error` capture, or the pattern's name.
    pub fn error_name(&self) -> &str {
        self.field("error").unwrap_or(self.pattern.name.as_str())
    }

    /// First captured field other than the error name itself.
    pub fn detail(&self) -> Option<&str> {
        self.captured_fields
            .iter()
            .find(|(k, _)| k != "error")
            .map(|(_, v)| v.as_str())
    }

    /// File reference carried by the match itself (`file`/`line`/`column`).
    pub fn file_ref(&self) -> Option<FileRef> {
        let path = self.field("file")?;
        Some(FileRef {
            path: PathBuf::from(path),
            line: self.field("line").and_then(|l| l.parse().ok()),
            column: self.field("column").and_then(|c| c.parse().ok()),
        })
    }
}

/// Confidence for a pattern match.
pub fn score(pattern: &ErrorPattern, known_exception: bool) -> f32 {
    let groups = pattern.group_count().min(MAX_SCORED_GROUPS) as f32;
    let literals = pattern.literal_chars().min(MAX_SCORED_LITERALS) as f32;
    let mut confidence = BASE_SCORE
        + GROUP_WEIGHT * groups
        + LITERAL_WEIGHT * literals / MAX_SCORED_LITERALS as f32;
    if known_exception {
        confidence += KNOWN_EXCEPTION_BONUS;
    }
    (confidence.clamp(0.0, 1.0) * 10_000.0).round() / 10_000.0
}

/// Matches text against a shared, immutable catalog.
///
/// Stateless apart from the catalog, so one matcher can be shared across
/// threads.
#[derive(Debug, Clone)]
pub struct PatternMatcher {
    catalog: Arc<PatternCatalog>,
}

impl Default for PatternMatcher {
    fn default() -> Self {
        Self::new(PatternCatalog::builtin())
    }
}

impl PatternMatcher {
    pub fn new(catalog: Arc<PatternCatalog>) -> Self {
        Self { catalog }
    }

    pub fn catalog(&self) -> &Arc<PatternCatalog> {
        &self.catalog
    }

    /// Match `text` against the catalog.
    ///
    /// A parseable `language_hint` restricts the search to that language;
    /// otherwise the language is detected from the text. When detection
    /// fails, or the restricted search finds nothing, the full catalog is
    /// scanned.
    ///
    /// # Returns
    /// Matches ordered by confidence (descending), then registration order.
    /// An empty list means the input is unrecognized.
    pub fn match_text(&self, text: &str, language_hint: Option<&str>) -> Vec<ErrorMatch> {
        let scope = language_hint
            .and_then(Language::parse)
            .filter(|l| *l != Language::Unknown)
            .or_else(|| detect_language(text));

        let mut matches = match scope {
            Some(language) => {
                let scoped = self.scan(text, Some(language));
                if scoped.is_empty() {
                    debug!("No {} pattern matched, scanning full catalog", language);
                    self.scan(text, None)
                } else {
                    scoped
                }
            }
            None => self.scan(text, None),
        };

        matches.sort_by(|a, b| {
            b.confidence
                .total_cmp(&a.confidence)
                .then(a.pattern_index.cmp(&b.pattern_index))
        });
        matches
    }

    /// Highest-ranked match, if any.
    pub fn best_match(&self, text: &str, language_hint: Option<&str>) -> Option<ErrorMatch> {
        self.match_text(text, language_hint).into_iter().next()
    }

    /// Detect the language of `text` without matching.
    pub fn detect_language(&self, text: &str) -> Option<Language> {
        detect_language(text)
    }

    fn scan(&self, text: &str, scope: Option<Language>) -> Vec<ErrorMatch> {
        let candidates: Box<dyn Iterator<Item = (usize, &Arc<ErrorPattern>)> + '_> = match scope {
            Some(language) => Box::new(self.catalog.scoped(language)),
            None => Box::new(self.catalog.patterns().iter().enumerate()),
        };

        candidates
            .filter_map(|(index, pattern)| self.match_pattern(text, index, pattern))
            .collect()
    }

    fn match_pattern(
        &self,
        text: &str,
        index: usize,
        pattern: &Arc<ErrorPattern>,
    ) -> Option<ErrorMatch> {
        let caps = pattern.matcher.captures(text)?;
        let whole = caps.get(0)?;

        let captured_fields: Vec<(String, String)> = pattern
            .matcher
            .capture_names()
            .flatten()
            .filter_map(|name| {
                caps.name(name)
                    .map(|m| m.as_str().trim())
                    .filter(|v| !v.is_empty())
                    .map(|v| (name.to_string(), v.to_string()))
            })
            .collect();

        let error_name = captured_fields
            .iter()
            .find(|(k, _)| k == "error")
            .map(|(_, v)| v.as_str())
            .unwrap_or(pattern.name.as_str());
        let known = simple_name(error_name) == simple_name(&pattern.name)
            && self.catalog.is_known_exception(pattern.language, error_name);

        Some(ErrorMatch {
            pattern: Arc::clone(pattern),
            pattern_index: index,
            confidence: score(pattern, known),
            captured_fields,
            matched_span: (whole.start(), whole.end()),
        })
    }

    /// Find the most relevant stack frame location for `language`.
    pub fn locate(&self, text: &str, language: Language) -> Option<FileRef> {
        for rule in self.catalog.location_rules(language) {
            let mut frames = rule.regex.captures_iter(text).filter_map(|caps| {
                let file = caps.name("file")?.as_str();
                if rule.skip.iter().any(|s| file.contains(s.as_str())) {
                    return None;
                }
                Some(FileRef {
                    path: PathBuf::from(file),
                    line: caps.name("line").and_then(|m| m.as_str().parse().ok()),
                    column: caps.name("column").and_then(|m| m.as_str().parse().ok()),
                })
            });

            let found = match rule.prefer {
                FramePreference::First => frames.next(),
                FramePreference::Last => frames.last(),
            };
            if found.is_some() {
                return found;
            }
        }
        None
    }
}

/// Last segment of a qualified exception name.
fn simple_name(name: &str) -> &str {
    name.rsplit(|c: char| c == '.' || c == ':' || c == '\\')
        .next()
        .unwrap_or(name)
}
