//! Analyzer: raw error text in, [`Diagnosis`] out
//!
//! Runs the pattern matcher, picks the top match, extracts context when a
//! project root is known, and assembles summary, tags and the rendered
//! report. Always produces a diagnosis, even for unrecognized input.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use tracing::debug;

use crate::config::Config;
use crate::context::ContextExtractor;
use crate::error::Result;
use crate::fingerprint::diagnosis_id;
use crate::patterns::{ErrorMatch, PatternCatalog, PatternMatcher};
use crate::types::{ContextBundle, Diagnosis, FileRef, IngestionSource, Language, Severity};

/// Maximum summary length in characters, ellipsis included
pub const MAX_SUMMARY_CHARS: usize = 160;

/// Suggested fixes shown in the rendered report
pub const MAX_RENDERED_FIXES: usize = 3;

/// Input to [`Analyzer::diagnose_request`].
#[derive(Debug, Clone, Default)]
pub struct DiagnoseRequest {
    pub text: String,
    pub project_root: Option<PathBuf>,
    pub language_hint: Option<String>,
    pub project_name: Option<String>,
    pub ingestion_source: IngestionSource,
    /// Analysis time; defaults to now
    pub timestamp: Option<DateTime<Utc>>,
}

impl DiagnoseRequest {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    pub fn project_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.project_root = Some(root.into());
        self
    }

    pub fn language_hint(mut self, hint: impl Into<String>) -> Self {
        self.language_hint = Some(hint.into());
        self
    }

    pub fn project_name(mut self, name: impl Into<String>) -> Self {
        self.project_name = Some(name.into());
        self
    }

    pub fn source(mut self, source: IngestionSource) -> Self {
        self.ingestion_source = source;
        self
    }

    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }
}

/// Turns raw error text into diagnoses.
#[derive(Debug, Clone, Default)]
pub struct Analyzer {
    matcher: PatternMatcher,
    extractor: ContextExtractor,
}

impl Analyzer {
    pub fn new(matcher: PatternMatcher, extractor: ContextExtractor) -> Self {
        Self { matcher, extractor }
    }

    /// Build an analyzer from configuration, loading the pattern catalog.
    pub fn from_config(config: &Config) -> Result<Self> {
        let catalog: Arc<PatternCatalog> = PatternCatalog::load(&config.catalog)?;
        Ok(Self::new(
            PatternMatcher::new(catalog),
            ContextExtractor::new(config.context.clone()),
        ))
    }

    pub fn matcher(&self) -> &PatternMatcher {
        &self.matcher
    }

    pub fn extractor(&self) -> &ContextExtractor {
        &self.extractor
    }

    /// Diagnose `raw_text`, extracting context under `project_root` if given.
    pub fn diagnose(&self, raw_text: &str, project_root: Option<&Path>) -> Diagnosis {
        let mut request = DiagnoseRequest::new(raw_text);
        request.project_root = project_root.map(Path::to_path_buf);
        self.diagnose_request(&request)
    }

    /// Diagnose with the full set of request options.
    pub fn diagnose_request(&self, request: &DiagnoseRequest) -> Diagnosis {
        let text = request.text.as_str();
        let timestamp = truncate_to_millis(request.timestamp.unwrap_or_else(Utc::now));

        let top = self
            .matcher
            .match_text(text, request.language_hint.as_deref())
            .into_iter()
            .next();
        let language = top
            .as_ref()
            .map(|m| m.pattern.language)
            .unwrap_or(Language::Unknown);

        let location = self.locate(text, top.as_ref(), language);

        let context = match &request.project_root {
            Some(root) => self.extractor.extract_for(
                location.as_ref(),
                root,
                (language != Language::Unknown).then_some(language),
            ),
            None => ContextBundle::default(),
        };

        let summary = top.as_ref().map(|m| summarize(m, text));
        let tags = top.as_ref().map(tags_for).unwrap_or_default();
        let severity = top
            .as_ref()
            .map(|m| m.pattern.severity)
            .unwrap_or_else(|| Severity::sniff(text));
        let source_file = location.as_ref().map(|l| l.path.display().to_string());

        let rendered_text = render(&Rendering {
            severity,
            summary: summary.as_deref(),
            language,
            location: location.as_ref(),
            tags: &tags,
            original_text: text,
            top: top.as_ref(),
        });

        let project_name = request
            .project_name
            .clone()
            .or_else(|| context.project.as_ref().and_then(|p| p.name.clone()))
            .or_else(|| {
                request
                    .project_root
                    .as_ref()
                    .and_then(|r| r.file_name())
                    .map(|n| n.to_string_lossy().into_owned())
            });

        let id = diagnosis_id(text, timestamp, &context);
        debug!(
            "Diagnosed {} as {} ({} facets)",
            &id[..12],
            top.as_ref()
                .map(|m| m.pattern.error_kind.as_str())
                .unwrap_or("unrecognized"),
            context.facet_count()
        );

        Diagnosis {
            id,
            timestamp,
            original_text: text.to_string(),
            rendered_text,
            summary,
            tags,
            severity,
            language,
            error_kind: top.as_ref().map(|m| m.pattern.error_kind.clone()),
            confidence: top.as_ref().map(|m| m.confidence),
            context,
            project_name,
            source_file,
            ingestion_source: request.ingestion_source,
            created_at: None,
        }
    }

    /// The location the error points at: captured by the match itself,
    /// else found by the language's stack-frame rules.
    fn locate(&self, text: &str, top: Option<&ErrorMatch>, language: Language) -> Option<FileRef> {
        if let Some(file) = top.and_then(ErrorMatch::file_ref) {
            return Some(file);
        }
        let language = match language {
            Language::Unknown => self.matcher.detect_language(text)?,
            known => known,
        };
        self.matcher.locate(text, language)
    }
}

fn truncate_to_millis(ts: DateTime<Utc>) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(ts.timestamp_millis())
        .single()
        .unwrap_or(ts)
}

/// `"{name} ({error_kind}): {detail}"`, bounded to [`MAX_SUMMARY_CHARS`].
///
/// The detail is the `message` capture, else the first other capture when
/// the pattern captures the error name, else the matched text itself.
/// Without any detail the summary is `"{name} ({error_kind})"`.
fn summarize(m: &ErrorMatch, text: &str) -> String {
    let name = m.error_name();
    let kind = &m.pattern.error_kind;
    let detail = m
        .field("message")
        .map(str::to_string)
        .or_else(|| {
            m.field("error")
                .and_then(|_| m.detail())
                .map(str::to_string)
        })
        .or_else(|| {
            let (start, end) = m.matched_span;
            let span = text.get(start..end)?.lines().next()?.trim();
            let span = span.strip_prefix(name).unwrap_or(span);
            let span = span.trim_start_matches(':').trim();
            (!span.is_empty()).then(|| span.to_string())
        });

    let summary = match detail {
        Some(detail) => format!("{} ({}): {}", name, kind, detail),
        None => format!("{} ({})", name, kind),
    };
    truncate(&summary, MAX_SUMMARY_CHARS)
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max_chars - 1).collect();
    out.push('…');
    out
}

/// Ordered, de-duplicated tags: language, exception name, kind, category.
fn tags_for(m: &ErrorMatch) -> Vec<String> {
    let name = m.error_name();
    let simple = name
        .rsplit(|c: char| c == '.' || c == ':' || c == '\\')
        .next()
        .unwrap_or(name);

    let candidates = [
        m.pattern.language.as_str().to_string(),
        simple.to_ascii_lowercase().replace(' ', "-"),
        m.pattern.error_kind.clone(),
        m.pattern.category.as_str().to_string(),
    ];

    let mut tags: Vec<String> = Vec::with_capacity(candidates.len());
    for tag in candidates {
        if !tag.is_empty() && !tags.contains(&tag) {
            tags.push(tag);
        }
    }
    tags
}

struct Rendering<'a> {
    severity: Severity,
    summary: Option<&'a str>,
    language: Language,
    location: Option<&'a FileRef>,
    tags: &'a [String],
    original_text: &'a str,
    top: Option<&'a ErrorMatch>,
}

/// Deterministic plain-text report.
fn render(r: &Rendering<'_>) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "[{}] {}",
        r.severity.as_str().to_ascii_uppercase(),
        r.summary.unwrap_or("Unrecognized error")
    );
    let _ = writeln!(out, "Language: {}", r.language);
    if let Some(loc) = r.location {
        let _ = match (loc.line, loc.column) {
            (Some(line), Some(col)) => writeln!(out, "Location: {}:{}:{}", loc.path.display(), line, col),
            (Some(line), None) => writeln!(out, "Location: {}:{}", loc.path.display(), line),
            _ => writeln!(out, "Location: {}", loc.path.display()),
        };
    }
    if !r.tags.is_empty() {
        let _ = writeln!(out, "Tags: {}", r.tags.join(", "));
    }

    out.push('\n');
    out.push_str(r.original_text.trim_end());
    out.push('\n');

    if let Some(m) = r.top {
        let fixes: Vec<&String> = m.pattern.suggested_fixes.iter().take(MAX_RENDERED_FIXES).collect();
        if !fixes.is_empty() {
            out.push_str("\nSuggested fixes:\n");
            for (i, fix) in fixes.iter().enumerate() {
                let _ = writeln!(out, "  {}. {}", i + 1, fix);
            }
        }
        if let Some(link) = &m.pattern.doc_link {
            let _ = writeln!(out, "\nDocs: {}", link);
        }
    }

    out
}
