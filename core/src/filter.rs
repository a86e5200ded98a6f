//! Search filters for the log store
//!
//! Filters are validated before any SQL runs; malformed input is reported
//! as [`Error::InvalidFilter`].

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};

use crate::error::{Error, Result};
use crate::types::{Language, Severity};

/// Upper bound on `limit`
pub const MAX_LIMIT: usize = 10_000;

/// Criteria for [`LogStore::search`](crate::store::LogStore::search).
///
/// Every criterion that is set must hold for a record to be returned.
///
/// # Fields
/// - `since` / `until`: Inclusive timestamp bounds.
/// - `severity`: Exact severity.
/// - `min_severity`: Severity at or above this level.
/// - `language`: Exact language.
/// - `project_name`: Exact project name.
/// - `text`: Free-text query over rendered text, tags, summary and source file.
/// - `tags`: Tags that must all be present.
/// - `limit`: Maximum results (store default when unset, at most 10,000).
/// - `offset`: Results to skip (at most `i64::MAX`).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchFilter {
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub severity: Option<Severity>,
    pub min_severity: Option<Severity>,
    pub language: Option<Language>,
    pub project_name: Option<String>,
    pub text: Option<String>,
    pub tags: Vec<String>,
    pub limit: Option<usize>,
    pub offset: usize,
}

impl SearchFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn since(mut self, ts: DateTime<Utc>) -> Self {
        self.since = Some(ts);
        self
    }

    pub fn until(mut self, ts: DateTime<Utc>) -> Self {
        self.until = Some(ts);
        self
    }

    pub fn severity(mut self, severity: Severity) -> Self {
        self.severity = Some(severity);
        self
    }

    pub fn min_severity(mut self, severity: Severity) -> Self {
        self.min_severity = Some(severity);
        self
    }

    pub fn language(mut self, language: Language) -> Self {
        self.language = Some(language);
        self
    }

    pub fn project(mut self, name: impl Into<String>) -> Self {
        self.project_name = Some(name.into());
        self
    }

    pub fn text(mut self, query: impl Into<String>) -> Self {
        self.text = Some(query.into());
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    /// Check the filter for contradictions and malformed values.
    pub fn validate(&self) -> Result<()> {
        if let (Some(since), Some(until)) = (self.since, self.until) {
            if since > until {
                return Err(invalid(format!("since {} is after until {}", since, until)));
            }
        }
        match self.limit {
            Some(0) => return Err(invalid("limit must be at least 1")),
            Some(n) if n > MAX_LIMIT => {
                return Err(invalid(format!("limit {} exceeds {}", n, MAX_LIMIT)))
            }
            _ => {}
        }
        if i64::try_from(self.offset).is_err() {
            return Err(invalid(format!("offset {} exceeds {}", self.offset, i64::MAX)));
        }
        if let (Some(exact), Some(min)) = (self.severity, self.min_severity) {
            if exact < min {
                return Err(invalid(format!(
                    "severity {} is below min_severity {}",
                    exact, min
                )));
            }
        }
        if self.project_name.as_deref().is_some_and(|p| p.trim().is_empty()) {
            return Err(invalid("project_name is empty"));
        }
        if self.tags.iter().any(|t| t.trim().is_empty()) {
            return Err(invalid("empty tag"));
        }
        if let Some(text) = &self.text {
            if tokenize(text).is_empty() {
                return Err(invalid(format!("no searchable terms in {:?}", text)));
            }
        }
        Ok(())
    }

    /// Build the full-text queries for `text`, if set.
    pub(crate) fn text_query(&self, prefix: bool) -> Option<TextQuery> {
        let tokens = tokenize(self.text.as_deref()?);
        if tokens.is_empty() {
            return None;
        }
        Some(TextQuery::new(&tokens, prefix))
    }
}

fn invalid(msg: impl Into<String>) -> Error {
    Error::InvalidFilter(msg.into())
}

/// FTS5 expressions derived from a free-text query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct TextQuery {
    /// Every token must match (implicit AND), last token optionally a prefix
    pub terms: String,
    /// The tokens as one exact phrase
    pub phrase: String,
}

impl TextQuery {
    fn new(tokens: &[String], prefix: bool) -> Self {
        let last = tokens.len() - 1;
        let terms = tokens
            .iter()
            .enumerate()
            .map(|(i, t)| {
                if prefix && i == last {
                    format!("\"{}\"*", t)
                } else {
                    format!("\"{}\"", t)
                }
            })
            .collect::<Vec<_>>()
            .join(" ");
        let phrase = format!("\"{}\"", tokens.join(" "));
        Self { terms, phrase }
    }
}

/// Split free text into index tokens.
///
/// Tokens are runs of alphanumeric characters, lowercased. Everything else,
/// FTS5 operators and quotes included, is a separator, so user input can
/// never inject query syntax.
pub(crate) fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
        .collect()
}

/// Parse a time filter into a UTC instant.
///
/// Accepts relative spans (`30m`, `1h`, `2d`, `1w`), `today`, `yesterday`,
/// RFC 3339 timestamps and `YYYY-MM-DD` dates (midnight UTC).
pub fn parse_time_filter(filter: &str) -> Result<DateTime<Utc>> {
    parse_time_filter_at(filter, Utc::now())
}

/// [`parse_time_filter`] relative to an explicit `now`.
pub fn parse_time_filter_at(filter: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
    let filter_lower = filter.trim().to_lowercase();

    let midnight = |ts: DateTime<Utc>| {
        ts.date_naive()
            .and_hms_opt(0, 0, 0)
            .map(|dt| Utc.from_utc_datetime(&dt))
    };

    let parsed = match filter_lower.as_str() {
        "today" => midnight(now),
        "yesterday" => midnight(now - Duration::days(1)),
        _ => relative(&filter_lower, now)
            .or_else(|| {
                DateTime::parse_from_rfc3339(filter.trim())
                    .ok()
                    .map(|dt| dt.with_timezone(&Utc))
            })
            .or_else(|| {
                NaiveDate::parse_from_str(filter.trim(), "%Y-%m-%d")
                    .ok()
                    .and_then(|d| d.and_hms_opt(0, 0, 0))
                    .map(|dt| Utc.from_utc_datetime(&dt))
            }),
    };

    parsed.ok_or_else(|| invalid(format!("unrecognized time filter {:?}", filter)))
}

fn relative(filter: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let unit = filter.chars().last()?;
    let amount: i64 = filter[..filter.len() - unit.len_utf8()].parse().ok()?;
    if amount < 0 {
        return None;
    }
    let span = match unit {
        'm' => Duration::try_minutes(amount)?,
        'h' => Duration::try_hours(amount)?,
        'd' => Duration::try_days(amount)?,
        'w' => Duration::try_weeks(amount)?,
        _ => return None,
    };
    now.checked_sub_signed(span)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 15, 12, 30, 0).unwrap()
    }

    #[test]
    fn test_parse_time_filter() {
        let now = now();
        assert_eq!(parse_time_filter_at("1h", now).unwrap(), now - Duration::hours(1));
        assert_eq!(parse_time_filter_at("2d", now).unwrap(), now - Duration::days(2));
        assert_eq!(parse_time_filter_at("30m", now).unwrap(), now - Duration::minutes(30));
        assert_eq!(parse_time_filter_at("1w", now).unwrap(), now - Duration::weeks(1));
        assert_eq!(
            parse_time_filter_at("today", now).unwrap(),
            Utc.with_ymd_and_hms(2024, 3, 15, 0, 0, 0).unwrap()
        );
        assert_eq!(
            parse_time_filter_at("Yesterday", now).unwrap(),
            Utc.with_ymd_and_hms(2024, 3, 14, 0, 0, 0).unwrap()
        );
        assert_eq!(
            parse_time_filter_at("2024-01-01", now).unwrap(),
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
        );
        assert_eq!(
            parse_time_filter_at("2024-01-01T10:00:00+02:00", now).unwrap(),
            Utc.with_ymd_and_hms(2024, 1, 1, 8, 0, 0).unwrap()
        );
        assert!(parse_time_filter_at("invalid", now).is_err());
        assert!(parse_time_filter_at("-3h", now).is_err());
        assert!(parse_time_filter_at("", now).is_err());
    }

    #[test]
    fn test_validation_rejects_contradictions() {
        let now = now();
        let inverted = SearchFilter::new().since(now).until(now - Duration::hours(1));
        assert!(matches!(inverted.validate(), Err(Error::InvalidFilter(_))));

        assert!(SearchFilter::new().limit(0).validate().is_err());
        assert!(SearchFilter::new().limit(MAX_LIMIT + 1).validate().is_err());
        assert!(SearchFilter::new().limit(MAX_LIMIT).validate().is_ok());
        assert!(SearchFilter::new().text("  --- ").validate().is_err());
        assert!(SearchFilter::new().tag(" ").validate().is_err());
        assert!(SearchFilter::new()
            .severity(Severity::Warning)
            .min_severity(Severity::Error)
            .validate()
            .is_err());
        assert!(SearchFilter::new()
            .severity(Severity::Critical)
            .min_severity(Severity::Error)
            .validate()
            .is_ok());
    }

    #[test]
    fn test_offset_beyond_sql_range_is_rejected() {
        let err = SearchFilter::new().offset(usize::MAX).validate().unwrap_err();
        assert!(matches!(err, Error::InvalidFilter(_)));
        assert!(SearchFilter::new().offset(i64::MAX as usize).validate().is_ok());
        assert!(SearchFilter::new().offset(0).validate().is_ok());
    }

    #[test]
    fn test_tokenize_strips_query_syntax() {
        assert_eq!(
            tokenize("\"database\" timeout* OR NEAR(x)"),
            vec!["database", "timeout", "or", "near", "x"]
        );
        assert!(tokenize("!!!").is_empty());
    }

    #[test]
    fn test_text_query_shapes() {
        let filter = SearchFilter::new().text("Database timeout");
        let q = filter.text_query(true).unwrap();
        assert_eq!(q.terms, "\"database\" \"timeout\"*");
        assert_eq!(q.phrase, "\"database timeout\"");

        let q = filter.text_query(false).unwrap();
        assert_eq!(q.terms, "\"database\" \"timeout\"");
    }
}
