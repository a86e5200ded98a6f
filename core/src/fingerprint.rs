//! Content fingerprinting for diagnosis identifiers
//!
//! A diagnosis id is the SHA-256 of three components, separated by a unit
//! separator byte:
//!
//! 1. **Text**: the original error text, line endings and trailing
//!    whitespace normalized
//! 2. **Timestamp**: RFC 3339 with millisecond precision, UTC
//! 3. **Context**: JSON serialization of the context bundle
//!
//! The same error analyzed at two different instants gets two ids; storing
//! the same diagnosis twice reuses one.

use chrono::{DateTime, SecondsFormat, Utc};
use sha2::{Digest, Sha256};

use crate::types::ContextBundle;

/// Length of a hex-encoded diagnosis id
pub const ID_LEN: usize = 64;

const SEPARATOR: &[u8] = b"\x1f";

/// Normalize text for consistent hashing.
///
/// Strips trailing whitespace per line, normalizes line endings and drops
/// trailing blank lines.
pub fn normalize_text(text: &str) -> String {
    let lines: Vec<&str> = text.lines().map(|line| line.trim_end()).collect();
    let end = lines
        .iter()
        .rposition(|l| !l.is_empty())
        .map(|i| i + 1)
        .unwrap_or(0);
    lines[..end].join("\n")
}

/// Hex SHA-256 of the serialized context bundle.
pub fn context_fingerprint(context: &ContextBundle) -> String {
    let canonical = serde_json::to_vec(context).unwrap_or_default();
    hex::encode(Sha256::digest(&canonical))
}

/// Derive the stable id of a diagnosis.
///
/// # Arguments
///
/// * `original_text` - Raw error text as submitted
/// * `timestamp` - Analysis time
/// * `context` - Extracted context bundle
///
/// # Returns
///
/// 64 lowercase hex characters
pub fn diagnosis_id(original_text: &str, timestamp: DateTime<Utc>, context: &ContextBundle) -> String {
    let mut hasher = Sha256::new();
    hasher.update(normalize_text(original_text).as_bytes());
    hasher.update(SEPARATOR);
    hasher.update(
        timestamp
            .to_rfc3339_opts(SecondsFormat::Millis, true)
            .as_bytes(),
    );
    hasher.update(SEPARATOR);
    hasher.update(context_fingerprint(context).as_bytes());
    hex::encode(hasher.finalize())
}

/// Whether `id` has the shape of a diagnosis id.
pub fn is_valid_id(id: &str) -> bool {
    id.len() == ID_LEN && id.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn at(ms: i64) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(ms).unwrap()
    }

    #[test]
    fn test_normalize_text() {
        assert_eq!(normalize_text("a  \r\nb\t\n\n\n"), "a\nb");
        assert_eq!(normalize_text("   \n"), "");
        assert_eq!(normalize_text("  keep leading"), "  keep leading");
    }

    #[test]
    fn test_id_is_deterministic_and_well_formed() {
        let ctx = ContextBundle::default();
        let a = diagnosis_id("KeyError: 'x'", at(1_700_000_000_000), &ctx);
        let b = diagnosis_id("KeyError: 'x'\n", at(1_700_000_000_000), &ctx);
        assert_eq!(a, b);
        assert!(is_valid_id(&a));
    }

    #[test]
    fn test_id_changes_with_each_component() {
        let ctx = ContextBundle::default();
        let t = at(1_700_000_000_000);
        let base = diagnosis_id("KeyError: 'x'", t, &ctx);

        assert_ne!(base, diagnosis_id("KeyError: 'y'", t, &ctx));
        assert_ne!(base, diagnosis_id("KeyError: 'x'", t + Duration::milliseconds(1), &ctx));

        let with_project = ContextBundle {
            project: Some(crate::types::ProjectContext {
                name: Some("svc".into()),
                language: crate::types::Language::Rust,
                framework: None,
                manifests: vec!["Cargo.toml".into()],
                dependencies: vec![],
                has_tests: false,
            }),
            ..Default::default()
        };
        assert_ne!(base, diagnosis_id("KeyError: 'x'", t, &with_project));
    }

    #[test]
    fn test_id_validation() {
        assert!(is_valid_id(&"a".repeat(64)));
        assert!(!is_valid_id(&"A".repeat(64)));
        assert!(!is_valid_id("abc"));
        assert!(!is_valid_id(&"g".repeat(64)));
    }
}
