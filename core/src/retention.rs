//! Retention sweeps and store compaction
//!
//! A sweep deletes records older than the policy's age limit, then the
//! oldest records above its count cap, together with their index entries,
//! in one transaction. Compaction reclaims the space afterwards and is run
//! separately.

use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use rusqlite::{params, Transaction};
use serde::Deserialize;
use tracing::info;

use crate::error::{Error, Result};
use crate::store::LogStore;
use crate::types::CompactionReport;

const DAY: Duration = Duration::from_secs(24 * 60 * 60);

/// Service tier, selecting default retention limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    #[default]
    Free,
    Pro,
    Enterprise,
}

/// How long and how many diagnoses to keep.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetentionPolicy {
    /// Records older than this are swept
    pub max_age: Duration,
    /// Newest records kept when set
    pub max_record_count: Option<u64>,
    pub tier: Tier,
}

impl RetentionPolicy {
    /// Default limits for a tier.
    ///
    /// | tier       | age      | records |
    /// |------------|----------|---------|
    /// | free       | 7 days   | 1,000   |
    /// | pro        | 30 days  | 50,000  |
    /// | enterprise | 365 days | no cap  |
    pub fn for_tier(tier: Tier) -> Self {
        let (days, cap) = match tier {
            Tier::Free => (7, Some(1_000)),
            Tier::Pro => (30, Some(50_000)),
            Tier::Enterprise => (365, None),
        };
        Self {
            max_age: DAY * days,
            max_record_count: cap,
            tier,
        }
    }
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self::for_tier(Tier::default())
    }
}

/// Applies retention policies to a [`LogStore`].
#[derive(Debug, Clone, Copy)]
pub struct RetentionManager<'a> {
    store: &'a LogStore,
}

impl<'a> RetentionManager<'a> {
    pub fn new(store: &'a LogStore) -> Self {
        Self { store }
    }

    /// Sweep relative to the current time.
    pub fn sweep(&self, policy: &RetentionPolicy) -> Result<u64> {
        self.sweep_at(policy, Utc::now())
    }

    /// Delete records outside `policy` as of `now`.
    ///
    /// Age is applied first, then the count cap removes the oldest
    /// survivors (by timestamp, then insertion order). Readers see either
    /// every deletion or none.
    ///
    /// # Returns
    /// Number of records deleted.
    ///
    /// # Errors
    /// Returns [`Error::StoreWriteFailed`] if the transaction fails; nothing
    /// is deleted in that case.
    pub fn sweep_at(&self, policy: &RetentionPolicy, now: DateTime<Utc>) -> Result<u64> {
        let cutoff = chrono::Duration::from_std(policy.max_age)
            .ok()
            .and_then(|age| now.checked_sub_signed(age))
            .map(|ts| ts.timestamp_millis());

        let mut conn = self.store.lock_writer();
        let tx = conn.transaction().map_err(Error::from_write)?;
        let (expired, excess) =
            sweep_tx(&tx, cutoff, policy.max_record_count).map_err(Error::from_write)?;
        tx.commit().map_err(Error::from_write)?;

        let deleted = expired + excess;
        info!(
            "Retention sweep ({:?} tier): {} expired, {} over cap",
            policy.tier, expired, excess
        );
        Ok(deleted)
    }

    /// Reclaim space and refresh planner statistics.
    ///
    /// Merges the full-text index segments, vacuums, analyzes and truncates
    /// the write-ahead log.
    pub fn compact(&self) -> Result<CompactionReport> {
        let start = Instant::now();
        let conn = self.store.lock_writer();

        let size_before = LogStore::size_bytes(&conn)?;
        conn.execute_batch(
            "INSERT INTO diagnoses_fts(diagnoses_fts) VALUES ('optimize');
             VACUUM;
             ANALYZE;",
        )
        .map_err(Error::from_write)?;
        if self.store.path().is_some() {
            conn.query_row("PRAGMA wal_checkpoint(TRUNCATE)", [], |_| Ok(()))
                .map_err(Error::from_write)?;
        }
        let size_after = LogStore::size_bytes(&conn)?;

        let report = CompactionReport {
            size_before,
            size_after,
            duration_ms: start.elapsed().as_millis() as u64,
        };
        info!(
            "Compacted store: {} -> {} bytes in {} ms",
            report.size_before, report.size_after, report.duration_ms
        );
        Ok(report)
    }
}

fn sweep_tx(
    tx: &Transaction<'_>,
    cutoff: Option<i64>,
    cap: Option<u64>,
) -> rusqlite::Result<(u64, u64)> {
    let mut expired = 0;
    if let Some(cutoff) = cutoff {
        tx.execute(
            "DELETE FROM diagnoses_fts WHERE rowid IN
                (SELECT seq FROM diagnoses WHERE timestamp < ?1)",
            [cutoff],
        )?;
        expired = tx.execute("DELETE FROM diagnoses WHERE timestamp < ?1", [cutoff])? as u64;
    }

    let mut excess = 0;
    if let Some(cap) = cap {
        let count: i64 = tx.query_row("SELECT COUNT(*) FROM diagnoses", [], |row| row.get(0))?;
        let over = (count as u64).saturating_sub(cap);
        if over > 0 {
            let oldest = "SELECT seq FROM diagnoses ORDER BY timestamp ASC, seq ASC LIMIT ?1";
            tx.execute(
                &format!("DELETE FROM diagnoses_fts WHERE rowid IN ({})", oldest),
                params![over as i64],
            )?;
            excess = tx.execute(
                &format!("DELETE FROM diagnoses WHERE seq IN ({})", oldest),
                params![over as i64],
            )? as u64;
        }
    }

    Ok((expired, excess))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::SearchFilter;
    use crate::types::{ContextBundle, Diagnosis, IngestionSource, Language, Severity};
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    fn record(text: &str, ts: DateTime<Utc>) -> Diagnosis {
        Diagnosis {
            id: String::new(),
            timestamp: ts,
            original_text: text.to_string(),
            rendered_text: text.to_string(),
            summary: None,
            tags: vec!["python".into()],
            severity: Severity::Error,
            language: Language::Python,
            error_kind: None,
            confidence: None,
            context: ContextBundle::default(),
            project_name: None,
            source_file: None,
            ingestion_source: IngestionSource::Api,
            created_at: None,
        }
    }

    fn fts_rows(store: &LogStore) -> i64 {
        store
            .lock_writer()
            .query_row("SELECT COUNT(*) FROM diagnoses_fts", [], |row| row.get(0))
            .unwrap()
    }

    #[test]
    fn test_tier_defaults() {
        let free = RetentionPolicy::for_tier(Tier::Free);
        assert_eq!(free.max_age, DAY * 7);
        assert_eq!(free.max_record_count, Some(1_000));
        assert_eq!(RetentionPolicy::for_tier(Tier::Pro).max_record_count, Some(50_000));
        let enterprise = RetentionPolicy::for_tier(Tier::Enterprise);
        assert_eq!(enterprise.max_age, DAY * 365);
        assert!(enterprise.max_record_count.is_none());
        assert_eq!(RetentionPolicy::default().tier, Tier::Free);
    }

    #[test]
    fn test_sweep_by_age() {
        let store = LogStore::open_in_memory().unwrap();
        store.store(&record("old", now() - chrono::Duration::days(10))).unwrap();
        store.store(&record("fresh", now() - chrono::Duration::days(1))).unwrap();

        let deleted = RetentionManager::new(&store)
            .sweep_at(&RetentionPolicy::for_tier(Tier::Free), now())
            .unwrap();

        assert_eq!(deleted, 1);
        assert_eq!(store.count().unwrap(), 1);
        assert_eq!(fts_rows(&store), 1);
        assert!(store.search(&SearchFilter::new().text("old")).unwrap().is_empty());
    }

    #[test]
    fn test_sweep_by_count_keeps_newest() {
        let store = LogStore::open_in_memory().unwrap();
        for i in 0..5 {
            store
                .store(&record(&format!("r{}", i), now() - chrono::Duration::minutes(10 - i)))
                .unwrap();
        }
        let policy = RetentionPolicy {
            max_age: DAY,
            max_record_count: Some(2),
            tier: Tier::Pro,
        };

        let deleted = RetentionManager::new(&store).sweep_at(&policy, now()).unwrap();

        assert_eq!(deleted, 3);
        let left: Vec<String> = store
            .search(&SearchFilter::new())
            .unwrap()
            .into_iter()
            .map(|d| d.original_text)
            .collect();
        assert_eq!(left, vec!["r4", "r3"]);
        assert_eq!(fts_rows(&store), 2);
    }

    #[test]
    fn test_sweep_count_ties_break_by_insertion_order() {
        let store = LogStore::open_in_memory().unwrap();
        let ts = now() - chrono::Duration::minutes(1);
        store.store(&record("first", ts)).unwrap();
        store.store(&record("second", ts)).unwrap();
        let policy = RetentionPolicy {
            max_age: DAY,
            max_record_count: Some(1),
            tier: Tier::Free,
        };

        RetentionManager::new(&store).sweep_at(&policy, now()).unwrap();

        let left = store.search(&SearchFilter::new()).unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].original_text, "second");
    }

    #[test]
    fn test_unrepresentable_age_keeps_everything() {
        let store = LogStore::open_in_memory().unwrap();
        store.store(&record("ancient", now() - chrono::Duration::days(20_000))).unwrap();
        let policy = crate::config::RetentionConfig {
            max_age_days: Some(300_000_000_000_000),
            ..Default::default()
        }
        .policy();

        let deleted = RetentionManager::new(&store).sweep_at(&policy, now()).unwrap();

        assert_eq!(deleted, 0);
        assert_eq!(store.count().unwrap(), 1);
    }

    #[test]
    fn test_sweep_empty_store() {
        let store = LogStore::open_in_memory().unwrap();
        let deleted = RetentionManager::new(&store)
            .sweep(&RetentionPolicy::default())
            .unwrap();
        assert_eq!(deleted, 0);
    }

    #[test]
    fn test_compact_reports_sizes() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = LogStore::open(&dir.path().join("store.db")).unwrap();
        for i in 0..50 {
            store
                .store(&record(&format!("ValueError: {}", "x".repeat(i * 20)), now()))
                .unwrap();
        }
        let manager = RetentionManager::new(&store);
        manager
            .sweep_at(
                &RetentionPolicy {
                    max_age: DAY,
                    max_record_count: Some(1),
                    tier: Tier::Free,
                },
                now(),
            )
            .unwrap();

        let report = manager.compact().unwrap();
        assert!(report.size_after <= report.size_before);
        assert!(report.size_after > 0);
        assert_eq!(store.count().unwrap(), 1);
        store.verify_integrity().unwrap();
    }
}
