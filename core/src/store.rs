//! Embedded, indexed diagnosis store
//!
//! A single SQLite database holds the records and their FTS5 index. All
//! mutations go through one writer connection behind a mutex and commit in
//! a single transaction, so readers see a record together with its index
//! entry or not at all. File stores run in WAL mode and give every read its
//! own connection; in-memory stores read through the writer.

use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Duration, TimeZone, Utc};
use rusqlite::{params, Connection, OpenFlags, Row, ToSql, Transaction};
use tracing::{debug, info};

use crate::config::{Config, SearchConfig};
use crate::error::{Error, Result};
use crate::filter::SearchFilter;
use crate::fingerprint::{diagnosis_id, is_valid_id};
use crate::schema::{init_schema, FtsOptions};
use crate::types::{Diagnosis, IngestionSource, Language, Severity, StoreStats};

const BUSY_TIMEOUT_MS: u64 = 5_000;

/// How often a running search looks at its cancel token
const CANCEL_POLL: std::time::Duration = std::time::Duration::from_millis(5);

const COLUMNS: &str = "d.id, d.timestamp, d.original_text, d.rendered_text, d.summary, d.tags,
    d.severity, d.language, d.error_kind, d.confidence, d.context, d.project_name,
    d.source_file, d.ingestion_source, d.created_at";

/// BM25 column weights: rendered_text, tags, summary, source_file
const BM25_WEIGHTS: &str = "1.0, 2.0, 3.0, 1.0";

/// Cooperative cancellation flag for long searches.
///
/// Clones share the flag; cancelling any clone cancels them all.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// A connection usable for reads.
enum ReadConn<'a> {
    Owned(Connection),
    Shared(MutexGuard<'a, Connection>),
}

impl Deref for ReadConn<'_> {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        match self {
            ReadConn::Owned(conn) => conn,
            ReadConn::Shared(guard) => &**guard,
        }
    }
}

/// The diagnosis store.
pub struct LogStore {
    writer: Mutex<Connection>,
    path: Option<PathBuf>,
    search: SearchConfig,
}

impl std::fmt::Debug for LogStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogStore")
            .field("path", &self.path)
            .field("search", &self.search)
            .finish()
    }
}

impl LogStore {
    /// Open or create a store at `path` with default search options.
    pub fn open(path: &Path) -> Result<Self> {
        Self::open_with(path, &SearchConfig::default())
    }

    /// Open or create a store at `path`.
    ///
    /// # Errors
    /// Returns [`Error::StoreCorruption`] if the file is not a database or
    /// fails `PRAGMA quick_check`.
    pub fn open_with(path: &Path, search: &SearchConfig) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path).map_err(Error::from_read)?;
        conn.busy_timeout(std::time::Duration::from_millis(BUSY_TIMEOUT_MS))?;
        conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get::<_, String>(0))
            .map_err(Error::from_read)?;
        conn.execute_batch("PRAGMA synchronous = NORMAL;")
            .map_err(Error::from_read)?;
        Self::init(conn, Some(path.to_path_buf()), search)
    }

    /// Open the store described by `config`.
    pub fn from_config(config: &Config) -> Result<Self> {
        Self::open_with(&config.store.resolved_path(), &config.search)
    }

    /// Create a private in-memory store.
    pub fn open_in_memory() -> Result<Self> {
        Self::open_in_memory_with(&SearchConfig::default())
    }

    pub fn open_in_memory_with(search: &SearchConfig) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init(conn, None, search)
    }

    fn init(conn: Connection, path: Option<PathBuf>, search: &SearchConfig) -> Result<Self> {
        quick_check(&conn)?;
        init_schema(
            &conn,
            &FtsOptions {
                prefix: search.prefix,
                porter: search.porter,
            },
        )
        .map_err(|e| match e {
            Error::Database(err) => Error::from_read(err),
            other => other,
        })?;
        debug!(
            "Opened diagnosis store at {}",
            path.as_deref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| ":memory:".to_string())
        );
        Ok(Self {
            writer: Mutex::new(conn),
            path,
            search: search.clone(),
        })
    }

    /// Database file path, `None` for in-memory stores.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub(crate) fn lock_writer(&self) -> MutexGuard<'_, Connection> {
        // A panic mid-transaction rolls the transaction back, so the
        // connection behind a poisoned lock is still consistent.
        self.writer.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn reader(&self) -> Result<ReadConn<'_>> {
        match &self.path {
            Some(path) => {
                let conn = Connection::open_with_flags(
                    path,
                    OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
                )
                .map_err(Error::from_read)?;
                conn.busy_timeout(std::time::Duration::from_millis(BUSY_TIMEOUT_MS))?;
                Ok(ReadConn::Owned(conn))
            }
            None => Ok(ReadConn::Shared(self.lock_writer())),
        }
    }

    /// Persist a diagnosis and index it, atomically.
    ///
    /// An empty `id` is derived from the record's content. Storing an id
    /// that already exists overwrites that record.
    ///
    /// # Returns
    /// The id the record was stored under.
    ///
    /// # Errors
    /// - [`Error::InvalidRecord`] for a malformed id
    /// - [`Error::StoreWriteFailed`] if the write fails; nothing is committed
    pub fn store(&self, diagnosis: &Diagnosis) -> Result<String> {
        let id = if diagnosis.id.is_empty() {
            diagnosis_id(&diagnosis.original_text, diagnosis.timestamp, &diagnosis.context)
        } else if is_valid_id(&diagnosis.id) {
            diagnosis.id.clone()
        } else {
            return Err(Error::InvalidRecord(format!(
                "id must be 64 lowercase hex characters, got {:?}",
                diagnosis.id
            )));
        };

        let tags_json = serde_json::to_string(&diagnosis.tags)?;
        let context_json = serde_json::to_string(&diagnosis.context)?;

        let mut conn = self.lock_writer();
        let tx = conn.transaction().map_err(Error::from_write)?;
        upsert(&tx, &id, diagnosis, &tags_json, &context_json).map_err(Error::from_write)?;
        tx.commit().map_err(Error::from_write)?;

        debug!("Stored diagnosis {}", id);
        Ok(id)
    }

    /// Search stored diagnoses.
    pub fn search(&self, filter: &SearchFilter) -> Result<Vec<Diagnosis>> {
        self.search_cancellable(filter, &CancelToken::new())
    }

    /// Search, stopping as soon as `cancel` fires.
    ///
    /// Cancellation interrupts the running statement, including the sort
    /// and ranking work done before the first row is produced.
    ///
    /// Without a text query results are newest first. With one, exact
    /// phrase hits come first, then BM25 relevance, then newest first.
    ///
    /// # Errors
    /// - [`Error::InvalidFilter`] before touching the store
    /// - [`Error::Cancelled`] once `cancel` fires
    pub fn search_cancellable(
        &self,
        filter: &SearchFilter,
        cancel: &CancelToken,
    ) -> Result<Vec<Diagnosis>> {
        filter.validate()?;
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let (sql, params) = build_search(filter, &self.search);
        debug!("Search: {} with {} params", sql, params.len());

        let conn = self.reader()?;
        interruptible(&conn, cancel, |conn| {
            let mut stmt = conn.prepare(&sql).map_err(Error::from_read)?;
            let param_refs: Vec<&dyn ToSql> = params.iter().map(|p| p.as_ref()).collect();
            let mut rows = stmt.query(param_refs.as_slice()).map_err(Error::from_read)?;

            let mut results = Vec::new();
            while let Some(row) = rows.next().map_err(Error::from_read)? {
                if cancel.is_cancelled() {
                    return Err(Error::Cancelled);
                }
                results.push(row_to_diagnosis(row)?);
            }
            Ok(results)
        })
    }

    /// Fetch one diagnosis by id.
    pub fn get(&self, id: &str) -> Result<Option<Diagnosis>> {
        let conn = self.reader()?;
        let sql = format!("SELECT {} FROM diagnoses d WHERE d.id = ?1", COLUMNS);
        let mut stmt = conn.prepare(&sql).map_err(Error::from_read)?;
        let mut rows = stmt.query([id]).map_err(Error::from_read)?;
        let found = match rows.next().map_err(Error::from_read)? {
            Some(row) => Some(row_to_diagnosis(row)?),
            None => None,
        };
        Ok(found)
    }

    /// Number of stored diagnoses.
    pub fn count(&self) -> Result<u64> {
        let conn = self.reader()?;
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM diagnoses", [], |row| row.get(0))
            .map_err(Error::from_read)?;
        Ok(count as u64)
    }

    /// Aggregate counts over the store.
    pub fn statistics(&self) -> Result<StoreStats> {
        self.statistics_at(Utc::now())
    }

    /// [`statistics`](Self::statistics) with the time windows anchored at `now`.
    pub fn statistics_at(&self, now: DateTime<Utc>) -> Result<StoreStats> {
        let conn = self.reader()?;
        stats(&conn, now)
    }

    /// Full integrity check of the records and the full-text index.
    ///
    /// # Errors
    /// Returns [`Error::StoreCorruption`] on any reported problem. Nothing
    /// is repaired.
    pub fn verify_integrity(&self) -> Result<()> {
        let conn = self.lock_writer();
        let mut stmt = conn
            .prepare("PRAGMA integrity_check")
            .map_err(Error::from_read)?;
        let problems = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(Error::from_read)?
            .collect::<rusqlite::Result<Vec<String>>>()
            .map_err(Error::from_read)?;
        drop(stmt);
        if problems != ["ok"] {
            return Err(Error::StoreCorruption(problems.join("; ")));
        }

        conn.execute(
            "INSERT INTO diagnoses_fts(diagnoses_fts, rank) VALUES ('integrity-check', 1)",
            [],
        )
        .map_err(|e| Error::StoreCorruption(format!("full-text index: {}", e)))?;

        let orphans: i64 = conn
            .query_row(
                "SELECT (SELECT COUNT(*) FROM diagnoses) - (SELECT COUNT(*) FROM diagnoses_fts)",
                [],
                |row| row.get(0),
            )
            .map_err(Error::from_read)?;
        if orphans != 0 {
            return Err(Error::StoreCorruption(format!(
                "{} records out of step with the full-text index",
                orphans
            )));
        }

        info!("Integrity check passed");
        Ok(())
    }

    /// Current database size in bytes.
    pub(crate) fn size_bytes(conn: &Connection) -> Result<u64> {
        let pages: i64 = conn.query_row("PRAGMA page_count", [], |row| row.get(0))?;
        let page_size: i64 = conn.query_row("PRAGMA page_size", [], |row| row.get(0))?;
        Ok((pages * page_size) as u64)
    }
}

/// Run `work` on `conn` while a watcher thread interrupts whatever
/// statement is running once `cancel` fires.
fn interruptible<T>(
    conn: &Connection,
    cancel: &CancelToken,
    work: impl FnOnce(&Connection) -> Result<T>,
) -> Result<T> {
    let interrupt = conn.get_interrupt_handle();
    let finished = AtomicBool::new(false);

    std::thread::scope(|s| {
        let watcher = s.spawn(|| {
            // Keeps interrupting: a call made before a statement starts is a no-op
            while !finished.load(Ordering::SeqCst) {
                if cancel.is_cancelled() {
                    interrupt.interrupt();
                }
                std::thread::park_timeout(CANCEL_POLL);
            }
        });

        let outcome = work(conn);
        finished.store(true, Ordering::SeqCst);
        watcher.thread().unpark();

        match outcome {
            Err(_) if cancel.is_cancelled() => Err(Error::Cancelled),
            other => other,
        }
    })
}

fn quick_check(conn: &Connection) -> Result<()> {
    let result: String = conn
        .query_row("PRAGMA quick_check", [], |row| row.get(0))
        .map_err(|e| Error::StoreCorruption(e.to_string()))?;
    if result != "ok" {
        return Err(Error::StoreCorruption(result));
    }
    Ok(())
}

fn upsert(
    tx: &Transaction<'_>,
    id: &str,
    d: &Diagnosis,
    tags_json: &str,
    context_json: &str,
) -> rusqlite::Result<()> {
    let seq: i64 = tx.query_row(
        "INSERT INTO diagnoses (
            id, timestamp, original_text, rendered_text, summary, tags, severity,
            language, error_kind, confidence, context, project_name, source_file,
            ingestion_source, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
        ON CONFLICT(id) DO UPDATE SET
            timestamp = excluded.timestamp,
            original_text = excluded.original_text,
            rendered_text = excluded.rendered_text,
            summary = excluded.summary,
            tags = excluded.tags,
            severity = excluded.severity,
            language = excluded.language,
            error_kind = excluded.error_kind,
            confidence = excluded.confidence,
            context = excluded.context,
            project_name = excluded.project_name,
            source_file = excluded.source_file,
            ingestion_source = excluded.ingestion_source
        RETURNING seq",
        params![
            id,
            d.timestamp.timestamp_millis(),
            d.original_text,
            d.rendered_text,
            d.summary,
            tags_json,
            d.severity.as_str(),
            d.language.as_str(),
            d.error_kind,
            d.confidence.map(f64::from),
            context_json,
            d.project_name,
            d.source_file,
            d.ingestion_source.as_str(),
            Utc::now().timestamp_millis(),
        ],
        |row| row.get(0),
    )?;

    tx.execute("DELETE FROM diagnoses_fts WHERE rowid = ?1", [seq])?;
    tx.execute(
        "INSERT INTO diagnoses_fts (rowid, rendered_text, tags, summary, source_file)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            seq,
            d.rendered_text,
            d.tags.join(" "),
            d.summary.as_deref().unwrap_or(""),
            d.source_file.as_deref().unwrap_or(""),
        ],
    )?;
    Ok(())
}

/// Build the search statement and its positional parameters.
fn build_search(filter: &SearchFilter, search: &SearchConfig) -> (String, Vec<Box<dyn ToSql>>) {
    let text = filter.text_query(search.prefix);
    let mut params: Vec<Box<dyn ToSql>> = Vec::new();

    let mut sql = match &text {
        Some(q) => {
            params.push(Box::new(q.terms.clone()));
            format!(
                "SELECT {} FROM diagnoses_fts JOIN diagnoses d ON d.seq = diagnoses_fts.rowid
                 WHERE diagnoses_fts MATCH ?",
                COLUMNS
            )
        }
        None => format!("SELECT {} FROM diagnoses d WHERE 1=1", COLUMNS),
    };

    if let Some(since) = filter.since {
        sql.push_str(" AND d.timestamp >= ?");
        params.push(Box::new(since.timestamp_millis()));
    }
    if let Some(until) = filter.until {
        sql.push_str(" AND d.timestamp <= ?");
        params.push(Box::new(until.timestamp_millis()));
    }
    if let Some(severity) = filter.severity {
        sql.push_str(" AND d.severity = ?");
        params.push(Box::new(severity.as_str()));
    }
    if let Some(min) = filter.min_severity {
        let allowed: Vec<&'static str> = Severity::ALL
            .iter()
            .filter(|s| **s >= min)
            .map(|s| s.as_str())
            .collect();
        sql.push_str(&format!(
            " AND d.severity IN ({})",
            vec!["?"; allowed.len()].join(", ")
        ));
        for s in allowed {
            params.push(Box::new(s));
        }
    }
    if let Some(language) = filter.language {
        sql.push_str(" AND d.language = ?");
        params.push(Box::new(language.as_str()));
    }
    if let Some(project) = &filter.project_name {
        sql.push_str(" AND d.project_name = ?");
        params.push(Box::new(project.clone()));
    }
    for tag in &filter.tags {
        sql.push_str(" AND EXISTS (SELECT 1 FROM json_each(d.tags) WHERE json_each.value = ?)");
        params.push(Box::new(tag.clone()));
    }

    match &text {
        Some(q) => {
            sql.push_str(&format!(
                " ORDER BY (d.seq IN (SELECT rowid FROM diagnoses_fts WHERE diagnoses_fts MATCH ?)) DESC,
                  bm25(diagnoses_fts, {}) ASC, d.timestamp DESC, d.id ASC",
                BM25_WEIGHTS
            ));
            params.push(Box::new(q.phrase.clone()));
        }
        None => sql.push_str(" ORDER BY d.timestamp DESC, d.id ASC"),
    }

    sql.push_str(" LIMIT ? OFFSET ?");
    params.push(Box::new(filter.limit.unwrap_or(search.default_limit) as i64));
    params.push(Box::new(i64::try_from(filter.offset).unwrap_or(i64::MAX)));

    (sql, params)
}

fn millis_to_utc(ms: i64) -> Result<DateTime<Utc>> {
    Utc.timestamp_millis_opt(ms)
        .single()
        .ok_or_else(|| Error::InvalidRecord(format!("timestamp out of range: {}", ms)))
}

fn row_to_diagnosis(row: &Row<'_>) -> Result<Diagnosis> {
    let severity: String = row.get(6)?;
    let language: String = row.get(7)?;
    let source: String = row.get(13)?;
    let tags: String = row.get(5)?;
    let context: String = row.get(10)?;
    let confidence: Option<f64> = row.get(9)?;

    Ok(Diagnosis {
        id: row.get(0)?,
        timestamp: millis_to_utc(row.get(1)?)?,
        original_text: row.get(2)?,
        rendered_text: row.get(3)?,
        summary: row.get(4)?,
        tags: serde_json::from_str(&tags)?,
        severity: Severity::parse(&severity)
            .ok_or_else(|| Error::InvalidRecord(format!("unknown severity {:?}", severity)))?,
        language: Language::parse(&language).unwrap_or(Language::Unknown),
        error_kind: row.get(8)?,
        confidence: confidence.map(|c| c as f32),
        context: serde_json::from_str(&context)?,
        project_name: row.get(11)?,
        source_file: row.get(12)?,
        ingestion_source: IngestionSource::parse(&source).unwrap_or_default(),
        created_at: Some(millis_to_utc(row.get(14)?)?),
    })
}

fn stats(conn: &Connection, now: DateTime<Utc>) -> Result<StoreStats> {
    let total: i64 = conn.query_row("SELECT COUNT(*) FROM diagnoses", [], |row| row.get(0))?;

    let grouped = |column: &str| -> rusqlite::Result<Vec<(String, u64)>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {0}, COUNT(*) FROM diagnoses GROUP BY {0} ORDER BY {0}",
            column
        ))?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as u64))
        })?;
        rows.collect()
    };

    let since = |span: Duration| -> rusqlite::Result<u64> {
        let n: i64 = conn.query_row(
            "SELECT COUNT(*) FROM diagnoses WHERE timestamp >= ?1",
            [(now - span).timestamp_millis()],
            |row| row.get(0),
        )?;
        Ok(n as u64)
    };

    let (oldest, newest): (Option<i64>, Option<i64>) = conn.query_row(
        "SELECT MIN(timestamp), MAX(timestamp) FROM diagnoses",
        [],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;

    Ok(StoreStats {
        total: total as u64,
        by_severity: grouped("severity")?.into_iter().collect(),
        by_language: grouped("language")?.into_iter().collect(),
        last_hour: since(Duration::hours(1))?,
        last_day: since(Duration::days(1))?,
        last_week: since(Duration::weeks(1))?,
        oldest: oldest.map(millis_to_utc).transpose()?,
        newest: newest.map(millis_to_utc).transpose()?,
    })
}

/// Look up a record's insertion sequence number.
#[cfg(test)]
fn seq_of(conn: &Connection, id: &str) -> Option<i64> {
    use rusqlite::OptionalExtension;
    conn.query_row("SELECT seq FROM diagnoses WHERE id = ?1", [id], |row| row.get(0))
        .optional()
        .ok()
        .flatten()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ContextBundle;

    fn at(ms: i64) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(ms).unwrap()
    }

    fn diagnosis(text: &str, ts: DateTime<Utc>) -> Diagnosis {
        Diagnosis {
            id: String::new(),
            timestamp: ts,
            original_text: text.to_string(),
            rendered_text: format!("[ERROR] {}\n\n{}\n", text, text),
            summary: Some(text.to_string()),
            tags: vec!["python".into(), "keyerror".into()],
            severity: Severity::Error,
            language: Language::Python,
            error_kind: Some("missing-key".into()),
            confidence: Some(0.66),
            context: ContextBundle::default(),
            project_name: Some("billing".into()),
            source_file: Some("app/jobs.py".into()),
            ingestion_source: IngestionSource::Cli,
            created_at: None,
        }
    }

    #[test]
    fn test_store_and_get_round_trip() {
        let store = LogStore::open_in_memory().unwrap();
        let d = diagnosis("KeyError: 'user_id'", at(1_700_000_000_123));

        let id = store.store(&d).unwrap();
        assert_eq!(id.len(), 64);

        let fetched = store.get(&id).unwrap().unwrap();
        assert_eq!(fetched.id, id);
        assert_eq!(fetched.timestamp, d.timestamp);
        assert_eq!(fetched.tags, d.tags);
        assert_eq!(fetched.confidence, d.confidence);
        assert_eq!(fetched.ingestion_source, IngestionSource::Cli);
        assert!(fetched.created_at.is_some());
        assert!(store.get(&"0".repeat(64)).unwrap().is_none());
    }

    #[test]
    fn test_duplicate_id_overwrites() {
        let store = LogStore::open_in_memory().unwrap();
        let mut d = diagnosis("KeyError: 'a'", at(1_700_000_000_000));
        let id = store.store(&d).unwrap();
        let seq = seq_of(&store.lock_writer(), &id);

        d.id = id.clone();
        d.summary = Some("updated summary".into());
        assert_eq!(store.store(&d).unwrap(), id);

        assert_eq!(store.count().unwrap(), 1);
        assert_eq!(seq_of(&store.lock_writer(), &id), seq);
        let hits = store.search(&SearchFilter::new().text("updated")).unwrap();
        assert_eq!(hits.len(), 1);
        store.verify_integrity().unwrap();
    }

    #[test]
    fn test_malformed_id_is_rejected() {
        let store = LogStore::open_in_memory().unwrap();
        let mut d = diagnosis("x", at(0));
        d.id = "not-an-id".into();
        assert!(matches!(store.store(&d), Err(Error::InvalidRecord(_))));
        assert_eq!(store.count().unwrap(), 0);
    }

    #[test]
    fn test_search_orders_newest_first() {
        let store = LogStore::open_in_memory().unwrap();
        for (i, ts) in [3_000, 1_000, 2_000].iter().enumerate() {
            store
                .store(&diagnosis(&format!("ValueError: {}", i), at(*ts)))
                .unwrap();
        }
        let all = store.search(&SearchFilter::new()).unwrap();
        let stamps: Vec<i64> = all.iter().map(|d| d.timestamp.timestamp_millis()).collect();
        assert_eq!(stamps, vec![3_000, 2_000, 1_000]);

        let page = store.search(&SearchFilter::new().limit(1).offset(1)).unwrap();
        assert_eq!(page[0].timestamp.timestamp_millis(), 2_000);
    }

    #[test]
    fn test_search_filters() {
        let store = LogStore::open_in_memory().unwrap();
        let mut a = diagnosis("KeyError: 'a'", at(1_000));
        a.severity = Severity::Critical;
        let mut b = diagnosis("KeyError: 'b'", at(2_000));
        b.language = Language::Java;
        b.project_name = Some("orders".into());
        b.tags = vec!["java".into(), "nullpointerexception".into()];
        store.store(&a).unwrap();
        store.store(&b).unwrap();

        let found = store
            .search(&SearchFilter::new().min_severity(Severity::Critical))
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].original_text, "KeyError: 'a'");

        let found = store.search(&SearchFilter::new().project("orders")).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].language, Language::Java);

        let found = store
            .search(&SearchFilter::new().tag("java").tag("nullpointerexception"))
            .unwrap();
        assert_eq!(found.len(), 1);
        assert!(store
            .search(&SearchFilter::new().tag("java").tag("keyerror"))
            .unwrap()
            .is_empty());

        let found = store
            .search(&SearchFilter::new().since(at(1_500)).until(at(2_000)))
            .unwrap();
        assert_eq!(found.len(), 1);
    }

    #[test]
    fn test_prefix_search() {
        let store = LogStore::open_in_memory().unwrap();
        store.store(&diagnosis("ConnectionRefusedError: db", at(1))).unwrap();

        let found = store.search(&SearchFilter::new().text("connectionref")).unwrap();
        assert_eq!(found.len(), 1);

        let strict = LogStore::open_in_memory_with(&SearchConfig {
            prefix: false,
            ..Default::default()
        })
        .unwrap();
        strict.store(&diagnosis("ConnectionRefusedError: db", at(1))).unwrap();
        assert!(strict
            .search(&SearchFilter::new().text("connectionref"))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_invalid_filter_rejected() {
        let store = LogStore::open_in_memory().unwrap();
        assert!(matches!(
            store.search(&SearchFilter::new().limit(0)),
            Err(Error::InvalidFilter(_))
        ));
    }

    #[test]
    fn test_huge_offset_is_rejected_not_wrapped() {
        let store = LogStore::open_in_memory().unwrap();
        store.store(&diagnosis("KeyError: 'a'", at(1))).unwrap();
        assert!(matches!(
            store.search(&SearchFilter::new().offset(usize::MAX)),
            Err(Error::InvalidFilter(_))
        ));
        let past_end = store.search(&SearchFilter::new().offset(i64::MAX as usize)).unwrap();
        assert!(past_end.is_empty());
    }

    #[test]
    fn test_cancelled_search() {
        let store = LogStore::open_in_memory().unwrap();
        store.store(&diagnosis("KeyError: 'a'", at(1))).unwrap();
        let token = CancelToken::new();
        token.cancel();
        assert!(matches!(
            store.search_cancellable(&SearchFilter::new(), &token),
            Err(Error::Cancelled)
        ));
    }

    /// Counts to 200 million before producing its only row
    const SLOW_QUERY: &str = "WITH RECURSIVE c(x) AS (SELECT 1 UNION ALL SELECT x + 1 FROM c WHERE x < 200000000)
        SELECT count(*) FROM c";

    #[test]
    fn test_cancel_interrupts_statement_before_first_row() {
        let store = LogStore::open_in_memory().unwrap();
        store.store(&diagnosis("KeyError: 'a'", at(1))).unwrap();
        let token = CancelToken::new();

        let conn = store.reader().unwrap();
        let started = std::time::Instant::now();
        let result = interruptible(&conn, &token, |conn| {
            token.cancel();
            conn.query_row(SLOW_QUERY, [], |row| row.get::<_, i64>(0))
                .map_err(Error::from_read)
        });
        drop(conn);

        assert!(matches!(result, Err(Error::Cancelled)));
        assert!(started.elapsed() < std::time::Duration::from_secs(5));

        // The interrupted connection keeps working
        assert_eq!(store.count().unwrap(), 1);
        assert_eq!(store.search(&SearchFilter::new()).unwrap().len(), 1);
    }

    #[test]
    fn test_uncancelled_work_is_not_interrupted() {
        let store = LogStore::open_in_memory().unwrap();
        let token = CancelToken::new();
        let conn = store.reader().unwrap();
        let n = interruptible(&conn, &token, |conn| {
            conn.query_row("SELECT 41 + 1", [], |row| row.get::<_, i64>(0))
                .map_err(Error::from_read)
        })
        .unwrap();
        assert_eq!(n, 42);
    }

    #[test]
    fn test_statistics() {
        let store = LogStore::open_in_memory().unwrap();
        let now = at(10 * 24 * 3_600_000);
        let mut old = diagnosis("KeyError: 'old'", now - Duration::days(3));
        old.severity = Severity::Warning;
        store.store(&old).unwrap();
        store
            .store(&diagnosis("KeyError: 'new'", now - Duration::minutes(5)))
            .unwrap();

        let stats = store.statistics_at(now).unwrap();
        assert_eq!(stats.total, 2);
        assert_eq!(stats.by_severity.get("error"), Some(&1));
        assert_eq!(stats.by_severity.get("warning"), Some(&1));
        assert_eq!(stats.by_language.get("python"), Some(&2));
        assert_eq!(stats.last_hour, 1);
        assert_eq!(stats.last_day, 1);
        assert_eq!(stats.last_week, 2);
        assert_eq!(stats.oldest, Some(now - Duration::days(3)));
        assert_eq!(stats.newest, Some(now - Duration::minutes(5)));

        let empty = LogStore::open_in_memory().unwrap().statistics().unwrap();
        assert_eq!(empty.total, 0);
        assert!(empty.oldest.is_none());
    }

    #[test]
    fn test_file_store_reopens_and_checks() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("nested/store.db");
        let id = {
            let store = LogStore::open(&path).unwrap();
            store.store(&diagnosis("KeyError: 'a'", at(1))).unwrap()
        };
        let store = LogStore::open(&path).unwrap();
        assert!(store.get(&id).unwrap().is_some());
        store.verify_integrity().unwrap();
    }

    #[test]
    fn test_garbage_file_is_corruption() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("junk.db");
        std::fs::write(&path, vec![0x42u8; 8192]).unwrap();
        assert!(matches!(LogStore::open(&path), Err(Error::StoreCorruption(_))));
    }
}
