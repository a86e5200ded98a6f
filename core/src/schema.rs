//! Database schema and migrations for the diagnosis store
//!
//! Manages the SQLite database with:
//! - diagnoses: One row per diagnosis, keyed by `seq` with a unique `id`
//! - diagnoses_fts: FTS5 index over rendered text, tags, summary and
//!   source file, sharing `rowid = seq` with its record

use rusqlite::Connection;

use crate::error::Result;

/// Current schema version
pub const SCHEMA_VERSION: i32 = 2;

/// Full-text tokenization options, fixed when the index is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FtsOptions {
    /// Build prefix indexes so trailing-prefix queries stay fast
    pub prefix: bool,
    /// Stem tokens with the porter stemmer
    pub porter: bool,
}

impl Default for FtsOptions {
    fn default() -> Self {
        Self {
            prefix: true,
            porter: false,
        }
    }
}

impl FtsOptions {
    fn table_options(&self) -> String {
        let tokenizer = if self.porter {
            "porter unicode61 remove_diacritics 2"
        } else {
            "unicode61 remove_diacritics 2"
        };
        let mut options = format!("tokenize = '{}'", tokenizer);
        if self.prefix {
            options.push_str(", prefix = '2 3'");
        }
        options
    }
}

/// Initialize or migrate the database schema
///
/// Each migration commits together with its version row, so a failed
/// migration leaves the previous version intact and is retried on the
/// next open.
pub fn init_schema(conn: &Connection, fts: &FtsOptions) -> Result<()> {
    let version = get_schema_version(conn)?;

    if version < 1 {
        migrate_v1(conn)?;
    }
    if version < 2 {
        migrate_v2(conn, fts)?;
    }

    Ok(())
}

pub fn get_schema_version(conn: &Connection) -> Result<i32> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (version INTEGER PRIMARY KEY)",
        [],
    )?;

    let version: i32 = conn
        .query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |row| {
            row.get(0)
        })?;

    Ok(version)
}

fn set_schema_version(conn: &Connection, version: i32) -> Result<()> {
    conn.execute("INSERT INTO schema_version (version) VALUES (?1)", [version])?;
    Ok(())
}

/// V1: Diagnosis records and their filter indexes
fn migrate_v1(conn: &Connection) -> Result<()> {
    let tx = conn.unchecked_transaction()?;
    tx.execute_batch(
        "CREATE TABLE IF NOT EXISTS diagnoses (
            seq INTEGER PRIMARY KEY AUTOINCREMENT,
            id TEXT NOT NULL UNIQUE,
            timestamp INTEGER NOT NULL,
            original_text TEXT NOT NULL,
            rendered_text TEXT NOT NULL,
            summary TEXT,
            tags TEXT NOT NULL DEFAULT '[]',
            severity TEXT NOT NULL,
            language TEXT NOT NULL,
            error_kind TEXT,
            confidence REAL,
            context TEXT NOT NULL DEFAULT '{}',
            project_name TEXT,
            source_file TEXT,
            ingestion_source TEXT NOT NULL DEFAULT 'api',
            created_at INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_diagnoses_timestamp ON diagnoses(timestamp DESC);
        CREATE INDEX IF NOT EXISTS idx_diagnoses_severity ON diagnoses(severity, timestamp DESC);
        CREATE INDEX IF NOT EXISTS idx_diagnoses_language ON diagnoses(language, timestamp DESC);
        CREATE INDEX IF NOT EXISTS idx_diagnoses_project ON diagnoses(project_name, timestamp DESC);",
    )?;

    set_schema_version(&tx, 1)?;
    tx.commit()?;
    Ok(())
}

/// V2: Full-text index over diagnoses
fn migrate_v2(conn: &Connection, fts: &FtsOptions) -> Result<()> {
    let tx = conn.unchecked_transaction()?;
    tx.execute_batch(&format!(
        "CREATE VIRTUAL TABLE IF NOT EXISTS diagnoses_fts USING fts5(
            rendered_text,
            tags,
            summary,
            source_file,
            {}
        );

        -- Index records written before the index existed
        INSERT INTO diagnoses_fts(rowid, rendered_text, tags, summary, source_file)
        SELECT d.seq, d.rendered_text,
               COALESCE((SELECT group_concat(value, ' ') FROM json_each(d.tags)), ''),
               COALESCE(d.summary, ''), COALESCE(d.source_file, '')
        FROM diagnoses d
        WHERE d.seq NOT IN (SELECT rowid FROM diagnoses_fts);",
        fts.table_options()
    ))?;

    set_schema_version(&tx, 2)?;
    tx.commit()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fts_sql(conn: &Connection) -> String {
        conn.query_row(
            "SELECT sql FROM sqlite_master WHERE name = 'diagnoses_fts'",
            [],
            |row| row.get(0),
        )
        .unwrap()
    }

    #[test]
    fn test_schema_init() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn, &FtsOptions::default()).unwrap();

        assert_eq!(get_schema_version(&conn).unwrap(), SCHEMA_VERSION);

        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .filter_map(|r| r.ok())
            .collect();

        assert!(tables.contains(&"diagnoses".to_string()));
        assert!(tables.contains(&"diagnoses_fts".to_string()));
        assert!(tables.contains(&"schema_version".to_string()));
        assert!(fts_sql(&conn).contains("prefix"));
    }

    #[test]
    fn test_schema_init_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn, &FtsOptions::default()).unwrap();
        init_schema(&conn, &FtsOptions::default()).unwrap();

        let versions: i64 = conn
            .query_row("SELECT COUNT(*) FROM schema_version", [], |row| row.get(0))
            .unwrap();
        assert_eq!(versions, 2);
    }

    #[test]
    fn test_porter_option_is_fixed_at_creation() {
        let conn = Connection::open_in_memory().unwrap();
        let porter = FtsOptions {
            prefix: false,
            porter: true,
        };
        init_schema(&conn, &porter).unwrap();
        assert!(fts_sql(&conn).contains("porter"));

        // Reopening with other options keeps the original tokenizer
        init_schema(&conn, &FtsOptions::default()).unwrap();
        assert!(fts_sql(&conn).contains("porter"));
        assert!(!fts_sql(&conn).contains("prefix"));
    }

    #[test]
    fn test_v2_backfills_existing_records() {
        let conn = Connection::open_in_memory().unwrap();
        get_schema_version(&conn).unwrap();
        migrate_v1(&conn).unwrap();
        conn.execute(
            "INSERT INTO diagnoses (id, timestamp, original_text, rendered_text, summary, tags,
                                    severity, language, created_at)
             VALUES ('a', 1, 'x', 'database timeout', 's', '[\"python\",\"keyerror\"]',
                     'error', 'python', 1)",
            [],
        )
        .unwrap();

        init_schema(&conn, &FtsOptions::default()).unwrap();

        let hits: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM diagnoses_fts WHERE diagnoses_fts MATCH 'keyerror'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(hits, 1);
    }

    #[test]
    fn test_failed_migration_leaves_previous_version() {
        let conn = Connection::open_in_memory().unwrap();
        get_schema_version(&conn).unwrap();
        conn.execute_batch(
            "CREATE TRIGGER reject_v2 BEFORE INSERT ON schema_version
             WHEN NEW.version = 2
             BEGIN SELECT RAISE(ABORT, 'rejected'); END;",
        )
        .unwrap();

        assert!(init_schema(&conn, &FtsOptions::default()).is_err());
        assert_eq!(get_schema_version(&conn).unwrap(), 1);
        let fts_tables: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE name = 'diagnoses_fts'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(fts_tables, 0);

        conn.execute_batch("DROP TRIGGER reject_v2").unwrap();
        init_schema(&conn, &FtsOptions::default()).unwrap();
        assert_eq!(get_schema_version(&conn).unwrap(), SCHEMA_VERSION);
        assert!(fts_sql(&conn).contains("fts5"));
    }
}
