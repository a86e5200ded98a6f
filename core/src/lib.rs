//! Tracelens Core - Error diagnosis and an indexed diagnosis store
//!
//! This crate provides:
//! - Language-aware error pattern matching over raw error text
//! - Context extraction (source window, version control, project, environment)
//! - Diagnosis assembly with stable content-derived ids
//! - A SQLite store with full-text search and retention sweeps
//!
//! The crate is in-process only and never installs a tracing subscriber;
//! callers decide where log events go.

pub mod analyzer;
pub mod config;
pub mod context;
pub mod error;
pub mod filter;
pub mod fingerprint;
pub mod patterns;
pub mod retention;
pub mod schema;
pub mod store;
pub mod types;

pub use analyzer::{Analyzer, DiagnoseRequest};
pub use config::Config;
pub use context::{BundleBuilder, ContextExtractor};
pub use error::{Error, FacetError, Result};
pub use filter::{parse_time_filter, SearchFilter};
pub use fingerprint::diagnosis_id;
pub use patterns::{ErrorMatch, ErrorPattern, PatternCatalog, PatternMatcher};
pub use retention::{RetentionManager, RetentionPolicy, Tier};
pub use store::{CancelToken, LogStore};
pub use types::*;

/// Re-export commonly used items
pub mod prelude {
    pub use crate::analyzer::{Analyzer, DiagnoseRequest};
    pub use crate::error::{Error, Result};
    pub use crate::filter::SearchFilter;
    pub use crate::retention::{RetentionManager, RetentionPolicy, Tier};
    pub use crate::store::{CancelToken, LogStore};
    pub use crate::types::*;
}
