//! Error signature catalog, language detection and matching

pub mod builtin;
pub mod catalog;
pub mod detect;
pub mod matcher;

pub use catalog::{ErrorPattern, FramePreference, LocationRule, PatternCatalog, PatternDef};
pub use detect::{detect_language, score_languages};
pub use matcher::{ErrorMatch, PatternMatcher};
