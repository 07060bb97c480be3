//! Bulk spreadsheet import/export of report records

pub mod export;
pub mod import;

pub use export::{export_csv, MAX_RECORDS_PER_REQUEST};
pub use import::{ConflictAction, ImportManager, ImportOutcome};
