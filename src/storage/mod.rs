//! SQLite persistence: reports, the job-log mailbox, and the job lease

pub mod database;
pub mod migrations;

pub use database::{Database, NewReport};
