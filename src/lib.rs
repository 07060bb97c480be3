//! Sustainability-report ingestion and retrieval-augmented emissions extraction
//!
//! The pipeline accepts uploaded PDF reports, extracts their text and tables
//! through one of three interchangeable backends, chunks and embeds the
//! content into a per-company vector corpus, and fills a fixed greenhouse-gas
//! emissions schema by running retrieval-augmented completion prompts for
//! every category. One document is processed at a time; the slot is held as
//! a database lease and the worker is supervised in-process.

pub mod config;
pub mod error;
pub mod extraction;
pub mod fields;
pub mod ingestion;
pub mod processing;
pub mod providers;
pub mod server;
pub mod storage;
pub mod transfer;
pub mod types;

pub use config::AppConfig;
pub use error::{Error, Result};
pub use server::{AppState, Server};
