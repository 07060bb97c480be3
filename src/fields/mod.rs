//! Structured field extraction
//!
//! Runs the 27 retrieval-augmented emissions categories against the vector
//! index and merges the results onto a report row.

pub mod categories;
pub mod extractor;
pub mod parse;

pub use categories::{Category, CATEGORIES};
pub use extractor::StructuredFieldExtractor;
pub use parse::parse_category_response;
