//! Text chunking, language tagging, and upload staging

pub mod chunker;
pub mod language;
pub mod staging;

pub use chunker::TextChunker;
pub use staging::StagingArea;
