//! Provider traits for external capabilities
//!
//! The pipeline consumes embeddings, completions, and a vector index through
//! these traits. Production wiring uses the OpenAI-compatible HTTP providers;
//! tests use scripted in-memory implementations.

pub mod completion;
pub mod embedding;
pub mod openai;
pub mod vector_index;

pub use completion::CompletionProvider;
pub use embedding::{embed_with_retry, EmbeddingProvider, RetryPolicy};
pub use openai::{OpenAiClient, OpenAiCompletion, OpenAiEmbedder};
pub use vector_index::{MemoryVectorIndex, VectorIndexProvider};
