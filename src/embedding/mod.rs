//! Sliding-window speaker embedding extraction.

pub mod extractor;
pub mod model_manager;
pub mod scheduler;
pub mod types;

pub use extractor::{EmbeddingExtractor, SignalFeatureEmbeddingExtractor, EMBEDDING_DIMENSION};
#[cfg(feature = "neural")]
pub use extractor::OnnxEmbeddingExtractor;
pub use model_manager::{default_cache_dir, verify_checksum};
#[cfg(feature = "model-download")]
pub use model_manager::{download_model, DownloadError};
pub use scheduler::EmbeddingScheduler;
pub use types::{cosine_similarity, Embedding, EmbeddingError};
