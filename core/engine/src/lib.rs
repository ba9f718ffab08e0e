pub mod engine;
pub mod error;
pub mod language;
pub mod recency;
pub mod reinforce;
pub mod scoring;
pub mod sqlite;
pub mod store;
pub mod vector;

pub use engine::ConnectionEngine;
pub use error::{EngineError, Result};
pub use language::{LanguageProvider, OllamaProvider, OpenAiProvider, StaticProvider};
pub use recency::{LifetimeTable, NodeActivity, RecencyModel, RecencyWindow};
pub use reinforce::{reinforce, REINFORCEMENT_THRESHOLD};
pub use scoring::{context_embedding, score_candidates, ScoredCandidate};
pub use sqlite::SqliteGraphStore;
pub use store::{ConnectionStore, GraphStore, NodeStore};
pub use vector::{average_vectors, clamp, cosine_similarity};
