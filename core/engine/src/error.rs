use thiserror::Error;

/// Errors raised while processing a node through the connection engine.
///
/// Every variant aborts the current `process_node` invocation as a whole:
/// the candidate batch is never partially persisted. Reinforcement applied
/// to earlier candidates in the same batch is not rolled back.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The language service returned a token outside the closed relation set.
    #[error("could not identify relation type: {0:?}")]
    InvalidClassification(String),

    /// The language service returned no usable text.
    #[error("language service returned no content")]
    EmptyGeneration,

    /// A store read failed while retrieving candidates or activity.
    #[error("candidate query failed: {0}")]
    CandidateQuery(#[source] anyhow::Error),

    /// A store write failed while saving nodes or connections.
    #[error("persistence failed: {0}")]
    Persistence(#[source] anyhow::Error),

    /// The language service request itself failed (transport, HTTP status).
    #[error("language service call failed: {0}")]
    Language(#[source] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, EngineError>;
