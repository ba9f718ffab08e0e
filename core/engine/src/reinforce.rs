//! Reinforcement feedback: high-confidence connections make both endpoint
//! nodes stickier (higher memory weight) and slightly more important.

use knowledge_graph_schemas::Node;
use tracing::debug;

/// Connections at or above this confidence reinforce their endpoints.
pub const REINFORCEMENT_THRESHOLD: f32 = 0.8;

const MEMORY_WEIGHT_FACTOR: f32 = 0.1;
const IMPORTANCE_FACTOR: f32 = 0.65;

/// Apply the reinforcement update to both endpoints in place. Callers are
/// responsible for persisting the mutated nodes.
pub fn reinforce(node: &mut Node, candidate: &mut Node, confidence: f32) {
    let reinforcement = (confidence * MEMORY_WEIGHT_FACTOR).min(1.0);

    node.memory_weight = (node.memory_weight + reinforcement).min(1.0);
    candidate.memory_weight = (candidate.memory_weight + reinforcement).min(1.0);

    node.importance = (node.importance + reinforcement * IMPORTANCE_FACTOR).min(1.0);
    candidate.importance = (candidate.importance + reinforcement * IMPORTANCE_FACTOR).min(1.0);

    debug!(
        "Reinforced {} and {} by {:.4}",
        node.id, candidate.id, reinforcement
    );
}
