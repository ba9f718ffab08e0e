//! Multi-signal candidate scoring.
//!
//! Candidates are scored against a context embedding (the node plus its
//! already-connected neighbors), with additive heuristics for type match,
//! mutual connection, importance overlap, and a gated tag-similarity boost.

use knowledge_graph_schemas::Node;

use crate::vector::{average_vectors, clamp, cosine_similarity};

/// Scores below this never become connections.
pub const SIMILARITY_FLOOR: f32 = 0.55;

/// At most this many scored candidates survive ranking.
pub const MAX_SCORED_CANDIDATES: usize = 20;

/// Tag similarity only counts when the raw cosine exceeds this gate.
const TAG_BOOST_GATE: f32 = 0.7;

const TYPE_MATCH_BONUS: f32 = 0.05;
const MUTUAL_BONUS: f32 = 0.1;
const IMPORTANCE_OVERLAP_WEIGHT: f32 = 0.05;

/// A candidate node together with its adjusted similarity score.
#[derive(Debug, Clone)]
pub struct ScoredCandidate {
    pub node: Node,
    pub adjusted_score: f32,
}

/// Mean of the node's embedding and its known neighbors' embeddings - the
/// similarity anchor for candidate scoring.
pub fn context_embedding(node: &Node, neighbors: &[Node]) -> Vec<f32> {
    let mut vectors: Vec<&[f32]> = Vec::with_capacity(neighbors.len() + 1);
    if let Some(ref embeddings) = node.embeddings {
        vectors.push(embeddings);
    }
    for neighbor in neighbors {
        if let Some(ref embeddings) = neighbor.embeddings {
            vectors.push(embeddings);
        }
    }
    average_vectors(&vectors)
}

/// Gated tag-embedding boost: all or nothing, not a smooth blend. A weak tag
/// match contributes zero rather than dragging the score down.
fn tag_boost(node: &Node, candidate: &Node) -> f32 {
    let (Some(source_tags), Some(candidate_tags)) = (
        node.metadata.tags_embedding.as_deref(),
        candidate.metadata.tags_embedding.as_deref(),
    ) else {
        return 0.0;
    };

    let score = cosine_similarity(source_tags, candidate_tags);
    if score > TAG_BOOST_GATE {
        score
    } else {
        0.0
    }
}

/// Score every retrieved candidate against the context embedding, then keep
/// the top candidates at or above the similarity floor, best first.
pub fn score_candidates(
    node: &Node,
    neighbors: &[Node],
    recent_nodes: Vec<Node>,
    context: &[f32],
) -> Vec<ScoredCandidate> {
    let mut scored: Vec<ScoredCandidate> = recent_nodes
        .into_iter()
        .map(|candidate| {
            let candidate_embedding = candidate.embeddings.as_deref().unwrap_or(&[]);
            let mut similarity = cosine_similarity(context, candidate_embedding);

            if candidate.node_type == node.node_type {
                similarity += TYPE_MATCH_BONUS;
            }

            let has_mutual = neighbors.iter().any(|n| n.id == candidate.id);
            if has_mutual {
                similarity += MUTUAL_BONUS;
            }

            let importance_overlap = 1.0 - (node.importance - candidate.importance).abs();
            similarity += importance_overlap * IMPORTANCE_OVERLAP_WEIGHT;

            let adjusted_score = clamp(similarity + tag_boost(node, &candidate), 0.0, 1.0);

            ScoredCandidate {
                node: candidate,
                adjusted_score,
            }
        })
        .collect();

    scored.retain(|s| s.adjusted_score >= SIMILARITY_FLOOR);
    scored.sort_by(|a, b| b.adjusted_score.partial_cmp(&a.adjusted_score).unwrap());
    scored.truncate(MAX_SCORED_CANDIDATES);
    scored
}
