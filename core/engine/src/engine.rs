//! The connection engine: candidate retrieval, evaluation, reinforcement,
//! and bidirectional persistence for a newly created or updated node.

use chrono::{DateTime, Utc};
use knowledge_graph_schemas::{generate_connection_id, Connection, Node};
use tracing::{debug, info};

use crate::error::Result;
use crate::language::LanguageProvider;
use crate::recency::{parse_rfc3339, NodeActivity, RecencyModel, RecencyWindow};
use crate::reinforce::{reinforce, REINFORCEMENT_THRESHOLD};
use crate::scoring::{context_embedding, score_candidates, ScoredCandidate, SIMILARITY_FLOOR};
use crate::store::GraphStore;

/// Upper bound on nodes retrieved for scoring.
const CANDIDATE_LIMIT: usize = 100;

/// Reverse connections carry a fixed 5% trust discount.
const REVERSE_CONFIDENCE_DISCOUNT: f32 = 0.95;

/// Candidate-age horizon for the recency boost: full weight under a day,
/// fading linearly to zero at seven days.
const RECENCY_BOOST_HORIZON_DAYS: f32 = 7.0;

const SIMILARITY_WEIGHT: f32 = 0.7;
const RECENCY_WEIGHT: f32 = 0.15;
const TYPE_MATCH_WEIGHT: f32 = 0.15;

pub struct ConnectionEngine {
    store: Box<dyn GraphStore>,
    language: Box<dyn LanguageProvider>,
    recency: RecencyModel,
}

impl ConnectionEngine {
    pub fn new(store: Box<dyn GraphStore>, language: Box<dyn LanguageProvider>) -> Self {
        Self {
            store,
            language,
            recency: RecencyModel::default(),
        }
    }

    pub fn with_recency_model(mut self, recency: RecencyModel) -> Self {
        self.recency = recency;
        self
    }

    /// Link a node into the graph: retrieve and score recent candidates,
    /// evaluate the survivors through the language service, reinforce
    /// high-confidence pairs, and persist every new edge in both directions.
    ///
    /// Any failure aborts the whole invocation with no connection persisted.
    /// Reinforcement applied to earlier candidates is not rolled back.
    /// Idempotency is not guaranteed: reprocessing the same node can create
    /// duplicate directed edges.
    pub async fn process_node(&mut self, node: &Node, neighbors: &[Node]) -> Result<()> {
        let candidates = self.get_candidates(node, neighbors)?;
        debug!(
            "Node {} has {} scored candidates",
            node.id,
            candidates.len()
        );

        let connections = self.evaluate_connections(node, candidates).await?;
        self.persist_bidirectional(&connections)?;

        info!(
            "Processed node {}: {} new connection pairs",
            node.id,
            connections.len()
        );
        Ok(())
    }

    /// The adaptive retrieval window for a node, derived from its stored
    /// connection records. Exposed because the temperature doubles as a
    /// recency-weighting signal outside the engine.
    pub fn recency_window(&self, node: &Node, now: DateTime<Utc>) -> Result<RecencyWindow> {
        let connections = self.store.connections_for(&node.id)?;
        let activity = NodeActivity::from_connections(&node.id, &connections);
        Ok(self.recency.window(node, &activity, now))
    }

    fn get_candidates(&self, node: &Node, neighbors: &[Node]) -> Result<Vec<ScoredCandidate>> {
        let window = self.recency_window(node, Utc::now())?;
        debug!(
            "Retrieval window for {}: cutoff {}, temperature {:.3}",
            node.id, window.cutoff, window.temperature
        );

        let recent_nodes = self
            .store
            .find_created_after(window.cutoff, &node.id, CANDIDATE_LIMIT)?;

        let context = context_embedding(node, neighbors);
        Ok(score_candidates(node, neighbors, recent_nodes, &context))
    }

    async fn evaluate_connections(
        &mut self,
        node: &Node,
        candidates: Vec<ScoredCandidate>,
    ) -> Result<Vec<Connection>> {
        let now = Utc::now();
        let mut source = node.clone();
        let mut connections = Vec::new();

        for ScoredCandidate {
            node: candidate,
            adjusted_score,
        } in candidates
        {
            let similarity = adjusted_score;
            // Scoring already applied this floor; enforced again here as an
            // independent invariant of evaluation.
            if similarity < SIMILARITY_FLOOR {
                continue;
            }

            let type_bonus = if source.node_type == candidate.node_type {
                TYPE_MATCH_WEIGHT
            } else {
                0.0
            };
            let confidence = similarity * SIMILARITY_WEIGHT
                + recency_boost(&candidate, now) * RECENCY_WEIGHT
                + type_bonus;

            let summary = self.language.summarize_relation(&source, &candidate).await?;
            let relation_type = self
                .language
                .classify_relation_type(&source.summary, &candidate.summary)
                .await?;

            connections.push(Connection {
                id: generate_connection_id(),
                source_id: source.id.clone(),
                target_id: candidate.id.clone(),
                confidence,
                relation_type,
                summary,
                created_at: now.to_rfc3339(),
            });

            if confidence >= REINFORCEMENT_THRESHOLD {
                let mut candidate = candidate;
                reinforce(&mut source, &mut candidate, confidence);
                self.store.save_nodes(&[source.clone(), candidate])?;
            }
        }

        Ok(connections)
    }

    fn persist_bidirectional(&mut self, connections: &[Connection]) -> Result<()> {
        if connections.is_empty() {
            return Ok(());
        }

        self.store.save_batch(connections)?;
        self.store.save_batch(&mirror_connections(connections))?;
        Ok(())
    }
}

/// Full boost for candidates under a day old, fading linearly to zero at the
/// seven-day horizon. Unparseable timestamps contribute nothing.
fn recency_boost(candidate: &Node, now: DateTime<Utc>) -> f32 {
    let Some(created) = parse_rfc3339(&candidate.created_at) else {
        return 0.0;
    };
    let days_ago = (now - created).num_seconds() as f32 / 86_400.0;
    (1.0 - days_ago / RECENCY_BOOST_HORIZON_DAYS).max(0.0)
}

/// Mirror a forward batch: fresh identifiers, endpoints swapped, confidence
/// discounted. The reverse direction is never re-checked against the
/// similarity floor.
fn mirror_connections(connections: &[Connection]) -> Vec<Connection> {
    connections
        .iter()
        .map(|c| Connection {
            id: generate_connection_id(),
            source_id: c.target_id.clone(),
            target_id: c.source_id.clone(),
            confidence: c.confidence * REVERSE_CONFIDENCE_DISCOUNT,
            relation_type: c.relation_type,
            summary: c.summary.clone(),
            created_at: c.created_at.clone(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use knowledge_graph_schemas::{
        generate_node_id, NodeMetadata, NodeType, RelationType,
    };

    fn connection(confidence: f32) -> Connection {
        Connection {
            id: generate_connection_id(),
            source_id: generate_node_id(),
            target_id: generate_node_id(),
            confidence,
            relation_type: RelationType::SimilarTo,
            summary: "linked".to_string(),
            created_at: "2026-01-10T00:00:00+00:00".to_string(),
        }
    }

    #[test]
    fn test_mirror_swaps_endpoints_and_discounts() {
        let forward = vec![connection(0.9), connection(0.6)];
        let reversed = mirror_connections(&forward);

        assert_eq!(reversed.len(), 2);
        for (f, r) in forward.iter().zip(&reversed) {
            assert_ne!(f.id, r.id);
            assert_eq!(f.source_id, r.target_id);
            assert_eq!(f.target_id, r.source_id);
            assert!((r.confidence - f.confidence * 0.95).abs() < 1e-6);
            assert_eq!(f.relation_type, r.relation_type);
            assert_eq!(f.summary, r.summary);
        }
    }

    #[test]
    fn test_recency_boost_fades_over_a_week() {
        let now = Utc::now();
        let fresh = make_node((now - chrono::Duration::hours(2)).to_rfc3339());
        let old = make_node((now - chrono::Duration::days(30)).to_rfc3339());
        let half = make_node((now - chrono::Duration::hours(84)).to_rfc3339());

        assert!(recency_boost(&fresh, now) > 0.98);
        assert_eq!(recency_boost(&old, now), 0.0);
        assert!((recency_boost(&half, now) - 0.5).abs() < 0.01);
    }

    #[test]
    fn test_recency_boost_tolerates_bad_timestamp() {
        let node = make_node("not-a-timestamp".to_string());
        assert_eq!(recency_boost(&node, Utc::now()), 0.0);
    }

    fn make_node(created_at: String) -> Node {
        Node {
            id: generate_node_id(),
            title: "test".to_string(),
            node_type: NodeType::Thought,
            summary: "test".to_string(),
            embeddings: None,
            importance: 0.5,
            sentiment: 0.0,
            memory_weight: 0.0,
            metadata: NodeMetadata::default(),
            created_at,
        }
    }
}
