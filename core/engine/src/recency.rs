//! Adaptive recency window for candidate retrieval.
//!
//! Frequently and confidently connected, important nodes get a wider
//! retrieval window; stale or low-importance nodes get a narrow,
//! type-appropriate one.

use chrono::{DateTime, Utc};
use knowledge_graph_schemas::{Connection, Node, NodeId, NodeType};
use std::collections::HashMap;

const SECONDS_PER_DAY: f32 = 86_400.0;

/// Baseline lifetime in days per node type. Built once at startup and
/// injected into the model, not referenced as a global.
#[derive(Debug, Clone)]
pub struct LifetimeTable {
    days: HashMap<NodeType, f32>,
    fallback: f32,
}

impl Default for LifetimeTable {
    fn default() -> Self {
        let days = HashMap::from([
            (NodeType::Emotion, 3.0),
            (NodeType::Thought, 5.0),
            (NodeType::Task, 10.0),
            (NodeType::Event, 14.0),
            (NodeType::Habit, 30.0),
            (NodeType::Topic, 30.0),
            (NodeType::Memory, 60.0),
            (NodeType::Goal, 90.0),
            (NodeType::Relationship, 90.0),
            (NodeType::Person, 90.0),
            (NodeType::Idea, 7.0), // short-lived by default
        ]);
        Self {
            days,
            fallback: 14.0,
        }
    }
}

impl LifetimeTable {
    pub fn base_lifetime(&self, node_type: NodeType) -> f32 {
        self.days.get(&node_type).copied().unwrap_or(self.fallback)
    }
}

/// Connection-derived state of a node, computed on demand from its
/// connection records - never cached on the node itself.
#[derive(Debug, Clone, Default)]
pub struct NodeActivity {
    pub connection_count: usize,
    pub avg_confidence: f32,
    pub last_connected_at: Option<DateTime<Utc>>,
}

impl NodeActivity {
    /// Derive activity from every connection record touching `node_id`,
    /// incoming and outgoing alike.
    pub fn from_connections(node_id: &NodeId, connections: &[Connection]) -> Self {
        let touching: Vec<&Connection> = connections
            .iter()
            .filter(|c| &c.source_id == node_id || &c.target_id == node_id)
            .collect();

        if touching.is_empty() {
            return Self::default();
        }

        let avg =
            touching.iter().map(|c| c.confidence).sum::<f32>() / touching.len() as f32;

        let last = touching
            .iter()
            .filter_map(|c| parse_rfc3339(&c.created_at))
            .max();

        Self {
            connection_count: touching.len(),
            avg_confidence: (avg * 1000.0).round() / 1000.0,
            last_connected_at: last,
        }
    }
}

/// The retrieval cutoff and the temperature that produced it. Temperature is
/// exposed because it doubles as a recency-weighting signal elsewhere.
#[derive(Debug, Clone)]
pub struct RecencyWindow {
    pub cutoff: DateTime<Utc>,
    pub temperature: f32,
}

#[derive(Debug, Clone, Default)]
pub struct RecencyModel {
    table: LifetimeTable,
}

impl RecencyModel {
    pub fn new(table: LifetimeTable) -> Self {
        Self { table }
    }

    /// Compute the adaptive cutoff for a node given its derived activity.
    /// `now` is passed in so tests stay deterministic.
    pub fn window(&self, node: &Node, activity: &NodeActivity, now: DateTime<Utc>) -> RecencyWindow {
        let base_window = self.table.base_lifetime(node.node_type);

        let activity_boost =
            ((activity.connection_count as f32 / 10.0) * activity.avg_confidence).min(2.0);

        let time_since_last = match activity.last_connected_at {
            Some(last) => (now - last).num_seconds() as f32 / SECONDS_PER_DAY,
            None => base_window,
        };

        let decay_factor = (1.0 - time_since_last / base_window).max(0.3);
        let temperature = ((activity_boost * decay_factor + node.importance) / 3.0).min(1.0);
        let adjusted_window_days = base_window * (1.0 + temperature * 1.5);

        let cutoff =
            now - chrono::Duration::seconds((adjusted_window_days * SECONDS_PER_DAY) as i64);

        RecencyWindow {
            cutoff,
            temperature,
        }
    }
}

pub(crate) fn parse_rfc3339(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}
