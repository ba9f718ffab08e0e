use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// ULID and ID Types
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnectionId(pub String);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Node Schema
// ============================================================================

/// A discrete unit of personal knowledge: a thought, memory, task, event, etc.
///
/// Connection-derived quantities (connection count, average confidence, last
/// connected timestamp) are intentionally NOT stored here - they are computed
/// on demand from the node's connection records by the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub title: String,
    pub node_type: NodeType,
    pub summary: String,
    /// Content embedding; absent until the embedding pipeline has run.
    pub embeddings: Option<Vec<f32>>,
    /// In [0, 1].
    pub importance: f32,
    /// In [-1, 1].
    pub sentiment: f32,
    /// In [0, 1]. Grows through reinforcement, starts at 0.
    #[serde(default)]
    pub memory_weight: f32,
    #[serde(default)]
    pub metadata: NodeMetadata,
    pub created_at: String, // RFC3339
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeMetadata {
    #[serde(default)]
    pub tags: Vec<String>,
    /// Embedding of the tag set, used for the tag-similarity boost.
    pub tags_embedding: Option<Vec<f32>>,
    pub source: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeType {
    #[serde(rename = "emotion")]
    Emotion,
    #[serde(rename = "thought")]
    Thought,
    #[serde(rename = "task")]
    Task,
    #[serde(rename = "event")]
    Event,
    #[serde(rename = "habit")]
    Habit,
    #[serde(rename = "topic")]
    Topic,
    #[serde(rename = "memory")]
    Memory,
    #[serde(rename = "goal")]
    Goal,
    #[serde(rename = "relationship")]
    Relationship,
    #[serde(rename = "person")]
    Person,
    #[serde(rename = "idea")]
    Idea,
}

impl NodeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeType::Emotion => "emotion",
            NodeType::Thought => "thought",
            NodeType::Task => "task",
            NodeType::Event => "event",
            NodeType::Habit => "habit",
            NodeType::Topic => "topic",
            NodeType::Memory => "memory",
            NodeType::Goal => "goal",
            NodeType::Relationship => "relationship",
            NodeType::Person => "person",
            NodeType::Idea => "idea",
        }
    }

    pub fn parse(s: &str) -> Option<NodeType> {
        match s {
            "emotion" => Some(NodeType::Emotion),
            "thought" => Some(NodeType::Thought),
            "task" => Some(NodeType::Task),
            "event" => Some(NodeType::Event),
            "habit" => Some(NodeType::Habit),
            "topic" => Some(NodeType::Topic),
            "memory" => Some(NodeType::Memory),
            "goal" => Some(NodeType::Goal),
            "relationship" => Some(NodeType::Relationship),
            "person" => Some(NodeType::Person),
            "idea" => Some(NodeType::Idea),
            _ => None,
        }
    }
}

// ============================================================================
// Connection Schema
// ============================================================================

/// A directed, confidence-scored, typed semantic edge between two nodes.
///
/// Connections reference their endpoints by identifier, never by embedded
/// object, and are immutable once written. Every qualifying pair is stored as
/// two independent directed records (forward plus mirrored reverse).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Connection {
    pub id: ConnectionId,
    pub source_id: NodeId,
    pub target_id: NodeId,
    /// In [0, 1].
    pub confidence: f32,
    pub relation_type: RelationType,
    pub summary: String,
    pub created_at: String, // RFC3339
}

/// Closed set of relation characterizations the classifier may return.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RelationType {
    #[serde(rename = "caused_by")]
    CausedBy,
    #[serde(rename = "inspired_by")]
    InspiredBy,
    #[serde(rename = "contradicts")]
    Contradicts,
    #[serde(rename = "similar_to")]
    SimilarTo,
    #[serde(rename = "continues_from")]
    ContinuesFrom,
    #[serde(rename = "depends_on")]
    DependsOn,
    #[serde(rename = "associated_with")]
    AssociatedWith,
    #[serde(rename = "reflects_on")]
    ReflectsOn,
}

impl RelationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelationType::CausedBy => "caused_by",
            RelationType::InspiredBy => "inspired_by",
            RelationType::Contradicts => "contradicts",
            RelationType::SimilarTo => "similar_to",
            RelationType::ContinuesFrom => "continues_from",
            RelationType::DependsOn => "depends_on",
            RelationType::AssociatedWith => "associated_with",
            RelationType::ReflectsOn => "reflects_on",
        }
    }

    /// Case-insensitive parse. Returns None for any token outside the closed
    /// set - callers decide whether that is an error.
    pub fn parse(s: &str) -> Option<RelationType> {
        match s.trim().to_lowercase().as_str() {
            "caused_by" => Some(RelationType::CausedBy),
            "inspired_by" => Some(RelationType::InspiredBy),
            "contradicts" => Some(RelationType::Contradicts),
            "similar_to" => Some(RelationType::SimilarTo),
            "continues_from" => Some(RelationType::ContinuesFrom),
            "depends_on" => Some(RelationType::DependsOn),
            "associated_with" => Some(RelationType::AssociatedWith),
            "reflects_on" => Some(RelationType::ReflectsOn),
            _ => None,
        }
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

pub fn generate_node_id() -> NodeId {
    NodeId(format!("node_{}", ulid::Ulid::new()))
}

pub fn generate_connection_id() -> ConnectionId {
    ConnectionId(format!("conn_{}", ulid::Ulid::new()))
}
