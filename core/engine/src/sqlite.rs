//! SQLite-backed graph store. Vectors and tag lists are persisted as JSON
//! text columns.

use anyhow::Error as AnyError;
use chrono::{DateTime, Utc};
use knowledge_graph_schemas::{
    Connection, ConnectionId, Node, NodeId, NodeMetadata, NodeType, RelationType,
};
use rusqlite::{params, Row};
use std::path::Path;
use tracing::{debug, info};

use crate::error::{EngineError, Result};
use crate::recency::parse_rfc3339;
use crate::store::{ConnectionStore, NodeStore};

pub struct SqliteGraphStore {
    conn: rusqlite::Connection,
}

impl SqliteGraphStore {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let conn = rusqlite::Connection::open(db_path)
            .map_err(|e| EngineError::Persistence(AnyError::new(e)))?;
        // Multiple handles may share the file; wait out writer locks instead
        // of surfacing SQLITE_BUSY.
        conn.busy_timeout(std::time::Duration::from_secs(5))
            .map_err(|e| EngineError::Persistence(AnyError::new(e)))?;
        let store = Self { conn };
        store.create_schema()?;
        info!("Graph store initialized");
        Ok(store)
    }

    /// In-memory database for tests and throwaway runs.
    pub fn in_memory() -> Result<Self> {
        let conn = rusqlite::Connection::open_in_memory()
            .map_err(|e| EngineError::Persistence(AnyError::new(e)))?;
        let store = Self { conn };
        store.create_schema()?;
        Ok(store)
    }

    fn create_schema(&self) -> Result<()> {
        self.conn
            .execute_batch(
                "CREATE TABLE IF NOT EXISTS nodes (
                    id TEXT PRIMARY KEY,
                    title TEXT NOT NULL,
                    node_type TEXT NOT NULL,
                    summary TEXT NOT NULL,
                    embeddings TEXT,
                    importance REAL NOT NULL,
                    sentiment REAL NOT NULL,
                    memory_weight REAL NOT NULL DEFAULT 0,
                    tags TEXT NOT NULL DEFAULT '[]',
                    tags_embedding TEXT,
                    source TEXT,
                    created_at TEXT NOT NULL
                );

                CREATE INDEX IF NOT EXISTS idx_nodes_created_at
                 ON nodes(created_at DESC);

                CREATE TABLE IF NOT EXISTS node_connections (
                    id TEXT PRIMARY KEY,
                    source_id TEXT NOT NULL,
                    target_id TEXT NOT NULL,
                    confidence REAL NOT NULL,
                    relation_type TEXT NOT NULL,
                    summary TEXT NOT NULL,
                    created_at TEXT NOT NULL
                );

                CREATE INDEX IF NOT EXISTS idx_connections_source
                 ON node_connections(source_id);

                CREATE INDEX IF NOT EXISTS idx_connections_target
                 ON node_connections(target_id);",
            )
            .map_err(|e| EngineError::Persistence(AnyError::new(e)))
    }

    fn row_to_node(row: &Row) -> rusqlite::Result<Node> {
        let node_type: String = row.get(2)?;
        let embeddings_json: Option<String> = row.get(4)?;
        let tags_json: String = row.get(8)?;
        let tags_embedding_json: Option<String> = row.get(9)?;

        let node_type = NodeType::parse(&node_type).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                2,
                rusqlite::types::Type::Text,
                format!("unknown node type: {node_type:?}").into(),
            )
        })?;

        Ok(Node {
            id: NodeId(row.get(0)?),
            title: row.get(1)?,
            node_type,
            summary: row.get(3)?,
            embeddings: embeddings_json.and_then(|j| serde_json::from_str(&j).ok()),
            importance: row.get(5)?,
            sentiment: row.get(6)?,
            memory_weight: row.get(7)?,
            metadata: NodeMetadata {
                tags: serde_json::from_str(&tags_json).unwrap_or_default(),
                tags_embedding: tags_embedding_json.and_then(|j| serde_json::from_str(&j).ok()),
                source: row.get(10)?,
            },
            created_at: row.get(11)?,
        })
    }

    fn row_to_connection(row: &Row) -> rusqlite::Result<Connection> {
        let relation_type: String = row.get(4)?;
        let relation_type = RelationType::parse(&relation_type).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                4,
                rusqlite::types::Type::Text,
                format!("unknown relation type: {relation_type:?}").into(),
            )
        })?;

        Ok(Connection {
            id: ConnectionId(row.get(0)?),
            source_id: NodeId(row.get(1)?),
            target_id: NodeId(row.get(2)?),
            confidence: row.get(3)?,
            relation_type,
            summary: row.get(5)?,
            created_at: row.get(6)?,
        })
    }
}

impl NodeStore for SqliteGraphStore {
    fn find_created_after(
        &self,
        cutoff: DateTime<Utc>,
        exclude: &NodeId,
        limit: usize,
    ) -> Result<Vec<Node>> {
        let cutoff = cutoff.to_rfc3339();
        debug!("Retrieving candidates created after {}", cutoff);

        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, title, node_type, summary, embeddings, importance,
                        sentiment, memory_weight, tags, tags_embedding, source, created_at
                 FROM nodes
                 WHERE created_at > ?1 AND id != ?2
                 LIMIT ?3",
            )
            .map_err(|e| EngineError::CandidateQuery(AnyError::new(e)))?;

        let nodes = stmt
            .query_map(params![cutoff, exclude.0, limit], Self::row_to_node)
            .map_err(|e| EngineError::CandidateQuery(AnyError::new(e)))?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| EngineError::CandidateQuery(AnyError::new(e)))?;

        Ok(nodes)
    }

    fn find_by_id(&self, id: &NodeId) -> Result<Option<Node>> {
        use rusqlite::OptionalExtension;

        self.conn
            .query_row(
                "SELECT id, title, node_type, summary, embeddings, importance,
                        sentiment, memory_weight, tags, tags_embedding, source, created_at
                 FROM nodes WHERE id = ?1",
                params![id.0],
                Self::row_to_node,
            )
            .optional()
            .map_err(|e| EngineError::CandidateQuery(AnyError::new(e)))
    }

    fn save_nodes(&mut self, nodes: &[Node]) -> Result<()> {
        let tx = self
            .conn
            .transaction()
            .map_err(|e| EngineError::Persistence(AnyError::new(e)))?;

        for node in nodes {
            let embeddings_json = node
                .embeddings
                .as_ref()
                .map(|v| serde_json::to_string(v).unwrap_or_else(|_| "[]".to_string()));
            let tags_json =
                serde_json::to_string(&node.metadata.tags).unwrap_or_else(|_| "[]".to_string());
            let tags_embedding_json = node
                .metadata
                .tags_embedding
                .as_ref()
                .map(|v| serde_json::to_string(v).unwrap_or_else(|_| "[]".to_string()));

            // Timestamps are normalized to UTC on write so the lexicographic
            // cutoff comparison in find_created_after stays valid for rows
            // that arrived with a non-UTC offset.
            let created_at = parse_rfc3339(&node.created_at)
                .map(|dt| dt.to_rfc3339())
                .unwrap_or_else(|| node.created_at.clone());

            tx.execute(
                "INSERT OR REPLACE INTO nodes (
                    id, title, node_type, summary, embeddings, importance,
                    sentiment, memory_weight, tags, tags_embedding, source, created_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                params![
                    node.id.0,
                    node.title,
                    node.node_type.as_str(),
                    node.summary,
                    embeddings_json,
                    node.importance,
                    node.sentiment,
                    node.memory_weight,
                    tags_json,
                    tags_embedding_json,
                    node.metadata.source,
                    created_at,
                ],
            )
            .map_err(|e| EngineError::Persistence(AnyError::new(e)))?;
        }

        tx.commit()
            .map_err(|e| EngineError::Persistence(AnyError::new(e)))
    }
}

impl ConnectionStore for SqliteGraphStore {
    fn save_batch(&mut self, connections: &[Connection]) -> Result<()> {
        if connections.is_empty() {
            return Ok(());
        }

        let tx = self
            .conn
            .transaction()
            .map_err(|e| EngineError::Persistence(AnyError::new(e)))?;

        for connection in connections {
            tx.execute(
                "INSERT INTO node_connections (
                    id, source_id, target_id, confidence, relation_type, summary, created_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    connection.id.0,
                    connection.source_id.0,
                    connection.target_id.0,
                    connection.confidence,
                    connection.relation_type.as_str(),
                    connection.summary,
                    connection.created_at,
                ],
            )
            .map_err(|e| EngineError::Persistence(AnyError::new(e)))?;
        }

        tx.commit()
            .map_err(|e| EngineError::Persistence(AnyError::new(e)))?;

        debug!("Persisted {} connections", connections.len());
        Ok(())
    }

    fn connections_for(&self, node_id: &NodeId) -> Result<Vec<Connection>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, source_id, target_id, confidence, relation_type, summary, created_at
                 FROM node_connections
                 WHERE source_id = ?1 OR target_id = ?1",
            )
            .map_err(|e| EngineError::CandidateQuery(AnyError::new(e)))?;

        let connections = stmt
            .query_map(params![node_id.0], Self::row_to_connection)
            .map_err(|e| EngineError::CandidateQuery(AnyError::new(e)))?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| EngineError::CandidateQuery(AnyError::new(e)))?;

        Ok(connections)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use knowledge_graph_schemas::{generate_connection_id, generate_node_id};

    fn node(title: &str, created_at: &str) -> Node {
        Node {
            id: generate_node_id(),
            title: title.to_string(),
            node_type: NodeType::Thought,
            summary: format!("{} summary", title),
            embeddings: Some(vec![0.1, 0.2]),
            importance: 0.5,
            sentiment: 0.1,
            memory_weight: 0.0,
            metadata: NodeMetadata {
                tags: vec!["test".into()],
                tags_embedding: None,
                source: Some("manual".into()),
            },
            created_at: created_at.to_string(),
        }
    }

    #[test]
    fn test_node_roundtrip() {
        let mut store = SqliteGraphStore::in_memory().unwrap();
        let n = node("roundtrip", "2026-01-05T12:00:00+00:00");
        store.save_nodes(std::slice::from_ref(&n)).unwrap();

        let loaded = store.find_by_id(&n.id).unwrap().unwrap();
        assert_eq!(loaded.title, "roundtrip");
        assert_eq!(loaded.node_type, NodeType::Thought);
        assert_eq!(loaded.embeddings, Some(vec![0.1, 0.2]));
        assert_eq!(loaded.metadata.tags, vec!["test".to_string()]);
    }

    #[test]
    fn test_find_by_id_missing_is_none() {
        let store = SqliteGraphStore::in_memory().unwrap();
        assert!(store.find_by_id(&generate_node_id()).unwrap().is_none());
    }

    #[test]
    fn test_save_nodes_replaces_existing() {
        let mut store = SqliteGraphStore::in_memory().unwrap();
        let mut n = node("mutable", "2026-01-05T12:00:00+00:00");
        store.save_nodes(std::slice::from_ref(&n)).unwrap();

        n.memory_weight = 0.4;
        n.importance = 0.9;
        store.save_nodes(std::slice::from_ref(&n)).unwrap();

        let loaded = store.find_by_id(&n.id).unwrap().unwrap();
        assert_eq!(loaded.memory_weight, 0.4);
        assert_eq!(loaded.importance, 0.9);
    }

    #[test]
    fn test_find_created_after_excludes_self_and_old_nodes() {
        let mut store = SqliteGraphStore::in_memory().unwrap();
        let fresh = node("fresh", "2026-01-10T00:00:00+00:00");
        let stale = node("stale", "2025-12-01T00:00:00+00:00");
        let subject = node("subject", "2026-01-11T00:00:00+00:00");
        store
            .save_nodes(&[fresh.clone(), stale.clone(), subject.clone()])
            .unwrap();

        let cutoff = DateTime::parse_from_rfc3339("2026-01-01T00:00:00+00:00")
            .unwrap()
            .with_timezone(&Utc);

        let found = store.find_created_after(cutoff, &subject.id, 100).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, fresh.id);
    }

    #[test]
    fn test_find_created_after_respects_limit() {
        let mut store = SqliteGraphStore::in_memory().unwrap();
        let nodes: Vec<Node> = (0..10)
            .map(|i| node(&format!("n{}", i), "2026-01-10T00:00:00+00:00"))
            .collect();
        store.save_nodes(&nodes).unwrap();

        let cutoff = DateTime::parse_from_rfc3339("2026-01-01T00:00:00+00:00")
            .unwrap()
            .with_timezone(&Utc);

        let found = store
            .find_created_after(cutoff, &generate_node_id(), 4)
            .unwrap();
        assert_eq!(found.len(), 4);
    }

    #[test]
    fn test_non_utc_timestamp_is_normalized_on_save() {
        let mut store = SqliteGraphStore::in_memory().unwrap();
        // Instant 2026-08-24T05:00:00Z written with a +05:30 offset.
        let n = node("offset", "2026-08-24T10:30:00+05:30");
        store.save_nodes(std::slice::from_ref(&n)).unwrap();

        let loaded = store.find_by_id(&n.id).unwrap().unwrap();
        assert_eq!(loaded.created_at, "2026-08-24T05:00:00+00:00");

        // A cutoff after the node's instant but before its local-time string
        // must not return it.
        let after = DateTime::parse_from_rfc3339("2026-08-24T06:00:00+00:00")
            .unwrap()
            .with_timezone(&Utc);
        assert!(store
            .find_created_after(after, &generate_node_id(), 100)
            .unwrap()
            .is_empty());

        let before = DateTime::parse_from_rfc3339("2026-08-24T04:00:00+00:00")
            .unwrap()
            .with_timezone(&Utc);
        let found = store
            .find_created_after(before, &generate_node_id(), 100)
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, n.id);
    }

    #[test]
    fn test_corrupt_node_type_is_an_error() {
        let store = SqliteGraphStore::in_memory().unwrap();
        store
            .conn
            .execute(
                "INSERT INTO nodes (id, title, node_type, summary, importance,
                                    sentiment, created_at)
                 VALUES ('node_bad', 'bad', 'dream', 's', 0.5, 0.0,
                         '2026-01-10T00:00:00+00:00')",
                [],
            )
            .unwrap();

        let err = store.find_by_id(&NodeId("node_bad".to_string())).unwrap_err();
        assert!(matches!(err, EngineError::CandidateQuery(_)));
    }

    #[test]
    fn test_corrupt_relation_type_is_an_error() {
        let store = SqliteGraphStore::in_memory().unwrap();
        store
            .conn
            .execute(
                "INSERT INTO node_connections (id, source_id, target_id,
                                               confidence, relation_type,
                                               summary, created_at)
                 VALUES ('conn_bad', 'node_a', 'node_b', 0.7, 'entangled',
                         's', '2026-01-10T00:00:00+00:00')",
                [],
            )
            .unwrap();

        let err = store
            .connections_for(&NodeId("node_a".to_string()))
            .unwrap_err();
        assert!(matches!(err, EngineError::CandidateQuery(_)));
    }

    #[test]
    fn test_two_handles_share_one_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("graph.db");

        let mut writer = SqliteGraphStore::new(&path).unwrap();
        let reader = SqliteGraphStore::new(&path).unwrap();

        let n = node("shared", "2026-01-10T00:00:00+00:00");
        writer.save_nodes(std::slice::from_ref(&n)).unwrap();

        let loaded = reader.find_by_id(&n.id).unwrap().unwrap();
        assert_eq!(loaded.title, "shared");
    }

    #[test]
    fn test_connections_for_matches_both_directions() {
        let mut store = SqliteGraphStore::in_memory().unwrap();
        let a = generate_node_id();
        let b = generate_node_id();
        let c = generate_node_id();

        let make = |source: &NodeId, target: &NodeId| Connection {
            id: generate_connection_id(),
            source_id: source.clone(),
            target_id: target.clone(),
            confidence: 0.7,
            relation_type: RelationType::SimilarTo,
            summary: "linked".to_string(),
            created_at: "2026-01-10T00:00:00+00:00".to_string(),
        };

        store
            .save_batch(&[make(&a, &b), make(&b, &a), make(&b, &c)])
            .unwrap();

        assert_eq!(store.connections_for(&a).unwrap().len(), 2);
        assert_eq!(store.connections_for(&b).unwrap().len(), 3);
        assert_eq!(store.connections_for(&c).unwrap().len(), 1);
    }
}
