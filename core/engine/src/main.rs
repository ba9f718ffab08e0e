use anyhow::Result;
use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use knowledge_graph_engine::{
    ConnectionEngine, ConnectionStore, LanguageProvider, NodeStore, OllamaProvider,
    OpenAiProvider, SqliteGraphStore,
};
use knowledge_graph_schemas::{Node, NodeId};
use std::sync::Arc;
use tokio::sync::Mutex;
use tower_http::trace::TraceLayer;
use tracing::{error, info, Level};

#[derive(Clone)]
struct AppState {
    engine: Arc<Mutex<ConnectionEngine>>,
    // Separate connection for read endpoints and node intake; the engine
    // keeps its own handle on the same database file.
    store: Arc<Mutex<SqliteGraphStore>>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt().with_max_level(Level::INFO).init();

    info!("Knowledge Graph Connection Service v0.1.0");

    let db_path = std::env::var("DB_PATH").unwrap_or_else(|_| {
        let home = std::env::var("HOME").unwrap();
        format!("{}/.local/share/KnowledgeGraph/graph.db", home)
    });

    if let Some(parent) = std::path::Path::new(&db_path).parent() {
        std::fs::create_dir_all(parent)?;
    }

    let engine_store = SqliteGraphStore::new(&db_path)?;
    let store = SqliteGraphStore::new(&db_path)?;
    info!("Graph store ready at: {}", db_path);

    let language = build_language_provider();
    let engine = ConnectionEngine::new(Box::new(engine_store), language);

    let state = AppState {
        engine: Arc::new(Mutex::new(engine)),
        store: Arc::new(Mutex::new(store)),
    };

    // Build router
    let app = Router::new()
        .route("/health", get(health_check))
        .route("/nodes", post(create_node))
        .route("/nodes/:id", get(get_node))
        .route("/nodes/:id/connections", get(get_node_connections))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = "127.0.0.1:21970";
    info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn build_language_provider() -> Box<dyn LanguageProvider> {
    match std::env::var("OPENAI_KEY") {
        Ok(key) => {
            info!("Using OpenAI language provider");
            Box::new(OpenAiProvider::new(key, std::env::var("OPENAI_MODEL").ok()))
        }
        Err(_) => {
            info!("OPENAI_KEY not set, using local Ollama provider");
            Box::new(OllamaProvider::new(
                std::env::var("OLLAMA_MODEL").ok(),
                std::env::var("OLLAMA_URL").ok(),
            ))
        }
    }
}

async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "service": "connection-engine",
        "status": "healthy",
        "version": "0.1.0"
    }))
}

/// Store an incoming node and run the connection engine over it. The node
/// arrives complete (embeddings included); its already-connected neighbors
/// are looked up from the stored connection records.
async fn create_node(
    State(state): State<AppState>,
    Json(node): Json<Node>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    info!("Ingesting node: {} ({})", node.id, node.node_type.as_str());

    let neighbors = {
        let mut store = state.store.lock().await;
        store
            .save_nodes(std::slice::from_ref(&node))
            .map_err(internal_error)?;
        connected_neighbors(&*store, &node).map_err(internal_error)?
    };

    let mut engine = state.engine.lock().await;
    engine
        .process_node(&node, &neighbors)
        .await
        .map_err(internal_error)?;

    Ok((StatusCode::CREATED, Json(node)))
}

async fn get_node(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let store = state.store.lock().await;
    let node = store.find_by_id(&NodeId(id.clone())).map_err(internal_error)?;

    match node {
        Some(node) => Ok(Json(node)),
        None => Err((StatusCode::NOT_FOUND, format!("Node {} not found", id))),
    }
}

async fn get_node_connections(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let store = state.store.lock().await;
    let connections = store
        .connections_for(&NodeId(id))
        .map_err(internal_error)?;
    Ok(Json(connections))
}

/// Load the nodes already connected to `node`, either direction. Pairs are
/// stored as two directed records, so each neighbor is collected once.
fn connected_neighbors(
    store: &SqliteGraphStore,
    node: &Node,
) -> knowledge_graph_engine::Result<Vec<Node>> {
    let connections = store.connections_for(&node.id)?;

    let mut seen = std::collections::HashSet::new();
    let mut neighbors = Vec::new();
    for connection in connections {
        let neighbor_id = if connection.source_id == node.id {
            connection.target_id
        } else {
            connection.source_id
        };
        if !seen.insert(neighbor_id.clone()) {
            continue;
        }
        if let Some(neighbor) = store.find_by_id(&neighbor_id)? {
            neighbors.push(neighbor);
        }
    }
    Ok(neighbors)
}

fn internal_error<E: std::fmt::Display>(e: E) -> (StatusCode, String) {
    error!("Request failed: {}", e);
    (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
}
