//! Language-service capability boundary.
//!
//! The engine consumes natural-language generation through exactly two
//! operations: a one-sentence relation summary and a relation-type
//! classification restricted to the closed `RelationType` set. Providers for
//! OpenAI and Ollama live here; tests substitute `StaticProvider`.

use anyhow::anyhow;
use async_trait::async_trait;
use knowledge_graph_schemas::{Node, RelationType};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use crate::error::{EngineError, Result};

#[async_trait]
pub trait LanguageProvider: Send + Sync {
    /// One-sentence characterization of the relationship between two nodes.
    async fn summarize_relation(&self, source: &Node, target: &Node) -> Result<String>;

    /// Classify the relationship into the closed relation-type set. The
    /// returned token is matched case-insensitively; anything outside the
    /// set is an `InvalidClassification` error.
    async fn classify_relation_type(
        &self,
        source_summary: &str,
        target_summary: &str,
    ) -> Result<RelationType>;
}

// ============================================================================
// Prompts
// ============================================================================

const SUMMARY_SYSTEM: &str = "You are a concise semantic graph summarizer.";

const CLASSIFICATION_SYSTEM: &str =
    "You are a semantic relation classifier for a knowledge graph.";

fn summary_prompt(source: &Node, target: &Node) -> String {
    format!(
        "Source Node: \"{}\"\nSummary: {}\n\nTarget Node: \"{}\"\nSummary: {}\n\n\
         Describe their relationship in one sentence:",
        source.title, source.summary, target.title, target.summary
    )
}

fn classification_prompt(source_summary: &str, target_summary: &str) -> String {
    format!(
        "Between the following two pieces of text, classify their relationship using one of:\n\
         \"caused_by\", \"inspired_by\", \"contradicts\", \"similar_to\", \"continues_from\", \
         \"depends_on\", \"associated_with\" or \"reflects_on\".\n\n\
         Source Node: {}\nTarget Node: {}\n\nReturn ONLY the keyword.",
        source_summary, target_summary
    )
}

fn parse_classification(token: &str) -> Result<RelationType> {
    let token = token.trim().to_lowercase();
    if token.is_empty() {
        return Err(EngineError::EmptyGeneration);
    }
    RelationType::parse(&token).ok_or(EngineError::InvalidClassification(token))
}

// ============================================================================
// OpenAI
// ============================================================================

pub struct OpenAiProvider {
    client: Client,
    api_key: String,
    model: String,
}

impl OpenAiProvider {
    pub fn new(api_key: String, model: Option<String>) -> Self {
        Self {
            client: Client::new(),
            api_key,
            model: model.unwrap_or_else(|| "gpt-4o-mini".to_string()),
        }
    }

    async fn call_openai(&self, prompt: String, system: &str, temperature: f32) -> Result<String> {
        let request_body = json!({
            "model": self.model,
            "temperature": temperature,
            "messages": [
                { "role": "system", "content": system },
                { "role": "user", "content": prompt }
            ]
        });

        let response = self
            .client
            .post("https://api.openai.com/v1/chat/completions")
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request_body)
            .send()
            .await
            .map_err(|e| EngineError::Language(e.into()))?;

        if !response.status().is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "unreadable body".to_string());
            return Err(EngineError::Language(anyhow!(
                "OpenAI API error: {}",
                error_text
            )));
        }

        let response_json: OpenAiResponse = response
            .json()
            .await
            .map_err(|e| EngineError::Language(e.into()))?;

        response_json
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .filter(|content| !content.trim().is_empty())
            .map(|content| content.trim().to_string())
            .ok_or(EngineError::EmptyGeneration)
    }
}

#[async_trait]
impl LanguageProvider for OpenAiProvider {
    async fn summarize_relation(&self, source: &Node, target: &Node) -> Result<String> {
        self.call_openai(summary_prompt(source, target), SUMMARY_SYSTEM, 0.7)
            .await
    }

    async fn classify_relation_type(
        &self,
        source_summary: &str,
        target_summary: &str,
    ) -> Result<RelationType> {
        let token = self
            .call_openai(
                classification_prompt(source_summary, target_summary),
                CLASSIFICATION_SYSTEM,
                0.0,
            )
            .await?;
        parse_classification(&token)
    }
}

// ============================================================================
// Ollama
// ============================================================================

pub struct OllamaProvider {
    client: Client,
    base_url: String,
    model: String,
}

impl OllamaProvider {
    pub fn new(model: Option<String>, base_url: Option<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.unwrap_or_else(|| "http://localhost:11434".to_string()),
            model: model.unwrap_or_else(|| "llama3.2".to_string()),
        }
    }

    async fn call_ollama(&self, prompt: String) -> Result<String> {
        let request_body = json!({
            "model": self.model,
            "prompt": prompt,
            "stream": false
        });

        let response = self
            .client
            .post(format!("{}/api/generate", self.base_url))
            .json(&request_body)
            .send()
            .await
            .map_err(|e| EngineError::Language(e.into()))?;

        if !response.status().is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "unreadable body".to_string());
            return Err(EngineError::Language(anyhow!(
                "Ollama API error: {}",
                error_text
            )));
        }

        let response_json: OllamaResponse = response
            .json()
            .await
            .map_err(|e| EngineError::Language(e.into()))?;

        if response_json.response.trim().is_empty() {
            return Err(EngineError::EmptyGeneration);
        }

        Ok(response_json.response.trim().to_string())
    }
}

#[async_trait]
impl LanguageProvider for OllamaProvider {
    async fn summarize_relation(&self, source: &Node, target: &Node) -> Result<String> {
        let prompt = format!("{}\n\n{}", SUMMARY_SYSTEM, summary_prompt(source, target));
        self.call_ollama(prompt).await
    }

    async fn classify_relation_type(
        &self,
        source_summary: &str,
        target_summary: &str,
    ) -> Result<RelationType> {
        let prompt = format!(
            "{}\n\n{}",
            CLASSIFICATION_SYSTEM,
            classification_prompt(source_summary, target_summary)
        );
        let token = self.call_ollama(prompt).await?;
        parse_classification(&token)
    }
}

// ============================================================================
// Deterministic provider for tests
// ============================================================================

/// Canned responses, no network. The classification is stored as a raw token
/// so tests can exercise the invalid-classification path too.
pub struct StaticProvider {
    pub summary: String,
    pub classification: String,
}

impl StaticProvider {
    pub fn new(summary: &str, classification: &str) -> Self {
        Self {
            summary: summary.to_string(),
            classification: classification.to_string(),
        }
    }
}

#[async_trait]
impl LanguageProvider for StaticProvider {
    async fn summarize_relation(&self, _source: &Node, _target: &Node) -> Result<String> {
        if self.summary.trim().is_empty() {
            return Err(EngineError::EmptyGeneration);
        }
        Ok(self.summary.clone())
    }

    async fn classify_relation_type(
        &self,
        _source_summary: &str,
        _target_summary: &str,
    ) -> Result<RelationType> {
        parse_classification(&self.classification)
    }
}

// Response structures

#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    choices: Vec<OpenAiChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: OpenAiMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAiMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OllamaResponse {
    response: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use knowledge_graph_schemas::{generate_node_id, NodeMetadata, NodeType};

    fn node(title: &str, summary: &str) -> Node {
        Node {
            id: generate_node_id(),
            title: title.to_string(),
            node_type: NodeType::Idea,
            summary: summary.to_string(),
            embeddings: None,
            importance: 0.5,
            sentiment: 0.0,
            memory_weight: 0.0,
            metadata: NodeMetadata::default(),
            created_at: "2026-01-01T00:00:00Z".to_string(),
        }
    }

    #[tokio::test]
    async fn test_static_provider_summary() {
        let provider = StaticProvider::new("They share a theme", "similar_to");
        let a = node("A", "first");
        let b = node("B", "second");

        let summary = provider.summarize_relation(&a, &b).await.unwrap();
        assert_eq!(summary, "They share a theme");
    }

    #[tokio::test]
    async fn test_static_provider_classification_case_insensitive() {
        let provider = StaticProvider::new("s", "Depends_On");
        let relation = provider.classify_relation_type("a", "b").await.unwrap();
        assert_eq!(relation, RelationType::DependsOn);
    }

    #[tokio::test]
    async fn test_unknown_classification_is_rejected() {
        let provider = StaticProvider::new("s", "unknown");
        let err = provider.classify_relation_type("a", "b").await.unwrap_err();
        assert!(matches!(err, EngineError::InvalidClassification(token) if token == "unknown"));
    }

    #[tokio::test]
    async fn test_empty_classification_is_empty_generation() {
        let provider = StaticProvider::new("s", "   ");
        let err = provider.classify_relation_type("a", "b").await.unwrap_err();
        assert!(matches!(err, EngineError::EmptyGeneration));
    }

    #[tokio::test]
    async fn test_empty_summary_is_empty_generation() {
        let provider = StaticProvider::new("", "similar_to");
        let a = node("A", "first");
        let b = node("B", "second");
        let err = provider.summarize_relation(&a, &b).await.unwrap_err();
        assert!(matches!(err, EngineError::EmptyGeneration));
    }

    #[test]
    fn test_prompt_includes_titles_and_summaries() {
        let a = node("Morning pages", "Wrote three pages about focus");
        let b = node("Deep work", "A block of uninterrupted work");
        let prompt = summary_prompt(&a, &b);
        assert!(prompt.contains("Morning pages"));
        assert!(prompt.contains("uninterrupted work"));
        assert!(prompt.ends_with("one sentence:"));
    }
}
