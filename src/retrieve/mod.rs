//! Retrieval engine: strategy selection, the three retrieval strategies, and
//! the shared result assembly types.
//!
//! Control flow per query: [`selector::select`] picks one strategy, the
//! strategy fetches graph matches and assembles a [`Retrieval`]. Everything
//! here is created fresh per call; no state is shared across requests.

pub mod assemble;
pub mod hybrid;
pub mod selector;
pub mod text2cypher;
pub mod vector;

pub use selector::StrategyKind;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::config::RetrievalConfig;
use crate::error::Result;
use crate::graph::GraphStore;
use crate::llm::LlmProvider;

/// A property value: scalar, text, or an array of floats (embeddings).
///
/// Closed union so serialization and the label fallback chain stay
/// type-safe; unrepresentable store values are carried as their JSON text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    FloatList(Vec<f32>),
}

impl PropertyValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            PropertyValue::Float(f) => Some(*f),
            PropertyValue::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropertyValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&Value> for PropertyValue {
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => PropertyValue::Null,
            Value::Bool(b) => PropertyValue::Bool(*b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => PropertyValue::Int(i),
                None => PropertyValue::Float(n.as_f64().unwrap_or(0.0)),
            },
            Value::String(s) => PropertyValue::Text(s.clone()),
            Value::Array(items) => {
                let floats: Option<Vec<f32>> = items
                    .iter()
                    .map(|v| v.as_f64().map(|f| f as f32))
                    .collect();
                match floats {
                    Some(f) => PropertyValue::FloatList(f),
                    None => PropertyValue::Text(value.to_string()),
                }
            }
            Value::Object(_) => PropertyValue::Text(value.to_string()),
        }
    }
}

/// A graph entity surfaced to the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    /// Stringified store-internal id, unique within one response
    pub id: String,
    /// Display label: name, else title, else first 50 chars of text, else id
    pub label: String,
    /// Node type tag: Media, Article, Category, Content or Unknown
    #[serde(rename = "type")]
    pub node_type: String,
    pub properties: BTreeMap<String, PropertyValue>,
}

impl Node {
    /// Engine-derived score, if any (similarity for Content, relevance for Article).
    pub fn score(&self) -> Option<f64> {
        self.properties
            .get("similarity_score")
            .or_else(|| self.properties.get("relevance_score"))
            .and_then(PropertyValue::as_f64)
    }
}

/// A directed relationship between two nodes present in the same response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Edge {
    pub source: String,
    pub target: String,
    pub relationship: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<BTreeMap<String, PropertyValue>>,
}

/// Structured report of what a strategy executed, returned with each call
/// instead of being kept as mutable state on the strategy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalDebug {
    pub strategy: String,
    pub executed_query: String,
    pub node_count: usize,
    pub edge_count: usize,
}

/// Result of one retrieve call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Retrieval {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
    /// Grounded context text for answer generation
    pub context: String,
    pub debug: RetrievalDebug,
}

/// Retrieval engine facade: selector plus the three strategies bound to a
/// graph store and an LLM provider.
pub struct Engine {
    store: Arc<dyn GraphStore>,
    provider: Arc<dyn LlmProvider>,
    params: RetrievalConfig,
}

impl Engine {
    pub fn new(
        store: Arc<dyn GraphStore>,
        provider: Arc<dyn LlmProvider>,
        params: RetrievalConfig,
    ) -> Self {
        Self {
            store,
            provider,
            params,
        }
    }

    /// Pick a strategy for the query text. Pure; no I/O.
    pub fn select(&self, query: &str) -> StrategyKind {
        selector::select(query)
    }

    /// Select a strategy and run it.
    pub async fn retrieve(&self, query: &str) -> Result<Retrieval> {
        let kind = self.select(query);
        log::info!("Selected strategy {} for query: {}", kind.name(), query);
        self.retrieve_with(kind, query).await
    }

    /// Run a specific strategy, bypassing selection.
    pub async fn retrieve_with(&self, kind: StrategyKind, query: &str) -> Result<Retrieval> {
        match kind {
            StrategyKind::Vector => {
                vector::retrieve(&*self.store, &*self.provider, query, &self.params).await
            }
            StrategyKind::Text2Cypher => {
                text2cypher::retrieve(&*self.store, &*self.provider, query, &self.params).await
            }
            StrategyKind::Hybrid => {
                hybrid::retrieve(&*self.store, &*self.provider, query, &self.params).await
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted store/provider doubles for strategy tests.

    use super::*;
    use crate::error::NewsgraphError;
    use crate::graph::{GraphNode, GraphRel, GraphValue, Record};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Graph store that replays queued responses and records executed queries.
    pub struct ScriptedStore {
        responses: Mutex<VecDeque<Result<Vec<Record>>>>,
        pub executed: Mutex<Vec<(String, Value)>>,
    }

    impl ScriptedStore {
        pub fn new(responses: Vec<Result<Vec<Record>>>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                executed: Mutex::new(Vec::new()),
            }
        }

        pub fn executed_queries(&self) -> Vec<String> {
            self.executed
                .lock()
                .unwrap()
                .iter()
                .map(|(q, _)| q.clone())
                .collect()
        }
    }

    #[async_trait]
    impl GraphStore for ScriptedStore {
        async fn execute(&self, query: &str, params: Value) -> Result<Vec<Record>> {
            self.executed
                .lock()
                .unwrap()
                .push((query.to_string(), params));
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(NewsgraphError::Store("no scripted response".to_string())))
        }
    }

    /// Provider returning fixed generate/embed results.
    pub struct ScriptedProvider {
        pub generate_result: Mutex<Option<Result<String>>>,
        pub embed_result: Mutex<Option<Result<Vec<Vec<f32>>>>>,
    }

    impl ScriptedProvider {
        pub fn embedding(vector: Vec<f32>) -> Self {
            Self {
                generate_result: Mutex::new(None),
                embed_result: Mutex::new(Some(Ok(vec![vector]))),
            }
        }

        pub fn generation(text: &str) -> Self {
            Self {
                generate_result: Mutex::new(Some(Ok(text.to_string()))),
                embed_result: Mutex::new(None),
            }
        }

        pub fn failing_generation(message: &str) -> Self {
            Self {
                generate_result: Mutex::new(Some(Err(NewsgraphError::Provider(
                    message.to_string(),
                )))),
                embed_result: Mutex::new(None),
            }
        }
    }

    #[async_trait]
    impl LlmProvider for ScriptedProvider {
        async fn generate(&self, _prompt: &str, _system: Option<&str>) -> Result<String> {
            self.generate_result
                .lock()
                .unwrap()
                .take()
                .unwrap_or_else(|| Err(NewsgraphError::Provider("no scripted generation".to_string())))
        }

        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            match self.embed_result.lock().unwrap().take() {
                Some(Ok(vectors)) => {
                    // One vector per input, repeating the scripted vector
                    let v = vectors.into_iter().next().unwrap_or_default();
                    Ok(texts.iter().map(|_| v.clone()).collect())
                }
                Some(Err(e)) => Err(e),
                None => Err(NewsgraphError::Provider("no scripted embedding".to_string())),
            }
        }
    }

    /// Build a Content node record as the vector index query would return it.
    pub fn content_record(id: i64, text: &str, score: f64) -> Record {
        Record {
            fields: vec![
                (
                    "node".to_string(),
                    GraphValue::Node(content_graph_node(id, text)),
                ),
                (
                    "score".to_string(),
                    GraphValue::Scalar(serde_json::json!(score)),
                ),
            ],
        }
    }

    pub fn content_graph_node(id: i64, text: &str) -> GraphNode {
        GraphNode {
            id,
            labels: vec!["Content".to_string()],
            properties: serde_json::json!({"text": text, "chunk_index": 0})
                .as_object()
                .unwrap()
                .clone(),
        }
    }

    pub fn article_graph_node(id: i64, title: &str) -> GraphNode {
        GraphNode {
            id,
            labels: vec!["Article".to_string()],
            properties: serde_json::json!({"title": title})
                .as_object()
                .unwrap()
                .clone(),
        }
    }

    pub fn named_graph_node(id: i64, label: &str, name: &str) -> GraphNode {
        GraphNode {
            id,
            labels: vec![label.to_string()],
            properties: serde_json::json!({"name": name})
                .as_object()
                .unwrap()
                .clone(),
        }
    }

    pub fn rel(rel_type: &str, start_id: i64, end_id: i64) -> GraphRel {
        GraphRel {
            rel_type: rel_type.to_string(),
            start_id,
            end_id,
            properties: serde_json::Map::new(),
        }
    }
}
