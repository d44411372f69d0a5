//! Graph store capability: parameterized query execution returning typed records.
//!
//! The retrieval engine only depends on the [`GraphStore`] trait; the concrete
//! Neo4j HTTP client lives in [`neo4j`].

mod neo4j;

pub use neo4j::Neo4jHttpStore;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;

/// A node as returned by the graph store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphNode {
    /// Store-internal identifier
    pub id: i64,
    /// Label set, e.g. `["Content"]`
    pub labels: Vec<String>,
    /// Store-native property map
    pub properties: serde_json::Map<String, Value>,
}

/// A relationship as returned by the graph store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphRel {
    pub rel_type: String,
    pub start_id: i64,
    pub end_id: i64,
    pub properties: serde_json::Map<String, Value>,
}

/// One value of a record field: node-shaped, relationship-shaped, or a scalar.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum GraphValue {
    Node(GraphNode),
    Relationship(GraphRel),
    Scalar(Value),
}

impl GraphValue {
    pub fn as_node(&self) -> Option<&GraphNode> {
        match self {
            GraphValue::Node(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_relationship(&self) -> Option<&GraphRel> {
        match self {
            GraphValue::Relationship(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            GraphValue::Scalar(v) => v.as_f64(),
            _ => None,
        }
    }

    /// Interpret a scalar array as an embedding vector.
    pub fn as_float_vec(&self) -> Option<Vec<f32>> {
        match self {
            GraphValue::Scalar(Value::Array(items)) => items
                .iter()
                .map(|v| v.as_f64().map(|f| f as f32))
                .collect(),
            _ => None,
        }
    }
}

/// One result row: named fields in the order the query returned them.
#[derive(Debug, Clone)]
pub struct Record {
    pub fields: Vec<(String, GraphValue)>,
}

impl Record {
    pub fn get(&self, name: &str) -> Option<&GraphValue> {
        self.fields
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, value)| value)
    }

    pub fn values(&self) -> impl Iterator<Item = &GraphValue> {
        self.fields.iter().map(|(_, value)| value)
    }
}

/// Parameterized graph query execution.
///
/// `params` must be a JSON object; implementations pass it through to the
/// store without interpolating values into the query text.
#[async_trait]
pub trait GraphStore: Send + Sync {
    async fn execute(&self, query: &str, params: Value) -> Result<Vec<Record>>;
}
