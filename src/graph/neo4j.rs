use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;

use crate::error::{NewsgraphError, Result};
use crate::graph::{GraphNode, GraphRel, GraphStore, GraphValue, Record};

/// Request body for the Neo4j HTTP transaction endpoint
#[derive(Serialize)]
struct TxRequest {
    statements: Vec<Statement>,
}

#[derive(Serialize)]
struct Statement {
    statement: String,
    parameters: Value,
    #[serde(rename = "resultDataContents")]
    result_data_contents: Vec<&'static str>,
}

/// Response body from the transaction endpoint
#[derive(Deserialize)]
struct TxResponse {
    #[serde(default)]
    results: Vec<TxResult>,
    #[serde(default)]
    errors: Vec<TxError>,
}

#[derive(Deserialize)]
struct TxResult {
    columns: Vec<String>,
    data: Vec<TxRow>,
}

#[derive(Deserialize)]
struct TxRow {
    #[serde(default)]
    row: Vec<Value>,
    /// Per-column entity metadata; null for plain scalars
    #[serde(default)]
    meta: Vec<Value>,
    #[serde(default)]
    graph: GraphSection,
}

#[derive(Deserialize, Default)]
struct GraphSection {
    #[serde(default)]
    nodes: Vec<WireNode>,
    #[serde(default)]
    relationships: Vec<WireRel>,
}

#[derive(Deserialize)]
struct WireNode {
    id: String,
    #[serde(default)]
    labels: Vec<String>,
}

#[derive(Deserialize)]
struct WireRel {
    id: String,
    #[serde(rename = "type")]
    rel_type: String,
    #[serde(rename = "startNode")]
    start_node: String,
    #[serde(rename = "endNode")]
    end_node: String,
    #[serde(default)]
    properties: serde_json::Map<String, Value>,
}

#[derive(Deserialize)]
struct TxError {
    code: String,
    message: String,
}

/// Neo4j client over the HTTP transaction API.
///
/// Each call issues one `POST {uri}/db/{database}/tx/commit` with a single
/// statement, so the underlying connection is scoped to the request and
/// released on every exit path. Timeouts are enforced by the HTTP client.
pub struct Neo4jHttpStore {
    client: reqwest::Client,
    endpoint: String,
    auth_header: String,
}

impl Neo4jHttpStore {
    /// Create a new store client
    ///
    /// # Arguments
    ///
    /// * `uri` - Base URI, e.g. `http://localhost:7474`
    /// * `username` / `password` - Basic-auth credentials
    /// * `database` - Target database name (usually `neo4j`)
    pub fn new(uri: &str, username: &str, password: &str, database: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        let endpoint = format!("{}/db/{}/tx/commit", uri.trim_end_matches('/'), database);
        let auth_header = format!(
            "Basic {}",
            BASE64.encode(format!("{}:{}", username, password))
        );

        Ok(Self {
            client,
            endpoint,
            auth_header,
        })
    }
}

#[async_trait]
impl GraphStore for Neo4jHttpStore {
    async fn execute(&self, query: &str, params: Value) -> Result<Vec<Record>> {
        let request = TxRequest {
            statements: vec![Statement {
                statement: query.to_string(),
                parameters: params,
                // "row" carries property maps, "meta" the per-column entity ids,
                // "graph" the label sets and relationship endpoints
                result_data_contents: vec!["row", "meta", "graph"],
            }],
        };

        let response = self
            .client
            .post(&self.endpoint)
            .header("Authorization", &self.auth_header)
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| NewsgraphError::Store(format!("Network error: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error response".to_string());
            return Err(NewsgraphError::Store(format!(
                "Neo4j HTTP error {}: {}",
                status, body
            )));
        }

        let result: TxResponse = response
            .json()
            .await
            .map_err(|e| NewsgraphError::Store(format!("Failed to parse response: {}", e)))?;

        parse_tx_response(result)
    }
}

/// Map a transaction response into named-field records.
///
/// Column values are classified with the `meta` section (node vs relationship
/// vs scalar); label sets and relationship endpoints come from the `graph`
/// section keyed by internal id, properties from the `row` section.
fn parse_tx_response(response: TxResponse) -> Result<Vec<Record>> {
    if let Some(err) = response.errors.first() {
        return Err(NewsgraphError::Store(format!(
            "{}: {}",
            err.code, err.message
        )));
    }

    let result = match response.results.into_iter().next() {
        Some(r) => r,
        None => return Ok(Vec::new()),
    };

    let mut records = Vec::new();
    for row in result.data {
        let labels_by_id: HashMap<i64, Vec<String>> = row
            .graph
            .nodes
            .iter()
            .filter_map(|n| Some((n.id.parse::<i64>().ok()?, n.labels.clone())))
            .collect();
        let rels_by_id: HashMap<i64, &WireRel> = row
            .graph
            .relationships
            .iter()
            .filter_map(|r| Some((r.id.parse::<i64>().ok()?, r)))
            .collect();

        let mut fields = Vec::with_capacity(result.columns.len());
        for (i, column) in result.columns.iter().enumerate() {
            let value = row.row.get(i).cloned().unwrap_or(Value::Null);
            let meta = row.meta.get(i).cloned().unwrap_or(Value::Null);
            fields.push((column.clone(), classify(value, &meta, &labels_by_id, &rels_by_id)));
        }
        records.push(Record { fields });
    }

    Ok(records)
}

/// Classify one column value using its meta entry.
fn classify(
    value: Value,
    meta: &Value,
    labels_by_id: &HashMap<i64, Vec<String>>,
    rels_by_id: &HashMap<i64, &WireRel>,
) -> GraphValue {
    let (entity_id, entity_type) = match (meta.get("id").and_then(Value::as_i64), meta.get("type")) {
        (Some(id), Some(Value::String(t))) => (id, t.as_str()),
        _ => return GraphValue::Scalar(value),
    };

    let properties = value.as_object().cloned().unwrap_or_default();

    match entity_type {
        "node" => GraphValue::Node(GraphNode {
            id: entity_id,
            labels: labels_by_id.get(&entity_id).cloned().unwrap_or_default(),
            properties,
        }),
        "relationship" => match rels_by_id.get(&entity_id) {
            Some(rel) => GraphValue::Relationship(GraphRel {
                rel_type: rel.rel_type.clone(),
                start_id: rel.start_node.parse().unwrap_or(-1),
                end_id: rel.end_node.parse().unwrap_or(-1),
                properties: rel.properties.clone(),
            }),
            // Relationship meta without a graph entry; nothing to build an edge from
            None => GraphValue::Scalar(value),
        },
        _ => GraphValue::Scalar(value),
    }
}
