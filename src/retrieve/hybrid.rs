//! Hybrid strategy: vector search for seed chunks, then a single targeted
//! graph expansion restricted to exactly those seeds. Per-article relevance
//! is the maximum similarity of any of its matched chunks.

use serde_json::json;
use std::collections::HashMap;

use crate::config::RetrievalConfig;
use crate::error::Result;
use crate::graph::GraphStore;
use crate::llm::LlmProvider;
use crate::retrieve::assemble::{self, Assembler};
use crate::retrieve::{vector, PropertyValue, Retrieval, RetrievalDebug, StrategyKind};

/// Context returned when the vector search finds no seeds
pub const NO_CONTENT_CONTEXT: &str = "관련 콘텐츠를 찾을 수 없습니다.";

/// Targeted expansion over exactly the seed chunk ids; unlike the vector
/// strategy this is the only expansion performed
const EXPAND_QUERY: &str = "\
MATCH (c:Content)
WHERE id(c) IN $content_ids
MATCH (a:Article)-[:HAS_CHUNK]->(c)
OPTIONAL MATCH (a)-[:BELONGS_TO]->(cat:Category)
OPTIONAL MATCH (m:Media)-[:PUBLISHED]->(a)
RETURN DISTINCT a, cat, m, c, id(c) AS content_id
ORDER BY id(c)";

/// Second pass over the same pattern with all relationship variables bound
const EDGE_QUERY: &str = "\
MATCH (c:Content)
WHERE id(c) IN $content_ids
MATCH (a:Article)-[r1:HAS_CHUNK]->(c)
OPTIONAL MATCH (a)-[r2:BELONGS_TO]->(cat:Category)
OPTIONAL MATCH (m:Media)-[r3:PUBLISHED]->(a)
RETURN r1, r2, r3, a, cat, m, c";

/// Run the hybrid strategy.
pub async fn retrieve(
    store: &dyn GraphStore,
    provider: &dyn LlmProvider,
    query: &str,
    params: &RetrievalConfig,
) -> Result<Retrieval> {
    let seed_search = vector::similar_chunks(store, provider, query, params).await?;

    if seed_search.seeds.is_empty() {
        return Ok(Retrieval {
            nodes: Vec::new(),
            edges: Vec::new(),
            context: NO_CONTENT_CONTEXT.to_string(),
            debug: RetrievalDebug {
                strategy: StrategyKind::Hybrid.name().to_string(),
                executed_query: seed_search.executed_query,
                node_count: 0,
                edge_count: 0,
            },
        });
    }

    let content_scores: HashMap<String, f64> = seed_search
        .seeds
        .iter()
        .filter_map(|n| Some((n.id.clone(), n.score()?)))
        .collect();
    let content_ids: Vec<i64> = seed_search
        .seeds
        .iter()
        .filter_map(|n| n.id.parse().ok())
        .collect();

    let records = store
        .execute(EXPAND_QUERY, json!({"content_ids": content_ids}))
        .await?;
    log::debug!("Hybrid expansion returned {} records", records.len());

    // Relevance first: the max seed similarity per article across all rows,
    // so the score is final before any article node is inserted
    let mut article_scores: HashMap<String, f64> = HashMap::new();
    for record in &records {
        let article = match record.get("a").and_then(|v| v.as_node()) {
            Some(a) => a,
            None => continue,
        };
        let content_id = record
            .get("content_id")
            .and_then(|v| v.as_f64())
            .map(|id| (id as i64).to_string());
        let score = content_id
            .and_then(|id| content_scores.get(&id).copied())
            .unwrap_or(0.0);
        let entry = article_scores.entry(article.id.to_string()).or_insert(score);
        if score > *entry {
            *entry = score;
        }
    }

    // Seed chunks first, scores already attached
    let mut assembler = Assembler::new();
    for seed in seed_search.seeds {
        assembler.push_node(seed);
    }

    // Then articles, then Category/Media gated on the article match existing
    // in the same row
    for record in &records {
        let article = record.get("a").and_then(|v| v.as_node());
        if let Some(article) = article {
            let mut node = assemble::node_from_graph(article);
            if let Some(score) = article_scores.get(&node.id) {
                node.properties.insert(
                    "relevance_score".to_string(),
                    PropertyValue::Float(*score),
                );
            }
            assembler.push_node(node);

            for field in ["cat", "m"] {
                if let Some(neighbor) = record.get(field).and_then(|v| v.as_node()) {
                    assembler.push_node(assemble::node_from_graph(neighbor));
                }
            }
        }
    }

    let edge_records = store
        .execute(EDGE_QUERY, json!({"content_ids": content_ids}))
        .await?;
    for record in &edge_records {
        for field in ["r1", "r2", "r3"] {
            if let Some(rel) = record.get(field).and_then(|v| v.as_relationship()) {
                assembler.push_edge(assemble::edge_from_rel(rel));
            }
        }
    }

    let article_count = assembler
        .nodes()
        .iter()
        .filter(|n| n.node_type == "Article")
        .count();
    let context = format!(
        "{}\n\n관련 기사 {}개 발견",
        seed_search.context, article_count
    );

    let (nodes, edges) = assembler.finish();
    let debug = RetrievalDebug {
        strategy: StrategyKind::Hybrid.name().to_string(),
        executed_query: EXPAND_QUERY.to_string(),
        node_count: nodes.len(),
        edge_count: edges.len(),
    };

    Ok(Retrieval {
        nodes,
        edges,
        context,
        debug,
    })
}
