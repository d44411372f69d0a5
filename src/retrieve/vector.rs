//! Vector strategy: embed the query, find the most similar Content chunks,
//! expand each chunk to its owning Article/Category/Media.

use serde_json::json;

use crate::config::RetrievalConfig;
use crate::error::{NewsgraphError, Result};
use crate::graph::{GraphNode, GraphStore};
use crate::llm::LlmProvider;
use crate::retrieve::assemble::{self, Assembler};
use crate::retrieve::{Node, PropertyValue, Retrieval, RetrievalDebug, StrategyKind};

/// Context returned when no chunk clears the similarity threshold
pub const NO_CONTENT_CONTEXT: &str = "검색어와 관련된 콘텐츠를 찾을 수 없습니다.";

/// Nearest-neighbor lookup against the vector index (Neo4j 5.x)
const INDEX_QUERY: &str = "\
CALL db.index.vector.queryNodes('content-embeddings', $k, $embedding)
YIELD node, score
RETURN node, score
ORDER BY score DESC";

/// Brute-force fallback when the index is unavailable: fetch embedded
/// Content candidates and score them locally
const SCAN_QUERY: &str = "\
MATCH (c:Content)
WHERE c.embedding IS NOT NULL
RETURN c, c.embedding AS embedding
LIMIT $limit";

/// Expansion from retained chunks to their owning article and its
/// category/media neighbors
const EXPAND_QUERY: &str = "\
MATCH (c:Content)
WHERE id(c) IN $content_ids
MATCH (a:Article)-[r:HAS_CHUNK]->(c)
OPTIONAL MATCH (a)-[:BELONGS_TO]->(cat:Category)
OPTIONAL MATCH (m:Media)-[:PUBLISHED]->(a)
RETURN DISTINCT a, cat, m, r, c";

/// Seed chunks retained by the similarity filter, shared with the hybrid
/// strategy so it does not re-embed the query.
pub(crate) struct SeedSearch {
    pub seeds: Vec<Node>,
    pub context: String,
    pub executed_query: String,
}

/// Find the top-K Content chunks most similar to the query.
///
/// Tries the index lookup first; a store failure there (e.g. index absent)
/// falls back to scoring up to `candidate_limit` embedded chunks locally.
/// An embedding failure aborts the call.
pub(crate) async fn similar_chunks(
    store: &dyn GraphStore,
    provider: &dyn LlmProvider,
    query: &str,
    params: &RetrievalConfig,
) -> Result<SeedSearch> {
    let embeddings = provider.embed(&[query.to_string()]).await?;
    let query_vec = embeddings
        .into_iter()
        .next()
        .filter(|v| !v.is_empty())
        .ok_or_else(|| NewsgraphError::Provider("Empty embedding response".to_string()))?;

    // (node, score) candidates, sorted descending below
    let mut scored: Vec<(GraphNode, f64)> = Vec::new();
    let executed_query;

    match store
        .execute(
            INDEX_QUERY,
            json!({"k": params.top_k, "embedding": query_vec.clone()}),
        )
        .await
    {
        Ok(records) => {
            executed_query = INDEX_QUERY.to_string();
            for record in &records {
                let node = record.get("node").and_then(|v| v.as_node());
                let score = record.get("score").and_then(|v| v.as_f64());
                if let (Some(node), Some(score)) = (node, score) {
                    scored.push((node.clone(), score));
                }
            }
        }
        Err(e) => {
            log::warn!("Vector index lookup failed ({}), falling back to local scan", e);
            executed_query = SCAN_QUERY.to_string();
            let records = store
                .execute(SCAN_QUERY, json!({"limit": params.candidate_limit}))
                .await?;
            for record in &records {
                let node = record.get("c").and_then(|v| v.as_node());
                let embedding = record.get("embedding").and_then(|v| v.as_float_vec());
                if let (Some(node), Some(embedding)) = (node, embedding) {
                    if embedding.len() != query_vec.len() {
                        continue;
                    }
                    let similarity = cosine_similarity(&query_vec, &embedding) as f64;
                    scored.push((node.clone(), similarity));
                }
            }
        }
    }

    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

    // Threshold filter, then first-seen dedup, then top-K
    let mut assembler = Assembler::new();
    let mut context_parts = Vec::new();
    for (graph_node, score) in scored {
        if score < params.similarity_threshold as f64 {
            continue;
        }
        if assembler.node_count() >= params.top_k {
            break;
        }
        let text = graph_node
            .properties
            .get("text")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string();
        let mut node = assemble::node_from_graph(&graph_node);
        node.properties
            .insert("similarity_score".to_string(), PropertyValue::Float(score));
        if assembler.push_node(node) {
            context_parts.push(text);
        }
    }

    let (seeds, _) = assembler.finish();
    let context = if context_parts.is_empty() {
        NO_CONTENT_CONTEXT.to_string()
    } else {
        context_parts
            .iter()
            .take(params.context_chunks)
            .cloned()
            .collect::<Vec<_>>()
            .join("\n\n")
    };

    log::debug!("Vector search retained {} seed chunks", seeds.len());

    Ok(SeedSearch {
        seeds,
        context,
        executed_query,
    })
}

/// Run the vector strategy end to end.
pub async fn retrieve(
    store: &dyn GraphStore,
    provider: &dyn LlmProvider,
    query: &str,
    params: &RetrievalConfig,
) -> Result<Retrieval> {
    let seed_search = similar_chunks(store, provider, query, params).await?;

    let mut assembler = Assembler::new();
    let content_ids: Vec<i64> = seed_search
        .seeds
        .iter()
        .filter_map(|n| n.id.parse().ok())
        .collect();
    for seed in seed_search.seeds {
        assembler.push_node(seed);
    }

    // Expand to Article/Category/Media; a failure here is reported but the
    // chunks already gathered are still returned
    if !content_ids.is_empty() {
        match store
            .execute(EXPAND_QUERY, json!({"content_ids": content_ids}))
            .await
        {
            Ok(records) => {
                for record in &records {
                    for field in ["a", "cat", "m"] {
                        if let Some(node) = record.get(field).and_then(|v| v.as_node()) {
                            assembler.push_node(assemble::node_from_graph(node));
                        }
                    }
                    if let Some(rel) = record.get("r").and_then(|v| v.as_relationship()) {
                        assembler.push_edge(assemble::edge_from_rel(rel));
                    }
                }
            }
            Err(e) => {
                log::error!("Graph expansion failed, returning chunks only: {}", e);
            }
        }
    }

    let (nodes, edges) = assembler.finish();
    let debug = RetrievalDebug {
        strategy: StrategyKind::Vector.name().to_string(),
        executed_query: seed_search.executed_query,
        node_count: nodes.len(),
        edge_count: edges.len(),
    };

    Ok(Retrieval {
        nodes,
        edges,
        context: seed_search.context,
        debug,
    })
}

/// Cosine similarity `dot(a, b) / (|a| * |b|)`; 0.0 for zero-magnitude or
/// mismatched-length vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let mag_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let mag_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if mag_a == 0.0 || mag_b == 0.0 {
        return 0.0;
    }

    dot / (mag_a * mag_b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retrieve::testing::{
        article_graph_node, content_graph_node, content_record, named_graph_node, rel,
        ScriptedProvider, ScriptedStore,
    };
    use crate::graph::{GraphValue, Record};
    use crate::error::NewsgraphError;
    use std::collections::HashSet;

    fn test_params() -> RetrievalConfig {
        RetrievalConfig::default()
    }

    fn expansion_record() -> Record {
        Record {
            fields: vec![
                (
                    "a".to_string(),
                    GraphValue::Node(article_graph_node(10, "반도체 수출 기사")),
                ),
                (
                    "cat".to_string(),
                    GraphValue::Node(named_graph_node(20, "Category", "경제")),
                ),
                (
                    "m".to_string(),
                    GraphValue::Node(named_graph_node(30, "Media", "연합뉴스")),
                ),
                (
                    "r".to_string(),
                    GraphValue::Relationship(rel("HAS_CHUNK", 10, 1)),
                ),
                (
                    "c".to_string(),
                    GraphValue::Node(content_graph_node(1, "청크 본문")),
                ),
            ],
        }
    }

    #[tokio::test]
    async fn test_index_path_with_expansion() {
        let store = ScriptedStore::new(vec![
            Ok(vec![
                content_record(1, "반도체 수출이 늘었다", 0.9),
                content_record(2, "다른 청크", 0.7),
            ]),
            Ok(vec![expansion_record()]),
        ]);
        let provider = ScriptedProvider::embedding(vec![1.0, 0.0]);
        let result = retrieve(&store, &provider, "AI 반도체", &test_params())
            .await
            .unwrap();

        // 2 chunks + article + category + media
        assert_eq!(result.nodes.len(), 5);
        assert_eq!(result.edges.len(), 1);
        assert_eq!(result.edges[0].relationship, "HAS_CHUNK");
        assert!(result.context.contains("반도체 수출이 늘었다"));
        assert_eq!(result.debug.strategy, "vector");
        assert_eq!(result.debug.node_count, 5);

        // Node ids are unique and no edge dangles
        let ids: HashSet<&str> = result.nodes.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids.len(), result.nodes.len());
        for edge in &result.edges {
            assert!(ids.contains(edge.source.as_str()));
            assert!(ids.contains(edge.target.as_str()));
        }

        // Similarity score attached to the retained chunk
        let chunk = result.nodes.iter().find(|n| n.id == "1").unwrap();
        assert_eq!(chunk.score(), Some(0.9));
        assert_eq!(chunk.node_type, "Content");
    }

    #[tokio::test]
    async fn test_index_failure_falls_back_to_scan() {
        let scan_record = |id: i64, text: &str, embedding: Vec<f32>| Record {
            fields: vec![
                (
                    "c".to_string(),
                    GraphValue::Node(content_graph_node(id, text)),
                ),
                (
                    "embedding".to_string(),
                    GraphValue::Scalar(serde_json::json!(embedding)),
                ),
            ],
        };

        let store = ScriptedStore::new(vec![
            Err(NewsgraphError::Store("no such index".to_string())),
            Ok(vec![
                scan_record(1, "거의 같은 방향", vec![1.0, 0.1]),
                scan_record(2, "직교 벡터", vec![0.0, 1.0]),
            ]),
            Ok(vec![]), // expansion
        ]);
        let provider = ScriptedProvider::embedding(vec![1.0, 0.0]);
        let result = retrieve(&store, &provider, "AI 반도체", &test_params())
            .await
            .unwrap();

        // Only the aligned vector clears the 0.5 threshold
        assert_eq!(result.nodes.len(), 1);
        assert_eq!(result.nodes[0].id, "1");
        assert!(result.debug.executed_query.contains("c.embedding IS NOT NULL"));
    }

    #[tokio::test]
    async fn test_no_match_returns_sentinel_context() {
        // Every candidate scores 0.3 against the query, threshold is 0.5
        let store = ScriptedStore::new(vec![Ok(vec![
            content_record(1, "무관한 내용", 0.3),
            content_record(2, "또 무관", 0.3),
        ])]);
        let provider = ScriptedProvider::embedding(vec![1.0, 0.0]);
        let result = retrieve(&store, &provider, "AI 반도체", &test_params())
            .await
            .unwrap();

        assert!(result.nodes.is_empty());
        assert!(result.edges.is_empty());
        assert_eq!(result.context, NO_CONTENT_CONTEXT);
        // No expansion query issued for an empty seed set
        assert_eq!(store.executed_queries().len(), 1);
    }

    #[tokio::test]
    async fn test_raising_threshold_never_adds_nodes() {
        let records = vec![
            content_record(1, "a", 0.9),
            content_record(2, "b", 0.7),
            content_record(3, "c", 0.55),
        ];
        let mut counts = Vec::new();
        for threshold in [0.5_f32, 0.6, 0.8, 0.95] {
            let store = ScriptedStore::new(vec![Ok(records.clone()), Ok(vec![])]);
            let provider = ScriptedProvider::embedding(vec![1.0, 0.0]);
            let params = RetrievalConfig {
                similarity_threshold: threshold,
                ..test_params()
            };
            let result = retrieve(&store, &provider, "AI 반도체", &params)
                .await
                .unwrap();
            counts.push(result.nodes.len());
        }
        for pair in counts.windows(2) {
            assert!(pair[0] >= pair[1], "filter is not monotonic: {:?}", counts);
        }
    }

    #[tokio::test]
    async fn test_duplicate_chunk_ids_kept_once() {
        let store = ScriptedStore::new(vec![
            Ok(vec![
                content_record(1, "첫 번째", 0.9),
                content_record(1, "중복", 0.8),
            ]),
            Ok(vec![]),
        ]);
        let provider = ScriptedProvider::embedding(vec![1.0, 0.0]);
        let result = retrieve(&store, &provider, "AI 반도체", &test_params())
            .await
            .unwrap();
        assert_eq!(result.nodes.len(), 1);
        assert_eq!(result.nodes[0].score(), Some(0.9));
    }

    #[tokio::test]
    async fn test_expansion_failure_keeps_chunks() {
        let store = ScriptedStore::new(vec![
            Ok(vec![content_record(1, "청크", 0.9)]),
            Err(NewsgraphError::Store("connection reset".to_string())),
        ]);
        let provider = ScriptedProvider::embedding(vec![1.0, 0.0]);
        let result = retrieve(&store, &provider, "AI 반도체", &test_params())
            .await
            .unwrap();
        assert_eq!(result.nodes.len(), 1);
        assert!(result.edges.is_empty());
        assert!(result.context.contains("청크"));
    }

    #[tokio::test]
    async fn test_embedding_failure_aborts() {
        let store = ScriptedStore::new(vec![]);
        let provider = ScriptedProvider {
            generate_result: std::sync::Mutex::new(None),
            embed_result: std::sync::Mutex::new(Some(Err(NewsgraphError::Provider(
                "rate limited".to_string(),
            )))),
        };
        let err = retrieve(&store, &provider, "AI 반도체", &test_params())
            .await
            .unwrap_err();
        assert!(matches!(err, NewsgraphError::Provider(_)));
    }

    #[test]
    fn test_cosine_similarity_identical() {
        let a = vec![1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &a) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_similarity_orthogonal() {
        let a = vec![1.0, 0.0];
        let b = vec![0.0, 1.0];
        assert!(cosine_similarity(&a, &b).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_similarity_zero_magnitude() {
        let a = vec![0.0, 0.0];
        let b = vec![1.0, 0.0];
        assert_eq!(cosine_similarity(&a, &b), 0.0);
    }

    #[test]
    fn test_cosine_similarity_length_mismatch() {
        let a = vec![1.0, 0.0];
        let b = vec![1.0, 0.0, 0.0];
        assert_eq!(cosine_similarity(&a, &b), 0.0);
    }

    #[test]
    fn test_cosine_similarity_magnitude_independent() {
        let a = vec![1.0, 0.0];
        let b = vec![2.0, 0.0];
        assert!((cosine_similarity(&a, &b) - 1.0).abs() < 1e-6);
    }
}
