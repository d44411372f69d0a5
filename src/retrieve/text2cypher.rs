//! Graph-query strategy: translate the natural-language query into Cypher
//! with the LLM, execute it verbatim, and assemble whatever comes back.
//!
//! The translated query is trusted input to the store; there is no semantic
//! validation beyond "does it execute". The only guard is the fixed fallback
//! query substituted when translation or the primary execution fails.

use serde_json::json;

use crate::config::RetrievalConfig;
use crate::error::Result;
use crate::graph::{GraphStore, Record};
use crate::llm::LlmProvider;
use crate::retrieve::assemble::{self, Assembler};
use crate::retrieve::{Edge, Node, Retrieval, RetrievalDebug, StrategyKind};

/// Graph schema description embedded in the translation prompt
const SCHEMA_DESCRIPTION: &str = "\
온톨로지 구조:

노드 타입:
- Media: 언론사 (속성: id, name)
- Article: 뉴스 기사 (속성: id, title, url, created_at)
- Category: 카테고리 (속성: id, name)
- Content: 기사 본문 청크 (속성: id, text, chunk_index, embedding)

관계:
- (Media)-[:PUBLISHED]->(Article): 언론사가 기사를 발행
- (Article)-[:BELONGS_TO]->(Category): 기사가 카테고리에 속함
- (Article)-[:HAS_CHUNK]->(Content): 기사가 본문 청크를 가짐";

/// Hand-written query substituted when translation or the primary execution
/// fails: an Article joined to its chunks, category and media
pub const FALLBACK_QUERY: &str = "\
MATCH (a:Article)-[r1:HAS_CHUNK]->(c:Content)
OPTIONAL MATCH (a)-[r2:BELONGS_TO]->(cat:Category)
OPTIONAL MATCH (m:Media)-[r3:PUBLISHED]->(a)
RETURN a, r1, c, r2, cat, r3, m
LIMIT 20";

/// Build the translation prompt: schema, the user query, and the rules the
/// generated Cypher must follow.
fn build_translation_prompt(query: &str, result_limit: usize) -> String {
    format!(
        "다음은 그래프 데이터베이스의 온톨로지 구조입니다:

{SCHEMA_DESCRIPTION}

사용자 질의: {query}

위 질의에 대한 Cypher 쿼리를 생성하세요. 다음 규칙을 따르세요:
1. MATCH 절을 사용하여 노드와 관계를 찾습니다
2. RETURN 절에서 노드와 관계를 모두 반환합니다 (예: RETURN a, r, b)
3. 관계를 반환할 때는 관계 변수를 명시하세요 (예: MATCH (a)-[r:RELATIONSHIP]->(b) RETURN a, r, b)
4. 노드의 id는 문자열로 저장되어 있습니다
5. 쿼리는 간결하고 효율적으로 작성합니다
6. 검색어와 직접 관련된 노드와 관계만 반환하세요
7. LIMIT 절을 사용하여 결과를 최대 {result_limit}개로 제한하세요

Cypher 쿼리만 반환하세요 (설명 없이):"
    )
}

/// Strip a fenced-code wrapper (```, optionally with a language tag) the
/// model may emit around the query.
fn strip_code_fences(text: &str) -> String {
    let trimmed = text.trim();
    if !trimmed.starts_with("```") {
        return trimmed.to_string();
    }
    let mut lines: Vec<&str> = trimmed.lines().collect();
    if lines.first().is_some_and(|l| l.starts_with("```")) {
        lines.remove(0);
    }
    if lines.last().is_some_and(|l| l.trim() == "```") {
        lines.pop();
    }
    lines.join("\n").trim().to_string()
}

/// Run the graph-query strategy.
pub async fn retrieve(
    store: &dyn GraphStore,
    provider: &dyn LlmProvider,
    query: &str,
    params: &RetrievalConfig,
) -> Result<Retrieval> {
    let prompt = build_translation_prompt(query, params.result_limit);

    let (mut cypher, mut used_fallback) = match provider.generate(&prompt, None).await {
        Ok(text) => (strip_code_fences(&text), false),
        Err(e) => {
            log::warn!("Cypher translation failed ({}), using fallback query", e);
            (FALLBACK_QUERY.to_string(), true)
        }
    };
    log::debug!("Executing Cypher:\n{}", cypher);

    let records = match store.execute(&cypher, json!({})).await {
        Ok(records) => records,
        Err(primary_err) if !used_fallback => {
            log::warn!(
                "Translated Cypher failed ({}), using fallback query",
                primary_err
            );
            cypher = FALLBACK_QUERY.to_string();
            used_fallback = true;
            match store.execute(&cypher, json!({})).await {
                Ok(records) => records,
                Err(e) => return Ok(failed_retrieval(cypher, e.to_string())),
            }
        }
        Err(e) => return Ok(failed_retrieval(cypher, e.to_string())),
    };

    if used_fallback {
        log::info!("Fallback query returned {} records", records.len());
    }

    let (nodes, edges) = assemble_records(&records);

    let mut context = format!(
        "검색된 노드 수: {}, 관계 수: {}",
        nodes.len(),
        edges.len()
    );
    let titles: Vec<&str> = nodes
        .iter()
        .filter(|n| n.node_type == "Article")
        .take(5)
        .map(|n| n.label.as_str())
        .collect();
    if !titles.is_empty() {
        context.push_str("\n관련 기사:\n");
        for title in titles {
            context.push_str(&format!("- {}\n", title));
        }
    }

    let debug = RetrievalDebug {
        strategy: StrategyKind::Text2Cypher.name().to_string(),
        executed_query: cypher,
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

/// Terminal failure after the fallback: empty sets plus an explanatory
/// context usable directly in a prompt or shown to the user.
fn failed_retrieval(cypher: String, message: String) -> Retrieval {
    log::error!("Cypher execution failed after fallback: {}", message);
    Retrieval {
        nodes: Vec::new(),
        edges: Vec::new(),
        context: format!("Cypher 쿼리 실행 오류: {}", message),
        debug: RetrievalDebug {
            strategy: StrategyKind::Text2Cypher.name().to_string(),
            executed_query: cypher,
            node_count: 0,
            edge_count: 0,
        },
    }
}

/// Two-pass record scan: relationships first (so duplicate edges collapse
/// across rows), then nodes de-duplicated by id.
fn assemble_records(records: &[Record]) -> (Vec<Node>, Vec<Edge>) {
    let mut assembler = Assembler::new();

    for record in records {
        for value in record.values() {
            if let Some(rel) = value.as_relationship() {
                assembler.push_edge(assemble::edge_from_rel(rel));
            }
        }
    }

    for record in records {
        for value in record.values() {
            if let Some(node) = value.as_node() {
                assembler.push_node(assemble::node_from_graph(node));
            }
        }
    }

    assembler.finish()
}
