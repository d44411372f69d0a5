//! Strategy selection from weak query-text signals.
//!
//! A keyword heuristic, not a classifier: fixed Korean keyword lists plus a
//! token count decide which strategy runs. No confidence score is exposed.

use serde::{Deserialize, Serialize};

/// Keywords implying enumeration or relationship questions
const STRUCTURAL_KEYWORDS: &[&str] = &[
    "언론사", "카테고리", "분류", "속한", "발행", "관계",
    "어떤", "몇 개", "목록", "리스트", "모든",
];

/// Keywords implying summarization, comparison or causal reasoning
const ANALYTICAL_KEYWORDS: &[&str] = &[
    "요약", "분석", "비교", "트렌드", "패턴", "관련",
    "영향", "원인", "결과", "의미",
];

/// The three retrieval strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    Vector,
    Text2Cypher,
    Hybrid,
}

impl StrategyKind {
    pub fn name(&self) -> &'static str {
        match self {
            StrategyKind::Vector => "vector",
            StrategyKind::Text2Cypher => "text2cypher",
            StrategyKind::Hybrid => "hybrid",
        }
    }
}

/// Pick a strategy for a query. Pure function of the query text.
///
/// Decision table, first match wins:
/// structural keyword without analytical keyword -> Text2Cypher;
/// at most 5 tokens without analytical keyword -> Vector;
/// otherwise (including both keyword sets matching) -> Hybrid.
pub fn select(query: &str) -> StrategyKind {
    let query_lower = query.to_lowercase();
    let word_count = query.split_whitespace().count();

    let has_structural = STRUCTURAL_KEYWORDS
        .iter()
        .any(|keyword| query_lower.contains(keyword));
    let has_analytical = ANALYTICAL_KEYWORDS
        .iter()
        .any(|keyword| query_lower.contains(keyword));

    if has_structural && !has_analytical {
        StrategyKind::Text2Cypher
    } else if word_count <= 5 && !has_analytical {
        StrategyKind::Vector
    } else {
        StrategyKind::Hybrid
    }
}
