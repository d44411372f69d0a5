use anyhow::Result;
use std::sync::Arc;
use std::time::Instant;

use newsgraph::graph::Neo4jHttpStore;
use newsgraph::llm::{build_provider, LlmProvider};
use newsgraph::retrieve::{assemble, selector, Engine, Retrieval};
use newsgraph::Config;

/// Answer-generation system prompt (the engine itself stops at context
/// assembly; this is the demonstrated caller)
const ANSWER_SYSTEM_PROMPT: &str = "\
당신은 뉴스 데이터를 분석하는 AI 어시스턴트입니다.
사용자의 질의에 대해 검색된 뉴스 정보를 바탕으로 정확하고 유용한 답변을 제공하세요.
검색된 정보를 최대한 활용하여 구체적이고 상세한 답변을 제공하세요.";

/// Caller-side relevance cutoff applied after retrieval
const POST_FILTER_THRESHOLD: f64 = 0.5;

fn usage() -> ! {
    eprintln!(
        "Usage: newsgraph <command> \"<query>\"\n\
         Commands:\n\
         \x20 select   print the strategy the selector picks, nothing else\n\
         \x20 query    run retrieval and print the result as JSON\n\
         \x20 answer   run retrieval, then generate an answer from the context"
    );
    std::process::exit(2);
}

/// Parse CLI args: first positional is the command, the rest joins into the query.
fn parse_args() -> (String, String) {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = match args.first() {
        Some(c) => c.clone(),
        None => usage(),
    };
    let query = args[1..].join(" ");
    if query.trim().is_empty() {
        usage();
    }
    (command, query)
}

/// Post-hoc relevance filter the caller applies on top of the engine result:
/// drop scored nodes below the threshold, keep unscored ones, then prune
/// edges left dangling.
fn post_filter(retrieval: &mut Retrieval) {
    retrieval.nodes.retain(|node| match node.score() {
        Some(score) => score >= POST_FILTER_THRESHOLD,
        None => true,
    });
    assemble::prune_dangling_edges(&retrieval.nodes, &mut retrieval.edges);
}

async fn run_retrieval(config: &Config, query: &str) -> Result<(Retrieval, Arc<dyn LlmProvider>)> {
    let username = std::env::var(&config.graph.username_env).unwrap_or_else(|_| "neo4j".to_string());
    let password = std::env::var(&config.graph.password_env).map_err(|_| {
        anyhow::anyhow!(
            "Environment variable {} not set. Set it in your .env file or as an environment variable.",
            config.graph.password_env
        )
    })?;

    let store = Arc::new(Neo4jHttpStore::new(
        &config.graph.uri,
        &username,
        &password,
        &config.graph.database,
    )?);
    let provider = build_provider(config)?;
    let engine = Engine::new(store, provider.clone(), config.retrieval.clone());

    let start = Instant::now();
    let mut retrieval = engine.retrieve(query).await?;
    log::info!(
        "Retrieval took {:?} ({} nodes, {} edges before post-filter)",
        start.elapsed(),
        retrieval.nodes.len(),
        retrieval.edges.len()
    );

    post_filter(&mut retrieval);
    Ok((retrieval, provider))
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().filter_or("RUST_LOG", "info")).init();

    let (command, query) = parse_args();

    match command.as_str() {
        "select" => {
            // Pure selection needs no clients and no config
            println!("{}", selector::select(&query).name());
        }
        "query" => {
            let config = Config::load()?;
            let (retrieval, _) = run_retrieval(&config, &query).await?;
            println!("{}", serde_json::to_string_pretty(&retrieval)?);
        }
        "answer" => {
            let config = Config::load()?;
            let (retrieval, provider) = run_retrieval(&config, &query).await?;

            let prompt = format!(
                "검색된 뉴스 정보:\n{}\n\n사용자 질의: {}\n\n위 정보를 바탕으로 답변하세요:",
                retrieval.context, query
            );
            let answer = provider
                .generate(&prompt, Some(ANSWER_SYSTEM_PROMPT))
                .await?;

            println!("{}", answer);
            log::info!(
                "Answered with strategy {} over {} nodes",
                retrieval.debug.strategy,
                retrieval.nodes.len()
            );
        }
        _ => usage(),
    }

    Ok(())
}
