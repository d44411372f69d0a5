pub mod config;
pub mod error;
pub mod graph;
pub mod llm;
pub mod retrieve;

pub use config::Config;
pub use error::{NewsgraphError, Result};
pub use retrieve::{Edge, Engine, Node, Retrieval, StrategyKind};
