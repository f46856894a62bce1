pub mod context;
pub mod wikipedia;

pub use context::{source_context, sources_context};
pub use wikipedia::{FullArticleTool, SimilarArticlesTool, WikiArticle, WikiSearchResult, WikipediaClient};

use anyhow::Result;
use sage_core::config::WikipediaConfig;
use sage_core::ToolHandler;
use std::sync::Arc;

/// The research tool set: article search plus full-article retrieval,
/// sharing one HTTP client.
pub fn wikipedia_tools(config: &WikipediaConfig) -> Result<Vec<Box<dyn ToolHandler>>> {
    let client = Arc::new(WikipediaClient::new(config)?);
    Ok(vec![
        Box::new(SimilarArticlesTool::new(client.clone())),
        Box::new(FullArticleTool::new(client)),
    ])
}
