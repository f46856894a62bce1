//! Flatten collected tool outputs into plain-text evaluation contexts.

use crate::wikipedia::{WikiArticle, WikiSearchResult};
use sage_core::ToolOutput;
use serde_json::Value;

/// Render one source. Search results yield one line per hit, a full article
/// yields one line, anything else yields nothing.
pub fn source_context(source: &ToolOutput) -> Vec<String> {
    match &source.raw_output {
        Value::Array(_) => serde_json::from_value::<Vec<WikiSearchResult>>(source.raw_output.clone())
            .map(|hits| {
                hits.into_iter()
                    .map(|hit| format!("Title: {}, URL: {}", hit.title, hit.url))
                    .collect()
            })
            .unwrap_or_default(),
        Value::Object(_) => serde_json::from_value::<WikiArticle>(source.raw_output.clone())
            .map(|a| vec![format!("Title: {}, Content: {}, URL: {}", a.title, a.content, a.url)])
            .unwrap_or_default(),
        _ => Vec::new(),
    }
}

pub fn sources_context(sources: &[ToolOutput]) -> Vec<String> {
    sources.iter().flat_map(source_context).collect()
}
