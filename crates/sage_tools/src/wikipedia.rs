//! Wikipedia research tools backed by the MediaWiki action API.

use anyhow::{Context, Result};
use reqwest::{Client, StatusCode};
use sage_core::config::WikipediaConfig;
use sage_core::tools::required_str;
use sage_core::{ToolError, ToolHandler, ToolOutput, ToolSchema};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use std::time::Duration;

pub const SIMILAR_ARTICLES: &str = "wikipedia_similar_articles";
pub const FULL_ARTICLE: &str = "wikipedia_full_article";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WikiSearchResult {
    pub title: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WikiArticle {
    pub title: String,
    pub content: String,
    pub url: String,
}

// MediaWiki response payload (formatversion=2)
#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    query: Option<ApiQuery>,
    #[serde(default)]
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct ApiQuery {
    #[serde(default)]
    pages: Vec<ApiPage>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    code: String,
    #[serde(default)]
    info: String,
}

#[derive(Debug, Deserialize)]
struct ApiPage {
    title: String,
    /// Search rank when the page came from a search generator.
    #[serde(default)]
    index: Option<u32>,
    #[serde(default)]
    missing: bool,
    #[serde(default)]
    invalid: bool,
    #[serde(default)]
    fullurl: Option<String>,
    #[serde(default)]
    extract: Option<String>,
    #[serde(default)]
    pageprops: Option<Map<String, Value>>,
}

impl ApiPage {
    /// Missing, invalid and disambiguation pages are skipped.
    fn is_article(&self) -> bool {
        !self.missing
            && !self.invalid
            && !self
                .pageprops
                .as_ref()
                .is_some_and(|p| p.contains_key("disambiguation"))
    }
}

// ============================================================================
// WikipediaClient
// ============================================================================

#[derive(Debug, Clone)]
pub struct WikipediaClient {
    http: Client,
    api_url: String,
    search_results: usize,
}

impl WikipediaClient {
    pub fn new(config: &WikipediaConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()
            .context("Failed to build Wikipedia HTTP client")?;
        Ok(Self {
            http,
            api_url: config.api_url.clone(),
            search_results: config.search_results,
        })
    }

    /// Titles and URLs of the articles that best match `query`, best first.
    pub async fn search(&self, query: &str) -> Result<Vec<WikiSearchResult>, ToolError> {
        let limit = self.search_results.to_string();
        let mut pages = self
            .query(&[
                ("generator", "search"),
                ("gsrsearch", query),
                ("gsrlimit", limit.as_str()),
                ("prop", "info|pageprops"),
                ("inprop", "url"),
                ("ppprop", "disambiguation"),
            ])
            .await?;
        pages.sort_by_key(|p| p.index.unwrap_or(u32::MAX));

        let results: Vec<WikiSearchResult> = pages
            .into_iter()
            .filter(ApiPage::is_article)
            .map(|page| WikiSearchResult {
                url: self.page_url(&page),
                title: page.title,
            })
            .collect();
        tracing::info!("Wikipedia search '{}' -> {} result(s)", query, results.len());
        Ok(results)
    }

    /// Plain-text article for `title`, following redirects.
    /// `None` when no such article exists.
    pub async fn article(&self, title: &str) -> Result<Option<WikiArticle>, ToolError> {
        let pages = self
            .query(&[
                ("titles", title),
                ("prop", "extracts|info|pageprops"),
                ("explaintext", "1"),
                ("redirects", "1"),
                ("inprop", "url"),
                ("ppprop", "disambiguation"),
            ])
            .await?;

        let article = pages.into_iter().find(ApiPage::is_article).map(|page| WikiArticle {
            url: self.page_url(&page),
            content: page.extract.clone().unwrap_or_default(),
            title: page.title,
        });
        if article.is_none() {
            tracing::info!("No Wikipedia article for '{}'", title);
        }
        Ok(article)
    }

    async fn query(&self, params: &[(&str, &str)]) -> Result<Vec<ApiPage>, ToolError> {
        let response = self
            .http
            .get(&self.api_url)
            .query(&[("action", "query"), ("format", "json"), ("formatversion", "2")])
            .query(params)
            .send()
            .await
            .map_err(|e| ToolError::Transient(format!("Wikipedia request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let msg = format!("Wikipedia returned {status}");
            return Err(if is_transient_status(status) {
                ToolError::Transient(msg)
            } else {
                ToolError::Permanent(msg)
            });
        }

        let body: ApiResponse = response
            .json()
            .await
            .map_err(|e| ToolError::Permanent(format!("Unexpected Wikipedia response: {e}")))?;
        if let Some(err) = body.error {
            return Err(ToolError::Permanent(format!(
                "Wikipedia API error {}: {}",
                err.code, err.info
            )));
        }
        Ok(body.query.map(|q| q.pages).unwrap_or_default())
    }

    fn page_url(&self, page: &ApiPage) -> String {
        match page.fullurl {
            Some(ref url) => url.clone(),
            None => {
                let base = self.api_url.trim_end_matches("/w/api.php");
                format!("{}/wiki/{}", base, page.title.replace(' ', "_"))
            }
        }
    }
}

fn is_transient_status(status: StatusCode) -> bool {
    status.is_server_error()
        || status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::REQUEST_TIMEOUT
}

fn query_arg(input: &Map<String, Value>) -> Result<&str, ToolError> {
    let query = required_str(input, "query")?.trim();
    if query.is_empty() {
        return Err(ToolError::InvalidParameter {
            name: "query".into(),
            reason: "must not be empty".into(),
        });
    }
    Ok(query)
}

fn query_schema(name: &str, description: &str, hint: &str) -> ToolSchema {
    ToolSchema::object(
        name,
        description,
        json!({ "query": { "type": "string", "description": hint } }),
        &["query"],
    )
}

// ============================================================================
// Tool handlers
// ============================================================================

pub struct SimilarArticlesTool {
    client: Arc<WikipediaClient>,
}

impl SimilarArticlesTool {
    pub fn new(client: Arc<WikipediaClient>) -> Self {
        Self { client }
    }
}

#[async_trait::async_trait]
impl ToolHandler for SimilarArticlesTool {
    fn name(&self) -> &str {
        SIMILAR_ARTICLES
    }

    fn schema(&self) -> ToolSchema {
        query_schema(
            SIMILAR_ARTICLES,
            "Search Wikipedia for articles similar to the given query and return titles and URLs. \
             Use this tool to find the most promising articles for a user's query. \
             Query should be phrased as the most likely title of what the user is searching for.",
            "Likely article title",
        )
    }

    async fn execute(&self, input: &Map<String, Value>) -> Result<ToolOutput, ToolError> {
        let query = query_arg(input)?;
        let results = self.client.search(query).await?;
        let raw_output = serde_json::to_value(&results)
            .map_err(|e| ToolError::Permanent(e.to_string()))?;
        Ok(ToolOutput::new(SIMILAR_ARTICLES, Value::Object(input.clone()), raw_output))
    }
}

pub struct FullArticleTool {
    client: Arc<WikipediaClient>,
}

impl FullArticleTool {
    pub fn new(client: Arc<WikipediaClient>) -> Self {
        Self { client }
    }
}

#[async_trait::async_trait]
impl ToolHandler for FullArticleTool {
    fn name(&self) -> &str {
        FULL_ARTICLE
    }

    fn schema(&self) -> ToolSchema {
        query_schema(
            FULL_ARTICLE,
            "Retrieve the full Wikipedia article for the given query. \
             Use this tool to research further once you have a promising article title.",
            "Exact article title",
        )
    }

    async fn execute(&self, input: &Map<String, Value>) -> Result<ToolOutput, ToolError> {
        let query = query_arg(input)?;
        let raw_output = match self.client.article(query).await? {
            Some(article) => serde_json::to_value(&article)
                .map_err(|e| ToolError::Permanent(e.to_string()))?,
            None => Value::Null,
        };
        Ok(ToolOutput::new(FULL_ARTICLE, Value::Object(input.clone()), raw_output))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> Arc<WikipediaClient> {
        let config = WikipediaConfig {
            api_url: format!("{}/w/api.php", server.uri()),
            ..WikipediaConfig::default()
        };
        Arc::new(WikipediaClient::new(&config).unwrap())
    }

    fn input(query: &str) -> Map<String, Value> {
        json!({ "query": query }).as_object().unwrap().clone()
    }

    #[tokio::test]
    async fn test_search_orders_and_skips_disambiguation() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("generator", "search"))
            .and(query_param("gsrsearch", "Paris"))
            .and(query_param("gsrlimit", "15"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "query": { "pages": [
                    { "pageid": 2, "title": "Paris Hilton", "index": 2,
                      "fullurl": "https://en.wikipedia.org/wiki/Paris_Hilton" },
                    { "pageid": 3, "title": "Paris (disambiguation)", "index": 3,
                      "pageprops": { "disambiguation": "" } },
                    { "pageid": 1, "title": "Paris", "index": 1,
                      "fullurl": "https://en.wikipedia.org/wiki/Paris" }
                ]}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let results = client_for(&server).search("Paris").await.unwrap();
        assert_eq!(
            results,
            vec![
                WikiSearchResult {
                    title: "Paris".into(),
                    url: "https://en.wikipedia.org/wiki/Paris".into()
                },
                WikiSearchResult {
                    title: "Paris Hilton".into(),
                    url: "https://en.wikipedia.org/wiki/Paris_Hilton".into()
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_search_without_hits() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"batchcomplete": true})))
            .mount(&server)
            .await;

        assert!(client_for(&server).search("zzzz").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_full_article_tool() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("titles", "Eiffel Tower"))
            .and(query_param("explaintext", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "query": { "pages": [{
                    "pageid": 9, "title": "Eiffel Tower",
                    "extract": "The Eiffel Tower is a wrought-iron lattice tower.",
                    "fullurl": "https://en.wikipedia.org/wiki/Eiffel_Tower"
                }]}
            })))
            .mount(&server)
            .await;

        let tool = FullArticleTool::new(client_for(&server));
        let out = tool.execute(&input("Eiffel Tower")).await.unwrap();
        assert_eq!(out.tool_name, FULL_ARTICLE);
        assert_eq!(out.raw_output["title"], "Eiffel Tower");
        assert!(out.content.contains("wrought-iron"));
        assert_eq!(out.raw_input, json!({"query": "Eiffel Tower"}));
    }

    #[tokio::test]
    async fn test_missing_article_is_null() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "query": { "pages": [{ "title": "Nowhere Land", "missing": true }] }
            })))
            .mount(&server)
            .await;

        let tool = FullArticleTool::new(client_for(&server));
        let out = tool.execute(&input("Nowhere Land")).await.unwrap();
        assert_eq!(out.raw_output, Value::Null);
        assert_eq!(out.content, "null");
    }

    #[tokio::test]
    async fn test_server_error_is_transient() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let err = client_for(&server).search("Paris").await.unwrap_err();
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_api_error_is_permanent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "error": { "code": "badvalue", "info": "Unrecognized value" }
            })))
            .mount(&server)
            .await;

        let err = client_for(&server).article("x").await.unwrap_err();
        assert!(!err.is_transient());
        assert!(err.to_string().contains("badvalue"));
    }

    #[tokio::test]
    async fn test_missing_query_rejected() {
        let server = MockServer::start().await;
        let tool = SimilarArticlesTool::new(client_for(&server));

        let err = tool.execute(&Map::new()).await.unwrap_err();
        assert_eq!(err, ToolError::MissingParameter("query".into()));

        let err = tool.execute(&input("   ")).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidParameter { .. }));
    }

    #[test]
    fn test_fallback_page_url() {
        let config = WikipediaConfig::default();
        let client = WikipediaClient::new(&config).unwrap();
        let page = ApiPage {
            title: "New York City".into(),
            index: None,
            missing: false,
            invalid: false,
            fullurl: None,
            extract: None,
            pageprops: None,
        };
        assert_eq!(
            client.page_url(&page),
            "https://en.wikipedia.org/wiki/New_York_City"
        );
    }
}
