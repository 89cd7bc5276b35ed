use std::collections::{BTreeSet, HashSet};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{job_board_for_host, PostingCount, SearchProvider, SearchResult, JOB_BOARD_DOMAINS};
use crate::errors::AiError;

const TAVILY_API_URL: &str = "https://api.tavily.com/search";
/// Tavily's per-request ceiling on `max_results`.
const MAX_RESULTS_PER_REQUEST: u32 = 20;

#[derive(Debug, Serialize)]
struct TavilyRequest<'a> {
    query: &'a str,
    max_results: u32,
    search_depth: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    include_domains: Option<&'a [&'a str]>,
}

#[derive(Debug, Deserialize)]
struct TavilyResponse {
    #[serde(default)]
    results: Vec<TavilyResult>,
}

#[derive(Debug, Deserialize)]
struct TavilyResult {
    url: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    content: String,
    #[serde(default)]
    score: f64,
    published_date: Option<String>,
}

impl From<TavilyResult> for SearchResult {
    fn from(r: TavilyResult) -> Self {
        SearchResult {
            url: r.url,
            title: r.title,
            content: r.content,
            score: r.score.clamp(0.0, 1.0),
            published_date: r.published_date,
        }
    }
}

#[derive(Clone)]
pub struct TavilyClient {
    client: Client,
    api_key: Option<String>,
    url: String,
}

impl TavilyClient {
    /// A missing key surfaces as [`AiError::Config`] on the first call.
    pub fn new(api_key: Option<String>, timeout: Duration) -> Result<Self, AiError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AiError::Config(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            url: TAVILY_API_URL.to_string(),
        })
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    async fn query(
        &self,
        query: &str,
        max_results: u32,
        include_domains: Option<&[&str]>,
    ) -> Result<Vec<SearchResult>, AiError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| AiError::Config("SEARCH_API_KEY is not set".to_string()))?;

        let body = TavilyRequest {
            query,
            max_results: max_results.clamp(1, MAX_RESULTS_PER_REQUEST),
            search_depth: "advanced",
            include_domains,
        };

        let response = self
            .client
            .post(&self.url)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(match status.as_u16() {
                401 | 403 => AiError::Config(format!("Search provider rejected the key: {message}")),
                429 => AiError::RateLimit {
                    message,
                    retry_after_ms: None,
                },
                code => AiError::Api {
                    status: Some(code),
                    message: format!("search provider: {message}"),
                },
            });
        }

        let parsed: TavilyResponse = response
            .json()
            .await
            .map_err(|e| AiError::api(format!("unreadable search response: {e}")))?;

        debug!(query, results = parsed.results.len(), "Search completed");
        Ok(parsed.results.into_iter().map(SearchResult::from).collect())
    }
}

#[async_trait]
impl SearchProvider for TavilyClient {
    async fn search(&self, query: &str, max_results: u32) -> Result<Vec<SearchResult>, AiError> {
        self.query(query, max_results, None).await
    }

    async fn count_job_postings(
        &self,
        role: &str,
        location: Option<&str>,
    ) -> Result<PostingCount, AiError> {
        let query = match location.map(str::trim).filter(|l| !l.is_empty()) {
            Some(location) => format!("\"{role}\" jobs in {location}"),
            None => format!("\"{role}\" jobs"),
        };
        let results = self
            .query(&query, MAX_RESULTS_PER_REQUEST, Some(JOB_BOARD_DOMAINS))
            .await?;
        Ok(count_postings(&results))
    }
}

/// Counts distinct posting URLs served from allowlisted job boards.
fn count_postings(results: &[SearchResult]) -> PostingCount {
    let mut urls = HashSet::new();
    let mut domains = BTreeSet::new();
    for result in results {
        let Ok(url) = Url::parse(&result.url) else {
            continue;
        };
        let Some(board) = url.host_str().and_then(job_board_for_host) else {
            continue;
        };
        let canonical = format!(
            "{}{}?{}",
            url.host_str().unwrap_or_default().to_ascii_lowercase(),
            url.path().trim_end_matches('/'),
            url.query().unwrap_or_default()
        );
        if urls.insert(canonical) {
            domains.insert(board.to_string());
        }
    }
    PostingCount {
        count: urls.len() as u32,
        domains: domains.into_iter().collect(),
        saturated: results.len() >= MAX_RESULTS_PER_REQUEST as usize,
    }
}

fn transport_error(e: reqwest::Error) -> AiError {
    if e.is_timeout() {
        AiError::Timeout(e.to_string())
    } else {
        AiError::api(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> TavilyClient {
        TavilyClient::new(Some("tvly-test".into()), Duration::from_secs(5))
            .unwrap()
            .with_url(server.uri())
    }

    #[tokio::test]
    async fn test_search_maps_results() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("authorization", "Bearer tvly-test"))
            .and(body_partial_json(json!({"query": "sre salaries 2025"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "results": [
                    {"url": "https://a.com/1", "title": "A", "content": "alpha", "score": 0.91,
                     "published_date": "2025-03-01"},
                    {"url": "https://b.com/2", "title": "B", "content": "beta", "score": 1.7}
                ]
            })))
            .mount(&server)
            .await;

        let results = client_for(&server).search("sre salaries 2025", 5).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].published_date.as_deref(), Some("2025-03-01"));
        assert_eq!(results[1].score, 1.0);
    }

    #[tokio::test]
    async fn test_server_error_is_retryable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("down"))
            .mount(&server)
            .await;

        let err = client_for(&server).search("q", 5).await.unwrap_err();
        assert!(matches!(err, AiError::Api { status: Some(500), .. }));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_missing_key_is_config_error() {
        let client = TavilyClient::new(Some("  ".into()), Duration::from_secs(5)).unwrap();
        let err = client.search("q", 5).await.unwrap_err();
        assert_eq!(err, AiError::Config("SEARCH_API_KEY is not set".into()));
    }

    #[tokio::test]
    async fn test_count_job_postings_restricts_domains() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({"include_domains": JOB_BOARD_DOMAINS})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "results": [
                    {"url": "https://www.linkedin.com/jobs/view/1", "title": "", "content": "", "score": 0.5},
                    {"url": "https://www.linkedin.com/jobs/view/1/", "title": "", "content": "", "score": 0.5},
                    {"url": "https://www.indeed.com/viewjob?jk=2", "title": "", "content": "", "score": 0.5},
                    {"url": "https://blog.example.com/post", "title": "", "content": "", "score": 0.5}
                ]
            })))
            .mount(&server)
            .await;

        let count = client_for(&server)
            .count_job_postings("Site Reliability Engineer", Some("Berlin"))
            .await
            .unwrap();
        assert_eq!(count.count, 2);
        assert_eq!(count.domains, vec!["indeed.com", "linkedin.com"]);
        assert!(!count.saturated);
    }

    #[test]
    fn test_count_postings_skips_unparseable_urls() {
        let results = vec![SearchResult {
            url: "not a url".into(),
            title: String::new(),
            content: String::new(),
            score: 0.0,
            published_date: None,
        }];
        assert_eq!(count_postings(&results).count, 0);
    }

    #[test]
    fn test_full_result_page_marks_count_saturated() {
        let results: Vec<SearchResult> = (0..MAX_RESULTS_PER_REQUEST)
            .map(|i| SearchResult {
                url: format!("https://www.indeed.com/viewjob?jk={i}"),
                title: String::new(),
                content: String::new(),
                score: 0.5,
                published_date: None,
            })
            .collect();

        let count = count_postings(&results);

        assert_eq!(count.count, MAX_RESULTS_PER_REQUEST);
        assert!(count.saturated);
        assert!(!count_postings(&results[..5]).saturated);
    }
}
