//! Web search boundary used by the research orchestrator.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::AiError;

pub mod tavily;

pub use tavily::TavilyClient;

/// Job boards the verified posting count is restricted to.
pub const JOB_BOARD_DOMAINS: &[&str] = &[
    "linkedin.com",
    "indeed.com",
    "glassdoor.com",
    "ziprecruiter.com",
    "monster.com",
    "dice.com",
    "wellfound.com",
    "builtin.com",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub url: String,
    pub title: String,
    pub content: String,
    /// Provider relevance in `[0, 1]`.
    pub score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_date: Option<String>,
}

/// Ground-truth posting count from the job-board allowlist.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PostingCount {
    pub count: u32,
    /// Allowlisted domains that returned at least one posting, sorted.
    pub domains: Vec<String>,
    /// The board query filled a whole result page, so `count` is a floor.
    pub saturated: bool,
}

#[async_trait]
pub trait SearchProvider: Send + Sync {
    async fn search(&self, query: &str, max_results: u32) -> Result<Vec<SearchResult>, AiError>;

    /// Deterministic, non-LLM count of open postings for `role`.
    async fn count_job_postings(
        &self,
        role: &str,
        location: Option<&str>,
    ) -> Result<PostingCount, AiError>;
}

/// Returns the allowlisted job board `host` belongs to, if any.
pub fn job_board_for_host(host: &str) -> Option<&'static str> {
    let host = host.trim_end_matches('.').to_ascii_lowercase();
    JOB_BOARD_DOMAINS
        .iter()
        .copied()
        .find(|domain| host == *domain || host.ends_with(&format!(".{domain}")))
}
