//! Data contracts of the market research pipeline.
//!
//! Each model-facing type sits next to the [`Schema`] its output is
//! validated against.

use serde::{Deserialize, Serialize};

use crate::cache::{derive_cache_key, CacheKey, CachePhase};
use crate::pipeline::schema::Schema;

// ────────────────────────────────────────────────────────────────────────────
// Request
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarketFocus {
    #[default]
    Balanced,
    Compensation,
    Competition,
    TalentSupply,
}

impl MarketFocus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MarketFocus::Balanced => "balanced",
            MarketFocus::Compensation => "compensation",
            MarketFocus::Competition => "competition",
            MarketFocus::TalentSupply => "talent_supply",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketResearchRequest {
    pub role: String,
    #[serde(default)]
    pub level: Option<String>,
    #[serde(default)]
    pub industry: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub market_focus: Option<MarketFocus>,
}

/// What identifies a request in the cache. Blank optionals and absent ones
/// are the same request; an absent focus is `balanced`.
#[derive(Serialize)]
struct CacheIdentity<'a> {
    role: &'a str,
    level: Option<&'a str>,
    industry: Option<&'a str>,
    location: Option<&'a str>,
    market_focus: MarketFocus,
}

impl MarketResearchRequest {
    pub fn new(role: &str) -> Self {
        Self {
            role: role.to_string(),
            level: None,
            industry: None,
            location: None,
            market_focus: None,
        }
    }

    pub fn market_focus(&self) -> MarketFocus {
        self.market_focus.unwrap_or_default()
    }

    pub fn level(&self) -> Option<&str> {
        non_blank(&self.level)
    }

    pub fn industry(&self) -> Option<&str> {
        non_blank(&self.industry)
    }

    pub fn location(&self) -> Option<&str> {
        non_blank(&self.location)
    }

    pub fn cache_key(&self) -> Result<CacheKey, serde_json::Error> {
        derive_cache_key(&CacheIdentity {
            role: &self.role,
            level: self.level(),
            industry: self.industry(),
            location: self.location(),
            market_focus: self.market_focus(),
        })
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

// ────────────────────────────────────────────────────────────────────────────
// Stage 1: query generation
// ────────────────────────────────────────────────────────────────────────────

pub const MIN_QUERIES: usize = 4;
pub const MAX_QUERIES: usize = 12;

#[derive(Debug, Clone, Deserialize)]
pub struct QueryPlan {
    pub queries: Vec<String>,
}

pub fn query_plan_schema() -> Schema {
    Schema::object().field(
        "queries",
        Schema::array(Schema::string().min_len(3).max_len(200))
            .min_len(MIN_QUERIES)
            .max_len(MAX_QUERIES),
    )
}

// ────────────────────────────────────────────────────────────────────────────
// Stage 3: source scoring
// ────────────────────────────────────────────────────────────────────────────

const RECENCY_WEIGHT: f64 = 0.3;
const AUTHORITY_WEIGHT: f64 = 0.3;
const RELEVANCE_WEIGHT: f64 = 0.4;

#[derive(Debug, Clone, Deserialize)]
pub struct SourceScores {
    pub scores: Vec<RawSourceScore>,
}

/// One model judgement; `index` refers to the candidate list in the prompt.
/// The schema only guarantees a non-negative number, so `index` stays a float
/// until [`RawSourceScore::position`] resolves it.
#[derive(Debug, Clone, Deserialize)]
pub struct RawSourceScore {
    pub index: f64,
    pub recency: f64,
    pub authority: f64,
    pub relevance: f64,
}

impl RawSourceScore {
    /// Candidate position, or `None` when `index` is not a whole number.
    pub fn position(&self) -> Option<usize> {
        let index = self.index;
        (index.is_finite() && index >= 0.0 && index.fract() == 0.0).then_some(index as usize)
    }
}

pub fn source_scores_schema(max_candidates: usize) -> Schema {
    Schema::object().field(
        "scores",
        Schema::array(
            Schema::object()
                .field("index", Schema::number().min(0.0))
                .field("recency", Schema::number().range(0.0, 1.0))
                .field("authority", Schema::number().range(0.0, 1.0))
                .field("relevance", Schema::number().range(0.0, 1.0)),
        )
        .max_len(max_candidates),
    )
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredSource {
    pub url: String,
    pub title: String,
    pub recency: f64,
    pub authority: f64,
    pub relevance: f64,
    /// Weighted mean of the three dimensions, derived locally.
    pub overall: f64,
}

impl ScoredSource {
    pub fn new(url: &str, title: &str, recency: f64, authority: f64, relevance: f64) -> Self {
        let recency = recency.clamp(0.0, 1.0);
        let authority = authority.clamp(0.0, 1.0);
        let relevance = relevance.clamp(0.0, 1.0);
        Self {
            url: url.to_string(),
            title: title.to_string(),
            recency,
            authority,
            relevance,
            overall: RECENCY_WEIGHT * recency
                + AUTHORITY_WEIGHT * authority
                + RELEVANCE_WEIGHT * relevance,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Stage 4: extraction
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SalaryRange {
    pub min: f64,
    pub max: f64,
    pub currency: String,
}

fn salary_range_schema() -> Schema {
    Schema::object()
        .field("min", Schema::number().min(0.0))
        .field("max", Schema::number().min(0.0))
        .field("currency", Schema::string().min_len(3).max_len(3))
}

/// Facts pulled from one source. Anything the source does not state stays
/// empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Extraction {
    #[serde(default)]
    pub key_findings: Vec<String>,
    #[serde(default)]
    pub salary_range: Option<SalaryRange>,
    #[serde(default)]
    pub skills_mentioned: Vec<String>,
    #[serde(default)]
    pub demand_signals: Vec<String>,
    #[serde(default)]
    pub posting_count: Option<f64>,
}

pub fn extraction_schema() -> Schema {
    Schema::object()
        .field(
            "key_findings",
            Schema::array(Schema::string().min_len(1).strip_boilerplate()).max_len(8),
        )
        .optional("salary_range", salary_range_schema())
        .optional("skills_mentioned", Schema::array(Schema::string()).max_len(12))
        .optional("demand_signals", Schema::array(Schema::string()).max_len(6))
        .optional("posting_count", Schema::number().min(0.0))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceExtraction {
    pub url: String,
    pub title: String,
    pub extraction: Extraction,
}

// ────────────────────────────────────────────────────────────────────────────
// Stage 6: synthesis, shared by the quick and deep phases
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DemandLevel {
    Low,
    Moderate,
    High,
    VeryHigh,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketAnalysis {
    pub summary: String,
    #[serde(default)]
    pub salary_range: Option<SalaryRange>,
    pub demand_level: DemandLevel,
    /// The model's own estimate; replaced by a verified count when one exists.
    #[serde(default)]
    pub estimated_posting_count: Option<f64>,
    pub key_skills: Vec<String>,
    pub competitor_insights: Vec<String>,
    pub hiring_challenges: Vec<String>,
    pub recommendations: Vec<String>,
    pub confidence: f64,
}

pub fn market_analysis_schema() -> Schema {
    Schema::object()
        .field(
            "summary",
            Schema::string().min_len(40).max_len(2000).strip_boilerplate(),
        )
        .optional("salary_range", salary_range_schema())
        .field(
            "demand_level",
            Schema::enumeration(&["low", "moderate", "high", "very_high"]),
        )
        .optional("estimated_posting_count", Schema::number().min(0.0))
        .field(
            "key_skills",
            Schema::array(Schema::string().min_len(1)).min_len(3).max_len(12),
        )
        .field(
            "competitor_insights",
            Schema::array(Schema::string().min_len(1)).max_len(8),
        )
        .field(
            "hiring_challenges",
            Schema::array(Schema::string().min_len(1)).max_len(6),
        )
        .field(
            "recommendations",
            Schema::array(Schema::string().min_len(1)).min_len(1).max_len(8),
        )
        .field("confidence", Schema::number().range(0.0, 1.0))
}

// ────────────────────────────────────────────────────────────────────────────
// Assembled report
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostingCountSource {
    /// Counted from the job-board allowlist.
    Verified,
    /// The model's estimate; no verified count was available.
    Estimated,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResearchSource {
    pub url: String,
    pub title: String,
    pub overall: f64,
    pub extracted: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketReport {
    pub phase: CachePhase,
    pub market_focus: MarketFocus,
    pub analysis: MarketAnalysis,
    #[serde(default)]
    pub posting_count: Option<u32>,
    pub posting_count_source: PostingCountSource,
    #[serde(default)]
    pub job_board_domains: Vec<String>,
    #[serde(default)]
    pub sources: Vec<ResearchSource>,
    #[serde(default)]
    pub warnings: Vec<String>,
}
