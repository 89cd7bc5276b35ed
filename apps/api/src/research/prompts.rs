// Prompt templates for the market research pipeline.
// Placeholders are `{name}` and are filled with `.replace` before sending.

pub const DEEP_PROMPT_VERSION: &str = "market-research-deep-v3";

pub const RESEARCH_SYSTEM: &str = "You are a senior talent-market analyst. \
    You plan web research, judge sources, and turn evidence into hiring insight. \
    Be precise and never overstate what the evidence supports.";

/// Replace: {context}, {min_queries}, {max_queries}
pub const QUERY_PROMPT_TEMPLATE: &str = r#"Plan web searches for a hiring market analysis.

{context}

Write between {min_queries} and {max_queries} search queries. Cover, without overlap:
- compensation data for this role, level and location
- demand and open-posting volume
- the skills employers ask for most
- competing employers and how they position the role
- recent news affecting the talent supply

Return {"queries": [...]}. Each query is a plain web-search string, not a question to you."#;

/// Replace: {context}, {candidates}
pub const SCORING_PROMPT_TEMPLATE: &str = r#"Judge the search results below as evidence for this market analysis.

{context}

For every candidate give three scores between 0 and 1:
- recency: 1 for the last three months, 0 for anything older than three years
- authority: 1 for primary data (official statistics, salary surveys, job boards), 0 for anonymous opinion
- relevance: how directly the source addresses this exact role and market

Refer to candidates by their [index]. Return {"scores": [{"index": 0, "recency": .., "authority": .., "relevance": ..}, ...]}.

{candidates}"#;

/// Replace: {context}, {source}
pub const EXTRACTION_PROMPT_TEMPLATE: &str = r#"Extract hiring-market facts from one web source.

{context}

Only record what the source states. Leave a field out when the source says nothing about it.
- key_findings: short factual statements relevant to hiring for this role
- salary_range: only when the source gives figures, with an ISO currency code
- skills_mentioned: skills or tools the source associates with the role
- demand_signals: statements about demand, hiring volume or competition
- posting_count: only when the source states a number of open postings

{source}"#;

/// Replace: {context}, {extractions}, {source_count}
pub const SYNTHESIS_PROMPT_TEMPLATE: &str = r#"Write a hiring market analysis from the research below.

{context}

{source_count} sources produced usable extractions. Cross-reference them:
- prefer facts stated by several sources; call out disagreements in the summary
- salary_range must reflect the sources, not a guess
- set confidence from how strongly the sources agree: near 1 only when several independent sources agree, below 0.5 when evidence is thin or conflicting
- when no extractions are available, rely on established industry knowledge and keep confidence low

{extractions}"#;
