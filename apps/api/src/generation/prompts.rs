// All prompt constants for the domain pipelines.
// Reuses cross-cutting fragments from llm_client::prompts.
// Bump a pipeline's *_PROMPT_VERSION whenever its template changes; the
// version is stamped on every generated result.

// ────────────────────────────────────────────────────────────────────────────
// Job description
// ────────────────────────────────────────────────────────────────────────────

pub const JOB_DESCRIPTION_PROMPT_VERSION: &str = "job-description-v4";

pub const JOB_DESCRIPTION_SYSTEM: &str = "You are an experienced technical recruiter who writes \
    clear, inclusive job descriptions. Use plain language, avoid gendered wording and \
    avoid inflated requirements.";

/// Replace: {role}, {company}, {level}, {location}, {team_context}, {key_requirements}
pub const JOB_DESCRIPTION_PROMPT_TEMPLATE: &str = r#"Write a job description.

{role}
{company}
{level}
{location}
{team_context}
{key_requirements}

Rules:
- summary: two or three sentences on the role's purpose and impact. No sign-off, no notes.
- responsibilities: 4 to 10 concrete outcomes, each starting with a verb
- requirements: 3 to 10 genuine must-haves; include every key requirement given above
- nice_to_haves: at most 6
- benefits: at most 8, only generic ones unless the company context names specific benefits"#;

// ────────────────────────────────────────────────────────────────────────────
// Interview plan
// ────────────────────────────────────────────────────────────────────────────

pub const INTERVIEW_PLAN_PROMPT_VERSION: &str = "interview-plan-v3";

pub const INTERVIEW_PLAN_SYSTEM: &str = "You are a hiring manager designing a structured, \
    fair interview loop. Every stage has a clear purpose and no two stages assess the same \
    thing twice unless deliberately.";

/// Replace: {role}, {level}, {competencies}, {stage_count}
pub const INTERVIEW_PLAN_PROMPT_TEMPLATE: &str = r#"Design the interview stages for this role.

{role}
{level}
{competencies}

Plan {stage_count}. For each stage give:
- name
- duration_minutes between 15 and 240
- focus_areas: 1 to 6 competencies the stage assesses
- interviewer_role: who runs it (for example "Engineering Manager")
- sample_questions: 1 to 8 open questions"#;

// ────────────────────────────────────────────────────────────────────────────
// Hiring strategy
// ────────────────────────────────────────────────────────────────────────────

pub const HIRING_STRATEGY_PROMPT_VERSION: &str = "hiring-strategy-v2";

pub const HIRING_STRATEGY_SYSTEM: &str = "You are a talent acquisition lead planning how to \
    fill a role. Be concrete about channels and timing and honest about risks.";

/// Replace: {role}, {level}, {location}, {urgency}, {constraints}, {market_summary}
pub const HIRING_STRATEGY_PROMPT_TEMPLATE: &str = r#"Plan a hiring strategy.

{role}
{level}
{location}
{urgency}
{constraints}
{market_summary}

Return:
- positioning: how to pitch the role to candidates in two or three sentences
- sourcing_channels: 2 to 8 channels, each with a one-sentence rationale
- compensation_guidance: how to set and communicate the offer
- timeline_weeks: realistic weeks from kickoff to signed offer (1 to 52)
- risks: at most 6 things likely to slow or derail the search"#;

// ────────────────────────────────────────────────────────────────────────────
// Feedback synthesis
// ────────────────────────────────────────────────────────────────────────────

pub const FEEDBACK_SYNTHESIS_PROMPT_VERSION: &str = "feedback-synthesis-v3";

pub const FEEDBACK_SYNTHESIS_SYSTEM: &str = "You are a hiring committee chair. You weigh \
    interviewer feedback evenly, separate evidence from impressions and never add \
    observations nobody made.";

/// Replace: {role}, {candidate}, {feedback}
pub const FEEDBACK_SYNTHESIS_PROMPT_TEMPLATE: &str = r#"Synthesize the interview feedback below into one hiring recommendation.

{role}
{candidate}

Rules:
- strengths and concerns must each trace back to at least one interviewer's notes
- recommendation is one of strong_hire, hire, no_hire, strong_no_hire
- confidence reflects how much the interviewers agree (0 to 1), not how strong the candidate is

{feedback}"#;

// ────────────────────────────────────────────────────────────────────────────
// Interview coverage
// ────────────────────────────────────────────────────────────────────────────

pub const INTERVIEW_COVERAGE_PROMPT_VERSION: &str = "interview-coverage-v2";

pub const INTERVIEW_COVERAGE_SYSTEM: &str = "You are an interview-process auditor. You check \
    whether an interview loop assesses every required competency exactly as often as needed.";

/// Replace: {role}, {competencies}, {stages}
pub const INTERVIEW_COVERAGE_PROMPT_TEMPLATE: &str = r#"Audit this interview loop against the required competencies.

{role}
{competencies}
{stages}

For each required competency, list the stages that assess it and rate the coverage as none, partial or full.
List gaps (competencies nobody assesses properly) and redundancies (competencies assessed in more stages than useful).
coverage_score is the share of competencies with full coverage, counting partial as half."#;

// ────────────────────────────────────────────────────────────────────────────
// Candidate profile
// ────────────────────────────────────────────────────────────────────────────

pub const CANDIDATE_PROFILE_PROMPT_VERSION: &str = "candidate-profile-v2";

pub const CANDIDATE_PROFILE_SYSTEM: &str = "You are a sourcing specialist describing the ideal \
    candidate for a role so recruiters can search for them.";

/// Replace: {role}, {level}, {job_description}, {team_context}
pub const CANDIDATE_PROFILE_PROMPT_TEMPLATE: &str = r#"Describe the ideal candidate for this role.

{role}
{level}
{job_description}
{team_context}

Return:
- headline: one line a recruiter could use as a search summary
- must_have_skills: 3 to 10
- preferred_skills: at most 8
- experience_years: a realistic range, min and max between 0 and 40
- backgrounds: at most 6 typical previous roles or industries
- red_flags: at most 6 signals that a profile is a poor fit. Never use protected characteristics."#;

// ────────────────────────────────────────────────────────────────────────────
// Quick market research
// ────────────────────────────────────────────────────────────────────────────

pub const QUICK_MARKET_PROMPT_VERSION: &str = "market-research-quick-v2";

pub const QUICK_MARKET_SYSTEM: &str = "You are a senior talent-market analyst answering from \
    established industry knowledge only. You have no live data; say so through a modest \
    confidence rather than by hedging every sentence.";

/// Replace: {context}
pub const QUICK_MARKET_PROMPT_TEMPLATE: &str = r#"Give a quick hiring market analysis.

{context}

Cover typical compensation, demand, the skills employers ask for, competing employers and the main hiring challenges.
Set estimated_posting_count only if you have a well-founded sense of the volume."#;
