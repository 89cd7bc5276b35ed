pub mod orchestrator;
pub mod prompts;
pub mod sources;
pub mod types;

pub use orchestrator::run_deep_research;
pub use types::{MarketReport, MarketResearchRequest};
