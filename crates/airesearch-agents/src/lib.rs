//! Search, Analyzer and Report agents plus the providers they talk to.
//!
//! Agents implement the stage traits from `airesearch-core`; [`build_orchestrator`]
//! picks demo or live wiring from a [`Config`](airesearch_core::Config).

mod analyzer;
mod factory;
mod parse;
mod prompts;
pub mod providers;
mod report;
mod search;

pub use analyzer::{AnalysisMode, AnalyzerAgent, AnalyzerSettings};
pub use factory::{assemble, build_orchestrator};
pub use parse::parse_json_payload;
pub use report::{ReportAgent, ReportMode, ReportSettings};
pub use search::{QueryStrategy, SearchAgent, normalize_url};
