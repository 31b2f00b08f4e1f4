//! Core abstractions for the AI research assistant, built on top of `graph_flow`.
//!
//! The crate defines the data exchanged between the Search, Analyzer and Report
//! stages, the stage contracts, and the [`Orchestrator`] that runs them as a
//! linear workflow. Concrete agents and providers live in `airesearch-agents`.

mod capability;
mod config;
mod error;
mod logging;
mod metrics;
mod model;
mod render;
mod reports;
mod security;
mod stages;
mod tasks;
mod telemetry;
mod text;
mod trace;
mod workflow;

pub use capability::{CapabilityError, GenerationRequest, SearchProvider, TextGenerator};
pub use config::{
    AnalysisConfig, Config, ConfigLoader, CostEstimate, LlmConfig, LoggingConfig, Mode, Profile,
    QueryStrategyKind, ReportConfig, SearchBackend, SearchConfig,
};
pub use error::{AssistantError, ResearchError};
pub use logging::{RunLogInput, RunStatus, log_run_completion, remove_run_logs, sanitize_text};
pub use metrics::{init_metrics_from_env, record_run_metrics, record_stage_metrics};
pub use model::{
    AgentRole, Finding, Report, ReportSection, RunOutcome, SourceSnippet, Topic,
    validate_findings, validate_report,
};
pub use render::{format_sources, render_markdown};
pub use reports::{save_report, topic_slug};
pub use security::{SecretValue, require_env};
pub use stages::{AnalyzeStage, ReportStage, SearchStage};
pub use tasks::{AnalyzeTask, ReportTask, SearchTask};
pub use telemetry::{TelemetryOptions, init_telemetry};
pub use text::{
    extract_key_points, extract_keywords, first_sentence, normalize_whitespace, truncate_chars,
};
pub use trace::{TraceCollector, TraceEvent, TraceStep, TraceSummary, persist_trace};
pub use workflow::{Orchestrator, PipelineSettings, RunOptions};
