//! Wires configured providers and agents into an [`Orchestrator`].

use std::sync::Arc;
use std::time::Duration;

use airesearch_core::{
    AssistantError, Config, Mode, Orchestrator, PipelineSettings, QueryStrategyKind,
    SearchBackend, SearchProvider, TextGenerator,
};
use tracing::info;

use crate::analyzer::{AnalysisMode, AnalyzerAgent, AnalyzerSettings};
use crate::providers::{DemoSearch, DuckDuckGoSearch, OpenAiGenerator};
use crate::report::{ReportAgent, ReportMode, ReportSettings};
use crate::search::{QueryStrategy, SearchAgent};

/// Build the pipeline described by `config`.
///
/// Demo mode never touches the network. Live mode requires the API key
/// environment variable named in `[llm]`.
pub fn build_orchestrator(config: &Config) -> Result<Orchestrator, AssistantError> {
    match config.mode {
        Mode::Demo => {
            info!(mode = "demo", "building offline pipeline");
            Ok(assemble(config, Arc::new(DemoSearch::new()), None))
        }
        Mode::Live => {
            if !config.llm.provider.eq_ignore_ascii_case("openai") {
                return Err(AssistantError::InvalidConfiguration(format!(
                    "unsupported llm provider '{}'",
                    config.llm.provider
                )));
            }
            let api_key = config.llm_api_key()?;
            let generator: Arc<dyn TextGenerator> = Arc::new(
                OpenAiGenerator::from_config(&config.llm, api_key)
                    .map_err(|err| AssistantError::InvalidConfiguration(err.to_string()))?,
            );

            let provider: Arc<dyn SearchProvider> = match config.search.provider {
                SearchBackend::DuckDuckGo => Arc::new(
                    DuckDuckGoSearch::new(Duration::from_secs(config.search.timeout_secs.max(1)))
                        .map_err(|err| AssistantError::InvalidConfiguration(err.to_string()))?,
                ),
                SearchBackend::Demo => Arc::new(DemoSearch::new()),
            };

            info!(
                mode = "live",
                model = %config.llm.model,
                search = provider.name(),
                "building live pipeline"
            );
            Ok(assemble(config, provider, Some(generator)))
        }
    }
}

/// Assemble agents around explicit capabilities.
///
/// With a generator the analyzer and report stages are generative; without
/// one they fall back to the extractive and templated implementations.
pub fn assemble(
    config: &Config,
    provider: Arc<dyn SearchProvider>,
    generator: Option<Arc<dyn TextGenerator>>,
) -> Orchestrator {
    let strategy = match (&generator, config.search.query_strategy) {
        (Some(generator), QueryStrategyKind::Generated) => {
            QueryStrategy::Generated(generator.clone())
        }
        _ => QueryStrategy::Templated,
    };
    let search =
        SearchAgent::new(provider, config.search.queries_per_topic).with_strategy(strategy);

    let analyzer_settings = AnalyzerSettings {
        max_findings: config.analysis.max_findings,
        max_context_chars: config.analysis.max_context_chars,
        temperature: config.analysis.temperature,
        max_tokens: config.analysis.max_tokens,
    };
    let report_settings = ReportSettings {
        temperature: config.llm.temperature,
        max_tokens: config.llm.max_tokens,
    };

    let (analysis_mode, report_mode) = match generator {
        Some(generator) => (
            AnalysisMode::Generative(generator.clone()),
            ReportMode::Generative(generator),
        ),
        None => (AnalysisMode::Extractive, ReportMode::Templated),
    };

    Orchestrator::new(
        Arc::new(search),
        Arc::new(AnalyzerAgent::new(analysis_mode, analyzer_settings)),
        Arc::new(ReportAgent::new(report_mode, report_settings)),
        PipelineSettings {
            max_results: config.search.max_results,
            max_keywords: config.analysis.max_keywords,
        },
    )
}
