use std::sync::Arc;
use std::time::Instant;

use graph_flow::{
    ExecutionStatus, FlowRunner, Graph, GraphBuilder, InMemorySessionStorage, Session,
    SessionStorage, Task,
};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::error::ResearchError;
use crate::metrics::record_run_metrics;
use crate::model::{Finding, Report, RunOutcome, SourceSnippet, Topic};
use crate::stages::{AnalyzeStage, ReportStage, SearchStage};
use crate::tasks::{
    AnalyzeTask, KEY_ERROR, KEY_FINDINGS, KEY_REPORT, KEY_SNIPPETS, KEY_TOPIC, KEY_TRACE,
    ReportTask, SearchTask,
};
use crate::text::extract_keywords;
use crate::trace::TraceEvent;

const DEFAULT_MAX_KEYWORDS: usize = 10;

/// Settings fixed when the orchestrator is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineSettings {
    pub max_results: usize,
    pub max_keywords: usize,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            max_results: 5,
            max_keywords: DEFAULT_MAX_KEYWORDS,
        }
    }
}

/// Per-run options.
pub struct RunOptions {
    pub topic: Topic,
    pub run_id: Option<String>,
}

impl RunOptions {
    pub fn new(topic: Topic) -> Self {
        Self {
            topic,
            run_id: None,
        }
    }

    pub fn with_run_id(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = Some(run_id.into());
        self
    }
}

/// Drives Search -> Analyze -> Report for one topic at a time.
///
/// The graph is built once and shared; every run gets its own session storage,
/// so concurrent runs never observe each other's context.
#[derive(Clone)]
pub struct Orchestrator {
    graph: Arc<Graph>,
    start_task: String,
    settings: PipelineSettings,
}

impl Orchestrator {
    pub fn new(
        search: Arc<dyn SearchStage>,
        analyzer: Arc<dyn AnalyzeStage>,
        reporter: Arc<dyn ReportStage>,
        settings: PipelineSettings,
    ) -> Self {
        let search_task = Arc::new(SearchTask::new(search, settings.max_results));
        let analyze_task = Arc::new(AnalyzeTask::new(analyzer));
        let report_task = Arc::new(ReportTask::new(reporter));
        let start_task = search_task.id().to_string();

        let graph = GraphBuilder::new("airesearch_pipeline")
            .add_task(search_task.clone())
            .add_task(analyze_task.clone())
            .add_task(report_task.clone())
            .add_edge(search_task.id(), analyze_task.id())
            .add_edge(analyze_task.id(), report_task.id())
            .set_start_task(search_task.id())
            .build();

        Self {
            graph: Arc::new(graph),
            start_task,
            settings,
        }
    }

    pub fn settings(&self) -> PipelineSettings {
        self.settings
    }

    /// Run the pipeline and return only the report.
    pub async fn run(&self, topic: &Topic) -> Result<Report, ResearchError> {
        self.run_with_options(RunOptions::new(topic.clone()))
            .await
            .map(|outcome| outcome.report)
    }

    /// Run the pipeline and return every intermediate artifact.
    ///
    /// The first stage failure is returned unchanged; no partial report escapes.
    #[instrument(name = "pipeline.run", skip(self, options), fields(topic = %options.topic))]
    pub async fn run_with_options(&self, options: RunOptions) -> Result<RunOutcome, ResearchError> {
        let started = Instant::now();
        let run_id = options
            .run_id
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let result = self.execute(&run_id, options.topic, started).await;
        match &result {
            Ok(outcome) => {
                record_run_metrics("ok");
                info!(
                    %run_id,
                    sections = outcome.report.sections.len(),
                    duration_ms = outcome.duration_ms,
                    "pipeline run completed"
                );
            }
            Err(err) => {
                record_run_metrics(err.kind());
                warn!(%run_id, kind = err.kind(), %err, "pipeline run failed");
            }
        }
        result
    }

    async fn execute(
        &self,
        run_id: &str,
        topic: Topic,
        started: Instant,
    ) -> Result<RunOutcome, ResearchError> {
        let storage = Arc::new(InMemorySessionStorage::new());
        let runner = FlowRunner::new(self.graph.clone(), storage.clone());

        let session = Session::new_from_task(run_id.to_string(), &self.start_task);
        session.context.set(KEY_TOPIC, &topic).await;
        storage
            .save(session)
            .await
            .map_err(|err| orchestration("failed to persist session", err))?;

        loop {
            let result = runner
                .run(run_id)
                .await
                .map_err(|err| orchestration("graph execution failure", err))?;

            match result.status {
                ExecutionStatus::Completed => break,
                ExecutionStatus::Error(message) => {
                    return Err(ResearchError::Orchestration(message));
                }
                _ => continue,
            }
        }

        let session = storage
            .get(run_id)
            .await
            .map_err(|err| orchestration("failed to reload session", err))?
            .ok_or_else(|| {
                ResearchError::Orchestration("session missing after execution".to_string())
            })?;
        let context = session.context;

        if let Some(error) = context.get::<ResearchError>(KEY_ERROR).await {
            return Err(error);
        }

        let report: Report = context.get(KEY_REPORT).await.ok_or_else(|| {
            ResearchError::Orchestration("pipeline finished without a report".to_string())
        })?;
        let snippets: Vec<SourceSnippet> = context.get(KEY_SNIPPETS).await.unwrap_or_default();
        let findings: Vec<Finding> = context.get(KEY_FINDINGS).await.unwrap_or_default();
        let trace: Vec<TraceEvent> = context.get(KEY_TRACE).await.unwrap_or_default();

        let corpus = snippets
            .iter()
            .map(|snippet| snippet.excerpt.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        let keywords = extract_keywords(&corpus, self.settings.max_keywords);

        Ok(RunOutcome {
            run_id: run_id.to_string(),
            topic,
            snippets,
            findings,
            keywords,
            report,
            trace,
            duration_ms: started.elapsed().as_millis() as u64,
        })
    }
}

fn orchestration(context: &str, err: impl std::fmt::Display) -> ResearchError {
    ResearchError::Orchestration(format!("{context}: {err}"))
}
