use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use graph_flow::{Context, NextAction, Task, TaskResult};
use tracing::{debug, info, instrument, warn};

use crate::error::ResearchError;
use crate::metrics::record_stage_metrics;
use crate::model::{
    AgentRole, Finding, Report, SourceSnippet, Topic, validate_findings, validate_report,
};
use crate::stages::{AnalyzeStage, ReportStage, SearchStage};
use crate::trace::{TraceCollector, TraceEvent};

pub(crate) const KEY_TOPIC: &str = "topic";
pub(crate) const KEY_SNIPPETS: &str = "search.snippets";
pub(crate) const KEY_FINDINGS: &str = "analysis.findings";
pub(crate) const KEY_REPORT: &str = "report.output";
pub(crate) const KEY_ERROR: &str = "run.error";
pub(crate) const KEY_TRACE: &str = "trace.events";

async fn record_trace(context: &Context, stage: AgentRole, message: impl Into<String>) {
    let events: Vec<TraceEvent> = context.get(KEY_TRACE).await.unwrap_or_default();
    let mut collector = TraceCollector::from_events(events);
    collector.record(stage, message);
    context.set(KEY_TRACE, collector.into_events()).await;
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}

/// Park the failure in the context and stop the graph.
async fn abort(
    context: &Context,
    stage: AgentRole,
    started: Instant,
    error: ResearchError,
) -> graph_flow::Result<TaskResult> {
    let duration_ms = elapsed_ms(started);
    record_stage_metrics(stage, "error", duration_ms);
    record_trace(context, stage, format!("failed: {error}")).await;
    warn!(%stage, kind = error.kind(), %error, duration_ms, "stage failed; aborting run");

    let message = error.to_string();
    context.set(KEY_ERROR, &error).await;
    Ok(TaskResult::new(Some(message), NextAction::End))
}

async fn require_topic(context: &Context) -> Result<Topic, ResearchError> {
    context
        .get::<Topic>(KEY_TOPIC)
        .await
        .ok_or_else(|| ResearchError::Orchestration("topic missing from run context".to_string()))
}

pub struct SearchTask {
    stage: Arc<dyn SearchStage>,
    max_results: usize,
}

impl SearchTask {
    pub fn new(stage: Arc<dyn SearchStage>, max_results: usize) -> Self {
        Self { stage, max_results }
    }
}

#[async_trait]
impl Task for SearchTask {
    fn id(&self) -> &str {
        "search"
    }

    #[instrument(name = "task.search", skip(self, context))]
    async fn run(&self, context: Context) -> graph_flow::Result<TaskResult> {
        let started = Instant::now();
        let role = self.stage.role();

        let topic = match require_topic(&context).await {
            Ok(topic) => topic,
            Err(err) => return abort(&context, role, started, err).await,
        };
        if self.max_results == 0 {
            let err = ResearchError::InvalidInput("max_results must be at least 1".to_string());
            return abort(&context, role, started, err).await;
        }

        let snippets = match self.stage.search(&topic, self.max_results).await {
            Ok(snippets) => snippets,
            Err(err) => return abort(&context, role, started, err).await,
        };

        let duration_ms = elapsed_ms(started);
        record_stage_metrics(role, "ok", duration_ms);
        record_trace(&context, role, format!("collected {} snippets", snippets.len())).await;
        info!(%topic, snippets = snippets.len(), duration_ms, "search stage completed");
        let urls: Vec<&str> = snippets.iter().map(|s| s.url.as_str()).collect();
        debug!(?urls, "search results");

        context.set(KEY_SNIPPETS, &snippets).await;

        Ok(TaskResult::new(
            Some(format!("Collected {} sources for \"{}\"", snippets.len(), topic)),
            NextAction::ContinueAndExecute,
        ))
    }
}

pub struct AnalyzeTask {
    stage: Arc<dyn AnalyzeStage>,
}

impl AnalyzeTask {
    pub fn new(stage: Arc<dyn AnalyzeStage>) -> Self {
        Self { stage }
    }
}

#[async_trait]
impl Task for AnalyzeTask {
    fn id(&self) -> &str {
        "analyze"
    }

    #[instrument(name = "task.analyze", skip(self, context))]
    async fn run(&self, context: Context) -> graph_flow::Result<TaskResult> {
        let started = Instant::now();
        let role = self.stage.role();
        let snippets: Vec<SourceSnippet> = context.get(KEY_SNIPPETS).await.unwrap_or_default();

        let findings = match self.stage.analyze(&snippets).await {
            Ok(findings) => findings,
            Err(err) => return abort(&context, role, started, err).await,
        };
        if let Err(err) = validate_findings(&findings, snippets.len()) {
            return abort(&context, role, started, err).await;
        }

        let duration_ms = elapsed_ms(started);
        record_stage_metrics(role, "ok", duration_ms);
        record_trace(&context, role, format!("extracted {} findings", findings.len())).await;
        info!(
            snippets = snippets.len(),
            findings = findings.len(),
            duration_ms,
            "analysis stage completed"
        );

        context.set(KEY_FINDINGS, &findings).await;

        Ok(TaskResult::new(
            Some(format!("Extracted {} findings", findings.len())),
            NextAction::ContinueAndExecute,
        ))
    }
}

pub struct ReportTask {
    stage: Arc<dyn ReportStage>,
}

impl ReportTask {
    pub fn new(stage: Arc<dyn ReportStage>) -> Self {
        Self { stage }
    }
}

#[async_trait]
impl Task for ReportTask {
    fn id(&self) -> &str {
        "report"
    }

    #[instrument(name = "task.report", skip(self, context))]
    async fn run(&self, context: Context) -> graph_flow::Result<TaskResult> {
        let started = Instant::now();
        let role = self.stage.role();

        let topic = match require_topic(&context).await {
            Ok(topic) => topic,
            Err(err) => return abort(&context, role, started, err).await,
        };
        let snippets: Vec<SourceSnippet> = context.get(KEY_SNIPPETS).await.unwrap_or_default();
        let findings: Vec<Finding> = context.get(KEY_FINDINGS).await.unwrap_or_default();

        let report: Report = match self.stage.generate(&topic, &findings, &snippets).await {
            Ok(report) => report,
            Err(err) => return abort(&context, role, started, err).await,
        };
        if let Err(err) = validate_report(&report, &findings) {
            return abort(&context, role, started, err).await;
        }

        let duration_ms = elapsed_ms(started);
        record_stage_metrics(role, "ok", duration_ms);
        record_trace(
            &context,
            role,
            format!("wrote {} sections", report.sections.len()),
        )
        .await;
        info!(
            title = %report.title,
            sections = report.sections.len(),
            duration_ms,
            "report stage completed"
        );

        let title = report.title.clone();
        context.set(KEY_REPORT, &report).await;

        Ok(TaskResult::new(Some(title), NextAction::End))
    }
}
