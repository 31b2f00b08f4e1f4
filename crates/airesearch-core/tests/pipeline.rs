use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use airesearch_core::{
    AgentRole, AnalyzeStage, Finding, Orchestrator, PipelineSettings, Report, ReportSection,
    ReportStage, ResearchError, RunOptions, SearchStage, SourceSnippet, Topic,
};
use async_trait::async_trait;

struct StubSearch {
    calls: AtomicUsize,
    result: Result<Vec<SourceSnippet>, ResearchError>,
}

impl StubSearch {
    fn returning(snippets: Vec<SourceSnippet>) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            result: Ok(snippets),
        })
    }

    fn failing(error: ResearchError) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            result: Err(error),
        })
    }
}

#[async_trait]
impl SearchStage for StubSearch {
    async fn search(
        &self,
        _topic: &Topic,
        max_results: usize,
    ) -> Result<Vec<SourceSnippet>, ResearchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.result
            .clone()
            .map(|snippets| snippets.into_iter().take(max_results).collect())
    }
}

/// One finding per snippet, optionally pointing past the end.
struct StubAnalyzer {
    calls: AtomicUsize,
    out_of_range: bool,
    failure: Option<ResearchError>,
}

impl StubAnalyzer {
    fn new(out_of_range: bool) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            out_of_range,
            failure: None,
        })
    }

    fn failing(error: ResearchError) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            out_of_range: false,
            failure: Some(error),
        })
    }
}

#[async_trait]
impl AnalyzeStage for StubAnalyzer {
    async fn analyze(&self, snippets: &[SourceSnippet]) -> Result<Vec<Finding>, ResearchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = &self.failure {
            return Err(error.clone());
        }
        let mut findings: Vec<Finding> = snippets
            .iter()
            .enumerate()
            .map(|(idx, snippet)| Finding::new(snippet.excerpt.clone(), [idx]))
            .collect();
        if self.out_of_range {
            findings.push(Finding::new("phantom claim", [snippets.len() + 4]));
        }
        Ok(findings)
    }
}

/// Empty findings are refused; otherwise one section citing everything.
struct StubReporter {
    calls: AtomicUsize,
    stray_citation: Option<usize>,
    failure: Option<ResearchError>,
}

impl StubReporter {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            stray_citation: None,
            failure: None,
        })
    }

    /// Also cites `index`, which no finding references.
    fn citing(index: usize) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            stray_citation: Some(index),
            failure: None,
        })
    }

    fn failing(error: ResearchError) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            stray_citation: None,
            failure: Some(error),
        })
    }
}

#[async_trait]
impl ReportStage for StubReporter {
    async fn generate(
        &self,
        topic: &Topic,
        findings: &[Finding],
        _snippets: &[SourceSnippet],
    ) -> Result<Report, ResearchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = &self.failure {
            return Err(error.clone());
        }
        if findings.is_empty() {
            return Err(ResearchError::EmptyInput);
        }
        let mut citations: Vec<usize> = findings
            .iter()
            .flat_map(|finding| finding.source_indices.iter().copied())
            .collect();
        citations.extend(self.stray_citation);
        Ok(Report {
            title: format!("Research Report: {topic}"),
            sections: vec![ReportSection::new(
                "Key Findings",
                findings
                    .iter()
                    .map(|finding| finding.claim.as_str())
                    .collect::<Vec<_>>()
                    .join(" "),
                citations,
            )],
        })
    }
}

fn quantum_snippets() -> Vec<SourceSnippet> {
    vec![
        SourceSnippet::new(
            "Quantum Computing Basics",
            "https://example.com/quantum-basics",
            "Quantum computers use qubits that can exist in superposition.",
        ),
        SourceSnippet::new(
            "Error Correction Advances",
            "https://example.com/quantum-error-correction",
            "Researchers demonstrated logical qubits with lower error rates.",
        ),
        SourceSnippet::new(
            "Quantum Applications",
            "https://example.com/quantum-applications",
            "Drug discovery and cryptography are early quantum applications.",
        ),
    ]
}

fn orchestrator(
    search: Arc<StubSearch>,
    analyzer: Arc<StubAnalyzer>,
    reporter: Arc<StubReporter>,
) -> Orchestrator {
    Orchestrator::new(
        search,
        analyzer,
        reporter,
        PipelineSettings {
            max_results: 5,
            ..PipelineSettings::default()
        },
    )
}

#[tokio::test]
async fn quantum_computing_run_cites_only_known_sources() {
    let search = StubSearch::returning(quantum_snippets());
    let analyzer = StubAnalyzer::new(false);
    let reporter = StubReporter::new();
    let orchestrator = orchestrator(search.clone(), analyzer.clone(), reporter.clone());

    let topic = Topic::new("quantum computing").unwrap();
    let outcome = orchestrator
        .run_with_options(RunOptions::new(topic).with_run_id("run-quantum"))
        .await
        .expect("pipeline should succeed");

    assert_eq!(outcome.run_id, "run-quantum");
    assert_eq!(outcome.snippets.len(), 3);
    assert!(
        outcome
            .findings
            .iter()
            .all(|finding| finding.source_indices.iter().all(|idx| *idx <= 2))
    );
    assert!(!outcome.report.sections.is_empty());
    assert!(outcome.report.cited_indices().iter().all(|idx| *idx <= 2));
    assert!(outcome.keywords.iter().any(|keyword| keyword == "qubits"));

    let stages: Vec<AgentRole> = outcome.trace.iter().map(|event| event.stage).collect();
    assert_eq!(
        stages,
        vec![AgentRole::Search, AgentRole::Analyzer, AgentRole::Report]
    );
    assert_eq!(search.calls.load(Ordering::SeqCst), 1);
    assert_eq!(analyzer.calls.load(Ordering::SeqCst), 1);
    assert_eq!(reporter.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn zero_snippets_surface_empty_input() {
    let reporter = StubReporter::new();
    let orchestrator = orchestrator(
        StubSearch::returning(Vec::new()),
        StubAnalyzer::new(false),
        reporter.clone(),
    );

    let err = orchestrator
        .run(&Topic::new("an obscure topic").unwrap())
        .await
        .unwrap_err();

    assert_eq!(err, ResearchError::EmptyInput);
    assert_eq!(reporter.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn search_failure_stops_before_later_stages() {
    let analyzer = StubAnalyzer::new(false);
    let reporter = StubReporter::new();
    let failure = ResearchError::SearchUnavailable("connection refused".to_string());
    let orchestrator = orchestrator(
        StubSearch::failing(failure.clone()),
        analyzer.clone(),
        reporter.clone(),
    );

    let err = orchestrator
        .run(&Topic::new("climate change").unwrap())
        .await
        .unwrap_err();

    assert_eq!(err, failure);
    assert_eq!(analyzer.calls.load(Ordering::SeqCst), 0);
    assert_eq!(reporter.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn out_of_range_findings_fail_analysis_without_reporting() {
    let reporter = StubReporter::new();
    let orchestrator = orchestrator(
        StubSearch::returning(quantum_snippets()),
        StubAnalyzer::new(true),
        reporter.clone(),
    );

    let err = orchestrator
        .run(&Topic::new("quantum computing").unwrap())
        .await
        .unwrap_err();

    assert!(matches!(err, ResearchError::AnalysisFailed(_)));
    assert_eq!(reporter.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn unsupported_report_citation_fails_generation() {
    let reporter = StubReporter::citing(7);
    let orchestrator = orchestrator(
        StubSearch::returning(quantum_snippets()),
        StubAnalyzer::new(false),
        reporter.clone(),
    );

    let err = orchestrator
        .run_with_options(RunOptions::new(Topic::new("quantum computing").unwrap()))
        .await
        .unwrap_err();

    assert!(matches!(err, ResearchError::GenerationFailed(_)));
    assert_eq!(reporter.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn analyzer_error_is_returned_unchanged() {
    let reporter = StubReporter::new();
    let failure = ResearchError::AnalysisFailed("model returned prose".to_string());
    let orchestrator = orchestrator(
        StubSearch::returning(quantum_snippets()),
        StubAnalyzer::failing(failure.clone()),
        reporter.clone(),
    );

    let err = orchestrator
        .run(&Topic::new("quantum computing").unwrap())
        .await
        .unwrap_err();

    assert_eq!(err, failure);
    assert_eq!(reporter.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn reporter_error_is_returned_unchanged() {
    let failure = ResearchError::GenerationFailed("upstream returned 503".to_string());
    let orchestrator = orchestrator(
        StubSearch::returning(quantum_snippets()),
        StubAnalyzer::new(false),
        StubReporter::failing(failure.clone()),
    );

    let err = orchestrator
        .run(&Topic::new("quantum computing").unwrap())
        .await
        .unwrap_err();

    assert_eq!(err, failure);
}

#[tokio::test]
async fn zero_max_results_is_invalid_input() {
    let search = StubSearch::returning(quantum_snippets());
    let orchestrator = Orchestrator::new(
        search.clone(),
        StubAnalyzer::new(false),
        StubReporter::new(),
        PipelineSettings {
            max_results: 0,
            ..PipelineSettings::default()
        },
    );

    let err = orchestrator
        .run(&Topic::new("quantum computing").unwrap())
        .await
        .unwrap_err();

    assert!(matches!(err, ResearchError::InvalidInput(_)));
    assert_eq!(search.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn concurrent_runs_do_not_share_state() {
    let orchestrator = orchestrator(
        StubSearch::returning(quantum_snippets()),
        StubAnalyzer::new(false),
        StubReporter::new(),
    );

    let first_topic = Topic::new("quantum computing").unwrap();
    let second_topic = Topic::new("quantum sensing").unwrap();
    let (first, second) = tokio::join!(
        orchestrator.run(&first_topic),
        orchestrator.run(&second_topic)
    );

    let first = first.expect("first run");
    let second = second.expect("second run");
    assert_eq!(first.title, "Research Report: quantum computing");
    assert_eq!(second.title, "Research Report: quantum sensing");
}
