//! Analyzer agent: reduces snippets into findings with provenance.

use std::collections::HashMap;
use std::sync::Arc;

use airesearch_core::{
    AgentRole, AnalyzeStage, Finding, GenerationRequest, ResearchError, SourceSnippet,
    TextGenerator, extract_key_points, first_sentence, normalize_whitespace,
};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info, instrument, warn};

use crate::parse::parse_json_payload;
use crate::prompts::{ANALYST_SYSTEM, analysis_prompt};

#[derive(Clone)]
pub enum AnalysisMode {
    /// Ask the model for findings as JSON.
    Generative(Arc<dyn TextGenerator>),
    /// Offline sentence scoring, one key point per snippet.
    Extractive,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnalyzerSettings {
    pub max_findings: usize,
    pub max_context_chars: usize,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for AnalyzerSettings {
    fn default() -> Self {
        Self {
            max_findings: 5,
            max_context_chars: 3000,
            temperature: 0.5,
            max_tokens: 500,
        }
    }
}

#[derive(Debug, Deserialize)]
struct FindingsPayload {
    #[serde(default)]
    findings: Vec<RawFinding>,
}

#[derive(Debug, Deserialize)]
struct RawFinding {
    #[serde(default)]
    claim: String,
    #[serde(default)]
    sources: Vec<i64>,
}

pub struct AnalyzerAgent {
    mode: AnalysisMode,
    settings: AnalyzerSettings,
}

impl AnalyzerAgent {
    pub fn new(mode: AnalysisMode, settings: AnalyzerSettings) -> Self {
        Self { mode, settings }
    }

    pub fn extractive(settings: AnalyzerSettings) -> Self {
        Self::new(AnalysisMode::Extractive, settings)
    }

    async fn generative(
        &self,
        generator: &dyn TextGenerator,
        snippets: &[SourceSnippet],
    ) -> Result<Vec<Finding>, ResearchError> {
        let request = GenerationRequest::new(analysis_prompt(
            snippets,
            self.settings.max_findings,
            self.settings.max_context_chars,
        ))
        .with_system(ANALYST_SYSTEM)
        .with_temperature(self.settings.temperature)
        .with_max_tokens(self.settings.max_tokens);

        let raw = generator
            .generate(&request)
            .await
            .map_err(|err| ResearchError::AnalysisFailed(format!("{}: {err}", generator.name())))?;
        let payload: FindingsPayload =
            parse_json_payload(&raw).map_err(ResearchError::AnalysisFailed)?;

        let findings =
            convert_findings(payload.findings, snippets.len(), self.settings.max_findings)?;
        if findings.is_empty() {
            return Err(ResearchError::AnalysisFailed(
                "model produced no usable findings".to_string(),
            ));
        }
        Ok(findings)
    }

    fn extractive_findings(&self, snippets: &[SourceSnippet]) -> Vec<Finding> {
        let mut findings: Vec<Finding> = Vec::new();
        let mut by_claim: HashMap<String, usize> = HashMap::new();

        for (idx, snippet) in snippets.iter().enumerate() {
            let claim = extract_key_points(&snippet.excerpt, 1)
                .into_iter()
                .next()
                .map(|point| format!("{point}."))
                .or_else(|| Some(first_sentence(&snippet.excerpt)).filter(|s| !s.is_empty()))
                .unwrap_or_else(|| snippet.title.clone());
            let claim = normalize_whitespace(&claim);
            if claim.is_empty() {
                continue;
            }

            let key = claim.to_lowercase();
            if let Some(existing) = by_claim.get(&key) {
                findings[*existing].source_indices.insert(idx);
                continue;
            }
            if findings.len() >= self.settings.max_findings {
                continue;
            }
            by_claim.insert(key, findings.len());
            findings.push(Finding::new(claim, [idx]));
        }

        findings
    }
}

/// Validate raw model findings against the snippet count.
///
/// Negative or out-of-range indices fail the stage; findings without a claim
/// or without sources are dropped.
fn convert_findings(
    raw: Vec<RawFinding>,
    snippet_count: usize,
    max_findings: usize,
) -> Result<Vec<Finding>, ResearchError> {
    let mut findings = Vec::new();
    for (position, item) in raw.into_iter().enumerate() {
        if let Some(bad) = item
            .sources
            .iter()
            .find(|idx| **idx < 0 || **idx as u64 >= snippet_count as u64)
        {
            return Err(ResearchError::AnalysisFailed(format!(
                "finding {position} cites source {bad} but only {snippet_count} snippets exist"
            )));
        }

        let claim = normalize_whitespace(&item.claim);
        if claim.is_empty() || item.sources.is_empty() {
            debug!(position, "dropping finding without claim or sources");
            continue;
        }
        if findings.len() < max_findings {
            findings.push(Finding::new(
                claim,
                item.sources.into_iter().map(|idx| idx as usize),
            ));
        }
    }
    Ok(findings)
}

#[async_trait]
impl AnalyzeStage for AnalyzerAgent {
    #[instrument(name = "agent.analyze", skip_all, fields(snippets = snippets.len()))]
    async fn analyze(&self, snippets: &[SourceSnippet]) -> Result<Vec<Finding>, ResearchError> {
        if snippets.is_empty() {
            info!("no snippets to analyze");
            return Ok(Vec::new());
        }

        let findings = match &self.mode {
            AnalysisMode::Generative(generator) => {
                self.generative(generator.as_ref(), snippets).await
            }
            AnalysisMode::Extractive => Ok(self.extractive_findings(snippets)),
        };

        match &findings {
            Ok(findings) => info!(findings = findings.len(), "analysis produced findings"),
            Err(err) => warn!(error = %err, "analysis failed"),
        }
        findings
    }

    fn role(&self) -> AgentRole {
        AgentRole::Analyzer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use airesearch_core::CapabilityError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CannedGenerator {
        response: Result<String, CapabilityError>,
        calls: AtomicUsize,
    }

    impl CannedGenerator {
        fn new(response: Result<String, CapabilityError>) -> Arc<Self> {
            Arc::new(Self {
                response,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl TextGenerator for CannedGenerator {
        fn name(&self) -> &str {
            "canned"
        }

        async fn generate(&self, _request: &GenerationRequest) -> Result<String, CapabilityError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.response.clone()
        }
    }

    fn snippets() -> Vec<SourceSnippet> {
        vec![
            SourceSnippet::new(
                "Introduction to Quantum Computing",
                "https://example.com/quantum-intro",
                "Quantum computers use quantum mechanical phenomena to solve complex problems faster than classical computers. They leverage qubits instead of traditional bits.",
            ),
            SourceSnippet::new(
                "Quantum Computing Applications",
                "https://example.com/quantum-apps",
                "Potential applications include cryptography, drug discovery, optimization problems, and materials science.",
            ),
            SourceSnippet::new("Untitled", "https://example.com/empty", ""),
        ]
    }

    fn generative(response: &str) -> (AnalyzerAgent, Arc<CannedGenerator>) {
        let generator = CannedGenerator::new(Ok(response.to_string()));
        let agent = AnalyzerAgent::new(
            AnalysisMode::Generative(generator.clone()),
            AnalyzerSettings::default(),
        );
        (agent, generator)
    }

    #[tokio::test]
    async fn empty_input_never_calls_the_model() {
        let (agent, generator) = generative("{}");
        assert!(agent.analyze(&[]).await.unwrap().is_empty());
        assert_eq!(generator.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn generative_findings_parse_from_fenced_json() {
        let (agent, _) = generative(
            "```json\n{\"findings\": [\
             {\"claim\": \"Qubits replace bits.\", \"sources\": [0]},\
             {\"claim\": \"Uses include cryptography.\", \"sources\": [1, 0, 1]},\
             {\"claim\": \"Unsupported.\", \"sources\": []}]}\n```",
        );
        let findings = agent.analyze(&snippets()).await.unwrap();
        assert_eq!(findings.len(), 2);
        assert_eq!(
            findings[1].source_indices.iter().copied().collect::<Vec<_>>(),
            vec![0, 1]
        );
    }

    #[tokio::test]
    async fn generative_out_of_range_or_negative_indices_fail() {
        for body in [
            r#"{"findings": [{"claim": "x", "sources": [3]}]}"#,
            r#"{"findings": [{"claim": "x", "sources": [-1]}]}"#,
        ] {
            let (agent, _) = generative(body);
            let err = agent.analyze(&snippets()).await.unwrap_err();
            assert!(matches!(err, ResearchError::AnalysisFailed(_)), "{body}");
        }
    }

    #[tokio::test]
    async fn generative_failures_map_to_analysis_failed() {
        let (agent, _) = generative("I could not find anything useful.");
        assert!(matches!(
            agent.analyze(&snippets()).await,
            Err(ResearchError::AnalysisFailed(_))
        ));

        let (agent, _) = generative(r#"{"findings": []}"#);
        assert!(matches!(
            agent.analyze(&snippets()).await,
            Err(ResearchError::AnalysisFailed(_))
        ));

        let generator = CannedGenerator::new(Err(CapabilityError::Status {
            status: 500,
            message: "boom".into(),
        }));
        let agent = AnalyzerAgent::new(
            AnalysisMode::Generative(generator),
            AnalyzerSettings::default(),
        );
        assert!(matches!(
            agent.analyze(&snippets()).await,
            Err(ResearchError::AnalysisFailed(_))
        ));
    }

    #[tokio::test]
    async fn extractive_findings_point_at_their_snippets() {
        let agent = AnalyzerAgent::extractive(AnalyzerSettings::default());
        let findings = agent.analyze(&snippets()).await.unwrap();

        assert_eq!(findings.len(), 3);
        for (idx, finding) in findings.iter().enumerate() {
            assert!(!finding.claim.is_empty());
            assert!(finding.source_indices.contains(&idx));
        }
        assert_eq!(findings[2].claim, "Untitled");
    }

    #[tokio::test]
    async fn extractive_merges_identical_claims_and_caps() {
        let duplicate = SourceSnippet::new(
            "Mirror",
            "https://mirror.example.com/quantum-intro",
            snippets()[0].excerpt.clone(),
        );
        let mut input = snippets();
        input.insert(1, duplicate);

        let agent = AnalyzerAgent::extractive(AnalyzerSettings {
            max_findings: 2,
            ..AnalyzerSettings::default()
        });
        let findings = agent.analyze(&input).await.unwrap();
        assert_eq!(findings.len(), 2);
        assert_eq!(
            findings[0].source_indices.iter().copied().collect::<Vec<_>>(),
            vec![0, 1]
        );
    }
}
