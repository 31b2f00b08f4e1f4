//! Report agent: organises findings into a cited report.

use std::collections::BTreeSet;
use std::sync::Arc;

use airesearch_core::{
    AgentRole, Finding, GenerationRequest, Report, ReportSection, ReportStage, ResearchError,
    SourceSnippet, TextGenerator, Topic, normalize_whitespace,
};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::{info, instrument, warn};

use crate::parse::parse_json_payload;
use crate::prompts::{WRITER_SYSTEM, report_prompt};

const OVERVIEW_CLAIMS: usize = 3;

#[derive(Clone)]
pub enum ReportMode {
    Generative(Arc<dyn TextGenerator>),
    /// Fixed Overview / Key Findings / Implications layout built from the claims.
    Templated,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReportSettings {
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for ReportSettings {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_tokens: 2000,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ReportPayload {
    #[serde(default)]
    title: String,
    #[serde(default)]
    sections: Vec<RawSection>,
}

#[derive(Debug, Deserialize)]
struct RawSection {
    #[serde(default)]
    heading: String,
    #[serde(default)]
    body: String,
    #[serde(default)]
    citations: Vec<i64>,
}

pub struct ReportAgent {
    mode: ReportMode,
    settings: ReportSettings,
}

impl ReportAgent {
    pub fn new(mode: ReportMode, settings: ReportSettings) -> Self {
        Self { mode, settings }
    }

    pub fn templated() -> Self {
        Self::new(ReportMode::Templated, ReportSettings::default())
    }

    async fn generative(
        &self,
        generator: &dyn TextGenerator,
        topic: &Topic,
        findings: &[Finding],
        snippets: &[SourceSnippet],
    ) -> Result<Report, ResearchError> {
        let request = GenerationRequest::new(report_prompt(topic, findings, snippets))
            .with_system(WRITER_SYSTEM)
            .with_temperature(self.settings.temperature)
            .with_max_tokens(self.settings.max_tokens);

        let raw = generator.generate(&request).await.map_err(|err| {
            ResearchError::GenerationFailed(format!("{}: {err}", generator.name()))
        })?;
        let payload: ReportPayload =
            parse_json_payload(&raw).map_err(ResearchError::GenerationFailed)?;

        build_report(topic, payload, &supported_indices(findings))
    }
}

fn supported_indices(findings: &[Finding]) -> BTreeSet<usize> {
    findings
        .iter()
        .flat_map(|finding| finding.source_indices.iter().copied())
        .collect()
}

fn default_title(topic: &Topic) -> String {
    format!("Research Report: {topic}")
}

/// Turn model output into a report whose citations are all backed by findings.
fn build_report(
    topic: &Topic,
    payload: ReportPayload,
    supported: &BTreeSet<usize>,
) -> Result<Report, ResearchError> {
    let mut sections = Vec::new();

    for raw in payload.sections {
        let body = raw.body.trim().to_string();
        if body.is_empty() {
            continue;
        }
        let heading = match normalize_whitespace(&raw.heading) {
            heading if heading.is_empty() => "Findings".to_string(),
            heading => heading,
        };

        let mut citations: Vec<usize> = Vec::new();
        for idx in raw.citations {
            let valid = usize::try_from(idx)
                .ok()
                .filter(|idx| supported.contains(idx));
            match valid {
                Some(idx) if !citations.contains(&idx) => citations.push(idx),
                Some(_) => {}
                None => warn!(%heading, citation = idx, "dropping unsupported citation"),
            }
        }

        sections.push(ReportSection::new(heading, body, citations));
    }

    if sections.is_empty() {
        return Err(ResearchError::GenerationFailed(
            "model produced no usable report sections".to_string(),
        ));
    }

    let title = match normalize_whitespace(&payload.title) {
        title if title.is_empty() => default_title(topic),
        title => title,
    };
    Ok(Report { title, sections })
}

fn citation_markers(indices: &BTreeSet<usize>) -> String {
    indices
        .iter()
        .map(|idx| format!("[{}]", idx + 1))
        .collect::<String>()
}

fn templated_report(topic: &Topic, findings: &[Finding]) -> Report {
    let overview_findings = &findings[..findings.len().min(OVERVIEW_CLAIMS)];
    let overview = overview_findings
        .iter()
        .map(|finding| finding.claim.trim())
        .collect::<Vec<_>>()
        .join(" ");

    let key_findings = findings
        .iter()
        .map(|finding| {
            format!(
                "- {} {}",
                finding.claim.trim(),
                citation_markers(&finding.source_indices)
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    let implications = format!(
        "The research on {topic} shows significant developments and practical applications. \
         Organizations are increasingly adopting these approaches to improve efficiency and outcomes. \
         Continued work in this field is expected to drive further advancements."
    );

    let all: Vec<usize> = supported_indices(findings).into_iter().collect();
    let overview_cited: Vec<usize> = supported_indices(overview_findings).into_iter().collect();

    Report {
        title: default_title(topic),
        sections: vec![
            ReportSection::new("Overview", overview, overview_cited),
            ReportSection::new("Key Findings", key_findings, all.clone()),
            ReportSection::new("Implications", implications, all),
        ],
    }
}

#[async_trait]
impl ReportStage for ReportAgent {
    #[instrument(
        name = "agent.report",
        skip_all,
        fields(topic = %topic, findings = findings.len())
    )]
    async fn generate(
        &self,
        topic: &Topic,
        findings: &[Finding],
        snippets: &[SourceSnippet],
    ) -> Result<Report, ResearchError> {
        if findings.is_empty() {
            warn!("no findings to report on");
            return Err(ResearchError::EmptyInput);
        }

        let report = match &self.mode {
            ReportMode::Generative(generator) => {
                self.generative(generator.as_ref(), topic, findings, snippets)
                    .await?
            }
            ReportMode::Templated => templated_report(topic, findings),
        };

        info!(
            title = %report.title,
            sections = report.sections.len(),
            cited = report.cited_indices().len(),
            "report generated"
        );
        Ok(report)
    }

    fn role(&self) -> AgentRole {
        AgentRole::Report
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

    fn generative(
        response: Result<String, CapabilityError>,
    ) -> (ReportAgent, Arc<CannedGenerator>) {
        let generator = Arc::new(CannedGenerator {
            response,
            calls: AtomicUsize::new(0),
        });
        let agent = ReportAgent::new(
            ReportMode::Generative(generator.clone()),
            ReportSettings::default(),
        );
        (agent, generator)
    }

    fn topic() -> Topic {
        Topic::new("quantum computing").unwrap()
    }

    fn findings() -> Vec<Finding> {
        vec![
            Finding::new("Qubits replace classical bits.", [0]),
            Finding::new("Applications include cryptography.", [1, 2]),
        ]
    }

    #[tokio::test]
    async fn empty_findings_are_rejected_before_generation() {
        let (agent, generator) = generative(Ok("{}".into()));
        let err = agent.generate(&topic(), &[], &[]).await.unwrap_err();
        assert_eq!(err, ResearchError::EmptyInput);
        assert_eq!(generator.calls.load(Ordering::SeqCst), 0);

        let err = ReportAgent::templated()
            .generate(&topic(), &[], &[])
            .await
            .unwrap_err();
        assert_eq!(err, ResearchError::EmptyInput);
    }

    #[tokio::test]
    async fn generative_report_filters_unsupported_citations() {
        let (agent, _) = generative(Ok(r#"Here is the report:
            {"title": "  ", "sections": [
                {"heading": "Overview", "body": "Qubits matter.", "citations": [0, 0, 7, -2]},
                {"heading": "Empty", "body": "   ", "citations": [1]},
                {"heading": "", "body": "Crypto is affected.", "citations": [2, 1]}
            ]}"#
        .into()));

        let report = agent.generate(&topic(), &findings(), &[]).await.unwrap();
        assert_eq!(report.title, "Research Report: quantum computing");
        assert_eq!(report.sections.len(), 2);
        assert_eq!(report.sections[0].cited_source_indices, vec![0]);
        assert_eq!(report.sections[1].heading, "Findings");
        assert_eq!(report.sections[1].cited_source_indices, vec![2, 1]);
    }

    #[tokio::test]
    async fn generative_failures_map_to_generation_failed() {
        for response in [
            Ok("no json here".to_string()),
            Ok(r#"{"title": "t", "sections": []}"#.to_string()),
            Err(CapabilityError::Unreachable("timeout".into())),
        ] {
            let (agent, _) = generative(response);
            assert!(matches!(
                agent.generate(&topic(), &findings(), &[]).await,
                Err(ResearchError::GenerationFailed(_))
            ));
        }
    }

    #[tokio::test]
    async fn templated_report_has_three_cited_sections() {
        let report = ReportAgent::templated()
            .generate(&topic(), &findings(), &[])
            .await
            .unwrap();

        let headings: Vec<&str> = report
            .sections
            .iter()
            .map(|section| section.heading.as_str())
            .collect();
        assert_eq!(headings, vec!["Overview", "Key Findings", "Implications"]);
        assert_eq!(report.sections[1].cited_source_indices, vec![0, 1, 2]);
        assert!(report.sections[1].body.contains("[2][3]"));
        assert!(report.sections[2].body.contains("quantum computing"));
    }
}
