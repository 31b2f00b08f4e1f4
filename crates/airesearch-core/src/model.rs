//! Entities exchanged between the Search, Analyzer and Report stages.
//!
//! Every value here is created fresh for a single pipeline run and never
//! shared with another run.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ResearchError;
use crate::trace::TraceEvent;

/// Research subject driving one pipeline run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Topic(String);

impl Topic {
    /// Build a topic, rejecting blank input.
    pub fn new(raw: impl Into<String>) -> Result<Self, ResearchError> {
        let raw = raw.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(ResearchError::InvalidInput(
                "topic must not be empty".to_string(),
            ));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Topic {
    type Error = ResearchError;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        Self::new(raw)
    }
}

impl From<Topic> for String {
    fn from(topic: Topic) -> Self {
        topic.0
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A single raw search result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceSnippet {
    pub title: String,
    pub url: String,
    pub excerpt: String,
}

impl SourceSnippet {
    pub fn new(
        title: impl Into<String>,
        url: impl Into<String>,
        excerpt: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
            excerpt: excerpt.into(),
        }
    }
}

/// A claim extracted from the snippets, with provenance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    pub claim: String,
    /// Positions in the run's snippet sequence supporting the claim.
    pub source_indices: BTreeSet<usize>,
}

impl Finding {
    pub fn new(claim: impl Into<String>, source_indices: impl IntoIterator<Item = usize>) -> Self {
        Self {
            claim: claim.into(),
            source_indices: source_indices.into_iter().collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportSection {
    pub heading: String,
    pub body: String,
    pub cited_source_indices: Vec<usize>,
}

impl ReportSection {
    pub fn new(
        heading: impl Into<String>,
        body: impl Into<String>,
        cited_source_indices: Vec<usize>,
    ) -> Self {
        Self {
            heading: heading.into(),
            body: body.into(),
            cited_source_indices,
        }
    }
}

/// Terminal artifact of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    pub title: String,
    pub sections: Vec<ReportSection>,
}

impl Report {
    /// All snippet indices cited anywhere in the report, ascending.
    pub fn cited_indices(&self) -> BTreeSet<usize> {
        self.sections
            .iter()
            .flat_map(|section| section.cited_source_indices.iter().copied())
            .collect()
    }
}

/// Agent role assignment for a pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentRole {
    /// Turns a topic into source snippets
    Search,
    /// Reduces snippets into findings
    Analyzer,
    /// Renders findings into a report
    Report,
}

impl AgentRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentRole::Search => "search",
            AgentRole::Analyzer => "analyzer",
            AgentRole::Report => "report",
        }
    }
}

impl fmt::Display for AgentRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything a run produced, for callers that render sources or persist artifacts.
#[derive(Debug, Clone, Serialize)]
pub struct RunOutcome {
    pub run_id: String,
    pub topic: Topic,
    pub snippets: Vec<SourceSnippet>,
    pub findings: Vec<Finding>,
    pub keywords: Vec<String>,
    pub report: Report,
    pub trace: Vec<TraceEvent>,
    pub duration_ms: u64,
}

/// Check that every finding points at an existing snippet.
pub fn validate_findings(findings: &[Finding], snippet_count: usize) -> Result<(), ResearchError> {
    for (idx, finding) in findings.iter().enumerate() {
        if let Some(bad) = finding
            .source_indices
            .iter()
            .find(|source| **source >= snippet_count)
        {
            return Err(ResearchError::AnalysisFailed(format!(
                "finding {idx} cites source {bad} but only {snippet_count} snippets exist"
            )));
        }
    }
    Ok(())
}

/// Check that a report has sections and cites only indices backed by a finding.
pub fn validate_report(report: &Report, findings: &[Finding]) -> Result<(), ResearchError> {
    if report.sections.is_empty() {
        return Err(ResearchError::GenerationFailed(
            "report contains no sections".to_string(),
        ));
    }

    let supported: BTreeSet<usize> = findings
        .iter()
        .flat_map(|finding| finding.source_indices.iter().copied())
        .collect();

    for section in &report.sections {
        if let Some(bad) = section
            .cited_source_indices
            .iter()
            .find(|idx| !supported.contains(idx))
        {
            return Err(ResearchError::GenerationFailed(format!(
                "section \"{}\" cites source {bad} which no finding references",
                section.heading
            )));
        }
    }
    Ok(())
}
