//! Stage contracts the orchestrator drives, one per agent.

use async_trait::async_trait;

use crate::error::ResearchError;
use crate::model::{AgentRole, Finding, Report, SourceSnippet, Topic};

/// Turns a topic into an ordered, URL-unique list of snippets.
#[async_trait]
pub trait SearchStage: Send + Sync {
    async fn search(
        &self,
        topic: &Topic,
        max_results: usize,
    ) -> Result<Vec<SourceSnippet>, ResearchError>;

    fn role(&self) -> AgentRole {
        AgentRole::Search
    }
}

/// Reduces snippets into findings whose indices point into `snippets`.
#[async_trait]
pub trait AnalyzeStage: Send + Sync {
    async fn analyze(&self, snippets: &[SourceSnippet]) -> Result<Vec<Finding>, ResearchError>;

    fn role(&self) -> AgentRole {
        AgentRole::Analyzer
    }
}

/// Organises findings into a cited report.
#[async_trait]
pub trait ReportStage: Send + Sync {
    async fn generate(
        &self,
        topic: &Topic,
        findings: &[Finding],
        snippets: &[SourceSnippet],
    ) -> Result<Report, ResearchError>;

    fn role(&self) -> AgentRole {
        AgentRole::Report
    }
}
