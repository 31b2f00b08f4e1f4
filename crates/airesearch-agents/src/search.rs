//! Search agent: turns a topic into a de-duplicated list of snippets.

use std::collections::HashSet;
use std::sync::Arc;

use airesearch_core::{
    AgentRole, GenerationRequest, ResearchError, SearchProvider, SearchStage, SourceSnippet,
    TextGenerator, Topic,
};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::prompts::{QUERY_SYSTEM, query_prompt};

static LIST_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"^\s*(?:\d+[.)]|[-*•])\s*"#).expect("invalid list marker regex"));

/// How a topic becomes search queries.
#[derive(Clone)]
pub enum QueryStrategy {
    /// Topic plus "latest developments" and "practical applications" variants.
    Templated,
    /// Ask the model for queries, falling back to the templated set.
    Generated(Arc<dyn TextGenerator>),
}

pub struct SearchAgent {
    provider: Arc<dyn SearchProvider>,
    strategy: QueryStrategy,
    queries_per_topic: usize,
}

impl SearchAgent {
    pub fn new(provider: Arc<dyn SearchProvider>, queries_per_topic: usize) -> Self {
        Self {
            provider,
            strategy: QueryStrategy::Templated,
            queries_per_topic: queries_per_topic.max(1),
        }
    }

    pub fn with_strategy(mut self, strategy: QueryStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn templated_queries(topic: &Topic, count: usize) -> Vec<String> {
        [
            topic.to_string(),
            format!("{topic} latest developments"),
            format!("{topic} practical applications"),
        ]
        .into_iter()
        .take(count.max(1))
        .collect()
    }

    async fn queries(&self, topic: &Topic) -> Vec<String> {
        let generator = match &self.strategy {
            QueryStrategy::Templated => {
                return Self::templated_queries(topic, self.queries_per_topic);
            }
            QueryStrategy::Generated(generator) => generator,
        };

        let request = GenerationRequest::new(query_prompt(topic, self.queries_per_topic))
            .with_system(QUERY_SYSTEM)
            .with_temperature(0.7)
            .with_max_tokens(200);

        match generator.generate(&request).await {
            Ok(text) => {
                let queries: Vec<String> = text
                    .lines()
                    .map(|line| {
                        LIST_MARKER
                            .replace(line, "")
                            .trim()
                            .trim_matches('"')
                            .trim()
                            .to_string()
                    })
                    .filter(|line| !line.is_empty())
                    .take(self.queries_per_topic)
                    .collect();
                if queries.is_empty() {
                    warn!(%topic, "query generation returned nothing; using templated queries");
                    Self::templated_queries(topic, self.queries_per_topic)
                } else {
                    queries
                }
            }
            Err(err) => {
                warn!(%topic, error = %err, "query generation failed; using templated queries");
                Self::templated_queries(topic, self.queries_per_topic)
            }
        }
    }
}

/// Key used for URL de-duplication; `None` when there is no usable URL.
pub fn normalize_url(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    let normalized = match Url::parse(trimmed) {
        Ok(mut url) => {
            url.set_fragment(None);
            url.to_string()
        }
        Err(_) => trimmed.to_lowercase(),
    };
    Some(normalized.trim_end_matches('/').to_string())
}

#[async_trait]
impl SearchStage for SearchAgent {
    #[instrument(name = "agent.search", skip(self), fields(provider = self.provider.name()))]
    async fn search(
        &self,
        topic: &Topic,
        max_results: usize,
    ) -> Result<Vec<SourceSnippet>, ResearchError> {
        if max_results == 0 {
            return Err(ResearchError::InvalidInput(
                "max_results must be at least 1".to_string(),
            ));
        }

        let queries = self.queries(topic).await;
        debug!(?queries, "issuing search queries");

        let mut seen = HashSet::new();
        let mut snippets = Vec::new();
        let mut failures = Vec::new();
        let mut attempted = 0usize;

        for query in &queries {
            if snippets.len() >= max_results {
                break;
            }
            attempted += 1;

            let results = match self.provider.search(query, max_results).await {
                Ok(results) => results,
                Err(err) => {
                    warn!(%query, error = %err, "search query failed");
                    failures.push(err.to_string());
                    continue;
                }
            };

            for snippet in results {
                let Some(key) = normalize_url(&snippet.url) else {
                    continue;
                };
                if seen.insert(key) {
                    snippets.push(snippet);
                    if snippets.len() >= max_results {
                        break;
                    }
                }
            }
        }

        if attempted > 0 && failures.len() == attempted {
            return Err(ResearchError::SearchUnavailable(format!(
                "all {attempted} queries failed via {}: {}",
                self.provider.name(),
                failures.join("; ")
            )));
        }

        if snippets.is_empty() {
            return Err(ResearchError::SearchUnavailable(format!(
                "no results for '{topic}' from {} across {attempted} queries",
                self.provider.name()
            )));
        }

        info!(
            %topic,
            queries = attempted,
            failed = failures.len(),
            snippets = snippets.len(),
            "search agent gathered sources"
        );
        Ok(snippets)
    }

    fn role(&self) -> AgentRole {
        AgentRole::Search
    }
}
