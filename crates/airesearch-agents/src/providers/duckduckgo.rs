//! DuckDuckGo HTML search, scraped with `scraper`.

use std::time::Duration;

use airesearch_core::{CapabilityError, SearchProvider, SourceSnippet, normalize_whitespace};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use tracing::{debug, instrument};
use url::Url;

const DEFAULT_ENDPOINT: &str = "https://html.duckduckgo.com/html/";
const USER_AGENT: &str = concat!("airesearch/", env!("CARGO_PKG_VERSION"));

static RESULT: Lazy<Selector> =
    Lazy::new(|| Selector::parse("div.result").expect("invalid result selector"));
static TITLE: Lazy<Selector> =
    Lazy::new(|| Selector::parse("a.result__a").expect("invalid title selector"));
static SNIPPET: Lazy<Selector> =
    Lazy::new(|| Selector::parse(".result__snippet").expect("invalid snippet selector"));

pub struct DuckDuckGoSearch {
    client: reqwest::Client,
    endpoint: String,
}

impl DuckDuckGoSearch {
    pub fn new(timeout: Duration) -> Result<Self, CapabilityError> {
        Self::with_endpoint(DEFAULT_ENDPOINT, timeout)
    }

    pub fn with_endpoint(
        endpoint: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, CapabilityError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|err| {
                CapabilityError::Unreachable(format!("failed to build http client: {err}"))
            })?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }
}

/// Resolve DuckDuckGo redirect links (`/l/?uddg=<target>`) to their target.
pub fn decode_result_link(href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() {
        return None;
    }

    let absolute = if href.starts_with("//") {
        format!("https:{href}")
    } else if href.starts_with('/') {
        format!("https://duckduckgo.com{href}")
    } else {
        href.to_string()
    };
    let parsed = Url::parse(&absolute).ok()?;

    let is_redirect = parsed
        .host_str()
        .is_some_and(|host| host.ends_with("duckduckgo.com"));
    if !is_redirect {
        return Some(parsed.to_string());
    }

    parsed
        .query_pairs()
        .find(|(key, _)| key == "uddg")
        .map(|(_, target)| target.into_owned())
        .filter(|target| target.starts_with("http"))
}

/// Extract snippets from a results page, skipping ads and internal links.
pub fn parse_results(html: &str, limit: usize) -> Vec<SourceSnippet> {
    let document = Html::parse_document(html);
    let mut snippets = Vec::new();

    for element in document.select(&RESULT) {
        if snippets.len() >= limit {
            break;
        }
        if element
            .value()
            .attr("class")
            .is_some_and(|class| class.contains("result--ad"))
        {
            continue;
        }

        let Some(anchor) = element.select(&TITLE).next() else {
            continue;
        };
        let title = normalize_whitespace(&anchor.text().collect::<String>());
        let Some(url) = anchor.value().attr("href").and_then(decode_result_link) else {
            continue;
        };
        if title.is_empty() {
            continue;
        }

        let excerpt = element
            .select(&SNIPPET)
            .next()
            .map(|node| normalize_whitespace(&node.text().collect::<String>()))
            .unwrap_or_default();

        snippets.push(SourceSnippet::new(title, url, excerpt));
    }

    snippets
}

#[async_trait]
impl SearchProvider for DuckDuckGoSearch {
    fn name(&self) -> &str {
        "duckduckgo"
    }

    #[instrument(name = "search.duckduckgo", skip(self))]
    async fn search(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<SourceSnippet>, CapabilityError> {
        let form = [("q", query), ("b", ""), ("kl", "wt-wt")];
        let response = self
            .client
            .post(&self.endpoint)
            .form(&form)
            .send()
            .await
            .map_err(|err| CapabilityError::Unreachable(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(CapabilityError::Status {
                status: status.as_u16(),
                message: status
                    .canonical_reason()
                    .unwrap_or("unexpected status")
                    .to_string(),
            });
        }

        let body = response
            .text()
            .await
            .map_err(|err| CapabilityError::Malformed(err.to_string()))?;
        let snippets = parse_results(&body, limit);
        debug!(results = snippets.len(), "duckduckgo results parsed");
        Ok(snippets)
    }
}
