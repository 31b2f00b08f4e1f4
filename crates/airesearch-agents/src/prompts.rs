//! Prompt text for the generative stages.

use std::fmt::Write as _;

use airesearch_core::{Finding, SourceSnippet, Topic, truncate_chars};

pub const QUERY_SYSTEM: &str = "You are a research query generator.";
pub const ANALYST_SYSTEM: &str =
    "You are an expert research analyst. You only state claims supported by the numbered sources.";
pub const WRITER_SYSTEM: &str =
    "You are a research report writer. You cite sources only by the numbers you are given.";

pub fn query_prompt(topic: &Topic, count: usize) -> String {
    format!(
        "Generate {count} different web search queries to research the topic: \"{topic}\".\n\
         Cover a general overview, recent developments and practical applications.\n\
         Return ONLY the queries, one per line, without numbering or explanation."
    )
}

/// Numbered snippets, each excerpt cut to an even share of `max_context_chars`.
pub fn analysis_prompt(
    snippets: &[SourceSnippet],
    max_findings: usize,
    max_context_chars: usize,
) -> String {
    let per_snippet = (max_context_chars / snippets.len().max(1)).max(80);

    let mut sources = String::new();
    for (idx, snippet) in snippets.iter().enumerate() {
        let _ = writeln!(
            sources,
            "[{idx}] {}\n{}\n",
            snippet.title.trim(),
            truncate_chars(snippet.excerpt.trim(), per_snippet)
        );
    }

    format!(
        "Extract up to {max_findings} distinct factual findings from the sources below.\n\
         Each finding must cite the zero-based numbers of the sources that support it.\n\n\
         Sources:\n{sources}\
         Respond with JSON only, shaped as:\n\
         {{\"findings\": [{{\"claim\": \"...\", \"sources\": [0, 2]}}]}}"
    )
}

pub fn report_prompt(topic: &Topic, findings: &[Finding], snippets: &[SourceSnippet]) -> String {
    let mut listed = String::new();
    for (idx, finding) in findings.iter().enumerate() {
        let cited = finding
            .source_indices
            .iter()
            .map(|source| {
                let title = snippets
                    .get(*source)
                    .map(|snippet| snippet.title.trim())
                    .unwrap_or("unknown source");
                format!("{source} ({title})")
            })
            .collect::<Vec<_>>()
            .join("; ");
        let _ = writeln!(listed, "{}. {} [sources: {cited}]", idx + 1, finding.claim.trim());
    }

    format!(
        "Write a structured research report on \"{topic}\" using only these findings:\n\
         {listed}\n\
         Organise the report into a few sections (for example an overview, key findings and implications).\n\
         Each section lists the source numbers it relies on in \"citations\"; only use numbers shown above.\n\
         Respond with JSON only, shaped as:\n\
         {{\"title\": \"...\", \"sections\": [{{\"heading\": \"...\", \"body\": \"...\", \"citations\": [0]}}]}}"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn analysis_prompt_numbers_sources_from_zero() {
        let snippets = vec![
            SourceSnippet::new("First", "https://a.example", "Alpha excerpt."),
            SourceSnippet::new("Second", "https://b.example", "Beta excerpt."),
        ];
        let prompt = analysis_prompt(&snippets, 4, 3000);
        assert!(prompt.contains("[0] First"));
        assert!(prompt.contains("[1] Second"));
        assert!(prompt.contains("up to 4"));
    }

    #[test]
    fn report_prompt_lists_findings_with_titles() {
        let topic = Topic::new("climate change").unwrap();
        let snippets = vec![SourceSnippet::new("Climate Overview", "https://c.example", "x")];
        let findings = vec![Finding::new("Temperatures are rising.", [0])];
        let prompt = report_prompt(&topic, &findings, &snippets);
        assert!(prompt.contains("1. Temperatures are rising. [sources: 0 (Climate Overview)]"));
    }
}
