use std::fmt::Write as _;

use crate::model::{Report, SourceSnippet};

/// Render a report as Markdown with 1-based citation markers and a source list.
pub fn render_markdown(report: &Report, snippets: &[SourceSnippet]) -> String {
    let mut output = format!("# {}\n", report.title.trim());

    for section in &report.sections {
        let _ = write!(output, "\n## {}\n\n{}\n", section.heading.trim(), section.body.trim());
        if !section.cited_source_indices.is_empty() {
            let markers = section
                .cited_source_indices
                .iter()
                .map(|idx| format!("[{}]", idx + 1))
                .collect::<Vec<_>>()
                .join(", ");
            let _ = write!(output, "\n_Sources: {markers}_\n");
        }
    }

    output.push_str(&format_sources(snippets));
    output
}

/// Numbered Markdown link list of every snippet in run order.
pub fn format_sources(snippets: &[SourceSnippet]) -> String {
    if snippets.is_empty() {
        return "\n## Sources\n\nNo sources available.\n".to_string();
    }

    let mut output = String::from("\n## Sources\n\n");
    for (idx, snippet) in snippets.iter().enumerate() {
        let title = if snippet.title.trim().is_empty() {
            "Untitled source"
        } else {
            snippet.title.trim()
        };
        let _ = writeln!(output, "{}. [{}]({})", idx + 1, title, snippet.url);
    }
    output
}
