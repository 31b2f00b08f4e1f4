use std::fs::{OpenOptions, create_dir_all};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Local;
use tracing::info;

/// File-name friendly form of a topic: words joined by `_`, unsafe characters removed.
pub fn topic_slug(topic: &str) -> String {
    let slug = topic
        .split_whitespace()
        .map(|word| {
            word.chars()
                .filter(|c| c.is_alphanumeric() || *c == '-' || *c == '_')
                .collect::<String>()
        })
        .filter(|word| !word.is_empty())
        .collect::<Vec<_>>()
        .join("_");

    if slug.is_empty() {
        "report".to_string()
    } else {
        slug
    }
}

/// Write a rendered report to `<dir>/<topic_slug>_<YYYYmmdd_HHMMSS>.md`.
///
/// An existing file with the same name is never overwritten; a numeric suffix
/// is added instead.
pub fn save_report(dir: &Path, topic: &str, content: &str) -> Result<PathBuf> {
    create_dir_all(dir)
        .with_context(|| format!("failed to create reports directory {}", dir.display()))?;

    let stem = format!("{}_{}", topic_slug(topic), Local::now().format("%Y%m%d_%H%M%S"));
    let mut attempt = 0u32;
    loop {
        let file_name = if attempt == 0 {
            format!("{stem}.md")
        } else {
            format!("{stem}_{attempt}.md")
        };
        let path = dir.join(file_name);

        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(mut file) => {
                file.write_all(content.as_bytes())
                    .with_context(|| format!("failed to write report {}", path.display()))?;
                info!(path = %path.display(), "report saved");
                return Ok(path);
            }
            Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => {
                attempt += 1;
            }
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("failed to create report {}", path.display()));
            }
        }
    }
}
