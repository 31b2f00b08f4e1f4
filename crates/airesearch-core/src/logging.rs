use anyhow::{Context, Result};
use chrono::{Datelike, Utc};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::Serialize;
use std::collections::BTreeSet;
use std::fs::{self, File, OpenOptions, create_dir_all};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::warn;

const LOG_DIR_ENV: &str = "AIRESEARCH_LOG_DIR";
const RETENTION_ENV: &str = "AIRESEARCH_LOG_RETENTION_DAYS";
const DEFAULT_LOG_DIR: &str = "data/logs";
const DEFAULT_RETENTION_DAYS: u64 = 90;
const RUN_LOG_FILE: &str = "runs.jsonl";
const AUDIT_LOG_FILE: &str = "audit.jsonl";

static REDACTION_PATTERNS: Lazy<Vec<(&'static str, Regex)>> = Lazy::new(|| {
    vec![
        (
            "api_key",
            Regex::new(r"(?i)(api[_-]?key\s*[:=]\s*)([A-Za-z0-9\-_.+/]+)")
                .expect("invalid api_key regex"),
        ),
        (
            "bearer",
            Regex::new(r"(?i)(bearer\s+)([A-Za-z0-9\-_.+=/]+)").expect("invalid bearer regex"),
        ),
        (
            "sk_token",
            Regex::new(r"(sk-[A-Za-z0-9\-_]{16,})").expect("invalid sk_token regex"),
        ),
    ]
});

/// What gets recorded about a finished (or failed) run.
#[derive(Debug, Clone)]
pub struct RunLogInput {
    pub run_id: String,
    pub topic: String,
    pub status: RunStatus,
    pub report_title: Option<String>,
    pub section_count: usize,
    pub sources: Vec<String>,
    pub report_path: Option<String>,
    pub trace_path: Option<String>,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunStatus {
    Completed,
    Failed { error_kind: String, error: String },
}

#[derive(Serialize)]
struct RunLogRecord {
    timestamp: String,
    run_id: String,
    topic: String,
    #[serde(flatten)]
    status: RunStatus,
    report_title: Option<String>,
    section_count: usize,
    sources: Vec<String>,
    report_path: Option<String>,
    trace_path: Option<String>,
    duration_ms: u64,
    redactions: Vec<String>,
}

#[derive(Serialize)]
struct AuditLogRecord {
    timestamp: String,
    run_id: String,
    redactions: Vec<String>,
}

fn log_base_dir() -> PathBuf {
    std::env::var(LOG_DIR_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_LOG_DIR))
}

fn retention_days() -> u64 {
    std::env::var(RETENTION_ENV)
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .unwrap_or(DEFAULT_RETENTION_DAYS)
}

fn append_json_line<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        create_dir_all(parent)
            .with_context(|| format!("failed to create log directory {}", parent.display()))?;
    }

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("failed to open log file {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    let line = serde_json::to_string(value)?;
    writeln!(writer, "{}", line)
        .with_context(|| format!("failed to append log entry to {}", path.display()))?;
    writer.flush()?;
    Ok(())
}

/// Replace anything that looks like a credential with `[REDACTED]`.
///
/// Names of the patterns that fired are added to `redactions`.
pub fn sanitize_text(input: &str, redactions: &mut BTreeSet<String>) -> String {
    let mut output = input.to_string();
    for (name, regex) in REDACTION_PATTERNS.iter() {
        let mut matched = false;
        output = regex
            .replace_all(&output, |caps: &Captures| {
                matched = true;
                if caps.len() > 2 {
                    format!("{}[REDACTED]", &caps[1])
                } else {
                    "[REDACTED]".to_string()
                }
            })
            .to_string();
        if matched {
            redactions.insert(name.to_string());
        }
    }
    output
}

/// Append a run record to `<log dir>/YYYY/MM/runs.jsonl`, auditing any redactions.
pub fn log_run_completion(input: RunLogInput) -> Result<()> {
    let timestamp = Utc::now();
    let mut redactions = BTreeSet::new();

    let topic = sanitize_text(&input.topic, &mut redactions);
    let status = match input.status {
        RunStatus::Completed => RunStatus::Completed,
        RunStatus::Failed { error_kind, error } => RunStatus::Failed {
            error_kind,
            error: sanitize_text(&error, &mut redactions),
        },
    };
    let sources: Vec<String> = input
        .sources
        .iter()
        .map(|source| sanitize_text(source, &mut redactions))
        .collect();

    let record = RunLogRecord {
        timestamp: timestamp.to_rfc3339(),
        run_id: input.run_id.clone(),
        topic,
        status,
        report_title: input.report_title,
        section_count: input.section_count,
        sources,
        report_path: input.report_path,
        trace_path: input.trace_path,
        duration_ms: input.duration_ms,
        redactions: redactions.iter().cloned().collect(),
    };

    let base_dir = log_base_dir();
    let month_dir = base_dir
        .join(format!("{:04}", timestamp.year()))
        .join(format!("{:02}", timestamp.month()));
    append_json_line(&month_dir.join(RUN_LOG_FILE), &record)?;

    if !record.redactions.is_empty() {
        let audit = AuditLogRecord {
            timestamp: record.timestamp.clone(),
            run_id: input.run_id.clone(),
            redactions: record.redactions.clone(),
        };
        append_json_line(&month_dir.join(AUDIT_LOG_FILE), &audit)?;
        warn!(
            run_id = %input.run_id,
            fields = ?record.redactions,
            "redacted potential secrets from run log"
        );
    }

    enforce_retention(&base_dir)?;

    Ok(())
}

fn enforce_retention(base_dir: &Path) -> Result<()> {
    let retention = retention_days();
    if retention == 0 || !base_dir.exists() {
        return Ok(());
    }
    let cutoff = SystemTime::now()
        .checked_sub(Duration::from_secs(retention.saturating_mul(86_400)))
        .unwrap_or(SystemTime::UNIX_EPOCH);

    prune_directory(base_dir, cutoff)
}

fn prune_directory(dir: &Path, cutoff: SystemTime) -> Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let metadata = entry.metadata()?;
        if metadata.is_dir() {
            prune_directory(&path, cutoff)?;
            if path.read_dir()?.next().is_none() {
                fs::remove_dir(&path).ok();
            }
        } else if metadata.is_file()
            && metadata
                .modified()
                .map(|time| time < cutoff)
                .unwrap_or(false)
        {
            fs::remove_file(&path).ok();
        }
    }

    Ok(())
}

/// Remove every log line that belongs to `run_id`.
pub fn remove_run_logs(run_id: &str) -> Result<()> {
    let base_dir = log_base_dir();
    if !base_dir.exists() {
        return Ok(());
    }

    for year_entry in fs::read_dir(&base_dir)? {
        let year_entry = year_entry?;
        if !year_entry.file_type()?.is_dir() {
            continue;
        }
        for month_entry in fs::read_dir(year_entry.path())? {
            let month_entry = month_entry?;
            if !month_entry.file_type()?.is_dir() {
                continue;
            }
            for name in [RUN_LOG_FILE, AUDIT_LOG_FILE] {
                let path = month_entry.path().join(name);
                rewrite_jsonl_without(&path, run_id)?;
            }
        }
    }

    Ok(())
}

fn rewrite_jsonl_without(path: &Path, run_id: &str) -> Result<()> {
    if !path.exists() {
        return Ok(());
    }

    let file =
        File::open(path).with_context(|| format!("failed to open log file {}", path.display()))?;
    let mut retained = Vec::new();
    let mut removed = false;
    for line in BufReader::new(file).lines() {
        let line = line?;
        if let Ok(value) = serde_json::from_str::<serde_json::Value>(&line) {
            if value.get("run_id").and_then(|v| v.as_str()) == Some(run_id) {
                removed = true;
                continue;
            }
        }
        retained.push(line);
    }

    if !removed {
        return Ok(());
    }
    if retained.is_empty() {
        fs::remove_file(path).ok();
        return Ok(());
    }

    let file = File::create(path)
        .with_context(|| format!("failed to rewrite log file {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    for line in retained {
        writeln!(writer, "{}", line)?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;
    use tempfile::TempDir;

    #[test]
    fn sanitize_masks_known_secret_shapes() {
        let mut redactions = BTreeSet::new();
        let cleaned = sanitize_text(
            "api_key=abcd1234 then Bearer XYZ.123 and sk-abcdefghijklmnop1234",
            &mut redactions,
        );
        assert!(!cleaned.contains("abcd1234"));
        assert!(!cleaned.contains("XYZ.123"));
        assert!(!cleaned.contains("sk-abcdefghijklmnop1234"));
        assert!(cleaned.starts_with("api_key=[REDACTED]"));
        assert_eq!(redactions.len(), 3);
    }

    #[test]
    fn run_logging_sanitizes_persists_and_removes() -> Result<()> {
        let temp = TempDir::new().expect("temp dir");
        unsafe {
            std::env::set_var(LOG_DIR_ENV, temp.path());
            std::env::set_var(RETENTION_ENV, "0");
        }

        let input = RunLogInput {
            run_id: "run-123".to_string(),
            topic: "quantum computing".to_string(),
            status: RunStatus::Failed {
                error_kind: "analysis_failed".to_string(),
                error: "upstream said: invalid api_key=sk-abcdef1234567890xyz".to_string(),
            },
            report_title: None,
            section_count: 0,
            sources: vec!["https://example.com/quantum-intro".to_string()],
            report_path: None,
            trace_path: None,
            duration_ms: 42,
        };

        log_run_completion(input)?;

        let year_dir = temp.path().read_dir()?.next().unwrap()?.path();
        let month_dir = year_dir.read_dir()?.next().unwrap()?.path();
        let run_log = month_dir.join(RUN_LOG_FILE);
        let line = std::fs::read_to_string(&run_log)?;
        let record: Value = serde_json::from_str(line.trim())?;
        assert_eq!(record["run_id"], "run-123");
        assert_eq!(record["status"], "failed");
        assert_eq!(record["error_kind"], "analysis_failed");
        assert!(record["error"].as_str().unwrap().contains("[REDACTED]"));
        assert!(month_dir.join(AUDIT_LOG_FILE).exists());

        remove_run_logs("run-123")?;
        assert!(!run_log.exists());

        unsafe {
            std::env::remove_var(LOG_DIR_ENV);
            std::env::remove_var(RETENTION_ENV);
        }
        Ok(())
    }
}
