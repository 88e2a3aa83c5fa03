use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use crate::model::task::Task;
use crate::ops::gateway::{FailureRecord, MutationIntent};

/// Header written at the top of a new failure log.
const FILE_HEADER: &str = "\
<!-- taskboard failure log, append-only
     Remote writes that failed are recorded here with the local copy of the
     task, so nothing typed into the board is lost.
     View with: tb failures
     Safe to delete. -->

---
";

/// One failed remote write
#[derive(Debug, Clone, PartialEq)]
pub struct FailureEntry {
    pub timestamp: DateTime<Utc>,
    /// `create`, `update` or `delete`
    pub action: String,
    pub task: String,
    pub error: String,
    /// JSON of the local record at the time, if it still existed
    pub body: String,
}

impl FailureEntry {
    pub fn new(record: &FailureRecord, local: Option<&Task>) -> Self {
        let action = match record.intent {
            MutationIntent::Create(_) => "create",
            MutationIntent::Update(_) => "update",
            MutationIntent::Delete(_) => "delete",
        };
        FailureEntry {
            timestamp: Utc::now(),
            action: action.to_string(),
            task: record.intent.target().to_string(),
            error: record.error.to_string(),
            body: local
                .and_then(|t| serde_json::to_string_pretty(t).ok())
                .unwrap_or_default(),
        }
    }

    fn to_markdown(&self) -> String {
        let mut out = format!(
            "## {} {} {}\n\nError: {}\n",
            self.timestamp.to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
            self.action,
            self.task,
            self.error,
        );
        if !self.body.is_empty() {
            out.push_str("\n```json\n");
            out.push_str(&self.body);
            if !self.body.ends_with('\n') {
                out.push('\n');
            }
            out.push_str("```\n");
        }
        out.push_str("\n---\n");
        out
    }
}

pub fn failure_log_path(root: &Path) -> PathBuf {
    root.join(".tb-failures.log")
}

/// Append entries to the log. Errors are logged, never returned.
pub fn log_failures(root: &Path, entries: &[FailureEntry]) {
    if entries.is_empty() {
        return;
    }
    if let Err(e) = append(root, entries) {
        tracing::warn!(error = %e, "could not write to failure log");
    }
}

fn append(root: &Path, entries: &[FailureEntry]) -> io::Result<()> {
    let path = failure_log_path(root);
    let needs_header = std::fs::metadata(&path).map_or(true, |m| m.len() == 0);
    let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
    if needs_header {
        file.write_all(FILE_HEADER.as_bytes())?;
    }
    for entry in entries {
        file.write_all(entry.to_markdown().as_bytes())?;
    }
    Ok(())
}

/// Entries in the log, most recent first, at most `limit`.
pub fn read_failures(root: &Path, limit: Option<usize>) -> Vec<FailureEntry> {
    let Ok(content) = std::fs::read_to_string(failure_log_path(root)) else {
        return Vec::new();
    };
    let mut entries = parse_entries(&content);
    entries.reverse();
    if let Some(n) = limit {
        entries.truncate(n);
    }
    entries
}

/// Remove the log. Returns how many entries it held.
pub fn clear_failures(root: &Path) -> io::Result<usize> {
    let path = failure_log_path(root);
    let Ok(content) = std::fs::read_to_string(&path) else {
        return Ok(0);
    };
    let count = parse_entries(&content).len();
    std::fs::remove_file(&path)?;
    Ok(count)
}

fn parse_entries(content: &str) -> Vec<FailureEntry> {
    let mut entries = Vec::new();
    let mut lines = content.lines();

    while let Some(line) = lines.next() {
        let Some(header) = line.strip_prefix("## ") else {
            continue;
        };
        let mut parts = header.splitn(3, ' ');
        let (Some(ts), Some(action), Some(task)) = (parts.next(), parts.next(), parts.next()) else {
            continue;
        };
        let Ok(timestamp) = DateTime::parse_from_rfc3339(ts) else {
            continue;
        };

        let mut error = String::new();
        let mut body = String::new();
        let mut in_code_block = false;
        for line in lines.by_ref() {
            if in_code_block {
                if line == "```" {
                    in_code_block = false;
                } else {
                    body.push_str(line);
                    body.push('\n');
                }
                continue;
            }
            if line == "---" {
                break;
            }
            if line.starts_with("```") {
                in_code_block = true;
            } else if let Some(e) = line.strip_prefix("Error: ") {
                error = e.to_string();
            }
        }

        entries.push(FailureEntry {
            timestamp: timestamp.with_timezone(&Utc),
            action: action.to_string(),
            task: task.to_string(),
            error,
            body,
        });
    }
    entries
}
