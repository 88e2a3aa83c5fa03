use serde::Serialize;

use crate::io::failure_log::FailureEntry;
use crate::model::project::Project;
use crate::model::task::{Task, TaskStatus};
use crate::ops::gateway::MutationOutcome;
use crate::parse::dates::{ProjectionInputError, parse_date};
use crate::util::unicode::{display_width, fit_to_width, truncate_to_width};
use crate::view::board::{BoardView, ProjectBucket};
use crate::view::calendar::CalendarMonth;
use crate::view::delay::{Delay, DelayReference};
use crate::view::gantt::GanttChart;

// ---------------------------------------------------------------------------
// JSON output structs
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub struct DelayedJson<'a> {
    #[serde(flatten)]
    pub task: &'a Task,
    pub delay: Delay,
}

#[derive(Serialize)]
pub struct MutationJson {
    pub action: &'static str,
    pub outcome: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task: Option<Task>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Serialize)]
pub struct FailureJson<'a> {
    pub timestamp: String,
    pub action: &'a str,
    pub task: &'a str,
    pub error: &'a str,
}

// ---------------------------------------------------------------------------
// Conversions
// ---------------------------------------------------------------------------

pub fn outcome_name(outcome: &MutationOutcome) -> &'static str {
    match outcome {
        MutationOutcome::Reconciled(_) => "reconciled",
        MutationOutcome::FailureIgnored(_) => "failure-ignored",
        MutationOutcome::RolledBack(_) => "rolled-back",
    }
}

pub fn failure_to_json(entry: &FailureEntry) -> FailureJson<'_> {
    FailureJson {
        timestamp: entry
            .timestamp
            .to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
        action: &entry.action,
        task: &entry.task,
        error: &entry.error,
    }
}

// ---------------------------------------------------------------------------
// Human-readable formatting
// ---------------------------------------------------------------------------

fn status_char(status: TaskStatus) -> char {
    match status {
        TaskStatus::Todo => ' ',
        TaskStatus::InProgress => '>',
        TaskStatus::Done => 'x',
    }
}

fn id_text(task: &Task) -> String {
    task.id.as_ref().map(|id| id.to_string()).unwrap_or_default()
}

/// `[>] 12 Title !high #crm @3`
pub fn format_task_line(task: &Task) -> String {
    let mut line = format!("[{}] {} {}", status_char(task.status), id_text(task), task.title);
    if let Some(p) = task.priority {
        line.push_str(&format!(" !{}", p));
    }
    for tag in &task.tags {
        line.push_str(&format!(" #{}", tag));
    }
    if let Some(who) = &task.assigned_to {
        line.push_str(&format!(" @{}", who));
    }
    line
}

pub fn format_project_line(project: &Project) -> String {
    let mut line = format!("{:>4}  {}", project.id, project.name);
    if let (Some(start), Some(end)) = (&project.start_date, &project.end_date) {
        line.push_str(&format!("  ({} .. {})", start, end));
    }
    line
}

fn bucket_label(bucket: ProjectBucket, projects: &[Project]) -> String {
    match bucket {
        ProjectBucket::Project(id) => projects
            .iter()
            .find(|p| p.id == id)
            .map(|p| p.name.clone())
            .unwrap_or_else(|| format!("project {}", id)),
        ProjectBucket::Unassigned => "unassigned".to_string(),
    }
}

/// Lanes side by side, `width` cells each
pub fn format_board(view: &BoardView<'_>, projects: &[Project], width: usize) -> Vec<String> {
    let columns: Vec<Vec<String>> = view
        .lanes
        .iter()
        .map(|lane| {
            let mut cells = vec![format!("{} ({})", lane.status, lane.count)];
            for group in &lane.groups {
                cells.push(format!("# {}", bucket_label(group.project, projects)));
                for task in &group.tasks {
                    cells.push(format!("{} {}", id_text(task), task.title));
                }
            }
            cells
        })
        .collect();

    let rows = columns.iter().map(Vec::len).max().unwrap_or(0);
    (0..rows)
        .map(|row| {
            let line: Vec<String> = columns
                .iter()
                .map(|col| fit_to_width(col.get(row).map(String::as_str).unwrap_or(""), width))
                .collect();
            line.join("  ").trim_end().to_string()
        })
        .collect()
}

fn due_text(task: &Task) -> String {
    match task.due_date() {
        Some(raw) => parse_date(raw)
            .map(|d| d.to_string())
            .unwrap_or_else(|| raw.to_string()),
        None => "-".to_string(),
    }
}

/// One row per task: id, status, priority, due date, title
pub fn format_list(rows: &[&Task]) -> Vec<String> {
    let id_width = rows
        .iter()
        .map(|t| display_width(&id_text(t)))
        .max()
        .unwrap_or(0)
        .max(2);
    let mut lines = vec![format!(
        "{:<id_width$}  {:<11}  {:<8}  {:<10}  TITLE",
        "ID", "STATUS", "PRIORITY", "DUE"
    )];
    for task in rows {
        let priority = task.priority.map(|p| p.as_str()).unwrap_or("-");
        lines.push(format!(
            "{:<id_width$}  {:<11}  {:<8}  {:<10}  {}",
            id_text(task),
            task.status.as_str(),
            priority,
            due_text(task),
            task.title
        ));
    }
    lines
}

pub fn format_calendar(view: &CalendarMonth<'_>) -> Vec<String> {
    let mut lines = vec![format!("== {} ==", view.month.first_day().format("%B %Y"))];
    let mut any = false;
    for cell in view.days.iter().filter(|c| !c.tasks.is_empty()) {
        any = true;
        lines.push(cell.date.format("%a %d").to_string());
        for task in &cell.tasks {
            lines.push(format!("  {}", format_task_line(task)));
        }
    }
    if !any {
        lines.push("(no dated tasks this month)".to_string());
    }
    lines
}

/// Label column, then the bar scaled to `width` cells, then any delay
pub fn format_gantt(chart: &GanttChart<'_>, width: usize) -> Vec<String> {
    let mut lines = vec![format!(
        "{} .. {} ({} days)",
        chart.range.start,
        chart.range.end,
        chart.range.length_days()
    )];
    for bar in &chart.bars {
        let label = fit_to_width(&format!("{} {}", id_text(bar.task), bar.task.title), 20);
        let start = ((bar.offset * width as f64).round() as usize).min(width.saturating_sub(1));
        let len = ((bar.width * width as f64).round() as usize)
            .max(1)
            .min(width - start);
        let mut cells = " ".repeat(start);
        cells.push_str(&"\u{2588}".repeat(len));
        cells.push_str(&" ".repeat(width - start - len));
        let mut line = format!("{} |{}|", label, cells);
        if let Some(delay) = bar.delay {
            line.push_str(&format!(" +{}d", delay.days));
        }
        lines.push(line);
    }
    if chart.bars.is_empty() {
        lines.push("(no tasks in range)".to_string());
    }
    lines
}

pub fn format_delayed(rows: &[(&Task, Delay)]) -> Vec<String> {
    if rows.is_empty() {
        return vec!["(nothing is late)".to_string()];
    }
    rows.iter()
        .map(|(task, delay)| {
            let (what, date) = match delay.reference {
                DelayReference::Start => ("start", task.start_date.as_deref()),
                DelayReference::End => ("due", task.end_date.as_deref()),
            };
            format!(
                "{:>4}d late  {}  ({} {})",
                delay.days,
                truncate_to_width(&format_task_line(task), 60),
                what,
                date.and_then(parse_date)
                    .map(|d| d.to_string())
                    .unwrap_or_default()
            )
        })
        .collect()
}

/// Notes for tasks a view had to leave out
pub fn format_skipped(skipped: &[ProjectionInputError]) -> Vec<String> {
    skipped.iter().map(|e| format!("skipped: {}", e)).collect()
}

pub fn format_failure_entry(entry: &FailureEntry) -> String {
    format!(
        "{}  {} {}: {}",
        entry.timestamp.to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
        entry.action,
        entry.task,
        entry.error
    )
}
