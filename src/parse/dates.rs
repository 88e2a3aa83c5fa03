use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::Serialize;

use crate::model::task::Task;

/// A task excluded from a date-dependent view
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum ProjectionInputError {
    #[error("task {task}: {field} '{value}' is not a date")]
    Unparseable {
        task: String,
        field: &'static str,
        value: String,
    },
    #[error("task {task}: ends ({end}) before it starts ({start})")]
    Inverted {
        task: String,
        start: NaiveDate,
        end: NaiveDate,
    },
}

/// Inclusive calendar span
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateSpan {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateSpan {
    /// Number of calendar days covered, counting both ends
    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }

    pub fn contains(&self, day: NaiveDate) -> bool {
        self.start <= day && day <= self.end
    }

    pub fn overlaps(&self, other: &DateSpan) -> bool {
        self.start <= other.end && other.start <= self.end
    }
}

/// Parse `YYYY-MM-DD`, or the date part of an ISO date-time.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(d);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.date_naive());
    }
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|dt| dt.date())
}

fn parse_field(
    task: &Task,
    field: &'static str,
    value: Option<&str>,
) -> Result<Option<NaiveDate>, ProjectionInputError> {
    match value {
        None => Ok(None),
        Some(v) if v.trim().is_empty() => Ok(None),
        Some(v) => parse_date(v)
            .map(Some)
            .ok_or_else(|| ProjectionInputError::Unparseable {
                task: task_label(task),
                field,
                value: v.to_string(),
            }),
    }
}

/// The span a task covers.
///
/// `Ok(None)` means the task is undated. With one bound present the task is a
/// single day on that bound.
pub fn task_span(task: &Task) -> Result<Option<DateSpan>, ProjectionInputError> {
    let start = parse_field(task, "startDate", task.start_date.as_deref())?;
    let end = parse_field(task, "endDate", task.end_date.as_deref())?;
    let (start, end) = match (start, end) {
        (Some(s), Some(e)) => (s, e),
        (Some(d), None) | (None, Some(d)) => (d, d),
        (None, None) => return Ok(None),
    };
    if end < start {
        return Err(ProjectionInputError::Inverted {
            task: task_label(task),
            start,
            end,
        });
    }
    Ok(Some(DateSpan { start, end }))
}

/// Identifier used in diagnostics: the id when there is one, else the title
pub fn task_label(task: &Task) -> String {
    match &task.id {
        Some(id) => id.to_string(),
        None => format!("\"{}\"", task.title),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::task::{ProjectId, TaskId};

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn dated(start: Option<&str>, end: Option<&str>) -> Task {
        let mut t = Task::new(Some(TaskId::server("9")), "Dated", ProjectId(1));
        t.start_date = start.map(String::from);
        t.end_date = end.map(String::from);
        t
    }

    #[test]
    fn parses_plain_and_datetime_forms() {
        assert_eq!(parse_date("2025-03-03"), Some(d(2025, 3, 3)));
        assert_eq!(parse_date("2025-03-03T10:15:00"), Some(d(2025, 3, 3)));
        assert_eq!(parse_date("2025-03-03T10:15:00Z"), Some(d(2025, 3, 3)));
        assert_eq!(parse_date("03/03/2025"), None);
    }

    #[test]
    fn single_bound_is_a_one_day_span() {
        let span = task_span(&dated(None, Some("2025-03-05"))).unwrap().unwrap();
        assert_eq!(span.start, d(2025, 3, 5));
        assert_eq!(span.days(), 1);
    }

    #[test]
    fn undated_task_has_no_span() {
        assert_eq!(task_span(&dated(None, Some("  "))).unwrap(), None);
    }

    #[test]
    fn garbage_date_is_reported_with_field() {
        let err = task_span(&dated(Some("soon"), Some("2025-03-05"))).unwrap_err();
        assert_eq!(
            err,
            ProjectionInputError::Unparseable {
                task: "9".into(),
                field: "startDate",
                value: "soon".into(),
            }
        );
    }

    #[test]
    fn inverted_span_is_rejected() {
        let err = task_span(&dated(Some("2025-03-05"), Some("2025-03-01"))).unwrap_err();
        assert!(matches!(err, ProjectionInputError::Inverted { .. }));
    }
}
