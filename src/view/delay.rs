use chrono::NaiveDate;
use serde::Serialize;

use crate::model::task::{Task, TaskStatus};
use crate::parse::dates::{ProjectionInputError, task_span};

/// Which date a delay is counted from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DelayReference {
    /// Should have started but has not
    Start,
    /// Should have finished but has not
    End,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Delay {
    /// Whole days between the reference date and today, always positive
    pub days: i64,
    pub reference: DelayReference,
}

/// How late `task` is as of `today`.
///
/// A todo task is late once its start has passed; a todo or in-progress task
/// is late once its end has passed. The not-started case wins when both apply.
/// Done and undated tasks are never late.
pub fn delay_of(task: &Task, today: NaiveDate) -> Result<Option<Delay>, ProjectionInputError> {
    if task.status == TaskStatus::Done {
        return Ok(None);
    }
    let Some(span) = task_span(task)? else {
        return Ok(None);
    };

    let (date, reference) = if task.status == TaskStatus::Todo && span.start < today {
        (span.start, DelayReference::Start)
    } else if span.end < today {
        (span.end, DelayReference::End)
    } else {
        return Ok(None);
    };

    Ok(Some(Delay {
        days: (today - date).num_days(),
        reference,
    }))
}

pub fn is_delayed(task: &Task, today: NaiveDate) -> bool {
    matches!(delay_of(task, today), Ok(Some(_)))
}

/// Late tasks, most late first; ties keep collection order. Tasks with bad
/// dates are reported separately.
pub fn delayed_tasks<'a, I>(tasks: I, today: NaiveDate) -> (Vec<(&'a Task, Delay)>, Vec<ProjectionInputError>)
where
    I: IntoIterator<Item = &'a Task>,
{
    let mut late = Vec::new();
    let mut skipped = Vec::new();
    for task in tasks {
        match delay_of(task, today) {
            Ok(Some(delay)) => late.push((task, delay)),
            Ok(None) => {}
            Err(e) => skipped.push(e),
        }
    }
    late.sort_by(|a, b| b.1.days.cmp(&a.1.days));
    (late, skipped)
}
