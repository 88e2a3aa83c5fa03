use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::model::task::{Task, priority_rank};
use crate::parse::dates::parse_date;

/// Column the list view is ordered by
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SortKey {
    #[default]
    DueDate,
    Priority,
    Status,
    Title,
}

impl SortKey {
    pub fn as_str(self) -> &'static str {
        match self {
            SortKey::DueDate => "due-date",
            SortKey::Priority => "priority",
            SortKey::Status => "status",
            SortKey::Title => "title",
        }
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "due-date" | "due" | "duedate" => Ok(SortKey::DueDate),
            "priority" => Ok(SortKey::Priority),
            "status" => Ok(SortKey::Status),
            "title" => Ok(SortKey::Title),
            other => Err(format!(
                "unknown sort key '{}' (expected due-date, priority, status or title)",
                other
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortSpec {
    pub key: SortKey,
    #[serde(default)]
    pub direction: SortDirection,
}

impl SortSpec {
    pub fn new(key: SortKey, descending: bool) -> Self {
        let direction = if descending {
            SortDirection::Descending
        } else {
            SortDirection::Ascending
        };
        SortSpec { key, direction }
    }

    pub fn descending(&self) -> bool {
        self.direction == SortDirection::Descending
    }
}

/// Ascending comparison for one key. Undated (or unparseable) tasks come after
/// every dated one.
fn compare(key: SortKey, a: &Task, b: &Task) -> Ordering {
    match key {
        SortKey::DueDate => {
            let da = a.due_date().and_then(parse_date);
            let db = b.due_date().and_then(parse_date);
            match (da, db) {
                (Some(x), Some(y)) => x.cmp(&y),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            }
        }
        SortKey::Priority => priority_rank(a.priority).cmp(&priority_rank(b.priority)),
        SortKey::Status => a.status.rank().cmp(&b.status.rank()),
        SortKey::Title => a.title.to_lowercase().cmp(&b.title.to_lowercase()),
    }
}

/// Order tasks for the list view.
///
/// The sort is stable in both directions: equal keys keep collection order
/// even when descending.
pub fn project_list<'a, I>(tasks: I, spec: SortSpec) -> Vec<&'a Task>
where
    I: IntoIterator<Item = &'a Task>,
{
    let mut rows: Vec<&'a Task> = tasks.into_iter().collect();
    rows.sort_by(|a, b| {
        let ord = compare(spec.key, a, b);
        if spec.descending() { ord.reverse() } else { ord }
    });
    rows
}
