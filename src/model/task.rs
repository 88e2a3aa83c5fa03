use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Canonical task status. Localized wire values are folded into these three
/// at ingestion (see `parse::wire`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskStatus {
    #[default]
    Todo,
    InProgress,
    Done,
}

impl TaskStatus {
    /// Board lane order
    pub const ALL: [TaskStatus; 3] = [TaskStatus::Todo, TaskStatus::InProgress, TaskStatus::Done];

    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Todo => "todo",
            TaskStatus::InProgress => "in-progress",
            TaskStatus::Done => "done",
        }
    }

    /// Fixed list-sort rank: todo=1, in-progress=2, done=3
    pub fn rank(self) -> u8 {
        match self {
            TaskStatus::Todo => 1,
            TaskStatus::InProgress => 2,
            TaskStatus::Done => 3,
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = String;

    /// Canonical tags only. Anything looser belongs to the ingestion boundary.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "todo" => Ok(TaskStatus::Todo),
            "in-progress" => Ok(TaskStatus::InProgress),
            "done" => Ok(TaskStatus::Done),
            other => Err(format!(
                "unknown status '{}' (expected todo, in-progress or done)",
                other
            )),
        }
    }
}

/// Task priority. An absent priority is modelled as `Option::None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl Priority {
    pub fn as_str(self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
        }
    }
}

/// Fixed list-sort rank: high=3, medium=2, low=1, undefined=0
pub fn priority_rank(priority: Option<Priority>) -> u8 {
    match priority {
        Some(Priority::High) => 3,
        Some(Priority::Medium) => 2,
        Some(Priority::Low) => 1,
        None => 0,
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Priority::Low),
            "medium" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            other => Err(format!(
                "unknown priority '{}' (expected low, medium or high)",
                other
            )),
        }
    }
}

/// Numeric project identifier assigned by the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProjectId(pub u64);

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Task identifier.
///
/// A server-assigned id and a client placeholder live in different variants,
/// so a placeholder can never compare equal to a confirmed id. Serialized, a
/// server id is its plain text and a placeholder is `{"placeholder": n}`, so
/// a server id that happens to read `tmp-1` survives a round trip.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "TaskIdRepr", from = "TaskIdRepr")]
pub enum TaskId {
    /// Assigned by the remote system; stable once seen
    Server(String),
    /// Minted locally while a create is in flight, displayed as `tmp-<n>`
    Placeholder(u64),
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum TaskIdRepr {
    Server(String),
    Placeholder { placeholder: u64 },
}

impl From<TaskId> for TaskIdRepr {
    fn from(id: TaskId) -> Self {
        match id {
            TaskId::Server(s) => TaskIdRepr::Server(s),
            TaskId::Placeholder(n) => TaskIdRepr::Placeholder { placeholder: n },
        }
    }
}

impl From<TaskIdRepr> for TaskId {
    fn from(repr: TaskIdRepr) -> Self {
        match repr {
            TaskIdRepr::Server(s) => TaskId::Server(s),
            TaskIdRepr::Placeholder { placeholder } => TaskId::Placeholder(placeholder),
        }
    }
}

impl TaskId {
    pub fn server(id: impl Into<String>) -> Self {
        TaskId::Server(id.into())
    }

    pub fn is_placeholder(&self) -> bool {
        matches!(self, TaskId::Placeholder(_))
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskId::Server(id) => f.write_str(id),
            TaskId::Placeholder(n) => write!(f, "tmp-{}", n),
        }
    }
}

/// A task in canonical form.
///
/// Dates are kept as the ISO text received; projectors parse them and skip
/// records whose dates don't parse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// `None` only for records that have not been through the store
    pub id: Option<TaskId>,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub status: TaskStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,
    pub project_id: Option<ProjectId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_to: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Hours
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_time: Option<f64>,
}

impl Task {
    /// A fresh `todo` task with no dates, tags or priority
    pub fn new(id: Option<TaskId>, title: impl Into<String>, project_id: ProjectId) -> Self {
        Task {
            id,
            title: title.into(),
            description: None,
            status: TaskStatus::Todo,
            priority: None,
            start_date: None,
            end_date: None,
            project_id: Some(project_id),
            assigned_to: None,
            tags: Vec::new(),
            estimated_time: None,
        }
    }

    /// Single-date views read the end of the span
    pub fn due_date(&self) -> Option<&str> {
        self.end_date.as_deref()
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        let tag = tag.trim_start_matches('#');
        self.tags.iter().any(|t| t == tag)
    }
}

/// A partial update. `None` leaves the field alone; for optional fields,
/// `Some(None)` clears it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<TaskStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Option<Priority>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_to: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_time: Option<Option<f64>>,
}

impl TaskPatch {
    pub fn status(status: TaskStatus) -> Self {
        TaskPatch {
            status: Some(status),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == TaskPatch::default()
    }

    /// Shallow field-by-field overwrite
    pub fn apply_to(&self, task: &mut Task) {
        if let Some(title) = &self.title {
            task.title = title.clone();
        }
        if let Some(description) = &self.description {
            task.description = description.clone();
        }
        if let Some(status) = self.status {
            task.status = status;
        }
        if let Some(priority) = self.priority {
            task.priority = priority;
        }
        if let Some(start) = &self.start_date {
            task.start_date = start.clone();
        }
        if let Some(end) = &self.end_date {
            task.end_date = end.clone();
        }
        if let Some(assignee) = &self.assigned_to {
            task.assigned_to = assignee.clone();
        }
        if let Some(tags) = &self.tags {
            task.tags = tags.clone();
        }
        if let Some(estimate) = self.estimated_time {
            task.estimated_time = estimate;
        }
    }
}
