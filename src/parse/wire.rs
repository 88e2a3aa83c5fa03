//! Ingestion boundary between backend records and canonical tasks.
//!
//! The backend is loose about shapes: statuses arrive localized, the owning
//! project shows up as an object, a bare id or a separate `projectId`, and
//! dates come as a start/end pair or a single `dueDate`. Everything past this
//! module sees only the canonical `Task`.

use serde::{Deserialize, Serialize};

use crate::model::task::{Priority, ProjectId, Task, TaskId, TaskStatus};
use crate::ops::store::InvalidTaskError;

/// An id as the backend sends it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WireId {
    Number(u64),
    Text(String),
}

impl WireId {
    fn as_text(&self) -> String {
        match self {
            WireId::Number(n) => n.to_string(),
            WireId::Text(s) => s.trim().to_string(),
        }
    }

    fn as_project_id(&self) -> Option<ProjectId> {
        match self {
            WireId::Number(n) => Some(ProjectId(*n)),
            WireId::Text(s) => s.trim().parse().ok().map(ProjectId),
        }
    }
}

/// `project: {"id": 7}` or `project: 7`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WireProjectRef {
    Object {
        #[serde(default)]
        id: Option<WireId>,
    },
    Id(WireId),
}

/// `assignedTo: {"id": 3, ...}` or `assignedTo: 3`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WireUserRef {
    Object {
        #[serde(default)]
        id: Option<WireId>,
    },
    Id(WireId),
}

/// A task record as stored and sent by the backend
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireTask {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<WireId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<WireProjectRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<WireId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_to: Option<WireUserRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_time: Option<f64>,
}

impl WireTask {
    /// The id as canonical text, for matching records against a `TaskId`
    pub fn id_text(&self) -> Option<String> {
        self.id.as_ref().map(WireId::as_text)
    }
}

impl From<&Task> for WireTask {
    /// Canonical outbound shape: bare `projectId`, canonical tags
    fn from(task: &Task) -> Self {
        let id = task.id.as_ref().map(|id| match id {
            TaskId::Server(s) => match s.parse::<u64>() {
                Ok(n) => WireId::Number(n),
                Err(_) => WireId::Text(s.clone()),
            },
            TaskId::Placeholder(_) => WireId::Text(id.to_string()),
        });
        WireTask {
            id,
            title: Some(task.title.clone()),
            description: task.description.clone(),
            status: Some(task.status.as_str().to_string()),
            priority: task.priority.map(|p| p.as_str().to_string()),
            start_date: task.start_date.clone(),
            end_date: task.end_date.clone(),
            due_date: None,
            project: None,
            project_id: task.project_id.map(|p| WireId::Number(p.0)),
            assigned_to: task
                .assigned_to
                .as_ref()
                .map(|u| WireUserRef::Id(WireId::Text(u.clone()))),
            tags: if task.tags.is_empty() {
                None
            } else {
                Some(task.tags.clone())
            },
            estimated_time: task.estimated_time,
        }
    }
}

/// Lowercase, strip French accents, and treat `-`/`_`/runs of spaces as a
/// single space.
fn fold_label(raw: &str) -> String {
    let folded: String = raw
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| match c {
            'à' | 'â' | 'ä' => 'a',
            'é' | 'è' | 'ê' | 'ë' => 'e',
            'î' | 'ï' => 'i',
            'ô' | 'ö' => 'o',
            'ù' | 'û' | 'ü' => 'u',
            'ç' => 'c',
            '-' | '_' => ' ',
            other => other,
        })
        .collect();
    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Fold a status string into a canonical tag.
///
/// The whole label must match a known spelling once case, accents and
/// separators are folded, so `"À faire"`, `"EN_COURS"` and `"Terminée"` land
/// while `"Pas terminé"` or `"Not started"` do not.
pub fn normalize_status(raw: &str) -> Option<TaskStatus> {
    match fold_label(raw).as_str() {
        "todo" | "to do" | "a faire" | "non commence" | "open" | "backlog" => Some(TaskStatus::Todo),
        "in progress" | "en cours" | "encours" | "doing" => Some(TaskStatus::InProgress),
        "done" | "termine" | "terminee" | "acheve" | "achevee" | "completed" | "closed" => {
            Some(TaskStatus::Done)
        }
        _ => None,
    }
}

/// Fold a priority string into a canonical level, accepting the backend's
/// French labels. Unknown or empty values are "no priority".
pub fn normalize_priority(raw: &str) -> Option<Priority> {
    match raw.trim().to_lowercase().as_str() {
        "high" | "haute" | "élevée" | "elevee" | "élevé" | "urgent" => Some(Priority::High),
        "medium" | "moyenne" | "moyen" | "normal" => Some(Priority::Medium),
        "low" | "faible" | "basse" | "bas" => Some(Priority::Low),
        _ => None,
    }
}

/// Resolve the owning project, in this order: `project.id` object, bare
/// `project` id, separate `projectId` field, then the caller's context.
pub fn resolve_project_ref(
    project: Option<&WireProjectRef>,
    project_id: Option<&WireId>,
    context: Option<ProjectId>,
) -> Option<ProjectId> {
    let from_object = match project {
        Some(WireProjectRef::Object { id: Some(id) }) => id.as_project_id(),
        _ => None,
    };
    let from_bare = match project {
        Some(WireProjectRef::Id(id)) => id.as_project_id(),
        _ => None,
    };
    from_object
        .or(from_bare)
        .or_else(|| project_id.and_then(WireId::as_project_id))
        .or(context)
}

fn non_blank(s: Option<String>) -> Option<String> {
    s.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// Turn one backend record into a canonical task.
///
/// `context` is the project the record was fetched for, used when the record
/// carries no project reference of its own.
pub fn ingest(wire: WireTask, context: Option<ProjectId>) -> Result<Task, InvalidTaskError> {
    let title = non_blank(wire.title).ok_or(InvalidTaskError::BlankTitle)?;
    let id = wire.id.as_ref().map(|id| TaskId::Server(id.as_text()));

    let status = match wire.status.as_deref() {
        None => TaskStatus::Todo,
        Some(raw) => normalize_status(raw).unwrap_or_else(|| {
            tracing::warn!(status = raw, title = %title, "unrecognized status, treating as todo");
            TaskStatus::Todo
        }),
    };
    let priority = wire.priority.as_deref().and_then(normalize_priority);

    let due = non_blank(wire.due_date);
    let start_date = non_blank(wire.start_date).or_else(|| due.clone());
    let end_date = non_blank(wire.end_date).or(due);

    let project_id = resolve_project_ref(wire.project.as_ref(), wire.project_id.as_ref(), context);

    let assigned_to = match wire.assigned_to {
        Some(WireUserRef::Object { id: Some(id) }) | Some(WireUserRef::Id(id)) => {
            Some(id.as_text())
        }
        _ => None,
    };

    if let Some(hours) = wire.estimated_time
        && hours < 0.0
    {
        return Err(InvalidTaskError::NegativeEstimate(hours));
    }

    Ok(Task {
        id,
        title,
        description: non_blank(wire.description),
        status,
        priority,
        start_date,
        end_date,
        project_id,
        assigned_to,
        tags: wire.tags.unwrap_or_default(),
        estimated_time: wire.estimated_time,
    })
}

/// Ingest a batch, skipping (and logging) records that cannot be ingested.
pub fn ingest_all(
    records: Vec<WireTask>,
    context: Option<ProjectId>,
) -> (Vec<Task>, Vec<(usize, InvalidTaskError)>) {
    let mut tasks = Vec::with_capacity(records.len());
    let mut rejected = Vec::new();
    for (index, wire) in records.into_iter().enumerate() {
        match ingest(wire, context) {
            Ok(task) => tasks.push(task),
            Err(e) => {
                tracing::warn!(index, error = %e, "skipping backend record");
                rejected.push((index, e));
            }
        }
    }
    (tasks, rejected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn wire(json: &str) -> WireTask {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn localized_statuses_fold_to_canonical_tags() {
        assert_eq!(normalize_status("À faire"), Some(TaskStatus::Todo));
        assert_eq!(normalize_status("todo"), Some(TaskStatus::Todo));
        assert_eq!(normalize_status("En cours"), Some(TaskStatus::InProgress));
        assert_eq!(normalize_status("IN-PROGRESS"), Some(TaskStatus::InProgress));
        assert_eq!(normalize_status("Terminé"), Some(TaskStatus::Done));
        assert_eq!(normalize_status("Terminée"), Some(TaskStatus::Done));
        assert_eq!(normalize_status(" Achevé "), Some(TaskStatus::Done));
        assert_eq!(normalize_status("en_cours"), Some(TaskStatus::InProgress));
        assert_eq!(normalize_status("Non commencé"), Some(TaskStatus::Todo));
        assert_eq!(normalize_status("waiting"), None);
        assert_eq!(normalize_status("  "), None);
    }

    #[test]
    fn negated_labels_are_not_mistaken_for_a_lane() {
        for label in ["Pas terminé", "Incomplete", "Undone", "Not started", "not done"] {
            assert_eq!(normalize_status(label), None, "{}", label);
        }
        let task = ingest(wire(r#"{"title":"a","status":"Pas terminé"}"#), None).unwrap();
        assert_eq!(task.status, TaskStatus::Todo);
    }

    #[test]
    fn french_priorities_fold_to_levels() {
        assert_eq!(normalize_priority("Élevée"), Some(Priority::High));
        assert_eq!(normalize_priority("Moyenne"), Some(Priority::Medium));
        assert_eq!(normalize_priority("Faible"), Some(Priority::Low));
        assert_eq!(normalize_priority(""), None);
    }

    #[test]
    fn project_from_object() {
        let w = wire(r#"{"title":"a","project":{"id":7},"projectId":9}"#);
        assert_eq!(
            resolve_project_ref(w.project.as_ref(), w.project_id.as_ref(), Some(ProjectId(1))),
            Some(ProjectId(7))
        );
    }

    #[test]
    fn project_from_bare_id() {
        let w = wire(r#"{"title":"a","project":7,"projectId":9}"#);
        assert_eq!(
            resolve_project_ref(w.project.as_ref(), w.project_id.as_ref(), None),
            Some(ProjectId(7))
        );
    }

    #[test]
    fn project_from_separate_field_when_object_has_no_id() {
        let w = wire(r#"{"title":"a","project":{},"projectId":"9"}"#);
        assert_eq!(
            resolve_project_ref(w.project.as_ref(), w.project_id.as_ref(), None),
            Some(ProjectId(9))
        );
    }

    #[test]
    fn project_from_context_as_last_resort() {
        let w = wire(r#"{"title":"a"}"#);
        assert_eq!(
            resolve_project_ref(w.project.as_ref(), w.project_id.as_ref(), Some(ProjectId(4))),
            Some(ProjectId(4))
        );
        assert_eq!(resolve_project_ref(None, None, None), None);
    }

    #[test]
    fn ingest_normalizes_a_backend_record() {
        let w = wire(
            r#"{
                "id": 12,
                "title": "  Call client ",
                "status": "En cours",
                "priority": "Moyenne",
                "dueDate": "2025-03-05",
                "project": {"id": 7},
                "assignedTo": {"id": 3, "firstName": "Ana"},
                "tags": ["crm", "phone"]
            }"#,
        );
        let task = ingest(w, None).unwrap();
        assert_eq!(task.id, Some(TaskId::server("12")));
        assert_eq!(task.title, "Call client");
        assert_eq!(task.status, TaskStatus::InProgress);
        assert_eq!(task.priority, Some(Priority::Medium));
        assert_eq!(task.start_date.as_deref(), Some("2025-03-05"));
        assert_eq!(task.end_date.as_deref(), Some("2025-03-05"));
        assert_eq!(task.project_id, Some(ProjectId(7)));
        assert_eq!(task.assigned_to.as_deref(), Some("3"));
        assert_eq!(task.tags, vec!["crm", "phone"]);
    }

    #[test]
    fn unknown_status_becomes_todo() {
        let task = ingest(wire(r#"{"title":"a","status":"waiting"}"#), None).unwrap();
        assert_eq!(task.status, TaskStatus::Todo);
    }

    #[test]
    fn blank_title_and_negative_estimate_are_rejected() {
        assert_eq!(
            ingest(wire(r#"{"title":"   "}"#), None).unwrap_err(),
            InvalidTaskError::BlankTitle
        );
        assert_eq!(
            ingest(wire(r#"{"title":"a","estimatedTime":-2.0}"#), None).unwrap_err(),
            InvalidTaskError::NegativeEstimate(-2.0)
        );
    }

    #[test]
    fn ingest_all_skips_bad_records() {
        let records = vec![
            wire(r#"{"id":1,"title":"ok"}"#),
            wire(r#"{"id":2}"#),
            wire(r#"{"id":3,"title":"also ok"}"#),
        ];
        let (tasks, rejected) = ingest_all(records, Some(ProjectId(1)));
        assert_eq!(tasks.len(), 2);
        assert_eq!(rejected, vec![(1, InvalidTaskError::BlankTitle)]);
    }

    #[test]
    fn outbound_shape_uses_numeric_ids_and_project_id() {
        let mut task = Task::new(Some(TaskId::server("12")), "Call", ProjectId(7));
        task.status = TaskStatus::Done;
        let json = serde_json::to_value(WireTask::from(&task)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "id": 12,
                "title": "Call",
                "status": "done",
                "projectId": 7
            })
        );
    }
}
