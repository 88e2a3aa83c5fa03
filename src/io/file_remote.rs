//! A JSON file standing in for the task backend.
//!
//! Records are kept in the backend's loose wire shape, so everything read back
//! goes through the same ingestion path as a real server response. Every call
//! re-reads the file; writes replace it atomically.

use std::fs;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::model::config::RemoteConfig;
use crate::model::project::Project;
use crate::model::task::{ProjectId, Task, TaskId, TaskPatch};
use crate::ops::remote::{RemoteMutationError, RemoteTaskApi};
use crate::parse::wire::{WireId, WireTask, ingest, ingest_all, resolve_project_ref};

/// On-disk layout of the backend file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendFile {
    /// Next server id to hand out
    #[serde(default)]
    pub next_id: u64,
    #[serde(default)]
    pub projects: Vec<Project>,
    #[serde(default)]
    pub tasks: Vec<WireTask>,
}

impl BackendFile {
    fn mint_id(&mut self) -> u64 {
        let highest = self
            .tasks
            .iter()
            .filter_map(|t| t.id_text()?.parse::<u64>().ok())
            .max()
            .unwrap_or(0);
        let id = self.next_id.max(highest + 1);
        self.next_id = id + 1;
        id
    }

    fn position(&self, id: &TaskId) -> Option<usize> {
        let wanted = id.to_string();
        self.tasks
            .iter()
            .position(|t| t.id_text().as_deref() == Some(wanted.as_str()))
    }
}

pub struct FileRemote {
    path: PathBuf,
    fail_writes: bool,
}

impl FileRemote {
    pub fn new(path: impl Into<PathBuf>, fail_writes: bool) -> Self {
        FileRemote {
            path: path.into(),
            fail_writes,
        }
    }

    pub fn from_config(root: &Path, config: &RemoteConfig) -> Self {
        FileRemote::new(root.join(&config.file), config.fail_writes)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write an empty backend holding the given projects.
    pub fn init(&self, projects: Vec<Project>) -> Result<(), RemoteMutationError> {
        self.save(&BackendFile {
            next_id: 1,
            projects,
            tasks: Vec::new(),
        })
    }

    pub fn projects(&self) -> Result<Vec<Project>, RemoteMutationError> {
        Ok(self.load()?.projects)
    }

    fn load(&self) -> Result<BackendFile, RemoteMutationError> {
        let text = fs::read_to_string(&self.path).map_err(|e| {
            RemoteMutationError::Unavailable(format!("could not read {}: {}", self.path.display(), e))
        })?;
        serde_json::from_str(&text)
            .map_err(|e| RemoteMutationError::Malformed(format!("{}: {}", self.path.display(), e)))
    }

    fn save(&self, backend: &BackendFile) -> Result<(), RemoteMutationError> {
        let text = serde_json::to_string_pretty(backend)
            .map_err(|e| RemoteMutationError::Malformed(e.to_string()))?;
        crate::io::atomic_write(&self.path, text.as_bytes()).map_err(|e| {
            RemoteMutationError::Unavailable(format!("could not write {}: {}", self.path.display(), e))
        })
    }

    fn check_writable(&self) -> Result<(), RemoteMutationError> {
        if self.fail_writes {
            return Err(RemoteMutationError::Rejected {
                status: 503,
                message: "writes are disabled (remote.fail_writes)".into(),
            });
        }
        Ok(())
    }
}

fn malformed(e: impl std::fmt::Display) -> RemoteMutationError {
    RemoteMutationError::Malformed(e.to_string())
}

#[async_trait(?Send)]
impl RemoteTaskApi for FileRemote {
    async fn create_task(&self, payload: &Task) -> Result<Task, RemoteMutationError> {
        self.check_writable()?;
        let mut backend = self.load()?;
        let mut record = WireTask::from(payload);
        record.id = Some(WireId::Number(backend.mint_id()));
        backend.tasks.push(record.clone());
        self.save(&backend)?;
        tracing::debug!(id = ?record.id, "backend task created");
        ingest(record, payload.project_id).map_err(malformed)
    }

    async fn update_task(&self, id: &TaskId, patch: &TaskPatch) -> Result<Task, RemoteMutationError> {
        self.check_writable()?;
        let mut backend = self.load()?;
        let pos = backend
            .position(id)
            .ok_or_else(|| RemoteMutationError::not_found(id))?;
        let mut task = ingest(backend.tasks[pos].clone(), None).map_err(malformed)?;
        patch.apply_to(&mut task);
        backend.tasks[pos] = WireTask::from(&task);
        self.save(&backend)?;
        Ok(task)
    }

    async fn delete_task(&self, id: &TaskId) -> Result<(), RemoteMutationError> {
        self.check_writable()?;
        let mut backend = self.load()?;
        let pos = backend
            .position(id)
            .ok_or_else(|| RemoteMutationError::not_found(id))?;
        backend.tasks.remove(pos);
        self.save(&backend)
    }

    async fn list_tasks_for_project(&self, project: ProjectId) -> Result<Vec<Task>, RemoteMutationError> {
        let backend = self.load()?;
        let records: Vec<WireTask> = backend
            .tasks
            .into_iter()
            .filter(|t| resolve_project_ref(t.project.as_ref(), t.project_id.as_ref(), None) == Some(project))
            .collect();
        let (tasks, _rejected) = ingest_all(records, Some(project));
        Ok(tasks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::task::{Priority, TaskStatus};
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn project(id: u64, name: &str) -> Project {
        Project {
            id: ProjectId(id),
            name: name.into(),
            description: String::new(),
            start_date: None,
            end_date: None,
        }
    }

    fn seeded(dir: &TempDir, json: &str) -> FileRemote {
        let path = dir.path().join("tasks.json");
        fs::write(&path, json).unwrap();
        FileRemote::new(path, false)
    }

    const MIXED: &str = r#"{
        "projects": [{"id": 7, "name": "CRM"}, {"id": 8, "name": "Site"}],
        "tasks": [
            {"id": 1, "title": "Call Dupont", "status": "À faire", "project": {"id": 7}},
            {"id": "2", "title": "Prepare invoice", "status": "En cours", "project": 7, "priority": "Élevée"},
            {"id": 3, "title": "Archive mails", "status": "Terminé", "projectId": "7", "dueDate": "2024-03-05"},
            {"id": 4, "title": "Other project", "projectId": 8},
            {"id": 5, "title": "   ", "projectId": 7}
        ]
    }"#;

    #[tokio::test]
    async fn lists_every_project_reference_shape() {
        let dir = TempDir::new().unwrap();
        let remote = seeded(&dir, MIXED);

        let tasks = remote.list_tasks_for_project(ProjectId(7)).await.unwrap();
        let summary: Vec<_> = tasks
            .iter()
            .map(|t| (t.id.clone().unwrap().to_string(), t.status))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("1".to_string(), TaskStatus::Todo),
                ("2".to_string(), TaskStatus::InProgress),
                ("3".to_string(), TaskStatus::Done),
            ]
        );
        assert_eq!(tasks[1].priority, Some(Priority::High));
        assert_eq!(tasks[2].end_date.as_deref(), Some("2024-03-05"));
        assert!(tasks.iter().all(|t| t.project_id == Some(ProjectId(7))));

        assert_eq!(remote.projects().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn create_assigns_sequential_ids_past_existing_ones() {
        let dir = TempDir::new().unwrap();
        let remote = seeded(&dir, MIXED);

        let draft = Task::new(None, "Draft spec", ProjectId(7));
        let first = remote.create_task(&draft).await.unwrap();
        let second = remote.create_task(&draft).await.unwrap();
        assert_eq!(first.id, Some(TaskId::server("6")));
        assert_eq!(second.id, Some(TaskId::server("7")));
        assert_eq!(first.project_id, Some(ProjectId(7)));

        let listed = remote.list_tasks_for_project(ProjectId(7)).await.unwrap();
        assert_eq!(listed.len(), 5);
    }

    #[tokio::test]
    async fn update_persists_patch() {
        let dir = TempDir::new().unwrap();
        let remote = seeded(&dir, MIXED);

        let updated = remote
            .update_task(&TaskId::server("1"), &TaskPatch::status(TaskStatus::Done))
            .await
            .unwrap();
        assert_eq!(updated.status, TaskStatus::Done);
        assert_eq!(updated.project_id, Some(ProjectId(7)));

        let reread = remote.list_tasks_for_project(ProjectId(7)).await.unwrap();
        assert_eq!(reread[0].status, TaskStatus::Done);
        assert_eq!(reread[0].title, "Call Dupont");
    }

    #[tokio::test]
    async fn unknown_ids_are_404() {
        let dir = TempDir::new().unwrap();
        let remote = seeded(&dir, MIXED);
        let err = remote.delete_task(&TaskId::server("99")).await.unwrap_err();
        assert!(matches!(err, RemoteMutationError::Rejected { status: 404, .. }));
        let err = remote
            .update_task(&TaskId::Placeholder(1), &TaskPatch::default())
            .await
            .unwrap_err();
        assert!(matches!(err, RemoteMutationError::Rejected { status: 404, .. }));
    }

    #[tokio::test]
    async fn delete_removes_record() {
        let dir = TempDir::new().unwrap();
        let remote = seeded(&dir, MIXED);
        remote.delete_task(&TaskId::server("2")).await.unwrap();
        let listed = remote.list_tasks_for_project(ProjectId(7)).await.unwrap();
        assert_eq!(listed.len(), 2);
    }

    #[tokio::test]
    async fn failing_writes_leave_file_untouched() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tasks.json");
        fs::write(&path, MIXED).unwrap();
        let remote = FileRemote::new(&path, true);

        let err = remote
            .create_task(&Task::new(None, "x", ProjectId(7)))
            .await
            .unwrap_err();
        assert!(matches!(err, RemoteMutationError::Rejected { status: 503, .. }));
        assert_eq!(fs::read_to_string(&path).unwrap(), MIXED);
        // Reads still work
        assert_eq!(remote.list_tasks_for_project(ProjectId(7)).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn missing_and_malformed_files() {
        let dir = TempDir::new().unwrap();
        let missing = FileRemote::new(dir.path().join("nope.json"), false);
        assert!(matches!(
            missing.list_tasks_for_project(ProjectId(7)).await,
            Err(RemoteMutationError::Unavailable(_))
        ));

        let broken = seeded(&dir, "{ not json");
        assert!(matches!(
            broken.list_tasks_for_project(ProjectId(7)).await,
            Err(RemoteMutationError::Malformed(_))
        ));
    }

    #[test]
    fn init_writes_empty_backend() {
        let dir = TempDir::new().unwrap();
        let remote = FileRemote::new(dir.path().join("tasks.json"), false);
        remote.init(vec![project(7, "CRM")]).unwrap();
        let projects = remote.projects().unwrap();
        assert_eq!(projects.len(), 1);
        assert_eq!(projects[0].name, "CRM");
    }
}
