use crate::model::task::{ProjectId, Task, TaskId, TaskPatch};

/// Error type for structurally invalid tasks
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum InvalidTaskError {
    #[error("task has no id")]
    MissingId,
    #[error("task {0} has no project")]
    MissingProject(String),
    #[error("task title is blank")]
    BlankTitle,
    #[error("task not found: {0}")]
    NotFound(TaskId),
    #[error("task {id} belongs to project {existing}, cannot move it to project {requested}")]
    ProjectMismatch {
        id: TaskId,
        existing: ProjectId,
        requested: ProjectId,
    },
    #[error("estimated time cannot be negative ({0}h)")]
    NegativeEstimate(f64),
}

/// In-memory tasks of the selected project, in insertion order.
///
/// This is the single source all projectors read from. Reads hand out a
/// slice; every write goes through `upsert`, `merge`, `replace` or `remove`.
#[derive(Debug, Default, Clone)]
pub struct TaskStore {
    project_id: Option<ProjectId>,
    tasks: Vec<Task>,
}

impl TaskStore {
    pub fn new() -> Self {
        TaskStore::default()
    }

    /// The project whose tasks are loaded, if any
    pub fn project_id(&self) -> Option<ProjectId> {
        self.project_id
    }

    /// Replace the whole collection with `tasks` for `project_id`.
    ///
    /// Nothing from the previous collection survives. Records that fail
    /// validation are skipped and logged.
    pub fn load(&mut self, project_id: ProjectId, tasks: Vec<Task>) -> &[Task] {
        self.project_id = Some(project_id);
        self.tasks.clear();
        for task in tasks {
            if let Err(e) = self.upsert(task) {
                tracing::warn!(project = %project_id, error = %e, "skipping task on load");
            }
        }
        &self.tasks
    }

    /// Read-only snapshot
    pub fn all(&self) -> &[Task] {
        &self.tasks
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn get(&self, id: &TaskId) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id.as_ref() == Some(id))
    }

    /// Position of a task in the collection
    pub fn position(&self, id: &TaskId) -> Option<usize> {
        self.tasks.iter().position(|t| t.id.as_ref() == Some(id))
    }

    /// Insert `task`, or replace the record with the same id in place.
    pub fn upsert(&mut self, task: Task) -> Result<(), InvalidTaskError> {
        let id = validate(&task)?;
        match self.position(&id) {
            Some(pos) => {
                check_same_project(&self.tasks[pos], &task, &id)?;
                self.tasks[pos] = task;
            }
            None => self.tasks.push(task),
        }
        Ok(())
    }

    /// Shallow-merge `patch` over the existing record.
    ///
    /// The result is validated before it is stored; on error the record is
    /// left untouched.
    pub fn merge(&mut self, id: &TaskId, patch: &TaskPatch) -> Result<&Task, InvalidTaskError> {
        let pos = self
            .position(id)
            .ok_or_else(|| InvalidTaskError::NotFound(id.clone()))?;
        let mut merged = self.tasks[pos].clone();
        patch.apply_to(&mut merged);
        validate(&merged)?;
        self.tasks[pos] = merged;
        Ok(&self.tasks[pos])
    }

    /// Swap the record at `old` for `task` (which may carry a different id),
    /// keeping its position. Any other record already holding the new id is
    /// dropped so the id stays unique. Falls back to `upsert` when `old` is
    /// gone.
    pub fn replace(&mut self, old: &TaskId, task: Task) -> Result<(), InvalidTaskError> {
        let new_id = validate(&task)?;
        let Some(pos) = self.position(old) else {
            return self.upsert(task);
        };
        check_same_project(&self.tasks[pos], &task, &new_id)?;
        self.tasks[pos] = task;
        let mut index = 0;
        self.tasks.retain(|t| {
            let keep = index == pos || t.id.as_ref() != Some(&new_id);
            index += 1;
            keep
        });
        Ok(())
    }

    /// Delete by id; absent ids are a no-op.
    pub fn remove(&mut self, id: &TaskId) -> Option<Task> {
        let pos = self.position(id)?;
        Some(self.tasks.remove(pos))
    }

    /// Put a task back at `index` (clamped), used when rolling back a delete.
    pub fn restore(&mut self, index: usize, task: Task) -> Result<(), InvalidTaskError> {
        let id = validate(&task)?;
        if self.position(&id).is_some() {
            return self.upsert(task);
        }
        let index = index.min(self.tasks.len());
        self.tasks.insert(index, task);
        Ok(())
    }
}

fn validate(task: &Task) -> Result<TaskId, InvalidTaskError> {
    let id = task.id.clone().ok_or(InvalidTaskError::MissingId)?;
    if task.project_id.is_none() {
        return Err(InvalidTaskError::MissingProject(id.to_string()));
    }
    if task.title.trim().is_empty() {
        return Err(InvalidTaskError::BlankTitle);
    }
    if let Some(hours) = task.estimated_time
        && hours < 0.0
    {
        return Err(InvalidTaskError::NegativeEstimate(hours));
    }
    Ok(id)
}

fn check_same_project(existing: &Task, incoming: &Task, id: &TaskId) -> Result<(), InvalidTaskError> {
    match (existing.project_id, incoming.project_id) {
        (Some(existing), Some(requested)) if existing != requested => {
            Err(InvalidTaskError::ProjectMismatch {
                id: id.clone(),
                existing,
                requested,
            })
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::task::TaskStatus;
    use pretty_assertions::assert_eq;

    fn task(id: &str, title: &str) -> Task {
        Task::new(Some(TaskId::server(id)), title, ProjectId(7))
    }

    fn ids(store: &TaskStore) -> Vec<String> {
        store
            .all()
            .iter()
            .map(|t| t.id.as_ref().unwrap().to_string())
            .collect()
    }

    #[test]
    fn upsert_twice_is_idempotent() {
        let mut once = TaskStore::new();
        once.upsert(task("1", "Draft spec")).unwrap();

        let mut twice = TaskStore::new();
        twice.upsert(task("1", "Draft spec")).unwrap();
        twice.upsert(task("1", "Draft spec")).unwrap();

        assert_eq!(once.all(), twice.all());
        assert_eq!(twice.len(), 1);
    }

    #[test]
    fn upsert_replaces_in_place() {
        let mut store = TaskStore::new();
        store.upsert(task("1", "a")).unwrap();
        store.upsert(task("2", "b")).unwrap();
        store.upsert(task("1", "a2")).unwrap();
        assert_eq!(ids(&store), vec!["1", "2"]);
        assert_eq!(store.all()[0].title, "a2");
    }

    #[test]
    fn upsert_rejects_missing_id_and_project() {
        let mut store = TaskStore::new();
        let mut no_id = task("1", "a");
        no_id.id = None;
        assert_eq!(store.upsert(no_id), Err(InvalidTaskError::MissingId));

        let mut no_project = task("1", "a");
        no_project.project_id = None;
        assert_eq!(
            store.upsert(no_project),
            Err(InvalidTaskError::MissingProject("1".into()))
        );
        assert!(store.is_empty());
    }

    #[test]
    fn upsert_refuses_to_reparent() {
        let mut store = TaskStore::new();
        store.upsert(task("1", "a")).unwrap();
        let mut moved = task("1", "a");
        moved.project_id = Some(ProjectId(8));
        assert!(matches!(
            store.upsert(moved),
            Err(InvalidTaskError::ProjectMismatch { .. })
        ));
    }

    #[test]
    fn load_replaces_everything() {
        let mut store = TaskStore::new();
        store.upsert(task("old", "stale")).unwrap();
        let mut bad = task("x", "no project");
        bad.project_id = None;
        store.load(ProjectId(7), vec![task("1", "a"), bad, task("2", "b")]);
        assert_eq!(ids(&store), vec!["1", "2"]);
        assert_eq!(store.project_id(), Some(ProjectId(7)));
    }

    #[test]
    fn merge_is_shallow_and_validated() {
        let mut store = TaskStore::new();
        store.upsert(task("1", "a")).unwrap();

        let merged = store.merge(&TaskId::server("1"), &TaskPatch::status(TaskStatus::Done)).unwrap();
        assert_eq!(merged.status, TaskStatus::Done);
        assert_eq!(merged.title, "a");

        let blank = TaskPatch {
            title: Some(" ".into()),
            ..Default::default()
        };
        assert_eq!(
            store.merge(&TaskId::server("1"), &blank).unwrap_err(),
            InvalidTaskError::BlankTitle
        );
        assert_eq!(store.all()[0].title, "a");

        assert!(matches!(
            store.merge(&TaskId::server("9"), &blank),
            Err(InvalidTaskError::NotFound(_))
        ));
    }

    #[test]
    fn replace_swaps_placeholder_in_place() {
        let mut store = TaskStore::new();
        store.upsert(task("1", "a")).unwrap();
        store
            .upsert(Task::new(Some(TaskId::Placeholder(1)), "new", ProjectId(7)))
            .unwrap();
        store.upsert(task("2", "b")).unwrap();

        store
            .replace(&TaskId::Placeholder(1), task("31", "new"))
            .unwrap();
        assert_eq!(ids(&store), vec!["1", "31", "2"]);
    }

    #[test]
    fn replace_drops_duplicate_of_new_id() {
        let mut store = TaskStore::new();
        store
            .upsert(Task::new(Some(TaskId::Placeholder(1)), "new", ProjectId(7)))
            .unwrap();
        store.upsert(task("31", "new (reloaded)")).unwrap();
        store
            .replace(&TaskId::Placeholder(1), task("31", "new"))
            .unwrap();
        assert_eq!(ids(&store), vec!["31"]);
        assert_eq!(store.all()[0].title, "new");
    }

    #[test]
    fn remove_absent_is_noop() {
        let mut store = TaskStore::new();
        store.upsert(task("1", "a")).unwrap();
        assert!(store.remove(&TaskId::server("2")).is_none());
        assert_eq!(store.len(), 1);
        assert!(store.remove(&TaskId::server("1")).is_some());
        assert!(store.is_empty());
    }

    #[test]
    fn restore_puts_task_back_at_index() {
        let mut store = TaskStore::new();
        store.upsert(task("1", "a")).unwrap();
        store.upsert(task("3", "c")).unwrap();
        store.restore(1, task("2", "b")).unwrap();
        assert_eq!(ids(&store), vec!["1", "2", "3"]);
    }
}
