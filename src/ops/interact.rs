//! Gestures on the board, turned into gateway mutations.
//!
//! The controller owns the gateway, the remote handle and the board's manual
//! lane order. Each gesture applies locally before returning; the returned
//! [`MutationHandle`] can be awaited for the server's answer or dropped.
//!
//! A task created a moment ago only has a placeholder id. Gestures on it are
//! applied locally right away; their remote calls wait until the create has
//! been confirmed and then address the server id.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use tokio::sync::{broadcast, watch};

use crate::model::task::{Priority, ProjectId, Task, TaskId, TaskPatch, TaskStatus};
use crate::ops::filter::FilterCriteria;
use crate::ops::gateway::{
    FailureRecord, Gateway, MutationEvent, MutationHandle, MutationIntent, ReconciliationPolicy,
    SharedStore,
};
use crate::ops::remote::{RemoteMutationError, RemoteTaskApi};
use crate::ops::store::{InvalidTaskError, TaskStore};
use crate::view::board::ManualOrder;
use crate::view::list::{SortSpec, project_list};

#[derive(Debug, thiserror::Error)]
pub enum InteractionError {
    #[error(transparent)]
    Invalid(#[from] InvalidTaskError),
    #[error(transparent)]
    Remote(#[from] RemoteMutationError),
    #[error("no project loaded")]
    NoProject,
}

/// Fields for a new task. Status defaults to todo.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskDraft {
    pub title: String,
    pub description: Option<String>,
    pub status: Option<TaskStatus>,
    pub priority: Option<Priority>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub assigned_to: Option<String>,
    pub tags: Vec<String>,
    pub estimated_time: Option<f64>,
}

impl TaskDraft {
    pub fn new(title: impl Into<String>) -> Self {
        TaskDraft {
            title: title.into(),
            ..Default::default()
        }
    }

    fn into_task(self, id: TaskId, project: ProjectId) -> Task {
        let mut task = Task::new(Some(id), self.title, project);
        task.description = self.description;
        task.status = self.status.unwrap_or_default();
        task.priority = self.priority;
        task.start_date = self.start_date;
        task.end_date = self.end_date;
        task.assigned_to = self.assigned_to;
        task.tags = self.tags;
        task.estimated_time = self.estimated_time;
        task
    }
}

type Confirmations = Rc<RefCell<HashMap<TaskId, watch::Receiver<Option<TaskId>>>>>;

pub struct BoardController {
    gateway: Gateway,
    remote: Rc<dyn RemoteTaskApi>,
    order: Rc<RefCell<ManualOrder>>,
    /// Server id of each placeholder, once its create is confirmed
    confirmations: Confirmations,
    criteria: FilterCriteria,
    sort: SortSpec,
}

impl BoardController {
    pub fn new(remote: Rc<dyn RemoteTaskApi>, policy: ReconciliationPolicy) -> Self {
        let store: SharedStore = Rc::new(RefCell::new(TaskStore::new()));
        BoardController {
            gateway: Gateway::new(store, policy),
            remote,
            order: Rc::new(RefCell::new(ManualOrder::default())),
            confirmations: Rc::new(RefCell::new(HashMap::new())),
            criteria: FilterCriteria::default(),
            sort: SortSpec::default(),
        }
    }

    pub fn gateway(&self) -> &Gateway {
        &self.gateway
    }

    pub fn store(&self) -> &SharedStore {
        self.gateway.store()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MutationEvent> {
        self.gateway.subscribe()
    }

    pub fn failures(&self) -> Vec<FailureRecord> {
        self.gateway.failures()
    }

    /// Fetch a project's tasks and make them the whole store.
    pub async fn load_project(&self, project: ProjectId) -> Result<usize, InteractionError> {
        let tasks = self.remote.list_tasks_for_project(project).await?;
        let loaded = self.store().borrow_mut().load(project, tasks).len();
        self.confirmations.borrow_mut().clear();
        tracing::debug!(project = %project, tasks = loaded, "project loaded");
        Ok(loaded)
    }

    /// Add a task to the loaded project under a placeholder id.
    pub fn create_task(&self, draft: TaskDraft) -> Result<MutationHandle, InteractionError> {
        let project = self
            .store()
            .borrow()
            .project_id()
            .ok_or(InteractionError::NoProject)?;
        let placeholder = self.gateway.next_placeholder();
        let task = draft.into_task(placeholder.clone(), project);
        let mut payload = task.clone();
        payload.id = None;

        let (confirm, confirmed) = watch::channel(None);
        let remote = Rc::clone(&self.remote);
        let order = Rc::clone(&self.order);
        let target = placeholder.clone();

        let handle = self.gateway.mutate(
            MutationIntent::Create(placeholder.clone()),
            move |s| s.upsert(task),
            move || async move {
                let created = with_project(remote.create_task(&payload).await?, project);
                let Some(server_id) = created.id.clone() else {
                    return Err(RemoteMutationError::Malformed("created task has no id".into()));
                };
                order.borrow_mut().rename(&target, &server_id);
                // Nobody waiting is fine
                let _ = confirm.send(Some(server_id));
                Ok::<_, RemoteMutationError>(Some(created))
            },
        )?;
        self.confirmations.borrow_mut().insert(placeholder, confirmed);
        Ok(handle)
    }

    /// Drop a card into `status`'s lane at `index` (end of lane if `None`).
    ///
    /// Dropping into the lane the task is already in only reorders; nothing is
    /// sent and `None` is returned.
    pub fn drop_into_lane(
        &self,
        id: &TaskId,
        status: TaskStatus,
        index: Option<usize>,
    ) -> Result<Option<MutationHandle>, InteractionError> {
        let current = self
            .store()
            .borrow()
            .get(id)
            .map(|t| t.status)
            .ok_or_else(|| InvalidTaskError::NotFound(id.clone()))?;
        self.order.borrow_mut().place(id, status, index);
        if current == status {
            tracing::debug!(task = %id, lane = %status, "reordered within lane");
            return Ok(None);
        }
        self.update(id, TaskPatch::status(status)).map(Some)
    }

    /// Inline edit
    pub fn edit_task(&self, id: &TaskId, patch: TaskPatch) -> Result<MutationHandle, InteractionError> {
        self.update(id, patch)
    }

    pub fn delete_task(&self, id: &TaskId) -> Result<MutationHandle, InteractionError> {
        let pending = self.pending_confirmation(id);
        let remote = Rc::clone(&self.remote);
        let store = Rc::clone(self.store());
        let target = id.clone();

        let handle = self.gateway.mutate(
            MutationIntent::Delete(id.clone()),
            {
                let target = id.clone();
                move |s| {
                    s.remove(&target)
                        .map(|_| ())
                        .ok_or_else(|| InvalidTaskError::NotFound(target.clone()))
                }
            },
            move || async move {
                let server_id = confirmed_id(target.clone(), pending).await?;
                remote.delete_task(&server_id).await?;
                if server_id != target {
                    // The create's reconciliation put the record back under
                    // its server id after the local delete
                    store.borrow_mut().remove(&server_id);
                }
                Ok::<_, RemoteMutationError>(None)
            },
        )?;
        self.order.borrow_mut().remove(id);
        Ok(handle)
    }

    fn update(&self, id: &TaskId, patch: TaskPatch) -> Result<MutationHandle, InteractionError> {
        let pending = self.pending_confirmation(id);
        let remote = Rc::clone(&self.remote);
        let project = self.store().borrow().project_id();
        let target = id.clone();
        let local = patch.clone();

        let handle = self.gateway.mutate(
            MutationIntent::Update(id.clone()),
            {
                let target = id.clone();
                move |s| s.merge(&target, &local).map(|_| ())
            },
            move || async move {
                let server_id = confirmed_id(target, pending).await?;
                let mut updated = remote.update_task(&server_id, &patch).await?;
                if let Some(project) = project {
                    updated = with_project(updated, project);
                }
                Ok::<_, RemoteMutationError>(Some(updated))
            },
        )?;
        Ok(handle)
    }

    fn pending_confirmation(&self, id: &TaskId) -> Option<watch::Receiver<Option<TaskId>>> {
        if !id.is_placeholder() {
            return None;
        }
        self.confirmations.borrow().get(id).cloned()
    }

    /// Lane order set by drag-and-drop
    pub fn order(&self) -> ManualOrder {
        self.order.borrow().clone()
    }

    pub fn set_order(&self, order: ManualOrder) {
        *self.order.borrow_mut() = order;
    }

    pub fn criteria(&self) -> &FilterCriteria {
        &self.criteria
    }

    pub fn set_criteria(&mut self, criteria: FilterCriteria) {
        self.criteria = criteria;
    }

    pub fn sort(&self) -> SortSpec {
        self.sort
    }

    pub fn set_sort(&mut self, sort: SortSpec) {
        self.sort = sort;
    }

    /// Copy of every task in the store, in collection order
    pub fn snapshot(&self) -> Vec<Task> {
        self.store().borrow().all().to_vec()
    }

    /// Tasks passing the current filter, in the current sort order
    pub fn visible(&self) -> Vec<Task> {
        let store = self.store().borrow();
        project_list(self.criteria.apply(store.all()), self.sort)
            .into_iter()
            .cloned()
            .collect()
    }
}

/// Server responses don't always echo the project back.
fn with_project(mut task: Task, project: ProjectId) -> Task {
    if task.project_id.is_none() {
        task.project_id = Some(project);
    }
    task
}

/// The id to send to the server for `id`: itself, or the server id its create
/// was confirmed under.
async fn confirmed_id(
    id: TaskId,
    pending: Option<watch::Receiver<Option<TaskId>>>,
) -> Result<TaskId, RemoteMutationError> {
    let Some(mut confirmed) = pending else {
        return Ok(id);
    };
    let server_id = {
        let current = confirmed
            .wait_for(Option::is_some)
            .await
            .map_err(|_| RemoteMutationError::Unavailable(format!("task {} was never created on the server", id)))?;
        (*current).clone()
    };
    Ok(server_id.unwrap_or(id))
}
