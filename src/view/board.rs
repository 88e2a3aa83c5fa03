use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::model::task::{ProjectId, Task, TaskId, TaskStatus};

/// Per-lane order set by dragging cards around.
///
/// Ids listed for a lane are shown first, in list order; everything else
/// follows in collection order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ManualOrder {
    #[serde(default)]
    lanes: IndexMap<TaskStatus, Vec<TaskId>>,
}

impl ManualOrder {
    pub fn lane(&self, status: TaskStatus) -> &[TaskId] {
        self.lanes.get(&status).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Put `id` at `index` in `status`'s lane (appending if `None` or past the
    /// end), removing it from wherever it was before.
    pub fn place(&mut self, id: &TaskId, status: TaskStatus, index: Option<usize>) {
        self.remove(id);
        let lane = self.lanes.entry(status).or_default();
        let index = index.unwrap_or(lane.len()).min(lane.len());
        lane.insert(index, id.clone());
    }

    pub fn remove(&mut self, id: &TaskId) {
        for lane in self.lanes.values_mut() {
            lane.retain(|x| x != id);
        }
    }

    /// Follow an id change (placeholder confirmed by the server)
    pub fn rename(&mut self, old: &TaskId, new: &TaskId) {
        for lane in self.lanes.values_mut() {
            for id in lane.iter_mut() {
                if id == old {
                    *id = new.clone();
                }
            }
        }
    }

    /// Drop placeholder ids; they mean nothing outside the session that
    /// minted them.
    pub fn forget_placeholders(&mut self) {
        for lane in self.lanes.values_mut() {
            lane.retain(|id| !id.is_placeholder());
        }
    }

    pub fn is_empty(&self) -> bool {
        self.lanes.values().all(Vec::is_empty)
    }
}

/// Sub-group key inside a lane
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectBucket {
    Project(ProjectId),
    Unassigned,
}

#[derive(Debug, Clone, Serialize)]
pub struct BoardGroup<'a> {
    pub project: ProjectBucket,
    pub tasks: Vec<&'a Task>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BoardLane<'a> {
    pub status: TaskStatus,
    pub count: usize,
    pub groups: Vec<BoardGroup<'a>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BoardView<'a> {
    pub lanes: Vec<BoardLane<'a>>,
}

impl<'a> BoardView<'a> {
    pub fn lane(&self, status: TaskStatus) -> &BoardLane<'a> {
        // Every status has a lane, in TaskStatus::ALL order
        let index = TaskStatus::ALL
            .iter()
            .position(|s| *s == status)
            .unwrap_or_default();
        &self.lanes[index]
    }

    pub fn total(&self) -> usize {
        self.lanes.iter().map(|l| l.count).sum()
    }
}

impl<'a> BoardLane<'a> {
    pub fn group(&self, project: ProjectBucket) -> Option<&BoardGroup<'a>> {
        self.groups.iter().find(|g| g.project == project)
    }
}

/// Group tasks into status lanes, then by owning project.
///
/// Every status gets a lane, even when empty. Project groups appear in the
/// order their first task appears.
pub fn project_board<'a, I>(tasks: I, order: &ManualOrder) -> BoardView<'a>
where
    I: IntoIterator<Item = &'a Task>,
{
    let mut lanes: IndexMap<TaskStatus, IndexMap<ProjectBucket, Vec<&'a Task>>> = TaskStatus::ALL
        .iter()
        .map(|s| (*s, IndexMap::new()))
        .collect();

    for task in tasks {
        let bucket = match task.project_id {
            Some(p) => ProjectBucket::Project(p),
            None => ProjectBucket::Unassigned,
        };
        lanes
            .entry(task.status)
            .or_default()
            .entry(bucket)
            .or_default()
            .push(task);
    }

    let lanes = lanes
        .into_iter()
        .map(|(status, groups)| {
            let manual = order.lane(status);
            let groups: Vec<BoardGroup<'a>> = groups
                .into_iter()
                .map(|(project, mut tasks)| {
                    if !manual.is_empty() {
                        tasks.sort_by_key(|t| {
                            t.id.as_ref()
                                .and_then(|id| manual.iter().position(|m| m == id))
                                .unwrap_or(usize::MAX)
                        });
                    }
                    BoardGroup { project, tasks }
                })
                .collect();
            let count = groups.iter().map(|g| g.tasks.len()).sum();
            BoardLane {
                status,
                count,
                groups,
            }
        })
        .collect();

    BoardView { lanes }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn task(id: &str, status: TaskStatus, project: Option<u64>) -> Task {
        let mut t = Task::new(Some(TaskId::server(id)), format!("Task {}", id), ProjectId(0));
        t.status = status;
        t.project_id = project.map(ProjectId);
        t
    }

    fn lane_ids(view: &BoardView<'_>, status: TaskStatus) -> Vec<Vec<String>> {
        view.lane(status)
            .groups
            .iter()
            .map(|g| {
                g.tasks
                    .iter()
                    .map(|t| t.id.as_ref().unwrap().to_string())
                    .collect()
            })
            .collect()
    }

    #[test]
    fn every_lane_present_even_when_empty() {
        let tasks: Vec<Task> = Vec::new();
        let view = project_board(&tasks, &ManualOrder::default());
        let statuses: Vec<_> = view.lanes.iter().map(|l| l.status).collect();
        assert_eq!(statuses, TaskStatus::ALL.to_vec());
        assert_eq!(view.total(), 0);
    }

    #[test]
    fn groups_by_status_then_project_in_first_seen_order() {
        let tasks = vec![
            task("1", TaskStatus::Todo, Some(7)),
            task("2", TaskStatus::Done, Some(7)),
            task("3", TaskStatus::Todo, Some(4)),
            task("4", TaskStatus::Todo, None),
            task("5", TaskStatus::Todo, Some(7)),
        ];
        let view = project_board(&tasks, &ManualOrder::default());

        let todo = view.lane(TaskStatus::Todo);
        let buckets: Vec<_> = todo.groups.iter().map(|g| g.project).collect();
        assert_eq!(
            buckets,
            vec![
                ProjectBucket::Project(ProjectId(7)),
                ProjectBucket::Project(ProjectId(4)),
                ProjectBucket::Unassigned
            ]
        );
        assert_eq!(todo.count, 4);
        assert_eq!(
            lane_ids(&view, TaskStatus::Todo),
            vec![vec!["1", "5"], vec!["3"], vec!["4"]]
        );
        assert_eq!(lane_ids(&view, TaskStatus::Done), vec![vec!["2"]]);
        assert!(view.lane(TaskStatus::InProgress).groups.is_empty());
    }

    #[test]
    fn manual_order_puts_listed_ids_first() {
        let tasks = vec![
            task("1", TaskStatus::Todo, Some(7)),
            task("2", TaskStatus::Todo, Some(7)),
            task("3", TaskStatus::Todo, Some(7)),
            task("4", TaskStatus::Todo, Some(7)),
        ];
        let mut order = ManualOrder::default();
        order.place(&TaskId::server("3"), TaskStatus::Todo, None);
        order.place(&TaskId::server("1"), TaskStatus::Todo, None);

        let view = project_board(&tasks, &order);
        assert_eq!(
            lane_ids(&view, TaskStatus::Todo),
            vec![vec!["3", "1", "2", "4"]]
        );
    }

    #[test]
    fn place_moves_between_lanes() {
        let mut order = ManualOrder::default();
        let id = TaskId::server("1");
        order.place(&TaskId::server("2"), TaskStatus::Todo, None);
        order.place(&id, TaskStatus::Todo, Some(0));
        assert_eq!(order.lane(TaskStatus::Todo), &[id.clone(), TaskId::server("2")]);

        order.place(&id, TaskStatus::Done, Some(5));
        assert_eq!(order.lane(TaskStatus::Todo), &[TaskId::server("2")]);
        assert_eq!(order.lane(TaskStatus::Done), &[id]);
    }

    #[test]
    fn rename_follows_confirmed_id() {
        let mut order = ManualOrder::default();
        order.place(&TaskId::Placeholder(1), TaskStatus::Todo, None);
        order.rename(&TaskId::Placeholder(1), &TaskId::server("31"));
        assert_eq!(order.lane(TaskStatus::Todo), &[TaskId::server("31")]);
    }

    #[test]
    fn manual_order_serializes_with_status_keys() {
        let mut order = ManualOrder::default();
        order.place(&TaskId::server("3"), TaskStatus::InProgress, None);
        let json = serde_json::to_string(&order).unwrap();
        assert_eq!(json, r#"{"lanes":{"in-progress":["3"]}}"#);
        let back: ManualOrder = serde_json::from_str(&json).unwrap();
        assert_eq!(back, order);
    }
}
