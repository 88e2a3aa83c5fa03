use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::model::task::ProjectId;
use crate::view::board::ManualOrder;
use crate::view::list::SortSpec;

const STATE_FILE: &str = ".tb-state.json";

/// Search history cap
const MAX_HISTORY: usize = 50;

/// Persisted view state (written to .tb-state.json)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ViewState {
    /// Project the CLI works on when none is given
    #[serde(default)]
    pub project: Option<ProjectId>,
    /// Last list sort; `None` falls back to the config
    #[serde(default)]
    pub sort: Option<SortSpec>,
    /// Last search query
    #[serde(default)]
    pub last_search: Option<String>,
    /// Most recent first
    #[serde(default)]
    pub search_history: Vec<String>,
    /// Drag-and-drop lane order, per project
    #[serde(default)]
    pub lanes: Vec<(ProjectId, ManualOrder)>,
}

impl ViewState {
    pub fn order_for(&self, project: ProjectId) -> ManualOrder {
        self.lanes
            .iter()
            .find(|(p, _)| *p == project)
            .map(|(_, o)| o.clone())
            .unwrap_or_default()
    }

    pub fn set_order(&mut self, project: ProjectId, mut order: ManualOrder) {
        order.forget_placeholders();
        self.lanes.retain(|(p, _)| *p != project);
        if !order.is_empty() {
            self.lanes.push((project, order));
        }
    }

    pub fn record_search(&mut self, query: &str) {
        self.last_search = Some(query.to_string());
        self.search_history.retain(|q| q != query);
        self.search_history.insert(0, query.to_string());
        self.search_history.truncate(MAX_HISTORY);
    }
}

/// Read .tb-state.json from the board directory
pub fn read_view_state(root: &Path) -> Option<ViewState> {
    let path = root.join(STATE_FILE);
    let content = fs::read_to_string(&path).ok()?;
    serde_json::from_str(&content).ok()
}

/// Write .tb-state.json to the board directory
pub fn write_view_state(root: &Path, state: &ViewState) -> Result<(), std::io::Error> {
    let content = serde_json::to_string_pretty(state)?;
    crate::io::atomic_write(&root.join(STATE_FILE), content.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::task::{TaskId, TaskStatus};
    use crate::view::list::SortKey;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn write_and_read_round_trip() {
        let dir = TempDir::new().unwrap();
        let mut order = ManualOrder::default();
        order.place(&TaskId::server("4"), TaskStatus::Done, None);

        let mut state = ViewState {
            project: Some(ProjectId(7)),
            sort: Some(SortSpec::new(SortKey::Title, true)),
            ..Default::default()
        };
        state.record_search("invoice");
        state.set_order(ProjectId(7), order.clone());

        write_view_state(dir.path(), &state).unwrap();
        let loaded = read_view_state(dir.path()).unwrap();

        assert_eq!(loaded, state);
        assert_eq!(loaded.order_for(ProjectId(7)), order);
        assert!(loaded.order_for(ProjectId(8)).is_empty());
    }

    #[test]
    fn read_missing_file_returns_none() {
        let dir = TempDir::new().unwrap();
        assert!(read_view_state(dir.path()).is_none());
    }

    #[test]
    fn read_malformed_json_returns_none() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(STATE_FILE), "not json {{{").unwrap();
        assert!(read_view_state(dir.path()).is_none());
    }

    #[test]
    fn serde_defaults_on_empty_object() {
        let state: ViewState = serde_json::from_str("{}").unwrap();
        assert_eq!(state, ViewState::default());
    }

    #[test]
    fn search_history_dedupes_most_recent_first() {
        let mut state = ViewState::default();
        state.record_search("a");
        state.record_search("b");
        state.record_search("a");
        assert_eq!(state.search_history, vec!["a", "b"]);
        assert_eq!(state.last_search.as_deref(), Some("a"));
    }

    #[test]
    fn saved_order_keeps_server_ids_and_drops_placeholders() {
        let dir = TempDir::new().unwrap();
        let mut order = ManualOrder::default();
        order.place(&TaskId::server("tmp-1"), TaskStatus::Todo, None);
        order.place(&TaskId::Placeholder(1), TaskStatus::Todo, None);

        let mut state = ViewState::default();
        state.set_order(ProjectId(7), order);
        write_view_state(dir.path(), &state).unwrap();
        let loaded = read_view_state(dir.path()).unwrap();

        assert_eq!(
            loaded.order_for(ProjectId(7)).lane(TaskStatus::Todo),
            &[TaskId::server("tmp-1")]
        );
    }

    #[test]
    fn empty_order_is_not_stored() {
        let mut state = ViewState::default();
        let mut order = ManualOrder::default();
        order.place(&TaskId::server("1"), TaskStatus::Todo, None);
        state.set_order(ProjectId(7), order);
        state.set_order(ProjectId(7), ManualOrder::default());
        assert!(state.lanes.is_empty());
    }
}
