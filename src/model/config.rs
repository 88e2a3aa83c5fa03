use serde::{Deserialize, Serialize};

use crate::ops::gateway::FailurePolicy;
use crate::view::gantt::DelayPalette;
use crate::view::list::SortKey;

/// Configuration from taskboard.toml
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BoardConfig {
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub gantt: GanttConfig,
    #[serde(default)]
    pub list: ListConfig,
    #[serde(default)]
    pub remote: RemoteConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// What a failed remote write does to the local view
    #[serde(default)]
    pub on_failure: FailurePolicy,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GanttConfig {
    /// Smallest bar width, as a fraction of the chart
    #[serde(default = "default_min_bar_width")]
    pub min_bar_width: f64,
    #[serde(default)]
    pub palette: DelayPalette,
    /// Widen a fitted range to whole calendar months
    #[serde(default)]
    pub whole_months: bool,
}

impl Default for GanttConfig {
    fn default() -> Self {
        GanttConfig {
            min_bar_width: default_min_bar_width(),
            palette: DelayPalette::default(),
            whole_months: false,
        }
    }
}

fn default_min_bar_width() -> f64 {
    0.01
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ListConfig {
    #[serde(default)]
    pub sort: SortKey,
    #[serde(default)]
    pub descending: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Backend data file, relative to the project directory
    #[serde(default = "default_remote_file")]
    pub file: String,
    /// Reject every write, to exercise the failure path
    #[serde(default)]
    pub fail_writes: bool,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        RemoteConfig {
            file: default_remote_file(),
            fail_writes: false,
        }
    }
}

fn default_remote_file() -> String {
    "tasks.json".to_string()
}
