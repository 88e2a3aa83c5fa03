//! Read-only projections of a task collection.
//!
//! Every projector takes anything that iterates `&Task` and borrows from it;
//! none of them touch the store or the remote.

pub mod board;
pub mod calendar;
pub mod delay;
pub mod gantt;
pub mod list;

pub use board::{BoardView, ManualOrder, ProjectBucket, project_board};
pub use calendar::{CalendarMonth, Month, project_month};
pub use delay::{Delay, DelayReference, delay_of, delayed_tasks};
pub use gantt::{DelayPalette, GanttChart, GanttOptions, GanttRange, project_gantt};
pub use list::{SortKey, SortSpec, project_list};
