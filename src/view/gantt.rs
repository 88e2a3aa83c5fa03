use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::model::config::GanttConfig;
use crate::model::task::{Task, TaskStatus};
use crate::parse::dates::{DateSpan, ProjectionInputError, task_span};
use crate::view::delay::{Delay, delay_of};

/// Bar colouring scheme
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DelayPalette {
    /// Late todo bars are greyed out
    #[default]
    Exact,
    /// Status colours only
    Basic,
}

impl DelayPalette {
    pub fn color(self, status: TaskStatus, delayed: bool) -> &'static str {
        match self {
            DelayPalette::Exact => match status {
                TaskStatus::Todo if delayed => "#808080",
                TaskStatus::Todo => "#FF6347",
                TaskStatus::InProgress => "#FFD700",
                TaskStatus::Done => "#90EE90",
            },
            DelayPalette::Basic => match status {
                TaskStatus::Todo => "#dc3545",
                TaskStatus::InProgress => "#fd7e14",
                TaskStatus::Done => "#28a745",
            },
        }
    }
}

/// Visible date range of a chart, both ends included
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GanttRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl GanttRange {
    /// `None` when `end` is before `start`
    pub fn new(start: NaiveDate, end: NaiveDate) -> Option<Self> {
        (start <= end).then_some(GanttRange { start, end })
    }

    pub fn length_days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }

    /// Widen to the first day of the start month and the last day of the
    /// end month.
    pub fn whole_months(self) -> Self {
        let start = self.start.with_day(1).unwrap_or(self.start);
        let (year, month) = match self.end.month() {
            12 => (self.end.year() + 1, 1),
            m => (self.end.year(), m + 1),
        };
        let end = NaiveDate::from_ymd_opt(year, month, 1)
            .and_then(|d| d.pred_opt())
            .unwrap_or(self.end);
        GanttRange { start, end }
    }

    fn span(&self) -> DateSpan {
        DateSpan {
            start: self.start,
            end: self.end,
        }
    }

    /// Smallest range holding every dated task; `None` if no task has usable
    /// dates.
    pub fn fit<'a, I>(tasks: I) -> Option<Self>
    where
        I: IntoIterator<Item = &'a Task>,
    {
        tasks
            .into_iter()
            .filter_map(|t| task_span(t).ok().flatten())
            .fold(None, |acc: Option<GanttRange>, span| {
                Some(match acc {
                    None => GanttRange {
                        start: span.start,
                        end: span.end,
                    },
                    Some(r) => GanttRange {
                        start: r.start.min(span.start),
                        end: r.end.max(span.end),
                    },
                })
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GanttOptions {
    /// Floor for bar width, as a fraction of the chart
    pub min_bar_width: f64,
    pub palette: DelayPalette,
    pub today: NaiveDate,
}

impl GanttOptions {
    pub fn from_config(config: &GanttConfig, today: NaiveDate) -> Self {
        GanttOptions {
            min_bar_width: config.min_bar_width,
            palette: config.palette,
            today,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct GanttBar<'a> {
    pub task: &'a Task,
    pub span: DateSpan,
    /// Left edge, fraction of the chart in `[0, 1]`
    pub offset: f64,
    /// Fraction of the chart; `offset + width <= 1`
    pub width: f64,
    pub delay: Option<Delay>,
    pub color: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct GanttChart<'a> {
    pub range: GanttRange,
    pub bars: Vec<GanttBar<'a>>,
    pub skipped: Vec<ProjectionInputError>,
}

/// Lay out one bar per dated task that overlaps `range`.
///
/// Bars starting before the range are clipped to its left edge; bars running
/// past it are cut at the right edge. The width floor never pushes a bar past
/// the right edge.
pub fn project_gantt<'a, I>(tasks: I, range: GanttRange, options: &GanttOptions) -> GanttChart<'a>
where
    I: IntoIterator<Item = &'a Task>,
{
    let length = range.length_days() as f64;
    let visible = range.span();
    let mut bars = Vec::new();
    let mut skipped = Vec::new();

    for task in tasks {
        let span = match task_span(task) {
            Ok(Some(span)) => span,
            Ok(None) => continue,
            Err(e) => {
                tracing::debug!(error = %e, "task left off the gantt chart");
                skipped.push(e);
                continue;
            }
        };
        if !span.overlaps(&visible) {
            continue;
        }

        let start = span.start.max(range.start);
        let offset = ((start - range.start).num_days() as f64 / length).clamp(0.0, 1.0);
        let room = 1.0 - offset;
        let width = ((span.end - start).num_days() + 1) as f64 / length;
        let width = width.min(room).max(options.min_bar_width).min(room);

        let delay = delay_of(task, options.today).ok().flatten();
        let color = options.palette.color(task.status, delay.is_some());
        bars.push(GanttBar {
            task,
            span,
            offset,
            width,
            delay,
            color,
        });
    }

    GanttChart {
        range,
        bars,
        skipped,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::task::{ProjectId, TaskId};
    use pretty_assertions::assert_eq;

    const EPS: f64 = 1e-9;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn dated(id: &str, start: &str, end: &str) -> Task {
        let mut t = Task::new(Some(TaskId::server(id)), format!("Task {}", id), ProjectId(7));
        t.start_date = Some(start.into());
        t.end_date = Some(end.into());
        t
    }

    fn options() -> GanttOptions {
        GanttOptions {
            min_bar_width: 0.01,
            palette: DelayPalette::Exact,
            today: d(2024, 1, 1),
        }
    }

    fn january() -> GanttRange {
        GanttRange::new(d(2024, 1, 1), d(2024, 1, 30)).unwrap()
    }

    #[test]
    fn fitted_range_widens_to_whole_months() {
        let tasks = vec![dated("1", "2024-02-10", "2024-02-12"), dated("2", "2024-11-20", "2024-12-03")];
        let fitted = GanttRange::fit(&tasks).unwrap();
        assert_eq!(fitted, GanttRange::new(d(2024, 2, 10), d(2024, 12, 3)).unwrap());
        assert_eq!(
            fitted.whole_months(),
            GanttRange::new(d(2024, 2, 1), d(2024, 12, 31)).unwrap()
        );
        let leap = GanttRange::new(d(2024, 2, 29), d(2024, 2, 29)).unwrap();
        assert_eq!(leap.whole_months().length_days(), 29);
    }

    #[test]
    fn bar_past_right_edge_is_clamped() {
        let tasks = vec![dated("1", "2024-01-28", "2024-02-05")];
        let chart = project_gantt(&tasks, january(), &options());
        let bar = &chart.bars[0];
        assert!((bar.offset - 0.9).abs() < EPS);
        assert!((bar.width - 0.1).abs() < EPS);
        assert!(bar.offset + bar.width <= 1.0 + EPS);
    }

    #[test]
    fn bar_inside_range_matches_day_fractions() {
        let tasks = vec![dated("1", "2024-01-04", "2024-01-06")];
        let chart = project_gantt(&tasks, january(), &options());
        let bar = &chart.bars[0];
        assert!((bar.offset - 3.0 / 30.0).abs() < EPS);
        assert!((bar.width - 3.0 / 30.0).abs() < EPS);
    }

    #[test]
    fn bar_before_range_is_clipped_to_left_edge() {
        let tasks = vec![dated("1", "2023-12-20", "2024-01-02")];
        let chart = project_gantt(&tasks, january(), &options());
        let bar = &chart.bars[0];
        assert_eq!(bar.offset, 0.0);
        assert!((bar.width - 2.0 / 30.0).abs() < EPS);
    }

    #[test]
    fn minimum_width_floor_applies() {
        let range = GanttRange::new(d(2024, 1, 1), d(2024, 12, 31)).unwrap();
        let tasks = vec![dated("1", "2024-03-01", "2024-03-01")];
        let opts = GanttOptions {
            min_bar_width: 0.05,
            ..options()
        };
        let chart = project_gantt(&tasks, range, &opts);
        assert!((chart.bars[0].width - 0.05).abs() < EPS);
    }

    #[test]
    fn floor_does_not_push_past_right_edge() {
        let tasks = vec![dated("1", "2024-01-30", "2024-01-30")];
        let opts = GanttOptions {
            min_bar_width: 0.2,
            ..options()
        };
        let chart = project_gantt(&tasks, january(), &opts);
        let bar = &chart.bars[0];
        assert!(bar.offset + bar.width <= 1.0 + EPS);
    }

    #[test]
    fn tasks_outside_range_are_omitted_and_bad_dates_reported() {
        let tasks = vec![
            dated("1", "2024-02-01", "2024-02-03"),
            dated("2", "later", "2024-01-03"),
            Task::new(Some(TaskId::server("3")), "Undated", ProjectId(7)),
        ];
        let chart = project_gantt(&tasks, january(), &options());
        assert!(chart.bars.is_empty());
        assert_eq!(chart.skipped.len(), 1);
    }

    #[test]
    fn fit_spans_all_dated_tasks() {
        let tasks = vec![
            dated("1", "2024-01-10", "2024-01-12"),
            dated("2", "2024-01-03", "2024-01-05"),
            dated("3", "2024-01-20", "2024-02-02"),
            dated("4", "bad", "2024-03-01"),
        ];
        let range = GanttRange::fit(&tasks).unwrap();
        assert_eq!(range, GanttRange::new(d(2024, 1, 3), d(2024, 2, 2)).unwrap());
        assert_eq!(range.length_days(), 31);

        let none: Vec<Task> = Vec::new();
        assert_eq!(GanttRange::fit(&none), None);
    }

    #[test]
    fn palettes_colour_late_todo_differently() {
        let mut late = dated("1", "2023-12-01", "2024-01-10");
        late.status = TaskStatus::Todo;
        let tasks = vec![late];

        let exact = project_gantt(&tasks, january(), &options());
        assert_eq!(exact.bars[0].color, "#808080");
        assert_eq!(exact.bars[0].delay.map(|d| d.days), Some(31));

        let basic = project_gantt(
            &tasks,
            january(),
            &GanttOptions {
                palette: DelayPalette::Basic,
                ..options()
            },
        );
        assert_eq!(basic.bars[0].color, "#dc3545");
    }
}
