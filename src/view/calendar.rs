use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate};
use serde::Serialize;

use crate::model::task::Task;
use crate::parse::dates::{DateSpan, ProjectionInputError, task_span};

/// A calendar month
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Month {
    pub year: i32,
    pub month: u32,
}

impl Month {
    pub fn new(year: i32, month: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, 1).map(|_| Month { year, month })
    }

    pub fn of(date: NaiveDate) -> Self {
        Month {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn first_day(&self) -> NaiveDate {
        NaiveDate::from_ymd_opt(self.year, self.month, 1).unwrap_or_default()
    }

    pub fn last_day(&self) -> NaiveDate {
        let first = self.first_day();
        first
            .checked_add_months(chrono::Months::new(1))
            .and_then(|next| next.pred_opt())
            .unwrap_or(first)
    }

    /// Every day of the month, in order
    pub fn days(&self) -> impl Iterator<Item = NaiveDate> + use<> {
        let last = self.last_day();
        self.first_day().iter_days().take_while(move |d| *d <= last)
    }

    pub fn span(&self) -> DateSpan {
        DateSpan {
            start: self.first_day(),
            end: self.last_day(),
        }
    }
}

impl fmt::Display for Month {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for Month {
    type Err = String;

    /// `YYYY-MM`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = || format!("invalid month '{}' (expected YYYY-MM)", s);
        let (y, m) = s.trim().split_once('-').ok_or_else(bad)?;
        let year = y.parse().map_err(|_| bad())?;
        let month = m.parse().map_err(|_| bad())?;
        Month::new(year, month).ok_or_else(bad)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CalendarCell<'a> {
    pub date: NaiveDate,
    pub tasks: Vec<&'a Task>,
}

/// One month of day cells, plus the tasks that could not be placed
#[derive(Debug, Clone, Serialize)]
pub struct CalendarMonth<'a> {
    pub month: Month,
    pub days: Vec<CalendarCell<'a>>,
    pub skipped: Vec<ProjectionInputError>,
}

impl<'a> CalendarMonth<'a> {
    pub fn day(&self, date: NaiveDate) -> Option<&CalendarCell<'a>> {
        self.days.iter().find(|c| c.date == date)
    }
}

/// Place every task on each day its `[start, end]` span covers within `month`.
///
/// Undated tasks are left out silently; tasks with bad dates are left out and
/// reported in `skipped`.
pub fn project_month<'a, I>(tasks: I, month: Month) -> CalendarMonth<'a>
where
    I: IntoIterator<Item = &'a Task>,
{
    let mut days: Vec<CalendarCell<'a>> = month
        .days()
        .map(|date| CalendarCell {
            date,
            tasks: Vec::new(),
        })
        .collect();
    let mut skipped = Vec::new();
    let visible = month.span();

    for task in tasks {
        let span = match task_span(task) {
            Ok(Some(span)) => span,
            Ok(None) => continue,
            Err(e) => {
                tracing::debug!(error = %e, "task left off the calendar");
                skipped.push(e);
                continue;
            }
        };
        if !span.overlaps(&visible) {
            continue;
        }
        for cell in days.iter_mut().filter(|c| span.contains(c.date)) {
            cell.tasks.push(task);
        }
    }

    CalendarMonth {
        month,
        days,
        skipped,
    }
}
