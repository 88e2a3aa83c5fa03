use std::ops::Range;

use regex::Regex;

use crate::model::task::{Priority, Task, TaskStatus};

/// Which field of a task matched a pattern
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchField {
    Id,
    Title,
    Description,
    Tag,
}

/// A pattern hit within one field of a task
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldMatch {
    pub field: MatchField,
    pub spans: Vec<Range<usize>>,
}

/// Client-side filter over a task collection. Empty criteria match everything.
///
/// All populated criteria must hold. Within `statuses`, `priorities` and
/// `tags`, any one listed value is enough.
#[derive(Debug, Clone, Default)]
pub struct FilterCriteria {
    /// Case-insensitive substring over title and description
    pub query: Option<String>,
    /// Regex over id, title, description and tags
    pub pattern: Option<Regex>,
    pub statuses: Vec<TaskStatus>,
    pub priorities: Vec<Priority>,
    pub tags: Vec<String>,
    pub assignee: Option<String>,
}

impl FilterCriteria {
    pub fn is_empty(&self) -> bool {
        self.query.as_deref().is_none_or(|q| q.trim().is_empty())
            && self.pattern.is_none()
            && self.statuses.is_empty()
            && self.priorities.is_empty()
            && self.tags.is_empty()
            && self.assignee.is_none()
    }

    pub fn matches(&self, task: &Task) -> bool {
        if let Some(q) = &self.query {
            let q = q.trim().to_lowercase();
            if !q.is_empty() {
                let in_title = task.title.to_lowercase().contains(&q);
                let in_description = task
                    .description
                    .as_deref()
                    .is_some_and(|d| d.to_lowercase().contains(&q));
                if !in_title && !in_description {
                    return false;
                }
            }
        }
        if let Some(re) = &self.pattern
            && pattern_matches(re, task).is_empty()
        {
            return false;
        }
        if !self.statuses.is_empty() && !self.statuses.contains(&task.status) {
            return false;
        }
        if !self.priorities.is_empty()
            && !task.priority.is_some_and(|p| self.priorities.contains(&p))
        {
            return false;
        }
        if !self.tags.is_empty() && !self.tags.iter().any(|t| task.has_tag(t)) {
            return false;
        }
        if let Some(who) = &self.assignee
            && task.assigned_to.as_deref() != Some(who.as_str())
        {
            return false;
        }
        true
    }

    /// Tasks that pass, in collection order
    pub fn apply<'a, I>(&self, tasks: I) -> Vec<&'a Task>
    where
        I: IntoIterator<Item = &'a Task>,
    {
        tasks.into_iter().filter(|t| self.matches(t)).collect()
    }
}

/// Collect all non-overlapping match byte-ranges for a regex in the given text.
fn find_matches(re: &Regex, text: &str) -> Vec<Range<usize>> {
    re.find_iter(text).map(|m| m.start()..m.end()).collect()
}

/// Every field of `task` the pattern hits, with byte spans for highlighting.
pub fn pattern_matches(re: &Regex, task: &Task) -> Vec<FieldMatch> {
    let mut hits = Vec::new();
    let mut check = |field: MatchField, text: &str| {
        let spans = find_matches(re, text);
        if !spans.is_empty() {
            hits.push(FieldMatch { field, spans });
        }
    };

    if let Some(id) = &task.id {
        check(MatchField::Id, &id.to_string());
    }
    check(MatchField::Title, &task.title);
    if let Some(description) = &task.description {
        check(MatchField::Description, description);
    }
    for tag in &task.tags {
        check(MatchField::Tag, tag);
    }
    hits
}
