//! List view: filtering and sorting over the store without mutating it.

use std::cmp::Ordering;

use taskboard_proto::task::{Task, TaskPriority, TaskStatus};

/// Presentation order of two titles: case-insensitive, then exact bytes.
///
/// Shared by the board columns and the list view's title sort.
#[must_use]
pub fn title_order(a: &str, b: &str) -> Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| a.cmp(b))
}

/// Column the list is sorted by.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum SortKey {
    /// Keep store order.
    #[default]
    None,
    Title,
    Priority,
    DueDate,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    #[must_use]
    pub const fn toggled(self) -> Self {
        match self {
            Self::Asc => Self::Desc,
            Self::Desc => Self::Asc,
        }
    }
}

/// Filter and sort settings of the list view. `None` filters match all.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListQuery {
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    pub sort: SortKey,
    pub order: SortOrder,
}

impl ListQuery {
    /// Flips the sort direction.
    pub const fn toggle_order(&mut self) {
        self.order = self.order.toggled();
    }

    /// Returns `true` if `task` passes both filters.
    #[must_use]
    pub fn matches(&self, task: &Task) -> bool {
        self.status.is_none_or(|s| task.status == s)
            && self.priority.is_none_or(|p| task.priority == p)
    }

    /// Filters and sorts `tasks`. The sort is stable, so equal keys keep
    /// store order.
    #[must_use]
    pub fn apply<'a>(&self, tasks: &'a [Task]) -> Vec<&'a Task> {
        let mut rows: Vec<&Task> = tasks.iter().filter(|t| self.matches(t)).collect();
        match self.sort {
            SortKey::None => {}
            SortKey::Title => rows.sort_by(|a, b| self.directed(title_order(&a.title, &b.title))),
            SortKey::Priority => rows.sort_by(|a, b| self.directed(a.priority.cmp(&b.priority))),
            SortKey::DueDate => rows.sort_by(|a, b| self.directed(due_order(a, b))),
        }
        rows
    }

    fn directed(&self, ordering: Ordering) -> Ordering {
        match self.order {
            SortOrder::Asc => ordering,
            SortOrder::Desc => ordering.reverse(),
        }
    }
}

/// Ascending due-date order: dated tasks first, earliest first; undated last.
fn due_order(a: &Task, b: &Task) -> Ordering {
    match (a.due_date, b.due_date) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
