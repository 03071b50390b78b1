use chrono::NaiveDate;
use serde::Serialize;
use uuid::Uuid;

use crate::datetime::{DaysLeft, days_until};
use crate::store::TaskStore;
use crate::task::Task;

/// One row of the deadline-sorted sidebar list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListEntry {
    pub id: Uuid,
    /// Position in the unsorted store; edits and deletes address this.
    pub original_index: usize,
    pub name: String,
    pub date: String,
    pub color: String,
    pub completed: bool,
    /// `None` when the stored date cannot be read.
    pub days_left: Option<DaysLeft>,
    pub overdue_highlight: bool,
}

impl ListEntry {
    fn from_task(task: &Task, original_index: usize, today: NaiveDate) -> Self {
        let days_left = task.due_date().map(|due| days_until(today, due));
        let overdue = days_left.is_some_and(|d| d.is_overdue());
        Self {
            id: task.id,
            original_index,
            name: task.name.clone(),
            date: task.date.clone(),
            color: task.color.clone(),
            completed: task.completed,
            days_left,
            overdue_highlight: overdue && !task.completed,
        }
    }

    pub fn deadline_text(&self) -> String {
        self.days_left
            .map(|d| d.to_string())
            .unwrap_or_else(|| "invalid date".to_string())
    }
}

/// Projects the store into ascending due-date order.
///
/// Ties keep insertion order. Tasks with an unreadable date stay at their
/// own positions and the dated tasks are sorted into the remaining slots, so
/// an undated record never pulls a dated one out of order.
#[tracing::instrument(skip(store), fields(count = store.len()))]
pub fn build_list(store: &TaskStore, today: NaiveDate) -> Vec<ListEntry> {
    let tasks = store.tasks();
    let dues: Vec<Option<NaiveDate>> = tasks.iter().map(Task::due_date).collect();

    let slots: Vec<usize> = (0..tasks.len()).filter(|&i| dues[i].is_some()).collect();
    let mut by_date = slots.clone();
    by_date.sort_by_key(|&i| dues[i]);

    let mut order: Vec<usize> = (0..tasks.len()).collect();
    for (slot, index) in slots.into_iter().zip(by_date) {
        order[slot] = index;
    }

    order
        .into_iter()
        .map(|index| ListEntry::from_task(&tasks[index], index, today))
        .collect()
}
