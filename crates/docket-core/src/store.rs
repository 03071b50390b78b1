use chrono::NaiveDate;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::datetime::parse_date_input;
use crate::error::TrackerError;
use crate::task::{DEFAULT_COLOR, LegacyRecord, Task};

/// Insertion-ordered task collection. Position in this sequence is the
/// "original index" both views report back.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskStore {
    tasks: Vec<Task>,
}

impl TaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    #[tracing::instrument(skip(tasks), fields(count = tasks.len()))]
    pub fn from_tasks(tasks: Vec<Task>) -> Self {
        let store = Self { tasks };
        for err in store.invalid_records() {
            warn!(error = %err, "stored task kept with unreadable date");
        }
        store
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn get(&self, index: usize) -> Result<&Task, TrackerError> {
        self.tasks.get(index).ok_or(TrackerError::IndexOutOfRange {
            index,
            len: self.tasks.len(),
        })
    }

    pub fn index_of(&self, id: Uuid) -> Result<usize, TrackerError> {
        self.tasks
            .iter()
            .position(|t| t.id == id)
            .ok_or(TrackerError::TaskNotFound(id))
    }

    /// Records whose date cannot be read. They stay in the store but take no
    /// part in calendar matching or date ordering.
    pub fn invalid_records(&self) -> Vec<TrackerError> {
        self.tasks
            .iter()
            .enumerate()
            .filter(|(_, t)| t.due_date().is_none())
            .map(|(index, t)| TrackerError::InvalidDateOnRecord {
                index,
                raw: t.date.clone(),
            })
            .collect()
    }

    #[tracing::instrument(skip(self, today))]
    pub fn create(
        &mut self,
        name: &str,
        date_input: &str,
        color: &str,
        today: NaiveDate,
    ) -> Result<&Task, TrackerError> {
        let name = name.trim();
        if name.is_empty() || date_input.trim().is_empty() {
            return Err(TrackerError::invalid_input(
                "Please enter both task name and deadline date.",
            ));
        }
        let due = parse_date_input(date_input, today)?;
        let color = match color.trim() {
            "" => DEFAULT_COLOR.to_string(),
            other => other.to_string(),
        };

        let task = Task::new(name.to_string(), due, color);
        info!(id = %task.id, date = %task.date, "task created");
        self.tasks.push(task);
        let index = self.tasks.len() - 1;
        self.get(index)
    }

    /// Renames and recolors the task at `index`. A blank `new_color` keeps
    /// the current color; a blank `new_name` rejects the whole edit.
    #[tracing::instrument(skip(self))]
    pub fn edit(
        &mut self,
        index: usize,
        new_name: &str,
        new_color: Option<&str>,
    ) -> Result<&Task, TrackerError> {
        let len = self.tasks.len();
        let new_name = new_name.trim();
        if new_name.is_empty() {
            return Err(TrackerError::invalid_input("task name cannot be empty"));
        }

        let task = self
            .tasks
            .get_mut(index)
            .ok_or(TrackerError::IndexOutOfRange { index, len })?;
        task.name = new_name.to_string();
        if let Some(color) = new_color.map(str::trim).filter(|c| !c.is_empty()) {
            task.color = color.to_string();
        }
        debug!(id = %task.id, "task edited");
        Ok(task)
    }

    #[tracing::instrument(skip(self))]
    pub fn delete(&mut self, index: usize) -> Result<Task, TrackerError> {
        if index >= self.tasks.len() {
            return Err(TrackerError::IndexOutOfRange {
                index,
                len: self.tasks.len(),
            });
        }
        let removed = self.tasks.remove(index);
        info!(id = %removed.id, remaining = self.tasks.len(), "task deleted");
        Ok(removed)
    }

    #[tracing::instrument(skip(self))]
    pub fn toggle_completed(&mut self, index: usize) -> Result<&Task, TrackerError> {
        let len = self.tasks.len();
        let task = self
            .tasks
            .get_mut(index)
            .ok_or(TrackerError::IndexOutOfRange { index, len })?;
        task.completed = !task.completed;
        debug!(id = %task.id, completed = task.completed, "task toggled");
        Ok(task)
    }

    /// Appends legacy records, assigning fresh ids. Every record is checked
    /// before any is added.
    #[tracing::instrument(skip(self, records), fields(count = records.len()))]
    pub fn import(&mut self, records: Vec<LegacyRecord>) -> Result<usize, TrackerError> {
        if let Some(pos) = records.iter().position(|r| r.name.trim().is_empty()) {
            return Err(TrackerError::invalid_input(format!(
                "imported record {pos} has an empty name"
            )));
        }

        let start = self.tasks.len();
        self.tasks.extend(records.into_iter().map(Task::from));
        for (index, task) in self.tasks.iter().enumerate().skip(start) {
            if task.due_date().is_none() {
                warn!(index, raw = %task.date, "imported task has unreadable date");
            }
        }
        Ok(self.tasks.len() - start)
    }
}
