use std::cell::{Cell, RefCell};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use serde::Serialize;
use serde_json::Value;
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::navigation::NavigationState;
use crate::task::Task;

/// Where the task store comes from at startup and where it goes after every
/// mutation. The core never touches storage except through this.
pub trait TaskPersistence {
    fn load_tasks(&self) -> anyhow::Result<Vec<Task>>;

    fn save_tasks(&self, tasks: &[Task]) -> anyhow::Result<()>;

    fn load_navigation(&self) -> anyhow::Result<Option<NavigationState>> {
        Ok(None)
    }

    fn save_navigation(&self, _nav: &NavigationState) -> anyhow::Result<()> {
        Ok(())
    }
}

#[derive(Debug)]
pub struct DataStore {
    pub data_dir: PathBuf,
    pub tasks_path: PathBuf,
    pub view_path: PathBuf,
}

impl DataStore {
    #[tracing::instrument(skip(data_dir))]
    pub fn open(data_dir: &Path) -> anyhow::Result<Self> {
        let data_dir = data_dir.to_path_buf();
        fs::create_dir_all(&data_dir)
            .with_context(|| format!("failed to create {}", data_dir.display()))?;

        let tasks_path = data_dir.join("tasks.json");
        let view_path = data_dir.join("view.json");

        if !tasks_path.exists() {
            fs::write(&tasks_path, "[]\n")?;
        }

        info!(
            data_dir = %data_dir.display(),
            tasks = %tasks_path.display(),
            view = %view_path.display(),
            "opened datastore"
        );

        Ok(Self {
            data_dir,
            tasks_path,
            view_path,
        })
    }
}

impl TaskPersistence for DataStore {
    #[tracing::instrument(skip(self))]
    fn load_tasks(&self) -> anyhow::Result<Vec<Task>> {
        let (tasks, missing_ids) =
            load_json_array(&self.tasks_path).context("failed to load tasks.json")?;
        if missing_ids > 0 {
            info!(missing_ids, "assigned ids to legacy records; rewriting tasks.json");
            self.save_tasks(&tasks)?;
        }
        Ok(tasks)
    }

    #[tracing::instrument(skip(self, tasks))]
    fn save_tasks(&self, tasks: &[Task]) -> anyhow::Result<()> {
        save_json_atomic(&self.tasks_path, tasks).context("failed to save tasks.json")
    }

    #[tracing::instrument(skip(self))]
    fn load_navigation(&self) -> anyhow::Result<Option<NavigationState>> {
        if !self.view_path.exists() {
            return Ok(None);
        }
        let raw = fs::read_to_string(&self.view_path)
            .with_context(|| format!("failed reading {}", self.view_path.display()))?;
        if raw.trim().is_empty() {
            return Ok(None);
        }
        let nav = serde_json::from_str(&raw)
            .with_context(|| format!("failed parsing {}", self.view_path.display()))?;
        Ok(Some(nav))
    }

    #[tracing::instrument(skip(self))]
    fn save_navigation(&self, nav: &NavigationState) -> anyhow::Result<()> {
        save_json_atomic(&self.view_path, nav).context("failed to save view.json")
    }
}

/// In-process persistence for embedders and tests.
#[derive(Debug, Default)]
pub struct MemoryPersistence {
    tasks: RefCell<Vec<Task>>,
    navigation: Cell<Option<NavigationState>>,
    saves: Cell<usize>,
}

impl MemoryPersistence {
    pub fn with_tasks(tasks: Vec<Task>) -> Self {
        Self {
            tasks: RefCell::new(tasks),
            ..Self::default()
        }
    }

    /// How many times the task store has been written.
    pub fn save_count(&self) -> usize {
        self.saves.get()
    }
}

impl TaskPersistence for MemoryPersistence {
    fn load_tasks(&self) -> anyhow::Result<Vec<Task>> {
        Ok(self.tasks.borrow().clone())
    }

    fn save_tasks(&self, tasks: &[Task]) -> anyhow::Result<()> {
        *self.tasks.borrow_mut() = tasks.to_vec();
        self.saves.set(self.saves.get() + 1);
        Ok(())
    }

    fn load_navigation(&self) -> anyhow::Result<Option<NavigationState>> {
        Ok(self.navigation.get())
    }

    fn save_navigation(&self, nav: &NavigationState) -> anyhow::Result<()> {
        self.navigation.set(Some(*nav));
        Ok(())
    }
}

/// Returns the tasks plus how many records had no `id` and were given one.
#[tracing::instrument(skip(path))]
fn load_json_array(path: &Path) -> anyhow::Result<(Vec<Task>, usize)> {
    debug!(file = %path.display(), "loading tasks");
    let raw = fs::read_to_string(path)?;
    if raw.trim().is_empty() {
        return Ok((vec![], 0));
    }

    let values: Vec<Value> = serde_json::from_str(&raw)
        .with_context(|| format!("failed parsing {}", path.display()))?;
    let missing_ids = values.iter().filter(|v| v.get("id").is_none()).count();

    let mut tasks = Vec::with_capacity(values.len());
    for (idx, value) in values.into_iter().enumerate() {
        let task: Task = serde_json::from_value(value)
            .with_context(|| format!("failed parsing {} record {}", path.display(), idx))?;
        tasks.push(task);
    }

    debug!(count = tasks.len(), missing_ids, "loaded tasks");
    Ok((tasks, missing_ids))
}

#[tracing::instrument(skip(path, value))]
fn save_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> anyhow::Result<()> {
    debug!(file = %path.display(), "saving json atomically");

    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut temp = NamedTempFile::new_in(dir)?;
    serde_json::to_writer_pretty(&mut temp, value)?;
    writeln!(temp)?;
    temp.flush()?;

    temp.persist(path)
        .map_err(|err| anyhow!("failed to persist {}: {}", path.display(), err))?;

    Ok(())
}
