use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use chrono::{DateTime, Utc};
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::filter::TaskFilter;
use crate::task::Task;

/// Owns the in-memory task list and its backing file. The list is read once
/// when the store opens and rewritten wholesale after every mutation, so the
/// file always mirrors the last successful snapshot.
#[derive(Debug)]
pub struct TaskStore {
    pub data_dir: PathBuf,
    pub tasks_path: PathBuf,
    tasks: Vec<Task>,
}

impl TaskStore {
    #[tracing::instrument(skip(data_dir))]
    pub fn open(data_dir: &Path) -> anyhow::Result<Self> {
        let data_dir = data_dir.to_path_buf();
        fs::create_dir_all(&data_dir)
            .with_context(|| format!("failed to create {}", data_dir.display()))?;

        let tasks_path = data_dir.join("tasks.json");
        let tasks = load_tasks(&tasks_path)?;

        info!(
            data_dir = %data_dir.display(),
            tasks = tasks.len(),
            "opened task store"
        );

        Ok(Self {
            data_dir,
            tasks_path,
            tasks,
        })
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn filtered(&self, filter: TaskFilter) -> Vec<&Task> {
        filter.apply(&self.tasks)
    }

    /// Appends a new pending task and persists. Returns the assigned id.
    #[tracing::instrument(skip(self, title, now))]
    pub fn add(&mut self, title: &str, now: DateTime<Utc>) -> anyhow::Result<u64> {
        let id = self.fresh_id(now);
        self.tasks.push(Task::new(id, title.to_string()));
        self.save()?;

        debug!(id, count = self.tasks.len(), "task added");
        Ok(id)
    }

    /// Retitles the task with the given id and persists. Returns false (and
    /// touches nothing) when the id is absent.
    #[tracing::instrument(skip(self, new_title))]
    pub fn edit(&mut self, id: u64, new_title: &str) -> anyhow::Result<bool> {
        let Some(task) = self.tasks.iter_mut().find(|task| task.id == id) else {
            debug!(id, "edit target not found");
            return Ok(false);
        };
        task.title = new_title.to_string();
        self.save()?;
        Ok(true)
    }

    /// Removes the task with the given id and persists. Returns false when
    /// the id is absent; the snapshot is rewritten either way.
    #[tracing::instrument(skip(self))]
    pub fn delete(&mut self, id: u64) -> anyhow::Result<bool> {
        let before = self.tasks.len();
        self.tasks.retain(|task| task.id != id);
        let removed = self.tasks.len() < before;
        self.save()?;

        debug!(id, removed, "delete applied");
        Ok(removed)
    }

    /// Flips the completion flag and persists. Returns the new flag value,
    /// or None when the id is absent.
    #[tracing::instrument(skip(self))]
    pub fn toggle(&mut self, id: u64) -> anyhow::Result<Option<bool>> {
        let Some(task) = self.tasks.iter_mut().find(|task| task.id == id) else {
            debug!(id, "toggle target not found");
            return Ok(None);
        };
        task.completed = !task.completed;
        let completed = task.completed;
        self.save()?;
        Ok(Some(completed))
    }

    /// Serializes the full list as one JSON array, atomically.
    #[tracing::instrument(skip(self))]
    pub fn save(&self) -> anyhow::Result<()> {
        save_tasks_atomic(&self.tasks_path, &self.tasks)
            .with_context(|| format!("failed to save {}", self.tasks_path.display()))
    }

    /// Ids are creation timestamps in Unix milliseconds. Two adds inside the
    /// same millisecond would collide, so a taken id bumps past the current
    /// maximum instead.
    fn fresh_id(&self, now: DateTime<Utc>) -> u64 {
        let candidate = now.timestamp_millis().max(0) as u64;
        if self.tasks.iter().any(|task| task.id == candidate) {
            let max = self.tasks.iter().map(|task| task.id).max().unwrap_or(0);
            max + 1
        } else {
            candidate
        }
    }
}

#[tracing::instrument(skip(path))]
fn load_tasks(path: &Path) -> anyhow::Result<Vec<Task>> {
    if !path.exists() {
        debug!(file = %path.display(), "no task file yet, starting empty");
        return Ok(vec![]);
    }

    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    if raw.trim().is_empty() {
        return Ok(vec![]);
    }

    let tasks: Vec<Task> = serde_json::from_str(raw.trim())
        .with_context(|| format!("failed parsing {}", path.display()))?;

    debug!(count = tasks.len(), "loaded tasks");
    Ok(tasks)
}

#[tracing::instrument(skip(path, tasks))]
fn save_tasks_atomic(path: &Path, tasks: &[Task]) -> anyhow::Result<()> {
    debug!(file = %path.display(), count = tasks.len(), "saving tasks atomically");

    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut temp = NamedTempFile::new_in(dir)?;
    let serialized = serde_json::to_string(tasks)?;
    temp.write_all(serialized.as_bytes())?;
    temp.flush()?;

    temp.persist(path)
        .map_err(|err| anyhow!("failed to persist {}: {}", path.display(), err))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use tempfile::tempdir;

    use super::TaskStore;
    use crate::filter::TaskFilter;

    #[test]
    fn adds_get_unique_ids_and_start_active() {
        let temp = tempdir().expect("tempdir");
        let mut store = TaskStore::open(temp.path()).expect("open store");

        // Same timestamp on purpose; ids must still be unique.
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap();
        let a = store.add("water plants", now).expect("add");
        let b = store.add("call plumber", now).expect("add");
        let c = store.add("file taxes", now).expect("add");

        assert_ne!(a, b);
        assert_ne!(b, c);
        assert_ne!(a, c);
        assert!(store.tasks().iter().all(|task| !task.completed));
    }

    #[test]
    fn toggle_twice_restores_original_flag() {
        let temp = tempdir().expect("tempdir");
        let mut store = TaskStore::open(temp.path()).expect("open store");
        let id = store.add("water plants", Utc::now()).expect("add");

        assert_eq!(store.toggle(id).expect("toggle"), Some(true));
        assert_eq!(store.toggle(id).expect("toggle"), Some(false));
        assert!(!store.tasks()[0].completed);
    }

    #[test]
    fn delete_removes_from_every_view() {
        let temp = tempdir().expect("tempdir");
        let mut store = TaskStore::open(temp.path()).expect("open store");
        let now = Utc::now();
        let keep = store.add("keep me", now).expect("add");
        let doomed = store.add("drop me", now).expect("add");

        assert!(store.delete(doomed).expect("delete"));
        let all = store.filtered(TaskFilter::All);
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].id, keep);
        assert!(all.iter().all(|task| task.id != doomed));
    }

    #[test]
    fn absent_ids_are_silent_noops() {
        let temp = tempdir().expect("tempdir");
        let mut store = TaskStore::open(temp.path()).expect("open store");
        store.add("only task", Utc::now()).expect("add");

        assert!(!store.edit(999, "new title").expect("edit"));
        assert!(!store.delete(999).expect("delete"));
        assert_eq!(store.toggle(999).expect("toggle"), None);
        assert_eq!(store.tasks().len(), 1);
        assert_eq!(store.tasks()[0].title, "only task");
    }

    #[test]
    fn reopen_reproduces_identical_sequence() {
        let temp = tempdir().expect("tempdir");
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap();

        let original = {
            let mut store = TaskStore::open(temp.path()).expect("open store");
            store.add("first", now).expect("add");
            let second = store.add("second", now).expect("add");
            store.toggle(second).expect("toggle");
            store.edit(second, "second, revised").expect("edit");
            store.tasks().to_vec()
        };

        let reopened = TaskStore::open(temp.path()).expect("reopen store");
        assert_eq!(reopened.tasks(), original.as_slice());
    }

    #[test]
    fn malformed_task_file_fails_loudly() {
        let temp = tempdir().expect("tempdir");
        std::fs::write(temp.path().join("tasks.json"), "{not json").expect("write");

        assert!(TaskStore::open(temp.path()).is_err());
    }

    #[test]
    fn missing_file_yields_empty_store() {
        let temp = tempdir().expect("tempdir");
        let store = TaskStore::open(temp.path()).expect("open store");
        assert!(store.tasks().is_empty());
    }
}
