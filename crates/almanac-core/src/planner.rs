use std::collections::BTreeMap;

use anyhow::{Context, anyhow};
use chrono::NaiveDate;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info, instrument};

use crate::datekey::DateKey;
use crate::stats::Stats;
use crate::storage::KeyValueStore;
use crate::task::Task;

pub const TASKS_KEY: &str = "tasks";
pub const NOTES_KEY: &str = "notes";
pub const DARK_MODE_KEY: &str = "darkMode";

pub type TasksByDate = BTreeMap<DateKey, Vec<Task>>;
pub type NotesByDate = BTreeMap<DateKey, String>;

/// Tasks and notes filed by day, plus the theme flag, kept in step with the
/// backing store. Every successful mutation rewrites the affected storage key
/// from the in-memory value; a rejected mutation touches neither.
#[derive(Debug)]
pub struct Planner<S: KeyValueStore> {
    store: S,
    tasks: TasksByDate,
    notes: NotesByDate,
    dark: bool,
}

impl<S: KeyValueStore> Planner<S> {
    #[instrument(skip(store))]
    pub fn load(store: S) -> anyhow::Result<Self> {
        let tasks: TasksByDate = load_json(&store, TASKS_KEY)?;
        let notes: NotesByDate = load_json(&store, NOTES_KEY)?;
        let dark = store
            .get_item(DARK_MODE_KEY)?
            .map(|raw| raw.trim() == "true")
            .unwrap_or(false);

        info!(
            task_days = tasks.len(),
            note_days = notes.len(),
            dark,
            "hydrated planner"
        );

        Ok(Self {
            store,
            tasks,
            notes,
            dark,
        })
    }

    pub fn tasks_for(&self, date: NaiveDate) -> &[Task] {
        self.tasks
            .get(&DateKey::from_date(date))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn has_tasks(&self, date: NaiveDate) -> bool {
        !self.tasks_for(date).is_empty()
    }

    /// Appends a task to `date` and returns its 1-based position.
    #[instrument(skip(self, text, time), fields(day = %DateKey::from_date(date)))]
    pub fn add_task(
        &mut self,
        date: NaiveDate,
        text: &str,
        time: Option<&str>,
    ) -> anyhow::Result<usize> {
        let task = Task::new(text, time)?;
        let key = DateKey::from_date(date);

        let mut next = self.tasks.clone();
        let day = next.entry(key).or_default();
        day.push(task);
        let position = day.len();

        self.commit_tasks(next)?;
        debug!(position, "task added");
        Ok(position)
    }

    #[instrument(skip(self), fields(day = %DateKey::from_date(date)))]
    pub fn toggle_task(&mut self, date: NaiveDate, index: usize) -> anyhow::Result<bool> {
        let key = DateKey::from_date(date);
        let mut next = self.tasks.clone();
        let task = next
            .get_mut(&key)
            .and_then(|day| day.get_mut(index))
            .ok_or_else(|| missing_task(key, index))?;
        task.toggle();
        let completed = task.completed;

        self.commit_tasks(next)?;
        debug!(completed, "task toggled");
        Ok(completed)
    }

    #[instrument(skip(self), fields(day = %DateKey::from_date(date)))]
    pub fn delete_task(&mut self, date: NaiveDate, index: usize) -> anyhow::Result<Task> {
        let key = DateKey::from_date(date);
        let mut next = self.tasks.clone();
        let day = next
            .get_mut(&key)
            .filter(|day| index < day.len())
            .ok_or_else(|| missing_task(key, index))?;
        let removed = day.remove(index);
        if day.is_empty() {
            next.remove(&key);
            debug!("last task removed; dropped day");
        }

        self.commit_tasks(next)?;
        Ok(removed)
    }

    pub fn note_for(&self, date: NaiveDate) -> Option<&str> {
        self.notes
            .get(&DateKey::from_date(date))
            .map(String::as_str)
    }

    #[instrument(skip(self, text), fields(day = %DateKey::from_date(date)))]
    pub fn save_note(&mut self, date: NaiveDate, text: &str) -> anyhow::Result<()> {
        let mut next = self.notes.clone();
        next.insert(DateKey::from_date(date), text.to_string());

        save_json(&mut self.store, NOTES_KEY, &next)?;
        self.notes = next;
        info!(note_days = self.notes.len(), "saved note");
        Ok(())
    }

    pub fn dark_mode(&self) -> bool {
        self.dark
    }

    #[instrument(skip(self))]
    pub fn set_dark_mode(&mut self, dark: bool) -> anyhow::Result<()> {
        self.store
            .set_item(DARK_MODE_KEY, if dark { "true" } else { "false" })
            .with_context(|| format!("failed to save {DARK_MODE_KEY}"))?;
        self.dark = dark;
        info!(dark, "saved theme");
        Ok(())
    }

    pub fn toggle_theme(&mut self) -> anyhow::Result<bool> {
        let dark = !self.dark;
        self.set_dark_mode(dark)?;
        Ok(dark)
    }

    pub fn stats(&self) -> Stats {
        Stats::collect(self.tasks.values().flatten())
    }

    pub fn tasks(&self) -> &TasksByDate {
        &self.tasks
    }

    pub fn notes(&self) -> &NotesByDate {
        &self.notes
    }

    pub fn task_days(&self) -> impl Iterator<Item = DateKey> + '_ {
        self.tasks.keys().copied()
    }

    pub fn note_days(&self) -> impl Iterator<Item = DateKey> + '_ {
        self.notes.keys().copied()
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    fn commit_tasks(&mut self, next: TasksByDate) -> anyhow::Result<()> {
        save_json(&mut self.store, TASKS_KEY, &next)?;
        self.tasks = next;
        info!(task_days = self.tasks.len(), "saved tasks");
        Ok(())
    }
}

fn missing_task(key: DateKey, index: usize) -> anyhow::Error {
    anyhow!("no task {} on {key}", index + 1)
}

fn load_json<S, T>(store: &S, key: &str) -> anyhow::Result<T>
where
    S: KeyValueStore,
    T: DeserializeOwned + Default,
{
    let Some(raw) = store.get_item(key)? else {
        debug!(key, "nothing stored; starting empty");
        return Ok(T::default());
    };
    if raw.trim().is_empty() || raw.trim() == "null" {
        return Ok(T::default());
    }

    serde_json::from_str(&raw).with_context(|| format!("failed parsing stored {key}"))
}

fn save_json<S, T>(store: &mut S, key: &str, value: &T) -> anyhow::Result<()>
where
    S: KeyValueStore,
    T: Serialize,
{
    let serialized = serde_json::to_string(value)?;
    store
        .set_item(key, &serialized)
        .with_context(|| format!("failed to save {key}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    fn planner() -> Planner<MemoryStore> {
        Planner::load(MemoryStore::new()).expect("load planner")
    }

    fn stored(planner: &Planner<MemoryStore>, key: &str) -> Option<String> {
        planner.store().get_item(key).expect("get item")
    }

    #[test]
    fn empty_store_hydrates_empty() {
        let planner = planner();
        assert!(planner.tasks().is_empty());
        assert!(planner.notes().is_empty());
        assert!(!planner.dark_mode());
        assert_eq!(planner.stats(), Stats::default());
    }

    #[test]
    fn add_persists_under_canonical_key() {
        let mut planner = planner();
        let date = day(2026, 3, 7);

        let pos = planner
            .add_task(date, "  buy milk ", Some("09:30"))
            .expect("add");
        assert_eq!(pos, 1);
        assert_eq!(planner.tasks_for(date)[0].text, "buy milk");
        assert_eq!(
            stored(&planner, TASKS_KEY).as_deref(),
            Some(r#"{"2026-03-07":[{"text":"buy milk","time":"09:30","completed":false}]}"#)
        );
    }

    #[test]
    fn blank_task_changes_nothing() {
        let mut planner = planner();
        assert!(planner.add_task(day(2026, 3, 7), "   ", None).is_err());
        assert!(planner.tasks().is_empty());
        assert_eq!(stored(&planner, TASKS_KEY), None);
    }

    #[test]
    fn tasks_keep_insertion_order() {
        let mut planner = planner();
        let date = day(2026, 3, 7);
        planner.add_task(date, "first", None).expect("add");
        planner.add_task(date, "second", Some("08:00")).expect("add");
        let texts: Vec<_> = planner
            .tasks_for(date)
            .iter()
            .map(|task| task.text.as_str())
            .collect();
        assert_eq!(texts, vec!["first", "second"]);
    }

    #[test]
    fn toggle_flips_and_counts() {
        let mut planner = planner();
        let date = day(2026, 3, 7);
        planner.add_task(date, "a", None).expect("add");
        planner.add_task(date, "b", None).expect("add");

        assert!(planner.toggle_task(date, 1).expect("toggle"));
        let stats = planner.stats();
        assert_eq!((stats.total, stats.completed, stats.pending), (2, 1, 1));

        assert!(!planner.toggle_task(date, 1).expect("toggle back"));
        assert_eq!(planner.stats().completed, 0);
    }

    #[test]
    fn out_of_range_index_is_an_error() {
        let mut planner = planner();
        let date = day(2026, 3, 7);
        assert!(planner.toggle_task(date, 0).is_err());
        planner.add_task(date, "a", None).expect("add");
        assert!(planner.toggle_task(date, 1).is_err());
        assert!(planner.delete_task(date, 5).is_err());
        assert_eq!(planner.tasks_for(date).len(), 1);
    }

    #[test]
    fn deleting_last_task_drops_the_day() {
        let mut planner = planner();
        let date = day(2026, 3, 7);
        planner.add_task(date, "only", None).expect("add");

        let removed = planner.delete_task(date, 0).expect("delete");
        assert_eq!(removed.text, "only");
        assert!(!planner.has_tasks(date));
        assert_eq!(planner.task_days().count(), 0);
        assert_eq!(stored(&planner, TASKS_KEY).as_deref(), Some("{}"));
    }

    #[test]
    fn notes_overwrite() {
        let mut planner = planner();
        let date = day(2026, 3, 7);
        planner.save_note(date, "first draft").expect("save");
        planner.save_note(date, "final").expect("save");
        assert_eq!(planner.note_for(date), Some("final"));
        assert_eq!(planner.note_for(day(2026, 3, 8)), None);
        assert_eq!(
            stored(&planner, NOTES_KEY).as_deref(),
            Some(r#"{"2026-03-07":"final"}"#)
        );
    }

    #[test]
    fn theme_round_trips_through_store() {
        let mut planner = planner();
        assert!(planner.toggle_theme().expect("toggle"));
        assert_eq!(stored(&planner, DARK_MODE_KEY).as_deref(), Some("true"));

        let reloaded = Planner::load(planner.store().clone()).expect("reload");
        assert!(reloaded.dark_mode());
    }

    /// Reads from a seeded map; every write fails.
    #[derive(Debug)]
    struct ReadOnlyStore(MemoryStore);

    impl KeyValueStore for ReadOnlyStore {
        fn get_item(&self, key: &str) -> anyhow::Result<Option<String>> {
            self.0.get_item(key)
        }

        fn set_item(&mut self, key: &str, _value: &str) -> anyhow::Result<()> {
            Err(anyhow!("disk full writing {key}"))
        }

        fn remove_item(&mut self, key: &str) -> anyhow::Result<()> {
            Err(anyhow!("disk full removing {key}"))
        }
    }

    #[test]
    fn failed_write_leaves_memory_untouched() {
        let date = day(2026, 10, 16);
        let mut seeded = planner();
        seeded.add_task(date, "gym", None).expect("add");
        seeded.save_note(date, "rest day").expect("note");

        let mut planner =
            Planner::load(ReadOnlyStore(seeded.store().clone())).expect("load read-only");
        let tasks = planner.tasks().clone();
        let notes = planner.notes().clone();

        let err = planner.add_task(date, "swim", None).expect_err("add");
        assert!(format!("{err:#}").contains("disk full"));
        assert!(planner.toggle_task(date, 0).is_err());
        assert!(planner.delete_task(date, 0).is_err());
        assert!(planner.save_note(date, "changed").is_err());
        assert!(planner.toggle_theme().is_err());
        assert!(planner.set_dark_mode(true).is_err());

        assert_eq!(planner.tasks(), &tasks);
        assert_eq!(planner.notes(), &notes);
        assert!(!planner.dark_mode());
        assert_eq!(planner.note_for(date), Some("rest day"));
        assert!(!planner.tasks_for(date)[0].completed);
    }

    #[test]
    fn corrupt_tasks_value_is_reported() {
        let mut store = MemoryStore::new();
        store.set_item(TASKS_KEY, "{not json").expect("seed");
        let err = Planner::load(store).expect_err("corrupt store");
        assert!(format!("{err:#}").contains("stored tasks"));
    }

    #[test]
    fn reads_widget_store() {
        let mut store = MemoryStore::new();
        store
            .set_item(
                TASKS_KEY,
                r#"{"2026-10-16":[{"text":"gym","time":"","completed":true},{"text":"read","time":"21:00","completed":false}]}"#,
            )
            .expect("seed");
        store.set_item(DARK_MODE_KEY, "true").expect("seed");

        let planner = Planner::load(store).expect("load");
        let date = day(2026, 10, 16);
        assert_eq!(planner.tasks_for(date).len(), 2);
        assert_eq!(planner.tasks_for(date)[0].time, None);
        assert_eq!(planner.stats().motivation(), crate::stats::Motivation::Halfway);
        assert!(planner.dark_mode());
    }
}
