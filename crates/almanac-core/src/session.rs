use anyhow::anyhow;
use chrono::NaiveDate;
use tracing::{debug, instrument};

use crate::calendar::{CalendarView, MonthGrid, WeekStart};
use crate::planner::Planner;
use crate::stats::Stats;
use crate::storage::KeyValueStore;
use crate::task::Task;

/// The live state behind the calendar: which month is shown, which day is
/// selected, and the planner everything is filed in. Task and note operations
/// act on the selected day; task positions are 1-based.
#[derive(Debug)]
pub struct Session<S: KeyValueStore> {
    view: CalendarView,
    planner: Planner<S>,
}

impl<S: KeyValueStore> Session<S> {
    pub fn open(store: S, selected: NaiveDate) -> anyhow::Result<Self> {
        Ok(Self::with_planner(Planner::load(store)?, selected))
    }

    pub fn with_planner(planner: Planner<S>, selected: NaiveDate) -> Self {
        Self {
            view: CalendarView::new(selected),
            planner,
        }
    }

    pub fn view(&self) -> &CalendarView {
        &self.view
    }

    pub fn planner(&self) -> &Planner<S> {
        &self.planner
    }

    pub fn selected(&self) -> NaiveDate {
        self.view.selected()
    }

    pub fn displayed_month(&self) -> NaiveDate {
        self.view.displayed_month()
    }

    pub fn select_date(&mut self, date: NaiveDate) {
        debug!(%date, "selected date");
        self.view.select(date);
    }

    pub fn prev_month(&mut self) {
        self.view.prev_month();
    }

    pub fn next_month(&mut self) {
        self.view.next_month();
    }

    pub fn show_month(&mut self, month: NaiveDate) {
        self.view.jump_to(month);
    }

    pub fn tasks(&self) -> &[Task] {
        self.planner.tasks_for(self.selected())
    }

    pub fn note(&self) -> Option<&str> {
        self.planner.note_for(self.selected())
    }

    #[instrument(skip(self, text, time))]
    pub fn add_task(&mut self, text: &str, time: Option<&str>) -> anyhow::Result<usize> {
        let date = self.selected();
        self.planner.add_task(date, text, time)
    }

    #[instrument(skip(self))]
    pub fn toggle_task(&mut self, position: usize) -> anyhow::Result<bool> {
        let date = self.selected();
        let index = to_index(position)?;
        self.planner.toggle_task(date, index)
    }

    #[instrument(skip(self))]
    pub fn delete_task(&mut self, position: usize) -> anyhow::Result<Task> {
        let date = self.selected();
        let index = to_index(position)?;
        self.planner.delete_task(date, index)
    }

    pub fn save_note(&mut self, text: &str) -> anyhow::Result<()> {
        let date = self.selected();
        self.planner.save_note(date, text)
    }

    pub fn dark_mode(&self) -> bool {
        self.planner.dark_mode()
    }

    pub fn set_dark_mode(&mut self, dark: bool) -> anyhow::Result<()> {
        self.planner.set_dark_mode(dark)
    }

    pub fn toggle_theme(&mut self) -> anyhow::Result<bool> {
        self.planner.toggle_theme()
    }

    pub fn stats(&self) -> Stats {
        self.planner.stats()
    }

    pub fn grid(&self, week_start: WeekStart, today: NaiveDate) -> MonthGrid {
        self.view
            .grid(week_start, today, |date| self.planner.has_tasks(date))
    }
}

fn to_index(position: usize) -> anyhow::Result<usize> {
    position
        .checked_sub(1)
        .ok_or_else(|| anyhow!("task numbers start at 1"))
}
