use anyhow::anyhow;
use chrono::{
  Datelike,
  NaiveDate,
  Weekday
};
use tracing::debug;

use crate::datekey::add_days;

#[derive(
  Debug, Clone, Copy, PartialEq, Eq,
)]
pub enum WeekStart {
  Sunday,
  Monday
}

impl WeekStart {
  #[must_use]
  pub fn from_config(raw: &str) -> Self {
    if raw
      .trim()
      .eq_ignore_ascii_case("monday")
    {
      Self::Monday
    } else {
      Self::Sunday
    }
  }

  #[must_use]
  pub fn weekday(self) -> Weekday {
    match self {
      | Self::Sunday => Weekday::Sun,
      | Self::Monday => Weekday::Mon
    }
  }

  #[must_use]
  pub fn labels(self) -> [&'static str; 7] {
    match self {
      | Self::Sunday => {
        ["Su", "Mo", "Tu", "We", "Th", "Fr", "Sa"]
      }
      | Self::Monday => {
        ["Mo", "Tu", "We", "Th", "Fr", "Sa", "Su"]
      }
    }
  }
}

#[must_use]
pub fn first_day_of_month(
  year: i32,
  month: u32
) -> NaiveDate {
  NaiveDate::from_ymd_opt(
    year, month, 1
  )
  .unwrap_or(NaiveDate::MIN)
}

#[must_use]
pub fn last_day_of_month(
  year: i32,
  month: u32
) -> NaiveDate {
  let (next_year, next_month) =
    if month >= 12 {
      (year.saturating_add(1), 1_u32)
    } else {
      (year, month + 1)
    };
  add_days(
    first_day_of_month(
      next_year, next_month
    ),
    -1
  )
}

#[must_use]
pub fn days_in_month(
  year: i32,
  month: u32
) -> u32 {
  last_day_of_month(year, month).day()
}

/// Moves by whole months, clamping the
/// day so Jan 31 + 1 month is the last
/// day of February.
#[must_use]
pub fn shift_months(
  date: NaiveDate,
  months: i32
) -> NaiveDate {
  let mut year = date.year();
  let mut month =
    date.month() as i32 + months;

  while month < 1 {
    month += 12;
    year = year.saturating_sub(1);
  }
  while month > 12 {
    month -= 12;
    year = year.saturating_add(1);
  }

  let month = month as u32;
  let day = date
    .day()
    .min(days_in_month(year, month));
  NaiveDate::from_ymd_opt(
    year, month, day
  )
  .unwrap_or(date)
}

#[must_use]
pub fn start_of_week(
  day: NaiveDate,
  week_start: WeekStart
) -> NaiveDate {
  let day_idx = day
    .weekday()
    .num_days_from_monday()
    as i64;
  let start_idx = week_start
    .weekday()
    .num_days_from_monday()
    as i64;
  let diff =
    (7 + day_idx - start_idx) % 7;
  add_days(day, -diff)
}

#[must_use]
pub fn month_title(
  month: NaiveDate
) -> String {
  month.format("%B %Y").to_string()
}

/// `YYYY-MM`, `next`, `prev`, `this`,
/// or a month name in the displayed
/// year. Returns the first of the
/// month.
pub fn parse_month_expr(
  input: &str,
  displayed: NaiveDate
) -> anyhow::Result<NaiveDate> {
  let token =
    input.trim().to_ascii_lowercase();
  let current = first_day_of_month(
    displayed.year(),
    displayed.month()
  );

  match token.as_str() {
    | "this" | "current" => {
      return Ok(current);
    }
    | "next" => {
      return Ok(shift_months(
        current, 1
      ));
    }
    | "prev" | "previous" | "last" => {
      return Ok(shift_months(
        current, -1
      ));
    }
    | _ => {}
  }

  if let Some((y, m)) =
    token.split_once('-')
    && y.len() == 4
    && m.len() == 2
    && let (Ok(year), Ok(month)) =
      (y.parse::<i32>(), m.parse::<u32>())
  {
    return NaiveDate::from_ymd_opt(
      year, month, 1
    )
    .ok_or_else(|| {
      anyhow!(
        "invalid month: {input}"
      )
    });
  }

  if let Some(month) =
    parse_month_name(&token)
  {
    return Ok(first_day_of_month(
      current.year(),
      month
    ));
  }

  Err(anyhow!(
    "unrecognized month '{input}'; \
     expected YYYY-MM, next, prev, \
     or a month name"
  ))
}

fn parse_month_name(
  token: &str
) -> Option<u32> {
  match token.trim() {
    | "january" | "jan" => Some(1),
    | "february" | "feb" => Some(2),
    | "march" | "mar" => Some(3),
    | "april" | "apr" => Some(4),
    | "may" => Some(5),
    | "june" | "jun" => Some(6),
    | "july" | "jul" => Some(7),
    | "august" | "aug" => Some(8),
    | "september" | "sep" | "sept" => {
      Some(9)
    }
    | "october" | "oct" => Some(10),
    | "november" | "nov" => Some(11),
    | "december" | "dec" => Some(12),
    | _ => None
  }
}

#[derive(
  Debug, Clone, Copy, PartialEq, Eq,
)]
pub struct DayCell {
  pub date:      NaiveDate,
  pub today:     bool,
  pub selected:  bool,
  pub has_tasks: bool
}

/// One displayed month: blank cells up
/// to the first weekday, then one cell
/// per day of the month.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonthGrid {
  pub month:      NaiveDate,
  pub week_start: WeekStart,
  pub cells:      Vec<Option<DayCell>>
}

impl MonthGrid {
  pub fn build<F>(
    month: NaiveDate,
    week_start: WeekStart,
    today: NaiveDate,
    selected: NaiveDate,
    has_tasks: F
  ) -> Self
  where
    F: Fn(NaiveDate) -> bool
  {
    let first = first_day_of_month(
      month.year(),
      month.month()
    );
    let leading = (first
      - start_of_week(first, week_start))
    .num_days()
      as usize;
    let count = days_in_month(
      first.year(),
      first.month()
    );

    let mut cells =
      Vec::with_capacity(leading + 31);
    cells.extend(
      std::iter::repeat_n(None, leading)
    );
    for offset in 0..count {
      let date =
        add_days(first, offset as i64);
      cells.push(Some(DayCell {
        date,
        today: date == today,
        selected: date == selected,
        has_tasks: has_tasks(date)
      }));
    }

    debug!(
      month = %first.format("%Y-%m"),
      leading,
      days = count,
      "built month grid"
    );

    Self {
      month: first,
      week_start,
      cells
    }
  }

  /// Rows of seven, the last one padded
  /// with blanks.
  #[must_use]
  pub fn weeks(
    &self
  ) -> Vec<[Option<DayCell>; 7]> {
    self
      .cells
      .chunks(7)
      .map(|chunk| {
        let mut row = [None; 7];
        row[..chunk.len()]
          .copy_from_slice(chunk);
        row
      })
      .collect()
  }

  #[must_use]
  pub fn title(&self) -> String {
    month_title(self.month)
  }
}

/// Displayed month plus selected day.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq,
)]
pub struct CalendarView {
  displayed_month: NaiveDate,
  selected:        NaiveDate
}

impl CalendarView {
  #[must_use]
  pub fn new(selected: NaiveDate) -> Self {
    Self {
      displayed_month:
        first_day_of_month(
          selected.year(),
          selected.month()
        ),
      selected
    }
  }

  #[must_use]
  pub fn displayed_month(
    &self
  ) -> NaiveDate {
    self.displayed_month
  }

  #[must_use]
  pub fn selected(&self) -> NaiveDate {
    self.selected
  }

  pub fn prev_month(&mut self) {
    self.displayed_month = shift_months(
      self.displayed_month,
      -1
    );
  }

  pub fn next_month(&mut self) {
    self.displayed_month = shift_months(
      self.displayed_month,
      1
    );
  }

  pub fn jump_to(
    &mut self,
    month: NaiveDate
  ) {
    self.displayed_month =
      first_day_of_month(
        month.year(),
        month.month()
      );
  }

  pub fn select(
    &mut self,
    date: NaiveDate
  ) {
    self.selected = date;
    self.jump_to(date);
  }

  pub fn grid<F>(
    &self,
    week_start: WeekStart,
    today: NaiveDate,
    has_tasks: F
  ) -> MonthGrid
  where
    F: Fn(NaiveDate) -> bool
  {
    MonthGrid::build(
      self.displayed_month,
      week_start,
      today,
      self.selected,
      has_tasks
    )
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn day(
    y: i32,
    m: u32,
    d: u32
  ) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d)
      .expect("valid date")
  }

  #[test]
  fn month_lengths() {
    assert_eq!(days_in_month(2024, 2), 29);
    assert_eq!(days_in_month(2026, 2), 28);
    assert_eq!(days_in_month(2026, 12), 31);
    assert_eq!(days_in_month(2026, 4), 30);
  }

  #[test]
  fn shifting_from_month_end_clamps() {
    assert_eq!(
      shift_months(day(2026, 1, 31), 1),
      day(2026, 2, 28)
    );
    assert_eq!(
      shift_months(day(2026, 1, 15), -1),
      day(2025, 12, 15)
    );
    assert_eq!(
      shift_months(day(2026, 12, 1), 13),
      day(2028, 1, 1)
    );
  }

  #[test]
  fn sunday_grid_has_leading_blanks() {
    // October 2026 starts on a Thursday.
    let grid = MonthGrid::build(
      day(2026, 10, 16),
      WeekStart::Sunday,
      day(2026, 10, 16),
      day(2026, 10, 20),
      |date| date.day() == 3
    );

    assert_eq!(grid.month, day(2026, 10, 1));
    assert_eq!(grid.cells.len(), 4 + 31);
    assert!(
      grid.cells[..4]
        .iter()
        .all(Option::is_none)
    );

    let cells: Vec<DayCell> =
      grid.cells.iter().flatten().copied().collect();
    assert_eq!(cells.len(), 31);
    assert!(cells[15].today);
    assert!(cells[19].selected);
    assert!(cells[2].has_tasks);
    assert_eq!(
      cells.iter().filter(|c| c.has_tasks).count(),
      1
    );
  }

  #[test]
  fn monday_grid_and_week_rows() {
    // February 2027 starts on a Monday.
    let grid = MonthGrid::build(
      day(2027, 2, 1),
      WeekStart::Monday,
      day(2026, 10, 16),
      day(2026, 10, 16),
      |_| false
    );
    assert!(grid.cells[0].is_some());

    let weeks = grid.weeks();
    assert_eq!(weeks.len(), 4);
    assert!(weeks.iter().flatten().all(|cell| {
      cell.is_some_and(|c| !c.today && !c.selected)
    }));
  }

  #[test]
  fn last_week_is_padded() {
    let grid = MonthGrid::build(
      day(2026, 10, 1),
      WeekStart::Sunday,
      day(2026, 10, 1),
      day(2026, 10, 1),
      |_| false
    );
    let weeks = grid.weeks();
    assert_eq!(weeks.len(), 5);
    let last = weeks[4];
    assert_eq!(
      last[0].map(|c| c.date),
      Some(day(2026, 10, 25))
    );
    assert_eq!(last[6].map(|c| c.date), Some(day(2026, 10, 31)));
  }

  #[test]
  fn navigation_keeps_selection() {
    let mut view =
      CalendarView::new(day(2026, 1, 31));
    view.next_month();
    assert_eq!(
      view.displayed_month(),
      day(2026, 2, 1)
    );
    assert_eq!(view.selected(), day(2026, 1, 31));

    view.select(day(2026, 5, 2));
    assert_eq!(
      view.displayed_month(),
      day(2026, 5, 1)
    );
  }

  #[test]
  fn month_expressions() {
    let shown = day(2026, 12, 9);
    assert_eq!(
      parse_month_expr("next", shown)
        .expect("next"),
      day(2027, 1, 1)
    );
    assert_eq!(
      parse_month_expr("2025-06", shown)
        .expect("iso"),
      day(2025, 6, 1)
    );
    assert_eq!(
      parse_month_expr("Mar", shown)
        .expect("name"),
      day(2026, 3, 1)
    );
    assert!(
      parse_month_expr("2025-13", shown)
        .is_err()
    );
  }
}
