use std::io::{self, IsTerminal, Write};

use chrono::{Datelike, NaiveDate};
use unicode_width::UnicodeWidthStr;

use crate::calendar::{DayCell, MonthGrid};
use crate::config::Config;
use crate::datekey::readable_date;
use crate::greeting::Greeting;
use crate::stats::Stats;
use crate::task::Task;

const CELL_WIDTH: usize = 5;
pub const EMPTY_DAY_MESSAGE: &str = "No tasks for this day. Add one with `add`!";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Palette {
    title: &'static str,
    today: &'static str,
    selected: &'static str,
    has_tasks: &'static str,
    done: &'static str,
    muted: &'static str,
}

const LIGHT: Palette = Palette {
    title: "1",
    today: "1;34",
    selected: "1;31",
    has_tasks: "35",
    done: "32",
    muted: "90",
};

const DARK: Palette = Palette {
    title: "1;97",
    today: "1;96",
    selected: "1;93",
    has_tasks: "95",
    done: "92",
    muted: "37",
};

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
    palette: Palette,
}

impl Renderer {
    pub fn new(cfg: &Config, dark: bool) -> anyhow::Result<Self> {
        let color = cfg.get_bool("color")?.unwrap_or(true);

        Ok(Self {
            color: color && io::stdout().is_terminal(),
            palette: if dark { DARK } else { LIGHT },
        })
    }

    /// No escape codes; what tests and pipes see.
    pub fn plain() -> Self {
        Self {
            color: false,
            palette: LIGHT,
        }
    }

    pub fn set_dark(&mut self, dark: bool) {
        self.palette = if dark { DARK } else { LIGHT };
    }

    pub fn write_greeting<W: Write>(&self, out: &mut W, greeting: &Greeting) -> anyhow::Result<()> {
        writeln!(out, "{}", self.paint(&greeting.to_string(), self.palette.title))?;
        Ok(())
    }

    #[tracing::instrument(skip_all, fields(month = %grid.title()))]
    pub fn write_month<W: Write>(&self, out: &mut W, grid: &MonthGrid) -> anyhow::Result<()> {
        let width = CELL_WIDTH * 7;
        let title = format!("{:^width$}", grid.title());
        writeln!(out, "{}", self.paint(title.trim_end(), self.palette.title))?;

        let header = grid
            .week_start
            .labels()
            .iter()
            .map(|label| format!("{label:^CELL_WIDTH$}"))
            .collect::<String>();
        writeln!(out, "{}", self.paint(header.trim_end(), self.palette.muted))?;

        for week in grid.weeks() {
            let line = week
                .iter()
                .map(|cell| match cell {
                    Some(cell) => self.day_cell(cell),
                    None => " ".repeat(CELL_WIDTH),
                })
                .collect::<String>();
            writeln!(out, "{}", line.trim_end())?;
        }

        Ok(())
    }

    #[tracing::instrument(skip_all, fields(date = %date, tasks = tasks.len()))]
    pub fn write_day<W: Write>(
        &self,
        out: &mut W,
        date: NaiveDate,
        tasks: &[Task],
        note: Option<&str>,
    ) -> anyhow::Result<()> {
        writeln!(out, "{}", self.paint(&readable_date(date), self.palette.title))?;

        if tasks.is_empty() {
            writeln!(out, "{}", self.paint(EMPTY_DAY_MESSAGE, self.palette.muted))?;
        } else {
            let headers = vec![
                "#".to_string(),
                "Done".to_string(),
                "Time".to_string(),
                "Task".to_string(),
            ];
            let rows = tasks
                .iter()
                .enumerate()
                .map(|(idx, task)| {
                    let done = if task.completed {
                        self.paint("[x]", self.palette.done)
                    } else {
                        "[ ]".to_string()
                    };
                    vec![
                        (idx + 1).to_string(),
                        done,
                        task.time.clone().unwrap_or_default(),
                        task.text.clone(),
                    ]
                })
                .collect();
            write_table(&mut *out, headers, rows)?;
        }

        if let Some(note) = note.filter(|note| !note.trim().is_empty()) {
            writeln!(out)?;
            writeln!(out, "{}", self.paint("Note:", self.palette.muted))?;
            for line in note.lines() {
                writeln!(out, "  {line}")?;
            }
        }

        Ok(())
    }

    pub fn write_stats<W: Write>(&self, out: &mut W, stats: &Stats) -> anyhow::Result<()> {
        writeln!(out, "Total      {}", stats.total)?;
        writeln!(
            out,
            "Completed  {}",
            self.paint(&stats.completed.to_string(), self.palette.done)
        )?;
        writeln!(out, "Pending    {}", stats.pending)?;
        writeln!(out, "{}", stats.motivation())?;
        Ok(())
    }

    fn day_cell(&self, cell: &DayCell) -> String {
        let (open, close) = if cell.selected {
            ('[', ']')
        } else if cell.today {
            ('(', ')')
        } else {
            (' ', ' ')
        };
        let mark = if cell.has_tasks { '*' } else { ' ' };
        let text = format!("{open}{:>2}{mark}{close}", cell.date.day());

        let code = if cell.selected {
            Some(self.palette.selected)
        } else if cell.today {
            Some(self.palette.today)
        } else if cell.has_tasks {
            Some(self.palette.has_tasks)
        } else {
            None
        };

        match code {
            Some(code) => self.paint(&text, code),
            None => text,
        }
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

fn write_table<W: Write>(
    mut writer: W,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
) -> anyhow::Result<()> {
    let column_count = headers.len();
    let mut widths = vec![0usize; column_count];

    for (idx, header) in headers.iter().enumerate() {
        widths[idx] = widths[idx].max(UnicodeWidthStr::width(header.as_str()));
    }

    for row in &rows {
        for (idx, cell) in row.iter().enumerate() {
            widths[idx] = widths[idx].max(UnicodeWidthStr::width(strip_ansi(cell).as_str()));
        }
    }

    let render_row = |cells: &[String]| {
        let mut line = String::new();
        for (idx, cell) in cells.iter().enumerate() {
            let visible_width = UnicodeWidthStr::width(strip_ansi(cell).as_str());
            let padding = widths[idx].saturating_sub(visible_width);
            line.push_str(cell);
            line.push_str(&" ".repeat(padding));
            line.push(' ');
        }
        line.trim_end().to_string()
    };

    writeln!(writer, "{}", render_row(&headers))?;
    let rule = widths
        .iter()
        .map(|width| "-".repeat(*width))
        .collect::<Vec<_>>()
        .join(" ");
    writeln!(writer, "{rule}")?;

    for row in &rows {
        writeln!(writer, "{}", render_row(row))?;
    }

    Ok(())
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut escaped = false;

    for ch in s.chars() {
        if escaped {
            if ch == 'm' {
                escaped = false;
            }
            continue;
        }

        if ch == '\x1b' {
            escaped = true;
            continue;
        }

        out.push(ch);
    }

    out
}
