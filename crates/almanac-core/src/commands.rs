mod modifiers;
pub mod shell;

use std::io::{self, Write};

use anyhow::anyhow;
use chrono::NaiveDate;
use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::calendar::{WeekStart, parse_month_expr};
use crate::cli::Invocation;
use crate::config::Config;
use crate::datekey::DateKey;
use crate::greeting::Greeting;
use crate::planner::{NotesByDate, TasksByDate};
use crate::render::Renderer;
use crate::session::Session;
use crate::storage::KeyValueStore;

use self::modifiers::{ParsedArgs, parse_args};

pub fn known_command_names() -> Vec<&'static str> {
    vec![
        "add",
        "agenda",
        "calendar",
        "delete",
        "export",
        "greet",
        "note",
        "shell",
        "show",
        "stats",
        "theme",
        "toggle",
        "_commands",
        "_show",
        "help",
        "version",
    ]
}

pub fn expand_command_abbrev<'a>(token: &'a str, known: &[&'a str]) -> Option<&'a str> {
    if known.contains(&token) {
        return Some(token);
    }

    let mut matches = known.iter().copied().filter(|name| name.starts_with(token));
    let first = matches.next()?;
    if matches.next().is_some() {
        None
    } else {
        Some(first)
    }
}

/// Per-run facts commands need besides the session.
#[derive(Debug, Clone)]
pub struct CommandEnv<'a> {
    pub cfg: &'a Config,
    pub today: NaiveDate,
    pub hour: u32,
    pub week_start: WeekStart,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

#[derive(Serialize)]
struct Export<'a> {
    tasks: &'a TasksByDate,
    notes: &'a NotesByDate,
    #[serde(rename = "darkMode")]
    dark_mode: bool,
}

/// Runs one command line against a fresh session on stdout; `shell` hands
/// stdin over to the interactive loop.
#[instrument(skip(store, env, inv))]
pub fn dispatch<S: KeyValueStore>(store: S, env: &CommandEnv, inv: Invocation) -> anyhow::Result<()> {
    let mut session = Session::open(store, env.today)?;
    let mut renderer = Renderer::new(env.cfg, session.dark_mode())?;

    debug!(command = %inv.command, args = ?inv.command_args, "dispatching command");

    if inv.command == "shell" {
        let stdin = io::stdin().lock();
        let mut stdout = io::stdout().lock();
        return shell::run(&mut session, env, &mut renderer, stdin, &mut stdout);
    }

    let mut out = io::stdout().lock();
    execute(&mut session, env, &mut renderer, &inv, &mut out)?;
    Ok(())
}

#[instrument(skip(session, env, renderer, inv, out), fields(command = %inv.command))]
pub fn execute<S, W>(
    session: &mut Session<S>,
    env: &CommandEnv,
    renderer: &mut Renderer,
    inv: &Invocation,
    out: &mut W,
) -> anyhow::Result<Flow>
where
    S: KeyValueStore,
    W: Write,
{
    let args = parse_args(&inv.command_args, env.today)?;
    if let Some(date) = args.on {
        session.select_date(date);
    }

    match inv.command.as_str() {
        "calendar" => cmd_calendar(session, env, renderer, &args, out)?,
        "show" => cmd_show(session, renderer, out)?,
        "add" => cmd_add(session, renderer, &args, out)?,
        "toggle" => cmd_toggle(session, renderer, &args, out)?,
        "delete" => cmd_delete(session, renderer, &args, out)?,
        "note" => cmd_note(session, &args, out)?,
        "stats" => renderer.write_stats(out, &session.stats())?,
        "theme" => cmd_theme(session, renderer, &args, out)?,
        "greet" => {
            let greeting = Greeting::new(env.hour, &env.cfg.greeting_name());
            renderer.write_greeting(out, &greeting)?;
        }
        "agenda" => cmd_agenda(session, renderer, out)?,
        "export" => cmd_export(session, out)?,
        "_commands" => {
            for name in known_command_names() {
                writeln!(out, "{name}")?;
            }
        }
        "_show" => cmd_show_config(env.cfg, out)?,
        "help" => cmd_help(out)?,
        "version" => writeln!(out, "{}", env!("CARGO_PKG_VERSION"))?,
        "quit" | "exit" => return Ok(Flow::Quit),
        other => return Err(anyhow!("unknown command: {other}")),
    }

    Ok(Flow::Continue)
}

fn cmd_calendar<S: KeyValueStore, W: Write>(
    session: &mut Session<S>,
    env: &CommandEnv,
    renderer: &Renderer,
    args: &ParsedArgs,
    out: &mut W,
) -> anyhow::Result<()> {
    if let Some(month) = &args.month {
        let month = parse_month_expr(month, session.displayed_month())?;
        session.show_month(month);
    }
    renderer.write_month(out, &session.grid(env.week_start, env.today))
}

fn cmd_show<S: KeyValueStore, W: Write>(
    session: &Session<S>,
    renderer: &Renderer,
    out: &mut W,
) -> anyhow::Result<()> {
    renderer.write_day(out, session.selected(), session.tasks(), session.note())
}

#[instrument(skip(session, renderer, args, out))]
fn cmd_add<S: KeyValueStore, W: Write>(
    session: &mut Session<S>,
    renderer: &Renderer,
    args: &ParsedArgs,
    out: &mut W,
) -> anyhow::Result<()> {
    info!("command add");

    let text = args.text();
    if text.trim().is_empty() {
        return Err(anyhow!("add: task text is required"));
    }

    let position = session.add_task(&text, args.time.as_deref())?;
    writeln!(
        out,
        "Added task {position} on {}.",
        DateKey::from_date(session.selected())
    )?;
    cmd_show(session, renderer, out)
}

#[instrument(skip(session, renderer, args, out))]
fn cmd_toggle<S: KeyValueStore, W: Write>(
    session: &mut Session<S>,
    renderer: &Renderer,
    args: &ParsedArgs,
    out: &mut W,
) -> anyhow::Result<()> {
    info!("command toggle");

    let position = args.position("toggle")?;
    let completed = session.toggle_task(position)?;
    writeln!(
        out,
        "Task {position} on {} is now {}.",
        DateKey::from_date(session.selected()),
        if completed { "done" } else { "pending" }
    )?;
    cmd_show(session, renderer, out)
}

#[instrument(skip(session, renderer, args, out))]
fn cmd_delete<S: KeyValueStore, W: Write>(
    session: &mut Session<S>,
    renderer: &Renderer,
    args: &ParsedArgs,
    out: &mut W,
) -> anyhow::Result<()> {
    info!("command delete");

    let position = args.position("delete")?;
    let removed = session.delete_task(position)?;
    writeln!(
        out,
        "Deleted task {position} on {}: {}",
        DateKey::from_date(session.selected()),
        removed.text
    )?;
    cmd_show(session, renderer, out)
}

#[instrument(skip(session, args, out))]
fn cmd_note<S: KeyValueStore, W: Write>(
    session: &mut Session<S>,
    args: &ParsedArgs,
    out: &mut W,
) -> anyhow::Result<()> {
    let key = DateKey::from_date(session.selected());

    if args.words.is_empty() {
        match session.note() {
            Some(note) if !note.is_empty() => writeln!(out, "{note}")?,
            _ => writeln!(out, "No note for {key}.")?,
        }
        return Ok(());
    }

    session.save_note(&args.text())?;
    writeln!(out, "Saved note for {key}.")?;
    Ok(())
}

#[instrument(skip(session, renderer, args, out))]
fn cmd_theme<S: KeyValueStore, W: Write>(
    session: &mut Session<S>,
    renderer: &mut Renderer,
    args: &ParsedArgs,
    out: &mut W,
) -> anyhow::Result<()> {
    let dark = match args.words.first().map(|word| word.to_ascii_lowercase()) {
        None => session.dark_mode(),
        Some(word) => {
            let dark = match word.as_str() {
                "dark" | "night" => true,
                "light" | "day" => false,
                "toggle" => !session.dark_mode(),
                other => return Err(anyhow!("theme: expected dark, light or toggle, got: {other}")),
            };
            session.set_dark_mode(dark)?;
            renderer.set_dark(dark);
            dark
        }
    };

    writeln!(out, "Theme: {}", if dark { "dark" } else { "light" })?;
    Ok(())
}

fn cmd_agenda<S: KeyValueStore, W: Write>(
    session: &Session<S>,
    renderer: &Renderer,
    out: &mut W,
) -> anyhow::Result<()> {
    let planner = session.planner();
    let mut days: Vec<DateKey> = planner.task_days().chain(planner.note_days()).collect();
    days.sort();
    days.dedup();

    if days.is_empty() {
        writeln!(out, "Nothing planned yet.")?;
        return Ok(());
    }

    for (idx, key) in days.iter().enumerate() {
        if idx > 0 {
            writeln!(out)?;
        }
        let date = key.date();
        renderer.write_day(out, date, planner.tasks_for(date), planner.note_for(date))?;
    }
    Ok(())
}

fn cmd_export<S: KeyValueStore, W: Write>(session: &Session<S>, out: &mut W) -> anyhow::Result<()> {
    let planner = session.planner();
    let export = Export {
        tasks: planner.tasks(),
        notes: planner.notes(),
        dark_mode: planner.dark_mode(),
    };
    writeln!(out, "{}", serde_json::to_string_pretty(&export)?)?;
    Ok(())
}

fn cmd_show_config<W: Write>(cfg: &Config, out: &mut W) -> anyhow::Result<()> {
    let mut entries: Vec<_> = cfg.iter().collect();
    entries.sort();
    for (key, value) in entries {
        writeln!(out, "{key}={value}")?;
    }
    Ok(())
}

fn cmd_help<W: Write>(out: &mut W) -> anyhow::Result<()> {
    writeln!(
        out,
        "Commands: calendar [month:YYYY-MM|next|prev], show, add <text> [time:HH:MM], \
         toggle <n>, delete <n>, note [text|\"\"], stats, theme [dark|light|toggle], greet, \
         agenda, export, shell"
    )?;
    writeln!(
        out,
        "Every command accepts on:<day> (today, tomorrow, YYYY-MM-DD, +3d, friday, ...)."
    )?;
    Ok(())
}
