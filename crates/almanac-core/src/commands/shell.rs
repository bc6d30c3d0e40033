use std::io::{BufRead, Write};

use anyhow::anyhow;
use tracing::{debug, info, warn};

use super::modifiers::parse_args;
use super::{CommandEnv, Flow, expand_command_abbrev, execute};
use crate::cli::Invocation;
use crate::datekey::{DateKey, parse_day_expr};
use crate::render::Renderer;
use crate::session::Session;
use crate::storage::KeyValueStore;

const PROMPT: &str = "almanac> ";

fn shell_command_names() -> Vec<&'static str> {
    vec![
        "add", "agenda", "calendar", "delete", "greet", "note", "show", "stats", "theme", "toggle",
        "next", "prev", "select", "today", "help", "quit", "exit",
    ]
}

/// Reads commands line by line against one live session, redrawing the
/// calendar and the selected day after anything that changes them. Errors from
/// a single line are printed and the loop keeps going.
pub fn run<S, R, W>(
    session: &mut Session<S>,
    env: &CommandEnv,
    renderer: &mut Renderer,
    input: R,
    out: &mut W,
) -> anyhow::Result<()>
where
    S: KeyValueStore,
    R: BufRead,
    W: Write,
{
    info!("starting shell");
    redraw(session, env, renderer, out)?;

    let mut lines = input.lines();
    loop {
        write!(out, "{PROMPT}")?;
        out.flush()?;

        let Some(line) = lines.next() else {
            writeln!(out)?;
            break;
        };
        let line = line?;
        let words: Vec<String> = line.split_whitespace().map(str::to_string).collect();
        if words.is_empty() {
            continue;
        }

        match handle_line(session, env, renderer, &line, &words, out) {
            Ok(Flow::Quit) => break,
            Ok(Flow::Continue) => {}
            Err(err) => {
                warn!(error = %err, line = %line, "shell command failed");
                writeln!(out, "error: {err:#}")?;
            }
        }
    }

    info!("shell finished");
    Ok(())
}

fn handle_line<S: KeyValueStore, W: Write>(
    session: &mut Session<S>,
    env: &CommandEnv,
    renderer: &mut Renderer,
    line: &str,
    words: &[String],
    out: &mut W,
) -> anyhow::Result<Flow> {
    let known = shell_command_names();
    let (first, args) = words
        .split_first()
        .ok_or_else(|| anyhow!("empty command"))?;
    let command = expand_command_abbrev(first, &known)
        .ok_or_else(|| anyhow!("unknown or ambiguous command: {first}"))?;
    debug!(command, "shell command");

    match command {
        "next" => {
            session.next_month();
            return redraw_month(session, env, renderer, out);
        }
        "prev" => {
            session.prev_month();
            return redraw_month(session, env, renderer, out);
        }
        "today" => {
            session.select_date(env.today);
            redraw(session, env, renderer, out)?;
            return Ok(Flow::Continue);
        }
        "select" => {
            let raw = args
                .first()
                .ok_or_else(|| anyhow!("select: day is required"))?;
            let date = parse_day_expr(raw, env.today)?;
            session.select_date(date);
            redraw(session, env, renderer, out)?;
            return Ok(Flow::Continue);
        }
        "calendar" if args.is_empty() => return redraw_month(session, env, renderer, out),
        "note" if !args.is_empty() && parse_args(args, env.today)?.words.len() == args.len() => {
            // Without modifiers the note keeps the spacing it was typed with.
            session.save_note(rest_of_line(line))?;
            let key = DateKey::from_date(session.selected());
            writeln!(out, "Saved note for {key}.")?;
            return Ok(Flow::Continue);
        }
        _ => {}
    }

    let inv = Invocation {
        command: command.to_string(),
        command_args: args.to_vec(),
    };
    let flow = execute(session, env, renderer, &inv, out)?;

    if matches!(command, "add" | "toggle" | "delete") {
        writeln!(out)?;
        redraw_month(session, env, renderer, out)?;
    }
    Ok(flow)
}

fn rest_of_line(line: &str) -> &str {
    line.trim()
        .split_once(char::is_whitespace)
        .map(|(_, rest)| rest.trim_start())
        .unwrap_or_default()
}

fn redraw<S: KeyValueStore, W: Write>(
    session: &Session<S>,
    env: &CommandEnv,
    renderer: &Renderer,
    out: &mut W,
) -> anyhow::Result<()> {
    redraw_month(session, env, renderer, out)?;
    writeln!(out)?;
    renderer.write_day(out, session.selected(), session.tasks(), session.note())?;
    debug!(selected = %DateKey::from_date(session.selected()), "redrew session");
    Ok(())
}

fn redraw_month<S: KeyValueStore, W: Write>(
    session: &Session<S>,
    env: &CommandEnv,
    renderer: &Renderer,
    out: &mut W,
) -> anyhow::Result<Flow> {
    renderer.write_month(out, &session.grid(env.week_start, env.today))?;
    Ok(Flow::Continue)
}
