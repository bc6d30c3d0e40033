use anyhow::anyhow;
use chrono::NaiveDate;
use tracing::{
  instrument,
  warn
};

use crate::datekey::parse_day_expr;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Mod {
  On(NaiveDate),
  Time(String),
  Month(String)
}

/// Free words plus the modifiers found
/// among them.
#[derive(
  Debug, Clone, Default, PartialEq, Eq,
)]
pub(crate) struct ParsedArgs {
  pub words: Vec<String>,
  pub on:    Option<NaiveDate>,
  pub time:  Option<String>,
  pub month: Option<String>
}

impl ParsedArgs {
  pub fn text(&self) -> String {
    self.words.join(" ")
  }

  /// The first word as a 1-based task
  /// number.
  pub fn position(
    &self,
    command: &str
  ) -> anyhow::Result<usize> {
    let raw =
      self.words.first().ok_or_else(
        || {
          anyhow!(
            "{command}: task number is \
             required"
          )
        }
      )?;
    if self.words.len() > 1 {
      warn!(extra = ?&self.words[1..], "ignoring words after task number");
    }
    raw.parse::<usize>().map_err(|_| {
      anyhow!(
        "{command}: expected a task \
         number, got: {raw}"
      )
    })
  }
}

#[instrument(skip(args, today))]
pub(crate) fn parse_args(
  args: &[String],
  today: NaiveDate
) -> anyhow::Result<ParsedArgs> {
  let mut parsed = ParsedArgs::default();

  let mut literal = false;
  for arg in args {
    if arg == "--" {
      literal = true;
      continue;
    }

    if !literal
      && let Some(one_mod) =
        parse_one_mod(arg, today)?
    {
      match one_mod {
        | Mod::On(date) => {
          parsed.on = Some(date);
        }
        | Mod::Time(time) => {
          parsed.time = Some(time);
        }
        | Mod::Month(month) => {
          parsed.month = Some(month);
        }
      }
      continue;
    }

    parsed.words.push(arg.clone());
  }

  Ok(parsed)
}

fn parse_one_mod(
  tok: &str,
  today: NaiveDate
) -> anyhow::Result<Option<Mod>> {
  let Some((key, value)) =
    tok.split_once(':')
  else {
    return Ok(None);
  };

  let key = key.to_ascii_lowercase();

  match key.as_str() {
    | "on" => {
      Ok(Some(Mod::On(
        parse_day_expr(value, today)?
      )))
    }
    | "time" => {
      Ok(Some(Mod::Time(
        value.to_string()
      )))
    }
    | "month" => {
      Ok(Some(Mod::Month(
        value.to_string()
      )))
    }
    | _ => Ok(None)
  }
}
