use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use anyhow::{
  Context,
  anyhow
};
use chrono::{
  Datelike,
  Duration,
  NaiveDate,
  Utc,
  Weekday
};
use chrono_tz::Tz;
use regex::Regex;
use serde::{
  Deserialize,
  Deserializer,
  Serialize,
  Serializer
};

const KEY_FORMAT: &str = "%Y-%m-%d";

/// Canonical `YYYY-MM-DD` key for one
/// calendar day. Tasks and notes for a
/// day are always filed under the same
/// key because the key is derived from
/// the date, never from user text.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  PartialOrd,
  Ord,
  Hash
)]
pub struct DateKey(NaiveDate);

impl DateKey {
  #[must_use]
  pub fn from_date(
    date: NaiveDate
  ) -> Self {
    Self(date)
  }

  #[must_use]
  pub fn date(&self) -> NaiveDate {
    self.0
  }

  pub fn parse(
    raw: &str
  ) -> anyhow::Result<Self> {
    let trimmed = raw.trim();
    if !key_regex()
      .is_some_and(|re| re.is_match(trimmed))
    {
      return Err(anyhow!(
        "date key must be YYYY-MM-DD, \
         got: {raw}"
      ));
    }
    let date =
      NaiveDate::parse_from_str(
        trimmed, KEY_FORMAT
      )
      .with_context(|| {
        format!(
          "invalid calendar day: {raw}"
        )
      })?;
    Ok(Self(date))
  }
}

impl From<NaiveDate> for DateKey {
  fn from(date: NaiveDate) -> Self {
    Self(date)
  }
}

impl fmt::Display for DateKey {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>
  ) -> fmt::Result {
    write!(
      f,
      "{}",
      self.0.format(KEY_FORMAT)
    )
  }
}

impl FromStr for DateKey {
  type Err = anyhow::Error;

  fn from_str(
    s: &str
  ) -> Result<Self, Self::Err> {
    Self::parse(s)
  }
}

impl Serialize for DateKey {
  fn serialize<S>(
    &self,
    serializer: S
  ) -> Result<S::Ok, S::Error>
  where
    S: Serializer
  {
    serializer
      .serialize_str(&self.to_string())
  }
}

impl<'de> Deserialize<'de> for DateKey {
  fn deserialize<D>(
    deserializer: D
  ) -> Result<Self, D::Error>
  where
    D: Deserializer<'de>
  {
    let raw = String::deserialize(
      deserializer
    )?;
    Self::parse(&raw)
      .map_err(serde::de::Error::custom)
  }
}

fn key_regex() -> Option<&'static Regex>
{
  static KEY_RE: OnceLock<
    Option<Regex>
  > = OnceLock::new();
  KEY_RE
    .get_or_init(|| {
      Regex::new(r"^\d{4}-\d{2}-\d{2}$")
        .ok()
    })
    .as_ref()
}

/// Long en-US form, e.g. `Friday,
/// October 16, 2026`.
#[must_use]
pub fn readable_date(
  date: NaiveDate
) -> String {
  date
    .format("%A, %B %-d, %Y")
    .to_string()
}

/// Today's date, in `timezone` when one
/// is configured and in the system zone
/// otherwise.
#[must_use]
pub fn today(
  timezone: Option<Tz>
) -> NaiveDate {
  match timezone {
    | Some(tz) => {
      Utc::now()
        .with_timezone(&tz)
        .date_naive()
    }
    | None => {
      chrono::Local::now().date_naive()
    }
  }
}

pub fn parse_timezone(
  raw: &str
) -> anyhow::Result<Tz> {
  let trimmed = raw.trim();
  if trimmed.is_empty() {
    return Err(anyhow!(
      "timezone cannot be empty"
    ));
  }

  trimmed.parse::<Tz>().map_err(|err| {
    anyhow!(
      "failed to parse timezone id \
       {trimmed}: {err}"
    )
  })
}

#[tracing::instrument(skip(today), fields(input = input))]
pub fn parse_day_expr(
  input: &str,
  today: NaiveDate
) -> anyhow::Result<NaiveDate> {
  let token = input.trim();
  let lower =
    token.to_ascii_lowercase();

  match lower.as_str() {
    | "today" => return Ok(today),
    | "tomorrow" => {
      return Ok(add_days(today, 1));
    }
    | "yesterday" => {
      return Ok(add_days(today, -1));
    }
    | _ => {}
  }

  if let Ok(key) = DateKey::parse(token)
  {
    return Ok(key.date());
  }

  if token.len() == 8
    && token
      .chars()
      .all(|c| c.is_ascii_digit())
  {
    return NaiveDate::parse_from_str(
      token, "%Y%m%d"
    )
    .with_context(|| {
      format!(
        "invalid compact date: {token}"
      )
    });
  }

  if let Some(captures) = offset_regex()
    .and_then(|re| re.captures(&lower))
  {
    let sign = if &captures["sign"]
      == "-"
    {
      -1
    } else {
      1
    };
    let amount: i64 = captures["n"]
      .parse()
      .context("invalid day offset")?;
    let days = match &captures["unit"] {
      | "w" => amount * 7,
      | _ => amount
    };
    return Ok(add_days(
      today,
      sign * days
    ));
  }

  if let Some(weekday) =
    parse_weekday_name(&lower)
  {
    return Ok(next_weekday_date(
      today, weekday
    ));
  }

  Err(anyhow!(
    "unrecognized day '{input}'; \
     expected today, tomorrow, \
     yesterday, YYYY-MM-DD, YYYYMMDD, \
     +Nd/-Nd/+Nw, or a weekday name"
  ))
}

fn offset_regex()
-> Option<&'static Regex> {
  static OFFSET_RE: OnceLock<
    Option<Regex>
  > = OnceLock::new();
  OFFSET_RE
    .get_or_init(|| {
      Regex::new(
        r"^(?P<sign>[+-])(?P<n>\d{1,5})(?P<unit>[dw])$"
      )
      .ok()
    })
    .as_ref()
}

/// Normalizes clock times such as
/// `3:23pm` or `9:05` to `HH:MM`; other
/// text is kept as typed (trimmed).
#[must_use]
pub fn normalize_time(
  raw: &str
) -> String {
  let trimmed = raw.trim();
  match parse_clock_time(trimmed) {
    | Some((hour, minute)) => {
      format!("{hour:02}:{minute:02}")
    }
    | None => trimmed.to_string()
  }
}

fn parse_clock_time(
  token: &str
) -> Option<(u32, u32)> {
  static CLOCK_RE: OnceLock<
    Option<Regex>
  > = OnceLock::new();
  let clock_re = CLOCK_RE
    .get_or_init(|| {
      Regex::new(
        r"(?i)^(?P<hour>\d{1,2}):(?P<minute>\d{2})\s*(?P<ampm>[ap]m)?$",
      )
      .ok()
    })
    .as_ref()?;
  let captures =
    clock_re.captures(token.trim())?;

  let raw_hour = captures
    .name("hour")?
    .as_str()
    .parse::<u32>()
    .ok()?;
  let minute = captures
    .name("minute")?
    .as_str()
    .parse::<u32>()
    .ok()?;
  if minute > 59 {
    return None;
  }

  let hour = if let Some(ampm_match) =
    captures.name("ampm")
  {
    if raw_hour == 0 || raw_hour > 12 {
      return None;
    }
    match ampm_match
      .as_str()
      .to_ascii_lowercase()
      .as_str()
    {
      | "am" => raw_hour % 12,
      | "pm" => raw_hour % 12 + 12,
      | _ => return None
    }
  } else {
    if raw_hour > 23 {
      return None;
    }
    raw_hour
  };

  Some((hour, minute))
}

pub fn parse_weekday_name(
  token: &str
) -> Option<Weekday> {
  match token.trim() {
    | "monday" | "mon" => {
      Some(Weekday::Mon)
    }
    | "tuesday" | "tue" | "tues" => {
      Some(Weekday::Tue)
    }
    | "wednesday" | "wed" => {
      Some(Weekday::Wed)
    }
    | "thursday" | "thu" | "thur"
    | "thurs" => Some(Weekday::Thu),
    | "friday" | "fri" => {
      Some(Weekday::Fri)
    }
    | "saturday" | "sat" => {
      Some(Weekday::Sat)
    }
    | "sunday" | "sun" => {
      Some(Weekday::Sun)
    }
    | _ => None
  }
}

fn next_weekday_date(
  from: NaiveDate,
  target: Weekday
) -> NaiveDate {
  let from_idx = from
    .weekday()
    .num_days_from_monday()
    as i64;
  let target_idx = target
    .num_days_from_monday()
    as i64;
  let mut delta =
    (7 + target_idx - from_idx) % 7;
  if delta == 0 {
    delta = 7;
  }
  add_days(from, delta)
}

#[must_use]
pub fn add_days(
  date: NaiveDate,
  days: i64
) -> NaiveDate {
  date
    .checked_add_signed(Duration::days(
      days
    ))
    .unwrap_or(date)
}
