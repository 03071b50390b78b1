use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use chrono::{
  DateTime,
  Datelike,
  Duration,
  NaiveDate,
  NaiveDateTime,
  Utc,
  Weekday
};
use chrono_tz::Tz;
use regex::Regex;
use serde::Serialize;

use crate::error::TrackerError;

pub const MONTH_NAMES: [&str; 12] = [
  "January",
  "February",
  "March",
  "April",
  "May",
  "June",
  "July",
  "August",
  "September",
  "October",
  "November",
  "December"
];

pub const WEEKDAY_LABELS: [&str; 7] = [
  "Mon", "Tue", "Wed", "Thu", "Fri",
  "Sat", "Sun"
];

const ISO_DATE_FORMAT: &str =
  "%Y-%m-%d";

static STORED_DATE_RE: LazyLock<
  Result<Regex, regex::Error>
> = LazyLock::new(|| {
  Regex::new(
    r"^\s*(?P<year>\d{1,6})-(?P<month>\d{1,2})-(?P<day>\d{1,2})\s*$",
  )
});

static RELATIVE_DATE_RE: LazyLock<
  Result<Regex, regex::Error>
> = LazyLock::new(|| {
  Regex::new(
    r"^\+(?P<num>\d{1,4})(?P<unit>[dwm])$"
  )
});

/// Calendar-day distance from today to a
/// deadline. `days` is always positive.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Serialize,
)]
#[serde(
  tag = "kind",
  rename_all = "lowercase"
)]
pub enum DaysLeft {
  Today,
  Future { days: u64 },
  Overdue { days: u64 }
}

impl DaysLeft {
  #[must_use]
  pub fn is_overdue(&self) -> bool {
    matches!(self, Self::Overdue { .. })
  }
}

impl fmt::Display for DaysLeft {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>
  ) -> fmt::Result {
    match self {
      | Self::Today => {
        write!(f, "Today!")
      }
      | Self::Future { days } => {
        write!(f, "{days} days left")
      }
      | Self::Overdue { days } => {
        write!(
          f,
          "{days} days ago (Expired)"
        )
      }
    }
  }
}

#[must_use]
pub fn days_until(
  today: NaiveDate,
  due: NaiveDate
) -> DaysLeft {
  let diff =
    due.signed_duration_since(today)
      .num_days();
  match diff {
    | 0 => DaysLeft::Today,
    | d if d > 0 => {
      DaysLeft::Future {
        days: d.unsigned_abs()
      }
    }
    | d => {
      DaysLeft::Overdue {
        days: d.unsigned_abs()
      }
    }
  }
}

/// Same as [`days_until`] but drops the
/// time of day from both inputs first.
#[must_use]
pub fn days_until_at(
  now: NaiveDateTime,
  due: NaiveDateTime
) -> DaysLeft {
  days_until(now.date(), due.date())
}

/// Number of days in `month` (1-12) of
/// `year`: the day before the first of
/// the following month. Returns 0 for a
/// month outside 1-12.
#[must_use]
pub fn month_length(
  year: i32,
  month: u32
) -> u32 {
  if !(1..=12).contains(&month) {
    return 0;
  }
  let (next_year, next_month) =
    if month == 12 {
      (year.saturating_add(1), 1_u32)
    } else {
      (year, month + 1)
    };
  NaiveDate::from_ymd_opt(
    next_year, next_month, 1
  )
  .and_then(|first| first.pred_opt())
  .map(|last| last.day())
  .unwrap_or(0)
}

/// Blank cells ahead of day 1 in a
/// Monday-first week grid.
#[must_use]
pub fn first_weekday_offset(
  year: i32,
  month: u32
) -> u32 {
  let Some(first) =
    NaiveDate::from_ymd_opt(
      year, month, 1
    )
  else {
    return 0;
  };
  let native = first
    .weekday()
    .num_days_from_sunday();
  if native == 0 { 6 } else { native - 1 }
}

#[must_use]
pub fn month_name(
  month: u32
) -> &'static str {
  month
    .checked_sub(1)
    .and_then(|idx| {
      MONTH_NAMES.get(idx as usize)
    })
    .copied()
    .unwrap_or("?")
}

#[must_use]
pub fn format_iso(
  date: NaiveDate
) -> String {
  date
    .format(ISO_DATE_FORMAT)
    .to_string()
}

/// Reads a persisted `year-month-day`
/// string. Returns `None` for anything
/// that is not a real calendar date.
#[must_use]
pub fn parse_stored_date(
  raw: &str
) -> Option<NaiveDate> {
  let caps = STORED_DATE_RE
    .as_ref()
    .ok()?
    .captures(raw)?;
  let year: i32 = caps
    .name("year")?
    .as_str()
    .parse()
    .ok()?;
  let month: u32 = caps
    .name("month")?
    .as_str()
    .parse()
    .ok()?;
  let day: u32 = caps
    .name("day")?
    .as_str()
    .parse()
    .ok()?;
  NaiveDate::from_ymd_opt(
    year, month, day
  )
}

/// Parses a deadline typed by the user.
/// Accepts ISO dates plus a handful of
/// relative expressions anchored on
/// `today`.
#[tracing::instrument(skip(today), fields(input = input))]
pub fn parse_date_input(
  input: &str,
  today: NaiveDate
) -> Result<NaiveDate, TrackerError> {
  let token = input.trim();
  if token.is_empty() {
    return Err(
      TrackerError::invalid_input(
        "Please enter both task name \
         and deadline date."
      )
    );
  }
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

  if let Some(date) =
    parse_stored_date(token)
  {
    return Ok(date);
  }

  let rel_re = RELATIVE_DATE_RE
    .as_ref()
    .map_err(|e| {
      TrackerError::invalid_input(format!(
        "internal regex compile \
         failure: {e}"
      ))
    })?;

  if let Some(caps) =
    rel_re.captures(&lower)
  {
    let amount: i64 = caps["num"]
      .parse()
      .map_err(|_| {
        TrackerError::invalid_input(
          format!(
            "invalid offset: {token}"
          )
        )
      })?;
    let date = match &caps["unit"] {
      | "d" => add_days(today, amount),
      | "w" => {
        add_days(today, amount * 7)
      }
      | _ => {
        shift_months(
          today,
          amount as i32
        )
      }
    };
    return Ok(date);
  }

  if let Ok(weekday) =
    Weekday::from_str(&lower)
  {
    return Ok(next_weekday(
      today, weekday
    ));
  }

  tracing::debug!(
    input = token,
    "unrecognized date expression"
  );
  Err(TrackerError::invalid_input(
    format!(
      "unrecognized date: {token} \
       (expected YYYY-MM-DD)"
    )
  ))
}

/// The calendar date "now" falls on,
/// in `timezone` or the system zone.
#[must_use]
pub fn today_in(
  timezone: Option<&Tz>,
  now: DateTime<Utc>
) -> NaiveDate {
  match timezone {
    | Some(tz) => {
      now.with_timezone(tz).date_naive()
    }
    | None => {
      now
        .with_timezone(&chrono::Local)
        .date_naive()
    }
  }
}

pub fn parse_timezone(
  raw: &str,
  source: &str
) -> Option<Tz> {
  let trimmed = raw.trim();
  if trimmed.is_empty() {
    tracing::warn!(
      source,
      "timezone source was empty"
    );
    return None;
  }

  match trimmed.parse::<Tz>() {
    | Ok(tz) => {
      tracing::info!(
        source,
        timezone = %trimmed,
        "configured timezone"
      );
      Some(tz)
    }
    | Err(err) => {
      tracing::error!(
        source,
        timezone = %trimmed,
        error = %err,
        "failed to parse timezone id"
      );
      None
    }
  }
}

fn add_days(
  date: NaiveDate,
  days: i64
) -> NaiveDate {
  date
    .checked_add_signed(Duration::days(
      days
    ))
    .unwrap_or(date)
}

fn shift_months(
  date: NaiveDate,
  months: i32
) -> NaiveDate {
  let index = date.year() as i64 * 12
    + date.month0() as i64
    + months as i64;
  let year = index.div_euclid(12) as i32;
  let month =
    index.rem_euclid(12) as u32 + 1;
  let day = date
    .day()
    .min(month_length(year, month));
  NaiveDate::from_ymd_opt(
    year, month, day
  )
  .unwrap_or(date)
}

fn next_weekday(
  today: NaiveDate,
  weekday: Weekday
) -> NaiveDate {
  let current = today
    .weekday()
    .num_days_from_monday()
    as i64;
  let target =
    weekday.num_days_from_monday()
      as i64;
  let mut diff =
    (7 + target - current) % 7;
  if diff == 0 {
    diff = 7;
  }
  add_days(today, diff)
}

#[cfg(test)]
mod tests {
  use chrono::NaiveDate;

  use super::{
    DaysLeft,
    RELATIVE_DATE_RE,
    STORED_DATE_RE,
    days_until,
    days_until_at,
    first_weekday_offset,
    month_length,
    parse_date_input,
    parse_stored_date
  };

  fn date(
    y: i32,
    m: u32,
    d: u32
  ) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d)
      .expect("valid date")
  }

  #[test]
  fn same_day_reads_today_at_any_hour()
  {
    let morning = date(2024, 3, 10)
      .and_hms_opt(0, 0, 1)
      .expect("valid time");
    let night = date(2024, 3, 10)
      .and_hms_opt(23, 59, 59)
      .expect("valid time");
    assert_eq!(
      days_until_at(night, morning),
      DaysLeft::Today
    );
    assert_eq!(
      days_until_at(morning, night),
      DaysLeft::Today
    );
    assert_eq!(
      days_until(
        date(2024, 3, 10),
        date(2024, 3, 10)
      ),
      DaysLeft::Today
    );
  }

  #[test]
  fn future_and_overdue_are_absolute() {
    let today = date(2024, 3, 10);
    assert_eq!(
      days_until(today, date(2024, 3, 13)),
      DaysLeft::Future { days: 3 }
    );
    assert_eq!(
      days_until(today, date(2024, 3, 5)),
      DaysLeft::Overdue { days: 5 }
    );
    assert_eq!(
      DaysLeft::Overdue { days: 5 }
        .to_string(),
      "5 days ago (Expired)"
    );
    assert_eq!(
      DaysLeft::Future { days: 1 }
        .to_string(),
      "1 days left"
    );
  }

  #[test]
  fn late_evening_to_next_midnight_is_one_day()
  {
    let late = date(2024, 3, 30)
      .and_hms_opt(23, 30, 0)
      .expect("valid time");
    let due = date(2024, 3, 31)
      .and_hms_opt(0, 0, 0)
      .expect("valid time");
    assert_eq!(
      days_until_at(late, due),
      DaysLeft::Future { days: 1 }
    );
  }

  #[test]
  fn february_follows_gregorian_leap_rule()
  {
    for year in [1900, 2000, 2023, 2024, 2100, 2400] {
      let leap = (year % 4 == 0
        && year % 100 != 0)
        || year % 400 == 0;
      assert_eq!(
        month_length(year, 2) == 29,
        leap,
        "year {year}"
      );
    }
    assert_eq!(month_length(2024, 1), 31);
    assert_eq!(month_length(2024, 4), 30);
    assert_eq!(month_length(2024, 12), 31);
    assert_eq!(month_length(2024, 13), 0);
  }

  #[test]
  fn weekday_offset_is_monday_based() {
    // 2024-01-01 was a Monday.
    assert_eq!(
      first_weekday_offset(2024, 1),
      0
    );
    // 2024-03-01 was a Friday.
    assert_eq!(
      first_weekday_offset(2024, 3),
      4
    );
    // 2024-09-01 was a Sunday.
    assert_eq!(
      first_weekday_offset(2024, 9),
      6
    );
  }

  #[test]
  fn offsets_and_days_tile_whole_weeks() {
    for year in 1999..=2030 {
      for month in 1..=12 {
        let lead =
          first_weekday_offset(year, month);
        let days = month_length(year, month);
        assert!(lead <= 6);
        let trailing =
          (7 - (lead + days) % 7) % 7;
        assert_eq!(
          (lead + days + trailing) % 7,
          0
        );
      }
    }
  }

  #[test]
  fn stored_dates_must_be_real() {
    assert_eq!(
      parse_stored_date("2024-03-01"),
      Some(date(2024, 3, 1))
    );
    assert_eq!(
      parse_stored_date(" 2024-3-1 "),
      Some(date(2024, 3, 1))
    );
    assert_eq!(
      parse_stored_date("2023-02-29"),
      None
    );
    assert_eq!(
      parse_stored_date("not a date"),
      None
    );
    assert_eq!(parse_stored_date(""), None);
  }

  #[test]
  fn shared_patterns_compile_once_and_are_reused() {
    assert!(STORED_DATE_RE.is_ok());
    assert!(RELATIVE_DATE_RE.is_ok());
    let dates: Vec<_> = (1..=28)
      .map(|d| {
        parse_stored_date(&format!(
          "2024-02-{d:02}"
        ))
      })
      .collect();
    assert!(
      dates.iter().all(Option::is_some)
    );
  }

  #[test]
  fn parses_relative_inputs() {
    // Wednesday
    let today = date(2026, 2, 18);
    assert_eq!(
      parse_date_input("today", today)
        .expect("today"),
      today
    );
    assert_eq!(
      parse_date_input("Tomorrow", today)
        .expect("tomorrow"),
      date(2026, 2, 19)
    );
    assert_eq!(
      parse_date_input("+2w", today)
        .expect("weeks"),
      date(2026, 3, 4)
    );
    assert_eq!(
      parse_date_input("friday", today)
        .expect("weekday"),
      date(2026, 2, 20)
    );
    assert_eq!(
      parse_date_input("wed", today)
        .expect("same weekday"),
      date(2026, 2, 25)
    );
    assert_eq!(
      parse_date_input(
        "+1m",
        date(2024, 1, 31)
      )
      .expect("month clamp"),
      date(2024, 2, 29)
    );
  }

  #[test]
  fn rejects_empty_and_garbage_input() {
    let today = date(2026, 2, 18);
    assert!(
      parse_date_input("  ", today)
        .is_err()
    );
    assert!(
      parse_date_input("2024-02-30", today)
        .is_err()
    );
    assert!(
      parse_date_input("someday", today)
        .is_err()
    );
  }
}
