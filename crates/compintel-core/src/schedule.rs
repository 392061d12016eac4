//! Digest delivery cadence.
//!
//! The schedule is a single process-wide value. It is replaced wholesale on
//! update and never mutated field by field.

use chrono::{DateTime, Datelike, Duration, Months, Utc, Weekday};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

use crate::{Error, Result};

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Default,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  AsRefStr,
)]
pub enum Frequency {
  Hourly,
  Daily,
  #[default]
  Weekly,
  #[serde(rename = "Bi-Weekly")]
  #[strum(serialize = "Bi-Weekly")]
  BiWeekly,
  Monthly,
}

impl Frequency {
  /// Whether the day-of-week field affects this cadence.
  pub fn uses_day_of_week(self) -> bool { matches!(self, Self::Weekly | Self::BiWeekly) }
}

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Default,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  AsRefStr,
)]
pub enum DayOfWeek {
  #[default]
  Monday,
  Tuesday,
  Wednesday,
  Thursday,
  Friday,
  Saturday,
  Sunday,
}

impl From<DayOfWeek> for Weekday {
  fn from(d: DayOfWeek) -> Self {
    match d {
      DayOfWeek::Monday => Weekday::Mon,
      DayOfWeek::Tuesday => Weekday::Tue,
      DayOfWeek::Wednesday => Weekday::Wed,
      DayOfWeek::Thursday => Weekday::Thu,
      DayOfWeek::Friday => Weekday::Fri,
      DayOfWeek::Saturday => Weekday::Sat,
      DayOfWeek::Sunday => Weekday::Sun,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DigestSchedule {
  pub frequency:   Frequency,
  pub day_of_week: DayOfWeek,
}

impl DigestSchedule {
  /// Build a schedule from caller-supplied strings.
  ///
  /// `frequency` must be one of `Hourly`, `Daily`, `Weekly`, `Bi-Weekly`,
  /// `Monthly`; `day_of_week` (if given) one of the seven English day names.
  /// An absent day defaults to Monday.
  pub fn parse(frequency: &str, day_of_week: Option<&str>) -> Result<Self> {
    let frequency: Frequency = frequency.trim().parse().map_err(|_| {
      Error::Validation(format!(
        "unknown frequency {frequency:?}; expected Hourly, Daily, Weekly, Bi-Weekly or Monthly"
      ))
    })?;
    let day_of_week = match day_of_week {
      None => DayOfWeek::default(),
      Some(raw) => raw
        .trim()
        .parse()
        .map_err(|_| Error::Validation(format!("unknown day of week {raw:?}")))?,
    };
    Ok(Self { frequency, day_of_week })
  }

  /// Whether a digest should go out at `now`, given when the last one was
  /// sent.
  ///
  /// `tolerance` is how early a check may come relative to the cadence and
  /// still count, so a checker ticking at the cadence itself does not skip
  /// every other slot. It is capped at half the cadence.
  pub fn is_due(
    &self,
    last_sent: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    tolerance: Duration,
  ) -> bool {
    let on_day = now.weekday() == Weekday::from(self.day_of_week);
    let elapsed = |min: Duration| {
      let min = min - tolerance.clamp(Duration::zero(), min / 2);
      last_sent.is_none_or(|last| now - last >= min)
    };

    match self.frequency {
      Frequency::Hourly => elapsed(Duration::hours(1)),
      Frequency::Daily => elapsed(Duration::hours(24)),
      Frequency::Weekly => on_day && elapsed(Duration::days(6)),
      Frequency::BiWeekly => on_day && elapsed(Duration::days(13)),
      Frequency::Monthly => last_sent.is_none_or(|last| {
        let early = tolerance.clamp(Duration::zero(), Duration::days(14));
        last
          .checked_add_months(Months::new(1))
          .is_none_or(|next| next - early <= now)
      }),
    }
  }
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone;

  use super::*;

  // 2024-01-01 was a Monday.
  fn monday_noon() -> DateTime<Utc> { Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap() }

  #[test]
  fn parse_accepts_known_values() {
    let s = DigestSchedule::parse("Bi-Weekly", Some("Friday")).unwrap();
    assert_eq!(s.frequency, Frequency::BiWeekly);
    assert_eq!(s.day_of_week, DayOfWeek::Friday);

    let s = DigestSchedule::parse("Daily", None).unwrap();
    assert_eq!(s.day_of_week, DayOfWeek::Monday);
  }

  #[test]
  fn parse_rejects_unknown_values() {
    assert!(matches!(
      DigestSchedule::parse("Fortnightly", None),
      Err(Error::Validation(_))
    ));
    assert!(matches!(
      DigestSchedule::parse("Weekly", Some("Funday")),
      Err(Error::Validation(_))
    ));
  }

  #[test]
  fn serialises_with_display_names() {
    let s = DigestSchedule { frequency: Frequency::BiWeekly, day_of_week: DayOfWeek::Sunday };
    let json = serde_json::to_value(s).unwrap();
    assert_eq!(json["frequency"], "Bi-Weekly");
    assert_eq!(json["day_of_week"], "Sunday");
  }

  #[test]
  fn weekly_is_due_only_on_its_day() {
    let s = DigestSchedule::parse("Weekly", Some("Monday")).unwrap();
    let now = monday_noon();
    assert!(s.is_due(None, now, Duration::zero()));
    assert!(!s.is_due(None, now + Duration::days(1), Duration::zero()));
    assert!(!s.is_due(Some(now - Duration::hours(3)), now, Duration::zero()));
    assert!(s.is_due(Some(now - Duration::days(7)), now, Duration::zero()));
  }

  #[test]
  fn bi_weekly_skips_alternate_weeks() {
    let s = DigestSchedule::parse("Bi-Weekly", Some("Monday")).unwrap();
    let now = monday_noon();
    assert!(!s.is_due(Some(now - Duration::days(7)), now, Duration::zero()));
    assert!(s.is_due(Some(now - Duration::days(14)), now, Duration::zero()));
  }

  #[test]
  fn hourly_daily_and_monthly_use_elapsed_time() {
    let now = monday_noon();
    let hourly = DigestSchedule::parse("Hourly", None).unwrap();
    assert!(!hourly.is_due(Some(now - Duration::minutes(30)), now, Duration::zero()));
    assert!(hourly.is_due(Some(now - Duration::minutes(61)), now, Duration::zero()));

    let daily = DigestSchedule::parse("Daily", None).unwrap();
    assert!(!daily.is_due(Some(now - Duration::hours(23)), now, Duration::zero()));
    assert!(daily.is_due(Some(now - Duration::hours(24)), now, Duration::zero()));

    let monthly = DigestSchedule::parse("Monthly", None).unwrap();
    assert!(!monthly.is_due(Some(now - Duration::days(20)), now, Duration::zero()));
    assert!(monthly.is_due(Some(now - Duration::days(31)), now, Duration::zero()));
  }

  #[test]
  fn a_check_ticking_at_the_cadence_does_not_skip_slots() {
    let now = monday_noon();
    let tolerance = Duration::minutes(30);
    let hourly = DigestSchedule::parse("Hourly", None).unwrap();
    let just_short = now - Duration::milliseconds(3_599_999);
    assert!(!hourly.is_due(Some(just_short), now, Duration::zero()));
    assert!(hourly.is_due(Some(just_short), now, tolerance));
    assert!(!hourly.is_due(Some(now - Duration::minutes(5)), now, tolerance));

    // Never more than half the cadence early.
    assert!(!hourly.is_due(Some(now - Duration::minutes(29)), now, Duration::hours(2)));

    let monthly = DigestSchedule::parse("Monthly", None).unwrap();
    assert!(monthly.is_due(Some(now - Duration::days(30)), now, Duration::days(2)));
  }
}
