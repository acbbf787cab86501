//! Cooldown Schedules
//!
//! Two schedule shapes exist: a rolling window (anchor + period) and a daily
//! cutoff at a fixed hour in a named time zone. The cutoff variant makes a
//! claim available once per calendar day, at hour H in zone Z, rather than on
//! a rolling window.

use chrono::{DateTime, Duration, TimeZone, Timelike, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

/// Per-kind cooldown schedule, built from configuration.
#[derive(Debug, Clone, PartialEq)]
pub enum CooldownSchedule {
    /// Next claim becomes available `period` after the anchor.
    Rolling { period: Duration },
    /// Next claim becomes available at the first occurrence of `hour`:00 in
    /// `zone` strictly after the anchor.
    DailyCutoff { hour: u32, zone: Tz },
}

impl CooldownSchedule {
    pub fn rolling_hours(hours: i64) -> Self {
        CooldownSchedule::Rolling {
            period: Duration::hours(hours),
        }
    }

    /// The moment the reward anchored at `anchor` becomes claimable again.
    pub fn next_eligible(&self, anchor: DateTime<Utc>) -> DateTime<Utc> {
        match self {
            CooldownSchedule::Rolling { period } => anchor + *period,
            CooldownSchedule::DailyCutoff { hour, zone } => {
                // First cutoff strictly after the anchor: one local day past
                // the most recent cutoff at or before it.
                let prev = cutoff_at_or_before(anchor, *hour, *zone);
                let date = prev.with_timezone(zone).date_naive() + Duration::days(1);
                cutoff_on_date(date, *hour, *zone).unwrap_or(prev + Duration::days(1))
            }
        }
    }

    /// The anchor value a successful claim commits at time `now`.
    ///
    /// Rolling schedules anchor at the claim time itself. Cutoff schedules
    /// anchor at the most recent occurrence of the cutoff hour, stepped back
    /// one day if `now` is before today's occurrence, so the next claim
    /// opens at the next daily cutoff rather than a full period later.
    pub fn commit_anchor(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        match self {
            CooldownSchedule::Rolling { .. } => now,
            CooldownSchedule::DailyCutoff { hour, zone } => {
                cutoff_at_or_before(now, *hour, *zone)
            }
        }
    }
}

/// Most recent occurrence of `hour`:00 in `zone` at or before `at`.
fn cutoff_at_or_before(at: DateTime<Utc>, hour: u32, zone: Tz) -> DateTime<Utc> {
    let local = at.with_timezone(&zone);
    let mut date = local.date_naive();
    if local.time().hour() < hour {
        date -= Duration::days(1);
    }
    cutoff_on_date(date, hour, zone).unwrap_or(at)
}

/// `hour`:00 in `zone` on `date`, resolved to UTC. DST gaps shift forward
/// one hour; ambiguous times take the earlier occurrence.
fn cutoff_on_date(date: chrono::NaiveDate, hour: u32, zone: Tz) -> Option<DateTime<Utc>> {
    // hour is validated < 24 at config load.
    let naive = date.and_hms_opt(hour, 0, 0)?;
    match zone.from_local_datetime(&naive).earliest() {
        Some(dt) => Some(dt.with_timezone(&Utc)),
        None => zone
            .from_local_datetime(&(naive + Duration::hours(1)))
            .earliest()
            .map(|dt| dt.with_timezone(&Utc)),
    }
}

/// Remaining wait until the next eligible claim, decomposed for display.
///
/// Hours are total elapsed hours and may exceed 24.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemainingTime {
    pub hours: i64,
    pub minutes: i64,
    pub seconds: i64,
}

impl RemainingTime {
    pub fn from_duration(remaining: Duration) -> Self {
        let total_secs = remaining.num_seconds().max(0);
        Self {
            hours: total_secs / 3600,
            minutes: (total_secs / 60) % 60,
            seconds: total_secs % 60,
        }
    }

    pub fn total_seconds(&self) -> i64 {
        self.hours * 3600 + self.minutes * 60 + self.seconds
    }
}

impl std::fmt::Display for RemainingTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut wrote = false;
        if self.hours != 0 {
            write!(f, "{}hr", self.hours)?;
            wrote = true;
        }
        if self.minutes != 0 {
            if wrote {
                f.write_str(" ")?;
            }
            write!(f, "{}min", self.minutes)?;
            wrote = true;
        }
        if self.seconds != 0 || !wrote {
            if wrote {
                f.write_str(" ")?;
            }
            write!(f, "{}s", self.seconds)?;
        }
        Ok(())
    }
}
