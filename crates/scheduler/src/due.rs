//! Which logical dates of a schedule are due.
//!
//! A schedule produces logical dates (ticks): `start + k * interval` for
//! fixed intervals, or the cron's fire times at or after `start`. A tick is
//! due once `now` has reached it and it is later than the last recorded
//! logical date.

use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use cron::Schedule;
use metaload_job::{JobSchedule, ScheduleInterval};
use tracing::warn;

/// Upper bound on logical dates returned by one catchup evaluation. The
/// remainder is picked up on later ticks.
pub const MAX_CATCHUP_RUNS: usize = 1000;

/// Lookback windows tried, smallest first, when searching for the latest
/// cron tick without walking the whole history.
const CRON_LOOKBACK_HOURS: &[i64] = &[1, 24, 24 * 7, 24 * 32, 24 * 366];

/// Logical dates due at `now`, oldest first.
///
/// Without catchup only the most recent due tick is returned. Ticks that
/// fall outside the representable date range are never due.
pub fn due_runs(
    schedule: &JobSchedule,
    start: DateTime<Utc>,
    last_logical: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> Vec<DateTime<Utc>> {
    if now < start {
        return Vec::new();
    }
    match &schedule.interval {
        ScheduleInterval::Every(period) => match period_millis(*period) {
            Some(period_ms) => interval_due(period_ms, start, last_logical, now, schedule.catchup),
            None => Vec::new(),
        },
        ScheduleInterval::Cron(expr) => match Schedule::from_str(expr) {
            Ok(cron) => cron_due(&cron, start, last_logical, now, schedule.catchup),
            Err(e) => {
                warn!(cron = %expr, error = %e, "invalid cron expression");
                Vec::new()
            }
        },
    }
}

/// First tick strictly after `after` (or the start itself if it lies ahead).
pub fn next_tick(
    schedule: &JobSchedule,
    start: DateTime<Utc>,
    after: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    if after < start {
        return match &schedule.interval {
            ScheduleInterval::Every(_) => Some(start),
            ScheduleInterval::Cron(expr) => Schedule::from_str(expr)
                .ok()?
                .after(&just_before(start))
                .next(),
        };
    }
    match &schedule.interval {
        ScheduleInterval::Every(period) => {
            let period_ms = period_millis(*period)?;
            let k = ticks_between(start, after, period_ms);
            tick_at(start, period_ms, k.checked_add(1)?)
        }
        ScheduleInterval::Cron(expr) => Schedule::from_str(expr).ok()?.after(&after).next(),
    }
}

/// Period in whole milliseconds; `None` for zero or out-of-range periods.
fn period_millis(period: Duration) -> Option<i64> {
    i64::try_from(period.as_millis()).ok().filter(|ms| *ms > 0)
}

/// Number of whole periods from `start` to `at` (`at >= start`).
fn ticks_between(start: DateTime<Utc>, at: DateTime<Utc>, period_ms: i64) -> i64 {
    at.signed_duration_since(start).num_milliseconds() / period_ms
}

/// `start + k * period`, or `None` past the end of the date range.
fn tick_at(start: DateTime<Utc>, period_ms: i64, k: i64) -> Option<DateTime<Utc>> {
    let offset = ChronoDuration::try_milliseconds(period_ms.checked_mul(k)?)?;
    start.checked_add_signed(offset)
}

/// Exclusive lower bound that still lets `t` itself fire.
fn just_before(t: DateTime<Utc>) -> DateTime<Utc> {
    t.checked_sub_signed(ChronoDuration::seconds(1)).unwrap_or(t)
}

fn interval_due(
    period_ms: i64,
    start: DateTime<Utc>,
    last: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    catchup: bool,
) -> Vec<DateTime<Utc>> {
    let k_max = ticks_between(start, now, period_ms);
    let k_min = match last {
        Some(last) if last >= start => ticks_between(start, last, period_ms).saturating_add(1),
        _ => 0,
    };
    if k_min > k_max {
        return Vec::new();
    }

    if catchup {
        let k_end = k_max.min(k_min.saturating_add(MAX_CATCHUP_RUNS as i64 - 1));
        (k_min..=k_end)
            .map_while(|k| tick_at(start, period_ms, k))
            .collect()
    } else {
        tick_at(start, period_ms, k_max).into_iter().collect()
    }
}

fn cron_due(
    cron: &Schedule,
    start: DateTime<Utc>,
    last: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    catchup: bool,
) -> Vec<DateTime<Utc>> {
    let floor = match last {
        Some(last) if last >= start => last,
        _ => just_before(start),
    };
    if floor >= now {
        return Vec::new();
    }

    if catchup {
        return cron
            .after(&floor)
            .take_while(|t| *t <= now)
            .take(MAX_CATCHUP_RUNS)
            .collect();
    }

    for hours in CRON_LOOKBACK_HOURS {
        let from = now
            .checked_sub_signed(ChronoDuration::hours(*hours))
            .map_or(floor, |from| from.max(floor));
        if let Some(latest) = cron.after(&from).take_while(|t| *t <= now).last() {
            return vec![latest];
        }
        if from == floor {
            return Vec::new();
        }
    }
    cron.after(&floor)
        .take_while(|t| *t <= now)
        .last()
        .into_iter()
        .collect()
}
