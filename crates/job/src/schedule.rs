//! Declarative scheduling metadata attached to a job.
//!
//! Nothing here runs anything. The host reads these values to decide when a
//! job is due, how often to retry it and when to give up on an attempt.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Days, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

/// Longest fixed interval accepted (ten years).
pub const MAX_INTERVAL: Duration = Duration::from_secs(3_650 * 86_400);

/// Largest `days_ago` accepted in a job definition (about a century).
pub const MAX_DAYS_AGO: u32 = 36_525;

// ── Interval ────────────────────────────────────────────────────────

/// Recurrence of a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ScheduleInterval {
    /// Fixed period measured from the start date.
    Every(Duration),
    /// Normalized 6-field cron expression (seconds prepended), UTC.
    Cron(String),
}

impl ScheduleInterval {
    pub fn hourly() -> Self {
        ScheduleInterval::Every(Duration::from_secs(3_600))
    }

    pub fn daily() -> Self {
        ScheduleInterval::Every(Duration::from_secs(86_400))
    }

    pub fn weekly() -> Self {
        ScheduleInterval::Every(Duration::from_secs(7 * 86_400))
    }

    /// Parse `@hourly`/`@daily`/`@weekly`, a compact duration (`6h`, `1d12h`)
    /// or a 5/6-field cron expression.
    pub fn parse(s: &str) -> Result<Self, String> {
        let s = s.trim();
        match s {
            "@hourly" => return Ok(Self::hourly()),
            "@daily" => return Ok(Self::daily()),
            "@weekly" => return Ok(Self::weekly()),
            _ => {}
        }

        if s.split_whitespace().count() > 1 {
            let normalized = normalize_cron(s);
            cron::Schedule::from_str(&normalized)
                .map_err(|e| format!("invalid cron expression '{s}': {e}"))?;
            return Ok(ScheduleInterval::Cron(normalized));
        }

        match parse_duration(s) {
            Some(d) if d > MAX_INTERVAL => Err(format!(
                "schedule interval '{s}' exceeds the maximum of {}",
                format_duration(MAX_INTERVAL)
            )),
            Some(d) if !d.is_zero() => Ok(ScheduleInterval::Every(d)),
            _ => Err(format!("invalid schedule interval '{s}'")),
        }
    }
}

impl TryFrom<String> for ScheduleInterval {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<ScheduleInterval> for String {
    fn from(interval: ScheduleInterval) -> Self {
        interval.to_string()
    }
}

impl fmt::Display for ScheduleInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScheduleInterval::Every(d) => f.write_str(&format_duration(*d)),
            ScheduleInterval::Cron(expr) => f.write_str(expr),
        }
    }
}

/// Normalize a 5-field cron expression to 6-field by prepending "0 " for seconds.
pub fn normalize_cron(expr: &str) -> String {
    let trimmed = expr.trim();
    if trimmed.split_whitespace().count() == 5 {
        format!("0 {}", trimmed)
    } else {
        trimmed.to_string()
    }
}

// ── Start date ──────────────────────────────────────────────────────

/// First eligible logical date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StartDate {
    /// Midnight UTC of the evaluation day, minus `days_ago` days.
    DaysAgo { days_ago: u32 },
    At(DateTime<Utc>),
}

impl StartDate {
    pub fn days_ago(days: u32) -> Self {
        StartDate::DaysAgo { days_ago: days }
    }

    /// Resolve to a concrete instant relative to `now`. Saturates at the
    /// earliest representable instant.
    pub fn resolve(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        match self {
            StartDate::DaysAgo { days_ago } => now
                .date_naive()
                .and_time(NaiveTime::MIN)
                .and_utc()
                .checked_sub_days(Days::new(u64::from(*days_ago)))
                .unwrap_or(DateTime::<Utc>::MIN_UTC),
            StartDate::At(at) => *at,
        }
    }
}

impl Default for StartDate {
    fn default() -> Self {
        StartDate::days_ago(0)
    }
}

// ── Task defaults ───────────────────────────────────────────────────

/// Retry, timeout and contact metadata applied to every run of a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TaskDefaults {
    #[serde(default = "default_owner")]
    pub owner: String,
    #[serde(default)]
    pub depends_on_past: bool,
    #[serde(default)]
    pub email: Vec<String>,
    #[serde(default)]
    pub email_on_failure: bool,
    #[serde(default)]
    pub email_on_retry: bool,
    #[serde(default = "default_retries")]
    pub retries: u32,
    #[serde(default = "default_retry_delay", with = "duration_str")]
    pub retry_delay: Duration,
    /// Per-attempt limit; `None` means no limit.
    #[serde(default = "default_execution_timeout", with = "duration_str::option")]
    pub execution_timeout: Option<Duration>,
}

fn default_owner() -> String {
    "metaload".to_string()
}

fn default_retries() -> u32 {
    1
}

fn default_retry_delay() -> Duration {
    Duration::from_secs(5 * 60)
}

fn default_execution_timeout() -> Option<Duration> {
    Some(Duration::from_secs(120 * 60))
}

impl Default for TaskDefaults {
    fn default() -> Self {
        Self {
            owner: default_owner(),
            depends_on_past: false,
            email: Vec::new(),
            email_on_failure: false,
            email_on_retry: false,
            retries: default_retries(),
            retry_delay: default_retry_delay(),
            execution_timeout: default_execution_timeout(),
        }
    }
}

// ── Job schedule ────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JobSchedule {
    pub interval: ScheduleInterval,
    #[serde(default)]
    pub start_date: StartDate,
    /// Run every missed interval since the last run instead of only the latest.
    #[serde(default)]
    pub catchup: bool,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub defaults: TaskDefaults,
}

impl JobSchedule {
    pub fn new(interval: ScheduleInterval) -> Self {
        Self {
            interval,
            start_date: StartDate::default(),
            catchup: false,
            description: None,
            defaults: TaskDefaults::default(),
        }
    }

    pub fn starting(mut self, start_date: StartDate) -> Self {
        self.start_date = start_date;
        self
    }

    pub fn catchup(mut self, catchup: bool) -> Self {
        self.catchup = catchup;
        self
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_defaults(mut self, defaults: TaskDefaults) -> Self {
        self.defaults = defaults;
        self
    }

    /// Range checks serde cannot express.
    pub fn validate(&self) -> Result<(), String> {
        if let StartDate::DaysAgo { days_ago } = self.start_date {
            if days_ago > MAX_DAYS_AGO {
                return Err(format!(
                    "start_date.days_ago {days_ago} exceeds the maximum of {MAX_DAYS_AGO}"
                ));
            }
        }
        if let ScheduleInterval::Every(period) = self.interval {
            if period > MAX_INTERVAL {
                return Err(format!(
                    "schedule interval {} exceeds the maximum of {}",
                    format_duration(period),
                    format_duration(MAX_INTERVAL)
                ));
            }
        }
        Ok(())
    }
}

// ── Durations ───────────────────────────────────────────────────────

/// Parse a compact duration string: `Xd`, `Xh`, `Xm`, `Xs`, combinable
/// ("2h30m", "1d12h"). A bare number is seconds.
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }

    let mut total_secs: u64 = 0;
    let mut num_buf = String::new();
    let mut found_unit = false;

    for ch in s.chars() {
        if ch.is_ascii_digit() {
            num_buf.push(ch);
        } else {
            let n: u64 = num_buf.parse().ok()?;
            num_buf.clear();
            let unit = match ch {
                'd' => 86_400,
                'h' => 3_600,
                'm' => 60,
                's' => 1,
                _ => return None,
            };
            total_secs = total_secs.checked_add(n.checked_mul(unit)?)?;
            found_unit = true;
        }
    }

    if !num_buf.is_empty() {
        if found_unit {
            // "30m15" is ambiguous.
            return None;
        }
        total_secs = num_buf.parse().ok()?;
    }

    Some(Duration::from_secs(total_secs))
}

/// Inverse of [`parse_duration`] for whole seconds: `5400s` → `1h30m`.
pub fn format_duration(d: Duration) -> String {
    let mut secs = d.as_secs();
    if secs == 0 {
        return "0s".to_string();
    }
    let mut out = String::new();
    for (unit, size) in [('d', 86_400), ('h', 3_600), ('m', 60), ('s', 1)] {
        if secs >= size {
            out.push_str(&format!("{}{}", secs / size, unit));
            secs %= size;
        }
    }
    out
}

pub(crate) mod duration_str {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&super::format_duration(*d))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let raw = String::deserialize(d)?;
        super::parse_duration(&raw)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid duration '{raw}'")))
    }

    pub mod option {
        use std::time::Duration;

        use serde::{Deserialize, Deserializer, Serializer};

        pub fn serialize<S: Serializer>(d: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
            match d {
                Some(d) => super::serialize(d, s),
                None => s.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
            match Option::<String>::deserialize(d)? {
                Some(raw) => super::super::parse_duration(&raw)
                    .map(Some)
                    .ok_or_else(|| serde::de::Error::custom(format!("invalid duration '{raw}'"))),
                None => Ok(None),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn parse_duration_components() {
        assert_eq!(parse_duration("5m"), Some(Duration::from_secs(300)));
        assert_eq!(parse_duration("2h30m"), Some(Duration::from_secs(9_000)));
        assert_eq!(parse_duration("1d"), Some(Duration::from_secs(86_400)));
        assert_eq!(parse_duration("90"), Some(Duration::from_secs(90)));
        assert_eq!(parse_duration(""), None);
        assert_eq!(parse_duration("30m15"), None);
        assert_eq!(parse_duration("5w"), None);
    }

    #[test]
    fn format_duration_uses_largest_units() {
        assert_eq!(format_duration(Duration::from_secs(5_400)), "1h30m");
        assert_eq!(format_duration(Duration::from_secs(86_400)), "1d");
        assert_eq!(format_duration(Duration::from_secs(7_200)), "2h");
        assert_eq!(format_duration(Duration::ZERO), "0s");
    }

    #[test]
    fn interval_presets_and_cron() {
        assert_eq!(ScheduleInterval::parse("@daily").unwrap(), ScheduleInterval::daily());
        assert_eq!(
            ScheduleInterval::parse("6h").unwrap(),
            ScheduleInterval::Every(Duration::from_secs(21_600))
        );
        assert_eq!(
            ScheduleInterval::parse("0 6 * * 1-5").unwrap(),
            ScheduleInterval::Cron("0 0 6 * * 1-5".to_string())
        );
        assert!(ScheduleInterval::parse("0s").is_err());
        assert!(ScheduleInterval::parse("100000000d").is_err());
        assert!(ScheduleInterval::parse("3650d").is_ok());
        assert!(ScheduleInterval::parse("not a cron at all").is_err());
    }

    #[test]
    fn days_ago_resolves_to_midnight() {
        let now = Utc.with_ymd_and_hms(2024, 3, 10, 15, 42, 7).unwrap();
        assert_eq!(
            StartDate::days_ago(2).resolve(now),
            Utc.with_ymd_and_hms(2024, 3, 8, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn huge_days_ago_saturates_instead_of_panicking() {
        let now = Utc.with_ymd_and_hms(2024, 3, 10, 15, 42, 7).unwrap();
        assert_eq!(StartDate::days_ago(u32::MAX).resolve(now), DateTime::<Utc>::MIN_UTC);
    }

    #[test]
    fn validate_bounds_days_ago_and_interval() {
        let ok = JobSchedule::new(ScheduleInterval::daily()).starting(StartDate::days_ago(MAX_DAYS_AGO));
        assert!(ok.validate().is_ok());

        let far = JobSchedule::new(ScheduleInterval::daily()).starting(StartDate::days_ago(4_000_000_000));
        assert!(far.validate().unwrap_err().contains("days_ago"));

        let long = JobSchedule::new(ScheduleInterval::Every(MAX_INTERVAL + Duration::from_secs(1)));
        assert!(long.validate().unwrap_err().contains("interval"));
    }

    #[test]
    fn schedule_yaml_defaults() {
        let schedule: JobSchedule = serde_yaml::from_str("interval: 1d\n").unwrap();
        assert_eq!(schedule.interval, ScheduleInterval::daily());
        assert!(!schedule.catchup);
        assert_eq!(schedule.defaults, TaskDefaults::default());
        assert_eq!(schedule.defaults.retries, 1);
        assert_eq!(schedule.defaults.retry_delay, Duration::from_secs(300));
        assert_eq!(schedule.defaults.execution_timeout, Some(Duration::from_secs(7_200)));
    }

    #[test]
    fn schedule_yaml_full() {
        let yaml = r#"
interval: "@hourly"
start_date: 2024-01-01T00:00:00Z
catchup: true
description: hourly sync
defaults:
  owner: data-platform
  email: [oncall@example.com]
  email_on_failure: true
  retries: 3
  retry_delay: 30s
  execution_timeout: ~
"#;
        let schedule: JobSchedule = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(schedule.interval, ScheduleInterval::hourly());
        assert_eq!(
            schedule.start_date,
            StartDate::At(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap())
        );
        assert!(schedule.catchup);
        assert_eq!(schedule.defaults.owner, "data-platform");
        assert!(schedule.defaults.email_on_failure);
        assert_eq!(schedule.defaults.retries, 3);
        assert_eq!(schedule.defaults.retry_delay, Duration::from_secs(30));
        assert_eq!(schedule.defaults.execution_timeout, None);
    }

    #[test]
    fn schedule_serializes_compact_durations() {
        let schedule = JobSchedule::new(ScheduleInterval::daily()).starting(StartDate::days_ago(2));
        let yaml = serde_yaml::to_string(&schedule).unwrap();
        assert!(yaml.contains("interval: 1d"));
        assert!(yaml.contains("days_ago: 2"));
        assert!(yaml.contains("retry_delay: 5m"));
        let back: JobSchedule = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(back, schedule);
    }
}
