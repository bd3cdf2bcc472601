// harvester-core/src/domain/schedule.rs

use chrono::{Datelike, Days, Months, NaiveDate, NaiveDateTime, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::alert::Severity;
use crate::domain::error::DomainError;

/// The `schedule` config section.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ScheduleConfig {
    #[serde(default)]
    pub daily: DailyJobConfig,
    #[serde(default)]
    pub weekly: WeeklyJobConfig,
    #[serde(default)]
    pub monthly: MonthlyJobConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DailyJobConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "two_am")]
    pub time: String,
    #[serde(default)]
    pub extractions: Vec<String>,
}

impl Default for DailyJobConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            time: two_am(),
            extractions: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WeeklyJobConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "sunday")]
    pub day: String,
    #[serde(default = "midnight")]
    pub time: String,
    #[serde(default)]
    pub extractions: Vec<String>,
}

impl Default for WeeklyJobConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            day: sunday(),
            time: midnight(),
            extractions: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MonthlyJobConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "first_day")]
    pub day: u32,
    #[serde(default = "midnight")]
    pub time: String,
    #[serde(default)]
    pub extractions: Vec<String>,
}

impl Default for MonthlyJobConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            day: first_day(),
            time: midnight(),
            extractions: Vec::new(),
        }
    }
}

fn two_am() -> String {
    "02:00".to_string()
}
fn midnight() -> String {
    "00:00".to_string()
}
fn sunday() -> String {
    "sunday".to_string()
}
fn first_day() -> u32 {
    1
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobKind {
    Daily,
    Weekly,
    Monthly,
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobKind::Daily => f.write_str("daily"),
            JobKind::Weekly => f.write_str("weekly"),
            JobKind::Monthly => f.write_str("monthly"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cadence {
    Daily,
    Weekly(Weekday),
    Monthly(u32),
}

/// What a job asks of the pipeline when it fires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobPlan {
    pub incremental: bool,
    /// Days back from today; `None` leaves the window to checkpoints or the full table.
    pub window_days: Option<u64>,
    /// `None` means every configured source.
    pub sources: Option<Vec<String>>,
    pub failure_severity: Severity,
}

impl JobPlan {
    /// `(start, end)` for a job firing on `today`.
    pub fn window(&self, today: NaiveDate) -> (Option<NaiveDate>, Option<NaiveDate>) {
        match self.window_days {
            Some(days) => (today.checked_sub_days(Days::new(days)), Some(today)),
            None => (None, None),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledJob {
    pub kind: JobKind,
    pub cadence: Cadence,
    pub time: NaiveTime,
    pub plan: JobPlan,
}

impl ScheduledJob {
    /// First fire time strictly after `after`.
    pub fn next_occurrence(&self, after: NaiveDateTime) -> Option<NaiveDateTime> {
        let start = after.date();
        match self.cadence {
            Cadence::Daily => (0..=1)
                .filter_map(|d| start.checked_add_days(Days::new(d)))
                .map(|d| d.and_time(self.time))
                .find(|t| *t > after),
            Cadence::Weekly(weekday) => (0..=7)
                .filter_map(|d| start.checked_add_days(Days::new(d)))
                .filter(|d| d.weekday() == weekday)
                .map(|d| d.and_time(self.time))
                .find(|t| *t > after),
            Cadence::Monthly(day) => {
                let first = start.with_day(1)?;
                // Months without the target day (e.g. the 31st) are skipped.
                (0..=48)
                    .filter_map(|m| first.checked_add_months(Months::new(m)))
                    .filter_map(|m| m.with_day(day))
                    .map(|d| d.and_time(self.time))
                    .find(|t| *t > after)
            }
        }
    }
}

impl ScheduleConfig {
    /// Enabled jobs, with times and days parsed. Malformed entries are config errors.
    pub fn jobs(&self) -> Result<Vec<ScheduledJob>, DomainError> {
        let mut jobs = Vec::new();

        if self.daily.enabled {
            jobs.push(ScheduledJob {
                kind: JobKind::Daily,
                cadence: Cadence::Daily,
                time: parse_time("daily", &self.daily.time)?,
                plan: JobPlan {
                    incremental: true,
                    window_days: Some(1),
                    sources: selection(&self.daily.extractions),
                    failure_severity: Severity::High,
                },
            });
        }

        if self.weekly.enabled {
            let weekday: Weekday = self.weekly.day.trim().parse().map_err(|_| {
                DomainError::InvalidConfig(format!(
                    "schedule.weekly.day: '{}' is not a weekday",
                    self.weekly.day
                ))
            })?;
            jobs.push(ScheduledJob {
                kind: JobKind::Weekly,
                cadence: Cadence::Weekly(weekday),
                time: parse_time("weekly", &self.weekly.time)?,
                plan: JobPlan {
                    incremental: false,
                    window_days: Some(7),
                    sources: selection(&self.weekly.extractions),
                    failure_severity: Severity::High,
                },
            });
        }

        if self.monthly.enabled {
            if !(1..=31).contains(&self.monthly.day) {
                return Err(DomainError::InvalidConfig(format!(
                    "schedule.monthly.day: {} is not a day of month",
                    self.monthly.day
                )));
            }
            jobs.push(ScheduledJob {
                kind: JobKind::Monthly,
                cadence: Cadence::Monthly(self.monthly.day),
                time: parse_time("monthly", &self.monthly.time)?,
                plan: JobPlan {
                    incremental: false,
                    window_days: None,
                    sources: selection(&self.monthly.extractions),
                    failure_severity: Severity::Medium,
                },
            });
        }

        Ok(jobs)
    }

    /// Every source name the enabled jobs mention, `all` excluded.
    pub fn referenced_sources(&self) -> Vec<&str> {
        let mut names = Vec::new();
        for (enabled, list) in [
            (self.daily.enabled, &self.daily.extractions),
            (self.weekly.enabled, &self.weekly.extractions),
            (self.monthly.enabled, &self.monthly.extractions),
        ] {
            if enabled {
                names.extend(list.iter().map(String::as_str).filter(|s| *s != "all"));
            }
        }
        names
    }
}

fn parse_time(job: &str, raw: &str) -> Result<NaiveTime, DomainError> {
    NaiveTime::parse_from_str(raw.trim(), "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(raw.trim(), "%H:%M:%S"))
        .map_err(|_| {
            DomainError::InvalidConfig(format!("schedule.{}.time: '{}' is not HH:MM", job, raw))
        })
}

/// `all` anywhere in the list selects every source.
fn selection(extractions: &[String]) -> Option<Vec<String>> {
    if extractions.is_empty() || extractions.iter().any(|s| s == "all") {
        None
    } else {
        Some(extractions.to_vec())
    }
}
