// Triggers decide whether an action fires for a given evaluation snapshot.
//
// Evaluation is pure: everything it needs travels in the TriggerContext.

use chrono::{DateTime, Duration, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use super::board::{Board, Column, Task};
use super::error::{DomainError, DomainResult};
use super::event::DomainEvent;
use super::values::{EventType, TriggerType};

static OFFSET_PART_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d+)([wdhms])").expect("valid offset regex"));

/// A signed span written as `2d`, `1h30m`, `-15m`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Offset(Duration);

impl Offset {
    pub fn new(duration: Duration) -> Self {
        Self(duration)
    }

    pub fn duration(&self) -> Duration {
        self.0
    }
}

impl fmt::Display for Offset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut secs = self.0.num_seconds();
        if secs == 0 {
            return f.write_str("0s");
        }
        if secs < 0 {
            f.write_str("-")?;
            secs = -secs;
        }
        for (unit, size) in [("d", 86_400), ("h", 3_600), ("m", 60), ("s", 1)] {
            if secs >= size {
                write!(f, "{}{}", secs / size, unit)?;
                secs %= size;
            }
        }
        Ok(())
    }
}

// chrono durations are bounded by i64 milliseconds
const MAX_OFFSET_SECS: i64 = i64::MAX / 1_000;

impl FromStr for Offset {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.trim();
        let (negative, body) = match raw.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, raw),
        };
        if body.is_empty() {
            return Err(DomainError::InvalidSchedule(format!("empty offset {s:?}")));
        }

        let mut consumed = 0;
        let mut total = 0i64;
        for caps in OFFSET_PART_RE.captures_iter(body) {
            let whole = caps.get(0).map(|m| m.as_str().len()).unwrap_or(0);
            consumed += whole;
            let value: i64 = caps[1]
                .parse()
                .map_err(|_| DomainError::InvalidSchedule(format!("bad offset {s:?}")))?;
            let unit = match &caps[2] {
                "w" => 604_800,
                "d" => 86_400,
                "h" => 3_600,
                "m" => 60,
                _ => 1,
            };
            total = value
                .checked_mul(unit)
                .and_then(|part| total.checked_add(part))
                .filter(|secs| *secs <= MAX_OFFSET_SECS)
                .ok_or_else(|| DomainError::InvalidSchedule(format!("offset out of range {s:?}")))?;
        }
        if consumed != body.len() {
            return Err(DomainError::InvalidSchedule(format!("bad offset {s:?}")));
        }
        let secs = if negative { -total } else { total };
        Ok(Offset(Duration::seconds(secs)))
    }
}

impl Serialize for Offset {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Offset {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Schedule {
    /// Fires once the instant has passed.
    Absolute { time: DateTime<Utc> },
    /// Fires `offset` before the task's due date.
    RelativeDueDate { offset: Offset },
    /// Fires `offset` after the task was created.
    RelativeCreation { offset: Offset },
    /// Parsed and stored but never fires.
    Recurring { cron: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Trigger {
    Time { schedule: Schedule },
    Event { event: EventType },
}

/// Snapshot a trigger is evaluated against.
#[derive(Debug, Clone)]
pub struct TriggerContext {
    pub current_time: DateTime<Utc>,
    pub task: Option<Arc<Task>>,
    pub column: Option<Arc<Column>>,
    pub board: Option<Arc<Board>>,
    pub event: Option<Arc<DomainEvent>>,
    pub last_run: Option<DateTime<Utc>>,
}

impl TriggerContext {
    /// Context with nothing but the current time.
    pub fn at(current_time: DateTime<Utc>) -> Self {
        Self {
            current_time,
            task: None,
            column: None,
            board: None,
            event: None,
            last_run: None,
        }
    }
}

impl Trigger {
    pub fn trigger_type(&self) -> TriggerType {
        match self {
            Trigger::Time { .. } => TriggerType::Time,
            Trigger::Event { .. } => TriggerType::Event,
        }
    }

    pub fn validate(&self) -> DomainResult<()> {
        match self {
            Trigger::Time {
                schedule: Schedule::Recurring { cron },
            } if cron.trim().is_empty() => Err(DomainError::InvalidSchedule(
                "recurring schedule requires a cron expression".to_string(),
            )),
            _ => Ok(()),
        }
    }

    pub fn should_trigger(&self, ctx: &TriggerContext) -> bool {
        match self {
            Trigger::Event { event } => ctx
                .event
                .as_ref()
                .map(|e| e.event_type == *event)
                .unwrap_or(false),
            Trigger::Time { schedule } => match schedule.instant(ctx) {
                Some(instant) => fires_at(instant, ctx),
                None => false,
            },
        }
    }
}

impl Schedule {
    /// The instant this schedule targets, or None when the context lacks the
    /// task field it is relative to or the offset lands outside the calendar.
    pub fn instant(&self, ctx: &TriggerContext) -> Option<DateTime<Utc>> {
        match self {
            Schedule::Absolute { time } => Some(*time),
            Schedule::RelativeDueDate { offset } => {
                let due = ctx.task.as_ref()?.due_date?;
                due.checked_sub_signed(offset.duration())
            }
            Schedule::RelativeCreation { offset } => {
                let created = ctx.task.as_ref()?.created_at;
                created.checked_add_signed(offset.duration())
            }
            Schedule::Recurring { .. } => None,
        }
    }
}

/// Due, and not yet run since the instant passed. At-least-once: a run that
/// is not persisted will fire again.
fn fires_at(instant: DateTime<Utc>, ctx: &TriggerContext) -> bool {
    if ctx.current_time < instant {
        return false;
    }
    match ctx.last_run {
        None => true,
        Some(last) => last < instant,
    }
}
