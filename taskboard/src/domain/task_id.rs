// Task identifiers of the form PRE-001-some-slug

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use super::error::DomainError;
use super::values::slugify;

static TASK_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([A-Z]{3})-(\d+)-(.+)$").expect("valid task id regex"));
static SHORT_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([A-Z]{3})-(\d+)$").expect("valid short id regex"));

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TaskId {
    prefix: String,
    number: u32,
    slug: String,
}

impl TaskId {
    pub fn new(prefix: &str, number: u32, title: &str) -> Result<Self, DomainError> {
        let valid_prefix = prefix.len() == 3 && prefix.chars().all(|c| c.is_ascii_uppercase());
        if !valid_prefix || number == 0 {
            return Err(DomainError::InvalidTaskId(format!("{prefix}-{number}")));
        }
        Ok(Self {
            prefix: prefix.to_string(),
            number,
            slug: slugify(title),
        })
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn number(&self) -> u32 {
        self.number
    }

    pub fn slug(&self) -> &str {
        &self.slug
    }

    /// `PRE-001`, as typed by users.
    pub fn short_id(&self) -> String {
        format!("{}-{:03}", self.prefix, self.number)
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{:03}-{}", self.prefix, self.number, self.slug)
    }
}

impl FromStr for TaskId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let caps = TASK_ID_RE
            .captures(s)
            .ok_or_else(|| DomainError::InvalidTaskId(s.to_string()))?;
        let number: u32 = caps[2]
            .parse()
            .map_err(|_| DomainError::InvalidTaskId(s.to_string()))?;
        if number == 0 {
            return Err(DomainError::InvalidTaskId(s.to_string()));
        }
        Ok(Self {
            prefix: caps[1].to_string(),
            number,
            slug: caps[3].to_string(),
        })
    }
}

/// Parse a short id (`PRE-001`) into prefix and number.
pub fn parse_short_id(s: &str) -> Option<(String, u32)> {
    let caps = SHORT_ID_RE.captures(s)?;
    let number = caps[2].parse().ok()?;
    Some((caps[1].to_string(), number))
}

impl Serialize for TaskId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TaskId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
