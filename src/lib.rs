pub mod actors;
pub mod alerts;
#[cfg(feature = "api")]
pub mod api;
pub mod config;
pub mod discord;
pub mod monitors;
pub mod storage;

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Health state of a service or view, ordered by severity.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum State {
    #[default]
    Paused,
    Ok,
    Warning,
    Error,
}

impl State {
    pub fn as_str(&self) -> &'static str {
        match self {
            State::Paused => "paused",
            State::Ok => "ok",
            State::Warning => "warning",
            State::Error => "error",
        }
    }

    /// Whether this state counts as an ongoing incident.
    pub fn is_failing(&self) -> bool {
        *self > State::Ok
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for State {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "paused" => Ok(State::Paused),
            "ok" => Ok(State::Ok),
            "warning" => Ok(State::Warning),
            "error" => Ok(State::Error),
            other => Err(format!("unknown state '{other}'")),
        }
    }
}

/// Threshold configuration for one severity level.
///
/// On the wire a timeout is either `"auto"`, `"clear"` or a positive
/// number of seconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "TimeoutRepr", into = "TimeoutRepr")]
pub enum Timeout {
    /// Fixed threshold
    Explicit(Duration),

    /// Threshold derived from the beat history
    Auto,

    /// Threshold disabled
    #[default]
    Cleared,
}

impl Timeout {
    pub fn from_secs(secs: u64) -> Self {
        Timeout::Explicit(Duration::from_secs(secs))
    }
}

impl fmt::Display for Timeout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Timeout::Explicit(duration) => write!(f, "{}", duration.as_secs()),
            Timeout::Auto => f.write_str("auto"),
            Timeout::Cleared => f.write_str("clear"),
        }
    }
}

impl FromStr for Timeout {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "auto" => Ok(Timeout::Auto),
            "clear" => Ok(Timeout::Cleared),
            secs => match secs.parse::<u64>() {
                Ok(0) => Err("timeout must be positive".to_string()),
                Ok(secs) => Ok(Timeout::from_secs(secs)),
                Err(_) => Err(format!(
                    "invalid timeout '{secs}' (expected seconds, 'auto' or 'clear')"
                )),
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum TimeoutRepr {
    Seconds(u64),
    Keyword(String),
}

impl TryFrom<TimeoutRepr> for Timeout {
    type Error = String;

    fn try_from(repr: TimeoutRepr) -> Result<Self, Self::Error> {
        match repr {
            TimeoutRepr::Seconds(0) => Err("timeout must be positive".to_string()),
            TimeoutRepr::Seconds(secs) => Ok(Timeout::from_secs(secs)),
            TimeoutRepr::Keyword(keyword) => keyword.parse(),
        }
    }
}

impl From<Timeout> for TimeoutRepr {
    fn from(timeout: Timeout) -> Self {
        match timeout {
            Timeout::Explicit(duration) => TimeoutRepr::Seconds(duration.as_secs()),
            other => TimeoutRepr::Keyword(other.to_string()),
        }
    }
}

/// Point-in-time copy of a service, handed to storage and to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceSnapshot {
    pub name: String,
    pub state: State,
    pub last_beat: Option<DateTime<Utc>>,
    #[serde(default)]
    pub warning_timeout: Timeout,
    #[serde(default)]
    pub error_timeout: Timeout,
    #[serde(default)]
    pub paused: bool,
    /// Most recent beats, oldest first
    #[serde(default)]
    pub previous_beats: Vec<DateTime<Utc>>,
    #[serde(default)]
    pub incident_nbr: u64,
}

impl ServiceSnapshot {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: State::Paused,
            last_beat: None,
            warning_timeout: Timeout::Cleared,
            error_timeout: Timeout::Cleared,
            paused: false,
            previous_beats: Vec::new(),
            incident_nbr: 0,
        }
    }
}

/// Point-in-time copy of a view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewSnapshot {
    pub name: String,
    pub pattern: String,
    pub state: State,
    #[serde(default)]
    pub incident_nbr: u64,
}

impl ViewSnapshot {
    pub fn new(name: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            pattern: pattern.into(),
            state: State::Ok,
            incident_nbr: 0,
        }
    }
}
