//! View entity - regex-defined aggregate over services
//!
//! Membership is evaluated live against the service map on every update,
//! so created and deleted services are reflected without bookkeeping.

use regex::Regex;

use super::service::Service;
use crate::{State, ViewSnapshot};

/// Name of the built-in view matching every service
pub const ALL_VIEW: &str = "all";

#[derive(Debug, Clone)]
pub struct View {
    name: String,
    pattern: Regex,
    state: State,
    incident_nbr: u64,
}

impl View {
    /// The reserved view that matches every service
    pub fn all() -> Self {
        Self {
            name: ALL_VIEW.to_string(),
            pattern: Regex::new("").expect("empty pattern always compiles"),
            state: State::Ok,
            incident_nbr: 0,
        }
    }

    pub fn from_snapshot(snapshot: ViewSnapshot) -> Result<Self, regex::Error> {
        let pattern = Regex::new(&snapshot.pattern)?;
        Ok(Self {
            name: snapshot.name,
            pattern,
            state: snapshot.state,
            incident_nbr: snapshot.incident_nbr,
        })
    }

    /// Take over the persisted state of a stored copy of this view
    pub fn restore(&mut self, snapshot: &ViewSnapshot) {
        self.state = snapshot.state;
        self.incident_nbr = snapshot.incident_nbr;
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn incident_nbr(&self) -> u64 {
        self.incident_nbr
    }

    pub fn snapshot(&self) -> ViewSnapshot {
        ViewSnapshot {
            name: self.name.clone(),
            pattern: self.pattern.as_str().to_string(),
            state: self.state,
            incident_nbr: self.incident_nbr,
        }
    }

    pub fn contains(&self, service_name: &str) -> bool {
        self.name == ALL_VIEW || self.pattern.is_match(service_name)
    }

    /// Recompute the aggregate over `services`, returning whether it changed
    ///
    /// Paused members only count when every member is paused; a view
    /// without members is `Ok`.
    pub fn update<'a>(&mut self, services: impl IntoIterator<Item = &'a Service>) -> bool {
        let mut has_members = false;
        let mut worst: Option<State> = None;

        for service in services {
            if !self.contains(service.name()) {
                continue;
            }
            has_members = true;
            if service.state() != State::Paused {
                worst = worst.max(Some(service.state()));
            }
        }

        let next = match (has_members, worst) {
            (false, _) => State::Ok,
            (true, None) => State::Paused,
            (true, Some(state)) => state,
        };

        if next == self.state {
            return false;
        }

        if !self.state.is_failing() && next.is_failing() {
            self.incident_nbr += 1;
        }
        self.state = next;
        true
    }

    /// Whether the move away from `previous` is worth an alert
    ///
    /// Alerts fire when the state changed and either side is worse than `Ok`.
    pub fn has_alert(&self, previous: &ViewSnapshot) -> bool {
        self.state != previous.state && (self.state.is_failing() || previous.state.is_failing())
    }
}
