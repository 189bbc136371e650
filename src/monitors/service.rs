//! Service entity - the per-service health state machine
//!
//! ## State Derivation
//!
//! ```text
//! paused                         → Paused
//! never beaten                   → Ok
//! elapsed >= error threshold     → Error
//! elapsed >= warning threshold   → Warning
//! otherwise                      → Ok
//! ```
//!
//! Thresholds come from [`Timeout`]: explicit durations are used as-is,
//! cleared timeouts never fire and auto timeouts are derived from the
//! recent beat history (see [`derive_auto_timeout`]).

use std::collections::VecDeque;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::warn;

use crate::{ServiceSnapshot, State, Timeout};

/// Minimum number of inter-beat intervals before an auto timeout is trusted
pub const AUTO_MIN_INTERVALS: usize = 3;

/// Auto warning threshold, as a multiple of the largest observed interval
pub const AUTO_WARNING_FACTOR: u32 = 2;

/// Auto error threshold, as a multiple of the largest observed interval
pub const AUTO_ERROR_FACTOR: u32 = 4;

/// Intervals shorter than this are rounded up before applying the factors
const AUTO_MIN_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutKind {
    Warning,
    Error,
}

/// Derive a threshold from a beat history (oldest first).
///
/// Returns `None` while fewer than [`AUTO_MIN_INTERVALS`] intervals are
/// known, meaning the threshold does not apply yet.
pub fn derive_auto_timeout(beats: &[DateTime<Utc>], kind: TimeoutKind) -> Option<Duration> {
    let intervals = beats
        .windows(2)
        .filter_map(|pair| (pair[1] - pair[0]).to_std().ok())
        .collect::<Vec<_>>();

    if intervals.len() < AUTO_MIN_INTERVALS {
        return None;
    }

    let largest = intervals.into_iter().max()?.max(AUTO_MIN_INTERVAL);

    let factor = match kind {
        TimeoutKind::Warning => AUTO_WARNING_FACTOR,
        TimeoutKind::Error => AUTO_ERROR_FACTOR,
    };

    Some(largest * factor)
}

/// A monitored service
#[derive(Debug, Clone)]
pub struct Service {
    name: String,
    state: State,
    last_beat: Option<DateTime<Utc>>,
    warning_timeout: Timeout,
    error_timeout: Timeout,
    paused: bool,
    previous_beats: VecDeque<DateTime<Utc>>,
    history_capacity: usize,
    incident_nbr: u64,
}

impl Service {
    /// Create a fresh, never-evaluated service
    pub fn new(name: impl Into<String>, history_capacity: usize) -> Self {
        Self::from_snapshot(ServiceSnapshot::new(name), history_capacity)
    }

    /// Rebuild a service from a stored snapshot
    ///
    /// A beat history that does not fit the configured capacity is reset.
    pub fn from_snapshot(snapshot: ServiceSnapshot, history_capacity: usize) -> Self {
        let previous_beats = if snapshot.previous_beats.len() > history_capacity {
            warn!(
                "service '{}': stored beat history has {} entries (capacity {}), resetting",
                snapshot.name,
                snapshot.previous_beats.len(),
                history_capacity
            );
            VecDeque::with_capacity(history_capacity)
        } else {
            let mut beats = VecDeque::with_capacity(history_capacity);
            beats.extend(snapshot.previous_beats);
            beats
        };

        Self {
            name: snapshot.name,
            state: snapshot.state,
            last_beat: snapshot.last_beat,
            warning_timeout: snapshot.warning_timeout,
            error_timeout: snapshot.error_timeout,
            paused: snapshot.paused,
            previous_beats,
            history_capacity,
            incident_nbr: snapshot.incident_nbr,
        }
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

    pub fn last_beat(&self) -> Option<DateTime<Utc>> {
        self.last_beat
    }

    pub fn previous_beats(&self) -> impl Iterator<Item = &DateTime<Utc>> {
        self.previous_beats.iter()
    }

    pub fn snapshot(&self) -> ServiceSnapshot {
        ServiceSnapshot {
            name: self.name.clone(),
            state: self.state,
            last_beat: self.last_beat,
            warning_timeout: self.warning_timeout,
            error_timeout: self.error_timeout,
            paused: self.paused,
            previous_beats: self.previous_beats.iter().copied().collect(),
            incident_nbr: self.incident_nbr,
        }
    }

    /// Record a beat. The state is left alone until the next [`Service::update`].
    pub fn register_beat(&mut self, ts: DateTime<Utc>) {
        if self.history_capacity > 0 {
            while self.previous_beats.len() >= self.history_capacity {
                self.previous_beats.pop_front();
            }
            self.previous_beats.push_back(ts);
        }
        self.last_beat = Some(ts);
    }

    pub fn set_warning_timeout(&mut self, timeout: Timeout) {
        if Self::apply_timeout(&mut self.warning_timeout, timeout) {
            self.reset_history();
        }
    }

    pub fn set_error_timeout(&mut self, timeout: Timeout) {
        if Self::apply_timeout(&mut self.error_timeout, timeout) {
            self.reset_history();
        }
    }

    /// Apply a warning and an error timeout update as one unit
    ///
    /// Returns `false` and leaves both timeouts untouched when the result
    /// would have an explicit error threshold below the explicit warning
    /// threshold.
    pub fn configure_timeouts(
        &mut self,
        warning: Option<Timeout>,
        error: Option<Timeout>,
    ) -> bool {
        if warning.is_none() && error.is_none() {
            return true;
        }

        let next_warning = warning.unwrap_or(self.warning_timeout);
        let next_error = error.unwrap_or(self.error_timeout);
        if let (Timeout::Explicit(warning), Timeout::Explicit(error)) = (next_warning, next_error) {
            if error < warning {
                return false;
            }
        }

        if let Some(timeout) = warning {
            self.set_warning_timeout(timeout);
        }
        if let Some(timeout) = error {
            self.set_error_timeout(timeout);
        }
        true
    }

    pub fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
    }

    /// Returns `true` when the slot switched into auto mode.
    fn apply_timeout(slot: &mut Timeout, timeout: Timeout) -> bool {
        match (*slot, timeout) {
            // keep the history collected so far
            (Timeout::Auto, Timeout::Auto) => false,
            (_, Timeout::Auto) => {
                *slot = Timeout::Auto;
                true
            }
            (_, other) => {
                *slot = other;
                false
            }
        }
    }

    fn reset_history(&mut self) {
        self.previous_beats = VecDeque::with_capacity(self.history_capacity);
    }

    /// Effective threshold for one severity, `None` meaning it never fires
    pub fn resolve_timeout(&self, kind: TimeoutKind) -> Option<Duration> {
        let raw = match kind {
            TimeoutKind::Warning => self.warning_timeout,
            TimeoutKind::Error => self.error_timeout,
        };

        match raw {
            Timeout::Explicit(duration) => Some(duration),
            Timeout::Cleared => None,
            Timeout::Auto => {
                let beats = self.previous_beats.iter().copied().collect::<Vec<_>>();
                derive_auto_timeout(&beats, kind)
            }
        }
    }

    /// The state this service should be in at `ts`
    pub fn state_at(&self, ts: DateTime<Utc>) -> State {
        if self.paused {
            return State::Paused;
        }

        let Some(last_beat) = self.last_beat else {
            return State::Ok;
        };

        let elapsed = (ts - last_beat).to_std().unwrap_or(Duration::ZERO);

        let exceeds = |kind| {
            self.resolve_timeout(kind)
                .is_some_and(|threshold| elapsed >= threshold)
        };

        if exceeds(TimeoutKind::Error) {
            State::Error
        } else if exceeds(TimeoutKind::Warning) {
            State::Warning
        } else {
            State::Ok
        }
    }

    /// Move to the state due at `ts`, returning whether it changed
    pub fn update(&mut self, ts: DateTime<Utc>) -> bool {
        let next = self.state_at(ts);
        if next == self.state {
            return false;
        }

        if !self.state.is_failing() && next.is_failing() {
            self.incident_nbr += 1;
        }
        self.state = next;
        true
    }
}
