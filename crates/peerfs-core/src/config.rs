//! Session configuration

use crate::{Result, SessionError};
use std::time::Duration;

/// Default pause between two pacing ticks
pub const DEFAULT_PACE_INTERVAL: Duration = Duration::from_secs(1);

/// Default event channel capacity
pub const DEFAULT_EVENT_CAPACITY: usize = 1024;

/// Session configuration
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Time between two pacing ticks. Each tick sends at most one block index.
    pub pace_interval: Duration,

    /// Capacity of the event broadcast channel. Slow subscribers past this
    /// many events observe a lag instead of blocking the session.
    pub event_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            pace_interval: DEFAULT_PACE_INTERVAL,
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

impl SessionConfig {
    /// Set the pacing interval
    #[must_use]
    pub fn with_pace_interval(mut self, pace_interval: Duration) -> Self {
        self.pace_interval = pace_interval;
        self
    }

    /// Set the event channel capacity
    #[must_use]
    pub fn with_event_capacity(mut self, event_capacity: usize) -> Self {
        self.event_capacity = event_capacity;
        self
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::InvalidConfig`] for a zero pacing interval or
    /// a zero event capacity.
    pub fn validate(&self) -> Result<()> {
        if self.pace_interval.is_zero() {
            return Err(SessionError::invalid_config(
                "pace_interval must be greater than zero",
            ));
        }
        if self.event_capacity == 0 {
            return Err(SessionError::invalid_config(
                "event_capacity must be greater than zero",
            ));
        }
        Ok(())
    }
}
