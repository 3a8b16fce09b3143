//! Failed-attempt accounting and lockout.

use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PolicyConfig {
    /// Consecutive failures that trigger a lockout.  `0` disables lockout.
    pub max_attempts: u32,
    /// How long the lockout lasts after the last failure.  Zero disables
    /// lockout.
    pub lockout_duration: Duration,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            lockout_duration: Duration::from_secs(30),
        }
    }
}

impl PolicyConfig {
    pub fn lockout_enabled(&self) -> bool {
        self.max_attempts > 0 && !self.lockout_duration.is_zero()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AttemptState {
    pub failed_count: u32,
    pub last_failure_at: Option<Instant>,
}

/// Tracks consecutive failures across evaluations.
///
/// Timeouts are not failures; only a wrong phrase or a device error counts.
#[derive(Debug, Clone)]
pub struct AttemptPolicy {
    config: PolicyConfig,
    state: AttemptState,
}

impl AttemptPolicy {
    pub fn new(config: PolicyConfig) -> Self {
        Self {
            config,
            state: AttemptState::default(),
        }
    }

    pub fn config(&self) -> &PolicyConfig {
        &self.config
    }

    pub fn state(&self) -> AttemptState {
        self.state
    }

    /// Remaining lockout at `now`, if any.
    ///
    /// When a lockout window has fully elapsed the failure count is cleared,
    /// so the next failure starts a fresh streak.
    pub fn check_lockout(&mut self, now: Instant) -> Option<Duration> {
        if !self.config.lockout_enabled() || self.state.failed_count < self.config.max_attempts {
            return None;
        }
        let last = self.state.last_failure_at?;

        let elapsed = now.saturating_duration_since(last);
        if elapsed < self.config.lockout_duration {
            return Some(self.config.lockout_duration - elapsed);
        }

        log::info!("policy: lockout expired, clearing {} failures", self.state.failed_count);
        self.state = AttemptState::default();
        None
    }

    pub fn record_failure(&mut self, now: Instant) {
        self.state.failed_count = self.state.failed_count.saturating_add(1);
        self.state.last_failure_at = Some(now);
        log::info!(
            "policy: failed attempt {}/{}",
            self.state.failed_count,
            self.config.max_attempts
        );
        if self.config.lockout_enabled() && self.state.failed_count >= self.config.max_attempts {
            log::warn!(
                "policy: locking out for {}s",
                self.config.lockout_duration.as_secs()
            );
        }
    }

    pub fn record_success(&mut self) {
        if self.state.failed_count > 0 {
            log::debug!("policy: success clears {} failures", self.state.failed_count);
        }
        self.state = AttemptState::default();
    }
}
