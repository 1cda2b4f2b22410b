/**
 * Reconnect Backoff Policy
 *
 * The client owns the real-time channel's reconnect behavior: bounded
 * attempts with doubling delay, after which the channel surfaces a
 * terminal disconnected state instead of retrying forever.
 */
use std::time::Duration;

/// Default starting delay before the first reconnect attempt.
const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(1);
/// Default cap on reconnect attempts.
const DEFAULT_MAX_ATTEMPTS: u32 = 6;

/// What the channel should do next after losing the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectStep {
    /// Wait `delay`, then attempt to reconnect.
    Retry { attempt: u32, delay: Duration },
    /// Give up and surface the disconnected state to the user.
    Disconnected,
}

#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    base_delay: Duration,
    max_attempts: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            base_delay: DEFAULT_BASE_DELAY,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

impl ReconnectPolicy {
    pub fn new(base_delay: Duration, max_attempts: u32) -> Self {
        Self {
            base_delay,
            max_attempts,
        }
    }

    /// Delay for a given 1-based attempt: doubles each time.
    fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay * 2u32.saturating_pow(attempt.saturating_sub(1))
    }
}

/// Per-connection reconnect progress. Reset on every successful connect.
#[derive(Debug, Default)]
pub struct ReconnectState {
    attempts: u32,
}

impl ReconnectState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a connection loss and ask the policy what to do next.
    pub fn next_step(&mut self, policy: &ReconnectPolicy) -> ReconnectStep {
        if self.attempts >= policy.max_attempts {
            return ReconnectStep::Disconnected;
        }
        self.attempts += 1;
        ReconnectStep::Retry {
            attempt: self.attempts,
            delay: policy.delay_for(self.attempts),
        }
    }

    /// Call after a successful connect: the next loss starts over.
    pub fn reset(&mut self) {
        self.attempts = 0;
    }
}
