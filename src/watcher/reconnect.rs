//! Reconnect backoff
//!
//! Exponential backoff with jitter, capped and bounded. The attempt
//! counter only ever reflects consecutive failures: every successful
//! connect resets it to zero.

use std::time::Duration;

use rand::Rng;

pub const INITIAL_DELAY_MS: u64 = 1_000;
pub const MAX_DELAY_MS: u64 = 30_000;
pub const MAX_ATTEMPTS: u32 = 5;
const JITTER_MS: u64 = 1_000;

/// Per-account reconnect state, owned by the watcher loop. The loop
/// sleeps through the returned delay inline, so at most one reconnect
/// timer can ever be pending per account.
#[derive(Debug, Default)]
pub struct ReconnectState {
    attempts: u32,
}

impl ReconnectState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Called after every successful connect.
    pub fn reset(&mut self) {
        self.attempts = 0;
    }

    /// Record a failure and return the delay before the next attempt,
    /// or `None` once the bound is reached — no further attempts are
    /// scheduled without an external restart.
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.attempts >= MAX_ATTEMPTS {
            return None;
        }
        self.attempts += 1;

        let exponential = INITIAL_DELAY_MS.saturating_mul(1 << (self.attempts - 1));
        let jitter = rand::thread_rng().gen_range(0..JITTER_MS);
        let delay = exponential.saturating_add(jitter).min(MAX_DELAY_MS);
        Some(Duration::from_millis(delay))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delays_grow_and_stay_capped() {
        let mut state = ReconnectState::new();

        for attempt in 1..=MAX_ATTEMPTS {
            let delay = state.next_delay().expect("attempt within bound");
            let millis = delay.as_millis() as u64;

            // With a bound of 5 the exponential term tops out at 16s, so
            // the cap only trims the jitter edge.
            let base = INITIAL_DELAY_MS * (1 << (attempt - 1));
            assert!(millis >= base);
            assert!(millis < (base + JITTER_MS).min(MAX_DELAY_MS + 1));
        }
    }

    #[test]
    fn bound_exhausts_and_a_sixth_signal_schedules_nothing() {
        let mut state = ReconnectState::new();
        for _ in 0..MAX_ATTEMPTS {
            assert!(state.next_delay().is_some());
        }
        assert_eq!(state.attempts(), MAX_ATTEMPTS);
        assert!(state.next_delay().is_none());
        assert!(state.next_delay().is_none());
    }

    #[test]
    fn reset_restarts_the_sequence() {
        let mut state = ReconnectState::new();
        for _ in 0..3 {
            state.next_delay();
        }
        assert_eq!(state.attempts(), 3);

        state.reset();
        assert_eq!(state.attempts(), 0);

        let delay = state.next_delay().unwrap().as_millis() as u64;
        assert!(delay >= INITIAL_DELAY_MS);
        assert!(delay < INITIAL_DELAY_MS + JITTER_MS);
    }
}
