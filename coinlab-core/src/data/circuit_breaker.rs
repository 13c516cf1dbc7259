//! Circuit breaker for the HTTP fetch strategies.
//!
//! Only an HTTP 403 (the provider has blocked this client) trips it.
//! Timeouts, 429 and 5xx stay per-request failures and never open it.
//! While open every request is refused until the cooldown has elapsed.

use std::sync::Mutex;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed,
    Open { tripped_at: Instant },
}

#[derive(Debug)]
pub struct CircuitBreaker {
    state: Mutex<BreakerState>,
    cooldown: Duration,
}

impl CircuitBreaker {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            state: Mutex::new(BreakerState::Closed),
            cooldown,
        }
    }

    /// True if a request may be sent. An expired cooldown closes the breaker.
    pub fn is_allowed(&self) -> bool {
        let mut state = self.state.lock().unwrap();
        match *state {
            BreakerState::Closed => true,
            BreakerState::Open { tripped_at } if tripped_at.elapsed() >= self.cooldown => {
                *state = BreakerState::Closed;
                true
            }
            BreakerState::Open { .. } => false,
        }
    }

    /// Open immediately (provider has blocked us).
    pub fn trip(&self) {
        *self.state.lock().unwrap() = BreakerState::Open {
            tripped_at: Instant::now(),
        };
    }

    pub fn remaining_cooldown(&self) -> Duration {
        match *self.state.lock().unwrap() {
            BreakerState::Closed => Duration::ZERO,
            BreakerState::Open { tripped_at } => self.cooldown.saturating_sub(tripped_at.elapsed()),
        }
    }
}
