//! Per-peer circuit breaker (§4.12): opens after 5 failures within a
//! minute, half-opens after 60s, closes on a successful request.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

pub const DEFAULT_FAILURE_THRESHOLD: u32 = 5;
pub const DEFAULT_FAILURE_WINDOW: Duration = Duration::from_secs(60);
pub const DEFAULT_OPEN_DURATION: Duration = Duration::from_secs(60);

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

struct Inner {
    state: CircuitState,
    recent_failures: VecDeque<Instant>,
    opened_at: Option<Instant>,
}

/// A circuit breaker for one peer's request path. `record_success` and
/// `record_failure` are called by the caller after each attempt;
/// `allow_request` gates whether a new attempt should even be made.
pub struct CircuitBreaker {
    failure_threshold: u32,
    failure_window: Duration,
    open_duration: Duration,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    pub fn new(failure_threshold: u32, failure_window: Duration, open_duration: Duration) -> Self {
        Self {
            failure_threshold,
            failure_window,
            open_duration,
            inner: Mutex::new(Inner {
                state: CircuitState::Closed,
                recent_failures: VecDeque::new(),
                opened_at: None,
            }),
        }
    }

    pub fn state(&self) -> CircuitState {
        let mut inner = self.inner.lock();
        self.transition_if_due(&mut inner);
        inner.state
    }

    /// Whether a request should be attempted right now. A half-open
    /// breaker allows exactly one probing request through; the caller's
    /// subsequent `record_success`/`record_failure` call decides the
    /// next state.
    pub fn allow_request(&self) -> bool {
        let mut inner = self.inner.lock();
        self.transition_if_due(&mut inner);
        !matches!(inner.state, CircuitState::Open)
    }

    pub fn record_success(&self) {
        let mut inner = self.inner.lock();
        inner.recent_failures.clear();
        inner.state = CircuitState::Closed;
        inner.opened_at = None;
    }

    pub fn record_failure(&self) {
        let mut inner = self.inner.lock();
        let now = Instant::now();
        inner.recent_failures.push_back(now);
        while let Some(&front) = inner.recent_failures.front() {
            if now.duration_since(front) > self.failure_window {
                inner.recent_failures.pop_front();
            } else {
                break;
            }
        }
        if inner.recent_failures.len() as u32 >= self.failure_threshold {
            inner.state = CircuitState::Open;
            inner.opened_at = Some(now);
            inner.recent_failures.clear();
        }
    }

    fn transition_if_due(&self, inner: &mut Inner) {
        if inner.state == CircuitState::Open {
            if let Some(opened_at) = inner.opened_at {
                if Instant::now().duration_since(opened_at) >= self.open_duration {
                    inner.state = CircuitState::HalfOpen;
                }
            }
        }
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(
            DEFAULT_FAILURE_THRESHOLD,
            DEFAULT_FAILURE_WINDOW,
            DEFAULT_OPEN_DURATION,
        )
    }
}
