//! Circuit breaker (§10): wraps calls to the Vector Store, Episode
//! Provider, and Engagement Store so a collaborator already failing
//! fails fast instead of accumulating doomed in-flight requests at the
//! full timeout (§5). Only `is_recoverable()` errors count toward the
//! failure threshold — a `ConfigInvalid` or `SessionNotFound` never trips
//! the breaker.

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{info, warn};

use crate::error::{Dependency, Error};

/// Circuit breaker configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CircuitBreakerConfig {
    /// Consecutive recoverable failures before the circuit opens.
    pub failure_threshold: u32,
    /// Consecutive successes in half-open needed to close the circuit.
    pub success_threshold: u32,
    /// How long the circuit stays open before probing recovery.
    pub open_timeout: Duration,
    /// Maximum probe attempts allowed while half-open.
    pub half_open_max_attempts: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 2,
            open_timeout: Duration::from_secs(30),
            half_open_max_attempts: 3,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum State {
    Closed,
    Open { opened_at: Instant },
    HalfOpen { consecutive_successes: u32 },
}

/// Circuit state, exposed for observability / metrics export.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitBreakerState {
    /// Calls pass through normally.
    Closed,
    /// Calls are rejected without being attempted.
    Open,
    /// A limited number of probe calls are allowed through.
    HalfOpen,
}

/// Wraps a single dependency's calls with failure-threshold tripping and
/// exponential-backoff-free half-open recovery probing (fixed
/// `open_timeout`, per §10 — the exponential backoff named there applies
/// to the transport layer's retry policy around a call this breaker has
/// already rejected, not to the breaker's own open-duration).
#[derive(Debug)]
pub struct CircuitBreaker {
    dependency: Dependency,
    config: CircuitBreakerConfig,
    state: Mutex<State>,
    half_open_attempts: AtomicU32,
}

impl CircuitBreaker {
    /// Construct a breaker for `dependency` with `config`.
    #[must_use]
    pub fn new(dependency: Dependency, config: CircuitBreakerConfig) -> Self {
        Self {
            dependency,
            config,
            state: Mutex::new(State::Closed),
            half_open_attempts: AtomicU32::new(0),
        }
    }

    /// Current externally-visible state.
    #[must_use]
    pub fn state(&self) -> CircuitBreakerState {
        match *self.state.lock() {
            State::Closed => CircuitBreakerState::Closed,
            State::Open { .. } => CircuitBreakerState::Open,
            State::HalfOpen { .. } => CircuitBreakerState::HalfOpen,
        }
    }

    /// Check whether a call should be attempted, transitioning
    /// open → half-open once `open_timeout` has elapsed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CircuitBreakerOpen`] if the circuit is open (or
    /// half-open with its probe budget exhausted).
    pub fn allow_request(&self) -> Result<(), Error> {
        let mut state = self.state.lock();
        match *state {
            State::Closed => Ok(()),
            State::Open { opened_at } => {
                if opened_at.elapsed() >= self.config.open_timeout {
                    info!(dependency = %self.dependency, "circuit breaker transitioning to half-open");
                    *state = State::HalfOpen {
                        consecutive_successes: 0,
                    };
                    self.half_open_attempts.store(1, Ordering::SeqCst);
                    Ok(())
                } else {
                    Err(Error::CircuitBreakerOpen(self.dependency))
                }
            }
            State::HalfOpen { .. } => {
                let attempts = self.half_open_attempts.fetch_add(1, Ordering::SeqCst) + 1;
                if attempts <= self.config.half_open_max_attempts {
                    Ok(())
                } else {
                    Err(Error::CircuitBreakerOpen(self.dependency))
                }
            }
        }
    }

    /// Record a successful call.
    pub fn record_success(&self) {
        let mut state = self.state.lock();
        match *state {
            State::Closed => {
                self.half_open_attempts.store(0, Ordering::SeqCst);
            }
            State::HalfOpen {
                consecutive_successes,
            } => {
                let successes = consecutive_successes + 1;
                if successes >= self.config.success_threshold {
                    info!(dependency = %self.dependency, "circuit breaker closing after recovery");
                    *state = State::Closed;
                    self.half_open_attempts.store(0, Ordering::SeqCst);
                } else {
                    *state = State::HalfOpen {
                        consecutive_successes: successes,
                    };
                }
            }
            State::Open { .. } => {}
        }
    }

    /// Record a call failure. Only `err.is_recoverable()` failures count
    /// toward the threshold (§7, §10) — config/validation/not-found
    /// errors never trip the breaker.
    pub fn record_failure(&self, err: &Error) {
        if !err.is_recoverable() {
            return;
        }
        let mut state = self.state.lock();
        match *state {
            State::Closed => {
                // Tracked via a separate counter would require restructuring
                // state; instead open immediately after `failure_threshold`
                // is reached by counting in the caller-visible API below.
                self.trip_closed_failure(&mut state);
            }
            State::HalfOpen { .. } => {
                warn!(dependency = %self.dependency, "circuit breaker reopening: probe failed");
                *state = State::Open {
                    opened_at: Instant::now(),
                };
                self.half_open_attempts.store(0, Ordering::SeqCst);
            }
            State::Open { .. } => {}
        }
    }

    fn trip_closed_failure(&self, state: &mut State) {
        let failures = self.half_open_attempts.fetch_add(1, Ordering::SeqCst) + 1;
        if failures >= self.config.failure_threshold {
            warn!(dependency = %self.dependency, failures, "circuit breaker opening after consecutive failures");
            *state = State::Open {
                opened_at: Instant::now(),
            };
            self.half_open_attempts.store(0, Ordering::SeqCst);
        }
    }

    /// Force the breaker back to closed, clearing all counters. Intended
    /// for operational overrides, not normal call-path use.
    pub fn reset(&self) {
        *self.state.lock() = State::Closed;
        self.half_open_attempts.store(0, Ordering::SeqCst);
        info!(dependency = %self.dependency, "circuit breaker manually reset");
    }
}
