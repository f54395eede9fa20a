//! Per-peer circuit breaker.
//!
//! Tracks consecutive failures for one peer and fails calls fast while the
//! peer is considered down. After a recovery window a single probe call is
//! admitted; its outcome decides whether the circuit closes again. A probe
//! whose caller is dropped before reporting goes stale after another recovery
//! window and is replaced, so a cancelled probe never wedges the breaker.

use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;

use crate::error::RpcError;

/// Circuit breaker configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BreakerConfig {
    /// Consecutive failures that open the circuit.
    pub failure_threshold: u32,
    /// Time the circuit stays open before admitting a probe.
    pub recovery_timeout: Duration,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            recovery_timeout: Duration::from_secs(30),
        }
    }
}

impl BreakerConfig {
    #[must_use]
    pub fn with_failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold;
        self
    }

    #[must_use]
    pub fn with_recovery_timeout(mut self, timeout: Duration) -> Self {
        self.recovery_timeout = timeout;
        self
    }
}

/// Observable breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Calls pass through; failures are counted.
    Closed,
    /// Calls fail fast without touching the network.
    Open,
    /// One probe call is in flight; its outcome decides the next state.
    HalfOpen,
}

#[derive(Debug)]
struct Inner {
    state: CircuitState,
    failure_count: u32,
    opened_at: Option<Instant>,
    probe_started_at: Option<Instant>,
}

/// Circuit breaker guarding calls to a single peer.
#[derive(Debug)]
pub struct CircuitBreaker {
    peer: String,
    config: BreakerConfig,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    #[must_use]
    pub fn new(peer: impl Into<String>, config: BreakerConfig) -> Self {
        Self {
            peer: peer.into(),
            config,
            inner: Mutex::new(Inner {
                state: CircuitState::Closed,
                failure_count: 0,
                opened_at: None,
                probe_started_at: None,
            }),
        }
    }

    /// Asks permission to place a call.
    ///
    /// While open, returns [`RpcError::CircuitOpen`] until the recovery
    /// timeout elapses; the first acquire after that becomes the half-open
    /// probe. While half-open, everything except the probe is rejected. A
    /// probe that never reports an outcome (its caller was cancelled or timed
    /// out and dropped) goes stale after another recovery window, and the
    /// next acquire takes its place.
    ///
    /// # Errors
    /// Returns `RpcError::CircuitOpen` when the call must not be placed.
    pub fn try_acquire(&self) -> Result<(), RpcError> {
        let mut inner = self.inner.lock();
        match inner.state {
            CircuitState::Closed => Ok(()),
            CircuitState::Open => {
                let elapsed = inner.opened_at.map(|t| t.elapsed());
                if elapsed.is_some_and(|e| e >= self.config.recovery_timeout) {
                    inner.state = CircuitState::HalfOpen;
                    inner.probe_started_at = Some(Instant::now());
                    tracing::debug!(peer = %self.peer, "circuit half-open, admitting probe");
                    Ok(())
                } else {
                    Err(RpcError::CircuitOpen {
                        peer: self.peer.clone(),
                    })
                }
            }
            CircuitState::HalfOpen => {
                let stale = inner
                    .probe_started_at
                    .is_none_or(|t| t.elapsed() >= self.config.recovery_timeout);
                if stale {
                    inner.probe_started_at = Some(Instant::now());
                    tracing::debug!(peer = %self.peer, "stale probe reclaimed, admitting new probe");
                    Ok(())
                } else {
                    Err(RpcError::CircuitOpen {
                        peer: self.peer.clone(),
                    })
                }
            }
        }
    }

    /// Records a successful call, closing the circuit and resetting counters.
    pub fn record_success(&self) {
        let mut inner = self.inner.lock();
        if inner.state != CircuitState::Closed {
            tracing::info!(peer = %self.peer, "circuit closed after successful probe");
        }
        inner.state = CircuitState::Closed;
        inner.failure_count = 0;
        inner.opened_at = None;
        inner.probe_started_at = None;
    }

    /// Records a failed call, opening the circuit at the threshold or after a
    /// failed probe.
    pub fn record_failure(&self) {
        let mut inner = self.inner.lock();
        match inner.state {
            CircuitState::HalfOpen => {
                inner.state = CircuitState::Open;
                inner.opened_at = Some(Instant::now());
                inner.probe_started_at = None;
                tracing::warn!(peer = %self.peer, "probe failed, circuit re-opened");
            }
            CircuitState::Closed => {
                inner.failure_count += 1;
                if inner.failure_count >= self.config.failure_threshold {
                    inner.state = CircuitState::Open;
                    inner.opened_at = Some(Instant::now());
                    tracing::warn!(
                        peer = %self.peer,
                        failures = inner.failure_count,
                        "failure threshold reached, circuit opened"
                    );
                }
            }
            // A failure reported while already open (e.g. a call admitted
            // just before the transition) keeps the circuit open.
            CircuitState::Open => {
                inner.opened_at = Some(Instant::now());
            }
        }
    }

    #[must_use]
    pub fn state(&self) -> CircuitState {
        self.inner.lock().state
    }

    #[must_use]
    pub fn failure_count(&self) -> u32 {
        self.inner.lock().failure_count
    }

    #[must_use]
    pub fn peer(&self) -> &str {
        &self.peer
    }
}
