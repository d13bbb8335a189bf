//! Per-provider circuit breaker.
//!
//! State machine: Closed → Open after N consecutive failures, Open →
//! HalfOpen once the cooldown elapses, HalfOpen → Closed on the first
//! successful probe, HalfOpen → Open on the first failed probe. At most
//! one probe call may be in flight per provider; concurrent requests
//! hitting the same Open breaker cannot double-probe.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::info;

/// Breaker state, as observed by the gate and the health reporter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

impl std::fmt::Display for BreakerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Closed => write!(f, "closed"),
            Self::Open => write!(f, "open"),
            Self::HalfOpen => write!(f, "half_open"),
        }
    }
}

/// Breaker thresholds
#[derive(Debug, Clone, Copy)]
pub struct BreakerConfig {
    /// Consecutive failures that trip Closed → Open
    pub failure_threshold: u32,
    /// Time the breaker stays Open before permitting a probe
    pub cooldown: Duration,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            cooldown: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PermitKind {
    /// Normal call through a Closed breaker
    Call,
    /// The single half-open probe
    Probe,
}

/// Guard returned by a successful gate check. Report the call outcome
/// with [`Permit::record`]; a permit dropped without a report (caller
/// disconnect, task abort) counts as [`CallOutcome::Neutral`], so an
/// abandoned probe releases its slot instead of wedging the breaker.
pub struct Permit<'a> {
    breaker: &'a CircuitBreaker,
    kind: PermitKind,
    reported: bool,
}

impl Permit<'_> {
    pub fn is_probe(&self) -> bool {
        self.kind == PermitKind::Probe
    }

    /// Report the outcome of the permitted call
    pub fn record(mut self, outcome: CallOutcome) {
        self.reported = true;
        self.breaker.apply(self.kind, outcome);
    }
}

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        if !self.reported {
            self.breaker.apply(self.kind, CallOutcome::Neutral);
        }
    }
}

impl std::fmt::Debug for Permit<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Permit")
            .field("kind", &self.kind)
            .field("reported", &self.reported)
            .finish()
    }
}

/// Outcome of a permitted call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallOutcome {
    /// Adapter call succeeded and the response was accepted
    Success,
    /// Adapter call failed (timeout, auth, rate limit, transport, ...)
    Failure,
    /// No availability signal: the call reached the provider but the
    /// content was rejected, or the call was abandoned
    Neutral,
}

struct BreakerInner {
    state: BreakerState,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
    last_failure_at: Option<DateTime<Utc>>,
    probe_in_flight: bool,
}

/// Serializable view of one breaker for the health reporter
#[derive(Debug, Clone, Serialize)]
pub struct BreakerSnapshot {
    pub state: BreakerState,
    pub consecutive_failures: u32,
    pub last_failure_at: Option<DateTime<Utc>>,
}

/// Circuit breaker for a single provider.
///
/// All transitions happen under one mutex; critical sections never
/// await. The breaker itself performs no network calls — the router
/// reports outcomes after each adapter call.
pub struct CircuitBreaker {
    name: String,
    config: BreakerConfig,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: BreakerConfig) -> Self {
        Self {
            name: name.into(),
            config,
            inner: Mutex::new(BreakerInner {
                state: BreakerState::Closed,
                consecutive_failures: 0,
                opened_at: None,
                last_failure_at: None,
                probe_in_flight: false,
            }),
        }
    }

    /// Gate check. Returns a permit when the provider may be called,
    /// `None` when it must be skipped. Moves Open → HalfOpen when the
    /// cooldown has elapsed, claiming the probe slot atomically.
    pub fn try_acquire(&self) -> Option<Permit<'_>> {
        let mut inner = self.inner.lock().expect("breaker lock poisoned");
        let kind = match inner.state {
            BreakerState::Closed => PermitKind::Call,
            BreakerState::Open => {
                let elapsed = inner
                    .opened_at
                    .map(|at| at.elapsed() >= self.config.cooldown)
                    .unwrap_or(true);
                if elapsed {
                    inner.state = BreakerState::HalfOpen;
                    inner.probe_in_flight = true;
                    info!("Breaker {} half-open, probing", self.name);
                    PermitKind::Probe
                } else {
                    return None;
                }
            }
            BreakerState::HalfOpen => {
                if inner.probe_in_flight {
                    return None;
                }
                inner.probe_in_flight = true;
                PermitKind::Probe
            }
        };
        Some(Permit {
            breaker: self,
            kind,
            reported: false,
        })
    }

    fn apply(&self, kind: PermitKind, outcome: CallOutcome) {
        let mut inner = self.inner.lock().expect("breaker lock poisoned");
        if kind == PermitKind::Probe {
            inner.probe_in_flight = false;
        }
        match outcome {
            CallOutcome::Success => {
                inner.consecutive_failures = 0;
                if inner.state != BreakerState::Closed {
                    info!("Breaker {} closed (was {})", self.name, inner.state);
                }
                inner.state = BreakerState::Closed;
                inner.opened_at = None;
            }
            CallOutcome::Failure => {
                inner.consecutive_failures += 1;
                inner.last_failure_at = Some(Utc::now());
                match inner.state {
                    BreakerState::Closed => {
                        if inner.consecutive_failures >= self.config.failure_threshold {
                            inner.state = BreakerState::Open;
                            inner.opened_at = Some(Instant::now());
                            info!(
                                "Breaker {} opened after {} consecutive failures",
                                self.name, inner.consecutive_failures
                            );
                        }
                    }
                    BreakerState::HalfOpen => {
                        inner.state = BreakerState::Open;
                        inner.opened_at = Some(Instant::now());
                        info!("Breaker {} probe failed, re-opened", self.name);
                    }
                    BreakerState::Open => {}
                }
            }
            CallOutcome::Neutral => {}
        }
    }

    /// Current state without side effects (an elapsed cooldown still
    /// reads Open until the next gate check)
    pub fn state(&self) -> BreakerState {
        self.inner.lock().expect("breaker lock poisoned").state
    }

    pub fn snapshot(&self) -> BreakerSnapshot {
        let inner = self.inner.lock().expect("breaker lock poisoned");
        BreakerSnapshot {
            state: inner.state,
            consecutive_failures: inner.consecutive_failures,
            last_failure_at: inner.last_failure_at,
        }
    }
}

impl std::fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("name", &self.name)
            .field("state", &self.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quick_config(threshold: u32, cooldown_ms: u64) -> BreakerConfig {
        BreakerConfig {
            failure_threshold: threshold,
            cooldown: Duration::from_millis(cooldown_ms),
        }
    }

    #[test]
    fn test_closed_allows_calls() {
        let cb = CircuitBreaker::new("p", BreakerConfig::default());
        let permit = cb.try_acquire().unwrap();
        assert!(!permit.is_probe());
        permit.record(CallOutcome::Success);
        assert_eq!(cb.state(), BreakerState::Closed);
    }

    #[test]
    fn test_opens_after_threshold_consecutive_failures() {
        let cb = CircuitBreaker::new("p", quick_config(3, 60_000));
        for _ in 0..2 {
            cb.try_acquire().unwrap().record(CallOutcome::Failure);
        }
        assert_eq!(cb.state(), BreakerState::Closed);

        cb.try_acquire().unwrap().record(CallOutcome::Failure);
        assert_eq!(cb.state(), BreakerState::Open);
        assert!(cb.try_acquire().is_none());
    }

    #[test]
    fn test_success_resets_failure_count() {
        let cb = CircuitBreaker::new("p", quick_config(3, 60_000));
        cb.try_acquire().unwrap().record(CallOutcome::Failure);
        cb.try_acquire().unwrap().record(CallOutcome::Failure);
        cb.try_acquire().unwrap().record(CallOutcome::Success);
        // Counter restarted; two more failures stay under the threshold
        cb.try_acquire().unwrap().record(CallOutcome::Failure);
        cb.try_acquire().unwrap().record(CallOutcome::Failure);
        assert_eq!(cb.state(), BreakerState::Closed);
    }

    #[test]
    fn test_neutral_does_not_count_as_failure() {
        let cb = CircuitBreaker::new("p", quick_config(2, 60_000));
        cb.try_acquire().unwrap().record(CallOutcome::Neutral);
        cb.try_acquire().unwrap().record(CallOutcome::Neutral);
        cb.try_acquire().unwrap().record(CallOutcome::Neutral);
        assert_eq!(cb.state(), BreakerState::Closed);
        assert_eq!(cb.snapshot().consecutive_failures, 0);
    }

    #[test]
    fn test_half_open_after_cooldown_single_probe() {
        let cb = CircuitBreaker::new("p", quick_config(1, 10));
        cb.try_acquire().unwrap().record(CallOutcome::Failure);
        assert_eq!(cb.state(), BreakerState::Open);
        assert!(cb.try_acquire().is_none());

        std::thread::sleep(Duration::from_millis(20));

        // First acquire after cooldown claims the probe slot
        let probe = cb.try_acquire().unwrap();
        assert!(probe.is_probe());
        assert_eq!(cb.state(), BreakerState::HalfOpen);
        // Second concurrent acquire is denied while the probe is out
        assert!(cb.try_acquire().is_none());

        probe.record(CallOutcome::Success);
        assert_eq!(cb.state(), BreakerState::Closed);
        assert!(!cb.try_acquire().unwrap().is_probe());
    }

    #[test]
    fn test_failed_probe_reopens() {
        let cb = CircuitBreaker::new("p", quick_config(1, 10));
        cb.try_acquire().unwrap().record(CallOutcome::Failure);
        std::thread::sleep(Duration::from_millis(20));

        cb.try_acquire().unwrap().record(CallOutcome::Failure);
        assert_eq!(cb.state(), BreakerState::Open);
        // Cooldown restarts from the failed probe
        assert!(cb.try_acquire().is_none());
    }

    #[test]
    fn test_neutral_probe_releases_slot_without_closing() {
        let cb = CircuitBreaker::new("p", quick_config(1, 10));
        cb.try_acquire().unwrap().record(CallOutcome::Failure);
        std::thread::sleep(Duration::from_millis(20));

        let probe = cb.try_acquire().unwrap();
        // Probe reached the provider but content was rejected: no
        // availability signal, slot goes back for the next request
        probe.record(CallOutcome::Neutral);
        assert_eq!(cb.state(), BreakerState::HalfOpen);
        assert!(cb.try_acquire().unwrap().is_probe());
    }

    #[test]
    fn test_dropped_probe_permit_releases_slot() {
        let cb = CircuitBreaker::new("p", quick_config(1, 10));
        cb.try_acquire().unwrap().record(CallOutcome::Failure);
        std::thread::sleep(Duration::from_millis(20));

        // Permit dropped without a report, as when the routing task is
        // cancelled mid-call
        let probe = cb.try_acquire().unwrap();
        drop(probe);

        assert_eq!(cb.state(), BreakerState::HalfOpen);
        assert_eq!(cb.snapshot().consecutive_failures, 1);
        // Slot is free again; the breaker is not wedged
        assert!(cb.try_acquire().unwrap().is_probe());
    }

    #[test]
    fn test_concurrent_acquire_yields_one_probe() {
        use std::sync::Barrier;
        use std::sync::atomic::{AtomicUsize, Ordering};

        let cb = CircuitBreaker::new("p", quick_config(1, 5));
        cb.try_acquire().unwrap().record(CallOutcome::Failure);
        std::thread::sleep(Duration::from_millis(10));

        let acquired = AtomicUsize::new(0);
        let barrier = Barrier::new(8);
        std::thread::scope(|s| {
            for _ in 0..8 {
                s.spawn(|| {
                    let permit = cb.try_acquire();
                    if permit.is_some() {
                        acquired.fetch_add(1, Ordering::SeqCst);
                    }
                    // Hold permits until every thread has attempted
                    barrier.wait();
                });
            }
        });
        assert_eq!(acquired.load(Ordering::SeqCst), 1, "exactly one thread may probe");
    }

    #[test]
    fn test_snapshot_reports_failures() {
        let cb = CircuitBreaker::new("p", quick_config(5, 60_000));
        cb.try_acquire().unwrap().record(CallOutcome::Failure);
        let snap = cb.snapshot();
        assert_eq!(snap.state, BreakerState::Closed);
        assert_eq!(snap.consecutive_failures, 1);
        assert!(snap.last_failure_at.is_some());
    }
}
