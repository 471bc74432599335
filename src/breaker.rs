// src/breaker.rs
// Circuit breaker guarding one upstream client. State lives in a plain
// struct driven by pure transition functions; the async wrapper only
// holds the mutex around those transitions.

use std::future::Future;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::error::UpstreamError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Circuit {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug, Clone, Copy)]
pub struct BreakerConfig {
    /// Consecutive failures before the circuit opens.
    pub threshold: u32,
    /// How long an open circuit rejects calls before probing again.
    pub cooldown: Duration,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            threshold: 5,
            cooldown: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct BreakerState {
    pub circuit: Circuit,
    pub failure_count: u32,
    pub last_failure: Option<Instant>,
}

impl BreakerState {
    pub fn new() -> Self {
        Self {
            circuit: Circuit::Closed,
            failure_count: 0,
            last_failure: None,
        }
    }

    /// Decide whether a call may proceed at `now`. An open circuit whose
    /// cooldown has elapsed moves to half-open and admits one probe; the
    /// transition check runs on every call attempt.
    pub fn admit(self, cfg: &BreakerConfig, now: Instant) -> (Self, bool) {
        match self.circuit {
            Circuit::Closed | Circuit::HalfOpen => (self, true),
            Circuit::Open => {
                let cooled = self
                    .last_failure
                    .is_some_and(|t| now.duration_since(t) > cfg.cooldown);
                if cooled {
                    (
                        Self {
                            circuit: Circuit::HalfOpen,
                            ..self
                        },
                        true,
                    )
                } else {
                    (self, false)
                }
            }
        }
    }

    /// One success restores full traffic: closed circuit, zero failures.
    pub fn on_success(self) -> Self {
        Self {
            circuit: Circuit::Closed,
            failure_count: 0,
            last_failure: self.last_failure,
        }
    }

    pub fn on_failure(self, cfg: &BreakerConfig, now: Instant) -> Self {
        let failure_count = self.failure_count + 1;
        // A half-open probe failing re-opens immediately, regardless of count.
        let circuit = if failure_count >= cfg.threshold || self.circuit == Circuit::HalfOpen {
            Circuit::Open
        } else {
            Circuit::Closed
        };
        Self {
            circuit,
            failure_count,
            last_failure: Some(now),
        }
    }
}

impl Default for BreakerState {
    fn default() -> Self {
        Self::new()
    }
}

/// Async wrapper owning one breaker's state.
#[derive(Debug)]
pub struct CircuitBreaker {
    provider: &'static str,
    config: BreakerConfig,
    state: Mutex<BreakerState>,
}

impl CircuitBreaker {
    pub fn new(provider: &'static str, config: BreakerConfig) -> Self {
        Self {
            provider,
            config,
            state: Mutex::new(BreakerState::new()),
        }
    }

    /// Run `fut` through the breaker. While open, rejects without
    /// invoking the wrapped call.
    pub async fn call<T, F>(&self, fut: F) -> Result<T, UpstreamError>
    where
        F: Future<Output = Result<T, UpstreamError>>,
    {
        {
            let mut state = self.state.lock().expect("breaker mutex poisoned");
            let (next, admitted) = state.admit(&self.config, Instant::now());
            *state = next;
            if !admitted {
                return Err(UpstreamError::CircuitOpen {
                    provider: self.provider,
                });
            }
        }

        let outcome = fut.await;

        let mut state = self.state.lock().expect("breaker mutex poisoned");
        match &outcome {
            Ok(_) => *state = state.on_success(),
            Err(_) => *state = state.on_failure(&self.config, Instant::now()),
        }
        outcome
    }

    pub fn circuit(&self) -> Circuit {
        self.state.lock().expect("breaker mutex poisoned").circuit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> BreakerConfig {
        BreakerConfig {
            threshold: 3,
            cooldown: Duration::from_secs(60),
        }
    }

    fn fail(provider: &'static str) -> UpstreamError {
        UpstreamError::Http {
            provider,
            message: "boom".into(),
        }
    }

    #[test]
    fn opens_after_threshold_consecutive_failures() {
        let cfg = cfg();
        let now = Instant::now();
        let mut s = BreakerState::new();
        for _ in 0..2 {
            s = s.on_failure(&cfg, now);
            assert_eq!(s.circuit, Circuit::Closed);
        }
        s = s.on_failure(&cfg, now);
        assert_eq!(s.circuit, Circuit::Open);
        assert_eq!(s.failure_count, 3);
    }

    #[test]
    fn success_resets_failure_count() {
        let cfg = cfg();
        let now = Instant::now();
        let s = BreakerState::new().on_failure(&cfg, now).on_failure(&cfg, now);
        let s = s.on_success();
        assert_eq!(s.circuit, Circuit::Closed);
        assert_eq!(s.failure_count, 0);
    }

    #[test]
    fn open_rejects_until_cooldown_then_half_opens() {
        let cfg = cfg();
        let t0 = Instant::now();
        let mut s = BreakerState::new();
        for _ in 0..3 {
            s = s.on_failure(&cfg, t0);
        }
        assert_eq!(s.circuit, Circuit::Open);

        // Within cooldown: rejected.
        let (s, admitted) = s.admit(&cfg, t0 + Duration::from_secs(30));
        assert!(!admitted);
        assert_eq!(s.circuit, Circuit::Open);

        // Past cooldown: one probe admitted in half-open.
        let (s, admitted) = s.admit(&cfg, t0 + Duration::from_secs(61));
        assert!(admitted);
        assert_eq!(s.circuit, Circuit::HalfOpen);

        // Probe success restores full traffic.
        let s = s.on_success();
        assert_eq!(s.circuit, Circuit::Closed);
        assert_eq!(s.failure_count, 0);
    }

    #[test]
    fn half_open_probe_failure_reopens() {
        let cfg = cfg();
        let t0 = Instant::now();
        let mut s = BreakerState::new();
        for _ in 0..3 {
            s = s.on_failure(&cfg, t0);
        }
        let (s, _) = s.admit(&cfg, t0 + Duration::from_secs(61));
        assert_eq!(s.circuit, Circuit::HalfOpen);
        let s = s.on_failure(&cfg, t0 + Duration::from_secs(61));
        assert_eq!(s.circuit, Circuit::Open);
    }

    #[tokio::test]
    async fn open_circuit_short_circuits_without_invoking() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let breaker = CircuitBreaker::new(
            "test",
            BreakerConfig {
                threshold: 2,
                cooldown: Duration::from_secs(60),
            },
        );
        let calls = AtomicUsize::new(0);

        for _ in 0..2 {
            let res: Result<(), _> = breaker
                .call(async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(fail("test"))
                })
                .await;
            assert!(res.is_err());
        }
        assert_eq!(breaker.circuit(), Circuit::Open);

        // Third call is rejected before the closure runs.
        let res: Result<(), _> = breaker
            .call(async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .await;
        assert!(matches!(res, Err(UpstreamError::CircuitOpen { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
