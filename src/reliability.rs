//! Retry and circuit breaking for calls to external services.
//!
//! Instances are constructed explicitly and owned by whoever calls the
//! service. The validator and resize engine never retry.

use std::future::Future;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::config::{BreakerConfig, RetryConfig, VisionConfig};
use crate::error::CollaboratorError;
use crate::vision::{LogoDetection, VisionAnalyzer, VisionFindings};

pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Exponential backoff: `base * 2^(attempt - 1)`, capped at `max_delay`.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay: config.base_delay(),
            max_delay: config.max_delay(),
        }
    }

    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    /// Run `op` until it succeeds or attempts run out. An open circuit is
    /// returned immediately.
    pub async fn run<T, F, Fut>(&self, mut op: F) -> Result<T, CollaboratorError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, CollaboratorError>>,
    {
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e @ CollaboratorError::CircuitOpen { .. }) => return Err(e),
                Err(e) if attempt >= self.max_attempts => return Err(e),
                Err(e) => {
                    let delay = self.delay_for(attempt);
                    tracing::warn!(attempt, delay_ms = delay.as_millis() as u64, error = %e, "retrying");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed,
    Open,
    /// Reset timeout elapsed; one trial call is admitted until it reports back.
    HalfOpen,
}

#[derive(Debug)]
struct BreakerInner {
    state: BreakerState,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
    trial_in_flight: bool,
}

pub struct CircuitBreaker<C: Clock = SystemClock> {
    name: String,
    failure_threshold: u32,
    reset_timeout: Duration,
    clock: C,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker<SystemClock> {
    pub fn new(name: impl Into<String>, config: &BreakerConfig) -> Self {
        Self::with_clock(name, config, SystemClock)
    }
}

impl<C: Clock> CircuitBreaker<C> {
    pub fn with_clock(name: impl Into<String>, config: &BreakerConfig, clock: C) -> Self {
        Self {
            name: name.into(),
            failure_threshold: config.failure_threshold.max(1),
            reset_timeout: config.reset_timeout(),
            clock,
            inner: Mutex::new(BreakerInner {
                state: BreakerState::Closed,
                consecutive_failures: 0,
                opened_at: None,
                trial_in_flight: false,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> BreakerState {
        let mut inner = self.inner.lock();
        self.refresh(&mut inner);
        inner.state
    }

    fn refresh(&self, inner: &mut BreakerInner) {
        if inner.state == BreakerState::Open {
            let elapsed = inner.opened_at.map(|t| self.clock.now().saturating_duration_since(t));
            if elapsed.is_some_and(|e| e >= self.reset_timeout) {
                inner.state = BreakerState::HalfOpen;
            }
        }
    }

    pub fn try_acquire(&self) -> Result<(), CollaboratorError> {
        let mut inner = self.inner.lock();
        self.refresh(&mut inner);
        match inner.state {
            BreakerState::Closed => Ok(()),
            BreakerState::HalfOpen if !inner.trial_in_flight => {
                inner.trial_in_flight = true;
                Ok(())
            }
            BreakerState::HalfOpen | BreakerState::Open => Err(CollaboratorError::CircuitOpen {
                service: self.name.clone(),
            }),
        }
    }

    pub fn record_success(&self) {
        let mut inner = self.inner.lock();
        inner.state = BreakerState::Closed;
        inner.consecutive_failures = 0;
        inner.opened_at = None;
        inner.trial_in_flight = false;
    }

    pub fn record_failure(&self) {
        let mut inner = self.inner.lock();
        self.refresh(&mut inner);
        inner.trial_in_flight = false;
        inner.consecutive_failures += 1;
        let trip = inner.state == BreakerState::HalfOpen || inner.consecutive_failures >= self.failure_threshold;
        if trip && inner.state != BreakerState::Open {
            tracing::warn!(breaker = %self.name, failures = inner.consecutive_failures, "circuit opened");
            inner.state = BreakerState::Open;
            inner.opened_at = Some(self.clock.now());
        }
    }

    /// Await `fut` if the circuit allows it and record the outcome.
    pub async fn call<T, Fut>(&self, fut: Fut) -> Result<T, CollaboratorError>
    where
        Fut: Future<Output = Result<T, CollaboratorError>>,
    {
        self.try_acquire()?;
        let result = fut.await;
        match &result {
            Ok(_) => self.record_success(),
            Err(_) => self.record_failure(),
        }
        result
    }
}

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// A [`VisionAnalyzer`] behind a per-attempt timeout, retry and a circuit
/// breaker. A timed-out attempt counts as a breaker failure.
pub struct ResilientVisionAnalyzer<A, C: Clock = SystemClock> {
    inner: A,
    timeout: Duration,
    retry: RetryPolicy,
    breaker: CircuitBreaker<C>,
}

impl<A: VisionAnalyzer> ResilientVisionAnalyzer<A, SystemClock> {
    pub fn from_config(inner: A, config: &VisionConfig) -> Self {
        Self::new(inner, RetryPolicy::from_config(&config.retry), CircuitBreaker::new("vision", &config.breaker))
            .with_timeout(config.request_timeout())
    }
}

impl<A: VisionAnalyzer, C: Clock> ResilientVisionAnalyzer<A, C> {
    pub fn new(inner: A, retry: RetryPolicy, breaker: CircuitBreaker<C>) -> Self {
        Self {
            inner,
            timeout: DEFAULT_REQUEST_TIMEOUT,
            retry,
            breaker,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn breaker(&self) -> &CircuitBreaker<C> {
        &self.breaker
    }

    async fn attempt<T, Fut>(&self, fut: Fut) -> Result<T, CollaboratorError>
    where
        Fut: Future<Output = Result<T, CollaboratorError>>,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(CollaboratorError::Timeout {
                service: self.breaker.name().to_string(),
            }),
        }
    }

    async fn guard<T, F, Fut>(&self, mut op: F) -> Result<T, CollaboratorError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, CollaboratorError>>,
    {
        self.retry.run(|| self.breaker.call(self.attempt(op()))).await
    }
}

#[async_trait]
impl<A: VisionAnalyzer, C: Clock> VisionAnalyzer for ResilientVisionAnalyzer<A, C> {
    async fn detect_logo(&self, image_url: &str) -> Result<LogoDetection, CollaboratorError> {
        self.guard(|| self.inner.detect_logo(image_url)).await
    }

    async fn analyze_text_compliance(&self, image_url: &str) -> Result<VisionFindings, CollaboratorError> {
        self.guard(|| self.inner.analyze_text_compliance(image_url)).await
    }

    async fn analyze_color_compliance(
        &self,
        image_url: &str,
        brand_colors: &[String],
    ) -> Result<VisionFindings, CollaboratorError> {
        self.guard(|| self.inner.analyze_color_compliance(image_url, brand_colors)).await
    }

    async fn analyze_layout_compliance(
        &self,
        image_url: &str,
        safe_zone_margin: f64,
    ) -> Result<VisionFindings, CollaboratorError> {
        self.guard(|| self.inner.analyze_layout_compliance(image_url, safe_zone_margin)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[derive(Clone)]
    struct ManualClock(Arc<Mutex<Instant>>);

    impl ManualClock {
        fn new() -> Self {
            Self(Arc::new(Mutex::new(Instant::now())))
        }

        fn advance(&self, by: Duration) {
            *self.0.lock() += by;
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> Instant {
            *self.0.lock()
        }
    }

    fn breaker(clock: ManualClock) -> CircuitBreaker<ManualClock> {
        let config = BreakerConfig {
            failure_threshold: 2,
            reset_timeout_ms: 1_000,
        };
        CircuitBreaker::with_clock("test", &config, clock)
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let policy = RetryPolicy {
            max_attempts: 5,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(350),
        };
        assert_eq!(policy.delay_for(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for(3), Duration::from_millis(350));
        assert_eq!(policy.delay_for(40), Duration::from_millis(350));
    }

    #[test]
    fn breaker_opens_then_half_opens() {
        let clock = ManualClock::new();
        let b = breaker(clock.clone());

        b.record_failure();
        assert_eq!(b.state(), BreakerState::Closed);
        b.record_failure();
        assert_eq!(b.state(), BreakerState::Open);
        assert!(matches!(b.try_acquire(), Err(CollaboratorError::CircuitOpen { .. })));

        clock.advance(Duration::from_millis(1_000));
        assert_eq!(b.state(), BreakerState::HalfOpen);

        // A failed trial reopens immediately.
        b.record_failure();
        assert_eq!(b.state(), BreakerState::Open);

        clock.advance(Duration::from_millis(1_000));
        b.record_success();
        assert_eq!(b.state(), BreakerState::Closed);
    }

    #[test]
    fn half_open_admits_a_single_trial() {
        let clock = ManualClock::new();
        let b = breaker(clock.clone());
        b.record_failure();
        b.record_failure();
        clock.advance(Duration::from_millis(1_000));

        assert!(b.try_acquire().is_ok());
        assert!(matches!(b.try_acquire(), Err(CollaboratorError::CircuitOpen { .. })));
        assert_eq!(b.state(), BreakerState::HalfOpen);

        b.record_success();
        assert_eq!(b.state(), BreakerState::Closed);
        assert!(b.try_acquire().is_ok());
        assert!(b.try_acquire().is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn retry_succeeds_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(100),
        };
        let result = policy
            .run(|| async {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                if n < 3 {
                    Err(CollaboratorError::request_failed("vision", "503"))
                } else {
                    Ok(n)
                }
            })
            .await;
        assert_eq!(result, Ok(3));
    }

    #[tokio::test(start_paused = true)]
    async fn retry_gives_up_and_skips_open_circuit() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy {
            max_attempts: 2,
            base_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(10),
        };
        let result: Result<(), _> = policy
            .run(|| async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(CollaboratorError::request_failed("vision", "down"))
            })
            .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        calls.store(0, Ordering::SeqCst);
        let result: Result<(), _> = policy
            .run(|| async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(CollaboratorError::CircuitOpen { service: "vision".into() })
            })
            .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    struct StalledVision;

    #[async_trait]
    impl VisionAnalyzer for StalledVision {
        async fn detect_logo(&self, _image_url: &str) -> Result<LogoDetection, CollaboratorError> {
            tokio::time::sleep(Duration::from_secs(3_600)).await;
            Ok(LogoDetection::default())
        }

        async fn analyze_text_compliance(&self, _image_url: &str) -> Result<VisionFindings, CollaboratorError> {
            Ok(VisionFindings::default())
        }

        async fn analyze_color_compliance(&self, _: &str, _: &[String]) -> Result<VisionFindings, CollaboratorError> {
            Ok(VisionFindings::default())
        }

        async fn analyze_layout_compliance(&self, _: &str, _: f64) -> Result<VisionFindings, CollaboratorError> {
            Ok(VisionFindings::default())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_request_times_out_and_counts_as_failure() {
        let policy = RetryPolicy {
            max_attempts: 1,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(1),
        };
        let analyzer = ResilientVisionAnalyzer::new(StalledVision, policy, breaker(ManualClock::new()))
            .with_timeout(Duration::from_millis(500));

        let err = analyzer.detect_logo("img").await.unwrap_err();
        assert_eq!(err, CollaboratorError::Timeout { service: "test".into() });
        assert!(analyzer.analyze_text_compliance("img").await.is_ok());

        let _ = analyzer.detect_logo("img").await;
        let _ = analyzer.detect_logo("img").await;
        assert_eq!(analyzer.breaker().state(), BreakerState::Open);
    }

    #[tokio::test]
    async fn breaker_call_records_outcome() {
        let b = breaker(ManualClock::new());
        let _ = b.call(async { Err::<(), _>(CollaboratorError::request_failed("x", "e")) }).await;
        let _ = b.call(async { Err::<(), _>(CollaboratorError::request_failed("x", "e")) }).await;
        let blocked = b.call(async { Ok(1) }).await;
        assert!(matches!(blocked, Err(CollaboratorError::CircuitOpen { .. })));
    }
}
