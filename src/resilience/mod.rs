/// Retry, timeout and circuit-breaker policy wrapped around outbound calls.
///
/// One ResiliencePolicy exists per outbound channel. The policy owns the
/// channel's circuit breaker, so breaker state is shared by every request
/// that goes through that channel.
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::errors::UpstreamError;

mod circuit_breaker;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};

/// Numeric budgets for one outbound channel
#[derive(Debug, Clone)]
pub struct ChannelPolicy {
    /// Hard ceiling for a call including all of its retries
    pub overall_timeout: Duration,
    /// Budget for a single attempt
    pub attempt_timeout: Duration,
    /// Total attempts, the first call included
    pub max_attempts: u32,
    pub retry_base_delay: Duration,
    /// Relative spread applied to each backoff delay (0.25 = ±25%)
    pub jitter: f64,
    pub breaker: CircuitBreakerConfig,
}

impl ChannelPolicy {
    pub fn geocoding() -> Self {
        Self {
            overall_timeout: Duration::from_secs(6),
            attempt_timeout: Duration::from_secs(4),
            ..Self::base()
        }
    }

    pub fn forecast() -> Self {
        Self {
            overall_timeout: Duration::from_secs(8),
            attempt_timeout: Duration::from_secs(6),
            ..Self::base()
        }
    }

    fn base() -> Self {
        Self {
            overall_timeout: Duration::from_secs(6),
            attempt_timeout: Duration::from_secs(4),
            max_attempts: 3,
            retry_base_delay: Duration::from_millis(500),
            jitter: 0.25,
            breaker: CircuitBreakerConfig::default(),
        }
    }

    /// Delay before retry number `retry` (1-based): exponential with jitter
    pub fn backoff(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(16);
        let base = self.retry_base_delay.as_secs_f64() * f64::from(1u32 << exponent);
        let factor = if self.jitter > 0.0 {
            rand::thread_rng().gen_range((1.0 - self.jitter)..=(1.0 + self.jitter))
        } else {
            1.0
        };
        Duration::from_secs_f64((base * factor).max(0.0))
    }
}

/// Tells the policy whether an outcome is worth another attempt
pub trait Transient {
    fn is_transient(&self) -> bool;
}

impl Transient for UpstreamError {
    fn is_transient(&self) -> bool {
        self.retryable
    }
}

/// Outcome of a call that made it through the policy, with the attempt count
#[derive(Debug)]
pub struct Attempted<T> {
    pub value: T,
    pub attempts: u32,
}

pub struct ResiliencePolicy {
    channel: String,
    policy: ChannelPolicy,
    breaker: CircuitBreaker,
}

impl ResiliencePolicy {
    pub fn new<S: Into<String>>(channel: S, policy: ChannelPolicy) -> Self {
        let channel = channel.into();
        let breaker = CircuitBreaker::new(channel.clone(), policy.breaker.clone());
        Self {
            channel,
            policy,
            breaker,
        }
    }

    pub fn circuit_state(&self) -> CircuitState {
        self.breaker.state()
    }

    /// Run `operation` under the channel's timeouts, retries and circuit breaker.
    ///
    /// A successful value that is itself transient (e.g. an HTTP 503 response)
    /// is retried like an error; once the budget is spent the last outcome is
    /// returned as-is so the caller can classify it.
    pub async fn execute<T, F, Fut>(&self, mut operation: F) -> Result<Attempted<T>, UpstreamError>
    where
        T: Transient,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, UpstreamError>>,
    {
        let deadline = Instant::now() + self.policy.overall_timeout;
        let mut attempt = 0u32;

        loop {
            attempt += 1;

            if !self.breaker.try_acquire() {
                warn!(channel = %self.channel, "Call rejected, circuit is open");
                return Err(UpstreamError::circuit_open(&self.channel).with_attempts(attempt - 1));
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                self.breaker.record_failure();
                return Err(UpstreamError::timed_out().with_attempts(attempt - 1));
            }
            let budget = remaining.min(self.policy.attempt_timeout);

            let outcome = match tokio::time::timeout(budget, operation()).await {
                Ok(outcome) => outcome,
                Err(_) => Err(UpstreamError::timed_out()),
            };

            let transient = match &outcome {
                Ok(value) => value.is_transient(),
                Err(err) => err.is_transient(),
            };

            if !transient {
                // terminal outcomes say nothing about upstream health
                self.breaker.record_success();
                return match outcome {
                    Ok(value) => Ok(Attempted {
                        value,
                        attempts: attempt,
                    }),
                    Err(err) => Err(err.with_attempts(attempt)),
                };
            }

            self.breaker.record_failure();

            if attempt >= self.policy.max_attempts {
                debug!(channel = %self.channel, attempt, "Retry budget exhausted");
                return finish(outcome, attempt);
            }

            let delay = self.policy.backoff(attempt);
            if Instant::now() + delay >= deadline {
                warn!(
                    channel = %self.channel,
                    attempt,
                    "Not retrying, backoff of {:?} would exceed the overall timeout",
                    delay
                );
                return finish(outcome, attempt);
            }

            warn!(
                channel = %self.channel,
                attempt,
                "Transient upstream failure, retrying in {:?}",
                delay
            );
            tokio::time::sleep(delay).await;
        }
    }
}

fn finish<T>(outcome: Result<T, UpstreamError>, attempts: u32) -> Result<Attempted<T>, UpstreamError> {
    match outcome {
        Ok(value) => Ok(Attempted { value, attempts }),
        Err(err) => Err(err.with_attempts(attempts)),
    }
}
