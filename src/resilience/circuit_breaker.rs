/// Circuit breaker shared by all requests on one outbound channel
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Share of failed calls in the window that opens the circuit
    pub failure_ratio: f64,
    pub sampling_window: Duration,
    /// Minimum calls in the window before the ratio is evaluated
    pub min_throughput: usize,
    pub break_duration: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_ratio: 0.5,
            sampling_window: Duration::from_secs(30),
            min_throughput: 5,
            break_duration: Duration::from_secs(15),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug)]
enum State {
    Closed,
    Open { until: Instant },
    /// A single probe call is in flight; another is admitted only if it
    /// never reports back within the break duration
    HalfOpen { probe_started: Instant },
}

#[derive(Debug)]
struct Inner {
    state: State,
    /// (recorded at, failed)
    outcomes: VecDeque<(Instant, bool)>,
}

#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    pub fn new<S: Into<String>>(name: S, config: CircuitBreakerConfig) -> Self {
        Self {
            name: name.into(),
            config,
            inner: Mutex::new(Inner {
                state: State::Closed,
                outcomes: VecDeque::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // A panic while holding the lock leaves the state consistent
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn state(&self) -> CircuitState {
        match self.lock().state {
            State::Closed => CircuitState::Closed,
            State::Open { until } if Instant::now() >= until => CircuitState::HalfOpen,
            State::Open { .. } => CircuitState::Open,
            State::HalfOpen { .. } => CircuitState::HalfOpen,
        }
    }

    /// Ask permission for one call; false means the call must not be made
    pub fn try_acquire(&self) -> bool {
        let mut guard = self.lock();
        let inner = &mut *guard;
        match inner.state {
            State::Closed => true,
            State::Open { until } => {
                if Instant::now() >= until {
                    info!(channel = %self.name, "Circuit half-open, sending probe");
                    inner.state = State::HalfOpen {
                        probe_started: Instant::now(),
                    };
                    true
                } else {
                    false
                }
            }
            State::HalfOpen { probe_started } => {
                if probe_started.elapsed() >= self.config.break_duration {
                    inner.state = State::HalfOpen {
                        probe_started: Instant::now(),
                    };
                    true
                } else {
                    false
                }
            }
        }
    }

    pub fn record_success(&self) {
        let mut guard = self.lock();
        let inner = &mut *guard;
        match inner.state {
            State::HalfOpen { .. } => {
                info!(channel = %self.name, "Circuit closed after successful probe");
                inner.state = State::Closed;
                inner.outcomes.clear();
            }
            State::Closed => {
                let now = Instant::now();
                inner.outcomes.push_back((now, false));
                self.prune(inner, now);
            }
            State::Open { .. } => {}
        }
    }

    pub fn record_failure(&self) {
        let mut guard = self.lock();
        let inner = &mut *guard;
        let now = Instant::now();
        match inner.state {
            State::HalfOpen { .. } => {
                warn!(channel = %self.name, "Probe failed, circuit re-opened");
                self.open(inner, now);
            }
            State::Closed => {
                inner.outcomes.push_back((now, true));
                self.prune(inner, now);

                let samples = inner.outcomes.len();
                let failures = inner.outcomes.iter().filter(|(_, failed)| *failed).count();
                if samples >= self.config.min_throughput
                    && failures as f64 / samples as f64 >= self.config.failure_ratio
                {
                    warn!(
                        channel = %self.name,
                        failures,
                        samples,
                        "Failure ratio exceeded, circuit opened for {:?}",
                        self.config.break_duration
                    );
                    self.open(inner, now);
                }
            }
            State::Open { .. } => {}
        }
    }

    fn open(&self, inner: &mut Inner, now: Instant) {
        inner.state = State::Open {
            until: now + self.config.break_duration,
        };
        inner.outcomes.clear();
    }

    fn prune(&self, inner: &mut Inner, now: Instant) {
        while let Some((at, _)) = inner.outcomes.front() {
            if now.duration_since(*at) > self.config.sampling_window {
                inner.outcomes.pop_front();
            } else {
                break;
            }
        }
    }
}
