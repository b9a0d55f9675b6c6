use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

/// Indicates whether an error should be retried or treated as fatal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDisposition {
    Retry,
    Stop,
}

/// Result of running an operation under the retry policy.
#[derive(Debug)]
pub enum RetryError<E> {
    /// The error was considered fatal and should bubble up immediately.
    Fatal { error: E, attempts: usize },
    /// The error was retryable, but the configured attempts were exhausted.
    AttemptsExceeded { error: E, attempts: usize },
}

impl<E> RetryError<E> {
    pub fn attempts(&self) -> usize {
        match self {
            RetryError::Fatal { attempts, .. } | RetryError::AttemptsExceeded { attempts, .. } => {
                *attempts
            }
        }
    }

    pub fn error(&self) -> &E {
        match self {
            RetryError::Fatal { error, .. } | RetryError::AttemptsExceeded { error, .. } => error,
        }
    }

    pub fn into_inner(self) -> E {
        match self {
            RetryError::Fatal { error, .. } | RetryError::AttemptsExceeded { error, .. } => error,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// `base * 2^attempt`, capped at the policy's max delay.
    Exponential,
    Fixed,
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: usize,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub backoff: Backoff,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(5),
            backoff: Backoff::Exponential,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: usize, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay: if max_delay.is_zero() {
                base_delay
            } else {
                max_delay
            },
            backoff: Backoff::Exponential,
        }
    }

    /// Preset for load requests: one initial attempt plus `retries` retries.
    pub fn for_requests(retries: u32) -> Self {
        Self {
            max_attempts: retries as usize + 1,
            ..Self::default()
        }
    }

    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Executes the operation with the configured retry policy.
    pub async fn run<F, Fut, T, E, Classifier>(
        &self,
        op: F,
        classify: Classifier,
    ) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        Classifier: Fn(&E) -> RetryDisposition,
    {
        self.run_observed(op, classify, |_, _, _| {}).await
    }

    /// Like [`RetryPolicy::run`], calling `on_retry(attempt, &error, delay)`
    /// before each backoff sleep.
    pub async fn run_observed<F, Fut, T, E, Classifier, Observer>(
        &self,
        mut op: F,
        classify: Classifier,
        mut on_retry: Observer,
    ) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        Classifier: Fn(&E) -> RetryDisposition,
        Observer: FnMut(usize, &E, Duration),
    {
        let mut attempt = 0;

        loop {
            match op().await {
                Ok(result) => return Ok(result),
                Err(error) => match classify(&error) {
                    RetryDisposition::Stop => {
                        return Err(RetryError::Fatal {
                            error,
                            attempts: attempt + 1,
                        });
                    }
                    RetryDisposition::Retry => {
                        if attempt + 1 >= self.max_attempts {
                            return Err(RetryError::AttemptsExceeded {
                                error,
                                attempts: attempt + 1,
                            });
                        }

                        let delay = self.backoff_delay(attempt);
                        on_retry(attempt + 1, &error, delay);
                        sleep(delay).await;
                        attempt += 1;
                    }
                },
            }
        }
    }

    fn backoff_delay(&self, attempt: usize) -> Duration {
        if self.base_delay.is_zero() {
            return Duration::from_millis(0);
        }

        let factor = match self.backoff {
            Backoff::Exponential => 1u128 << attempt.min(6),
            Backoff::Fixed => 1,
        };
        let base_ms = self.base_delay.as_millis();
        let delay_ms = base_ms.saturating_mul(factor);
        let capped = delay_ms.min(self.max_delay.as_millis());
        Duration::from_millis(capped as u64)
    }
}
