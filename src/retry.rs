use core::time::Duration;
use std::marker::PhantomData;

/// Exponential backoff between retries, doubling up to a maximum.
#[derive(Copy, Clone, Debug)]
pub struct ExpBackoff {
    max: Duration,
    initial: Duration,
    current: Duration,
}

/// Retries a fallible operation, blocking the calling thread between
/// attempts.
pub struct Retry<E, F = fn(&E) -> bool> {
    max_retries: Option<usize>,
    should_retry: F,
    backoff: Option<ExpBackoff>,
    sleep: fn(Duration),
    target: &'static str,
    _error: PhantomData<fn(E)>,
}

// === impl ExpBackoff ===

impl ExpBackoff {
    const DEFAULT_MAX_BACKOFF: Duration = Duration::from_secs(60);

    pub const fn new(initial: Duration) -> Self {
        Self {
            max: Self::DEFAULT_MAX_BACKOFF,
            current: initial,
            initial,
        }
    }

    pub const fn with_max(self, max: Duration) -> Self {
        Self { max, ..self }
    }

    /// Returns the delay to wait now, and doubles the next one.
    pub fn next_delay(&mut self) -> Duration {
        let current = self.current;
        if self.current < self.max {
            self.current = (self.current * 2).min(self.max);
        }
        current
    }

    pub fn reset(&mut self) {
        self.current = self.initial;
    }

    pub fn current(&self) -> Duration {
        self.current
    }
}

// === impl Retry ===

impl<E> Retry<E> {
    /// Gives up after `max_retries` failed retries.
    pub const fn new(max_retries: usize) -> Self {
        Self {
            max_retries: Some(max_retries),
            should_retry: |_: &E| true,
            backoff: None,
            sleep: std::thread::sleep,
            target: "retry",
            _error: PhantomData,
        }
    }

    /// Keeps trying until the operation succeeds.
    pub const fn forever() -> Self {
        Self {
            max_retries: None,
            ..Self::new(0)
        }
    }
}

impl<E, F> Retry<E, F> {
    pub fn with_target(self, target: &'static str) -> Self {
        Self { target, ..self }
    }

    pub fn with_backoff(self, backoff: ExpBackoff) -> Self {
        Self {
            backoff: Some(backoff),
            ..self
        }
    }

    /// Replaces the function used to wait out the backoff.
    pub fn with_sleep(self, sleep: fn(Duration)) -> Self {
        Self { sleep, ..self }
    }
}

impl<E, F> Retry<E, F>
where
    F: Fn(&E) -> bool,
    E: std::fmt::Debug,
{
    pub fn with_predicate<F2>(self, should_retry: F2) -> Retry<E, F2>
    where
        F2: Fn(&E) -> bool,
    {
        Retry {
            max_retries: self.max_retries,
            should_retry,
            backoff: self.backoff,
            sleep: self.sleep,
            target: self.target,
            _error: PhantomData,
        }
    }

    pub fn run<T>(&self, mut op: impl FnMut() -> Result<T, E>) -> Result<T, E> {
        let mut retries = self.max_retries;
        let mut backoff = self.backoff;
        loop {
            match op() {
                Ok(val) => return Ok(val),
                Err(error) if (self.should_retry)(&error) && retries != Some(0) => {
                    if let Some(retries) = retries.as_mut() {
                        *retries -= 1;
                    }
                    match retries {
                        Some(remaining) => log::warn!(
                            target: self.target,
                            "retrying: {error:?} ({remaining} retries remaining)"
                        ),
                        None => log::warn!(target: self.target, "retrying: {error:?}"),
                    }
                    if let Some(backoff) = backoff.as_mut() {
                        let delay = backoff.next_delay();
                        log::debug!(target: self.target, "backing off for {delay:?}...");
                        (self.sleep)(delay);
                    }
                }
                Err(error) => return Err(error),
            }
        }
    }
}
