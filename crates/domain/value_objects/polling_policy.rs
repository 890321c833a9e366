use std::time::Duration;

/// Client-side polling schedule for the status endpoint. The server stays stateless:
/// the caller sends its attempt counter and gets back how long to wait, or nothing once
/// polling should stop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollingPolicy {
    pub interval: Duration,
    /// Attempts polled at `interval` before switching to `backoff_schedule`.
    pub backoff_after: u32,
    /// Delays used after `backoff_after` attempts; the last one repeats.
    pub backoff_schedule: Vec<Duration>,
    pub max_duration: Duration,
}

impl Default for PollingPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(3),
            backoff_after: 5,
            backoff_schedule: vec![
                Duration::from_secs(5),
                Duration::from_secs(10),
                Duration::from_secs(15),
            ],
            max_duration: Duration::from_secs(120),
        }
    }
}

impl PollingPolicy {
    /// Delay to wait after the given (zero-based) attempt.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        if attempt < self.backoff_after {
            return self.interval;
        }

        let step = (attempt - self.backoff_after) as usize;
        self.backoff_schedule
            .get(step)
            .or_else(|| self.backoff_schedule.last())
            .copied()
            .unwrap_or(self.interval)
    }

    /// Time spent waiting before the given attempt was made.
    pub fn elapsed_before(&self, attempt: u32) -> Duration {
        (0..attempt).map(|n| self.delay_after(n)).sum()
    }

    /// `None` once the next wait would run past `max_duration`.
    pub fn next_delay(&self, attempt: u32) -> Option<Duration> {
        let delay = self.delay_after(attempt);
        if self.elapsed_before(attempt) + delay > self.max_duration {
            return None;
        }
        Some(delay)
    }
}
