use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackoffConfig {
    #[serde(default = "default_initial_ms")]
    pub initial_ms: u64,
    #[serde(default = "default_max_ms")]
    pub max_ms: u64,
    #[serde(default = "default_factor")]
    pub factor: f64,
}

fn default_initial_ms() -> u64 {
    500
}

fn default_max_ms() -> u64 {
    30_000
}

fn default_factor() -> f64 {
    2.0
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_ms: default_initial_ms(),
            max_ms: default_max_ms(),
            factor: default_factor(),
        }
    }
}

/// Exponential delay between failed polls, capped at `max_ms`.
#[derive(Debug, Clone)]
pub struct Backoff {
    cfg: BackoffConfig,
    current: Option<Duration>,
}

impl Backoff {
    pub fn new(cfg: BackoffConfig) -> Self {
        Self { cfg, current: None }
    }

    pub fn next_delay(&mut self) -> Duration {
        let max = Duration::from_millis(self.cfg.max_ms.max(1));
        let next = match self.current {
            None => Duration::from_millis(self.cfg.initial_ms.max(1)),
            Some(prev) => prev.mul_f64(self.cfg.factor.max(1.0)),
        }
        .min(max);
        self.current = Some(next);
        next
    }

    pub fn reset(&mut self) {
        self.current = None;
    }
}

#[cfg(test)]
mod tests {
    use super::{Backoff, BackoffConfig};
    use std::time::Duration;

    #[test]
    fn delay_grows_until_capped_and_resets() {
        let mut backoff = Backoff::new(BackoffConfig {
            initial_ms: 100,
            max_ms: 350,
            factor: 2.0,
        });
        assert_eq!(backoff.next_delay(), Duration::from_millis(100));
        assert_eq!(backoff.next_delay(), Duration::from_millis(200));
        assert_eq!(backoff.next_delay(), Duration::from_millis(350));
        assert_eq!(backoff.next_delay(), Duration::from_millis(350));
        backoff.reset();
        assert_eq!(backoff.next_delay(), Duration::from_millis(100));
    }
}
