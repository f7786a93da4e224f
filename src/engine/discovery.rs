// src/engine/discovery.rs

use std::time::Duration;

use tokio::time::Instant;

/// Overall deadline shared by the discovery waits of one launch.
#[derive(Debug, Clone, Copy)]
pub(crate) struct DiscoveryDeadline {
    started: Instant,
    limit: Option<Duration>,
}

impl DiscoveryDeadline {
    pub(crate) fn start(limit: Option<Duration>) -> Self {
        Self {
            started: Instant::now(),
            limit,
        }
    }

    pub(crate) fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Length of the next wait: one tick, cut short by the deadline.
    /// `None` once the deadline has passed.
    pub(crate) fn next_wait(&self, tick: Duration) -> Option<Duration> {
        match self.limit {
            None => Some(tick),
            Some(limit) => {
                let elapsed = self.elapsed();
                if elapsed >= limit {
                    None
                } else {
                    Some(tick.min(limit - elapsed))
                }
            }
        }
    }
}
