//! Submission pacing.
//!
//! The remote platform rate-limits its API, so batch submissions are spaced out
//! by a `Pacer`. Pacing bounds how fast jobs are *submitted*, not how fast they run.

use async_trait::async_trait;
use std::time::Duration;
use tokio::time::{Interval, MissedTickBehavior};

#[async_trait]
pub trait Pacer: Send {
    /// Resolves when the next submission may go out.
    async fn ready(&mut self);
}

/// Lets one submission through per fixed interval; the first goes out at once.
///
/// Built on `tokio::time::Interval`, so tests drive it with a paused clock.
pub struct FixedIntervalPacer {
    delay: Duration,
    interval: Option<Interval>,
}

impl FixedIntervalPacer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            interval: None,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }
}

#[async_trait]
impl Pacer for FixedIntervalPacer {
    async fn ready(&mut self) {
        if self.delay.is_zero() {
            return;
        }

        // Created on first use: an interval needs a running timer driver.
        let delay = self.delay;
        let interval = self.interval.get_or_insert_with(|| {
            let mut interval = tokio::time::interval(delay);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            interval
        });
        interval.tick().await;
    }
}
