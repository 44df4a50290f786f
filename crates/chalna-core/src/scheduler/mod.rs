//! The single 1 Hz tick source.
//!
//! [`TickScheduler`] decides *whether* ticks should flow: it runs only while
//! every [`RunConditions`] flag holds, and each restart begins a new run with
//! an immediate first tick. [`TickDriver`] decides *when*: an async interval
//! stopped by a [`CancellationToken`].

use std::time::Duration;

use serde::Serialize;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Everything that must hold for the countdown to tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunConditions {
    pub is_active: bool,
    pub has_birth_date: bool,
    pub paused: bool,
    pub foreground: bool,
    /// The deadline has been reached; the clock stays stopped.
    pub expired: bool,
}

impl RunConditions {
    pub fn all_hold(&self) -> bool {
        self.is_active && self.has_birth_date && !self.paused && self.foreground && !self.expired
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// A new run began; tick once immediately.
    Started { run: u64 },
    Stopped,
    Unchanged,
}

/// Run/stop gate over [`RunConditions`].
#[derive(Debug, Default)]
pub struct TickScheduler {
    conditions: RunConditions,
    running: bool,
    run: u64,
}

impl TickScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Identifier of the current run. Ticks carrying an older id are stale.
    pub fn run(&self) -> u64 {
        self.run
    }

    pub fn conditions(&self) -> RunConditions {
        self.conditions
    }

    pub fn update(&mut self, conditions: RunConditions) -> Transition {
        self.conditions = conditions;
        match (self.running, conditions.all_hold()) {
            (false, true) => {
                self.running = true;
                self.run += 1;
                tracing::debug!(run = self.run, "tick scheduler started");
                Transition::Started { run: self.run }
            }
            (true, false) => {
                self.running = false;
                tracing::debug!(run = self.run, ?conditions, "tick scheduler stopped");
                Transition::Stopped
            }
            _ => Transition::Unchanged,
        }
    }

    /// True if a tick from `run` should still be processed.
    pub fn accepts(&self, run: u64) -> bool {
        self.running && run == self.run
    }

    /// Stop unconditionally. Later `update` calls can start a new run.
    pub fn halt(&mut self) {
        self.running = false;
        self.conditions = RunConditions::default();
    }
}

/// Async periodic tick source.
///
/// ```ignore
/// let mut driver = TickDriver::new(Duration::from_secs(1), token.child_token());
/// while driver.next_tick().await.is_some() {
///     app.tick().await;
/// }
/// ```
pub struct TickDriver {
    interval: tokio::time::Interval,
    token: CancellationToken,
}

impl TickDriver {
    /// The first tick completes immediately.
    pub fn new(period: Duration, token: CancellationToken) -> Self {
        let mut interval = interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        Self { interval, token }
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Wait for the next tick, or `None` once cancelled.
    pub async fn next_tick(&mut self) -> Option<Instant> {
        if self.token.is_cancelled() {
            return None;
        }
        tokio::select! {
            biased;
            () = self.token.cancelled() => {
                tracing::debug!("tick driver cancelled");
                None
            }
            at = self.interval.tick() => Some(at),
        }
    }

    /// Start the next period from now, so the following tick is immediate.
    pub fn restart(&mut self) {
        self.interval.reset_immediately();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all() -> RunConditions {
        RunConditions {
            is_active: true,
            has_birth_date: true,
            paused: false,
            foreground: true,
            expired: false,
        }
    }

    #[test]
    fn runs_only_while_all_conditions_hold() {
        let mut scheduler = TickScheduler::new();
        assert_eq!(scheduler.update(RunConditions::default()), Transition::Unchanged);
        assert_eq!(scheduler.update(all()), Transition::Started { run: 1 });
        assert_eq!(scheduler.update(all()), Transition::Unchanged);

        for broken in [
            RunConditions { is_active: false, ..all() },
            RunConditions { has_birth_date: false, ..all() },
            RunConditions { paused: true, ..all() },
            RunConditions { foreground: false, ..all() },
            RunConditions { expired: true, ..all() },
        ] {
            assert_eq!(scheduler.update(broken), Transition::Stopped);
            assert!(!scheduler.is_running());
            assert!(matches!(scheduler.update(all()), Transition::Started { .. }));
        }
        assert_eq!(scheduler.run(), 6);
    }

    #[test]
    fn stale_runs_are_rejected() {
        let mut scheduler = TickScheduler::new();
        let Transition::Started { run: first } = scheduler.update(all()) else {
            panic!("expected start");
        };
        scheduler.update(RunConditions { paused: true, ..all() });
        assert!(!scheduler.accepts(first));
        let Transition::Started { run: second } = scheduler.update(all()) else {
            panic!("expected restart");
        };
        assert!(!scheduler.accepts(first));
        assert!(scheduler.accepts(second));
        scheduler.halt();
        assert!(!scheduler.accepts(second));
    }

    #[tokio::test(start_paused = true)]
    async fn driver_ticks_immediately_then_every_period() {
        let token = CancellationToken::new();
        let mut driver = TickDriver::new(Duration::from_secs(1), token.clone());
        let start = Instant::now();

        let first = driver.next_tick().await.unwrap();
        assert_eq!(first, start);
        let second = driver.next_tick().await.unwrap();
        assert_eq!(second - start, Duration::from_secs(1));

        token.cancel();
        assert!(driver.next_tick().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn driver_skips_missed_ticks() {
        let mut driver = TickDriver::new(Duration::from_secs(1), CancellationToken::new());
        let start = Instant::now();
        driver.next_tick().await;
        tokio::time::advance(Duration::from_millis(3_500)).await;
        // The overdue tick fires at once; later ones realign to the period.
        let late = driver.next_tick().await.unwrap();
        assert_eq!(late - start, Duration::from_secs(1));
        assert_eq!(Instant::now() - start, Duration::from_millis(3_500));
        let next = driver.next_tick().await.unwrap();
        assert_eq!(next - start, Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn restart_ticks_immediately() {
        let mut driver = TickDriver::new(Duration::from_secs(1), CancellationToken::new());
        driver.next_tick().await;
        tokio::time::advance(Duration::from_millis(300)).await;
        driver.restart();
        let at = Instant::now();
        assert_eq!(driver.next_tick().await.unwrap(), at);
    }
}
