//! Timer primitives for the page loop.
//!
//! The page engine runs as a single `select!` loop, so all timing is
//! expressed as owned values with a quiet idle state: an [`Alarm`]
//! that pends forever while unarmed, a trailing-edge [`Debouncer`] on
//! top of it, and a capped [`Backoff`] sequence for init retries.
//! Everything runs on tokio's clock, which the tests pause and step.

use std::future::pending;
use std::time::Duration;

use tokio::time::{Instant, sleep_until};

/// Trailing-edge delay for resize bursts.
pub const RESIZE_DEBOUNCE: Duration = Duration::from_millis(100);
/// How often a held candidate is revalidated against the page.
pub const RECHECK_INTERVAL: Duration = Duration::from_secs(2);
/// How often an uninitialized engine re-attempts init, independent of
/// the retry backoff.
pub const INIT_LIVENESS_INTERVAL: Duration = Duration::from_secs(5);
/// Init retry delays while the host runtime is not ready. The last
/// step repeats.
pub const INIT_BACKOFF: &[Duration] = &[Duration::from_secs(1), Duration::from_secs(2)];

/// One-shot deadline for `select!` branches. Arming replaces any
/// earlier deadline; a completed fire disarms.
#[derive(Debug, Default)]
pub struct Alarm {
    deadline: Option<Instant>,
}

impl Alarm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arm(&mut self, delay: Duration) {
        self.deadline = Some(Instant::now() + delay);
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    /// Completes once the armed deadline passes, then disarms. Pends
    /// forever while unarmed, so an idle branch never wakes the loop.
    pub async fn fired(&mut self) {
        match self.deadline {
            Some(deadline) => {
                sleep_until(deadline).await;
                self.deadline = None;
            }
            None => pending().await,
        }
    }
}

/// Trailing-edge coalescing: the alarm fires once, `delay` after the
/// most recent touch.
#[derive(Debug)]
pub struct Debouncer {
    delay: Duration,
    alarm: Alarm,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            alarm: Alarm::new(),
        }
    }

    pub fn touch(&mut self) {
        self.alarm.arm(self.delay);
    }

    pub fn is_pending(&self) -> bool {
        self.alarm.is_armed()
    }

    pub async fn fired(&mut self) {
        self.alarm.fired().await;
    }
}

/// Escalating retry delays, holding at the last step.
#[derive(Debug)]
pub struct Backoff {
    steps: &'static [Duration],
    index: usize,
}

impl Backoff {
    pub fn new(steps: &'static [Duration]) -> Self {
        debug_assert!(!steps.is_empty());
        Self { steps, index: 0 }
    }

    pub fn next_delay(&mut self) -> Duration {
        let delay = self.steps[self.index];
        if self.index + 1 < self.steps.len() {
            self.index += 1;
        }
        delay
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;
    use tokio::time::advance;

    // -- Alarm --

    #[tokio::test(start_paused = true)]
    async fn alarm_fires_after_the_armed_delay() {
        let mut alarm = Alarm::new();
        alarm.arm(Duration::from_millis(100));

        assert!(alarm.fired().now_or_never().is_none());
        advance(Duration::from_millis(100)).await;
        assert!(alarm.fired().now_or_never().is_some());
        assert!(!alarm.is_armed());
    }

    #[tokio::test(start_paused = true)]
    async fn unarmed_alarm_stays_quiet() {
        let mut alarm = Alarm::new();
        advance(Duration::from_secs(60)).await;
        assert!(alarm.fired().now_or_never().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn rearming_replaces_the_deadline() {
        let mut alarm = Alarm::new();
        alarm.arm(Duration::from_millis(50));
        alarm.arm(Duration::from_millis(200));

        advance(Duration::from_millis(100)).await;
        assert!(alarm.fired().now_or_never().is_none());
        advance(Duration::from_millis(100)).await;
        assert!(alarm.fired().now_or_never().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_suppresses_a_pending_fire() {
        let mut alarm = Alarm::new();
        alarm.arm(Duration::from_millis(100));
        alarm.cancel();

        advance(Duration::from_secs(1)).await;
        assert!(alarm.fired().now_or_never().is_none());
        assert!(!alarm.is_armed());
    }

    // -- Debouncer --

    #[tokio::test(start_paused = true)]
    async fn debouncer_coalesces_rapid_touches() {
        let mut debouncer = Debouncer::new(Duration::from_millis(100));
        debouncer.touch();
        advance(Duration::from_millis(60)).await;
        debouncer.touch();
        advance(Duration::from_millis(60)).await;

        // 120ms in, but only 60ms since the last touch.
        assert!(debouncer.fired().now_or_never().is_none());
        advance(Duration::from_millis(40)).await;
        assert!(debouncer.fired().now_or_never().is_some());

        // One fire per burst; nothing rearms by itself.
        assert!(!debouncer.is_pending());
        assert!(debouncer.fired().now_or_never().is_none());
    }

    // -- Backoff --

    #[test]
    fn backoff_escalates_then_holds() {
        let mut backoff = Backoff::new(INIT_BACKOFF);
        assert_eq!(backoff.next_delay(), Duration::from_secs(1));
        assert_eq!(backoff.next_delay(), Duration::from_secs(2));
        assert_eq!(backoff.next_delay(), Duration::from_secs(2));
    }
}
