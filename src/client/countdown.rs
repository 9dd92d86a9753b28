//! Restartable one-second countdown.

use std::time::Duration;
use tokio::{
    task::JoinHandle,
    time::{interval_at, Instant, MissedTickBehavior},
};

const TICK: Duration = Duration::from_secs(1);

/// Ticks once per second down to zero, then fires its expiry callback once.
///
/// Starting again cancels the previous run before anything else, so two
/// countdowns never overlap. Dropping the timer cancels it.
#[derive(Debug, Default)]
pub struct CountdownTimer {
    handle: Option<JoinHandle<()>>,
}

impl CountdownTimer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// `on_tick` receives the remaining seconds after each tick. A start at
    /// zero expires right away without ticking.
    pub fn start<T, E>(&mut self, seconds: u64, mut on_tick: T, on_expire: E)
    where
        T: FnMut(u64) + Send + 'static,
        E: FnOnce() + Send + 'static,
    {
        self.cancel();
        self.handle = Some(tokio::spawn(async move {
            let mut remaining = seconds;
            let mut interval = interval_at(Instant::now() + TICK, TICK);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            while remaining > 0 {
                interval.tick().await;
                remaining -= 1;
                on_tick(remaining);
            }
            on_expire();
        }));
    }

    pub fn cancel(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.handle
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }
}

impl Drop for CountdownTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};
    use tokio::time::sleep;

    #[derive(Debug, PartialEq, Eq)]
    enum Signal {
        Tick(u64),
        Expired,
    }

    fn start(timer: &mut CountdownTimer, seconds: u64) -> UnboundedReceiver<Signal> {
        let (tx, rx) = unbounded_channel();
        let expire_tx = tx.clone();
        timer.start(
            seconds,
            move |remaining| {
                let _ = tx.send(Signal::Tick(remaining));
            },
            move || {
                let _ = expire_tx.send(Signal::Expired);
            },
        );
        rx
    }

    fn drain(rx: &mut UnboundedReceiver<Signal>) -> Vec<Signal> {
        let mut signals = Vec::new();
        while let Ok(signal) = rx.try_recv() {
            signals.push(signal);
        }
        signals
    }

    #[tokio::test(start_paused = true)]
    async fn expires_exactly_once_after_three_ticks() {
        let mut timer = CountdownTimer::new();
        let mut rx = start(&mut timer, 3);

        sleep(Duration::from_millis(2500)).await;
        assert_eq!(drain(&mut rx), vec![Signal::Tick(2), Signal::Tick(1)]);

        sleep(Duration::from_secs(10)).await;
        assert_eq!(drain(&mut rx), vec![Signal::Tick(0), Signal::Expired]);
        assert!(!timer.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn zero_expires_without_ticking() {
        let mut timer = CountdownTimer::new();
        let mut rx = start(&mut timer, 0);

        sleep(Duration::from_millis(10)).await;
        assert_eq!(drain(&mut rx), vec![Signal::Expired]);
    }

    #[tokio::test(start_paused = true)]
    async fn restart_cancels_previous_run() {
        let mut timer = CountdownTimer::new();
        let mut first = start(&mut timer, 10);

        sleep(Duration::from_millis(2500)).await;
        let mut second = start(&mut timer, 2);

        sleep(Duration::from_secs(20)).await;
        assert_eq!(drain(&mut first), vec![Signal::Tick(9), Signal::Tick(8)]);
        assert_eq!(
            drain(&mut second),
            vec![Signal::Tick(1), Signal::Tick(0), Signal::Expired]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_and_drop_stop_the_countdown() {
        let mut timer = CountdownTimer::new();
        let mut rx = start(&mut timer, 5);
        timer.cancel();
        assert!(!timer.is_running());

        let mut dropped = CountdownTimer::new();
        let mut dropped_rx = start(&mut dropped, 5);
        drop(dropped);

        sleep(Duration::from_secs(10)).await;
        assert!(drain(&mut rx).is_empty());
        assert!(drain(&mut dropped_rx).is_empty());
    }
}
