//! Cancellable repeating timer.
//!
//! Wraps a spawned `tokio::time::interval` loop behind a handle with
//! idempotent `start` / `stop`.  Stopping cancels future ticks only: a tick
//! that is already running is allowed to finish.  Because the loop runs on
//! tokio's clock, tests drive it with a paused runtime instead of waiting.
//!
//! The runtime is captured when the timer is created, so `start` can be
//! called from threads outside it.  With no runtime at all, `start` logs and
//! leaves the timer stopped.

use std::future::Future;
use std::ops::ControlFlow;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

pub struct RepeatingTimer {
    period: Duration,
    runtime: Option<Handle>,
    cancel: Option<CancellationToken>,
}

impl RepeatingTimer {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            runtime: Handle::try_current().ok(),
            cancel: None,
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn is_running(&self) -> bool {
        self.cancel.as_ref().is_some_and(|c| !c.is_cancelled())
    }

    /// Start calling `tick` once per period, the first call one period from
    /// now.  The loop ends when `tick` returns `Break` or the timer is
    /// stopped.  Returns `false` (and does nothing) if already running or if
    /// no tokio runtime is reachable.
    pub fn start<F, Fut>(&mut self, mut tick: F) -> bool
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ControlFlow<()>> + Send + 'static,
    {
        if self.is_running() {
            return false;
        }

        let Some(runtime) = self
            .runtime
            .clone()
            .or_else(|| Handle::try_current().ok())
        else {
            warn!("repeating timer: no tokio runtime, not starting");
            return false;
        };

        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let period = self.period;

        runtime.spawn(async move {
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = interval.tick() => {}
                }
                if tick().await.is_break() {
                    token.cancel();
                    break;
                }
            }
            debug!("repeating timer stopped");
        });

        self.cancel = Some(cancel);
        true
    }

    /// Cancel future ticks.  No-op when not running.
    pub fn stop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel.cancel();
        }
    }
}

impl Drop for RepeatingTimer {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn counting_timer(period: Duration) -> (RepeatingTimer, Arc<AtomicUsize>) {
        let mut timer = RepeatingTimer::new(period);
        let ticks = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&ticks);
        timer.start(move || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                ControlFlow::Continue(())
            }
        });
        (timer, ticks)
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticks_once_per_period() {
        let (timer, ticks) = counting_timer(Duration::from_secs(60));
        assert!(timer.is_running());

        tokio::time::sleep(Duration::from_secs(59)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_is_idempotent_and_stop_halts_ticks() {
        let (mut timer, ticks) = counting_timer(Duration::from_secs(10));
        assert!(!timer.start(|| async { ControlFlow::Continue(()) }));

        tokio::time::sleep(Duration::from_secs(11)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 1);

        timer.stop();
        assert!(!timer.is_running());
        timer.stop();

        tokio::time::sleep(Duration::from_secs(100)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_start_without_runtime_is_refused() {
        let mut timer = RepeatingTimer::new(Duration::from_secs(1));
        assert!(!timer.start(|| async { ControlFlow::Continue(()) }));
        assert!(!timer.is_running());
    }

    #[test]
    fn test_start_from_foreign_thread_uses_captured_runtime() {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let mut timer = {
            let _guard = rt.enter();
            RepeatingTimer::new(Duration::from_secs(1))
        };

        assert!(timer.start(|| async { ControlFlow::Continue(()) }));
        assert!(timer.is_running());
        timer.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn test_break_ends_loop() {
        let mut timer = RepeatingTimer::new(Duration::from_secs(1));
        timer.start(|| async { ControlFlow::Break(()) });

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(!timer.is_running());
    }
}
