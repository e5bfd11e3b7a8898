//! Flush trigger sources that live outside `enqueue`.

use std::future::Future;
use tokio::sync::watch;
use tokio::time::{interval_at, Duration, Instant, MissedTickBehavior};
use tracing::debug;

/// Host lifecycle signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// The view became visible again.
    Visible,
    /// The view was hidden; the host may freeze or discard it.
    Hidden,
    /// The host is closing or navigating away.
    Terminating,
}

impl LifecycleEvent {
    /// Whether this signal is a last chance to deliver buffered records.
    pub fn requires_flush(&self) -> bool {
        matches!(self, LifecycleEvent::Hidden | LifecycleEvent::Terminating)
    }
}

/// Recurring timer task that runs `tick` every `period` until stopped.
pub(crate) struct PeriodicTrigger {
    stop: watch::Sender<bool>,
}

impl PeriodicTrigger {
    pub(crate) fn spawn<F, Fut>(runtime: &tokio::runtime::Handle, period: Duration, tick: F) -> Self
    where
        F: Fn() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (stop, mut stopped) = watch::channel(false);

        runtime.spawn(async move {
            // First tick one full period after start, not immediately
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => tick().await,
                    changed = stopped.changed() => {
                        if changed.is_err() || *stopped.borrow() {
                            debug!("Periodic flush trigger stopped");
                            break;
                        }
                    }
                }
            }
        });

        Self { stop }
    }

    /// Signal the task to exit. An in-progress tick is allowed to finish.
    pub(crate) fn stop(&self) {
        let _ = self.stop.send(true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_lifecycle_requires_flush() {
        assert!(LifecycleEvent::Hidden.requires_flush());
        assert!(LifecycleEvent::Terminating.requires_flush());
        assert!(!LifecycleEvent::Visible.requires_flush());
    }

    #[tokio::test(start_paused = true)]
    async fn test_periodic_trigger_ticks_each_period() {
        let ticks = Arc::new(AtomicUsize::new(0));
        let counter = ticks.clone();
        let trigger = PeriodicTrigger::spawn(
            &tokio::runtime::Handle::current(),
            Duration::from_secs(30),
            move || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                }
            },
        );

        tokio::time::sleep(Duration::from_secs(29)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 2);

        trigger.stop();
        tokio::time::sleep(Duration::from_secs(90)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 2);
    }
}
