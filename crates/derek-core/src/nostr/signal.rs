//! Cooperative cancellation for queries.
//!
//! A thin pair over `tokio::sync::watch`: the controller flips the flag, every
//! cloned signal observes it.

use tokio::sync::watch;

#[derive(Debug)]
pub struct AbortController {
    tx: watch::Sender<bool>,
}

impl Default for AbortController {
    fn default() -> Self {
        Self::new()
    }
}

impl AbortController {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx }
    }

    pub fn signal(&self) -> AbortSignal {
        AbortSignal {
            rx: Some(self.tx.subscribe()),
        }
    }

    /// Latches the flag even when no signal is alive yet, so signals taken
    /// later still observe it.
    pub fn abort(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_aborted(&self) -> bool {
        *self.tx.borrow()
    }
}

/// Observed side of an [`AbortController`]. A default signal never fires.
#[derive(Debug, Clone, Default)]
pub struct AbortSignal {
    rx: Option<watch::Receiver<bool>>,
}

impl AbortSignal {
    pub fn never() -> Self {
        Self::default()
    }

    pub fn is_aborted(&self) -> bool {
        self.rx.as_ref().is_some_and(|rx| *rx.borrow())
    }

    /// Resolves once the controller aborts. Pends forever if the controller is
    /// dropped without aborting.
    pub async fn aborted(&self) {
        let Some(rx) = &self.rx else {
            return std::future::pending().await;
        };
        let mut rx = rx.clone();
        loop {
            if *rx.borrow_and_update() {
                return;
            }
            if rx.changed().await.is_err() {
                return std::future::pending().await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_abort_wakes_waiters() {
        let controller = AbortController::new();
        let signal = controller.signal();
        let waiter = signal.clone();

        let handle = tokio::spawn(async move { waiter.aborted().await });
        controller.abort();

        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("waiter did not wake")
            .expect("waiter panicked");
        assert!(signal.is_aborted());
    }

    #[tokio::test]
    async fn test_abort_before_wait() {
        let controller = AbortController::new();
        controller.abort();

        let signal = controller.signal();
        tokio::time::timeout(Duration::from_millis(100), signal.aborted())
            .await
            .expect("already-aborted signal should resolve immediately");
    }

    #[test]
    fn test_abort_without_live_signals_is_kept() {
        let controller = AbortController::new();
        controller.abort();
        assert!(controller.is_aborted());
        assert!(controller.signal().is_aborted());

        let controller = AbortController::new();
        drop(controller.signal());
        controller.abort();
        assert!(controller.signal().is_aborted());
    }

    #[tokio::test]
    async fn test_never_and_dropped_controller() {
        assert!(!AbortSignal::never().is_aborted());
        let timed_out = tokio::time::timeout(Duration::from_millis(20), AbortSignal::never().aborted())
            .await
            .is_err();
        assert!(timed_out);

        let signal = AbortController::new().signal();
        let timed_out = tokio::time::timeout(Duration::from_millis(20), signal.aborted())
            .await
            .is_err();
        assert!(timed_out);
    }
}
