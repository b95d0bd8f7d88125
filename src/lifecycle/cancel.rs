//! Interrupt signalling for lifecycle sleeps.

use std::future;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::watch;

/// Returned when a sleep ends because an interrupt arrived.
#[derive(Clone, Copy, Debug, Error, Eq, PartialEq)]
#[error("interrupted")]
pub struct Interrupted;

/// Receiving side of an interrupt. Cheap to clone.
#[derive(Clone, Debug)]
pub struct CancelSignal {
    rx: watch::Receiver<bool>,
}

/// Sending side of an interrupt.
#[derive(Clone, Debug)]
pub struct CancelTrigger {
    tx: Arc<watch::Sender<bool>>,
}

/// Creates a connected trigger and signal.
#[must_use]
pub fn cancel_pair() -> (CancelTrigger, CancelSignal) {
    let (tx, rx) = watch::channel(false);
    (CancelTrigger { tx: Arc::new(tx) }, CancelSignal { rx })
}

impl CancelTrigger {
    /// Delivers the interrupt to every connected signal.
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }
}

impl CancelSignal {
    /// A signal that never fires.
    #[must_use]
    pub fn never() -> Self {
        let (_, signal) = cancel_pair();
        signal
    }

    /// Returns `true` once the interrupt has been delivered.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Sleeps for `wait` unless interrupted first.
    ///
    /// A zero wait yields to the scheduler instead of sleeping so tight
    /// retry loops stay cancellable.
    ///
    /// # Errors
    ///
    /// Returns [`Interrupted`] when the interrupt arrives before or during
    /// the sleep.
    pub async fn sleep(&self, wait: Duration) -> Result<(), Interrupted> {
        if self.is_cancelled() {
            return Err(Interrupted);
        }
        if wait.is_zero() {
            tokio::task::yield_now().await;
            return Ok(());
        }

        let mut rx = self.rx.clone();
        tokio::select! {
            () = tokio::time::sleep(wait) => Ok(()),
            () = fired(&mut rx) => Err(Interrupted),
        }
    }
}

/// Resolves when the flag turns true; stays pending if the trigger is gone.
async fn fired(rx: &mut watch::Receiver<bool>) {
    if rx.wait_for(|flag| *flag).await.is_err() {
        future::pending::<()>().await;
    }
}
