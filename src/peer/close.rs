use crate::peer::types::Epoch;
use tokio::sync::watch;

/// Fires the [`CloseSignal`] of one data connection. Dropping the trigger
/// without firing counts as a close.
#[derive(Debug)]
pub struct CloseTrigger {
    tx: watch::Sender<bool>,
}

/// Single-fire close notification scoped to one data connection instance.
///
/// A fresh signal is minted every time a data connection is armed. Clones
/// observe the same firing.
#[derive(Debug, Clone)]
pub struct CloseSignal {
    epoch: Epoch,
    rx: watch::Receiver<bool>,
}

pub fn close_signal(epoch: Epoch) -> (CloseTrigger, CloseSignal) {
    let (tx, rx) = watch::channel(false);
    (CloseTrigger { tx }, CloseSignal { epoch, rx })
}

impl CloseTrigger {
    pub fn fire(&self) {
        self.tx.send_replace(true);
    }
}

impl CloseSignal {
    /// Connection epoch this signal belongs to
    pub fn epoch(&self) -> Epoch {
        self.epoch
    }

    pub fn is_closed(&self) -> bool {
        *self.rx.borrow() || self.rx.has_changed().is_err()
    }

    /// Resolve once the connection has closed. No deadline.
    pub async fn closed(&self) {
        let mut rx = self.rx.clone();
        // Err means the trigger is gone, which is a close as well
        let _ = rx.wait_for(|closed| *closed).await;
    }
}
