//! Ingress and fan-out queue types.
//!
//! Both are unbounded MPSC channels. The ingress queue carries raw request
//! strings from many collector tasks to the single queue processor; each
//! sink gets its own fan-out queue of [`Snapshot`]s from the processor to
//! its dedicated flush task. Both sides use a bounded `recv` wait so
//! shutdown is observed promptly (see spec §5).

use std::time::Duration;

use tokio::sync::mpsc;

use crate::shelf::Snapshot;

/// How long a queue consumer waits for an item before re-checking its
/// shutdown flag.
pub const RECV_TIMEOUT: Duration = Duration::from_secs(1);

pub type IngressSender = mpsc::UnboundedSender<String>;
pub type IngressReceiver = mpsc::UnboundedReceiver<String>;

pub fn ingress_channel() -> (IngressSender, IngressReceiver) {
    mpsc::unbounded_channel()
}

pub type FanoutSender = mpsc::UnboundedSender<Snapshot>;
pub type FanoutReceiver = mpsc::UnboundedReceiver<Snapshot>;

pub fn fanout_channel() -> (FanoutSender, FanoutReceiver) {
    mpsc::unbounded_channel()
}

/// Pop with a bounded wait; `Ok(None)` means the timeout elapsed with
/// nothing available (caller should re-check its stop signal), `Err(())`
/// means the channel is closed and no more items will ever arrive.
pub async fn recv_timeout<T>(rx: &mut mpsc::UnboundedReceiver<T>) -> Result<Option<T>, ()> {
    match tokio::time::timeout(RECV_TIMEOUT, rx.recv()).await {
        Ok(Some(item)) => Ok(Some(item)),
        Ok(None) => Err(()),
        Err(_elapsed) => Ok(None),
    }
}
