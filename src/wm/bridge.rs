//! Notification bridge
//!
//! Every state change the controller can observe leaves the core through
//! [`Bridge::emit`]. The host owns the receiving end of the channel and
//! decides how notifications cross to the controller.

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, warn};

use nwm_ipc::Notification;

/// Sending half of the notification channel
#[derive(Debug, Clone)]
pub struct Bridge {
    tx: UnboundedSender<Notification>,
}

impl Bridge {
    /// Create a bridge and the receiver the host drains
    pub fn channel() -> (Self, UnboundedReceiver<Notification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Queue a notification for the controller.
    ///
    /// Never blocks. Notifications sent after the receiver is dropped are
    /// discarded.
    pub fn emit(&self, notification: Notification) {
        debug!("Emit {:?}", notification);
        if self.tx.send(notification).is_err() {
            warn!("Notification receiver dropped, notification discarded");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emit_preserves_order() {
        let (bridge, mut rx) = Bridge::channel();
        bridge.emit(Notification::WindowRemoved { id: 1 });
        bridge.emit(Notification::Rearrange);

        assert_eq!(rx.try_recv().unwrap(), Notification::WindowRemoved { id: 1 });
        assert_eq!(rx.try_recv().unwrap(), Notification::Rearrange);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_emit_after_receiver_dropped() {
        let (bridge, rx) = Bridge::channel();
        drop(rx);
        bridge.emit(Notification::Rearrange);
    }
}
