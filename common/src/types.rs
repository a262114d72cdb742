//! Defines common types that many crates can depend on

use tokio::sync::watch::{self, Receiver as WatchReceiver, Sender as WatchSender};

/// A type alias for an empty channel used to signal cancellation to workers
pub type CancelChannel = WatchReceiver<()>;
/// The sending side of a cancel channel, held by the coordinator
pub type CancelSender = WatchSender<()>;

/// Create a new cancel channel
pub fn new_cancel_channel() -> (CancelSender, CancelChannel) {
    watch::channel(())
}

/// Whether the coordinator has signalled cancellation on the channel
///
/// A dropped sender counts as a cancellation, the coordinator is gone
pub fn is_cancelled(channel: &CancelChannel) -> bool {
    channel.has_changed().unwrap_or(true)
}

#[cfg(test)]
mod test {
    use super::{is_cancelled, new_cancel_channel};

    /// Tests signalling a cancellation
    #[test]
    fn test_cancel_signal() {
        let (sender, channel) = new_cancel_channel();
        assert!(!is_cancelled(&channel));

        sender.send(()).unwrap();
        assert!(is_cancelled(&channel));
    }

    /// Tests that dropping the sender cancels listeners
    #[test]
    fn test_dropped_sender_cancels() {
        let (sender, channel) = new_cancel_channel();
        drop(sender);
        assert!(is_cancelled(&channel));
    }
}
