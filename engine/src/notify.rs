use crate::message::Message;
use tokio::sync::mpsc::{Sender, error::TrySendError};
use tracing::warn;

/// Upstream callbacks. Invoked from the dispatch worker, never under the session lock.
pub trait StreamNotifier: Send + Sync {
    fn fragment_elapsed(&self, id: u32);
    fn drain_complete(&self, id: u32);
    fn period_elapsed(&self, _id: u32) {}
}

/// Forwards notifications into a tokio channel without blocking the worker.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    tx: Sender<Message>,
}

impl ChannelNotifier {
    pub fn new(tx: Sender<Message>) -> Self {
        Self { tx }
    }

    fn forward(&self, message: Message) {
        match self.tx.try_send(message) {
            Ok(()) => {}
            Err(TrySendError::Full(message)) => {
                warn!("Notification queue full, dropping {:?}", message)
            }
            Err(TrySendError::Closed(_)) => {}
        }
    }
}

impl StreamNotifier for ChannelNotifier {
    fn fragment_elapsed(&self, id: u32) {
        self.forward(Message::FragmentElapsed(id));
    }

    fn drain_complete(&self, id: u32) {
        self.forward(Message::DrainComplete(id));
    }

    fn period_elapsed(&self, id: u32) {
        self.forward(Message::PeriodElapsed(id));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc::channel;

    #[test]
    fn channel_notifier_forwards_in_order() {
        let (tx, mut rx) = channel(4);
        let notifier = ChannelNotifier::new(tx);
        notifier.fragment_elapsed(0);
        notifier.drain_complete(0);
        notifier.period_elapsed(3);
        assert_eq!(rx.try_recv(), Ok(Message::FragmentElapsed(0)));
        assert_eq!(rx.try_recv(), Ok(Message::DrainComplete(0)));
        assert_eq!(rx.try_recv(), Ok(Message::PeriodElapsed(3)));
    }

    #[test]
    fn full_queue_drops_instead_of_blocking() {
        let (tx, mut rx) = channel(1);
        let notifier = ChannelNotifier::new(tx);
        notifier.fragment_elapsed(0);
        notifier.fragment_elapsed(0);
        assert_eq!(rx.try_recv(), Ok(Message::FragmentElapsed(0)));
        assert!(rx.try_recv().is_err());
    }
}
