use std::sync::Arc;
use tokio::sync::watch;

/// Cooperative cancellation signal shared across the crawl
///
/// Cloning yields a handle to the same signal. Once triggered it stays
/// triggered.
#[derive(Debug, Clone)]
pub struct Shutdown {
    sender: Arc<watch::Sender<bool>>,
    receiver: watch::Receiver<bool>,
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

impl Shutdown {
    pub fn new() -> Self {
        let (sender, receiver) = watch::channel(false);
        Self {
            sender: Arc::new(sender),
            receiver,
        }
    }

    pub fn trigger(&self) {
        self.sender.send_replace(true);
    }

    pub fn is_triggered(&self) -> bool {
        *self.receiver.borrow()
    }

    /// Resolves once the signal has been triggered
    pub async fn wait(&self) {
        let mut receiver = self.receiver.clone();
        // the sender lives as long as any handle, so this cannot fail early
        let _ = receiver.wait_for(|triggered| *triggered).await;
    }
}
