use futures::stream::{Stream, StreamExt};
use serde::Serialize;
use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};
use tokio_stream::wrappers::BroadcastStream;

/// How many unread signals a subscriber may fall behind by. Signals
/// carry no payload, so falling further behind loses nothing.
const CAPACITY: usize = 16;

/// Says the catalog may have changed and should be re-read.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
pub struct CatalogChanged;

/// Fans change signals out to every live [`Subscription`].
pub struct Notifier {
    sender: broadcast::Sender<CatalogChanged>,
}

impl Default for Notifier {
    fn default() -> Self {
        let (sender, _) = broadcast::channel(CAPACITY);

        Notifier { sender }
    }
}

impl Notifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> Subscription {
        Subscription {
            receiver: self.sender.subscribe(),
        }
    }

    /// Signals every subscriber and returns how many there were. Having
    /// no subscribers isn't an error.
    pub fn notify(&self) -> usize {
        self.sender.send(CatalogChanged).unwrap_or(0)
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

/// A handle that receives change signals until it's dropped.
pub struct Subscription {
    receiver: broadcast::Receiver<CatalogChanged>,
}

impl Subscription {
    /// Waits for the next change. Returns `None` once the notifier is
    /// gone.
    pub async fn changed(&mut self) -> Option<CatalogChanged> {
        match self.receiver.recv().await {
            Ok(signal) => Some(signal),
            Err(RecvError::Lagged(_)) => Some(CatalogChanged),
            Err(RecvError::Closed) => None,
        }
    }

    /// Consumes every signal received so far and returns how many
    /// there were.
    pub fn drain(&mut self) -> usize {
        let mut count = 0;

        loop {
            match self.receiver.try_recv() {
                Ok(_) => count += 1,
                Err(TryRecvError::Lagged(missed)) => count += missed as usize,
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return count,
            }
        }
    }

    pub fn into_stream(self) -> impl Stream<Item = CatalogChanged> {
        // a lagged receiver has still seen a change
        BroadcastStream::new(self.receiver).map(|result| result.unwrap_or(CatalogChanged))
    }
}
