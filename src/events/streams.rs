use tokio::sync::broadcast;
use tracing::{debug, trace};

/// Generic broadcast stream for fan-out notifications
pub struct EventStream<T: Clone + Send + 'static> {
    sender: broadcast::Sender<T>,
}

impl<T: Clone + Send + 'static> EventStream<T> {
    /// Create a new event stream with specified capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to the event stream
    pub fn subscribe(&self) -> Subscriber<T> {
        debug!("New subscriber registered to event stream");
        Subscriber {
            receiver: self.sender.subscribe(),
        }
    }

    /// Publish an event to all current subscribers.
    ///
    /// Returns the number of subscribers that received it. Publishing with no
    /// subscribers is not an error; the event is simply dropped.
    pub fn publish(&self, event: T) -> usize {
        match self.sender.send(event) {
            Ok(receivers) => {
                trace!(receivers, "Event published");
                receivers
            }
            Err(_) => {
                debug!("No receivers for event, dropped");
                0
            }
        }
    }

    /// Number of live subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

}

impl<T: Clone + Send + 'static> Clone for EventStream<T> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}

/// Subscriber for receiving events from a stream
pub struct Subscriber<T: Clone + Send + 'static> {
    receiver: broadcast::Receiver<T>,
}

impl<T: Clone + Send + 'static> Subscriber<T> {
    /// Receive the next event
    pub async fn recv(&mut self) -> Result<T, broadcast::error::RecvError> {
        self.receiver.recv().await
    }

    /// Receive an already-published event without waiting
    pub fn try_recv(&mut self) -> Result<T, broadcast::error::TryRecvError> {
        self.receiver.try_recv()
    }

    /// Drain every event published so far
    pub fn drain(&mut self) -> Vec<T> {
        let mut events = Vec::new();
        loop {
            match self.receiver.try_recv() {
                Ok(event) => events.push(event),
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                    debug!(skipped, "Subscriber lagged behind event stream");
                }
                Err(_) => break,
            }
        }
        events
    }
}
