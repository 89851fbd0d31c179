//! Latest-value topics with duplicate suppression
//!
//! One [`Topic`] backs each demultiplexed sub-stream of a connection. It keeps
//! only the newest snapshot, so every receiver drains at its own pace: a slow
//! receiver skips straight to the newest value and never holds back the
//! publisher, other receivers, or other topics. Snapshots are complete
//! replacements of the previous value, so skipping loses no state.

use tokio::sync::watch;

/// Publisher side of a sub-stream
#[derive(Debug)]
pub struct Topic<T> {
    tx: watch::Sender<Option<T>>,
}

impl<T> Topic<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    /// Create an empty topic
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx }
    }

    /// Publish a value, returning whether it was emitted
    ///
    /// A value equal to the current one is suppressed and receivers are not
    /// woken.
    pub fn publish(&self, value: T) -> bool {
        self.tx.send_if_modified(|current| {
            if current.as_ref() == Some(&value) {
                false
            } else {
                *current = Some(value);
                true
            }
        })
    }

    /// Get the most recently published value
    pub fn latest(&self) -> Option<T> {
        self.tx.borrow().clone()
    }

    /// Attach a new receiver
    ///
    /// If a value has already been published the receiver yields it first.
    pub fn subscribe(&self) -> TopicReceiver<T> {
        let mut rx = self.tx.subscribe();
        if rx.borrow().is_some() {
            rx.mark_changed();
        }
        TopicReceiver { rx }
    }

    /// Number of receivers currently attached
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl<T> Default for Topic<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

/// Receiver side of a sub-stream
#[derive(Debug)]
pub struct TopicReceiver<T> {
    rx: watch::Receiver<Option<T>>,
}

impl<T: Clone> TopicReceiver<T> {
    /// Wait for the next value
    ///
    /// Returns `None` once the topic has been dropped.
    pub async fn recv(&mut self) -> Option<T> {
        loop {
            self.rx.changed().await.ok()?;
            if let Some(value) = self.rx.borrow_and_update().clone() {
                return Some(value);
            }
        }
    }

    /// Get the most recent value without waiting
    pub fn latest(&self) -> Option<T> {
        self.rx.borrow().clone()
    }
}
