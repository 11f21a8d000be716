//! # Channel Facade
//!
//! Independent publish/subscribe channels multiplexed over one serial bus.
//! Every channel is bound to a freshly generated unique identifier, so
//! unrelated channels never observe each other's items even when the items
//! are structurally identical. Delivery order across all channels of a hub
//! is still the global publish order of the underlying bus.

use crate::dispatcher::SerialEventBus;
use crate::events::EventId;
use std::any::Any;
use std::marker::PhantomData;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_stream::Stream;
use tracing::debug;

/// Payloads crossing the shared bus are type-erased; each channel's adapter
/// downcasts back to its own item type.
type ChannelItem = Arc<dyn Any + Send + Sync>;

/// Errors from pull-style channel operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ChannelError {
    /// The hub was disposed; the channel can never yield again.
    #[error("Channel hub disposed")]
    Disposed,
}

/// One hub = one serial bus plus as many isolated channels as callers open.
///
/// The hub owns its bus exclusively; disposing the hub (explicitly or by
/// dropping it) makes every channel opened through it permanently inert.
pub struct ChannelHub {
    bus: SerialEventBus<ChannelItem>,
}

impl ChannelHub {
    /// Create a hub. Must be called from within a Tokio runtime.
    #[must_use]
    pub fn new() -> Self {
        Self {
            bus: SerialEventBus::new(),
        }
    }

    /// Open a channel delivering to `callback` and return its publisher.
    ///
    /// The channel is bound to an identifier no other channel can ever
    /// share. `callback` is invoked with every item published through the
    /// returned publisher, in publish order, one scheduler tick after each
    /// publish.
    #[must_use]
    pub fn handle<T, F>(&self, callback: F) -> ChannelPublisher<T>
    where
        T: Send + Sync + 'static,
        F: Fn(&T) + Send + Sync + 'static,
    {
        let id = EventId::unique();
        self.bus.register(id.clone(), move |item: &ChannelItem| {
            if let Some(item) = item.downcast_ref::<T>() {
                callback(item);
            }
        });
        debug!(id = %id, "channel opened");

        ChannelPublisher {
            bus: self.bus.clone(),
            id,
            _item: PhantomData,
        }
    }

    /// Open a pull-style channel: items arrive on the returned stream
    /// instead of through a callback.
    #[must_use]
    pub fn stream<T>(&self) -> (ChannelPublisher<T>, ChannelStream<T>)
    where
        T: Clone + Send + Sync + 'static,
    {
        let (forward, receiver) = mpsc::unbounded_channel();
        let publisher = self.handle(move |item: &T| {
            let _ = forward.send(item.clone());
        });

        (publisher, ChannelStream { receiver })
    }

    /// Shut the hub down. Idempotent.
    ///
    /// All channels opened through this hub become permanently inert:
    /// publishing stays harmless but delivers nothing, and streams end once
    /// drained.
    pub fn dispose(&self) {
        self.bus.dispose();
    }

    /// Whether the hub has been disposed.
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.bus.is_disposed()
    }

    /// Wait until every item published so far has been delivered or
    /// discarded.
    pub async fn settled(&self) {
        self.bus.settled().await;
    }
}

impl Default for ChannelHub {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ChannelHub {
    fn drop(&mut self) {
        self.bus.dispose();
    }
}

/// Publishing half of one channel.
///
/// Clonable; every clone feeds the same channel.
pub struct ChannelPublisher<T> {
    bus: SerialEventBus<ChannelItem>,
    id: EventId,
    _item: PhantomData<fn(T)>,
}

impl<T> Clone for ChannelPublisher<T> {
    fn clone(&self) -> Self {
        Self {
            bus: self.bus.clone(),
            id: self.id.clone(),
            _item: PhantomData,
        }
    }
}

impl<T: Send + Sync + 'static> ChannelPublisher<T> {
    /// Queue `item` for deferred, in-order delivery to this channel.
    ///
    /// Returns `true` iff the channel still had a listener at call time: a
    /// capacity hint, not a delivery confirmation. After the hub is disposed
    /// this is always `false`.
    pub fn publish(&self, item: T) -> bool {
        self.bus.publish(self.id.clone(), Arc::new(item) as ChannelItem)
    }

    /// Identifier this channel is bound to.
    #[must_use]
    pub fn id(&self) -> &EventId {
        &self.id
    }
}

/// Receiving half of a pull-style channel.
pub struct ChannelStream<T> {
    receiver: mpsc::UnboundedReceiver<T>,
}

impl<T> ChannelStream<T> {
    /// Receive the next item delivered on this channel.
    ///
    /// # Returns
    ///
    /// - `Some(item)` - the next item, in publish order
    /// - `None` - the hub was disposed and everything delivered before that
    ///   has been drained; no further item will ever arrive
    pub async fn recv(&mut self) -> Option<T> {
        self.receiver.recv().await
    }

    /// Try to receive the next item without waiting.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(item))` - an item was ready
    /// - `Ok(None)` - nothing delivered yet (would wait)
    /// - `Err(ChannelError::Disposed)` - the hub was disposed and the
    ///   channel is drained
    pub fn try_recv(&mut self) -> Result<Option<T>, ChannelError> {
        match self.receiver.try_recv() {
            Ok(item) => Ok(Some(item)),
            Err(mpsc::error::TryRecvError::Empty) => Ok(None),
            Err(mpsc::error::TryRecvError::Disconnected) => Err(ChannelError::Disposed),
        }
    }
}

impl<T> Stream for ChannelStream<T> {
    type Item = T;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_recv(cx)
    }
}
