//! # Serial Event Bus
//!
//! The ordered-delivery engine. Emissions from every publisher funnel into a
//! single pending queue consumed by one worker task, so listener invocations
//! across the whole bus happen in exact publish order regardless of event
//! identifier, each deferred by one scheduler tick. A slow emission therefore
//! delays every later emission; total order is the contract, not throughput.

use crate::deferral::{NextTick, TickDeferral};
use crate::events::EventId;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use tokio::sync::{mpsc, watch};
use tracing::{debug, warn};

/// A callback registered for one identifier.
type Listener<E> = Arc<dyn Fn(&E) + Send + Sync>;

/// Listener registry; insertion order is preserved per identifier.
type Registry<E> = HashMap<EventId, Vec<Listener<E>>>;

/// One accepted publish, waiting in the queue for its turn.
struct Emission<E> {
    id: EventId,
    payload: E,
}

/// Order-preserving deferred event dispatcher.
///
/// Publishing is synchronous and non-blocking; listener invocations happen
/// later, in global publish order, one scheduler tick after each emission
/// reaches the head of the queue. Cloning the bus is cheap; clones share the
/// registry, the queue, and the disposal signal.
///
/// Listeners for a single emission run in registration order; a panicking
/// listener is contained and never prevents its siblings from running.
/// `dispose` aborts every pending and future emission irrevocably.
pub struct SerialEventBus<E> {
    inner: Arc<BusInner<E>>,
}

struct BusInner<E> {
    /// Listener registry, cleared en masse on disposal.
    listeners: Arc<RwLock<Registry<E>>>,

    /// Producer side of the pending emission queue.
    queue: mpsc::UnboundedSender<Emission<E>>,

    /// Disposal signal; flips to `true` exactly once.
    disposed: Arc<watch::Sender<bool>>,

    /// Emissions accepted but not yet run or discarded.
    pending: Arc<watch::Sender<u64>>,

    /// Total publish attempts.
    events_published: AtomicU64,
}

impl<E> Clone for SerialEventBus<E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<E: Send + 'static> SerialEventBus<E> {
    /// Create a bus whose emissions run one executor turn after publish.
    ///
    /// The delivery worker is spawned immediately, so this must be called
    /// from within a Tokio runtime.
    #[must_use]
    pub fn new() -> Self {
        Self::with_deferral(NextTick)
    }

    /// Create a bus with a custom tick deferral.
    #[must_use]
    pub fn with_deferral(deferral: impl TickDeferral + 'static) -> Self {
        let listeners: Arc<RwLock<Registry<E>>> = Arc::new(RwLock::new(HashMap::new()));
        let (queue_tx, queue_rx) = mpsc::unbounded_channel();
        let (disposed_tx, disposal_rx) = watch::channel(false);
        let (pending_tx, _) = watch::channel(0u64);
        let disposed = Arc::new(disposed_tx);
        let pending = Arc::new(pending_tx);

        tokio::spawn(deliver_loop(
            queue_rx,
            disposal_rx,
            Arc::clone(&disposed),
            Arc::clone(&pending),
            Arc::clone(&listeners),
            Arc::new(deferral),
        ));

        Self {
            inner: Arc::new(BusInner {
                listeners,
                queue: queue_tx,
                disposed,
                pending,
                events_published: AtomicU64::new(0),
            }),
        }
    }

    /// Register `callback` for `id`, after every callback already registered
    /// for it.
    ///
    /// Emissions published for `id` from now on include this callback.
    /// Registering on a disposed bus is a silent no-op: the registry was
    /// cleared and disposal never re-enables delivery.
    pub fn register<F>(&self, id: impl Into<EventId>, callback: F)
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        let id = id.into();
        let Ok(mut registry) = self.inner.listeners.write() else {
            return;
        };
        // Checked under the registry lock so a concurrent dispose either
        // sees this entry and clears it, or has already flipped the signal.
        if *self.inner.disposed.borrow() {
            debug!(id = %id, "register on disposed bus ignored");
            return;
        }
        registry.entry(id.clone()).or_default().push(Arc::new(callback));
        drop(registry);
        debug!(id = %id, "listener registered");
    }

    /// Remove every callback registered for `id`.
    ///
    /// Emissions already queued for `id` but not yet delivered will find no
    /// listeners when their turn comes. Returns how many callbacks were
    /// removed.
    pub fn unregister(&self, id: &EventId) -> usize {
        let Ok(mut registry) = self.inner.listeners.write() else {
            return 0;
        };
        let removed = registry.remove(id).map_or(0, |callbacks| callbacks.len());
        drop(registry);
        if removed > 0 {
            debug!(id = %id, removed, "listeners unregistered");
        }
        removed
    }

    /// Queue `payload` for deferred, in-order delivery to the listeners of
    /// `id`.
    ///
    /// Returns `true` iff at least one callback is registered for `id` right
    /// now. This is a capacity hint evaluated immediately, not a delivery
    /// confirmation: by the time the emission runs, membership may have
    /// changed, and the callbacks registered at that moment are the ones
    /// invoked.
    ///
    /// Never blocks and never fails. On a disposed bus the payload is
    /// dropped and the result is `false`.
    pub fn publish(&self, id: impl Into<EventId>, payload: E) -> bool {
        let id = id.into();
        self.inner.events_published.fetch_add(1, Ordering::Relaxed);

        if self.is_disposed() {
            debug!(id = %id, "publish on disposed bus dropped");
            return false;
        }

        let has_listeners = self.listener_count(&id) > 0;
        debug!(id = %id, has_listeners, "emission queued");

        self.inner.pending.send_modify(|n| *n += 1);
        if self.inner.queue.send(Emission { id, payload }).is_err() {
            // Worker already gone; the emission can never run.
            self.inner.pending.send_modify(|n| *n = n.saturating_sub(1));
        }

        has_listeners
    }

    /// Shut the bus down. Idempotent, never fails.
    ///
    /// The first call clears the registry, aborts every emission still
    /// waiting for its tick, and discards everything queued behind it; the
    /// worker exits. Later calls are no-ops.
    pub fn dispose(&self) {
        let mut first = false;
        self.inner.disposed.send_if_modified(|flag| {
            if *flag {
                false
            } else {
                *flag = true;
                first = true;
                true
            }
        });
        if !first {
            return;
        }

        if let Ok(mut registry) = self.inner.listeners.write() {
            registry.clear();
        }
        self.inner.pending.send_modify(|n| *n = 0);
        debug!("serial bus disposed");
    }

    /// Whether `dispose` has been called.
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        *self.inner.disposed.borrow()
    }

    /// Number of callbacks currently registered for `id`.
    #[must_use]
    pub fn listener_count(&self, id: &EventId) -> usize {
        self.inner
            .listeners
            .read()
            .map_or(0, |registry| registry.get(id).map_or(0, Vec::len))
    }

    /// Total publish attempts, including those dropped after disposal.
    #[must_use]
    pub fn events_published(&self) -> u64 {
        self.inner.events_published.load(Ordering::Relaxed)
    }

    /// Emissions accepted but not yet run or discarded.
    #[must_use]
    pub fn pending_emissions(&self) -> u64 {
        *self.inner.pending.borrow()
    }

    /// Wait until every emission accepted so far has run or been discarded.
    ///
    /// Resolves immediately on an idle or disposed bus.
    pub async fn settled(&self) {
        let mut gauge = self.inner.pending.subscribe();
        let _ = gauge.wait_for(|pending| *pending == 0).await;
    }
}

impl<E: Send + 'static> Default for SerialEventBus<E> {
    fn default() -> Self {
        Self::new()
    }
}

/// Single consumer of the pending queue. One emission at a time: defer one
/// tick, then invoke the listeners registered for the identifier at that
/// moment, in registration order. Exits when the bus is disposed or every
/// handle is gone and the queue has drained.
async fn deliver_loop<E: Send + 'static>(
    mut queue: mpsc::UnboundedReceiver<Emission<E>>,
    mut disposal: watch::Receiver<bool>,
    disposed: Arc<watch::Sender<bool>>,
    pending: Arc<watch::Sender<u64>>,
    listeners: Arc<RwLock<Registry<E>>>,
    deferral: Arc<dyn TickDeferral>,
) {
    // Holding a sender handle keeps `changed` pending when every bus handle
    // is dropped without dispose, so emissions already accepted still drain.
    loop {
        let emission = tokio::select! {
            _ = disposal.changed() => break,
            next = queue.recv() => match next {
                Some(emission) => emission,
                None => break,
            },
        };

        // The one-tick deferral, raced against disposal: a bus disposed
        // before or during the wait never runs this emission.
        let aborted = tokio::select! {
            _ = disposal.changed() => true,
            () = deferral.next_tick() => *disposed.borrow(),
        };
        if aborted {
            debug!(id = %emission.id, "emission aborted by disposal");
            break;
        }

        invoke_listeners(&listeners, &emission);
        pending.send_modify(|n| *n = n.saturating_sub(1));
    }

    // Disposed, or queue closed: nothing accepted remains runnable.
    pending.send_modify(|n| *n = 0);
}

/// Invoke every listener registered for the emission's identifier.
///
/// The registry is snapshotted first so listeners may re-enter the bus
/// (register, publish) without deadlocking, and membership changes made by a
/// listener take effect from the next emission onward.
fn invoke_listeners<E>(listeners: &RwLock<Registry<E>>, emission: &Emission<E>) {
    let snapshot = {
        let Ok(registry) = listeners.read() else {
            return;
        };
        registry.get(&emission.id).cloned().unwrap_or_default()
    };

    for listener in &snapshot {
        // A panicking listener must not block its siblings or later
        // emissions.
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| listener(&emission.payload)));
        if outcome.is_err() {
            warn!(id = %emission.id, "listener panicked during dispatch");
        }
    }
}
