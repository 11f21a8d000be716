//! # Scheduler Tick Deferral
//!
//! The bus defers every emission by one turn of the cooperative scheduler
//! before its listeners run. This seam is the integration point with the host
//! runtime: "resume me on a later tick". Cancellation of a pending tick is
//! not part of the seam; the dispatcher races the wait against its own
//! disposal signal.

use async_trait::async_trait;

/// A single suspension until the scheduler's next turn.
#[async_trait]
pub trait TickDeferral: Send + Sync {
    /// Suspend the calling task until the scheduler runs it again.
    async fn next_tick(&self);
}

/// Default deferral: yield once to the Tokio executor.
///
/// Every emission becomes runnable on the next turn of the event loop, which
/// keeps publishing non-blocking while guaranteeing listeners never run
/// inside the publish call itself.
#[derive(Debug, Default, Clone, Copy)]
pub struct NextTick;

#[async_trait]
impl TickDeferral for NextTick {
    async fn next_tick(&self) {
        tokio::task::yield_now().await;
    }
}
