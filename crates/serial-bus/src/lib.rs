//! # Serial Bus - Order-Preserving Deferred Event Dispatch
//!
//! A serialized, order-preserving asynchronous dispatch primitive: producers
//! publish synchronously and non-blockingly, and listener invocations run in
//! global publish order, each deferred by one turn of the scheduler.
//!
//! ## Delivery Model
//!
//! ```text
//! publish(a, item)   publish(b, item')   publish(a, item'')
//!       │                  │                   │
//!       ▼                  ▼                   ▼
//!  ┌───────────────────────────────────────────────┐
//!  │           pending emission queue              │  strict FIFO
//!  └───────────────────────────────────────────────┘
//!                         │
//!                         ▼  one worker, one tick of deferral per emission
//!              listeners for the emission's
//!              identifier, in registration order
//! ```
//!
//! Total order across identifiers is the contract: a slow listener on one
//! identifier delays every later emission on every identifier. Disposal is
//! the only cancellation mechanism: immediate, irrevocable, and bus-wide.
//!
//! ## Errors
//!
//! `publish`, `register`, and `dispose` never fail. A panicking listener is
//! contained per callback and logged; an emission aborted by disposal is
//! dropped silently. Nothing breaks the publisher's control flow.
//!
//! ## Channels
//!
//! [`ChannelHub`] multiplexes independent publish/subscribe channels over one
//! bus by binding each to a process-unique identifier, so unrelated channels
//! never collide even when their items are structurally identical.

// Nursery lints that are too strict
#![allow(clippy::missing_const_for_fn)]
// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod channel;
pub mod deferral;
pub mod dispatcher;
pub mod events;

// Re-export main types
pub use channel::{ChannelError, ChannelHub, ChannelPublisher, ChannelStream};
pub use deferral::{NextTick, TickDeferral};
pub use dispatcher::SerialEventBus;
pub use events::EventId;
