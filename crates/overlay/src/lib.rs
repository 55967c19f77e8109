//! Gossipsub overlay for pubsub-shadow nodes.
//!
//! The overlay engine (rust-libp2p gossipsub) is consumed, not reimplemented. This crate
//! provides:
//!
//! - [`OverlayConfig`]: the immutable parameter set handed to the engine.
//! - [`Overlay`]: the capability boundary the node orchestration is written against
//!   (connect, join, subscribe, publish, live connection count, close).
//! - [`OverlayHandle`]: the libp2p-backed implementation. The swarm runs in its own task
//!   and reports its internals to an [`EventTracer`](pubsub_shadow_tracer::EventTracer).
//! - [`TopicHandle`] and [`Subscription`]: per-topic publish and receive.

pub mod args;
mod config;
mod driver;
mod error;
mod handle;

pub use args::OverlayArgs;
pub use config::{
    MAX_MESSAGE_SIZE, MessageIdFn, OUTBOUND_QUEUE_SIZE, OverlayConfig, SignaturePolicy,
    VALIDATE_QUEUE_SIZE,
};
pub use error::OverlayError;
pub use handle::{
    Overlay, OverlayHandle, ReceivedMessage, SUBSCRIPTION_BUFFER, Subscription, TopicHandle,
    with_cancel,
};
