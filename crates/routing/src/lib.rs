//! Event routing between the platform and the broker.
//!
//! Inbound updates are sharded by conversation onto ordered lanes and
//! published to the inbox topic. Outbound envelopes from the outbox topic pass
//! a shared [`RateBudget`], land on a random lane and are dispatched through
//! the handler registry.

pub mod error;
pub mod inbound;
pub mod lanes;
pub mod outbound;
pub mod rate;
pub mod shard;

pub use {
    error::{Error, Result},
    inbound::InboundRouter,
    lanes::{LaneSender, LaneWorkers},
    outbound::OutboundRouter,
    rate::RateBudget,
    shard::shard,
};
