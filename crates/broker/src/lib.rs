//! Broker client: publish envelopes to a topic and run supervised receive
//! loops over topic subscriptions.
//!
//! The wire transport is pluggable through [`BrokerTransport`]. Two
//! implementations ship here: Redis pub/sub for production and an in-process
//! broadcast bus for tests.

pub mod client;
pub mod error;
pub mod memory;
pub mod redis_transport;
pub mod transport;

pub use {
    client::{BrokerClient, Subscriber, Subscription},
    error::{Error, Result},
    memory::MemoryTransport,
    redis_transport::RedisTransport,
    transport::{BrokerTransport, MessageStream},
};
