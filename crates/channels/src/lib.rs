//! Platform-facing capabilities shared by every chat adapter, and the
//! outbound event handlers built on them.
//!
//! An adapter provides a [`Platform`] to execute [`PlatformRequest`]s, an
//! update type implementing [`InboundUpdate`], and a [`Normalizer`] that turns
//! its updates into the generic payload model. The [`EventHandlerRegistry`]
//! maps outbound envelope types to the handler that performs the side effect.

pub mod error;
pub mod handlers;
pub mod inbound;
pub mod platform;
pub mod registry;

pub use {
    error::{Error, Result},
    inbound::{InboundUpdate, Normalizer},
    platform::{GroupMedia, MediaRef, Platform, PlatformRequest, SendOptions},
    registry::{EventHandler, EventHandlerRegistry},
};
