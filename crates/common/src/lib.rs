//! Shared types used across all botbridge crates: the broker envelope, the
//! generic chat data model carried inside it, and small task utilities.

pub mod envelope;
pub mod error;
pub mod task;
pub mod types;

pub use {
    envelope::{Envelope, EventKind, UnknownEventKind},
    error::{Error, Result},
};
