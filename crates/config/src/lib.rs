//! Environment-style configuration for the bridge process.
//!
//! All settings come from process environment variables (optionally seeded
//! from a `.env` file by the binary). Loading is a pure function of a key
//! lookup so it can be exercised without touching the real environment.

pub mod error;
pub mod keys;
pub mod loader;
pub mod schema;

pub use {
    error::{Error, Result},
    schema::{BrokerConfig, Config, TelegramConfig},
};
