//! Telegram adapter: long-poll update stream, Bot API request execution and
//! normalization of Telegram updates into the generic chat model.

pub mod bot;
pub mod error;
pub mod normalize;
pub mod outbound;
pub mod update;

pub use {
    bot::{TelegramBot, connect},
    error::{Error, Result},
    normalize::TelegramNormalizer,
    outbound::TelegramPlatform,
    update::TelegramUpdate,
};
