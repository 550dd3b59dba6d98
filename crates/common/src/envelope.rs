//! The unit exchanged with the broker: an event-type tag plus an opaque JSON
//! payload.
//!
//! Wire format: `{"type": "<tag>", "data": <object>}`.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::{Error, Result};

/// Closed set of event types the bridge understands.
///
/// Inbound traffic (platform → inbox) uses `Message`, `CallbackQuery` and
/// `PreCheckoutQuery`; outbound commands (outbox → platform) may use any of
/// the four.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Message,
    ChatAction,
    CallbackQuery,
    PreCheckoutQuery,
}

impl EventKind {
    pub const ALL: [Self; 4] = [
        Self::Message,
        Self::ChatAction,
        Self::CallbackQuery,
        Self::PreCheckoutQuery,
    ];

    /// Wire tag used in the envelope `type` field.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Message => "message",
            Self::ChatAction => "chat_action",
            Self::CallbackQuery => "callback_query",
            Self::PreCheckoutQuery => "pre_checkout_query",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when an envelope tag does not name a known [`EventKind`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown event type: {0}")]
pub struct UnknownEventKind(pub String);

impl FromStr for EventKind {
    type Err = UnknownEventKind;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| UnknownEventKind(s.to_string()))
    }
}

/// Broker transport unit.
///
/// The tag is kept as a raw string so that envelopes with tags this build
/// does not know still decode and can be reported by the handler registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

impl Envelope {
    #[must_use]
    pub fn new(kind: EventKind, data: serde_json::Value) -> Self {
        Self {
            event_type: kind.as_str().to_string(),
            data,
        }
    }

    pub fn kind(&self) -> std::result::Result<EventKind, UnknownEventKind> {
        self.event_type.parse()
    }

    /// Decode the payload into the shape expected for this event type.
    pub fn decode_data<T: DeserializeOwned>(&self) -> std::result::Result<T, serde_json::Error> {
        T::deserialize(&self.data)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| Error::encode("envelope", e))
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(|e| Error::decode("envelope", e))
    }
}
