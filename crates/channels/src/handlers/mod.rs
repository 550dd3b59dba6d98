//! Outbound handlers, one per envelope type.

mod callback_query;
mod chat_action;
mod message;
mod pre_checkout;

use std::sync::Arc;

use {
    botbridge_common::{Envelope, EventKind},
    serde::de::DeserializeOwned,
};

pub use {
    callback_query::CallbackQueryHandler, chat_action::ChatActionHandler,
    message::MessageHandler, pre_checkout::PreCheckoutHandler,
};

use crate::{Error, EventHandlerRegistry, Platform, Result};

/// Registry with every built-in handler bound to `platform`.
pub fn default_registry(platform: Arc<dyn Platform>) -> EventHandlerRegistry {
    let mut registry = EventHandlerRegistry::new();
    registry.register(
        EventKind::Message,
        Arc::new(MessageHandler::new(Arc::clone(&platform))),
    );
    registry.register(
        EventKind::ChatAction,
        Arc::new(ChatActionHandler::new(Arc::clone(&platform))),
    );
    registry.register(
        EventKind::CallbackQuery,
        Arc::new(CallbackQueryHandler::new(Arc::clone(&platform))),
    );
    registry.register(
        EventKind::PreCheckoutQuery,
        Arc::new(PreCheckoutHandler::new(platform)),
    );
    registry
}

fn decode<T: DeserializeOwned>(event_type: EventKind, envelope: &Envelope) -> Result<T> {
    envelope
        .decode_data()
        .map_err(|source| Error::Decode { event_type, source })
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use crate::{Error, Platform, PlatformRequest, Result};

    /// Records every request. Once `fail_at` requests are recorded, every
    /// further call fails.
    #[derive(Default)]
    pub struct RecordingPlatform {
        pub sent: Mutex<Vec<PlatformRequest>>,
        pub fail_at: Option<usize>,
    }

    impl RecordingPlatform {
        #[allow(clippy::unwrap_used)]
        pub fn sent(&self) -> Vec<PlatformRequest> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[derive(Debug, thiserror::Error)]
    #[error("platform unavailable")]
    pub struct Unavailable;

    #[async_trait]
    impl Platform for RecordingPlatform {
        #[allow(clippy::unwrap_used)]
        async fn send(&self, request: PlatformRequest) -> Result<()> {
            let mut sent = self.sent.lock().unwrap();
            if self.fail_at == Some(sent.len()) {
                return Err(Error::side_effect(request.operation(), Unavailable));
            }
            sent.push(request);
            Ok(())
        }
    }
}
