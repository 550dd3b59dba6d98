use std::sync::Arc;

use {
    async_trait::async_trait,
    botbridge_common::{Envelope, EventKind, types::CallbackAnswer},
};

use {
    super::decode,
    crate::{Error, EventHandler, Platform, PlatformRequest, Result},
};

/// Answers an inline-keyboard callback, optionally with a toast or alert.
pub struct CallbackQueryHandler {
    platform: Arc<dyn Platform>,
}

impl CallbackQueryHandler {
    pub fn new(platform: Arc<dyn Platform>) -> Self {
        Self { platform }
    }
}

#[async_trait]
impl EventHandler for CallbackQueryHandler {
    async fn handle(&self, envelope: &Envelope) -> Result<()> {
        let answer: CallbackAnswer = decode(EventKind::CallbackQuery, envelope)?;
        if answer.callback_query_id.is_empty() {
            return Err(Error::invalid_payload(
                EventKind::CallbackQuery,
                "missing callback_query_id",
            ));
        }
        self.platform
            .send(PlatformRequest::AnswerCallbackQuery(answer))
            .await
    }
}
