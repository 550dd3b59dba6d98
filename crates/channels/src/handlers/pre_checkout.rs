use std::sync::Arc;

use {
    async_trait::async_trait,
    botbridge_common::{Envelope, EventKind, types::PreCheckoutAnswer},
};

use {
    super::decode,
    crate::{Error, EventHandler, Platform, PlatformRequest, Result},
};

/// Approves or declines a pre-checkout query on the orchestrator's behalf.
///
/// The inbound router already approves every query as it arrives; this
/// handler is for orchestrators that answer explicitly.
pub struct PreCheckoutHandler {
    platform: Arc<dyn Platform>,
}

impl PreCheckoutHandler {
    pub fn new(platform: Arc<dyn Platform>) -> Self {
        Self { platform }
    }
}

#[async_trait]
impl EventHandler for PreCheckoutHandler {
    async fn handle(&self, envelope: &Envelope) -> Result<()> {
        let answer: PreCheckoutAnswer = decode(EventKind::PreCheckoutQuery, envelope)?;
        if answer.pre_checkout_query_id.is_empty() {
            return Err(Error::invalid_payload(
                EventKind::PreCheckoutQuery,
                "missing pre_checkout_query_id",
            ));
        }
        if !answer.ok && answer.error_message.as_deref().is_none_or(str::is_empty) {
            return Err(Error::invalid_payload(
                EventKind::PreCheckoutQuery,
                "declined answer needs an error_message",
            ));
        }
        self.platform
            .send(PlatformRequest::AnswerPreCheckoutQuery(answer))
            .await
    }
}
