use std::sync::Arc;

use {
    async_trait::async_trait,
    botbridge_common::{Envelope, EventKind, types::ChatAction},
};

use {
    super::decode,
    crate::{Error, EventHandler, Platform, PlatformRequest, Result},
};

/// Shows a transient status ("typing…") in a chat.
pub struct ChatActionHandler {
    platform: Arc<dyn Platform>,
}

impl ChatActionHandler {
    pub fn new(platform: Arc<dyn Platform>) -> Self {
        Self { platform }
    }
}

#[async_trait]
impl EventHandler for ChatActionHandler {
    async fn handle(&self, envelope: &Envelope) -> Result<()> {
        let ChatAction { chat_id, action } = decode(EventKind::ChatAction, envelope)?;
        if chat_id == 0 {
            return Err(Error::invalid_payload(EventKind::ChatAction, "missing chat_id"));
        }
        if action.is_empty() {
            return Err(Error::invalid_payload(EventKind::ChatAction, "missing action"));
        }
        self.platform
            .send(PlatformRequest::SendChatAction { chat_id, action })
            .await
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {rstest::rstest, serde_json::json};

    use {super::*, crate::handlers::testing::RecordingPlatform};

    #[rstest]
    #[case("typing")]
    #[case("upload_photo")]
    #[case("record_voice")]
    #[case("dancing")]
    #[tokio::test]
    async fn forwards_action_names_unchecked(#[case] action: &str) {
        let platform = Arc::new(RecordingPlatform::default());
        let handler = ChatActionHandler::new(platform.clone());
        handler
            .handle(&Envelope::new(
                EventKind::ChatAction,
                json!({"chat_id": -1001, "action": action}),
            ))
            .await
            .unwrap();
        assert_eq!(platform.sent(), vec![PlatformRequest::SendChatAction {
            chat_id: -1001,
            action: action.to_string(),
        }]);
    }

    #[rstest]
    #[case(json!({"action": "typing"}))]
    #[case(json!({"chat_id": 1}))]
    #[case(json!({"chat_id": 1, "action": ""}))]
    #[tokio::test]
    async fn rejects_incomplete(#[case] data: serde_json::Value) {
        let platform = Arc::new(RecordingPlatform::default());
        let handler = ChatActionHandler::new(platform.clone());
        let err = handler
            .handle(&Envelope::new(EventKind::ChatAction, data))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidPayload { .. }));
        assert!(platform.sent().is_empty());
    }

    #[tokio::test]
    async fn wrong_field_type_is_a_decode_error() {
        let handler = ChatActionHandler::new(Arc::new(RecordingPlatform::default()));
        let err = handler
            .handle(&Envelope::new(
                EventKind::ChatAction,
                json!({"chat_id": "one", "action": "typing"}),
            ))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Decode { .. }));
    }
}
