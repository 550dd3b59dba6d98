use {
    botbridge_channels::InboundUpdate,
    botbridge_common::EventKind,
    serde::Serialize,
    teloxide::types::{Update, UpdateKind},
};

/// A raw Telegram update as it comes off `getUpdates`.
#[derive(Debug, Clone, Serialize)]
#[serde(transparent)]
pub struct TelegramUpdate(pub Update);

impl From<Update> for TelegramUpdate {
    fn from(update: Update) -> Self {
        Self(update)
    }
}

impl InboundUpdate for TelegramUpdate {
    fn kind(&self) -> Option<EventKind> {
        match &self.0.kind {
            UpdateKind::Message(_) => Some(EventKind::Message),
            UpdateKind::CallbackQuery(_) => Some(EventKind::CallbackQuery),
            UpdateKind::PreCheckoutQuery(_) => Some(EventKind::PreCheckoutQuery),
            _ => None,
        }
    }

    /// Messages shard by chat; callback and pre-checkout queries by sender,
    /// since they carry no reliable chat.
    fn conversation_id(&self) -> Option<i64> {
        match &self.0.kind {
            UpdateKind::Message(msg) => Some(msg.chat.id.0),
            UpdateKind::CallbackQuery(query) => i64::try_from(query.from.id.0).ok(),
            UpdateKind::PreCheckoutQuery(query) => i64::try_from(query.from.id.0).ok(),
            _ => None,
        }
    }

    fn pre_checkout_query_id(&self) -> Option<&str> {
        match &self.0.kind {
            UpdateKind::PreCheckoutQuery(query) => Some(query.id.as_str()),
            _ => None,
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod tests {
    use serde_json::{Value, json};

    use super::*;

    pub(crate) fn user_json(id: i64) -> Value {
        json!({"id": id, "is_bot": false, "first_name": "Ada", "username": "ada"})
    }

    pub(crate) fn message_json(chat_id: i64, text: &str) -> Value {
        json!({
            "message_id": 10,
            "date": 1_700_000_000,
            "chat": {"id": chat_id, "type": "private", "first_name": "Ada"},
            "from": user_json(7),
            "text": text
        })
    }

    pub(crate) fn update(kind: &str, body: Value) -> TelegramUpdate {
        let raw = json!({"update_id": 1, kind: body});
        TelegramUpdate(serde_json::from_str(&raw.to_string()).unwrap())
    }

    pub(crate) fn pre_checkout_json(id: &str, from: i64) -> Value {
        json!({
            "id": id,
            "from": user_json(from),
            "currency": "USD",
            "total_amount": 500,
            "invoice_payload": "order-1",
            "order_info": {}
        })
    }

    #[test]
    fn message_shards_by_chat() {
        let update = update("message", message_json(-100_42, "hi"));
        assert_eq!(update.kind(), Some(EventKind::Message));
        assert_eq!(update.conversation_id(), Some(-100_42));
        assert_eq!(update.pre_checkout_query_id(), None);
    }

    #[test]
    fn callback_query_shards_by_sender() {
        let update = update(
            "callback_query",
            json!({"id": "cb-1", "from": user_json(99), "chat_instance": "ci", "data": "yes"}),
        );
        assert_eq!(update.kind(), Some(EventKind::CallbackQuery));
        assert_eq!(update.conversation_id(), Some(99));
    }

    #[test]
    fn pre_checkout_exposes_query_id() {
        let update = update("pre_checkout_query", pre_checkout_json("pq-1", 5));
        assert_eq!(update.kind(), Some(EventKind::PreCheckoutQuery));
        assert_eq!(update.conversation_id(), Some(5));
        assert_eq!(update.pre_checkout_query_id(), Some("pq-1"));
    }

    #[test]
    fn serializes_as_the_raw_update() {
        let update = update("message", message_json(1, "hi"));
        let value = serde_json::to_value(&update).unwrap();
        assert_eq!(value["update_id"], json!(1));
        assert_eq!(value["message"]["text"], json!("hi"));
    }
}
