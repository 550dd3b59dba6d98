use {async_trait::async_trait, botbridge_common::EventKind, serde::Serialize};

use crate::Result;

/// One update from a platform's inbound stream.
///
/// `Serialize` is used only for diagnostics: a dropped update is logged in
/// full.
pub trait InboundUpdate: Serialize + Send + Sync + 'static {
    /// Envelope type to publish under, or `None` for update kinds the bridge
    /// does not forward.
    fn kind(&self) -> Option<EventKind>;

    /// Sharding key. Updates without one all land on lane 0.
    fn conversation_id(&self) -> Option<i64>;

    /// Id of a pre-checkout query that must be acknowledged to the platform
    /// as soon as the update is processed.
    fn pre_checkout_query_id(&self) -> Option<&str> {
        None
    }
}

/// Converts platform-native updates into the generic payload model.
#[async_trait]
pub trait Normalizer<U>: Send + Sync {
    async fn normalize(&self, update: &U) -> Result<serde_json::Value>;
}
