use std::{collections::HashMap, sync::Arc};

use {
    async_trait::async_trait,
    botbridge_common::{Envelope, EventKind},
};

use crate::{Error, Result};

/// Performs the platform side effect for one outbound envelope type.
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Decode the payload and perform exactly one platform call (or one
    /// ordered batch, for multi-photo messages).
    async fn handle(&self, envelope: &Envelope) -> Result<()>;
}

/// Maps envelope types to their handlers.
///
/// Built once before the routers start and shared read-only afterwards.
#[derive(Clone, Default)]
pub struct EventHandlerRegistry {
    handlers: HashMap<EventKind, Arc<dyn EventHandler>>,
}

impl EventHandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `kind`, replacing and returning any previous one.
    pub fn register(
        &mut self,
        kind: EventKind,
        handler: Arc<dyn EventHandler>,
    ) -> Option<Arc<dyn EventHandler>> {
        self.handlers.insert(kind, handler)
    }

    pub fn kinds(&self) -> Vec<EventKind> {
        EventKind::ALL
            .into_iter()
            .filter(|kind| self.handlers.contains_key(kind))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Route `envelope` to its handler and return the handler's result
    /// unchanged. Unknown or unregistered types yield [`Error::NoHandler`].
    pub async fn dispatch(&self, envelope: &Envelope) -> Result<()> {
        let handler = envelope
            .kind()
            .ok()
            .and_then(|kind| self.handlers.get(&kind))
            .ok_or_else(|| Error::NoHandler {
                event_type: envelope.event_type.clone(),
            })?;
        handler.handle(envelope).await
    }
}
