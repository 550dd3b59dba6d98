use {
    async_trait::async_trait,
    botbridge_channels::Normalizer,
    botbridge_common::types,
    serde::{Serialize, de::DeserializeOwned},
    teloxide::{
        prelude::*,
        types::{CallbackQuery, Me, Message, PreCheckoutQuery, UpdateKind},
    },
    tracing::warn,
};

use crate::{Error, Result, TelegramUpdate};

/// Resolves a Telegram file id to a direct download URL.
#[async_trait]
pub trait FileLinks: Send + Sync {
    async fn file_url(&self, file_id: &str) -> Result<String>;
}

/// [`FileLinks`] backed by the Bot API's `getFile`.
#[derive(Clone)]
pub struct BotFiles {
    bot: Bot,
}

impl BotFiles {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl FileLinks for BotFiles {
    async fn file_url(&self, file_id: &str) -> Result<String> {
        let file = self.bot.get_file(file_id).await?;
        // Format: <api>/file/bot<token>/<file_path>
        let base = self.bot.api_url();
        Ok(format!(
            "{}/file/bot{}/{}",
            base.as_str().trim_end_matches('/'),
            self.bot.token(),
            file.path
        ))
    }
}

/// Converts Telegram updates into the generic chat model.
pub struct TelegramNormalizer<F = BotFiles> {
    files: F,
    me: types::User,
}

impl TelegramNormalizer<BotFiles> {
    pub fn new(bot: Bot, me: &Me) -> Self {
        Self::with_files(BotFiles::new(bot), bot_user(me))
    }
}

impl<F: FileLinks> TelegramNormalizer<F> {
    pub fn with_files(files: F, me: types::User) -> Self {
        Self { files, me }
    }

    pub async fn message(&self, msg: &Message) -> Result<types::Message> {
        let mut out = types::Message {
            id: Some(msg.id.0),
            reply_to_message_id: msg.reply_to_message().map(|reply| reply.id.0),
            chat: Some(types::Chat { id: msg.chat.id.0 }),
            text: msg
                .text()
                .or_else(|| msg.caption())
                .unwrap_or_default()
                .to_string(),
            from: msg.from.as_ref().map(user),
            to: Some(self.me.clone()),
            ..Default::default()
        };

        if let Some(sizes) = msg.photo() {
            for size in sizes {
                match self.files.file_url(&size.file.id).await {
                    Ok(url) => out.photo.push(types::Photo {
                        url,
                        file_id: size.file.id.clone(),
                        file_size: size.file.size,
                        width: size.width,
                        height: size.height,
                    }),
                    Err(e) => {
                        warn!(chat_id = msg.chat.id.0, file_id = %size.file.id, error = %e, "skipping photo without file url");
                    },
                }
            }
        }

        if let Some(audio) = msg.audio() {
            out.audio = Some(types::MediaFile {
                url: self.files.file_url(&audio.file.id).await?,
                file_id: audio.file.id.clone(),
                duration: audio.duration.seconds(),
                mime_type: audio.mime_type.as_ref().map(ToString::to_string),
                file_size: audio.file.size,
            });
        }

        if let Some(voice) = msg.voice() {
            out.voice = Some(types::MediaFile {
                url: self.files.file_url(&voice.file.id).await?,
                file_id: voice.file.id.clone(),
                duration: voice.duration.seconds(),
                mime_type: voice.mime_type.as_ref().map(ToString::to_string),
                file_size: voice.file.size,
            });
        }

        if let Some(video) = msg.video() {
            // getFile refuses files over 20 MB; the id alone is still usable.
            let url = match self.files.file_url(&video.file.id).await {
                Ok(url) => url,
                Err(e) => {
                    warn!(chat_id = msg.chat.id.0, error = %e, "video has no file url");
                    String::new()
                },
            };
            out.video = Some(types::MediaFile {
                url,
                file_id: video.file.id.clone(),
                duration: video.duration.seconds(),
                mime_type: video.mime_type.as_ref().map(ToString::to_string),
                file_size: video.file.size,
            });
        }

        if let Some(payment) = msg.successful_payment() {
            out.successful_payment = Some(bridge(payment)?);
        }

        Ok(out)
    }

    pub async fn callback_query(&self, query: &CallbackQuery) -> Result<types::CallbackQuery> {
        let message = match query.regular_message() {
            Some(msg) => Some(self.message(msg).await?),
            None => None,
        };
        Ok(types::CallbackQuery {
            id: query.id.clone(),
            from: user(&query.from),
            message,
            inline_message_id: query.inline_message_id.clone(),
            chat_instance: query.chat_instance.clone(),
            data: query.data.clone(),
            game_short_name: query.game_short_name.clone(),
        })
    }

    pub fn pre_checkout_query(&self, query: &PreCheckoutQuery) -> Result<types::PreCheckoutQuery> {
        bridge(query)
    }
}

#[async_trait]
impl<F: FileLinks> Normalizer<TelegramUpdate> for TelegramNormalizer<F> {
    async fn normalize(&self, update: &TelegramUpdate) -> botbridge_channels::Result<serde_json::Value> {
        let normalized = match &update.0.kind {
            UpdateKind::Message(msg) => self.message(msg).await.and_then(to_value),
            UpdateKind::CallbackQuery(query) => self.callback_query(query).await.and_then(to_value),
            UpdateKind::PreCheckoutQuery(query) => {
                self.pre_checkout_query(query).and_then(to_value)
            },
            _ => Err(Error::message("unsupported update kind")),
        };
        normalized.map_err(|e| botbridge_channels::Error::external("normalize telegram update", e))
    }
}

fn to_value<T: Serialize>(value: T) -> Result<serde_json::Value> {
    Ok(serde_json::to_value(value)?)
}

/// Convert a Telegram type into the generic type with the same Bot API
/// field layout.
fn bridge<T: Serialize, U: DeserializeOwned>(value: &T) -> Result<U> {
    Ok(serde_json::from_value(serde_json::to_value(value)?)?)
}

fn user(user: &teloxide::types::User) -> types::User {
    types::User {
        id: i64::try_from(user.id.0).ok(),
        username: user.username.clone(),
        language_code: user.language_code.clone(),
        is_bot: user.is_bot,
        first_name: user.first_name.clone(),
        last_name: user.last_name.clone(),
        ..Default::default()
    }
}

fn bot_user(me: &Me) -> types::User {
    types::User {
        can_join_groups: me.can_join_groups,
        can_read_all_group_messages: me.can_read_all_group_messages,
        supports_inline_queries: me.supports_inline_queries,
        ..user(&me.user)
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {serde_json::json, std::collections::HashMap};

    use {
        super::*,
        crate::update::tests::{message_json, pre_checkout_json, update, user_json},
    };

    /// Known ids resolve to `https://files.test/<id>`; everything else fails.
    struct FakeFiles(HashMap<&'static str, bool>);

    #[async_trait]
    impl FileLinks for FakeFiles {
        async fn file_url(&self, file_id: &str) -> Result<String> {
            match self.0.get(file_id) {
                Some(true) => Ok(format!("https://files.test/{file_id}")),
                _ => Err(Error::message(format!("no such file {file_id}"))),
            }
        }
    }

    fn normalizer(known: &[&'static str]) -> TelegramNormalizer<FakeFiles> {
        let files = FakeFiles(known.iter().map(|id| (*id, true)).collect());
        TelegramNormalizer::with_files(files, types::User {
            id: Some(1000),
            is_bot: true,
            first_name: "Bridge".into(),
            username: Some("bridge_bot".into()),
            ..Default::default()
        })
    }

    fn photo(id: &str, width: u32) -> serde_json::Value {
        json!({"file_id": id, "file_unique_id": format!("u-{id}"), "width": width, "height": width, "file_size": 100})
    }

    #[tokio::test]
    async fn text_message_carries_chat_sender_and_bot() {
        let normalizer = normalizer(&[]);
        let value = normalizer
            .normalize(&update("message", message_json(42, "hello")))
            .await
            .unwrap();
        assert_eq!(value["id"], json!(10));
        assert_eq!(value["chat"], json!({"id": 42}));
        assert_eq!(value["text"], json!("hello"));
        assert_eq!(value["from"]["id"], json!(7));
        assert_eq!(value["from"]["username"], json!("ada"));
        assert_eq!(value["to"]["username"], json!("bridge_bot"));
        assert!(value.get("photo").is_none());
    }

    #[tokio::test]
    async fn photo_sizes_without_url_are_skipped() {
        let mut msg = message_json(42, "");
        msg.as_object_mut().unwrap().remove("text");
        msg["caption"] = json!("look");
        msg["photo"] = json!([photo("small", 90), photo("gone", 320), photo("large", 800)]);

        let value = normalizer(&["small", "large"])
            .normalize(&update("message", msg))
            .await
            .unwrap();
        assert_eq!(value["text"], json!("look"));
        let photos = value["photo"].as_array().unwrap();
        assert_eq!(photos.len(), 2);
        assert_eq!(photos[0]["url"], json!("https://files.test/small"));
        assert_eq!(photos[1]["file_id"], json!("large"));
        assert_eq!(photos[1]["width"], json!(800));
    }

    #[tokio::test]
    async fn voice_lookup_failure_fails_normalization() {
        let mut msg = message_json(42, "");
        msg.as_object_mut().unwrap().remove("text");
        msg["voice"] = json!({"file_id": "v1", "file_unique_id": "uv1", "duration": 4, "mime_type": "audio/ogg"});

        let err = normalizer(&[])
            .normalize(&update("message", msg.clone()))
            .await
            .unwrap_err();
        assert!(matches!(err, botbridge_channels::Error::External { .. }));

        let value = normalizer(&["v1"])
            .normalize(&update("message", msg))
            .await
            .unwrap();
        assert_eq!(value["voice"]["duration"], json!(4));
        assert_eq!(value["voice"]["mime_type"], json!("audio/ogg"));
        assert_eq!(value["voice"]["url"], json!("https://files.test/v1"));
    }

    #[tokio::test]
    async fn callback_query_embeds_normalized_message() {
        let query = json!({
            "id": "cb-9",
            "from": user_json(99),
            "chat_instance": "ci",
            "data": "choice:a",
            "message": message_json(42, "pick")
        });
        let value = normalizer(&[])
            .normalize(&update("callback_query", query))
            .await
            .unwrap();
        assert_eq!(value["id"], json!("cb-9"));
        assert_eq!(value["from"]["id"], json!(99));
        assert_eq!(value["data"], json!("choice:a"));
        assert_eq!(value["message"]["text"], json!("pick"));
    }

    #[tokio::test]
    async fn pre_checkout_query_keeps_bot_api_fields() {
        let value = normalizer(&[])
            .normalize(&update("pre_checkout_query", pre_checkout_json("pq-3", 5)))
            .await
            .unwrap();
        assert_eq!(value["id"], json!("pq-3"));
        assert_eq!(value["currency"], json!("USD"));
        assert_eq!(value["total_amount"], json!(500));
        assert_eq!(value["invoice_payload"], json!("order-1"));
        assert_eq!(value["from"]["first_name"], json!("Ada"));
    }
}
