use std::{fmt::Display, sync::Arc};

use {
    async_trait::async_trait,
    botbridge_common::{
        Envelope, EventKind,
        types::{InputMediaKind, Message},
    },
    tracing::debug,
    url::Url,
};

use {
    super::decode,
    crate::{
        Error, EventHandler, GroupMedia, MediaRef, Platform, PlatformRequest, Result, SendOptions,
    },
};

/// Sends a generic message: text, photos, audio, voice, video, an invoice or
/// a media group, whichever the payload carries first.
pub struct MessageHandler {
    platform: Arc<dyn Platform>,
}

impl MessageHandler {
    pub fn new(platform: Arc<dyn Platform>) -> Self {
        Self { platform }
    }
}

#[async_trait]
impl EventHandler for MessageHandler {
    async fn handle(&self, envelope: &Envelope) -> Result<()> {
        let message: Message = decode(EventKind::Message, envelope)?;
        let requests = plan(&message)?;
        debug!(
            chat_id = ?message.chat.map(|c| c.id),
            requests = requests.len(),
            "sending message"
        );
        for request in requests {
            self.platform.send(request).await?;
        }
        Ok(())
    }
}

/// Platform requests needed to deliver `message`, in send order.
///
/// Content is checked in a fixed order (text, photos, audio, voice, video,
/// invoice, media group) and only the first present kind is sent.
pub fn plan(message: &Message) -> Result<Vec<PlatformRequest>> {
    let chat_id = message
        .chat
        .map(|chat| chat.id)
        .ok_or_else(|| invalid("missing chat"))?;
    let options = SendOptions {
        reply_to_message_id: message.reply_to_message_id,
        disable_notification: message.disable_notification,
        protect_content: message.protect_content,
    };

    if !message.text.is_empty() {
        return Ok(vec![PlatformRequest::SendText {
            chat_id,
            text: message.text.clone(),
            keyboard: message.inline_keyboard_markup.clone(),
            options,
        }]);
    }

    if !message.photo.is_empty() {
        return message
            .photo
            .iter()
            .enumerate()
            .map(|(i, photo)| {
                Ok(PlatformRequest::SendPhoto {
                    chat_id,
                    photo: media_ref(&format!("photo[{i}]"), &photo.file_id, &photo.url)?,
                    options,
                })
            })
            .collect();
    }

    if let Some(audio) = &message.audio {
        return Ok(vec![PlatformRequest::SendAudio {
            chat_id,
            audio: media_ref("audio", &audio.file_id, &audio.url)?,
            options,
        }]);
    }

    if let Some(voice) = &message.voice {
        return Ok(vec![PlatformRequest::SendVoice {
            chat_id,
            voice: media_ref("voice", &voice.file_id, &voice.url)?,
            duration: (voice.duration > 0).then_some(voice.duration),
            options,
        }]);
    }

    if let Some(video) = &message.video {
        return Ok(vec![PlatformRequest::SendVideo {
            chat_id,
            video: media_ref("video", &video.file_id, &video.url)?,
            options,
        }]);
    }

    if let Some(invoice) = &message.invoice {
        if invoice.prices.is_empty() {
            return Err(invalid("invoice has no prices"));
        }
        return Ok(vec![PlatformRequest::SendInvoice {
            chat_id,
            invoice: Box::new(invoice.clone()),
            options,
        }]);
    }

    if let Some(group) = &message.media_group {
        let media: Vec<GroupMedia> = group
            .files
            .iter()
            .filter(|file| file.kind != InputMediaKind::Unsupported && !file.media.is_empty())
            .map(|file| GroupMedia {
                kind: file.kind,
                media: MediaRef::guess(&file.media),
            })
            .collect();
        if media.is_empty() {
            return Err(invalid("media group has no supported files"));
        }
        return Ok(vec![PlatformRequest::SendMediaGroup {
            chat_id,
            media,
            options,
        }]);
    }

    Err(invalid("nothing to send"))
}

/// Prefer the platform file id; fall back to an absolute URL.
fn media_ref(what: &str, file_id: &str, url: &str) -> Result<MediaRef> {
    if !file_id.is_empty() {
        return Ok(MediaRef::FileId(file_id.to_string()));
    }
    if url.is_empty() {
        return Err(invalid(format!("{what} has neither file_id nor url")));
    }
    Url::parse(url)
        .map(MediaRef::Url)
        .map_err(|e| invalid(format!("{what} url {url:?}: {e}")))
}

fn invalid(message: impl Display) -> Error {
    Error::invalid_payload(EventKind::Message, message)
}
