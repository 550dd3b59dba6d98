use {
    async_trait::async_trait,
    botbridge_common::types::{
        CallbackAnswer, InlineKeyboardMarkup, InputMediaKind, Invoice, PreCheckoutAnswer,
    },
    url::Url,
};

use crate::Result;

/// Executes requests against the chat platform.
#[async_trait]
pub trait Platform: Send + Sync {
    /// Perform exactly one platform call.
    async fn send(&self, request: PlatformRequest) -> Result<()>;
}

/// Reference to a media file: either a handle the platform already stores,
/// or an absolute URL it should fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaRef {
    FileId(String),
    Url(Url),
}

impl MediaRef {
    /// Interpret a bare string as a URL when it carries a scheme, otherwise
    /// as a platform file id.
    #[must_use]
    pub fn guess(media: &str) -> Self {
        match Url::parse(media) {
            Ok(url) => Self::Url(url),
            Err(_) => Self::FileId(media.to_string()),
        }
    }
}

/// Delivery flags shared by every outgoing message.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SendOptions {
    pub reply_to_message_id: Option<i32>,
    pub disable_notification: bool,
    pub protect_content: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupMedia {
    pub kind: InputMediaKind,
    pub media: MediaRef,
}

/// One platform side effect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlatformRequest {
    SendText {
        chat_id: i64,
        text: String,
        keyboard: Option<InlineKeyboardMarkup>,
        options: SendOptions,
    },
    SendPhoto {
        chat_id: i64,
        photo: MediaRef,
        options: SendOptions,
    },
    SendAudio {
        chat_id: i64,
        audio: MediaRef,
        options: SendOptions,
    },
    SendVoice {
        chat_id: i64,
        voice: MediaRef,
        duration: Option<u32>,
        options: SendOptions,
    },
    SendVideo {
        chat_id: i64,
        video: MediaRef,
        options: SendOptions,
    },
    SendInvoice {
        chat_id: i64,
        invoice: Box<Invoice>,
        options: SendOptions,
    },
    SendMediaGroup {
        chat_id: i64,
        media: Vec<GroupMedia>,
        options: SendOptions,
    },
    SendChatAction {
        chat_id: i64,
        action: String,
    },
    AnswerCallbackQuery(CallbackAnswer),
    AnswerPreCheckoutQuery(PreCheckoutAnswer),
}

impl PlatformRequest {
    /// Short operation name for logs and errors.
    #[must_use]
    pub fn operation(&self) -> &'static str {
        match self {
            Self::SendText { .. } => "send_message",
            Self::SendPhoto { .. } => "send_photo",
            Self::SendAudio { .. } => "send_audio",
            Self::SendVoice { .. } => "send_voice",
            Self::SendVideo { .. } => "send_video",
            Self::SendInvoice { .. } => "send_invoice",
            Self::SendMediaGroup { .. } => "send_media_group",
            Self::SendChatAction { .. } => "send_chat_action",
            Self::AnswerCallbackQuery(_) => "answer_callback_query",
            Self::AnswerPreCheckoutQuery(_) => "answer_pre_checkout_query",
        }
    }

    /// Target conversation, when the request addresses one.
    #[must_use]
    pub fn chat_id(&self) -> Option<i64> {
        match self {
            Self::SendText { chat_id, .. }
            | Self::SendPhoto { chat_id, .. }
            | Self::SendAudio { chat_id, .. }
            | Self::SendVoice { chat_id, .. }
            | Self::SendVideo { chat_id, .. }
            | Self::SendInvoice { chat_id, .. }
            | Self::SendMediaGroup { chat_id, .. }
            | Self::SendChatAction { chat_id, .. } => Some(*chat_id),
            Self::AnswerCallbackQuery(_) | Self::AnswerPreCheckoutQuery(_) => None,
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("https://example.com/cat.jpg", true)]
    #[case("http://10.0.0.1:8080/a.mp4", true)]
    #[case("AgACAgIAAxkBAAIB", false)]
    #[case("BQACAgQAAx0-file_id_with_dashes", false)]
    #[case("", false)]
    fn guess_distinguishes_urls_from_file_ids(#[case] media: &str, #[case] is_url: bool) {
        let guessed = MediaRef::guess(media);
        assert_eq!(matches!(guessed, MediaRef::Url(_)), is_url);
        if !is_url {
            assert_eq!(guessed, MediaRef::FileId(media.to_string()));
        }
    }

    #[test]
    fn chat_id_only_for_addressed_requests() {
        let text = PlatformRequest::SendText {
            chat_id: -100,
            text: "x".into(),
            keyboard: None,
            options: SendOptions::default(),
        };
        assert_eq!(text.chat_id(), Some(-100));
        assert_eq!(text.operation(), "send_message");

        let answer = PlatformRequest::AnswerCallbackQuery(CallbackAnswer::default());
        assert_eq!(answer.chat_id(), None);

        let photo = PlatformRequest::SendPhoto {
            chat_id: 3,
            photo: MediaRef::Url(Url::parse("https://example.com/p.png").unwrap()),
            options: SendOptions::default(),
        };
        assert_eq!(photo.operation(), "send_photo");
    }
}
