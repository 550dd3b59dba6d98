use std::{future::Future, time::Duration};

use {
    async_trait::async_trait,
    botbridge_channels::{GroupMedia, MediaRef, Platform, PlatformRequest, SendOptions},
    botbridge_common::types::{self, InputMediaKind},
    teloxide::{
        RequestError,
        payloads::setters::*,
        prelude::*,
        types::{
            ChatAction, InlineKeyboardButton, InlineKeyboardMarkup, InputFile, InputMedia,
            InputMediaAnimation, InputMediaAudio, InputMediaDocument, InputMediaPhoto,
            InputMediaVideo, LabeledPrice, MessageId, ReplyParameters,
        },
    },
    tracing::{debug, warn},
    url::Url,
};

use crate::{Error, Result};

const TELEGRAM_RETRY_AFTER_MAX_RETRIES: usize = 4;

macro_rules! apply_options {
    // Reply target and notification only, for requests without `protect_content`.
    (@delivery $req:expr, $options:expr) => {{
        let options: &SendOptions = $options;
        let mut req = $req;
        if let Some(id) = options.reply_to_message_id {
            req = req.reply_parameters(
                ReplyParameters::new(MessageId(id)).allow_sending_without_reply(),
            );
        }
        if options.disable_notification {
            req = req.disable_notification(true);
        }
        req
    }};
    ($req:expr, $options:expr) => {{
        let options: SendOptions = $options;
        let req = apply_options!(@delivery $req, &options);
        if options.protect_content {
            req.protect_content(true)
        } else {
            req
        }
    }};
}

/// Executes [`PlatformRequest`]s against the Bot API.
#[derive(Clone)]
pub struct TelegramPlatform {
    bot: Bot,
    http: reqwest::Client,
}

impl TelegramPlatform {
    pub fn new(bot: Bot, http: reqwest::Client) -> Self {
        Self { bot, http }
    }

    async fn execute(&self, request: PlatformRequest) -> Result<()> {
        let bot = &self.bot;
        match request {
            PlatformRequest::SendText {
                chat_id,
                text,
                keyboard,
                options,
            } => {
                let markup = keyboard.as_ref().map(inline_keyboard).transpose()?;
                run_with_retry(chat_id, "send_message", || {
                    let mut req = bot.send_message(ChatId(chat_id), text.clone());
                    if let Some(markup) = &markup {
                        req = req.reply_markup(markup.clone());
                    }
                    let req = apply_options!(req, options);
                    async move { req.await }
                })
                .await?;
            },
            PlatformRequest::SendPhoto {
                chat_id,
                photo,
                options,
            } => {
                let file = input_file(&photo);
                run_with_retry(chat_id, "send_photo", || {
                    let req = apply_options!(bot.send_photo(ChatId(chat_id), file.clone()), options);
                    async move { req.await }
                })
                .await?;
            },
            PlatformRequest::SendAudio {
                chat_id,
                audio,
                options,
            } => {
                let file = input_file(&audio);
                run_with_retry(chat_id, "send_audio", || {
                    let req = apply_options!(bot.send_audio(ChatId(chat_id), file.clone()), options);
                    async move { req.await }
                })
                .await?;
            },
            PlatformRequest::SendVoice {
                chat_id,
                voice,
                duration,
                options,
            } => {
                if options.protect_content {
                    return Err(Error::message(
                        "protect_content is not supported for voice messages",
                    ));
                }
                let file = self.voice_file(&voice).await?;
                run_with_retry(chat_id, "send_voice", || {
                    let mut req = bot.send_voice(ChatId(chat_id), file.clone());
                    if let Some(seconds) = duration {
                        req = req.duration(seconds);
                    }
                    let req = apply_options!(@delivery req, &options);
                    async move { req.await }
                })
                .await?;
            },
            PlatformRequest::SendVideo {
                chat_id,
                video,
                options,
            } => {
                let file = input_file(&video);
                run_with_retry(chat_id, "send_video", || {
                    let req = apply_options!(bot.send_video(ChatId(chat_id), file.clone()), options);
                    async move { req.await }
                })
                .await?;
            },
            PlatformRequest::SendInvoice {
                chat_id,
                invoice,
                options,
            } => {
                let photo_url = match invoice.photo_url.as_str() {
                    "" => None,
                    raw => Some(Url::parse(raw)?),
                };
                run_with_retry(chat_id, "send_invoice", || {
                    let req = invoice_request(bot, chat_id, &invoice, photo_url.clone());
                    let req = apply_options!(req, options);
                    async move { req.await }
                })
                .await?;
            },
            PlatformRequest::SendMediaGroup {
                chat_id,
                media,
                options,
            } => {
                let media: Vec<InputMedia> = media.iter().filter_map(input_media).collect();
                run_with_retry(chat_id, "send_media_group", || {
                    let req = apply_options!(bot.send_media_group(ChatId(chat_id), media.clone()), options);
                    async move { req.await }
                })
                .await?;
            },
            PlatformRequest::SendChatAction { chat_id, action } => {
                let action = chat_action(action)?;
                run_with_retry(chat_id, "send_chat_action", || {
                    let req = bot.send_chat_action(ChatId(chat_id), action);
                    async move { req.await }
                })
                .await?;
            },
            PlatformRequest::AnswerCallbackQuery(answer) => {
                let url = answer.url.as_deref().map(Url::parse).transpose()?;
                let mut req = bot.answer_callback_query(answer.callback_query_id.clone());
                if let Some(text) = answer.text {
                    req = req.text(text);
                }
                if answer.show_alert {
                    req = req.show_alert(true);
                }
                if let Some(url) = url {
                    req = req.url(url);
                }
                req.await?;
            },
            PlatformRequest::AnswerPreCheckoutQuery(answer) => {
                let mut req =
                    bot.answer_pre_checkout_query(answer.pre_checkout_query_id, answer.ok);
                if let Some(message) = answer.error_message {
                    req = req.error_message(message);
                }
                req.await?;
            },
        }
        Ok(())
    }

    /// Voice notes given by URL are fetched and uploaded; Telegram only
    /// accepts remote voice files in a narrow set of formats.
    async fn voice_file(&self, voice: &MediaRef) -> Result<InputFile> {
        match voice {
            MediaRef::FileId(_) => Ok(input_file(voice)),
            MediaRef::Url(url) => {
                let response = self.http.get(url.clone()).send().await?;
                if !response.status().is_success() {
                    return Err(Error::message(format!(
                        "failed to download voice file: HTTP {}",
                        response.status()
                    )));
                }
                let bytes = response.bytes().await?.to_vec();
                Ok(InputFile::memory(bytes).file_name("voice.ogg"))
            },
        }
    }
}

#[async_trait]
impl Platform for TelegramPlatform {
    async fn send(&self, request: PlatformRequest) -> botbridge_channels::Result<()> {
        let operation = request.operation();
        debug!(operation, chat_id = ?request.chat_id(), "telegram request");
        self.execute(request)
            .await
            .map_err(|e| botbridge_channels::Error::side_effect(operation, e))
    }
}

async fn run_with_retry<T, F, Fut>(
    chat_id: i64,
    operation: &'static str,
    mut request: F,
) -> std::result::Result<T, RequestError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<T, RequestError>>,
{
    let mut retries = 0usize;

    loop {
        match request().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                let Some(wait) = retry_after_duration(&err) else {
                    return Err(err);
                };

                if retries >= TELEGRAM_RETRY_AFTER_MAX_RETRIES {
                    warn!(
                        chat_id,
                        operation,
                        retries,
                        max_retries = TELEGRAM_RETRY_AFTER_MAX_RETRIES,
                        retry_after_secs = wait.as_secs(),
                        "telegram rate limit persisted after retries"
                    );
                    return Err(err);
                }

                retries += 1;
                warn!(
                    chat_id,
                    operation,
                    retries,
                    max_retries = TELEGRAM_RETRY_AFTER_MAX_RETRIES,
                    retry_after_secs = wait.as_secs(),
                    "telegram rate limited, waiting before retry"
                );
                tokio::time::sleep(wait).await;
            },
        }
    }
}

fn retry_after_duration(error: &RequestError) -> Option<Duration> {
    match error {
        RequestError::RetryAfter(wait) => Some(wait.duration()),
        _ => None,
    }
}

/// Map a generic action name onto the Bot API's closed set.
fn chat_action(name: String) -> Result<ChatAction> {
    serde_json::from_value(serde_json::Value::String(name.clone()))
        .map_err(|_| Error::message(format!("unknown chat action {name:?}")))
}

fn input_file(media: &MediaRef) -> InputFile {
    match media {
        MediaRef::FileId(id) => InputFile::file_id(id.clone()),
        MediaRef::Url(url) => InputFile::url(url.clone()),
    }
}

fn input_media(item: &GroupMedia) -> Option<InputMedia> {
    let file = input_file(&item.media);
    Some(match item.kind {
        InputMediaKind::Photo => InputMedia::Photo(InputMediaPhoto::new(file)),
        InputMediaKind::Audio => InputMedia::Audio(InputMediaAudio::new(file)),
        InputMediaKind::Video => InputMedia::Video(InputMediaVideo::new(file)),
        InputMediaKind::Animation => InputMedia::Animation(InputMediaAnimation::new(file)),
        InputMediaKind::Document => InputMedia::Document(InputMediaDocument::new(file)),
        InputMediaKind::Unsupported => return None,
    })
}

fn inline_keyboard(markup: &types::InlineKeyboardMarkup) -> Result<InlineKeyboardMarkup> {
    let rows = markup
        .inline_keyboard
        .iter()
        .map(|row| row.iter().map(inline_button).collect::<Result<Vec<_>>>())
        .collect::<Result<Vec<_>>>()?;
    Ok(InlineKeyboardMarkup::new(rows))
}

fn inline_button(button: &types::InlineKeyboardButton) -> Result<InlineKeyboardButton> {
    let text = button.text.clone();
    if let Some(url) = &button.url {
        return Ok(InlineKeyboardButton::url(text, Url::parse(url)?));
    }
    if let Some(data) = &button.callback_data {
        return Ok(InlineKeyboardButton::callback(text, data.clone()));
    }
    if let Some(query) = &button.switch_inline_query {
        return Ok(InlineKeyboardButton::switch_inline_query(text, query.clone()));
    }
    if let Some(query) = &button.switch_inline_query_current_chat {
        return Ok(InlineKeyboardButton::switch_inline_query_current_chat(
            text,
            query.clone(),
        ));
    }
    if button.pay {
        return Ok(InlineKeyboardButton::pay(text));
    }
    Err(Error::message(format!("inline button {text:?} has no action")))
}

fn invoice_request(
    bot: &Bot,
    chat_id: i64,
    invoice: &types::Invoice,
    photo_url: Option<Url>,
) -> <Bot as Requester>::SendInvoice {
    let prices = invoice
        .prices
        .iter()
        .map(|price| LabeledPrice::new(price.label.clone(), price.amount));
    let mut req = bot.send_invoice(
        ChatId(chat_id),
        invoice.title.clone(),
        invoice.description.clone(),
        invoice.payload.clone(),
        invoice.provider_token.clone(),
        invoice.currency.clone(),
        prices,
    );
    if invoice.max_tip_amount > 0 {
        req = req.max_tip_amount(invoice.max_tip_amount);
    }
    if !invoice.suggested_tip_amounts.is_empty() {
        req = req.suggested_tip_amounts(invoice.suggested_tip_amounts.clone());
    }
    if !invoice.start_parameter.is_empty() {
        req = req.start_parameter(invoice.start_parameter.clone());
    }
    if !invoice.provider_data.is_empty() {
        req = req.provider_data(invoice.provider_data.clone());
    }
    if let Some(url) = photo_url {
        req = req.photo_url(url);
    }
    if invoice.photo_size > 0 {
        req = req.photo_size(invoice.photo_size);
    }
    if invoice.photo_width > 0 {
        req = req.photo_width(invoice.photo_width);
    }
    if invoice.photo_height > 0 {
        req = req.photo_height(invoice.photo_height);
    }
    req.need_name(invoice.need_name)
        .need_phone_number(invoice.need_phone_number)
        .need_email(invoice.need_email)
        .need_shipping_address(invoice.need_shipping_address)
        .send_phone_number_to_provider(invoice.send_phone_number_to_provider)
        .send_email_to_provider(invoice.send_email_to_provider)
        .is_flexible(invoice.is_flexible)
}
