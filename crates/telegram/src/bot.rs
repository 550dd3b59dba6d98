use std::time::Duration;

use {
    botbridge_config::TelegramConfig,
    secrecy::ExposeSecret,
    teloxide::{
        ApiError, RequestError,
        prelude::*,
        types::{AllowedUpdate, Me},
    },
    tokio::{sync::mpsc, task::JoinHandle},
    tokio_util::sync::CancellationToken,
    tracing::{debug, error, info, warn},
    url::Url,
};

use crate::{Error, Result, TelegramNormalizer, TelegramPlatform, TelegramUpdate};

/// Long-poll timeout passed to `getUpdates`.
const POLL_TIMEOUT_SECS: u32 = 30;
/// Must outlive the long poll so the client doesn't abort before Telegram answers.
const CLIENT_TIMEOUT: Duration = Duration::from_secs(45);
const POLL_ERROR_BACKOFF: Duration = Duration::from_secs(5);

/// A verified bot session.
#[derive(Clone)]
pub struct TelegramBot {
    bot: Bot,
    me: Me,
    http: reqwest::Client,
}

/// Build the bot client, verify the token and clear any webhook so long
/// polling can take over.
pub async fn connect(config: &TelegramConfig) -> Result<TelegramBot> {
    // teloxide pins its own reqwest major, so the bot and the download client
    // are built separately.
    let client = teloxide::net::default_reqwest_settings()
        .timeout(CLIENT_TIMEOUT)
        .build()
        .map_err(|e| Error::message(format!("building telegram client: {e}")))?;
    let http = reqwest::Client::builder().timeout(CLIENT_TIMEOUT).build()?;
    let mut bot = Bot::with_client(config.token.expose_secret(), client);
    if let Some(endpoint) = &config.api_endpoint {
        bot = bot.set_api_url(Url::parse(endpoint)?);
    }

    let me = bot.get_me().await?;
    bot.delete_webhook().send().await?;

    info!(
        username = ?me.username,
        bot_id = me.id.0,
        "telegram bot connected (webhook cleared)"
    );

    Ok(TelegramBot {
        bot,
        me,
        http,
    })
}

impl TelegramBot {
    pub fn platform(&self) -> TelegramPlatform {
        TelegramPlatform::new(self.bot.clone(), self.http.clone())
    }

    pub fn normalizer(&self) -> TelegramNormalizer {
        TelegramNormalizer::new(self.bot.clone(), &self.me)
    }

    /// Spawn the manual `getUpdates` loop.
    ///
    /// Updates are handed over one at a time; the offset only advances once
    /// the receiver has taken an update, so a stalled consumer stalls
    /// polling. The loop ends on cancellation, when the receiver is dropped,
    /// or when another instance takes over the token.
    pub fn start_polling(
        &self,
        cancel: CancellationToken,
    ) -> (mpsc::Receiver<TelegramUpdate>, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(1);
        let bot = self.bot.clone();
        let handle = tokio::spawn(poll(bot, tx, cancel));
        (rx, handle)
    }
}

async fn poll(bot: Bot, tx: mpsc::Sender<TelegramUpdate>, cancel: CancellationToken) {
    info!("starting telegram polling loop");
    let mut offset: i32 = 0;

    loop {
        let request = bot
            .get_updates()
            .offset(offset)
            .timeout(POLL_TIMEOUT_SECS)
            .allowed_updates(vec![
                AllowedUpdate::Message,
                AllowedUpdate::CallbackQuery,
                AllowedUpdate::PreCheckoutQuery,
            ]);

        let result = tokio::select! {
            _ = cancel.cancelled() => break,
            result = request.send() => result,
        };

        match result {
            Ok(updates) => {
                debug!(count = updates.len(), "got telegram updates");
                for update in updates {
                    let next = update.id.as_offset();
                    tokio::select! {
                        _ = cancel.cancelled() => {
                            info!("telegram polling stopped");
                            return;
                        },
                        sent = tx.send(TelegramUpdate::from(update)) => {
                            if sent.is_err() {
                                info!("update receiver closed, telegram polling stopped");
                                return;
                            }
                        },
                    }
                    offset = next;
                }
            },
            Err(RequestError::Api(ApiError::TerminatedByOtherGetUpdates)) => {
                error!("telegram polling disabled: another instance is already running with this token");
                return;
            },
            Err(e) => {
                warn!(error = %e, "telegram getUpdates failed");
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(POLL_ERROR_BACKOFF) => {},
                }
            },
        }
    }

    info!("telegram polling stopped");
}
