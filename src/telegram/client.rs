use super::types::{ApiResponse, InlineKeyboardMarkup, SendMessageRequest};
use crate::config::TelegramConfig;
use async_trait::async_trait;
use futures::future::join_all;
use tracing::{debug, warn};

const DEFAULT_API_BASE: &str = "https://api.telegram.org";

/// Result of one message delivery.
///
/// Sends never fail the calling flow: the caller looks at `ok`, logs, and
/// decides whether to continue.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub ok: bool,
    pub error: Option<String>,
}

impl Delivery {
    fn sent() -> Self {
        Self {
            ok: true,
            error: None,
        }
    }

    fn failed(error: String) -> Self {
        Self {
            ok: false,
            error: Some(error),
        }
    }
}

/// Trait for chat operations to enable testing with mocks.
#[async_trait]
pub trait ChatOps: Send + Sync {
    async fn send_message(&self, chat_id: i64, text: &str) -> Delivery;

    /// HTML-formatted message, used by the build-completion broadcast.
    async fn send_html(&self, chat_id: i64, text: &str) -> Delivery;

    async fn send_menu(&self, chat_id: i64, text: &str, keyboard: InlineKeyboardMarkup)
        -> Delivery;

    /// Broadcast to many chats concurrently. A failure for one recipient is
    /// logged and never blocks delivery to the others.
    async fn broadcast(&self, chat_ids: &[i64], text: &str) {
        let sends = chat_ids.iter().map(|&chat_id| async move {
            let delivery = self.send_message(chat_id, text).await;
            (chat_id, delivery)
        });
        for (chat_id, delivery) in join_all(sends).await {
            if !delivery.ok {
                warn!(chat_id, error = ?delivery.error, "broadcast delivery failed");
            }
        }
    }

    async fn broadcast_html(&self, chat_ids: &[i64], text: &str) {
        let sends = chat_ids.iter().map(|&chat_id| async move {
            let delivery = self.send_html(chat_id, text).await;
            (chat_id, delivery)
        });
        for (chat_id, delivery) in join_all(sends).await {
            if !delivery.ok {
                warn!(chat_id, error = ?delivery.error, "broadcast delivery failed");
            }
        }
    }
}

/// Telegram Bot API gateway.
#[derive(Debug, Clone)]
pub struct TelegramClient {
    http: reqwest::Client,
    bot_token: String,
    api_base: String,
}

impl TelegramClient {
    pub fn new(config: &TelegramConfig) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .user_agent("release-valet")
            .build()?;

        Ok(Self {
            http,
            bot_token: config.bot_token.clone(),
            api_base: config
                .api_base
                .clone()
                .unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
        })
    }

    fn send_message_url(&self) -> String {
        format!("{}/bot{}/sendMessage", self.api_base, self.bot_token)
    }

    async fn post_message(&self, request: &SendMessageRequest<'_>) -> Delivery {
        let chat_id = request.chat_id;
        let response = match self
            .http
            .post(self.send_message_url())
            .json(request)
            .send()
            .await
        {
            Ok(response) => response,
            Err(err) => return Delivery::failed(err.to_string()),
        };

        let status = response.status();
        match response.json::<ApiResponse>().await {
            Ok(api) if api.ok => {
                debug!(chat_id, "message sent");
                Delivery::sent()
            }
            Ok(api) => Delivery::failed(
                api.description
                    .unwrap_or_else(|| format!("sendMessage returned ok=false ({status})")),
            ),
            Err(err) => Delivery::failed(format!("sendMessage returned {status}: {err}")),
        }
    }
}

#[async_trait]
impl ChatOps for TelegramClient {
    async fn send_message(&self, chat_id: i64, text: &str) -> Delivery {
        self.post_message(&SendMessageRequest {
            chat_id,
            text,
            parse_mode: None,
            reply_markup: None,
        })
        .await
    }

    async fn send_html(&self, chat_id: i64, text: &str) -> Delivery {
        self.post_message(&SendMessageRequest {
            chat_id,
            text,
            parse_mode: Some("HTML"),
            reply_markup: None,
        })
        .await
    }

    async fn send_menu(
        &self,
        chat_id: i64,
        text: &str,
        keyboard: InlineKeyboardMarkup,
    ) -> Delivery {
        self.post_message(&SendMessageRequest {
            chat_id,
            text,
            parse_mode: None,
            reply_markup: Some(&keyboard),
        })
        .await
    }
}
