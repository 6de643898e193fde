use crate::{AppError, Result};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Extra time granted to a long-poll request on top of its server-side timeout.
const POLL_GRACE: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<Message>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub chat: Chat,
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

#[derive(Debug, Serialize)]
struct GetUpdates<'a> {
    offset: i64,
    timeout: u64,
    allowed_updates: &'a [&'a str],
}

#[derive(Debug, Serialize)]
struct SendMessage<'a> {
    chat_id: i64,
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct SendChatAction<'a> {
    chat_id: i64,
    action: &'a str,
}

/// A minimal client for the Telegram Bot API: long polling, text messages and chat actions.
#[derive(Clone)]
pub struct TelegramClient {
    client: Client,
    /// `<api>/bot<token>`, the prefix of every method URL.
    base_url: String,
}

impl TelegramClient {
    /// Creates a new `TelegramClient`.
    ///
    /// # Arguments
    ///
    /// * `api_url` - The Bot API root, e.g. `https://api.telegram.org`.
    /// * `token` - The bot token issued by BotFather.
    ///
    /// # Returns
    ///
    /// A `Result` containing the client, or an error if the HTTP client could not be created.
    pub fn new(api_url: &str, token: &str) -> Result<Self> {
        let client = Client::builder().build()?;
        Ok(Self {
            client,
            base_url: format!("{}/bot{}", api_url.trim_end_matches('/'), token),
        })
    }

    /// Waits up to `timeout` for updates newer than `offset`.
    pub async fn get_updates(&self, offset: i64, timeout: Duration) -> Result<Vec<Update>> {
        let body = GetUpdates {
            offset,
            timeout: timeout.as_secs(),
            allowed_updates: &["message"],
        };
        self.call_with_timeout("getUpdates", &body, timeout + POLL_GRACE)
            .await
    }

    /// Sends `text` to the chat as plain text.
    pub async fn send_message(&self, chat_id: i64, text: &str) -> Result<()> {
        let _: Message = self
            .call("sendMessage", &SendMessage { chat_id, text })
            .await?;
        Ok(())
    }

    /// Shows an action such as `typing` in the chat until the next message is sent.
    pub async fn send_chat_action(&self, chat_id: i64, action: &str) -> Result<()> {
        let _: bool = self
            .call("sendChatAction", &SendChatAction { chat_id, action })
            .await?;
        Ok(())
    }

    async fn call<B, T>(&self, method: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.call_with_timeout(method, body, crate::DEFAULT_TIMEOUT)
            .await
    }

    async fn call_with_timeout<B, T>(&self, method: &str, body: &B, timeout: Duration) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        debug!("Calling {}", method);
        let response = self
            .client
            .post(format!("{}/{}", self.base_url, method))
            .timeout(timeout)
            .json(body)
            .send()
            .await?;

        let reply: ApiResponse<T> = response.json().await?;
        match (reply.ok, reply.result) {
            (true, Some(result)) => Ok(result),
            _ => Err(AppError::TelegramError(format!(
                "{} failed: {}",
                method,
                reply.description.unwrap_or_else(|| "no description".to_string())
            ))),
        }
    }
}
