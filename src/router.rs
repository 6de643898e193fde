use crate::reply::InferenceQueue;
use crate::telegram::{Message, TelegramClient, Update};
use crate::{AppError, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

pub const GREETING: &str = "Привет! Я автобот Qwen 0.5B.";
pub const HELP: &str = "Напиши текст — я отвечу.";
const BUSY: &str = "Слишком много запросов, попробуй чуть позже.";

/// Delay before polling again after a failed `getUpdates`.
const POLL_RETRY_DELAY: Duration = Duration::from_secs(3);

/// What to do with an incoming message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Start,
    Help,
    /// Free text for the model, already trimmed.
    Chat(String),
    /// Non-text messages, blank text and unknown commands.
    Ignore,
}

/// Classifies the text of a message.
///
/// Commands may carry a `@botname` suffix and arguments; `/start` and `/help`
/// are answered with fixed texts, other commands are ignored.
pub fn route(text: Option<&str>) -> Route {
    let Some(text) = text else {
        return Route::Ignore;
    };

    if let Some(command) = text.strip_prefix('/') {
        let name = command
            .split_whitespace()
            .next()
            .unwrap_or_default()
            .split('@')
            .next()
            .unwrap_or_default();

        return match name {
            "start" => Route::Start,
            "help" => Route::Help,
            _ => Route::Ignore,
        };
    }

    match text.trim() {
        "" => Route::Ignore,
        trimmed => Route::Chat(trimmed.to_string()),
    }
}

/// The `MessageRouter` answers commands and relays chat messages to the inference queue.
pub struct MessageRouter {
    telegram: TelegramClient,
    queue: Arc<InferenceQueue>,
}

impl MessageRouter {
    pub fn new(telegram: TelegramClient, queue: Arc<InferenceQueue>) -> Self {
        Self { telegram, queue }
    }

    /// Handles one incoming message. Errors are logged, never returned.
    pub async fn dispatch(&self, message: Message) {
        let chat_id = message.chat.id;

        let result = match route(message.text.as_deref()) {
            Route::Start => self.telegram.send_message(chat_id, GREETING).await,
            Route::Help => self.telegram.send_message(chat_id, HELP).await,
            Route::Chat(text) => self.chat(chat_id, text).await,
            Route::Ignore => {
                debug!("Ignoring message {} in chat {}", message.message_id, chat_id);
                Ok(())
            }
        };

        if let Err(e) = result {
            error!("Failed to handle message in chat {}: {}", chat_id, e);
        }
    }

    async fn chat(&self, chat_id: i64, text: String) -> Result<()> {
        if let Err(e) = self.telegram.send_chat_action(chat_id, "typing").await {
            warn!("Failed to send typing action to chat {}: {}", chat_id, e);
        }

        match self.queue.submit(text).await {
            Ok(reply) if reply.is_empty() => {
                warn!("Model returned an empty reply for chat {}", chat_id);
                Ok(())
            }
            Ok(reply) => self.telegram.send_message(chat_id, &reply).await,
            Err(AppError::QueueFull) => {
                warn!("Inference queue full, rejecting message from chat {}", chat_id);
                self.telegram.send_message(chat_id, BUSY).await
            }
            Err(e) => Err(e),
        }
    }

    /// Long-polls for updates until `shutdown` turns true, handling every message
    /// in its own task.
    pub async fn run_polling(
        self: Arc<Self>,
        poll_timeout: Duration,
        mut shutdown: watch::Receiver<bool>,
    ) {
        let mut offset = 0;
        info!("Polling for updates");

        loop {
            let updates = tokio::select! {
                updates = self.telegram.get_updates(offset, poll_timeout) => updates,
                _ = shutdown.changed() => break,
            };

            let updates = match updates {
                Ok(updates) => updates,
                Err(e) => {
                    error!("Failed to fetch updates: {}", e);
                    tokio::time::sleep(POLL_RETRY_DELAY).await;
                    continue;
                }
            };

            for Update { update_id, message } in updates {
                offset = offset.max(update_id + 1);
                if let Some(message) = message {
                    let router = self.clone();
                    tokio::spawn(async move { router.dispatch(message).await });
                }
            }
        }

        info!("Polling stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{GenerationParams, TextGenerator};
    use crate::reply::ReplyGenerator;
    use crate::telegram::Chat;
    use async_trait::async_trait;
    use mockito::Matcher;
    use serde_json::json;

    #[test]
    fn test_route_commands() {
        assert_eq!(route(Some("/start")), Route::Start);
        assert_eq!(route(Some("/start@harvest_bot payload")), Route::Start);
        assert_eq!(route(Some("/help")), Route::Help);
        assert_eq!(route(Some("/help@harvest_bot")), Route::Help);
        assert_eq!(route(Some("/settings")), Route::Ignore);
        assert_eq!(route(Some("/")), Route::Ignore);
    }

    #[test]
    fn test_route_chat_text() {
        assert_eq!(
            route(Some("  Как дела?  \n")),
            Route::Chat("Как дела?".to_string())
        );
        assert_eq!(route(Some("   ")), Route::Ignore);
        assert_eq!(route(None), Route::Ignore);
    }

    struct CannedEngine;

    #[async_trait]
    impl TextGenerator for CannedEngine {
        async fn generate(&self, _prompt: &str, _params: &GenerationParams) -> Result<String> {
            Ok("Всё отлично!<|im_end|>".to_string())
        }
    }

    fn message(text: &str) -> Message {
        Message {
            message_id: 1,
            chat: Chat { id: 42 },
            text: Some(text.to_string()),
        }
    }

    fn sent_message_body(text: &str) -> String {
        json!({ "ok": true, "result": { "message_id": 2, "chat": { "id": 42 }, "text": text } })
            .to_string()
    }

    fn router(api_url: &str) -> MessageRouter {
        let params = GenerationParams {
            max_new_tokens: 16,
            temperature: 0.7,
            top_p: 0.95,
        };
        let generator = Arc::new(ReplyGenerator::new(Arc::new(CannedEngine), params, "sys"));
        let queue = InferenceQueue::start(generator, 4, 1, Duration::from_secs(5));
        let telegram = TelegramClient::new(api_url, "TOKEN").unwrap();
        MessageRouter::new(telegram, Arc::new(queue))
    }

    #[tokio::test]
    async fn test_dispatch_start_sends_greeting() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/botTOKEN/sendMessage")
            .match_body(Matcher::Json(json!({ "chat_id": 42, "text": GREETING })))
            .with_status(200)
            .with_body(sent_message_body(GREETING))
            .create_async()
            .await;

        router(&server.url()).dispatch(message("/start")).await;

        mock.assert_async().await;
    }

    /// Chat text shows a typing indicator, then the cleaned model reply.
    #[tokio::test]
    async fn test_dispatch_chat_relays_reply() {
        let mut server = mockito::Server::new_async().await;
        let typing = server
            .mock("POST", "/botTOKEN/sendChatAction")
            .match_body(Matcher::Json(json!({ "chat_id": 42, "action": "typing" })))
            .with_status(200)
            .with_body(r#"{"ok":true,"result":true}"#)
            .create_async()
            .await;
        let reply = server
            .mock("POST", "/botTOKEN/sendMessage")
            .match_body(Matcher::Json(json!({ "chat_id": 42, "text": "Всё отлично!" })))
            .with_status(200)
            .with_body(sent_message_body("Всё отлично!"))
            .create_async()
            .await;

        router(&server.url()).dispatch(message("Как дела?")).await;

        typing.assert_async().await;
        reply.assert_async().await;
    }

    #[tokio::test]
    async fn test_dispatch_ignores_unknown_command() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", Matcher::Any)
            .expect(0)
            .create_async()
            .await;

        router(&server.url()).dispatch(message("/unknown")).await;

        mock.assert_async().await;
    }
}
