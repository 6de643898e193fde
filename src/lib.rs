use std::time::Duration;
use thiserror::Error;

pub mod config;
pub mod dataset;
pub mod extractor;
pub mod fetcher;
pub mod harvest;
pub mod llm;
pub mod prompt;
pub mod reply;
pub mod router;
pub mod search;
pub mod slug;
pub mod telegram;
pub mod types;
pub mod user_agent;

// Re-export commonly used types
pub use crate::config::{BotSettings, HarvestConfig};
pub use crate::types::{Field, ResumeRecord};

/// The `AppError` enum represents the errors that can occur in the harvester and the reply bot.
#[derive(Error, Debug)]
pub enum AppError {
    /// Represents an error that occurs during an HTTP request.
    #[error("HTTP request failed: {0}")]
    RequestError(#[from] reqwest::Error),
    /// Represents an error that occurs while reading or building a document.
    #[error("Content extraction failed: {0}")]
    ExtractionError(String),
    /// Represents a filesystem error while writing a dataset.
    #[error("I/O failed: {0}")]
    Io(#[from] std::io::Error),
    /// Represents a CSV serialization error.
    #[error("CSV write failed: {0}")]
    Csv(#[from] csv::Error),
    /// Represents an invalid or incomplete configuration.
    #[error("Configuration error: {0}")]
    Config(#[from] ::config::ConfigError),
    /// Represents an error that occurs during LLM processing.
    #[error("LLM processing failed: {0}")]
    LLMError(String),
    /// Represents an error reported by the Telegram Bot API.
    #[error("Telegram API error: {0}")]
    TelegramError(String),
    /// The inference queue has no free slot.
    #[error("Inference queue is full")]
    QueueFull,
    /// The inference workers have shut down.
    #[error("Inference queue is closed")]
    QueueClosed,
    /// A generation did not finish in time.
    #[error("Generation timed out after {0:?}")]
    GenerationTimeout(Duration),
}

/// A type alias for `Result` with the `AppError` error type.
pub type Result<T> = std::result::Result<T, AppError>;

// Constants

/// The default timeout duration for HTTP requests.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
/// Placeholder written for any field missing from a résumé page.
pub const NOT_SPECIFIED: &str = "Не указано";
/// Maximum length, in characters, of a reply sent back to a chat.
pub const MAX_REPLY_CHARS: usize = 4000;
