//! Error types for matchbot.

/// Top-level error type for the bot.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Registration error: {0}")]
    Registration(#[from] RegistrationError),

    #[error("Telegram error: {0}")]
    Telegram(#[from] TelegramError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {key}. {hint}")]
    MissingRequired { key: String, hint: String },

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Database-related errors.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Errors raised while accepting, rejecting or queuing registrations.
///
/// Everything except `Database` maps to a specific user-facing rejection
/// reason; `Database` surfaces as a generic failure reply.
#[derive(Debug, thiserror::Error)]
pub enum RegistrationError {
    #[error("Required field must not be empty: {field}")]
    EmptyField { field: &'static str },

    #[error("Game {game_id} not found")]
    NotFound { game_id: i64 },

    #[error("Game {game_id} is closed for registration")]
    Closed { game_id: i64 },

    #[error("Participant {name} is already registered for this game")]
    DuplicateParticipant { name: String },

    #[error("Pair {pair} is already registered for this game")]
    DuplicatePair { pair: String },

    #[error("Pair {pair} is not registered for this game")]
    UnknownPair { pair: String },

    #[error("Game {game_id} has no free confirmed slot")]
    Capacity { game_id: i64 },

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

/// Telegram Bot API errors.
#[derive(Debug, thiserror::Error)]
pub enum TelegramError {
    #[error("sendMessage failed: {reason}")]
    SendFailed { reason: String },

    #[error("editMessageText failed for message {message_id}: {reason}")]
    EditFailed { message_id: i64, reason: String },

    #[error("Bot API request failed: {0}")]
    Http(String),

    #[error("Unexpected Bot API response: {0}")]
    InvalidResponse(String),
}

/// Result type alias for the bot.
pub type Result<T> = std::result::Result<T, Error>;
