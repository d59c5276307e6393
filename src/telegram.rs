//! Telegram Bot API client.
//!
//! Thin reqwest wrapper over the HTTP Bot API plus a getUpdates long-poll
//! loop that feeds updates into an mpsc pipe. The [`BotApi`] trait is the
//! seam the publisher, engine and dispatcher talk through, so tests can
//! substitute a recording implementation.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::UnboundedSender;

use crate::error::TelegramError;
use crate::store::model::Game;

// ── Wire types ──────────────────────────────────────────────────────

/// One update from getUpdates or the webhook route.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<Message>,
    #[serde(default)]
    pub callback_query: Option<CallbackQuery>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub chat: Chat,
    #[serde(default)]
    pub from: Option<User>,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: i64,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
}

impl User {
    /// Full display name, falling back to the username or a placeholder.
    pub fn display_name(&self) -> String {
        let first = self.first_name.as_deref().unwrap_or("").trim();
        let last = self.last_name.as_deref().unwrap_or("").trim();
        let full = if last.is_empty() {
            first.to_string()
        } else {
            format!("{first} {last}")
        };
        if !full.trim().is_empty() {
            return full.trim().to_string();
        }
        self.username.clone().unwrap_or_else(|| "Player".to_string())
    }
}

/// A button press on an inline keyboard.
#[derive(Debug, Clone, Deserialize)]
pub struct CallbackQuery {
    pub id: String,
    pub from: User,
    #[serde(default)]
    pub message: Option<Message>,
    #[serde(default)]
    pub data: Option<String>,
}

/// Inline keyboard attached to a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InlineKeyboardMarkup {
    pub inline_keyboard: Vec<Vec<InlineKeyboardButton>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InlineKeyboardButton {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub callback_data: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl InlineKeyboardButton {
    pub fn callback(text: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            callback_data: Some(data.into()),
            url: None,
        }
    }

    pub fn link(text: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            callback_data: None,
            url: Some(url.into()),
        }
    }
}

// ── Keyboard builders ───────────────────────────────────────────────

/// The two top-level actions shown on `/start`.
pub fn main_menu_keyboard() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup {
        inline_keyboard: vec![
            vec![InlineKeyboardButton::callback("➕ Create game", "create")],
            vec![InlineKeyboardButton::callback("📋 List games", "list")],
        ],
    }
}

/// Join control plus an organizer-contact link for an announcement.
pub fn game_keyboard(game: &Game) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup {
        inline_keyboard: vec![
            vec![InlineKeyboardButton::callback(
                "✅ Join as a pair",
                format!("join:{}", game.id),
            )],
            vec![InlineKeyboardButton::link(
                "✉️ Message the organizer",
                organizer_contact_url(game.organizer1_user_id, game.organizer1_username.as_deref()),
            )],
        ],
    }
}

/// Contact URL for the organizer: public handle if present, else a deep
/// link by numeric user id.
pub fn organizer_contact_url(user_id: i64, username: Option<&str>) -> String {
    let handle = username.unwrap_or("").trim_start_matches('@').trim();
    if handle.is_empty() {
        format!("tg://user?id={user_id}")
    } else {
        format!("https://t.me/{handle}")
    }
}

// ── BotApi trait ────────────────────────────────────────────────────

/// Outbound Bot API surface used by the publisher, engine and dispatcher.
#[async_trait]
pub trait BotApi: Send + Sync {
    /// Send a message; returns the new message id.
    async fn send_message(
        &self,
        chat_id: &str,
        text: &str,
        keyboard: Option<&InlineKeyboardMarkup>,
    ) -> Result<i64, TelegramError>;

    /// Edit an existing message in place.
    async fn edit_message_text(
        &self,
        chat_id: &str,
        message_id: i64,
        text: &str,
        keyboard: Option<&InlineKeyboardMarkup>,
    ) -> Result<(), TelegramError>;

    /// Acknowledge a callback query so the client stops its spinner.
    async fn answer_callback_query(&self, callback_id: &str) -> Result<(), TelegramError>;

    /// Register the webhook URL for update delivery.
    async fn set_webhook(&self, url: &str) -> Result<(), TelegramError>;

    /// Remove any registered webhook (required before long-polling).
    async fn delete_webhook(&self) -> Result<(), TelegramError>;
}

// ── HTTP client ─────────────────────────────────────────────────────

/// reqwest-backed Bot API client.
pub struct TelegramApi {
    bot_token: SecretString,
    client: reqwest::Client,
}

impl TelegramApi {
    pub fn new(bot_token: SecretString) -> Self {
        Self {
            bot_token,
            client: reqwest::Client::new(),
        }
    }

    fn api_url(&self, method: &str) -> String {
        format!(
            "https://api.telegram.org/bot{}/{method}",
            self.bot_token.expose_secret()
        )
    }

    /// POST a JSON body and return the `result` field.
    async fn call(
        &self,
        method: &str,
        body: serde_json::Value,
    ) -> Result<serde_json::Value, TelegramError> {
        let resp = self
            .client
            .post(self.api_url(method))
            .json(&body)
            .send()
            .await
            .map_err(|e| TelegramError::Http(e.to_string()))?;

        let status = resp.status();
        let data: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| TelegramError::InvalidResponse(e.to_string()))?;

        if !status.is_success() || data.get("ok").and_then(serde_json::Value::as_bool) != Some(true)
        {
            let description = data
                .get("description")
                .and_then(serde_json::Value::as_str)
                .unwrap_or("no description");
            return Err(TelegramError::InvalidResponse(format!(
                "{method} returned {status}: {description}"
            )));
        }

        Ok(data.get("result").cloned().unwrap_or(serde_json::Value::Null))
    }
}

#[async_trait]
impl BotApi for TelegramApi {
    async fn send_message(
        &self,
        chat_id: &str,
        text: &str,
        keyboard: Option<&InlineKeyboardMarkup>,
    ) -> Result<i64, TelegramError> {
        let mut body = serde_json::json!({
            "chat_id": chat_id,
            "text": text,
        });
        if let Some(kb) = keyboard {
            body["reply_markup"] = serde_json::to_value(kb)
                .map_err(|e| TelegramError::SendFailed { reason: e.to_string() })?;
        }

        let result = self
            .call("sendMessage", body)
            .await
            .map_err(|e| TelegramError::SendFailed { reason: e.to_string() })?;

        result
            .get("message_id")
            .and_then(serde_json::Value::as_i64)
            .ok_or_else(|| TelegramError::InvalidResponse("sendMessage: no message_id".into()))
    }

    async fn edit_message_text(
        &self,
        chat_id: &str,
        message_id: i64,
        text: &str,
        keyboard: Option<&InlineKeyboardMarkup>,
    ) -> Result<(), TelegramError> {
        let mut body = serde_json::json!({
            "chat_id": chat_id,
            "message_id": message_id,
            "text": text,
        });
        if let Some(kb) = keyboard {
            body["reply_markup"] = serde_json::to_value(kb).map_err(|e| {
                TelegramError::EditFailed {
                    message_id,
                    reason: e.to_string(),
                }
            })?;
        }

        self.call("editMessageText", body)
            .await
            .map_err(|e| TelegramError::EditFailed {
                message_id,
                reason: e.to_string(),
            })?;
        Ok(())
    }

    async fn answer_callback_query(&self, callback_id: &str) -> Result<(), TelegramError> {
        self.call(
            "answerCallbackQuery",
            serde_json::json!({ "callback_query_id": callback_id }),
        )
        .await?;
        Ok(())
    }

    async fn set_webhook(&self, url: &str) -> Result<(), TelegramError> {
        self.call("setWebhook", serde_json::json!({ "url": url }))
            .await?;
        Ok(())
    }

    async fn delete_webhook(&self) -> Result<(), TelegramError> {
        self.call("deleteWebhook", serde_json::json!({})).await?;
        Ok(())
    }
}

// ── Long-poll loop ──────────────────────────────────────────────────

/// Spawn the getUpdates long-poll loop, feeding updates into `tx`.
///
/// Used when no public base URL is configured; the webhook route feeds the
/// same pipe otherwise.
pub fn spawn_polling(
    bot_token: SecretString,
    tx: UnboundedSender<Update>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let client = reqwest::Client::new();
        let mut offset: i64 = 0;

        tracing::info!("Telegram long-polling for updates");

        loop {
            let url = format!(
                "https://api.telegram.org/bot{}/getUpdates",
                bot_token.expose_secret()
            );
            let body = serde_json::json!({
                "offset": offset,
                "timeout": 30,
                "allowed_updates": ["message", "callback_query"],
            });

            let resp = match client.post(&url).json(&body).send().await {
                Ok(r) => r,
                Err(e) => {
                    tracing::warn!("Telegram poll error: {e}");
                    tokio::time::sleep(std::time::Duration::from_secs(5)).await;
                    continue;
                }
            };

            let data: serde_json::Value = match resp.json().await {
                Ok(d) => d,
                Err(e) => {
                    tracing::warn!("Telegram parse error: {e}");
                    tokio::time::sleep(std::time::Duration::from_secs(5)).await;
                    continue;
                }
            };

            let Some(results) = data.get("result").and_then(serde_json::Value::as_array) else {
                continue;
            };

            for raw in results {
                if let Some(uid) = raw.get("update_id").and_then(serde_json::Value::as_i64) {
                    offset = uid + 1;
                }
                match serde_json::from_value::<Update>(raw.clone()) {
                    Ok(update) => {
                        if tx.send(update).is_err() {
                            tracing::info!("Update pipe closed, stopping poller");
                            return;
                        }
                    }
                    Err(e) => tracing::warn!("Skipping malformed update: {e}"),
                }
            }
        }
    })
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::model::Pair;

    fn sample_game() -> Game {
        Game {
            id: 42,
            location: "Court A".into(),
            date: "01.01.2026".into(),
            time: "18:00".into(),
            organizer1_name: "Ann Lee".into(),
            organizer1_user_id: 100,
            organizer1_username: Some("annlee".into()),
            organizer2_name: "Bob Kim".into(),
            pairs: vec![Pair::new("Ann Lee", "Bob Kim")],
            waiting_list: vec![],
            is_closed: false,
            channel_message_id: None,
        }
    }

    #[test]
    fn api_url_embeds_token_and_method() {
        let api = TelegramApi::new(SecretString::from("123:ABC".to_string()));
        assert_eq!(
            api.api_url("getMe"),
            "https://api.telegram.org/bot123:ABC/getMe"
        );
    }

    #[test]
    fn contact_url_prefers_username() {
        assert_eq!(
            organizer_contact_url(100, Some("annlee")),
            "https://t.me/annlee"
        );
        assert_eq!(
            organizer_contact_url(100, Some("@annlee")),
            "https://t.me/annlee"
        );
    }

    #[test]
    fn contact_url_falls_back_to_deep_link() {
        assert_eq!(organizer_contact_url(100, None), "tg://user?id=100");
        assert_eq!(organizer_contact_url(100, Some("  ")), "tg://user?id=100");
    }

    #[test]
    fn game_keyboard_has_join_and_contact() {
        let kb = game_keyboard(&sample_game());
        assert_eq!(kb.inline_keyboard.len(), 2);
        assert_eq!(
            kb.inline_keyboard[0][0].callback_data.as_deref(),
            Some("join:42")
        );
        assert_eq!(
            kb.inline_keyboard[1][0].url.as_deref(),
            Some("https://t.me/annlee")
        );
    }

    #[test]
    fn keyboard_serializes_without_null_fields() {
        let kb = main_menu_keyboard();
        let json = serde_json::to_value(&kb).unwrap();
        let button = &json["inline_keyboard"][0][0];
        assert_eq!(button["callback_data"], "create");
        assert!(button.get("url").is_none());
    }

    #[test]
    fn display_name_combines_first_and_last() {
        let user = User {
            id: 1,
            first_name: Some("Ann".into()),
            last_name: Some("Lee".into()),
            username: None,
        };
        assert_eq!(user.display_name(), "Ann Lee");
    }

    #[test]
    fn display_name_falls_back() {
        let user = User {
            id: 1,
            first_name: None,
            last_name: None,
            username: Some("annlee".into()),
        };
        assert_eq!(user.display_name(), "annlee");

        let anon = User {
            id: 1,
            first_name: Some("  ".into()),
            last_name: None,
            username: None,
        };
        assert_eq!(anon.display_name(), "Player");
    }

    #[test]
    fn update_parses_message_and_callback() {
        let raw = serde_json::json!({
            "update_id": 7,
            "message": {
                "message_id": 1,
                "chat": { "id": 55 },
                "from": { "id": 9, "first_name": "Ann" },
                "text": "/start"
            }
        });
        let update: Update = serde_json::from_value(raw).unwrap();
        let msg = update.message.unwrap();
        assert_eq!(msg.chat.id, 55);
        assert_eq!(msg.text.as_deref(), Some("/start"));

        let raw = serde_json::json!({
            "update_id": 8,
            "callback_query": {
                "id": "cb1",
                "from": { "id": 9 },
                "message": { "message_id": 2, "chat": { "id": 55 } },
                "data": "join:3"
            }
        });
        let update: Update = serde_json::from_value(raw).unwrap();
        let cb = update.callback_query.unwrap();
        assert_eq!(cb.data.as_deref(), Some("join:3"));
        assert_eq!(cb.message.unwrap().chat.id, 55);
    }
}
