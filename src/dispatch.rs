//! Conversational dispatcher — routes incoming updates to the engine.
//!
//! One task per update; events for different users interleave freely,
//! per-user sessions keep them apart, and the store serializes per-game
//! mutations.

use std::sync::Arc;

use tokio::sync::mpsc::UnboundedReceiver;
use tracing::warn;

use crate::engine::{Reply, RegistrationEngine};
use crate::publish::render_announcement;
use crate::telegram::{BotApi, CallbackQuery, Message, Update, game_keyboard, main_menu_keyboard};

/// Callback-data verbs understood by the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Create,
    List,
    Join(i64),
}

/// Parse callback data (`create`, `list`, `join:<gameId>`).
pub fn parse_action(data: &str) -> Option<Action> {
    match data {
        "create" => Some(Action::Create),
        "list" => Some(Action::List),
        _ => data
            .strip_prefix("join:")
            .and_then(|id| id.parse().ok())
            .map(Action::Join),
    }
}

/// Parse `/close <gameId>`.
fn parse_close_command(text: &str) -> Option<i64> {
    text.strip_prefix("/close")
        .map(str::trim)
        .and_then(|id| id.parse().ok())
}

/// Routes updates from the poller or webhook to the engine.
pub struct Dispatcher {
    engine: Arc<RegistrationEngine>,
    api: Arc<dyn BotApi>,
}

impl Dispatcher {
    pub fn new(engine: Arc<RegistrationEngine>, api: Arc<dyn BotApi>) -> Self {
        Self { engine, api }
    }

    /// Consume the update pipe until it closes.
    pub async fn run(self: Arc<Self>, mut rx: UnboundedReceiver<Update>) {
        while let Some(update) = rx.recv().await {
            let dispatcher = Arc::clone(&self);
            tokio::spawn(async move {
                dispatcher.handle_update(update).await;
            });
        }
    }

    /// Route a single update.
    pub async fn handle_update(&self, update: Update) {
        if let Some(callback) = update.callback_query {
            self.handle_callback(callback).await;
        } else if let Some(message) = update.message {
            self.handle_message(message).await;
        }
    }

    async fn handle_message(&self, message: Message) {
        let Some(user) = message.from else {
            return;
        };
        let Some(text) = message.text.as_deref() else {
            return;
        };
        let chat_id = message.chat.id.to_string();

        let reply = if text.trim().starts_with("/start") {
            self.engine.start(&user).await
        } else if let Some(game_id) = parse_close_command(text.trim()) {
            self.engine.close_game(&user, game_id).await
        } else {
            self.engine.handle_text(&user, text).await
        };

        self.send_reply(&chat_id, reply).await;
    }

    async fn handle_callback(&self, callback: CallbackQuery) {
        if let Err(e) = self.api.answer_callback_query(&callback.id).await {
            warn!(error = %e, "answerCallbackQuery failed");
        }

        // Reply in the chat the button lives in; fall back to a DM.
        let chat_id = callback
            .message
            .as_ref()
            .map(|m| m.chat.id)
            .unwrap_or(callback.from.id)
            .to_string();

        let Some(action) = callback.data.as_deref().and_then(parse_action) else {
            warn!(data = ?callback.data, "Unrecognized callback data");
            return;
        };

        match action {
            Action::Create => {
                let reply = self.engine.begin_create(&callback.from).await;
                self.send_reply(&chat_id, reply).await;
            }
            Action::Join(game_id) => {
                let reply = self.engine.begin_join(&callback.from, game_id).await;
                self.send_reply(&chat_id, reply).await;
            }
            Action::List => self.send_game_list(&chat_id).await,
        }
    }

    /// Render each open game with its join control.
    async fn send_game_list(&self, chat_id: &str) {
        let games = match self.engine.open_games().await {
            Ok(games) => games,
            Err(e) => {
                warn!(error = %e, "Failed to list open games");
                self.send_text(chat_id, "Something went wrong. Try again later.")
                    .await;
                return;
            }
        };

        if games.is_empty() {
            self.send_text(chat_id, "No active games.").await;
            return;
        }

        for game in &games {
            let text = render_announcement(game);
            let keyboard = game_keyboard(game);
            if let Err(e) = self.api.send_message(chat_id, &text, Some(&keyboard)).await {
                warn!(game_id = game.id, error = %e, "Failed to send game listing");
            }
        }
    }

    async fn send_reply(&self, chat_id: &str, reply: Reply) {
        self.send_text(chat_id, &reply.text).await;
        if reply.show_menu {
            if let Err(e) = self
                .api
                .send_message(chat_id, "Pick an action:", Some(&main_menu_keyboard()))
                .await
            {
                warn!(error = %e, "Failed to send main menu");
            }
        }
    }

    async fn send_text(&self, chat_id: &str, text: &str) {
        if let Err(e) = self.api.send_message(chat_id, text, None).await {
            warn!(error = %e, "Failed to send reply");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_actions() {
        assert_eq!(parse_action("create"), Some(Action::Create));
        assert_eq!(parse_action("list"), Some(Action::List));
        assert_eq!(parse_action("join:42"), Some(Action::Join(42)));
    }

    #[test]
    fn rejects_malformed_actions() {
        assert_eq!(parse_action("join:"), None);
        assert_eq!(parse_action("join:abc"), None);
        assert_eq!(parse_action("delete:1"), None);
        assert_eq!(parse_action(""), None);
    }

    #[test]
    fn parses_close_command() {
        assert_eq!(parse_close_command("/close 7"), Some(7));
        assert_eq!(parse_close_command("/close   12"), Some(12));
        assert_eq!(parse_close_command("/close"), None);
        assert_eq!(parse_close_command("/closet 5"), None);
        assert_eq!(parse_close_command("close 5"), None);
    }
}
