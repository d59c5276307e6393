//! Announcement publisher — renders a game and syncs the channel post.
//!
//! Rendering is a pure function of game state, so republishing with no
//! intervening change produces byte-identical text. Synchronization edits
//! the recorded channel message in place; if the edit fails (message
//! deleted, edit window expired) it falls back to sending a fresh message
//! and re-recording its id. The fallback is best-effort and never raised.

use std::sync::Arc;

use crate::error::Result;
use crate::store::model::{Game, MAX_CONFIRMED_PAIRS};
use crate::store::traits::GameStore;
use crate::telegram::{BotApi, game_keyboard};

/// Deterministic announcement text for a game.
pub fn render_announcement(game: &Game) -> String {
    let mut slots: Vec<String> = game.pairs.iter().map(|p| p.label().to_string()).collect();
    while slots.len() < MAX_CONFIRMED_PAIRS {
        slots.push("—".to_string());
    }

    let waiting = if game.waiting_list.is_empty() {
        "-".to_string()
    } else {
        game.waiting_list
            .iter()
            .enumerate()
            .map(|(i, p)| format!("{}. {}", i + 1, p.label()))
            .collect::<Vec<_>>()
            .join("\n")
    };

    let closed_note = if game.is_closed {
        "\n⛔ Registration is closed.\n"
    } else {
        ""
    };

    format!(
        "🏸 {location}\n\
         📅 {date}\n\
         🕒 {time}\n\
         \n\
         👤 Organizers:\n\
         {org1} / {org2}\n\
         \n\
         Confirmed pairs:\n\
         1️⃣ {s1}\n\
         2️⃣ {s2}\n\
         3️⃣ {s3}\n\
         \n\
         Waiting list:\n\
         {waiting}\n\
         {closed_note}\n\
         ℹ️ To withdraw, message the organizer.",
        location = game.location,
        date = game.date,
        time = game.time,
        org1 = game.organizer1_name,
        org2 = game.organizer2_name,
        s1 = slots[0],
        s2 = slots[1],
        s3 = slots[2],
    )
}

/// Synchronizes the broadcast channel with game state.
pub struct Publisher {
    store: Arc<dyn GameStore>,
    api: Arc<dyn BotApi>,
    channel_id: String,
}

impl Publisher {
    pub fn new(store: Arc<dyn GameStore>, api: Arc<dyn BotApi>, channel_id: String) -> Self {
        Self {
            store,
            api,
            channel_id,
        }
    }

    /// Reconcile the channel post for a game with its current state.
    ///
    /// Called only after the corresponding repository mutation has
    /// committed; a stale announcement self-heals on the next publish, but
    /// the announcement never runs ahead of the data.
    pub async fn publish(&self, game_id: i64) -> Result<()> {
        let Some(game) = self.store.load(game_id).await? else {
            tracing::warn!(game_id, "Skipping publish: game no longer exists");
            return Ok(());
        };

        let text = render_announcement(&game);
        let keyboard = game_keyboard(&game);

        if let Some(message_id) = game.channel_message_id {
            match self
                .api
                .edit_message_text(&self.channel_id, message_id, &text, Some(&keyboard))
                .await
            {
                Ok(()) => return Ok(()),
                Err(e) => {
                    // Message may have been deleted or the edit window
                    // expired; resend instead.
                    tracing::warn!(game_id, message_id, error = %e, "Edit failed, falling back to send");
                }
            }
        }

        let message_id = self
            .api
            .send_message(&self.channel_id, &text, Some(&keyboard))
            .await?;
        self.store.record_channel_message(game_id, message_id).await?;
        Ok(())
    }
}
