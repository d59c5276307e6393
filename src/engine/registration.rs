//! Registration engine — validates and applies every conversational
//! transition: the multi-step create flow, the join flow with its decision
//! procedure, cancellation and the open-games listing.
//!
//! The engine reads and mutates games only through the store's atomic
//! operations; it never does read-then-write against pair lists itself.

use std::sync::Arc;

use tracing::warn;

use crate::error::{Error, RegistrationError};
use crate::publish::Publisher;
use crate::session::{Session, SessionStore};
use crate::store::model::{Game, NewGame, Pair, Placement};
use crate::store::traits::GameStore;
use crate::telegram::{BotApi, User};

use super::state::FlowState;

/// Listing shows at most this many open games.
pub const DEFAULT_LIST_LIMIT: usize = 20;

/// Cancel words accepted in any state.
const CANCEL_WORDS: &[&str] = &["/cancel", "отмена"];

/// A reply to the user. `show_menu` asks the dispatcher to follow up with
/// the main menu.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub text: String,
    pub show_menu: bool,
}

impl Reply {
    fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            show_menu: false,
        }
    }

    fn with_menu(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            show_menu: true,
        }
    }
}

/// Core state machine for game creation and joining.
pub struct RegistrationEngine {
    store: Arc<dyn GameStore>,
    sessions: SessionStore,
    publisher: Arc<Publisher>,
    api: Arc<dyn BotApi>,
}

impl RegistrationEngine {
    pub fn new(
        store: Arc<dyn GameStore>,
        sessions: SessionStore,
        publisher: Arc<Publisher>,
        api: Arc<dyn BotApi>,
    ) -> Self {
        Self {
            store,
            sessions,
            publisher,
            api,
        }
    }

    /// `/start` — reset the session and show the main menu.
    pub async fn start(&self, user: &User) -> Reply {
        self.sessions.reset(user.id).await;
        Reply::with_menu("🏸 Match maker\n\nPick an action:")
    }

    /// `CREATE` action — begin the creation flow.
    pub async fn begin_create(&self, user: &User) -> Reply {
        let mut session = Session::default();
        session.state = FlowState::AwaitLocation;
        self.sessions.put(user.id, session).await;
        Reply::text("Enter the location (e.g. Court A):")
    }

    /// `JOIN:<gameId>` action — begin the join flow, subject to the
    /// existence and closed guards. A failed guard never enters the
    /// await state.
    pub async fn begin_join(&self, user: &User, game_id: i64) -> Reply {
        match self.store.load(game_id).await {
            Ok(None) => Reply::text("Game not found."),
            Ok(Some(game)) if game.is_closed => Reply::text("⛔ Registration is closed."),
            Ok(Some(_)) => {
                let mut session = Session::default();
                session.state = FlowState::AwaitSecondPlayer { game_id };
                self.sessions.put(user.id, session).await;
                Reply::text("Enter the first and last name of your pair's second player:")
            }
            Err(e) => {
                warn!(game_id, error = %e, "Failed to load game for join");
                Reply::text("Something went wrong. Try again later.")
            }
        }
    }

    /// `LIST` action — up to 20 most-recent open games.
    pub async fn open_games(&self) -> Result<Vec<Game>, Error> {
        Ok(self.store.list_open(DEFAULT_LIST_LIMIT).await?)
    }

    /// `/close <gameId>` — organizer-only explicit close.
    pub async fn close_game(&self, user: &User, game_id: i64) -> Reply {
        let game = match self.store.load(game_id).await {
            Ok(Some(game)) => game,
            Ok(None) => return Reply::text("Game not found."),
            Err(e) => {
                warn!(game_id, error = %e, "Failed to load game for close");
                return Reply::text("Something went wrong. Try again later.");
            }
        };

        if game.organizer1_user_id != user.id {
            return Reply::text("Only the organizer can close this game.");
        }

        if let Err(e) = self.store.set_closed(game_id, true).await {
            warn!(game_id, error = %e, "Failed to close game");
            return Reply::text("Something went wrong. Try again later.");
        }
        self.republish(game_id).await;
        Reply::with_menu("Game closed. No new registrations will be accepted.")
    }

    /// Free-text input, interpreted according to the current session step.
    pub async fn handle_text(&self, user: &User, raw: &str) -> Reply {
        let text = crate::store::model::collapse_whitespace(raw);

        // Cancel is accepted in any state.
        if CANCEL_WORDS.iter().any(|w| text.eq_ignore_ascii_case(w)) {
            self.sessions.reset(user.id).await;
            return Reply::text("Cancelled. /start to begin again.");
        }

        let mut session = self.sessions.get(user.id).await;
        match session.state {
            FlowState::Idle => {
                Reply::text("Nothing in progress right now.\nPress /start to pick an action.")
            }

            FlowState::AwaitLocation => {
                if text.is_empty() {
                    return Reply::text("The location must not be empty. Enter it again:");
                }
                session.form.location = Some(text);
                session.state = FlowState::AwaitDate;
                self.sessions.put(user.id, session).await;
                Reply::text("Enter the date (e.g. 25.02.2026):")
            }

            FlowState::AwaitDate => {
                if text.is_empty() {
                    return Reply::text("The date must not be empty. Enter it again:");
                }
                session.form.date = Some(text);
                session.state = FlowState::AwaitTime;
                self.sessions.put(user.id, session).await;
                Reply::text("Enter the time (e.g. 19:00):")
            }

            FlowState::AwaitTime => {
                if text.is_empty() {
                    return Reply::text("The time must not be empty. Enter it again:");
                }
                session.form.time = Some(text);
                session.state = FlowState::AwaitOrg2Name;
                self.sessions.put(user.id, session).await;
                Reply::text("Enter the first and last name of the second organizer (your partner):")
            }

            FlowState::AwaitOrg2Name => {
                if text.is_empty() {
                    return Reply::text("The name must not be empty. Enter it again:");
                }
                self.finish_create(user, session, text).await
            }

            FlowState::AwaitSecondPlayer { game_id } => {
                if text.is_empty() {
                    return Reply::text("The name must not be empty. Enter it again:");
                }
                self.finish_join(user, game_id, text).await
            }
        }
    }

    /// Completion of the create flow: insert, publish, reset.
    async fn finish_create(&self, user: &User, session: Session, organizer2: String) -> Reply {
        let new_game = NewGame {
            location: session.form.location.clone().unwrap_or_default(),
            date: session.form.date.clone().unwrap_or_default(),
            time: session.form.time.clone().unwrap_or_default(),
            organizer1_name: user.display_name(),
            organizer1_user_id: user.id,
            organizer1_username: user.username.clone(),
            organizer2_name: organizer2,
        };

        // Flow termination either way: partial form data is discarded
        // rather than risking a stale second attempt.
        self.sessions.reset(user.id).await;

        match self.store.create(new_game).await {
            Ok(game_id) => {
                self.republish(game_id).await;
                Reply::with_menu("Game created ✅\nThe announcement was published to the channel.")
            }
            Err(e) => {
                warn!(error = %e, "Game creation failed");
                Reply::with_menu("Could not create the game. Try again later.")
            }
        }
    }

    /// Completion of the join flow: the join decision procedure.
    async fn finish_join(&self, user: &User, game_id: i64, second_player: String) -> Reply {
        let pair = Pair::new(&user.display_name(), &second_player);

        // The decision itself runs atomically inside the store; every
        // outcome terminates the flow.
        self.sessions.reset(user.id).await;

        match self.store.register_pair(game_id, &pair).await {
            Ok(placement) => {
                self.republish(game_id).await;
                self.notify_organizer(game_id, &pair, placement).await;
                match placement {
                    Placement::Confirmed => Reply::with_menu(
                        "Registered ✅\nTo withdraw, message the organizer.",
                    ),
                    Placement::Waiting => Reply::with_menu(
                        "Added to the waiting list ✅\nThe organizer will contact you when a slot frees up.",
                    ),
                }
            }
            Err(e) => Reply::with_menu(rejection_reply(&e)),
        }
    }

    /// Reconcile the channel post. Announcement failures never roll back
    /// or block a successful registration.
    async fn republish(&self, game_id: i64) {
        if let Err(e) = self.publisher.publish(game_id).await {
            warn!(game_id, error = %e, "Announcement publish failed");
        }
    }

    /// Fire-and-forget organizer notification after a successful join.
    /// Its failure must not affect the registration's reported outcome.
    async fn notify_organizer(&self, game_id: i64, pair: &Pair, placement: Placement) {
        let game = match self.store.load(game_id).await {
            Ok(Some(game)) => game,
            _ => return,
        };

        let status = match placement {
            Placement::Confirmed => "confirmed",
            Placement::Waiting => "waiting list",
        };
        let text = format!(
            "New registration for your game at {} on {} {}: {} ({status}).",
            game.location,
            game.date,
            game.time,
            pair.label()
        );
        let api = Arc::clone(&self.api);
        let chat_id = game.organizer1_user_id.to_string();
        tokio::spawn(async move {
            if let Err(e) = api.send_message(&chat_id, &text, None).await {
                warn!(error = %e, "Organizer notification failed");
            }
        });
    }
}

/// Map a registration rejection to its user-facing reply.
fn rejection_reply(err: &RegistrationError) -> String {
    match err {
        RegistrationError::NotFound { .. } => "Game not found. /start".into(),
        RegistrationError::Closed { .. } => "⛔ Registration is closed.".into(),
        RegistrationError::DuplicateParticipant { .. } => {
            "One of the players is already registered for this game.".into()
        }
        RegistrationError::DuplicatePair { .. } => "This pair is already registered.".into(),
        // Capacity never reaches the user: overflow goes to the waiting list.
        RegistrationError::Capacity { .. }
        | RegistrationError::EmptyField { .. }
        | RegistrationError::UnknownPair { .. }
        | RegistrationError::Database(_) => "Something went wrong. Try again later.".into(),
    }
}

// ── Tests ───────────────────────────────────────────────────────────
