//! `GameStore` trait — single async interface for game persistence.
//!
//! The store owns the capacity and promotion invariants: every mutation of
//! a game's pairs/waiting lists is atomic per game. Callers never do
//! read-then-write against these lists.

use async_trait::async_trait;

use crate::error::{DatabaseError, RegistrationError};
use crate::store::model::{Game, NewGame, Pair, Placement};

/// Backend-agnostic store for games.
#[async_trait]
pub trait GameStore: Send + Sync {
    /// Insert a new game with the organizer pair pre-seeded into the
    /// confirmed list, an empty waiting list and `is_closed = false`.
    /// Returns the new game id.
    ///
    /// Fails with [`RegistrationError::EmptyField`] if any required text
    /// field is empty.
    async fn create(&self, game: NewGame) -> Result<i64, RegistrationError>;

    /// Load a game by id.
    async fn load(&self, game_id: i64) -> Result<Option<Game>, DatabaseError>;

    /// Open (non-closed) games, most-recent-id-first, up to `limit`.
    async fn list_open(&self, limit: usize) -> Result<Vec<Game>, DatabaseError>;

    /// Atomically append to the confirmed list, only while it holds fewer
    /// than 3 pairs. At capacity this fails with
    /// [`RegistrationError::Capacity`] and the caller must queue the pair
    /// via [`GameStore::append_waiting`] instead.
    async fn append_confirmed_pair(&self, game_id: i64, pair: &Pair)
    -> Result<(), RegistrationError>;

    /// Atomically append to the waiting list.
    async fn append_waiting(&self, game_id: i64, pair: &Pair) -> Result<(), RegistrationError>;

    /// Apply the full join decision atomically: existence, closed flag,
    /// duplicate participant, duplicate pair, then confirmed-or-waiting
    /// placement. No interleaved mutation of the same game can observe a
    /// partial state.
    async fn register_pair(&self, game_id: i64, pair: &Pair)
    -> Result<Placement, RegistrationError>;

    /// Remove a confirmed pair. Within the same atomic mutation, if the
    /// confirmed list drops below 3 while the waiting list is non-empty,
    /// the waiting head is promoted into the confirmed list.
    async fn cancel_confirmed_pair(
        &self,
        game_id: i64,
        pair: &Pair,
    ) -> Result<(), RegistrationError>;

    /// Record the announcement message id for a game.
    async fn record_channel_message(
        &self,
        game_id: i64,
        message_id: i64,
    ) -> Result<(), DatabaseError>;

    /// Set the closed flag. Closed games accept no new join attempts.
    async fn set_closed(&self, game_id: i64, closed: bool) -> Result<(), RegistrationError>;
}
