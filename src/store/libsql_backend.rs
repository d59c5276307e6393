//! libSQL backend — async `GameStore` implementation.
//!
//! Pair lists are stored as JSON text arrays. Every read-modify-write of a
//! game's lists runs under a single writer lock, so two concurrent join
//! attempts can never both observe a free slot and overfill the confirmed
//! list. Capacity is additionally guarded DB-side with a conditional
//! `json_array_length` check.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use libsql::{Connection, Database as LibSqlDatabase, params};
use tokio::sync::Mutex;
use tracing::info;

use crate::error::{DatabaseError, RegistrationError};
use crate::store::migrations;
use crate::store::model::{Game, MAX_CONFIRMED_PAIRS, NewGame, Pair, Placement, normalize_name};
use crate::store::traits::GameStore;

/// libSQL game store.
pub struct LibSqlBackend {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
    /// Serializes mutations of pairs/waiting lists across all games.
    /// A per-game lock map would also satisfy the contract; a single
    /// writer is sufficient at this write volume.
    write_lock: Mutex<()>,
}

impl LibSqlBackend {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Connection(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Connection(format!("Failed to open database: {e}")))?;

        let backend = Self::from_db(db).await?;
        info!(path = %path.display(), "Database opened");
        Ok(backend)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Connection(format!("Failed to create in-memory database: {e}"))
            })?;
        Self::from_db(db).await
    }

    async fn from_db(db: LibSqlDatabase) -> Result<Self, DatabaseError> {
        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Connection(format!("Failed to create connection: {e}")))?;

        migrations::run_migrations(&conn).await?;

        Ok(Self {
            db: Arc::new(db),
            conn,
            write_lock: Mutex::new(()),
        })
    }

    fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Load a game without taking the writer lock. Mutating paths call
    /// this while already holding the lock.
    async fn load_inner(&self, game_id: i64) -> Result<Option<Game>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!("SELECT {GAME_COLUMNS} FROM games WHERE id = ?1"),
                params![game_id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("Failed to load game {game_id}: {e}")))?;

        let row = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("Failed to read game {game_id}: {e}")))?;

        match row {
            Some(row) => Ok(Some(row_to_game(&row)?)),
            None => Ok(None),
        }
    }

    /// Write both lists back in one UPDATE.
    async fn store_lists(
        &self,
        game_id: i64,
        pairs: &[Pair],
        waiting: &[Pair],
    ) -> Result<(), DatabaseError> {
        self.conn()
            .execute(
                "UPDATE games SET pairs = ?1, waiting_list = ?2 WHERE id = ?3",
                params![pairs_to_json(pairs)?, pairs_to_json(waiting)?, game_id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("Failed to update game {game_id}: {e}")))?;
        Ok(())
    }
}

// ── Helper functions ────────────────────────────────────────────────

const GAME_COLUMNS: &str = "id, location, date, time, organizer1_name, organizer1_user_id, \
     organizer1_username, organizer2_name, pairs, waiting_list, is_closed, channel_message_id";

/// Map a libsql Row to a Game. Column order matches GAME_COLUMNS.
fn row_to_game(row: &libsql::Row) -> Result<Game, DatabaseError> {
    let map_err = |e: libsql::Error| DatabaseError::Query(format!("Failed to read column: {e}"));

    let pairs_json: String = row.get(8).map_err(map_err)?;
    let waiting_json: String = row.get(9).map_err(map_err)?;
    let is_closed: i64 = row.get(10).map_err(map_err)?;

    Ok(Game {
        id: row.get(0).map_err(map_err)?,
        location: row.get(1).map_err(map_err)?,
        date: row.get(2).map_err(map_err)?,
        time: row.get(3).map_err(map_err)?,
        organizer1_name: row.get(4).map_err(map_err)?,
        organizer1_user_id: row.get(5).map_err(map_err)?,
        organizer1_username: row.get(6).ok(),
        organizer2_name: row.get(7).map_err(map_err)?,
        pairs: pairs_from_json(&pairs_json)?,
        waiting_list: pairs_from_json(&waiting_json)?,
        is_closed: is_closed != 0,
        channel_message_id: row.get(11).ok(),
    })
}

fn pairs_from_json(json: &str) -> Result<Vec<Pair>, DatabaseError> {
    serde_json::from_str(json)
        .map_err(|e| DatabaseError::Serialization(format!("Invalid pair list '{json}': {e}")))
}

fn pairs_to_json(pairs: &[Pair]) -> Result<String, DatabaseError> {
    serde_json::to_string(pairs)
        .map_err(|e| DatabaseError::Serialization(format!("Failed to encode pair list: {e}")))
}

/// Convert `Option<&str>` to a libsql Value.
fn opt_text(s: Option<&str>) -> libsql::Value {
    match s {
        Some(s) => libsql::Value::Text(s.to_string()),
        None => libsql::Value::Null,
    }
}

// ── Trait implementation ────────────────────────────────────────────

#[async_trait]
impl GameStore for LibSqlBackend {
    async fn create(&self, game: NewGame) -> Result<i64, RegistrationError> {
        for (field, value) in [
            ("location", &game.location),
            ("date", &game.date),
            ("time", &game.time),
            ("organizer1_name", &game.organizer1_name),
            ("organizer2_name", &game.organizer2_name),
        ] {
            if value.trim().is_empty() {
                return Err(RegistrationError::EmptyField { field });
            }
        }

        let pairs = vec![game.organizer_pair()];

        self.conn()
            .execute(
                "INSERT INTO games
                    (location, date, time, organizer1_name, organizer1_user_id,
                     organizer1_username, organizer2_name, pairs, waiting_list, is_closed)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, '[]', 0)",
                params![
                    game.location.clone(),
                    game.date.clone(),
                    game.time.clone(),
                    game.organizer1_name.clone(),
                    game.organizer1_user_id,
                    opt_text(game.organizer1_username.as_deref()),
                    game.organizer2_name.clone(),
                    pairs_to_json(&pairs)?,
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("Failed to insert game: {e}")))?;

        Ok(self.conn().last_insert_rowid())
    }

    async fn load(&self, game_id: i64) -> Result<Option<Game>, DatabaseError> {
        self.load_inner(game_id).await
    }

    async fn list_open(&self, limit: usize) -> Result<Vec<Game>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!(
                    "SELECT {GAME_COLUMNS} FROM games WHERE is_closed = 0
                     ORDER BY id DESC LIMIT ?1"
                ),
                params![limit as i64],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("Failed to list games: {e}")))?;

        let mut games = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("Failed to read game row: {e}")))?
        {
            games.push(row_to_game(&row)?);
        }
        Ok(games)
    }

    async fn append_confirmed_pair(
        &self,
        game_id: i64,
        pair: &Pair,
    ) -> Result<(), RegistrationError> {
        let _guard = self.write_lock.lock().await;

        let changed = self
            .conn()
            .execute(
                "UPDATE games SET pairs = json_insert(pairs, '$[#]', ?1)
                 WHERE id = ?2 AND json_array_length(pairs) < ?3",
                params![pair.label(), game_id, MAX_CONFIRMED_PAIRS as i64],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("Failed to append pair: {e}")))?;

        if changed > 0 {
            return Ok(());
        }
        // Nothing updated: either the game is gone or the list is at cap.
        match self.load_inner(game_id).await? {
            None => Err(RegistrationError::NotFound { game_id }),
            Some(_) => Err(RegistrationError::Capacity { game_id }),
        }
    }

    async fn append_waiting(&self, game_id: i64, pair: &Pair) -> Result<(), RegistrationError> {
        let _guard = self.write_lock.lock().await;

        let changed = self
            .conn()
            .execute(
                "UPDATE games SET waiting_list = json_insert(waiting_list, '$[#]', ?1)
                 WHERE id = ?2",
                params![pair.label(), game_id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("Failed to append waiting pair: {e}")))?;

        if changed == 0 {
            return Err(RegistrationError::NotFound { game_id });
        }
        Ok(())
    }

    async fn register_pair(
        &self,
        game_id: i64,
        pair: &Pair,
    ) -> Result<Placement, RegistrationError> {
        let _guard = self.write_lock.lock().await;

        let game = self
            .load_inner(game_id)
            .await?
            .ok_or(RegistrationError::NotFound { game_id })?;

        if game.is_closed {
            return Err(RegistrationError::Closed { game_id });
        }

        // Validation order: duplicate participant before duplicate pair,
        // so each rejection has one authoritative reason.
        let taken = game.registered_participants();
        for name in pair.participants() {
            if taken.contains(&normalize_name(name)) {
                return Err(RegistrationError::DuplicateParticipant { name: name.into() });
            }
        }
        if game
            .pairs
            .iter()
            .chain(game.waiting_list.iter())
            .any(|existing| existing.matches(pair))
        {
            return Err(RegistrationError::DuplicatePair {
                pair: pair.label().into(),
            });
        }

        if game.has_free_slot() {
            let mut pairs = game.pairs;
            pairs.push(pair.clone());
            self.store_lists(game_id, &pairs, &game.waiting_list).await?;
            Ok(Placement::Confirmed)
        } else {
            let mut waiting = game.waiting_list;
            waiting.push(pair.clone());
            self.store_lists(game_id, &game.pairs, &waiting).await?;
            Ok(Placement::Waiting)
        }
    }

    async fn cancel_confirmed_pair(
        &self,
        game_id: i64,
        pair: &Pair,
    ) -> Result<(), RegistrationError> {
        let _guard = self.write_lock.lock().await;

        let game = self
            .load_inner(game_id)
            .await?
            .ok_or(RegistrationError::NotFound { game_id })?;

        let index = game
            .pairs
            .iter()
            .position(|p| p.matches(pair))
            .ok_or_else(|| RegistrationError::UnknownPair {
                pair: pair.label().into(),
            })?;

        let mut pairs = game.pairs;
        let mut waiting = game.waiting_list;
        pairs.remove(index);

        // Promotion is part of the same mutation: no window where a slot
        // is free while a waiting pair has not yet been promoted.
        if pairs.len() < MAX_CONFIRMED_PAIRS && !waiting.is_empty() {
            pairs.push(waiting.remove(0));
        }

        self.store_lists(game_id, &pairs, &waiting).await?;
        Ok(())
    }

    async fn record_channel_message(
        &self,
        game_id: i64,
        message_id: i64,
    ) -> Result<(), DatabaseError> {
        self.conn()
            .execute(
                "UPDATE games SET channel_message_id = ?1 WHERE id = ?2",
                params![message_id, game_id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("Failed to record message id: {e}")))?;
        Ok(())
    }

    async fn set_closed(&self, game_id: i64, closed: bool) -> Result<(), RegistrationError> {
        let changed = self
            .conn()
            .execute(
                "UPDATE games SET is_closed = ?1 WHERE id = ?2",
                params![closed as i64, game_id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("Failed to set closed flag: {e}")))?;

        if changed == 0 {
            return Err(RegistrationError::NotFound { game_id });
        }
        Ok(())
    }
}

// ── Tests ───────────────────────────────────────────────────────────
