//! Persistence layer — libSQL-backed storage for games.

pub mod libsql_backend;
pub mod migrations;
pub mod model;
pub mod traits;

pub use libsql_backend::LibSqlBackend;
pub use model::{Game, MAX_CONFIRMED_PAIRS, NewGame, Pair, Placement};
pub use traits::GameStore;
