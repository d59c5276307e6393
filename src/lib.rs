//! Match Bot — pair registration for small group games over Telegram.

pub mod config;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod publish;
pub mod server;
pub mod session;
pub mod store;
pub mod telegram;
