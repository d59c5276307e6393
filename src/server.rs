//! HTTP surface — health check plus the Telegram webhook route.
//!
//! The webhook handler does no work itself; it drops the update into the
//! same pipe the long-poller feeds, so delivery mode is invisible to the
//! dispatcher.

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use tokio::sync::mpsc::UnboundedSender;
use tracing::warn;

use crate::telegram::Update;

pub fn routes(tx: UnboundedSender<Update>) -> Router {
    Router::new()
        .route("/", get(health))
        .route("/webhook", post(webhook))
        .with_state(tx)
}

async fn health() -> &'static str {
    "OK"
}

/// Accept an update from Telegram and queue it for dispatch.
///
/// Always 200: Telegram retries non-2xx responses, and a closed pipe means
/// we are shutting down anyway.
async fn webhook(
    State(tx): State<UnboundedSender<Update>>,
    Json(update): Json<Update>,
) -> StatusCode {
    if tx.send(update).is_err() {
        warn!("Update pipe closed, dropping webhook update");
    }
    StatusCode::OK
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn webhook_forwards_update_to_pipe() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let update = Update {
            update_id: 7,
            ..Default::default()
        };

        let status = webhook(State(tx), Json(update)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(rx.recv().await.unwrap().update_id, 7);
    }

    #[tokio::test]
    async fn webhook_is_ok_even_when_pipe_closed() {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        drop(rx);

        let status = webhook(State(tx), Json(Update::default())).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn health_reports_ok() {
        assert_eq!(health().await, "OK");
    }
}
