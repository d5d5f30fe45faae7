use axum::{
    extract::{
        Path, State, WebSocketUpgrade,
        ws::{Message, WebSocket, rejection::WebSocketUpgradeRejection},
    },
    response::{IntoResponse, Response},
};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::broadcast::{Receiver, error::RecvError};
use tracing::{debug, info, instrument, warn};

use crate::auth::CurrentUser;
use crate::schemas::{AppState, ErrorResponse};
use crate::services::dashboard::Topic;

/// Live dashboard feed
///
/// Upgrades to a WebSocket that receives the topic's JSON snapshot on connect
/// and again on every publisher tick. Topics: `average-session-length`,
/// `active-users`, `top-queries`, `gap-in-queries`, `most-referenced-files`.
#[utoipa::path(
    get,
    path = "/api/v1/ws/dashboard/{topic}",
    tag = "dashboard",
    params(
        ("topic" = String, Path, description = "Dashboard topic"),
    ),
    responses(
        (status = 101, description = "Switching to the WebSocket protocol"),
        (status = 401, description = "Not authenticated", body = ErrorResponse),
        (status = 404, description = "Unknown topic", body = ErrorResponse)
    )
)]
#[instrument(skip(state, current, ws), fields(user_id = current.user.id))]
pub async fn dashboard_socket(
    Path(topic): Path<String>,
    State(state): State<AppState>,
    current: CurrentUser,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    let topic = match topic.parse::<Topic>() {
        Ok(topic) => topic,
        Err(e) => return e.into_response(),
    };
    let ws = match ws {
        Ok(ws) => ws,
        Err(rejection) => return rejection.into_response(),
    };

    // Subscribe before the upgrade so no tick between snapshot and loop is lost.
    let receiver = state.dashboard.subscribe(topic);
    let user_id = current.user.id;
    info!("User {} subscribed to {}", user_id, topic.as_str());

    ws.on_upgrade(move |socket| forward(socket, state, topic, receiver, user_id))
}

async fn forward(
    socket: WebSocket,
    state: AppState,
    topic: Topic,
    mut receiver: Receiver<String>,
    user_id: i32,
) {
    let (mut sender, mut incoming) = socket.split();

    match state.dashboard.snapshot(topic).await {
        Ok(json) => {
            if sender.send(Message::Text(json)).await.is_err() {
                debug!("Client of user {} left before the first snapshot", user_id);
                return;
            }
        }
        Err(e) => warn!("Initial {} snapshot failed: {}", topic.as_str(), e),
    }

    let push = tokio::spawn(async move {
        loop {
            match receiver.recv().await {
                Ok(json) => {
                    if sender.send(Message::Text(json)).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    debug!(
                        "Subscriber of {} skipped {} stale snapshot(s)",
                        topic.as_str(),
                        skipped
                    );
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    // Only close frames and errors matter from the client side.
    while let Some(Ok(message)) = incoming.next().await {
        if let Message::Close(_) = message {
            break;
        }
    }

    push.abort();
    debug!("User {} unsubscribed from {}", user_id, topic.as_str());
}
