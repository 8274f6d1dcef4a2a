//! Push channel: one follow session per websocket

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade, rejection::WebSocketUpgradeRejection};
use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Response};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use kubelog_logs::{RelayOutcome, StreamSession};
use kubelog_types::{ContainerRef, StreamMessage};

use crate::routes::RouteQuery;
use crate::AppState;

/// Messages the relay may run ahead of the socket writer
const CHANNEL_CAPACITY: usize = 64;

/// Authenticate, then upgrade. The credential is checked before the upgrade
/// request itself is validated so a bad key never reaches the cluster.
pub(crate) async fn stream_logs(
    State(state): State<AppState>,
    Path((pod, container)): Path<(String, String)>,
    Query(query): Query<RouteQuery>,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    if let Err(e) = state.auth.check_query(query.key.as_deref()) {
        return e.into_response();
    }
    let ws = match ws {
        Ok(ws) => ws,
        Err(rejection) => return rejection.into_response(),
    };

    let target = ContainerRef::new(state.cluster.namespace(), pod, container);
    let session = state.relay.session(target, None);

    ws.on_upgrade(move |socket| relay_socket(socket, session))
}

async fn relay_socket(socket: WebSocket, session: StreamSession) {
    let target = session.target().clone();
    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::channel::<StreamMessage>(CHANNEL_CAPACITY);
    let cancel = CancellationToken::new();

    info!(container = %target, "log channel opened");

    // Forward relayed messages to the socket
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let json = match msg.to_json() {
                Ok(j) => j,
                Err(e) => {
                    error!("Failed to serialize message: {e}");
                    continue;
                }
            };
            if sender.send(Message::Text(json.into())).await.is_err() {
                break;
            }
        }
        let _ = sender.close().await;
    });

    // The client only ever closes; anything else it sends is ignored
    let recv_cancel = cancel.clone();
    let recv_task = tokio::spawn(async move {
        while let Some(msg) = receiver.next().await {
            match msg {
                Ok(Message::Close(_)) => break,
                Ok(_) => continue,
                Err(e) => {
                    debug!("websocket receive error: {e}");
                    break;
                }
            }
        }
        recv_cancel.cancel();
    });

    let outcome = session.run(tx, cancel).await;

    match outcome {
        RelayOutcome::Cancelled | RelayOutcome::PeerClosed => send_task.abort(),
        // Flush what the relay queued, including a final error, then close
        _ => {
            let _ = send_task.await;
        }
    }
    recv_task.abort();

    info!(container = %target, ?outcome, "log channel closed");
}
