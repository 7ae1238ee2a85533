//! WebSocket relay endpoint
//!
//! Connections are registered with the session manager before the upgrade,
//! so a refused producer gets a plain HTTP error instead of a socket that
//! closes right away. Registration lives as long as the socket task.

use axum::{
    extract::{
        ws::{close_code, CloseFrame, Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::watch;

use crate::error::RelayError;
use crate::protocol::{ConnectParams, Role};
use crate::session::{ConnectionHandle, FramePayload, FrameReceiver, SessionManager};
use crate::ui::server::AppState;

/// Unregisters its connection when the socket task ends, however it ends
struct ConnectionGuard {
    sessions: Arc<SessionManager>,
    handle: ConnectionHandle,
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.sessions.disconnect(&self.handle);
    }
}

/// `GET /?role=<producer|consumer>&token=<token>`
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<ConnectParams>,
    State(state): State<Arc<AppState>>,
) -> Response {
    let role = Role::from_param(params.role.as_deref());
    let token = params.token.unwrap_or_default();

    let connection = match state.sessions.connect(role, &token) {
        Ok(connection) => connection,
        Err(e) => {
            tracing::warn!("Refusing connection: {}", e);
            return (rejection_status(&e), e.to_string()).into_response();
        }
    };

    let guard = ConnectionGuard {
        sessions: Arc::clone(&state.sessions),
        handle: connection.handle,
    };
    let outbound = connection.outbound;
    let shutdown = state.shutdown_signal();

    ws.on_upgrade(move |socket| serve_socket(socket, guard, outbound, shutdown))
}

fn rejection_status(error: &RelayError) -> StatusCode {
    match error {
        RelayError::MissingToken(_) => StatusCode::BAD_REQUEST,
        RelayError::ProducerAlreadyActive(_) => StatusCode::CONFLICT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

async fn serve_socket(
    socket: WebSocket,
    guard: ConnectionGuard,
    outbound: Option<FrameReceiver>,
    shutdown: watch::Receiver<bool>,
) {
    let handle = &guard.handle;
    tracing::info!(
        "{} connection {} opened (session {:?})",
        handle.role,
        handle.id,
        handle.token
    );

    match (&handle.role, outbound) {
        (Role::Producer, _) => relay_producer(socket, &guard.sessions, handle, shutdown).await,
        (Role::Consumer, Some(outbound)) => relay_consumer(socket, outbound, shutdown).await,
        _ => drain(socket, shutdown).await,
    }

    tracing::info!("{} connection {} closed", handle.role, handle.id);
}

/// Resolves once the relay starts shutting down
async fn stopped(mut shutdown: watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|stop| *stop).await;
}

fn going_away() -> Message {
    Message::Close(Some(CloseFrame {
        code: close_code::AWAY,
        reason: "relay shutting down".into(),
    }))
}

async fn relay_producer(
    mut socket: WebSocket,
    sessions: &SessionManager,
    handle: &ConnectionHandle,
    shutdown: watch::Receiver<bool>,
) {
    let stopped = stopped(shutdown);
    tokio::pin!(stopped);

    loop {
        let message = tokio::select! {
            _ = &mut stopped => {
                let _ = socket.send(going_away()).await;
                return;
            }
            message = socket.recv() => message,
        };

        let payload = match message {
            Some(Ok(Message::Binary(bytes))) if bytes.is_empty() => continue,
            Some(Ok(Message::Binary(bytes))) => FramePayload::Binary(bytes),
            Some(Ok(Message::Text(text))) if text.is_empty() => continue,
            Some(Ok(Message::Text(text))) => FramePayload::Text(text),
            Some(Ok(Message::Close(frame))) => {
                tracing::debug!("Producer {} sent close {:?}", handle.id, frame);
                return;
            }
            Some(Ok(_)) => continue,
            Some(Err(e)) => {
                tracing::warn!("Producer {} connection error: {}", handle.id, e);
                return;
            }
            None => return,
        };

        if let Err(e) = sessions.publish(handle, payload) {
            tracing::error!("Could not relay frame from producer {}: {}", handle.id, e);
        }
    }
}

async fn relay_consumer(
    socket: WebSocket,
    mut outbound: FrameReceiver,
    shutdown: watch::Receiver<bool>,
) {
    let (mut sink, mut stream) = socket.split();
    let stopped = stopped(shutdown);
    tokio::pin!(stopped);

    loop {
        tokio::select! {
            _ = &mut stopped => {
                let _ = sink.send(going_away()).await;
                break;
            }
            changed = outbound.changed() => {
                // Dropped from the session
                if changed.is_err() {
                    break;
                }
                // Only the newest frame is sent; anything it replaced is gone
                let frame = outbound.borrow_and_update().clone();
                if let Some(frame) = frame {
                    if let Err(e) = sink.send(Message::Text(frame.to_string())).await {
                        tracing::debug!("Consumer send failed: {}", e);
                        break;
                    }
                }
            }
            incoming = stream.next() => match incoming {
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::debug!("Consumer connection error: {}", e);
                    break;
                }
            },
        }
    }
}

/// Connections with an unrecognised role are kept open but never fed
async fn drain(mut socket: WebSocket, shutdown: watch::Receiver<bool>) {
    let stopped = stopped(shutdown);
    tokio::pin!(stopped);

    loop {
        tokio::select! {
            _ = &mut stopped => {
                let _ = socket.send(going_away()).await;
                break;
            }
            message = socket.recv() => match message {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }
}
