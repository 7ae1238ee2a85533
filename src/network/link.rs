//! Client side of the relay WebSocket, shared by producer and consumer

use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use crate::constants::NORMAL_CLOSE_CODE;
use crate::error::NetworkError;
use crate::protocol::{connect_url, Role};

pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Upper bound on TCP connect plus the WebSocket handshake
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Open a role-tagged connection to the relay
pub async fn open(server_url: &str, role: &Role, token: &str) -> Result<WsStream, NetworkError> {
    open_with_timeout(server_url, role, token, CONNECT_TIMEOUT).await
}

/// [`open`] with an explicit handshake deadline
pub async fn open_with_timeout(
    server_url: &str,
    role: &Role,
    token: &str,
    limit: Duration,
) -> Result<WsStream, NetworkError> {
    let url = connect_url(server_url, role, token)?;
    tracing::info!("Connecting to relay {} as {}", server_url, role);

    match tokio::time::timeout(limit, connect_async(url.as_str())).await {
        Ok(Ok((stream, _response))) => Ok(stream),
        Ok(Err(WsError::Http(response))) => {
            Err(NetworkError::Rejected(response.status().as_u16()))
        }
        Ok(Err(e)) => Err(NetworkError::ConnectionFailed(e.to_string())),
        Err(_) => Err(NetworkError::ConnectionFailed(format!(
            "no handshake from {} within {:?}",
            server_url, limit
        ))),
    }
}

/// Map a received close frame to the link outcome: only 1000 is clean
pub fn close_outcome(frame: Option<CloseFrame<'_>>) -> Result<(), NetworkError> {
    match frame {
        Some(frame) => {
            let code = u16::from(frame.code);
            if code == NORMAL_CLOSE_CODE {
                Ok(())
            } else {
                Err(NetworkError::Closed {
                    code,
                    reason: frame.reason.into_owned(),
                })
            }
        }
        None => Err(NetworkError::Closed {
            code: u16::from(CloseCode::Status),
            reason: "no status code".to_string(),
        }),
    }
}

/// Close message sent when the local side stops
pub fn normal_close() -> Message {
    Message::Close(Some(CloseFrame {
        code: CloseCode::Normal,
        reason: "".into(),
    }))
}
