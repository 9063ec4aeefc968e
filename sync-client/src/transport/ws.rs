//! WebSocket transport over tokio-tungstenite.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_tungstenite::tungstenite::http::{HeaderValue, StatusCode};
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use tether_sync_types::Frame;

use super::{Connection, Inbound, Transport, TransportError, ABNORMAL_CLOSE};

/// Close code used when a close frame carries no status.
const NO_STATUS: u16 = 1005;

/// Opens WebSocket connections to one URL.
#[derive(Debug, Clone)]
pub struct WsTransport {
    url: String,
}

impl WsTransport {
    /// Create a transport for `url` (`ws://` or `wss://`).
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    /// Endpoint URL.
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Transport for WsTransport {
    type Connection = WsConnection;

    async fn open(&self, token: &str) -> Result<WsConnection, TransportError> {
        let mut request = self
            .url
            .as_str()
            .into_client_request()
            .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;

        let bearer = HeaderValue::from_str(&format!("Bearer {}", token)).map_err(|_| {
            TransportError::ConnectionFailed("token is not a valid header value".into())
        })?;
        request.headers_mut().insert(AUTHORIZATION, bearer);

        match connect_async(request).await {
            Ok((stream, response)) => {
                tracing::debug!("WebSocket handshake complete ({})", response.status());
                Ok(WsConnection { stream })
            }
            Err(WsError::Http(response))
                if response.status() == StatusCode::UNAUTHORIZED
                    || response.status() == StatusCode::FORBIDDEN =>
            {
                Err(TransportError::Unauthorized(response.status().to_string()))
            }
            Err(e) => Err(TransportError::ConnectionFailed(e.to_string())),
        }
    }
}

/// A live WebSocket connection.
pub struct WsConnection {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl std::fmt::Debug for WsConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WsConnection").finish_non_exhaustive()
    }
}

#[async_trait]
impl Connection for WsConnection {
    async fn recv(&mut self) -> Result<Inbound, TransportError> {
        loop {
            let message = match self.stream.next().await {
                None => {
                    return Ok(Inbound::Closed {
                        code: ABNORMAL_CLOSE,
                        reason: "stream ended".into(),
                    })
                }
                Some(Err(e)) => return Err(TransportError::ReceiveFailed(e.to_string())),
                Some(Ok(message)) => message,
            };

            match message {
                Message::Text(text) => return Ok(Inbound::Frame(Frame::Text(text))),
                Message::Binary(data) => return Ok(Inbound::Frame(Frame::Binary(data))),
                Message::Pong(_) => return Ok(Inbound::Pong),
                Message::Close(frame) => {
                    let (code, reason) = frame
                        .map(|f| (u16::from(f.code), f.reason.into_owned()))
                        .unwrap_or((NO_STATUS, String::new()));
                    return Ok(Inbound::Closed { code, reason });
                }
                // tungstenite queues the pong reply itself
                Message::Ping(_) | Message::Frame(_) => continue,
            }
        }
    }

    async fn ping(&mut self) -> Result<(), TransportError> {
        self.stream
            .send(Message::Ping(Vec::new()))
            .await
            .map_err(|e| TransportError::SendFailed(e.to_string()))
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        match self.stream.close(None).await {
            Ok(()) | Err(WsError::ConnectionClosed) | Err(WsError::AlreadyClosed) => Ok(()),
            Err(e) => Err(TransportError::SendFailed(e.to_string())),
        }
    }
}
