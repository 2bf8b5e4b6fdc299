//! Websocket session with the H5 player endpoint
//!
//! The session protocol is a fixed sequence dictated by the vendor player:
//! send the encoded handshake parameter, receive two greeting messages,
//! send the start command, then receive binary frames until the connection
//! drops. Connection loss is fatal; reconnecting is an explicit non-goal
//! because retry would change observable behavior on failure.

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use serde::Serialize;
use tokio::net::TcpStream;
use tokio_tungstenite::{
    connect_async,
    tungstenite::{self, Message},
    MaybeTlsStream, WebSocketStream,
};
use tracing::{debug, info, warn};

use crate::codec;
use crate::error::{AppError, Result};

/// Default live endpoint.
pub const DEFAULT_ENDPOINT: &str =
    "wss://vd-file-hnzz2-wcloud.wojiazongguan.cn:50443/h5player/live";

/// Literal key the endpoint expects at the start of the handshake message;
/// the encoded token is concatenated directly after it.
const HANDSHAKE_KEY: &str = "_paramStr_=";

/// Number of capability/greeting messages the endpoint sends before it
/// accepts the start command.
const GREETING_COUNT: usize = 2;

/// Timestamp literal the vendor player sends with the start command.
/// Opaque to us; the endpoint matches it verbatim.
const START_CMD_TIME: u32 = 1243;

/// Command code that starts the live stream.
const CMD_START_STREAM: u8 = 3;

/// Control command wire format. Field order matters: the endpoint expects
/// the literal text `{"time":1243,"cmd":3}`.
#[derive(Debug, Serialize)]
struct ControlCommand {
    time: u32,
    cmd: u8,
}

fn start_command() -> ControlCommand {
    ControlCommand {
        time: START_CMD_TIME,
        cmd: CMD_START_STREAM,
    }
}

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// An established, handshaken session with the live endpoint.
pub struct LiveSession {
    ws: WsStream,
}

impl LiveSession {
    /// Connect to the endpoint and run the fixed handshake sequence with
    /// the given plaintext parameter.
    pub async fn connect(uri: &str, param: &str) -> Result<Self> {
        let (ws, _response) = connect_async(uri)
            .await
            .map_err(|e| AppError::Connect(e.to_string()))?;
        debug!("websocket established");

        let mut session = Self { ws };
        session.handshake(param).await?;
        Ok(session)
    }

    async fn handshake(&mut self, param: &str) -> Result<()> {
        let token = codec::encode(param);
        self.send_text(format!("{}{}", HANDSHAKE_KEY, token))
            .await?;

        // Greeting payloads are percent-encoded text; log them and move on.
        for _ in 0..GREETING_COUNT {
            let frame = self.next_frame().await?;
            let raw = String::from_utf8_lossy(&frame).into_owned();
            let greeting = urlencoding::decode(&raw)
                .map(|decoded| decoded.into_owned())
                .unwrap_or_else(|_| raw.clone());
            info!(greeting = %greeting, "endpoint greeting");
        }

        self.send_text(serde_json::to_string(&start_command())?)
            .await?;
        info!("handshake complete, stream started");
        Ok(())
    }

    /// Receive the next frame, yielding until one arrives. Text frames are
    /// surfaced as their raw bytes; ping/pong is handled by tungstenite.
    /// Stream end or a close frame is a fatal [`AppError::ConnectionClosed`].
    pub async fn next_frame(&mut self) -> Result<Bytes> {
        loop {
            let msg = match self.ws.next().await {
                Some(Ok(msg)) => msg,
                Some(Err(e)) => {
                    warn!("websocket receive failed: {}", e);
                    return Err(AppError::ConnectionClosed);
                }
                None => return Err(AppError::ConnectionClosed),
            };

            match msg {
                Message::Binary(data) => return Ok(Bytes::from(data)),
                Message::Text(text) => return Ok(Bytes::from(text.into_bytes())),
                Message::Ping(_) | Message::Pong(_) => continue,
                Message::Close(frame) => {
                    debug!(?frame, "close frame received");
                    return Err(AppError::ConnectionClosed);
                }
                Message::Frame(_) => continue,
            }
        }
    }

    async fn send_text(&mut self, text: String) -> Result<()> {
        self.ws.send(Message::Text(text)).await.map_err(|e| match e {
            tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed => {
                AppError::ConnectionClosed
            }
            other => AppError::Send(other.to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_command_wire_format() {
        let text = serde_json::to_string(&start_command()).unwrap();
        assert_eq!(text, r#"{"time":1243,"cmd":3}"#);
    }

    #[tokio::test]
    async fn test_session_handshake_and_frame_delivery() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();

            let handshake = ws.next().await.unwrap().unwrap().into_text().unwrap();
            let expected = format!("{}{}", HANDSHAKE_KEY, codec::encode("secret"));
            assert_eq!(handshake, expected);

            ws.send(Message::Text("greeting%20one".into()))
                .await
                .unwrap();
            ws.send(Message::Text("greeting%20two".into()))
                .await
                .unwrap();

            let command = ws.next().await.unwrap().unwrap().into_text().unwrap();
            assert_eq!(command, r#"{"time":1243,"cmd":3}"#);

            let mut frame = vec![0u8; 80];
            frame[1] = 0x63;
            ws.send(Message::Binary(frame)).await.unwrap();
        });

        let uri = format!("ws://{}", addr);
        let mut session = LiveSession::connect(&uri, "secret").await.unwrap();

        let frame = session.next_frame().await.unwrap();
        assert_eq!(frame.len(), 80);
        assert_eq!(frame[1], 0x63);

        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_closed_stream_reports_connection_closed() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();

            // drain the handshake, answer the greetings, then hang up
            let _ = ws.next().await;
            ws.send(Message::Text("one".into())).await.unwrap();
            ws.send(Message::Text("two".into())).await.unwrap();
            let _ = ws.next().await;
            ws.close(None).await.unwrap();
        });

        let uri = format!("ws://{}", addr);
        let mut session = LiveSession::connect(&uri, "").await.unwrap();

        let err = session.next_frame().await.unwrap_err();
        assert!(matches!(err, AppError::ConnectionClosed));

        server.await.unwrap();
    }
}
