//! WebSocket binding for chat sessions

use super::AppState;
use crate::session::{ChatSession, FrameSink, FrameSource, SessionContext, TransportError};
use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};

/// GET /v1/ws/user_chat
pub async fn user_chat(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| serve_session(socket, state.session))
}

async fn serve_session(socket: WebSocket, context: SessionContext) {
    let (sink, stream) = socket.split();
    let mut session = ChatSession::open(WsSource { stream }, WsSink { sink }, context);
    if let Err(e) = session.run().await {
        tracing::warn!(session_id = %session.id(), error = %e, "Session ended with error");
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Inbound {
    Text(String),
    Close,
    /// Binary and control frames; pongs are answered by the transport
    Ignore,
}

fn classify(message: Message) -> Inbound {
    match message {
        Message::Text(text) => Inbound::Text(text),
        Message::Close(_) => Inbound::Close,
        Message::Binary(_) | Message::Ping(_) | Message::Pong(_) => Inbound::Ignore,
    }
}

pub struct WsSource {
    stream: SplitStream<WebSocket>,
}

#[async_trait]
impl FrameSource for WsSource {
    async fn next_frame(&mut self) -> Result<Option<String>, TransportError> {
        while let Some(message) = self.stream.next().await {
            let message = message.map_err(|e| TransportError::Read(e.to_string()))?;
            match classify(message) {
                Inbound::Text(text) => return Ok(Some(text)),
                Inbound::Close => return Ok(None),
                Inbound::Ignore => {}
            }
        }
        Ok(None)
    }
}

pub struct WsSink {
    sink: SplitSink<WebSocket, Message>,
}

#[async_trait]
impl FrameSink for WsSink {
    async fn send_frame(&mut self, frame: String) -> Result<(), TransportError> {
        self.sink
            .send(Message::Text(frame))
            .await
            .map_err(|e| TransportError::Write(e.to_string()))
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.sink
            .close()
            .await
            .map_err(|e| TransportError::Write(e.to_string()))
    }
}
