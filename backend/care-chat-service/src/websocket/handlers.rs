use super::session::{ChatSession, InboundEvent, SessionTransport, TransportError};
use crate::middleware::auth::bearer_token;
use crate::state::AppState;
use async_trait::async_trait;
use axum::{
    extract::{
        ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    http::HeaderMap,
    response::IntoResponse,
};
use serde::Deserialize;
use std::borrow::Cow;

#[derive(Debug, Deserialize)]
pub struct WsParams {
    pub token: Option<String>,
}

/// `GET /ws?token=...`; the `Authorization: Bearer` header is accepted too.
///
/// The credential is checked after the upgrade so a rejection can be reported
/// with a close code.
pub async fn ws_handler(
    State(state): State<AppState>,
    Query(params): Query<WsParams>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    let credential = params.token.or_else(|| bearer_token(&headers));
    ws.on_upgrade(move |socket| async move {
        let session = ChatSession::new(
            WsTransport::new(socket),
            state.resolver.clone(),
            state.router.clone(),
            state.registry.clone(),
        );
        session.run(credential).await;
    })
}

/// axum WebSocket as a session transport.
pub struct WsTransport {
    socket: WebSocket,
}

impl WsTransport {
    pub fn new(socket: WebSocket) -> Self {
        Self { socket }
    }
}

#[async_trait]
impl SessionTransport for WsTransport {
    async fn recv(&mut self) -> Option<Result<InboundEvent, TransportError>> {
        let incoming = self.socket.recv().await?;
        Some(match incoming {
            Ok(Message::Text(text)) => Ok(InboundEvent::Text(text)),
            Ok(Message::Binary(bytes)) => Ok(InboundEvent::Binary(bytes)),
            // Pong replies are handled by the framework
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => Ok(InboundEvent::Control),
            Ok(Message::Close(_)) => Ok(InboundEvent::Close),
            Err(e) => Err(TransportError(e.to_string())),
        })
    }

    async fn send_text(&mut self, text: String) -> Result<(), TransportError> {
        self.socket
            .send(Message::Text(text))
            .await
            .map_err(|e| TransportError(e.to_string()))
    }

    async fn close(&mut self, code: u16, reason: &str) {
        let frame = CloseFrame {
            code,
            reason: Cow::Owned(reason.to_string()),
        };
        let _ = self.socket.send(Message::Close(Some(frame))).await;
    }
}
