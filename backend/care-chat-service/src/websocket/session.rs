//! Per-connection protocol: `Connecting → Authenticated → Active → Closed`.
//!
//! A session authenticates once, registers in the [`ConnectionRegistry`], then
//! processes inbound frames strictly in order while forwarding pushes from the
//! registry. Per-frame failures produce an inline `{"error": ...}` frame; only
//! authentication failure, malformed JSON and transport failure end the session.

use super::message_types::{ErrorFrame, InboundFrame};
use super::ConnectionRegistry;
use crate::identity::{AuthFailure, SharedResolver};
use crate::models::UserIdentity;
use crate::services::MessageRouter;
use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Policy violation, sent when the credential is rejected.
pub const CLOSE_POLICY_VIOLATION: u16 = 1008;
/// Invalid frame payload, sent when a frame is not a JSON object.
pub const CLOSE_INVALID_PAYLOAD: u16 = 1007;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    Authenticated,
    Active,
    Closed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundEvent {
    Text(String),
    Binary(Vec<u8>),
    /// Ping/pong and other control traffic
    Control,
    Close,
}

#[derive(Debug, Error)]
#[error("transport error: {0}")]
pub struct TransportError(pub String);

/// The bidirectional frame channel a session runs over.
#[async_trait]
pub trait SessionTransport: Send {
    /// `None` once the peer is gone.
    async fn recv(&mut self) -> Option<Result<InboundEvent, TransportError>>;

    async fn send_text(&mut self, text: String) -> Result<(), TransportError>;

    async fn close(&mut self, code: u16, reason: &str);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    AuthenticationFailed(AuthFailure),
    ClientClosed,
    MalformedFrame,
    TransportError,
}

pub struct ChatSession<T: SessionTransport> {
    transport: T,
    state: SessionState,
    resolver: SharedResolver,
    router: MessageRouter,
    registry: ConnectionRegistry,
}

impl<T: SessionTransport> ChatSession<T> {
    pub fn new(
        transport: T,
        resolver: SharedResolver,
        router: MessageRouter,
        registry: ConnectionRegistry,
    ) -> Self {
        Self {
            transport,
            state: SessionState::Connecting,
            resolver,
            router,
            registry,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Drive the session to completion.
    pub async fn run(mut self, credential: Option<String>) -> CloseReason {
        let user = match self.resolver.resolve(credential.as_deref()).await {
            Ok(user) => user,
            Err(failure) => {
                warn!(reason = %failure, "live session rejected");
                self.transport
                    .close(CLOSE_POLICY_VIOLATION, "authentication failed")
                    .await;
                self.state = SessionState::Closed;
                return CloseReason::AuthenticationFailed(failure);
            }
        };
        self.state = SessionState::Authenticated;

        // Dropping the registration on any exit path unregisters this connection.
        let (registration, mut outbound) = self.registry.connect(user.id);
        self.state = SessionState::Active;
        info!(
            user_id = user.id,
            connection = ?registration.connection_id(),
            "live session active"
        );

        let mut outbound_open = true;
        let reason = loop {
            tokio::select! {
                pushed = outbound.recv(), if outbound_open => match pushed {
                    Some(payload) => {
                        if let Err(e) = self.transport.send_text(payload).await {
                            debug!(user_id = user.id, error = %e, "push failed");
                            break CloseReason::TransportError;
                        }
                    }
                    // Superseded by a newer connection for this user.
                    None => outbound_open = false,
                },
                incoming = self.transport.recv() => match incoming {
                    Some(Ok(InboundEvent::Text(text))) => {
                        if let Some(reason) = self.handle_text(&user, &text).await {
                            break reason;
                        }
                    }
                    Some(Ok(InboundEvent::Binary(bytes))) => match String::from_utf8(bytes) {
                        Ok(text) => {
                            if let Some(reason) = self.handle_text(&user, &text).await {
                                break reason;
                            }
                        }
                        Err(_) => {
                            self.transport
                                .close(CLOSE_INVALID_PAYLOAD, "frame is not valid UTF-8")
                                .await;
                            break CloseReason::MalformedFrame;
                        }
                    },
                    Some(Ok(InboundEvent::Control)) => {}
                    Some(Ok(InboundEvent::Close)) | None => break CloseReason::ClientClosed,
                    Some(Err(e)) => {
                        debug!(user_id = user.id, error = %e, "receive failed");
                        break CloseReason::TransportError;
                    }
                },
            }
        };

        drop(registration);
        self.state = SessionState::Closed;
        info!(user_id = user.id, reason = ?reason, "live session closed");
        reason
    }

    /// Returns a close reason when the frame ends the session.
    async fn handle_text(&mut self, user: &UserIdentity, text: &str) -> Option<CloseReason> {
        let frame = match InboundFrame::parse(text) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(user_id = user.id, error = %e, "malformed frame");
                self.transport
                    .close(CLOSE_INVALID_PAYLOAD, "malformed frame")
                    .await;
                return Some(CloseReason::MalformedFrame);
            }
        };

        let conversation_id = match frame.conversation_id() {
            Ok(id) => id,
            Err(rejection) => return self.send_error(rejection.message()).await,
        };

        let routed = self
            .router
            .route_inbound(
                user.id,
                conversation_id,
                frame.kind(),
                frame.content(),
                frame.attachment_url(),
            )
            .await;

        match routed {
            Ok(_) => None,
            Err(e) => {
                debug!(user_id = user.id, conversation_id, error = %e, "frame rejected");
                self.send_error(&e.frame_message()).await
            }
        }
    }

    async fn send_error(&mut self, error: &str) -> Option<CloseReason> {
        match self
            .transport
            .send_text(ErrorFrame::new(error).to_json())
            .await
        {
            Ok(()) => None,
            Err(_) => Some(CloseReason::TransportError),
        }
    }
}
