//! One authenticated WebSocket connection.
//!
//! The connection id doubles as the transport session id handed to the
//! session tracker, so closing the socket can clean up every edit session
//! it opened.

use std::{sync::Arc, time::Duration};

use axum::{
    body::Bytes,
    extract::ws::{Message, WebSocket},
};
use futures_util::{SinkExt, StreamExt, stream::SplitSink};
use services::services::{
    broadcast_relay::{RelayError, RelayMessage, Topic, TopicParseError},
    events::{CardMoveMessage, CollaborativeEditMessage, EditMessageType},
    kanban::KanbanError,
    session_tracker::SessionError,
};
use thiserror::Error;
use tokio::{
    sync::mpsc,
    time::{self, MissedTickBehavior},
};
use tracing::instrument;
use uuid::Uuid;

use super::message::{ClientMessage, ServerMessage};
use crate::AppState;

const PING_INTERVAL: Duration = Duration::from_secs(30);

/// Relay messages buffered per connection before new ones are dropped.
const OUTGOING_BUFFER_SIZE: usize = 64;

type WsSender = SplitSink<WebSocket, Message>;

#[derive(Debug, Error)]
enum FrameError {
    #[error(transparent)]
    Topic(#[from] TopicParseError),
    #[error(transparent)]
    Kanban(#[from] KanbanError),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Relay(#[from] RelayError),
}

impl FrameError {
    /// Text sent back to the client. Store failures stay in the logs.
    fn client_message(&self) -> String {
        match self {
            FrameError::Topic(e) => e.to_string(),
            FrameError::Kanban(
                e @ (KanbanError::NotFound(_)
                | KanbanError::PermissionDenied(_)
                | KanbanError::Validation(_)),
            ) => e.to_string(),
            _ => "internal server error".to_string(),
        }
    }
}

struct Connection {
    state: AppState,
    user_id: Uuid,
    connection_id: Uuid,
    transport_session: String,
    outgoing: mpsc::Sender<Arc<RelayMessage>>,
}

#[instrument(name = "ws.session", skip(socket, state), fields(connection_id = tracing::field::Empty))]
pub async fn handle(socket: WebSocket, state: AppState, user_id: Uuid) {
    let connection_id = Uuid::new_v4();
    tracing::Span::current().record("connection_id", tracing::field::display(connection_id));

    let (mut ws_sender, mut ws_receiver) = socket.split();
    let (tx, mut rx) = mpsc::channel::<Arc<RelayMessage>>(OUTGOING_BUFFER_SIZE);

    let connection = Connection {
        state,
        user_id,
        connection_id,
        transport_session: connection_id.to_string(),
        outgoing: tx,
    };

    let mut ping = time::interval(PING_INTERVAL);
    ping.set_missed_tick_behavior(MissedTickBehavior::Skip);
    // The first tick fires immediately.
    ping.tick().await;

    tracing::info!(%user_id, "realtime connection opened");

    loop {
        tokio::select! {
            Some(message) = rx.recv() => {
                let frame = ServerMessage::Event(message.as_ref().clone());
                if send_frame(&mut ws_sender, &frame).await.is_err() {
                    break;
                }
            }

            maybe_message = ws_receiver.next() => {
                match maybe_message {
                    Some(Ok(Message::Text(text))) => {
                        let reply = match serde_json::from_str::<ClientMessage>(text.as_str()) {
                            Ok(message) => connection.handle_frame(message).await,
                            Err(error) => {
                                tracing::debug!(?error, "invalid client frame");
                                Some(ServerMessage::error(format!("invalid message: {error}")))
                            }
                        };
                        if let Some(reply) = reply
                            && send_frame(&mut ws_sender, &reply).await.is_err()
                        {
                            break;
                        }
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if ws_sender.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) => {
                        tracing::debug!("client sent close frame");
                        break;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(error)) => {
                        tracing::debug!(?error, "websocket receive error");
                        break;
                    }
                    None => break,
                }
            }

            _ = ping.tick() => {
                if ws_sender.send(Message::Ping(Bytes::new())).await.is_err() {
                    break;
                }
            }
        }
    }

    connection.close().await;
}

async fn send_frame(sender: &mut WsSender, frame: &ServerMessage) -> Result<(), ()> {
    let text = match serde_json::to_string(frame) {
        Ok(text) => text,
        Err(error) => {
            tracing::error!(?error, "failed to serialize server frame");
            return Ok(());
        }
    };
    sender.send(Message::Text(text.into())).await.map_err(|error| {
        tracing::debug!(?error, "client disconnected during send");
    })
}

impl Connection {
    /// Returns the reply frame, if any.
    async fn handle_frame(&self, message: ClientMessage) -> Option<ServerMessage> {
        let result = match message {
            ClientMessage::Subscribe { topic } => self.subscribe(&topic).await.map(Some),
            ClientMessage::Unsubscribe { topic } => self.unsubscribe(&topic).await.map(Some),
            ClientMessage::PostEdit(edit) => self.post_edit(edit).await.map(|_| None),
            ClientMessage::CardMove(notice) => self.card_move(notice).await.map(|_| None),
        };

        match result {
            Ok(reply) => reply,
            Err(error) => {
                match &error {
                    FrameError::Session(_) | FrameError::Relay(_) | FrameError::Kanban(_) => {
                        tracing::warn!(?error, "failed to handle client frame");
                    }
                    FrameError::Topic(_) => tracing::debug!(%error, "bad topic"),
                }
                Some(ServerMessage::error(error.client_message()))
            }
        }
    }

    async fn subscribe(&self, raw: &str) -> Result<ServerMessage, FrameError> {
        let topic: Topic = raw.parse()?;
        if let Topic::Board(board_id) = topic {
            self.state
                .kanban()
                .authorize_board(board_id, self.user_id)
                .await?;
        }

        self.state
            .relay()
            .subscribe(topic, self.connection_id, self.outgoing.clone())
            .await;
        Ok(ServerMessage::Subscribed {
            topic: topic.to_string(),
        })
    }

    async fn unsubscribe(&self, raw: &str) -> Result<ServerMessage, FrameError> {
        let topic: Topic = raw.parse()?;
        self.state
            .relay()
            .unsubscribe(&topic, self.connection_id)
            .await;
        Ok(ServerMessage::Unsubscribed {
            topic: topic.to_string(),
        })
    }

    /// Track presence, then relay the edit to everyone on the post.
    async fn post_edit(&self, mut edit: CollaborativeEditMessage) -> Result<(), FrameError> {
        // Identity comes from the token, never from the frame.
        edit.user_id = Some(self.user_id);
        edit.timestamp = None;

        let sessions = self.state.sessions();
        match edit.kind {
            EditMessageType::Join => {
                sessions
                    .join(edit.post_id, self.user_id, &self.transport_session)
                    .await?;
            }
            EditMessageType::Leave => {
                sessions
                    .leave(edit.post_id, &self.transport_session)
                    .await?;
            }
            EditMessageType::ContentChange | EditMessageType::CursorMove | EditMessageType::Save => {
                sessions
                    .touch(edit.post_id, &self.transport_session)
                    .await?;
            }
        }

        self.state
            .relay()
            .publish(&Topic::Post(edit.post_id), &edit)
            .await?;
        Ok(())
    }

    /// Relay a placement notice. Only members of the board may announce on it.
    async fn card_move(&self, mut notice: CardMoveMessage) -> Result<(), FrameError> {
        self.state
            .kanban()
            .authorize_board(notice.board_id, self.user_id)
            .await?;

        notice.user_id = Some(self.user_id);
        notice.timestamp = None;
        self.state
            .relay()
            .publish(&Topic::Board(notice.board_id), &notice)
            .await?;
        Ok(())
    }

    async fn close(self) {
        self.state.relay().disconnect(self.connection_id).await;
        match self
            .state
            .sessions()
            .drop_connection(&self.transport_session)
            .await
        {
            Ok(closed) if closed > 0 => {
                tracing::debug!(closed, "closed edit sessions of disconnected client");
            }
            Ok(_) => {}
            Err(error) => tracing::warn!(?error, "failed to close edit sessions"),
        }
        tracing::info!(user_id = %self.user_id, "realtime connection closed");
    }
}
