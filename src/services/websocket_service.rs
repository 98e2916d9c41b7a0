use std::time::{Duration, SystemTime};

use axum::extract::ws::{CloseFrame, Message, WebSocket};
use futures::{SinkExt, StreamExt, stream::SplitSink};
use tokio::{
    sync::mpsc,
    task::JoinHandle,
    time::{Instant, timeout},
};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    dto::ws::{
        CLOSE_CONTEST_NOT_FOUND, CLOSE_TOKEN_EXPIRED, CLOSE_TOKEN_INVALID, ClientMessage,
    },
    error::ServiceError,
    services::{
        contest_service,
        room_actor::{RoomClosed, RoomCommand, RoomHandle},
        token_service::{AuthError, VerifiedToken},
    },
    state::{SharedState, contest::ConnectionId, room::AnswerSubmission},
};

/// Standard close code for unexpected server-side failures.
const CLOSE_INTERNAL_ERROR: u16 = 1011;

/// Handle the full lifecycle of one contest WebSocket.
///
/// The token is checked after the upgrade so the refusal can carry a close
/// code; the socket never reaches a room unless the token is valid for it.
pub async fn handle_socket(
    state: SharedState,
    socket: WebSocket,
    contest_id: String,
    token: Option<String>,
) {
    let (mut sender, mut receiver) = socket.split();

    let verified = match authenticate(&state, &contest_id, token.as_deref()) {
        Ok(verified) => verified,
        Err(err) => {
            let code = match err {
                AuthError::Expired => CLOSE_TOKEN_EXPIRED,
                AuthError::Invalid(_) => CLOSE_TOKEN_INVALID,
            };
            warn!(contest_id = %contest_id, error = %err, "websocket authentication failed");
            state.metrics().connection_rejected();
            reject(&mut sender, code, "authentication failed").await;
            return;
        }
    };

    let handle = match contest_service::resolve_room_for_join(&state, &contest_id, &verified).await {
        Ok(handle) => handle,
        Err(err) => {
            let (code, reason) = match err {
                ServiceError::NotFound(_) => (CLOSE_CONTEST_NOT_FOUND, "contest not found"),
                _ => (CLOSE_INTERNAL_ERROR, "room unavailable"),
            };
            warn!(contest_id = %contest_id, user_id = %verified.user_id, error = %err, "cannot attach socket to room");
            state.metrics().connection_rejected();
            reject(&mut sender, code, reason).await;
            return;
        }
    };

    let rooms = &state.config().rooms;
    let write_timeout = rooms.write_timeout;
    let (outbound_tx, outbound_rx) = mpsc::channel::<Message>(rooms.outbound_buffer);
    let control_tx = outbound_tx.downgrade();
    let mut writer_task = spawn_writer(sender, outbound_rx, write_timeout);
    let mut writer_done = false;

    let connection = Uuid::new_v4();
    state.metrics().connection_opened();
    info!(contest_id = %contest_id, user_id = %verified.user_id, %connection, "contest socket connected");

    let joined = handle
        .send(RoomCommand::Join {
            user_id: verified.user_id.clone(),
            username: verified.username.clone(),
            connection,
            outbound: outbound_tx,
        })
        .await;

    if joined.is_ok() {
        loop {
            tokio::select! {
                _ = &mut writer_task => {
                    writer_done = true;
                    debug!(%connection, "writer finished; closing reader");
                    break;
                }
                frame = receiver.next() => match frame {
                    Some(Ok(Message::Text(text))) => {
                        let received_at = Instant::now();
                        if let Err(err) = forward(&handle, &verified, connection, text.as_str(), received_at).await {
                            info!(%connection, error = %err, "room closed while forwarding");
                            break;
                        }
                    }
                    Some(Ok(Message::Ping(payload))) => {
                        let queued = control_tx
                            .upgrade()
                            .is_some_and(|tx| tx.try_send(Message::Pong(payload)).is_ok());
                        if !queued {
                            debug!(%connection, "dropping pong for saturated socket");
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(Message::Binary(_))) | Some(Ok(Message::Pong(_))) => {}
                    Some(Err(err)) => {
                        warn!(%connection, error = %err, "websocket error");
                        break;
                    }
                },
            }
        }

        if handle
            .send(RoomCommand::Leave {
                user_id: verified.user_id.clone(),
                connection,
            })
            .await
            .is_err()
        {
            debug!(%connection, "room already closed on leave");
        }
    }

    info!(contest_id = %contest_id, user_id = %verified.user_id, %connection, "contest socket disconnected");
    if !writer_done {
        finalize(writer_task, write_timeout).await;
    }
}

fn authenticate(
    state: &SharedState,
    contest_id: &str,
    token: Option<&str>,
) -> Result<VerifiedToken, AuthError> {
    let token = token
        .filter(|token| !token.is_empty())
        .ok_or_else(|| AuthError::Invalid("missing token".into()))?;
    let verified = state.tokens().verify(token)?;
    verified.authorize_contest(contest_id)?;
    Ok(verified)
}

/// Decode one text frame and enqueue the matching room command.
async fn forward(
    handle: &RoomHandle,
    token: &VerifiedToken,
    connection: ConnectionId,
    raw: &str,
    received_at: Instant,
) -> Result<(), RoomClosed> {
    match ClientMessage::from_json_str(raw) {
        Ok(ClientMessage::StartGame) => {
            handle
                .send(RoomCommand::StartGame {
                    user_id: token.user_id.clone(),
                    connection,
                })
                .await
        }
        Ok(ClientMessage::SubmitAnswer {
            question_id,
            answer,
        }) => {
            handle
                .send(RoomCommand::SubmitAnswer(AnswerSubmission {
                    user_id: token.user_id.clone(),
                    connection,
                    question_id,
                    answer,
                    received_at,
                    submitted_at: SystemTime::now(),
                }))
                .await
        }
        Ok(ClientMessage::Unknown(kind)) => {
            info!(%connection, kind = %kind, "ignoring unknown message type");
            Ok(())
        }
        Err(err) => {
            warn!(%connection, error = %err, "failed to parse client message");
            handle
                .send(RoomCommand::ProtocolError {
                    connection,
                    code: "MALFORMED_MESSAGE",
                    message: err.to_string(),
                })
                .await
        }
    }
}

/// Dedicated writer task: drains the bounded channel, giving up on a slow peer.
fn spawn_writer(
    mut sender: SplitSink<WebSocket, Message>,
    mut outbound_rx: mpsc::Receiver<Message>,
    write_timeout: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            let closing = matches!(message, Message::Close(_));
            match timeout(write_timeout, sender.send(message)).await {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    debug!(error = %err, "websocket write failed");
                    return;
                }
                Err(_) => {
                    warn!(timeout = ?write_timeout, "websocket write timed out; dropping socket");
                    return;
                }
            }
            if closing {
                return;
            }
        }

        if let Ok(Err(err)) = timeout(write_timeout, sender.close()).await {
            debug!(error = %err, "websocket close failed");
        }
    })
}

async fn reject(sender: &mut SplitSink<WebSocket, Message>, code: u16, reason: &'static str) {
    let frame = Message::Close(Some(CloseFrame {
        code,
        reason: reason.into(),
    }));
    if let Err(err) = sender.send(frame).await {
        debug!(error = %err, "failed to send close frame");
    }
}

/// Ensure the writer task winds down before we return from the socket handler.
async fn finalize(writer_task: JoinHandle<()>, limit: Duration) {
    if timeout(limit, writer_task).await.is_err() {
        debug!("writer task did not finish in time");
    }
}
