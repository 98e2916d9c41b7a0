//! One task per contest room.
//!
//! The actor owns the [`Room`] and the outbound channel of every attached
//! socket. Commands arrive through a bounded queue and are applied strictly in
//! order; the per-question timer is the only other wake-up source. Fan-out
//! never awaits a client: a socket whose buffer is full is dropped.

use std::{
    collections::{HashMap, VecDeque},
    sync::Arc,
};

use axum::extract::ws::{CloseFrame, Message};
use thiserror::Error;
use tokio::{
    sync::{
        mpsc::{self, error::TrySendError},
        oneshot, watch,
    },
    time::{Instant, sleep_until},
};
use tracing::{debug, info, warn};

use crate::{
    dto::{
        contest::StandingsResponse,
        ws::{CLOSE_ROOM_CLOSED, ErrorPayload, ServerMessage},
    },
    services::persistence_service::PersistenceGateway,
    state::{
        contest::ConnectionId,
        metrics::Metrics,
        room::{AnswerSubmission, Delivery, Room, RoomInfo, RoomLifecycle},
        state_machine::ContestStatus,
    },
};

/// Commands processed by a room actor.
#[derive(Debug)]
pub enum RoomCommand {
    /// Attach a socket, creating the participant on first join.
    Join {
        /// Verified user id.
        user_id: String,
        /// Display name.
        username: String,
        /// Socket identity.
        connection: ConnectionId,
        /// Bounded writer channel of the socket.
        outbound: mpsc::Sender<Message>,
    },
    /// Detach a socket.
    Leave {
        /// Verified user id.
        user_id: String,
        /// Socket identity.
        connection: ConnectionId,
    },
    /// Host request to begin.
    StartGame {
        /// Requesting user.
        user_id: String,
        /// Socket to notify on rejection.
        connection: ConnectionId,
    },
    /// Answer for the live question.
    SubmitAnswer(AnswerSubmission),
    /// Frame that could not be decoded; answered with an `ERROR` event.
    ProtocolError {
        /// Offending socket.
        connection: ConnectionId,
        /// Machine-readable code.
        code: &'static str,
        /// Human-readable detail.
        message: String,
    },
    /// Read-only standings query.
    Standings {
        /// Reply channel.
        reply: oneshot::Sender<StandingsResponse>,
    },
    /// Close every socket and stop the actor.
    Shutdown,
}

/// Error returned when the actor has stopped.
#[derive(Debug, Clone, Error)]
#[error("room `{0}` is closed")]
pub struct RoomClosed(pub String);

/// Shared collaborators of every room actor.
#[derive(Clone)]
pub struct RoomDeps {
    /// Destination of the final results.
    pub persistence: PersistenceGateway,
    /// Process counters.
    pub metrics: Arc<Metrics>,
    /// Capacity of the command queue.
    pub queue_capacity: usize,
}

/// Cloneable address of a running room actor.
#[derive(Debug, Clone)]
pub struct RoomHandle {
    info: Arc<RoomInfo>,
    total_questions: usize,
    commands: mpsc::Sender<RoomCommand>,
    lifecycle: watch::Receiver<RoomLifecycle>,
}

impl RoomHandle {
    /// Contest identifier.
    pub fn contest_id(&self) -> &str {
        &self.info.contest_id
    }

    /// Contest metadata.
    pub fn info(&self) -> &RoomInfo {
        &self.info
    }

    /// Size of the immutable question set.
    pub fn total_questions(&self) -> usize {
        self.total_questions
    }

    /// Latest lifecycle snapshot published by the actor.
    pub fn lifecycle(&self) -> RoomLifecycle {
        *self.lifecycle.borrow()
    }

    /// Whether the actor has stopped.
    pub fn is_closed(&self) -> bool {
        self.commands.is_closed()
    }

    /// Enqueue a command, waiting for queue capacity.
    pub async fn send(&self, command: RoomCommand) -> Result<(), RoomClosed> {
        self.commands
            .send(command)
            .await
            .map_err(|_| RoomClosed(self.info.contest_id.clone()))
    }

    /// Ask the actor for the current standings.
    pub async fn standings(&self) -> Result<StandingsResponse, RoomClosed> {
        let (reply, response) = oneshot::channel();
        self.send(RoomCommand::Standings { reply }).await?;
        response
            .await
            .map_err(|_| RoomClosed(self.info.contest_id.clone()))
    }

    /// Stop the actor, closing attached sockets.
    pub async fn shutdown(&self) {
        if self.send(RoomCommand::Shutdown).await.is_err() {
            debug!(contest_id = %self.contest_id(), "room already stopped");
        }
    }
}

struct Subscriber {
    user_id: String,
    outbound: mpsc::Sender<Message>,
}

/// Spawn the actor task for `room` and return its handle.
pub fn spawn_room(room: Room, deps: RoomDeps) -> RoomHandle {
    let (commands, inbox) = mpsc::channel(deps.queue_capacity.max(1));
    let (lifecycle_tx, lifecycle) = watch::channel(room.lifecycle());

    let handle = RoomHandle {
        info: Arc::new(room.info().clone()),
        total_questions: room.total_questions(),
        commands,
        lifecycle,
    };

    tokio::spawn(run(room, inbox, lifecycle_tx, deps));
    handle
}

async fn run(
    mut room: Room,
    mut inbox: mpsc::Receiver<RoomCommand>,
    lifecycle: watch::Sender<RoomLifecycle>,
    deps: RoomDeps,
) {
    let contest_id = room.info().contest_id.clone();
    let mut sockets: HashMap<ConnectionId, Subscriber> = HashMap::new();
    let mut persisted = false;

    info!(contest_id = %contest_id, questions = room.total_questions(), "room actor started");

    loop {
        let wakeup = room.next_wakeup();
        let deliveries = tokio::select! {
            biased;

            command = inbox.recv() => match command {
                Some(RoomCommand::Shutdown) | None => break,
                Some(command) => handle_command(&mut room, &mut sockets, command, &deps.metrics),
            },
            _ = sleep_until(wakeup.unwrap_or_else(Instant::now)), if wakeup.is_some() => {
                room.on_timer(Instant::now())
            }
        };

        dispatch(&mut room, &mut sockets, deliveries, &deps.metrics);

        if room.status() == ContestStatus::Finished && !persisted {
            persisted = true;
            deps.metrics.contest_finished();
            let outcome = room.outcome();
            let gateway = deps.persistence.clone();
            info!(contest_id = %contest_id, sink = %gateway.describe(), "contest finished; persisting results");
            tokio::spawn(async move {
                if let Err(err) = gateway.save_results(&outcome).await {
                    debug!(error = %err, "persistence task ended with an error");
                }
            });
        }

        lifecycle.send_replace(room.lifecycle());
    }

    close_all(&contest_id, sockets);
    info!(contest_id = %contest_id, "room actor stopped");
}

fn handle_command(
    room: &mut Room,
    sockets: &mut HashMap<ConnectionId, Subscriber>,
    command: RoomCommand,
    metrics: &Metrics,
) -> Vec<Delivery> {
    let now = Instant::now();
    match command {
        RoomCommand::Join {
            user_id,
            username,
            connection,
            outbound,
        } => {
            sockets.insert(
                connection,
                Subscriber {
                    user_id: user_id.clone(),
                    outbound,
                },
            );
            info!(contest_id = %room.info().contest_id, user_id = %user_id, %connection, "socket joined room");
            room.join(&user_id, &username, connection, now)
        }
        RoomCommand::Leave {
            user_id,
            connection,
        } => {
            if sockets.remove(&connection).is_none() {
                return Vec::new();
            }
            info!(contest_id = %room.info().contest_id, user_id = %user_id, %connection, "socket left room");
            room.leave(&user_id, connection, now)
        }
        RoomCommand::StartGame {
            user_id,
            connection,
        } => match room.start(&user_id, now) {
            Ok(deliveries) => {
                info!(contest_id = %room.info().contest_id, user_id = %user_id, "contest started");
                deliveries
            }
            Err(err) => {
                warn!(
                    contest_id = %room.info().contest_id,
                    user_id = %user_id,
                    code = err.code(),
                    error = %err,
                    "start rejected"
                );
                vec![Room::command_rejected(connection, &err)]
            }
        },
        RoomCommand::SubmitAnswer(submission) => match room.submit(&submission) {
            Ok(deliveries) => {
                metrics.answer_accepted();
                deliveries
            }
            Err(err) => {
                metrics.answer_rejected();
                info!(
                    contest_id = %room.info().contest_id,
                    user_id = %submission.user_id,
                    question_id = %submission.question_id,
                    code = err.code(),
                    "answer rejected"
                );
                vec![room.answer_rejected(&submission, &err)]
            }
        },
        RoomCommand::ProtocolError {
            connection,
            code,
            message,
        } => vec![Delivery::Unicast(
            connection,
            ServerMessage::Error(ErrorPayload {
                code: code.to_string(),
                message,
            }),
        )],
        RoomCommand::Standings { reply } => {
            if reply.send(room.standings()).is_err() {
                debug!("standings requester went away");
            }
            Vec::new()
        }
        RoomCommand::Shutdown => Vec::new(),
    }
}

/// Fan deliveries out without awaiting; sockets that cannot keep up are detached.
fn dispatch(
    room: &mut Room,
    sockets: &mut HashMap<ConnectionId, Subscriber>,
    deliveries: Vec<Delivery>,
    metrics: &Metrics,
) {
    let mut queue = VecDeque::from(deliveries);
    let mut stale = Vec::new();

    while let Some(delivery) = queue.pop_front() {
        let (targets, message) = match delivery {
            Delivery::Broadcast(message) => (sockets.keys().copied().collect::<Vec<_>>(), message),
            Delivery::Unicast(connection, message) => (vec![connection], message),
        };

        let payload = match serde_json::to_string(&message) {
            Ok(payload) => payload,
            Err(err) => {
                warn!(error = %err, "failed to serialize message `{message:?}`");
                continue;
            }
        };
        let frame = Message::Text(payload.into());

        for connection in targets {
            let Some(subscriber) = sockets.get(&connection) else {
                continue;
            };
            match subscriber.outbound.try_send(frame.clone()) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    metrics.slow_consumer_dropped();
                    warn!(
                        contest_id = %room.info().contest_id,
                        user_id = %subscriber.user_id,
                        %connection,
                        "outbound buffer full; dropping slow socket"
                    );
                    stale.push(connection);
                }
                Err(TrySendError::Closed(_)) => stale.push(connection),
            }
        }

        for connection in stale.drain(..) {
            if let Some(subscriber) = sockets.remove(&connection) {
                queue.extend(room.leave(&subscriber.user_id, connection, Instant::now()));
            }
        }
    }
}

fn close_all(contest_id: &str, sockets: HashMap<ConnectionId, Subscriber>) {
    for (connection, subscriber) in sockets {
        let frame = Message::Close(Some(CloseFrame {
            code: CLOSE_ROOM_CLOSED,
            reason: "room closed".into(),
        }));
        if subscriber.outbound.try_send(frame).is_err() {
            debug!(contest_id = %contest_id, %connection, "socket gone before room close");
        }
    }
}
