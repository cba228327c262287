use std::{sync::Arc, time::Duration};

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use serde::Serialize;
use tokio::{sync::mpsc, task::JoinHandle};
use tokio_stream::wrappers::{BroadcastStream, errors::BroadcastStreamRecvError};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    dto::{
        events::ServerEvent,
        room::{CreateRoomInput, RoomSummary},
        ws::{ClientMessage, ErrorReply, JoinedReply},
    },
    services::{room_service, timer_service, trivia_service},
    state::{RoomHandle, SharedState},
};

const IDENT_TIMEOUT: Duration = Duration::from_secs(10);

/// Handle the full lifecycle of a participant WebSocket connection.
///
/// The first frame must create or join a room within [`IDENT_TIMEOUT`];
/// everything after that is room-scoped actions until the socket closes, at
/// which point the connection is removed from every room containing it.
pub async fn handle_socket(state: SharedState, socket: WebSocket) {
    let (mut sender, mut receiver) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Message>();

    // Dedicated writer task keeps outbound messages flowing even while we await inbound frames.
    let writer_task = tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            if sender.send(message).await.is_err() {
                break;
            }
        }
    });

    let initial_message = match tokio::time::timeout(IDENT_TIMEOUT, receiver.next()).await {
        Ok(Some(Ok(Message::Text(text)))) => text,
        Ok(Some(Ok(Message::Close(_)))) => {
            finalize(writer_task, outbound_tx).await;
            return;
        }
        Ok(Some(Ok(_))) => {
            let _ = outbound_tx.send(Message::Close(None));
            finalize(writer_task, outbound_tx).await;
            return;
        }
        Ok(Some(Err(err))) => {
            warn!(error = %err, "websocket receive error");
            finalize(writer_task, outbound_tx).await;
            return;
        }
        Ok(None) | Err(_) => {
            warn!("websocket handshake timed out");
            finalize(writer_task, outbound_tx).await;
            return;
        }
    };

    let inbound = match ClientMessage::from_json_str(&initial_message) {
        Ok(message) => message,
        Err(err) => {
            warn!(error = %err, "failed to parse or validate handshake message");
            send_event_to_connection(
                &outbound_tx,
                "error",
                &ErrorReply { message: err },
                "handshake failure",
            );
            let _ = outbound_tx.send(Message::Close(None));
            finalize(writer_task, outbound_tx).await;
            return;
        }
    };

    let connection_id = Uuid::new_v4();
    let handle = match inbound {
        ClientMessage::CreateRoom {
            username,
            study_duration_secs,
            break_duration_secs,
            trivia_enabled,
            topic,
            difficulty,
            question_time_limit_secs,
        } => {
            let input = CreateRoomInput {
                username,
                study_duration_secs,
                break_duration_secs,
                trivia_enabled,
                topic,
                difficulty,
                question_time_limit_secs,
            };
            room_service::create_room(&state, connection_id, input).await
        }
        ClientMessage::JoinRoom { code, username } => {
            match room_service::join_room(&state, &code, connection_id, username).await {
                Ok(handle) => handle,
                Err(err) => {
                    send_event_to_connection(
                        &outbound_tx,
                        "error",
                        &ErrorReply {
                            message: err.to_string(),
                        },
                        "join failure",
                    );
                    let _ = outbound_tx.send(Message::Close(None));
                    finalize(writer_task, outbound_tx).await;
                    return;
                }
            }
        }
        _ => {
            warn!("first message must create or join a room");
            let _ = outbound_tx.send(Message::Close(None));
            finalize(writer_task, outbound_tx).await;
            return;
        }
    };

    info!(code = handle.code(), connection = %connection_id, "participant connected");

    // Forward room-scoped broadcasts to this socket for as long as it lives.
    let forwarder_task = spawn_event_forwarder(handle.clone(), outbound_tx.clone());

    {
        let room = handle.lock().await;
        send_event_to_connection(
            &outbound_tx,
            "joined",
            &JoinedReply {
                connection_id,
                room: RoomSummary::from(&*room),
            },
            "join acknowledgement",
        );
    }

    while let Some(message) = receiver.next().await {
        match message {
            Ok(Message::Text(text)) => match ClientMessage::from_json_str(&text) {
                Ok(message) => {
                    if dispatch(&state, &handle, connection_id, message, &outbound_tx).await {
                        break;
                    }
                }
                Err(err) => {
                    warn!(connection = %connection_id, error = %err, "failed to parse or validate client message");
                }
            },
            Ok(Message::Ping(payload)) => {
                let _ = outbound_tx.send(Message::Pong(payload));
            }
            Ok(Message::Close(frame)) => {
                info!(connection = %connection_id, "participant closed the socket");
                let _ = outbound_tx.send(Message::Close(frame));
                break;
            }
            Ok(Message::Binary(_)) => {}
            Ok(Message::Pong(_)) => {}
            Err(err) => {
                warn!(connection = %connection_id, error = %err, "websocket error");
                break;
            }
        }
    }

    room_service::handle_disconnect(&state, connection_id).await;
    info!(code = handle.code(), connection = %connection_id, "participant disconnected");

    forwarder_task.abort();
    finalize(writer_task, outbound_tx).await;
}

/// Apply one room-scoped client action. Returns `true` when the connection
/// should wind down (explicit leave).
async fn dispatch(
    state: &SharedState,
    handle: &Arc<RoomHandle>,
    connection_id: Uuid,
    message: ClientMessage,
    outbound_tx: &mpsc::UnboundedSender<Message>,
) -> bool {
    match message {
        ClientMessage::CreateRoom { .. } | ClientMessage::JoinRoom { .. } => {
            warn!(connection = %connection_id, "ignoring duplicate room handshake");
        }
        ClientMessage::GetRoom => {
            let room = handle.lock().await;
            send_event_to_connection(
                outbound_tx,
                "room.snapshot",
                &RoomSummary::from(&*room),
                "room snapshot",
            );
        }
        ClientMessage::LeaveRoom => return true,
        ClientMessage::StartTimer => timer_service::start_timer(state, handle, connection_id).await,
        ClientMessage::PauseTimer => timer_service::pause_timer(handle, connection_id).await,
        ClientMessage::SkipTimer => timer_service::skip_timer(state, handle, connection_id).await,
        ClientMessage::SelectTopic {
            topic,
            notes_ref,
            difficulty,
            question_time_limit_secs,
        } => {
            trivia_service::select_topic(
                state,
                handle,
                topic,
                notes_ref,
                difficulty,
                question_time_limit_secs,
            )
            .await;
        }
        ClientMessage::SubmitAnswer {
            question_id,
            answer_index,
            time_remaining_secs,
        } => {
            trivia_service::submit_answer(
                state,
                handle,
                connection_id,
                question_id,
                answer_index,
                time_remaining_secs,
                outbound_tx,
            )
            .await;
        }
        ClientMessage::Unknown => {
            warn!(connection = %connection_id, "ignoring unknown message type");
        }
    }
    false
}

/// Pump events from the room hub into this connection's writer queue.
fn spawn_event_forwarder(
    handle: Arc<RoomHandle>,
    tx: mpsc::UnboundedSender<Message>,
) -> JoinHandle<()> {
    let mut events = BroadcastStream::new(handle.hub().subscribe());
    tokio::spawn(async move {
        while let Some(event) = events.next().await {
            match event {
                Ok(event) => {
                    let Ok(payload) = serde_json::to_string(&event) else {
                        continue;
                    };
                    if tx.send(Message::Text(payload.into())).is_err() {
                        break;
                    }
                }
                Err(BroadcastStreamRecvError::Lagged(missed)) => {
                    warn!(missed, "slow participant stream; events dropped");
                }
            }
        }
    })
}

/// Serialize an event and push it onto a single connection's writer queue.
pub(crate) fn send_event_to_connection<T>(
    tx: &mpsc::UnboundedSender<Message>,
    event: &str,
    payload: &T,
    context: &str,
) where
    T: Serialize,
{
    let event = match ServerEvent::json(event, payload) {
        Ok(event) => event,
        Err(err) => {
            warn!(context, error = %err, "failed to serialize reply payload");
            return;
        }
    };
    let Ok(text) = serde_json::to_string(&event) else {
        return;
    };
    if tx.send(Message::Text(text.into())).is_err() {
        debug!(context, "connection closed before delivery");
    }
}

/// Ensure the writer task winds down before we return from the socket handler.
async fn finalize(writer_task: JoinHandle<()>, outbound_tx: mpsc::UnboundedSender<Message>) {
    drop(outbound_tx);
    let _ = writer_task.await;
}
