//! # pqrelay-gateway
//!
//! The session manager (C7): the authenticated WebSocket half of the
//! relay. Each connection gets a challenge–response handshake binding the
//! socket to an identity, then forwards envelopes between live sockets or
//! spills them into the durable offline queue, acking every serverbound
//! message along the way.

pub mod connections;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use connections::ConnectionTable;
use futures_util::{SinkExt, StreamExt};
use pqrelay_common::crypto::{generate_nonce, verify};
use pqrelay_common::wire::{
    clientbound_message, serverbound_message, Ack, AckError, Challenge, ChallengeResponse, ClientboundMessage,
    Forward, ServerboundMessage, NONCE_LEN, SIG_LEN,
};
use pqrelay_store::model::AuthIdentity;
use pqrelay_store::{identity, queue, Store};
use prost::Message as _;
use tokio::sync::mpsc;

/// Shared state handed to every upgraded connection: the store and the
/// process-wide connection table.
#[derive(Clone)]
pub struct GatewayState {
    pub store: Store,
    pub connections: ConnectionTable,
}

/// Builds the WebSocket route. State-erased, like `pqrelay_api::build_router`,
/// so the host can merge it with the HTTP router.
pub fn build_router(store: Store, connections: ConnectionTable) -> Router {
    Router::new()
        .route("/api/ws", get(ws_upgrade))
        .with_state(GatewayState { store, connections })
}

async fn ws_upgrade(State(state): State<GatewayState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state.store, state.connections))
}

/// Drives one socket through its entire lifecycle: handshake, queue drain,
/// then forwarding until the socket closes.
async fn handle_socket(socket: WebSocket, store: Store, connections: ConnectionTable) {
    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();

    let writer = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            if sink.send(message).await.is_err() {
                break;
            }
        }
    });

    let nonce = generate_nonce();
    if send_frame(&tx, clientbound_message::Payload::Challenge(Challenge { nonce: nonce.to_vec() })).is_err() {
        writer.abort();
        return;
    }

    let mut authed: Option<(i64, String)> = None;

    while let Some(Ok(message)) = stream.next().await {
        let bytes = match message {
            Message::Binary(bytes) => bytes,
            Message::Text(_) => {
                tracing::debug!("dropped a text frame, binary frames only");
                continue;
            }
            Message::Close(_) => break,
            _ => continue,
        };

        let Ok(serverbound) = ServerboundMessage::decode(bytes) else {
            if authed.is_none() {
                tracing::debug!("malformed frame before authentication, closing");
                break;
            }
            tracing::debug!("dropped a malformed frame from an authenticated socket");
            continue;
        };

        let message_id = serverbound.id;

        match (&authed, serverbound.payload) {
            (None, Some(serverbound_message::Payload::ChallengeResponse(response))) => {
                match authenticate(&store, &nonce, &response).await {
                    Ok(identity) => {
                        let id = identity.id;
                        connections.insert(id, tx.clone());
                        authed = Some((id, response.handle));
                        send_ack(&tx, message_id, None);
                        drain_queue(&store, id, &tx).await;
                    }
                    Err(error) => {
                        send_ack(&tx, message_id, Some(error));
                        break;
                    }
                }
            }
            (None, _) => {
                send_ack(&tx, message_id, Some(AckError::Unauthenticated));
                break;
            }
            (Some((_, sender_handle)), Some(serverbound_message::Payload::Forward(forward))) => {
                handle_forward(&store, &connections, sender_handle, message_id, forward, &tx).await;
            }
            (Some(_), _) => {
                send_ack(&tx, message_id, Some(AckError::InvalidMessage));
            }
        }
    }

    if let Some((id, _)) = authed {
        connections.remove_if_current(id, &tx);
    }
    drop(tx);
    let _ = writer.await;
}

/// Verifies a `ChallengeResponse` against the nonce this socket issued.
async fn authenticate(store: &Store, nonce: &[u8; NONCE_LEN], response: &ChallengeResponse) -> Result<AuthIdentity, AckError> {
    if response.signature.len() != SIG_LEN {
        return Err(AckError::InvalidSignature);
    }

    let identity = identity::resolve_for_auth(store.pool(), &response.handle)
        .await
        .map_err(|err| {
            tracing::error!(%err, "store failure resolving identity during handshake");
            AckError::ServerError
        })?
        .ok_or(AckError::UnknownIdentity)?;

    if !verify(&identity.ik, nonce, &response.signature) {
        return Err(AckError::InvalidSignature);
    }

    Ok(identity)
}

/// Sends every envelope queued for `id` over this (now authenticated)
/// socket, deleting each row once its bytes have been handed off.
async fn drain_queue(store: &Store, id: i64, tx: &mpsc::UnboundedSender<Message>) {
    let rows = match queue::list_for(store.pool(), id).await {
        Ok(rows) => rows,
        Err(err) => {
            tracing::error!(%err, id, "failed to list queued envelopes");
            return;
        }
    };

    for row in rows {
        if tx.send(Message::Binary(row.msg.into())).is_err() {
            break;
        }
        if let Err(err) = queue::delete(store.pool(), row.row_id).await {
            tracing::warn!(%err, row_id = row.row_id, "failed to delete drained queue row, may redeliver");
        }
    }
}

/// Resolves the target, rewrites `handle` to the sender's, and delivers
/// either online (via the connection table) or by spilling to the queue.
async fn handle_forward(
    store: &Store,
    connections: &ConnectionTable,
    sender_handle: &str,
    message_id: i64,
    forward: Forward,
    tx: &mpsc::UnboundedSender<Message>,
) {
    let Some(payload) = forward.payload else {
        send_ack(tx, message_id, Some(AckError::InvalidMessage));
        return;
    };

    let target = match identity::resolve_for_auth(store.pool(), &forward.handle).await {
        Ok(Some(identity)) => identity,
        Ok(None) => {
            send_ack(tx, message_id, Some(AckError::UnknownIdentity));
            return;
        }
        Err(err) => {
            tracing::error!(%err, "store failure resolving forward target");
            send_ack(tx, message_id, Some(AckError::ServerError));
            return;
        }
    };

    let envelope = ClientboundMessage {
        payload: Some(clientbound_message::Payload::Forward(Forward {
            handle: sender_handle.to_string(),
            payload: Some(payload),
        })),
    };
    let bytes = envelope.encode_to_vec();

    send_ack(tx, message_id, None);

    if !connections.send_binary(target.id, bytes.clone()) {
        if let Err(err) = queue::enqueue(store.pool(), target.id, &bytes).await {
            tracing::error!(%err, target = target.id, "failed to enqueue offline envelope");
        }
    }
}

fn send_ack(tx: &mpsc::UnboundedSender<Message>, message_id: i64, error: Option<AckError>) {
    let ack = Ack { message_id, error: error.unwrap_or(AckError::None) as i32 };
    let _ = send_frame(tx, clientbound_message::Payload::Ack(ack));
}

fn send_frame(tx: &mpsc::UnboundedSender<Message>, payload: clientbound_message::Payload) -> Result<(), ()> {
    let frame = ClientboundMessage { payload: Some(payload) };
    tx.send(Message::Binary(frame.encode_to_vec().into())).map_err(|_| ())
}
