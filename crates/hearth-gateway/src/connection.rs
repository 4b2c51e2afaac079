use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{info, warn};

use hearth_db::Database;
use hearth_types::events::{GatewayCommand, GatewayEvent};

use crate::dispatcher::Dispatcher;

/// Ping cadence. A connection that misses 2 consecutive Pongs (~30s of
/// silence) is dropped.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

/// Handle a pre-authenticated websocket connection. The JWT was already
/// validated at the HTTP upgrade layer, so we go straight to Ready and the
/// event loop. The connection forwards only events for conversations the
/// client has subscribed to — and subscriptions are granted per conversation
/// by the membership predicate.
pub async fn handle_connection(
    socket: WebSocket,
    dispatcher: Dispatcher,
    db: Arc<Database>,
    user_id: i64,
) {
    let (mut sender, mut receiver) = socket.split();

    info!("user {} connected to gateway", user_id);

    let ready = GatewayEvent::Ready { user_id };
    let Ok(ready_json) = serde_json::to_string(&ready) else {
        return;
    };
    if sender.send(Message::Text(ready_json.into())).await.is_err() {
        return;
    }

    // Per-connection conversation subscriptions (shared between send and
    // recv tasks).
    let subscriptions: Arc<std::sync::RwLock<HashSet<i64>>> =
        Arc::new(std::sync::RwLock::new(HashSet::new()));
    let send_subscriptions = subscriptions.clone();

    // Replies from the recv task (Subscribed acks) are funneled to the
    // single socket writer.
    let (reply_tx, mut reply_rx) = mpsc::unbounded_channel::<GatewayEvent>();

    // Shared flag for heartbeat
    let pong_received = Arc::new(AtomicBool::new(true));
    let pong_flag_send = pong_received.clone();
    let pong_flag_recv = pong_received.clone();

    let mut broadcast_rx = dispatcher.subscribe();

    // Forward subscribed broadcasts + replies -> client, with heartbeat
    let mut send_task = tokio::spawn(async move {
        let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
        heartbeat.tick().await;
        let mut missed_heartbeats: u8 = 0;

        loop {
            tokio::select! {
                result = broadcast_rx.recv() => {
                    let event = match result {
                        Ok(event) => event,
                        Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                            warn!("Broadcast receiver lagged by {} events", n);
                            continue;
                        }
                        Err(_) => break,
                    };

                    if let Some(conversation_id) = event.conversation_id() {
                        let subs = send_subscriptions.read()
                            .expect("subscription lock poisoned");
                        if !subs.contains(&conversation_id) {
                            continue;
                        }
                    }

                    let Ok(text) = serde_json::to_string(&event) else {
                        continue;
                    };
                    if sender.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                result = reply_rx.recv() => {
                    let Some(event) = result else { break };
                    let Ok(text) = serde_json::to_string(&event) else {
                        continue;
                    };
                    if sender.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                _ = heartbeat.tick() => {
                    if pong_flag_send.swap(false, Ordering::Acquire) {
                        missed_heartbeats = 0;
                    } else {
                        missed_heartbeats += 1;
                        if missed_heartbeats >= 2 {
                            warn!("Heartbeat timeout (missed {} pongs), dropping connection", missed_heartbeats);
                            break;
                        }
                    }
                    if sender.send(Message::Ping(vec![].into())).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    // Commands from the client: today only Subscribe.
    let recv_db = db.clone();
    let recv_subscriptions = subscriptions.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => {
                    match serde_json::from_str::<GatewayCommand>(&text) {
                        Ok(GatewayCommand::Subscribe { conversation_ids }) => {
                            let granted =
                                authorize_subscriptions(&recv_db, user_id, conversation_ids)
                                    .await;
                            {
                                let mut subs = recv_subscriptions
                                    .write()
                                    .expect("subscription lock poisoned");
                                *subs = granted.iter().copied().collect();
                            }
                            let _ = reply_tx.send(GatewayEvent::Subscribed {
                                conversation_ids: granted,
                            });
                        }
                        Err(e) => {
                            warn!(
                                "user {} bad command: {} -- raw: {}",
                                user_id,
                                e,
                                &text[..text.len().min(200)]
                            );
                        }
                    }
                }
                Message::Pong(_) => {
                    pong_flag_recv.store(true, Ordering::Release);
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    // Either side closing tears down the other.
    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    info!("user {} disconnected from gateway", user_id);
}

/// The subscribe-time authorization predicate: a subject may subscribe to a
/// conversation's events iff it is that conversation's guest or the owner
/// of its property. Rejected ids are logged and dropped from the grant.
pub async fn authorize_subscriptions(
    db: &Arc<Database>,
    user_id: i64,
    requested: Vec<i64>,
) -> Vec<i64> {
    let db = db.clone();
    let result = tokio::task::spawn_blocking(move || {
        let mut granted = Vec::with_capacity(requested.len());
        for conversation_id in requested {
            match db.is_participant(conversation_id, user_id) {
                Ok(true) => granted.push(conversation_id),
                Ok(false) => {
                    warn!(
                        "user {} denied subscription to conversation {}",
                        user_id, conversation_id
                    );
                }
                Err(e) => {
                    warn!(
                        "subscription check failed for conversation {}: {}",
                        conversation_id, e
                    );
                }
            }
        }
        granted
    })
    .await;

    match result {
        Ok(granted) => granted,
        Err(e) => {
            warn!("spawn_blocking join error: {}", e);
            Vec::new()
        }
    }
}
