use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use chatcoder_crypto::TokenService;
use chatcoder_types::events::{GatewayCommand, GatewayEvent};

use crate::dispatcher::Dispatcher;

/// Heartbeat interval: server sends a Ping every 15 seconds.
/// If 2 consecutive Pongs are missed (~30s), the connection is dropped.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

/// How long a socket without an upgrade token has to send Identify.
const IDENTIFY_TIMEOUT: Duration = Duration::from_secs(10);

/// Handle a WebSocket whose bearer token was verified at the HTTP upgrade.
pub async fn handle_connection_authenticated(
    socket: WebSocket,
    dispatcher: Dispatcher,
    username: String,
) {
    let (sender, receiver) = socket.split();
    run_connection(sender, receiver, dispatcher, username).await;
}

/// Handle a WebSocket that must authenticate with an Identify command first.
pub async fn handle_connection(socket: WebSocket, dispatcher: Dispatcher, tokens: TokenService) {
    let (mut sender, mut receiver) = socket.split();

    let username = match wait_for_identify(&mut receiver, &tokens).await {
        Some(username) => username,
        None => {
            warn!("WebSocket client failed to identify, closing");
            let rejected = GatewayEvent::Error {
                message: "Authentication failed".into(),
            };
            if let Some(text) = encode(&rejected) {
                let _ = sender.send(Message::Text(text.into())).await;
            }
            let _ = sender.send(Message::Close(None)).await;
            return;
        }
    };

    run_connection(sender, receiver, dispatcher, username).await;
}

async fn wait_for_identify(
    receiver: &mut SplitStream<WebSocket>,
    tokens: &TokenService,
) -> Option<String> {
    let identify = async {
        while let Some(Ok(msg)) = receiver.next().await {
            if let Message::Text(text) = msg {
                if let Ok(GatewayCommand::Identify { token }) =
                    serde_json::from_str::<GatewayCommand>(&text)
                {
                    return tokens.verify(&token).map(|claims| claims.username);
                }
            }
        }
        None
    };

    tokio::time::timeout(IDENTIFY_TIMEOUT, identify)
        .await
        .ok()
        .flatten()
}

fn encode(event: &GatewayEvent) -> Option<String> {
    match serde_json::to_string(event) {
        Ok(text) => Some(text),
        Err(e) => {
            error!("Failed to serialize gateway event: {}", e);
            None
        }
    }
}

async fn run_connection(
    mut sender: SplitSink<WebSocket, Message>,
    mut receiver: SplitStream<WebSocket>,
    dispatcher: Dispatcher,
    username: String,
) {
    let conn_id = Uuid::new_v4();
    info!("{} connected to gateway ({})", username, conn_id);

    // Subscribe before joining so this connection sees its own online-count.
    // Broadcasts queue up until the send task starts, so ready still goes first.
    let mut broadcast_rx = dispatcher.subscribe();
    dispatcher.join(&username, conn_id).await;

    let ready = GatewayEvent::Ready {
        username: username.clone(),
        online_users: dispatcher.online_users().await,
    };
    let sent = match encode(&ready) {
        Some(text) => sender.send(Message::Text(text.into())).await.is_ok(),
        None => false,
    };
    if !sent {
        dispatcher.leave(&username, conn_id).await;
        return;
    }

    // Events addressed to this connection only.
    let (direct_tx, mut direct_rx) = mpsc::unbounded_channel::<GatewayEvent>();

    let pong_received = Arc::new(AtomicBool::new(true));
    let pong_flag_send = pong_received.clone();
    let pong_flag_recv = pong_received;

    let username_send = username.clone();
    let mut send_task = tokio::spawn(async move {
        let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
        heartbeat.tick().await;
        let mut missed_heartbeats: u8 = 0;

        loop {
            tokio::select! {
                result = broadcast_rx.recv() => {
                    let msg = match result {
                        Ok(msg) => msg,
                        Err(RecvError::Lagged(n)) => {
                            // Skipping would leave a gap in the client's view of the order.
                            warn!("{} lagged by {} events, closing", username_send, n);
                            let _ = sender.send(Message::Close(None)).await;
                            break;
                        }
                        Err(RecvError::Closed) => break,
                    };

                    if msg.except == Some(conn_id) {
                        continue;
                    }

                    if sender.send(Message::Text(msg.json.to_string().into())).await.is_err() {
                        break;
                    }
                }
                result = direct_rx.recv() => {
                    let Some(event) = result else { break };
                    let Some(text) = encode(&event) else { continue };
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

    let dispatcher_recv = dispatcher.clone();
    let username_recv = username.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => match serde_json::from_str::<GatewayCommand>(&text) {
                    Ok(cmd) => {
                        handle_command(&dispatcher_recv, &username_recv, cmd, &direct_tx).await;
                    }
                    Err(e) => {
                        warn!(
                            "{} bad command: {} -- raw: {}",
                            username_recv,
                            e,
                            text.chars().take(200).collect::<String>()
                        );
                    }
                },
                Message::Pong(_) => {
                    pong_flag_recv.store(true, Ordering::Release);
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    // Wait for either task to finish
    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    dispatcher.leave(&username, conn_id).await;
    info!("{} disconnected from gateway ({})", username, conn_id);
}

async fn handle_command(
    dispatcher: &Dispatcher,
    username: &str,
    cmd: GatewayCommand,
    direct_tx: &mpsc::UnboundedSender<GatewayEvent>,
) {
    match cmd {
        GatewayCommand::Identify { .. } => {
            debug!("{} sent identify on an authenticated socket, ignoring", username);
        }

        GatewayCommand::SendMessage { content } => {
            let content = content.trim();
            if content.is_empty() {
                debug!("{} sent empty message, dropped", username);
                return;
            }

            if let Err(e) = dispatcher.publish(username, content).await {
                error!("Failed to publish message from {}: {}", username, e);
                let _ = direct_tx.send(GatewayEvent::Error {
                    message: "Failed to save message".into(),
                });
            }
        }
    }
}
