use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use chatcoder_db::{MessageStore, SharedStore, StoreError};
use chatcoder_types::events::GatewayEvent;
use chatcoder_types::models::Message;

const BROADCAST_CAPACITY: usize = 1024;
const COMMAND_CAPACITY: usize = 256;

/// One event on the broadcast channel, serialized once for every subscriber.
#[derive(Debug, Clone)]
pub struct Broadcast {
    pub json: Arc<str>,
    /// Connection that must not receive this event.
    pub except: Option<Uuid>,
}

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("store task failed: {0}")]
    Task(String),

    #[error("dispatcher is shut down")]
    Closed,
}

enum Command {
    Join {
        username: String,
        conn_id: Uuid,
        done: oneshot::Sender<()>,
    },
    Leave {
        username: String,
        conn_id: Uuid,
    },
    Publish {
        author: String,
        content: String,
        reply: oneshot::Sender<Result<Message, DispatchError>>,
    },
    OnlineCount {
        reply: oneshot::Sender<usize>,
    },
    OnlineUsers {
        reply: oneshot::Sender<Vec<String>>,
    },
}

/// Handle to the task that commits messages and fans events out.
///
/// Every append and every presence change runs on that single task, so all
/// subscribers see one global order that matches store order.
#[derive(Clone)]
pub struct Dispatcher {
    commands: mpsc::Sender<Command>,
    broadcast_tx: broadcast::Sender<Broadcast>,
}

impl Dispatcher {
    /// Spawn the dispatcher task. Must be called inside a tokio runtime.
    /// The task exits once every handle is dropped.
    pub fn spawn(store: SharedStore) -> Self {
        let (broadcast_tx, _) = broadcast::channel(BROADCAST_CAPACITY);
        let (commands, rx) = mpsc::channel(COMMAND_CAPACITY);

        let actor = Actor {
            store,
            presence: crate::Presence::new(),
            broadcast_tx: broadcast_tx.clone(),
        };
        tokio::spawn(actor.run(rx));

        Self {
            commands,
            broadcast_tx,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Broadcast> {
        self.broadcast_tx.subscribe()
    }

    /// Register a connection. Resolves once the presence change and its
    /// events have been committed.
    pub async fn join(&self, username: &str, conn_id: Uuid) {
        let (done, wait) = oneshot::channel();
        let cmd = Command::Join {
            username: username.to_string(),
            conn_id,
            done,
        };
        if self.commands.send(cmd).await.is_ok() {
            let _ = wait.await;
        }
    }

    pub async fn leave(&self, username: &str, conn_id: Uuid) {
        let cmd = Command::Leave {
            username: username.to_string(),
            conn_id,
        };
        if self.commands.send(cmd).await.is_err() {
            warn!("Dispatcher gone, dropping leave for {}", username);
        }
    }

    /// Persist a message and broadcast it. Nothing is broadcast on failure.
    pub async fn publish(&self, author: &str, content: &str) -> Result<Message, DispatchError> {
        let (reply, wait) = oneshot::channel();
        let cmd = Command::Publish {
            author: author.to_string(),
            content: content.to_string(),
            reply,
        };
        self.commands
            .send(cmd)
            .await
            .map_err(|_| DispatchError::Closed)?;
        wait.await.map_err(|_| DispatchError::Closed)?
    }

    pub async fn online_count(&self) -> usize {
        let (reply, wait) = oneshot::channel();
        if self.commands.send(Command::OnlineCount { reply }).await.is_err() {
            return 0;
        }
        wait.await.unwrap_or(0)
    }

    pub async fn online_users(&self) -> Vec<String> {
        let (reply, wait) = oneshot::channel();
        if self.commands.send(Command::OnlineUsers { reply }).await.is_err() {
            return Vec::new();
        }
        wait.await.unwrap_or_default()
    }
}

struct Actor {
    store: SharedStore,
    presence: crate::Presence,
    broadcast_tx: broadcast::Sender<Broadcast>,
}

impl Actor {
    async fn run(mut self, mut rx: mpsc::Receiver<Command>) {
        while let Some(cmd) = rx.recv().await {
            match cmd {
                Command::Join {
                    username,
                    conn_id,
                    done,
                } => {
                    if self.presence.join(&username, conn_id) {
                        info!("{} is online", username);
                        self.broadcast(GatewayEvent::user_joined(&username), Some(conn_id));
                    }
                    self.broadcast_count();
                    let _ = done.send(());
                }
                Command::Leave { username, conn_id } => {
                    if self.presence.leave(&username, conn_id) {
                        info!("{} is offline", username);
                        self.broadcast(GatewayEvent::user_left(&username), None);
                    }
                    self.broadcast_count();
                }
                Command::Publish {
                    author,
                    content,
                    reply,
                } => {
                    let result = self.publish(author, content).await;
                    let _ = reply.send(result);
                }
                Command::OnlineCount { reply } => {
                    let _ = reply.send(self.presence.count());
                }
                Command::OnlineUsers { reply } => {
                    let _ = reply.send(self.presence.online_users());
                }
            }
        }
        debug!("Dispatcher stopped");
    }

    async fn publish(&self, author: String, content: String) -> Result<Message, DispatchError> {
        let store = self.store.clone();
        let message = tokio::task::spawn_blocking(move || store.append(&author, &content))
            .await
            .map_err(|e| DispatchError::Task(e.to_string()))?
            .inspect_err(|e| error!("Failed to append message: {}", e))?;

        debug!("Message {} from {}", message.id, message.author);
        self.broadcast(GatewayEvent::NewMessage(message.clone()), None);
        Ok(message)
    }

    fn broadcast_count(&self) {
        self.broadcast(
            GatewayEvent::OnlineCount {
                count: self.presence.count(),
            },
            None,
        );
    }

    fn broadcast(&self, event: GatewayEvent, except: Option<Uuid>) {
        let json = match serde_json::to_string(&event) {
            Ok(json) => json,
            Err(e) => {
                error!("Failed to serialize gateway event: {}", e);
                return;
            }
        };
        // No receivers is fine.
        let _ = self.broadcast_tx.send(Broadcast {
            json: json.into(),
            except,
        });
    }
}
