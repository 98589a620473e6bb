//! Reply hub: the correlation registry together with the shared listener
//! that feeds it.
//!
//! One TCP listener serves every pending operation. It is bound lazily when
//! the first operation registers and closed as soon as the last pending entry
//! is removed, so the listener is running iff the registry is non-empty.
//! Registry mutations and listener start/stop happen under a single async
//! mutex; a stop cannot interleave with a concurrent registration.

use std::io;
use std::net::SocketAddr;
use std::sync::{Arc, Weak};
use std::time::Duration;

use airdb_core::{CorrelationId, Reply};
use tokio::net::TcpListener;
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::config::{ConnectionConfig, ListenerConfig};
use super::connection::read_reply;
use super::registry::{CompletionReceiver, CorrelationRegistry, PendingOperation};

/// Errors raised while bringing up the shared listener.
#[derive(Debug, thiserror::Error)]
pub enum ListenerError {
    #[error("failed to bind reply listener on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },
}

/// A freshly registered pending operation.
#[derive(Debug)]
pub struct Registration {
    /// Identifier to embed in the launched command.
    pub id: CorrelationId,
    /// Port the listener is actually bound to.
    pub port: u16,
    /// Resolves with the reply, or errors if the entry is cancelled or drained.
    pub completion: CompletionReceiver,
}

/// Owned context combining the correlation registry and the shared listener.
///
/// Cheap to clone; all clones share the same registry and listener. When the
/// last clone is dropped the listener closes.
#[derive(Debug, Clone)]
pub struct ReplyHub {
    shared: Arc<Shared>,
}

#[derive(Debug)]
struct Shared {
    config: ListenerConfig,
    state: Mutex<HubState>,
}

#[derive(Debug, Default)]
struct HubState {
    registry: CorrelationRegistry,
    active: Option<ActiveListener>,
}

#[derive(Debug)]
struct ActiveListener {
    local_addr: SocketAddr,
    shutdown_tx: oneshot::Sender<()>,
    accept_task: JoinHandle<()>,
}

impl ReplyHub {
    /// Creates a hub without binding any port.
    #[must_use]
    pub fn new(config: ListenerConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                config,
                state: Mutex::new(HubState::default()),
            }),
        }
    }

    /// Allocates an identifier, registers a pending operation under it, and
    /// makes sure the listener is running.
    ///
    /// # Errors
    ///
    /// Returns [`ListenerError::Bind`] if the listener had to be started and
    /// the address could not be bound. The entry is removed again before
    /// returning, so a failed registration leaves nothing behind.
    pub async fn register(&self) -> Result<Registration, ListenerError> {
        let mut state = self.shared.state.lock().await;

        let id = state.registry.allocate();
        let (operation, completion) = PendingOperation::new();
        state.registry.register(id, operation);

        match state.ensure_started(&self.shared).await {
            Ok(addr) => {
                debug!(cb = %id, pending = state.registry.size(), "registered pending operation");
                Ok(Registration {
                    id,
                    port: addr.port(),
                    completion,
                })
            }
            Err(e) => {
                state.registry.cancel(id);
                state.stop_if_idle().await;
                Err(e)
            }
        }
    }

    /// Routes `reply` to the pending operation it names.
    ///
    /// Returns `false` for unknown or already settled identifiers; such
    /// replies are dropped.
    pub async fn resolve(&self, reply: Reply) -> bool {
        self.shared.resolve(reply).await
    }

    /// Removes a pending entry without completing it, then closes the
    /// listener if nothing else is pending. Returns whether the entry existed.
    pub async fn cancel(&self, id: CorrelationId) -> bool {
        let mut state = self.shared.state.lock().await;
        let removed = state.registry.cancel(id);
        state.stop_if_idle().await;
        removed
    }

    /// Drops every pending operation and closes the listener.
    ///
    /// Callers awaiting a drained operation observe a closed completion.
    /// Returns how many operations were pending.
    pub async fn shutdown(&self) -> usize {
        let mut state = self.shared.state.lock().await;
        let drained = state.registry.drain();
        if !drained.is_empty() {
            info!(count = drained.len(), "draining pending operations");
        }
        state.stop_if_idle().await;
        drained.len()
    }

    /// Whether the shared listener is currently bound.
    pub async fn is_listening(&self) -> bool {
        self.shared.state.lock().await.active.is_some()
    }

    /// Number of pending operations.
    pub async fn pending_count(&self) -> usize {
        self.shared.state.lock().await.registry.size()
    }

    /// Address the listener is bound to, if running.
    pub async fn local_addr(&self) -> Option<SocketAddr> {
        self.shared
            .state
            .lock()
            .await
            .active
            .as_ref()
            .map(|active| active.local_addr)
    }
}

impl Shared {
    async fn resolve(&self, reply: Reply) -> bool {
        let mut state = self.state.lock().await;
        let cb = reply.cb;
        let matched = state.registry.resolve(cb, reply);
        if matched {
            debug!(cb = %cb, "reply matched pending operation");
        } else {
            warn!(cb = %cb, "dropping reply with no pending operation");
        }
        state.stop_if_idle().await;
        matched
    }
}

impl HubState {
    /// Binds the listener if none is active. Idempotent.
    async fn ensure_started(&mut self, shared: &Arc<Shared>) -> Result<SocketAddr, ListenerError> {
        if let Some(active) = &self.active {
            return Ok(active.local_addr);
        }

        let addr = shared.config.bind_addr();
        let bind_err = |source: io::Error| ListenerError::Bind {
            addr: addr.clone(),
            source,
        };
        let listener = TcpListener::bind(&addr).await.map_err(bind_err)?;
        let local_addr = listener.local_addr().map_err(bind_err)?;

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let accept_task = tokio::spawn(accept_loop(
            listener,
            Arc::downgrade(shared),
            shutdown_rx,
            shared.config.connection.clone(),
        ));

        info!("reply listener bound to {}", local_addr);

        self.active = Some(ActiveListener {
            local_addr,
            shutdown_tx,
            accept_task,
        });
        Ok(local_addr)
    }

    /// Closes the listener when the registry is empty.
    ///
    /// Waits for the accept loop to exit so the socket is released before
    /// the next `ensure_started` tries to bind the same port.
    async fn stop_if_idle(&mut self) {
        if !self.registry.is_empty() {
            return;
        }
        let Some(active) = self.active.take() else {
            return;
        };

        // Ignore send errors -- the accept loop may already have exited
        let _ = active.shutdown_tx.send(());
        if let Err(e) = active.accept_task.await {
            warn!(error = %e, "reply listener task ended abnormally");
        }
        info!("reply listener on {} closed", active.local_addr);
    }
}

/// Accepts connections until signalled, handing each to its own task.
///
/// Holds only a weak reference to the hub so an abandoned hub does not keep
/// its port bound.
async fn accept_loop(
    listener: TcpListener,
    shared: Weak<Shared>,
    mut shutdown_rx: oneshot::Receiver<()>,
    connection: ConnectionConfig,
) {
    loop {
        tokio::select! {
            biased;
            _ = &mut shutdown_rx => break,
            accepted = listener.accept() => match accepted {
                Ok((mut stream, peer)) => {
                    let shared = Weak::clone(&shared);
                    let connection = connection.clone();
                    tokio::spawn(async move {
                        match read_reply(&mut stream, &connection).await {
                            Ok(reply) => {
                                debug!(cb = %reply.cb, error = reply.error, %peer, "reply received");
                                if let Some(shared) = shared.upgrade() {
                                    shared.resolve(reply).await;
                                }
                            }
                            Err(e) => warn!(%peer, error = %e, "dropping reply connection"),
                        }
                    });
                }
                Err(e) => {
                    warn!(error = %e, "accept failed on reply listener");
                    // Avoid spinning on persistent errors such as fd exhaustion
                    tokio::time::sleep(Duration::from_millis(10)).await;
                }
            },
        }
    }
}
