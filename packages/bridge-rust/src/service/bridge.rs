//! Public entry point: launches the database utility and waits for its reply.
//!
//! Every operation races three events:
//!
//! 1. the reply routed in by the [`ReplyHub`]
//! 2. the optional timeout
//! 3. a launch failure reported by the [`Launcher`]
//!
//! The first one to fire settles the operation. Whichever path wins removes
//! the registry entry (the hub does this itself on a reply) and the listener
//! closes once nothing else is pending.

use std::path::Path;
use std::time::Duration;

use airdb_core::{CorrelationId, Reply, WorkCommand};
use tracing::{debug, info, info_span, warn, Instrument};

use super::config::BridgeConfig;
use super::launcher::{Launcher, ProcessLauncher};
use super::operation::{BridgeError, Outcome};
use crate::network::{Registration, ReplyHub};

/// Launches work on the external database utility and correlates replies.
#[derive(Debug)]
pub struct DatabaseBridge<L = ProcessLauncher> {
    hub: ReplyHub,
    launcher: L,
    timeout: Option<Duration>,
}

impl DatabaseBridge<ProcessLauncher> {
    /// Builds a bridge with its own reply hub and an OS process launcher.
    #[must_use]
    pub fn from_config(config: BridgeConfig) -> Self {
        let launcher = ProcessLauncher::new(config.app_path, config.launch_mode);
        Self::new(ReplyHub::new(config.listener), launcher, config.timeout)
    }
}

impl<L: Launcher> DatabaseBridge<L> {
    /// Creates a bridge over an existing hub. Several bridges may share one hub.
    #[must_use]
    pub fn new(hub: ReplyHub, launcher: L, timeout: Option<Duration>) -> Self {
        Self {
            hub,
            launcher,
            timeout,
        }
    }

    #[must_use]
    pub fn hub(&self) -> &ReplyHub {
        &self.hub
    }

    /// Builds a database from a SQL script, encrypting it when `key` is given.
    ///
    /// # Errors
    ///
    /// See [`execute`](Self::execute).
    pub async fn create_database_from_source(
        &self,
        source: impl AsRef<Path>,
        dest: impl AsRef<Path>,
        key: Option<&str>,
    ) -> Outcome {
        self.execute(&WorkCommand::CreateFromSource {
            source: source.as_ref().to_path_buf(),
            dest: dest.as_ref().to_path_buf(),
            key: key.map(str::to_string),
        })
        .await
    }

    /// Builds a database from an existing SQLite store, encrypting it when
    /// `key` is given.
    ///
    /// # Errors
    ///
    /// See [`execute`](Self::execute).
    pub async fn create_database_from_existing_store(
        &self,
        store: impl AsRef<Path>,
        dest: impl AsRef<Path>,
        key: Option<&str>,
    ) -> Outcome {
        self.execute(&WorkCommand::CreateFromExistingStore {
            store: store.as_ref().to_path_buf(),
            dest: dest.as_ref().to_path_buf(),
            key: key.map(str::to_string),
        })
        .await
    }

    /// # Errors
    ///
    /// See [`execute`](Self::execute).
    pub async fn decrypt(
        &self,
        encrypted: impl AsRef<Path>,
        dest: impl AsRef<Path>,
        key: &str,
    ) -> Outcome {
        self.execute(&WorkCommand::Decrypt {
            encrypted: encrypted.as_ref().to_path_buf(),
            dest: dest.as_ref().to_path_buf(),
            key: key.to_string(),
        })
        .await
    }

    /// # Errors
    ///
    /// See [`execute`](Self::execute).
    pub async fn encrypt(&self, path: impl AsRef<Path>, dest: impl AsRef<Path>, key: &str) -> Outcome {
        self.execute(&WorkCommand::encrypt(
            path.as_ref(),
            dest.as_ref(),
            key,
        ))
        .await
    }

    /// Decrypts `encrypted` into `out`, then re-encrypts `out` in place with
    /// `out_key` if one is given. The second step only starts after the first
    /// has succeeded.
    ///
    /// # Errors
    ///
    /// Returns the first failing step's error.
    pub async fn derive_from_encrypted(
        &self,
        encrypted: impl AsRef<Path>,
        key: &str,
        out: impl AsRef<Path>,
        out_key: Option<&str>,
    ) -> Outcome {
        let out = out.as_ref();
        self.decrypt(encrypted, out, key).await?;
        if let Some(out_key) = out_key {
            self.encrypt(out, out, out_key).await?;
        }
        Ok(())
    }

    /// Runs one unit of work to completion.
    ///
    /// # Errors
    ///
    /// - [`BridgeError::Listener`] if the reply listener could not be bound
    /// - [`BridgeError::Launch`] if the utility failed to start
    /// - [`BridgeError::Timeout`] if no reply arrived in time
    /// - [`BridgeError::Remote`] if the utility replied with an error
    /// - [`BridgeError::ShutDown`] if the hub was shut down while waiting
    pub async fn execute(&self, work: &WorkCommand) -> Outcome {
        let span = info_span!("execute", kind = work.kind(), cb = tracing::field::Empty);
        self.run(work).instrument(span).await
    }

    async fn run(&self, work: &WorkCommand) -> Outcome {
        let Registration {
            id,
            port,
            mut completion,
        } = self.hub.register().await?;
        tracing::Span::current().record("cb", id.get());
        let guard = PendingGuard::new(self.hub.clone(), id);

        let command = work.to_command_line().with_callback(port, id);
        info!(command = %command.redacted(), "launching database utility");

        let timeout = self.timeout;
        let timer = async move {
            match timeout {
                Some(duration) => tokio::time::sleep(duration).await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::pin!(timer);
        let launch = self.launcher.launch(&command);
        tokio::pin!(launch);
        let mut launched = false;

        let outcome = loop {
            tokio::select! {
                biased;
                reply = &mut completion => break reply_outcome(reply.ok()),
                result = &mut launch, if !launched => {
                    launched = true;
                    match result {
                        Ok(()) => debug!("utility launched, awaiting reply"),
                        Err(e) => {
                            if self.hub.cancel(id).await {
                                break Err(BridgeError::Launch(e));
                            }
                            // A reply settled the operation first.
                            break reply_outcome(completion.try_recv().ok());
                        }
                    }
                }
                () = &mut timer => {
                    if self.hub.cancel(id).await {
                        let timeout_ms = timeout
                            .map_or(0, |d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX));
                        break Err(BridgeError::Timeout { timeout_ms });
                    }
                    break reply_outcome(completion.try_recv().ok());
                }
            }
        };
        guard.disarm();

        match &outcome {
            Ok(()) => info!("operation succeeded"),
            Err(e) => warn!(error = %e, "operation failed"),
        }
        outcome
    }
}

/// Settles an operation from its completion. `None` means the entry was
/// removed without a reply, which only happens on hub shutdown.
fn reply_outcome(reply: Option<Reply>) -> Outcome {
    match reply {
        Some(reply) if reply.error => Err(BridgeError::Remote {
            message: reply.error_message(),
        }),
        Some(_) => Ok(()),
        None => Err(BridgeError::ShutDown),
    }
}

/// RAII guard that cancels a pending entry if its operation future is dropped
/// before settling.
///
/// Settled operations call [`disarm`](Self::disarm); only abandoned ones reach
/// the cancel in `Drop`.
#[derive(Debug)]
struct PendingGuard {
    hub: Option<ReplyHub>,
    id: CorrelationId,
}

impl PendingGuard {
    fn new(hub: ReplyHub, id: CorrelationId) -> Self {
        Self { hub: Some(hub), id }
    }

    fn disarm(mut self) {
        self.hub = None;
    }
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        let Some(hub) = self.hub.take() else {
            return;
        };
        let id = self.id;
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if hub.cancel(id).await {
                        debug!(cb = %id, "abandoned operation cancelled");
                    }
                });
            }
            Err(_) => warn!(cb = %id, "no runtime to cancel abandoned operation; entry stays pending"),
        }
    }
}
