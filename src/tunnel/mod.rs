//! SSH port-forwarding tunnel lifecycle.
//!
//! The manager owns at most one tunnel per process: an authenticated SSH
//! session plus a local TCP listener whose connections are relayed through
//! direct-tcpip channels to the database host. `start` and `stop` are
//! idempotent — repeating either is a successful no-op, reported through
//! [`StartOutcome`] / [`StopOutcome`] rather than an error.

mod forward;

use std::sync::Arc;

use russh::client;
use russh::Disconnect;
use tokio::net::TcpListener;
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::config::TunnelConfig;
use forward::SshHandler;

/// Connection parameters for [`TunnelManager::start`].
///
/// `ssh_key` is opaque credential material: private-key text if it parses as
/// such, a password otherwise.
#[derive(Debug, Clone)]
pub struct TunnelParams {
    pub database_host: String,
    pub ssh_host: String,
    pub ssh_port: u16,
    pub ssh_user: String,
    pub ssh_key: String,
}

/// Successful results of `start`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Started,
    /// A live tunnel already exists; it was left untouched.
    AlreadyActive,
}

/// Results of `stop`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    Stopped,
    NoActiveTunnel,
}

/// Errors from tunnel establishment.
#[derive(Debug)]
pub enum TunnelError {
    /// SSH connect, authentication, or local bind failed. The manager is
    /// back in the idle state and a later `start` may retry.
    EstablishFailed(String),
}

impl std::fmt::Display for TunnelError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TunnelError::EstablishFailed(e) => write!(f, "Failed to establish tunnel: {e}"),
        }
    }
}

/// The one live tunnel: the listener task stands in for the original's
/// server handle, the session for its SSH client handle.
struct ActiveTunnel {
    listener_task: JoinHandle<()>,
    shutdown: oneshot::Sender<()>,
    session: Arc<Mutex<client::Handle<SshHandler>>>,
}

/// Lifecycle owner for the at-most-one tunnel.
///
/// Cloning shares the underlying slot. The internal mutex is the
/// mutual-exclusion point: it is held across the whole establishment, so a
/// concurrent second `start` waits and then observes Active instead of
/// racing a duplicate tunnel into existence.
#[derive(Clone)]
pub struct TunnelManager {
    slot: Arc<Mutex<Option<ActiveTunnel>>>,
    config: TunnelConfig,
}

impl TunnelManager {
    pub fn new(config: TunnelConfig) -> Self {
        Self {
            slot: Arc::new(Mutex::new(None)),
            config,
        }
    }

    /// Establish the tunnel, or report [`StartOutcome::AlreadyActive`]
    /// without touching the live one.
    pub async fn start(&self, params: TunnelParams) -> Result<StartOutcome, TunnelError> {
        let mut slot = self.slot.lock().await;
        if let Some(active) = slot.as_ref() {
            if active.listener_task.is_finished() {
                // The accept loop died without a stop(); nothing is
                // listening anymore, so treat the slot as idle.
                warn!("Tunnel: previous listener is gone, replacing");
                *slot = None;
            } else {
                return Ok(StartOutcome::AlreadyActive);
            }
        }

        let session = forward::connect_ssh(&params).await?;

        let port = self.config.forward_port;
        let listener = TcpListener::bind((self.config.bind_host.as_str(), port))
            .await
            .map_err(|e| {
                TunnelError::EstablishFailed(format!("failed to bind local port {port}: {e}"))
            })?;

        info!(
            "Tunnel: forwarding {}:{port} -> {}:{port} via {}@{}:{}",
            self.config.bind_host, params.database_host, params.ssh_user, params.ssh_host,
            params.ssh_port
        );

        let session = Arc::new(Mutex::new(session));
        let (shutdown, shutdown_rx) = oneshot::channel();
        let listener_task = tokio::spawn(forward::accept_loop(
            listener,
            Arc::clone(&session),
            params.database_host,
            port,
            shutdown_rx,
        ));

        *slot = Some(ActiveTunnel {
            listener_task,
            shutdown,
            session,
        });
        Ok(StartOutcome::Started)
    }

    /// Tear the tunnel down, or report [`StopOutcome::NoActiveTunnel`].
    ///
    /// Teardown is fire-and-forget: the listener is told to wind down and
    /// the SSH disconnect runs in a detached task, so the response does not
    /// wait for the close to complete. Connections already being relayed run
    /// to their natural end.
    pub async fn stop(&self) -> StopOutcome {
        let mut slot = self.slot.lock().await;
        let Some(active) = slot.take() else {
            return StopOutcome::NoActiveTunnel;
        };
        let ActiveTunnel {
            listener_task,
            shutdown,
            session,
        } = active;
        if listener_task.is_finished() {
            return StopOutcome::NoActiveTunnel;
        }

        let _ = shutdown.send(());
        tokio::spawn(async move {
            let session = session.lock().await;
            let _ = session
                .disconnect(Disconnect::ByApplication, "tunnel stopped", "en")
                .await;
        });
        StopOutcome::Stopped
    }

    /// Whether a tunnel is currently up (its listener task is alive).
    pub async fn is_active(&self) -> bool {
        let slot = self.slot.lock().await;
        slot.as_ref()
            .is_some_and(|active| !active.listener_task.is_finished())
    }
}
