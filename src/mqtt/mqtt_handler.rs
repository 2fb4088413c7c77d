//! MQTT task handle
//!
//! Runs the typestate session in a tokio task and exposes it to the UI through
//! two channels:
//!
//! ```text
//! UI ─[MqttCommand]→ MqttHandle task ─[MqttEvent]→ UI
//!                         │
//!                   MqttSession<S> ──► rumqttc EventLoop ──► broker
//! ```
//!
//! A failed session is retried with a freshly derived credential after a fixed
//! delay, at most `max_reconnect_attempts` times in a row.

use std::fmt;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::config::MqttConfig;
use super::error::MqttError;
use super::message_manager::{greeting_payload, MqttCommand, MqttEvent, MsgManager};
use super::session::{Connected, MqttSession};
use crate::config::SessionConfig;
use crate::credential::DeviceIdentity;

/// Connection state as shown in the UI
#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Subscribing,
    Publishing,
    Failed,
}

impl ConnectionState {
    /// Whether a broker session is established
    pub fn is_online(&self) -> bool {
        matches!(
            self,
            ConnectionState::Connected | ConnectionState::Subscribing | ConnectionState::Publishing
        )
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let label = match self {
            ConnectionState::Disconnected => "Disconnected",
            ConnectionState::Connecting => "Connecting",
            ConnectionState::Connected => "Connected",
            ConnectionState::Subscribing => "Subscribing",
            ConnectionState::Publishing => "Publishing",
            ConnectionState::Failed => "Failed",
        };
        write!(f, "{}", label)
    }
}

/// Handle for the background MQTT task
pub struct MqttHandle {
    command_tx: mpsc::Sender<MqttCommand>,
    state_rx: watch::Receiver<ConnectionState>,
    cancel: CancellationToken,
    task_handle: Option<JoinHandle<()>>,
}

impl MqttHandle {
    /// Spawns the MQTT task and returns the handle plus the event receiver for the UI
    pub fn spawn(
        config: MqttConfig,
        identity: DeviceIdentity,
        session_config: SessionConfig,
    ) -> (Self, mpsc::Receiver<MqttEvent>) {
        let capacity = session_config.channel_capacity.max(1);
        let (command_tx, command_rx) = mpsc::channel(capacity);
        let (event_tx, event_rx) = mpsc::channel(capacity);
        let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);
        let cancel = CancellationToken::new();

        info!(
            "Spawning MQTT task for {} against {}",
            identity, config.broker
        );

        let task_cancel = cancel.clone();
        let task_handle = tokio::spawn(async move {
            run_mqtt_task(
                config,
                identity,
                session_config,
                command_rx,
                MsgManager::new(event_tx, state_tx),
                task_cancel,
            )
            .await;
        });

        (
            Self {
                command_tx,
                state_rx,
                cancel,
                task_handle: Some(task_handle),
            },
            event_rx,
        )
    }

    pub fn sender(&self) -> mpsc::Sender<MqttCommand> {
        self.command_tx.clone()
    }

    /// Latest connection state, never lagging behind a full event channel
    pub fn state(&self) -> watch::Receiver<ConnectionState> {
        self.state_rx.clone()
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Cancels the task and waits for it to disconnect
    pub async fn shutdown(&mut self) {
        debug!("Sending shutdown signal to MQTT task");
        self.cancel.cancel();

        if let Some(handle) = self.task_handle.take() {
            if let Err(e) = handle.await {
                error!("MQTT task panicked: {}", e);
            }
        }
    }
}

/// Reconnect loop around [`run_session`]
async fn run_mqtt_task(
    config: MqttConfig,
    identity: DeviceIdentity,
    session_config: SessionConfig,
    mut commands: mpsc::Receiver<MqttCommand>,
    msg_manager: MsgManager,
    cancel: CancellationToken,
) {
    let mut failures: u32 = 0;

    loop {
        if cancel.is_cancelled() {
            debug!("MQTT task cancelled before connection");
            break;
        }

        match run_session(
            &config,
            &identity,
            &mut commands,
            &msg_manager,
            &cancel,
            &mut failures,
        )
        .await
        {
            Ok(()) => {
                debug!("MQTT session stopped cleanly");
                break;
            }
            Err(e) => {
                error!("connect failed: {}", e);
                msg_manager.report_error(e.to_string());
                msg_manager.report_state(ConnectionState::Failed);

                if !e.is_retryable() {
                    error!("Not retrying, fix the configuration");
                    break;
                }

                failures += 1;
                if failures > session_config.max_reconnect_attempts {
                    error!(
                        "Max reconnect attempts ({}) reached, giving up",
                        session_config.max_reconnect_attempts
                    );
                    break;
                }

                warn!(
                    "Reconnecting in {}ms (attempt {}/{})",
                    session_config.reconnect_delay_ms,
                    failures,
                    session_config.max_reconnect_attempts
                );

                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(session_config.reconnect_delay()) => {}
                }
            }
        }
    }

    info!("MQTT task stopped");
}

enum Step {
    Shutdown,
    Command(Option<MqttCommand>),
    Polled(Result<(), MqttError>),
}

/// Connect, subscribe and deliver the greeting
async fn establish(
    config: &MqttConfig,
    identity: &DeviceIdentity,
    msg_manager: &MsgManager,
) -> Result<MqttSession<Connected>, MqttError> {
    let session = MqttSession::create(config.clone(), identity.clone(), msg_manager.clone());

    let session = session.connect()?.await_connack().await?;
    let session = session.subscribe().await?.await_suback().await?;

    let greeting = greeting_payload(chrono::Local::now());
    session.publish(greeting).await?.await_delivery().await
}

/// One session: establish it, then serve UI commands until cancelled
async fn run_session(
    config: &MqttConfig,
    identity: &DeviceIdentity,
    commands: &mut mpsc::Receiver<MqttCommand>,
    msg_manager: &MsgManager,
    cancel: &CancellationToken,
    failures: &mut u32,
) -> Result<(), MqttError> {
    let mut session = tokio::select! {
        _ = cancel.cancelled() => {
            debug!("Shutdown signal received during handshake");
            msg_manager.report_state(ConnectionState::Disconnected);
            return Ok(());
        }
        established = establish(config, identity, msg_manager) => established?,
    };
    // Only a fully established session counts as recovered
    *failures = 0;

    loop {
        let step = tokio::select! {
            _ = cancel.cancelled() => Step::Shutdown,
            command = commands.recv() => Step::Command(command),
            polled = session.next_event() => Step::Polled(polled),
        };

        match step {
            Step::Shutdown => {
                debug!("Shutdown signal received");
                let _ = session.disconnect().await;
                return Ok(());
            }
            Step::Command(Some(MqttCommand::Publish(payload))) => {
                session = session.publish(payload).await?.await_delivery().await?;
            }
            Step::Command(Some(MqttCommand::Disconnect)) | Step::Command(None) => {
                let _ = session.disconnect().await;
                // Closing the session on request also stops the task
                cancel.cancel();
                return Ok(());
            }
            Step::Polled(Ok(())) => {}
            Step::Polled(Err(e)) => {
                info!("connection lost");
                return Err(e);
            }
        }
    }
}
