//! MQTT session with statum typestate lifecycle
//!
//! Every protocol step is a consuming method, so a session can only publish while
//! `Connected` and only wait for SUBACK after it subscribed.
//!
//! # State Machine
//!
//! ```text
//! Disconnected ──connect──► Connecting ──await_connack──► Connected ◄──────────┐
//!      ▲                                                   │    │              │
//!      │                                          subscribe│    │publish       │
//!      │                                                   ▼    ▼              │
//!      └────────────── disconnect ◄──────────── Subscribing    Publishing ─────┘
//!                                          (await_suback)   (await_delivery)
//! ```
//!
//! Incoming PUBLISH packets are forwarded to the UI from whichever state is
//! currently polling the event loop.

use rumqttc::{
    AsyncClient, ConnectReturnCode, Event, EventLoop, Outgoing, Packet, QoS, SubscribeReasonCode,
};
use statum::{machine, state};
use tracing::{debug, info, warn};

use super::config::{DeviceTopics, MqttConfig};
use super::error::MqttError;
use super::message_manager::{MQTTMessage, MsgManager};
use super::mqtt_handler::ConnectionState;
use crate::credential::{derive_now, DeviceIdentity};

/// Lifecycle states of one broker session
#[state]
#[derive(Debug, Clone)]
pub enum SessionState {
    Disconnected, // No client, nothing on the wire
    Connecting,   // CONNECT queued, waiting for CONNACK
    Connected,    // Ready for subscribe/publish
    Subscribing,  // SUBSCRIBE queued, waiting for SUBACK
    Publishing,   // PUBLISH queued, waiting for it to hit the socket
}

#[machine]
pub struct MqttSession<S: SessionState> {
    config: MqttConfig,
    identity: DeviceIdentity,
    client: Option<AsyncClient>,
    eventloop: Option<EventLoop>,
    pending: Option<MQTTMessage>,
    msg_manager: MsgManager,
}

impl<S: SessionState> MqttSession<S> {
    pub fn topics(&self) -> &DeviceTopics {
        &self.config.topics
    }

    fn client(&self) -> Result<&AsyncClient, MqttError> {
        self.client.as_ref().ok_or(MqttError::NotConnected)
    }

    /// Polls one event, forwarding inbound publishes to the UI
    async fn poll_event(&mut self) -> Result<Event, MqttError> {
        let eventloop = self.eventloop.as_mut().ok_or(MqttError::NotConnected)?;
        let event = eventloop.poll().await?;

        if let Event::Incoming(Packet::Publish(publish)) = &event {
            self.msg_manager
                .forward_inbound(&publish.topic, &publish.payload);
        }
        Ok(event)
    }

    async fn next_matching<T, F>(&mut self, matcher: &mut F) -> Result<T, MqttError>
    where
        F: FnMut(&Event) -> Option<Result<T, MqttError>>,
    {
        loop {
            let event = self.poll_event().await?;
            if let Some(result) = matcher(&event) {
                return result;
            }
        }
    }

    /// Polls until `matcher` decides, bounded by the response timeout
    async fn poll_until<T, F>(&mut self, what: &'static str, mut matcher: F) -> Result<T, MqttError>
    where
        F: FnMut(&Event) -> Option<Result<T, MqttError>>,
    {
        let timeout = self.config.response_timeout;
        match tokio::time::timeout(timeout, self.next_matching(&mut matcher)).await {
            Ok(result) => result,
            Err(_) => Err(MqttError::Timeout(what)),
        }
    }
}

impl MqttSession<Disconnected> {
    pub fn create(config: MqttConfig, identity: DeviceIdentity, msg_manager: MsgManager) -> Self {
        Self::new(config, identity, None, None, None, msg_manager)
    }

    /// Derives a fresh credential and queues CONNECT on a new client
    pub fn connect(mut self) -> Result<MqttSession<Connecting>, MqttError> {
        let credential = derive_now(&self.identity, &self.config.version_tag)?;
        info!(
            "Connecting to {} with client id {}",
            self.config.broker, credential.client_id
        );

        let mqtt_options = self.config.mqtt_options(&credential);
        let (client, eventloop) = AsyncClient::new(mqtt_options, self.config.request_capacity);

        self.client = Some(client);
        self.eventloop = Some(eventloop);
        self.msg_manager.report_state(ConnectionState::Connecting);
        Ok(self.transition())
    }
}

impl MqttSession<Connecting> {
    pub async fn await_connack(mut self) -> Result<MqttSession<Connected>, MqttError> {
        self.poll_until("CONNACK", |event| match event {
            Event::Incoming(Packet::ConnAck(connack)) => {
                if connack.code == ConnectReturnCode::Success {
                    Some(Ok(()))
                } else {
                    Some(Err(MqttError::ConnectionRefused(format!(
                        "{:?}",
                        connack.code
                    ))))
                }
            }
            _ => None,
        })
        .await?;

        info!("connect succeed");
        self.msg_manager.report_state(ConnectionState::Connected);
        Ok(self.transition())
    }
}

impl MqttSession<Connected> {
    /// Queues SUBSCRIBE for the device's downstream topic at QoS 0
    pub async fn subscribe(self) -> Result<MqttSession<Subscribing>, MqttError> {
        let topic = self.config.topics.subscribe.clone();
        self.client()?
            .subscribe(topic.clone(), QoS::AtMostOnce)
            .await?;

        debug!("Subscribing to {}", topic);
        self.msg_manager.report_state(ConnectionState::Subscribing);
        Ok(self.transition())
    }

    /// Queues `payload` on the device's upstream topic at QoS 0
    pub async fn publish(mut self, payload: String) -> Result<MqttSession<Publishing>, MqttError> {
        let topic = self.config.topics.publish.clone();
        self.client()?
            .publish(topic.clone(), QoS::AtMostOnce, false, payload.clone().into_bytes())
            .await?;

        debug!("Publishing {} bytes to {}", payload.len(), topic);
        self.pending = Some(MQTTMessage::outbound(topic, payload));
        self.msg_manager.report_state(ConnectionState::Publishing);
        Ok(self.transition())
    }

    /// Drives the event loop by one event while idle
    pub async fn next_event(&mut self) -> Result<(), MqttError> {
        self.poll_event().await.map(|_| ())
    }

    /// Sends DISCONNECT and drops the client
    pub async fn disconnect(mut self) -> MqttSession<Disconnected> {
        info!("DisConnecting");

        let requested = match &self.client {
            Some(client) => client.disconnect().await.map_err(MqttError::from),
            None => Err(MqttError::NotConnected),
        };

        match requested {
            Ok(()) => {
                let flushed = self
                    .poll_until("DISCONNECT", |event| {
                        matches!(event, Event::Outgoing(Outgoing::Disconnect)).then(|| Ok(()))
                    })
                    .await;
                match flushed {
                    Ok(()) => info!("disConnect success"),
                    Err(e) => warn!("disConnect failure: {}", e),
                }
            }
            Err(e) => warn!("disConnect failure: {}", e),
        }

        self.client = None;
        self.eventloop = None;
        self.pending = None;
        self.msg_manager.report_state(ConnectionState::Disconnected);
        self.transition()
    }
}

impl MqttSession<Subscribing> {
    pub async fn await_suback(mut self) -> Result<MqttSession<Connected>, MqttError> {
        let topic = self.config.topics.subscribe.clone();
        self.poll_until("SUBACK", |event| match event {
            Event::Incoming(Packet::SubAck(suback)) => {
                let rejected = suback
                    .return_codes
                    .iter()
                    .any(|code| matches!(code, SubscribeReasonCode::Failure));
                if rejected {
                    Some(Err(MqttError::SubscriptionRejected(topic.clone())))
                } else {
                    Some(Ok(()))
                }
            }
            _ => None,
        })
        .await?;

        info!("subscribed succeed");
        self.msg_manager.report_state(ConnectionState::Connected);
        Ok(self.transition())
    }
}

impl MqttSession<Publishing> {
    /// Waits until the queued PUBLISH was written to the socket
    pub async fn await_delivery(mut self) -> Result<MqttSession<Connected>, MqttError> {
        self.poll_until("PUBLISH", |event| {
            matches!(event, Event::Outgoing(Outgoing::Publish(_))).then(|| Ok(()))
        })
        .await?;

        if let Some(msg) = self.pending.take() {
            info!("publish succeed!");
            self.msg_manager.report_sent(msg);
        }
        self.msg_manager.report_state(ConnectionState::Connected);
        Ok(self.transition())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use tokio::sync::{mpsc, watch};

    fn session_parts(
        identity: DeviceIdentity,
    ) -> (MqttSession<Disconnected>, watch::Receiver<ConnectionState>) {
        let app_config = AppConfig::default();
        let config = MqttConfig::from_app_config(&app_config).unwrap();
        let (tx, _rx) = mpsc::channel(10);
        let (state_tx, state_rx) = watch::channel(ConnectionState::default());
        (
            MqttSession::create(config, identity, MsgManager::new(tx, state_tx)),
            state_rx,
        )
    }

    #[test]
    fn test_connect_rejects_invalid_identity() {
        let (session, state) = session_parts(DeviceIdentity::new("pk", "", "secret"));
        let result = session.connect();
        assert!(matches!(result, Err(MqttError::Credential(_))));
        // No state change is reported when nothing was attempted
        assert_eq!(*state.borrow(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_connect_moves_to_connecting() {
        let (session, state) = session_parts(AppConfig::default().device);
        assert_eq!(session.topics().publish, "/a11xsrWmW14/paho_android/user/update");

        let connecting: MqttSession<Connecting> = match session.connect() {
            Ok(session) => session,
            Err(e) => panic!("connect failed: {}", e),
        };
        assert_eq!(connecting.topics().subscribe, "/a11xsrWmW14/paho_android/user/get");
        assert_eq!(*state.borrow(), ConnectionState::Connecting);
    }
}
