use chrono::{DateTime, Local, NaiveDateTime};
use std::fmt;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use super::mqtt_handler::ConnectionState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Inbound,
    Outbound,
}

/// A text message seen on one of the device topics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MQTTMessage {
    pub topic: String,
    pub content: String,
    pub timestamp: NaiveDateTime,
    pub direction: Direction,
}

impl fmt::Display for MQTTMessage {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let arrow = match self.direction {
            Direction::Inbound => "<-",
            Direction::Outbound => "->",
        };
        write!(
            f,
            "{} {} {}: {}",
            self.timestamp.format("%H:%M:%S%.3f"),
            arrow,
            self.topic,
            self.content
        )
    }
}

impl MQTTMessage {
    pub fn inbound(topic: String, content: String) -> Self {
        Self::stamped(topic, content, Direction::Inbound)
    }

    pub fn outbound(topic: String, content: String) -> Self {
        Self::stamped(topic, content, Direction::Outbound)
    }

    fn stamped(topic: String, content: String, direction: Direction) -> Self {
        MQTTMessage {
            topic,
            content,
            timestamp: Local::now().naive_local(),
            direction,
        }
    }

    /// Decodes a PUBLISH payload, replacing invalid UTF-8
    pub fn from_payload(topic: &str, payload: &[u8]) -> Self {
        Self::inbound(topic.to_string(), String::from_utf8_lossy(payload).into_owned())
    }
}

/// Text published when the Publish button is pressed
pub fn hello_payload(now: DateTime<Local>) -> String {
    format!("hello IoT {}", now.format("%Y-%m-%d %H:%M:%S%.3f"))
}

/// Text published once right after the first subscription succeeded
///
/// English rendering of the demo app's "initialised, first message" greeting.
pub fn greeting_payload(now: DateTime<Local>) -> String {
    format!(
        "hello IoT, first message after connect {}",
        now.format("%Y-%m-%d %H:%M:%S%.3f")
    )
}

/// Requests from the UI to the MQTT task
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MqttCommand {
    /// Publish the text on the device's publish topic
    Publish(String),
    /// Close the session and stop the task
    Disconnect,
}

/// Notifications from the MQTT task to the UI
///
/// The connection state travels on its own watch channel, see [`MsgManager`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MqttEvent {
    MessageReceived(MQTTMessage),
    MessageSent(MQTTMessage),
    /// Human readable failure, never contains secrets
    Error(String),
}

/// Outgoing half of the MQTT → UI channels
///
/// Messages use `try_send` so a slow UI frame never stalls the network loop;
/// they may be dropped when the UI falls behind. The connection state is a
/// `watch` value instead, so the latest state always reaches the UI.
#[derive(Debug, Clone)]
pub struct MsgManager {
    events: mpsc::Sender<MqttEvent>,
    state: watch::Sender<ConnectionState>,
}

impl MsgManager {
    pub fn new(events: mpsc::Sender<MqttEvent>, state: watch::Sender<ConnectionState>) -> Self {
        Self { events, state }
    }

    pub fn report_state(&self, state: ConnectionState) {
        debug!("Connection state: {}", state);
        self.state.send_replace(state);
    }

    pub fn forward_inbound(&self, topic: &str, payload: &[u8]) {
        let msg = MQTTMessage::from_payload(topic, payload);
        info!("topic: {}, msg: {}", msg.topic, msg.content);
        self.emit(MqttEvent::MessageReceived(msg));
    }

    pub fn report_sent(&self, msg: MQTTMessage) {
        self.emit(MqttEvent::MessageSent(msg));
    }

    pub fn report_error(&self, error: String) {
        self.emit(MqttEvent::Error(error));
    }

    fn emit(&self, event: MqttEvent) {
        if let Err(e) = self.events.try_send(event) {
            warn!("Dropping MQTT event for UI: {}", e);
        }
    }
}
