//! # MQTT Integration Module
//!
//! Connects the demo device to the IoT platform broker, subscribes to its
//! downstream topic and publishes text messages on its upstream topic. The
//! protocol itself is rumqttc's; this module owns the session lifecycle and the
//! plumbing towards the UI.
//!
//! ## Module Architecture
//!
//! ```text
//! mqtt/
//! ├── config.rs           - Broker address, topics and CONNECT options
//! ├── error.rs            - MqttError
//! ├── message_manager.rs  - Messages, UI commands/events and the event sender
//! ├── session.rs          - Typestate session (Disconnected → Connecting → Connected ...)
//! └── mqtt_handler.rs     - Background task, reconnect loop and its handle
//! ```
//!
//! ## Credentials
//!
//! Every connection attempt derives a new credential through
//! [`crate::credential::derive_now`]. Credentials are never stored on the session,
//! so a reconnect always carries a fresh timestamp.

pub mod config;
pub mod error;
pub mod message_manager;
pub mod mqtt_handler;
pub mod session;

pub use config::{parse_broker_url, BrokerAddress, DeviceTopics, MqttConfig};
pub use error::MqttError;
pub use message_manager::{
    greeting_payload, hello_payload, Direction, MQTTMessage, MqttCommand, MqttEvent, MsgManager,
};
pub use mqtt_handler::{ConnectionState, MqttHandle};
pub use session::MqttSession;
