use chrono::Local;
use eframe::egui::{Button, RichText, ScrollArea, Ui};
use std::collections::VecDeque;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error};

use super::common::{create_frame, state_color, UiColors};
use crate::mqtt::{
    hello_payload, ConnectionState, DeviceTopics, Direction, MQTTMessage, MqttCommand, MqttEvent,
};

/// Everything the screen shows, updated from MQTT events
///
/// Kept free of egui types so it can be driven directly in tests.
#[derive(Debug, Clone, PartialEq)]
pub struct ScreenState {
    pub connection: ConnectionState,
    /// Payload of the most recent inbound message
    pub last_message: Option<String>,
    pub log: VecDeque<MQTTMessage>,
    pub log_limit: usize,
    pub last_error: Option<String>,
    pub received: usize,
    pub sent: usize,
}

impl ScreenState {
    pub fn new(log_limit: usize) -> Self {
        Self {
            connection: ConnectionState::Disconnected,
            last_message: None,
            log: VecDeque::new(),
            log_limit: log_limit.max(1),
            last_error: None,
            received: 0,
            sent: 0,
        }
    }

    /// Takes over the latest connection state, clearing the error on reconnect
    pub fn set_connection(&mut self, state: ConnectionState) {
        if state == ConnectionState::Connected && !self.connection.is_online() {
            self.last_error = None;
        }
        self.connection = state;
    }

    pub fn apply(&mut self, event: MqttEvent) {
        match event {
            MqttEvent::MessageReceived(msg) => {
                self.received += 1;
                self.last_message = Some(msg.content.clone());
                self.push_log(msg);
            }
            MqttEvent::MessageSent(msg) => {
                self.sent += 1;
                self.push_log(msg);
            }
            MqttEvent::Error(error) => {
                self.last_error = Some(error);
            }
        }
    }

    /// Publishing is only offered while the session is idle and connected
    pub fn can_publish(&self) -> bool {
        self.connection == ConnectionState::Connected
    }

    fn push_log(&mut self, msg: MQTTMessage) {
        self.log.push_back(msg);
        while self.log.len() > self.log_limit {
            self.log.pop_front();
        }
    }
}

/// Single demo screen: status header, last message, publish button, message log
pub struct MQTTScreenData {
    state: ScreenState,
    connection: watch::Receiver<ConnectionState>,
    received_events: mpsc::Receiver<MqttEvent>,
    command_sender: mpsc::Sender<MqttCommand>,
    device_label: String,
    broker_label: String,
    topics: DeviceTopics,
}

impl MQTTScreenData {
    pub fn new(
        connection: watch::Receiver<ConnectionState>,
        received_events: mpsc::Receiver<MqttEvent>,
        command_sender: mpsc::Sender<MqttCommand>,
        device_label: String,
        broker_label: String,
        topics: DeviceTopics,
        log_limit: usize,
    ) -> Self {
        Self {
            state: ScreenState::new(log_limit),
            connection,
            received_events,
            command_sender,
            device_label,
            broker_label,
            topics,
        }
    }

    pub fn state(&self) -> &ScreenState {
        &self.state
    }

    /// Applies the current connection state and every event queued since the last frame
    pub fn drain_events(&mut self) {
        let connection = *self.connection.borrow();
        self.state.set_connection(connection);
        while let Ok(event) = self.received_events.try_recv() {
            self.state.apply(event);
        }
    }

    /// Queues a "hello IoT" publish for the MQTT task
    pub fn publish(&mut self) {
        let payload = hello_payload(Local::now());
        debug!("Requesting publish: {}", payload);
        if let Err(e) = self.command_sender.try_send(MqttCommand::Publish(payload)) {
            error!("Failed to queue publish: {}", e);
            self.state.last_error = Some(format!("Failed to queue publish: {}", e));
        }
    }

    pub fn render(&mut self, ui: &mut Ui) {
        self.drain_events();

        ui.horizontal(|ui| {
            ui.heading("AIoT MQTT");
            ui.label(&self.device_label);
            ui.colored_label(state_color(self.state.connection), "\u{2B24}");
            ui.label(self.state.connection.to_string());
        });
        ui.label(format!("Broker: {}", self.broker_label));
        ui.label(format!(
            "Publish: {}   Subscribe: {}",
            self.topics.publish, self.topics.subscribe
        ));
        if let Some(error) = &self.state.last_error {
            ui.colored_label(UiColors::INACTIVE, error);
        }

        ui.add_space(4.0);

        create_frame(UiColors::MAIN_BG, UiColors::BORDER).show(ui, |ui| {
            ui.set_min_width(ui.available_width());
            ui.label("Last message");
            let text = self
                .state
                .last_message
                .as_deref()
                .unwrap_or("No message received yet");
            ui.label(RichText::new(text).monospace().size(16.0));
        });

        ui.add_space(4.0);

        ui.horizontal(|ui| {
            let publish = ui.add_enabled(self.state.can_publish(), Button::new("Publish"));
            if publish.clicked() {
                self.publish();
            }
            ui.label(format!(
                "sent: {}  received: {}",
                self.state.sent, self.state.received
            ));
        });

        ui.add_space(4.0);

        create_frame(UiColors::INNER_BG, UiColors::BORDER).show(ui, |ui| {
            ScrollArea::vertical()
                .stick_to_bottom(true)
                .auto_shrink([false, false])
                .show(ui, |ui| {
                    if self.state.log.is_empty() {
                        ui.label("Message log is empty");
                    }
                    for msg in &self.state.log {
                        let color = match msg.direction {
                            Direction::Inbound => ui.visuals().text_color(),
                            Direction::Outbound => UiColors::OUTBOUND_TEXT,
                        };
                        ui.colored_label(color, msg.to_string());
                    }
                });
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inbound(content: &str) -> MQTTMessage {
        MQTTMessage::inbound("/pk/dn/user/get".to_string(), content.to_string())
    }

    #[test]
    fn test_state_changes() {
        let mut state = ScreenState::new(10);
        assert!(!state.can_publish());

        state.apply(MqttEvent::Error("boom".to_string()));
        state.set_connection(ConnectionState::Connecting);
        assert_eq!(state.last_error.as_deref(), Some("boom"));
        assert!(!state.can_publish());

        state.set_connection(ConnectionState::Connected);
        assert!(state.can_publish());
        assert_eq!(state.last_error, None);

        state.set_connection(ConnectionState::Publishing);
        assert!(!state.can_publish());
    }

    #[test]
    fn test_error_kept_while_staying_connected() {
        let mut state = ScreenState::new(10);
        state.set_connection(ConnectionState::Connected);
        state.last_error = Some("Failed to queue publish".to_string());

        // Same state on every frame must not wipe the error
        state.set_connection(ConnectionState::Connected);
        assert_eq!(state.last_error.as_deref(), Some("Failed to queue publish"));
    }

    #[test]
    fn test_last_message_tracks_inbound_only() {
        let mut state = ScreenState::new(10);
        state.apply(MqttEvent::MessageReceived(inbound("first")));
        state.apply(MqttEvent::MessageSent(MQTTMessage::outbound(
            "/pk/dn/user/update".to_string(),
            "hello".to_string(),
        )));

        assert_eq!(state.last_message.as_deref(), Some("first"));
        assert_eq!(state.received, 1);
        assert_eq!(state.sent, 1);
        assert_eq!(state.log.len(), 2);
    }

    #[test]
    fn test_log_is_bounded() {
        let mut state = ScreenState::new(3);
        for i in 0..5 {
            state.apply(MqttEvent::MessageReceived(inbound(&format!("msg {}", i))));
        }
        let contents: Vec<_> = state.log.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["msg 2", "msg 3", "msg 4"]);
        assert_eq!(state.received, 5);
    }

    #[test]
    fn test_state_follows_watch_when_events_dropped() {
        let (event_tx, event_rx) = mpsc::channel(1);
        let (command_tx, _command_rx) = mpsc::channel(1);
        let (state_tx, state_rx) = watch::channel(ConnectionState::Publishing);
        let identity = crate::credential::DeviceIdentity::new("pk", "dn", "secret");
        let mut screen = MQTTScreenData::new(
            state_rx,
            event_rx,
            command_tx,
            identity.to_string(),
            "tcp://localhost:1883".to_string(),
            DeviceTopics::for_device(&identity),
            50,
        );

        event_tx.try_send(MqttEvent::MessageReceived(inbound("a"))).unwrap();
        assert!(event_tx.try_send(MqttEvent::MessageReceived(inbound("b"))).is_err());
        state_tx.send_replace(ConnectionState::Connected);

        screen.drain_events();
        assert!(screen.state().can_publish());
        assert_eq!(screen.state().received, 1);
    }

    #[tokio::test]
    async fn test_screen_drains_events_and_queues_publish() {
        let (event_tx, event_rx) = mpsc::channel(10);
        let (command_tx, mut command_rx) = mpsc::channel(10);
        let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);
        let identity = crate::credential::DeviceIdentity::new("pk", "dn", "secret");
        let mut screen = MQTTScreenData::new(
            state_rx,
            event_rx,
            command_tx,
            identity.to_string(),
            "tcp://localhost:1883".to_string(),
            DeviceTopics::for_device(&identity),
            50,
        );

        state_tx.send_replace(ConnectionState::Connected);
        event_tx
            .send(MqttEvent::MessageReceived(inbound("from cloud")))
            .await
            .unwrap();
        screen.drain_events();

        assert_eq!(screen.state().connection, ConnectionState::Connected);
        assert_eq!(screen.state().last_message.as_deref(), Some("from cloud"));

        screen.publish();
        match command_rx.recv().await {
            Some(MqttCommand::Publish(payload)) => assert!(payload.starts_with("hello IoT ")),
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
