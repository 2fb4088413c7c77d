//! # Demo User Interface
//!
//! Single egui screen showing the connection state of the demo device, the last
//! message received from the cloud, a Publish button and a bounded message log.
//!
//! The UI never touches the network. It talks to the MQTT task only through the
//! command and event channels of [`crate::mqtt::MqttHandle`]:
//!
//! ```text
//! DemoUI ─[MqttCommand]→ MQTT task ─[MqttEvent]→ DemoUI
//!                           └─[ConnectionState (watch)]→ DemoUI
//! ```
//!
//! Closing the window cancels the task's token, which makes the session send
//! DISCONNECT before the process exits.

pub mod common;
pub mod mqtt_screen;

use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::UIConfig;
use crate::mqtt::{ConnectionState, DeviceTopics, MqttCommand, MqttEvent};

use self::mqtt_screen::MQTTScreenData;

/// Labels shown in the header, prepared before the window opens
#[derive(Debug, Clone)]
pub struct ScreenLabels {
    pub device: String,
    pub broker: String,
    pub topics: DeviceTopics,
}

pub struct DemoUI {
    screen: MQTTScreenData,
    cancel: CancellationToken,
    repaint_interval: Duration,
}

impl DemoUI {
    pub fn new(
        cc: &eframe::CreationContext<'_>,
        connection: watch::Receiver<ConnectionState>,
        received_events: mpsc::Receiver<MqttEvent>,
        command_sender: mpsc::Sender<MqttCommand>,
        cancel: CancellationToken,
        labels: ScreenLabels,
        ui_config: &UIConfig,
    ) -> Self {
        cc.egui_ctx.set_theme(egui::Theme::Dark);
        DemoUI {
            screen: MQTTScreenData::new(
                connection,
                received_events,
                command_sender,
                labels.device,
                labels.broker,
                labels.topics,
                ui_config.log_limit,
            ),
            cancel,
            repaint_interval: repaint_interval(ui_config.fps),
        }
    }
}

/// Frame interval for the configured refresh rate, at least one frame per second
pub fn repaint_interval(fps: u8) -> Duration {
    Duration::from_millis(1000 / u64::from(fps.max(1)))
}

impl eframe::App for DemoUI {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // Events arrive from the MQTT task without user input, so keep polling
        ctx.request_repaint_after(self.repaint_interval);

        if ctx.input(|i| i.viewport().close_requested()) && !self.cancel.is_cancelled() {
            info!("Window closing, disconnecting from broker");
            self.cancel.cancel();
        }

        egui::CentralPanel::default().show(ctx, |ui| {
            self.screen.render(ui);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repaint_interval() {
        assert_eq!(repaint_interval(30), Duration::from_millis(33));
        assert_eq!(repaint_interval(0), Duration::from_millis(1000));
    }
}
