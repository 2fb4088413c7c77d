use aiot_mqtt_demo::config::AppConfig;
use aiot_mqtt_demo::mqtt::{DeviceTopics, MqttConfig, MqttHandle};
use aiot_mqtt_demo::ui::{DemoUI, ScreenLabels};
use color_eyre::{eyre::eyre, Result};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    setup()?;

    let config = AppConfig::load().await?;
    info!("Starting demo for device {}", config.device);

    let mqtt_config = MqttConfig::from_app_config(&config)
        .map_err(|e| eyre!("Invalid broker configuration: {}", e))?;

    let labels = ScreenLabels {
        device: config.device.to_string(),
        broker: mqtt_config.broker.to_string(),
        topics: DeviceTopics::for_device(&config.device),
    };

    let (mut mqtt_handle, mqtt_events) =
        MqttHandle::spawn(mqtt_config, config.device.clone(), config.session.clone());
    let command_sender = mqtt_handle.sender();
    let connection = mqtt_handle.state();
    let cancel = mqtt_handle.cancellation_token();

    info!("Starting UI");
    let mut native_options = eframe::NativeOptions::default();
    native_options.viewport = egui::ViewportBuilder::default()
        .with_title(config.ui.window_title.clone())
        .with_inner_size([480.0, 640.0]);

    let ui_config = config.ui.clone();
    let ui_result = eframe::run_native(
        &config.ui.window_title,
        native_options,
        Box::new(move |cc| {
            Ok(Box::new(DemoUI::new(
                cc,
                connection,
                mqtt_events,
                command_sender,
                cancel,
                labels,
                &ui_config,
            )))
        }),
    );

    // Window is gone either way, make sure the broker sees DISCONNECT
    mqtt_handle.shutdown().await;

    ui_result.map_err(|e| eyre!("UI terminated with error: {}", e))?;
    info!("Shut down cleanly");
    Ok(())
}

fn setup() -> Result<()> {
    if std::env::var("RUST_LIB_BACKTRACE").is_err() {
        std::env::set_var("RUST_LIB_BACKTRACE", "0")
    }
    color_eyre::install()?;
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info")
    }
    setup_logging_env();
    Ok(())
}

fn setup_logging_env() {
    FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .pretty()
        .init();
}
