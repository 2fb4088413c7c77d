use rumqttc::{MqttOptions, Transport};
use std::fmt;
use std::time::Duration;

use super::error::MqttError;
use crate::config::AppConfig;
use crate::credential::{ConnectCredential, DeviceIdentity};

/// The two fixed topics of a device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceTopics {
    /// Upstream topic, "/{pk}/{dn}/user/update"
    pub publish: String,
    /// Downstream topic, "/{pk}/{dn}/user/get"
    pub subscribe: String,
}

impl DeviceTopics {
    pub fn for_device(identity: &DeviceIdentity) -> Self {
        Self {
            publish: format!(
                "/{}/{}/user/update",
                identity.product_key, identity.device_name
            ),
            subscribe: format!("/{}/{}/user/get", identity.product_key, identity.device_name),
        }
    }
}

/// Host, port and transport parsed from a broker URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerAddress {
    pub host: String,
    pub port: u16,
    pub tls: bool,
}

impl fmt::Display for BrokerAddress {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let scheme = if self.tls { "ssl" } else { "tcp" };
        write!(f, "{}://{}:{}", scheme, self.host, self.port)
    }
}

/// Resolved connection settings used by the MQTT session
#[derive(Debug, Clone, PartialEq)]
pub struct MqttConfig {
    pub broker: BrokerAddress,
    pub keep_alive: Duration,
    /// Upper bound for waiting on CONNACK, SUBACK and outgoing publishes
    pub response_timeout: Duration,
    pub version_tag: String,
    pub topics: DeviceTopics,
    /// Capacity of rumqttc's request channel
    pub request_capacity: usize,
}

impl MqttConfig {
    pub fn from_app_config(config: &AppConfig) -> Result<Self, MqttError> {
        let broker = parse_broker_url(&config.broker.endpoint(&config.device))?;

        Ok(Self {
            broker,
            keep_alive: config.broker.keep_alive(),
            response_timeout: config.broker.connect_timeout(),
            version_tag: config.broker.version_tag.clone(),
            topics: DeviceTopics::for_device(&config.device),
            request_capacity: config.session.channel_capacity,
        })
    }

    /// CONNECT options for one attempt with a freshly derived credential
    pub fn mqtt_options(&self, credential: &ConnectCredential) -> MqttOptions {
        let mut mqtt_options = MqttOptions::new(
            credential.client_id.clone(),
            self.broker.host.clone(),
            self.broker.port,
        );
        mqtt_options
            .set_credentials(credential.username.clone(), credential.password.clone())
            .set_keep_alive(self.keep_alive)
            .set_clean_session(true);

        if self.broker.tls {
            mqtt_options.set_transport(Transport::Tls(Default::default()));
        }

        mqtt_options
    }
}

/// Parses `tcp://`, `mqtt://`, `ssl://`, `mqtts://`, `tls://` or bare `host[:port]`
///
/// Missing ports default to 1883 for plain and 8883 for TLS transports.
pub fn parse_broker_url(url: &str) -> Result<BrokerAddress, MqttError> {
    let (scheme, rest) = match url.find("://") {
        Some(pos) => (&url[..pos], &url[pos + 3..]),
        None => ("tcp", url),
    };

    let tls = match scheme.to_lowercase().as_str() {
        "tcp" | "mqtt" => false,
        "ssl" | "mqtts" | "tls" => true,
        other => {
            return Err(MqttError::InvalidBrokerUrl(format!(
                "Unsupported scheme {} in {}",
                other, url
            )))
        }
    };

    let rest = rest.trim_end_matches('/');
    let (host, port) = match rest.rsplit_once(':') {
        Some((host, port)) => {
            let port = port.parse::<u16>().map_err(|_| {
                MqttError::InvalidBrokerUrl(format!("Invalid port in broker URL: {}", port))
            })?;
            (host, port)
        }
        None => (rest, if tls { 8883 } else { 1883 }),
    };

    if host.is_empty() {
        return Err(MqttError::InvalidBrokerUrl(format!(
            "Missing host in broker URL: {}",
            url
        )));
    }

    Ok(BrokerAddress {
        host: host.to_string(),
        port,
        tls,
    })
}
