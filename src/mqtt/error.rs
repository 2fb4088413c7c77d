//! Error definitions for the MQTT session

use thiserror::Error;

use crate::credential::CredentialError;

/// Errors that end an MQTT session attempt
///
/// None of the variants carry the device secret or the derived password.
#[derive(Debug, Error)]
pub enum MqttError {
    /// Credential derivation failed before any network activity
    #[error("Credential error: {0}")]
    Credential(#[from] CredentialError),

    /// The configured broker URL could not be parsed
    #[error("Invalid broker URL: {0}")]
    InvalidBrokerUrl(String),

    /// The request could not be queued on the client
    #[error("Client error: {0}")]
    Client(#[from] rumqttc::ClientError),

    /// Network or protocol failure reported by the event loop
    #[error("Connection error: {0}")]
    Connection(#[source] rumqttc::ConnectionError),

    /// CONNACK carried a non-success return code
    #[error("Connection refused by broker: {0}")]
    ConnectionRefused(String),

    /// SUBACK reported a failure for the subscription
    #[error("Subscription rejected for topic {0}")]
    SubscriptionRejected(String),

    /// The broker did not answer in time
    #[error("Timed out waiting for {0}")]
    Timeout(&'static str),

    /// Operation needs a live client but the session has none
    #[error("Session is not connected")]
    NotConnected,
}

impl From<rumqttc::ConnectionError> for MqttError {
    fn from(error: rumqttc::ConnectionError) -> Self {
        match error {
            rumqttc::ConnectionError::ConnectionRefused(code) => {
                MqttError::ConnectionRefused(format!("{:?}", code))
            }
            other => MqttError::Connection(other),
        }
    }
}

impl MqttError {
    /// Whether another attempt with a fresh credential can succeed
    ///
    /// Identity, broker URL and topic ACL problems come from configuration and
    /// fail the same way every time.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            MqttError::Credential(_)
                | MqttError::InvalidBrokerUrl(_)
                | MqttError::SubscriptionRejected(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credential::IdentityField;

    #[test]
    fn test_configuration_errors_are_not_retryable() {
        assert!(!MqttError::Credential(CredentialError::InvalidIdentity(
            IdentityField::DeviceSecret
        ))
        .is_retryable());
        assert!(!MqttError::InvalidBrokerUrl("ftp://x".to_string()).is_retryable());
        assert!(!MqttError::SubscriptionRejected("/pk/dn/user/get".to_string()).is_retryable());
    }

    #[test]
    fn test_network_errors_are_retryable() {
        assert!(MqttError::Timeout("CONNACK").is_retryable());
        assert!(MqttError::ConnectionRefused("BadUserNamePassword".to_string()).is_retryable());
        assert!(MqttError::NotConnected.is_retryable());
    }
}
