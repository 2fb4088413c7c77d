//! Device identity triple issued by the IoT platform

use serde::Deserialize;
use std::fmt;

use super::error::{CredentialError, IdentityField};

/// Device secret used as the HMAC key.
///
/// `Debug` and `Display` never print the value. There is no `Serialize` impl,
/// so the secret cannot be written back into a config file by accident.
#[derive(Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct DeviceSecret(String);

impl DeviceSecret {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    /// Raw secret, only meant for keying the MAC
    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for DeviceSecret {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "DeviceSecret(***)")
    }
}

impl fmt::Display for DeviceSecret {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "***")
    }
}

impl From<&str> for DeviceSecret {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for DeviceSecret {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// Product key, device name and device secret of one registered device
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DeviceIdentity {
    pub product_key: String,
    pub device_name: String,
    pub device_secret: DeviceSecret,
}

impl DeviceIdentity {
    pub fn new(
        product_key: impl Into<String>,
        device_name: impl Into<String>,
        device_secret: impl Into<DeviceSecret>,
    ) -> Self {
        Self {
            product_key: product_key.into(),
            device_name: device_name.into(),
            device_secret: device_secret.into(),
        }
    }

    /// Checks that every field of the triple is non-empty
    pub fn validate(&self) -> Result<(), CredentialError> {
        if self.product_key.is_empty() {
            return Err(CredentialError::InvalidIdentity(IdentityField::ProductKey));
        }
        if self.device_name.is_empty() {
            return Err(CredentialError::InvalidIdentity(IdentityField::DeviceName));
        }
        if self.device_secret.is_empty() {
            return Err(CredentialError::InvalidIdentity(
                IdentityField::DeviceSecret,
            ));
        }
        Ok(())
    }
}

impl fmt::Display for DeviceIdentity {
    /// Formats as "product_key/device_name"
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}/{}", self.product_key, self.device_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_redacts_secret() {
        let identity = DeviceIdentity::new("pk", "dn", "super-secret-value");
        let rendered = format!("{:?}", identity);
        assert!(!rendered.contains("super-secret-value"));
        assert!(rendered.contains("DeviceSecret(***)"));
        assert_eq!(identity.device_secret.to_string(), "***");
    }

    #[test]
    fn test_display_shows_pk_and_dn() {
        let identity = DeviceIdentity::new("a11xsrWmW14", "paho_android", "s");
        assert_eq!(identity.to_string(), "a11xsrWmW14/paho_android");
    }

    #[test]
    fn test_validate_reports_first_empty_field() {
        assert_eq!(
            DeviceIdentity::new("", "", "").validate(),
            Err(CredentialError::InvalidIdentity(IdentityField::ProductKey))
        );
        assert_eq!(
            DeviceIdentity::new("pk", "", "s").validate(),
            Err(CredentialError::InvalidIdentity(IdentityField::DeviceName))
        );
        assert_eq!(
            DeviceIdentity::new("pk", "dn", "").validate(),
            Err(CredentialError::InvalidIdentity(IdentityField::DeviceSecret))
        );
        assert!(DeviceIdentity::new("pk", "dn", "s").validate().is_ok());
    }
}
