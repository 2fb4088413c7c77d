//! HMAC-SHA256 signing scheme for the MQTT CONNECT credentials
//!
//! The broker recomputes the same MAC from the client id fields, so every byte of
//! the output below is part of the wire contract:
//!
//! ```text
//! client_id = {pk}.{dn}|timestamp={ts},_v={tag},securemode=2,signmethod=hmacsha256|
//! username  = {dn}&{pk}
//! password  = hex(HMAC-SHA256(secret, "clientId{pk}.{dn}deviceName{dn}productKey{pk}timestamp{ts}"))
//! ```

use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::fmt;
use tracing::debug;

use super::error::{CredentialError, IdentityField};
use super::identity::DeviceIdentity;

type HmacSha256 = Hmac<Sha256>;

/// Client library tag embedded in the client id by default
pub const DEFAULT_VERSION_TAG: &str = "paho-android-1.0.0";

/// Broker-side authentication mode, fixed by the vendor contract
const SECURE_MODE: &str = "2";

/// Signing method announced in the client id, must match the MAC below
const SIGN_METHOD: &str = "hmacsha256";

/// The three values an MQTT CONNECT packet needs
///
/// Built right before a connection attempt and dropped afterwards; the embedded
/// timestamp makes it unsuitable for reuse across reconnects.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectCredential {
    pub client_id: String,
    pub username: String,
    pub password: String,
}

impl fmt::Debug for ConnectCredential {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("ConnectCredential")
            .field("client_id", &self.client_id)
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// Derives the CONNECT credential for `identity` at `now_millis`
/// (milliseconds since the Unix epoch), using the default version tag.
///
/// # Errors
///
/// * [`CredentialError::InvalidIdentity`] - one of the identity fields is empty
/// * [`CredentialError::SigningFailure`] - the HMAC primitive could not be keyed
pub fn derive(
    identity: &DeviceIdentity,
    now_millis: i64,
) -> Result<ConnectCredential, CredentialError> {
    derive_with_tag(identity, now_millis, DEFAULT_VERSION_TAG)
}

/// Same as [`derive`], with a caller-chosen protocol version tag in the client id.
///
/// The tag only shows up in `client_id`; it is not part of the MAC source.
pub fn derive_with_tag(
    identity: &DeviceIdentity,
    now_millis: i64,
    version_tag: &str,
) -> Result<ConnectCredential, CredentialError> {
    identity.validate()?;
    if version_tag.is_empty() {
        return Err(CredentialError::InvalidIdentity(IdentityField::VersionTag));
    }

    let product_key = identity.product_key.as_str();
    let device_name = identity.device_name.as_str();
    let timestamp = now_millis.to_string();

    let client_id = format!(
        "{}.{}|timestamp={},_v={},securemode={},signmethod={}|",
        product_key, device_name, timestamp, version_tag, SECURE_MODE, SIGN_METHOD
    );

    let username = format!("{}&{}", device_name, product_key);

    let mac_source = mac_source(product_key, device_name, &timestamp);
    let password = sign(identity.device_secret.expose(), &mac_source)?;

    debug!(
        "Derived connect credential for {} at timestamp {}",
        identity, timestamp
    );

    Ok(ConnectCredential {
        client_id,
        username,
        password,
    })
}

/// Derives a credential stamped with the current wall-clock time
pub fn derive_now(
    identity: &DeviceIdentity,
    version_tag: &str,
) -> Result<ConnectCredential, CredentialError> {
    let now_millis = chrono::Utc::now().timestamp_millis();
    derive_with_tag(identity, now_millis, version_tag)
}

// Field order is significant, the broker rebuilds this string verbatim.
fn mac_source(product_key: &str, device_name: &str, timestamp: &str) -> String {
    format!(
        "clientId{pk}.{dn}deviceName{dn}productKey{pk}timestamp{ts}",
        pk = product_key,
        dn = device_name,
        ts = timestamp
    )
}

/// HMAC-SHA256 over `message`, as 64 lowercase hex characters
fn sign(secret: &str, message: &str) -> Result<String, CredentialError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| CredentialError::SigningFailure(format!("Failed to key HMAC: {}", e)))?;
    mac.update(message.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const PRODUCT_KEY: &str = "a11xsrWmW14";
    const DEVICE_NAME: &str = "paho_android";
    const DEVICE_SECRET: &str = "tLMT9QWD36U2SArglGqcHCDK9rK9nOrA";

    fn demo_identity() -> DeviceIdentity {
        DeviceIdentity::new(PRODUCT_KEY, DEVICE_NAME, DEVICE_SECRET)
    }

    #[test]
    fn test_mac_source_layout() {
        assert_eq!(
            mac_source("pk", "dn", "42"),
            "clientIdpk.dndeviceNamednproductKeypktimestamp42"
        );
    }

    #[test]
    fn test_demo_device_credential() {
        let credential = derive(&demo_identity(), 1_700_000_000_000).unwrap();
        assert_eq!(
            credential.client_id,
            "a11xsrWmW14.paho_android|timestamp=1700000000000,_v=paho-android-1.0.0,securemode=2,signmethod=hmacsha256|"
        );
        assert_eq!(credential.username, "paho_android&a11xsrWmW14");
        assert_eq!(
            credential.password,
            "70dbf6953241559ce48cf04e7e61127d6696df1e5d9f991398d220f4527a0f7f"
        );
    }

    #[test]
    fn test_known_passwords() {
        let cases = [
            (
                DEVICE_SECRET,
                0_i64,
                "02a6d16b862690797479ff09fb7a9307e65ba658f6a4fbb5f8bf934ed900c436",
            ),
            // Leading zero byte must keep its two hex digits
            (
                DEVICE_SECRET,
                1_700_000_000_407,
                "0076e0e9600db3e86dc39c7230256837827ce460d7832ed13dc0a27af5daf704",
            ),
            (
                "uLMT9QWD36U2SArglGqcHCDK9rK9nOrA",
                1_700_000_000_000,
                "88e78fd3ad6d8c6d407bb425590716b94fb52e3861349593085882e3a990e273",
            ),
        ];
        for (secret, now, expected) in cases {
            let identity = DeviceIdentity::new(PRODUCT_KEY, DEVICE_NAME, secret);
            assert_eq!(derive(&identity, now).unwrap().password, expected);
        }
    }

    #[test]
    fn test_derive_is_deterministic() {
        let first = derive(&demo_identity(), 1_700_000_000_000).unwrap();
        let second = derive(&demo_identity(), 1_700_000_000_000).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_password_is_64_lowercase_hex() {
        for now in [0_i64, 1, 999, 1_700_000_000_000, 1_700_000_000_407] {
            let credential = derive(&demo_identity(), now).unwrap();
            assert_eq!(credential.password.len(), 64);
            assert!(credential
                .password
                .chars()
                .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));
        }
    }

    #[test]
    fn test_timestamp_rendered_without_grouping() {
        let credential = derive(&demo_identity(), 1_700_000_000_000).unwrap();
        assert!(credential.client_id.contains("|timestamp=1700000000000,"));
        assert_eq!(credential.username, "paho_android&a11xsrWmW14");
    }

    #[test]
    fn test_secret_change_only_affects_password() {
        let original = derive(&demo_identity(), 1_700_000_000_000).unwrap();
        let tweaked_identity =
            DeviceIdentity::new(PRODUCT_KEY, DEVICE_NAME, "uLMT9QWD36U2SArglGqcHCDK9rK9nOrA");
        let tweaked = derive(&tweaked_identity, 1_700_000_000_000).unwrap();

        assert_eq!(original.client_id, tweaked.client_id);
        assert_eq!(original.username, tweaked.username);
        assert_ne!(original.password, tweaked.password);
    }

    #[test]
    fn test_empty_fields_rejected() {
        let cases = [
            (DeviceIdentity::new("", DEVICE_NAME, DEVICE_SECRET), IdentityField::ProductKey),
            (DeviceIdentity::new(PRODUCT_KEY, "", DEVICE_SECRET), IdentityField::DeviceName),
            (DeviceIdentity::new(PRODUCT_KEY, DEVICE_NAME, ""), IdentityField::DeviceSecret),
        ];
        for (identity, field) in cases {
            assert_eq!(
                derive(&identity, 1_700_000_000_000),
                Err(CredentialError::InvalidIdentity(field))
            );
        }
    }

    #[test]
    fn test_custom_version_tag() {
        let default = derive(&demo_identity(), 1_700_000_000_000).unwrap();
        let tagged = derive_with_tag(&demo_identity(), 1_700_000_000_000, "rust-demo-0.1.0").unwrap();

        assert!(tagged.client_id.contains(",_v=rust-demo-0.1.0,"));
        assert_eq!(default.password, tagged.password);
        assert_eq!(
            derive_with_tag(&demo_identity(), 1, ""),
            Err(CredentialError::InvalidIdentity(IdentityField::VersionTag))
        );
    }

    #[test]
    fn test_debug_redacts_password() {
        let credential = derive(&demo_identity(), 1_700_000_000_000).unwrap();
        let rendered = format!("{:?}", credential);
        assert!(!rendered.contains(&credential.password));
        assert!(rendered.contains(&credential.client_id));
    }

    #[test]
    fn test_derive_now_embeds_recent_timestamp() {
        let before = chrono::Utc::now().timestamp_millis();
        let credential = derive_now(&demo_identity(), DEFAULT_VERSION_TAG).unwrap();
        let after = chrono::Utc::now().timestamp_millis();

        let ts: i64 = credential
            .client_id
            .split("timestamp=")
            .nth(1)
            .and_then(|rest| rest.split(',').next())
            .and_then(|ts| ts.parse().ok())
            .unwrap();
        assert!(ts >= before && ts <= after);
    }
}
