//! # Device Credential Derivation
//!
//! Turns the product key / device name / device secret triple into the client id,
//! username and password of an MQTT CONNECT packet. Pure and synchronous; the
//! caller derives a fresh credential for every connection attempt because the
//! output embeds a timestamp.
//!
//! ```text
//! credential/
//! ├── identity.rs  - DeviceIdentity and the redacted DeviceSecret
//! ├── deriver.rs   - signing scheme and ConnectCredential
//! └── error.rs     - CredentialError
//! ```

pub mod deriver;
pub mod error;
pub mod identity;

pub use deriver::{derive, derive_now, derive_with_tag, ConnectCredential, DEFAULT_VERSION_TAG};
pub use error::{CredentialError, IdentityField};
pub use identity::{DeviceIdentity, DeviceSecret};
