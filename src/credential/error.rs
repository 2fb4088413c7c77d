//! Error definitions for credential derivation

use thiserror::Error;

/// Identity field that failed validation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityField {
    ProductKey,
    DeviceName,
    DeviceSecret,
    VersionTag,
}

impl std::fmt::Display for IdentityField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            IdentityField::ProductKey => "product key",
            IdentityField::DeviceName => "device name",
            IdentityField::DeviceSecret => "device secret",
            IdentityField::VersionTag => "version tag",
        };
        write!(f, "{}", name)
    }
}

/// Errors returned by the credential deriver
///
/// Derivation is all-or-nothing: any of these means no credential was produced.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CredentialError {
    /// A required identity field was empty
    #[error("Invalid device identity: {0} is empty")]
    InvalidIdentity(IdentityField),

    /// The keyed hash could not be set up or computed
    #[error("Signing failure: {0}")]
    SigningFailure(String),
}
