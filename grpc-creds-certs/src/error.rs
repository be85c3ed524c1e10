use thiserror::Error;

/// Describes things that can go wrong while building transport credentials
#[derive(Debug, Error)]
pub enum CredError {
  /// PEM or DER decoding failed, a certificate or key is missing, the key does not match the certificate,
  /// or the trust pool rejected a certificate
  #[error("Malformed credential material: {0}")]
  MalformedCredentialMaterial(String),
  /// The pinned server name is not usable as a TLS server name
  #[error("Invalid expected server name: {0}")]
  InvalidServerName(String),
  /// rustls refused to build a server or client config
  #[error("Failed to build TLS config: {0}")]
  TlsConfig(#[from] rustls::Error),
}

impl CredError {
  pub(crate) fn malformed<T: std::fmt::Display>(reason: T) -> Self {
    CredError::MalformedCredentialMaterial(reason.to_string())
  }
}
