mod certs;
mod client_crypto;
mod crypto_source;
mod embedded;
mod error;
mod server_crypto;

#[allow(unused_imports)]
mod log {
  pub(super) use tracing::{debug, error, info, warn};
}

use rustls::crypto::{aws_lc_rs, CryptoProvider};
use std::sync::Arc;

/* ------------------------------------------------ */
pub use crate::{
  certs::{CertsKeys, IdentitySummary},
  client_crypto::ClientCredentials,
  crypto_source::{CredentialSource, EmbeddedSource, PemSource, PemSourceBuilder, PemSourceBuilderError},
  embedded::{CERT_PEM, EXPECTED_SERVER_NAME, KEY_PEM},
  error::CredError,
  server_crypto::ServerCredentials,
};

pub mod reexports {
  pub use rustls;
  pub use tokio_rustls::{TlsAcceptor, TlsConnector};
}

/* ------------------------------------------------ */
// Constants
/// ALPN protocol id advertised by both sides, gRPC runs over HTTP/2
pub const ALPN_H2: &[u8] = b"h2";

/* ------------------------------------------------ */
/// Server credentials presenting the embedded certificate and key
pub fn server_credentials() -> Result<ServerCredentials, CredError> {
  ServerCredentials::from_source(&EmbeddedSource)
}

/// Client credentials trusting the embedded certificate and pinned to [`EXPECTED_SERVER_NAME`]
pub fn client_credentials() -> Result<ClientCredentials, CredError> {
  ClientCredentials::from_source(&EmbeddedSource)
}

/// Process default crypto provider. Installs aws_lc_rs as default for rustls when none is installed yet.
pub(crate) fn crypto_provider() -> Arc<CryptoProvider> {
  if let Some(provider) = CryptoProvider::get_default() {
    return provider.clone();
  }
  // Losing a race against another installer is fine, the winner is used
  let _ = CryptoProvider::install_default(aws_lc_rs::default_provider());
  CryptoProvider::get_default()
    .cloned()
    .unwrap_or_else(|| Arc::new(aws_lc_rs::default_provider()))
}
