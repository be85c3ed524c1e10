use crate::{
  certs::{CertsKeys, IdentitySummary},
  crypto_provider,
  crypto_source::CredentialSource,
  error::*,
  log::*,
  ALPN_H2,
};
use rustls::{
  server::{ClientHello, ResolvesServerCert},
  sign::CertifiedKey,
  ServerConfig,
};
use std::sync::Arc;
use tokio_rustls::TlsAcceptor;

/* ------------------------------------------------ */
/// Always presents the one loaded identity, whatever SNI the client sends
#[derive(Debug)]
struct SingleIdentityResolver(Arc<CertifiedKey>);

impl ResolvesServerCert for SingleIdentityResolver {
  fn resolve(&self, _client_hello: ClientHello<'_>) -> Option<Arc<CertifiedKey>> {
    Some(self.0.clone())
  }
}

/* ------------------------------------------------ */
/// Server-side transport credentials presenting a single certificate/key pair
#[derive(Debug, Clone)]
pub struct ServerCredentials {
  config: Arc<ServerConfig>,
  identity: IdentitySummary,
}

impl ServerCredentials {
  /// Parse the certificate and key of the source into a fresh server config.
  /// Every call reparses; nothing is cached.
  pub fn from_source<S>(source: &S) -> Result<Self, CredError>
  where
    S: CredentialSource + ?Sized,
  {
    let key_pem = source
      .key_pem()
      .ok_or_else(|| CredError::malformed("No private key in credential source"))?;
    let certs_keys = CertsKeys::from_pem(source.cert_pem(), key_pem)?;

    let provider = crypto_provider();
    let certified_key = certs_keys.rustls_certified_key(&provider)?;
    let identity = certs_keys.identity_summary()?;

    let mut config = ServerConfig::builder_with_provider(provider)
      .with_safe_default_protocol_versions()?
      .with_no_client_auth()
      .with_cert_resolver(Arc::new(SingleIdentityResolver(Arc::new(certified_key))));
    config.alpn_protocols = vec![ALPN_H2.to_vec()];

    debug!("Built server credentials for {}", identity.subject);
    Ok(Self {
      config: Arc::new(config),
      identity,
    })
  }

  /// rustls server config to hand to the transport layer
  pub fn config(&self) -> Arc<ServerConfig> {
    self.config.clone()
  }

  /// Identity presented to peers
  pub fn identity(&self) -> &IdentitySummary {
    &self.identity
  }

  pub fn acceptor(&self) -> TlsAcceptor {
    TlsAcceptor::from(self.config.clone())
  }
}

/* ------------------------------------------------ */
