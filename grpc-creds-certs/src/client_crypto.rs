use crate::{certs::read_certs, crypto_provider, crypto_source::CredentialSource, error::*, log::*, ALPN_H2};
use rustls::{pki_types::ServerName, ClientConfig, RootCertStore};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_rustls::{client::TlsStream, TlsConnector};

/* ------------------------------------------------ */
/// Client-side transport credentials: a trust pool built from the source certificate(s)
/// plus the server name the peer certificate must be valid for
#[derive(Debug, Clone)]
pub struct ClientCredentials {
  config: Arc<ClientConfig>,
  server_name: ServerName<'static>,
  trust_pool_len: usize,
}

impl ClientCredentials {
  /// Build a trust pool from the certificate(s) of the source into a fresh client config.
  /// A pool without any trust anchor is never produced.
  pub fn from_source<S>(source: &S) -> Result<Self, CredError>
  where
    S: CredentialSource + ?Sized,
  {
    let expected = source.expected_server_name();
    let server_name = ServerName::try_from(expected.to_owned())
      .map_err(|e| CredError::InvalidServerName(format!("{expected}: {e}")))?;

    let mut trust_pool = RootCertStore::empty();
    for cert in read_certs(source.cert_pem())? {
      if let Err(e) = trust_pool.add(cert) {
        error!("Failed to add certificate to the trust pool: {e}");
        return Err(CredError::malformed(format!("Trust pool rejected the certificate: {e}")));
      }
    }
    let trust_pool_len = trust_pool.len();
    if trust_pool_len == 0 {
      return Err(CredError::malformed("Trust pool has no trust anchor"));
    }

    let mut config = ClientConfig::builder_with_provider(crypto_provider())
      .with_safe_default_protocol_versions()?
      .with_root_certificates(trust_pool)
      .with_no_client_auth();
    config.alpn_protocols = vec![ALPN_H2.to_vec()];

    debug!("Built client credentials pinned to {expected} with {trust_pool_len} trust anchor(s)");
    Ok(Self {
      config: Arc::new(config),
      server_name,
      trust_pool_len,
    })
  }

  /// rustls client config to hand to the transport layer
  pub fn config(&self) -> Arc<ClientConfig> {
    self.config.clone()
  }

  /// Pinned server name sent as SNI and checked against the peer certificate
  pub fn server_name(&self) -> &ServerName<'static> {
    &self.server_name
  }

  /// Number of trust anchors in the pool
  pub fn trust_pool_len(&self) -> usize {
    self.trust_pool_len
  }

  pub fn connector(&self) -> TlsConnector {
    TlsConnector::from(self.config.clone())
  }

  /// Run the client handshake over `stream`. The pinned server name is used whatever address the stream was dialed to.
  pub async fn connect<IO>(&self, stream: IO) -> std::io::Result<TlsStream<IO>>
  where
    IO: AsyncRead + AsyncWrite + Unpin,
  {
    self.connector().connect(self.server_name.clone(), stream).await
  }
}

/* ------------------------------------------------ */
#[cfg(test)]
mod tests {
  use super::*;
  use crate::{embedded::CERT_PEM, EmbeddedSource, PemSourceBuilder};

  const UNRELATED_CERT_PEM: &[u8] = include_bytes!("../../example-certs/unrelated.crt");

  #[test]
  fn build_from_embedded_source_repeatedly() {
    for _ in 0..3 {
      let client_credentials = ClientCredentials::from_source(&EmbeddedSource).unwrap();
      assert_eq!(client_credentials.trust_pool_len(), 1);
      assert_eq!(
        client_credentials.server_name(),
        &ServerName::try_from("grpc-creds.local").unwrap()
      );
      assert_eq!(client_credentials.config().alpn_protocols, vec![b"h2".to_vec()]);
    }
  }

  #[test]
  fn truncated_base64_body_fails() {
    let pem = std::str::from_utf8(CERT_PEM).unwrap();
    let lines = pem.lines().collect::<Vec<_>>();
    // keep the BEGIN line, two body lines and the END line
    let truncated = [lines[0], lines[1], lines[2], lines[lines.len() - 1]].join("\n");
    let source = PemSourceBuilder::default().cert_pem(truncated).build().unwrap();

    let res = ClientCredentials::from_source(&source);
    assert!(matches!(res, Err(CredError::MalformedCredentialMaterial(_))));
  }

  #[test]
  fn missing_end_marker_fails() {
    let pem = std::str::from_utf8(CERT_PEM).unwrap();
    let unterminated = pem.replace("-----END CERTIFICATE-----", "");
    let source = PemSourceBuilder::default().cert_pem(unterminated).build().unwrap();
    assert!(matches!(
      ClientCredentials::from_source(&source),
      Err(CredError::MalformedCredentialMaterial(_))
    ));
  }

  #[test]
  fn no_certificate_fails() {
    let source = PemSourceBuilder::default().cert_pem(b"garbage").build().unwrap();
    assert!(matches!(
      ClientCredentials::from_source(&source),
      Err(CredError::MalformedCredentialMaterial(_))
    ));
  }

  #[test]
  fn pool_holds_every_given_certificate() {
    let bundle = [CERT_PEM, UNRELATED_CERT_PEM].concat();
    let source = PemSourceBuilder::default().cert_pem(bundle).build().unwrap();
    let client_credentials = ClientCredentials::from_source(&source).unwrap();
    assert_eq!(client_credentials.trust_pool_len(), 2);
  }

  #[test]
  fn server_name_override() {
    let source = PemSourceBuilder::default()
      .cert_pem(CERT_PEM)
      .server_name("other.internal")
      .build()
      .unwrap();
    let client_credentials = ClientCredentials::from_source(&source).unwrap();
    assert_eq!(
      client_credentials.server_name(),
      &ServerName::try_from("other.internal").unwrap()
    );
  }

  #[test]
  fn invalid_server_name_fails() {
    let source = PemSourceBuilder::default()
      .cert_pem(CERT_PEM)
      .server_name("not a name")
      .build()
      .unwrap();
    assert!(matches!(
      ClientCredentials::from_source(&source),
      Err(CredError::InvalidServerName(_))
    ));
  }
}
