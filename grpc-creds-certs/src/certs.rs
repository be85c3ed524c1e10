use crate::{error::*, log::*};
use rustls::{
  crypto::CryptoProvider,
  pki_types::{self, pem::PemObject},
  sign::CertifiedKey,
  InconsistentKeys,
};
use std::sync::Arc;
use x509_parser::prelude::*;

/* ------------------------------------------------ */
/// Raw certificates in rustls format
pub(crate) type Certificate = pki_types::CertificateDer<'static>;
/// Raw private key in rustls format
type PrivateKey = pki_types::PrivateKeyDer<'static>;

/* ------------------------------------------------ */
/// Decode PEM certificates. Fails when the material holds no certificate at all.
pub(crate) fn read_certs(cert_pem: &[u8]) -> Result<Vec<Certificate>, CredError> {
  debug!("Read TLS certificates");
  let certs = Certificate::pem_slice_iter(cert_pem)
    .collect::<Result<Vec<_>, _>>()
    .map_err(|e| CredError::malformed(format!("Unable to parse the certificates: {e:?}")))?;
  if certs.is_empty() {
    return Err(CredError::malformed("No certificate found in PEM material"));
  }
  Ok(certs)
}

/// Decode PEM private keys, PKCS#8 first and then RSA (PKCS#1)
fn read_keys(key_pem: &[u8]) -> Result<Vec<PrivateKey>, CredError> {
  debug!("Read TLS private key");
  let pkcs8_keys = pki_types::PrivatePkcs8KeyDer::pem_slice_iter(key_pem)
    .map(|v| v.map(PrivateKey::Pkcs8))
    .collect::<Result<Vec<_>, _>>()
    .map_err(|e| CredError::malformed(format!("Unable to parse the private keys (PKCS8): {e:?}")))?;
  let mut rsa_keys = pki_types::PrivatePkcs1KeyDer::pem_slice_iter(key_pem)
    .map(|v| v.map(PrivateKey::Pkcs1))
    .collect::<Result<Vec<_>, _>>()
    .map_err(|e| CredError::malformed(format!("Unable to parse the private keys (RSA): {e:?}")))?;

  let mut keys = pkcs8_keys;
  keys.append(&mut rsa_keys);
  if keys.is_empty() {
    return Err(CredError::malformed(
      "No private keys found - Make sure that they are in PKCS#1 or PKCS#8 PEM format",
    ));
  }
  Ok(keys)
}

/* ------------------------------------------------ */
/// Certificates and private keys decoded from a single PEM pair
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct CertsKeys {
  certs: Vec<Certificate>,
  cert_keys: Arc<Vec<PrivateKey>>,
}

impl CertsKeys {
  /// Decode a PEM certificate/key pair
  pub fn from_pem(cert_pem: &[u8], key_pem: &[u8]) -> Result<Self, CredError> {
    Ok(Self {
      certs: read_certs(cert_pem)?,
      cert_keys: Arc::new(read_keys(key_pem)?),
    })
  }

  /// End-entity certificate
  pub fn end_entity_cert(&self) -> &Certificate {
    // read_certs never yields an empty list
    &self.certs[0]
  }

  /// Parse the private key with the given provider and return a rustls CertifiedKey whose key matches its certificate
  pub fn rustls_certified_key(&self, provider: &CryptoProvider) -> Result<CertifiedKey, CredError> {
    let signing_key = self
      .cert_keys
      .iter()
      .find_map(|k| provider.key_provider.load_private_key(k.clone_key()).ok())
      .ok_or_else(|| CredError::malformed("Unable to find a supported private key"))?;

    let certified_key = CertifiedKey::new(self.certs.clone(), signing_key);
    match certified_key.keys_match() {
      // key type without public key export, nothing to compare
      Ok(()) | Err(rustls::Error::InconsistentKeys(InconsistentKeys::Unknown)) => Ok(certified_key),
      Err(e) => {
        warn!("Private key does not match the certificate: {e}");
        Err(CredError::malformed(format!("Private key does not match the certificate: {e}")))
      }
    }
  }

  /// Subject and SAN names of the end-entity certificate
  pub fn identity_summary(&self) -> Result<IdentitySummary, CredError> {
    IdentitySummary::from_cert_der(self.end_entity_cert())
  }
}

/* ------------------------------------------------ */
/// Human readable identity of a certificate
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct IdentitySummary {
  /// Subject distinguished name, e.g. `CN=grpc-creds.local, O=grpc-creds`
  pub subject: String,
  /// DNS names in the subject alternative name extension
  pub dns_names: Vec<String>,
}

impl IdentitySummary {
  pub fn from_cert_der(der: &[u8]) -> Result<Self, CredError> {
    let (_, x509_cert) =
      parse_x509_certificate(der).map_err(|e| CredError::malformed(format!("Unable to parse the certificate: {e}")))?;

    let dns_names = match x509_cert.subject_alternative_name() {
      Ok(Some(san)) => san
        .value
        .general_names
        .iter()
        .filter_map(|name| match name {
          GeneralName::DNSName(dns) => Some(dns.to_string()),
          _ => None,
        })
        .collect(),
      _ => vec![],
    };

    Ok(Self {
      subject: x509_cert.subject().to_string(),
      dns_names,
    })
  }
}

/* ------------------------------------------------ */
