use crate::{
  constants::*,
  error::{anyhow, ensure},
  smoke::SmokeConfig,
};
use serde::Deserialize;
use std::{fs, net::SocketAddr};
use tokio::time::Duration;

#[derive(Deserialize, Debug, Default, PartialEq, Eq, Clone)]
#[serde(deny_unknown_fields)]
pub struct ConfigToml {
  pub listen_address: Option<String>,
  pub connect_address: Option<String>,
  pub handshake_timeout_sec: Option<u64>,
}

impl TryInto<SmokeConfig> for &ConfigToml {
  type Error = anyhow::Error;

  fn try_into(self) -> std::result::Result<SmokeConfig, Self::Error> {
    let listen_address = parse_socket_addr(self.listen_address.as_deref().unwrap_or(DEFAULT_LISTEN_ADDRESS))?;
    let connect_address = parse_socket_addr(self.connect_address.as_deref().unwrap_or(DEFAULT_CONNECT_ADDRESS))?;

    let handshake_timeout_sec = self.handshake_timeout_sec.unwrap_or(DEFAULT_HANDSHAKE_TIMEOUT_SEC);
    ensure!(handshake_timeout_sec > 0, "handshake_timeout_sec must be positive");

    Ok(SmokeConfig {
      listen_address,
      connect_address,
      handshake_timeout: Duration::from_secs(handshake_timeout_sec),
    })
  }
}

fn parse_socket_addr(addr: &str) -> std::result::Result<SocketAddr, anyhow::Error> {
  addr.parse::<SocketAddr>().map_err(|e| anyhow!("Invalid socket address {addr}: {e}"))
}

impl ConfigToml {
  pub fn new(config_file: &str) -> std::result::Result<Self, anyhow::Error> {
    let config_str = fs::read_to_string(config_file)?;

    toml::from_str(&config_str).map_err(|e| anyhow!(e))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn defaults_when_empty() {
    let config_toml: ConfigToml = toml::from_str("").unwrap();
    assert_eq!(config_toml, ConfigToml::default());

    let smoke_config: SmokeConfig = (&config_toml).try_into().unwrap();
    assert_eq!(smoke_config.listen_address, DEFAULT_LISTEN_ADDRESS.parse::<SocketAddr>().unwrap());
    assert_eq!(smoke_config.connect_address, DEFAULT_CONNECT_ADDRESS.parse::<SocketAddr>().unwrap());
    assert_eq!(
      smoke_config.handshake_timeout,
      Duration::from_secs(DEFAULT_HANDSHAKE_TIMEOUT_SEC)
    );
  }

  #[test]
  fn overrides() {
    let config_toml: ConfigToml = toml::from_str(
      r#"
listen_address = "[::1]:8443"
connect_address = "10.0.0.2:8443"
handshake_timeout_sec = 10
"#,
    )
    .unwrap();
    let smoke_config: SmokeConfig = (&config_toml).try_into().unwrap();
    assert_eq!(smoke_config.listen_address, "[::1]:8443".parse::<SocketAddr>().unwrap());
    assert_eq!(smoke_config.connect_address, "10.0.0.2:8443".parse::<SocketAddr>().unwrap());
    assert_eq!(smoke_config.handshake_timeout, Duration::from_secs(10));
  }

  #[test]
  fn invalid_values() {
    let config_toml = ConfigToml {
      listen_address: Some("localhost".to_string()),
      ..Default::default()
    };
    assert!(TryInto::<SmokeConfig>::try_into(&config_toml).is_err());

    let config_toml = ConfigToml {
      handshake_timeout_sec: Some(0),
      ..Default::default()
    };
    assert!(TryInto::<SmokeConfig>::try_into(&config_toml).is_err());

    assert!(toml::from_str::<ConfigToml>("unknown_key = 1").is_err());
  }
}
