use super::toml::ConfigToml;
use crate::{constants::DEFAULT_DIAL_MESSAGE, error::anyhow, smoke::SmokeConfig};
use clap::{Arg, ArgMatches, Command};

/// What the binary does once credentials are loaded
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum Mode {
  /// Build both credentials and report the identity
  Check,
  /// Accept TLS connections and echo one line per connection
  Serve,
  /// Dial the listener, send a line and print the echo
  Dial { message: String },
}

/// Parsed options
pub struct Opts {
  pub config_file_path: Option<String>,
  pub mode: Mode,
}

fn build_command() -> Command {
  let _ = include_str!("../../Cargo.toml");
  clap::command!()
    .arg(
      Arg::new("config_file")
        .long("config")
        .short('c')
        .value_name("FILE")
        .global(true)
        .help("Configuration file path like ./config.toml"),
    )
    .subcommand_required(true)
    .subcommand(Command::new("check").about("Build server and client credentials and exit"))
    .subcommand(Command::new("serve").about("Run a TLS echo listener with the server credentials"))
    .subcommand(
      Command::new("dial")
        .about("Connect to the listener with the client credentials")
        .arg(
          Arg::new("message")
            .long("message")
            .short('m')
            .value_name("TEXT")
            .default_value(DEFAULT_DIAL_MESSAGE)
            .help("Line sent to the listener"),
        ),
    )
}

fn opts_from_matches(matches: &ArgMatches) -> Result<Opts, anyhow::Error> {
  let config_file_path = matches.get_one::<String>("config_file").cloned();
  let mode = match matches.subcommand() {
    Some(("check", _)) => Mode::Check,
    Some(("serve", _)) => Mode::Serve,
    Some(("dial", sub)) => Mode::Dial {
      message: sub
        .get_one::<String>("message")
        .cloned()
        .unwrap_or_else(|| DEFAULT_DIAL_MESSAGE.to_string()),
    },
    _ => return Err(anyhow!("Unknown subcommand")),
  };

  Ok(Opts { config_file_path, mode })
}

/// Parse arg values passed from cli
pub fn parse_opts() -> Result<Opts, anyhow::Error> {
  opts_from_matches(&build_command().get_matches())
}

pub fn build_settings(config: &ConfigToml) -> std::result::Result<SmokeConfig, anyhow::Error> {
  config.try_into()
}

#[cfg(test)]
mod tests {
  use super::*;

  fn parse(args: &[&str]) -> Result<Opts, anyhow::Error> {
    let matches = build_command().try_get_matches_from(args)?;
    opts_from_matches(&matches)
  }

  #[test]
  fn subcommands() {
    let opts = parse(&["grpc-creds", "check"]).unwrap();
    assert_eq!(opts.mode, Mode::Check);
    assert!(opts.config_file_path.is_none());

    let opts = parse(&["grpc-creds", "-c", "./config.toml", "serve"]).unwrap();
    assert_eq!(opts.mode, Mode::Serve);
    assert_eq!(opts.config_file_path.as_deref(), Some("./config.toml"));

    let opts = parse(&["grpc-creds", "dial"]).unwrap();
    assert_eq!(
      opts.mode,
      Mode::Dial {
        message: DEFAULT_DIAL_MESSAGE.to_string()
      }
    );

    let opts = parse(&["grpc-creds", "--config", "c.toml", "dial", "--message", "hello"]).unwrap();
    assert_eq!(
      opts.mode,
      Mode::Dial {
        message: "hello".to_string()
      }
    );
    assert_eq!(opts.config_file_path.as_deref(), Some("c.toml"));
  }

  #[test]
  fn subcommand_is_required() {
    assert!(parse(&["grpc-creds"]).is_err());
    assert!(parse(&["grpc-creds", "reload"]).is_err());
  }
}
