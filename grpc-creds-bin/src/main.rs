#[global_allocator]
static ALLOC: mimalloc::MiMalloc = mimalloc::MiMalloc;

mod config;
mod constants;
mod error;
mod log;
mod smoke;

use crate::{
  config::{build_settings, parse_opts, ConfigToml, Mode},
  log::*,
};
use grpc_creds_certs::{client_credentials, server_credentials};

fn main() {
  init_logger();

  // Initially load options
  let parsed_opts = match parse_opts() {
    Ok(v) => v,
    Err(e) => {
      error!("Invalid options: {e}");
      std::process::exit(1);
    }
  };
  let config_toml = match parsed_opts.config_file_path.as_deref() {
    Some(path) => match ConfigToml::new(path) {
      Ok(v) => v,
      Err(e) => {
        error!("Invalid toml file: {e}");
        std::process::exit(1);
      }
    },
    None => ConfigToml::default(),
  };
  let smoke_config = match build_settings(&config_toml) {
    Ok(v) => v,
    Err(e) => {
      error!("Invalid configuration: {e}");
      std::process::exit(1);
    }
  };

  // Broken embedded credentials are a build defect: never serve or dial with them
  let server_credentials = match server_credentials() {
    Ok(v) => v,
    Err(e) => {
      error!("Server credentials unavailable: {e}");
      std::process::exit(1);
    }
  };
  let client_credentials = match client_credentials() {
    Ok(v) => v,
    Err(e) => {
      error!("Client credentials unavailable: {e}");
      std::process::exit(1);
    }
  };

  let mut runtime_builder = tokio::runtime::Builder::new_multi_thread();
  runtime_builder.enable_all();
  runtime_builder.thread_name("grpc-creds");
  let runtime = match runtime_builder.build() {
    Ok(v) => v,
    Err(e) => {
      error!("Failed to build tokio runtime: {e}");
      std::process::exit(1);
    }
  };

  runtime.block_on(async {
    match &parsed_opts.mode {
      Mode::Check => {
        let identity = server_credentials.identity();
        info!(
          "Server identity {} (DNS names: {})",
          identity.subject,
          identity.dns_names.join(", ")
        );
        info!(
          "Client pinned to {:?} with {} trust anchor(s)",
          client_credentials.server_name(),
          client_credentials.trust_pool_len()
        );
      }
      Mode::Serve => {
        if let Err(e) = smoke::serve(&smoke_config, &server_credentials).await {
          error!("TLS listener exited: {e:#}");
          std::process::exit(1);
        }
      }
      Mode::Dial { message } => match smoke::dial(&smoke_config, &client_credentials, message).await {
        Ok(reply) => println!("{reply}"),
        Err(e) => {
          error!("Dial failed: {e:#}");
          std::process::exit(1);
        }
      },
    }
  });
}
