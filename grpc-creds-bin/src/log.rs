pub use tracing::{debug, error, info, warn};

pub fn init_logger() {
  use tracing_subscriber::{fmt, prelude::*, EnvFilter};

  let format_layer = fmt::layer()
    .with_line_number(false)
    .with_thread_ids(false)
    .with_thread_names(true)
    .with_target(true)
    .with_level(true)
    .compact();

  // This limits the logger to emit only this binary and the credentials library
  let level_string = std::env::var(EnvFilter::DEFAULT_ENV).unwrap_or_else(|_| "info".to_string());
  let filter_layer = EnvFilter::new(format!(
    "{}={level_string},grpc_creds_certs={level_string}",
    env!("CARGO_CRATE_NAME")
  ));

  tracing_subscriber::registry()
    .with(format_layer)
    .with(filter_layer)
    .init();
}
