pub const DEFAULT_LISTEN_ADDRESS: &str = "127.0.0.1:50051";
pub const DEFAULT_CONNECT_ADDRESS: &str = "127.0.0.1:50051";
pub const DEFAULT_HANDSHAKE_TIMEOUT_SEC: u64 = 5;
/// Line sent by `dial` when none is given
pub const DEFAULT_DIAL_MESSAGE: &str = "ping";
/// Upper bound of a line read by the echo listener and the dialer
pub const MAX_LINE_LEN: usize = 8 * 1024;
/// Pause after a failed accept on the listening socket
pub const ACCEPT_ERROR_BACKOFF_MSEC: u64 = 100;
