use crate::{
  constants::{ACCEPT_ERROR_BACKOFF_MSEC, MAX_LINE_LEN},
  error::{anyhow, ensure, Context},
  log::*,
};
use grpc_creds_certs::{reexports::TlsAcceptor, ClientCredentials, IdentitySummary, ServerCredentials};
use std::{future::Future, net::SocketAddr};
use tokio::{
  io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWriteExt, BufReader},
  net::{TcpListener, TcpStream},
  time::{timeout, Duration},
};

/// Listener and dialer settings of the smoke tool
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmokeConfig {
  pub listen_address: SocketAddr,
  pub connect_address: SocketAddr,
  pub handshake_timeout: Duration,
}

/* ------------------------------------------------ */
/// Bind the configured address and echo one line per TLS connection until the listener fails
pub async fn serve(config: &SmokeConfig, credentials: &ServerCredentials) -> Result<(), anyhow::Error> {
  let listener = TcpListener::bind(config.listen_address)
    .await
    .with_context(|| format!("Failed to bind {}", config.listen_address))?;
  serve_on(listener, config.handshake_timeout, credentials).await
}

pub(crate) async fn serve_on(
  listener: TcpListener,
  handshake_timeout: Duration,
  credentials: &ServerCredentials,
) -> Result<(), anyhow::Error> {
  info!(
    "Start TLS listener on {} presenting {}",
    listener.local_addr()?,
    credentials.identity().subject
  );
  let acceptor = credentials.acceptor();
  let backoff = Duration::from_millis(ACCEPT_ERROR_BACKOFF_MSEC);

  loop {
    let (raw_stream, client_addr) = accept_with_backoff(|| listener.accept(), backoff).await;
    let acceptor = acceptor.clone();

    // spawns async handshake to avoid blocking thread by sequential handshake.
    tokio::spawn(async move {
      if let Err(e) = echo_once(acceptor, raw_stream, client_addr, handshake_timeout).await {
        error!("{client_addr}: {e}");
      }
    });
  }
}

/// Retry `accept` until it yields a connection, pausing `backoff` after every failure
async fn accept_with_backoff<T, F, Fut>(mut accept: F, backoff: Duration) -> T
where
  F: FnMut() -> Fut,
  Fut: Future<Output = std::io::Result<T>>,
{
  loop {
    match accept().await {
      Ok(v) => return v,
      Err(e) => {
        // errors like EMFILE persist until some connection closes
        warn!("Failed to accept TCP connection: {e}");
        tokio::time::sleep(backoff).await;
      }
    }
  }
}

/// Read one newline-terminated line of at most `limit` bytes
async fn read_line_bounded<R>(stream: &mut R, limit: usize) -> Result<String, anyhow::Error>
where
  R: AsyncRead + Unpin,
{
  let mut reader = BufReader::new(stream.take(limit as u64));
  let mut line = String::new();
  reader.read_line(&mut line).await?;
  ensure!(
    line.ends_with('\n') || line.len() < limit,
    "Line exceeds {limit} bytes"
  );
  Ok(line)
}

async fn echo_once(
  acceptor: TlsAcceptor,
  raw_stream: TcpStream,
  client_addr: SocketAddr,
  handshake_timeout: Duration,
) -> Result<(), anyhow::Error> {
  // timeout is introduced to avoid get stuck here.
  let mut stream = timeout(handshake_timeout, acceptor.accept(raw_stream))
    .await
    .map_err(|_| anyhow!("Timeout to handshake TLS"))?
    .context("Failed to handshake TLS")?;

  {
    let (_, conn) = stream.get_ref();
    debug!(
      "{client_addr}: SNI {:?}, ALPN {:?}",
      conn.server_name(),
      conn.alpn_protocol().map(String::from_utf8_lossy)
    );
  }

  let line = read_line_bounded(&mut stream, MAX_LINE_LEN).await?;
  stream.write_all(line.as_bytes()).await?;
  stream.shutdown().await?;
  info!("{client_addr}: echoed {} bytes", line.len());
  Ok(())
}

/* ------------------------------------------------ */
/// Connect with the client credentials, send `message` and return the echoed line
pub async fn dial(config: &SmokeConfig, credentials: &ClientCredentials, message: &str) -> Result<String, anyhow::Error> {
  dial_to(config.connect_address, config.handshake_timeout, credentials, message).await
}

pub(crate) async fn dial_to(
  addr: SocketAddr,
  handshake_timeout: Duration,
  credentials: &ClientCredentials,
  message: &str,
) -> Result<String, anyhow::Error> {
  let raw_stream = TcpStream::connect(addr)
    .await
    .with_context(|| format!("Failed to connect {addr}"))?;
  let mut stream = timeout(handshake_timeout, credentials.connect(raw_stream))
    .await
    .map_err(|_| anyhow!("Timeout to handshake TLS"))?
    .context("Failed to handshake TLS")?;

  {
    let (_, conn) = stream.get_ref();
    let peer = conn
      .peer_certificates()
      .and_then(|certs| certs.first())
      .ok_or_else(|| anyhow!("No peer certificate"))?;
    let identity = IdentitySummary::from_cert_der(peer)?;
    info!(
      "Connected to {addr} as {:?}, peer certificate {}",
      credentials.server_name(),
      identity.subject
    );
  }

  stream.write_all(message.as_bytes()).await?;
  stream.write_all(b"\n").await?;
  stream.flush().await?;

  let reply = read_line_bounded(&mut stream, MAX_LINE_LEN).await?;
  Ok(reply.trim_end().to_string())
}

/* ------------------------------------------------ */
