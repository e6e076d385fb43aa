//! Single-message framing used between client, proxy and origin.
//!
//! There is no length prefix: each side writes one UTF-8 message of at most
//! [`MAX_MESSAGE_SIZE`] bytes and the receiver consumes it with a single read.
//!
//! - Requests longer than the bound are truncated by the receiver; the
//!   remaining bytes are never read.
//! - Responses longer than the bound are truncated by the sender at the last
//!   character boundary that fits.
//! - Invalid UTF-8 is decoded lossily.

use std::future::Future;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::WireError;

pub const MAX_MESSAGE_SIZE: usize = 1024;

/// Read one bounded message
pub async fn read_message<R>(reader: &mut R) -> Result<String, WireError>
where
  R: AsyncRead + Unpin,
{
  let mut buf = [0u8; MAX_MESSAGE_SIZE];
  let n = reader.read(&mut buf).await?;
  if n == 0 {
    return Err(WireError::Closed);
  }
  Ok(String::from_utf8_lossy(&buf[..n]).into_owned())
}

/// Write one bounded message and flush it
pub async fn write_message<W>(writer: &mut W, message: &str) -> Result<(), WireError>
where
  W: AsyncWrite + Unpin,
{
  let bounded = truncate_to_bound(message);
  if bounded.len() < message.len() {
    tracing::warn!(
      "Truncating {}-byte message to {} bytes",
      message.len(),
      bounded.len()
    );
  }
  writer.write_all(bounded.as_bytes()).await?;
  writer.flush().await?;
  Ok(())
}

/// Send a request and wait for the single response
pub async fn exchange<S>(stream: &mut S, request: &str) -> Result<String, WireError>
where
  S: AsyncRead + AsyncWrite + Unpin,
{
  write_message(stream, request).await?;
  read_message(stream).await
}

/// Run a wire operation under a deadline
pub async fn with_timeout<T, F>(limit: Duration, fut: F) -> Result<T, WireError>
where
  F: Future<Output = Result<T, WireError>>,
{
  tokio::time::timeout(limit, fut)
    .await
    .map_err(|_| WireError::Timeout)?
}

/// Longest prefix of `message` that fits the bound without splitting a character
pub fn truncate_to_bound(message: &str) -> &str {
  if message.len() <= MAX_MESSAGE_SIZE {
    return message;
  }
  let mut end = MAX_MESSAGE_SIZE;
  while !message.is_char_boundary(end) {
    end -= 1;
  }
  &message[..end]
}
