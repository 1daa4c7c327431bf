//! Native-messaging stdio framing.
//!
//! Every message is a 4-byte little-endian length prefix followed by that many
//! bytes of UTF-8 JSON. The browser refuses host replies above 1 MiB, and the
//! host applies the same limit to what it reads.
//!
//! [`PipeTransport`] pairs a writer and a reader. Use [`PipeTransport::into_parts`]
//! to move the reading half into its own task; it forwards decoded messages on
//! an unbounded channel until the stream ends or the channel is dropped.


use serde::Serialize;
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tracing::trace;

use crate::error::{Error, Result};

/// Largest frame accepted in either direction.
pub const MAX_MESSAGE_LEN: usize = 1024 * 1024;

/// Reads one frame's payload.
///
/// Returns [`Error::TransportClosed`] when the stream ends before the first
/// byte of a length prefix, and a transport error when it ends mid-frame.
pub async fn read_frame<R>(reader: &mut R, max_len: usize) -> Result<Vec<u8>>
where
	R: AsyncRead + Unpin,
{
	let mut len_buf = [0u8; 4];
	let mut filled = 0;
	while filled < len_buf.len() {
		let n = reader
			.read(&mut len_buf[filled..])
			.await
			.map_err(|e| Error::TransportError(format!("Failed to read length prefix: {e}")))?;
		if n == 0 {
			if filled == 0 {
				return Err(Error::TransportClosed);
			}
			return Err(Error::TransportError(format!(
				"Failed to read length prefix: stream ended after {filled} of 4 bytes"
			)));
		}
		filled += n;
	}

	let len = u32::from_le_bytes(len_buf) as usize;
	if len == 0 {
		return Err(Error::ProtocolError("empty message".to_string()));
	}
	if len > max_len {
		return Err(Error::MessageTooLarge { len, max: max_len });
	}

	let mut payload = vec![0u8; len];
	reader
		.read_exact(&mut payload)
		.await
		.map_err(|e| Error::TransportError(format!("Failed to read message body ({len} bytes): {e}")))?;
	trace!(target = "e2c", len, "read frame");
	Ok(payload)
}

/// Reads one frame and decodes it as JSON.
pub async fn read_message<R>(reader: &mut R, max_len: usize) -> Result<Value>
where
	R: AsyncRead + Unpin,
{
	let payload = read_frame(reader, max_len).await?;
	let text = std::str::from_utf8(&payload)
		.map_err(|e| Error::ProtocolError(format!("message is not UTF-8: {e}")))?;
	serde_json::from_str(text).map_err(|e| Error::ProtocolError(format!("message is not JSON: {e}")))
}

/// Writes one frame and flushes.
pub async fn write_frame<W>(writer: &mut W, payload: &[u8], max_len: usize) -> Result<()>
where
	W: AsyncWrite + Unpin,
{
	if payload.len() > max_len {
		return Err(Error::MessageTooLarge {
			len: payload.len(),
			max: max_len,
		});
	}
	let len = payload.len() as u32;
	writer.write_all(&len.to_le_bytes()).await?;
	writer.write_all(payload).await?;
	writer.flush().await?;
	trace!(target = "e2c", len, "wrote frame");
	Ok(())
}

/// Framed writer half.
pub struct TransportSender<W> {
	writer: W,
	max_len: usize,
}

impl<W> TransportSender<W>
where
	W: AsyncWrite + Unpin + Send,
{
	pub fn new(writer: W) -> Self {
		Self {
			writer,
			max_len: MAX_MESSAGE_LEN,
		}
	}

	/// Serializes `message` and sends it as one frame.
	pub async fn send_json<T: Serialize + ?Sized>(&mut self, message: &T) -> Result<()> {
		let bytes = serde_json::to_vec(message)?;
		write_frame(&mut self.writer, &bytes, self.max_len).await
	}
}

/// Framed reader half that forwards messages to a channel.
pub struct TransportReceiver<R> {
	reader: R,
	tx: mpsc::UnboundedSender<Value>,
	max_len: usize,
}

impl<R> TransportReceiver<R>
where
	R: AsyncRead + Unpin + Send,
{
	/// Reads frames until the stream fails or the channel is dropped.
	///
	/// Returns `Ok(())` only when the receiving side of the channel is gone.
	pub async fn run(&mut self) -> Result<()> {
		loop {
			let message = read_message(&mut self.reader, self.max_len).await?;
			if self.tx.send(message).is_err() {
				return Ok(());
			}
		}
	}
}

/// Bidirectional framed transport over a writer/reader pair.
pub struct PipeTransport<W, R> {
	sender: TransportSender<W>,
	receiver: TransportReceiver<R>,
}

impl<W, R> PipeTransport<W, R>
where
	W: AsyncWrite + Unpin + Send,
	R: AsyncRead + Unpin + Send,
{
	/// Creates a transport and the channel its reader feeds.
	pub fn new(writer: W, reader: R) -> (Self, mpsc::UnboundedReceiver<Value>) {
		let (tx, rx) = mpsc::unbounded_channel();
		let transport = Self {
			sender: TransportSender::new(writer),
			receiver: TransportReceiver {
				reader,
				tx,
				max_len: MAX_MESSAGE_LEN,
			},
		};
		(transport, rx)
	}

	/// Overrides the frame size limit for both directions.
	pub fn with_max_len(mut self, max_len: usize) -> Self {
		self.sender.max_len = max_len;
		self.receiver.max_len = max_len;
		self
	}

	pub fn into_parts(self) -> (TransportSender<W>, TransportReceiver<R>) {
		(self.sender, self.receiver)
	}
}
