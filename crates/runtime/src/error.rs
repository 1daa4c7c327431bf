//! Error types for the native-messaging runtime.

use thiserror::Error;

/// Result type alias for runtime operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the native-messaging runtime.
#[derive(Debug, Error)]
pub enum Error {
	/// No browser executable was found in any of the search locations.
	#[error("Browser executable not found. Install Chrome or set E2C_BROWSER.")]
	BrowserNotFound,

	/// The browser executable was found but could not be started.
	#[error("Failed to launch browser: {0}")]
	LaunchFailed(String),

	/// The launcher host process could not be started.
	#[error("Failed to start native host: {0}")]
	ConnectionFailed(String),

	/// Transport-level error (stdio framing).
	#[error("Transport error: {0}")]
	TransportError(String),

	/// The peer closed the stream at a frame boundary.
	#[error("Transport closed")]
	TransportClosed,

	/// A frame exceeded the native-messaging size limit.
	#[error("Message of {len} bytes exceeds the {max} byte limit")]
	MessageTooLarge { len: usize, max: usize },

	/// Frame payload was not a valid message.
	#[error("Protocol error: {0}")]
	ProtocolError(String),

	/// I/O error.
	#[error("I/O error: {0}")]
	Io(#[from] std::io::Error),

	/// JSON serialization/deserialization error.
	#[error("JSON error: {0}")]
	Json(#[from] serde_json::Error),
}

impl Error {
	/// Returns true if the peer simply went away between messages.
	pub fn is_closed(&self) -> bool {
		matches!(self, Error::TransportClosed)
	}
}
