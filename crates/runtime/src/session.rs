//! Launcher sessions.
//!
//! A session owns one request/response exchange with the launcher host. The
//! [`Connector`] opens a fresh session per request; sessions are never reused.
//!
//! [`ProcessConnector`] does what the browser does for a native-messaging
//! extension: spawn the host executable with the caller's origin as its first
//! argument and speak framed JSON over the child's stdin/stdout.

use std::ffi::OsString;
use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use serde_json::Value;
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::transport::{PipeTransport, TransportSender};

/// Something that happened on an open session.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
	/// The host sent a message.
	Message(Value),
	/// The session ended, with the platform's error text if there was one.
	Disconnected(Option<String>),
}

/// One open exchange with the launcher host.
#[async_trait]
pub trait Session: Send {
	/// Transmits a message to the host.
	async fn send(&mut self, message: &Value) -> Result<()>;

	/// Waits for the next event. Must be cancel-safe.
	///
	/// After a [`SessionEvent::Disconnected`] every further call returns
	/// another `Disconnected`.
	async fn next_event(&mut self) -> SessionEvent;

	/// Closes the session. Calling it twice is harmless.
	async fn close(&mut self);
}

/// Opens sessions to the launcher host.
#[async_trait]
pub trait Connector: Send + Sync {
	async fn connect(&self) -> Result<Box<dyn Session>>;
}

/// Spawns the launcher host as a child process for every session.
#[derive(Debug, Clone)]
pub struct ProcessConnector {
	program: PathBuf,
	args: Vec<OsString>,
}

impl ProcessConnector {
	pub fn new(program: impl Into<PathBuf>) -> Self {
		Self {
			program: program.into(),
			args: Vec::new(),
		}
	}

	/// Passes `origin` as the first argument, like the browser does.
	pub fn with_origin(mut self, origin: impl Into<OsString>) -> Self {
		self.args.insert(0, origin.into());
		self
	}
}

#[async_trait]
impl Connector for ProcessConnector {
	async fn connect(&self) -> Result<Box<dyn Session>> {
		let mut child = Command::new(&self.program)
			.args(&self.args)
			.stdin(Stdio::piped())
			.stdout(Stdio::piped())
			.stderr(Stdio::inherit())
			.kill_on_drop(true)
			.spawn()
			.map_err(|e| Error::ConnectionFailed(format!("{}: {e}", self.program.display())))?;

		let stdin = child
			.stdin
			.take()
			.ok_or_else(|| Error::ConnectionFailed("host stdin unavailable".to_string()))?;
		let stdout = child
			.stdout
			.take()
			.ok_or_else(|| Error::ConnectionFailed("host stdout unavailable".to_string()))?;

		debug!(target = "e2c", program = %self.program.display(), pid = child.id(), "native host started");
		Ok(Box::new(ProcessSession::start(child, stdin, stdout)))
	}
}

/// Session backed by a spawned host process.
pub struct ProcessSession {
	child: Child,
	sender: Option<TransportSender<ChildStdin>>,
	rx: mpsc::UnboundedReceiver<Value>,
	reader: Option<JoinHandle<Result<()>>>,
	ended: Option<Option<String>>,
	closed: bool,
}

impl ProcessSession {
	fn start(child: Child, stdin: ChildStdin, stdout: ChildStdout) -> Self {
		let (transport, rx) = PipeTransport::new(stdin, stdout);
		let (sender, mut receiver) = transport.into_parts();
		let reader = tokio::spawn(async move { receiver.run().await });
		Self {
			child,
			sender: Some(sender),
			rx,
			reader: Some(reader),
			ended: None,
			closed: false,
		}
	}

	/// Works out why the host went away once the reader has stopped.
	async fn disconnect_reason(&mut self) -> Option<String> {
		let read_error = match self.reader.take() {
			Some(handle) => match handle.await {
				Ok(Err(err)) if !err.is_closed() => Some(err.to_string()),
				Ok(_) => None,
				Err(join) => Some(format!("reader task failed: {join}")),
			},
			None => None,
		};
		if read_error.is_some() {
			return read_error;
		}

		match self.child.wait().await {
			Ok(status) if status.success() => None,
			Ok(status) => Some(format!("Native host has exited ({status})")),
			Err(err) => Some(format!("Native host status unavailable: {err}")),
		}
	}
}

#[async_trait]
impl Session for ProcessSession {
	async fn send(&mut self, message: &Value) -> Result<()> {
		let sender = self.sender.as_mut().ok_or(Error::TransportClosed)?;
		sender.send_json(message).await
	}

	async fn next_event(&mut self) -> SessionEvent {
		if let Some(reason) = &self.ended {
			return SessionEvent::Disconnected(reason.clone());
		}
		match self.rx.recv().await {
			Some(message) => SessionEvent::Message(message),
			None => {
				let reason = self.disconnect_reason().await;
				self.ended = Some(reason.clone());
				SessionEvent::Disconnected(reason)
			}
		}
	}

	async fn close(&mut self) {
		if self.closed {
			return;
		}
		self.closed = true;
		self.sender = None;
		if let Some(reader) = self.reader.take() {
			reader.abort();
		}
		self.rx.close();
		match self.child.try_wait() {
			Ok(Some(_)) => {}
			_ => {
				if let Err(err) = self.child.start_kill() {
					warn!(target = "e2c", error = %err, "failed to stop native host");
				}
			}
		}
	}
}
