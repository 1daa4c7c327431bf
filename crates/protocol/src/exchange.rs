//! Resolve-once state machine for a single native-messaging exchange.
//!
//! One [`Exchange`] exists per redirect request. Three independent sources race
//! to finish it: the host's reply, the port disconnecting, and the timeout timer.
//! Every source reports through a guarded transition method; the first one to
//! arrive returns a [`Resolution`] and every later call returns [`None`].
//!
//! ```text
//! Idle ──begin──▶ Connecting ──connected──▶ AwaitingResponse
//!   │                 │                          │
//!   │          connect_failed          response | disconnect | timeout
//!   │                 ▼                          ▼
//!   └───────────────────────────────────────▶ Resolved
//! ```
//!
//! The machine performs no I/O. A [`Resolution`] names the side effects the
//! driver owes (cancel the timer, close the session) so the tokio driver and
//! the wasm background worker apply the same rules.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Lifecycle state of an [`Exchange`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeState {
	Idle,
	Connecting,
	AwaitingResponse,
	Resolved(Outcome),
}

/// Which event resolved an exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
	ConnectFailed,
	Response,
	Disconnect,
	Timeout,
}

/// Why a redirect failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
	/// Opening the session raised synchronously.
	ConnectionException(String),
	/// The remote side closed the session before replying.
	Disconnected(Option<String>),
	/// Neither a reply nor a disconnect arrived in time.
	Timeout,
}

impl fmt::Display for FailureReason {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			FailureReason::ConnectionException(cause) => write!(f, "connection exception: {cause}"),
			FailureReason::Disconnected(Some(error)) => write!(f, "native host disconnected: {error}"),
			FailureReason::Disconnected(None) => f.write_str("native host disconnected"),
			FailureReason::Timeout => f.write_str("timeout"),
		}
	}
}

/// Final value of a redirect request. Produced exactly once per request.
#[derive(Debug, Clone, PartialEq)]
pub enum RedirectResult {
	/// The host replied; the payload is forwarded uninterpreted.
	Success(Value),
	Failure(FailureReason),
}

impl RedirectResult {
	pub fn is_success(&self) -> bool {
		matches!(self, RedirectResult::Success(_))
	}

	/// Returns the failure reason, if any.
	pub fn failure(&self) -> Option<&FailureReason> {
		match self {
			RedirectResult::Failure(reason) => Some(reason),
			RedirectResult::Success(_) => None,
		}
	}
}

/// JSON shape of a [`RedirectResult`] returned to the page context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RedirectEnvelope {
	pub success: bool,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub response: Option<Value>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub error: Option<String>,
}

impl From<&RedirectResult> for RedirectEnvelope {
	fn from(result: &RedirectResult) -> Self {
		match result {
			RedirectResult::Success(payload) => Self {
				success: true,
				response: Some(payload.clone()),
				error: None,
			},
			RedirectResult::Failure(reason) => Self {
				success: false,
				response: None,
				error: Some(reason.to_string()),
			},
		}
	}
}

/// Side effects owed by the driver after a resolving transition.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
	pub result: RedirectResult,
	/// The timeout timer is still armed and must be cleared.
	pub cancel_timer: bool,
	/// The session is still open and must be closed.
	pub close_session: bool,
}

/// Guarded state machine for one request/response exchange.
#[derive(Debug)]
pub struct Exchange {
	state: ExchangeState,
}

impl Default for Exchange {
	fn default() -> Self {
		Self::new()
	}
}

impl Exchange {
	pub fn new() -> Self {
		Self {
			state: ExchangeState::Idle,
		}
	}

	pub fn state(&self) -> ExchangeState {
		self.state
	}

	pub fn is_resolved(&self) -> bool {
		matches!(self.state, ExchangeState::Resolved(_))
	}

	/// `Idle → Connecting`. Returns `false` if the exchange already started.
	pub fn begin(&mut self) -> bool {
		if self.state != ExchangeState::Idle {
			return false;
		}
		self.state = ExchangeState::Connecting;
		true
	}

	/// `Connecting → AwaitingResponse`. The caller arms the timer and sends the
	/// request only when this returns `true`.
	pub fn connected(&mut self) -> bool {
		if self.state != ExchangeState::Connecting {
			return false;
		}
		self.state = ExchangeState::AwaitingResponse;
		true
	}

	/// Opening the session failed before any timer was armed.
	pub fn connect_failed(&mut self, cause: impl Into<String>) -> Option<Resolution> {
		if self.state != ExchangeState::Connecting {
			return None;
		}
		self.state = ExchangeState::Resolved(Outcome::ConnectFailed);
		Some(Resolution {
			result: RedirectResult::Failure(FailureReason::ConnectionException(cause.into())),
			cancel_timer: false,
			close_session: false,
		})
	}

	/// A reply arrived from the host.
	pub fn on_response(&mut self, payload: Value) -> Option<Resolution> {
		let timer_armed = self.settle(Outcome::Response)?;
		Some(Resolution {
			result: RedirectResult::Success(payload),
			cancel_timer: timer_armed,
			close_session: true,
		})
	}

	/// The session was closed by the remote side or dropped.
	pub fn on_disconnect(&mut self, error: Option<String>) -> Option<Resolution> {
		let timer_armed = self.settle(Outcome::Disconnect)?;
		let error = error.filter(|e| !e.trim().is_empty());
		Some(Resolution {
			result: RedirectResult::Failure(FailureReason::Disconnected(error)),
			cancel_timer: timer_armed,
			close_session: false,
		})
	}

	/// The timeout timer fired.
	pub fn on_timeout(&mut self) -> Option<Resolution> {
		if self.state != ExchangeState::AwaitingResponse {
			return None;
		}
		self.state = ExchangeState::Resolved(Outcome::Timeout);
		Some(Resolution {
			result: RedirectResult::Failure(FailureReason::Timeout),
			cancel_timer: false,
			close_session: true,
		})
	}

	/// Moves an in-flight exchange to `Resolved`, returning whether the timer
	/// was armed. `None` means the exchange is not in flight.
	fn settle(&mut self, outcome: Outcome) -> Option<bool> {
		let timer_armed = match self.state {
			ExchangeState::Connecting => false,
			ExchangeState::AwaitingResponse => true,
			ExchangeState::Idle | ExchangeState::Resolved(_) => return None,
		};
		self.state = ExchangeState::Resolved(outcome);
		Some(timer_armed)
	}
}
