//! Redirect dispatcher.
//!
//! Turns one redirect request into exactly one [`RedirectResult`] by running a
//! single exchange with the launcher host:
//!
//! 1. Open a fresh session through the [`Connector`]. If that fails, resolve
//!    with a connection failure.
//! 2. Arm the timeout and send the [`LaunchRequest`].
//! 3. Resolve on the first of: a reply, a disconnect, the timeout.
//!
//! The race is arbitrated by [`Exchange`], whose guarded transitions make the
//! first event win. The driver only performs the side effects a
//! [`Resolution`] asks for, so the session is closed at most once and the
//! timer never fires after a reply.

use std::sync::Arc;
use std::time::Duration;

use e2c_protocol::{Exchange, FailureReason, LaunchRequest, RedirectResult, Resolution, SOURCE_TAG};
use e2c_runtime::{Connector, Session, SessionEvent};
use tokio::time::{Instant, sleep_until};
use tracing::{debug, info, warn};

/// Time the host has to reply before the request fails with a timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(3000);

/// Dispatcher configuration.
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
	pub timeout: Duration,
	/// Tag sent as the request's `source` field.
	pub source: String,
}

impl Default for DispatcherConfig {
	fn default() -> Self {
		Self {
			timeout: DEFAULT_TIMEOUT,
			source: SOURCE_TAG.to_string(),
		}
	}
}

/// Mediates redirect requests to the launcher host.
///
/// Cheap to clone; every [`redirect`](Self::redirect) call owns its session,
/// timer and resolution state, so concurrent calls never interact.
#[derive(Clone)]
pub struct Dispatcher {
	connector: Arc<dyn Connector>,
	config: DispatcherConfig,
}

impl Dispatcher {
	pub fn new(connector: Arc<dyn Connector>) -> Self {
		Self::with_config(connector, DispatcherConfig::default())
	}

	pub fn with_config(connector: Arc<dyn Connector>, config: DispatcherConfig) -> Self {
		Self { connector, config }
	}

	pub fn config(&self) -> &DispatcherConfig {
		&self.config
	}

	/// Redirects `url` to the external browser.
	pub async fn redirect(&self, url: &str, launch_args: &str) -> RedirectResult {
		let request = LaunchRequest::new(url, launch_args).with_source(self.config.source.clone());
		self.dispatch(request).await
	}

	/// Runs the exchange for a prepared request.
	pub async fn dispatch(&self, request: LaunchRequest) -> RedirectResult {
		let mut exchange = Exchange::new();
		exchange.begin();

		let mut session = match self.connector.connect().await {
			Ok(session) => session,
			Err(err) => {
				warn!(target = "e2c", url = %request.url, error = %err, "failed to open native host session");
				let cause = err.to_string();
				return match exchange.connect_failed(cause.clone()) {
					Some(resolution) => resolution.result,
					None => RedirectResult::Failure(FailureReason::ConnectionException(cause)),
				};
			}
		};

		exchange.connected();
		let deadline = Instant::now() + self.config.timeout;
		debug!(target = "e2c", url = %request.url, timeout_ms = self.config.timeout.as_millis() as u64, "sending launch request");

		let payload = serde_json::to_value(&request).unwrap_or_default();
		if let Err(err) = session.send(&payload).await {
			// A write failure means the pipe is gone; it counts as the disconnect.
			if let Some(resolution) = exchange.on_disconnect(Some(err.to_string())) {
				return finish(resolution, session.as_mut(), &request).await;
			}
		}

		let timer = sleep_until(deadline);
		tokio::pin!(timer);

		loop {
			let resolution = tokio::select! {
				event = session.next_event() => match event {
					SessionEvent::Message(reply) => exchange.on_response(reply),
					SessionEvent::Disconnected(error) => exchange.on_disconnect(error),
				},
				_ = &mut timer => exchange.on_timeout(),
			};
			if let Some(resolution) = resolution {
				return finish(resolution, session.as_mut(), &request).await;
			}
		}
	}
}

/// Applies the resolution's side effects. Dropping the pinned timer on return
/// is what cancels it.
async fn finish(resolution: Resolution, session: &mut dyn Session, request: &LaunchRequest) -> RedirectResult {
	if resolution.close_session {
		session.close().await;
	}
	match &resolution.result {
		RedirectResult::Success(_) => info!(target = "e2c", url = %request.url, "redirect acknowledged"),
		RedirectResult::Failure(reason) => warn!(target = "e2c", url = %request.url, reason = %reason, "redirect failed"),
	}
	resolution.result
}
