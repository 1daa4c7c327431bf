use std::time::Duration;

use tokio::time::Instant;

/// Quiet period after the last mutation before a pass runs.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(200);

/// A single pending deadline, pushed back by every new event.
///
/// Only the latest page snapshot matters, so nothing is queued: a burst of
/// events inside the window collapses into one firing.
#[derive(Debug, Clone)]
pub struct Debouncer {
	window: Duration,
	deadline: Option<Instant>,
}

impl Debouncer {
	pub fn new(window: Duration) -> Self {
		Self { window, deadline: None }
	}

	pub fn window(&self) -> Duration {
		self.window
	}

	/// Records an event at `now`, replacing any pending deadline.
	pub fn schedule(&mut self, now: Instant) {
		self.deadline = Some(now + self.window);
	}

	pub fn deadline(&self) -> Option<Instant> {
		self.deadline
	}

	pub fn is_pending(&self) -> bool {
		self.deadline.is_some()
	}

	/// Consumes the deadline if it has passed.
	pub fn fire(&mut self, now: Instant) -> bool {
		match self.deadline {
			Some(deadline) if deadline <= now => {
				self.deadline = None;
				true
			}
			_ => false,
		}
	}

	pub fn cancel(&mut self) {
		self.deadline = None;
	}
}

impl Default for Debouncer {
	fn default() -> Self {
		Self::new(DEFAULT_DEBOUNCE)
	}
}
