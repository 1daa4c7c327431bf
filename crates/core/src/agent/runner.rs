use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use e2c_protocol::{RedirectResult, Settings};
use futures_util::StreamExt;
use futures_util::stream::FuturesUnordered;
use tokio::sync::{mpsc, watch};
use tokio::time::{Instant, sleep_until};
use tracing::debug;

use super::{Debouncer, LinkId, Page, PageAgent};
use crate::dispatcher::Dispatcher;
use crate::settings::SettingsStore;

/// How long a notice stays visible.
pub const DEFAULT_NOTICE_TTL: Duration = Duration::from_millis(3000);

/// Input from the page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentEvent {
	/// A structural mutation. Only mutations that add elements schedule a pass.
	Mutation { added_elements: usize },
	/// The marker on a link was activated.
	Activated(LinkId),
}

type PendingRedirect = Pin<Box<dyn Future<Output = (String, RedirectResult)> + Send>>;

/// Event loop around a [`PageAgent`].
///
/// Evaluates once on start, then reacts to page events, settings changes,
/// debounce expiry, resolved redirects, and notice expiry. Redirects run
/// concurrently; each owns its own dispatcher exchange.
pub struct AgentRunner<P> {
	agent: PageAgent,
	page: P,
	dispatcher: Dispatcher,
	settings: watch::Receiver<Settings>,
	debounce: Debouncer,
	notice_ttl: Duration,
}

impl<P: Page> AgentRunner<P> {
	pub fn new(page: P, store: &dyn SettingsStore, dispatcher: Dispatcher) -> Self {
		let mut settings = store.subscribe();
		let agent = PageAgent::new(settings.borrow_and_update().clone());
		Self {
			agent,
			page,
			dispatcher,
			settings,
			debounce: Debouncer::default(),
			notice_ttl: DEFAULT_NOTICE_TTL,
		}
	}

	pub fn with_debounce(mut self, window: Duration) -> Self {
		self.debounce = Debouncer::new(window);
		self
	}

	pub fn with_notice_ttl(mut self, ttl: Duration) -> Self {
		self.notice_ttl = ttl;
		self
	}

	pub fn agent(&self) -> &PageAgent {
		&self.agent
	}

	/// Runs until `events` closes and every in-flight redirect has resolved.
	/// Returns the page.
	pub async fn run(mut self, mut events: mpsc::UnboundedReceiver<AgentEvent>) -> P {
		self.agent.evaluate(&mut self.page);

		let mut redirects: FuturesUnordered<PendingRedirect> = FuturesUnordered::new();
		let mut notice: Option<(u64, Instant)> = None;
		let mut events_open = true;
		let mut settings_open = true;

		while events_open || !redirects.is_empty() {
			let debounce_at = self.debounce.deadline().unwrap_or_else(Instant::now);
			let notice_at = notice.map_or_else(Instant::now, |(_, at)| at);

			tokio::select! {
				event = events.recv(), if events_open => match event {
					Some(AgentEvent::Mutation { added_elements }) if added_elements > 0 => {
						self.debounce.schedule(Instant::now());
					}
					Some(AgentEvent::Mutation { .. }) => {}
					Some(AgentEvent::Activated(link)) => {
						if let Some(request) = self.agent.activate(link) {
							let dispatcher = self.dispatcher.clone();
							redirects.push(Box::pin(async move {
								let url = request.url.clone();
								(url, dispatcher.dispatch(request).await)
							}));
						}
					}
					None => events_open = false,
				},
				changed = self.settings.changed(), if settings_open => match changed {
					Ok(()) => {
						let settings = self.settings.borrow_and_update().clone();
						self.agent.apply_settings(settings);
						self.agent.evaluate(&mut self.page);
					}
					Err(_) => {
						debug!(target = "e2c", "settings store dropped; keeping last settings");
						settings_open = false;
					}
				},
				_ = sleep_until(debounce_at), if self.debounce.is_pending() => {
					if self.debounce.fire(Instant::now()) {
						self.agent.evaluate(&mut self.page);
					}
				}
				Some((url, result)) = redirects.next(), if !redirects.is_empty() => {
					if let Some(shown) = self.agent.handle_result(&url, &result, &mut self.page) {
						notice = Some((shown.id, Instant::now() + self.notice_ttl));
					}
				}
				_ = sleep_until(notice_at), if notice.is_some() => {
					if let Some((id, _)) = notice.take() {
						self.agent.expire_notice(id, &mut self.page);
					}
				}
			}
		}

		self.page
	}
}
