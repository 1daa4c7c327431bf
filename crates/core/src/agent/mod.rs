//! Page agent.
//!
//! Keeps the redirect-eligible links of one page annotated with a marker and
//! turns marker activation into a [`LaunchRequest`]. The page itself is behind
//! the [`Page`] trait, so the same bookkeeping drives a live DOM, a static
//! HTML snapshot, or a test double.
//!
//! [`PageAgent`] is synchronous and owns no timers. [`AgentRunner`] wraps it
//! in an event loop that adds mutation debouncing, settings subscription,
//! redirect dispatch, and notice expiry.

mod debounce;
mod runner;

use std::collections::{HashMap, HashSet};
use std::fmt;

use e2c_protocol::{LAUNCHABLE_SCHEMES, LaunchRequest, RedirectResult, Settings};
use tracing::{debug, info, warn};
use url::Url;

use crate::pattern::RuleSet;

pub use debounce::{DEFAULT_DEBOUNCE, Debouncer};
pub use runner::{AgentEvent, AgentRunner, DEFAULT_NOTICE_TTL};

/// Stable identity of a link element for the lifetime of the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LinkId(pub u64);

impl fmt::Display for LinkId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "#{}", self.0)
	}
}

/// A link as the page currently presents it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
	pub id: LinkId,
	/// Raw `href` attribute, if the element has one.
	pub href: Option<String>,
}

impl Link {
	pub fn new(id: u64, href: impl Into<String>) -> Self {
		Self {
			id: LinkId(id),
			href: Some(href.into()),
		}
	}
}

/// Affordance attached to an eligible link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Marker {
	/// Resolved absolute target.
	pub url: String,
	pub label: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
	Success,
	Error,
}

/// Transient message shown after a redirect resolves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
	pub id: u64,
	pub kind: NoticeKind,
	pub text: String,
}

/// The page surface the agent works against.
pub trait Page {
	/// Document base for resolving relative `href`s.
	fn base_url(&self) -> Option<String>;

	/// Every link element currently in the page.
	fn links(&self) -> Vec<Link>;

	fn attach_marker(&mut self, link: LinkId, marker: &Marker);

	fn detach_marker(&mut self, link: LinkId);

	/// Shows `notice`, replacing any notice still visible.
	fn show_notice(&mut self, notice: &Notice);

	fn clear_notice(&mut self);
}

/// What one evaluation pass changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EvaluationReport {
	pub attached: usize,
	pub removed: usize,
	/// Eligible links after the pass.
	pub eligible: usize,
}

/// Link bookkeeping for one page.
#[derive(Debug)]
pub struct PageAgent {
	settings: Settings,
	rules: RuleSet,
	marked: HashMap<LinkId, Marker>,
	next_notice: u64,
	visible_notice: Option<u64>,
}

impl PageAgent {
	pub fn new(settings: Settings) -> Self {
		Self {
			rules: RuleSet::new(&settings.url_rules),
			settings,
			marked: HashMap::new(),
			next_notice: 0,
			visible_notice: None,
		}
	}

	pub fn settings(&self) -> &Settings {
		&self.settings
	}

	/// Adopts new settings. Markers are reconciled on the next
	/// [`evaluate`](Self::evaluate).
	pub fn apply_settings(&mut self, settings: Settings) {
		if settings.url_rules != self.settings.url_rules {
			self.rules = RuleSet::new(&settings.url_rules);
		}
		self.settings = settings;
		if self.settings.enable_logging {
			info!(target = "e2c", rules = self.rules.len(), "settings reloaded");
		}
	}

	/// Number of links currently carrying a marker.
	pub fn marked_count(&self) -> usize {
		self.marked.len()
	}

	pub fn marker(&self, link: LinkId) -> Option<&Marker> {
		self.marked.get(&link)
	}

	/// Resolves `href` and returns the absolute target if it should be
	/// redirected.
	pub fn eligible_target(&self, href: &str, base: Option<&Url>) -> Option<String> {
		let target = resolve_href(href, base)?;
		self.rules.is_match(target.as_str()).then(|| target.into())
	}

	/// Reconciles markers with the page's current links.
	///
	/// Running it twice on an unchanged page attaches nothing the second time.
	pub fn evaluate(&mut self, page: &mut dyn Page) -> EvaluationReport {
		let base = page.base_url().and_then(|b| Url::parse(&b).ok());
		let links = page.links();
		let mut report = EvaluationReport::default();
		let mut present = HashSet::with_capacity(links.len());

		for link in links {
			present.insert(link.id);
			let target = link.href.as_deref().and_then(|href| self.eligible_target(href, base.as_ref()));

			let current = self.marked.get(&link.id);
			let had_marker = current.is_some();
			let unchanged = matches!(
				(&target, current),
				(Some(url), Some(marker)) if *url == marker.url && marker.label == self.settings.button_text
			);

			match target {
				Some(_) if unchanged => report.eligible += 1,
				Some(url) => {
					if had_marker {
						page.detach_marker(link.id);
						report.removed += 1;
					}
					let marker = Marker {
						url,
						label: self.settings.button_text.clone(),
					};
					page.attach_marker(link.id, &marker);
					self.marked.insert(link.id, marker);
					report.attached += 1;
					report.eligible += 1;
				}
				None if had_marker => {
					page.detach_marker(link.id);
					self.marked.remove(&link.id);
					report.removed += 1;
				}
				None => {}
			}
		}

		// Elements that left the page took their markers with them.
		self.marked.retain(|id, _| present.contains(id));

		if self.settings.enable_logging && (report.attached > 0 || report.removed > 0) {
			info!(
				target = "e2c",
				attached = report.attached,
				removed = report.removed,
				eligible = report.eligible,
				"markers updated"
			);
		}
		report
	}

	/// Turns activation of `link` into a redirect request.
	///
	/// `None` means the link carries no marker and its default navigation
	/// should proceed; `Some` means the caller must suppress it.
	pub fn activate(&self, link: LinkId) -> Option<LaunchRequest> {
		let marker = self.marked.get(&link)?;
		debug!(target = "e2c", %link, url = %marker.url, "marker activated");
		Some(LaunchRequest::new(marker.url.clone(), self.settings.chrome_args.clone()))
	}

	/// Reports a resolved redirect. Returns the notice shown, if any.
	pub fn handle_result(&mut self, url: &str, result: &RedirectResult, page: &mut dyn Page) -> Option<Notice> {
		let (kind, text) = match result {
			RedirectResult::Success(_) => {
				if self.settings.enable_logging {
					info!(target = "e2c", url, "opened in external browser");
				}
				if !self.settings.show_notifications {
					return None;
				}
				(NoticeKind::Success, format!("Opened in {}", self.settings.button_text))
			}
			RedirectResult::Failure(reason) => {
				warn!(target = "e2c", url, reason = %reason, "redirect failed");
				(NoticeKind::Error, format!("Failed to open: {reason}"))
			}
		};

		self.next_notice += 1;
		let notice = Notice {
			id: self.next_notice,
			kind,
			text,
		};
		page.show_notice(&notice);
		self.visible_notice = Some(notice.id);
		Some(notice)
	}

	/// Clears notice `id` if it is still the visible one.
	pub fn expire_notice(&mut self, id: u64, page: &mut dyn Page) -> bool {
		if self.visible_notice != Some(id) {
			return false;
		}
		page.clear_notice();
		self.visible_notice = None;
		true
	}
}

/// Resolves `href` against `base`. Only schemes the launcher accepts survive,
/// which also rules out pseudo-protocols like `javascript:` and `mailto:`.
fn resolve_href(href: &str, base: Option<&Url>) -> Option<Url> {
	let href = href.trim();
	if href.is_empty() {
		return None;
	}
	let url = Url::options().base_url(base).parse(href).ok()?;
	if !LAUNCHABLE_SCHEMES.contains(&url.scheme()) {
		return None;
	}
	Some(url)
}

#[cfg(test)]
mod tests;
