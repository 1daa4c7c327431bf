use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use e2c_protocol::{FailureReason, RedirectResult, Settings};
use e2c_runtime::{Connector, Error, Session, SessionEvent};
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tokio::time::{Instant, sleep};

use super::*;
use crate::dispatcher::Dispatcher;
use crate::settings::{MemorySettingsStore, SettingsStore};

#[derive(Debug, Default)]
struct PageState {
	base: Option<String>,
	links: Vec<Link>,
	markers: BTreeMap<LinkId, Marker>,
	attach_calls: HashMap<LinkId, usize>,
	scans: usize,
	notice: Option<Notice>,
	notices_shown: usize,
}

/// Page double; clones share state so tests can watch a page owned by a runner.
#[derive(Clone, Default)]
struct FakePage(Arc<Mutex<PageState>>);

impl FakePage {
	fn with_links(base: &str, links: &[(u64, &str)]) -> Self {
		let page = Self::default();
		{
			let mut state = page.0.lock().unwrap();
			state.base = Some(base.to_string());
			state.links = links.iter().map(|(id, href)| Link::new(*id, *href)).collect();
		}
		page
	}

	fn state(&self) -> std::sync::MutexGuard<'_, PageState> {
		self.0.lock().unwrap()
	}

	fn marked(&self) -> Vec<u64> {
		self.state().markers.keys().map(|id| id.0).collect()
	}
}

impl Page for FakePage {
	fn base_url(&self) -> Option<String> {
		self.state().base.clone()
	}

	fn links(&self) -> Vec<Link> {
		let mut state = self.state();
		state.scans += 1;
		state.links.clone()
	}

	fn attach_marker(&mut self, link: LinkId, marker: &Marker) {
		let mut state = self.state();
		assert!(state.markers.insert(link, marker.clone()).is_none(), "double attach on {link}");
		*state.attach_calls.entry(link).or_default() += 1;
	}

	fn detach_marker(&mut self, link: LinkId) {
		assert!(self.state().markers.remove(&link).is_some(), "detach without marker on {link}");
	}

	fn show_notice(&mut self, notice: &Notice) {
		let mut state = self.state();
		state.notice = Some(notice.clone());
		state.notices_shown += 1;
	}

	fn clear_notice(&mut self) {
		self.state().notice = None;
	}
}

fn settings_with_rules(rules: &[&str]) -> Settings {
	Settings {
		url_rules: rules.iter().map(|r| r.to_string()).collect(),
		..Settings::default()
	}
}

#[test]
fn evaluation_is_idempotent() {
	let mut page = FakePage::with_links(
		"https://example.org/",
		&[(1, "https://www.zhihu.com/question/1"), (2, "https://example.org/a"), (3, "https://zhuanlan.zhihu.com/p/2")],
	);
	let mut agent = PageAgent::new(Settings::default());

	let first = agent.evaluate(&mut page);
	let second = agent.evaluate(&mut page);

	assert_eq!(first, EvaluationReport { attached: 2, removed: 0, eligible: 2 });
	assert_eq!(second, EvaluationReport { attached: 0, removed: 0, eligible: 2 });
	assert_eq!(page.marked(), vec![1, 3]);
	assert!(page.state().attach_calls.values().all(|&n| n == 1));
}

#[test]
fn eligibility_resolves_and_filters_schemes() {
	let mut page = FakePage::with_links(
		"https://www.zhihu.com/question/1",
		&[
			(1, "/question/2"),
			(2, "javascript:void(0)"),
			(3, "mailto:someone@zhihu.com"),
			(4, "tel:+100"),
			(5, "   "),
			(6, "data:text/html,zhihu"),
			(7, "#answers"),
		],
	);
	page.state().links.push(Link {
		id: LinkId(8),
		href: None,
	});
	let mut agent = PageAgent::new(settings_with_rules(&["*zhihu*"]));

	agent.evaluate(&mut page);

	assert_eq!(page.marked(), vec![1, 7]);
	assert_eq!(page.state().markers[&LinkId(1)].url, "https://www.zhihu.com/question/2");
}

#[test]
fn only_launchable_schemes_are_marked() {
	let mut page = FakePage::with_links(
		"https://www.example.com/",
		&[
			(1, "ftp://files.example.org/pub"),
			(2, "file:///home/u/example.html"),
			(3, "chrome://settings/example"),
			(4, "ws://example.org/socket"),
			(5, "http://example.org/plain"),
			(6, "HTTPS://EXAMPLE.ORG/upper"),
		],
	);
	let mut agent = PageAgent::new(settings_with_rules(&["*example*"]));

	agent.evaluate(&mut page);

	assert_eq!(page.marked(), vec![5, 6]);
	assert_eq!(page.state().markers[&LinkId(6)].url, "https://example.org/upper");
}

#[test]
fn relative_link_without_base_is_not_eligible() {
	let mut agent = PageAgent::new(settings_with_rules(&["*"]));
	assert_eq!(agent.eligible_target("/a", None), None);
	assert_eq!(agent.eligible_target("https://a.test", None).as_deref(), Some("https://a.test/"));

	let mut page = FakePage::default();
	page.state().links.push(Link::new(1, "relative/path"));
	assert_eq!(agent.evaluate(&mut page).eligible, 0);
}

#[test]
fn settings_change_removes_stale_markers() {
	let mut page = FakePage::with_links(
		"https://example.org/",
		&[(1, "https://www.zhihu.com/"), (2, "https://github.com/rust-lang")],
	);
	let mut agent = PageAgent::new(Settings::default());
	agent.evaluate(&mut page);
	assert_eq!(page.marked(), vec![1]);

	agent.apply_settings(settings_with_rules(&["*github.com*"]));
	let report = agent.evaluate(&mut page);

	assert_eq!(report, EvaluationReport { attached: 1, removed: 1, eligible: 1 });
	assert_eq!(page.marked(), vec![2]);
	assert_eq!(agent.marked_count(), 1);
}

#[test]
fn button_text_change_relabels_markers() {
	let mut page = FakePage::with_links("https://example.org/", &[(1, "https://www.zhihu.com/")]);
	let mut agent = PageAgent::new(Settings::default());
	agent.evaluate(&mut page);

	agent.apply_settings(Settings {
		button_text: "Open".into(),
		..Settings::default()
	});
	agent.evaluate(&mut page);

	assert_eq!(page.state().markers[&LinkId(1)].label, "Open");
	assert_eq!(page.state().attach_calls[&LinkId(1)], 2);
}

#[test]
fn removed_elements_are_forgotten() {
	let mut page = FakePage::with_links("https://example.org/", &[(1, "https://www.zhihu.com/")]);
	let mut agent = PageAgent::new(Settings::default());
	agent.evaluate(&mut page);

	// The element left the DOM along with its marker.
	{
		let mut state = page.state();
		state.links.clear();
		state.markers.clear();
	}
	agent.evaluate(&mut page);
	assert_eq!(agent.marked_count(), 0);
}

#[test]
fn activation_builds_request_for_marked_links_only() {
	let mut page = FakePage::with_links(
		"https://example.org/",
		&[(1, "https://www.zhihu.com/q"), (2, "https://example.org/other")],
	);
	let mut agent = PageAgent::new(Settings {
		chrome_args: "--incognito".into(),
		..Settings::default()
	});
	agent.evaluate(&mut page);

	let request = agent.activate(LinkId(1)).unwrap();
	assert_eq!(request.url, "https://www.zhihu.com/q");
	assert_eq!(request.launch_args, "--incognito");
	assert!(agent.activate(LinkId(2)).is_none());
	assert!(agent.activate(LinkId(99)).is_none());
}

#[test]
fn success_notice_respects_setting() {
	let mut page = FakePage::default();
	let ok = RedirectResult::Success(json!({"success": true}));

	let mut agent = PageAgent::new(Settings::default());
	let notice = agent.handle_result("https://a.test/", &ok, &mut page).unwrap();
	assert_eq!(notice.kind, NoticeKind::Success);

	let mut quiet = PageAgent::new(Settings {
		show_notifications: false,
		..Settings::default()
	});
	let mut quiet_page = FakePage::default();
	assert!(quiet.handle_result("https://a.test/", &ok, &mut quiet_page).is_none());
	assert_eq!(quiet_page.state().notices_shown, 0);
}

#[test]
fn failure_always_shows_error_notice() {
	let mut page = FakePage::default();
	let mut agent = PageAgent::new(Settings {
		show_notifications: false,
		..Settings::default()
	});

	let notice = agent
		.handle_result("https://a.test/", &RedirectResult::Failure(FailureReason::Timeout), &mut page)
		.unwrap();

	assert_eq!(notice.kind, NoticeKind::Error);
	assert!(notice.text.contains("timeout"));
	assert_eq!(page.state().notices_shown, 1);
}

#[test]
fn newer_notice_survives_older_expiry() {
	let mut page = FakePage::default();
	let mut agent = PageAgent::new(Settings::default());
	let ok = RedirectResult::Success(Value::Null);

	let first = agent.handle_result("https://a.test/", &ok, &mut page).unwrap();
	let second = agent.handle_result("https://b.test/", &ok, &mut page).unwrap();

	assert!(!agent.expire_notice(first.id, &mut page));
	assert_eq!(page.state().notice.as_ref().map(|n| n.id), Some(second.id));
	assert!(agent.expire_notice(second.id, &mut page));
	assert!(page.state().notice.is_none());
}

/// Host double that answers every session with `reply` after `delay`.
struct StubConnector {
	reply: Option<Value>,
	delay: Duration,
}

struct StubSession {
	reply: Option<Value>,
	due: Instant,
}

#[async_trait]
impl Connector for StubConnector {
	async fn connect(&self) -> e2c_runtime::Result<Box<dyn Session>> {
		Ok(Box::new(StubSession {
			reply: self.reply.clone(),
			due: Instant::now() + self.delay,
		}))
	}
}

#[async_trait]
impl Session for StubSession {
	async fn send(&mut self, _message: &Value) -> e2c_runtime::Result<()> {
		Ok(())
	}

	async fn next_event(&mut self) -> SessionEvent {
		tokio::time::sleep_until(self.due).await;
		match self.reply.take() {
			Some(reply) => SessionEvent::Message(reply),
			None => SessionEvent::Disconnected(Some(Error::TransportClosed.to_string())),
		}
	}

	async fn close(&mut self) {}
}

fn stub_dispatcher(reply: Option<Value>, delay_ms: u64) -> Dispatcher {
	Dispatcher::new(Arc::new(StubConnector {
		reply,
		delay: Duration::from_millis(delay_ms),
	}))
}

#[tokio::test(start_paused = true)]
async fn mutation_bursts_coalesce_into_one_pass() {
	let page = FakePage::with_links("https://example.org/", &[]);
	let store = MemorySettingsStore::default();
	let runner = AgentRunner::new(page.clone(), &store, stub_dispatcher(None, 0));
	let (tx, rx) = mpsc::unbounded_channel();
	let task = tokio::spawn(runner.run(rx));

	sleep(Duration::from_millis(1)).await;
	assert_eq!(page.state().scans, 1);

	for id in 1..=3 {
		page.state().links.push(Link::new(id, format!("https://www.zhihu.com/{id}")));
		tx.send(AgentEvent::Mutation { added_elements: 1 }).unwrap();
		sleep(Duration::from_millis(50)).await;
	}
	assert_eq!(page.state().scans, 1);

	sleep(DEFAULT_DEBOUNCE).await;
	assert_eq!(page.state().scans, 2);
	assert_eq!(page.marked(), vec![1, 2, 3]);

	tx.send(AgentEvent::Mutation { added_elements: 0 }).unwrap();
	sleep(DEFAULT_DEBOUNCE * 2).await;
	assert_eq!(page.state().scans, 2);

	drop(tx);
	task.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn settings_change_triggers_reevaluation() {
	let page = FakePage::with_links(
		"https://example.org/",
		&[(1, "https://www.zhihu.com/"), (2, "https://github.com/")],
	);
	let store = MemorySettingsStore::default();
	let runner = AgentRunner::new(page.clone(), &store, stub_dispatcher(None, 0));
	let (tx, rx) = mpsc::unbounded_channel();
	let task = tokio::spawn(runner.run(rx));

	sleep(Duration::from_millis(1)).await;
	assert_eq!(page.marked(), vec![1]);

	store.replace(settings_with_rules(&["*github*"])).unwrap();
	sleep(Duration::from_millis(1)).await;
	assert_eq!(page.marked(), vec![2]);

	drop(tx);
	task.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn activation_dispatches_and_notice_expires() {
	let page = FakePage::with_links("https://example.org/", &[(1, "https://www.zhihu.com/q")]);
	let store = MemorySettingsStore::default();
	let runner = AgentRunner::new(page.clone(), &store, stub_dispatcher(Some(json!({"success": true})), 100));
	let (tx, rx) = mpsc::unbounded_channel();
	let task = tokio::spawn(runner.run(rx));

	tx.send(AgentEvent::Activated(LinkId(1))).unwrap();
	sleep(Duration::from_millis(150)).await;
	let shown = page.state().notice.clone().unwrap();
	assert_eq!(shown.kind, NoticeKind::Success);

	sleep(DEFAULT_NOTICE_TTL).await;
	assert!(page.state().notice.is_none());

	drop(tx);
	task.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn host_disconnect_shows_error_notice() {
	let page = FakePage::with_links("https://example.org/", &[(1, "https://www.zhihu.com/q")]);
	let store = MemorySettingsStore::default();
	let runner = AgentRunner::new(page.clone(), &store, stub_dispatcher(None, 10));
	let (tx, rx) = mpsc::unbounded_channel();

	tx.send(AgentEvent::Activated(LinkId(1))).unwrap();
	tx.send(AgentEvent::Activated(LinkId(42))).unwrap();
	drop(tx);
	let page_after = runner.run(rx).await;

	let state = page_after.state();
	assert_eq!(state.notices_shown, 1);
	let notice = state.notice.as_ref().unwrap();
	assert_eq!(notice.kind, NoticeKind::Error);
	assert!(notice.text.contains("native host disconnected"));
}
