//! e2c: link redirection for Edge2Chrome.
//!
//! Finds links whose address matches user-defined wildcard rules, marks them,
//! and hands activated links to an external browser through the native
//! messaging launcher host.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//!
//! use e2c::{Dispatcher, RuleSet};
//! use e2c_runtime::ProcessConnector;
//!
//! #[tokio::main]
//! async fn main() {
//!     let rules = RuleSet::new(["*.zhihu.*"]);
//!     assert!(rules.is_match("https://www.zhihu.com/question/1"));
//!
//!     let connector = ProcessConnector::new("/usr/local/bin/e2c-host")
//!         .with_origin("chrome-extension://abcdefghijklmnop/");
//!     let dispatcher = Dispatcher::new(Arc::new(connector));
//!     let result = dispatcher.redirect("https://www.zhihu.com/question/1", "--new-window").await;
//!     println!("{result:?}");
//! }
//! ```

pub mod agent;
pub mod dispatcher;
pub mod error;
pub mod pattern;
pub mod settings;

pub use agent::{
	AgentEvent, AgentRunner, EvaluationReport, Link, LinkId, Marker, Notice, NoticeKind, Page, PageAgent,
};
pub use dispatcher::{DEFAULT_TIMEOUT, Dispatcher, DispatcherConfig};
pub use e2c_protocol::{FailureReason, LaunchRequest, RedirectResult, Settings};
pub use error::{Error, Result};
pub use pattern::{Pattern, RuleSet};
pub use settings::{FileSettingsStore, MemorySettingsStore, SettingsStore, load_settings, parse_settings};
