//! Static HTML snapshots as a [`Page`].
//!
//! Anchors are pulled out with regular expressions. That is enough to run
//! the eligibility pass over a saved page; it is not an HTML parser.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use e2c::{Link, LinkId, Marker, Notice, Page};
use regex_lite::Regex;
use url::Url;

/// `<a ...>` opening tags; group 1 is the attribute text.
static ANCHOR_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?is)<a\b([^>]*)>").unwrap());
/// `href` attribute in double, single, or no quotes.
static HREF_ATTR_RE: LazyLock<Regex> =
	LazyLock::new(|| Regex::new(r#"(?is)\bhref\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'>]+))"#).unwrap());
/// `<base href=...>`.
static BASE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?is)<base\b([^>]*)>").unwrap());

/// A saved page with in-memory markers.
#[derive(Debug, Default)]
pub struct HtmlPage {
	base: Option<String>,
	links: Vec<Link>,
	markers: BTreeMap<LinkId, Marker>,
	notice: Option<Notice>,
}

impl HtmlPage {
	/// Extracts anchors from `html`. A `<base href>` in the document is
	/// resolved against `base` and takes precedence, as in a browser.
	pub fn parse(html: &str, base: Option<&str>) -> Self {
		let outer = base.and_then(|b| Url::parse(b).ok());
		let document_base = BASE_RE
			.captures(html)
			.and_then(|caps| href_attr(caps.get(1)?.as_str()))
			.and_then(|href| Url::options().base_url(outer.as_ref()).parse(&href).ok());
		let base = document_base.or(outer).map(String::from);

		let links = ANCHOR_RE
			.captures_iter(html)
			.enumerate()
			.map(|(index, caps)| Link {
				id: LinkId(index as u64),
				href: caps.get(1).and_then(|attrs| href_attr(attrs.as_str())),
			})
			.collect();

		Self {
			base,
			links,
			markers: BTreeMap::new(),
			notice: None,
		}
	}

	pub fn link_count(&self) -> usize {
		self.links.len()
	}

	/// Marked links in document order.
	pub fn markers(&self) -> impl Iterator<Item = (LinkId, &Marker)> {
		self.markers.iter().map(|(id, marker)| (*id, marker))
	}

	pub fn notice(&self) -> Option<&Notice> {
		self.notice.as_ref()
	}
}

fn href_attr(attrs: &str) -> Option<String> {
	let caps = HREF_ATTR_RE.captures(attrs)?;
	let raw = caps.get(1).or_else(|| caps.get(2)).or_else(|| caps.get(3))?.as_str();
	Some(decode_entities(raw))
}

/// Decodes the entities that commonly appear inside attribute values.
fn decode_entities(value: &str) -> String {
	if !value.contains('&') {
		return value.to_string();
	}
	value
		.replace("&quot;", "\"")
		.replace("&#39;", "'")
		.replace("&apos;", "'")
		.replace("&lt;", "<")
		.replace("&gt;", ">")
		.replace("&amp;", "&")
}

impl Page for HtmlPage {
	fn base_url(&self) -> Option<String> {
		self.base.clone()
	}

	fn links(&self) -> Vec<Link> {
		self.links.clone()
	}

	fn attach_marker(&mut self, link: LinkId, marker: &Marker) {
		self.markers.insert(link, marker.clone());
	}

	fn detach_marker(&mut self, link: LinkId) {
		self.markers.remove(&link);
	}

	fn show_notice(&mut self, notice: &Notice) {
		self.notice = Some(notice.clone());
	}

	fn clear_notice(&mut self) {
		self.notice = None;
	}
}
