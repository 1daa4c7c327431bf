//! Wildcard URL patterns.
//!
//! A pattern uses `*` for any run of characters and `?` for exactly one
//! character. Everything else is literal. Matching is anchored at both ends
//! and case-insensitive.
//!
//! Patterns compile once. A pattern that fails to compile never matches and
//! never raises, so one bad rule cannot stop the rest of a [`RuleSet`] from
//! being evaluated.

use regex::{Regex, RegexBuilder};
use tracing::warn;

/// Compiled size limit for a single pattern.
pub const DEFAULT_SIZE_LIMIT: usize = 1 << 20;

/// A compiled wildcard pattern.
#[derive(Debug, Clone)]
pub struct Pattern {
	source: String,
	regex: Option<Regex>,
}

impl Pattern {
	pub fn compile(pattern: &str) -> Self {
		Self::compile_with_limit(pattern, DEFAULT_SIZE_LIMIT)
	}

	/// Compiles with an explicit regex size limit.
	pub fn compile_with_limit(pattern: &str, size_limit: usize) -> Self {
		let expr = wildcard_to_regex(pattern);
		let regex = RegexBuilder::new(&expr)
			.case_insensitive(true)
			.dot_matches_new_line(true)
			.size_limit(size_limit)
			.build()
			.map_err(|err| {
				warn!(target = "e2c", pattern, error = %err, "pattern failed to compile; it will match nothing");
			})
			.ok();
		Self {
			source: pattern.to_string(),
			regex,
		}
	}

	/// Returns `true` if `candidate` matches. Always `false` for a pattern
	/// that failed to compile.
	pub fn matches(&self, candidate: &str) -> bool {
		self.regex.as_ref().is_some_and(|re| re.is_match(candidate))
	}

	pub fn is_valid(&self) -> bool {
		self.regex.is_some()
	}

	pub fn as_str(&self) -> &str {
		&self.source
	}
}

/// Translates wildcard syntax to an anchored regular expression.
fn wildcard_to_regex(pattern: &str) -> String {
	let mut expr = String::with_capacity(pattern.len() * 2 + 2);
	expr.push('^');
	let mut buf = [0u8; 4];
	for ch in pattern.chars() {
		match ch {
			'*' => expr.push_str(".*"),
			'?' => expr.push('.'),
			other => expr.push_str(&regex::escape(other.encode_utf8(&mut buf))),
		}
	}
	expr.push('$');
	expr
}

/// Ordered set of patterns; a URL matches if any pattern does.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
	patterns: Vec<Pattern>,
}

impl RuleSet {
	pub fn new<I, S>(rules: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: AsRef<str>,
	{
		Self {
			patterns: rules.into_iter().map(|r| Pattern::compile(r.as_ref())).collect(),
		}
	}

	pub fn is_match(&self, url: &str) -> bool {
		self.first_match(url).is_some()
	}

	/// Returns the first pattern, in configured order, that matches `url`.
	pub fn first_match(&self, url: &str) -> Option<&Pattern> {
		self.patterns.iter().find(|p| p.matches(url))
	}

	/// Every pattern that matches `url`, in configured order.
	pub fn matching<'a>(&'a self, url: &'a str) -> impl Iterator<Item = &'a Pattern> + 'a {
		self.patterns.iter().filter(move |p| p.matches(url))
	}

	pub fn len(&self) -> usize {
		self.patterns.len()
	}

	pub fn is_empty(&self) -> bool {
		self.patterns.is_empty()
	}

	pub fn iter(&self) -> impl Iterator<Item = &Pattern> {
		self.patterns.iter()
	}
}
