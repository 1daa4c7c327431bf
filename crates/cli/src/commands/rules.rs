use std::io::{self, Write};

use e2c::settings::{add_rule, modify, remove_rule, test_url};
use e2c::{Pattern, Settings, SettingsStore};
use serde::Serialize;

use crate::cli::RulesAction;
use crate::context::CommandContext;
use crate::error::Result;
use crate::output::{self, Render};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RuleList {
	rules: Vec<RuleEntry>,
}

#[derive(Debug, Serialize)]
struct RuleEntry {
	index: usize,
	pattern: String,
	valid: bool,
}

impl RuleList {
	fn from_settings(settings: &Settings) -> Self {
		let rules = settings
			.url_rules
			.iter()
			.enumerate()
			.map(|(index, rule)| RuleEntry {
				index,
				pattern: rule.clone(),
				valid: Pattern::compile(rule).is_valid(),
			})
			.collect();
		Self { rules }
	}
}

impl Render for RuleList {
	fn render(&self, out: &mut dyn Write) -> io::Result<()> {
		if self.rules.is_empty() {
			return writeln!(out, "no rules configured");
		}
		for entry in &self.rules {
			let note = if entry.valid { "" } else { "  (never matches)" };
			writeln!(out, "{:>3}  {}{note}", entry.index, entry.pattern)?;
		}
		Ok(())
	}
}

#[derive(Debug, Serialize)]
struct RuleTest {
	url: String,
	matched: Vec<String>,
}

impl Render for RuleTest {
	fn render(&self, out: &mut dyn Write) -> io::Result<()> {
		if self.matched.is_empty() {
			return writeln!(out, "no rule matches {}", self.url);
		}
		writeln!(out, "{} matches:", self.url)?;
		for rule in &self.matched {
			writeln!(out, "  {rule}")?;
		}
		Ok(())
	}
}

pub fn execute(action: RulesAction, ctx: &CommandContext) -> Result<()> {
	let store = ctx.settings_store();
	match action {
		RulesAction::List => {
			output::print_success("rules.list", &RuleList::from_settings(&store.current()), ctx.format);
		}
		RulesAction::Add { rule } => {
			let settings = modify(&store, |s| add_rule(s, &rule))?;
			output::print_success("rules.add", &RuleList::from_settings(&settings), ctx.format);
		}
		RulesAction::Remove { index } => {
			let settings = modify(&store, |s| remove_rule(s, index).map(drop))?;
			output::print_success("rules.remove", &RuleList::from_settings(&settings), ctx.format);
		}
		RulesAction::Test { url } => {
			let matched = test_url(&store.current(), &url);
			output::print_success("rules.test", &RuleTest { url, matched }, ctx.format);
		}
	}
	Ok(())
}
