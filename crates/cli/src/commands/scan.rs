use std::fs;
use std::io::{self, Write};

use e2c::{PageAgent, RuleSet};
use serde::Serialize;

use crate::cli::ScanArgs;
use crate::context::CommandContext;
use crate::error::{E2cError, Result};
use crate::html::HtmlPage;
use crate::output::{self, Render};

#[derive(Debug, Clone, Serialize)]
pub struct ScanHit {
	pub url: String,
	/// First rule, in configured order, that matched.
	pub rule: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanReport {
	pub total_links: usize,
	pub eligible: Vec<ScanHit>,
}

impl Render for ScanReport {
	fn render(&self, out: &mut dyn Write) -> io::Result<()> {
		for hit in &self.eligible {
			writeln!(out, "{}  ({})", hit.url, hit.rule)?;
		}
		writeln!(out, "{} of {} links would open externally", self.eligible.len(), self.total_links)
	}
}

pub fn execute(args: ScanArgs, ctx: &CommandContext) -> Result<()> {
	let html = fs::read_to_string(&args.file).map_err(|source| E2cError::Read {
		path: args.file.clone(),
		source,
	})?;
	let report = scan(&html, args.base.as_deref(), ctx);
	output::print_success("scan", &report, ctx.format);
	Ok(())
}

fn scan(html: &str, base: Option<&str>, ctx: &CommandContext) -> ScanReport {
	let settings = ctx.settings();
	let rules = RuleSet::new(&settings.url_rules);
	let mut page = HtmlPage::parse(html, base);
	PageAgent::new(settings).evaluate(&mut page);

	let eligible = page
		.markers()
		.map(|(_, marker)| ScanHit {
			rule: rules
				.first_match(&marker.url)
				.map(|p| p.as_str().to_string())
				.unwrap_or_default(),
			url: marker.url.clone(),
		})
		.collect();

	ScanReport {
		total_links: page.link_count(),
		eligible,
	}
}

#[cfg(test)]
mod tests {
	use std::fs;

	use tempfile::TempDir;

	use super::*;
	use crate::output::OutputFormat;

	#[test]
	fn reports_first_matching_rule() {
		let tmp = TempDir::new().unwrap();
		let settings = tmp.path().join("settings.json");
		fs::write(&settings, r#"{"urlRules":["*github.com/rust*","*github*"]}"#).unwrap();
		let ctx = CommandContext::new(OutputFormat::Json, settings);

		let html = r#"<a href="https://github.com/rust-lang">r</a><a href="/explore">e</a><a href="mailto:x@github.com">m</a>"#;
		let report = scan(html, Some("https://github.com/"), &ctx);

		assert_eq!(report.total_links, 3);
		let hits: Vec<(&str, &str)> = report.eligible.iter().map(|h| (h.url.as_str(), h.rule.as_str())).collect();
		assert_eq!(
			hits,
			vec![
				("https://github.com/rust-lang", "*github.com/rust*"),
				("https://github.com/explore", "*github*"),
			]
		);
	}
}
