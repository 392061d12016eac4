//! Renders a compiled digest into an email subject and HTML/plain-text
//! bodies.

use chrono::{DateTime, Utc};
use compintel_core::{
  digest::{CompetitorDigest, DigestPayload},
  feed_item::{FeedItem, truncate_chars},
  insight::Insight,
};
use handlebars::{Handlebars, handlebars_helper};
use serde::Serialize;

use crate::Result;

const HTML_TEMPLATE: &str = "html";
const TEXT_TEMPLATE: &str = "text";

const HTML_SOURCE: &str = r#"<html>
<body>
<h1>{{subject}}</h1>
<p>Covering {{since}} to {{until}}.</p>
{{#if empty}}
<p>No new competitor activity in this window.</p>
{{/if}}
{{#each competitors}}
<h2>{{name}}</h2>
{{#if insights}}
<h3>Insights</h3>
<ul>
{{#each insights}}
<li><strong>[{{priority}}] {{title}}</strong> ({{category}}, {{status}})<br>{{summary}}{{#if source_url}} <a href="{{source_url}}">source</a>{{/if}}</li>
{{/each}}
</ul>
{{/if}}
{{#if items}}
<h3>Updates</h3>
<ul>
{{#each items}}
<li><strong>[{{severity}}]</strong> <a href="{{source_url}}">{{title}}</a><br>{{summary}}{{#if tags}}<br><em>{{tags}}</em>{{/if}}</li>
{{/each}}
</ul>
{{/if}}
{{/each}}
</body>
</html>
"#;

// Triple braces: the plain-text body must not be HTML-escaped.
const TEXT_SOURCE: &str = r#"{{{subject}}}
Covering {{{since}}} to {{{until}}}.
{{#if empty}}
No new competitor activity in this window.
{{/if}}
{{#each competitors}}

== {{{name}}} ==
{{#each insights}}
* [{{{priority}}}] {{{title}}} ({{{category}}}, {{{status}}})
  {{{clip summary 400}}}
{{/each}}
{{#each items}}
- [{{{severity}}}] {{{title}}}
  {{{clip summary 400}}}
  {{{source_url}}}
{{/each}}
{{/each}}
"#;

handlebars_helper!(clip: |text: str, max: u64| truncate_chars(text, max as usize));

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderedDigest {
  pub subject: String,
  pub html:    String,
  pub text:    String,
}

pub struct DigestRenderer {
  registry: Handlebars<'static>,
}

impl DigestRenderer {
  pub fn new() -> Result<Self> {
    let mut registry = Handlebars::new();
    registry.register_helper("clip", Box::new(clip));
    registry.register_template_string(HTML_TEMPLATE, HTML_SOURCE)?;
    registry.register_template_string(TEXT_TEMPLATE, TEXT_SOURCE)?;
    Ok(Self { registry })
  }

  pub fn render(&self, payload: &DigestPayload) -> Result<RenderedDigest> {
    let subject = subject(payload);
    let view = DigestView::new(&subject, payload);
    let html = self.registry.render(HTML_TEMPLATE, &view)?;
    let text = self.registry.render(TEXT_TEMPLATE, &view)?;
    Ok(RenderedDigest { subject, html, text })
  }
}

pub fn subject(payload: &DigestPayload) -> String {
  format!(
    "Competitor digest: {} items, {} insights",
    payload.total_items, payload.total_insights
  )
}

// ─── Template context ────────────────────────────────────────────────────────

#[derive(Serialize)]
struct DigestView<'a> {
  subject:     &'a str,
  since:       String,
  until:       String,
  empty:       bool,
  competitors: Vec<CompetitorView<'a>>,
}

#[derive(Serialize)]
struct CompetitorView<'a> {
  name:     &'a str,
  insights: Vec<InsightView<'a>>,
  items:    Vec<ItemView<'a>>,
}

#[derive(Serialize)]
struct InsightView<'a> {
  title:      &'a str,
  summary:    &'a str,
  category:   &'a str,
  priority:   &'a str,
  status:     &'a str,
  source_url: Option<&'a str>,
}

#[derive(Serialize)]
struct ItemView<'a> {
  title:      &'a str,
  summary:    &'a str,
  severity:   &'a str,
  source_url: &'a str,
  tags:       String,
}

fn timestamp(at: DateTime<Utc>) -> String { at.format("%Y-%m-%d %H:%M UTC").to_string() }

impl<'a> DigestView<'a> {
  fn new(subject: &'a str, payload: &'a DigestPayload) -> Self {
    Self {
      subject,
      since: timestamp(payload.window.since),
      until: timestamp(payload.window.until),
      empty: payload.is_empty(),
      competitors: payload.competitors.iter().map(CompetitorView::new).collect(),
    }
  }
}

impl<'a> CompetitorView<'a> {
  fn new(group: &'a CompetitorDigest) -> Self {
    Self {
      name:     &group.competitor,
      insights: group.insights.iter().map(InsightView::new).collect(),
      items:    group.items.iter().map(ItemView::new).collect(),
    }
  }
}

impl<'a> InsightView<'a> {
  fn new(insight: &'a Insight) -> Self {
    Self {
      title:      &insight.title,
      summary:    &insight.summary,
      category:   insight.category.as_str(),
      priority:   insight.priority.as_ref(),
      status:     insight.status.as_ref(),
      source_url: insight.source_url.as_deref(),
    }
  }
}

impl<'a> ItemView<'a> {
  fn new(item: &'a FeedItem) -> Self {
    Self {
      title:      &item.title,
      summary:    &item.summary,
      severity:   item.severity.as_ref(),
      source_url: &item.source_url,
      tags:       item.tags.iter().map(String::as_str).collect::<Vec<_>>().join(", "),
    }
  }
}

#[cfg(test)]
mod tests {
  use std::collections::BTreeSet;

  use chrono::TimeZone;
  use compintel_core::{
    digest::DigestWindow,
    feed_item::{ReadStatus, Severity},
    insight::{Category, InsightStatus, Priority},
  };

  use super::*;

  fn now() -> DateTime<Utc> { Utc.with_ymd_and_hms(2024, 5, 10, 9, 0, 0).unwrap() }

  fn item(id: i64, title: &str, severity: Severity) -> FeedItem {
    FeedItem {
      id,
      competitor: "TechFlow".into(),
      source_url: format!("https://techflow.example/{id}"),
      title: title.into(),
      summary: format!("Summary of {title}"),
      tags: BTreeSet::from(["pricing".to_owned(), "security".to_owned()]),
      severity,
      status: ReadStatus::Unread,
      ingested_at: now() - chrono::Duration::hours(id),
      published_at: None,
    }
  }

  fn insight() -> Insight {
    Insight {
      id:              1,
      competitor:      "TechFlow".into(),
      title:           "TechFlow patches sync agent".into(),
      summary:         "Critical fix shipped".into(),
      category:        Category::threat(),
      priority:        Priority::High,
      status:          InsightStatus::Pending,
      action_notes:    None,
      source_item_ids: vec![1],
      source_url:      Some("https://techflow.example/1".into()),
      created_at:      now() - chrono::Duration::hours(1),
    }
  }

  fn payload(items: Vec<FeedItem>, insights: Vec<Insight>) -> DigestPayload {
    let window = DigestWindow::since_last(None, now());
    DigestPayload::compile(items, insights, window, now())
  }

  #[test]
  fn renders_both_bodies() {
    let payload = payload(
      vec![item(1, "Sync agent advisory", Severity::Critical), item(2, "New plans", Severity::Medium)],
      vec![insight()],
    );
    let rendered = DigestRenderer::new().unwrap().render(&payload).unwrap();

    assert_eq!(rendered.subject, "Competitor digest: 2 items, 1 insights");
    assert!(rendered.html.contains("<h2>TechFlow</h2>"));
    assert!(rendered.html.contains("[High Priority] TechFlow patches sync agent"));
    assert!(rendered.html.contains("[Critical]"));
    assert!(rendered.html.contains("pricing, security"));
    assert!(rendered.text.contains("== TechFlow =="));
    assert!(rendered.text.contains("- [Medium] New plans"));
    assert!(rendered.text.contains("https://techflow.example/2"));
    assert!(!rendered.text.contains("No new competitor activity"));
  }

  #[test]
  fn html_body_is_escaped_but_text_is_not() {
    let payload = payload(vec![item(1, "Q&A <live>", Severity::Normal)], vec![]);
    let rendered = DigestRenderer::new().unwrap().render(&payload).unwrap();
    assert!(rendered.html.contains("Q&amp;A &lt;live&gt;"));
    assert!(rendered.text.contains("Q&A <live>"));
  }

  #[test]
  fn empty_digest_says_so() {
    let rendered = DigestRenderer::new().unwrap().render(&payload(vec![], vec![])).unwrap();
    assert_eq!(rendered.subject, "Competitor digest: 0 items, 0 insights");
    assert!(rendered.html.contains("No new competitor activity"));
    assert!(rendered.text.contains("No new competitor activity"));
  }

  #[test]
  fn text_summaries_are_clipped() {
    let mut long = item(1, "Long read", Severity::Normal);
    long.summary = "word ".repeat(200);
    let rendered = DigestRenderer::new().unwrap().render(&payload(vec![long], vec![])).unwrap();
    assert!(rendered.text.contains("..."));
    assert!(!rendered.text.contains(&"word ".repeat(100)));
  }
}
