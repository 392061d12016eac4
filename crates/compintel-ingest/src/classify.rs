//! Summarization and classification capability.
//!
//! [`Classifier`] is the pluggable boundary: one call per entry producing a
//! summary, a severity and a tag set, plus an aggregate call that derives
//! insights from a competitor's recent items. Two adapters ship with the
//! crate. [`KeywordClassifier`] is deterministic and offline;
//! [`OllamaClassifier`] asks an Ollama-compatible text-generation service.

use std::{collections::BTreeSet, future::Future, time::Duration};

use chrono::{DateTime, Utc};
use compintel_core::{
  derive::derive_insights,
  feed_item::{Annotation, FeedItem, Severity, truncate_chars},
  insight::NewInsight,
};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::{Error, Result, USER_AGENT};

/// Inputs shorter than this are not worth classifying; the pipeline stores
/// them with a fallback annotation instead.
pub const MIN_CLASSIFIABLE_CHARS: usize = 100;

/// Most tags kept from a single annotation.
pub const MAX_TAGS: usize = 5;

pub trait Classifier: Send + Sync + 'static {
  /// Summarize and classify one entry's text on behalf of `competitor`.
  fn annotate<'a>(
    &'a self,
    text: &'a str,
    competitor: &'a str,
  ) -> impl Future<Output = Result<Annotation>> + Send + 'a;

  /// Derive insights from `items` of `competitor`. The default applies the
  /// deterministic rules in [`compintel_core::derive`].
  fn assess<'a>(
    &'a self,
    competitor: &'a str,
    items: &'a [FeedItem],
    now: DateTime<Utc>,
  ) -> impl Future<Output = Result<Vec<NewInsight>>> + Send + 'a {
    async move { Ok(derive_insights(competitor, items, now)) }
  }
}

// ─── Keyword rules ───────────────────────────────────────────────────────────
//
// Phrases match at the start of a word ("launch" also matches "launched").
// A trailing space anchors the end of the word too ("ai " does not match
// "aim").

const CRITICAL_KEYWORDS: &[&str] = &[
  "critical",
  "vulnerab",
  "threat",
  "major security",
  "major outage",
  "breach",
  "lawsuit",
  "acquisition",
  "acquires ",
  "top 10",
  "transform",
];

const MEDIUM_KEYWORDS: &[&str] = &[
  "launch",
  "new feature",
  "pricing change",
  "price increase",
  "high priority",
  "review",
  "guide",
  "easier",
  "partnership",
];

const TAG_RULES: &[(&str, &[&str])] = &[
  ("acquisition", &["acquisition", "acquires ", "acquired ", "merger"]),
  ("ai", &["ai ", "artificial intelligence", "machine learning", "llm"]),
  ("funding", &["funding", "raises ", "investment", "valuation"]),
  ("feature", &["feature"]),
  ("hiring", &["hiring", "layoff", "headcount"]),
  ("launch", &["launch", "unveil", "introduc"]),
  ("legal", &["lawsuit", "litigation", "regulat"]),
  ("leadership", &["ceo ", "chief executive", "appoint"]),
  ("outage", &["outage", "downtime"]),
  ("partnership", &["partnership", "partners with"]),
  ("pricing", &["pricing", "price "]),
  ("security", &["security", "vulnerab", "breach", "exploit"]),
];

const SUMMARY_CHARS: usize = 300;

/// Lowercase `text` and reduce it to single-space separated words, padded
/// with a space on both ends.
fn normalize(text: &str) -> String {
  let words = text
    .to_lowercase()
    .split(|c: char| !c.is_alphanumeric())
    .filter(|w| !w.is_empty())
    .collect::<Vec<_>>()
    .join(" ");
  format!(" {words} ")
}

fn mentions(normalized: &str, phrase: &str) -> bool { normalized.contains(&format!(" {phrase}")) }

/// Severity from keyword presence alone.
pub fn keyword_severity(text: &str) -> Severity {
  let normalized = normalize(text);
  if CRITICAL_KEYWORDS.iter().any(|k| mentions(&normalized, k)) {
    Severity::Critical
  } else if MEDIUM_KEYWORDS.iter().any(|k| mentions(&normalized, k)) {
    Severity::Medium
  } else {
    Severity::Normal
  }
}

fn keyword_tags(text: &str) -> BTreeSet<String> {
  let normalized = normalize(text);
  TAG_RULES
    .iter()
    .filter(|(_, triggers)| triggers.iter().any(|t| mentions(&normalized, t)))
    .map(|(tag, _)| (*tag).to_owned())
    .take(MAX_TAGS)
    .collect()
}

/// The first sentences of the body, up to [`SUMMARY_CHARS`]. A leading
/// one-line paragraph (the headline) is skipped when more text follows.
fn lead_summary(text: &str) -> String {
  let paragraphs: Vec<&str> = text
    .split("\n\n")
    .map(str::trim)
    .filter(|p| !p.is_empty())
    .collect();
  let body = match paragraphs.as_slice() {
    [headline, rest @ ..] if !rest.is_empty() && !headline.contains('\n') => rest.join(" "),
    _ => paragraphs.join(" "),
  };
  let flat = body.split_whitespace().collect::<Vec<_>>().join(" ");

  let mut summary = String::new();
  for sentence in flat.split_inclusive(['.', '!', '?']) {
    if !summary.is_empty() && summary.len() + sentence.len() > SUMMARY_CHARS {
      break;
    }
    summary.push_str(sentence);
  }
  truncate_chars(summary.trim(), SUMMARY_CHARS)
}

/// Deterministic, offline classifier built on keyword lists.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeywordClassifier;

impl Classifier for KeywordClassifier {
  async fn annotate(&self, text: &str, _competitor: &str) -> Result<Annotation> {
    let summary = lead_summary(text);
    if summary.is_empty() {
      return Err(Error::Classifier("nothing to summarize".into()));
    }
    Ok(Annotation { summary, severity: keyword_severity(text), tags: keyword_tags(text) })
  }
}

// ─── Ollama ──────────────────────────────────────────────────────────────────

/// Longest input sent to the model.
pub const MAX_PROMPT_CHARS: usize = 15_000;

const PROMPT_TEMPLATE: &str = "You are tracking the competitor \"{competitor}\". Summarize the \
  following article in at most three sentences, rate how much it matters to us as one of \
  Critical, Medium or Normal, and list up to five short topic tags.\n\
  Output ONLY a single JSON object with the keys 'summary' (string), 'severity' (string) and \
  'tags' (list of strings).\n\nArticle:\n{content}";

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
  model:   &'a str,
  prompt:  String,
  format:  &'static str,
  stream:  bool,
  options: GenerateOptions,
}

#[derive(Debug, Serialize)]
struct GenerateOptions {
  temperature: f32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
  response: String,
}

/// What the model is asked to produce. Older prompts answered with
/// `bullets`/`insight`, so those are accepted as a summary too.
#[derive(Debug, Default, Deserialize)]
struct ModelAnnotation {
  #[serde(default)]
  summary:  Option<String>,
  #[serde(default)]
  insight:  Option<String>,
  #[serde(default)]
  bullets:  Vec<String>,
  #[serde(default)]
  severity: Option<String>,
  #[serde(default)]
  tags:     Vec<String>,
}

pub struct OllamaClassifier {
  client:   Client,
  endpoint: Url,
  model:    String,
}

impl OllamaClassifier {
  pub fn new(base_url: &str, model: impl Into<String>, timeout: Duration) -> Result<Self> {
    let endpoint = Url::parse(&format!("{}/api/generate", base_url.trim_end_matches('/')))?;
    let client = Client::builder().timeout(timeout).user_agent(USER_AGENT).build()?;
    Ok(Self { client, endpoint, model: model.into() })
  }

  fn prompt(text: &str, competitor: &str) -> String {
    PROMPT_TEMPLATE
      .replace("{competitor}", competitor)
      .replace("{content}", &truncate_chars(text, MAX_PROMPT_CHARS))
  }
}

/// Turn the model's JSON answer into an annotation. A missing or unknown
/// severity falls back to the keyword rules over `text`.
fn parse_model_output(raw: &str, text: &str) -> Result<Annotation> {
  let parsed: ModelAnnotation = serde_json::from_str(raw).map_err(|e| {
    Error::Classifier(format!("model output is not valid JSON ({e}): {}", truncate_chars(raw, 100)))
  })?;

  let summary = parsed
    .summary
    .or(parsed.insight)
    .filter(|s| !s.trim().is_empty())
    .or_else(|| (!parsed.bullets.is_empty()).then(|| parsed.bullets.join(" ")))
    .map(|s| s.trim().to_owned())
    .filter(|s| !s.is_empty())
    .ok_or_else(|| Error::Classifier("model returned no summary".into()))?;

  let severity = parsed
    .severity
    .and_then(|s| s.trim().parse::<Severity>().ok())
    .filter(|s| *s != Severity::Error)
    .unwrap_or_else(|| keyword_severity(text));

  let tags = parsed
    .tags
    .iter()
    .map(|t| t.trim().to_lowercase())
    .filter(|t| !t.is_empty())
    .take(MAX_TAGS)
    .collect();

  Ok(Annotation { summary, severity, tags })
}

impl Classifier for OllamaClassifier {
  async fn annotate(&self, text: &str, competitor: &str) -> Result<Annotation> {
    let request = GenerateRequest {
      model:   &self.model,
      prompt:  Self::prompt(text, competitor),
      format:  "json",
      stream:  false,
      options: GenerateOptions { temperature: 0.1 },
    };

    let response = self.client.post(self.endpoint.clone()).json(&request).send().await?;
    let status = response.status();
    if !status.is_success() {
      return Err(Error::Status { url: self.endpoint.to_string(), status: status.as_u16() });
    }

    let body: GenerateResponse = response.json().await?;
    parse_model_output(&body.response, text)
  }
}

// ─── Runtime selection ───────────────────────────────────────────────────────

/// The classifier chosen by configuration.
pub enum ClassifierBackend {
  Keyword(KeywordClassifier),
  Ollama(OllamaClassifier),
}

impl Classifier for ClassifierBackend {
  async fn annotate(&self, text: &str, competitor: &str) -> Result<Annotation> {
    match self {
      Self::Keyword(c) => c.annotate(text, competitor).await,
      Self::Ollama(c) => c.annotate(text, competitor).await,
    }
  }
}
