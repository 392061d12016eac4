//! Feed fetcher: retrieves a competitor's RSS/Atom document and turns it into
//! candidate entries.

use std::{collections::HashSet, future::Future, time::Duration};

use compintel_core::{competitor::Competitor, feed_item::CandidateEntry};
use feed_rs::{model::Entry, parser};
use reqwest::Client;
use url::Url;

use crate::{Error, Result, USER_AGENT};

/// Title used for entries whose feed gives none.
pub const UNTITLED: &str = "Untitled";

/// Source of candidate entries for a competitor.
pub trait FeedSource: Send + Sync + 'static {
  fn fetch<'a>(
    &'a self,
    competitor: &'a Competitor,
  ) -> impl Future<Output = Result<Vec<CandidateEntry>>> + Send + 'a;
}

// ─── HTTP implementation ─────────────────────────────────────────────────────

pub struct HttpFeedSource {
  client: Client,
}

impl HttpFeedSource {
  pub fn new(timeout: Duration) -> Result<Self> {
    let client = Client::builder()
      .timeout(timeout)
      .connect_timeout(timeout.min(Duration::from_secs(10)))
      .user_agent(USER_AGENT)
      .build()?;
    Ok(Self { client })
  }
}

impl FeedSource for HttpFeedSource {
  async fn fetch(&self, competitor: &Competitor) -> Result<Vec<CandidateEntry>> {
    let response = self.client.get(&competitor.rss).send().await?;

    let status = response.status();
    if !status.is_success() {
      return Err(Error::Status { url: competitor.rss.clone(), status: status.as_u16() });
    }

    // Relative entry links resolve against where the feed actually lives.
    let base = response.url().to_string();
    let bytes = response.bytes().await?;
    let entries = parse_feed(&bytes, &base)?;

    tracing::debug!(
      competitor = %competitor.name,
      entries = entries.len(),
      "fetched feed"
    );
    Ok(entries)
  }
}

// ─── Parsing ─────────────────────────────────────────────────────────────────

/// Parse an RSS or Atom document into candidate entries.
///
/// Entries without a resolvable `http(s)` link are dropped, as are later
/// entries repeating a link already seen in the same document. Document
/// order is preserved.
pub fn parse_feed(bytes: &[u8], base_url: &str) -> Result<Vec<CandidateEntry>> {
  let feed = parser::parse(bytes)?;
  let base = Url::parse(base_url).ok();

  let mut seen = HashSet::new();
  let entries = feed
    .entries
    .into_iter()
    .filter_map(|entry| candidate(entry, base.as_ref()))
    .filter(|c| seen.insert(c.link.clone()))
    .collect();
  Ok(entries)
}

fn candidate(entry: Entry, base: Option<&Url>) -> Option<CandidateEntry> {
  let href = entry
    .links
    .iter()
    .find(|l| l.rel.as_deref().is_none_or(|rel| rel == "alternate"))
    .or_else(|| entry.links.first())
    .map(|l| l.href.trim())
    .filter(|h| !h.is_empty())?;

  let link = resolve_link(href, base)?;
  let title = entry
    .title
    .map(|t| t.content.trim().to_owned())
    .filter(|t| !t.is_empty())
    .unwrap_or_else(|| UNTITLED.to_owned());

  Some(CandidateEntry { title, link, published_at: entry.published.or(entry.updated) })
}

fn resolve_link(href: &str, base: Option<&Url>) -> Option<String> {
  let url = match Url::parse(href) {
    Ok(url) => url,
    Err(url::ParseError::RelativeUrlWithoutBase) => base?.join(href).ok()?,
    Err(_) => return None,
  };
  let has_host = url.host_str().is_some_and(|h| !h.is_empty());
  (matches!(url.scheme(), "http" | "https") && has_host).then(|| url.to_string())
}
