//! Content scraper: fetches a linked page and extracts its primary text.
//!
//! Extraction is best effort. Boilerplate blocks are removed with a handful
//! of patterns, the `<article>` (or `<main>`) region is preferred when the
//! page has one, and the remainder is rendered to text with `html2text`.

use std::{future::Future, time::Duration};

use compintel_core::feed_item::truncate_chars;
use regex::Regex;
use reqwest::{Client, header::CONTENT_TYPE};

use crate::{Error, Result, USER_AGENT};

/// Upper bound on extracted text handed to the classifier.
pub const MAX_PAGE_CHARS: usize = 20_000;

const TEXT_WIDTH: usize = 120;

const BOILERPLATE_TAGS: &[&str] =
  &["head", "script", "style", "noscript", "nav", "header", "footer", "aside", "form"];

const CONTENT_REGIONS: &[&str] = &["article", "main"];

pub trait PageScraper: Send + Sync + 'static {
  /// Plain text of the page at `url`. Fails on network errors, non-text
  /// content and pages with nothing left after extraction.
  fn scrape<'a>(&'a self, url: &'a str) -> impl Future<Output = Result<String>> + Send + 'a;
}

// ─── Extraction ──────────────────────────────────────────────────────────────

pub struct TextExtractor {
  boilerplate: Vec<Regex>,
  regions:     Vec<Regex>,
  footnote:    Regex,
}

impl TextExtractor {
  pub fn new() -> Result<Self> {
    let boilerplate = BOILERPLATE_TAGS
      .iter()
      .map(|tag| Regex::new(&format!(r"(?is)<{tag}\b[^>]*>.*?</{tag}\s*>")))
      .collect::<Result<Vec<_>, _>>()?;
    let regions = CONTENT_REGIONS
      .iter()
      .map(|tag| Regex::new(&format!(r"(?is)<{tag}\b[^>]*>(.*?)</{tag}\s*>")))
      .collect::<Result<Vec<_>, _>>()?;
    // html2text appends link references as "[1]: https://..." lines.
    let footnote = Regex::new(r"^\[\d+\]:\s")?;
    Ok(Self { boilerplate, regions, footnote })
  }

  /// Extract readable text from `html`, or `None` if nothing substantive is
  /// left.
  pub fn extract(&self, html: &str) -> Option<String> {
    let mut cleaned = html.to_owned();
    for re in &self.boilerplate {
      cleaned = re.replace_all(&cleaned, " ").into_owned();
    }

    let region = self
      .regions
      .iter()
      .find_map(|re| {
        re.captures(&cleaned)
          .and_then(|c| c.get(1))
          .map(|m| m.as_str().to_owned())
          .filter(|r| !r.trim().is_empty())
      })
      .unwrap_or(cleaned);

    let text = match html2text::from_read(region.as_bytes(), TEXT_WIDTH) {
      Ok(t) => t,
      Err(e) => {
        tracing::debug!("failed to convert HTML to text: {e}");
        return None;
      }
    };

    let body = text
      .lines()
      .map(str::trim)
      .filter(|l| !l.is_empty() && !self.footnote.is_match(l))
      .filter(|l| is_substantive(l))
      .collect::<Vec<_>>()
      .join("\n");

    (!body.is_empty()).then(|| truncate_chars(&body, MAX_PAGE_CHARS))
  }
}

/// Long lines, or short ones containing at least one real word. Drops
/// separators, stray bullets and "|"-style navigation residue.
fn is_substantive(line: &str) -> bool {
  if line.chars().count() > 20 {
    return true;
  }
  let mut run = 0;
  for c in line.chars() {
    run = if c.is_alphabetic() { run + 1 } else { 0 };
    if run >= 3 {
      return true;
    }
  }
  false
}

fn is_textual(content_type: &str) -> bool {
  let mime = content_type.split(';').next().unwrap_or_default().trim().to_ascii_lowercase();
  mime.starts_with("text/") || mime.contains("html") || mime.contains("xml")
}

// ─── HTTP implementation ─────────────────────────────────────────────────────

pub struct HttpScraper {
  client:    Client,
  extractor: TextExtractor,
}

impl HttpScraper {
  pub fn new(timeout: Duration) -> Result<Self> {
    let client = Client::builder()
      .timeout(timeout)
      .connect_timeout(timeout.min(Duration::from_secs(10)))
      .user_agent(USER_AGENT)
      .build()?;
    Ok(Self { client, extractor: TextExtractor::new()? })
  }
}

impl PageScraper for HttpScraper {
  async fn scrape(&self, url: &str) -> Result<String> {
    let response = self.client.get(url).send().await?;

    let status = response.status();
    if !status.is_success() {
      return Err(Error::Status { url: url.to_owned(), status: status.as_u16() });
    }

    if let Some(ct) = response.headers().get(CONTENT_TYPE).and_then(|v| v.to_str().ok()) {
      if !is_textual(ct) {
        return Err(Error::ContentType(ct.to_owned()));
      }
    }

    let html = response.text().await?;
    self.extractor.extract(&html).ok_or(Error::EmptyContent)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn extract(html: &str) -> Option<String> { TextExtractor::new().unwrap().extract(html) }

  #[test]
  fn strips_boilerplate_and_prefers_article() {
    let html = r#"<html>
      <head><title>Ignored</title><style>body { color: red }</style></head>
      <body>
        <nav><a href="/">Home</a> | <a href="/blog">Blog</a></nav>
        <header>Site header banner</header>
        <div>Sidebar teaser that is outside the article region</div>
        <article>
          <h1>TechFlow raises prices</h1>
          <p>TechFlow announced a new pricing model for enterprise customers today.</p>
          <script>track("view")</script>
        </article>
        <footer>Copyright footer text</footer>
      </body></html>"#;
    let text = extract(html).unwrap();
    assert!(text.contains("TechFlow announced a new pricing model"), "{text}");
    assert!(text.contains("TechFlow raises prices"));
    assert!(!text.contains("Sidebar teaser"));
    assert!(!text.contains("track("));
    assert!(!text.contains("Copyright"));
    assert!(!text.contains("Ignored"));
  }

  #[test]
  fn falls_back_to_whole_body() {
    let html = "<html><body><p>Plain page describing the quarterly roadmap.</p></body></html>";
    let text = extract(html).unwrap();
    assert!(text.contains("quarterly roadmap"));
  }

  #[test]
  fn empty_page_yields_nothing() {
    assert!(extract("<html><body><nav>Home</nav><p> | </p></body></html>").is_none());
  }

  #[test]
  fn output_is_capped() {
    let html = format!("<p>{}</p>", "word ".repeat(10_000));
    let text = extract(&html).unwrap();
    assert!(text.chars().count() <= MAX_PAGE_CHARS + 3);
  }

  #[test]
  fn content_type_check() {
    assert!(is_textual("text/html; charset=utf-8"));
    assert!(is_textual("application/xhtml+xml"));
    assert!(!is_textual("application/pdf"));
    assert!(!is_textual("image/png"));
  }
}
