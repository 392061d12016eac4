//! Insight deriver: promotes a competitor's recent feed items into insights.

use std::time::Duration;

use chrono::{DateTime, Utc};
use compintel_core::{
  Error as CoreError, Result as CoreResult,
  derive::DERIVATION_WINDOW,
  store::{FeedQuery, IntelStore},
};

use crate::{Error, classify::Classifier};

/// Load the items of `competitor` inside the derivation window, ask the
/// classifier for insights and record the ones not seen before.
///
/// A classifier failure or timeout is contained: it is logged and nothing is
/// recorded. Store failures propagate. Returns how many insights were new.
pub async fn derive_for_competitor<S, C>(
  store: &S,
  classifier: &C,
  competitor: &str,
  budget: Duration,
  now: DateTime<Utc>,
) -> CoreResult<usize>
where
  S: IntelStore,
  C: Classifier,
{
  let query = FeedQuery {
    competitor: Some(competitor.to_owned()),
    since: Some(now - DERIVATION_WINDOW),
    ..Default::default()
  };
  let items = store.list_feed_items(&query).await.map_err(Into::<CoreError>::into)?;
  if items.is_empty() {
    return Ok(0);
  }

  let derived = match tokio::time::timeout(budget, classifier.assess(competitor, &items, now)).await
  {
    Ok(result) => result,
    Err(_) => Err(Error::Timeout { stage: "insight derivation", budget }),
  };
  let derived = match derived {
    Ok(derived) => derived,
    Err(e) => {
      let err = CoreError::ClassificationTimeout(e.to_string());
      tracing::warn!(competitor, error = %err, "insight derivation skipped");
      return Ok(0);
    }
  };

  let mut recorded = 0;
  for insight in derived {
    let recorded_insight = store.record_insight(insight).await.map_err(Into::<CoreError>::into)?;
    if let Some(insight) = recorded_insight {
      tracing::debug!(
        competitor,
        id = insight.id,
        category = %insight.category,
        "recorded insight"
      );
      recorded += 1;
    }
  }
  Ok(recorded)
}
