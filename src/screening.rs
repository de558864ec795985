//! # Return-Entropy Screening
//!
//! $$
//! \tilde H=\frac{-\sum_{k:\,f_k>0} f_k\log_2 f_k}{\log_2 B}
//! $$
//!
//! Normalized Shannon entropy of a log-return histogram, used to rank tickers
//! from most to least predictable return distribution.

use std::cmp::Ordering;

use rayon::prelude::*;
use tracing::debug;

/// Default histogram size.
pub const DEFAULT_BINS: usize = 20;

/// Log returns of a close series, skipping pairs with a non-positive price.
pub fn log_returns(closes: &[f64]) -> Vec<f64> {
  closes
    .windows(2)
    .filter(|w| w[0] > 0.0 && w[1] > 0.0)
    .map(|w| (w[1] / w[0]).ln())
    .collect()
}

/// Entropy of an equal-width histogram over `[min, max]`, scaled into `[0, 1]`.
///
/// `None` for an empty series, fewer than two bins, or non-finite data.
pub fn normalized_entropy(series: &[f64], bins: usize) -> Option<f64> {
  if series.is_empty() || bins < 2 || series.iter().any(|x| !x.is_finite()) {
    return None;
  }

  let (lo, hi) = series
    .iter()
    .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &x| {
      (lo.min(x), hi.max(x))
    });
  if hi == lo {
    return Some(0.0);
  }

  let width = (hi - lo) / bins as f64;
  let mut counts = vec![0usize; bins];
  for &x in series {
    // right edge belongs to the last bin
    let k = (((x - lo) / width) as usize).min(bins - 1);
    counts[k] += 1;
  }

  let n = series.len() as f64;
  let h: f64 = counts
    .iter()
    .filter(|&&c| c > 0)
    .map(|&c| {
      let f = c as f64 / n;
      -f * f.log2()
    })
    .sum();
  Some(h / (bins as f64).log2())
}

/// Sort ascending by entropy; undefined scores go last, ties by ticker.
pub fn rank_by_entropy<I, S>(scores: I) -> Vec<(String, Option<f64>)>
where
  I: IntoIterator<Item = (S, Option<f64>)>,
  S: Into<String>,
{
  let mut ranked: Vec<(String, Option<f64>)> = scores
    .into_iter()
    .map(|(t, h)| (t.into(), h))
    .collect();
  ranked.sort_by(|(ta, a), (tb, b)| {
    let by_score = match (a, b) {
      (Some(a), Some(b)) => a.total_cmp(b),
      (Some(_), None) => Ordering::Less,
      (None, Some(_)) => Ordering::Greater,
      (None, None) => Ordering::Equal,
    };
    by_score.then_with(|| ta.cmp(tb))
  });
  ranked
}

/// Score every close series in parallel and rank the result.
pub fn screen_closes<S>(closes: &[(S, Vec<f64>)], bins: usize) -> Vec<(String, Option<f64>)>
where
  S: AsRef<str> + Sync,
{
  let scores: Vec<(String, Option<f64>)> = closes
    .par_iter()
    .map(|(ticker, series)| {
      let h = normalized_entropy(&log_returns(series), bins);
      (ticker.as_ref().to_string(), h)
    })
    .collect();

  let undefined = scores.iter().filter(|(_, h)| h.is_none()).count();
  debug!(tickers = scores.len(), undefined, bins, "scored return entropy");
  rank_by_entropy(scores)
}
