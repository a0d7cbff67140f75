use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::detect::DetectError;

/// Descriptive statistics for one group of observations.
///
/// `std_dev` is the sample standard deviation (n - 1 denominator). It is NaN
/// for a single observation, matching how the baselines are reported.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub count: usize,
    pub mean: f64,
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
    pub sum: f64,
}

impl Summary {
    /// Summarize `values`; `None` for an empty input.
    pub fn from_values<I>(values: I) -> Option<Self>
    where
        I: IntoIterator<Item = f64>,
    {
        let values: Vec<f64> = values.into_iter().collect();
        if values.is_empty() {
            return None;
        }

        let count = values.len();
        let sum: f64 = values.iter().sum();
        let mean = sum / count as f64;
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);

        let std_dev = if count > 1 {
            let variance_sum: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
            (variance_sum / (count - 1) as f64).sqrt()
        } else {
            f64::NAN
        };

        Some(Self {
            count,
            mean,
            std_dev,
            min,
            max,
            sum,
        })
    }

    /// Standardized distance of `value` from the group mean: |x - mean| / std.
    pub fn z_score(&self, value: f64) -> Result<f64, DetectError> {
        if self.count < 2 {
            return Err(DetectError::InsufficientBaseline {
                needed: 2,
                have: self.count,
            });
        }
        if self.std_dev.is_nan() || self.std_dev <= 0.0 {
            return Err(DetectError::ZeroVariance);
        }
        Ok((value - self.mean).abs() / self.std_dev)
    }
}

/// Group `items` by `key`, preserving input order inside each group.
pub fn group_by<'a, T, K, F>(items: &'a [T], key: F) -> BTreeMap<K, Vec<&'a T>>
where
    K: Ord,
    F: Fn(&'a T) -> K,
{
    let mut groups: BTreeMap<K, Vec<&'a T>> = BTreeMap::new();
    for item in items {
        groups.entry(key(item)).or_default().push(item);
    }
    groups
}

/// Summarize `value` for every group produced by [`group_by`].
pub fn summarize_groups<'a, T, K, F>(
    groups: &BTreeMap<K, Vec<&'a T>>,
    value: F,
) -> BTreeMap<K, Summary>
where
    K: Ord + Clone,
    F: Fn(&T) -> f64,
{
    groups
        .iter()
        .filter_map(|(k, members)| {
            Summary::from_values(members.iter().map(|m| value(m))).map(|s| (k.clone(), s))
        })
        .collect()
}
