//! Relevance factors and their combination weights.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// One of the eight relevance factors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Factor {
    #[serde(rename = "ftsScore")]
    Fts,
    #[serde(rename = "recencyScore")]
    Recency,
    #[serde(rename = "successScore")]
    Success,
    #[serde(rename = "complexityScore")]
    Complexity,
    #[serde(rename = "confidenceScore")]
    Confidence,
    #[serde(rename = "contextScore")]
    Context,
    #[serde(rename = "frequencyScore")]
    Frequency,
    #[serde(rename = "semanticScore")]
    Semantic,
}

impl Factor {
    pub const ALL: [Factor; 8] = [
        Factor::Fts,
        Factor::Recency,
        Factor::Success,
        Factor::Complexity,
        Factor::Confidence,
        Factor::Context,
        Factor::Frequency,
        Factor::Semantic,
    ];

    /// External name, as used in config files and weight updates
    pub fn as_str(&self) -> &'static str {
        match self {
            Factor::Fts => "ftsScore",
            Factor::Recency => "recencyScore",
            Factor::Success => "successScore",
            Factor::Complexity => "complexityScore",
            Factor::Confidence => "confidenceScore",
            Factor::Context => "contextScore",
            Factor::Frequency => "frequencyScore",
            Factor::Semantic => "semanticScore",
        }
    }

    fn default_weight(&self) -> f64 {
        match self {
            Factor::Fts => 0.20,
            Factor::Recency => 0.12,
            Factor::Success => 0.15,
            Factor::Complexity => 0.08,
            Factor::Confidence => 0.08,
            Factor::Context => 0.12,
            Factor::Frequency => 0.05,
            Factor::Semantic => 0.20,
        }
    }
}

impl fmt::Display for Factor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Factor {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Factor::ALL
            .into_iter()
            .find(|factor| factor.as_str() == s)
            .ok_or_else(|| Error::InvalidWeight(format!("unknown factor: {}", s)))
    }
}

/// Partial weight map: only the listed factors change.
pub type WeightUpdate = BTreeMap<Factor, f64>;

/// Per-factor scores for one candidate, each in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FactorScores {
    pub fts_score: f64,
    pub recency_score: f64,
    pub success_score: f64,
    pub complexity_score: f64,
    pub confidence_score: f64,
    pub context_score: f64,
    pub frequency_score: f64,
    pub semantic_score: f64,
}

impl FactorScores {
    pub fn get(&self, factor: Factor) -> f64 {
        match factor {
            Factor::Fts => self.fts_score,
            Factor::Recency => self.recency_score,
            Factor::Success => self.success_score,
            Factor::Complexity => self.complexity_score,
            Factor::Confidence => self.confidence_score,
            Factor::Context => self.context_score,
            Factor::Frequency => self.frequency_score,
            Factor::Semantic => self.semantic_score,
        }
    }
}

/// An immutable weight snapshot.
///
/// Updates merge into a copy and are not re-normalized: a snapshot built
/// from partial updates may no longer sum to 1.0. [`combine`] divides by the
/// sum of the weights present, so combined scores stay in [0, 1] either way.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Weights(BTreeMap<Factor, f64>);

impl Default for Weights {
    fn default() -> Self {
        Self(
            Factor::ALL
                .into_iter()
                .map(|factor| (factor, factor.default_weight()))
                .collect(),
        )
    }
}

impl Weights {
    /// A snapshot holding exactly the given weights (no defaults filled in).
    pub fn from_partial(weights: WeightUpdate) -> Result<Self> {
        for (factor, weight) in &weights {
            validate_weight(*factor, *weight)?;
        }
        Ok(Self(weights))
    }

    pub fn get(&self, factor: Factor) -> Option<f64> {
        self.0.get(&factor).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Factor, f64)> + '_ {
        self.0.iter().map(|(factor, weight)| (*factor, *weight))
    }

    pub fn sum(&self) -> f64 {
        self.0.values().sum()
    }

    /// Merge `update` into a copy of this snapshot.
    ///
    /// Factors not named keep their current weight. Negative or non-finite
    /// weights are rejected and leave nothing changed.
    pub fn with_updates(&self, update: &WeightUpdate) -> Result<Self> {
        let mut merged = self.0.clone();
        for (factor, weight) in update {
            validate_weight(*factor, *weight)?;
            merged.insert(*factor, *weight);
        }
        Ok(Self(merged))
    }
}

fn validate_weight(factor: Factor, weight: f64) -> Result<()> {
    if !weight.is_finite() || weight < 0.0 {
        return Err(Error::InvalidWeight(format!(
            "{} must be a finite, non-negative number (got {})",
            factor, weight
        )));
    }
    Ok(())
}

/// Combine factor scores into one relevance score.
///
/// Weighted average over the factors present in `weights`. A weight sum of
/// zero or less yields 0.
pub fn combine(factors: &FactorScores, weights: &Weights) -> f64 {
    let mut weighted = 0.0;
    let mut total = 0.0;
    for (factor, weight) in weights.iter() {
        weighted += factors.get(factor) * weight;
        total += weight;
    }

    if total <= 0.0 || !total.is_finite() {
        return 0.0;
    }
    (weighted / total).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uniform(value: f64) -> FactorScores {
        FactorScores {
            fts_score: value,
            recency_score: value,
            success_score: value,
            complexity_score: value,
            confidence_score: value,
            context_score: value,
            frequency_score: value,
            semantic_score: value,
        }
    }

    #[test]
    fn test_default_weights_sum_to_one() {
        let weights = Weights::default();
        assert!((weights.sum() - 1.0).abs() < 1e-9);
        assert_eq!(weights.iter().count(), 8);
    }

    #[test]
    fn test_partial_update_keeps_other_weights() {
        let before = Weights::default();
        let after = before
            .with_updates(&WeightUpdate::from([(Factor::Fts, 0.5)]))
            .unwrap();

        assert_eq!(after.get(Factor::Fts), Some(0.5));
        for factor in Factor::ALL.into_iter().filter(|f| *f != Factor::Fts) {
            assert_eq!(after.get(factor), before.get(factor), "{} changed", factor);
        }
        // Not re-normalized
        assert!((after.sum() - 1.3).abs() < 1e-9);
        // The original snapshot is untouched
        assert_eq!(before.get(Factor::Fts), Some(0.2));
    }

    #[test]
    fn test_invalid_updates_rejected() {
        let weights = Weights::default();
        for bad in [-0.1, f64::NAN, f64::INFINITY] {
            let result = weights.with_updates(&WeightUpdate::from([(Factor::Recency, bad)]));
            assert!(matches!(result, Err(Error::InvalidWeight(_))));
        }
    }

    #[test]
    fn test_factor_names_round_trip() {
        for factor in Factor::ALL {
            assert_eq!(factor.as_str().parse::<Factor>().unwrap(), factor);
        }
        assert!("bogusScore".parse::<Factor>().is_err());
    }

    #[test]
    fn test_combine_stays_in_unit_range() {
        let weights = Weights::default();
        assert!((combine(&uniform(1.0), &weights) - 1.0).abs() < 1e-9);
        assert_eq!(combine(&uniform(0.0), &weights), 0.0);

        let mixed = FactorScores {
            fts_score: 1.0,
            semantic_score: 1.0,
            ..Default::default()
        };
        assert!((combine(&mixed, &weights) - 0.4).abs() < 1e-9);
    }

    #[test]
    fn test_combine_divides_by_present_weights() {
        let weights =
            Weights::from_partial(WeightUpdate::from([(Factor::Fts, 2.0), (Factor::Semantic, 2.0)]))
                .unwrap();
        let scores = FactorScores {
            fts_score: 1.0,
            semantic_score: 0.5,
            recency_score: 1.0,
            ..Default::default()
        };
        assert!((combine(&scores, &weights) - 0.75).abs() < 1e-9);
    }

    #[test]
    fn test_combine_with_no_weight_is_zero() {
        let empty = Weights::from_partial(WeightUpdate::new()).unwrap();
        assert_eq!(combine(&uniform(1.0), &empty), 0.0);

        let zeros = Weights::from_partial(WeightUpdate::from([(Factor::Fts, 0.0)])).unwrap();
        assert_eq!(combine(&uniform(1.0), &zeros), 0.0);
    }

    #[test]
    fn test_weights_serialize_with_factor_names() {
        let json = serde_json::to_value(Weights::default()).unwrap();
        assert_eq!(json["ftsScore"], serde_json::json!(0.2));
        assert_eq!(json["frequencyScore"], serde_json::json!(0.05));
    }
}
