//! Scorecards: the scored feature dimensions that drive the behavior model.
//!
//! A scorecard is an immutable value object. Every modification goes through
//! [`Scorecard::apply`], which produces a new scorecard (copy-on-write) so
//! that tree branches sharing a lineage can never alias each other's state.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ConfigurationError;

/// The fixed set of scored feature dimensions.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    /// How hard the feature is to understand.
    Complexity,
    /// Up-front effort required before any value is delivered.
    InitialEffort,
    /// How risky the feature feels to a prospective user.
    PerceivedRisk,
    /// How long until the feature pays off.
    TimeToValue,
}

impl Dimension {
    /// All dimensions, in canonical order.
    pub const ALL: [Self; 4] = [
        Self::Complexity,
        Self::InitialEffort,
        Self::PerceivedRisk,
        Self::TimeToValue,
    ];
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Complexity => write!(f, "complexity"),
            Self::InitialEffort => write!(f, "initial_effort"),
            Self::PerceivedRisk => write!(f, "perceived_risk"),
            Self::TimeToValue => write!(f, "time_to_value"),
        }
    }
}

/// One scored dimension with provenance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScorecardDimension {
    /// The score, in [0.0, 1.0].
    score: f64,

    /// Rule tags recording which scoring rules or actions produced this score.
    pub rule_tags: Vec<String>,

    /// Optional lower confidence bound.
    pub lower_bound: Option<f64>,

    /// Optional upper confidence bound.
    pub upper_bound: Option<f64>,
}

impl ScorecardDimension {
    /// Creates a dimension entry with validation.
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError` if the score is outside [0.0, 1.0], the
    /// bounds are inconsistent, or the score violates the declared bounds.
    pub fn new(
        dimension: Dimension,
        score: f64,
        rule_tags: Vec<String>,
        lower_bound: Option<f64>,
        upper_bound: Option<f64>,
    ) -> Result<Self, ConfigurationError> {
        if !score.is_finite() || !(0.0..=1.0).contains(&score) {
            return Err(ConfigurationError::ScoreOutOfRange {
                dimension,
                value: score,
            });
        }
        if let (Some(lower), Some(upper)) = (lower_bound, upper_bound) {
            if lower > upper {
                return Err(ConfigurationError::InvalidBounds {
                    dimension,
                    lower,
                    upper,
                });
            }
        }
        let lower = lower_bound.unwrap_or(0.0);
        let upper = upper_bound.unwrap_or(1.0);
        if score < lower || score > upper {
            return Err(ConfigurationError::ScoreOutsideBounds {
                dimension,
                value: score,
                lower,
                upper,
            });
        }
        Ok(Self {
            score,
            rule_tags,
            lower_bound,
            upper_bound,
        })
    }

    /// Creates an unbounded dimension entry.
    pub fn unbounded(
        dimension: Dimension,
        score: f64,
        rule_tags: Vec<String>,
    ) -> Result<Self, ConfigurationError> {
        Self::new(dimension, score, rule_tags, None, None)
    }

    /// The score in [0.0, 1.0].
    #[must_use]
    pub const fn score(&self) -> f64 {
        self.score
    }
}

/// A delta against one dimension, as proposed by the action oracle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DimensionDelta {
    /// Which dimension to adjust.
    pub dimension: Dimension,
    /// Additive change to the score. The result is clamped into [0.0, 1.0]
    /// and into the dimension's declared bounds.
    pub delta: f64,
}

impl DimensionDelta {
    /// Convenience constructor.
    #[must_use]
    pub const fn new(dimension: Dimension, delta: f64) -> Self {
        Self { dimension, delta }
    }
}

/// A named set of scored feature dimensions.
///
/// Immutable once constructed. [`Scorecard::apply`] returns a new scorecard;
/// there is no in-place mutation, so scenario nodes retain independent
/// historical scorecards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scorecard {
    dimensions: BTreeMap<Dimension, ScorecardDimension>,

    /// Free-text justification for the current scores.
    pub justification: String,

    /// Hypotheses about the feature's impact, carried for reporting.
    pub impact_hypotheses: Vec<String>,
}

impl Scorecard {
    /// Builds a scorecard covering every dimension.
    ///
    /// Dimensions absent from `entries` default to a midpoint score of 0.5
    /// with a `default` rule tag.
    ///
    /// # Errors
    ///
    /// Propagates `ConfigurationError` from dimension validation.
    pub fn new(
        entries: BTreeMap<Dimension, ScorecardDimension>,
        justification: impl Into<String>,
        impact_hypotheses: Vec<String>,
    ) -> Result<Self, ConfigurationError> {
        let mut dimensions = entries;
        for dim in Dimension::ALL {
            if !dimensions.contains_key(&dim) {
                dimensions.insert(
                    dim,
                    ScorecardDimension::unbounded(dim, 0.5, vec!["default".to_string()])?,
                );
            }
        }
        Ok(Self {
            dimensions,
            justification: justification.into(),
            impact_hypotheses,
        })
    }

    /// Builds a scorecard from plain scores, no bounds, one shared rule tag.
    ///
    /// # Errors
    ///
    /// Propagates `ConfigurationError` if any score is out of range.
    pub fn from_scores(
        scores: &[(Dimension, f64)],
        justification: impl Into<String>,
    ) -> Result<Self, ConfigurationError> {
        let mut entries = BTreeMap::new();
        for &(dim, score) in scores {
            entries.insert(
                dim,
                ScorecardDimension::unbounded(dim, score, vec!["baseline".to_string()])?,
            );
        }
        Self::new(entries, justification, Vec::new())
    }

    /// The entry for a dimension. Every dimension is always present.
    #[must_use]
    pub fn dimension(&self, dim: Dimension) -> &ScorecardDimension {
        &self.dimensions[&dim]
    }

    /// The score for a dimension.
    #[must_use]
    pub fn score(&self, dim: Dimension) -> f64 {
        self.dimensions[&dim].score()
    }

    /// Iterates dimensions in canonical order.
    pub fn iter(&self) -> impl Iterator<Item = (Dimension, &ScorecardDimension)> {
        self.dimensions.iter().map(|(d, e)| (*d, e))
    }

    /// Applies a set of deltas, producing a new scorecard.
    ///
    /// Scores are clamped into [0.0, 1.0] and into each dimension's declared
    /// bounds. The `action_tag` is appended to the rule tags of every touched
    /// dimension so provenance survives the modification.
    #[must_use]
    pub fn apply(&self, deltas: &[DimensionDelta], action_tag: &str) -> Self {
        let mut next = self.clone();
        for delta in deltas {
            if !delta.delta.is_finite() {
                continue;
            }
            if let Some(entry) = next.dimensions.get_mut(&delta.dimension) {
                let lower = entry.lower_bound.unwrap_or(0.0).max(0.0);
                let upper = entry.upper_bound.unwrap_or(1.0).min(1.0);
                entry.score = (entry.score + delta.delta).clamp(lower, upper);
                entry.rule_tags.push(action_tag.to_string());
            }
        }
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn card() -> Scorecard {
        Scorecard::from_scores(
            &[
                (Dimension::Complexity, 0.8),
                (Dimension::InitialEffort, 0.7),
                (Dimension::PerceivedRisk, 0.85),
                (Dimension::TimeToValue, 0.6),
            ],
            "baseline",
        )
        .unwrap()
    }

    #[test]
    fn score_out_of_range_is_rejected() {
        assert!(ScorecardDimension::unbounded(Dimension::Complexity, 1.2, vec![]).is_err());
        assert!(ScorecardDimension::unbounded(Dimension::Complexity, -0.1, vec![]).is_err());
        assert!(ScorecardDimension::unbounded(Dimension::Complexity, f64::NAN, vec![]).is_err());
    }

    #[test]
    fn inconsistent_bounds_are_rejected() {
        let err = ScorecardDimension::new(
            Dimension::PerceivedRisk,
            0.5,
            vec![],
            Some(0.8),
            Some(0.2),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigurationError::InvalidBounds { .. }));
    }

    #[test]
    fn score_must_respect_declared_bounds() {
        let err = ScorecardDimension::new(
            Dimension::PerceivedRisk,
            0.9,
            vec![],
            Some(0.1),
            Some(0.5),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigurationError::ScoreOutsideBounds { .. }));
    }

    #[test]
    fn missing_dimensions_default_to_midpoint() {
        let card = Scorecard::from_scores(&[(Dimension::Complexity, 0.3)], "partial").unwrap();
        assert_eq!(card.score(Dimension::Complexity), 0.3);
        assert_eq!(card.score(Dimension::TimeToValue), 0.5);
        assert_eq!(card.dimension(Dimension::TimeToValue).rule_tags, vec!["default"]);
    }

    #[test]
    fn apply_is_copy_on_write() {
        let base = card();
        let child = base.apply(
            &[DimensionDelta::new(Dimension::Complexity, -0.3)],
            "reduce_complexity",
        );

        assert_eq!(base.score(Dimension::Complexity), 0.8);
        assert!((child.score(Dimension::Complexity) - 0.5).abs() < 1e-12);
        assert!(child
            .dimension(Dimension::Complexity)
            .rule_tags
            .contains(&"reduce_complexity".to_string()));
        assert!(!base
            .dimension(Dimension::Complexity)
            .rule_tags
            .contains(&"reduce_complexity".to_string()));
    }

    #[test]
    fn apply_clamps_to_unit_interval() {
        let base = card();
        let child = base.apply(&[DimensionDelta::new(Dimension::PerceivedRisk, 0.9)], "worse");
        assert_eq!(child.score(Dimension::PerceivedRisk), 1.0);

        let child = base.apply(&[DimensionDelta::new(Dimension::TimeToValue, -2.0)], "better");
        assert_eq!(child.score(Dimension::TimeToValue), 0.0);
    }

    #[test]
    fn apply_clamps_into_declared_bounds() {
        let mut entries = BTreeMap::new();
        entries.insert(
            Dimension::Complexity,
            ScorecardDimension::new(Dimension::Complexity, 0.6, vec![], Some(0.4), Some(0.9))
                .unwrap(),
        );
        let base = Scorecard::new(entries, "bounded", Vec::new()).unwrap();

        let child = base.apply(&[DimensionDelta::new(Dimension::Complexity, -0.5)], "floor");
        assert!((child.score(Dimension::Complexity) - 0.4).abs() < 1e-12);
    }

    #[test]
    fn non_finite_delta_is_ignored() {
        let base = card();
        let child = base.apply(&[DimensionDelta::new(Dimension::Complexity, f64::NAN)], "noop");
        assert_eq!(child.score(Dimension::Complexity), base.score(Dimension::Complexity));
    }

    #[test]
    fn scorecard_serialization_round_trips() {
        let base = card();
        let json = serde_json::to_string(&base).unwrap();
        let back: Scorecard = serde_json::from_str(&json).unwrap();
        assert_eq!(base, back);
    }
}
