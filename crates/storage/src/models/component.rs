use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;

use crate::error::ScoreError;

/// The three weighted activity domains composing an impact score.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum ComponentKind {
    Gaming,
    Social,
    Donation,
}

impl ComponentKind {
    pub const ALL: [ComponentKind; 3] = [Self::Gaming, Self::Social, Self::Donation];

    pub fn default_weight(self) -> f64 {
        match self {
            Self::Gaming => 0.30,
            Self::Social => 0.20,
            Self::Donation => 0.50,
        }
    }

    pub fn default_max(self) -> f64 {
        1000.0
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Gaming => "gaming",
            Self::Social => "social",
            Self::Donation => "donation",
        }
    }
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ComponentKind {
    type Err = ScoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "gaming" | "game" | "gameplay" => Ok(Self::Gaming),
            "social" => Ok(Self::Social),
            "donation" | "donations" | "contribution" | "charity" => Ok(Self::Donation),
            other => Err(ScoreError::InvalidValue(format!(
                "unknown component '{other}'"
            ))),
        }
    }
}

/// Bounds and weight of a single component.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ComponentSpec {
    pub weight: f64,
    pub max: f64,
}

impl ComponentSpec {
    pub fn defaults_for(kind: ComponentKind) -> Self {
        Self {
            weight: kind.default_weight(),
            max: kind.default_max(),
        }
    }
}

/// Weights and maxima for every component.
///
/// Weights must sum to 1.0 so a participant maxing every component scores the
/// common maximum.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ScoreModel {
    pub gaming: ComponentSpec,
    pub social: ComponentSpec,
    pub donation: ComponentSpec,
}

impl Default for ScoreModel {
    fn default() -> Self {
        Self {
            gaming: ComponentSpec::defaults_for(ComponentKind::Gaming),
            social: ComponentSpec::defaults_for(ComponentKind::Social),
            donation: ComponentSpec::defaults_for(ComponentKind::Donation),
        }
    }
}

impl ScoreModel {
    const WEIGHT_TOLERANCE: f64 = 0.001;

    pub fn spec(&self, kind: ComponentKind) -> ComponentSpec {
        match kind {
            ComponentKind::Gaming => self.gaming,
            ComponentKind::Social => self.social,
            ComponentKind::Donation => self.donation,
        }
    }

    pub fn spec_mut(&mut self, kind: ComponentKind) -> &mut ComponentSpec {
        match kind {
            ComponentKind::Gaming => &mut self.gaming,
            ComponentKind::Social => &mut self.social,
            ComponentKind::Donation => &mut self.donation,
        }
    }

    pub fn weight(&self, kind: ComponentKind) -> f64 {
        self.spec(kind).weight
    }

    pub fn max(&self, kind: ComponentKind) -> f64 {
        self.spec(kind).max
    }

    pub fn weighted_total(&self, scores: &ComponentScores) -> f64 {
        let total = ComponentKind::ALL
            .iter()
            .map(|&kind| scores.get(kind) * self.weight(kind))
            .sum();
        round2(total)
    }

    pub fn validate(&self) -> Result<(), String> {
        for kind in ComponentKind::ALL {
            let spec = self.spec(kind);
            if !spec.weight.is_finite() || spec.weight < 0.0 {
                return Err(format!("{kind} weight must be non-negative"));
            }
            if !spec.max.is_finite() || spec.max <= 0.0 {
                return Err(format!("{kind} max must be positive"));
            }
        }

        let sum: f64 = ComponentKind::ALL.iter().map(|&k| self.weight(k)).sum();
        if (sum - 1.0).abs() > Self::WEIGHT_TOLERANCE {
            return Err(format!("Weights must sum to 1.0, got {sum}"));
        }

        Ok(())
    }
}

/// Raw value of each component, used for breakdowns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ComponentScores {
    pub gaming: f64,
    pub social: f64,
    pub donation: f64,
}

impl ComponentScores {
    pub fn get(&self, kind: ComponentKind) -> f64 {
        match kind {
            ComponentKind::Gaming => self.gaming,
            ComponentKind::Social => self.social,
            ComponentKind::Donation => self.donation,
        }
    }

    pub(crate) fn set(&mut self, kind: ComponentKind, value: f64) {
        match kind {
            ComponentKind::Gaming => self.gaming = value,
            ComponentKind::Social => self.social = value,
            ComponentKind::Donation => self.donation = value,
        }
    }
}

/// Sub-factor values behind a component, kept for explainability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ComponentDetail {
    pub factors: BTreeMap<String, f64>,
    pub multiplier: f64,
    /// Sub-factors that fell back to zero because their upstream query failed.
    #[serde(default)]
    pub degraded: Vec<String>,
}

impl Default for ComponentDetail {
    fn default() -> Self {
        Self {
            factors: BTreeMap::new(),
            multiplier: 1.0,
            degraded: Vec::new(),
        }
    }
}

impl ComponentDetail {
    pub fn factor(&self, name: &str) -> Option<f64> {
        self.factors.get(name).copied()
    }

    pub fn is_degraded(&self) -> bool {
        !self.degraded.is_empty()
    }
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_weights_sum_to_one() {
        assert!(ScoreModel::default().validate().is_ok());
    }

    #[test]
    fn test_weighted_total_rounds_to_two_decimals() {
        let model = ScoreModel::default();
        let scores = ComponentScores {
            gaming: 333.333,
            social: 111.111,
            donation: 0.0,
        };
        assert_eq!(model.weighted_total(&scores), 122.22);
    }

    #[test]
    fn test_validate_rejects_unbalanced_weights() {
        let mut model = ScoreModel::default();
        model.gaming.weight = 0.5;
        assert!(model.validate().is_err());

        let mut model = ScoreModel::default();
        model.social.max = 0.0;
        assert!(model.validate().is_err());
    }

    #[test]
    fn test_component_kind_parsing() {
        assert_eq!("Gaming".parse::<ComponentKind>(), Ok(ComponentKind::Gaming));
        assert_eq!(
            "contribution".parse::<ComponentKind>(),
            Ok(ComponentKind::Donation)
        );
        assert!("karma".parse::<ComponentKind>().is_err());
    }
}
