use serde::Deserialize;
use std::str::FromStr;
use std::time::Duration;
use storage::models::{ComponentKind, DEFAULT_HISTORY_CAPACITY, LeaderboardPeriod, ScoreModel};

use crate::error::{EngineError, Result};

/// Tunables of the scoring engine. Durations are whole seconds.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Maximum age of a cached score before it is recomputed.
    pub score_staleness_secs: i64,
    /// Maximum age of a stored leaderboard before reconciliation rebuilds it.
    pub leaderboard_staleness_secs: i64,
    pub reconcile_interval_secs: u64,
    pub history_capacity: usize,
    pub leaderboard_size: usize,
    pub upstream_timeout_ms: u64,
    /// Population used for period ranks.
    pub rank_period: LeaderboardPeriod,
    pub model: ScoreModel,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            score_staleness_secs: 3600,
            leaderboard_staleness_secs: 3600,
            reconcile_interval_secs: 3600,
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            leaderboard_size: 100,
            upstream_timeout_ms: 5000,
            rank_period: LeaderboardPeriod::Weekly,
            model: ScoreModel::default(),
        }
    }
}

impl EngineConfig {
    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_millis(self.upstream_timeout_ms)
    }

    pub fn reconcile_interval(&self) -> Duration {
        Duration::from_secs(self.reconcile_interval_secs)
    }

    pub fn validate(&self) -> Result<()> {
        if self.score_staleness_secs <= 0 {
            return Err(invalid("score_staleness_secs must be positive"));
        }
        if self.leaderboard_staleness_secs <= 0 {
            return Err(invalid("leaderboard_staleness_secs must be positive"));
        }
        if self.reconcile_interval_secs == 0 {
            return Err(invalid("reconcile_interval_secs must be positive"));
        }
        if self.history_capacity == 0 {
            return Err(invalid("history_capacity must be positive"));
        }
        if self.leaderboard_size == 0 {
            return Err(invalid("leaderboard_size must be positive"));
        }
        if self.upstream_timeout_ms == 0 {
            return Err(invalid("upstream_timeout_ms must be positive"));
        }
        self.model.validate().map_err(EngineError::Configuration)
    }

    /// Defaults overlaid with `IMPACT_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        overlay(&lookup, "IMPACT_SCORE_STALENESS_SECS", &mut config.score_staleness_secs)?;
        overlay(
            &lookup,
            "IMPACT_LEADERBOARD_STALENESS_SECS",
            &mut config.leaderboard_staleness_secs,
        )?;
        overlay(&lookup, "IMPACT_RECONCILE_INTERVAL_SECS", &mut config.reconcile_interval_secs)?;
        overlay(&lookup, "IMPACT_HISTORY_CAPACITY", &mut config.history_capacity)?;
        overlay(&lookup, "IMPACT_LEADERBOARD_SIZE", &mut config.leaderboard_size)?;
        overlay(&lookup, "IMPACT_UPSTREAM_TIMEOUT_MS", &mut config.upstream_timeout_ms)?;

        if let Some(raw) = lookup("IMPACT_RANK_PERIOD") {
            config.rank_period = raw
                .parse()
                .map_err(|e| EngineError::Configuration(format!("IMPACT_RANK_PERIOD: {e}")))?;
        }

        for kind in ComponentKind::ALL {
            let upper = kind.as_str().to_uppercase();
            let spec = config.model.spec_mut(kind);
            overlay(&lookup, &format!("IMPACT_WEIGHT_{upper}"), &mut spec.weight)?;
            overlay(&lookup, &format!("IMPACT_MAX_{upper}"), &mut spec.max)?;
        }

        config.validate()?;
        Ok(config)
    }
}

fn overlay<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    target: &mut T,
) -> Result<()>
where
    T::Err: std::fmt::Display,
{
    if let Some(raw) = lookup(key) {
        *target = raw
            .trim()
            .parse()
            .map_err(|e| EngineError::Configuration(format!("{key}: {e}")))?;
    }
    Ok(())
}

fn invalid(message: &str) -> EngineError {
    EngineError::Configuration(message.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.history_capacity, 90);
        assert_eq!(config.upstream_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_env_overlay() {
        let config = EngineConfig::from_lookup(lookup_from(&[
            ("IMPACT_SCORE_STALENESS_SECS", "600"),
            ("IMPACT_RANK_PERIOD", "monthly"),
            ("IMPACT_WEIGHT_GAMING", "0.4"),
            ("IMPACT_WEIGHT_DONATION", "0.4"),
        ]))
        .unwrap();

        assert_eq!(config.score_staleness_secs, 600);
        assert_eq!(config.rank_period, LeaderboardPeriod::Monthly);
        assert_eq!(config.model.weight(ComponentKind::Gaming), 0.4);
    }

    #[test]
    fn test_rejects_bad_weights_and_zero_capacity() {
        let err = EngineConfig::from_lookup(lookup_from(&[("IMPACT_WEIGHT_SOCIAL", "0.5")]));
        assert!(matches!(err, Err(EngineError::Configuration(_))));

        let err = EngineConfig::from_lookup(lookup_from(&[("IMPACT_HISTORY_CAPACITY", "0")]));
        assert!(matches!(err, Err(EngineError::Configuration(_))));

        let err = EngineConfig::from_lookup(lookup_from(&[("IMPACT_LEADERBOARD_SIZE", "many")]));
        assert!(matches!(err, Err(EngineError::Configuration(_))));
    }
}
