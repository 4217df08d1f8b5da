use chrono::{DateTime, Utc};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use storage::models::{ComponentDetail, ComponentKind, ImpactScore, round2};
use storage::repository::ScoreRepository;
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::error::{EngineError, Result, UpstreamError};
use crate::sources::{ActivitySources, UpstreamResult};

mod donation;
mod gaming;
mod social;

/// Upper bound of every sub-factor, on the component scale.
pub(crate) const FACTOR_CAP: f64 = 1000.0;

/// One component value with the sub-factors that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct SubScore {
    pub value: f64,
    pub detail: ComponentDetail,
}

/// A named sub-factor. `None` means its upstream failed.
pub(crate) struct Factor {
    pub name: &'static str,
    pub value: Option<f64>,
    pub weight: f64,
}

impl Factor {
    pub fn new(name: &'static str, value: Option<f64>, weight: f64) -> Self {
        Self {
            name,
            value: value.map(|v| round2(v.clamp(0.0, FACTOR_CAP))),
            weight,
        }
    }
}

/// Weighted sum of the factors times the multiplier, capped at `max`.
///
/// Degraded factors count as zero; a missing multiplier is neutral.
pub(crate) fn combine(
    factors: &[Factor],
    multiplier: (&'static str, Option<f64>),
    max: f64,
) -> SubScore {
    let mut detail = ComponentDetail::default();
    let mut base = 0.0;

    for factor in factors {
        match factor.value {
            Some(value) => {
                base += value * factor.weight;
                detail.factors.insert(factor.name.to_string(), value);
            }
            None => {
                detail.factors.insert(factor.name.to_string(), 0.0);
                detail.degraded.push(factor.name.to_string());
            }
        }
    }

    let (multiplier_name, multiplier) = multiplier;
    detail.multiplier = match multiplier {
        Some(m) => round2(m),
        None => {
            detail.degraded.push(multiplier_name.to_string());
            1.0
        }
    };

    SubScore {
        value: round2((base * detail.multiplier).clamp(0.0, max)),
        detail,
    }
}

/// Runs an upstream query under `timeout`, logging failures.
pub(crate) async fn guarded<T>(
    source_name: &'static str,
    participant_id: Uuid,
    timeout: Duration,
    query: impl Future<Output = UpstreamResult<T>>,
) -> UpstreamResult<T> {
    let outcome = match tokio::time::timeout(timeout, query).await {
        Ok(result) => result,
        Err(_) => Err(UpstreamError::Timeout {
            source_name,
            millis: timeout.as_millis(),
        }),
    };

    if let Err(e) = &outcome {
        tracing::warn!(%participant_id, "Degrading sub-score: {}", e);
    }
    outcome
}

/// Result of [`ScoreCalculator::calculate`].
#[derive(Debug, Clone)]
pub struct Calculation {
    pub score: ImpactScore,
    /// `true` when a fresh cached score was returned without recomputing.
    pub from_cache: bool,
}

/// Turns domain facts into component scores and keeps the stored score current.
#[derive(Clone)]
pub struct ScoreCalculator {
    repo: Arc<dyn ScoreRepository>,
    sources: ActivitySources,
    config: Arc<EngineConfig>,
}

impl ScoreCalculator {
    pub fn new(
        repo: Arc<dyn ScoreRepository>,
        sources: ActivitySources,
        config: Arc<EngineConfig>,
    ) -> Self {
        Self {
            repo,
            sources,
            config,
        }
    }

    pub fn sources(&self) -> &ActivitySources {
        &self.sources
    }

    /// Returns the cached score while it is fresh, otherwise recomputes and
    /// persists it. `force` skips the cache.
    pub async fn calculate(&self, participant_id: Uuid, force: bool) -> Result<Calculation> {
        self.refresh(participant_id, force, None).await
    }

    /// Forced recompute that also stamps the participant's last activity.
    pub async fn calculate_for_activity(
        &self,
        participant_id: Uuid,
        activity_at: DateTime<Utc>,
    ) -> Result<ImpactScore> {
        let calculation = self.refresh(participant_id, true, Some(activity_at)).await?;
        Ok(calculation.score)
    }

    async fn refresh(
        &self,
        participant_id: Uuid,
        force: bool,
        activity_at: Option<DateTime<Utc>>,
    ) -> Result<Calculation> {
        let now = Utc::now();
        let existing = self.repo.get_score(participant_id).await?;

        if let Some(score) = &existing
            && !force
            && !score.is_stale(self.config.score_staleness_secs, now)
        {
            tracing::debug!(%participant_id, "Returning cached score");
            return Ok(Calculation {
                score: score.clone(),
                from_cache: true,
            });
        }

        let mut score = existing
            .unwrap_or_else(|| ImpactScore::new(participant_id, self.config.history_capacity, now));
        score.history.set_capacity(self.config.history_capacity);
        if let Some(at) = activity_at {
            score.record_activity(at);
        }

        self.recalculate(&mut score, now).await?;
        self.persist(&score).await?;

        Ok(Calculation {
            score,
            from_cache: false,
        })
    }

    /// Recomputes every component in place. Upstream failures degrade the
    /// affected sub-factors and never fail the computation.
    pub async fn recalculate(&self, score: &mut ImpactScore, now: DateTime<Utc>) -> Result<()> {
        let participant_id = score.participant_id;
        let timeout = self.config.upstream_timeout();
        let model = &self.config.model;

        let (gaming, social, donation) = tokio::join!(
            gaming::fetch(&self.sources, participant_id, now, timeout),
            social::fetch(&self.sources, participant_id, now, timeout),
            donation::fetch(&self.sources, participant_id, timeout),
        );

        let sub_scores = [
            (
                ComponentKind::Gaming,
                gaming::score(&gaming, now, model.max(ComponentKind::Gaming)),
            ),
            (
                ComponentKind::Social,
                social::score(&social, model.max(ComponentKind::Social)),
            ),
            (
                ComponentKind::Donation,
                donation::score(&donation, now, model.max(ComponentKind::Donation)),
            ),
        ];

        for (kind, sub) in sub_scores {
            score
                .set_component(model, kind, sub.value, sub.detail)
                .map_err(EngineError::from)?;
        }
        score.mark_calculated(now);

        tracing::debug!(
            %participant_id,
            total = score.total(),
            "Recalculated impact score"
        );
        Ok(())
    }

    /// Writes a computed score. On failure the score travels inside the error
    /// so this step alone can be retried.
    pub async fn persist(&self, score: &ImpactScore) -> Result<()> {
        match self.repo.upsert_score(score).await {
            Ok(_) => Ok(()),
            Err(e) => {
                tracing::error!(
                    participant_id = %score.participant_id,
                    "Failed to persist impact score: {}",
                    e
                );
                Err(EngineError::persistence(e, score.clone()))
            }
        }
    }
}
