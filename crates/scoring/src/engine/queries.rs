use chrono::Utc;
use std::collections::HashMap;
use storage::dto::common::PaginationMeta;
use storage::dto::leaderboard::{LeaderboardView, RequesterPosition};
use storage::dto::score::ScoreView;
use storage::models::{
    Leaderboard, LeaderboardCategory, LeaderboardEntry, LeaderboardKey, LeaderboardPeriod,
    MAX_PAGE_SIZE, ParticipantProfile, validate_page,
};
use uuid::Uuid;

use super::{RankingEngine, assembly};
use crate::calculator::guarded;
use crate::error::{EngineError, Result};

impl RankingEngine {
    /// Current score of a participant, recomputed when stale or forced.
    /// A participant without a score gets one computed on first request.
    pub async fn get_score(&self, participant_id: Uuid, force_refresh: bool) -> Result<ScoreView> {
        let now = Utc::now();
        let calculation = self
            .calculator()
            .calculate(participant_id, force_refresh)
            .await?;
        let mut score = calculation.score;

        if !calculation.from_cache {
            self.refresh_ranks(&mut score, now).await;
            self.calculator().persist(&score).await?;
        }

        let population = self.repo().count_scores().await?;
        Ok(assembly::score_view(
            &score,
            &self.config().model,
            population,
            self.config().score_staleness_secs,
            now,
        ))
    }

    /// One page of a leaderboard, built lazily on first request. When a
    /// requester is given, their own entry and percentile are included.
    pub async fn get_leaderboard(
        &self,
        category: LeaderboardCategory,
        period: LeaderboardPeriod,
        requester: Option<Uuid>,
        page: u32,
        page_size: u32,
    ) -> Result<LeaderboardView> {
        validate_page(page, page_size)?;
        let board = self
            .load_or_build(LeaderboardKey::new(category, period))
            .await?;
        Ok(page_view(&board, Some(category), requester, page, page_size)?)
    }

    /// Requester plus their friends, ranked by total. Assembled on every call
    /// and never stored; the privacy flag does not apply here.
    pub async fn get_friends_leaderboard(
        &self,
        participant_id: Uuid,
        page: u32,
        page_size: u32,
    ) -> Result<LeaderboardView> {
        validate_page(page, page_size)?;

        let social = self.calculator().sources().social.clone();
        let mut ids = guarded(
            "social friends",
            participant_id,
            self.config().upstream_timeout(),
            social.friend_ids(participant_id),
        )
        .await
        .unwrap_or_default();
        ids.push(participant_id);
        ids.sort();
        ids.dedup();

        let scores = self.repo().get_scores(&ids).await?;
        let profiles: HashMap<Uuid, ParticipantProfile> = self
            .repo()
            .get_participants(&ids)
            .await?
            .into_iter()
            .map(|p| (p.participant_id, p))
            .collect();

        let key = LeaderboardKey::new(LeaderboardCategory::Overall, LeaderboardPeriod::AllTime);
        let entries = scores.iter().map(|score| {
            assembly::entry_for_score(
                score,
                key.category,
                profiles.get(&score.participant_id),
            )
        });
        let board = Leaderboard::rebuild(key, entries, Utc::now())?;

        Ok(page_view(
            &board,
            None,
            Some(participant_id),
            page,
            page_size,
        )?)
    }

    pub async fn get_top_performers(
        &self,
        category: LeaderboardCategory,
        period: LeaderboardPeriod,
        limit: u32,
    ) -> Result<Vec<LeaderboardEntry>> {
        if limit == 0 || limit > MAX_PAGE_SIZE {
            return Err(EngineError::Validation(format!(
                "limit must be between 1 and {MAX_PAGE_SIZE}"
            )));
        }
        let board = self
            .load_or_build(LeaderboardKey::new(category, period))
            .await?;
        Ok(board.top(limit as usize).to_vec())
    }

    /// Opting out removes the participant from every stored leaderboard;
    /// opting back in re-propagates the current score. Participants without a
    /// profile get a placeholder one so the choice is recorded. Returns the
    /// number of boards touched.
    pub async fn update_privacy_participation(
        &self,
        participant_id: Uuid,
        enabled: bool,
    ) -> Result<usize> {
        let profile = self
            .repo()
            .set_leaderboard_participation(participant_id, enabled)
            .await?;
        tracing::info!(%participant_id, enabled, "Leaderboard participation updated");

        if !enabled {
            return self.purge_from_boards(participant_id).await;
        }

        let Some(score) = self.repo().get_score(participant_id).await? else {
            return Ok(0);
        };
        let mut report = super::TriggerReport {
            participant_id,
            phase: super::EnginePhase::Propagating,
            total: score.total(),
            global_rank: score.global_rank,
            period_rank: score.period_rank,
            eligible: true,
            boards_updated: 0,
            boards_removed: 0,
            boards_failed: 0,
        };
        self.propagate(&score, Some(&profile), Utc::now(), &mut report)
            .await;
        Ok(report.boards_updated)
    }

    /// Hard-deletes the score and purges the participant from every board.
    pub async fn erase_participant(&self, participant_id: Uuid) -> Result<bool> {
        let existed = self.repo().delete_score(participant_id).await?;
        let purged = self.purge_from_boards(participant_id).await?;
        tracing::info!(%participant_id, existed, purged, "Participant erased");
        Ok(existed || purged > 0)
    }

    async fn purge_from_boards(&self, participant_id: Uuid) -> Result<usize> {
        let mut removed = 0;
        for key in LeaderboardKey::all() {
            if self.remove_from(key, participant_id).await? {
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Empties one stored leaderboard. The next read or reconciliation pass
    /// rebuilds it.
    pub async fn reset_leaderboard(
        &self,
        category: LeaderboardCategory,
        period: LeaderboardPeriod,
    ) -> Result<()> {
        let key = LeaderboardKey::new(category, period);
        let _guard = self.inner.locks.acquire(key).await;

        let mut board = self
            .repo()
            .get_leaderboard(category, period)
            .await?
            .unwrap_or_else(|| Leaderboard::new(category, period));
        board.clear();
        self.repo().upsert_leaderboard(&board).await?;

        tracing::info!(leaderboard = %key, "Leaderboard reset");
        Ok(())
    }

    /// Clears every category's board for `period` at the start of a new window.
    pub async fn rollover_period(&self, period: LeaderboardPeriod) -> Result<usize> {
        if period == LeaderboardPeriod::AllTime {
            return Err(EngineError::Validation(
                "all-time leaderboards do not roll over".to_string(),
            ));
        }
        for category in LeaderboardCategory::ALL {
            self.reset_leaderboard(category, period).await?;
        }
        Ok(LeaderboardCategory::ALL.len())
    }
}

fn page_view(
    board: &Leaderboard,
    category: Option<LeaderboardCategory>,
    requester: Option<Uuid>,
    page: u32,
    page_size: u32,
) -> std::result::Result<LeaderboardView, storage::error::ScoreError> {
    let entries = board.paginate(page, page_size)?.to_vec();
    let requester = requester.and_then(|id| {
        let entry = board.position_of(id)?.clone();
        let percentile = board.percentile_of(id).ok()?;
        Some(RequesterPosition { entry, percentile })
    });

    Ok(LeaderboardView {
        category,
        period: board.period,
        entries,
        pagination: PaginationMeta::new(page, page_size, board.len() as i64),
        metadata: *board.metadata(),
        requester,
        last_refreshed: board.last_refreshed,
    })
}
