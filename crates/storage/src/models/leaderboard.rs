use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::{
    ComponentScores, LeaderboardCategory, LeaderboardKey, LeaderboardPeriod, ProfileSnapshot,
    round2,
};
use crate::error::ScoreError;

pub const MAX_PAGE_SIZE: u32 = 100;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct LeaderboardEntry {
    pub participant_id: Uuid,
    pub score: f64,
    pub rank: i64,
    pub display_name: String,
    pub profile: ProfileSnapshot,
    pub breakdown: ComponentScores,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct LeaderboardMetadata {
    pub count: usize,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub range: f64,
}

impl LeaderboardMetadata {
    fn from_entries(entries: &[LeaderboardEntry]) -> Self {
        if entries.is_empty() {
            return Self::default();
        }

        let (min, max, sum) = entries.iter().fold(
            (f64::INFINITY, f64::NEG_INFINITY, 0.0),
            |(min, max, sum), e| (min.min(e.score), max.max(e.score), sum + e.score),
        );

        Self {
            count: entries.len(),
            min,
            max,
            mean: round2(sum / entries.len() as f64),
            range: round2(max - min),
        }
    }
}

/// Ranked, descending sequence of entries for one (category, period).
///
/// Every mutation that reorders entries works on a staged copy and swaps it
/// in once ranks and metadata are consistent, so readers never observe a
/// half-sorted board.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Leaderboard {
    pub category: LeaderboardCategory,
    pub period: LeaderboardPeriod,
    entries: Vec<LeaderboardEntry>,
    metadata: LeaderboardMetadata,
    pub last_refreshed: Option<DateTime<Utc>>,
}

impl Leaderboard {
    pub fn new(category: LeaderboardCategory, period: LeaderboardPeriod) -> Self {
        Self {
            category,
            period,
            entries: Vec::new(),
            metadata: LeaderboardMetadata::default(),
            last_refreshed: None,
        }
    }

    /// Rebuilds a board from scratch: insert everything, resort once.
    pub fn rebuild(
        key: LeaderboardKey,
        entries: impl IntoIterator<Item = LeaderboardEntry>,
        refreshed_at: DateTime<Utc>,
    ) -> Result<Self, ScoreError> {
        let mut board = Self::new(key.category, key.period);
        for entry in entries {
            board.insert_or_update(entry)?;
        }
        board.resort();
        board.last_refreshed = Some(refreshed_at);
        Ok(board)
    }

    /// Restores a persisted board, re-deriving ranks and metadata.
    pub fn restore(
        key: LeaderboardKey,
        entries: Vec<LeaderboardEntry>,
        last_refreshed: Option<DateTime<Utc>>,
    ) -> Self {
        let mut board = Self::new(key.category, key.period);
        board.entries = entries;
        board.last_refreshed = last_refreshed;
        board.resort();
        board
    }

    pub fn key(&self) -> LeaderboardKey {
        LeaderboardKey::new(self.category, self.period)
    }

    pub fn entries(&self) -> &[LeaderboardEntry] {
        &self.entries
    }

    pub fn metadata(&self) -> &LeaderboardMetadata {
        &self.metadata
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Replaces the participant's entry in place or appends it.
    ///
    /// Ranks are not touched; call [`Leaderboard::resort`] afterwards.
    pub fn insert_or_update(&mut self, entry: LeaderboardEntry) -> Result<(), ScoreError> {
        if !entry.score.is_finite() || entry.score < 0.0 {
            return Err(ScoreError::InvalidValue(format!(
                "leaderboard score must be a non-negative number, got {}",
                entry.score
            )));
        }

        match self
            .entries
            .iter_mut()
            .find(|e| e.participant_id == entry.participant_id)
        {
            Some(existing) => *existing = entry,
            None => self.entries.push(entry),
        }
        Ok(())
    }

    /// Stable descending sort by score; ties keep insertion order.
    /// Reassigns contiguous 1-based ranks and recomputes metadata.
    pub fn resort(&mut self) {
        let mut staged = self.entries.clone();
        staged.sort_by(|a, b| b.score.total_cmp(&a.score));
        for (position, entry) in staged.iter_mut().enumerate() {
            entry.rank = position as i64 + 1;
        }
        let metadata = LeaderboardMetadata::from_entries(&staged);

        self.entries = staged;
        self.metadata = metadata;
    }

    pub fn recompute_metadata(&mut self) {
        self.metadata = LeaderboardMetadata::from_entries(&self.entries);
    }

    /// Insert-or-update, resort and optional truncation as one mutation.
    pub fn upsert_entry(
        &mut self,
        entry: LeaderboardEntry,
        capacity: Option<usize>,
    ) -> Result<(), ScoreError> {
        let mut staged = self.clone();
        staged.insert_or_update(entry)?;
        staged.resort();
        if let Some(capacity) = capacity
            && staged.entries.len() > capacity
        {
            staged.entries.truncate(capacity);
            staged.recompute_metadata();
        }

        *self = staged;
        Ok(())
    }

    /// Removes a participant and re-ranks the remaining entries.
    pub fn remove(&mut self, participant_id: Uuid) -> bool {
        let before = self.entries.len();
        let mut staged = self.clone();
        staged.entries.retain(|e| e.participant_id != participant_id);
        if staged.entries.len() == before {
            return false;
        }
        staged.resort();
        *self = staged;
        true
    }

    pub fn position_of(&self, participant_id: Uuid) -> Option<&LeaderboardEntry> {
        self.entries
            .iter()
            .find(|e| e.participant_id == participant_id)
    }

    /// Share of the board ranked at or below the participant, in percent.
    pub fn percentile_of(&self, participant_id: Uuid) -> Result<f64, ScoreError> {
        let entry = self
            .position_of(participant_id)
            .ok_or(ScoreError::ParticipantNotFound(participant_id))?;
        Ok(percentile(entry.rank, self.entries.len() as i64))
    }

    /// 1-based page of entries. Pages past the end are empty.
    pub fn paginate(&self, page: u32, page_size: u32) -> Result<&[LeaderboardEntry], ScoreError> {
        validate_page(page, page_size)?;

        let start = ((page - 1) as usize).saturating_mul(page_size as usize);
        if start >= self.entries.len() {
            return Ok(&[]);
        }
        let end = (start + page_size as usize).min(self.entries.len());
        Ok(&self.entries[start..end])
    }

    pub fn top(&self, limit: usize) -> &[LeaderboardEntry] {
        &self.entries[..limit.min(self.entries.len())]
    }

    /// Empties the board, e.g. on period rollover.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.metadata = LeaderboardMetadata::default();
        self.last_refreshed = None;
    }

    pub fn is_stale(&self, threshold_seconds: i64, now: DateTime<Utc>) -> bool {
        match self.last_refreshed {
            Some(at) => now - at > Duration::seconds(threshold_seconds),
            None => true,
        }
    }
}

pub fn percentile(rank: i64, count: i64) -> f64 {
    if count <= 0 || rank <= 0 {
        return 0.0;
    }
    round2((count - rank + 1) as f64 / count as f64 * 100.0)
}

pub fn validate_page(page: u32, page_size: u32) -> Result<(), ScoreError> {
    if page < 1 {
        return Err(ScoreError::InvalidPage("page must be >= 1".to_string()));
    }
    if page_size < 1 || page_size > MAX_PAGE_SIZE {
        return Err(ScoreError::InvalidPage(format!(
            "page_size must be between 1 and {MAX_PAGE_SIZE}"
        )));
    }
    Ok(())
}
