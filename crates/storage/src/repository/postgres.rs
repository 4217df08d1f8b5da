use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::types::Json;
use sqlx::{FromRow, PgPool, QueryBuilder};
use uuid::Uuid;

use super::{RankedRecord, ScoreRepository};
use crate::error::{Result, StorageError};
use crate::models::{
    ComponentScores, ImpactScore, Leaderboard, LeaderboardCategory, LeaderboardEntry,
    LeaderboardKey, LeaderboardPeriod, ParticipantProfile, fallback_display_name,
};

#[derive(FromRow)]
struct ScoreRow {
    global_rank: Option<i64>,
    period_rank: Option<i64>,
    document: Json<ImpactScore>,
}

impl ScoreRow {
    /// Rank columns are rewritten in bulk by SQL, so they win over the document.
    fn into_score(self) -> ImpactScore {
        let mut score = self.document.0;
        score.global_rank = self.global_rank;
        score.period_rank = self.period_rank;
        score
    }
}

#[derive(FromRow)]
struct LeaderboardRow {
    category: String,
    period: String,
    entries: Json<Vec<LeaderboardEntry>>,
    last_refreshed: Option<DateTime<Utc>>,
}

impl TryFrom<LeaderboardRow> for Leaderboard {
    type Error = StorageError;

    fn try_from(row: LeaderboardRow) -> Result<Self> {
        let key = parse_key(&row.category, &row.period)?;
        Ok(Leaderboard::restore(key, row.entries.0, row.last_refreshed))
    }
}

#[derive(FromRow)]
struct KeyRow {
    category: String,
    period: String,
}

#[derive(FromRow)]
struct RankedRow {
    participant_id: Uuid,
    score: Decimal,
    total: Decimal,
    gaming: Decimal,
    social: Decimal,
    donation: Decimal,
    display_name: Option<String>,
    avatar_url: Option<String>,
    level: Option<i32>,
    country: Option<String>,
    leaderboard_participation: Option<bool>,
}

impl From<RankedRow> for RankedRecord {
    fn from(row: RankedRow) -> Self {
        let profile = row.display_name.map(|display_name| ParticipantProfile {
            participant_id: row.participant_id,
            display_name,
            avatar_url: row.avatar_url,
            level: row.level,
            country: row.country,
            leaderboard_participation: row.leaderboard_participation.unwrap_or(true),
        });

        RankedRecord {
            participant_id: row.participant_id,
            score: decimal_to_f64(row.score),
            total: decimal_to_f64(row.total),
            components: ComponentScores {
                gaming: decimal_to_f64(row.gaming),
                social: decimal_to_f64(row.social),
                donation: decimal_to_f64(row.donation),
            },
            profile,
        }
    }
}

#[derive(Clone)]
pub struct PgScoreRepository {
    pool: PgPool,
}

impl PgScoreRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ScoreRepository for PgScoreRepository {
    async fn get_score(&self, participant_id: Uuid) -> Result<Option<ImpactScore>> {
        let row = sqlx::query_as::<_, ScoreRow>(
            r#"
            SELECT global_rank, period_rank, document
            FROM impact_scores
            WHERE participant_id = $1
            "#,
        )
        .bind(participant_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(ScoreRow::into_score))
    }

    async fn get_scores(&self, participant_ids: &[Uuid]) -> Result<Vec<ImpactScore>> {
        let rows = sqlx::query_as::<_, ScoreRow>(
            r#"
            SELECT global_rank, period_rank, document
            FROM impact_scores
            WHERE participant_id = ANY($1)
            "#,
        )
        .bind(participant_ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(ScoreRow::into_score).collect())
    }

    async fn upsert_score(&self, score: &ImpactScore) -> Result<bool> {
        let components = score.components();

        let result = sqlx::query(
            r#"
            INSERT INTO impact_scores (
                participant_id, total, gaming, social, donation,
                global_rank, period_rank, last_calculated, last_activity_at, document
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (participant_id)
            DO UPDATE SET
                total = EXCLUDED.total,
                gaming = EXCLUDED.gaming,
                social = EXCLUDED.social,
                donation = EXCLUDED.donation,
                global_rank = EXCLUDED.global_rank,
                period_rank = EXCLUDED.period_rank,
                last_calculated = EXCLUDED.last_calculated,
                last_activity_at = EXCLUDED.last_activity_at,
                document = EXCLUDED.document,
                updated_at = CURRENT_TIMESTAMP
            "#,
        )
        .bind(score.participant_id)
        .bind(f64_to_decimal(score.total()))
        .bind(f64_to_decimal(components.gaming))
        .bind(f64_to_decimal(components.social))
        .bind(f64_to_decimal(components.donation))
        .bind(score.global_rank)
        .bind(score.period_rank)
        .bind(score.last_calculated)
        .bind(score.last_activity_at)
        .bind(Json(score))
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_score(&self, participant_id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM impact_scores WHERE participant_id = $1")
            .bind(participant_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn count_with_score_greater_than(
        &self,
        threshold: f64,
        active_since: Option<DateTime<Utc>>,
    ) -> Result<i64> {
        let mut query = QueryBuilder::new("SELECT COUNT(*) FROM impact_scores WHERE total > ");
        query.push_bind(f64_to_decimal(threshold));

        if let Some(start) = active_since {
            query.push(" AND last_activity_at >= ");
            query.push_bind(start);
        }

        let count = query
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    async fn recompute_all_ranks(&self, active_since: Option<DateTime<Utc>>) -> Result<u64> {
        let result = sqlx::query(
            r#"
            WITH global_ranked AS (
                SELECT participant_id, RANK() OVER (ORDER BY total DESC) AS global_rank
                FROM impact_scores
            ),
            period_ranked AS (
                SELECT participant_id, RANK() OVER (ORDER BY total DESC) AS period_rank
                FROM impact_scores
                WHERE $1::timestamptz IS NULL OR last_activity_at >= $1::timestamptz
            )
            UPDATE impact_scores s
            SET global_rank = g.global_rank,
                period_rank = p.period_rank
            FROM global_ranked g
            LEFT JOIN period_ranked p ON p.participant_id = g.participant_id
            WHERE s.participant_id = g.participant_id
            "#,
        )
        .bind(active_since)
        .execute(&self.pool)
        .await?;

        tracing::debug!(rows = result.rows_affected(), "Recomputed stored ranks");
        Ok(result.rows_affected())
    }

    async fn count_scores(&self) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM impact_scores")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn count_stale_scores(&self, threshold_seconds: i64) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*)
            FROM impact_scores
            WHERE last_calculated IS NULL
               OR last_calculated < NOW() - make_interval(secs => $1)
            "#,
        )
        .bind(threshold_seconds as f64)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    async fn top_n_by_category(
        &self,
        category: LeaderboardCategory,
        period: LeaderboardPeriod,
        n: usize,
    ) -> Result<Vec<RankedRecord>> {
        let mut query = QueryBuilder::new("SELECT s.participant_id, ");
        query.push(category_column(category));
        query.push(
            r#" AS score,
                   s.total, s.gaming, s.social, s.donation,
                   p.display_name, p.avatar_url, p.level, p.country,
                   p.leaderboard_participation
            FROM impact_scores s
            LEFT JOIN participants p ON p.participant_id = s.participant_id
            WHERE 1=1
            "#,
        );

        if let Some(start) = period.window_start(Utc::now()) {
            query.push(" AND s.last_activity_at >= ");
            query.push_bind(start);
        }

        query.push(" ORDER BY score DESC, s.participant_id LIMIT ");
        query.push_bind(n as i64);

        let rows: Vec<RankedRow> = query.build_query_as().fetch_all(&self.pool).await?;

        Ok(rows.into_iter().map(RankedRecord::from).collect())
    }

    async fn get_participant(&self, participant_id: Uuid) -> Result<Option<ParticipantProfile>> {
        let profile = sqlx::query_as::<_, ParticipantProfile>(
            r#"
            SELECT participant_id, display_name, avatar_url, level, country,
                   leaderboard_participation
            FROM participants
            WHERE participant_id = $1
            "#,
        )
        .bind(participant_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(profile)
    }

    async fn get_participants(&self, participant_ids: &[Uuid]) -> Result<Vec<ParticipantProfile>> {
        let profiles = sqlx::query_as::<_, ParticipantProfile>(
            r#"
            SELECT participant_id, display_name, avatar_url, level, country,
                   leaderboard_participation
            FROM participants
            WHERE participant_id = ANY($1)
            "#,
        )
        .bind(participant_ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(profiles)
    }

    async fn set_leaderboard_participation(
        &self,
        participant_id: Uuid,
        enabled: bool,
    ) -> Result<ParticipantProfile> {
        let profile = sqlx::query_as::<_, ParticipantProfile>(
            r#"
            INSERT INTO participants (participant_id, display_name, leaderboard_participation)
            VALUES ($1, $2, $3)
            ON CONFLICT (participant_id)
            DO UPDATE SET leaderboard_participation = EXCLUDED.leaderboard_participation
            RETURNING participant_id, display_name, avatar_url, level, country,
                      leaderboard_participation
            "#,
        )
        .bind(participant_id)
        .bind(fallback_display_name(participant_id))
        .bind(enabled)
        .fetch_one(&self.pool)
        .await?;

        Ok(profile)
    }

    async fn get_leaderboard(
        &self,
        category: LeaderboardCategory,
        period: LeaderboardPeriod,
    ) -> Result<Option<Leaderboard>> {
        let row = sqlx::query_as::<_, LeaderboardRow>(
            r#"
            SELECT category, period, entries, last_refreshed
            FROM leaderboards
            WHERE category = $1 AND period = $2
            "#,
        )
        .bind(category.as_str())
        .bind(period.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Leaderboard::try_from).transpose()
    }

    async fn upsert_leaderboard(&self, leaderboard: &Leaderboard) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO leaderboards (category, period, entries, entry_count, last_refreshed)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (category, period)
            DO UPDATE SET
                entries = EXCLUDED.entries,
                entry_count = EXCLUDED.entry_count,
                last_refreshed = EXCLUDED.last_refreshed,
                updated_at = CURRENT_TIMESTAMP
            "#,
        )
        .bind(leaderboard.category.as_str())
        .bind(leaderboard.period.as_str())
        .bind(Json(leaderboard.entries()))
        .bind(leaderboard.len() as i32)
        .bind(leaderboard.last_refreshed)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_stale_leaderboards(&self, threshold_seconds: i64) -> Result<Vec<LeaderboardKey>> {
        let rows = sqlx::query_as::<_, KeyRow>(
            r#"
            SELECT category, period
            FROM leaderboards
            WHERE last_refreshed IS NULL
               OR last_refreshed < NOW() - make_interval(secs => $1)
            ORDER BY category, period
            "#,
        )
        .bind(threshold_seconds as f64)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| parse_key(&row.category, &row.period))
            .collect()
    }

    async fn count_leaderboards(&self) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM leaderboards")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn remove_participant(
        &self,
        category: LeaderboardCategory,
        period: LeaderboardPeriod,
        participant_id: Uuid,
    ) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, LeaderboardRow>(
            r#"
            SELECT category, period, entries, last_refreshed
            FROM leaderboards
            WHERE category = $1 AND period = $2
            FOR UPDATE
            "#,
        )
        .bind(category.as_str())
        .bind(period.as_str())
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            return Ok(false);
        };
        let mut board = Leaderboard::try_from(row)?;
        if !board.remove(participant_id) {
            return Ok(false);
        }

        sqlx::query(
            r#"
            UPDATE leaderboards
            SET entries = $1, entry_count = $2, updated_at = CURRENT_TIMESTAMP
            WHERE category = $3 AND period = $4
            "#,
        )
        .bind(Json(board.entries()))
        .bind(board.len() as i32)
        .bind(category.as_str())
        .bind(period.as_str())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        tracing::debug!(%participant_id, %category, %period, "Removed leaderboard entry");
        Ok(true)
    }
}

fn category_column(category: LeaderboardCategory) -> &'static str {
    match category {
        LeaderboardCategory::Overall => "s.total",
        LeaderboardCategory::Gaming => "s.gaming",
        LeaderboardCategory::Social => "s.social",
        LeaderboardCategory::Donation => "s.donation",
    }
}

fn parse_key(category: &str, period: &str) -> Result<LeaderboardKey> {
    let category = category
        .parse()
        .map_err(|e: crate::error::ScoreError| StorageError::ConstraintViolation(e.to_string()))?;
    let period = period
        .parse()
        .map_err(|e: crate::error::ScoreError| StorageError::ConstraintViolation(e.to_string()))?;
    Ok(LeaderboardKey::new(category, period))
}

fn f64_to_decimal(value: f64) -> Decimal {
    Decimal::from_f64_retain(value)
        .unwrap_or_default()
        .round_dp(2)
}

fn decimal_to_f64(decimal: Decimal) -> f64 {
    decimal.to_string().parse().unwrap_or(0.0)
}
