use chrono::{DateTime, Duration, NaiveDate, Utc};
use std::collections::HashSet;
use uuid::Uuid;

use super::{Factor, SubScore, combine, guarded};
use crate::sources::{AchievementProgress, ActivitySources, GameSession, UpstreamResult};

const SESSION_WINDOW_DAYS: i64 = 30;
const CONSISTENCY_WINDOW_DAYS: i64 = 7;

pub(crate) struct GamingFacts {
    pub sessions: UpstreamResult<Vec<GameSession>>,
    pub achievements: UpstreamResult<AchievementProgress>,
}

pub(crate) async fn fetch(
    sources: &ActivitySources,
    participant_id: Uuid,
    now: DateTime<Utc>,
    timeout: std::time::Duration,
) -> GamingFacts {
    let from = now - Duration::days(SESSION_WINDOW_DAYS);
    let (sessions, achievements) = tokio::join!(
        guarded(
            "gameplay sessions",
            participant_id,
            timeout,
            sources.gameplay.sessions(participant_id, from, now),
        ),
        guarded(
            "gameplay achievements",
            participant_id,
            timeout,
            sources.gameplay.achievements(participant_id),
        ),
    );

    GamingFacts {
        sessions,
        achievements,
    }
}

fn active_days(sessions: &[GameSession], since: DateTime<Utc>) -> usize {
    sessions
        .iter()
        .filter(|s| s.started_at >= since)
        .map(|s| s.started_at.date_naive())
        .collect::<HashSet<NaiveDate>>()
        .len()
}

/// Average of the four gameplay factors, scaled by how many of the last
/// seven days had a session.
pub(crate) fn score(facts: &GamingFacts, now: DateTime<Utc>, max: f64) -> SubScore {
    let sessions = facts.sessions.as_ref().ok();

    let play_time = sessions.map(|s| {
        let days = active_days(s, now - Duration::days(SESSION_WINDOW_DAYS));
        days as f64 / SESSION_WINDOW_DAYS as f64 * 1000.0
    });
    let variety = sessions.map(|s| {
        let games: HashSet<&str> = s.iter().map(|g| g.game_id.as_str()).collect();
        games.len() as f64 * 100.0
    });
    let tournaments = sessions.map(|s| s.iter().filter(|g| g.tournament).count() as f64 * 50.0);
    let achievements = facts.achievements.as_ref().ok().map(|a| {
        if a.available == 0 {
            0.0
        } else {
            f64::from(a.unlocked) / f64::from(a.available) * 1000.0
        }
    });

    let multiplier = sessions.map(|s| {
        let days = active_days(s, now - Duration::days(CONSISTENCY_WINDOW_DAYS));
        0.8 + 0.4 * (days.min(CONSISTENCY_WINDOW_DAYS as usize) as f64 / 7.0)
    });

    combine(
        &[
            Factor::new("play_time", play_time, 0.25),
            Factor::new("game_variety", variety, 0.25),
            Factor::new("tournaments", tournaments, 0.25),
            Factor::new("achievements", achievements, 0.25),
        ],
        ("consistency_multiplier", multiplier),
        max,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::UpstreamError;
    use crate::testing::sessions_on_days;

    #[test]
    fn test_gaming_factors() {
        let now = Utc::now();
        let mut sessions = sessions_on_days(now, &[0, 1, 2, 3, 4, 5, 6, 20, 21, 22]);
        sessions[0].tournament = true;
        sessions[1].game_id = "chess".into();

        let facts = GamingFacts {
            sessions: Ok(sessions),
            achievements: Ok(AchievementProgress {
                unlocked: 5,
                available: 10,
            }),
        };
        let sub = score(&facts, now, 1000.0);

        assert_eq!(sub.detail.factor("play_time"), Some(333.33));
        assert_eq!(sub.detail.factor("game_variety"), Some(200.0));
        assert_eq!(sub.detail.factor("tournaments"), Some(50.0));
        assert_eq!(sub.detail.factor("achievements"), Some(500.0));
        assert_eq!(sub.detail.multiplier, 1.2);
        // (333.33 + 200 + 50 + 500) / 4 * 1.2
        assert_eq!(sub.value, 325.0);
    }

    #[test]
    fn test_no_sessions_gives_minimum_multiplier() {
        let facts = GamingFacts {
            sessions: Ok(Vec::new()),
            achievements: Ok(AchievementProgress::default()),
        };
        let sub = score(&facts, Utc::now(), 1000.0);
        assert_eq!(sub.value, 0.0);
        assert_eq!(sub.detail.multiplier, 0.8);
        assert!(!sub.detail.is_degraded());
    }

    #[test]
    fn test_failed_achievements_only_degrade_that_factor() {
        let now = Utc::now();
        let facts = GamingFacts {
            sessions: Ok(sessions_on_days(now, &[0])),
            achievements: Err(UpstreamError::unavailable("achievements", "503")),
        };
        let sub = score(&facts, now, 1000.0);
        assert_eq!(sub.detail.degraded, vec!["achievements".to_string()]);
        assert!(sub.value > 0.0);
    }
}
