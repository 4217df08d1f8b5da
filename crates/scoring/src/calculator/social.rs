use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use super::{Factor, SubScore, combine, guarded};
use crate::sources::{ActivitySources, SocialActivity, UpstreamResult};

const ACTIVITY_WINDOW_DAYS: i64 = 30;
const ENGAGEMENT_WINDOW_DAYS: i64 = 7;

pub(crate) struct SocialFacts {
    pub activity: UpstreamResult<SocialActivity>,
    pub recent_interactions: UpstreamResult<u32>,
}

pub(crate) async fn fetch(
    sources: &ActivitySources,
    participant_id: Uuid,
    now: DateTime<Utc>,
    timeout: std::time::Duration,
) -> SocialFacts {
    let (activity, recent_interactions) = tokio::join!(
        guarded(
            "social activity",
            participant_id,
            timeout,
            sources
                .social
                .social_activity(participant_id, now - Duration::days(ACTIVITY_WINDOW_DAYS)),
        ),
        guarded(
            "social interactions",
            participant_id,
            timeout,
            sources
                .social
                .interaction_count(participant_id, now - Duration::days(ENGAGEMENT_WINDOW_DAYS)),
        ),
    );

    SocialFacts {
        activity,
        recent_interactions,
    }
}

fn engagement_multiplier(interactions: u32) -> f64 {
    match interactions {
        10.. => 1.15,
        5..=9 => 1.10,
        1..=4 => 1.05,
        0 => 0.95,
    }
}

pub(crate) fn score(facts: &SocialFacts, max: f64) -> SubScore {
    let activity = facts.activity.as_ref().ok();

    combine(
        &[
            Factor::new(
                "friends",
                activity.map(|a| f64::from(a.friend_count) * 20.0),
                0.3,
            ),
            Factor::new(
                "challenges",
                activity.map(|a| f64::from(a.challenges_completed) * 50.0),
                0.3,
            ),
            Factor::new(
                "community",
                activity.map(|a| f64::from(a.community_contributions) * 25.0),
                0.2,
            ),
            Factor::new("sharing", activity.map(|a| f64::from(a.shares) * 40.0), 0.2),
        ],
        (
            "engagement_multiplier",
            facts
                .recent_interactions
                .as_ref()
                .ok()
                .map(|&n| engagement_multiplier(n)),
        ),
        max,
    )
}
