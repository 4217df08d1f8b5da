//! Turns authoritative scores into participant-visible leaderboard entries.

use chrono::{DateTime, Utc};
use storage::dto::score::{ComponentView, ScoreView};
use storage::models::{
    ComponentKind, ImpactScore, LeaderboardCategory, LeaderboardEntry, ParticipantProfile,
    ScoreModel, fallback_display_name, percentile, round2,
};
use storage::repository::RankedRecord;
use uuid::Uuid;

/// Participants without a profile have not opted out.
pub(crate) fn is_eligible(profile: Option<&ParticipantProfile>) -> bool {
    profile.is_none_or(|p| p.leaderboard_participation)
}

fn display_name(participant_id: Uuid, profile: Option<&ParticipantProfile>) -> String {
    profile
        .map(|p| p.display_name.trim())
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| fallback_display_name(participant_id))
}

/// Unranked entry; the owning leaderboard assigns the rank on resort.
pub(crate) fn entry_for_score(
    score: &ImpactScore,
    category: LeaderboardCategory,
    profile: Option<&ParticipantProfile>,
) -> LeaderboardEntry {
    LeaderboardEntry {
        participant_id: score.participant_id,
        score: score.score_for(category),
        rank: 0,
        display_name: display_name(score.participant_id, profile),
        profile: profile.map(ParticipantProfile::snapshot).unwrap_or_default(),
        breakdown: score.components(),
    }
}

pub(crate) fn entry_for_record(record: &RankedRecord) -> LeaderboardEntry {
    let profile = record.profile.as_ref();
    LeaderboardEntry {
        participant_id: record.participant_id,
        score: record.score,
        rank: 0,
        display_name: display_name(record.participant_id, profile),
        profile: profile.map(ParticipantProfile::snapshot).unwrap_or_default(),
        breakdown: record.components,
    }
}

/// Eligible entries of a top-N query, in query order.
pub(crate) fn eligible_entries(records: &[RankedRecord]) -> Vec<LeaderboardEntry> {
    records
        .iter()
        .filter(|r| is_eligible(r.profile.as_ref()))
        .map(entry_for_record)
        .collect()
}

pub(crate) fn score_view(
    score: &ImpactScore,
    model: &ScoreModel,
    population: i64,
    staleness_secs: i64,
    now: DateTime<Utc>,
) -> ScoreView {
    let components = ComponentKind::ALL
        .into_iter()
        .map(|kind| {
            let value = score.component(kind);
            ComponentView {
                kind,
                value,
                max: model.max(kind),
                weight: model.weight(kind),
                weighted: round2(value * model.weight(kind)),
                detail: score.detail(kind).clone(),
            }
        })
        .collect();

    ScoreView {
        participant_id: score.participant_id,
        total: score.total(),
        components,
        global_rank: score.global_rank,
        period_rank: score.period_rank,
        percentile: score.global_rank.map(|rank| percentile(rank, population)),
        trend_7d: score.trend(7, now).ok(),
        trend_30d: score.trend(30, now).ok(),
        last_calculated: score.last_calculated,
        is_stale: score.is_stale(staleness_secs, now),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use storage::models::{ComponentDetail, ComponentScores};

    fn profile(id: Uuid, name: &str, participating: bool) -> ParticipantProfile {
        ParticipantProfile {
            participant_id: id,
            display_name: name.to_string(),
            avatar_url: Some("https://cdn.example/a.png".into()),
            level: Some(12),
            country: Some("FR".into()),
            leaderboard_participation: participating,
        }
    }

    fn record(profile: Option<ParticipantProfile>, score: f64) -> RankedRecord {
        RankedRecord {
            participant_id: profile
                .as_ref()
                .map_or_else(Uuid::new_v4, |p| p.participant_id),
            score,
            total: score,
            components: ComponentScores::default(),
            profile,
        }
    }

    #[test]
    fn test_opted_out_records_are_filtered() {
        let visible = Uuid::new_v4();
        let hidden = Uuid::new_v4();
        let records = vec![
            record(Some(profile(hidden, "hidden", false)), 900.0),
            record(Some(profile(visible, "visible", true)), 500.0),
            record(None, 100.0),
        ];

        let entries = eligible_entries(&records);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].participant_id, visible);
        assert_eq!(entries[0].profile.level, Some(12));
        assert!(entries[1].display_name.starts_with("Participant "));
    }

    #[test]
    fn test_blank_display_name_falls_back() {
        let id = Uuid::new_v4();
        let p = profile(id, "   ", true);
        assert_eq!(display_name(id, Some(&p)), fallback_display_name(id));
    }

    #[test]
    fn test_score_view_percentile_and_components() {
        let now = Utc::now();
        let model = ScoreModel::default();
        let mut score = ImpactScore::new(Uuid::new_v4(), 10, now);
        score
            .set_component(&model, ComponentKind::Gaming, 600.0, ComponentDetail::default())
            .unwrap();
        score.global_rank = Some(1);
        score.mark_calculated(now);

        let view = score_view(&score, &model, 4, 3600, now);
        assert_eq!(view.percentile, Some(100.0));
        assert_eq!(view.components.len(), 3);
        assert_eq!(view.components[0].weighted, 180.0);
        assert!(view.trend_7d.is_none());
        assert!(!view.is_stale);
    }
}
