use chrono::{DateTime, Datelike, Duration, Utc};
use std::collections::HashSet;
use uuid::Uuid;

use super::{Factor, SubScore, combine, guarded};
use crate::sources::{ActivitySources, Contribution, UpstreamResult};

const FREQUENCY_WINDOW_DAYS: i64 = 90;
const CONSISTENCY_WINDOW_MONTHS: i32 = 6;

pub(crate) struct DonationFacts {
    pub ledger: UpstreamResult<Vec<Contribution>>,
}

pub(crate) async fn fetch(
    sources: &ActivitySources,
    participant_id: Uuid,
    timeout: std::time::Duration,
) -> DonationFacts {
    let ledger = guarded(
        "contribution ledger",
        participant_id,
        timeout,
        sources.contributions.contributions(participant_id),
    )
    .await;

    DonationFacts { ledger }
}

/// Logarithmic in the donated amount so one large gift cannot dominate.
pub(crate) fn amount_factor(total_donated: f64) -> f64 {
    (total_donated.max(0.0) + 1.0).log10() * 100.0
}

/// Month index counted from year 0, for month arithmetic.
fn month_index(at: DateTime<Utc>) -> i32 {
    at.year() * 12 + at.month0() as i32
}

/// Distinct calendar months with a contribution among the trailing six,
/// the current month included.
fn active_months(ledger: &[Contribution], now: DateTime<Utc>) -> usize {
    let current = month_index(now);
    ledger
        .iter()
        .map(|c| month_index(c.made_at))
        .filter(|&m| m <= current && current - m < CONSISTENCY_WINDOW_MONTHS)
        .collect::<HashSet<i32>>()
        .len()
}

pub(crate) fn score(facts: &DonationFacts, now: DateTime<Utc>, max: f64) -> SubScore {
    let ledger = facts.ledger.as_ref().ok();

    let amount = ledger.map(|l| amount_factor(l.iter().map(|c| c.amount).sum()));
    let frequency = ledger.map(|l| {
        let since = now - Duration::days(FREQUENCY_WINDOW_DAYS);
        l.iter().filter(|c| c.made_at >= since).count() as f64 * 50.0
    });
    let diversity = ledger.map(|l| {
        let causes: HashSet<&str> = l.iter().map(|c| c.cause.as_str()).collect();
        causes.len() as f64 * 200.0
    });
    let special = ledger.map(|l| l.iter().filter(|c| c.special_event).count() as f64 * 250.0);
    let multiplier = ledger.map(|l| {
        0.8 + 0.4 * (active_months(l, now) as f64 / CONSISTENCY_WINDOW_MONTHS as f64)
    });

    combine(
        &[
            Factor::new("amount", amount, 0.4),
            Factor::new("frequency", frequency, 0.3),
            Factor::new("diversity", diversity, 0.2),
            Factor::new("special_events", special, 0.1),
        ],
        ("consistency_multiplier", multiplier),
        max,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::UpstreamError;
    use chrono::TimeZone;

    fn gift(amount: f64, cause: &str, made_at: DateTime<Utc>) -> Contribution {
        Contribution {
            amount,
            cause: cause.to_string(),
            made_at,
            special_event: false,
        }
    }

    #[test]
    fn test_amount_is_logarithmic() {
        assert!((amount_factor(999.0) - 300.0).abs() < 1e-9);
        assert_eq!(amount_factor(0.0), 0.0);
        assert!((amount_factor(99.0) - 200.0).abs() < 1e-9);
    }

    #[test]
    fn test_active_months_window() {
        let now = Utc.with_ymd_and_hms(2025, 3, 15, 12, 0, 0).unwrap();
        let ledger = vec![
            gift(10.0, "a", Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap()),
            gift(10.0, "a", Utc.with_ymd_and_hms(2025, 3, 2, 0, 0, 0).unwrap()),
            gift(10.0, "a", Utc.with_ymd_and_hms(2024, 12, 20, 0, 0, 0).unwrap()),
            gift(10.0, "a", Utc.with_ymd_and_hms(2024, 10, 5, 0, 0, 0).unwrap()),
            // seven months back, outside the window
            gift(10.0, "a", Utc.with_ymd_and_hms(2024, 8, 31, 0, 0, 0).unwrap()),
        ];
        assert_eq!(active_months(&ledger, now), 3);
    }

    #[test]
    fn test_donation_score() {
        let now = Utc.with_ymd_and_hms(2025, 3, 15, 12, 0, 0).unwrap();
        let mut special = gift(499.0, "shelter", now - Duration::days(3));
        special.special_event = true;
        let facts = DonationFacts {
            ledger: Ok(vec![
                gift(500.0, "water", now - Duration::days(1)),
                special,
                gift(0.0, "school", now - Duration::days(200)),
            ]),
        };
        let sub = score(&facts, now, 1000.0);

        assert_eq!(sub.detail.factor("amount"), Some(300.0));
        assert_eq!(sub.detail.factor("frequency"), Some(100.0));
        assert_eq!(sub.detail.factor("diversity"), Some(600.0));
        assert_eq!(sub.detail.factor("special_events"), Some(250.0));
        // one active month: 0.8 + 0.4 / 6
        assert_eq!(sub.detail.multiplier, 0.87);
        // (120 + 30 + 120 + 25) * 0.87
        assert_eq!(sub.value, 256.65);
    }

    #[test]
    fn test_ledger_failure_degrades_everything() {
        let facts = DonationFacts {
            ledger: Err(UpstreamError::unavailable("contribution ledger", "connection refused")),
        };
        let sub = score(&facts, Utc::now(), 1000.0);
        assert_eq!(sub.value, 0.0);
        assert_eq!(sub.detail.degraded.len(), 5);
    }
}
