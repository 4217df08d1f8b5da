use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::RankingEngine;

/// Cooperative cancellation flag shared between a task and its owner.
#[derive(Clone)]
pub struct CancelToken {
    sender: Arc<watch::Sender<bool>>,
    receiver: watch::Receiver<bool>,
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelToken {
    pub fn new() -> Self {
        let (sender, receiver) = watch::channel(false);
        Self {
            sender: Arc::new(sender),
            receiver,
        }
    }

    pub fn cancel(&self) {
        self.sender.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.receiver.borrow()
    }

    /// Resolves once [`CancelToken::cancel`] has been called.
    pub async fn cancelled(&self) {
        let mut receiver = self.receiver.clone();
        // The sender lives as long as any clone of the token.
        let _ = receiver.wait_for(|cancelled| *cancelled).await;
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReconcileReport {
    pub ranks_updated: u64,
    pub boards_rebuilt: usize,
    pub failures: usize,
    pub cancelled: bool,
    #[serde(rename = "duration_ms", serialize_with = "as_millis")]
    pub duration: Duration,
}

fn as_millis<S: serde::Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u128(duration.as_millis())
}

/// Clears the in-flight flag when a cycle ends, however it ends.
struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl RankingEngine {
    /// One reconciliation pass: bulk re-rank the population, then rebuild
    /// every stale leaderboard.
    ///
    /// Returns `None` without doing anything when another pass is in flight.
    /// Per-item failures are counted and never abort the pass.
    pub async fn run_reconciliation(&self, cancel: &CancelToken) -> Option<ReconcileReport> {
        if self
            .inner
            .reconciling
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::warn!("Reconciliation already running, skipping this run");
            return None;
        }
        let _running = RunningGuard(&self.inner.reconciling);

        let started = Instant::now();
        let mut report = ReconcileReport::default();
        let config = self.config();
        tracing::info!("Reconciliation started");

        let active_since = config.rank_period.window_start(Utc::now());
        match self.repo().recompute_all_ranks(active_since).await {
            Ok(updated) => report.ranks_updated = updated,
            Err(e) => {
                report.failures += 1;
                tracing::warn!("Bulk rank recompute failed: {}", e);
            }
        }

        let stale = match self
            .repo()
            .list_stale_leaderboards(config.leaderboard_staleness_secs)
            .await
        {
            Ok(keys) => keys,
            Err(e) => {
                report.failures += 1;
                tracing::warn!("Could not list stale leaderboards: {}", e);
                Vec::new()
            }
        };

        for key in stale {
            if cancel.is_cancelled() {
                report.cancelled = true;
                tracing::info!("Reconciliation cancelled");
                break;
            }
            match self.rebuild_leaderboard(key).await {
                Ok(_) => report.boards_rebuilt += 1,
                Err(e) => {
                    report.failures += 1;
                    tracing::warn!(leaderboard = %key, "Leaderboard rebuild failed: {}", e);
                }
            }
        }

        report.duration = started.elapsed();
        tracing::info!(
            ranks_updated = report.ranks_updated,
            boards_rebuilt = report.boards_rebuilt,
            failures = report.failures,
            cancelled = report.cancelled,
            duration_ms = report.duration.as_millis() as u64,
            "Reconciliation finished"
        );
        Some(report)
    }

    pub fn is_reconciling(&self) -> bool {
        self.inner.reconciling.load(Ordering::Acquire)
    }
}

/// Periodic reconciliation task owned by whoever starts it.
pub struct Reconciler {
    engine: RankingEngine,
    interval: Duration,
    task: Option<(CancelToken, JoinHandle<()>)>,
}

impl Reconciler {
    pub fn new(engine: RankingEngine) -> Self {
        let interval = engine.config().reconcile_interval();
        Self::with_interval(engine, interval)
    }

    pub fn with_interval(engine: RankingEngine, interval: Duration) -> Self {
        Self {
            engine,
            interval,
            task: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.task
            .as_ref()
            .is_some_and(|(_, handle)| !handle.is_finished())
    }

    /// Spawns the timer loop. The first pass runs one interval after start.
    pub fn start(&mut self) {
        if self.is_running() {
            tracing::warn!("Reconciler already running");
            return;
        }

        let token = CancelToken::new();
        let engine = self.engine.clone();
        let interval = self.interval;
        let loop_token = token.clone();

        let handle = tokio::spawn(async move {
            let mut ticker =
                tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = loop_token.cancelled() => break,
                    _ = ticker.tick() => {
                        engine.run_reconciliation(&loop_token).await;
                    }
                }
            }
            tracing::info!("Reconciler stopped");
        });

        tracing::info!(interval_secs = interval.as_secs(), "Reconciler started");
        self.task = Some((token, handle));
    }

    /// Cancels the loop, letting an in-flight pass stop between rebuilds.
    pub async fn stop(&mut self) {
        let Some((token, handle)) = self.task.take() else {
            return;
        };
        token.cancel();
        if let Err(e) = handle.await {
            tracing::warn!("Reconciler task ended abnormally: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{StubSources, donation_ledger, engine_with, profile};
    use storage::models::{ActivityDomain, LeaderboardCategory, LeaderboardKey, LeaderboardPeriod};
    use storage::repository::ScoreRepository;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_second_run_is_refused() {
        let (engine, _repo) = engine_with(StubSources::default());
        engine.inner.reconciling.store(true, Ordering::Release);

        assert!(engine.run_reconciliation(&CancelToken::new()).await.is_none());

        engine.inner.reconciling.store(false, Ordering::Release);
        assert!(engine.run_reconciliation(&CancelToken::new()).await.is_some());
        assert!(!engine.is_reconciling());
    }

    #[tokio::test]
    async fn test_cycle_rebuilds_stale_boards_and_reranks() {
        let stub = StubSources::default();
        let (engine, repo) = engine_with(stub.clone());
        let mut ids = Vec::new();
        for amount in [10.0, 1000.0] {
            let id = Uuid::new_v4();
            stub.set_participant_contributions(id, donation_ledger(&[amount]));
            engine
                .trigger_update(id, ActivityDomain::Donation, &serde_json::Value::Null)
                .await
                .unwrap();
            ids.push(id);
        }
        // First participant's cached rank is stale (it was 1 when alone).
        assert_eq!(repo.get_score(ids[0]).await.unwrap().unwrap().global_rank, Some(1));

        engine
            .reset_leaderboard(LeaderboardCategory::Overall, LeaderboardPeriod::Monthly)
            .await
            .unwrap();
        repo.insert_participant(profile(ids[1], "Opted out", false)).await;

        let report = engine.run_reconciliation(&CancelToken::new()).await.unwrap();
        assert_eq!(report.ranks_updated, 2);
        assert_eq!(report.boards_rebuilt, 1);
        assert_eq!(report.failures, 0);
        assert!(!report.cancelled);

        assert_eq!(repo.get_score(ids[0]).await.unwrap().unwrap().global_rank, Some(2));
        let board = repo
            .get_leaderboard(LeaderboardCategory::Overall, LeaderboardPeriod::Monthly)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(board.len(), 1);
        assert_eq!(board.entries()[0].participant_id, ids[0]);
        assert!(board.last_refreshed.is_some());
    }

    #[tokio::test]
    async fn test_cancelled_token_stops_between_rebuilds() {
        let (engine, _repo) = engine_with(StubSources::default());
        engine.rollover_period(LeaderboardPeriod::Weekly).await.unwrap();

        let token = CancelToken::new();
        token.cancel();
        let report = engine.run_reconciliation(&token).await.unwrap();

        assert!(report.cancelled);
        assert_eq!(report.boards_rebuilt, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconciler_runs_on_interval_and_stops() {
        let (engine, repo) = engine_with(StubSources::default());
        engine
            .reset_leaderboard(LeaderboardCategory::Social, LeaderboardPeriod::Daily)
            .await
            .unwrap();

        let mut reconciler = Reconciler::with_interval(engine.clone(), Duration::from_secs(60));
        reconciler.start();
        assert!(reconciler.is_running());
        reconciler.start();

        tokio::time::sleep(Duration::from_secs(61)).await;
        let board = repo
            .get_leaderboard(LeaderboardCategory::Social, LeaderboardPeriod::Daily)
            .await
            .unwrap()
            .unwrap();
        assert!(board.last_refreshed.is_some());

        reconciler.stop().await;
        assert!(!reconciler.is_running());
        let key = LeaderboardKey::new(LeaderboardCategory::Social, LeaderboardPeriod::Daily);
        assert_eq!(board.key(), key);
    }
}
