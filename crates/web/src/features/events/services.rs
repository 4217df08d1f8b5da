use scoring::RankingEngine;
use storage::dto::events::ActivityEventRequest;

/// Queues the update and returns immediately; failures are logged by the engine.
pub fn submit_event(engine: &RankingEngine, req: ActivityEventRequest) {
    let participant_id = req.participant_id;
    tracing::debug!(
        %participant_id,
        domain = %req.domain,
        source = req.source.as_deref().unwrap_or("unknown"),
        "Activity event received"
    );
    engine.on_activity_event(participant_id, req.domain, req.context);
}
