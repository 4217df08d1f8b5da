use activity::HttpActivityClient;
use anyhow::Context;
use scoring::{ActivitySources, EngineConfig, RankingEngine, Reconciler};
use std::sync::Arc;
use storage::Database;
use tower_http::cors::{Any, CorsLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

mod config;
mod error;
mod features;
mod middleware;

use config::Config;
use features::{admin, events, health, leaderboards, participants, scores};
use middleware::auth::ApiKeys;

#[derive(OpenApi)]
#[openapi(
    paths(
        scores::handlers::get_score,
        leaderboards::handlers::get_leaderboard,
        leaderboards::handlers::get_top_performers,
        participants::handlers::get_friends_leaderboard,
        participants::handlers::update_privacy,
        participants::handlers::erase_participant,
        events::handlers::submit_event,
        admin::handlers::reset_leaderboard,
        admin::handlers::rollover_period,
        admin::handlers::recompute_participant,
        admin::handlers::reconcile,
        health::handlers::get_ranking_health,
    ),
    components(
        schemas(
            storage::dto::score::ScoreView,
            storage::dto::score::ComponentView,
            storage::dto::leaderboard::LeaderboardView,
            storage::dto::leaderboard::RequesterPosition,
            storage::dto::common::PaginationMeta,
            storage::dto::events::ActivityEventRequest,
            storage::dto::events::PrivacyUpdateRequest,
            storage::dto::events::PrivacyUpdateResponse,
            storage::dto::events::AcceptedResponse,
            storage::models::ComponentKind,
            storage::models::ComponentDetail,
            storage::models::ScoreTrend,
            storage::models::TrendDirection,
            storage::models::LeaderboardEntry,
            storage::models::LeaderboardMetadata,
            storage::models::LeaderboardCategory,
            storage::models::LeaderboardPeriod,
            storage::models::ActivityDomain,
        )
    ),
    tags(
        (name = "scores", description = "Participant impact scores"),
        (name = "leaderboards", description = "Public leaderboard endpoints"),
        (name = "participants", description = "Friends leaderboards and participant privacy"),
        (name = "events", description = "Activity notifications from upstream systems"),
        (name = "admin", description = "Leaderboard maintenance"),
        (name = "health", description = "Ranking freshness monitoring"),
    ),
    modifiers(&SecurityAddon)
)]
struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                utoipa::openapi::security::SecurityScheme::Http(
                    utoipa::openapi::security::HttpBuilder::new()
                        .scheme(utoipa::openapi::security::HttpAuthScheme::Bearer)
                        .bearer_format("API Key")
                        .build(),
                ),
            )
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .init();

    tracing::info!("Starting impact score API");

    let config = Config::from_env().context("Failed to load API configuration")?;
    let engine_config = EngineConfig::from_env().context("Failed to load engine configuration")?;
    tracing::info!("Configuration loaded successfully");

    tracing::info!(
        "Connecting to database at: {}",
        config
            .database_url
            .split('@')
            .next_back()
            .unwrap_or("unknown")
    );
    let db = Database::new(&config.database_url)
        .await
        .context("Failed to initialize database")?;
    tracing::info!("Database connection established");

    tracing::info!("Running database migrations");
    db.run_migrations()
        .await
        .context("Failed to run migrations")?;
    tracing::info!("Database migrations completed successfully");

    let client = HttpActivityClient::new(
        &config.activity_base_url,
        engine_config.upstream_timeout(),
    )
    .context("Failed to build activity client")?;
    tracing::info!("Activity services at {}", client.base_url());

    let engine = RankingEngine::new(
        db.score_repository(),
        ActivitySources::from_shared(Arc::new(client)),
        engine_config,
    )
    .context("Invalid engine configuration")?;

    let mut reconciler = Reconciler::new(engine.clone());
    reconciler.start();

    let api_keys = ApiKeys::from_comma_separated(&config.api_keys);
    if api_keys.is_empty() {
        tracing::warn!("API_KEYS is empty, protected endpoints will reject every request");
    }

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
        .max_age(std::time::Duration::from_secs(3600));

    let app = features::router(api_keys)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(cors)
        .with_state(engine);

    let bind_address = format!("{}:{}", config.host, config.port);
    tracing::info!("Starting server at http://{}", bind_address);
    tracing::info!(
        "Swagger UI available at http://{}/swagger-ui/",
        bind_address
    );

    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("Failed to bind {bind_address}"))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped, waiting for reconciliation to finish");
    reconciler.stop().await;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
