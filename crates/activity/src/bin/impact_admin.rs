use activity::HttpActivityClient;
use clap::{Parser, Subcommand};
use scoring::{ActivitySources, CancelToken, EngineConfig, RankingEngine};
use std::sync::Arc;
use storage::Database;
use storage::models::{LeaderboardCategory, LeaderboardPeriod};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "impact-admin")]
#[command(about = "Impact score and leaderboard administration", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(long, env = "DATABASE_URL")]
    database_url: String,

    #[arg(long, env = "ACTIVITY_BASE_URL", default_value = "http://localhost:8081")]
    activity_url: String,

    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply pending database migrations
    Migrate,
    /// Run one reconciliation pass now
    Reconcile,
    /// Force-recompute one participant and propagate the result
    Recompute { participant: Uuid },
    /// Print score and leaderboard freshness
    Health,
    /// Empty one stored leaderboard
    Reset {
        category: LeaderboardCategory,
        period: LeaderboardPeriod,
    },
    /// Empty every category's leaderboard for a period
    Rollover { period: LeaderboardPeriod },
    /// Delete a participant's score and purge them from all leaderboards
    Erase { participant: Uuid },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!(
                    "impact_admin={log_level},activity={log_level},scoring={log_level},storage={log_level}"
                )
                .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let db = Database::new(&cli.database_url).await?;

    if let Commands::Migrate = cli.command {
        tracing::info!("Running database migrations");
        db.run_migrations().await?;
        tracing::info!("✓ Migrations applied");
        return Ok(());
    }

    let engine = build_engine(&db, &cli.activity_url)?;

    match cli.command {
        Commands::Migrate => {}
        Commands::Reconcile => match engine.run_reconciliation(&CancelToken::new()).await {
            Some(report) => print_json(&report)?,
            None => tracing::warn!("Another reconciliation is in progress"),
        },
        Commands::Recompute { participant } => {
            let report = engine.recompute_participant(participant).await?;
            print_json(&report)?;
        }
        Commands::Health => {
            let report = engine.health().await?;
            print_json(&report)?;
        }
        Commands::Reset { category, period } => {
            engine.reset_leaderboard(category, period).await?;
            tracing::info!("✓ Reset {}/{}", category, period);
        }
        Commands::Rollover { period } => {
            let cleared = engine.rollover_period(period).await?;
            tracing::info!("✓ Cleared {} {} leaderboards", cleared, period);
        }
        Commands::Erase { participant } => {
            if engine.erase_participant(participant).await? {
                tracing::info!("✓ Erased participant {}", participant);
            } else {
                tracing::warn!("Participant {} had no score or leaderboard entries", participant);
            }
        }
    }

    Ok(())
}

fn build_engine(
    db: &Database,
    activity_url: &str,
) -> Result<RankingEngine, Box<dyn std::error::Error>> {
    let config = EngineConfig::from_env()?;
    let client = HttpActivityClient::new(activity_url, config.upstream_timeout())?;
    let sources = ActivitySources::from_shared(Arc::new(client));
    Ok(RankingEngine::new(db.score_repository(), sources, config)?)
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), serde_json::Error> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
