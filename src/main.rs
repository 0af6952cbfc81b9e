use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use axum_prometheus::PrometheusMetricLayer;
use chrono::{Duration, Utc};
use clap::{Args, Parser, Subcommand};
use metrics_exporter_prometheus::PrometheusHandle;
use prodrank::config::AppConfig;
use prodrank::engine::{
    backfill_records, CompetitionId, CsvTaskImporter, MemoryLedger, MemoryRecordRepository,
    NoStreaks, Player, PlayerId, RankingApiState, RankingEntry, RankingService, ScoreScope,
    StaticTables, Task, TaskId, TaskStatus,
};
use prodrank::error::AppError;
use prodrank::telemetry;
use serde_json::json;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;

#[derive(Clone)]
struct AppState {
    readiness: Arc<AtomicBool>,
    metrics: PrometheusHandle,
}

#[derive(Parser, Debug)]
#[command(
    name = "prodrank",
    about = "Run the productivity ranking engine from the command line",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Ranking utilities for demos and data migration
    Ranking {
        #[command(subcommand)]
        command: RankingCommand,
    },
}

#[derive(Args, Debug, Default)]
struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    port: Option<u16>,
}

#[derive(Subcommand, Debug)]
enum RankingCommand {
    /// Compute and render a ranking over a bundled demo scenario
    Demo,
    /// Backfill canonical productivity records from an exported task sheet
    Import(ImportArgs),
}

#[derive(Args, Debug)]
struct ImportArgs {
    /// CSV export of the upstream task system
    #[arg(long)]
    csv: PathBuf,
    /// Competition the imported tasks belong to
    #[arg(long)]
    competition: Option<String>,
}

#[tokio::main]
async fn main() {
    if let Err(err) = run_cli().await {
        eprintln!("application error: {err}");
        std::process::exit(1);
    }
}

async fn run_cli() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => run_server(args).await,
        Command::Ranking {
            command: RankingCommand::Demo,
        } => run_demo(),
        Command::Ranking {
            command: RankingCommand::Import(args),
        } => run_import(args),
    }
}

fn build_service(
    tables: Arc<StaticTables>,
) -> Arc<RankingService<MemoryRecordRepository, MemoryLedger, NoStreaks>> {
    Arc::new(RankingService::new(
        Arc::new(MemoryRecordRepository::default()),
        Arc::new(MemoryLedger::default()),
        Arc::new(NoStreaks),
        tables.clone(),
        tables,
    ))
}

async fn run_server(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(AtomicBool::new(false));
    let state = AppState {
        readiness: readiness_flag.clone(),
        metrics: prometheus_handle,
    };

    let tables = Arc::new(config.engine.tables());
    let engine_state = Arc::new(
        RankingApiState::new(build_service(tables))
            .with_default_competition(config.engine.default_competition.clone()),
    );

    let app = Router::new()
        .route("/health", get(healthcheck))
        .route("/ready", get(readiness_endpoint))
        .route("/metrics", get(metrics_endpoint))
        .with_state(state)
        .merge(prodrank::engine::ranking_router(engine_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "productivity ranking service ready");

    axum::serve(listener, app).await?;
    Ok(())
}

fn demo_scenario() -> (Vec<Player>, Vec<Task>) {
    let now = Utc::now();
    let due_a = now - Duration::days(3);
    let due_b = now - Duration::days(2);

    let player = |id: &str, name: &str| Player {
        id: PlayerId(id.to_string()),
        name: name.to_string(),
        avatar: format!("avatars/{id}.png"),
    };
    let task = |id: &str, assignee: &str, status: TaskStatus, due, completed| Task {
        id: TaskId(id.to_string()),
        assignee_id: PlayerId(assignee.to_string()),
        status,
        due_date: due,
        completed_date: completed,
        competition_id: None,
    };

    let players = vec![
        player("u-1", "Aline"),
        player("u-2", "Bruno"),
        player("u-3", "Carla"),
    ];
    let tasks = vec![
        task("t-1", "u-1", TaskStatus::Completed, Some(due_a), Some(due_a)),
        task(
            "t-2",
            "u-1",
            TaskStatus::Completed,
            Some(due_b),
            Some(due_b - Duration::hours(6)),
        ),
        task("t-3", "u-2", TaskStatus::Completed, Some(due_a), Some(due_a)),
        task(
            "t-4",
            "u-2",
            TaskStatus::Completed,
            Some(due_b),
            Some(due_b - Duration::hours(4)),
        ),
        task("t-5", "u-2", TaskStatus::Overdue, Some(due_b), None),
        task("t-6", "u-3", TaskStatus::Completed, Some(due_a), Some(due_a)),
    ];

    (players, tasks)
}

fn run_demo() -> Result<(), AppError> {
    let service = build_service(Arc::new(StaticTables::default()));
    let (players, tasks) = demo_scenario();
    let now = Utc::now();

    let entries = service.compute_ranking(&players, &tasks, &ScoreScope::all_time(), now);
    render_ranking(&entries);

    for player in &players {
        let profile = service.compute_profile(player, &tasks);
        println!(
            "\n{}: {} considered, average {:.1}% (early {}, on-time {}, late {}, rework {})",
            profile.name,
            profile.productivity.total_considered,
            profile.productivity.average_percent,
            profile.delivery_distribution.early,
            profile.delivery_distribution.on_time,
            profile.delivery_distribution.late,
            profile.delivery_distribution.rework,
        );
    }

    Ok(())
}

fn run_import(args: ImportArgs) -> Result<(), AppError> {
    let tasks = CsvTaskImporter::from_path(&args.csv)?;
    let competition = args.competition.map(CompetitionId);
    let tables = StaticTables::default();
    let records = backfill_records(&tasks, competition.as_ref(), &tables);

    println!("Imported {} task(s), {} record(s)", tasks.len(), records.len());
    for record in &records {
        println!(
            "- {} | {} | {} | {}% | rework: {}",
            record.task_id,
            record.player_id,
            record.classification.label(),
            record.percent,
            record.in_rework
        );
    }

    Ok(())
}

fn render_ranking(entries: &[RankingEntry]) {
    println!("Productivity ranking");
    for (position, entry) in entries.iter().enumerate() {
        println!(
            "{}. {} | xp {} | level {} | weekly {} | monthly {} | missions {} | streak {}",
            position + 1,
            entry.name,
            entry.xp,
            entry.level,
            entry.weekly_xp,
            entry.monthly_xp,
            entry.missions_completed,
            entry.streak
        );
    }
}

async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn readiness_endpoint(State(state): State<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

async fn metrics_endpoint(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn demo_scenario_orders_players_deterministically() {
        let service = build_service(Arc::new(StaticTables::default()));
        let (players, tasks) = demo_scenario();
        let entries =
            service.compute_ranking(&players, &tasks, &ScoreScope::all_time(), Utc::now());

        let ids: Vec<&str> = entries.iter().map(|entry| entry.id.0.as_str()).collect();
        assert_eq!(ids, vec!["u-1", "u-2", "u-3"]);
        assert_eq!(entries[0].xp, 950);
        assert_eq!(entries[1].xp, 950);
        assert_eq!(entries[2].xp, 900);
    }
}
