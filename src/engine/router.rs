use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;

use super::domain::{
    CompetitionId, Player, PlayerAggregate, PlayerId, ScoreScope, ScoreWindow, Task, TaskId,
};
use super::ledger::SubmissionLedger;
use super::repository::RecordRepository;
use super::rework::{ReconcludeOptions, ReworkTransition};
use super::service::{RankingService, ServiceError};
use super::views::{PlayerProfile, RankingEntry};
use super::xp::StreakProvider;

/// Shared state behind the engine routes: the service facade plus an
/// in-memory snapshot of the player roster and task set fed by the upstream
/// task system.
pub struct RankingApiState<R, L, S> {
    service: Arc<RankingService<R, L, S>>,
    players: Mutex<BTreeMap<PlayerId, Player>>,
    tasks: Mutex<BTreeMap<TaskId, Task>>,
    default_competition: Option<CompetitionId>,
}

impl<R, L, S> RankingApiState<R, L, S> {
    pub fn new(service: Arc<RankingService<R, L, S>>) -> Self {
        Self::seeded(service, Vec::new(), Vec::new())
    }

    pub fn seeded(
        service: Arc<RankingService<R, L, S>>,
        players: Vec<Player>,
        tasks: Vec<Task>,
    ) -> Self {
        Self {
            service,
            players: Mutex::new(
                players
                    .into_iter()
                    .map(|player| (player.id.clone(), player))
                    .collect(),
            ),
            tasks: Mutex::new(tasks.into_iter().map(|task| (task.id.clone(), task)).collect()),
            default_competition: None,
        }
    }

    /// Competition applied to ranking requests that carry none of their own.
    pub fn with_default_competition(mut self, competition: Option<CompetitionId>) -> Self {
        self.default_competition = competition;
        self
    }

    pub fn upsert_player(&self, player: Player) {
        lock_recovering(&self.players).insert(player.id.clone(), player);
    }

    fn players(&self) -> Vec<Player> {
        lock_recovering(&self.players).values().cloned().collect()
    }

    fn tasks(&self) -> Vec<Task> {
        lock_recovering(&self.tasks).values().cloned().collect()
    }
}

impl<R, L, S> RankingApiState<R, L, S>
where
    R: RecordRepository + 'static,
    L: SubmissionLedger + 'static,
    S: StreakProvider + 'static,
{
    pub fn ranking(&self, scope: &ScoreScope, now: DateTime<Utc>) -> Vec<RankingEntry> {
        self.service
            .compute_ranking(&self.players(), &self.tasks(), scope, now)
    }

    pub fn profile(&self, player_id: &PlayerId) -> Option<PlayerProfile> {
        let player = lock_recovering(&self.players).get(player_id).cloned()?;
        Some(self.service.compute_profile(&player, &self.tasks()))
    }

    /// Record a task-change event: supersede the canonical record and update
    /// the snapshot entry for this task only.
    pub fn ingest_task(&self, task: Task) -> Result<PlayerAggregate, ServiceError> {
        let aggregate = self.service.ingest_task(&task)?;
        lock_recovering(&self.tasks).insert(task.id.clone(), task);
        Ok(aggregate)
    }

    /// Withdraw a snapshot task for correction. The write-back stores only
    /// the transitioned task; concurrent updates to other tasks are never
    /// overwritten with a stale copy.
    pub fn apply_rework(&self, task_id: &TaskId) -> Result<ReworkTransition, ServiceError> {
        let mut task = self.snapshot_task(task_id)?;
        let transition = self
            .service
            .enter_rework(std::slice::from_mut(&mut task), task_id)?;
        if transition.changed() {
            lock_recovering(&self.tasks).insert(task.id.clone(), task);
        }
        Ok(transition)
    }

    /// Complete a rework episode on a snapshot task. Same single-task
    /// write-back contract as `apply_rework`.
    pub fn apply_reconclusion(
        &self,
        task_id: &TaskId,
        new_completed_date: DateTime<Utc>,
        options: &ReconcludeOptions,
    ) -> Result<ReworkTransition, ServiceError> {
        let mut task = self.snapshot_task(task_id)?;
        let transition = self.service.reconclude(
            std::slice::from_mut(&mut task),
            task_id,
            new_completed_date,
            options,
        )?;
        if transition.changed() {
            lock_recovering(&self.tasks).insert(task.id.clone(), task);
        }
        Ok(transition)
    }

    fn snapshot_task(&self, task_id: &TaskId) -> Result<Task, ServiceError> {
        lock_recovering(&self.tasks)
            .get(task_id)
            .cloned()
            .ok_or_else(|| ServiceError::UnknownTask(task_id.clone()))
    }
}

fn lock_recovering<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Router builder exposing the engine over HTTP.
pub fn ranking_router<R, L, S>(state: Arc<RankingApiState<R, L, S>>) -> Router
where
    R: RecordRepository + 'static,
    L: SubmissionLedger + 'static,
    S: StreakProvider + 'static,
{
    Router::new()
        .route("/api/v1/ranking", get(ranking_handler::<R, L, S>))
        .route(
            "/api/v1/players/:player_id/profile",
            get(profile_handler::<R, L, S>),
        )
        .route("/api/v1/players", post(upsert_player_handler::<R, L, S>))
        .route("/api/v1/tasks", post(ingest_task_handler::<R, L, S>))
        .route(
            "/api/v1/tasks/:task_id/rework",
            post(rework_handler::<R, L, S>),
        )
        .route(
            "/api/v1/tasks/:task_id/reconclude",
            post(reconclude_handler::<R, L, S>),
        )
        .with_state(state)
}

#[derive(Debug, Deserialize)]
pub(crate) struct RankingQuery {
    #[serde(default)]
    competition: Option<String>,
    #[serde(default)]
    window: Option<String>,
}

impl RankingQuery {
    fn scope(&self, now: DateTime<Utc>, default_competition: &Option<CompetitionId>) -> ScoreScope {
        let window = match self.window.as_deref() {
            Some("weekly") => ScoreWindow::weekly(now),
            Some("monthly") => ScoreWindow::monthly(now),
            _ => ScoreWindow::AllTime,
        };
        let competition_id = self
            .competition
            .clone()
            .map(CompetitionId)
            .or_else(|| default_competition.clone());
        ScoreScope {
            competition_id,
            window,
        }
    }
}

pub(crate) async fn ranking_handler<R, L, S>(
    State(state): State<Arc<RankingApiState<R, L, S>>>,
    Query(query): Query<RankingQuery>,
) -> Response
where
    R: RecordRepository + 'static,
    L: SubmissionLedger + 'static,
    S: StreakProvider + 'static,
{
    let now = Utc::now();
    let entries = state.ranking(&query.scope(now, &state.default_competition), now);
    (StatusCode::OK, axum::Json(entries)).into_response()
}

pub(crate) async fn profile_handler<R, L, S>(
    State(state): State<Arc<RankingApiState<R, L, S>>>,
    Path(player_id): Path<String>,
) -> Response
where
    R: RecordRepository + 'static,
    L: SubmissionLedger + 'static,
    S: StreakProvider + 'static,
{
    let id = PlayerId(player_id);
    match state.profile(&id) {
        Some(profile) => (StatusCode::OK, axum::Json(profile)).into_response(),
        None => {
            let payload = json!({ "error": format!("unknown player {}", id) });
            (StatusCode::NOT_FOUND, axum::Json(payload)).into_response()
        }
    }
}

pub(crate) async fn upsert_player_handler<R, L, S>(
    State(state): State<Arc<RankingApiState<R, L, S>>>,
    axum::Json(player): axum::Json<Player>,
) -> Response
where
    R: RecordRepository + 'static,
    L: SubmissionLedger + 'static,
    S: StreakProvider + 'static,
{
    state.upsert_player(player);
    StatusCode::ACCEPTED.into_response()
}

pub(crate) async fn ingest_task_handler<R, L, S>(
    State(state): State<Arc<RankingApiState<R, L, S>>>,
    axum::Json(task): axum::Json<Task>,
) -> Response
where
    R: RecordRepository + 'static,
    L: SubmissionLedger + 'static,
    S: StreakProvider + 'static,
{
    match state.ingest_task(task) {
        Ok(aggregate) => (StatusCode::ACCEPTED, axum::Json(aggregate)).into_response(),
        Err(error) => service_error_response(error),
    }
}

pub(crate) async fn rework_handler<R, L, S>(
    State(state): State<Arc<RankingApiState<R, L, S>>>,
    Path(task_id): Path<String>,
) -> Response
where
    R: RecordRepository + 'static,
    L: SubmissionLedger + 'static,
    S: StreakProvider + 'static,
{
    match state.apply_rework(&TaskId(task_id)) {
        Ok(transition) => transition_response(transition),
        Err(error) => service_error_response(error),
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ReconcludeRequest {
    completed_date: DateTime<Utc>,
    #[serde(default)]
    allow_due_date_recalc: bool,
    #[serde(default)]
    new_due_date: Option<DateTime<Utc>>,
}

pub(crate) async fn reconclude_handler<R, L, S>(
    State(state): State<Arc<RankingApiState<R, L, S>>>,
    Path(task_id): Path<String>,
    axum::Json(request): axum::Json<ReconcludeRequest>,
) -> Response
where
    R: RecordRepository + 'static,
    L: SubmissionLedger + 'static,
    S: StreakProvider + 'static,
{
    let options = ReconcludeOptions {
        allow_due_date_recalc: request.allow_due_date_recalc,
        new_due_date: request.new_due_date,
    };
    match state.apply_reconclusion(&TaskId(task_id), request.completed_date, &options) {
        Ok(transition) => transition_response(transition),
        Err(error) => service_error_response(error),
    }
}

fn transition_response(transition: ReworkTransition) -> Response {
    let status = match transition {
        ReworkTransition::Applied | ReworkTransition::AlreadyInRework => StatusCode::OK,
        ReworkTransition::NotInRework => StatusCode::CONFLICT,
    };
    (status, axum::Json(json!({ "transition": transition }))).into_response()
}

fn service_error_response(error: ServiceError) -> Response {
    let status = match &error {
        ServiceError::UnknownTask(_) => StatusCode::NOT_FOUND,
        ServiceError::Repository(_) | ServiceError::Ledger(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    let payload = json!({ "error": error.to_string() });
    (status, axum::Json(payload)).into_response()
}
