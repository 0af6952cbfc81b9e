//! Integration specifications for the productivity ranking workflow.
//!
//! Scenarios run end-to-end through the public service facade and the HTTP
//! router, covering classification, aggregation, tie-breaking, and the
//! rework lifecycle without reaching into private modules.

mod common {
    use std::sync::Arc;

    use chrono::{DateTime, TimeZone, Utc};

    use prodrank::engine::{
        MemoryLedger, MemoryRecordRepository, NoStreaks, Player, PlayerId, RankingService,
        StaticTables, Task, TaskId, TaskStatus,
    };

    pub(super) type MemoryService =
        RankingService<MemoryRecordRepository, MemoryLedger, NoStreaks>;

    pub(super) fn ts(seconds: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(seconds, 0).single().expect("valid ts")
    }

    pub(super) fn player(id: &str, name: &str) -> Player {
        Player {
            id: PlayerId(id.to_string()),
            name: name.to_string(),
            avatar: format!("avatars/{id}.png"),
        }
    }

    pub(super) fn task(
        id: &str,
        assignee: &str,
        status: TaskStatus,
        due: Option<i64>,
        completed: Option<i64>,
    ) -> Task {
        Task {
            id: TaskId(id.to_string()),
            assignee_id: PlayerId(assignee.to_string()),
            status,
            due_date: due.map(ts),
            completed_date: completed.map(ts),
            competition_id: None,
        }
    }

    pub(super) fn scenario() -> (Vec<Player>, Vec<Task>) {
        let players = vec![
            player("u-1", "Aline"),
            player("u-2", "Bruno"),
            player("u-3", "Carla"),
        ];
        let tasks = vec![
            task("t-1", "u-1", TaskStatus::Completed, Some(1_000), Some(1_000)),
            task("t-2", "u-1", TaskStatus::Completed, Some(2_000), Some(1_500)),
            task("t-3", "u-2", TaskStatus::Completed, Some(1_000), Some(1_000)),
            task("t-4", "u-2", TaskStatus::Completed, Some(2_000), Some(1_500)),
            task("t-5", "u-2", TaskStatus::Overdue, Some(2_000), None),
            task("t-6", "u-3", TaskStatus::Completed, Some(1_000), Some(1_000)),
        ];
        (players, tasks)
    }

    pub(super) fn build_service() -> Arc<MemoryService> {
        let tables = Arc::new(StaticTables::default());
        Arc::new(RankingService::new(
            Arc::new(MemoryRecordRepository::default()),
            Arc::new(MemoryLedger::default()),
            Arc::new(NoStreaks),
            tables.clone(),
            tables,
        ))
    }
}

mod facade {
    use super::common::*;
    use prodrank::engine::{ReconcludeOptions, ReworkTransition, ScoreScope, TaskId};

    #[test]
    fn ranking_orders_equal_xp_by_incorrect_count_then_first_completion() {
        let service = build_service();
        let (players, tasks) = scenario();

        let entries =
            service.compute_ranking(&players, &tasks, &ScoreScope::all_time(), ts(10_000));

        let ids: Vec<&str> = entries.iter().map(|entry| entry.id.0.as_str()).collect();
        assert_eq!(ids, vec!["u-1", "u-2", "u-3"]);
        assert_eq!(entries[0].xp, 950);
        assert_eq!(entries[1].xp, 950);
        assert_eq!(entries[2].xp, 900);
    }

    #[test]
    fn rework_removes_a_task_from_scoring_until_reconcluded() {
        let service = build_service();
        let (players, mut tasks) = scenario();

        let outcome = service
            .enter_rework(&mut tasks, &TaskId("t-2".to_string()))
            .expect("rework applies");
        assert_eq!(outcome, ReworkTransition::Applied);

        let entries =
            service.compute_ranking(&players, &tasks, &ScoreScope::all_time(), ts(10_000));
        let u1 = entries
            .iter()
            .find(|entry| entry.id.0 == "u-1")
            .expect("u-1 present");
        assert_eq!(u1.xp, 900);
        assert_eq!(u1.missions_completed, 1);

        service
            .reconclude(
                &mut tasks,
                &TaskId("t-2".to_string()),
                ts(2_500),
                &ReconcludeOptions {
                    allow_due_date_recalc: true,
                    new_due_date: Some(ts(3_000)),
                },
            )
            .expect("reconclusion applies");

        let entries =
            service.compute_ranking(&players, &tasks, &ScoreScope::all_time(), ts(10_000));
        let u1 = entries
            .iter()
            .find(|entry| entry.id.0 == "u-1")
            .expect("u-1 present");
        assert_eq!(u1.xp, 950);
        assert_eq!(u1.missions_completed, 2);
    }

    #[test]
    fn profile_and_ranking_expose_different_views_of_the_same_player() {
        let service = build_service();
        let (players, tasks) = scenario();

        let profile = service.compute_profile(&players[0], &tasks);
        assert_eq!(profile.productivity.total_considered, 2);
        assert!((profile.productivity.average_percent - 95.0).abs() < f64::EPSILON);

        let entries =
            service.compute_ranking(&players, &tasks, &ScoreScope::all_time(), ts(10_000));
        let serialized = serde_json::to_value(&entries).expect("serializes");
        for row in serialized.as_array().expect("entries array") {
            assert!(row.get("productivity").is_none());
        }
    }
}

mod http {
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use serde_json::{json, Value};
    use tower::util::ServiceExt;

    use super::common::*;
    use prodrank::engine::{
        ranking_router, CompetitionId, RankingApiState, ReconcludeOptions, TaskId, TaskStatus,
    };

    fn router() -> axum::Router {
        let (players, tasks) = scenario();
        let state = Arc::new(RankingApiState::seeded(build_service(), players, tasks));
        ranking_router(state)
    }

    async fn read_json(response: axum::response::Response) -> Value {
        let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
            .await
            .expect("read body");
        serde_json::from_slice(&body).expect("json payload")
    }

    #[tokio::test]
    async fn ranking_endpoint_returns_the_ordered_entries() {
        let response = router()
            .oneshot(
                Request::builder()
                    .uri("/api/v1/ranking")
                    .body(Body::empty())
                    .expect("request builds"),
            )
            .await
            .expect("router responds");

        assert_eq!(response.status(), StatusCode::OK);
        let body = read_json(response).await;
        let ids: Vec<&str> = body
            .as_array()
            .expect("entries array")
            .iter()
            .map(|entry| entry["id"].as_str().expect("id string"))
            .collect();
        assert_eq!(ids, vec!["u-1", "u-2", "u-3"]);
    }

    #[tokio::test]
    async fn profile_endpoint_exposes_productivity_for_known_players_only() {
        let response = router()
            .oneshot(
                Request::builder()
                    .uri("/api/v1/players/u-1/profile")
                    .body(Body::empty())
                    .expect("request builds"),
            )
            .await
            .expect("router responds");
        assert_eq!(response.status(), StatusCode::OK);
        let body = read_json(response).await;
        assert_eq!(body["productivity"]["total_considered"], json!(2));

        let response = router()
            .oneshot(
                Request::builder()
                    .uri("/api/v1/players/u-404/profile")
                    .body(Body::empty())
                    .expect("request builds"),
            )
            .await
            .expect("router responds");
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn rework_endpoint_transitions_and_rejects_invalid_reconclusions() {
        let app = router();

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v1/tasks/t-2/rework")
                    .body(Body::empty())
                    .expect("request builds"),
            )
            .await
            .expect("router responds");
        assert_eq!(response.status(), StatusCode::OK);
        let body = read_json(response).await;
        assert_eq!(body["transition"], json!("applied"));

        // t-1 was never put into rework: reconcluding it must conflict.
        let payload = json!({ "completed_date": "2026-08-20T12:00:00Z" });
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v1/tasks/t-1/reconclude")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(payload.to_string()))
                    .expect("request builds"),
            )
            .await
            .expect("router responds");
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn concurrent_transitions_never_revert_other_players_task_updates() {
        let (players, tasks) = scenario();
        let state = Arc::new(RankingApiState::seeded(build_service(), players, tasks));
        let app = ranking_router(state.clone());

        // One thread keeps upgrading u-2's t-3 to an early delivery while
        // another cycles u-1's t-2 through rework and reconclusion. The
        // transition write-back must only ever store t-2, so the last t-3
        // upgrade has to survive every interleaving.
        let writer = {
            let state = state.clone();
            std::thread::spawn(move || {
                for round in 0..100 {
                    let upgrade = task(
                        "t-3",
                        "u-2",
                        TaskStatus::Completed,
                        Some(2_000 + round),
                        Some(1_000),
                    );
                    state.ingest_task(upgrade).expect("ingest t-3");
                }
            })
        };
        let transitioner = {
            let state = state.clone();
            std::thread::spawn(move || {
                let id = TaskId("t-2".to_string());
                for _ in 0..100 {
                    state.apply_rework(&id).expect("rework t-2");
                    state
                        .apply_reconclusion(&id, ts(1_500), &ReconcludeOptions::default())
                        .expect("reconclude t-2");
                }
            })
        };
        writer.join().expect("writer thread");
        transitioner.join().expect("transition thread");

        // u-2's snapshot now holds two early deliveries: average 100 -> 1000.
        // A stale t-3 write-back would drop this to 950.
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/v1/ranking")
                    .body(Body::empty())
                    .expect("request builds"),
            )
            .await
            .expect("router responds");
        let body = read_json(response).await;
        let u2 = body
            .as_array()
            .expect("entries array")
            .iter()
            .find(|entry| entry["id"] == json!("u-2"))
            .expect("u-2 present");
        assert_eq!(u2["xp"], json!(1_000));
    }

    #[tokio::test]
    async fn default_competition_scopes_unqualified_ranking_requests() {
        let players = vec![player("u-1", "Aline")];
        let mut scoped = task("t-a", "u-1", TaskStatus::Completed, Some(2_000), Some(1_000));
        scoped.competition_id = Some(CompetitionId("sprint-9".to_string()));
        let mut other = task("t-b", "u-1", TaskStatus::Completed, Some(1_000), Some(2_000));
        other.competition_id = Some(CompetitionId("sprint-8".to_string()));

        let state = Arc::new(
            RankingApiState::seeded(build_service(), players, vec![scoped, other])
                .with_default_competition(Some(CompetitionId("sprint-9".to_string()))),
        );

        let response = ranking_router(state)
            .oneshot(
                Request::builder()
                    .uri("/api/v1/ranking")
                    .body(Body::empty())
                    .expect("request builds"),
            )
            .await
            .expect("router responds");
        let body = read_json(response).await;

        // Only the sprint-9 early delivery counts: average 100 -> 1000 XP.
        let entry = &body.as_array().expect("entries array")[0];
        assert_eq!(entry["xp"], json!(1_000));
        assert_eq!(entry["missions_completed"], json!(1));
    }

    #[tokio::test]
    async fn unknown_task_transitions_return_not_found() {
        let response = router()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v1/tasks/t-404/rework")
                    .body(Body::empty())
                    .expect("request builds"),
            )
            .await
            .expect("router responds");
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
