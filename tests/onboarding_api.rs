//! Integration tests for the onboarding REST API.
//!
//! Each test spins up an Axum server on a random port backed by an
//! in-memory libSQL store and exercises the real HTTP contract.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::time::timeout;

use moai_core::config::MachineConfig;
use moai_core::onboarding::onboarding_routes;
use moai_core::store::{LibSqlBackend, ProfileStore};

/// Maximum time any test is allowed to run before we consider it hung.
const TEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Start an Axum server on a random port, return (base url, store).
async fn start_server() -> (String, Arc<dyn ProfileStore>) {
    let store: Arc<dyn ProfileStore> = Arc::new(LibSqlBackend::new_memory().await.unwrap());
    let app = onboarding_routes(Arc::clone(&store), &MachineConfig::default());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    // Give the server a moment to start accepting connections.
    tokio::time::sleep(Duration::from_millis(50)).await;

    (format!("http://127.0.0.1:{port}"), store)
}

async fn get_json(url: String) -> (u16, Value) {
    let resp = reqwest::get(url).await.unwrap();
    let status = resp.status().as_u16();
    (status, resp.json().await.unwrap())
}

async fn put_json(client: &reqwest::Client, url: String, body: Value) -> (u16, Value) {
    let resp = client.put(url).json(&body).send().await.unwrap();
    let status = resp.status().as_u16();
    (status, resp.json().await.unwrap())
}

#[tokio::test]
async fn rest_health_endpoint() {
    timeout(TEST_TIMEOUT, async {
        let (base, _store) = start_server().await;

        let (status, body) = get_json(format!("{base}/health")).await;
        assert_eq!(status, 200);
        assert_eq!(body["status"], "ok");
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn new_user_status_starts_at_identity() {
    timeout(TEST_TIMEOUT, async {
        let (base, _store) = start_server().await;

        let (status, body) = get_json(format!("{base}/api/onboarding/newbie/status")).await;
        assert_eq!(status, 200);
        assert_eq!(body["current_checkpoint"], 1);
        assert_eq!(body["current_step"], "identity");
        assert_eq!(body["is_complete"], false);
        assert_eq!(body["should_show_onboarding"], true);
        assert_eq!(body["is_loading"], false);

        let checkpoints = body["checkpoints"].as_array().unwrap();
        assert_eq!(checkpoints.len(), 6);
        assert_eq!(checkpoints[0]["can_access"], true);
        assert_eq!(checkpoints[1]["can_access"], false);

        let (status, _) = get_json(format!("{base}/api/onboarding/newbie/profile")).await;
        assert_eq!(status, 404);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn checkpoint_status_validates_step() {
    timeout(TEST_TIMEOUT, async {
        let (base, _store) = start_server().await;

        let (status, body) =
            get_json(format!("{base}/api/onboarding/u1/checkpoints/1")).await;
        assert_eq!(status, 200);
        assert_eq!(body, json!({"completed": false, "can_access": true}));

        let (status, body) =
            get_json(format!("{base}/api/onboarding/u1/checkpoints/9")).await;
        assert_eq!(status, 400);
        assert!(body["error"].as_str().unwrap().contains('9'));
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn locked_step_is_rejected() {
    timeout(TEST_TIMEOUT, async {
        let (base, _store) = start_server().await;
        let client = reqwest::Client::new();

        let (status, _) = put_json(
            &client,
            format!("{base}/api/onboarding/u1/goals"),
            json!({"goals": ["strength"]}),
        )
        .await;
        assert_eq!(status, 409);

        let resp = client
            .post(format!("{base}/api/onboarding/u1/advance"))
            .json(&json!({"step": 4}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 409);

        let resp = client
            .post(format!("{base}/api/onboarding/u1/complete"))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 409);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn full_onboarding_flow() {
    timeout(TEST_TIMEOUT, async {
        let (base, store) = start_server().await;
        let client = reqwest::Client::new();
        let user = format!("{base}/api/onboarding/ada");

        let (status, body) = put_json(
            &client,
            format!("{user}/identity"),
            json!({"first_name": "Ada", "last_name": "Lovelace"}),
        )
        .await;
        assert_eq!(status, 200);
        assert_eq!(body["current_checkpoint"], 2);

        let (_, body) = put_json(
            &client,
            format!("{user}/goals"),
            json!({"goals": ["strength", "endurance"]}),
        )
        .await;
        assert_eq!(body["current_checkpoint"], 3);

        let (_, body) = put_json(
            &client,
            format!("{user}/movement"),
            json!({"activities": {"running": {"frequency": 3}}}),
        )
        .await;
        assert_eq!(body["current_checkpoint"], 4);

        let (_, body) = put_json(
            &client,
            format!("{user}/equipment"),
            json!({"equipment": ["dumbbells"]}),
        )
        .await;
        assert_eq!(body["current_checkpoint"], 5);

        let resp = client
            .put(format!("{user}/commitment"))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["current_checkpoint"], 6);
        assert_eq!(body["is_complete"], false);

        // Going back keeps answers and moves the pointer.
        let resp = client
            .post(format!("{user}/advance"))
            .json(&json!({"step": 2}))
            .send()
            .await
            .unwrap();
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["current_checkpoint"], 2);

        let resp = client
            .post(format!("{user}/complete"))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["is_complete"], true);
        assert_eq!(body["should_show_onboarding"], false);
        assert_eq!(body["current_checkpoint"], 6);

        let profile = store.get_profile("ada").await.unwrap().unwrap();
        assert!(profile.onboarding_completed);
        assert_eq!(profile.fitness_goals.len(), 2);

        let (status, body) = get_json(format!("{user}/profile")).await;
        assert_eq!(status, 200);
        assert_eq!(body["first_name"], "Ada");
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn activity_stats_round_trip() {
    timeout(TEST_TIMEOUT, async {
        let (base, _store) = start_server().await;
        let client = reqwest::Client::new();
        let user = format!("{base}/api/users/u1");

        for kind in ["walk", "gym"] {
            let resp = client
                .post(format!("{user}/activities"))
                .json(&json!({"kind": kind}))
                .send()
                .await
                .unwrap();
            assert_eq!(resp.status(), 201);
        }

        let resp = client
            .post(format!("{user}/weeks"))
            .json(&json!({"week_start": "2026-10-12", "activity_count": 4, "target_met": true}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 201);

        // Without an explicit flag the configured weekly target decides.
        for (week, count) in [("2026-10-05", 3), ("2026-09-28", 1)] {
            let resp = client
                .post(format!("{user}/weeks"))
                .json(&json!({"week_start": week, "activity_count": count}))
                .send()
                .await
                .unwrap();
            assert_eq!(resp.status(), 201);
        }

        let (status, body) = get_json(format!("{user}/stats")).await;
        assert_eq!(status, 200);
        assert_eq!(
            body,
            json!({"activity_count": 2, "weekly_summary_count": 3, "weeks_target_met": 2})
        );
    })
    .await
    .expect("test timed out");
}
