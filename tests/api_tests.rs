// tests/api_tests.rs

use chrono::{Duration, Utc};
use lms_backend::{config::Config, db, routes, state::AppState, utils::hash::hash_password};
use axum::{body::Body, http::Request};
use sqlx::SqlitePool;
use tower::ServiceExt;

struct TestApp {
    address: String,
    pool: SqlitePool,
}

/// Test state over a fresh in-memory database.
async fn test_state() -> AppState {
    let pool = db::connect_in_memory()
        .await
        .expect("Failed to open in-memory database");

    let config = Config {
        database_url: "sqlite::memory:".to_string(),
        jwt_secret: "test_secret_for_integration_tests".to_string(),
        jwt_expiration: 600, // 10 minutes for tests
        rust_log: "error".to_string(),
        admin_username: None,
        admin_password: None,
        sweep_interval_secs: 0,
        bind_addr: "127.0.0.1:0".to_string(),
    };

    AppState::new(pool, config)
}

/// Helper function to spawn the app on a random port for testing.
/// Each app gets its own in-memory database.
async fn spawn_app() -> TestApp {
    // 1. Create the state over a migrated pool
    let state = test_state().await;
    let pool = state.pool.clone();

    // 2. Create the router with the app state
    let app = routes::create_router(state);

    // 3. Bind to port 0 to get a random available port
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");

    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    // 4. Spawn the server in the background
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestApp { address, pool }
}

fn unique_name(prefix: &str) -> String {
    format!("{}_{}", prefix, &uuid::Uuid::new_v4().to_string()[..8])
}

async fn seed_admin(pool: &SqlitePool) -> (String, String) {
    let username = unique_name("admin");
    let password = "admin123".to_string();
    sqlx::query("INSERT INTO users (username, password, role, name) VALUES (?, ?, 'admin', 'Administrator')")
        .bind(&username)
        .bind(hash_password(&password).unwrap())
        .execute(pool)
        .await
        .unwrap();
    (username, password)
}

async fn login(client: &reqwest::Client, address: &str, username: &str, password: &str) -> String {
    let resp = client
        .post(format!("{}/api/auth/login", address))
        .json(&serde_json::json!({ "username": username, "password": password }))
        .send()
        .await
        .expect("Login failed")
        .json::<serde_json::Value>()
        .await
        .expect("Failed to parse login json");

    resp["token"].as_str().expect("Token not found").to_string()
}

async fn register_student(client: &reqwest::Client, address: &str) -> String {
    let username = unique_name("s");
    let password = "password123";
    let resp = client
        .post(format!("{}/api/auth/register", address))
        .json(&serde_json::json!({ "username": username, "password": password, "name": "Budi" }))
        .send()
        .await
        .expect("Register failed");
    assert_eq!(resp.status().as_u16(), 201);

    login(client, address, &username, password).await
}

async fn create_question(
    client: &reqwest::Client,
    address: &str,
    token: &str,
    category: &str,
    answer: &str,
) -> i64 {
    let resp = client
        .post(format!("{}/api/admin/questions", address))
        .bearer_auth(token)
        .json(&serde_json::json!({
            "category": category,
            "content": "<p>Pick one</p>",
            "options": [
                {"text": "A", "image_url": null},
                {"text": "B", "image_url": null},
                {"text": "C", "image_url": null}
            ],
            "answer": answer
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 201);

    let body: serde_json::Value = resp.json().await.unwrap();
    body["id"].as_i64().unwrap()
}

#[tokio::test]
async fn unknown_path_is_404() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    let response = client
        .get(format!("{}/random_path_that_does_not_exist", app.address))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn register_fails_validation() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    // Username too short
    let response = client
        .post(format!("{}/api/auth/register", app.address))
        .json(&serde_json::json!({ "username": "yo", "password": "password123" }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 400);
}

#[tokio::test]
async fn duplicate_username_conflicts() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();
    let body = serde_json::json!({ "username": "siswa1", "password": "password123" });

    let first = client
        .post(format!("{}/api/auth/register", app.address))
        .json(&body)
        .send()
        .await
        .unwrap();
    let second = client
        .post(format!("{}/api/auth/register", app.address))
        .json(&body)
        .send()
        .await
        .unwrap();

    assert_eq!(first.status().as_u16(), 201);
    assert_eq!(second.status().as_u16(), 409);
}

#[tokio::test]
async fn exam_routes_require_auth_and_admin_routes_require_admin() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    let anonymous = client
        .get(format!("{}/api/exams", app.address))
        .send()
        .await
        .unwrap();
    assert_eq!(anonymous.status().as_u16(), 401);

    let student = register_student(&client, &app.address).await;
    let forbidden = client
        .get(format!("{}/api/admin/results", app.address))
        .bearer_auth(&student)
        .send()
        .await
        .unwrap();
    assert_eq!(forbidden.status().as_u16(), 403);
}

#[tokio::test]
async fn change_password_flow() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();
    let username = unique_name("pw");

    client
        .post(format!("{}/api/auth/register", app.address))
        .json(&serde_json::json!({ "username": username, "password": "oldpass1" }))
        .send()
        .await
        .unwrap();
    let token = login(&client, &app.address, &username, "oldpass1").await;

    let wrong = client
        .put(format!("{}/api/auth/password", app.address))
        .bearer_auth(&token)
        .json(&serde_json::json!({ "old_password": "nope", "new_password": "newpass1" }))
        .send()
        .await
        .unwrap();
    assert_eq!(wrong.status().as_u16(), 401);

    let ok = client
        .put(format!("{}/api/auth/password", app.address))
        .bearer_auth(&token)
        .json(&serde_json::json!({ "old_password": "oldpass1", "new_password": "newpass1" }))
        .send()
        .await
        .unwrap();
    assert_eq!(ok.status().as_u16(), 204);

    let relogin = client
        .post(format!("{}/api/auth/login", app.address))
        .json(&serde_json::json!({ "username": username, "password": "newpass1" }))
        .send()
        .await
        .unwrap();
    assert_eq!(relogin.status().as_u16(), 200);
}

#[tokio::test]
async fn scheduled_exam_flow() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();
    let base = app.address.clone();

    // 0. Admin authors the exam
    let (admin_user, admin_pass) = seed_admin(&app.pool).await;
    let admin = login(&client, &base, &admin_user, &admin_pass).await;

    let q1 = create_question(&client, &base, &admin, "Math", "A").await;
    let q2 = create_question(&client, &base, &admin, "Math", "B").await;

    let schedule = client
        .put(format!("{}/api/admin/schedules/Math", base))
        .bearer_auth(&admin)
        .json(&serde_json::json!({
            "open_time": Utc::now() - Duration::hours(1),
            "close_time": Utc::now() + Duration::days(1),
            "duration_minutes": 30,
            "max_attempts": 1
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(schedule.status().as_u16(), 200);

    // 1. Student sees the exam as open
    let student = register_student(&client, &base).await;
    let list: Vec<serde_json::Value> = client
        .get(format!("{}/api/exams", base))
        .bearer_auth(&student)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0]["category"], "Math");
    assert_eq!(list[0]["status"], "open");
    assert_eq!(list[0]["question_count"], 2);
    assert_eq!(list[0]["in_progress"], false);

    // 2. Start, and a second start conflicts
    let start = client
        .post(format!("{}/api/exams/Math/start", base))
        .bearer_auth(&student)
        .send()
        .await
        .unwrap();
    assert_eq!(start.status().as_u16(), 201);
    let view: serde_json::Value = start.json().await.unwrap();
    assert!(view["remaining_seconds"].as_i64().unwrap() > 0);

    let again = client
        .post(format!("{}/api/exams/Math/start", base))
        .bearer_auth(&student)
        .send()
        .await
        .unwrap();
    assert_eq!(again.status().as_u16(), 409);

    // 3. The exam page hides answer keys
    let page: serde_json::Value = client
        .get(format!("{}/api/exams/Math", base))
        .bearer_auth(&student)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let questions = page["questions"].as_array().unwrap();
    assert_eq!(questions.len(), 2);
    assert!(questions.iter().all(|q| q.get("answer").is_none()));

    // 4. Answer q1 right and mark it doubtful, then flush q2 wrong
    let single = client
        .put(format!("{}/api/exams/Math/answers/{}", base, q1))
        .bearer_auth(&student)
        .json(&serde_json::json!({ "answer": "A", "doubtful": true }))
        .send()
        .await
        .unwrap();
    assert_eq!(single.status().as_u16(), 204);

    let batch = client
        .put(format!("{}/api/exams/Math/answers", base))
        .bearer_auth(&student)
        .json(&serde_json::json!({ "answers": { (q2.to_string()): { "answer": "C", "doubtful": false } } }))
        .send()
        .await
        .unwrap();
    assert_eq!(batch.status().as_u16(), 200);

    // 5. Reload keeps the answers
    let page: serde_json::Value = client
        .get(format!("{}/api/exams/Math", base))
        .bearer_auth(&student)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(page["answers"][q1.to_string()]["answer"], "A");
    assert_eq!(page["answers"][q1.to_string()]["doubtful"], true);
    assert_eq!(page["answers"][q2.to_string()]["answer"], "C");

    // 6. Submit
    let submit: serde_json::Value = client
        .post(format!("{}/api/exams/Math/submit", base))
        .bearer_auth(&student)
        .json(&serde_json::json!({}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(submit["auto_submitted"], false);
    assert_eq!(submit["result"]["score"], 50.0);
    assert_eq!(submit["result"]["total_questions"], 2);

    // 7. The single allowed attempt is used up
    let retry = client
        .post(format!("{}/api/exams/Math/start", base))
        .bearer_auth(&student)
        .send()
        .await
        .unwrap();
    assert_eq!(retry.status().as_u16(), 403);

    // 8. Report card and admin report
    let mine: serde_json::Value = client
        .get(format!("{}/api/results/me", base))
        .bearer_auth(&student)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(mine["exams_taken"], 1);
    assert_eq!(mine["average_score"], 50.0);

    let all: Vec<serde_json::Value> = client
        .get(format!("{}/api/admin/results", base))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0]["category"], "Math");
}

#[tokio::test]
async fn expired_attempt_is_submitted_on_next_view() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();
    let base = app.address.clone();

    let (admin_user, admin_pass) = seed_admin(&app.pool).await;
    let admin = login(&client, &base, &admin_user, &admin_pass).await;
    create_question(&client, &base, &admin, "Physics", "A").await;

    client
        .put(format!("{}/api/admin/schedules/Physics", base))
        .bearer_auth(&admin)
        .json(&serde_json::json!({
            "open_time": Utc::now() - Duration::hours(3),
            "close_time": Utc::now() + Duration::days(1),
            "duration_minutes": 10,
            "max_attempts": 2
        }))
        .send()
        .await
        .unwrap();

    let student = register_student(&client, &base).await;
    client
        .post(format!("{}/api/exams/Physics/start", base))
        .bearer_auth(&student)
        .send()
        .await
        .unwrap();

    // The student walked away two hours ago.
    sqlx::query("UPDATE exam_attempts SET start_time = ?")
        .bind(Utc::now() - Duration::hours(2))
        .execute(&app.pool)
        .await
        .unwrap();

    let late_save = client
        .put(format!("{}/api/exams/Physics/answers", base))
        .bearer_auth(&student)
        .json(&serde_json::json!({ "answers": {} }))
        .send()
        .await
        .unwrap();
    assert_eq!(late_save.status().as_u16(), 409);

    let page: serde_json::Value = client
        .get(format!("{}/api/exams/Physics", base))
        .bearer_auth(&student)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(page["attempt"].is_null());
    assert!(page["finalized"].is_null());

    let results: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM exam_results")
        .fetch_one(&app.pool)
        .await
        .unwrap();
    assert_eq!(results, 1);
}

#[tokio::test]
async fn invalid_question_is_rejected() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();
    let (admin_user, admin_pass) = seed_admin(&app.pool).await;
    let admin = login(&client, &app.address, &admin_user, &admin_pass).await;

    let resp = client
        .post(format!("{}/api/admin/questions", app.address))
        .bearer_auth(&admin)
        .json(&serde_json::json!({
            "category": "Math",
            "content": "Pick one",
            "options": [{"text": "A", "image_url": null}, {"text": "B", "image_url": null}],
            "answer": "Z"
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status().as_u16(), 400);
}

#[tokio::test]
async fn router_rejects_missing_token_without_a_socket() {
    let app = routes::create_router(test_state().await);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/results/me")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 401);
}

#[tokio::test]
async fn overlong_answer_is_rejected() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();
    let (admin_user, admin_pass) = seed_admin(&app.pool).await;
    let admin = login(&client, &app.address, &admin_user, &admin_pass).await;
    let q1 = create_question(&client, &app.address, &admin, "Biology", "A").await;

    let student = register_student(&client, &app.address).await;
    client
        .post(format!("{}/api/exams/Biology/start", app.address))
        .bearer_auth(&student)
        .send()
        .await
        .unwrap();

    let resp = client
        .put(format!("{}/api/exams/Biology/answers/{}", app.address, q1))
        .bearer_auth(&student)
        .json(&serde_json::json!({ "answer": "A".repeat(501), "doubtful": false }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 400);

    let stored: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM buffered_answers")
        .fetch_one(&app.pool)
        .await
        .unwrap();
    assert_eq!(stored, 0);
}
