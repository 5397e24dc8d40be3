// tests/api_tests.rs

use std::sync::Arc;

use tryout_backend::config::Config;
use tryout_backend::engine::SimulationEngine;
use tryout_backend::engine::subtest::Subtest;
use tryout_backend::engine::timer::SystemClock;
use tryout_backend::models::answer::{AnswerOption, Scope};
use tryout_backend::models::question::StoredQuestion;
use tryout_backend::routes;
use tryout_backend::state::AppState;
use tryout_backend::store::ExamStore;
use tryout_backend::store::memory::MemoryStore;

/// Helper function to spawn the app on a random port for testing.
/// Runs over the in-memory store, so no external database is needed.
/// Returns the base URL and the store handle for seeding.
async fn spawn_app() -> (String, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let engine = SimulationEngine::new(
        store.clone() as Arc<dyn ExamStore>,
        Arc::new(SystemClock),
    );

    let config = Config {
        database_url: "unused-in-tests".to_string(),
        bind_addr: "127.0.0.1:0".to_string(),
        rust_log: "error".to_string(),
    };

    let state = AppState {
        store: store.clone() as Arc<dyn ExamStore>,
        engine,
        config,
    };

    let app = routes::create_router(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");

    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (address, store)
}

fn unique_email() -> String {
    format!("u_{}@example.com", &uuid::Uuid::new_v4().to_string()[..8])
}

fn complete_question(text: &str) -> StoredQuestion {
    StoredQuestion {
        question: text.to_string(),
        options: [
            ("A", "first"),
            ("B", "second"),
            ("C", "third"),
            ("D", "fourth"),
            ("E", "fifth"),
        ]
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect(),
    }
}

async fn register(client: &reqwest::Client, address: &str, email: &str) {
    let response = client
        .post(format!("{}/api/auth/register", address))
        .json(&serde_json::json!({
            "email": email,
            "name": "Siti Rahma",
            "university": "Universitas Indonesia",
            "major": "Informatika",
            "target_score": "700"
        }))
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status().as_u16(), 201);
}

#[tokio::test]
async fn health_check_404() {
    // Arrange
    let (address, _store) = spawn_app().await;
    let client = reqwest::Client::new();

    // Act
    let response = client
        .get(format!("{}/random_path_that_does_not_exist", address))
        .send()
        .await
        .expect("Failed to execute request");

    // Assert
    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn register_works() {
    let (address, _store) = spawn_app().await;
    let client = reqwest::Client::new();
    register(&client, &address, &unique_email()).await;
}

#[tokio::test]
async fn register_fails_validation() {
    let (address, _store) = spawn_app().await;
    let client = reqwest::Client::new();

    // Act: Send an invalid email
    let response = client
        .post(format!("{}/api/auth/register", address))
        .json(&serde_json::json!({
            "email": "not-an-email",
            "name": "Siti Rahma",
            "university": "Universitas Indonesia",
            "major": "Informatika",
            "target_score": "700"
        }))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 400);
}

#[tokio::test]
async fn duplicate_registration_conflicts() {
    let (address, _store) = spawn_app().await;
    let client = reqwest::Client::new();
    let email = unique_email();
    register(&client, &address, &email).await;

    let response = client
        .post(format!("{}/api/auth/register", address))
        .json(&serde_json::json!({
            "email": email,
            "name": "Siti Rahma",
            "university": "Universitas Indonesia",
            "major": "Informatika",
            "target_score": "700"
        }))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 409);
}

#[tokio::test]
async fn login_is_an_email_existence_check() {
    let (address, _store) = spawn_app().await;
    let client = reqwest::Client::new();
    let email = unique_email();
    register(&client, &address, &email).await;

    let found = client
        .post(format!("{}/api/auth/login", address))
        .json(&serde_json::json!({ "email": email }))
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(found.status().as_u16(), 200);
    let profile: serde_json::Value = found.json().await.unwrap();
    assert_eq!(profile["email"], email);

    let missing = client
        .post(format!("{}/api/auth/login", address))
        .json(&serde_json::json!({ "email": unique_email() }))
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(missing.status().as_u16(), 404);
}

#[tokio::test]
async fn exercise_flow_records_and_reports_progress() {
    let (address, store) = spawn_app().await;
    let client = reqwest::Client::new();
    let email = unique_email();
    register(&client, &address, &email).await;

    let scope = Scope::Exercise {
        category: Subtest::Mat,
    };
    store.seed_question(scope, 1, complete_question("How many sides has a cube?"));
    store.seed_canonical_answer(scope, 1, AnswerOption::C);

    // Fetch the question (no prior selection).
    let q = client
        .get(format!(
            "{}/api/exercise/penalaran-matematika/questions/1?email={}",
            address, email
        ))
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(q.status().as_u16(), 200);
    let q: serde_json::Value = q.json().await.unwrap();
    assert_eq!(q["category"], "mat");
    assert!(q["selected_option"].is_null());

    // Answer it correctly.
    let submit = client
        .post(format!(
            "{}/api/exercise/penalaran-matematika/questions/1/answer",
            address
        ))
        .json(&serde_json::json!({ "email": email, "selected_option": "C" }))
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(submit.status().as_u16(), 200);

    // The selection shows up on re-fetch and in the progress grid.
    let q: serde_json::Value = client
        .get(format!(
            "{}/api/exercise/mat/questions/1?email={}",
            address, email
        ))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(q["selected_option"], "C");

    let progress: serde_json::Value = client
        .get(format!(
            "{}/api/exercise/mat/progress?email={}",
            address, email
        ))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(progress["answered_count"], 1);
    assert_eq!(progress["correct_count"], 1);
}

#[tokio::test]
async fn missing_question_is_404_and_malformed_is_422() {
    let (address, store) = spawn_app().await;
    let client = reqwest::Client::new();
    let email = unique_email();

    let missing = client
        .get(format!(
            "{}/api/exercise/tps/questions/3?email={}",
            address, email
        ))
        .send()
        .await
        .unwrap();
    assert_eq!(missing.status().as_u16(), 404);

    // Four options only: structurally defective.
    let mut defective = complete_question("Incomplete");
    defective.options.remove("E");
    store.seed_question(
        Scope::Exercise {
            category: Subtest::Tps,
        },
        3,
        defective,
    );

    let malformed = client
        .get(format!(
            "{}/api/exercise/tps/questions/3?email={}",
            address, email
        ))
        .send()
        .await
        .unwrap();
    assert_eq!(malformed.status().as_u16(), 422);

    let unknown_category = client
        .get(format!(
            "{}/api/exercise/history/questions/1?email={}",
            address, email
        ))
        .send()
        .await
        .unwrap();
    assert_eq!(unknown_category.status().as_u16(), 400);
}
