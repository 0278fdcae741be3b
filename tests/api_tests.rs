// tests/api_tests.rs

use quizhub::{config::Config, routes, state::AppState};

/// Helper function to spawn the app on a random port for testing.
/// Returns the base URL (e.g., "http://127.0.0.1:12345").
///
/// The app runs on the in-memory repositories, so no database is needed.
async fn spawn_app() -> String {
    let config = Config {
        database_url: "unused-in-memory".to_string(),
        jwt_secret: "test_secret_for_integration_tests".to_string(),
        jwt_expiration: 600, // 10 minutes for tests
        rust_log: "error".to_string(),
        port: 0,
    };

    let state = AppState::in_memory(config);
    let app = routes::create_router(state);

    // Bind to port 0 to get a random available port
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");

    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    // Spawn the server in the background
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    address
}

/// Registers a user and returns (token, user id).
async fn register_and_login(
    client: &reqwest::Client,
    address: &str,
    username: &str,
) -> (String, i64) {
    client
        .post(format!("{}/api/auth/register", address))
        .json(&serde_json::json!({
            "username": username,
            "password": "password123"
        }))
        .send()
        .await
        .expect("Register failed");

    let login: serde_json::Value = client
        .post(format!("{}/api/auth/login", address))
        .json(&serde_json::json!({
            "username": username,
            "password": "password123"
        }))
        .send()
        .await
        .expect("Login failed")
        .json()
        .await
        .expect("Failed to parse login json");

    let token = login["token"].as_str().expect("Token not found").to_string();
    let user_id = login["userId"].as_i64().expect("userId not found");
    (token, user_id)
}

fn unique_name(prefix: &str) -> String {
    // Truncate UUID to keep usernames alphanumeric and short
    let suffix: String = uuid::Uuid::new_v4()
        .simple()
        .to_string()
        .chars()
        .take(8)
        .collect();
    format!("{}{}", prefix, suffix)
}

/// A two-question text quiz payload; duration arrives in minutes.
fn quiz_payload(private: bool) -> serde_json::Value {
    serde_json::json!({
        "title": "Capitals of Europe",
        "description": "Name the capitals",
        "duration": 5,
        "private": private,
        "bonuses": [
            { "time": 3, "points": 5 },
            { "time": 1, "points": 10 }
        ],
        "questions": [
            {
                "name": "Capital of France?",
                "type": "text",
                "maxPoints": 10,
                "fields": [
                    { "name": "answer", "value": "Paris" }
                ]
            },
            {
                "name": "Capital of Italy?",
                "type": "text",
                "maxPoints": 10,
                "fields": [
                    { "name": "answer", "value": "Rome" }
                ]
            }
        ]
    })
}

#[tokio::test]
async fn health_check_404() {
    // Arrange
    let address = spawn_app().await;
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
    let address = spawn_app().await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{}/api/auth/register", address))
        .json(&serde_json::json!({
            "username": unique_name("u"),
            "password": "password123"
        }))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 201);
}

#[tokio::test]
async fn register_fails_validation() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();

    // Act: Send a username that is too short
    let response = client
        .post(format!("{}/api/auth/register", address))
        .json(&serde_json::json!({
            "username": "yo",
            "password": "password123"
        }))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 400);
}

#[tokio::test]
async fn duplicate_username_conflicts() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let username = unique_name("u");

    for expected_status in [201, 409] {
        let response = client
            .post(format!("{}/api/auth/register", address))
            .json(&serde_json::json!({
                "username": username,
                "password": "password123"
            }))
            .send()
            .await
            .expect("Failed to execute request");
        assert_eq!(response.status().as_u16(), expected_status);
    }
}

#[tokio::test]
async fn protected_routes_require_a_token() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{}/api/play/start", address))
        .json(&serde_json::json!({ "quizId": 1, "username": "nobody" }))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 401);
}

#[tokio::test]
async fn full_play_flow_over_http() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();

    let author = unique_name("author");
    let player = unique_name("player");
    let (author_token, _) = register_and_login(&client, &address, &author).await;
    let (player_token, _) = register_and_login(&client, &address, &player).await;

    // 1. Author creates the quiz.
    let created: serde_json::Value = client
        .post(format!("{}/api/quizzes/create", address))
        .header("Authorization", format!("Bearer {}", author_token))
        .json(&quiz_payload(false))
        .send()
        .await
        .expect("Create quiz failed")
        .json()
        .await
        .expect("Failed to parse create json");
    let quiz_id = created["id"].as_i64().expect("Quiz id missing");

    // 2. Player starts a session; the timer is seeded with 5 * 60 seconds.
    let started: serde_json::Value = client
        .post(format!("{}/api/play/start", address))
        .header("Authorization", format!("Bearer {}", player_token))
        .json(&serde_json::json!({ "quizId": quiz_id, "username": player }))
        .send()
        .await
        .expect("Start failed")
        .json()
        .await
        .expect("Failed to parse start json");
    let play_id = started["id"].as_i64().expect("Play id missing");

    let time: serde_json::Value = client
        .get(format!("{}/api/play/{}/time", address, play_id))
        .send()
        .await
        .expect("Get time failed")
        .json()
        .await
        .expect("Failed to parse time json");
    assert_eq!(time["time"], 300);

    // 3. The play view exposes the current question without correctness.
    let view: serde_json::Value = client
        .get(format!("{}/api/play/{}", address, play_id))
        .header("Authorization", format!("Bearer {}", player_token))
        .send()
        .await
        .expect("View failed")
        .json()
        .await
        .expect("Failed to parse view json");
    let current_id = view["current"]["id"].as_i64().expect("Current question missing");

    let question: serde_json::Value = client
        .get(format!("{}/api/play/question/{}", address, current_id))
        .header("Authorization", format!("Bearer {}", player_token))
        .send()
        .await
        .expect("Get question failed")
        .json()
        .await
        .expect("Failed to parse question json");
    let fields = question["question"]["fields"].as_array().expect("Fields missing");
    let field_id = fields[0]["id"].as_i64().expect("Field id missing");
    // Text questions never leak the canonical value.
    assert!(fields[0]["value"].is_null());
    assert!(fields[0].get("isCorrect").is_none());

    // 4. Answer both questions.
    let submit: serde_json::Value = client
        .post(format!("{}/api/play/answer", address))
        .header("Authorization", format!("Bearer {}", player_token))
        .json(&serde_json::json!({
            "id": play_id,
            "answers": [
                { "questionId": current_id, "fieldId": field_id, "value": "Paris" }
            ]
        }))
        .send()
        .await
        .expect("Submit failed")
        .json()
        .await
        .expect("Failed to parse submit json");
    let next_id = submit["next"]["id"].as_i64().expect("Next question missing");

    let question: serde_json::Value = client
        .get(format!("{}/api/play/question/{}", address, next_id))
        .header("Authorization", format!("Bearer {}", player_token))
        .send()
        .await
        .expect("Get question failed")
        .json()
        .await
        .expect("Failed to parse question json");
    let field_id = question["question"]["fields"][0]["id"]
        .as_i64()
        .expect("Field id missing");

    let submit: serde_json::Value = client
        .post(format!("{}/api/play/answer", address))
        .header("Authorization", format!("Bearer {}", player_token))
        .json(&serde_json::json!({
            "id": play_id,
            "answers": [
                { "questionId": next_id, "fieldId": field_id, "value": "Rome" }
            ]
        }))
        .send()
        .await
        .expect("Submit failed")
        .json()
        .await
        .expect("Failed to parse submit json");
    assert_eq!(submit["next"], "end");

    // 5. Checkpoint the timer and finish.
    let response = client
        .post(format!("{}/api/play/{}/time", address, play_id))
        .json(&serde_json::json!({ "timeLeft": 200 }))
        .send()
        .await
        .expect("Update time failed");
    assert_eq!(response.status().as_u16(), 201);

    let finished: serde_json::Value = client
        .post(format!("{}/api/play/finish", address))
        .header("Authorization", format!("Bearer {}", player_token))
        .json(&serde_json::json!({ "id": play_id }))
        .send()
        .await
        .expect("Finish failed")
        .json()
        .await
        .expect("Failed to parse finish json");
    assert_eq!(finished["quiz"], quiz_id);

    // 6. A second finish conflicts.
    let response = client
        .post(format!("{}/api/play/finish", address))
        .header("Authorization", format!("Bearer {}", player_token))
        .json(&serde_json::json!({ "id": play_id }))
        .send()
        .await
        .expect("Finish failed");
    assert_eq!(response.status().as_u16(), 409);

    // 7. The quiz view carries the reconciled leaderboard: 20 base points
    // plus the 10-point bonus tier picked for 200 seconds remaining.
    let quiz_view: serde_json::Value = client
        .get(format!("{}/api/quizzes/{}", address, quiz_id))
        .send()
        .await
        .expect("Get quiz failed")
        .json()
        .await
        .expect("Failed to parse quiz json");
    let leaderboard = quiz_view["leaderboard"].as_array().expect("Leaderboard missing");
    assert_eq!(leaderboard.len(), 1);
    assert_eq!(leaderboard[0]["username"], player.as_str());
    assert_eq!(leaderboard[0]["points"], 30.0);
    assert_eq!(leaderboard[0]["bonus"], 10.0);
    assert_eq!(leaderboard[0]["attempts"], 1);
}

#[tokio::test]
async fn private_quiz_invite_flow_over_http() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();

    let author = unique_name("author");
    let player = unique_name("player");
    let (author_token, _) = register_and_login(&client, &address, &author).await;
    let (player_token, _) = register_and_login(&client, &address, &player).await;

    let created: serde_json::Value = client
        .post(format!("{}/api/quizzes/create", address))
        .header("Authorization", format!("Bearer {}", author_token))
        .json(&quiz_payload(true))
        .send()
        .await
        .expect("Create quiz failed")
        .json()
        .await
        .expect("Failed to parse create json");
    let quiz_id = created["id"].as_i64().expect("Quiz id missing");

    // Not invited yet.
    let response = client
        .post(format!("{}/api/play/start", address))
        .header("Authorization", format!("Bearer {}", player_token))
        .json(&serde_json::json!({ "quizId": quiz_id, "username": player }))
        .send()
        .await
        .expect("Start failed");
    assert_eq!(response.status().as_u16(), 403);

    // The author sends an invite; the start now succeeds.
    let response = client
        .post(format!("{}/api/quizzes/invites", address))
        .header("Authorization", format!("Bearer {}", author_token))
        .json(&serde_json::json!({ "id": quiz_id, "invites": [player] }))
        .send()
        .await
        .expect("Send invites failed");
    assert_eq!(response.status().as_u16(), 201);

    let response = client
        .post(format!("{}/api/play/start", address))
        .header("Authorization", format!("Bearer {}", player_token))
        .json(&serde_json::json!({ "quizId": quiz_id, "username": player }))
        .send()
        .await
        .expect("Start failed");
    assert_eq!(response.status().as_u16(), 201);
}

#[tokio::test]
async fn quiz_listing_and_search() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();

    let author = unique_name("author");
    let (author_token, _) = register_and_login(&client, &address, &author).await;

    client
        .post(format!("{}/api/quizzes/create", address))
        .header("Authorization", format!("Bearer {}", author_token))
        .json(&quiz_payload(false))
        .send()
        .await
        .expect("Create quiz failed");

    let listing: serde_json::Value = client
        .get(format!("{}/api/quizzes?search=capitals", address))
        .send()
        .await
        .expect("List failed")
        .json()
        .await
        .expect("Failed to parse list json");
    assert_eq!(listing["pager"]["total"], 1);
    assert_eq!(listing["items"][0]["title"], "Capitals of Europe");

    let listing: serde_json::Value = client
        .get(format!("{}/api/quizzes?search=nomatch", address))
        .send()
        .await
        .expect("List failed")
        .json()
        .await
        .expect("Failed to parse list json");
    assert_eq!(listing["pager"]["total"], 0);

    let latest: serde_json::Value = client
        .get(format!("{}/api/quizzes/latest", address))
        .send()
        .await
        .expect("Latest failed")
        .json()
        .await
        .expect("Failed to parse latest json");
    assert_eq!(latest["quizzes"].as_array().map(Vec::len), Some(1));
}
