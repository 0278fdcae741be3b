// src/routes.rs

use axum::{
    Router, http::Method, middleware,
    routing::{get, post},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    handlers::{auth, play, quiz},
    state::AppState,
    utils::jwt::auth_middleware,
};

/// Assembles the main application router.
///
/// * Merges all sub-routers (auth, quizzes, play).
/// * Applies global middleware (Trace, CORS).
/// * Injects global state (repositories, engine, config).
pub fn create_router(state: AppState) -> Router {
    let origins = [
        "http://localhost:3000".parse().unwrap(),
        "http://127.0.0.1:3000".parse().unwrap(),
    ];

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
        ]);

    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login));

    let quiz_routes = Router::new()
        .route("/", get(quiz::get_quizzes))
        .route("/latest", get(quiz::latest_quizzes))
        .route("/mostplayed", get(quiz::most_played))
        .route("/{id}", get(quiz::get_quiz))
        // Protected authoring routes
        .merge(
            Router::new()
                .route("/create", post(quiz::create_quiz))
                .route("/action", post(quiz::quiz_action))
                .route("/invites", post(quiz::send_invites))
                .route("/invites/remove", post(quiz::remove_invite))
                .layer(middleware::from_fn_with_state(
                    state.clone(),
                    auth_middleware,
                )),
        );

    let play_routes = Router::new()
        // The timer endpoints are polled without authentication; the
        // session id is the only capability needed for checkpoints.
        .route("/{id}/time", get(play::get_time).post(play::update_time))
        .merge(
            Router::new()
                .route("/start", post(play::start_play))
                .route("/{id}", get(play::get_play_view))
                .route("/question/{id}", get(play::get_question))
                .route("/answer", post(play::submit_answer))
                .route("/finish", post(play::finish_play))
                .layer(middleware::from_fn_with_state(
                    state.clone(),
                    auth_middleware,
                )),
        );

    Router::new()
        .nest("/api/auth", auth_routes)
        .nest("/api/quizzes", quiz_routes)
        .nest("/api/play", play_routes)
        // Global Middleware (applied from outside in)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
