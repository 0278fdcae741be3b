// src/state.rs

use std::sync::Arc;

use axum::extract::FromRef;
use sqlx::PgPool;

use crate::config::Config;
use crate::engine::PlayEngine;
use crate::repo::{LeaderboardRepo, QuizRepo, UserRepo, memory::MemoryStore, pg::PgStore};

/// Shared application state: the repository interfaces, the play engine
/// wired on top of them, and the configuration.
#[derive(Clone)]
pub struct AppState {
    pub users: Arc<dyn UserRepo>,
    pub quizzes: Arc<dyn QuizRepo>,
    pub leaderboard: Arc<dyn LeaderboardRepo>,
    pub engine: PlayEngine,
    pub config: Config,
}

impl AppState {
    /// Production wiring: every repository backed by Postgres.
    pub fn postgres(pool: PgPool, config: Config) -> Self {
        let store = Arc::new(PgStore::new(pool));
        Self::from_store(store, config)
    }

    /// Test/local wiring: every repository backed by shared in-memory maps.
    pub fn in_memory(config: Config) -> Self {
        let store = Arc::new(MemoryStore::new());
        Self::from_store(store, config)
    }

    fn from_store<S>(store: Arc<S>, config: Config) -> Self
    where
        S: UserRepo + QuizRepo + crate::repo::PlayRepo + LeaderboardRepo + 'static,
    {
        let engine = PlayEngine::new(store.clone(), store.clone(), store.clone());
        Self {
            users: store.clone(),
            quizzes: store.clone(),
            leaderboard: store,
            engine,
            config,
        }
    }
}

impl FromRef<AppState> for Config {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}
