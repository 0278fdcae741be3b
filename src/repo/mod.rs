// src/repo/mod.rs
//
// Storage capabilities as explicit interfaces. The engine and the handlers
// only ever see these traits; `pg` is the Postgres implementation used in
// production and `memory` backs the test suite.

pub mod memory;
pub mod pg;

use async_trait::async_trait;

use crate::error::AppError;
use crate::models::{
    leaderboard::{LeaderboardEntry, LeaderboardRow},
    play::{NewPlay, PlaySession, ProcessEntry},
    question::Question,
    quiz::{NewQuiz, Quiz, QuizSummary},
    user::User,
};

#[async_trait]
pub trait UserRepo: Send + Sync {
    /// Inserts a new user. Fails with `Conflict` if the username is taken.
    async fn create(&self, username: &str, password_hash: &str) -> Result<User, AppError>;

    async fn by_username(&self, username: &str) -> Result<Option<User>, AppError>;

    async fn by_id(&self, id: i64) -> Result<Option<User>, AppError>;
}

#[async_trait]
pub trait QuizRepo: Send + Sync {
    /// Inserts a quiz with its questions and fields in one transaction.
    /// Returns the new quiz id.
    async fn create(&self, quiz: NewQuiz) -> Result<i64, AppError>;

    /// Loads a quiz with its full question list, correctness included.
    async fn detailed(&self, id: i64) -> Result<Option<Quiz>, AppError>;

    /// Loads a single question with its fields.
    async fn question(&self, id: i64) -> Result<Option<Question>, AppError>;

    /// Paginated listing, newest first, optionally filtered by a
    /// case-insensitive title substring. Returns the page and the total
    /// match count.
    async fn list(
        &self,
        search: Option<&str>,
        page: usize,
        page_size: usize,
    ) -> Result<(Vec<QuizSummary>, usize), AppError>;

    async fn latest(&self, limit: i64) -> Result<Vec<QuizSummary>, AppError>;

    async fn most_played(&self, limit: i64) -> Result<Vec<QuizSummary>, AppError>;

    async fn set_active(&self, id: i64, active: bool) -> Result<(), AppError>;

    async fn set_allowed(&self, id: i64, allowed: &[String]) -> Result<(), AppError>;

    /// Deletes the quiz with its questions and fields. Sessions and
    /// leaderboard entries must be removed first (the engine orchestrates
    /// the full cascade).
    async fn delete(&self, id: i64) -> Result<(), AppError>;
}

#[async_trait]
pub trait PlayRepo: Send + Sync {
    async fn create(&self, play: NewPlay) -> Result<PlaySession, AppError>;

    async fn by_id(&self, id: i64) -> Result<Option<PlaySession>, AppError>;

    /// Compare-and-swap progress write: replaces `process` and `points`
    /// and bumps the version, but only if the stored version still equals
    /// `expected_version` and the session is not finished. Returns whether
    /// the write applied.
    async fn update_progress(
        &self,
        id: i64,
        expected_version: i64,
        process: &[ProcessEntry],
        points: f64,
    ) -> Result<bool, AppError>;

    /// Overwrites the remaining-time checkpoint of an unfinished session.
    /// Returns false if the session is missing or already finished.
    async fn set_time(&self, id: i64, time_left: i64) -> Result<bool, AppError>;

    /// Claims the terminal transition. Returns the session as it was at
    /// claim time, or None if it was already finished.
    async fn mark_finished(&self, id: i64) -> Result<Option<PlaySession>, AppError>;

    /// Counts every attempt (finished or not) by a player on a quiz.
    async fn count_attempts(&self, quiz_id: i64, author_id: i64) -> Result<i64, AppError>;

    async fn delete_by_quiz(&self, quiz_id: i64) -> Result<(), AppError>;
}

#[async_trait]
pub trait LeaderboardRepo: Send + Sync {
    async fn entry(
        &self,
        quiz_id: i64,
        author_id: i64,
    ) -> Result<Option<LeaderboardEntry>, AppError>;

    /// Creates the entry, or updates it only while the new points beat the
    /// stored ones. The conditional write keeps `points` monotonic under
    /// concurrent finishes.
    async fn upsert_max(
        &self,
        quiz_id: i64,
        author_id: i64,
        points: f64,
        bonus: f64,
        attempts: i64,
    ) -> Result<(), AppError>;

    /// Top entries for a quiz, highest points first, joined with usernames.
    async fn top_for_quiz(&self, quiz_id: i64, limit: i64)
        -> Result<Vec<LeaderboardRow>, AppError>;

    async fn delete_by_quiz(&self, quiz_id: i64) -> Result<(), AppError>;
}
