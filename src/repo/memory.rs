// src/repo/memory.rs
//
// In-memory implementation of the repository traits, used by the test
// suite and handy for running the app without a database.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::{LeaderboardRepo, PlayRepo, QuizRepo, UserRepo};
use crate::error::AppError;
use crate::models::{
    leaderboard::{LeaderboardEntry, LeaderboardRow},
    play::{NewPlay, PlaySession, ProcessEntry, SessionState},
    question::{Field, Question},
    quiz::{NewQuiz, Quiz, QuizSummary},
    user::User,
};

#[derive(Default)]
struct Inner {
    next_id: i64,
    users: HashMap<i64, User>,
    quizzes: HashMap<i64, Quiz>,
    plays: HashMap<i64, PlaySession>,
    leaderboard: HashMap<i64, LeaderboardEntry>,
}

impl Inner {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn plays_for(&self, quiz_id: i64) -> i64 {
        self.plays.values().filter(|p| p.quiz_id == quiz_id).count() as i64
    }

    fn summary(&self, quiz: &Quiz) -> QuizSummary {
        QuizSummary {
            id: quiz.id,
            title: quiz.title.clone(),
            description: quiz.description.clone(),
            image: quiz.image.clone(),
            duration: quiz.duration,
            private: quiz.private,
            active: quiz.active,
            author_id: quiz.author_id,
            created_at: quiz.created_at,
            question_count: quiz.questions.len() as i64,
            plays: self.plays_for(quiz.id),
        }
    }

    /// Quizzes newest first (insertion ids are monotonic).
    fn quizzes_newest_first(&self) -> Vec<&Quiz> {
        let mut quizzes: Vec<&Quiz> = self.quizzes.values().collect();
        quizzes.sort_by_key(|q| std::cmp::Reverse(q.id));
        quizzes
    }
}

#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserRepo for MemoryStore {
    async fn create(&self, username: &str, password_hash: &str) -> Result<User, AppError> {
        let mut inner = self.inner.write().await;
        if inner.users.values().any(|u| u.username == username) {
            return Err(AppError::Conflict(format!(
                "Username '{}' already exists",
                username
            )));
        }
        let id = inner.next_id();
        let user = User {
            id,
            username: username.to_string(),
            password: password_hash.to_string(),
            created_at: Some(chrono::Utc::now()),
        };
        inner.users.insert(id, user.clone());
        Ok(user)
    }

    async fn by_username(&self, username: &str) -> Result<Option<User>, AppError> {
        let inner = self.inner.read().await;
        Ok(inner
            .users
            .values()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn by_id(&self, id: i64) -> Result<Option<User>, AppError> {
        let inner = self.inner.read().await;
        Ok(inner.users.get(&id).cloned())
    }
}

#[async_trait]
impl QuizRepo for MemoryStore {
    async fn create(&self, quiz: NewQuiz) -> Result<i64, AppError> {
        let mut inner = self.inner.write().await;
        let quiz_id = inner.next_id();

        let mut questions = Vec::with_capacity(quiz.questions.len());
        for (position, question) in quiz.questions.into_iter().enumerate() {
            let question_id = inner.next_id();
            let fields = question
                .fields
                .into_iter()
                .enumerate()
                .map(|(field_position, field)| Field {
                    id: inner.next_id(),
                    question_id,
                    position: field_position as i64,
                    name: field.name,
                    value: field.value,
                    image: field.image,
                    is_correct: field.is_correct,
                })
                .collect();
            questions.push(Question {
                id: question_id,
                quiz_id,
                position: position as i64,
                name: question.name,
                question_type: question.question_type,
                tooltip: question.tooltip,
                image: question.image,
                max_points: question.max_points,
                fields,
            });
        }

        inner.quizzes.insert(
            quiz_id,
            Quiz {
                id: quiz_id,
                title: quiz.title,
                description: quiz.description,
                image: quiz.image,
                duration: quiz.duration,
                end_date: quiz.end_date,
                bonuses: quiz.bonuses,
                private: quiz.private,
                allowed: Vec::new(),
                author_id: quiz.author_id,
                active: true,
                created_at: Some(chrono::Utc::now()),
                questions,
            },
        );

        Ok(quiz_id)
    }

    async fn detailed(&self, id: i64) -> Result<Option<Quiz>, AppError> {
        let inner = self.inner.read().await;
        Ok(inner.quizzes.get(&id).cloned())
    }

    async fn question(&self, id: i64) -> Result<Option<Question>, AppError> {
        let inner = self.inner.read().await;
        Ok(inner
            .quizzes
            .values()
            .flat_map(|q| q.questions.iter())
            .find(|q| q.id == id)
            .cloned())
    }

    async fn list(
        &self,
        search: Option<&str>,
        page: usize,
        page_size: usize,
    ) -> Result<(Vec<QuizSummary>, usize), AppError> {
        let inner = self.inner.read().await;
        let needle = search.map(str::to_lowercase);
        let matching: Vec<&Quiz> = inner
            .quizzes_newest_first()
            .into_iter()
            .filter(|q| match &needle {
                Some(needle) => q.title.to_lowercase().contains(needle),
                None => true,
            })
            .collect();

        let total = matching.len();
        let start = page.saturating_sub(1) * page_size;
        let items = matching
            .into_iter()
            .skip(start)
            .take(page_size)
            .map(|q| inner.summary(q))
            .collect();

        Ok((items, total))
    }

    async fn latest(&self, limit: i64) -> Result<Vec<QuizSummary>, AppError> {
        let inner = self.inner.read().await;
        Ok(inner
            .quizzes_newest_first()
            .into_iter()
            .take(limit as usize)
            .map(|q| inner.summary(q))
            .collect())
    }

    async fn most_played(&self, limit: i64) -> Result<Vec<QuizSummary>, AppError> {
        let inner = self.inner.read().await;
        let mut summaries: Vec<QuizSummary> = inner
            .quizzes
            .values()
            .map(|q| inner.summary(q))
            .collect();
        summaries.sort_by_key(|s| (std::cmp::Reverse(s.plays), std::cmp::Reverse(s.id)));
        summaries.truncate(limit as usize);
        Ok(summaries)
    }

    async fn set_active(&self, id: i64, active: bool) -> Result<(), AppError> {
        let mut inner = self.inner.write().await;
        if let Some(quiz) = inner.quizzes.get_mut(&id) {
            quiz.active = active;
        }
        Ok(())
    }

    async fn set_allowed(&self, id: i64, allowed: &[String]) -> Result<(), AppError> {
        let mut inner = self.inner.write().await;
        if let Some(quiz) = inner.quizzes.get_mut(&id) {
            quiz.allowed = allowed.to_vec();
        }
        Ok(())
    }

    async fn delete(&self, id: i64) -> Result<(), AppError> {
        let mut inner = self.inner.write().await;
        inner.quizzes.remove(&id);
        Ok(())
    }
}

#[async_trait]
impl PlayRepo for MemoryStore {
    async fn create(&self, play: NewPlay) -> Result<PlaySession, AppError> {
        let mut inner = self.inner.write().await;
        let id = inner.next_id();
        let session = PlaySession {
            id,
            quiz_id: play.quiz_id,
            author_id: play.author_id,
            process: play.process,
            points: 0.0,
            time_left: play.time_left,
            state: SessionState::InProgress,
            version: 0,
            created_at: Some(chrono::Utc::now()),
        };
        inner.plays.insert(id, session.clone());
        Ok(session)
    }

    async fn by_id(&self, id: i64) -> Result<Option<PlaySession>, AppError> {
        let inner = self.inner.read().await;
        Ok(inner.plays.get(&id).cloned())
    }

    async fn update_progress(
        &self,
        id: i64,
        expected_version: i64,
        process: &[ProcessEntry],
        points: f64,
    ) -> Result<bool, AppError> {
        let mut inner = self.inner.write().await;
        let Some(play) = inner.plays.get_mut(&id) else {
            return Ok(false);
        };
        if play.state == SessionState::Finished || play.version != expected_version {
            return Ok(false);
        }
        play.process = process.to_vec();
        play.points = points;
        play.version += 1;
        Ok(true)
    }

    async fn set_time(&self, id: i64, time_left: i64) -> Result<bool, AppError> {
        let mut inner = self.inner.write().await;
        let Some(play) = inner.plays.get_mut(&id) else {
            return Ok(false);
        };
        if play.state == SessionState::Finished {
            return Ok(false);
        }
        play.time_left = time_left;
        Ok(true)
    }

    async fn mark_finished(&self, id: i64) -> Result<Option<PlaySession>, AppError> {
        let mut inner = self.inner.write().await;
        let Some(play) = inner.plays.get_mut(&id) else {
            return Ok(None);
        };
        if play.state == SessionState::Finished {
            return Ok(None);
        }
        play.state = SessionState::Finished;
        Ok(Some(play.clone()))
    }

    async fn count_attempts(&self, quiz_id: i64, author_id: i64) -> Result<i64, AppError> {
        let inner = self.inner.read().await;
        Ok(inner
            .plays
            .values()
            .filter(|p| p.quiz_id == quiz_id && p.author_id == author_id)
            .count() as i64)
    }

    async fn delete_by_quiz(&self, quiz_id: i64) -> Result<(), AppError> {
        let mut inner = self.inner.write().await;
        inner.plays.retain(|_, p| p.quiz_id != quiz_id);
        Ok(())
    }
}

#[async_trait]
impl LeaderboardRepo for MemoryStore {
    async fn entry(
        &self,
        quiz_id: i64,
        author_id: i64,
    ) -> Result<Option<LeaderboardEntry>, AppError> {
        let inner = self.inner.read().await;
        Ok(inner
            .leaderboard
            .values()
            .find(|e| e.quiz_id == quiz_id && e.author_id == author_id)
            .cloned())
    }

    async fn upsert_max(
        &self,
        quiz_id: i64,
        author_id: i64,
        points: f64,
        bonus: f64,
        attempts: i64,
    ) -> Result<(), AppError> {
        let mut inner = self.inner.write().await;
        let existing = inner
            .leaderboard
            .values_mut()
            .find(|e| e.quiz_id == quiz_id && e.author_id == author_id);

        match existing {
            Some(entry) => {
                if entry.points < points {
                    entry.points = points;
                    entry.bonus = bonus;
                    entry.attempts = attempts;
                }
            }
            None => {
                let id = inner.next_id();
                inner.leaderboard.insert(
                    id,
                    LeaderboardEntry {
                        id,
                        quiz_id,
                        author_id,
                        points,
                        bonus,
                        attempts,
                    },
                );
            }
        }
        Ok(())
    }

    async fn top_for_quiz(
        &self,
        quiz_id: i64,
        limit: i64,
    ) -> Result<Vec<LeaderboardRow>, AppError> {
        let inner = self.inner.read().await;
        let mut entries: Vec<&LeaderboardEntry> = inner
            .leaderboard
            .values()
            .filter(|e| e.quiz_id == quiz_id)
            .collect();
        entries.sort_by(|a, b| b.points.total_cmp(&a.points));

        Ok(entries
            .into_iter()
            .take(limit as usize)
            .map(|e| LeaderboardRow {
                username: inner
                    .users
                    .get(&e.author_id)
                    .map(|u| u.username.clone())
                    .unwrap_or_default(),
                points: e.points,
                bonus: e.bonus,
                attempts: e.attempts,
            })
            .collect())
    }

    async fn delete_by_quiz(&self, quiz_id: i64) -> Result<(), AppError> {
        let mut inner = self.inner.write().await;
        inner.leaderboard.retain(|_, e| e.quiz_id != quiz_id);
        Ok(())
    }
}
