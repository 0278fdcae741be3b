// src/repo/pg.rs

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder, prelude::FromRow, types::Json};

use super::{LeaderboardRepo, PlayRepo, QuizRepo, UserRepo};
use crate::error::AppError;
use crate::models::{
    leaderboard::{LeaderboardEntry, LeaderboardRow},
    play::{NewPlay, PlaySession, ProcessEntry},
    question::{Field, Question},
    quiz::{BonusTier, NewQuiz, Quiz, QuizSummary},
    user::User,
};

/// Postgres-backed implementation of all repository traits.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(FromRow)]
struct UserRow {
    id: i64,
    username: String,
    password: String,
    created_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            id: row.id,
            username: row.username,
            password: row.password,
            created_at: row.created_at,
        }
    }
}

#[derive(FromRow)]
struct QuizRow {
    id: i64,
    title: String,
    description: String,
    image: Option<String>,
    duration: i64,
    end_date: Option<chrono::DateTime<chrono::Utc>>,
    bonuses: Json<Vec<BonusTier>>,
    private: bool,
    allowed: Vec<String>,
    author_id: i64,
    active: bool,
    created_at: Option<chrono::DateTime<chrono::Utc>>,
}

#[derive(FromRow)]
struct QuestionRow {
    id: i64,
    quiz_id: i64,
    position: i64,
    name: String,
    question_type: String,
    tooltip: Option<String>,
    image: Option<String>,
    max_points: f64,
}

impl QuestionRow {
    fn into_question(self, fields: Vec<Field>) -> Result<Question, AppError> {
        Ok(Question {
            id: self.id,
            quiz_id: self.quiz_id,
            position: self.position,
            name: self.name,
            question_type: self.question_type.parse()?,
            tooltip: self.tooltip,
            image: self.image,
            max_points: self.max_points,
            fields,
        })
    }
}

#[derive(FromRow)]
struct FieldRow {
    id: i64,
    question_id: i64,
    position: i64,
    name: String,
    value: String,
    image: Option<String>,
    is_correct: bool,
}

impl From<FieldRow> for Field {
    fn from(row: FieldRow) -> Self {
        Field {
            id: row.id,
            question_id: row.question_id,
            position: row.position,
            name: row.name,
            value: row.value,
            image: row.image,
            is_correct: row.is_correct,
        }
    }
}

#[derive(FromRow)]
struct PlayRow {
    id: i64,
    quiz_id: i64,
    author_id: i64,
    process: Json<Vec<ProcessEntry>>,
    points: f64,
    time_left: i64,
    state: String,
    version: i64,
    created_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl PlayRow {
    fn into_session(self) -> Result<PlaySession, AppError> {
        Ok(PlaySession {
            id: self.id,
            quiz_id: self.quiz_id,
            author_id: self.author_id,
            process: self.process.0,
            points: self.points,
            time_left: self.time_left,
            state: self.state.parse()?,
            version: self.version,
            created_at: self.created_at,
        })
    }
}

#[derive(FromRow)]
struct LeaderboardEntryRow {
    id: i64,
    quiz_id: i64,
    author_id: i64,
    points: f64,
    bonus: f64,
    attempts: i64,
}

impl From<LeaderboardEntryRow> for LeaderboardEntry {
    fn from(row: LeaderboardEntryRow) -> Self {
        LeaderboardEntry {
            id: row.id,
            quiz_id: row.quiz_id,
            author_id: row.author_id,
            points: row.points,
            bonus: row.bonus,
            attempts: row.attempts,
        }
    }
}

const PLAY_COLUMNS: &str =
    "id, quiz_id, author_id, process, points, time_left, state, version, created_at";

const SUMMARY_COLUMNS: &str = "q.id, q.title, q.description, q.image, q.duration, q.private, \
     q.active, q.author_id, q.created_at, \
     (SELECT COUNT(*) FROM questions WHERE quiz_id = q.id) AS question_count, \
     (SELECT COUNT(*) FROM plays WHERE quiz_id = q.id) AS plays";

#[async_trait]
impl UserRepo for PgStore {
    async fn create(&self, username: &str, password_hash: &str) -> Result<User, AppError> {
        let row = sqlx::query_as::<_, UserRow>(
            "INSERT INTO users (username, password)
             VALUES ($1, $2)
             RETURNING id, username, password, created_at",
        )
        .bind(username)
        .bind(password_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            // Postgres error code for unique violation is 23505
            if e.to_string().contains("unique constraint") || e.to_string().contains("23505") {
                AppError::Conflict(format!("Username '{}' already exists", username))
            } else {
                tracing::error!("Failed to create user: {:?}", e);
                AppError::from(e)
            }
        })?;

        Ok(row.into())
    }

    async fn by_username(&self, username: &str) -> Result<Option<User>, AppError> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id, username, password, created_at FROM users WHERE username = $1",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(User::from))
    }

    async fn by_id(&self, id: i64) -> Result<Option<User>, AppError> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id, username, password, created_at FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(User::from))
    }
}

#[async_trait]
impl QuizRepo for PgStore {
    async fn create(&self, quiz: NewQuiz) -> Result<i64, AppError> {
        let mut tx = self.pool.begin().await?;

        let quiz_id: i64 = sqlx::query_scalar(
            "INSERT INTO quizzes
                 (title, description, image, duration, end_date, bonuses, private, author_id)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             RETURNING id",
        )
        .bind(&quiz.title)
        .bind(&quiz.description)
        .bind(&quiz.image)
        .bind(quiz.duration)
        .bind(quiz.end_date)
        .bind(Json(&quiz.bonuses))
        .bind(quiz.private)
        .bind(quiz.author_id)
        .fetch_one(&mut *tx)
        .await?;

        for (position, question) in quiz.questions.iter().enumerate() {
            let question_id: i64 = sqlx::query_scalar(
                "INSERT INTO questions
                     (quiz_id, position, name, type, tooltip, image, max_points)
                 VALUES ($1, $2, $3, $4, $5, $6, $7)
                 RETURNING id",
            )
            .bind(quiz_id)
            .bind(position as i64)
            .bind(&question.name)
            .bind(question.question_type.to_string())
            .bind(&question.tooltip)
            .bind(&question.image)
            .bind(question.max_points)
            .fetch_one(&mut *tx)
            .await?;

            for (field_position, field) in question.fields.iter().enumerate() {
                sqlx::query(
                    "INSERT INTO fields
                         (question_id, position, name, value, image, is_correct)
                     VALUES ($1, $2, $3, $4, $5, $6)",
                )
                .bind(question_id)
                .bind(field_position as i64)
                .bind(&field.name)
                .bind(&field.value)
                .bind(&field.image)
                .bind(field.is_correct)
                .execute(&mut *tx)
                .await?;
            }
        }

        tx.commit().await?;
        Ok(quiz_id)
    }

    async fn detailed(&self, id: i64) -> Result<Option<Quiz>, AppError> {
        let quiz_row = sqlx::query_as::<_, QuizRow>(
            "SELECT id, title, description, image, duration, end_date, bonuses,
                    private, allowed, author_id, active, created_at
             FROM quizzes WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(quiz_row) = quiz_row else {
            return Ok(None);
        };

        let question_rows = sqlx::query_as::<_, QuestionRow>(
            "SELECT id, quiz_id, position, name, type AS question_type,
                    tooltip, image, max_points
             FROM questions WHERE quiz_id = $1 ORDER BY position",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        let question_ids: Vec<i64> = question_rows.iter().map(|q| q.id).collect();
        let field_rows = sqlx::query_as::<_, FieldRow>(
            "SELECT id, question_id, position, name, value, image, is_correct
             FROM fields WHERE question_id = ANY($1) ORDER BY question_id, position",
        )
        .bind(&question_ids)
        .fetch_all(&self.pool)
        .await?;

        let mut questions = Vec::with_capacity(question_rows.len());
        for row in question_rows {
            let fields = field_rows
                .iter()
                .filter(|f| f.question_id == row.id)
                .map(|f| Field {
                    id: f.id,
                    question_id: f.question_id,
                    position: f.position,
                    name: f.name.clone(),
                    value: f.value.clone(),
                    image: f.image.clone(),
                    is_correct: f.is_correct,
                })
                .collect();
            questions.push(row.into_question(fields)?);
        }

        Ok(Some(Quiz {
            id: quiz_row.id,
            title: quiz_row.title,
            description: quiz_row.description,
            image: quiz_row.image,
            duration: quiz_row.duration,
            end_date: quiz_row.end_date,
            bonuses: quiz_row.bonuses.0,
            private: quiz_row.private,
            allowed: quiz_row.allowed,
            author_id: quiz_row.author_id,
            active: quiz_row.active,
            created_at: quiz_row.created_at,
            questions,
        }))
    }

    async fn question(&self, id: i64) -> Result<Option<Question>, AppError> {
        let row = sqlx::query_as::<_, QuestionRow>(
            "SELECT id, quiz_id, position, name, type AS question_type,
                    tooltip, image, max_points
             FROM questions WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let fields = sqlx::query_as::<_, FieldRow>(
            "SELECT id, question_id, position, name, value, image, is_correct
             FROM fields WHERE question_id = $1 ORDER BY position",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(Field::from)
        .collect();

        Ok(Some(row.into_question(fields)?))
    }

    async fn list(
        &self,
        search: Option<&str>,
        page: usize,
        page_size: usize,
    ) -> Result<(Vec<QuizSummary>, usize), AppError> {
        let mut count_query = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM quizzes q");
        if let Some(term) = search {
            count_query
                .push(" WHERE q.title ILIKE ")
                .push_bind(format!("%{}%", term));
        }
        let total: i64 = count_query
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await?;

        let mut query =
            QueryBuilder::<Postgres>::new(format!("SELECT {} FROM quizzes q", SUMMARY_COLUMNS));
        if let Some(term) = search {
            query
                .push(" WHERE q.title ILIKE ")
                .push_bind(format!("%{}%", term));
        }
        query
            .push(" ORDER BY q.created_at DESC LIMIT ")
            .push_bind(page_size as i64)
            .push(" OFFSET ")
            .push_bind((page.saturating_sub(1) * page_size) as i64);

        let rows: Vec<QuizSummary> = query.build_query_as().fetch_all(&self.pool).await?;
        Ok((rows, total as usize))
    }

    async fn latest(&self, limit: i64) -> Result<Vec<QuizSummary>, AppError> {
        let rows = sqlx::query_as::<_, QuizSummary>(&format!(
            "SELECT {} FROM quizzes q ORDER BY q.created_at DESC LIMIT $1",
            SUMMARY_COLUMNS
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    async fn most_played(&self, limit: i64) -> Result<Vec<QuizSummary>, AppError> {
        let rows = sqlx::query_as::<_, QuizSummary>(&format!(
            "SELECT {} FROM quizzes q ORDER BY plays DESC, q.created_at DESC LIMIT $1",
            SUMMARY_COLUMNS
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    async fn set_active(&self, id: i64, active: bool) -> Result<(), AppError> {
        sqlx::query("UPDATE quizzes SET active = $2 WHERE id = $1")
            .bind(id)
            .bind(active)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn set_allowed(&self, id: i64, allowed: &[String]) -> Result<(), AppError> {
        sqlx::query("UPDATE quizzes SET allowed = $2 WHERE id = $1")
            .bind(id)
            .bind(allowed)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn delete(&self, id: i64) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "DELETE FROM fields
             WHERE question_id IN (SELECT id FROM questions WHERE quiz_id = $1)",
        )
        .bind(id)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM questions WHERE quiz_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM quizzes WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }
}

#[async_trait]
impl PlayRepo for PgStore {
    async fn create(&self, play: NewPlay) -> Result<PlaySession, AppError> {
        let row = sqlx::query_as::<_, PlayRow>(&format!(
            "INSERT INTO plays (quiz_id, author_id, process, time_left)
             VALUES ($1, $2, $3, $4)
             RETURNING {}",
            PLAY_COLUMNS
        ))
        .bind(play.quiz_id)
        .bind(play.author_id)
        .bind(Json(&play.process))
        .bind(play.time_left)
        .fetch_one(&self.pool)
        .await?;

        row.into_session()
    }

    async fn by_id(&self, id: i64) -> Result<Option<PlaySession>, AppError> {
        let row = sqlx::query_as::<_, PlayRow>(&format!(
            "SELECT {} FROM plays WHERE id = $1",
            PLAY_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(PlayRow::into_session).transpose()
    }

    async fn update_progress(
        &self,
        id: i64,
        expected_version: i64,
        process: &[ProcessEntry],
        points: f64,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(
            "UPDATE plays
             SET process = $3, points = $4, version = version + 1
             WHERE id = $1 AND version = $2 AND state != 'finished'",
        )
        .bind(id)
        .bind(expected_version)
        .bind(Json(process))
        .bind(points)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn set_time(&self, id: i64, time_left: i64) -> Result<bool, AppError> {
        let result = sqlx::query(
            "UPDATE plays SET time_left = $2 WHERE id = $1 AND state != 'finished'",
        )
        .bind(id)
        .bind(time_left)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn mark_finished(&self, id: i64) -> Result<Option<PlaySession>, AppError> {
        let row = sqlx::query_as::<_, PlayRow>(&format!(
            "UPDATE plays SET state = 'finished'
             WHERE id = $1 AND state != 'finished'
             RETURNING {}",
            PLAY_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(PlayRow::into_session).transpose()
    }

    async fn count_attempts(&self, quiz_id: i64, author_id: i64) -> Result<i64, AppError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM plays WHERE quiz_id = $1 AND author_id = $2",
        )
        .bind(quiz_id)
        .bind(author_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    async fn delete_by_quiz(&self, quiz_id: i64) -> Result<(), AppError> {
        sqlx::query("DELETE FROM plays WHERE quiz_id = $1")
            .bind(quiz_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl LeaderboardRepo for PgStore {
    async fn entry(
        &self,
        quiz_id: i64,
        author_id: i64,
    ) -> Result<Option<LeaderboardEntry>, AppError> {
        let row = sqlx::query_as::<_, LeaderboardEntryRow>(
            "SELECT id, quiz_id, author_id, points, bonus, attempts
             FROM leaderboard WHERE quiz_id = $1 AND author_id = $2",
        )
        .bind(quiz_id)
        .bind(author_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(LeaderboardEntry::from))
    }

    async fn upsert_max(
        &self,
        quiz_id: i64,
        author_id: i64,
        points: f64,
        bonus: f64,
        attempts: i64,
    ) -> Result<(), AppError> {
        // Keep the highest score if the player finishes again.
        sqlx::query(
            "INSERT INTO leaderboard (quiz_id, author_id, points, bonus, attempts)
             VALUES ($1, $2, $3, $4, $5)
             ON CONFLICT (quiz_id, author_id) DO UPDATE SET
                 points = EXCLUDED.points,
                 bonus = EXCLUDED.bonus,
                 attempts = EXCLUDED.attempts
             WHERE leaderboard.points < EXCLUDED.points",
        )
        .bind(quiz_id)
        .bind(author_id)
        .bind(points)
        .bind(bonus)
        .bind(attempts)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn top_for_quiz(
        &self,
        quiz_id: i64,
        limit: i64,
    ) -> Result<Vec<LeaderboardRow>, AppError> {
        #[derive(FromRow)]
        struct Row {
            username: String,
            points: f64,
            bonus: f64,
            attempts: i64,
        }

        let rows = sqlx::query_as::<_, Row>(
            "SELECT u.username, l.points, l.bonus, l.attempts
             FROM leaderboard l
             JOIN users u ON l.author_id = u.id
             WHERE l.quiz_id = $1
             ORDER BY l.points DESC
             LIMIT $2",
        )
        .bind(quiz_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| LeaderboardRow {
                username: r.username,
                points: r.points,
                bonus: r.bonus,
                attempts: r.attempts,
            })
            .collect())
    }

    async fn delete_by_quiz(&self, quiz_id: i64) -> Result<(), AppError> {
        sqlx::query("DELETE FROM leaderboard WHERE quiz_id = $1")
            .bind(quiz_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
