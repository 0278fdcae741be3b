// src/engine/session.rs

use std::sync::Arc;

use serde::Serialize;

use crate::engine::scoring;
use crate::error::AppError;
use crate::models::{
    play::{NewPlay, PlaySession, ProcessEntry, SubmitNext, SubmittedAnswer},
    question::{PublicQuestion, QuestionStub},
    quiz::{BonusTier, PublicQuiz, Quiz},
};
use crate::repo::{LeaderboardRepo, PlayRepo, QuizRepo};

/// Bounded retries for the optimistic progress write before a conflict is
/// surfaced to the caller.
const MAX_SUBMIT_RETRIES: usize = 3;

/// Everything a player needs to render an in-progress attempt.
#[derive(Debug, Serialize)]
pub struct PlayView {
    pub quiz: PublicQuiz,
    pub play: PlaySession,
    /// The question at the cursor, None once the last answer is in.
    pub current: Option<QuestionStub>,
}

/// Orchestrates a single player's attempt at a quiz: session creation,
/// question advancement, answer scoring, timer checkpoints, and the
/// leaderboard reconciliation at completion. The engine is the only writer
/// of play sessions.
#[derive(Clone)]
pub struct PlayEngine {
    quizzes: Arc<dyn QuizRepo>,
    plays: Arc<dyn PlayRepo>,
    leaderboard: Arc<dyn LeaderboardRepo>,
}

impl PlayEngine {
    pub fn new(
        quizzes: Arc<dyn QuizRepo>,
        plays: Arc<dyn PlayRepo>,
        leaderboard: Arc<dyn LeaderboardRepo>,
    ) -> Self {
        Self {
            quizzes,
            plays,
            leaderboard,
        }
    }

    /// Starts a new attempt: seeds the progress with the first question and
    /// the timer with the full quiz duration.
    pub async fn start(
        &self,
        quiz_id: i64,
        username: &str,
        player_id: i64,
    ) -> Result<PlaySession, AppError> {
        let quiz = self
            .quizzes
            .detailed(quiz_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Quiz does not exist".to_string()))?;

        if !quiz.active {
            return Err(AppError::Inactive);
        }

        if quiz.private && !quiz.allowed.iter().any(|allowed| allowed == username) {
            return Err(AppError::Forbidden(
                "You are not allowed to play this quiz".to_string(),
            ));
        }

        let first = quiz.questions.first().ok_or_else(|| {
            AppError::InvalidState(format!("Quiz {} has no questions", quiz_id))
        })?;

        self.plays
            .create(NewPlay {
                quiz_id,
                author_id: player_id,
                process: vec![ProcessEntry::Pending {
                    question: QuestionStub::from(first),
                }],
                time_left: quiz.duration,
            })
            .await
    }

    /// The player's view of an attempt: public quiz projection, the session
    /// itself, and the current question stub. Side-effect-free.
    pub async fn view(&self, session_id: i64, player_id: i64) -> Result<PlayView, AppError> {
        let play = self.owned_session(session_id, player_id).await?;

        let quiz = self
            .quizzes
            .detailed(play.quiz_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Quiz does not exist".to_string()))?;

        let current = play
            .process
            .last()
            .filter(|entry| !entry.is_answered())
            .map(|entry| entry.question().clone());

        Ok(PlayView {
            quiz: PublicQuiz::from(&quiz),
            play,
            current,
        })
    }

    /// A question as the player may see it before answering: `is_correct`
    /// stripped from every field, canonical values stripped for text.
    pub async fn public_question(&self, question_id: i64) -> Result<PublicQuestion, AppError> {
        let question = self
            .quizzes
            .question(question_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Question does not exist".to_string()))?;

        Ok(PublicQuestion::from(&question))
    }

    /// Scores a batch of answers for the current question and advances the
    /// cursor. The whole mutation is one optimistic write: either every
    /// answer in the batch is persisted or none is.
    pub async fn submit_answer(
        &self,
        session_id: i64,
        player_id: i64,
        answers: &[SubmittedAnswer],
    ) -> Result<SubmitNext, AppError> {
        let Some(target) = answers.first().map(|a| a.question_id) else {
            return Err(AppError::BadRequest("No answers submitted".to_string()));
        };
        if answers.iter().any(|a| a.question_id != target) {
            return Err(AppError::BadRequest(
                "All answers in one submission must target the current question".to_string(),
            ));
        }

        for _ in 0..MAX_SUBMIT_RETRIES {
            let play = self.owned_session(session_id, player_id).await?;
            if play.is_finished() {
                return Err(AppError::AlreadyFinished);
            }

            let quiz = self
                .quizzes
                .detailed(play.quiz_id)
                .await?
                .ok_or_else(|| AppError::NotFound("Quiz does not exist".to_string()))?;

            // Replay guard: a retried submit whose question was already
            // scored is answered idempotently, without re-scoring.
            if let Some(answered_at) = play
                .process
                .iter()
                .position(|e| e.is_answered() && e.question().id == target)
            {
                return Ok(next_after(&quiz, answered_at));
            }

            let Some(current) = play.process.last() else {
                return Err(AppError::InvalidState(format!(
                    "Play {} has no progress entries",
                    play.id
                )));
            };
            if current.question().id != target {
                return Err(AppError::BadRequest(
                    "Answers must target the current question".to_string(),
                ));
            }

            // The cursor is positional; cross-check against the quiz's
            // question order before scoring.
            let cursor = play.process.len() - 1;
            let question = quiz
                .questions
                .get(cursor)
                .filter(|q| q.id == target)
                .ok_or_else(|| {
                    AppError::InvalidState(format!(
                        "Progress cursor of play {} does not match quiz {}",
                        play.id, quiz.id
                    ))
                })?;

            let mut earned = 0.0;
            let mut answered_values = Vec::new();
            for answer in answers {
                earned += scoring::score(question, answer.field_id, &answer.value)?;
                answered_values.extend(answer.value.as_slice().iter().cloned());
            }

            let mut process = play.process.clone();
            if let Some(slot) = process.last_mut() {
                *slot = ProcessEntry::Answered {
                    question: QuestionStub::from(question),
                    earned_points: earned,
                    answered_values,
                };
            }

            let next = if quiz.questions.len() > process.len() {
                let stub = QuestionStub::from(&quiz.questions[process.len()]);
                process.push(ProcessEntry::Pending {
                    question: stub.clone(),
                });
                SubmitNext::Question(stub)
            } else {
                SubmitNext::End
            };

            let applied = self
                .plays
                .update_progress(play.id, play.version, &process, play.points + earned)
                .await?;
            if applied {
                return Ok(next);
            }
            // Lost the race against a concurrent write; reload and retry.
        }

        tracing::warn!(
            session_id,
            "Progress write kept conflicting after {} attempts",
            MAX_SUBMIT_RETRIES
        );
        Err(AppError::Conflict(
            "Play progress changed concurrently, please retry".to_string(),
        ))
    }

    /// The stored remaining-time checkpoint.
    pub async fn time(&self, session_id: i64) -> Result<i64, AppError> {
        let play = self
            .plays
            .by_id(session_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Play does not exist".to_string()))?;
        Ok(play.time_left)
    }

    /// Overwrites the remaining-time checkpoint. The client owns the
    /// countdown; no monotonicity check is applied here.
    pub async fn update_time(&self, session_id: i64, time_left: i64) -> Result<(), AppError> {
        if self.plays.set_time(session_id, time_left).await? {
            return Ok(());
        }
        match self.plays.by_id(session_id).await? {
            None => Err(AppError::NotFound("Play does not exist".to_string())),
            Some(_) => Err(AppError::AlreadyFinished),
        }
    }

    /// Terminal transition: claims the finished flag, computes the time
    /// bonus, and reconciles the leaderboard. A second finish fails with
    /// `AlreadyFinished` and leaves the leaderboard untouched.
    pub async fn finish(&self, session_id: i64, player_id: i64) -> Result<i64, AppError> {
        let play = self.owned_session(session_id, player_id).await?;
        if play.is_finished() {
            return Err(AppError::AlreadyFinished);
        }

        // The conditional claim is the serialization point: only one of two
        // concurrent finishes reaches the reconciliation below.
        let Some(play) = self.plays.mark_finished(session_id).await? else {
            return Err(AppError::AlreadyFinished);
        };

        let quiz = self
            .quizzes
            .detailed(play.quiz_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Quiz does not exist".to_string()))?;

        let bonus = bonus_for(&quiz.bonuses, play.time_left);
        let total = play.points + bonus;

        match self.leaderboard.entry(play.quiz_id, player_id).await? {
            None => {
                self.leaderboard
                    .upsert_max(play.quiz_id, player_id, total, bonus, 1)
                    .await?;
            }
            Some(entry) => {
                if total > entry.points {
                    let attempts = self.plays.count_attempts(play.quiz_id, player_id).await?;
                    self.leaderboard
                        .upsert_max(play.quiz_id, player_id, total, bonus, attempts)
                        .await?;
                }
                // A non-improving attempt leaves the entry untouched,
                // the attempts counter included.
            }
        }

        tracing::info!(
            session_id,
            quiz_id = play.quiz_id,
            total,
            bonus,
            "Play finished"
        );
        Ok(play.quiz_id)
    }

    /// Author-only lifecycle actions that touch session data.
    pub async fn quiz_action(
        &self,
        quiz_id: i64,
        action: &str,
        author_id: i64,
    ) -> Result<(), AppError> {
        let quiz = self
            .quizzes
            .detailed(quiz_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Quiz does not exist".to_string()))?;

        if quiz.author_id != author_id {
            return Err(AppError::Forbidden("You do not have access".to_string()));
        }

        match action {
            "delete" => {
                self.leaderboard.delete_by_quiz(quiz_id).await?;
                self.plays.delete_by_quiz(quiz_id).await?;
                self.quizzes.delete(quiz_id).await?;
            }
            "close" => {
                self.quizzes.set_active(quiz_id, false).await?;
            }
            "resetleaderboard" => {
                self.leaderboard.delete_by_quiz(quiz_id).await?;
                self.plays.delete_by_quiz(quiz_id).await?;
            }
            _ => return Err(AppError::BadRequest("Invalid action".to_string())),
        }

        Ok(())
    }

    /// Adds usernames to a private quiz's invite list.
    pub async fn send_invites(
        &self,
        quiz_id: i64,
        invites: &[String],
        author_id: i64,
    ) -> Result<(), AppError> {
        let quiz = self.owned_quiz(quiz_id, author_id).await?;

        if !quiz.private {
            return Err(AppError::BadRequest("Quiz is not private".to_string()));
        }

        let mut allowed = quiz.allowed;
        for invite in invites {
            if !allowed.contains(invite) {
                allowed.push(invite.clone());
            }
        }
        self.quizzes.set_allowed(quiz_id, &allowed).await
    }

    /// Removes one username from a quiz's invite list.
    pub async fn remove_invite(
        &self,
        quiz_id: i64,
        username: &str,
        author_id: i64,
    ) -> Result<(), AppError> {
        let quiz = self.owned_quiz(quiz_id, author_id).await?;

        let allowed: Vec<String> = quiz
            .allowed
            .into_iter()
            .filter(|invited| invited != username)
            .collect();
        self.quizzes.set_allowed(quiz_id, &allowed).await
    }

    async fn owned_session(
        &self,
        session_id: i64,
        player_id: i64,
    ) -> Result<PlaySession, AppError> {
        let play = self
            .plays
            .by_id(session_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Play does not exist".to_string()))?;

        if play.author_id != player_id {
            return Err(AppError::Forbidden("You do not have access".to_string()));
        }
        Ok(play)
    }

    async fn owned_quiz(&self, quiz_id: i64, author_id: i64) -> Result<Quiz, AppError> {
        let quiz = self
            .quizzes
            .detailed(quiz_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Quiz does not exist".to_string()))?;

        if quiz.author_id != author_id {
            return Err(AppError::Forbidden("You do not have access".to_string()));
        }
        Ok(quiz)
    }
}

/// The stub following an answered question, or the end marker.
fn next_after(quiz: &Quiz, answered_at: usize) -> SubmitNext {
    match quiz.questions.get(answered_at + 1) {
        Some(question) => SubmitNext::Question(QuestionStub::from(question)),
        None => SubmitNext::End,
    }
}

/// Picks the bonus for a finished attempt. Tiers are scanned in ascending
/// threshold order; the first tier whose threshold is at most the remaining
/// minutes wins, i.e. the lowest qualifying threshold.
fn bonus_for(bonuses: &[BonusTier], time_left_seconds: i64) -> f64 {
    let play_time_minutes = time_left_seconds as f64 / 60.0;

    let mut tiers: Vec<&BonusTier> = bonuses.iter().collect();
    tiers.sort_by(|a, b| a.time.total_cmp(&b.time));

    for tier in tiers {
        if play_time_minutes >= tier.time {
            return tier.points;
        }
    }
    0.0
}
