//! Process-local repositories backed by `tokio::sync::RwLock`.
//!
//! Each conditional write holds the write lock across its check and its write, which
//! gives the same atomicity the MongoDB unique indexes and guarded updates provide.

use std::{collections::HashMap, path::Path, sync::Arc};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::{
    errors::{AppError, AppResult},
    models::domain::{
        AttemptResponse, AttemptStatus, OpenOutcome, QuestionOption, Quiz, QuizAttempt,
        QuizQuestion,
    },
    repositories::{QuizAttemptRepository, QuizRepository},
};

#[derive(Default)]
pub struct InMemoryQuizRepository {
    quizzes: Arc<RwLock<HashMap<String, Quiz>>>,
}

impl InMemoryQuizRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_quizzes(quizzes: Vec<Quiz>) -> Self {
        let quizzes = quizzes.into_iter().map(|q| (q.id.clone(), q)).collect();
        Self {
            quizzes: Arc::new(RwLock::new(quizzes)),
        }
    }

    /// Loads a catalog from a JSON array of quizzes with embedded questions and options.
    pub fn from_json_file(path: &Path) -> AppResult<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            AppError::InternalError(format!(
                "Failed to read quiz catalog '{}': {}",
                path.display(),
                e
            ))
        })?;

        let quizzes: Vec<Quiz> = serde_json::from_str(&raw).map_err(|e| {
            AppError::InternalError(format!(
                "Failed to parse quiz catalog '{}': {}",
                path.display(),
                e
            ))
        })?;

        log::info!(
            "Loaded {} quizzes from catalog '{}'",
            quizzes.len(),
            path.display()
        );
        Ok(Self::with_quizzes(quizzes))
    }

    pub async fn insert_quiz(&self, quiz: Quiz) {
        self.quizzes.write().await.insert(quiz.id.clone(), quiz);
    }
}

#[async_trait]
impl QuizRepository for InMemoryQuizRepository {
    async fn get_quiz(&self, quiz_id: &str) -> AppResult<Option<Quiz>> {
        let quizzes = self.quizzes.read().await;
        Ok(quizzes.get(quiz_id).cloned())
    }

    async fn get_question(
        &self,
        quiz_id: &str,
        question_id: &str,
    ) -> AppResult<Option<QuizQuestion>> {
        let quizzes = self.quizzes.read().await;
        Ok(quizzes
            .get(quiz_id)
            .and_then(|quiz| quiz.question(question_id))
            .filter(|q| q.quiz_id == quiz_id)
            .cloned())
    }

    async fn get_option(
        &self,
        question_id: &str,
        option_id: &str,
    ) -> AppResult<Option<QuestionOption>> {
        let quizzes = self.quizzes.read().await;
        Ok(quizzes
            .values()
            .flat_map(|quiz| quiz.questions.iter())
            .find(|q| q.id == question_id)
            .and_then(|q| q.option(option_id))
            .filter(|o| o.question_id == question_id)
            .cloned())
    }
}

/// An attempt and its answers keyed by question id, kept under one lock.
struct AttemptRecord {
    attempt: QuizAttempt,
    responses: HashMap<String, AttemptResponse>,
}

#[derive(Default)]
pub struct InMemoryQuizAttemptRepository {
    attempts: Arc<RwLock<HashMap<String, AttemptRecord>>>,
}

impl InMemoryQuizAttemptRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn count_open(&self, quiz_id: &str, user_id: &str) -> usize {
        let attempts = self.attempts.read().await;
        attempts
            .values()
            .map(|r| &r.attempt)
            .filter(|a| a.quiz_id == quiz_id && a.user_id == user_id && a.is_open())
            .count()
    }
}

#[async_trait]
impl QuizAttemptRepository for InMemoryQuizAttemptRepository {
    async fn open_or_reuse(&self, attempt: QuizAttempt) -> AppResult<OpenOutcome> {
        let mut attempts = self.attempts.write().await;

        let existing = attempts
            .values()
            .map(|r| &r.attempt)
            .find(|a| a.quiz_id == attempt.quiz_id && a.user_id == attempt.user_id && a.is_open())
            .cloned();

        if let Some(existing) = existing {
            return Ok(OpenOutcome {
                attempt: existing,
                reused: true,
            });
        }

        attempts.insert(
            attempt.id.clone(),
            AttemptRecord {
                attempt: attempt.clone(),
                responses: HashMap::new(),
            },
        );
        Ok(OpenOutcome {
            attempt,
            reused: false,
        })
    }

    async fn find_by_id(&self, id: &str) -> AppResult<Option<QuizAttempt>> {
        let attempts = self.attempts.read().await;
        Ok(attempts.get(id).map(|r| r.attempt.clone()))
    }

    async fn find_open(&self, quiz_id: &str, user_id: &str) -> AppResult<Option<QuizAttempt>> {
        let attempts = self.attempts.read().await;
        Ok(attempts
            .values()
            .map(|r| &r.attempt)
            .find(|a| a.quiz_id == quiz_id && a.user_id == user_id && a.is_open())
            .cloned())
    }

    async fn save_response_if_in_progress(&self, response: AttemptResponse) -> AppResult<bool> {
        let mut attempts = self.attempts.write().await;

        let Some(record) = attempts
            .get_mut(&response.attempt_id)
            .filter(|r| r.attempt.is_open())
        else {
            return Ok(false);
        };

        record.attempt.revision += 1;
        record
            .responses
            .insert(response.question_id.clone(), response);
        Ok(true)
    }

    async fn find_responses(&self, attempt_id: &str) -> AppResult<Vec<AttemptResponse>> {
        let attempts = self.attempts.read().await;
        let mut items: Vec<_> = attempts
            .get(attempt_id)
            .map(|r| r.responses.values().cloned().collect())
            .unwrap_or_default();
        items.sort_by(|a, b| a.question_id.cmp(&b.question_id));
        Ok(items)
    }

    async fn submit_if_unchanged(
        &self,
        id: &str,
        revision: i64,
        score: i64,
        finished_at: DateTime<Utc>,
    ) -> AppResult<Option<QuizAttempt>> {
        let mut attempts = self.attempts.write().await;

        let Some(record) = attempts
            .get_mut(id)
            .filter(|r| r.attempt.is_open() && r.attempt.revision == revision)
        else {
            return Ok(None);
        };

        let attempt = &mut record.attempt;
        attempt.status = AttemptStatus::Submitted;
        attempt.score = Some(score);
        attempt.finished_at = Some(finished_at);
        Ok(Some(attempt.clone()))
    }

    async fn list_by_user(&self, user_id: &str) -> AppResult<Vec<QuizAttempt>> {
        let attempts = self.attempts.read().await;
        let mut items: Vec<_> = attempts
            .values()
            .map(|r| &r.attempt)
            .filter(|a| a.user_id == user_id)
            .cloned()
            .collect();
        items.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        Ok(items)
    }
}
