use std::{collections::HashMap, sync::Arc};

use crate::{
    auth::can_view_quiz_attempt,
    errors::{AppError, AppResult},
    models::{
        domain::{AttemptResponse, Principal},
        dto::response::{AttemptSummary, AttemptView, QuestionView},
    },
    repositories::{QuizAttemptRepository, QuizRepository},
};

/// Read path that rebuilds an attempt for review by its owner or by staff.
pub struct AttemptDetailService {
    quizzes: Arc<dyn QuizRepository>,
    attempts: Arc<dyn QuizAttemptRepository>,
}

impl AttemptDetailService {
    pub fn new(quizzes: Arc<dyn QuizRepository>, attempts: Arc<dyn QuizAttemptRepository>) -> Self {
        Self { quizzes, attempts }
    }

    pub async fn get_attempt_detail(
        &self,
        attempt_id: &str,
        principal: &Principal,
    ) -> AppResult<AttemptView> {
        let attempt = self.attempts.find_by_id(attempt_id).await?.ok_or_else(|| {
            AppError::NotFound(format!("Attempt with id '{}' not found", attempt_id))
        })?;

        can_view_quiz_attempt(principal, &attempt)?;

        let quiz = self.quizzes.get_quiz(&attempt.quiz_id).await?.ok_or_else(|| {
            AppError::NotFound(format!("Quiz with id '{}' not found", attempt.quiz_id))
        })?;

        let responses: HashMap<String, AttemptResponse> = self
            .attempts
            .find_responses(&attempt.id)
            .await?
            .into_iter()
            .map(|r| (r.question_id.clone(), r))
            .collect();

        // Left join: every question appears, answered or not.
        let questions = quiz
            .ordered_questions()
            .into_iter()
            .map(|question| QuestionView::new(question, responses.get(&question.id)))
            .collect();

        Ok(AttemptView {
            attempt: AttemptSummary::new(attempt, quiz.title),
            questions,
        })
    }
}
