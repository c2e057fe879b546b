use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::domain::{
    AttemptResponse, AttemptStatus, QuestionOption, QuizAttempt, QuizQuestion,
    quiz::QuizQuestionType,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OpenAttemptResponse {
    pub id: String,
    pub reused: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SaveAnswerResponse {
    pub ok: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitAttemptResponse {
    pub ok: bool,
    pub attempt_id: String,
    pub score: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttemptSummary {
    pub id: String,
    pub quiz_id: String,
    pub quiz_title: String,
    pub status: AttemptStatus,
    pub score: Option<i64>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl AttemptSummary {
    pub fn new(attempt: QuizAttempt, quiz_title: String) -> Self {
        AttemptSummary {
            id: attempt.id,
            quiz_id: attempt.quiz_id,
            quiz_title,
            status: attempt.status,
            score: attempt.score,
            started_at: attempt.started_at,
            finished_at: attempt.finished_at,
        }
    }
}

/// Full review payload: the attempt plus every question of its quiz.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttemptView {
    pub attempt: AttemptSummary,
    pub questions: Vec<QuestionView>,
}

/// One quiz question joined with the attempt's response, if any.
/// Answer fields are `None` when the question was never answered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuestionView {
    pub id: String,
    pub stem: String,
    pub question_type: QuizQuestionType,
    pub points: i32,
    pub order_index: i32,
    pub option_id: Option<String>,
    pub text_answer: Option<String>,
    pub is_correct: Option<bool>,
    pub answered_at: Option<DateTime<Utc>>,
    pub options: Vec<OptionView>,
}

impl QuestionView {
    pub fn new(question: &QuizQuestion, response: Option<&AttemptResponse>) -> Self {
        QuestionView {
            id: question.id.clone(),
            stem: question.stem.clone(),
            question_type: question.question_type,
            points: question.points,
            order_index: question.order_index,
            option_id: response.and_then(|r| r.option_id.clone()),
            text_answer: response.and_then(|r| r.text_answer.clone()),
            is_correct: response.map(|r| r.is_correct),
            answered_at: response.map(|r| r.answered_at),
            options: question.options.iter().map(OptionView::from).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OptionView {
    pub id: String,
    pub label: String,
    pub is_correct: bool,
}

impl From<&QuestionOption> for OptionView {
    fn from(option: &QuestionOption) -> Self {
        OptionView {
            id: option.id.clone(),
            label: option.label.clone(),
            is_correct: option.is_correct,
        }
    }
}
