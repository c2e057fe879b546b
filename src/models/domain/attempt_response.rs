use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The latest answer to one question within one attempt.
/// Natural key is `(attempt_id, question_id)`.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct AttemptResponse {
    pub attempt_id: String,
    pub question_id: String,
    pub option_id: Option<String>,
    pub text_answer: Option<String>,
    pub is_correct: bool,
    pub answered_at: DateTime<Utc>,
}

/// What the caller chose for a question. Correctness is never part of it.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AnswerPayload {
    pub option_id: Option<String>,
    pub text_answer: Option<String>,
}
