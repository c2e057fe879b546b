use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct QuizAttempt {
    pub id: String,
    pub quiz_id: String,
    pub user_id: String,
    pub cohort_id: Option<String>,
    pub status: AttemptStatus,
    pub score: Option<i64>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    /// Bumped by every recorded answer. Submit only closes the revision it scored.
    #[serde(default)]
    pub revision: i64,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize, Copy)]
#[serde(rename_all = "snake_case")]
pub enum AttemptStatus {
    InProgress,
    Submitted,
    Graded,
}

impl AttemptStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttemptStatus::InProgress => "in_progress",
            AttemptStatus::Submitted => "submitted",
            AttemptStatus::Graded => "graded",
        }
    }
}

impl QuizAttempt {
    pub fn open(quiz_id: &str, user_id: &str, cohort_id: Option<String>) -> Self {
        QuizAttempt {
            id: Uuid::new_v4().to_string(),
            quiz_id: quiz_id.to_string(),
            user_id: user_id.to_string(),
            cohort_id,
            status: AttemptStatus::InProgress,
            score: None,
            started_at: Utc::now(),
            finished_at: None,
            revision: 0,
        }
    }

    pub fn is_open(&self) -> bool {
        self.status == AttemptStatus::InProgress
    }
}

/// Result of the atomic create-or-reuse on open.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OpenOutcome {
    pub attempt: QuizAttempt,
    pub reused: bool,
}
