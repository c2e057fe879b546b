use std::collections::HashMap;

use crate::models::domain::{AttemptResponse, Quiz};

/// Point value of every question in the quiz, keyed by question id.
pub fn question_points(quiz: &Quiz) -> HashMap<String, i32> {
    quiz.questions
        .iter()
        .map(|q| (q.id.clone(), q.points))
        .collect()
}

/// Sum of the point values of correctly answered questions.
///
/// Unanswered questions, incorrect responses and responses to questions that are not in
/// `question_points` contribute nothing. No partial credit and no negative marking.
pub fn score_attempt(responses: &[AttemptResponse], question_points: &HashMap<String, i32>) -> i64 {
    responses
        .iter()
        .filter(|r| r.is_correct)
        .filter_map(|r| question_points.get(&r.question_id))
        .map(|&points| i64::from(points.max(0)))
        .sum()
}
