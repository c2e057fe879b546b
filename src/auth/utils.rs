use crate::{
    errors::{AppError, AppResult},
    models::domain::{Principal, QuizAttempt},
};

/// Only the owner may change an attempt; staff get read access, never write access.
pub fn require_attempt_owner(principal: &Principal, attempt: &QuizAttempt) -> AppResult<()> {
    if attempt.user_id != principal.user_id {
        return Err(AppError::Forbidden(
            "You can only modify your own attempts".to_string(),
        ));
    }
    Ok(())
}

pub fn can_view_quiz_attempt(principal: &Principal, attempt: &QuizAttempt) -> AppResult<()> {
    if attempt.user_id != principal.user_id && !principal.is_staff() {
        return Err(AppError::Forbidden(
            "You can only view your own attempts".to_string(),
        ));
    }
    Ok(())
}
