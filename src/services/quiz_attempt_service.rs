use std::{collections::HashMap, sync::Arc};

use chrono::Utc;

use crate::{
    auth::require_attempt_owner,
    errors::{AppError, AppResult},
    models::{
        domain::{AnswerPayload, AttemptResponse, Principal, QuizAttempt},
        dto::response::{AttemptSummary, OpenAttemptResponse, SubmitAttemptResponse},
    },
    repositories::{QuizAttemptRepository, QuizRepository},
    services::scoring,
};

/// Drives an attempt through open → answer → submit.
///
/// Cross-request coordination lives entirely in the attempt store: opening relies on the
/// atomic create-or-reuse, answering on the status-guarded write and submitting on the
/// revision-guarded close.
pub struct QuizAttemptService {
    quizzes: Arc<dyn QuizRepository>,
    attempts: Arc<dyn QuizAttemptRepository>,
    max_retries: u32,
}

impl QuizAttemptService {
    pub fn new(
        quizzes: Arc<dyn QuizRepository>,
        attempts: Arc<dyn QuizAttemptRepository>,
        max_retries: u32,
    ) -> Self {
        Self {
            quizzes,
            attempts,
            max_retries,
        }
    }

    /// Returns the caller's open attempt on the quiz, creating it if none exists.
    pub async fn open_attempt(
        &self,
        quiz_id: &str,
        principal: &Principal,
    ) -> AppResult<OpenAttemptResponse> {
        self.quizzes
            .get_quiz(quiz_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Quiz with id '{}' not found", quiz_id)))?;

        for _ in 0..=self.max_retries {
            let candidate = QuizAttempt::open(quiz_id, &principal.user_id, None);

            match self.attempts.open_or_reuse(candidate).await {
                Ok(outcome) => {
                    log::info!(
                        "Attempt '{}' {} for user '{}' on quiz '{}'",
                        outcome.attempt.id,
                        if outcome.reused { "reused" } else { "opened" },
                        principal.user_id,
                        quiz_id
                    );
                    return Ok(OpenAttemptResponse {
                        id: outcome.attempt.id,
                        reused: outcome.reused,
                    });
                }
                Err(AppError::Conflict(msg)) => {
                    log::warn!(
                        "Open race on quiz '{}' for user '{}': {}",
                        quiz_id,
                        principal.user_id,
                        msg
                    );
                    if let Some(existing) =
                        self.attempts.find_open(quiz_id, &principal.user_id).await?
                    {
                        return Ok(OpenAttemptResponse {
                            id: existing.id,
                            reused: true,
                        });
                    }
                }
                Err(e) => return Err(e),
            }
        }

        Err(AppError::Conflict(format!(
            "Could not open an attempt on quiz '{}' after {} retries",
            quiz_id, self.max_retries
        )))
    }

    /// Records (or replaces) the caller's answer to one question of an open attempt.
    pub async fn save_answer(
        &self,
        attempt_id: &str,
        principal: &Principal,
        question_id: &str,
        answer: AnswerPayload,
    ) -> AppResult<AttemptResponse> {
        let attempt = self.load_owned_open_attempt(attempt_id, principal).await?;

        self.quizzes
            .get_question(&attempt.quiz_id, question_id)
            .await?
            .ok_or_else(|| {
                AppError::InvalidInput(format!(
                    "Question '{}' does not belong to quiz '{}'",
                    question_id, attempt.quiz_id
                ))
            })?;

        let is_correct = match answer.option_id.as_deref() {
            Some(option_id) => {
                self.quizzes
                    .get_option(question_id, option_id)
                    .await?
                    .ok_or_else(|| {
                        AppError::InvalidInput(format!(
                            "Option '{}' does not belong to question '{}'",
                            option_id, question_id
                        ))
                    })?
                    .is_correct
            }
            None => false,
        };

        let response = AttemptResponse {
            attempt_id: attempt.id,
            question_id: question_id.to_string(),
            option_id: answer.option_id,
            text_answer: answer.text_answer,
            is_correct,
            answered_at: Utc::now(),
        };

        // The attempt may have been submitted since it was loaded.
        if !self
            .attempts
            .save_response_if_in_progress(response.clone())
            .await?
        {
            return Err(AppError::InvalidState(format!(
                "Attempt '{}' is not in progress",
                response.attempt_id
            )));
        }

        log::debug!(
            "Saved answer for question '{}' on attempt '{}'",
            response.question_id,
            response.attempt_id
        );
        Ok(response)
    }

    /// Scores and closes the attempt. Succeeds at most once per attempt, and the stored
    /// score always covers exactly the answers stored with it.
    pub async fn submit_attempt(
        &self,
        attempt_id: &str,
        principal: &Principal,
    ) -> AppResult<SubmitAttemptResponse> {
        let mut attempt = self.load_owned_open_attempt(attempt_id, principal).await?;

        let quiz = self.quizzes.get_quiz(&attempt.quiz_id).await?.ok_or_else(|| {
            AppError::NotFound(format!("Quiz with id '{}' not found", attempt.quiz_id))
        })?;
        let points = scoring::question_points(&quiz);

        for _ in 0..=self.max_retries {
            let responses = self.attempts.find_responses(&attempt.id).await?;
            let score = scoring::score_attempt(&responses, &points);

            if let Some(closed) = self
                .attempts
                .submit_if_unchanged(&attempt.id, attempt.revision, score, Utc::now())
                .await?
            {
                log::info!(
                    "Attempt '{}' submitted by user '{}' with score {}",
                    closed.id,
                    principal.user_id,
                    score
                );
                return Ok(SubmitAttemptResponse {
                    ok: true,
                    attempt_id: closed.id,
                    score,
                });
            }

            // Either another submit won, or an answer landed after the read.
            attempt = self.attempts.find_by_id(&attempt.id).await?.ok_or_else(|| {
                AppError::NotFound(format!("Attempt with id '{}' not found", attempt_id))
            })?;
            if !attempt.is_open() {
                return Err(AppError::InvalidState(format!(
                    "Attempt '{}' is already submitted",
                    attempt.id
                )));
            }
            log::debug!(
                "Answers on attempt '{}' changed during submit; rescoring",
                attempt.id
            );
        }

        Err(AppError::Conflict(format!(
            "Answers on attempt '{}' kept changing during submit",
            attempt.id
        )))
    }

    /// All of the caller's attempts, newest-started first.
    pub async fn list_my_attempts(&self, principal: &Principal) -> AppResult<Vec<AttemptSummary>> {
        let attempts = self.attempts.list_by_user(&principal.user_id).await?;

        let mut titles: HashMap<String, String> = HashMap::new();
        let mut summaries = Vec::with_capacity(attempts.len());

        for attempt in attempts {
            if !titles.contains_key(&attempt.quiz_id) {
                let title = self
                    .quizzes
                    .get_quiz(&attempt.quiz_id)
                    .await?
                    .map(|q| q.title)
                    .unwrap_or_default();
                titles.insert(attempt.quiz_id.clone(), title);
            }
            let title = titles.get(&attempt.quiz_id).cloned().unwrap_or_default();
            summaries.push(AttemptSummary::new(attempt, title));
        }

        Ok(summaries)
    }

    async fn load_owned_open_attempt(
        &self,
        attempt_id: &str,
        principal: &Principal,
    ) -> AppResult<QuizAttempt> {
        let attempt = self.attempts.find_by_id(attempt_id).await?.ok_or_else(|| {
            AppError::NotFound(format!("Attempt with id '{}' not found", attempt_id))
        })?;

        require_attempt_owner(principal, &attempt)?;

        if !attempt.is_open() {
            return Err(AppError::InvalidState(format!(
                "Attempt '{}' is not in progress",
                attempt.id
            )));
        }

        Ok(attempt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        models::domain::{AttemptStatus, OpenOutcome, UserRole},
        repositories::{
            quiz_attempt_repository::MockQuizAttemptRepository,
            quiz_repository::MockQuizRepository, InMemoryQuizAttemptRepository,
            InMemoryQuizRepository,
        },
        test_utils::fixtures::{sample_quiz, student, OTHER_QUIZ_ID, QUIZ_ID},
    };

    const MAX_RETRIES: u32 = 3;

    fn service_with(
        quizzes: Arc<dyn QuizRepository>,
    ) -> (QuizAttemptService, Arc<InMemoryQuizAttemptRepository>) {
        let attempts = Arc::new(InMemoryQuizAttemptRepository::new());
        let service = QuizAttemptService::new(quizzes, attempts.clone(), MAX_RETRIES);
        (service, attempts)
    }

    fn service_over(attempts: MockQuizAttemptRepository) -> QuizAttemptService {
        QuizAttemptService::new(
            Arc::new(InMemoryQuizRepository::with_quizzes(vec![sample_quiz(
                QUIZ_ID, 2,
            )])),
            Arc::new(attempts),
            MAX_RETRIES,
        )
    }

    fn conflict() -> AppError {
        AppError::Conflict("duplicate key on open_attempt_unique".to_string())
    }

    fn seeded_service() -> (QuizAttemptService, Arc<InMemoryQuizAttemptRepository>) {
        service_with(Arc::new(InMemoryQuizRepository::with_quizzes(vec![
            sample_quiz(QUIZ_ID, 5),
            sample_quiz(OTHER_QUIZ_ID, 2),
        ])))
    }

    #[tokio::test]
    async fn open_unknown_quiz_is_not_found() {
        let mut catalog = MockQuizRepository::new();
        catalog.expect_get_quiz().returning(|_| Ok(None));
        let (service, attempts) = service_with(Arc::new(catalog));

        let result = service.open_attempt("missing", &student("u1")).await;

        assert!(matches!(result, Err(AppError::NotFound(_))));
        assert!(attempts.list_by_user("u1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn open_twice_reuses_the_open_attempt() {
        let (service, _) = seeded_service();
        let principal = student("u1");

        let first = service.open_attempt(QUIZ_ID, &principal).await.unwrap();
        let second = service.open_attempt(QUIZ_ID, &principal).await.unwrap();

        assert!(!first.reused);
        assert!(second.reused);
        assert_eq!(first.id, second.id);
    }

    #[tokio::test]
    async fn catalog_errors_propagate_from_save_answer() {
        let mut catalog = MockQuizRepository::new();
        catalog
            .expect_get_quiz()
            .returning(|id| Ok(Some(sample_quiz(id, 1))));
        catalog
            .expect_get_question()
            .returning(|_, _| Err(AppError::DatabaseError("catalog offline".to_string())));
        let (service, _) = service_with(Arc::new(catalog));
        let principal = student("u1");

        let opened = service.open_attempt(QUIZ_ID, &principal).await.unwrap();
        let result = service
            .save_answer(&opened.id, &principal, "q-1", AnswerPayload::default())
            .await;

        assert!(matches!(result, Err(AppError::DatabaseError(_))));
    }

    #[tokio::test]
    async fn save_answer_checks_run_in_order() {
        let (service, _) = seeded_service();
        let owner = student("owner");
        let opened = service.open_attempt(QUIZ_ID, &owner).await.unwrap();
        let question_id = format!("{}-q1", QUIZ_ID);

        let missing = service
            .save_answer("nope", &owner, &question_id, AnswerPayload::default())
            .await;
        assert!(matches!(missing, Err(AppError::NotFound(_))));

        let stranger = service
            .save_answer(&opened.id, &student("stranger"), &question_id, AnswerPayload::default())
            .await;
        assert!(matches!(stranger, Err(AppError::Forbidden(_))));

        let staff = Principal::new("teacher", UserRole::Teacher);
        let staff_write = service
            .save_answer(&opened.id, &staff, &question_id, AnswerPayload::default())
            .await;
        assert!(matches!(staff_write, Err(AppError::Forbidden(_))));

        let foreign_question = service
            .save_answer(
                &opened.id,
                &owner,
                &format!("{}-q1", OTHER_QUIZ_ID),
                AnswerPayload::default(),
            )
            .await;
        assert!(matches!(foreign_question, Err(AppError::InvalidInput(_))));

        let foreign_option = service
            .save_answer(
                &opened.id,
                &owner,
                &question_id,
                AnswerPayload {
                    option_id: Some(format!("{}-q2-correct", QUIZ_ID)),
                    text_answer: None,
                },
            )
            .await;
        assert!(matches!(foreign_option, Err(AppError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn correctness_comes_from_the_catalog() {
        let (service, _) = seeded_service();
        let owner = student("owner");
        let opened = service.open_attempt(QUIZ_ID, &owner).await.unwrap();

        let saved = service
            .save_answer(
                &opened.id,
                &owner,
                &format!("{}-q1", QUIZ_ID),
                AnswerPayload {
                    option_id: Some(format!("{}-q1-correct", QUIZ_ID)),
                    text_answer: None,
                },
            )
            .await
            .unwrap();
        assert!(saved.is_correct);

        let text_only = service
            .save_answer(
                &opened.id,
                &owner,
                &format!("{}-q2", QUIZ_ID),
                AnswerPayload {
                    option_id: None,
                    text_answer: Some("I am sure this is right".to_string()),
                },
            )
            .await
            .unwrap();
        assert!(!text_only.is_correct);
    }

    #[tokio::test]
    async fn submit_closes_attempt_once() {
        let (service, attempts) = seeded_service();
        let owner = student("owner");
        let opened = service.open_attempt(QUIZ_ID, &owner).await.unwrap();

        let submitted = service.submit_attempt(&opened.id, &owner).await.unwrap();
        assert_eq!(submitted.score, 0);

        let closed = attempts.find_by_id(&opened.id).await.unwrap().unwrap();
        assert_eq!(closed.status, AttemptStatus::Submitted);
        assert_eq!(closed.score, Some(0));
        assert!(closed.finished_at.is_some());

        let again = service.submit_attempt(&opened.id, &owner).await;
        assert!(matches!(again, Err(AppError::InvalidState(_))));

        let unchanged = attempts.find_by_id(&opened.id).await.unwrap().unwrap();
        assert_eq!(unchanged, closed);
    }

    #[tokio::test]
    async fn submit_by_non_owner_is_forbidden_and_leaves_attempt_open() {
        let (service, attempts) = seeded_service();
        let owner = student("owner");
        let opened = service.open_attempt(QUIZ_ID, &owner).await.unwrap();

        let admin = Principal::new("admin", UserRole::Admin);
        let result = service.submit_attempt(&opened.id, &admin).await;

        assert!(matches!(result, Err(AppError::Forbidden(_))));
        let attempt = attempts.find_by_id(&opened.id).await.unwrap().unwrap();
        assert!(attempt.is_open());
        assert_eq!(attempt.score, None);
    }

    #[tokio::test]
    async fn list_my_attempts_includes_quiz_titles() {
        let (service, _) = seeded_service();
        let owner = student("owner");
        service.open_attempt(QUIZ_ID, &owner).await.unwrap();
        service.open_attempt(OTHER_QUIZ_ID, &owner).await.unwrap();
        service.open_attempt(QUIZ_ID, &student("someone-else")).await.unwrap();

        let mine = service.list_my_attempts(&owner).await.unwrap();

        assert_eq!(mine.len(), 2);
        assert!(mine.iter().all(|s| !s.quiz_title.is_empty()));
        assert!(mine[0].started_at >= mine[1].started_at);
    }

    #[tokio::test]
    async fn lost_open_race_returns_the_winners_attempt() {
        let winner = QuizAttempt::open(QUIZ_ID, "u1", None);
        let winner_id = winner.id.clone();

        let mut attempts = MockQuizAttemptRepository::new();
        attempts
            .expect_open_or_reuse()
            .times(1)
            .returning(|_| Err(conflict()));
        attempts
            .expect_find_open()
            .times(1)
            .returning(move |_, _| Ok(Some(winner.clone())));

        let opened = service_over(attempts)
            .open_attempt(QUIZ_ID, &student("u1"))
            .await
            .unwrap();

        assert!(opened.reused);
        assert_eq!(opened.id, winner_id);
    }

    #[tokio::test]
    async fn lost_open_race_with_no_survivor_tries_again() {
        let mut attempts = MockQuizAttemptRepository::new();
        attempts
            .expect_open_or_reuse()
            .times(1)
            .returning(|_| Err(conflict()));
        attempts
            .expect_open_or_reuse()
            .times(1)
            .returning(|attempt| {
                Ok(OpenOutcome {
                    attempt,
                    reused: false,
                })
            });
        // The winner was submitted before the re-read.
        attempts
            .expect_find_open()
            .times(1)
            .returning(|_, _| Ok(None));

        let opened = service_over(attempts)
            .open_attempt(QUIZ_ID, &student("u1"))
            .await
            .unwrap();

        assert!(!opened.reused);
        assert!(!opened.id.is_empty());
    }

    #[tokio::test]
    async fn open_gives_up_after_bounded_retries() {
        let mut attempts = MockQuizAttemptRepository::new();
        attempts
            .expect_open_or_reuse()
            .times(MAX_RETRIES as usize + 1)
            .returning(|_| Err(conflict()));
        attempts
            .expect_find_open()
            .times(MAX_RETRIES as usize + 1)
            .returning(|_, _| Ok(None));

        let result = service_over(attempts)
            .open_attempt(QUIZ_ID, &student("u1"))
            .await;

        assert!(matches!(result, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn answer_rejected_when_attempt_closes_before_the_write() {
        let loaded = QuizAttempt::open(QUIZ_ID, "u1", None);
        let attempt_id = loaded.id.clone();

        let mut attempts = MockQuizAttemptRepository::new();
        attempts
            .expect_find_by_id()
            .returning(move |_| Ok(Some(loaded.clone())));
        attempts
            .expect_save_response_if_in_progress()
            .times(1)
            .returning(|_| Ok(false));

        let result = service_over(attempts)
            .save_answer(
                &attempt_id,
                &student("u1"),
                &format!("{}-q1", QUIZ_ID),
                AnswerPayload {
                    option_id: Some(format!("{}-q1-correct", QUIZ_ID)),
                    text_answer: None,
                },
            )
            .await;

        assert!(matches!(result, Err(AppError::InvalidState(_))));
    }

    #[tokio::test]
    async fn submit_rescores_when_an_answer_lands_mid_submit() {
        let before = QuizAttempt::open(QUIZ_ID, "u1", None);
        let attempt_id = before.id.clone();
        let mut after = before.clone();
        after.revision = 1;

        let late_answer = AttemptResponse {
            attempt_id: attempt_id.clone(),
            question_id: format!("{}-q1", QUIZ_ID),
            option_id: Some(format!("{}-q1-correct", QUIZ_ID)),
            text_answer: None,
            is_correct: true,
            answered_at: Utc::now(),
        };

        let mut attempts = MockQuizAttemptRepository::new();
        attempts
            .expect_find_by_id()
            .times(1)
            .returning(move |_| Ok(Some(before.clone())));
        attempts
            .expect_find_by_id()
            .times(1)
            .returning(move |_| Ok(Some(after.clone())));
        attempts
            .expect_find_responses()
            .times(1)
            .returning(|_| Ok(Vec::new()));
        attempts
            .expect_find_responses()
            .times(1)
            .returning(move |_| Ok(vec![late_answer.clone()]));
        attempts
            .expect_submit_if_unchanged()
            .withf(|_, revision, _, _| *revision == 0)
            .times(1)
            .returning(|_, _, _, _| Ok(None));
        attempts
            .expect_submit_if_unchanged()
            .withf(|_, revision, score, _| *revision == 1 && *score == 1)
            .times(1)
            .returning(|id, revision, score, finished_at| {
                let mut closed = QuizAttempt::open(QUIZ_ID, "u1", None);
                closed.id = id.to_string();
                closed.revision = revision;
                closed.status = AttemptStatus::Submitted;
                closed.score = Some(score);
                closed.finished_at = Some(finished_at);
                Ok(Some(closed))
            });

        let submitted = service_over(attempts)
            .submit_attempt(&attempt_id, &student("u1"))
            .await
            .unwrap();

        assert_eq!(submitted.score, 1);
        assert_eq!(submitted.attempt_id, attempt_id);
    }

    #[tokio::test]
    async fn answers_after_submit_are_rejected_and_not_stored() {
        let (service, attempts) = seeded_service();
        let owner = student("owner");
        let opened = service.open_attempt(QUIZ_ID, &owner).await.unwrap();
        service.submit_attempt(&opened.id, &owner).await.unwrap();

        let late = service
            .save_answer(
                &opened.id,
                &owner,
                &format!("{}-q1", QUIZ_ID),
                AnswerPayload {
                    option_id: Some(format!("{}-q1-correct", QUIZ_ID)),
                    text_answer: None,
                },
            )
            .await;

        assert!(matches!(late, Err(AppError::InvalidState(_))));
        assert!(attempts.find_responses(&opened.id).await.unwrap().is_empty());
    }
}
