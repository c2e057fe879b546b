pub mod attempt_response;
pub mod quiz;
pub mod quiz_attempt;
pub mod user;
pub use attempt_response::{AnswerPayload, AttemptResponse};
pub use quiz::{QuestionOption, Quiz, QuizQuestion};
pub use quiz_attempt::{AttemptStatus, OpenOutcome, QuizAttempt};
pub use user::{Principal, UserRole};
