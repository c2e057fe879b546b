pub mod attempt_detail_service;
pub mod quiz_attempt_service;
pub mod scoring;

pub use attempt_detail_service::AttemptDetailService;
pub use quiz_attempt_service::QuizAttemptService;
