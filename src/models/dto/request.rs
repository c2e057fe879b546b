use serde::Deserialize;
use validator::Validate;

use crate::models::domain::AnswerPayload;

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SaveAnswerRequest {
    #[validate(length(min = 1, max = 64))]
    pub question_id: String,

    #[validate(length(min = 1, max = 64))]
    pub option_id: Option<String>,

    #[validate(length(max = 5000))]
    pub text_answer: Option<String>,
}

impl SaveAnswerRequest {
    pub fn into_parts(self) -> (String, AnswerPayload) {
        (
            self.question_id,
            AnswerPayload {
                option_id: self.option_id,
                text_answer: self.text_answer,
            },
        )
    }
}
