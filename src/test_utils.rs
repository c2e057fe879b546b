#[cfg(test)]
pub mod fixtures {
    use crate::models::domain::{
        quiz::QuizQuestionType, Principal, QuestionOption, Quiz, QuizQuestion, UserRole,
    };

    pub const QUIZ_ID: &str = "quiz-anatomy";
    pub const OTHER_QUIZ_ID: &str = "quiz-histology";

    /// A quiz with `question_count` one-point MCQ questions. Question `n` has id
    /// `{quiz_id}-q{n}` and two options, `{question_id}-correct` and `{question_id}-wrong`.
    pub fn sample_quiz(quiz_id: &str, question_count: usize) -> Quiz {
        let questions = (1..=question_count)
            .map(|n| {
                let question_id = format!("{}-q{}", quiz_id, n);
                QuizQuestion {
                    id: question_id.clone(),
                    quiz_id: quiz_id.to_string(),
                    stem: format!("Question {}", n),
                    question_type: QuizQuestionType::Mcq,
                    points: 1,
                    order_index: n as i32,
                    options: vec![
                        QuestionOption {
                            id: format!("{}-correct", question_id),
                            question_id: question_id.clone(),
                            label: "Right".to_string(),
                            is_correct: true,
                        },
                        QuestionOption {
                            id: format!("{}-wrong", question_id),
                            question_id,
                            label: "Wrong".to_string(),
                            is_correct: false,
                        },
                    ],
                }
            })
            .collect();

        Quiz {
            id: quiz_id.to_string(),
            title: format!("Quiz {}", quiz_id),
            questions,
        }
    }

    pub fn student(user_id: &str) -> Principal {
        Principal::new(user_id, UserRole::Student)
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::*;

    #[test]
    fn test_fixtures_sample_quiz() {
        let quiz = sample_quiz(QUIZ_ID, 3);
        assert_eq!(quiz.questions.len(), 3);
        assert_eq!(quiz.questions[0].id, format!("{}-q1", QUIZ_ID));
        assert!(quiz.questions.iter().all(|q| q.options.iter().filter(|o| o.is_correct).count() == 1));
    }
}
