use async_trait::async_trait;
use mongodb::{bson::doc, options::IndexOptions, Collection, IndexModel};

use crate::{
    db::Database,
    errors::AppResult,
    models::domain::{QuestionOption, Quiz, QuizQuestion},
};

/// Read-only view of the quiz catalog.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait QuizRepository: Send + Sync {
    async fn get_quiz(&self, quiz_id: &str) -> AppResult<Option<Quiz>>;
    async fn get_question(
        &self,
        quiz_id: &str,
        question_id: &str,
    ) -> AppResult<Option<QuizQuestion>>;
    async fn get_option(
        &self,
        question_id: &str,
        option_id: &str,
    ) -> AppResult<Option<QuestionOption>>;
}

pub struct MongoQuizRepository {
    collection: Collection<Quiz>,
}

impl MongoQuizRepository {
    pub fn new(db: &Database) -> Self {
        let collection = db.get_collection("quizzes");
        Self { collection }
    }

    pub async fn ensure_indexes(&self) -> AppResult<()> {
        log::info!("Creating indexes for quizzes collection");

        let id_index = IndexModel::builder()
            .keys(doc! { "id": 1 })
            .options(
                IndexOptions::builder()
                    .unique(true)
                    .name("id_unique".to_string())
                    .build(),
            )
            .build();

        let question_index = IndexModel::builder()
            .keys(doc! { "questions.id": 1 })
            .options(
                IndexOptions::builder()
                    .name("question_id".to_string())
                    .build(),
            )
            .build();

        self.collection.create_index(id_index).await?;
        self.collection.create_index(question_index).await?;

        log::info!("Successfully created indexes for quizzes collection");
        Ok(())
    }
}

#[async_trait]
impl QuizRepository for MongoQuizRepository {
    async fn get_quiz(&self, quiz_id: &str) -> AppResult<Option<Quiz>> {
        let quiz = self.collection.find_one(doc! { "id": quiz_id }).await?;
        Ok(quiz)
    }

    async fn get_question(
        &self,
        quiz_id: &str,
        question_id: &str,
    ) -> AppResult<Option<QuizQuestion>> {
        let quiz = self
            .collection
            .find_one(doc! { "id": quiz_id, "questions.id": question_id })
            .await?;

        Ok(quiz.and_then(|quiz| {
            quiz.questions
                .into_iter()
                .find(|q| q.id == question_id && q.quiz_id == quiz_id)
        }))
    }

    async fn get_option(
        &self,
        question_id: &str,
        option_id: &str,
    ) -> AppResult<Option<QuestionOption>> {
        let quiz = self
            .collection
            .find_one(doc! { "questions.id": question_id })
            .await?;

        Ok(quiz
            .and_then(|quiz| quiz.questions.into_iter().find(|q| q.id == question_id))
            .and_then(|question| {
                question
                    .options
                    .into_iter()
                    .find(|o| o.id == option_id && o.question_id == question_id)
            }))
    }
}
