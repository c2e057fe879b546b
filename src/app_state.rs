use std::{path::Path, sync::Arc};

use crate::{
    config::{Config, StorageBackend},
    db::Database,
    errors::AppResult,
    repositories::{
        InMemoryQuizAttemptRepository, InMemoryQuizRepository, MongoQuizAttemptRepository,
        MongoQuizRepository, QuizAttemptRepository, QuizRepository,
    },
    services::{AttemptDetailService, QuizAttemptService},
};

#[derive(Clone)]
pub struct AppState {
    pub quiz_attempt_service: Arc<QuizAttemptService>,
    pub attempt_detail_service: Arc<AttemptDetailService>,
    pub database: Option<Database>,
    pub config: Arc<Config>,
}

impl AppState {
    pub async fn new(config: Config) -> AppResult<Self> {
        match config.storage_backend {
            StorageBackend::Mongo => {
                let db = Database::connect(&config).await?;

                let quiz_repository = Arc::new(MongoQuizRepository::new(&db));
                quiz_repository.ensure_indexes().await?;
                let attempt_repository = Arc::new(MongoQuizAttemptRepository::new(&db));
                attempt_repository.ensure_indexes().await?;

                Ok(Self::from_repositories(
                    config,
                    quiz_repository,
                    attempt_repository,
                    Some(db),
                ))
            }
            StorageBackend::Memory => {
                log::warn!("Using in-memory storage; nothing will survive a restart");
                let quizzes = match config.quiz_catalog_path.as_deref() {
                    Some(path) => InMemoryQuizRepository::from_json_file(Path::new(path))?,
                    None => {
                        log::warn!("QUIZ_CATALOG_PATH is not set; the quiz catalog is empty");
                        InMemoryQuizRepository::new()
                    }
                };
                Ok(Self::in_memory(config, quizzes))
            }
        }
    }

    pub fn in_memory(config: Config, quizzes: InMemoryQuizRepository) -> Self {
        Self::from_repositories(
            config,
            Arc::new(quizzes),
            Arc::new(InMemoryQuizAttemptRepository::new()),
            None,
        )
    }

    pub fn from_repositories(
        config: Config,
        quizzes: Arc<dyn QuizRepository>,
        attempts: Arc<dyn QuizAttemptRepository>,
        database: Option<Database>,
    ) -> Self {
        let quiz_attempt_service = Arc::new(QuizAttemptService::new(
            quizzes.clone(),
            attempts.clone(),
            config.attempt_max_retries,
        ));
        let attempt_detail_service = Arc::new(AttemptDetailService::new(quizzes, attempts));

        Self {
            quiz_attempt_service,
            attempt_detail_service,
            database,
            config: Arc::new(config),
        }
    }

    pub async fn health_check(&self) -> AppResult<()> {
        match &self.database {
            Some(db) => db.health_check().await,
            None => Ok(()),
        }
    }
}
