use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use mongodb::{
    bson::{doc, to_bson, to_document},
    options::{IndexOptions, ReturnDocument},
    Collection, IndexModel,
};
use serde::Deserialize;

use crate::{
    db::Database,
    errors::AppResult,
    models::domain::{AttemptResponse, AttemptStatus, OpenOutcome, QuizAttempt},
};

/// Attempt store. Answers live inside their attempt so that recording one and closing
/// the attempt are guarded by the same record.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait QuizAttemptRepository: Send + Sync {
    /// Atomically returns the open attempt for `(quiz_id, user_id)` or stores `attempt`
    /// as the new open one. Fails with `Conflict` when a concurrent open won the race.
    async fn open_or_reuse(&self, attempt: QuizAttempt) -> AppResult<OpenOutcome>;
    async fn find_by_id(&self, id: &str) -> AppResult<Option<QuizAttempt>>;
    async fn find_open(&self, quiz_id: &str, user_id: &str) -> AppResult<Option<QuizAttempt>>;
    /// Creates or replaces the answer for `(attempt_id, question_id)` and bumps the
    /// attempt's revision, only while the attempt is in progress. `false` means nothing
    /// was written.
    async fn save_response_if_in_progress(&self, response: AttemptResponse) -> AppResult<bool>;
    async fn find_responses(&self, attempt_id: &str) -> AppResult<Vec<AttemptResponse>>;
    /// Closes the attempt only if it is still in progress at `revision`. `None` means
    /// nothing matched.
    async fn submit_if_unchanged(
        &self,
        id: &str,
        revision: i64,
        score: i64,
        finished_at: DateTime<Utc>,
    ) -> AppResult<Option<QuizAttempt>>;
    /// Newest-started first.
    async fn list_by_user(&self, user_id: &str) -> AppResult<Vec<QuizAttempt>>;
}

#[derive(Debug, Default, Deserialize)]
struct StoredResponses {
    #[serde(default)]
    responses: Vec<AttemptResponse>,
}

pub struct MongoQuizAttemptRepository {
    collection: Collection<QuizAttempt>,
}

impl MongoQuizAttemptRepository {
    pub fn new(db: &Database) -> Self {
        let collection = db.get_collection("quiz_attempts");
        Self { collection }
    }

    pub async fn ensure_indexes(&self) -> AppResult<()> {
        log::info!("Creating indexes for quiz_attempts collection");

        let id_index = IndexModel::builder()
            .keys(doc! { "id": 1 })
            .options(
                IndexOptions::builder()
                    .unique(true)
                    .name("id_unique".to_string())
                    .build(),
            )
            .build();

        // At most one in-progress attempt per (quiz, user).
        let open_attempt_index = IndexModel::builder()
            .keys(doc! { "quiz_id": 1, "user_id": 1 })
            .options(
                IndexOptions::builder()
                    .unique(true)
                    .partial_filter_expression(
                        doc! { "status": AttemptStatus::InProgress.as_str() },
                    )
                    .name("open_attempt_unique".to_string())
                    .build(),
            )
            .build();

        let user_started_index = IndexModel::builder()
            .keys(doc! { "user_id": 1, "started_at": -1 })
            .options(
                IndexOptions::builder()
                    .name("user_started_at".to_string())
                    .build(),
            )
            .build();

        self.collection.create_index(id_index).await?;
        self.collection.create_index(open_attempt_index).await?;
        self.collection.create_index(user_started_index).await?;

        log::info!("Successfully created indexes for quiz_attempts collection");
        Ok(())
    }
}

#[async_trait]
impl QuizAttemptRepository for MongoQuizAttemptRepository {
    async fn open_or_reuse(&self, attempt: QuizAttempt) -> AppResult<OpenOutcome> {
        let filter = doc! {
            "quiz_id": &attempt.quiz_id,
            "user_id": &attempt.user_id,
            "status": AttemptStatus::InProgress.as_str(),
        };

        // Equality fields of the filter are copied into an upserted document by the server.
        let mut on_insert = to_document(&attempt)?;
        on_insert.remove("quiz_id");
        on_insert.remove("user_id");
        on_insert.remove("status");

        let existing = self
            .collection
            .find_one_and_update(filter, doc! { "$setOnInsert": on_insert })
            .upsert(true)
            .return_document(ReturnDocument::Before)
            .await?;

        Ok(match existing {
            Some(existing) => OpenOutcome {
                attempt: existing,
                reused: true,
            },
            None => OpenOutcome {
                attempt,
                reused: false,
            },
        })
    }

    async fn find_by_id(&self, id: &str) -> AppResult<Option<QuizAttempt>> {
        let attempt = self.collection.find_one(doc! { "id": id }).await?;
        Ok(attempt)
    }

    async fn find_open(&self, quiz_id: &str, user_id: &str) -> AppResult<Option<QuizAttempt>> {
        let attempt = self
            .collection
            .find_one(doc! {
                "quiz_id": quiz_id,
                "user_id": user_id,
                "status": AttemptStatus::InProgress.as_str(),
            })
            .await?;
        Ok(attempt)
    }

    async fn save_response_if_in_progress(&self, response: AttemptResponse) -> AppResult<bool> {
        let filter = doc! {
            "id": &response.attempt_id,
            "status": AttemptStatus::InProgress.as_str(),
        };
        let question_id = response.question_id.clone();
        let stored = to_bson(&response)?;

        // Pipeline update: drop the earlier answer to this question, append the new one
        // and bump the revision. Caller values go through `$literal` so a leading `$`
        // is never read as a field path.
        let update = vec![doc! {
            "$set": {
                "responses": {
                    "$concatArrays": [
                        {
                            "$filter": {
                                "input": { "$ifNull": ["$responses", []] },
                                "cond": {
                                    "$ne": ["$$this.question_id", { "$literal": question_id }]
                                },
                            }
                        },
                        { "$literal": [stored] },
                    ]
                },
                "revision": { "$add": [{ "$ifNull": ["$revision", 0_i64] }, 1_i64] },
            }
        }];

        let updated = self.collection.find_one_and_update(filter, update).await?;
        Ok(updated.is_some())
    }

    async fn find_responses(&self, attempt_id: &str) -> AppResult<Vec<AttemptResponse>> {
        let stored = self
            .collection
            .clone_with_type::<StoredResponses>()
            .find_one(doc! { "id": attempt_id })
            .projection(doc! { "_id": 0, "responses": 1 })
            .await?;
        Ok(stored.map(|s| s.responses).unwrap_or_default())
    }

    async fn submit_if_unchanged(
        &self,
        id: &str,
        revision: i64,
        score: i64,
        finished_at: DateTime<Utc>,
    ) -> AppResult<Option<QuizAttempt>> {
        let update = doc! {
            "$set": {
                "status": AttemptStatus::Submitted.as_str(),
                "score": score,
                "finished_at": to_bson(&finished_at)?,
            }
        };

        let closed = self
            .collection
            .find_one_and_update(
                doc! {
                    "id": id,
                    "status": AttemptStatus::InProgress.as_str(),
                    "revision": revision,
                },
                update,
            )
            .return_document(ReturnDocument::After)
            .await?;
        Ok(closed)
    }

    async fn list_by_user(&self, user_id: &str) -> AppResult<Vec<QuizAttempt>> {
        let attempts = self
            .collection
            .find(doc! { "user_id": user_id })
            .projection(doc! { "responses": 0 })
            .sort(doc! { "started_at": -1 })
            .await?
            .try_collect()
            .await?;
        Ok(attempts)
    }
}
