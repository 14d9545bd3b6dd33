use futures::stream::TryStreamExt;
use mongodb::bson::doc;
use mongodb::{Collection, Database};

use crate::error::ApiError;
use crate::models::{Pool, Question};
use crate::policy::{self, Subject};

/// Read access to pools and their questions. Every fetch and listing runs
/// through `policy::can_view`; there are no per-collection visibility
/// filters to drift apart.
pub struct PoolService {
    mongo: Database,
}

impl PoolService {
    pub fn new(mongo: Database) -> Self {
        Self { mongo }
    }

    fn pools(&self) -> Collection<Pool> {
        self.mongo.collection("pools")
    }

    fn questions(&self) -> Collection<Question> {
        self.mongo.collection("questions")
    }

    pub async fn list_visible_pools(&self, subject: &Subject) -> Result<Vec<Pool>, ApiError> {
        let cursor = self.pools().find(doc! {}).await?;
        let mut pools: Vec<Pool> = cursor.try_collect().await?;
        pools.retain(|p| policy::can_view(subject, p.is_active));
        Ok(pools)
    }

    /// Hidden and missing pools are indistinguishable to the caller.
    pub async fn get_visible_pool(&self, subject: &Subject, pool_id: &str) -> Result<Pool, ApiError> {
        let pool = self
            .pools()
            .find_one(doc! { "_id": pool_id })
            .await?
            .ok_or(ApiError::NotFound)?;
        if !policy::can_view(subject, pool.is_active) {
            return Err(ApiError::NotFound);
        }
        Ok(pool)
    }

    /// Questions of a visible pool; a question is visible only while both it
    /// and its parent pool are active (admins see everything).
    pub async fn list_visible_questions(
        &self,
        subject: &Subject,
        pool_id: &str,
    ) -> Result<Vec<Question>, ApiError> {
        let pool = self.get_visible_pool(subject, pool_id).await?;

        let cursor = self.questions().find(doc! { "pool_id": pool_id }).await?;
        let mut questions: Vec<Question> = cursor.try_collect().await?;
        questions.retain(|q| policy::can_view(subject, q.is_active && pool.is_active));
        Ok(questions)
    }

    /// Single-question fetch with the same parent-pool rule, used when
    /// filing reports.
    pub async fn get_visible_question(
        &self,
        subject: &Subject,
        question_id: &str,
    ) -> Result<Question, ApiError> {
        let question = self
            .questions()
            .find_one(doc! { "_id": question_id })
            .await?
            .ok_or(ApiError::NotFound)?;

        let pool = self
            .pools()
            .find_one(doc! { "_id": &question.pool_id })
            .await?
            .ok_or(ApiError::NotFound)?;

        if !policy::can_view(subject, question.is_active && pool.is_active) {
            return Err(ApiError::NotFound);
        }
        Ok(question)
    }
}
