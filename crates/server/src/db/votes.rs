//! Questionnaire vote repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use pantry_core::{AnswerId, DeviceId, QuestionId, UserId, VoteId};

use super::{RepositoryError, map_unique_violation};
use crate::models::Vote;

/// Storage port for votes.
#[async_trait]
pub trait VoteRepository: Send + Sync {
    /// Record `device`'s vote for `answer`, replacing its earlier vote on the
    /// same question.
    async fn cast(
        &self,
        answer: AnswerId,
        question: QuestionId,
        device: DeviceId,
    ) -> Result<Vote, RepositoryError>;

    async fn get(&self, id: VoteId) -> Result<Option<Vote>, RepositoryError>;

    async fn delete(&self, id: VoteId) -> Result<(), RepositoryError>;
}

#[derive(sqlx::FromRow)]
struct VoteRow {
    id: VoteId,
    answer_id: AnswerId,
    question_id: QuestionId,
    device_id: DeviceId,
    owner_user_id: Option<UserId>,
    created_at: DateTime<Utc>,
}

impl From<VoteRow> for Vote {
    fn from(row: VoteRow) -> Self {
        Self {
            id: row.id,
            answer_id: row.answer_id,
            question_id: row.question_id,
            device_id: row.device_id,
            owner_user_id: row.owner_user_id,
            created_at: row.created_at,
        }
    }
}

/// `PostgreSQL` vote repository.
#[derive(Clone)]
pub struct PgVoteRepository {
    pool: PgPool,
}

impl PgVoteRepository {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl VoteRepository for PgVoteRepository {
    async fn cast(
        &self,
        answer: AnswerId,
        question: QuestionId,
        device: DeviceId,
    ) -> Result<Vote, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM vote WHERE question_id = $1 AND device_id = $2")
            .bind(question)
            .bind(device)
            .execute(&mut *tx)
            .await?;

        let id: VoteId = sqlx::query_scalar(
            r"
            INSERT INTO vote (answer_id, question_id, device_id)
            VALUES ($1, $2, $3)
            RETURNING id
            ",
        )
        .bind(answer)
        .bind(question)
        .bind(device)
        .fetch_one(&mut *tx)
        .await
        .map_err(map_unique_violation)?;

        tx.commit().await?;

        self.get(id).await?.ok_or(RepositoryError::NotFound)
    }

    async fn get(&self, id: VoteId) -> Result<Option<Vote>, RepositoryError> {
        let row = sqlx::query_as::<_, VoteRow>(
            r"
            SELECT v.id, v.answer_id, v.question_id, v.device_id,
                   d.user_id AS owner_user_id, v.created_at
            FROM vote v
            JOIN device d ON d.id = v.device_id
            WHERE v.id = $1
            ",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    async fn delete(&self, id: VoteId) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM vote WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
