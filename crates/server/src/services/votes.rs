//! Questionnaire votes. One vote per device per question.

use serde::Deserialize;

use pantry_core::{AnswerId, VoteId};

use super::access::RequestContext;
use super::guard::{ResourceError, acting_device, ensure};
use super::validation::ValidationErrors;
use crate::db::Repositories;
use crate::models::Vote;

#[derive(Debug, Clone, Deserialize)]
pub struct CastVote {
    pub answer_id: AnswerId,
}

pub struct VoteService<'a> {
    repos: &'a Repositories,
}

impl<'a> VoteService<'a> {
    #[must_use]
    pub const fn new(repos: &'a Repositories) -> Self {
        Self { repos }
    }

    /// Record a vote, replacing the device's earlier vote on the same question.
    ///
    /// # Errors
    ///
    /// `DeviceNotFound` if the caller has no device, `Validation` for an
    /// unknown answer.
    pub async fn cast(&self, ctx: &RequestContext, input: CastVote) -> Result<Vote, ResourceError> {
        let device = acting_device(self.repos, ctx).await?;

        let answer = self
            .repos
            .catalog
            .answer(input.answer_id)
            .await?
            .ok_or_else(|| ValidationErrors::single("answer_id", "does not exist"))?;

        let vote = self
            .repos
            .votes
            .cast(answer.id, answer.question_id, device)
            .await?;
        tracing::debug!(vote_id = %vote.id, question_id = %vote.question_id, "Vote cast");
        Ok(vote)
    }

    /// # Errors
    ///
    /// `NotFound` or `PermissionDenied`.
    pub async fn delete(&self, ctx: &RequestContext, id: VoteId) -> Result<(), ResourceError> {
        let vote = ensure(ctx, self.repos.votes.get(id).await?)?;
        self.repos.votes.delete(vote.id).await?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::db::memory::MemoryStore;
    use crate::test_support::register_device;

    #[tokio::test]
    async fn revote_replaces_previous_answer() {
        let store = Arc::new(MemoryStore::new());
        let question = store.seed_question();
        let yes = store.seed_answer(question, "Yes");
        let no = store.seed_answer(question, "No");
        let repos = Repositories::memory(&store);
        let device = register_device(&repos, "hw-a").await.unwrap();
        let ctx = RequestContext::device(device);
        let votes = VoteService::new(&repos);

        let first = votes.cast(&ctx, CastVote { answer_id: yes }).await.unwrap();
        let second = votes.cast(&ctx, CastVote { answer_id: no }).await.unwrap();

        assert_eq!(second.question_id, question);
        assert!(repos.votes.get(first.id).await.unwrap().is_none());
        assert_eq!(
            repos.votes.get(second.id).await.unwrap().unwrap().answer_id,
            no
        );
    }

    #[tokio::test]
    async fn unknown_answer_is_a_validation_error() {
        let store = Arc::new(MemoryStore::new());
        let repos = Repositories::memory(&store);
        let device = register_device(&repos, "hw-a").await.unwrap();

        let Err(ResourceError::Validation(errors)) = VoteService::new(&repos)
            .cast(
                &RequestContext::device(device),
                CastVote {
                    answer_id: AnswerId::new(9999),
                },
            )
            .await
        else {
            panic!("expected validation error");
        };
        assert_eq!(errors.get("answer_id"), Some("does not exist"));
    }

    #[tokio::test]
    async fn only_owner_deletes_vote() {
        let store = Arc::new(MemoryStore::new());
        let question = store.seed_question();
        let answer = store.seed_answer(question, "Yes");
        let repos = Repositories::memory(&store);
        let a = register_device(&repos, "hw-a").await.unwrap();
        let b = register_device(&repos, "hw-b").await.unwrap();
        let votes = VoteService::new(&repos);
        let vote = votes
            .cast(&RequestContext::device(a.clone()), CastVote { answer_id: answer })
            .await
            .unwrap();

        assert!(matches!(
            votes.delete(&RequestContext::device(b), vote.id).await,
            Err(ResourceError::PermissionDenied)
        ));
        votes.delete(&RequestContext::device(a), vote.id).await.unwrap();
        assert!(repos.votes.get(vote.id).await.unwrap().is_none());
    }
}
