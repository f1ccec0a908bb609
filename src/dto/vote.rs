//! Vote and match payloads.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    dao::models::{MatchEntity, VoteDecision, VoteEntity},
    dto::{format_system_time, validation::validate_participant_id},
};

/// Payload used to cast a vote on a catalog item.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct CastVoteRequest {
    /// Voting participant.
    #[validate(custom(function = validate_participant_id))]
    pub participant_id: String,
    /// Catalog item being voted on. Ids past `i64::MAX` are rejected; the
    /// vote ledger stores item ids signed.
    #[validate(range(max = 9_223_372_036_854_775_807u64))]
    pub item_id: u64,
    /// The swipe decision.
    pub decision: VoteDecision,
}

/// Result of a vote cast, telling the caller whether their vote completed a
/// match and who had already liked the item.
#[derive(Debug, Serialize, ToSchema)]
pub struct VoteOutcome {
    /// `true` only for the single vote that created the match row.
    pub matched: bool,
    /// Other participants with a yes-vote on the item at evaluation time.
    pub other_yes_voters: Vec<String>,
}

/// Public projection of a stored vote, for client reconciliation.
#[derive(Debug, Serialize, ToSchema)]
pub struct VoteSummary {
    /// Voter.
    pub participant_id: String,
    /// Voted item.
    pub item_id: u64,
    /// Stored decision.
    pub decision: VoteDecision,
    /// RFC3339 cast timestamp.
    pub cast_at: String,
}

impl From<VoteEntity> for VoteSummary {
    fn from(value: VoteEntity) -> Self {
        Self {
            participant_id: value.participant_id,
            item_id: value.item_id,
            decision: value.decision,
            cast_at: format_system_time(value.cast_at),
        }
    }
}

/// Public projection of a stored match.
#[derive(Debug, Serialize, ToSchema)]
pub struct MatchSummary {
    /// Matched item.
    pub item_id: u64,
    /// Yes-voters at creation time.
    pub participant_ids: Vec<String>,
    /// RFC3339 creation timestamp.
    pub created_at: String,
}

impl From<MatchEntity> for MatchSummary {
    fn from(value: MatchEntity) -> Self {
        Self {
            item_id: value.item_id,
            participant_ids: value.participant_ids,
            created_at: format_system_time(value.created_at),
        }
    }
}

#[cfg(test)]
mod tests {
    use validator::Validate;

    use super::*;

    fn vote(item_id: u64) -> CastVoteRequest {
        CastVoteRequest {
            participant_id: "p1".to_string(),
            item_id,
            decision: VoteDecision::Yes,
        }
    }

    #[test]
    fn item_ids_past_the_signed_range_fail_validation() {
        assert!(vote(i64::MAX as u64).validate().is_ok());
        assert!(vote(i64::MAX as u64 + 1).validate().is_err());
        assert!(vote(u64::MAX).validate().is_err());
    }
}
