//! Backend contract - the table-query and RPC operations the engine consumes.
//!
//! The backend is authoritative for counters and quotas. Local vote decisions
//! are only predictions and always defer to [`CastVoteResponse`].

use crate::{
    core::{
        idea::{Category, IdeaAggregate, IdeaType, VoteDirection},
        ledger::VoteQuota,
    },
    errors::{Error, Result},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Location level whose ideas make up the global view.
pub const GLOBAL_LOCATION_LEVEL: &str = "global";

/// Equality filters for an idea fetch. Results are always ordered by
/// `created_at` descending and joined with the viewer's vote and the author
/// display name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdeaQuery {
    /// User whose vote is joined into `user_vote`
    pub viewer: Option<String>,
    /// Owner filter
    pub owner: Option<String>,
    /// Idea type filter
    pub idea_type: Option<IdeaType>,
    /// Category filter
    pub category: Option<Category>,
    /// Country filter
    pub country: Option<String>,
    /// Location level filter
    pub location_level: Option<String>,
}

impl IdeaQuery {
    /// Every idea, as seen by `viewer`.
    #[must_use]
    pub fn all(viewer: Option<&str>) -> Self {
        Self {
            viewer: viewer.map(str::to_string),
            ..Self::default()
        }
    }

    /// Globally scoped ideas, as seen by `viewer`.
    #[must_use]
    pub fn global(viewer: Option<&str>) -> Self {
        Self {
            location_level: Some(GLOBAL_LOCATION_LEVEL.to_string()),
            ..Self::all(viewer)
        }
    }

    /// Ideas owned by `user_id`.
    #[must_use]
    pub fn owned_by(user_id: &str) -> Self {
        Self {
            owner: Some(user_id.to_string()),
            ..Self::all(Some(user_id))
        }
    }
}

/// Fields of a new idea.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewIdea {
    /// Headline
    pub title: String,
    /// Body text
    pub description: String,
    /// Kind of idea
    pub idea_type: IdeaType,
    /// Category
    pub category: Category,
    /// Free-text location
    pub location_value: Option<String>,
    /// Location granularity
    pub location_level: Option<String>,
    /// Country tag
    pub country: Option<String>,
    /// Hide the author
    pub is_anonymous: bool,
}

/// Partial update of an idea. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdeaPatch {
    /// New title
    pub title: Option<String>,
    /// New description
    pub description: Option<String>,
    /// New official flag
    pub is_official_proposal: Option<bool>,
    /// New deadline; `Some(None)` clears it
    pub voting_ends_at: Option<Option<DateTime<Utc>>>,
}

/// Error codes the vote RPC reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RpcErrorCode {
    /// `EMAIL_NOT_VERIFIED`
    EmailNotVerified,
    /// `QUOTA_EXHAUSTED`
    QuotaExhausted,
    /// `VOTING_CLOSED`
    VotingClosed,
    /// `NOT_AUTHENTICATED`
    NotAuthenticated,
    /// `IDEA_NOT_FOUND`
    IdeaNotFound,
    /// Anything else
    Unknown(String),
}

impl RpcErrorCode {
    /// Parses a wire code.
    #[must_use]
    pub fn from_code(code: &str) -> Self {
        match code {
            "EMAIL_NOT_VERIFIED" => Self::EmailNotVerified,
            "QUOTA_EXHAUSTED" => Self::QuotaExhausted,
            "VOTING_CLOSED" => Self::VotingClosed,
            "NOT_AUTHENTICATED" => Self::NotAuthenticated,
            "IDEA_NOT_FOUND" => Self::IdeaNotFound,
            other => Self::Unknown(other.to_string()),
        }
    }

    /// Wire representation
    #[must_use]
    pub fn as_code(&self) -> &str {
        match self {
            Self::EmailNotVerified => "EMAIL_NOT_VERIFIED",
            Self::QuotaExhausted => "QUOTA_EXHAUSTED",
            Self::VotingClosed => "VOTING_CLOSED",
            Self::NotAuthenticated => "NOT_AUTHENTICATED",
            Self::IdeaNotFound => "IDEA_NOT_FOUND",
            Self::Unknown(code) => code,
        }
    }
}

/// Answer of the `cast_vote` RPC.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CastVoteResponse {
    /// Whether the vote was recorded
    pub success: bool,
    /// Human-readable result
    pub message: String,
    /// Allowance left after the vote, as counted by the server
    pub new_votes_remaining_this_week: Option<u32>,
    /// Wire error code on failure
    pub error_code: Option<String>,
}

impl CastVoteResponse {
    /// A successful response.
    #[must_use]
    pub fn accepted(message: impl Into<String>, votes_remaining: u32) -> Self {
        Self {
            success: true,
            message: message.into(),
            new_votes_remaining_this_week: Some(votes_remaining),
            error_code: None,
        }
    }

    /// A failed response with a known code.
    #[must_use]
    pub fn rejected(code: &RpcErrorCode, message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            new_votes_remaining_this_week: None,
            error_code: Some(code.as_code().to_string()),
        }
    }

    /// Parsed error code, if any.
    #[must_use]
    pub fn code(&self) -> Option<RpcErrorCode> {
        self.error_code.as_deref().map(RpcErrorCode::from_code)
    }

    /// Converts a failed response into the matching error for `idea_id`.
    #[must_use]
    pub fn into_error(self, idea_id: i64) -> Error {
        match self.code() {
            Some(RpcErrorCode::EmailNotVerified) => Error::EmailNotVerified,
            Some(RpcErrorCode::QuotaExhausted) => Error::QuotaExhausted,
            Some(RpcErrorCode::VotingClosed) => Error::VotingClosed {
                idea_id,
                ended_at: None,
            },
            Some(RpcErrorCode::NotAuthenticated) => Error::NotAuthenticated,
            Some(RpcErrorCode::IdeaNotFound) => Error::IdeaNotFound { idea_id },
            Some(RpcErrorCode::Unknown(_)) | None => Error::Rpc {
                message: self.message,
            },
        }
    }
}

/// One entry of a user's vote history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteHistoryEntry {
    /// Idea voted on
    pub idea_id: i64,
    /// Title at fetch time
    pub idea_title: String,
    /// Direction held
    pub vote_type: VoteDirection,
    /// Last change
    pub voted_at: DateTime<Utc>,
}

/// Answer of the `fetch_vote_status` RPC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteStatus {
    /// Votes left this week
    pub votes_remaining: u32,
    /// Next reset boundary
    pub votes_reset_at: DateTime<Utc>,
    /// Allowance per week
    pub weekly_vote_limit: u32,
}

impl From<VoteStatus> for VoteQuota {
    fn from(status: VoteStatus) -> Self {
        Self {
            votes_remaining: status.votes_remaining.min(status.weekly_vote_limit),
            weekly_vote_limit: status.weekly_vote_limit,
            votes_reset_at: status.votes_reset_at,
        }
    }
}

/// Table-query and RPC operations offered by the hosted backend.
///
/// `Err` from an operation means the call itself failed (transport, storage).
/// Business rejections of `cast_vote` arrive as a response with `success == false`.
#[allow(async_fn_in_trait)]
pub trait Backend {
    /// Ideas matching `query`, newest first.
    async fn fetch_ideas(&self, query: &IdeaQuery) -> Result<Vec<IdeaAggregate>>;

    /// One idea as seen by `viewer`.
    async fn fetch_idea(&self, idea_id: i64, viewer: Option<&str>)
    -> Result<Option<IdeaAggregate>>;

    /// Inserts an idea owned by `owner`.
    async fn insert_idea(&self, owner: &str, idea: &NewIdea) -> Result<IdeaAggregate>;

    /// Updates the idea matching `idea_id` and, when given, `owner`. Returns
    /// `None` when no row matched.
    async fn update_idea(
        &self,
        idea_id: i64,
        owner: Option<&str>,
        patch: &IdeaPatch,
    ) -> Result<Option<IdeaAggregate>>;

    /// Deletes the idea matching `idea_id` and, when given, `owner`. Returns
    /// false when no row matched.
    async fn delete_idea(&self, idea_id: i64, owner: Option<&str>) -> Result<bool>;

    /// Records a vote click with server-side quota and counter accounting.
    async fn cast_vote(
        &self,
        user_id: &str,
        idea_id: i64,
        vote_type: VoteDirection,
    ) -> Result<CastVoteResponse>;

    /// Every vote held by `user_id`, most recent first.
    async fn fetch_vote_history(&self, user_id: &str) -> Result<Vec<VoteHistoryEntry>>;

    /// Current allowance of `user_id`.
    async fn fetch_vote_status(&self, user_id: &str) -> Result<VoteStatus>;
}
