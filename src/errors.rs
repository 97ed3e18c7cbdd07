//! Unified error types for the vote and feed engine.
//!
//! Every failure that can reach a user carries a stable [`ErrorKind`] so the
//! presentation layer can pick a message without matching on display strings.

use crate::core::user::Role;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Crate-wide error type
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration could not be read or parsed
    #[error("Configuration error: {message}")]
    Config {
        /// What went wrong
        message: String,
    },

    /// Reference backend storage failure
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    /// An action that requires a signed-in user was attempted anonymously
    #[error("Not authenticated")]
    NotAuthenticated,

    /// A new vote was requested with no votes left this week
    #[error("No votes remaining this week")]
    QuotaExhausted,

    /// The idea's voting deadline has passed
    #[error("Voting on idea {idea_id} is closed")]
    VotingClosed {
        /// Idea that was voted on
        idea_id: i64,
        /// Deadline that passed, when known
        ended_at: Option<DateTime<Utc>>,
    },

    /// The backend requires a verified email address for this action
    #[error("Email address not verified")]
    EmailNotVerified,

    /// A user tried to mutate an idea they do not own
    #[error("User {user_id} does not own idea {idea_id}")]
    NotOwner {
        /// Idea that was targeted
        idea_id: i64,
        /// User who attempted the change
        user_id: String,
    },

    /// The user's role does not allow this action
    #[error("Role {actual} cannot perform this action (requires {required})")]
    InsufficientRole {
        /// Lowest role that would have been accepted
        required: Role,
        /// Role the user actually holds
        actual: Role,
    },

    /// No idea with this id exists
    #[error("Idea not found: {idea_id}")]
    IdeaNotFound {
        /// Requested idea id
        idea_id: i64,
    },

    /// User-supplied input failed validation
    #[error("Invalid input: {message}")]
    InvalidInput {
        /// What was wrong with the input
        message: String,
    },

    /// The backend rejected a request without a recognised error code
    #[error("Backend rejected the request: {message}")]
    Rpc {
        /// Message reported by the backend
        message: String,
    },

    /// The backend did not answer in time
    #[error("Backend did not answer within {after:?}")]
    Timeout {
        /// Configured bound that expired
        after: Duration,
    },

    /// A vote on the same idea is already being submitted
    #[error("A vote on idea {idea_id} is already being submitted")]
    VoteInFlight {
        /// Idea with the pending submission
        idea_id: i64,
    },
}

/// Stable classification of [`Error`] for rendering user-facing messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Sign-in required
    NotAuthenticated,
    /// Weekly allowance used up
    QuotaExhausted,
    /// Voting deadline passed
    VotingClosed,
    /// Email verification required
    EmailNotVerified,
    /// Ownership or role check failed
    Unauthorized,
    /// Target does not exist
    NotFound,
    /// Bad user input
    InvalidInput,
    /// Network, timeout or unexplained backend failure; retrying may help
    Transient,
    /// Duplicate submission that was ignored
    Duplicate,
    /// Local configuration or storage problem
    Internal,
}

impl ErrorKind {
    /// Message shown to the user for this kind of failure.
    #[must_use]
    pub const fn user_message(self) -> &'static str {
        match self {
            Self::NotAuthenticated => "Please sign in to continue.",
            Self::QuotaExhausted => {
                "You have used all your votes for this week. Votes reset every Monday."
            }
            Self::VotingClosed => "Voting on this proposal has ended.",
            Self::EmailNotVerified => "Please verify your email address before voting.",
            Self::Unauthorized => "You are not allowed to do that.",
            Self::NotFound => "This idea no longer exists.",
            Self::InvalidInput => "Please check your input and try again.",
            Self::Transient => "Something went wrong. Please try again.",
            Self::Duplicate => "Your vote is already being submitted.",
            Self::Internal => "An internal error occurred.",
        }
    }
}

impl Error {
    /// Classifies this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::NotAuthenticated => ErrorKind::NotAuthenticated,
            Self::QuotaExhausted => ErrorKind::QuotaExhausted,
            Self::VotingClosed { .. } => ErrorKind::VotingClosed,
            Self::EmailNotVerified => ErrorKind::EmailNotVerified,
            Self::NotOwner { .. } | Self::InsufficientRole { .. } => ErrorKind::Unauthorized,
            Self::IdeaNotFound { .. } => ErrorKind::NotFound,
            Self::InvalidInput { .. } => ErrorKind::InvalidInput,
            Self::Rpc { .. } | Self::Timeout { .. } => ErrorKind::Transient,
            Self::VoteInFlight { .. } => ErrorKind::Duplicate,
            Self::Config { .. } | Self::Database(_) => ErrorKind::Internal,
        }
    }
}

/// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;
