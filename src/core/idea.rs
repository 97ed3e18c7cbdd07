//! Idea aggregate - one idea plus the vote-derived state shown to a viewer.
//!
//! Idea types, categories and vote directions are closed enumerations with a
//! lookup table for their display labels, so an unknown category is a parse
//! error instead of a silent fallback.

use crate::{
    core::ledger::VoteOutcome,
    errors::{Error, Result},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::warn;

/// Kind of idea, fixed at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdeaType {
    /// Report of a problem
    Complaint,
    /// Suggested change
    Proposal,
    /// Informal poll
    Vote,
}

impl IdeaType {
    /// Every idea type, in display order
    pub const ALL: [Self; 3] = [Self::Complaint, Self::Proposal, Self::Vote];

    /// Storage representation
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Complaint => "complaint",
            Self::Proposal => "proposal",
            Self::Vote => "vote",
        }
    }

    /// Display label
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Complaint => "Complaint",
            Self::Proposal => "Proposal",
            Self::Vote => "Vote",
        }
    }
}

impl FromStr for IdeaType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| Error::InvalidInput {
                message: format!("unknown idea type '{s}'"),
            })
    }
}

/// Idea category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// Roads, utilities and public works
    Infrastructure,
    /// Healthcare and public health
    Health,
    /// Public safety
    Security,
    /// Schools and learning
    Education,
    /// Environment and green spaces
    Environment,
    /// Public transport and traffic
    Transportation,
    /// Culture and leisure
    Culture,
    /// Jobs and local economy
    Economy,
    /// Anything else
    Other,
}

/// (category, storage key, display label)
const CATEGORY_TABLE: [(Category, &str, &str); 9] = [
    (Category::Infrastructure, "infrastructure", "Infrastructure"),
    (Category::Health, "health", "Health"),
    (Category::Security, "security", "Security"),
    (Category::Education, "education", "Education"),
    (Category::Environment, "environment", "Environment"),
    (Category::Transportation, "transportation", "Transportation"),
    (Category::Culture, "culture", "Culture"),
    (Category::Economy, "economy", "Economy"),
    (Category::Other, "other", "Other"),
];

impl Category {
    /// Every category, in display order
    #[must_use]
    pub fn all() -> impl Iterator<Item = Self> {
        CATEGORY_TABLE.iter().map(|(c, _, _)| *c)
    }

    fn entry(self) -> (Self, &'static str, &'static str) {
        CATEGORY_TABLE
            .iter()
            .copied()
            .find(|(c, _, _)| *c == self)
            .unwrap_or((Self::Other, "other", "Other"))
    }

    /// Storage representation
    #[must_use]
    pub fn as_str(self) -> &'static str {
        self.entry().1
    }

    /// Display label
    #[must_use]
    pub fn label(self) -> &'static str {
        self.entry().2
    }
}

impl FromStr for Category {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        CATEGORY_TABLE
            .iter()
            .find(|(_, key, _)| *key == s)
            .map(|(c, _, _)| *c)
            .ok_or_else(|| Error::InvalidInput {
                message: format!("unknown category '{s}'"),
            })
    }
}

/// Direction of a single vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoteDirection {
    /// Support
    Up,
    /// Oppose
    Down,
}

impl VoteDirection {
    /// Storage representation
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Up => "up",
            Self::Down => "down",
        }
    }

    /// The counter a vote in this direction feeds.
    #[must_use]
    pub const fn counter(self) -> Counter {
        match self {
            Self::Up => Counter::Upvotes,
            Self::Down => Counter::Downvotes,
        }
    }
}

impl FromStr for VoteDirection {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "up" => Ok(Self::Up),
            "down" => Ok(Self::Down),
            other => Err(Error::InvalidInput {
                message: format!("unknown vote type '{other}'"),
            }),
        }
    }
}

/// Vote counters carried by an idea.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Counter {
    /// Support counter
    Upvotes,
    /// Opposition counter
    Downvotes,
}

/// Whether voting is still open for a deadline at `now`.
#[must_use]
pub fn voting_open(voting_ends_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    voting_ends_at.is_none_or(|ends_at| ends_at > now)
}

/// Adds `delta` to `value`, flooring at zero. Returns the new value and whether
/// the floor was hit.
#[must_use]
pub const fn clamped_add(value: i64, delta: i64) -> (i64, bool) {
    let raw = value.saturating_add(delta);
    if raw < 0 { (0, true) } else { (raw, false) }
}

/// One idea as seen by one viewer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdeaAggregate {
    /// Unique identifier, never reused
    pub id: i64,
    /// Owner id; `None` when the idea is anonymous
    pub author_id: Option<String>,
    /// Owner display name; `None` when the idea is anonymous
    pub author_name: Option<String>,
    /// Whether the viewer owns this idea
    pub is_own: bool,
    /// Short headline, editable by the owner
    pub title: String,
    /// Body text, editable by the owner
    pub description: String,
    /// Fixed at creation
    pub idea_type: IdeaType,
    /// Fixed at creation
    pub category: Category,
    /// Free-text location tag
    pub location_value: Option<String>,
    /// Location granularity tag (e.g. `"city"`, `"global"`)
    pub location_level: Option<String>,
    /// Country tag
    pub country: Option<String>,
    /// Hides the author on every read path
    pub is_anonymous: bool,
    /// Official proposals rank before community ideas
    pub is_official_proposal: bool,
    /// Voting deadline for official proposals
    pub voting_ends_at: Option<DateTime<Utc>>,
    /// Never negative
    pub upvotes: i64,
    /// Never negative
    pub downvotes: i64,
    /// The viewer's own vote, if any
    pub user_vote: Option<VoteDirection>,
    /// Immutable creation time
    pub created_at: DateTime<Utc>,
}

impl IdeaAggregate {
    /// `upvotes - downvotes`
    #[must_use]
    pub const fn net_score(&self) -> i64 {
        self.upvotes - self.downvotes
    }

    /// Total engagement regardless of sign
    #[must_use]
    pub const fn total_votes(&self) -> i64 {
        self.upvotes + self.downvotes
    }

    /// Voting is open when there is no deadline or it lies in the future.
    #[must_use]
    pub fn is_voting_open(&self, now: DateTime<Utc>) -> bool {
        voting_open(self.voting_ends_at, now)
    }

    /// Applies `delta` to a counter, flooring at zero. Returns true when the
    /// floor was hit, which indicates the local copy had drifted.
    pub fn apply_delta(&mut self, counter: Counter, delta: i64) -> bool {
        let slot = match counter {
            Counter::Upvotes => &mut self.upvotes,
            Counter::Downvotes => &mut self.downvotes,
        };
        let (value, clamped) = clamped_add(*slot, delta);
        if clamped {
            warn!(
                "Counter {:?} on idea {} clamped at zero (was {}, delta {})",
                counter, self.id, *slot, delta
            );
        }
        *slot = value;
        clamped
    }

    /// Copies the owner-editable content and official metadata from a fresher
    /// copy of the same idea, keeping the viewer-derived fields.
    pub fn apply_content(&mut self, fresh: &Self) {
        self.title.clone_from(&fresh.title);
        self.description.clone_from(&fresh.description);
        self.is_official_proposal = fresh.is_official_proposal;
        self.voting_ends_at = fresh.voting_ends_at;
    }

    /// Applies a ledger decision: both counter deltas and the new viewer vote.
    pub fn apply_outcome(&mut self, outcome: &VoteOutcome) {
        self.apply_delta(Counter::Upvotes, outcome.upvote_delta);
        self.apply_delta(Counter::Downvotes, outcome.downvote_delta);
        self.user_vote = outcome.new_user_vote;
    }
}
