//! Vote ledger - weekly vote allowance and the vote transition table.
//!
//! Every vote action is one of three transitions on the (user, idea) pair:
//! casting a fresh vote consumes one unit of the weekly allowance, clicking the
//! same direction again retracts the vote and refunds the unit, and switching
//! direction moves one count between the counters at no cost. The functions in
//! this module only decide; the authoritative write happens in the backend.

use crate::{
    core::idea::{Counter, IdeaAggregate, VoteDirection},
    errors::{Error, Result},
};
use chrono::{DateTime, Datelike, Duration, NaiveTime, Utc, Weekday};
use serde::{Deserialize, Serialize};

/// Which of the vote transitions an action resolved to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoteTransition {
    /// `none -> direction`
    Cast,
    /// `direction -> direction`, removes the vote
    Retract,
    /// `opposite -> direction`
    Switch,
}

/// Result of a ledger decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoteOutcome {
    /// Transition that was applied
    pub transition: VoteTransition,
    /// Vote held before the action
    pub previous_vote: Option<VoteDirection>,
    /// Vote held after the action
    pub new_user_vote: Option<VoteDirection>,
    /// Change to apply to `upvotes`
    pub upvote_delta: i64,
    /// Change to apply to `downvotes`
    pub downvote_delta: i64,
    /// Allowance left after the action
    pub votes_remaining: u32,
}

impl VoteOutcome {
    fn with_delta(mut self, counter: Counter, delta: i64) -> Self {
        match counter {
            Counter::Upvotes => self.upvote_delta += delta,
            Counter::Downvotes => self.downvote_delta += delta,
        }
        self
    }
}

/// When the weekly allowance resets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResetSchedule {
    weekday: Weekday,
    hour: u32,
}

impl Default for ResetSchedule {
    /// Monday 00:00 UTC
    fn default() -> Self {
        Self {
            weekday: Weekday::Mon,
            hour: 0,
        }
    }
}

impl ResetSchedule {
    /// Creates a schedule resetting on `weekday` at `hour`:00 UTC.
    pub fn new(weekday: Weekday, hour: u32) -> Result<Self> {
        if hour > 23 {
            return Err(Error::Config {
                message: format!("reset hour must be between 0 and 23, got {hour}"),
            });
        }
        Ok(Self { weekday, hour })
    }

    /// The first reset boundary strictly after `now`.
    #[must_use]
    pub fn next_reset_after(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let today = now.date_naive();
        let days_ahead = (i64::from(self.weekday.num_days_from_monday())
            - i64::from(today.weekday().num_days_from_monday()))
        .rem_euclid(7);
        let time = NaiveTime::from_hms_opt(self.hour, 0, 0).unwrap_or(NaiveTime::MIN);
        let candidate = (today + Duration::days(days_ahead)).and_time(time).and_utc();
        if candidate > now {
            candidate
        } else {
            candidate + Duration::weeks(1)
        }
    }
}

/// Weekly vote allowance of one user.
///
/// `votes_remaining` never exceeds `weekly_vote_limit`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteQuota {
    /// Votes left until the next reset
    pub votes_remaining: u32,
    /// Allowance granted at every reset
    pub weekly_vote_limit: u32,
    /// Next reset boundary
    pub votes_reset_at: DateTime<Utc>,
}

impl VoteQuota {
    /// A full allowance that resets at the next boundary after `now`.
    #[must_use]
    pub fn full(weekly_vote_limit: u32, schedule: &ResetSchedule, now: DateTime<Utc>) -> Self {
        Self {
            votes_remaining: weekly_vote_limit,
            weekly_vote_limit,
            votes_reset_at: schedule.next_reset_after(now),
        }
    }

    /// Whether the reset boundary has been reached at `now`.
    #[must_use]
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.votes_reset_at <= now
    }

    /// The quota as it stands at `now`: a full allowance once the reset
    /// boundary has passed, otherwise unchanged (but clamped to the limit).
    #[must_use]
    pub fn refreshed(&self, schedule: &ResetSchedule, now: DateTime<Utc>) -> Self {
        if self.is_due(now) {
            Self::full(self.weekly_vote_limit, schedule, now)
        } else {
            Self {
                votes_remaining: self.votes_remaining.min(self.weekly_vote_limit),
                ..*self
            }
        }
    }

    /// Returns this quota with `votes_remaining` replaced, clamped to the limit.
    #[must_use]
    pub fn with_remaining(self, votes_remaining: u32) -> Self {
        Self {
            votes_remaining: votes_remaining.min(self.weekly_vote_limit),
            ..self
        }
    }
}

/// Decision functions for vote actions.
#[derive(Debug, Clone, Copy, Default)]
pub struct VoteLedger;

impl VoteLedger {
    /// Resolves a vote click on an idea the user may vote on.
    ///
    /// Fails with `QuotaExhausted` only for a fresh vote when nothing is left.
    pub fn transition(
        current: Option<VoteDirection>,
        direction: VoteDirection,
        quota: &VoteQuota,
    ) -> Result<VoteOutcome> {
        let base = VoteOutcome {
            transition: VoteTransition::Cast,
            previous_vote: current,
            new_user_vote: Some(direction),
            upvote_delta: 0,
            downvote_delta: 0,
            votes_remaining: quota.votes_remaining.min(quota.weekly_vote_limit),
        };

        match current {
            None => {
                if base.votes_remaining == 0 {
                    return Err(Error::QuotaExhausted);
                }
                Ok(VoteOutcome {
                    votes_remaining: base.votes_remaining - 1,
                    ..base
                }
                .with_delta(direction.counter(), 1))
            }
            Some(existing) if existing == direction => Ok(VoteOutcome {
                transition: VoteTransition::Retract,
                new_user_vote: None,
                votes_remaining: (base.votes_remaining + 1).min(quota.weekly_vote_limit),
                ..base
            }
            .with_delta(direction.counter(), -1)),
            Some(existing) => Ok(VoteOutcome {
                transition: VoteTransition::Switch,
                ..base
            }
            .with_delta(existing.counter(), -1)
            .with_delta(direction.counter(), 1)),
        }
    }

    /// Full check for a vote by `user_id` on `idea`: authentication, the voting
    /// deadline, then the transition table.
    pub fn apply_vote(
        user_id: Option<&str>,
        idea: &IdeaAggregate,
        direction: VoteDirection,
        quota: &VoteQuota,
        now: DateTime<Utc>,
    ) -> Result<VoteOutcome> {
        if user_id.is_none_or(str::is_empty) {
            return Err(Error::NotAuthenticated);
        }
        if !idea.is_voting_open(now) {
            return Err(Error::VotingClosed {
                idea_id: idea.id,
                ended_at: idea.voting_ends_at,
            });
        }
        Self::transition(idea.user_vote, direction, quota)
    }
}
