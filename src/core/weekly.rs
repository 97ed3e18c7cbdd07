//! Weekly vote allowance reset
//!
//! Restores the allowance of every profile whose reset boundary has passed
//! and moves the boundary to the next scheduled reset. The sweep is
//! idempotent: profiles already reset for the current week are left alone,
//! so running it twice in the same week changes nothing.

use crate::{
    core::{ledger::ResetSchedule, remote::quota_of},
    entities::{Profile, profile},
    errors::Result,
};
use chrono::{DateTime, Utc};
use sea_orm::{Set, TransactionTrait, prelude::*};
use tracing::info;

/// Result of resetting one profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileResetResult {
    /// Profile that was reset
    pub user_id: String,
    /// Votes left before the reset
    pub old_remaining: u32,
    /// Votes granted by the reset
    pub new_remaining: u32,
    /// Boundary of the following reset
    pub next_reset_at: DateTime<Utc>,
}

/// Result of one sweep over all profiles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeeklyResetResult {
    /// Profiles that were reset
    pub reset_profiles: Vec<ProfileResetResult>,
    /// Profiles looked at
    pub total_profiles_checked: usize,
    /// Time the sweep ran at
    pub processed_at: DateTime<Utc>,
}

/// Checks whether any profile has reached its reset boundary at `now`.
pub async fn is_weekly_reset_due(db: &DatabaseConnection, now: DateTime<Utc>) -> Result<bool> {
    let profiles = Profile::find().all(db).await?;
    Ok(profiles.iter().any(|p| quota_of(p).is_due(now)))
}

/// Processes weekly resets for all profiles. This function:
///
/// 1. Finds every profile whose `votes_reset_at` is at or before `now`
/// 2. Restores `votes_remaining` to the profile's weekly limit
/// 3. Advances `votes_reset_at` to the next boundary of `schedule` after `now`
///
/// All updates happen in one database transaction.
///
/// # Arguments
/// * `db` - Database connection
/// * `schedule` - When resets happen
/// * `now` - Evaluation time
pub async fn process_weekly_resets(
    db: &DatabaseConnection,
    schedule: &ResetSchedule,
    now: DateTime<Utc>,
) -> Result<WeeklyResetResult> {
    let txn = db.begin().await?;

    let profiles = Profile::find().all(&txn).await?;
    let total_profiles_checked = profiles.len();
    let mut reset_profiles = Vec::new();

    for profile in profiles {
        let quota = quota_of(&profile);
        if !quota.is_due(now) {
            continue;
        }
        let fresh = quota.refreshed(schedule, now);

        let user_id = profile.user_id.clone();
        let mut active_model: profile::ActiveModel = profile.into();
        active_model.votes_remaining = Set(i32::try_from(fresh.votes_remaining).unwrap_or(i32::MAX));
        active_model.votes_reset_at = Set(fresh.votes_reset_at);
        active_model.update(&txn).await?;

        reset_profiles.push(ProfileResetResult {
            user_id,
            old_remaining: quota.votes_remaining,
            new_remaining: fresh.votes_remaining,
            next_reset_at: fresh.votes_reset_at,
        });
    }

    txn.commit().await?;

    info!(
        "Weekly reset: {} of {} profiles restored",
        reset_profiles.len(),
        total_profiles_checked
    );
    Ok(WeeklyResetResult {
        reset_profiles,
        total_profiles_checked,
        processed_at: now,
    })
}

/// Formats a weekly reset result into a human-readable summary string.
#[must_use]
pub fn format_weekly_reset_summary(result: &WeeklyResetResult) -> String {
    use std::fmt::Write;

    let mut summary = format!(
        "Weekly Reset - {} - {} of {} profiles restored\n",
        result.processed_at.format("%Y-%m-%d %H:%M UTC"),
        result.reset_profiles.len(),
        result.total_profiles_checked
    );

    for reset in &result.reset_profiles {
        // Writing to a String cannot fail
        let _ = writeln!(
            summary,
            "  {} | {} → {} votes | next reset {}",
            reset.user_id,
            reset.old_remaining,
            reset.new_remaining,
            reset.next_reset_at.format("%a %Y-%m-%d %H:%M")
        );
    }

    summary
}
