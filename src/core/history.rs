//! Vote status and history display helpers.

use crate::core::{
    backend::{VoteHistoryEntry, VoteStatus},
    idea::VoteDirection,
};
use chrono::{DateTime, Utc};
use std::fmt::Write;

/// Formats the time left until `at` as e.g. `"2d 5h"` or `"40m"`.
#[must_use]
pub fn format_time_until(at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let remaining = at - now;
    if remaining.num_minutes() <= 0 {
        return "now".to_string();
    }
    let days = remaining.num_days();
    let hours = remaining.num_hours() % 24;
    let minutes = remaining.num_minutes() % 60;
    match (days, hours) {
        (0, 0) => format!("{minutes}m"),
        (0, h) => format!("{h}h {minutes}m"),
        (d, h) => format!("{d}d {h}h"),
    }
}

/// One-line summary of a user's allowance.
#[must_use]
pub fn format_vote_status(status: &VoteStatus, now: DateTime<Utc>) -> String {
    format!(
        "{} of {} votes left this week | resets in {} ({})",
        status.votes_remaining.min(status.weekly_vote_limit),
        status.weekly_vote_limit,
        format_time_until(status.votes_reset_at, now),
        status.votes_reset_at.format("%A %H:%M UTC")
    )
}

/// Formats vote history entries, one per line, in the order given.
#[must_use]
pub fn format_vote_history(entries: &[VoteHistoryEntry]) -> String {
    if entries.is_empty() {
        return "No votes cast yet.".to_string();
    }

    let mut output = format!("Vote history ({} ideas):\n", entries.len());
    for entry in entries {
        let arrow = match entry.vote_type {
            VoteDirection::Up => "▲",
            VoteDirection::Down => "▼",
        };
        // Writing to a String cannot fail
        let _ = writeln!(
            output,
            "  {arrow} {} | {}",
            entry.idea_title,
            entry.voted_at.format("%Y-%m-%d %H:%M")
        );
    }
    output
}
