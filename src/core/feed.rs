//! Feed ranking - filters a list of ideas and orders it for display.
//!
//! Ordering is a two-level comparator: official proposals always come first,
//! official proposals are ordered by deadline urgency, and only then does the
//! user-selected sort criterion apply. Remaining ties keep input order.

use crate::core::idea::{Category, IdeaAggregate, IdeaType};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use tracing::debug;

/// Lower bound on `created_at`, relative to evaluation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeRange {
    /// Last 24 hours
    Today,
    /// Last 7 days
    Week,
    /// Last 30 days
    Month,
    /// No bound
    #[default]
    All,
}

impl TimeRange {
    /// Parses a raw value; unknown values mean no bound.
    #[must_use]
    pub fn parse_lenient(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some("today") => Self::Today,
            Some("week") => Self::Week,
            Some("month") => Self::Month,
            _ => Self::All,
        }
    }

    /// Earliest admitted `created_at`, or `None` for no bound.
    #[must_use]
    pub fn lower_bound(self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            Self::Today => Some(now - Duration::days(1)),
            Self::Week => Some(now - Duration::days(7)),
            Self::Month => Some(now - Duration::days(30)),
            Self::All => None,
        }
    }
}

/// User-selected sort criterion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortBy {
    /// Most recent first
    #[default]
    Newest,
    /// Highest net score first
    Popular,
    /// Most total votes first
    Controversial,
    /// Official proposals view, by net score
    Official,
    /// Soonest deadline first among official proposals
    EndingSoon,
}

impl SortBy {
    /// Parses a raw value; unknown values fall back to the default.
    #[must_use]
    pub fn parse_lenient(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some("popular") => Self::Popular,
            Some("controversial") => Self::Controversial,
            Some("official") => Self::Official,
            Some("ending_soon") => Self::EndingSoon,
            _ => Self::Newest,
        }
    }
}

/// Raw filter parameters as they arrive from a query string or form.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FeedParams {
    /// `complaint`, `proposal` or `vote`
    #[serde(rename = "type")]
    pub idea_type: Option<String>,
    /// Category key
    pub category: Option<String>,
    /// Country name
    pub country: Option<String>,
    /// Search text
    pub search: Option<String>,
    /// `today`, `week`, `month` or `all`
    pub time_range: Option<String>,
    /// Sort criterion key
    pub sort_by: Option<String>,
    /// Only official proposals
    #[serde(default)]
    pub show_official_only: bool,
}

/// Feed filter and sort configuration. Every field defaults to no filter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterConfig {
    /// Exact idea type
    pub idea_type: Option<IdeaType>,
    /// Exact category
    pub category: Option<Category>,
    /// Country, compared case-insensitively
    pub country: Option<String>,
    /// Case-insensitive substring of title or description
    pub search_term: Option<String>,
    /// Creation-time window
    pub time_range: TimeRange,
    /// Sort criterion applied after official-proposal priority
    pub sort_by: SortBy,
    /// Keep only official proposals
    pub show_official_only: bool,
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty() && *v != "all")
}

impl FilterConfig {
    /// Builds a configuration from raw parameters. Unrecognised values are
    /// treated as no filter.
    #[must_use]
    pub fn from_params(params: &FeedParams) -> Self {
        Self {
            idea_type: non_blank(params.idea_type.as_deref()).and_then(|v| v.parse().ok()),
            category: non_blank(params.category.as_deref()).and_then(|v| v.parse().ok()),
            country: non_blank(params.country.as_deref()).map(str::to_string),
            search_term: params
                .search
                .as_deref()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_lowercase),
            time_range: TimeRange::parse_lenient(params.time_range.as_deref()),
            sort_by: SortBy::parse_lenient(params.sort_by.as_deref()),
            show_official_only: params.show_official_only,
        }
    }
}

/// Ranked feed split into display sections.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedSections {
    /// "Official Proposals"
    pub official: Vec<IdeaAggregate>,
    /// "Community Ideas"
    pub community: Vec<IdeaAggregate>,
}

/// Filters and orders ideas for display.
#[derive(Debug, Clone, Copy)]
pub struct FeedRanker {
    ending_soon: Duration,
}

impl Default for FeedRanker {
    fn default() -> Self {
        Self::new(crate::config::engine::ENDING_SOON_DAYS)
    }
}

struct Pass<'a> {
    filter: &'a FilterConfig,
    search: Option<String>,
    created_after: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
}

impl FeedRanker {
    /// A ranker treating deadlines within `ending_soon_days` as urgent.
    #[must_use]
    pub fn new(ending_soon_days: u32) -> Self {
        Self {
            ending_soon: Duration::days(i64::from(ending_soon_days)),
        }
    }

    /// Whether an idea's deadline falls in the "ending soon" window.
    #[must_use]
    pub fn is_ending_soon(&self, idea: &IdeaAggregate, now: DateTime<Utc>) -> bool {
        idea.voting_ends_at
            .is_some_and(|ends_at| ends_at > now && ends_at - now <= self.ending_soon)
    }

    /// Returns the ideas passing `filter`, in display order.
    #[must_use]
    pub fn rank(
        &self,
        ideas: &[IdeaAggregate],
        filter: &FilterConfig,
        now: DateTime<Utc>,
    ) -> Vec<IdeaAggregate> {
        // Bounds are fixed once per pass
        let pass = Pass {
            filter,
            search: filter.search_term.as_deref().map(str::to_lowercase),
            created_after: filter.time_range.lower_bound(now),
            now,
        };

        let mut ranked: Vec<IdeaAggregate> = ideas
            .iter()
            .filter(|idea| Self::matches(&pass, idea))
            .cloned()
            .collect();
        ranked.sort_by(|a, b| self.compare(a, b, pass.filter.sort_by, pass.now));

        debug!(
            "Ranked {} of {} ideas (sort {:?}, range {:?})",
            ranked.len(),
            ideas.len(),
            filter.sort_by,
            filter.time_range
        );
        ranked
    }

    /// Ranks and splits into official and community sections.
    #[must_use]
    pub fn sections(
        &self,
        ideas: &[IdeaAggregate],
        filter: &FilterConfig,
        now: DateTime<Utc>,
    ) -> FeedSections {
        partition(self.rank(ideas, filter, now))
    }

    fn matches(pass: &Pass<'_>, idea: &IdeaAggregate) -> bool {
        let filter = pass.filter;
        if filter.show_official_only && !idea.is_official_proposal {
            return false;
        }
        if filter.idea_type.is_some_and(|t| t != idea.idea_type) {
            return false;
        }
        if filter.category.is_some_and(|c| c != idea.category) {
            return false;
        }
        if let Some(country) = &filter.country {
            let same = idea
                .country
                .as_deref()
                .is_some_and(|c| c.eq_ignore_ascii_case(country));
            if !same {
                return false;
            }
        }
        if let Some(term) = &pass.search {
            let hit = idea.title.to_lowercase().contains(term.as_str())
                || idea.description.to_lowercase().contains(term.as_str());
            if !hit {
                return false;
            }
        }
        pass.created_after
            .is_none_or(|bound| idea.created_at >= bound)
    }

    fn compare(
        &self,
        a: &IdeaAggregate,
        b: &IdeaAggregate,
        sort_by: SortBy,
        now: DateTime<Utc>,
    ) -> Ordering {
        let both_official = a.is_official_proposal && b.is_official_proposal;
        match (a.is_official_proposal, b.is_official_proposal) {
            (true, false) => return Ordering::Less,
            (false, true) => return Ordering::Greater,
            _ => {}
        }

        if both_official {
            let urgency = self
                .is_ending_soon(b, now)
                .cmp(&self.is_ending_soon(a, now))
                .then_with(|| deadline_asc(a, b));
            if urgency != Ordering::Equal {
                return urgency;
            }
        }

        match sort_by {
            SortBy::Official | SortBy::Popular => b.net_score().cmp(&a.net_score()),
            SortBy::Controversial => b.total_votes().cmp(&a.total_votes()),
            SortBy::EndingSoon if both_official => deadline_asc(a, b),
            SortBy::EndingSoon => b.net_score().cmp(&a.net_score()),
            SortBy::Newest => b.created_at.cmp(&a.created_at),
        }
    }
}

/// Sooner deadline first; a missing deadline sorts last.
fn deadline_asc(a: &IdeaAggregate, b: &IdeaAggregate) -> Ordering {
    match (a.voting_ends_at, b.voting_ends_at) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Splits a ranked list by the official flag without reordering.
#[must_use]
pub fn partition(ranked: Vec<IdeaAggregate>) -> FeedSections {
    let (official, community) = ranked
        .into_iter()
        .partition(|idea| idea.is_official_proposal);
    FeedSections {
        official,
        community,
    }
}
