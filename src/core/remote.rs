//! Reference backend over `SeaORM`.
//!
//! Implements the [`Backend`] contract against the profiles, ideas and votes
//! tables. `cast_vote` is the authoritative vote write: it runs in a single
//! database transaction so the vote row, both counters and the voter's quota
//! change together or not at all.

use crate::{
    config::engine::EngineConfig,
    core::{
        backend::{
            Backend, CastVoteResponse, IdeaPatch, IdeaQuery, NewIdea, RpcErrorCode,
            VoteHistoryEntry, VoteStatus,
        },
        idea::{IdeaAggregate, VoteDirection, clamped_add, voting_open},
        ledger::{ResetSchedule, VoteLedger, VoteQuota, VoteTransition},
        user::{Role, Viewer},
    },
    entities::{Idea, Profile, Vote, idea, profile, vote},
    errors::{Error, Result},
};
use chrono::{DateTime, Utc};
use sea_orm::{
    DatabaseTransaction, QueryOrder, Set, TransactionTrait, prelude::*,
};
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// Converts a stored allowance column into a count.
fn stored_count(value: i32) -> u32 {
    u32::try_from(value).unwrap_or(0)
}

/// Converts a count into a stored allowance column.
fn to_column(value: u32) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}

/// The allowance stored on a profile.
#[must_use]
pub fn quota_of(profile: &profile::Model) -> VoteQuota {
    let weekly_vote_limit = stored_count(profile.weekly_vote_limit);
    VoteQuota {
        votes_remaining: stored_count(profile.votes_remaining).min(weekly_vote_limit),
        weekly_vote_limit,
        votes_reset_at: profile.votes_reset_at,
    }
}

fn to_aggregate(
    model: idea::Model,
    author: Option<&profile::Model>,
    viewer: Option<&str>,
    user_vote: Option<VoteDirection>,
) -> Result<IdeaAggregate> {
    let is_own = viewer == Some(model.user_id.as_str());
    let (author_id, author_name) = if model.is_anonymous {
        (None, None)
    } else {
        (
            Some(model.user_id.clone()),
            author.map(|p| p.display_name.clone()),
        )
    };

    Ok(IdeaAggregate {
        id: model.id,
        author_id,
        author_name,
        is_own,
        idea_type: model.idea_type.parse()?,
        category: model.category.parse()?,
        title: model.title,
        description: model.description,
        location_value: model.location_value,
        location_level: model.location_level,
        country: model.country,
        is_anonymous: model.is_anonymous,
        is_official_proposal: model.is_official_proposal,
        voting_ends_at: model.voting_ends_at,
        upvotes: model.upvotes.max(0),
        downvotes: model.downvotes.max(0),
        user_vote,
        created_at: model.created_at,
    })
}

async fn viewer_votes<C>(db: &C, viewer: &str, idea_ids: &[i64]) -> Result<HashMap<i64, VoteDirection>>
where
    C: ConnectionTrait,
{
    if idea_ids.is_empty() {
        return Ok(HashMap::new());
    }
    let rows = Vote::find()
        .filter(vote::Column::UserId.eq(viewer))
        .filter(vote::Column::IdeaId.is_in(idea_ids.iter().copied()))
        .all(db)
        .await?;

    rows.into_iter()
        .map(|row| -> Result<(i64, VoteDirection)> { Ok((row.idea_id, row.vote_type.parse()?)) })
        .collect()
}

async fn reject(
    txn: DatabaseTransaction,
    code: &RpcErrorCode,
    message: &str,
) -> Result<CastVoteResponse> {
    txn.rollback().await?;
    debug!("cast_vote rejected with {}: {}", code.as_code(), message);
    Ok(CastVoteResponse::rejected(code, message))
}

/// `SeaORM` implementation of the hosted backend.
#[derive(Debug, Clone)]
pub struct SeaOrmBackend {
    db: DatabaseConnection,
    schedule: ResetSchedule,
    default_weekly_vote_limit: u32,
}

impl SeaOrmBackend {
    /// Creates a backend using the engine configuration's reset schedule and
    /// default allowance.
    pub fn new(db: DatabaseConnection, config: &EngineConfig) -> Result<Self> {
        Ok(Self {
            db,
            schedule: config.reset_schedule()?,
            default_weekly_vote_limit: config.default_weekly_vote_limit,
        })
    }

    /// The underlying connection
    #[must_use]
    pub const fn connection(&self) -> &DatabaseConnection {
        &self.db
    }

    /// The weekly reset schedule in use
    #[must_use]
    pub const fn schedule(&self) -> &ResetSchedule {
        &self.schedule
    }

    /// Creates a profile with a full weekly allowance.
    pub async fn register_profile(
        &self,
        user_id: &str,
        display_name: &str,
        role: Role,
        email_verified: bool,
    ) -> Result<profile::Model> {
        if user_id.trim().is_empty() {
            return Err(Error::InvalidInput {
                message: "user id cannot be empty".to_string(),
            });
        }
        let quota = VoteQuota::full(self.default_weekly_vote_limit, &self.schedule, Utc::now());
        let profile = profile::ActiveModel {
            user_id: Set(user_id.to_string()),
            display_name: Set(display_name.trim().to_string()),
            role: Set(role.as_str().to_string()),
            email_verified: Set(email_verified),
            votes_remaining: Set(to_column(quota.votes_remaining)),
            weekly_vote_limit: Set(to_column(quota.weekly_vote_limit)),
            votes_reset_at: Set(quota.votes_reset_at),
        };
        let result = profile.insert(&self.db).await?;
        info!("Registered profile {} as {}", user_id, role);
        Ok(result)
    }

    /// Marks a profile's email as verified or not.
    pub async fn set_email_verified(&self, user_id: &str, verified: bool) -> Result<()> {
        let profile = Profile::find_by_id(user_id.to_string())
            .one(&self.db)
            .await?
            .ok_or(Error::NotAuthenticated)?;
        let mut active: profile::ActiveModel = profile.into();
        active.email_verified = Set(verified);
        active.update(&self.db).await?;
        Ok(())
    }

    /// Loads the signed-in identity for `user_id`.
    pub async fn viewer(&self, user_id: &str) -> Result<Option<Viewer>> {
        let Some(profile) = Profile::find_by_id(user_id.to_string()).one(&self.db).await? else {
            return Ok(None);
        };
        Ok(Some(Viewer {
            role: profile.role.parse()?,
            user_id: profile.user_id,
            email_verified: profile.email_verified,
        }))
    }

    async fn cast_vote_at(
        &self,
        user_id: &str,
        idea_id: i64,
        direction: VoteDirection,
        now: DateTime<Utc>,
    ) -> Result<CastVoteResponse> {
        let txn = self.db.begin().await?;

        let Some(profile) = Profile::find_by_id(user_id.to_string()).one(&txn).await? else {
            return reject(txn, &RpcErrorCode::NotAuthenticated, "Sign in to vote").await;
        };
        if !profile.email_verified {
            return reject(
                txn,
                &RpcErrorCode::EmailNotVerified,
                "Verify your email address to vote",
            )
            .await;
        }

        let Some(idea) = Idea::find_by_id(idea_id).one(&txn).await? else {
            return reject(txn, &RpcErrorCode::IdeaNotFound, "Idea not found").await;
        };
        if !voting_open(idea.voting_ends_at, now) {
            return reject(txn, &RpcErrorCode::VotingClosed, "Voting has ended").await;
        }

        let existing = Vote::find()
            .filter(vote::Column::UserId.eq(user_id))
            .filter(vote::Column::IdeaId.eq(idea_id))
            .one(&txn)
            .await?;
        let current = existing
            .as_ref()
            .map(|row| row.vote_type.parse::<VoteDirection>())
            .transpose()?;

        let quota = quota_of(&profile).refreshed(&self.schedule, now);
        let outcome = match VoteLedger::transition(current, direction, &quota) {
            Ok(outcome) => outcome,
            Err(Error::QuotaExhausted) => {
                return reject(
                    txn,
                    &RpcErrorCode::QuotaExhausted,
                    "No votes remaining this week",
                )
                .await;
            }
            Err(e) => return Err(e),
        };

        match existing {
            None => {
                vote::ActiveModel {
                    user_id: Set(user_id.to_string()),
                    idea_id: Set(idea_id),
                    vote_type: Set(direction.as_str().to_string()),
                    voted_at: Set(now),
                    ..Default::default()
                }
                .insert(&txn)
                .await?;
            }
            Some(row) if outcome.new_user_vote.is_none() => {
                row.delete(&txn).await?;
            }
            Some(row) => {
                let mut active: vote::ActiveModel = row.into();
                active.vote_type = Set(direction.as_str().to_string());
                active.voted_at = Set(now);
                active.update(&txn).await?;
            }
        }

        let (upvotes, up_clamped) = clamped_add(idea.upvotes, outcome.upvote_delta);
        let (downvotes, down_clamped) = clamped_add(idea.downvotes, outcome.downvote_delta);
        if up_clamped || down_clamped {
            warn!(
                "Counters of idea {} clamped at zero ({}/{} with deltas {}/{})",
                idea_id, idea.upvotes, idea.downvotes, outcome.upvote_delta, outcome.downvote_delta
            );
        }
        let mut idea_active: idea::ActiveModel = idea.into();
        idea_active.upvotes = Set(upvotes);
        idea_active.downvotes = Set(downvotes);
        idea_active.update(&txn).await?;

        let mut profile_active: profile::ActiveModel = profile.into();
        profile_active.votes_remaining = Set(to_column(outcome.votes_remaining));
        profile_active.votes_reset_at = Set(quota.votes_reset_at);
        profile_active.update(&txn).await?;

        txn.commit().await?;

        let message = match outcome.transition {
            VoteTransition::Cast => "Vote recorded",
            VoteTransition::Retract => "Vote removed",
            VoteTransition::Switch => "Vote changed",
        };
        info!(
            "{} on idea {} by {} ({:?}), {} votes left",
            message, idea_id, user_id, outcome.transition, outcome.votes_remaining
        );
        Ok(CastVoteResponse::accepted(message, outcome.votes_remaining))
    }
}

impl Backend for SeaOrmBackend {
    async fn fetch_ideas(&self, query: &IdeaQuery) -> Result<Vec<IdeaAggregate>> {
        let mut select = Idea::find();
        if let Some(owner) = &query.owner {
            select = select.filter(idea::Column::UserId.eq(owner.as_str()));
        }
        if let Some(idea_type) = query.idea_type {
            select = select.filter(idea::Column::IdeaType.eq(idea_type.as_str()));
        }
        if let Some(category) = query.category {
            select = select.filter(idea::Column::Category.eq(category.as_str()));
        }
        if let Some(country) = &query.country {
            select = select.filter(idea::Column::Country.eq(country.as_str()));
        }
        if let Some(level) = &query.location_level {
            select = select.filter(idea::Column::LocationLevel.eq(level.as_str()));
        }

        let rows = select
            .find_also_related(Profile)
            .order_by_desc(idea::Column::CreatedAt)
            .order_by_desc(idea::Column::Id)
            .all(&self.db)
            .await?;

        let viewer = query.viewer.as_deref();
        let votes = match viewer {
            Some(viewer) => {
                let ids: Vec<i64> = rows.iter().map(|(idea, _)| idea.id).collect();
                viewer_votes(&self.db, viewer, &ids).await?
            }
            None => HashMap::new(),
        };

        rows.into_iter()
            .map(|(idea, author)| {
                let user_vote = votes.get(&idea.id).copied();
                to_aggregate(idea, author.as_ref(), viewer, user_vote)
            })
            .collect()
    }

    async fn fetch_idea(
        &self,
        idea_id: i64,
        viewer: Option<&str>,
    ) -> Result<Option<IdeaAggregate>> {
        let Some((idea, author)) = Idea::find_by_id(idea_id)
            .find_also_related(Profile)
            .one(&self.db)
            .await?
        else {
            return Ok(None);
        };
        let user_vote = match viewer {
            Some(viewer) => viewer_votes(&self.db, viewer, &[idea_id])
                .await?
                .get(&idea_id)
                .copied(),
            None => None,
        };
        to_aggregate(idea, author.as_ref(), viewer, user_vote).map(Some)
    }

    async fn insert_idea(&self, owner: &str, new_idea: &NewIdea) -> Result<IdeaAggregate> {
        let author = Profile::find_by_id(owner.to_string())
            .one(&self.db)
            .await?
            .ok_or(Error::NotAuthenticated)?;

        let model = idea::ActiveModel {
            user_id: Set(owner.to_string()),
            title: Set(new_idea.title.clone()),
            description: Set(new_idea.description.clone()),
            idea_type: Set(new_idea.idea_type.as_str().to_string()),
            category: Set(new_idea.category.as_str().to_string()),
            location_value: Set(new_idea.location_value.clone()),
            location_level: Set(new_idea.location_level.clone()),
            country: Set(new_idea.country.clone()),
            is_anonymous: Set(new_idea.is_anonymous),
            is_official_proposal: Set(false),
            voting_ends_at: Set(None),
            upvotes: Set(0),
            downvotes: Set(0),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(&self.db)
        .await?;

        to_aggregate(model, Some(&author), Some(owner), None)
    }

    async fn update_idea(
        &self,
        idea_id: i64,
        owner: Option<&str>,
        patch: &IdeaPatch,
    ) -> Result<Option<IdeaAggregate>> {
        let mut select = Idea::find_by_id(idea_id);
        if let Some(owner) = owner {
            select = select.filter(idea::Column::UserId.eq(owner));
        }
        let Some(existing) = select.one(&self.db).await? else {
            return Ok(None);
        };

        let mut active: idea::ActiveModel = existing.into();
        if let Some(title) = &patch.title {
            active.title = Set(title.clone());
        }
        if let Some(description) = &patch.description {
            active.description = Set(description.clone());
        }
        if let Some(official) = patch.is_official_proposal {
            active.is_official_proposal = Set(official);
        }
        if let Some(ends_at) = patch.voting_ends_at {
            active.voting_ends_at = Set(ends_at);
        }
        active.update(&self.db).await?;

        self.fetch_idea(idea_id, owner).await
    }

    async fn delete_idea(&self, idea_id: i64, owner: Option<&str>) -> Result<bool> {
        let txn = self.db.begin().await?;

        let mut select = Idea::find_by_id(idea_id);
        if let Some(owner) = owner {
            select = select.filter(idea::Column::UserId.eq(owner));
        }
        let Some(existing) = select.one(&txn).await? else {
            txn.rollback().await?;
            return Ok(false);
        };

        Vote::delete_many()
            .filter(vote::Column::IdeaId.eq(idea_id))
            .exec(&txn)
            .await?;
        existing.delete(&txn).await?;
        txn.commit().await?;

        info!("Deleted idea {}", idea_id);
        Ok(true)
    }

    async fn cast_vote(
        &self,
        user_id: &str,
        idea_id: i64,
        vote_type: VoteDirection,
    ) -> Result<CastVoteResponse> {
        self.cast_vote_at(user_id, idea_id, vote_type, Utc::now()).await
    }

    async fn fetch_vote_history(&self, user_id: &str) -> Result<Vec<VoteHistoryEntry>> {
        let rows = Vote::find()
            .filter(vote::Column::UserId.eq(user_id))
            .find_also_related(Idea)
            .order_by_desc(vote::Column::VotedAt)
            .order_by_desc(vote::Column::Id)
            .all(&self.db)
            .await?;

        rows.into_iter()
            .map(|(row, idea)| -> Result<VoteHistoryEntry> {
                Ok(VoteHistoryEntry {
                    idea_id: row.idea_id,
                    idea_title: idea.map(|i| i.title).unwrap_or_default(),
                    vote_type: row.vote_type.parse()?,
                    voted_at: row.voted_at,
                })
            })
            .collect()
    }

    async fn fetch_vote_status(&self, user_id: &str) -> Result<VoteStatus> {
        let profile = Profile::find_by_id(user_id.to_string())
            .one(&self.db)
            .await?
            .ok_or(Error::NotAuthenticated)?;
        let quota = quota_of(&profile).refreshed(&self.schedule, Utc::now());
        Ok(VoteStatus {
            votes_remaining: quota.votes_remaining,
            votes_reset_at: quota.votes_reset_at,
            weekly_vote_limit: quota.weekly_vote_limit,
        })
    }
}
