//! Shared test utilities for `civic-ideas`.
//!
//! This module provides common helper functions for setting up test databases,
//! creating test records with sensible defaults, and a scripted in-memory
//! backend for coordinator tests.

use crate::{
    config::engine::EngineConfig,
    core::{
        backend::{
            Backend, CastVoteResponse, IdeaPatch, IdeaQuery, NewIdea, RpcErrorCode,
            VoteHistoryEntry, VoteStatus,
        },
        idea::{Category, IdeaAggregate, IdeaType, VoteDirection, clamped_add, voting_open},
        ledger::{VoteLedger, VoteQuota},
        remote::SeaOrmBackend,
        user::Role,
    },
    entities::{Profile, profile},
    errors::{Error, Result},
};
use chrono::{DateTime, Duration, TimeZone, Utc};
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, Set};
use std::{
    collections::{HashMap, VecDeque},
    sync::{
        Mutex,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
};
use tokio::sync::Notify;

/// Creates an in-memory `SQLite` database with all tables initialized.
/// This is the standard setup for all integration tests.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = sea_orm::Database::connect("sqlite::memory:").await?;
    crate::config::database::create_tables(&db).await?;
    Ok(db)
}

/// Creates a [`SeaOrmBackend`] over a fresh in-memory database with the
/// default engine configuration.
pub async fn setup_test_backend() -> Result<SeaOrmBackend> {
    SeaOrmBackend::new(setup_test_db().await?, &EngineConfig::default())
}

/// Creates a verified citizen profile.
///
/// # Defaults
/// * `display_name`: `"{user_id} display"`
/// * `role`: citizen
/// * full weekly allowance
pub async fn create_test_profile(
    backend: &SeaOrmBackend,
    user_id: &str,
) -> Result<profile::Model> {
    backend
        .register_profile(user_id, &format!("{user_id} display"), Role::Citizen, true)
        .await
}

/// Overwrites the remaining allowance of a profile.
pub async fn set_votes_remaining(
    backend: &SeaOrmBackend,
    user_id: &str,
    votes_remaining: i32,
) -> Result<()> {
    let profile = Profile::find_by_id(user_id.to_string())
        .one(backend.connection())
        .await?
        .ok_or(Error::NotAuthenticated)?;
    let mut active: profile::ActiveModel = profile.into();
    active.votes_remaining = Set(votes_remaining);
    active.update(backend.connection()).await?;
    Ok(())
}

/// Creates a community idea owned by `owner`.
///
/// # Defaults
/// * `description`: `"Description of {title}"`
/// * `idea_type`: proposal, `category`: other
/// * no location, not anonymous
pub async fn create_test_idea(
    backend: &SeaOrmBackend,
    owner: &str,
    title: &str,
) -> Result<IdeaAggregate> {
    backend
        .insert_idea(
            owner,
            &NewIdea {
                title: title.to_string(),
                description: format!("Description of {title}"),
                idea_type: IdeaType::Proposal,
                category: Category::Other,
                location_value: None,
                location_level: None,
                country: None,
                is_anonymous: false,
            },
        )
        .await
}

/// Fixed creation time of [`sample_idea`]
#[allow(clippy::unwrap_used)]
pub fn sample_created_at() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap()
}

/// A community proposal with no votes, no location and no deadline.
pub fn sample_idea(id: i64) -> IdeaAggregate {
    IdeaAggregate {
        id,
        author_id: Some(format!("author-{id}")),
        author_name: Some(format!("Author {id}")),
        is_own: false,
        title: format!("Idea {id}"),
        description: "Sample description".to_string(),
        idea_type: IdeaType::Proposal,
        category: Category::Other,
        location_value: None,
        location_level: None,
        country: None,
        is_anonymous: false,
        is_official_proposal: false,
        voting_ends_at: None,
        upvotes: 0,
        downvotes: 0,
        user_vote: None,
        created_at: sample_created_at(),
    }
}

#[derive(Debug, Default)]
struct FakeState {
    /// (owner, server copy without viewer fields)
    ideas: Vec<(String, IdeaAggregate)>,
    votes: HashMap<(String, i64), VoteDirection>,
    votes_remaining: u32,
    weekly_vote_limit: u32,
    /// Queued `cast_vote` answers per idea
    scripted: HashMap<i64, VecDeque<Result<CastVoteResponse>>>,
    next_id: i64,
}

impl FakeState {
    fn present(&self, owner: &str, idea: &IdeaAggregate, viewer: Option<&str>) -> IdeaAggregate {
        let mut seen = idea.clone();
        seen.is_own = viewer == Some(owner);
        seen.author_id = (!idea.is_anonymous).then(|| owner.to_string());
        if idea.is_anonymous {
            seen.author_name = None;
        }
        seen.user_vote =
            viewer.and_then(|v| self.votes.get(&(v.to_string(), idea.id)).copied());
        seen
    }

    fn accept_vote(
        &mut self,
        user_id: &str,
        idea_id: i64,
        direction: VoteDirection,
    ) -> CastVoteResponse {
        let now = Utc::now();
        let Some(index) = self.ideas.iter().position(|(_, i)| i.id == idea_id) else {
            return CastVoteResponse::rejected(&RpcErrorCode::IdeaNotFound, "Idea not found");
        };
        if !voting_open(self.ideas[index].1.voting_ends_at, now) {
            return CastVoteResponse::rejected(&RpcErrorCode::VotingClosed, "Voting has ended");
        }

        let key = (user_id.to_string(), idea_id);
        let quota = VoteQuota {
            votes_remaining: self.votes_remaining,
            weekly_vote_limit: self.weekly_vote_limit,
            votes_reset_at: now + Duration::days(7),
        };
        let Ok(outcome) = VoteLedger::transition(self.votes.get(&key).copied(), direction, &quota)
        else {
            return CastVoteResponse::rejected(&RpcErrorCode::QuotaExhausted, "No votes left");
        };

        let idea = &mut self.ideas[index].1;
        idea.upvotes = clamped_add(idea.upvotes, outcome.upvote_delta).0;
        idea.downvotes = clamped_add(idea.downvotes, outcome.downvote_delta).0;
        match outcome.new_user_vote {
            Some(vote) => self.votes.insert(key, vote),
            None => self.votes.remove(&key),
        };
        self.votes_remaining = outcome.votes_remaining;
        CastVoteResponse::accepted("Vote recorded", outcome.votes_remaining)
    }
}

/// In-memory [`Backend`] with scripted vote answers.
///
/// Unscripted `cast_vote` calls are decided with the real ledger against the
/// fake's own counters, so a rollback re-fetch returns consistent data.
#[derive(Debug, Default)]
pub struct FakeBackend {
    state: Mutex<FakeState>,
    hold: AtomicBool,
    offline: AtomicBool,
    gate: Notify,
    casts: AtomicUsize,
    fetches: AtomicUsize,
}

#[allow(clippy::unwrap_used)]
impl FakeBackend {
    /// A fake where every user has `weekly_vote_limit` votes left.
    pub fn new(weekly_vote_limit: u32) -> Self {
        let backend = Self::default();
        {
            let mut state = backend.state.lock().unwrap();
            state.votes_remaining = weekly_vote_limit;
            state.weekly_vote_limit = weekly_vote_limit;
            state.next_id = 1000;
        }
        backend
    }

    /// Stores an idea owned by `owner`.
    pub fn seed(&self, owner: &str, idea: IdeaAggregate) {
        self.state.lock().unwrap().ideas.push((owner.to_string(), idea));
    }

    /// Queues the answer of the next `cast_vote` on `idea_id`.
    pub fn script(&self, idea_id: i64, response: CastVoteResponse) {
        self.queue(idea_id, Ok(response));
    }

    /// Makes the next `cast_vote` on `idea_id` fail at the transport level.
    pub fn fail_next_cast(&self, idea_id: i64, message: &str) {
        self.queue(
            idea_id,
            Err(Error::Rpc {
                message: message.to_string(),
            }),
        );
    }

    fn queue(&self, idea_id: i64, answer: Result<CastVoteResponse>) {
        self.state
            .lock()
            .unwrap()
            .scripted
            .entry(idea_id)
            .or_default()
            .push_back(answer);
    }

    /// Overwrites the server-side allowance.
    pub fn set_votes_remaining(&self, votes_remaining: u32) {
        self.state.lock().unwrap().votes_remaining = votes_remaining;
    }

    /// Parks every `cast_vote`, `fetch_ideas` and `fetch_vote_status` until
    /// [`release_calls`](Self::release_calls).
    pub fn hold_calls(&self) {
        self.hold.store(true, Ordering::SeqCst);
    }

    /// Lets the longest parked call continue and stops parking new ones.
    pub fn release_calls(&self) {
        self.hold.store(false, Ordering::SeqCst);
        self.gate.notify_one();
    }

    /// Fails every `cast_vote`, `fetch_ideas` and `fetch_vote_status` while set.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    async fn reach(&self) -> Result<()> {
        if self.hold.load(Ordering::SeqCst) {
            self.gate.notified().await;
        }
        if self.offline.load(Ordering::SeqCst) {
            return Err(Error::Rpc {
                message: "offline".to_string(),
            });
        }
        Ok(())
    }

    /// Number of `cast_vote` calls received
    pub fn cast_count(&self) -> usize {
        self.casts.load(Ordering::SeqCst)
    }

    /// Number of `fetch_ideas` calls received
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[allow(clippy::unwrap_used)]
impl Backend for FakeBackend {
    async fn fetch_ideas(&self, query: &IdeaQuery) -> Result<Vec<IdeaAggregate>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.reach().await?;
        let state = self.state.lock().unwrap();
        let mut ideas: Vec<IdeaAggregate> = state
            .ideas
            .iter()
            .filter(|(owner, _)| query.owner.as_ref().is_none_or(|o| o == owner))
            .filter(|(_, idea)| query.idea_type.is_none_or(|t| t == idea.idea_type))
            .filter(|(_, idea)| query.category.is_none_or(|c| c == idea.category))
            .filter(|(_, idea)| query.country.is_none() || query.country == idea.country)
            .filter(|(_, idea)| {
                query.location_level.is_none() || query.location_level == idea.location_level
            })
            .map(|(owner, idea)| state.present(owner, idea, query.viewer.as_deref()))
            .collect();
        ideas.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(ideas)
    }

    async fn fetch_idea(&self, idea_id: i64, viewer: Option<&str>) -> Result<Option<IdeaAggregate>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .ideas
            .iter()
            .find(|(_, idea)| idea.id == idea_id)
            .map(|(owner, idea)| state.present(owner, idea, viewer)))
    }

    async fn insert_idea(&self, owner: &str, new_idea: &NewIdea) -> Result<IdeaAggregate> {
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let idea = IdeaAggregate {
            id: state.next_id,
            title: new_idea.title.clone(),
            description: new_idea.description.clone(),
            idea_type: new_idea.idea_type,
            category: new_idea.category,
            location_value: new_idea.location_value.clone(),
            location_level: new_idea.location_level.clone(),
            country: new_idea.country.clone(),
            is_anonymous: new_idea.is_anonymous,
            created_at: Utc::now(),
            ..sample_idea(0)
        };
        state.ideas.push((owner.to_string(), idea.clone()));
        Ok(state.present(owner, &idea, Some(owner)))
    }

    async fn update_idea(
        &self,
        idea_id: i64,
        owner: Option<&str>,
        patch: &IdeaPatch,
    ) -> Result<Option<IdeaAggregate>> {
        let mut state = self.state.lock().unwrap();
        let Some((idea_owner, idea)) = state
            .ideas
            .iter_mut()
            .find(|(o, i)| i.id == idea_id && owner.is_none_or(|owner| owner == o))
        else {
            return Ok(None);
        };
        if let Some(title) = &patch.title {
            idea.title.clone_from(title);
        }
        if let Some(description) = &patch.description {
            idea.description.clone_from(description);
        }
        if let Some(official) = patch.is_official_proposal {
            idea.is_official_proposal = official;
        }
        if let Some(ends_at) = patch.voting_ends_at {
            idea.voting_ends_at = ends_at;
        }
        let (idea_owner, idea) = (idea_owner.clone(), idea.clone());
        Ok(Some(state.present(&idea_owner, &idea, owner)))
    }

    async fn delete_idea(&self, idea_id: i64, owner: Option<&str>) -> Result<bool> {
        let mut state = self.state.lock().unwrap();
        let before = state.ideas.len();
        state
            .ideas
            .retain(|(o, i)| !(i.id == idea_id && owner.is_none_or(|owner| owner == o)));
        let deleted = state.ideas.len() < before;
        if deleted {
            state.votes.retain(|(_, id), _| *id != idea_id);
        }
        Ok(deleted)
    }

    async fn cast_vote(
        &self,
        user_id: &str,
        idea_id: i64,
        vote_type: VoteDirection,
    ) -> Result<CastVoteResponse> {
        self.casts.fetch_add(1, Ordering::SeqCst);
        self.reach().await?;
        let mut state = self.state.lock().unwrap();
        match state.scripted.get_mut(&idea_id).and_then(VecDeque::pop_front) {
            Some(scripted) => scripted,
            None => Ok(state.accept_vote(user_id, idea_id, vote_type)),
        }
    }

    async fn fetch_vote_history(&self, user_id: &str) -> Result<Vec<VoteHistoryEntry>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .votes
            .iter()
            .filter(|((voter, _), _)| voter == user_id)
            .map(|((_, idea_id), vote_type)| VoteHistoryEntry {
                idea_id: *idea_id,
                idea_title: state
                    .ideas
                    .iter()
                    .find(|(_, i)| i.id == *idea_id)
                    .map(|(_, i)| i.title.clone())
                    .unwrap_or_default(),
                vote_type: *vote_type,
                voted_at: Utc::now(),
            })
            .collect())
    }

    async fn fetch_vote_status(&self, _user_id: &str) -> Result<VoteStatus> {
        self.reach().await?;
        let state = self.state.lock().unwrap();
        Ok(VoteStatus {
            votes_remaining: state.votes_remaining,
            votes_reset_at: Utc::now() + Duration::days(7),
            weekly_vote_limit: state.weekly_vote_limit,
        })
    }
}
