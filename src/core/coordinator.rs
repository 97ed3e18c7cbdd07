//! Optimistic vote coordination.
//!
//! A vote is applied to the local store first, then sent to the backend. A
//! successful answer commits the optimistic state (with the server's quota),
//! any failure rolls it back by re-fetching the views. At most one submission
//! per idea is in flight; a second click while one is pending is ignored.

use crate::{
    config::engine::EngineConfig,
    core::{
        backend::{Backend, IdeaQuery, NewIdea, VoteHistoryEntry, GLOBAL_LOCATION_LEVEL},
        feed::{FeedRanker, FeedSections, FilterConfig},
        idea::{IdeaAggregate, VoteDirection},
        ideas::{self, IdeaEdit},
        ledger::{VoteLedger, VoteOutcome, VoteQuota},
        store::{FeedView, IdeaStore},
        user::{Viewer, require_viewer},
    },
    errors::{Error, Result},
};
use chrono::{DateTime, Utc};
use std::{
    collections::HashMap,
    sync::{Mutex, PoisonError},
    time::Duration,
};
use tokio::{sync::RwLock, time::timeout};
use tracing::{debug, error, info, warn};

/// Lifecycle of one vote submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VotePhase {
    /// Nothing pending
    Idle,
    /// Optimistic state applied, waiting for the backend
    Submitting,
    /// Backend accepted the vote
    Committed,
    /// Backend rejected the vote or the call failed
    RolledBack,
}

impl VotePhase {
    /// Whether `next` may follow `self`.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Idle, Self::Submitting)
                | (Self::Submitting, Self::Committed | Self::RolledBack)
                | (Self::Committed | Self::RolledBack, Self::Idle)
        )
    }
}

/// A committed vote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoteReceipt {
    /// Idea voted on
    pub idea_id: i64,
    /// Local decision that was applied
    pub outcome: VoteOutcome,
    /// Allowance left as reported by the server
    pub votes_remaining: u32,
    /// Server message
    pub message: String,
}

/// What a vote changed locally, kept so a rollback can undo it without the
/// backend.
#[derive(Debug, Clone)]
struct Applied {
    outcome: VoteOutcome,
    before: IdeaAggregate,
    quota_before: u32,
}

fn shift_remaining(quota: VoteQuota, delta: i64) -> VoteQuota {
    let shifted =
        (i64::from(quota.votes_remaining) + delta).clamp(0, i64::from(quota.weekly_vote_limit));
    quota.with_remaining(u32::try_from(shifted).unwrap_or(u32::MAX))
}

#[derive(Debug, Default)]
struct LocalState {
    store: IdeaStore,
    quota: Option<VoteQuota>,
}

type Phases = Mutex<HashMap<i64, VotePhase>>;

fn lock_phases(phases: &Phases) -> std::sync::MutexGuard<'_, HashMap<i64, VotePhase>> {
    phases.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Holds an idea's in-flight slot; returns the idea to `Idle` when dropped,
/// including when the vote future itself is dropped mid-flight.
struct InFlight<'a> {
    phases: &'a Phases,
    idea_id: i64,
}

impl<'a> InFlight<'a> {
    fn acquire(phases: &'a Phases, idea_id: i64) -> Result<Self> {
        let mut guard = lock_phases(phases);
        let current = guard.get(&idea_id).copied().unwrap_or(VotePhase::Idle);
        if !current.can_transition_to(VotePhase::Submitting) {
            return Err(Error::VoteInFlight { idea_id });
        }
        guard.insert(idea_id, VotePhase::Submitting);
        Ok(Self { phases, idea_id })
    }

    fn advance(&self, next: VotePhase) {
        let mut guard = lock_phases(self.phases);
        let current = guard.get(&self.idea_id).copied().unwrap_or(VotePhase::Idle);
        if current.can_transition_to(next) {
            debug!("Vote on idea {}: {:?} -> {:?}", self.idea_id, current, next);
            guard.insert(self.idea_id, next);
        } else {
            warn!(
                "Ignoring vote phase change {:?} -> {:?} for idea {}",
                current, next, self.idea_id
            );
        }
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        lock_phases(self.phases).remove(&self.idea_id);
    }
}

/// Client-side vote and feed state for one viewer.
#[derive(Debug)]
pub struct OptimisticVoteCoordinator<B> {
    backend: B,
    viewer: Option<Viewer>,
    state: RwLock<LocalState>,
    phases: Phases,
    rpc_timeout: Duration,
    ranker: FeedRanker,
}

impl<B: Backend> OptimisticVoteCoordinator<B> {
    /// Creates a coordinator with an empty store. Call
    /// [`refresh_all`](Self::refresh_all) to load the views.
    #[must_use]
    pub fn new(backend: B, viewer: Option<Viewer>, config: &EngineConfig) -> Self {
        Self {
            backend,
            viewer,
            state: RwLock::new(LocalState::default()),
            phases: Mutex::new(HashMap::new()),
            rpc_timeout: config.rpc_timeout(),
            ranker: FeedRanker::new(config.ending_soon_days),
        }
    }

    /// Overrides the bound on a single vote submission.
    #[must_use]
    pub const fn with_rpc_timeout(mut self, rpc_timeout: Duration) -> Self {
        self.rpc_timeout = rpc_timeout;
        self
    }

    /// The backend in use
    #[must_use]
    pub const fn backend(&self) -> &B {
        &self.backend
    }

    /// The signed-in viewer, if any
    #[must_use]
    pub const fn viewer(&self) -> Option<&Viewer> {
        self.viewer.as_ref()
    }

    /// Current phase of the vote on `idea_id`.
    #[must_use]
    pub fn phase(&self, idea_id: i64) -> VotePhase {
        lock_phases(&self.phases)
            .get(&idea_id)
            .copied()
            .unwrap_or(VotePhase::Idle)
    }

    /// The locally displayed allowance, if loaded.
    pub async fn quota(&self) -> Option<VoteQuota> {
        self.state.read().await.quota
    }

    /// One idea from the local store.
    pub async fn idea(&self, idea_id: i64) -> Option<IdeaAggregate> {
        self.state.read().await.store.get(idea_id).cloned()
    }

    /// Ideas of a view in fetch order.
    pub async fn view(&self, view: FeedView) -> Vec<IdeaAggregate> {
        self.state.read().await.store.view(view)
    }

    /// The ranked feed of a view, split into display sections.
    pub async fn feed(&self, view: FeedView, filter: &FilterConfig) -> FeedSections {
        let ideas = self.view(view).await;
        self.ranker.sections(&ideas, filter, Utc::now())
    }

    /// Re-fetches the all, global and mine views and swaps them in as one step.
    pub async fn refresh_all(&self) -> Result<()> {
        let viewer = self.viewer.as_ref().map(|v| v.user_id.as_str());
        let all = self.backend.fetch_ideas(&IdeaQuery::all(viewer)).await?;
        let global = self.backend.fetch_ideas(&IdeaQuery::global(viewer)).await?;
        let mine = match viewer {
            Some(user_id) => self.backend.fetch_ideas(&IdeaQuery::owned_by(user_id)).await?,
            None => Vec::new(),
        };

        let mut state = self.state.write().await;
        state.store.replace_view(FeedView::All, all);
        state.store.replace_view(FeedView::Global, global);
        state.store.replace_view(FeedView::Mine, mine);
        debug!("Refreshed views, {} ideas held", state.store.len());
        Ok(())
    }

    /// Loads the viewer's allowance from the backend.
    pub async fn refresh_quota(&self) -> Result<VoteQuota> {
        let viewer = require_viewer(self.viewer.as_ref())?;
        let quota = VoteQuota::from(self.backend.fetch_vote_status(&viewer.user_id).await?);
        self.state.write().await.quota = Some(quota);
        Ok(quota)
    }

    /// The viewer's votes, most recent first.
    pub async fn vote_history(&self) -> Result<Vec<VoteHistoryEntry>> {
        let viewer = require_viewer(self.viewer.as_ref())?;
        self.backend.fetch_vote_history(&viewer.user_id).await
    }

    /// Votes on an idea optimistically.
    ///
    /// # Errors
    /// * `VoteInFlight` while a vote on the same idea is pending; nothing changes
    /// * `NotAuthenticated`, `VotingClosed`, `QuotaExhausted` or `IdeaNotFound`
    ///   when the local decision rejects the vote; nothing changes
    /// * Any backend rejection, transport error or `Timeout`, after the local
    ///   state has been rolled back
    pub async fn vote(&self, idea_id: i64, direction: VoteDirection) -> Result<VoteReceipt> {
        let viewer = require_viewer(self.viewer.as_ref())?;
        let slot = InFlight::acquire(&self.phases, idea_id)?;

        if self.quota().await.is_none() {
            self.refresh_quota().await?;
        }
        let applied = self
            .apply_locally(&viewer.user_id, idea_id, direction, Utc::now())
            .await?;
        let outcome = applied.outcome;

        let response = timeout(
            self.rpc_timeout,
            self.backend.cast_vote(&viewer.user_id, idea_id, direction),
        )
        .await;

        let failure = match response {
            Ok(Ok(response)) if response.success => {
                slot.advance(VotePhase::Committed);
                let votes_remaining = response
                    .new_votes_remaining_this_week
                    .unwrap_or(outcome.votes_remaining);
                // Correct by this vote's drift only; other votes may have
                // moved the local quota since
                let drift = i64::from(votes_remaining) - i64::from(outcome.votes_remaining);
                {
                    let mut state = self.state.write().await;
                    state.quota = state.quota.map(|q| shift_remaining(q, drift));
                }
                info!(
                    "Vote on idea {} committed, {} votes left",
                    idea_id, votes_remaining
                );
                return Ok(VoteReceipt {
                    idea_id,
                    outcome,
                    votes_remaining,
                    message: response.message,
                });
            }
            Ok(Ok(response)) => response.into_error(idea_id),
            Ok(Err(e)) => e,
            Err(_) => Error::Timeout {
                after: self.rpc_timeout,
            },
        };

        slot.advance(VotePhase::RolledBack);
        warn!("Vote on idea {} rolled back: {}", idea_id, failure);
        self.roll_back(applied).await;
        Err(failure)
    }

    /// Applies the ledger decision to the single stored record and the local
    /// quota under one write lock. The quota is read under the same lock so
    /// concurrent votes decide against each other's predictions.
    async fn apply_locally(
        &self,
        user_id: &str,
        idea_id: i64,
        direction: VoteDirection,
        now: DateTime<Utc>,
    ) -> Result<Applied> {
        let mut state = self.state.write().await;
        let quota = state.quota.ok_or_else(|| Error::Rpc {
            message: "vote status unavailable".to_string(),
        })?;
        let before = state
            .store
            .get(idea_id)
            .cloned()
            .ok_or(Error::IdeaNotFound { idea_id })?;
        let outcome = VoteLedger::apply_vote(Some(user_id), &before, direction, &quota, now)?;

        state.store.update(idea_id, |idea| idea.apply_outcome(&outcome));
        state.quota = Some(quota.with_remaining(outcome.votes_remaining));
        debug!("Applied {:?} to idea {} locally", outcome.transition, idea_id);
        Ok(Applied {
            outcome,
            before,
            quota_before: quota.votes_remaining,
        })
    }

    /// Undoes a failed vote locally, then re-syncs with the backend. The local
    /// undo stands even when the re-fetch fails or times out.
    async fn roll_back(&self, applied: Applied) {
        {
            let mut state = self.state.write().await;
            let idea_id = applied.before.id;
            state.store.update(idea_id, |idea| {
                idea.upvotes = applied.before.upvotes;
                idea.downvotes = applied.before.downvotes;
                idea.user_vote = applied.before.user_vote;
            });
            let refund =
                i64::from(applied.quota_before) - i64::from(applied.outcome.votes_remaining);
            state.quota = state.quota.map(|q| shift_remaining(q, refund));
        }

        match timeout(self.rpc_timeout, self.refresh_all()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!("Failed to re-fetch ideas after rollback: {}", e),
            Err(_) => error!("Re-fetching ideas after rollback timed out"),
        }
        match timeout(self.rpc_timeout, self.refresh_quota()).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => error!("Failed to re-fetch vote status after rollback: {}", e),
            Err(_) => error!("Re-fetching vote status after rollback timed out"),
        }
    }

    /// Creates an idea and adds it to the front of the views it belongs to.
    pub async fn create_idea(&self, idea: NewIdea) -> Result<IdeaAggregate> {
        let created = ideas::create_idea(&self.backend, self.viewer.as_ref(), idea).await?;

        let mut views = vec![FeedView::All, FeedView::Mine];
        if created.location_level.as_deref() == Some(GLOBAL_LOCATION_LEVEL) {
            views.push(FeedView::Global);
        }
        self.state.write().await.store.prepend(&views, created.clone());
        Ok(created)
    }

    /// Edits an idea; the stored record is updated once for every view.
    pub async fn edit_idea(&self, idea_id: i64, edit: IdeaEdit) -> Result<IdeaAggregate> {
        let updated = ideas::edit_idea(&self.backend, self.viewer.as_ref(), idea_id, edit).await?;
        self.state
            .write()
            .await
            .store
            .update(idea_id, |idea| idea.apply_content(&updated));
        Ok(updated)
    }

    /// Promotes or demotes an idea; the stored record is updated once for
    /// every view.
    pub async fn set_official_proposal(
        &self,
        idea_id: i64,
        official: bool,
        voting_ends_at: Option<DateTime<Utc>>,
    ) -> Result<IdeaAggregate> {
        let updated = ideas::set_official_proposal(
            &self.backend,
            self.viewer.as_ref(),
            idea_id,
            official,
            voting_ends_at,
        )
        .await?;
        self.state
            .write()
            .await
            .store
            .update(idea_id, |idea| idea.apply_content(&updated));
        Ok(updated)
    }

    /// Deletes an idea and drops it from every view.
    pub async fn delete_idea(&self, idea_id: i64) -> Result<()> {
        ideas::delete_idea(&self.backend, self.viewer.as_ref(), idea_id).await?;
        self.state.write().await.store.remove(idea_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::core::backend::{CastVoteResponse, RpcErrorCode};
    use crate::core::idea::VoteDirection::{Down, Up};
    use crate::core::user::Role;
    use crate::errors::ErrorKind;
    use crate::test_utils::{FakeBackend, sample_idea};
    use chrono::Duration as ChronoDuration;

    fn coordinator(backend: FakeBackend) -> OptimisticVoteCoordinator<FakeBackend> {
        OptimisticVoteCoordinator::new(
            backend,
            Some(Viewer::new("alice", Role::Citizen)),
            &EngineConfig::default(),
        )
    }

    /// Idea 1 is alice's and global; idea 2 is bob's and local.
    fn seeded_backend() -> FakeBackend {
        let backend = FakeBackend::new(10);
        let mut own = sample_idea(1);
        own.location_level = Some(GLOBAL_LOCATION_LEVEL.to_string());
        backend.seed("alice", own);
        backend.seed("bob", sample_idea(2));
        backend
    }

    #[test]
    fn test_phase_transitions() {
        use VotePhase::{Committed, Idle, RolledBack, Submitting};
        assert!(Idle.can_transition_to(Submitting));
        assert!(Submitting.can_transition_to(Committed));
        assert!(Submitting.can_transition_to(RolledBack));
        assert!(Committed.can_transition_to(Idle));
        assert!(RolledBack.can_transition_to(Idle));
        assert!(!Submitting.can_transition_to(Submitting));
        assert!(!Idle.can_transition_to(Committed));
        assert!(!Committed.can_transition_to(RolledBack));
    }

    #[tokio::test]
    async fn test_refresh_loads_three_views() -> Result<()> {
        let coordinator = coordinator(seeded_backend());
        coordinator.refresh_all().await?;

        let ids = |ideas: Vec<IdeaAggregate>| ideas.iter().map(|i| i.id).collect::<Vec<_>>();
        assert_eq!(ids(coordinator.view(FeedView::All).await).len(), 2);
        assert_eq!(ids(coordinator.view(FeedView::Global).await), vec![1]);
        assert_eq!(ids(coordinator.view(FeedView::Mine).await), vec![1]);
        Ok(())
    }

    #[tokio::test]
    async fn test_commit_updates_every_view_and_takes_server_quota() -> Result<()> {
        let backend = seeded_backend();
        // Server knows about a vote the client has not seen
        backend.script(1, CastVoteResponse::accepted("Vote recorded", 7));
        let coordinator = coordinator(backend);
        coordinator.refresh_all().await?;
        coordinator.refresh_quota().await?;

        let receipt = coordinator.vote(1, Up).await?;
        assert_eq!(receipt.votes_remaining, 7);
        assert_eq!(receipt.outcome.votes_remaining, 9);

        for view in [FeedView::All, FeedView::Global, FeedView::Mine] {
            let idea = coordinator.view(view).await.into_iter().find(|i| i.id == 1).unwrap();
            assert_eq!(idea.upvotes, 1, "view {view:?}");
            assert_eq!(idea.user_vote, Some(Up), "view {view:?}");
        }
        assert_eq!(coordinator.quota().await.unwrap().votes_remaining, 7);
        assert_eq!(coordinator.phase(1), VotePhase::Idle);
        Ok(())
    }

    #[tokio::test]
    async fn test_rejected_vote_rolls_back_with_distinct_error() -> Result<()> {
        let backend = seeded_backend();
        backend.script(
            1,
            CastVoteResponse::rejected(&RpcErrorCode::EmailNotVerified, "Verify your email"),
        );
        let coordinator = coordinator(backend);
        coordinator.refresh_all().await?;
        coordinator.refresh_quota().await?;

        let err = coordinator.vote(1, Up).await.unwrap_err();
        assert!(matches!(err, Error::EmailNotVerified));
        assert_eq!(err.kind(), ErrorKind::EmailNotVerified);

        for view in [FeedView::All, FeedView::Global, FeedView::Mine] {
            let idea = coordinator.view(view).await.into_iter().find(|i| i.id == 1).unwrap();
            assert_eq!((idea.upvotes, idea.downvotes), (0, 0), "view {view:?}");
            assert_eq!(idea.user_vote, None, "view {view:?}");
        }
        assert_eq!(coordinator.quota().await.unwrap().votes_remaining, 10);
        assert_eq!(coordinator.phase(1), VotePhase::Idle);
        Ok(())
    }

    #[tokio::test]
    async fn test_server_quota_exhausted_rolls_back() -> Result<()> {
        let backend = seeded_backend();
        backend.script(
            2,
            CastVoteResponse::rejected(&RpcErrorCode::QuotaExhausted, "No votes left"),
        );
        let coordinator = coordinator(backend);
        coordinator.refresh_all().await?;
        coordinator.refresh_quota().await?;

        let err = coordinator.vote(2, Down).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::QuotaExhausted);
        assert_eq!(coordinator.idea(2).await.unwrap().downvotes, 0);
        // Three views on load, three more on rollback
        assert_eq!(coordinator.backend().fetch_count(), 6);
        Ok(())
    }

    #[tokio::test]
    async fn test_transport_failure_is_generic() -> Result<()> {
        let backend = seeded_backend();
        backend.fail_next_cast(2, "connection reset");
        let coordinator = coordinator(backend);
        coordinator.refresh_all().await?;
        coordinator.refresh_quota().await?;

        let err = coordinator.vote(2, Up).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Transient);
        assert_eq!(coordinator.idea(2).await.unwrap().upvotes, 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_second_click_while_submitting_is_ignored() -> Result<()> {
        let coordinator = coordinator(seeded_backend());
        coordinator.refresh_all().await?;
        coordinator.refresh_quota().await?;
        coordinator.backend().hold_calls();

        let (first, second) = tokio::join!(coordinator.vote(2, Up), async {
            let second = coordinator.vote(2, Up).await;
            assert_eq!(coordinator.phase(2), VotePhase::Submitting);
            // A different idea is not blocked
            assert!(!matches!(
                coordinator.vote(99, Up).await,
                Err(Error::VoteInFlight { .. })
            ));
            coordinator.backend().release_calls();
            second
        });

        assert!(first.is_ok());
        assert!(matches!(second, Err(Error::VoteInFlight { idea_id: 2 })));
        assert_eq!(coordinator.backend().cast_count(), 1);
        assert_eq!(coordinator.quota().await.unwrap().votes_remaining, 9);
        assert_eq!(coordinator.idea(2).await.unwrap().upvotes, 1);
        assert_eq!(coordinator.phase(2), VotePhase::Idle);
        Ok(())
    }

    #[tokio::test]
    async fn test_timeout_rolls_back() -> Result<()> {
        let coordinator = coordinator(seeded_backend())
            .with_rpc_timeout(std::time::Duration::from_millis(20));
        coordinator.refresh_all().await?;
        coordinator.refresh_quota().await?;
        // The re-fetch after the rollback hangs as well
        coordinator.backend().hold_calls();

        let err = coordinator.vote(2, Up).await.unwrap_err();
        assert!(matches!(err, Error::Timeout { .. }));
        assert_eq!(err.kind(), ErrorKind::Transient);
        assert_eq!(coordinator.idea(2).await.unwrap().upvotes, 0);
        assert_eq!(coordinator.quota().await.unwrap().votes_remaining, 10);
        assert_eq!(coordinator.phase(2), VotePhase::Idle);
        // Three views on load, then one parked re-fetch
        assert_eq!(coordinator.backend().fetch_count(), 4);
        Ok(())
    }

    #[tokio::test]
    async fn test_offline_rollback_restores_local_state() -> Result<()> {
        let coordinator = coordinator(seeded_backend());
        coordinator.refresh_all().await?;
        coordinator.refresh_quota().await?;
        coordinator.backend().set_offline(true);

        let err = coordinator.vote(1, Up).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Transient);

        for view in [FeedView::All, FeedView::Global, FeedView::Mine] {
            let idea = coordinator.view(view).await.into_iter().find(|i| i.id == 1).unwrap();
            assert_eq!((idea.upvotes, idea.downvotes), (0, 0), "view {view:?}");
            assert_eq!(idea.user_vote, None, "view {view:?}");
        }
        assert_eq!(coordinator.quota().await.unwrap().votes_remaining, 10);
        assert_eq!(coordinator.phase(1), VotePhase::Idle);
        Ok(())
    }

    #[tokio::test]
    async fn test_out_of_order_commits_keep_quota() -> Result<()> {
        let backend = seeded_backend();
        // The server handled idea 2 first
        backend.script(1, CastVoteResponse::accepted("Vote recorded", 8));
        backend.script(2, CastVoteResponse::accepted("Vote recorded", 9));
        let coordinator = coordinator(backend);
        coordinator.refresh_all().await?;
        coordinator.refresh_quota().await?;
        coordinator.backend().hold_calls();

        // Both votes park in submission order; idea 1 answers first
        let (first, second, ()) = tokio::join!(
            coordinator.vote(1, Up),
            coordinator.vote(2, Up),
            async {
                coordinator.backend().release_calls();
                while coordinator.phase(1) != VotePhase::Idle {
                    tokio::task::yield_now().await;
                }
                coordinator.backend().release_calls();
            }
        );

        assert_eq!(first?.votes_remaining, 8);
        assert_eq!(second?.votes_remaining, 9);
        assert_eq!(coordinator.quota().await.unwrap().votes_remaining, 8);
        Ok(())
    }

    #[tokio::test]
    async fn test_local_rejections_do_not_mutate_or_call_backend() -> Result<()> {
        let backend = seeded_backend();
        let mut closed = sample_idea(3);
        closed.is_official_proposal = true;
        closed.voting_ends_at = Some(Utc::now() - ChronoDuration::hours(1));
        backend.seed("bob", closed);
        backend.set_votes_remaining(0);
        let coordinator = coordinator(backend);
        coordinator.refresh_all().await?;

        assert!(matches!(
            coordinator.vote(3, Up).await,
            Err(Error::VotingClosed { idea_id: 3, .. })
        ));
        assert!(matches!(coordinator.vote(2, Up).await, Err(Error::QuotaExhausted)));
        assert!(matches!(
            coordinator.vote(404, Up).await,
            Err(Error::IdeaNotFound { idea_id: 404 })
        ));
        assert_eq!(coordinator.backend().cast_count(), 0);
        assert_eq!(coordinator.idea(2).await.unwrap().upvotes, 0);

        let anonymous = OptimisticVoteCoordinator::new(
            seeded_backend(),
            None,
            &EngineConfig::default(),
        );
        anonymous.refresh_all().await?;
        assert!(anonymous.view(FeedView::Mine).await.is_empty());
        assert!(matches!(anonymous.vote(2, Up).await, Err(Error::NotAuthenticated)));
        Ok(())
    }

    #[tokio::test]
    async fn test_retract_refunds_locally() -> Result<()> {
        let coordinator = coordinator(seeded_backend());
        coordinator.refresh_all().await?;
        coordinator.refresh_quota().await?;

        coordinator.vote(2, Down).await?;
        let receipt = coordinator.vote(2, Down).await?;
        assert_eq!(receipt.votes_remaining, 10);
        let idea = coordinator.idea(2).await.unwrap();
        assert_eq!((idea.downvotes, idea.user_vote), (0, None));
        Ok(())
    }

    #[tokio::test]
    async fn test_edit_create_delete_keep_views_consistent() -> Result<()> {
        let coordinator = coordinator(seeded_backend());
        coordinator.refresh_all().await?;

        coordinator
            .edit_idea(
                1,
                IdeaEdit {
                    title: Some("Renamed".to_string()),
                    ..IdeaEdit::default()
                },
            )
            .await?;
        for view in [FeedView::All, FeedView::Global, FeedView::Mine] {
            let idea = coordinator.view(view).await.into_iter().find(|i| i.id == 1).unwrap();
            assert_eq!(idea.title, "Renamed");
        }

        let created = coordinator
            .create_idea(NewIdea {
                title: "Fresh".to_string(),
                description: "New one".to_string(),
                idea_type: crate::core::idea::IdeaType::Vote,
                category: crate::core::idea::Category::Education,
                location_value: None,
                location_level: None,
                country: None,
                is_anonymous: false,
            })
            .await?;
        assert_eq!(coordinator.view(FeedView::All).await[0].id, created.id);
        assert_eq!(coordinator.view(FeedView::Mine).await[0].id, created.id);
        assert!(coordinator.view(FeedView::Global).await.iter().all(|i| i.id != created.id));

        coordinator.delete_idea(1).await?;
        for view in [FeedView::All, FeedView::Global, FeedView::Mine] {
            assert!(coordinator.view(view).await.iter().all(|i| i.id != 1));
        }
        assert!(matches!(
            coordinator.delete_idea(2).await,
            Err(Error::NotOwner { .. })
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_feed_ranks_official_first() -> Result<()> {
        let backend = seeded_backend();
        let mut official = sample_idea(5);
        official.is_official_proposal = true;
        official.voting_ends_at = Some(Utc::now() + ChronoDuration::days(2));
        backend.seed("gov", official);
        let coordinator = coordinator(backend);
        coordinator.refresh_all().await?;

        let sections = coordinator.feed(FeedView::All, &FilterConfig::default()).await;
        assert_eq!(sections.official.iter().map(|i| i.id).collect::<Vec<_>>(), vec![5]);
        assert_eq!(sections.community.len(), 2);
        Ok(())
    }
}
