//! Normalized idea store.
//!
//! Each idea is held once, keyed by id. The "all", "global" and "mine" lists
//! are id projections over that map, so a vote, edit or delete applied to the
//! record is seen by every view at the same time.

use crate::core::idea::IdeaAggregate;
use std::collections::HashMap;

/// The idea lists a client keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeedView {
    /// Every idea
    All,
    /// Ideas scoped to the global location level
    Global,
    /// Ideas owned by the viewer
    Mine,
}

impl FeedView {
    /// All three views
    pub const ALL: [Self; 3] = [Self::All, Self::Global, Self::Mine];
}

/// Ideas keyed by id plus the ordered id list of each view.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdeaStore {
    ideas: HashMap<i64, IdeaAggregate>,
    views: HashMap<FeedView, Vec<i64>>,
}

impl IdeaStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the contents of one view with freshly fetched ideas. Records
    /// shared with other views are overwritten with the fresh copy.
    pub fn replace_view(&mut self, view: FeedView, ideas: Vec<IdeaAggregate>) {
        let ids = ideas.iter().map(|idea| idea.id).collect();
        for idea in ideas {
            self.ideas.insert(idea.id, idea);
        }
        self.views.insert(view, ids);
        self.collect_garbage();
    }

    /// Adds an idea to the front of the given views.
    pub fn prepend(&mut self, views: &[FeedView], idea: IdeaAggregate) {
        let id = idea.id;
        self.ideas.insert(id, idea);
        for view in views {
            let ids = self.views.entry(*view).or_default();
            ids.retain(|existing| *existing != id);
            ids.insert(0, id);
        }
    }

    /// Ideas of one view, in view order.
    #[must_use]
    pub fn view(&self, view: FeedView) -> Vec<IdeaAggregate> {
        self.views
            .get(&view)
            .map(|ids| ids.iter().filter_map(|id| self.ideas.get(id)).cloned().collect())
            .unwrap_or_default()
    }

    /// Whether a view lists the idea.
    #[must_use]
    pub fn view_contains(&self, view: FeedView, idea_id: i64) -> bool {
        self.views
            .get(&view)
            .is_some_and(|ids| ids.contains(&idea_id))
    }

    /// The stored record for an idea.
    #[must_use]
    pub fn get(&self, idea_id: i64) -> Option<&IdeaAggregate> {
        self.ideas.get(&idea_id)
    }

    /// Mutates the single record for `idea_id`. Returns false when unknown.
    pub fn update<F>(&mut self, idea_id: i64, f: F) -> bool
    where
        F: FnOnce(&mut IdeaAggregate),
    {
        match self.ideas.get_mut(&idea_id) {
            Some(idea) => {
                f(idea);
                true
            }
            None => false,
        }
    }

    /// Removes an idea from the store and every view.
    pub fn remove(&mut self, idea_id: i64) -> Option<IdeaAggregate> {
        for ids in self.views.values_mut() {
            ids.retain(|id| *id != idea_id);
        }
        self.ideas.remove(&idea_id)
    }

    /// Number of distinct ideas held
    #[must_use]
    pub fn len(&self) -> usize {
        self.ideas.len()
    }

    /// Whether the store holds no ideas
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ideas.is_empty()
    }

    fn collect_garbage(&mut self) {
        let views = &self.views;
        self.ideas
            .retain(|id, _| views.values().any(|ids| ids.contains(id)));
    }
}
