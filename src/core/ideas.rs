//! Idea lifecycle business logic
//!
//! Creating, editing, deleting and promoting ideas on top of a [`Backend`].
//! Role and ownership checks run before any write is attempted. The backend
//! additionally matches writes by id and owner, so a non-administrator can
//! only ever touch their own rows.

use crate::{
    core::{
        backend::{Backend, IdeaPatch, NewIdea},
        idea::IdeaAggregate,
        user::{Role, Viewer, require_viewer},
    },
    errors::{Error, Result},
};
use chrono::{DateTime, Utc};
use tracing::info;

/// Owner-editable fields. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdeaEdit {
    /// New title
    pub title: Option<String>,
    /// New description
    pub description: Option<String>,
}

fn required_text(field: &str, value: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(Error::InvalidInput {
            message: format!("{field} cannot be empty"),
        });
    }
    Ok(trimmed.to_string())
}

/// Administrators bypass the owner filter.
fn owner_filter(viewer: &Viewer) -> Option<&str> {
    if viewer.role.can_moderate() {
        None
    } else {
        Some(viewer.user_id.as_str())
    }
}

/// Tells a foreign idea apart from a missing one after a write matched nothing.
async fn unmatched<B: Backend>(backend: &B, viewer: &Viewer, idea_id: i64) -> Error {
    match backend.fetch_idea(idea_id, Some(&viewer.user_id)).await {
        Ok(Some(_)) => Error::NotOwner {
            idea_id,
            user_id: viewer.user_id.clone(),
        },
        Ok(None) => Error::IdeaNotFound { idea_id },
        Err(e) => e,
    }
}

/// Submits a new idea owned by the viewer.
///
/// # Errors
/// * `NotAuthenticated` without a viewer
/// * `EmailNotVerified` when the viewer's email is unverified
/// * `InvalidInput` for a blank title or description
pub async fn create_idea<B: Backend>(
    backend: &B,
    viewer: Option<&Viewer>,
    idea: NewIdea,
) -> Result<IdeaAggregate> {
    let viewer = require_viewer(viewer)?;
    if !viewer.email_verified {
        return Err(Error::EmailNotVerified);
    }

    let idea = NewIdea {
        title: required_text("Title", &idea.title)?,
        description: required_text("Description", &idea.description)?,
        ..idea
    };
    let created = backend.insert_idea(&viewer.user_id, &idea).await?;
    info!("Idea {} created by {}", created.id, viewer.user_id);
    Ok(created)
}

/// Edits the title and/or description of an idea.
///
/// Owners may edit their own ideas; administrators may edit any.
pub async fn edit_idea<B: Backend>(
    backend: &B,
    viewer: Option<&Viewer>,
    idea_id: i64,
    edit: IdeaEdit,
) -> Result<IdeaAggregate> {
    let viewer = require_viewer(viewer)?;
    let patch = IdeaPatch {
        title: edit
            .title
            .as_deref()
            .map(|t| required_text("Title", t))
            .transpose()?,
        description: edit
            .description
            .as_deref()
            .map(|d| required_text("Description", d))
            .transpose()?,
        ..IdeaPatch::default()
    };
    if patch.title.is_none() && patch.description.is_none() {
        return Err(Error::InvalidInput {
            message: "Nothing to change".to_string(),
        });
    }

    match backend
        .update_idea(idea_id, owner_filter(viewer), &patch)
        .await?
    {
        Some(updated) => Ok(updated),
        None => Err(unmatched(backend, viewer, idea_id).await),
    }
}

/// Deletes an idea together with its votes.
///
/// Owners may delete their own ideas; administrators may delete any.
pub async fn delete_idea<B: Backend>(
    backend: &B,
    viewer: Option<&Viewer>,
    idea_id: i64,
) -> Result<()> {
    let viewer = require_viewer(viewer)?;
    if backend.delete_idea(idea_id, owner_filter(viewer)).await? {
        info!("Idea {} deleted by {}", idea_id, viewer.user_id);
        Ok(())
    } else {
        Err(unmatched(backend, viewer, idea_id).await)
    }
}

/// Marks an idea as an official proposal (optionally with a voting deadline)
/// or turns it back into a community idea. Demoting clears the deadline.
///
/// # Errors
/// * `InsufficientRole` unless the viewer is an authority or administrator
/// * `InvalidInput` for a deadline that is not in the future
pub async fn set_official_proposal<B: Backend>(
    backend: &B,
    viewer: Option<&Viewer>,
    idea_id: i64,
    official: bool,
    voting_ends_at: Option<DateTime<Utc>>,
) -> Result<IdeaAggregate> {
    let viewer = require_viewer(viewer)?;
    if !viewer.role.can_promote() {
        return Err(Error::InsufficientRole {
            required: Role::Authority,
            actual: viewer.role,
        });
    }
    if official && voting_ends_at.is_some_and(|ends_at| ends_at <= Utc::now()) {
        return Err(Error::InvalidInput {
            message: "Voting deadline must be in the future".to_string(),
        });
    }

    let patch = IdeaPatch {
        is_official_proposal: Some(official),
        voting_ends_at: Some(if official { voting_ends_at } else { None }),
        ..IdeaPatch::default()
    };
    let updated = backend
        .update_idea(idea_id, None, &patch)
        .await?
        .ok_or(Error::IdeaNotFound { idea_id })?;

    info!(
        "Idea {} official flag set to {} by {}",
        idea_id, official, viewer.user_id
    );
    Ok(updated)
}
