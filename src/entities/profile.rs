//! Profile entity - one row per user, carrying role, verification state and
//! the weekly vote allowance.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Profile database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "profiles")]
pub struct Model {
    /// Backend user id
    #[sea_orm(primary_key, auto_increment = false)]
    pub user_id: String,
    /// Name shown next to non-anonymous ideas
    pub display_name: String,
    /// `"citizen"`, `"representative"`, `"administrator"` or `"authority"`
    pub role: String,
    /// Whether the email address has been confirmed
    pub email_verified: bool,
    /// Votes left until `votes_reset_at`
    pub votes_remaining: i32,
    /// Allowance restored at every reset
    pub weekly_vote_limit: i32,
    /// Next weekly reset boundary
    pub votes_reset_at: DateTimeUtc,
}

/// Defines relationships between Profile and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One profile owns many ideas
    #[sea_orm(has_many = "super::idea::Entity")]
    Ideas,
    /// One profile casts many votes
    #[sea_orm(has_many = "super::vote::Entity")]
    Votes,
}

impl Related<super::idea::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Ideas.def()
    }
}

impl Related<super::vote::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Votes.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
