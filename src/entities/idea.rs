//! Idea entity - proposals, complaints and informal votes submitted by users.
//!
//! `upvotes` and `downvotes` are denormalized counters maintained by the
//! vote RPC; they are never written directly by clients.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Idea database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "ideas")]
pub struct Model {
    /// Unique identifier, never reused
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Owning user
    pub user_id: String,
    pub title: String,
    pub description: String,
    /// `"complaint"`, `"proposal"` or `"vote"`
    pub idea_type: String,
    /// Category key (e.g. `"health"`)
    pub category: String,
    pub location_value: Option<String>,
    pub location_level: Option<String>,
    pub country: Option<String>,
    /// If true the author is withheld from every read
    pub is_anonymous: bool,
    pub is_official_proposal: bool,
    /// Voting deadline, official proposals only
    pub voting_ends_at: Option<DateTimeUtc>,
    pub upvotes: i64,
    pub downvotes: i64,
    pub created_at: DateTimeUtc,
}

/// Defines relationships between Idea and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each idea belongs to one profile
    #[sea_orm(
        belongs_to = "super::profile::Entity",
        from = "Column::UserId",
        to = "super::profile::Column::UserId"
    )]
    Profile,
    /// One idea has many votes
    #[sea_orm(has_many = "super::vote::Entity")]
    Votes,
}

impl Related<super::profile::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Profile.def()
    }
}

impl Related<super::vote::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Votes.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
