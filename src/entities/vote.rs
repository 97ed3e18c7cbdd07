//! Vote entity - at most one row per (`user_id`, `idea_id`) pair.
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Vote database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "votes")]
pub struct Model {
    /// Unique identifier for the vote row
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Voter
    pub user_id: String,
    /// Idea voted on
    pub idea_id: i64,
    /// `"up"` or `"down"`
    pub vote_type: String,
    /// When the vote was cast or last changed
    pub voted_at: DateTimeUtc,
}

/// Defines relationships between Vote and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each vote belongs to one idea
    #[sea_orm(
        belongs_to = "super::idea::Entity",
        from = "Column::IdeaId",
        to = "super::idea::Column::Id"
    )]
    Idea,
    /// Each vote belongs to one profile
    #[sea_orm(
        belongs_to = "super::profile::Entity",
        from = "Column::UserId",
        to = "super::profile::Column::UserId"
    )]
    Profile,
}

impl Related<super::idea::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Idea.def()
    }
}

impl Related<super::profile::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Profile.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
