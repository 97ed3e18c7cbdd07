//! Entity module - SeaORM entity definitions for the reference backend.
//! These entities represent the profiles, ideas and votes tables.
//! Each entity has a Model struct for data and an Entity struct for operations.

pub mod idea;
pub mod profile;
pub mod vote;

// Re-export specific types to avoid conflicts
pub use idea::{Column as IdeaColumn, Entity as Idea, Model as IdeaModel};
pub use profile::{Column as ProfileColumn, Entity as Profile, Model as ProfileModel};
pub use vote::{Column as VoteColumn, Entity as Vote, Model as VoteModel};
