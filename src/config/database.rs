//! Database configuration module for the reference backend.
//!
//! This module handles `SQLite` database connection and table creation using `SeaORM`.
//! Tables are generated from the entity definitions with
//! `Schema::create_table_from_entity`, so the schema always matches the Rust models.

use crate::entities::{Idea, Profile, Vote, VoteColumn};
use crate::errors::Result;
use sea_orm::{
    ConnectionTrait, Database, DatabaseConnection, EntityTrait, Schema, sea_query::Index,
};

const DEFAULT_DATABASE_URL: &str = "sqlite://data/civic_ideas.sqlite?mode=rwc";

/// Gets the database URL from the `DATABASE_URL` environment variable or returns
/// the default local `SQLite` path.
#[must_use]
pub fn get_database_url() -> String {
    std::env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string())
}

/// Establishes a connection to the database named by [`get_database_url`].
pub async fn create_connection() -> Result<DatabaseConnection> {
    Database::connect(get_database_url()).await.map_err(Into::into)
}

async fn create_table<E>(db: &DatabaseConnection, schema: &Schema, entity: E) -> Result<()>
where
    E: EntityTrait,
{
    let builder = db.get_database_backend();
    let mut statement = schema.create_table_from_entity(entity);
    statement.if_not_exists();
    db.execute(builder.build(&statement)).await?;
    Ok(())
}

/// Creates the profiles, ideas and votes tables if they do not exist yet.
///
/// Order matters: ideas reference profiles and votes reference both. Votes
/// carry a unique index on (`user_id`, `idea_id`).
pub async fn create_tables(db: &DatabaseConnection) -> Result<()> {
    let schema = Schema::new(db.get_database_backend());

    create_table(db, &schema, Profile).await?;
    create_table(db, &schema, Idea).await?;
    create_table(db, &schema, Vote).await?;

    let one_vote_per_idea = Index::create()
        .name("idx_votes_user_idea")
        .table(Vote)
        .col(VoteColumn::UserId)
        .col(VoteColumn::IdeaId)
        .unique()
        .if_not_exists()
        .to_owned();
    db.execute(db.get_database_backend().build(&one_vote_per_idea))
        .await?;

    Ok(())
}
