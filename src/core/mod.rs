/// Backend contract: table queries and RPC operations
pub mod backend;
/// Optimistic vote coordination over the local idea store
pub mod coordinator;
/// Feed filtering and ranking
pub mod feed;
/// Vote status and history display helpers
pub mod history;
/// Idea aggregate and closed enumerations
pub mod idea;
/// Idea lifecycle with role and ownership checks
pub mod ideas;
/// Weekly vote allowance and the vote transition table
pub mod ledger;
/// Reference backend over `SeaORM`
pub mod remote;
/// Normalized idea store shared by the feed views
pub mod store;
/// Roles and the signed-in viewer
pub mod user;
/// Weekly allowance reset sweep
pub mod weekly;
