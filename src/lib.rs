//! Football-data sync: pulls leagues, seasons, teams, fixtures, standings and
//! squads from API-Football and reconciles them into Postgres.

pub mod config;
pub mod error;
pub mod http;
pub mod models;
pub mod reconcile;
pub mod store;
pub mod sync;
pub mod upstream;

pub use error::{Result, SyncError};
pub use reconcile::Reconciler;
pub use store::PgStore;
pub use sync::SeasonSync;
pub use upstream::{ApiFootball, ApiFootballClient, FootballFeed};
