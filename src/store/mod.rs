//! Storage ports.
//!
//! The reconciliation engine and the sync entry points only talk to these
//! traits. `PgStore` is the production implementation; tests swap in an
//! in-memory fake.

use std::fmt::Debug;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{Fixture, League, NewSeason, Player, Season, Team, TeamSeason};

mod postgres;
pub mod schema;

pub use postgres::PgStore;

/// A record with a natural key.
pub trait Keyed {
    type Key: Debug + Send + Sync;

    fn key(&self) -> Self::Key;
}

impl Keyed for League {
    type Key = i32;
    fn key(&self) -> i32 {
        self.id
    }
}

impl Keyed for Team {
    type Key = i32;
    fn key(&self) -> i32 {
        self.id
    }
}

impl Keyed for Fixture {
    type Key = i32;
    fn key(&self) -> i32 {
        self.id
    }
}

impl Keyed for Player {
    type Key = i32;
    fn key(&self) -> i32 {
        self.id
    }
}

impl Keyed for TeamSeason {
    /// `(season_id, team_id)`
    type Key = (i32, i32);
    fn key(&self) -> (i32, i32) {
        (self.season_id, self.team_id)
    }
}

/// Point lookup and insert for one record type.
#[async_trait]
pub trait RecordStore<R>: Send + Sync
where
    R: Keyed + Send + Sync,
{
    async fn find(&self, key: &R::Key) -> Result<Option<R>>;

    /// Insert and echo back the stored row.
    async fn insert(&self, record: &R) -> Result<R>;

    /// Insert unless a row with the same key exists. Returns the stored row
    /// when something was written.
    ///
    /// The default is a lookup followed by an insert, which is not atomic
    /// against concurrent writers. Stores that can do better override it.
    async fn insert_if_absent(&self, record: &R) -> Result<Option<R>> {
        if self.find(&record.key()).await?.is_some() {
            return Ok(None);
        }
        self.insert(record).await.map(Some)
    }
}

/// A single guarded write: apply the record's mutable fields only while
/// the stored row is still mutable. `None` means nothing matched the guard.
#[async_trait]
pub trait ConditionalUpdate<R>: Send + Sync {
    async fn update_if_mutable(&self, record: &R) -> Result<Option<R>>;
}

#[async_trait]
pub trait SeasonLookup: Send + Sync {
    async fn season_by_id(&self, season_id: i32) -> Result<Option<Season>>;
}

#[async_trait]
pub trait SeasonRoster: Send + Sync {
    /// Teams with a team-season row in the season, ascending by id.
    async fn team_ids_for_season(&self, season_id: i32) -> Result<Vec<i32>>;
}

#[async_trait]
pub trait SeasonWriter: Send + Sync {
    /// `None` when a season with the same name already exists for the league.
    async fn insert_season(&self, season: &NewSeason) -> Result<Option<Season>>;

    /// Number of rows removed. Fixtures and team seasons cascade.
    async fn delete_season(&self, season_id: i32) -> Result<u64>;

    async fn delete_season_by_name(&self, league_id: i32, name: &str) -> Result<u64>;
}

/// Listing, bulk-delete and liveness queries behind the REST API.
#[async_trait]
pub trait Catalog: Send + Sync {
    async fn ping(&self) -> Result<()>;

    async fn list_leagues(&self) -> Result<Vec<League>>;

    /// Fails with a foreign-key violation while any season references it.
    async fn delete_league(&self, league_id: i32) -> Result<u64>;

    async fn delete_all_leagues(&self) -> Result<u64>;

    async fn list_teams(&self) -> Result<Vec<Team>>;

    /// Ordered by gameweek, then kick-off.
    async fn fixtures_for_season(&self, season_id: i32) -> Result<Vec<Fixture>>;

    async fn fixtures_for_gameweek(&self, season_id: i32, gameweek: i32) -> Result<Vec<Fixture>>;
}

/// Everything the season sync needs from storage.
pub trait SyncStore:
    SeasonLookup
    + SeasonRoster
    + SeasonWriter
    + RecordStore<League>
    + RecordStore<Team>
    + RecordStore<Fixture>
    + RecordStore<TeamSeason>
    + RecordStore<Player>
    + ConditionalUpdate<Fixture>
{
}

impl<T> SyncStore for T where
    T: SeasonLookup
        + SeasonRoster
        + SeasonWriter
        + RecordStore<League>
        + RecordStore<Team>
        + RecordStore<Fixture>
        + RecordStore<TeamSeason>
        + RecordStore<Player>
        + ConditionalUpdate<Fixture>
{
}
