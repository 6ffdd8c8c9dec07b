//! Season-scoped sync entry points.
//!
//! Each entry point resolves the season before it touches the provider, so
//! an unknown season id never costs an upstream request.

use std::collections::HashSet;

use futures_util::stream::{self, StreamExt, TryStreamExt};
use tracing::{info, warn};

use crate::error::{Result, SyncError};
use crate::models::{Player, Season};
use crate::reconcile::Reconciler;
use crate::store::SyncStore;
use crate::upstream::FootballFeed;

/// Default number of concurrent fan-out tasks (teams, player profiles).
pub const DEFAULT_FAN_OUT: usize = 5;

pub struct SeasonSync<S, F> {
    store: S,
    feed: F,
    reconciler: Reconciler,
    fan_out: usize,
}

impl<S: SyncStore, F: FootballFeed> SeasonSync<S, F> {
    pub fn new(store: S, feed: F) -> Self {
        Self {
            store,
            feed,
            reconciler: Reconciler::default(),
            fan_out: DEFAULT_FAN_OUT,
        }
    }

    pub fn with_reconciler(mut self, reconciler: Reconciler) -> Self {
        self.reconciler = reconciler;
        self
    }

    pub fn with_fan_out(mut self, fan_out: usize) -> Self {
        self.fan_out = fan_out.max(1);
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn feed(&self) -> &F {
        &self.feed
    }

    async fn resolve_season(&self, season_id: i32) -> Result<Season> {
        self.store
            .season_by_id(season_id)
            .await?
            .ok_or(SyncError::SeasonNotFound(season_id))
    }

    pub async fn add_teams_for_season(&self, season_id: i32) -> Result<usize> {
        let season = self.resolve_season(season_id).await?;
        let teams = self.feed.teams(season.league_id, season.start_year()).await?;
        let count = self.reconciler.insert_missing(&self.store, &teams).await?;
        info!("Inserted {} of {} teams for season {}", count, teams.len(), season_id);
        Ok(count)
    }

    pub async fn add_fixtures_for_season(&self, season_id: i32) -> Result<usize> {
        let season = self.resolve_season(season_id).await?;
        let fixtures = self.feed.fixtures(&season, None).await?;
        let count = self.reconciler.insert_missing(&self.store, &fixtures).await?;
        info!("Inserted {} of {} fixtures for season {}", count, fixtures.len(), season_id);
        Ok(count)
    }

    /// Finished fixtures are left alone by the store's guard; they are not
    /// counted.
    pub async fn update_fixtures_from_season_gameweek(
        &self,
        season_id: i32,
        gameweek: i32,
    ) -> Result<usize> {
        let season = self.resolve_season(season_id).await?;
        let fixtures = self.feed.fixtures(&season, Some(gameweek)).await?;
        let count = self.reconciler.apply_updates(&self.store, &fixtures).await?;
        info!(
            "Updated {} of {} fixtures for season {} gameweek {}",
            count,
            fixtures.len(),
            season_id,
            gameweek
        );
        Ok(count)
    }

    /// Standings become one team-season row per team.
    pub async fn add_team_seasons_for_season(&self, season_id: i32) -> Result<usize> {
        let season = self.resolve_season(season_id).await?;
        let rows = self.feed.standings(&season).await?;
        let count = self.reconciler.insert_missing(&self.store, &rows).await?;
        info!("Inserted {} of {} team seasons for season {}", count, rows.len(), season_id);
        Ok(count)
    }

    pub async fn add_players_for_team_season(&self, team_id: i32, season_id: i32) -> Result<usize> {
        let season = self.resolve_season(season_id).await?;
        self.sync_team_players(&season, team_id).await
    }

    /// Every team with a team-season row, `fan_out` teams at a time. The
    /// first failure aborts the whole run.
    pub async fn add_all_players_for_season(&self, season_id: i32) -> Result<usize> {
        let season = self.resolve_season(season_id).await?;
        let team_ids = self.store.team_ids_for_season(season.id).await?;
        if team_ids.is_empty() {
            warn!("Season {} has no team seasons; sync standings first", season_id);
            return Ok(0);
        }
        info!("Syncing players for {} teams in season {}", team_ids.len(), season_id);

        let counts: Vec<usize> = stream::iter(team_ids)
            .map(|team_id| self.sync_team_players(&season, team_id))
            .buffer_unordered(self.fan_out)
            .try_collect()
            .await?;

        let total = counts.iter().sum();
        info!("Inserted {} players for season {}", total, season_id);
        Ok(total)
    }

    async fn sync_team_players(&self, season: &Season, team_id: i32) -> Result<usize> {
        let mut ids = self.feed.squad(team_id, season.start_year()).await?;
        let mut seen = HashSet::new();
        ids.retain(|id| seen.insert(*id));

        // Profiles come back in squad order regardless of completion order.
        let profiles: Vec<Option<Player>> = stream::iter(ids)
            .map(|player_id| self.feed.player(player_id, team_id))
            .buffered(self.fan_out)
            .try_collect()
            .await?;
        let players: Vec<Player> = profiles.into_iter().flatten().collect();

        let count = self.reconciler.insert_missing(&self.store, &players).await?;
        info!(
            "Inserted {} of {} players for team {} season {}",
            count,
            players.len(),
            team_id,
            season.id
        );
        Ok(count)
    }

    pub async fn add_league(&self, league_id: i32) -> Result<usize> {
        let league = self.feed.league(league_id).await?;
        let count = self
            .reconciler
            .insert_missing(&self.store, std::slice::from_ref(&league))
            .await?;
        info!("Inserted {} league(s) for {} ({})", count, league.name, league.id);
        Ok(count)
    }

    /// `None` when the league already has a season with that name.
    pub async fn add_season(&self, league_id: i32, start_year: i32) -> Result<Option<Season>> {
        let new_season = self.feed.league_season(league_id, start_year).await?;
        let inserted = self.store.insert_season(&new_season).await?;
        match &inserted {
            Some(season) => info!("Inserted season {} (id={})", season.name, season.id),
            None => info!(
                "Season {} already exists for league {}",
                new_season.name, league_id
            ),
        }
        Ok(inserted)
    }

    pub async fn delete_season(&self, season_id: i32) -> Result<u64> {
        let deleted = self.store.delete_season(season_id).await?;
        info!("Deleted {} season row(s) with id={}", deleted, season_id);
        Ok(deleted)
    }
}
