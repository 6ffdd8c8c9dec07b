use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::{info, warn};

use super::{Catalog, ConditionalUpdate, RecordStore, SeasonLookup, SeasonRoster, SeasonWriter};
use crate::error::Result;
use crate::models::{Fixture, League, NewSeason, Player, Season, Team, TeamSeason, MATCH_FINISHED};

const LEAGUE_COLUMNS: &str = "id, name, base_country";
const TEAM_COLUMNS: &str = "id, name, code, country";
const SEASON_COLUMNS: &str = "id, name, start_date, end_date, league_id";
const FIXTURE_COLUMNS: &str =
    "id, season_id, gameweek, date, home_team_id, away_team_id, status, home_goals, away_goals";
const TEAM_SEASON_COLUMNS: &str =
    "season_id, team_id, points, rank, goals_scored, goals_conceded";
const PLAYER_COLUMNS: &str =
    "id, team_id, position_code, first_name, last_name, display_name, dob";

/// Postgres-backed implementation of every storage port.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn connect_with_retry(url: &str, max_retries: u32) -> Result<Self> {
        let mut attempt = 0;
        loop {
            match PgPoolOptions::new()
                .max_connections(10)
                .acquire_timeout(Duration::from_secs(10))
                .connect(url)
                .await
            {
                Ok(pool) => {
                    info!("Connected to PostgreSQL");
                    return Ok(Self::new(pool));
                }
                Err(e) => {
                    attempt += 1;
                    if attempt >= max_retries {
                        return Err(e.into());
                    }
                    warn!("Database connection attempt {} failed: {}. Retrying...", attempt, e);
                    tokio::time::sleep(Duration::from_secs(2u64.pow(attempt))).await;
                }
            }
        }
    }
}

#[async_trait]
impl Catalog for PgStore {
    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn list_leagues(&self) -> Result<Vec<League>> {
        let sql = format!("SELECT {LEAGUE_COLUMNS} FROM leagues ORDER BY id");
        Ok(sqlx::query_as(&sql).fetch_all(&self.pool).await?)
    }

    async fn delete_league(&self, league_id: i32) -> Result<u64> {
        let result = sqlx::query("DELETE FROM leagues WHERE id = $1")
            .bind(league_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn delete_all_leagues(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM leagues").execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    async fn list_teams(&self) -> Result<Vec<Team>> {
        let sql = format!("SELECT {TEAM_COLUMNS} FROM teams ORDER BY id");
        Ok(sqlx::query_as(&sql).fetch_all(&self.pool).await?)
    }

    async fn fixtures_for_season(&self, season_id: i32) -> Result<Vec<Fixture>> {
        let sql = format!(
            "SELECT {FIXTURE_COLUMNS} FROM fixtures WHERE season_id = $1 ORDER BY gameweek, date, id"
        );
        Ok(sqlx::query_as(&sql)
            .bind(season_id)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn fixtures_for_gameweek(&self, season_id: i32, gameweek: i32) -> Result<Vec<Fixture>> {
        let sql = format!(
            "SELECT {FIXTURE_COLUMNS} FROM fixtures WHERE season_id = $1 AND gameweek = $2 ORDER BY date, id"
        );
        Ok(sqlx::query_as(&sql)
            .bind(season_id)
            .bind(gameweek)
            .fetch_all(&self.pool)
            .await?)
    }
}

#[async_trait]
impl SeasonLookup for PgStore {
    async fn season_by_id(&self, season_id: i32) -> Result<Option<Season>> {
        let sql = format!("SELECT {SEASON_COLUMNS} FROM seasons WHERE id = $1");
        Ok(sqlx::query_as(&sql)
            .bind(season_id)
            .fetch_optional(&self.pool)
            .await?)
    }
}

#[async_trait]
impl SeasonRoster for PgStore {
    async fn team_ids_for_season(&self, season_id: i32) -> Result<Vec<i32>> {
        Ok(sqlx::query_scalar(
            "SELECT team_id FROM team_seasons WHERE season_id = $1 ORDER BY team_id",
        )
        .bind(season_id)
        .fetch_all(&self.pool)
        .await?)
    }
}

#[async_trait]
impl SeasonWriter for PgStore {
    async fn insert_season(&self, season: &NewSeason) -> Result<Option<Season>> {
        let sql = format!(
            r#"
            INSERT INTO seasons (name, start_date, end_date, league_id)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (name, league_id) DO NOTHING
            RETURNING {SEASON_COLUMNS}
            "#
        );
        Ok(sqlx::query_as(&sql)
            .bind(&season.name)
            .bind(season.start_date)
            .bind(season.end_date)
            .bind(season.league_id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn delete_season(&self, season_id: i32) -> Result<u64> {
        let result = sqlx::query("DELETE FROM seasons WHERE id = $1")
            .bind(season_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn delete_season_by_name(&self, league_id: i32, name: &str) -> Result<u64> {
        let result = sqlx::query("DELETE FROM seasons WHERE league_id = $1 AND name = $2")
            .bind(league_id)
            .bind(name)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl RecordStore<League> for PgStore {
    async fn find(&self, key: &i32) -> Result<Option<League>> {
        let sql = format!("SELECT {LEAGUE_COLUMNS} FROM leagues WHERE id = $1");
        Ok(sqlx::query_as(&sql).bind(key).fetch_optional(&self.pool).await?)
    }

    async fn insert(&self, league: &League) -> Result<League> {
        let sql = format!(
            "INSERT INTO leagues (id, name, base_country) VALUES ($1, $2, $3) RETURNING {LEAGUE_COLUMNS}"
        );
        Ok(sqlx::query_as(&sql)
            .bind(league.id)
            .bind(&league.name)
            .bind(&league.base_country)
            .fetch_one(&self.pool)
            .await?)
    }

    async fn insert_if_absent(&self, league: &League) -> Result<Option<League>> {
        let sql = format!(
            r#"
            INSERT INTO leagues (id, name, base_country) VALUES ($1, $2, $3)
            ON CONFLICT (id) DO NOTHING
            RETURNING {LEAGUE_COLUMNS}
            "#
        );
        Ok(sqlx::query_as(&sql)
            .bind(league.id)
            .bind(&league.name)
            .bind(&league.base_country)
            .fetch_optional(&self.pool)
            .await?)
    }
}

#[async_trait]
impl RecordStore<Team> for PgStore {
    async fn find(&self, key: &i32) -> Result<Option<Team>> {
        let sql = format!("SELECT {TEAM_COLUMNS} FROM teams WHERE id = $1");
        Ok(sqlx::query_as(&sql).bind(key).fetch_optional(&self.pool).await?)
    }

    async fn insert(&self, team: &Team) -> Result<Team> {
        let sql = format!(
            "INSERT INTO teams (id, name, code, country) VALUES ($1, $2, $3, $4) RETURNING {TEAM_COLUMNS}"
        );
        Ok(sqlx::query_as(&sql)
            .bind(team.id)
            .bind(&team.name)
            .bind(&team.code)
            .bind(&team.country)
            .fetch_one(&self.pool)
            .await?)
    }

    async fn insert_if_absent(&self, team: &Team) -> Result<Option<Team>> {
        let sql = format!(
            r#"
            INSERT INTO teams (id, name, code, country) VALUES ($1, $2, $3, $4)
            ON CONFLICT (id) DO NOTHING
            RETURNING {TEAM_COLUMNS}
            "#
        );
        Ok(sqlx::query_as(&sql)
            .bind(team.id)
            .bind(&team.name)
            .bind(&team.code)
            .bind(&team.country)
            .fetch_optional(&self.pool)
            .await?)
    }
}

#[async_trait]
impl RecordStore<Fixture> for PgStore {
    async fn find(&self, key: &i32) -> Result<Option<Fixture>> {
        let sql = format!("SELECT {FIXTURE_COLUMNS} FROM fixtures WHERE id = $1");
        Ok(sqlx::query_as(&sql).bind(key).fetch_optional(&self.pool).await?)
    }

    async fn insert(&self, fixture: &Fixture) -> Result<Fixture> {
        let sql = format!(
            r#"
            INSERT INTO fixtures ({FIXTURE_COLUMNS})
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {FIXTURE_COLUMNS}
            "#
        );
        Ok(bind_fixture(sqlx::query_as(&sql), fixture)
            .fetch_one(&self.pool)
            .await?)
    }

    async fn insert_if_absent(&self, fixture: &Fixture) -> Result<Option<Fixture>> {
        let sql = format!(
            r#"
            INSERT INTO fixtures ({FIXTURE_COLUMNS})
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (id) DO NOTHING
            RETURNING {FIXTURE_COLUMNS}
            "#
        );
        Ok(bind_fixture(sqlx::query_as(&sql), fixture)
            .fetch_optional(&self.pool)
            .await?)
    }
}

type PgQueryAs<'q, O> = sqlx::query::QueryAs<'q, sqlx::Postgres, O, sqlx::postgres::PgArguments>;

fn bind_fixture<'q>(query: PgQueryAs<'q, Fixture>, fixture: &'q Fixture) -> PgQueryAs<'q, Fixture> {
    query
        .bind(fixture.id)
        .bind(fixture.season_id)
        .bind(fixture.gameweek)
        .bind(fixture.date)
        .bind(fixture.home_team_id)
        .bind(fixture.away_team_id)
        .bind(&fixture.status)
        .bind(fixture.home_goals)
        .bind(fixture.away_goals)
}

#[async_trait]
impl ConditionalUpdate<Fixture> for PgStore {
    async fn update_if_mutable(&self, fixture: &Fixture) -> Result<Option<Fixture>> {
        let sql = format!(
            r#"
            UPDATE fixtures
            SET date = $1, status = $2, home_goals = $3, away_goals = $4
            WHERE id = $5 AND status <> $6
            RETURNING {FIXTURE_COLUMNS}
            "#
        );
        Ok(sqlx::query_as(&sql)
            .bind(fixture.date)
            .bind(&fixture.status)
            .bind(fixture.home_goals)
            .bind(fixture.away_goals)
            .bind(fixture.id)
            .bind(MATCH_FINISHED)
            .fetch_optional(&self.pool)
            .await?)
    }
}

#[async_trait]
impl RecordStore<TeamSeason> for PgStore {
    async fn find(&self, key: &(i32, i32)) -> Result<Option<TeamSeason>> {
        let sql = format!(
            "SELECT {TEAM_SEASON_COLUMNS} FROM team_seasons WHERE season_id = $1 AND team_id = $2"
        );
        Ok(sqlx::query_as(&sql)
            .bind(key.0)
            .bind(key.1)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn insert(&self, row: &TeamSeason) -> Result<TeamSeason> {
        let sql = format!(
            r#"
            INSERT INTO team_seasons ({TEAM_SEASON_COLUMNS})
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {TEAM_SEASON_COLUMNS}
            "#
        );
        Ok(sqlx::query_as(&sql)
            .bind(row.season_id)
            .bind(row.team_id)
            .bind(row.points)
            .bind(row.rank)
            .bind(row.goals_scored)
            .bind(row.goals_conceded)
            .fetch_one(&self.pool)
            .await?)
    }

    async fn insert_if_absent(&self, row: &TeamSeason) -> Result<Option<TeamSeason>> {
        let sql = format!(
            r#"
            INSERT INTO team_seasons ({TEAM_SEASON_COLUMNS})
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (season_id, team_id) DO NOTHING
            RETURNING {TEAM_SEASON_COLUMNS}
            "#
        );
        Ok(sqlx::query_as(&sql)
            .bind(row.season_id)
            .bind(row.team_id)
            .bind(row.points)
            .bind(row.rank)
            .bind(row.goals_scored)
            .bind(row.goals_conceded)
            .fetch_optional(&self.pool)
            .await?)
    }
}

#[async_trait]
impl RecordStore<Player> for PgStore {
    async fn find(&self, key: &i32) -> Result<Option<Player>> {
        let sql = format!("SELECT {PLAYER_COLUMNS} FROM players WHERE id = $1");
        Ok(sqlx::query_as(&sql).bind(key).fetch_optional(&self.pool).await?)
    }

    async fn insert(&self, player: &Player) -> Result<Player> {
        let sql = format!(
            r#"
            INSERT INTO players ({PLAYER_COLUMNS})
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {PLAYER_COLUMNS}
            "#
        );
        Ok(sqlx::query_as(&sql)
            .bind(player.id)
            .bind(player.team_id)
            .bind(&player.position_code)
            .bind(&player.first_name)
            .bind(&player.last_name)
            .bind(&player.display_name)
            .bind(player.dob)
            .fetch_one(&self.pool)
            .await?)
    }

    async fn insert_if_absent(&self, player: &Player) -> Result<Option<Player>> {
        let sql = format!(
            r#"
            INSERT INTO players ({PLAYER_COLUMNS})
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (id) DO NOTHING
            RETURNING {PLAYER_COLUMNS}
            "#
        );
        Ok(sqlx::query_as(&sql)
            .bind(player.id)
            .bind(player.team_id)
            .bind(&player.position_code)
            .bind(&player.first_name)
            .bind(&player.last_name)
            .bind(&player.display_name)
            .bind(player.dob)
            .fetch_optional(&self.pool)
            .await?)
    }
}
