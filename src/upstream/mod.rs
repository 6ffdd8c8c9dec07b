//! Upstream fetch adapter.
//!
//! Turns provider envelopes into domain records. Every response is checked
//! for provider-reported errors before anything is read from it, and any
//! record that cannot be normalized fails the whole page.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, info};

use crate::error::{Result, SyncError};
use crate::models::{season_name, Fixture, League, NewSeason, Player, Position, Season, Team, TeamSeason};

mod client;
pub mod types;

pub use client::{ApiFootballClient, RequestLimits, Transport, DEFAULT_BASE_URL};
use types::{
    ApiErrors, ApiFixture, ApiLeagueEntry, ApiPlayerProfile, ApiResponse, ApiSquadEntry, ApiStandingsEntry,
    ApiTeamEntry,
};

const ROUND_PREFIX: &str = "Regular Season";

/// Normalized provider data. Season-scoped calls take an already resolved
/// season; resolving it is the caller's job.
#[async_trait]
pub trait FootballFeed: Send + Sync {
    async fn teams(&self, league_id: i32, year: i32) -> Result<Vec<Team>>;

    /// All fixtures of the season, or only one gameweek when given.
    async fn fixtures(&self, season: &Season, gameweek: Option<i32>) -> Result<Vec<Fixture>>;

    async fn standings(&self, season: &Season) -> Result<Vec<TeamSeason>>;

    /// Player ids of a team's squad across every page, in page order.
    async fn squad(&self, team_id: i32, year: i32) -> Result<Vec<i32>>;

    async fn player(&self, player_id: i32, team_id: i32) -> Result<Option<Player>>;

    async fn league(&self, league_id: i32) -> Result<League>;

    async fn league_season(&self, league_id: i32, year: i32) -> Result<NewSeason>;
}

/// `"Regular Season - 14"` -> `14`.
pub fn parse_gameweek(round: &str) -> Result<i32> {
    round
        .rsplit_once(" - ")
        .and_then(|(_, n)| n.trim().parse::<i32>().ok())
        .filter(|gw| *gw >= 1)
        .ok_or_else(|| SyncError::malformed(format!("cannot read a gameweek from round {:?}", round)))
}

pub fn round_for_gameweek(gameweek: i32) -> String {
    format!("{} - {}", ROUND_PREFIX, gameweek)
}

/// RFC 3339 timestamps, or bare dates taken as midnight UTC.
pub fn parse_fixture_date(raw: &str) -> Result<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }
    parse_date(raw).map(|d| d.and_time(NaiveTime::MIN).and_utc())
}

/// Accepts `YYYY-MM-DD` with anything after the tenth character ignored.
pub fn parse_date(raw: &str) -> Result<NaiveDate> {
    raw.get(..10)
        .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
        .ok_or_else(|| SyncError::malformed(format!("unparseable date {:?}", raw)))
}

/// Fail with the provider's own messages when it flagged the request.
/// Runs on the raw body, so a flagged response whose `response` field has
/// an unexpected shape still reports the provider's messages.
pub fn check_errors(raw: &Value) -> Result<()> {
    let messages = raw
        .get("errors")
        .map(ApiErrors::from_value)
        .unwrap_or_default()
        .messages();
    if messages.is_empty() {
        Ok(())
    } else {
        Err(SyncError::UpstreamValidation(messages.join("; ")))
    }
}

pub fn fixture_from_api(season_id: i32, raw: &ApiFixture) -> Result<Fixture> {
    Ok(Fixture {
        id: raw.fixture.id,
        season_id,
        gameweek: parse_gameweek(&raw.league.round)?,
        date: parse_fixture_date(&raw.fixture.date)?,
        home_team_id: raw.teams.home.id,
        away_team_id: raw.teams.away.id,
        status: raw.fixture.status.long.clone(),
        home_goals: raw.goals.home.unwrap_or(0),
        away_goals: raw.goals.away.unwrap_or(0),
    })
}

pub fn player_from_profile(team_id: i32, raw: &ApiPlayerProfile) -> Result<Player> {
    let p = &raw.player;
    let dob = match p.birth.date.as_deref() {
        Some(d) if !d.is_empty() => Some(parse_date(d)?),
        _ => None,
    };
    Ok(Player {
        id: p.id,
        team_id,
        position_code: Position::from_provider(p.position.as_deref().unwrap_or_default())
            .code()
            .to_string(),
        first_name: p.firstname.clone(),
        last_name: p.lastname.clone(),
        display_name: p.name.clone(),
        dob,
    })
}

/// The fetch adapter over any [`Transport`].
pub struct ApiFootball<T> {
    transport: T,
}

impl<T: Transport> ApiFootball<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    /// One request, decoded and error-checked.
    async fn fetch<R: DeserializeOwned>(
        &self,
        endpoint: &str,
        query: &[(&'static str, String)],
    ) -> Result<ApiResponse<R>> {
        let raw: Value = self.transport.get(endpoint, query).await?;
        check_errors(&raw)?;
        serde_json::from_value(raw).map_err(|source| SyncError::Decode {
            endpoint: endpoint.to_string(),
            source,
        })
    }
}

#[async_trait]
impl<T: Transport> FootballFeed for ApiFootball<T> {
    async fn teams(&self, league_id: i32, year: i32) -> Result<Vec<Team>> {
        let envelope: ApiResponse<ApiTeamEntry> = self
            .fetch(
                "teams",
                &[("league", league_id.to_string()), ("season", year.to_string())],
            )
            .await?;

        let teams: Vec<Team> = envelope
            .response
            .into_iter()
            .map(|entry| Team {
                id: entry.team.id,
                name: entry.team.name,
                code: entry.team.code,
                country: entry.team.country.unwrap_or_default(),
            })
            .collect();

        info!("Fetched {} teams for league {} season {}", teams.len(), league_id, year);
        Ok(teams)
    }

    async fn fixtures(&self, season: &Season, gameweek: Option<i32>) -> Result<Vec<Fixture>> {
        let mut query = vec![
            ("league", season.league_id.to_string()),
            ("season", season.start_year().to_string()),
        ];
        if let Some(gw) = gameweek {
            query.push(("round", round_for_gameweek(gw)));
        }

        let envelope: ApiResponse<ApiFixture> = self.fetch("fixtures", &query).await?;
        let fixtures = envelope
            .response
            .iter()
            .map(|raw| fixture_from_api(season.id, raw))
            .collect::<Result<Vec<_>>>()?;

        info!(
            "Fetched {} fixtures for season {} (gameweek {:?})",
            fixtures.len(),
            season.id,
            gameweek
        );
        Ok(fixtures)
    }

    async fn standings(&self, season: &Season) -> Result<Vec<TeamSeason>> {
        let envelope: ApiResponse<ApiStandingsEntry> = self
            .fetch(
                "standings",
                &[
                    ("league", season.league_id.to_string()),
                    ("season", season.start_year().to_string()),
                ],
            )
            .await?;

        let rows: Vec<TeamSeason> = envelope
            .response
            .iter()
            .flat_map(|entry| entry.league.standings.iter().flatten())
            .map(|s| TeamSeason {
                season_id: season.id,
                team_id: s.team.id,
                points: s.points,
                rank: s.rank,
                goals_scored: s.all.goals.scored,
                goals_conceded: s.all.goals.conceded,
            })
            .collect();

        info!("Fetched {} standings rows for season {}", rows.len(), season.id);
        Ok(rows)
    }

    async fn squad(&self, team_id: i32, year: i32) -> Result<Vec<i32>> {
        let page_query = |page: u32| {
            vec![
                ("team", team_id.to_string()),
                ("season", year.to_string()),
                ("page", page.to_string()),
            ]
        };

        let first: ApiResponse<ApiSquadEntry> = self.fetch("players", &page_query(1)).await?;
        let total_pages = first.paging.total.max(1);
        debug!("Team {} season {} has {} player pages", team_id, year, total_pages);

        let mut ids: Vec<i32> = first.response.iter().map(|e| e.player.id).collect();
        for page in 2..=total_pages {
            let next: ApiResponse<ApiSquadEntry> = self.fetch("players", &page_query(page)).await?;
            ids.extend(next.response.iter().map(|e| e.player.id));
        }

        info!("Fetched {} squad entries for team {} season {}", ids.len(), team_id, year);
        Ok(ids)
    }

    async fn player(&self, player_id: i32, team_id: i32) -> Result<Option<Player>> {
        let envelope: ApiResponse<ApiPlayerProfile> = self
            .fetch("players/profiles", &[("player", player_id.to_string())])
            .await?;

        envelope
            .response
            .first()
            .map(|profile| player_from_profile(team_id, profile))
            .transpose()
    }

    async fn league(&self, league_id: i32) -> Result<League> {
        let envelope: ApiResponse<ApiLeagueEntry> = self
            .fetch("leagues", &[("id", league_id.to_string())])
            .await?;

        let entry = envelope
            .response
            .into_iter()
            .next()
            .ok_or_else(|| SyncError::malformed(format!("no league with id={} upstream", league_id)))?;

        Ok(League {
            id: entry.league.id,
            name: entry.league.name,
            base_country: entry.country.name,
        })
    }

    async fn league_season(&self, league_id: i32, year: i32) -> Result<NewSeason> {
        let envelope: ApiResponse<ApiLeagueEntry> = self
            .fetch(
                "leagues",
                &[("id", league_id.to_string()), ("season", year.to_string())],
            )
            .await?;

        let season = envelope
            .response
            .first()
            .and_then(|entry| entry.seasons.iter().find(|s| s.year == year).or(entry.seasons.first()))
            .ok_or_else(|| {
                SyncError::malformed(format!("no {} season for league id={} upstream", year, league_id))
            })?;

        Ok(NewSeason {
            name: season_name(year),
            start_date: parse_date(&season.start)?,
            end_date: parse_date(&season.end)?,
            league_id,
        })
    }
}
