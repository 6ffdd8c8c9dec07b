//! REST surface over the local store.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::error;

use crate::error::SyncError;
use crate::models::{Fixture, League, NewSeason, Team, TeamSeason};
use crate::store::{Catalog, ConditionalUpdate, RecordStore, SeasonLookup, SeasonWriter, SyncStore};

const FOREIGN_KEY_VIOLATION: &str = "23503";
const UNIQUE_VIOLATION: &str = "23505";

/// Storage the REST API runs against.
pub trait ApiStore: SyncStore + Catalog + 'static {}

impl<T: SyncStore + Catalog + 'static> ApiStore for T {}

pub fn router<S: ApiStore>(store: Arc<S>) -> Router {
    Router::new()
        .route("/health", get(health_handler::<S>))
        .route(
            "/api/leagues",
            get(list_leagues::<S>)
                .post(create_league::<S>)
                .delete(delete_all_leagues::<S>),
        )
        .route(
            "/api/leagues/:id",
            get(get_league::<S>).delete(delete_league::<S>),
        )
        .route("/api/teams", get(list_teams::<S>).post(create_team::<S>))
        .route("/api/teams/:id", get(get_team::<S>))
        .route("/api/seasons", post(create_season::<S>))
        .route("/api/seasons/:id", get(get_season::<S>))
        .route("/api/fixtures", post(create_fixture::<S>))
        .route(
            "/api/fixtures/:id",
            get(get_fixture::<S>).put(update_fixture::<S>),
        )
        .route(
            "/api/fixtures/seasons/:season_id",
            get(fixtures_for_season::<S>),
        )
        .route(
            "/api/fixtures/seasons/:season_id/gameweek/:gameweek",
            get(fixtures_for_gameweek::<S>),
        )
        .route("/api/team-seasons", post(create_team_season::<S>))
        .route(
            "/api/team-seasons/seasons/:season_id/teams/:team_id",
            get(get_team_season::<S>),
        )
        .with_state(store)
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    fn missing_fields() -> Self {
        Self::new(StatusCode::BAD_REQUEST, "Missing one or more required fields.")
    }

    fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    /// Integrity violations are the caller's problem (409); anything else is
    /// ours (500). Either way the message names what was attempted.
    fn from_sync(action: &str, err: SyncError) -> Self {
        let status = match err.db_code().as_deref() {
            Some(FOREIGN_KEY_VIOLATION) | Some(UNIQUE_VIOLATION) => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let detail = match &err {
            SyncError::Storage(sqlx::Error::Database(db)) => db.message().to_string(),
            other => other.to_string(),
        };
        if status.is_server_error() {
            error!("Failed to {}: {:?}", action, err);
        }
        Self::new(status, format!("Failed to {}. {}", action, detail))
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> ApiResult<T> {
    payload
        .map(|Json(v)| v)
        .map_err(|rejection| ApiError::new(StatusCode::BAD_REQUEST, rejection.body_text()))
}

fn required<T>(field: Option<T>) -> ApiResult<T> {
    field.ok_or_else(ApiError::missing_fields)
}

/// Health check handler
async fn health_handler<S: ApiStore>(State(store): State<Arc<S>>) -> (StatusCode, Json<Value>) {
    let db_ok = store.ping().await.is_ok();
    let (http_status, status) = if db_ok {
        (StatusCode::OK, "ok")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "degraded")
    };

    (
        http_status,
        Json(json!({
            "service": "fantasy-sync",
            "version": env!("CARGO_PKG_VERSION"),
            "status": status,
            "database": db_ok,
        })),
    )
}

// ---------------------------------------------------------------------------
// Leagues
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
pub struct LeagueBody {
    pub id: Option<i32>,
    pub name: Option<String>,
    pub base_country: Option<String>,
}

impl LeagueBody {
    fn into_league(self) -> ApiResult<League> {
        Ok(League {
            id: required(self.id)?,
            name: required(self.name.filter(|s| !s.is_empty()))?,
            base_country: required(self.base_country.filter(|s| !s.is_empty()))?,
        })
    }
}

async fn list_leagues<S: ApiStore>(State(store): State<Arc<S>>) -> ApiResult<Json<Vec<League>>> {
    store
        .list_leagues()
        .await
        .map(Json)
        .map_err(|e| ApiError::from_sync("get leagues", e))
}

async fn get_league<S: ApiStore>(
    State(store): State<Arc<S>>,
    Path(id): Path<i32>,
) -> ApiResult<Json<League>> {
    RecordStore::<League>::find(&*store, &id)
        .await
        .map_err(|e| ApiError::from_sync("get league", e))?
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("League with id={} doesn't exist.", id)))
}

async fn create_league<S: ApiStore>(
    State(store): State<Arc<S>>,
    payload: Result<Json<LeagueBody>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<League>)> {
    let league = body(payload)?.into_league()?;
    let inserted = RecordStore::<League>::insert(&*store, &league)
        .await
        .map_err(|e| ApiError::from_sync("post league", e))?;
    Ok((StatusCode::CREATED, Json(inserted)))
}

async fn delete_league<S: ApiStore>(
    State(store): State<Arc<S>>,
    Path(id): Path<i32>,
) -> ApiResult<Json<String>> {
    let deleted = store
        .delete_league(id)
        .await
        .map_err(|e| ApiError::from_sync("delete league", e))?;
    if deleted == 0 {
        Ok(Json(format!("No league exists with id={}", id)))
    } else {
        Ok(Json(format!("Deleted league with id={}", id)))
    }
}

async fn delete_all_leagues<S: ApiStore>(State(store): State<Arc<S>>) -> ApiResult<Json<String>> {
    let deleted = store
        .delete_all_leagues()
        .await
        .map_err(|e| ApiError::from_sync("delete leagues", e))?;
    Ok(Json(format!("Deleted {} leagues", deleted)))
}

// ---------------------------------------------------------------------------
// Teams
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
pub struct TeamBody {
    pub id: Option<i32>,
    pub name: Option<String>,
    pub code: Option<String>,
    pub country: Option<String>,
}

impl TeamBody {
    fn into_team(self) -> ApiResult<Team> {
        Ok(Team {
            id: required(self.id)?,
            name: required(self.name.filter(|s| !s.is_empty()))?,
            code: self.code,
            country: required(self.country.filter(|s| !s.is_empty()))?,
        })
    }
}

async fn list_teams<S: ApiStore>(State(store): State<Arc<S>>) -> ApiResult<Json<Vec<Team>>> {
    store
        .list_teams()
        .await
        .map(Json)
        .map_err(|e| ApiError::from_sync("get teams", e))
}

async fn get_team<S: ApiStore>(
    State(store): State<Arc<S>>,
    Path(id): Path<i32>,
) -> ApiResult<Json<Team>> {
    RecordStore::<Team>::find(&*store, &id)
        .await
        .map_err(|e| ApiError::from_sync("get team", e))?
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("Team with id={} doesn't exist.", id)))
}

async fn create_team<S: ApiStore>(
    State(store): State<Arc<S>>,
    payload: Result<Json<TeamBody>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Team>)> {
    let team = body(payload)?.into_team()?;
    let inserted = RecordStore::<Team>::insert(&*store, &team)
        .await
        .map_err(|e| ApiError::from_sync("post team", e))?;
    Ok((StatusCode::CREATED, Json(inserted)))
}

// ---------------------------------------------------------------------------
// Seasons
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
pub struct SeasonBody {
    pub name: Option<String>,
    pub league_id: Option<i32>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

impl SeasonBody {
    fn into_new_season(self) -> ApiResult<NewSeason> {
        Ok(NewSeason {
            name: required(self.name.filter(|s| !s.is_empty()))?,
            league_id: required(self.league_id)?,
            start_date: required(self.start_date)?,
            end_date: required(self.end_date)?,
        })
    }
}

async fn get_season<S: ApiStore>(
    State(store): State<Arc<S>>,
    Path(id): Path<i32>,
) -> ApiResult<Json<crate::models::Season>> {
    store
        .season_by_id(id)
        .await
        .map_err(|e| ApiError::from_sync("get season", e))?
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("Season with id={} doesn't exist.", id)))
}

async fn create_season<S: ApiStore>(
    State(store): State<Arc<S>>,
    payload: Result<Json<SeasonBody>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<crate::models::Season>)> {
    let season = body(payload)?.into_new_season()?;
    let inserted = store
        .insert_season(&season)
        .await
        .map_err(|e| ApiError::from_sync("post season", e))?
        .ok_or_else(|| {
            ApiError::new(
                StatusCode::CONFLICT,
                format!(
                    "Season {} already exists for league_id={}.",
                    season.name, season.league_id
                ),
            )
        })?;
    Ok((StatusCode::CREATED, Json(inserted)))
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
pub struct FixtureBody {
    pub id: Option<i32>,
    pub season_id: Option<i32>,
    pub gameweek: Option<i32>,
    pub date: Option<DateTime<Utc>>,
    pub home_team_id: Option<i32>,
    pub away_team_id: Option<i32>,
    pub status: Option<String>,
    pub home_goals: Option<i32>,
    pub away_goals: Option<i32>,
}

impl FixtureBody {
    fn into_fixture(self) -> ApiResult<Fixture> {
        Ok(Fixture {
            id: required(self.id)?,
            season_id: required(self.season_id)?,
            gameweek: required(self.gameweek)?,
            date: required(self.date)?,
            home_team_id: required(self.home_team_id)?,
            away_team_id: required(self.away_team_id)?,
            status: required(self.status.filter(|s| !s.is_empty()))?,
            home_goals: required(self.home_goals)?,
            away_goals: required(self.away_goals)?,
        })
    }
}

/// The mutable part of a fixture.
#[derive(Debug, Default, Deserialize)]
pub struct FixtureUpdateBody {
    pub date: Option<DateTime<Utc>>,
    pub status: Option<String>,
    pub home_goals: Option<i32>,
    pub away_goals: Option<i32>,
}

impl FixtureUpdateBody {
    fn apply_to(self, existing: Fixture) -> ApiResult<Fixture> {
        Ok(Fixture {
            date: required(self.date)?,
            status: required(self.status.filter(|s| !s.is_empty()))?,
            home_goals: required(self.home_goals)?,
            away_goals: required(self.away_goals)?,
            ..existing
        })
    }
}

async fn get_fixture<S: ApiStore>(
    State(store): State<Arc<S>>,
    Path(id): Path<i32>,
) -> ApiResult<Json<Fixture>> {
    RecordStore::<Fixture>::find(&*store, &id)
        .await
        .map_err(|e| ApiError::from_sync("get fixture", e))?
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("Fixture with id={} doesn't exist.", id)))
}

async fn fixtures_for_season<S: ApiStore>(
    State(store): State<Arc<S>>,
    Path(season_id): Path<i32>,
) -> ApiResult<Json<Vec<Fixture>>> {
    store
        .fixtures_for_season(season_id)
        .await
        .map(Json)
        .map_err(|e| ApiError::from_sync("get fixtures", e))
}

async fn fixtures_for_gameweek<S: ApiStore>(
    State(store): State<Arc<S>>,
    Path((season_id, gameweek)): Path<(i32, i32)>,
) -> ApiResult<Json<Vec<Fixture>>> {
    store
        .fixtures_for_gameweek(season_id, gameweek)
        .await
        .map(Json)
        .map_err(|e| ApiError::from_sync("get fixtures", e))
}

async fn create_fixture<S: ApiStore>(
    State(store): State<Arc<S>>,
    payload: Result<Json<FixtureBody>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Fixture>)> {
    let fixture = body(payload)?.into_fixture()?;
    let inserted = RecordStore::<Fixture>::insert(&*store, &fixture)
        .await
        .map_err(|e| ApiError::from_sync("post fixture", e))?;
    Ok((StatusCode::CREATED, Json(inserted)))
}

async fn update_fixture<S: ApiStore>(
    State(store): State<Arc<S>>,
    Path(id): Path<i32>,
    payload: Result<Json<FixtureUpdateBody>, JsonRejection>,
) -> ApiResult<Json<Fixture>> {
    let existing = RecordStore::<Fixture>::find(&*store, &id)
        .await
        .map_err(|e| ApiError::from_sync("update fixture", e))?
        .ok_or_else(|| ApiError::not_found(format!("Fixture with id={} doesn't exist.", id)))?;

    let finished = || {
        ApiError::new(
            StatusCode::CONFLICT,
            format!("Fixture with id={} is finished and can no longer be updated.", id),
        )
    };
    if existing.is_finished() {
        return Err(finished());
    }

    let updated = body(payload)?.apply_to(existing)?;
    // The store re-checks the status in the same write.
    store
        .update_if_mutable(&updated)
        .await
        .map_err(|e| ApiError::from_sync("update fixture", e))?
        .map(Json)
        .ok_or_else(finished)
}

// ---------------------------------------------------------------------------
// Team seasons
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
pub struct TeamSeasonBody {
    pub season_id: Option<i32>,
    pub team_id: Option<i32>,
    pub points: Option<i32>,
    pub rank: Option<i32>,
    pub goals_scored: Option<i32>,
    pub goals_conceded: Option<i32>,
}

impl TeamSeasonBody {
    fn into_team_season(self) -> ApiResult<TeamSeason> {
        Ok(TeamSeason {
            season_id: required(self.season_id)?,
            team_id: required(self.team_id)?,
            points: required(self.points)?,
            rank: required(self.rank)?,
            goals_scored: required(self.goals_scored)?,
            goals_conceded: required(self.goals_conceded)?,
        })
    }
}

async fn get_team_season<S: ApiStore>(
    State(store): State<Arc<S>>,
    Path((season_id, team_id)): Path<(i32, i32)>,
) -> ApiResult<Json<TeamSeason>> {
    RecordStore::<TeamSeason>::find(&*store, &(season_id, team_id))
        .await
        .map_err(|e| ApiError::from_sync("get teamSeason", e))?
        .map(Json)
        .ok_or_else(|| {
            ApiError::not_found(format!(
                "Team season with season_id={} and team_id={} doesn't exist.",
                season_id, team_id
            ))
        })
}

async fn create_team_season<S: ApiStore>(
    State(store): State<Arc<S>>,
    payload: Result<Json<TeamSeasonBody>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<TeamSeason>)> {
    let row = body(payload)?.into_team_season()?;
    let inserted = RecordStore::<TeamSeason>::insert(&*store, &row)
        .await
        .map_err(|e| ApiError::from_sync("post teamSeason", e))?;
    Ok((StatusCode::CREATED, Json(inserted)))
}
