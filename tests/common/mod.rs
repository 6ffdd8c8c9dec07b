//! In-memory fakes shared by the integration tests.
#![allow(dead_code)]

use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{Datelike, NaiveDate, TimeZone, Utc};
use serde_json::Value;
use sqlx::error::{DatabaseError, ErrorKind};

use fantasy_sync::models::{
    season_name, Fixture, League, NewSeason, Player, Season, Team, TeamSeason, MATCH_FINISHED,
};
use fantasy_sync::store::{
    Catalog, ConditionalUpdate, Keyed, RecordStore, SeasonLookup, SeasonRoster, SeasonWriter,
};
use fantasy_sync::upstream::{FootballFeed, Transport};
use fantasy_sync::{Result, SyncError};

// ---------------------------------------------------------------------------
// Record builders
// ---------------------------------------------------------------------------

pub fn season(id: i32, league_id: i32, start_year: i32) -> Season {
    Season {
        id,
        name: season_name(start_year),
        start_date: NaiveDate::from_ymd_opt(start_year, 8, 1).unwrap(),
        end_date: NaiveDate::from_ymd_opt(start_year + 1, 5, 31).unwrap(),
        league_id,
    }
}

pub fn league(id: i32) -> League {
    League {
        id,
        name: format!("League {}", id),
        base_country: "England".to_string(),
    }
}

pub fn team(id: i32) -> Team {
    Team {
        id,
        name: format!("Team {}", id),
        code: None,
        country: "England".to_string(),
    }
}

pub fn fixture(id: i32, status: &str, home_goals: i32, away_goals: i32) -> Fixture {
    Fixture {
        id,
        season_id: 1,
        gameweek: 1,
        date: Utc.with_ymd_and_hms(2024, 8, 17, 14, 0, 0).unwrap(),
        home_team_id: id * 2,
        away_team_id: id * 2 + 1,
        status: status.to_string(),
        home_goals,
        away_goals,
    }
}

pub fn team_season(season_id: i32, team_id: i32) -> TeamSeason {
    TeamSeason {
        season_id,
        team_id,
        points: 0,
        rank: team_id,
        goals_scored: 0,
        goals_conceded: 0,
    }
}

pub fn player(id: i32, team_id: i32) -> Player {
    Player {
        id,
        team_id,
        position_code: "MID".to_string(),
        first_name: None,
        last_name: None,
        display_name: format!("Player {}", id),
        dob: None,
    }
}

fn injected(what: &str) -> SyncError {
    SyncError::Storage(sqlx::Error::Protocol(format!("injected failure: {}", what)))
}

/// Database error carrying a Postgres SQLSTATE, as `PgStore` would surface it.
#[derive(Debug)]
pub struct ConstraintViolation {
    code: &'static str,
    message: String,
}

impl ConstraintViolation {
    pub fn unique(table: &str) -> SyncError {
        Self::wrap(
            "23505",
            format!("duplicate key value violates unique constraint \"{}_pkey\"", table),
        )
    }

    pub fn foreign_key(table: &str, referenced_by: &str) -> SyncError {
        Self::wrap(
            "23503",
            format!(
                "update or delete on table \"{}\" violates foreign key constraint on table \"{}\"",
                table, referenced_by
            ),
        )
    }

    fn wrap(code: &'static str, message: String) -> SyncError {
        SyncError::Storage(sqlx::Error::Database(Box::new(Self { code, message })))
    }
}

impl std::fmt::Display for ConstraintViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ConstraintViolation {}

impl DatabaseError for ConstraintViolation {
    fn message(&self) -> &str {
        &self.message
    }

    fn code(&self) -> Option<Cow<'_, str>> {
        Some(Cow::Borrowed(self.code))
    }

    fn as_error(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
        self
    }

    fn as_error_mut(&mut self) -> &mut (dyn std::error::Error + Send + Sync + 'static) {
        self
    }

    fn into_error(self: Box<Self>) -> Box<dyn std::error::Error + Send + Sync + 'static> {
        self
    }

    fn kind(&self) -> ErrorKind {
        match self.code {
            "23505" => ErrorKind::UniqueViolation,
            "23503" => ErrorKind::ForeignKeyViolation,
            _ => ErrorKind::Other,
        }
    }
}

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

#[derive(Default)]
struct Tables {
    leagues: BTreeMap<i32, League>,
    teams: BTreeMap<i32, Team>,
    fixtures: BTreeMap<i32, Fixture>,
    team_seasons: BTreeMap<(i32, i32), TeamSeason>,
    players: BTreeMap<i32, Player>,
    seasons: BTreeMap<i32, Season>,
    next_season_id: i32,
}

/// Storage fake with call counters and failure injection. Uses the default
/// lookup-then-insert `insert_if_absent`.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    pub finds: AtomicUsize,
    pub inserts: AtomicUsize,
    pub updates: AtomicUsize,
    pub season_lookups: AtomicUsize,
    /// 1-based insert call that fails.
    fail_insert_at: Option<usize>,
    /// 1-based update call that fails.
    fail_update_at: Option<usize>,
    call_delay: Option<Duration>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_insert_at(mut self, call: usize) -> Self {
        self.fail_insert_at = Some(call);
        self
    }

    pub fn failing_update_at(mut self, call: usize) -> Self {
        self.fail_update_at = Some(call);
        self
    }

    /// Every find, insert and update sleeps this long first.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.call_delay = Some(delay);
        self
    }

    pub fn with_season(self, season: Season) -> Self {
        {
            let mut t = self.tables.lock().unwrap();
            t.next_season_id = t.next_season_id.max(season.id);
            t.seasons.insert(season.id, season);
        }
        self
    }

    pub fn seed_league(&self, l: League) {
        self.tables.lock().unwrap().leagues.insert(l.id, l);
    }

    pub fn seed_fixture(&self, f: Fixture) {
        self.tables.lock().unwrap().fixtures.insert(f.id, f);
    }

    pub fn seed_team(&self, t: Team) {
        self.tables.lock().unwrap().teams.insert(t.id, t);
    }

    pub fn seed_team_season(&self, ts: TeamSeason) {
        self.tables
            .lock()
            .unwrap()
            .team_seasons
            .insert((ts.season_id, ts.team_id), ts);
    }

    pub fn seed_player(&self, p: Player) {
        self.tables.lock().unwrap().players.insert(p.id, p);
    }

    pub fn fixtures(&self) -> Vec<Fixture> {
        self.tables.lock().unwrap().fixtures.values().cloned().collect()
    }

    pub fn teams(&self) -> Vec<Team> {
        self.tables.lock().unwrap().teams.values().cloned().collect()
    }

    pub fn leagues(&self) -> Vec<League> {
        self.tables.lock().unwrap().leagues.values().cloned().collect()
    }

    pub fn players(&self) -> Vec<Player> {
        self.tables.lock().unwrap().players.values().cloned().collect()
    }

    pub fn team_seasons(&self) -> Vec<TeamSeason> {
        self.tables.lock().unwrap().team_seasons.values().cloned().collect()
    }

    pub fn seasons(&self) -> Vec<Season> {
        self.tables.lock().unwrap().seasons.values().cloned().collect()
    }

    pub fn fixture(&self, id: i32) -> Option<Fixture> {
        self.tables.lock().unwrap().fixtures.get(&id).cloned()
    }

    pub fn insert_calls(&self) -> usize {
        self.inserts.load(Ordering::SeqCst)
    }

    pub fn find_calls(&self) -> usize {
        self.finds.load(Ordering::SeqCst)
    }

    pub fn update_calls(&self) -> usize {
        self.updates.load(Ordering::SeqCst)
    }

    /// Finds, inserts and updates; season lookups are not counted.
    pub fn record_calls(&self) -> usize {
        self.find_calls() + self.insert_calls() + self.update_calls()
    }

    async fn pause(&self) {
        if let Some(delay) = self.call_delay {
            tokio::time::sleep(delay).await;
        }
    }

    fn count_insert(&self) -> Result<()> {
        let n = self.inserts.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_insert_at == Some(n) {
            return Err(injected("insert"));
        }
        Ok(())
    }
}

macro_rules! memory_record_store {
    ($record:ty, $table:ident) => {
        #[async_trait]
        impl RecordStore<$record> for MemoryStore {
            async fn find(
                &self,
                key: &<$record as Keyed>::Key,
            ) -> Result<Option<$record>> {
                self.pause().await;
                self.finds.fetch_add(1, Ordering::SeqCst);
                Ok(self.tables.lock().unwrap().$table.get(key).cloned())
            }

            async fn insert(&self, record: &$record) -> Result<$record> {
                self.pause().await;
                self.count_insert()?;
                let mut tables = self.tables.lock().unwrap();
                if tables.$table.contains_key(&record.key()) {
                    return Err(ConstraintViolation::unique(stringify!($table)));
                }
                tables.$table.insert(record.key(), record.clone());
                Ok(record.clone())
            }
        }
    };
}

memory_record_store!(League, leagues);
memory_record_store!(Team, teams);
memory_record_store!(Fixture, fixtures);
memory_record_store!(TeamSeason, team_seasons);
memory_record_store!(Player, players);

#[async_trait]
impl ConditionalUpdate<Fixture> for MemoryStore {
    async fn update_if_mutable(&self, record: &Fixture) -> Result<Option<Fixture>> {
        self.pause().await;
        let n = self.updates.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_update_at == Some(n) {
            return Err(injected("update"));
        }
        let mut tables = self.tables.lock().unwrap();
        match tables.fixtures.get_mut(&record.id) {
            Some(stored) if stored.status != MATCH_FINISHED => {
                stored.date = record.date;
                stored.status = record.status.clone();
                stored.home_goals = record.home_goals;
                stored.away_goals = record.away_goals;
                Ok(Some(stored.clone()))
            }
            _ => Ok(None),
        }
    }
}

#[async_trait]
impl SeasonLookup for MemoryStore {
    async fn season_by_id(&self, season_id: i32) -> Result<Option<Season>> {
        self.season_lookups.fetch_add(1, Ordering::SeqCst);
        Ok(self.tables.lock().unwrap().seasons.get(&season_id).cloned())
    }
}

#[async_trait]
impl SeasonRoster for MemoryStore {
    async fn team_ids_for_season(&self, season_id: i32) -> Result<Vec<i32>> {
        Ok(self
            .tables
            .lock()
            .unwrap()
            .team_seasons
            .keys()
            .filter(|(s, _)| *s == season_id)
            .map(|(_, t)| *t)
            .collect())
    }
}

#[async_trait]
impl SeasonWriter for MemoryStore {
    async fn insert_season(&self, season: &NewSeason) -> Result<Option<Season>> {
        let mut tables = self.tables.lock().unwrap();
        if tables
            .seasons
            .values()
            .any(|s| s.name == season.name && s.league_id == season.league_id)
        {
            return Ok(None);
        }
        tables.next_season_id += 1;
        let stored = Season {
            id: tables.next_season_id,
            name: season.name.clone(),
            start_date: season.start_date,
            end_date: season.end_date,
            league_id: season.league_id,
        };
        tables.seasons.insert(stored.id, stored.clone());
        Ok(Some(stored))
    }

    async fn delete_season(&self, season_id: i32) -> Result<u64> {
        let mut tables = self.tables.lock().unwrap();
        if tables.seasons.remove(&season_id).is_none() {
            return Ok(0);
        }
        tables.fixtures.retain(|_, f| f.season_id != season_id);
        tables.team_seasons.retain(|(s, _), _| *s != season_id);
        Ok(1)
    }

    async fn delete_season_by_name(&self, league_id: i32, name: &str) -> Result<u64> {
        let id = self
            .tables
            .lock()
            .unwrap()
            .seasons
            .values()
            .find(|s| s.league_id == league_id && s.name == name)
            .map(|s| s.id);
        match id {
            Some(id) => self.delete_season(id).await,
            None => Ok(0),
        }
    }
}

#[async_trait]
impl Catalog for MemoryStore {
    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    async fn list_leagues(&self) -> Result<Vec<League>> {
        Ok(self.leagues())
    }

    async fn delete_league(&self, league_id: i32) -> Result<u64> {
        let mut tables = self.tables.lock().unwrap();
        if tables.seasons.values().any(|s| s.league_id == league_id) {
            return Err(ConstraintViolation::foreign_key("leagues", "seasons"));
        }
        Ok(tables.leagues.remove(&league_id).map_or(0, |_| 1))
    }

    async fn delete_all_leagues(&self) -> Result<u64> {
        let mut tables = self.tables.lock().unwrap();
        if !tables.seasons.is_empty() {
            return Err(ConstraintViolation::foreign_key("leagues", "seasons"));
        }
        let deleted = tables.leagues.len() as u64;
        tables.leagues.clear();
        Ok(deleted)
    }

    async fn list_teams(&self) -> Result<Vec<Team>> {
        Ok(self.teams())
    }

    async fn fixtures_for_season(&self, season_id: i32) -> Result<Vec<Fixture>> {
        let mut fixtures: Vec<Fixture> = self
            .fixtures()
            .into_iter()
            .filter(|f| f.season_id == season_id)
            .collect();
        fixtures.sort_by_key(|f| (f.gameweek, f.date));
        Ok(fixtures)
    }

    async fn fixtures_for_gameweek(&self, season_id: i32, gameweek: i32) -> Result<Vec<Fixture>> {
        Ok(self
            .fixtures_for_season(season_id)
            .await?
            .into_iter()
            .filter(|f| f.gameweek == gameweek)
            .collect())
    }
}

// ---------------------------------------------------------------------------
// FakeFeed
// ---------------------------------------------------------------------------

/// Canned provider data. Every call is counted.
#[derive(Default)]
pub struct FakeFeed {
    pub teams: Vec<Team>,
    pub fixtures: Vec<Fixture>,
    pub standings: Vec<TeamSeason>,
    pub squads: HashMap<i32, Vec<i32>>,
    /// Player ids that have no profile upstream.
    pub missing_profiles: Vec<i32>,
    /// Team whose squad fetch fails.
    pub failing_squad: Option<i32>,
    pub league: Option<League>,
    pub seasons: Vec<NewSeason>,
    pub profile_delay: Option<Duration>,
    pub calls: AtomicUsize,
    pub player_calls: AtomicUsize,
    pub in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
}

impl FakeFeed {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn hit(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl FootballFeed for FakeFeed {
    async fn teams(&self, _league_id: i32, _year: i32) -> Result<Vec<Team>> {
        self.hit();
        Ok(self.teams.clone())
    }

    async fn fixtures(&self, season: &Season, gameweek: Option<i32>) -> Result<Vec<Fixture>> {
        self.hit();
        Ok(self
            .fixtures
            .iter()
            .filter(|f| gameweek.map_or(true, |gw| f.gameweek == gw))
            .map(|f| Fixture {
                season_id: season.id,
                ..f.clone()
            })
            .collect())
    }

    async fn standings(&self, season: &Season) -> Result<Vec<TeamSeason>> {
        self.hit();
        Ok(self
            .standings
            .iter()
            .map(|ts| TeamSeason {
                season_id: season.id,
                ..ts.clone()
            })
            .collect())
    }

    async fn squad(&self, team_id: i32, _year: i32) -> Result<Vec<i32>> {
        self.hit();
        if self.failing_squad == Some(team_id) {
            return Err(SyncError::UpstreamStatus {
                status: 500,
                body: "squad unavailable".to_string(),
            });
        }
        Ok(self.squads.get(&team_id).cloned().unwrap_or_default())
    }

    async fn player(&self, player_id: i32, team_id: i32) -> Result<Option<Player>> {
        self.hit();
        self.player_calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if let Some(delay) = self.profile_delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.missing_profiles.contains(&player_id) {
            return Ok(None);
        }
        Ok(Some(player(player_id, team_id)))
    }

    async fn league(&self, league_id: i32) -> Result<League> {
        self.hit();
        self.league
            .clone()
            .filter(|l| l.id == league_id)
            .ok_or_else(|| SyncError::MalformedUpstreamData(format!("no league {}", league_id)))
    }

    async fn league_season(&self, league_id: i32, year: i32) -> Result<NewSeason> {
        self.hit();
        self.seasons
            .iter()
            .find(|s| s.league_id == league_id && s.start_date.year() == year)
            .cloned()
            .ok_or_else(|| SyncError::MalformedUpstreamData(format!("no season {}", year)))
    }
}

// ---------------------------------------------------------------------------
// ScriptedTransport
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub endpoint: String,
    pub query: Vec<(String, String)>,
}

impl RecordedCall {
    pub fn param(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Replays queued responses in order and records every request. Clones share
/// the same script.
#[derive(Clone, Default)]
pub struct ScriptedTransport {
    responses: Arc<Mutex<VecDeque<Result<Value>>>>,
    calls: Arc<Mutex<Vec<RecordedCall>>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, body: Value) -> &Self {
        self.responses.lock().unwrap().push_back(Ok(body));
        self
    }

    pub fn fail(&self, err: SyncError) -> &Self {
        self.responses.lock().unwrap().push_back(Err(err));
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn get(&self, endpoint: &str, query: &[(&'static str, String)]) -> Result<Value> {
        self.calls.lock().unwrap().push(RecordedCall {
            endpoint: endpoint.to_string(),
            query: query
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
        });
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(SyncError::Config(format!("no scripted response for {}", endpoint))))
    }
}

/// Provider envelope with no errors and a single page.
pub fn envelope(response: Value) -> Value {
    serde_json::json!({
        "errors": [],
        "paging": { "current": 1, "total": 1 },
        "response": response
    })
}

pub fn paged(response: Value, current: u32, total: u32) -> Value {
    serde_json::json!({
        "errors": [],
        "paging": { "current": current, "total": total },
        "response": response
    })
}
