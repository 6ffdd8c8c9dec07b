//! API-Football payload shapes. Only the fields the sync reads are modelled.

use serde::Deserialize;
use serde_json::{Map, Value};

/// Every provider response is wrapped in this envelope.
#[derive(Debug, Deserialize, Clone)]
pub struct ApiResponse<T> {
    #[serde(default)]
    pub errors: ApiErrors,
    #[serde(default)]
    pub paging: Paging,
    #[serde(default = "Vec::new")]
    pub response: Vec<T>,
}

/// The provider reports parameter errors either as a list of strings or as
/// a map from parameter name to message.
#[derive(Debug, Deserialize, Clone)]
#[serde(untagged)]
pub enum ApiErrors {
    List(Vec<String>),
    Map(Map<String, Value>),
}

impl Default for ApiErrors {
    fn default() -> Self {
        ApiErrors::List(Vec::new())
    }
}

impl ApiErrors {
    /// Reads an untyped `errors` field. Anything that is neither a list nor
    /// a map is kept as a single message.
    pub fn from_value(raw: &Value) -> Self {
        match raw {
            Value::Null => ApiErrors::default(),
            Value::Array(items) => ApiErrors::List(items.iter().map(message_text).collect()),
            Value::Object(map) => ApiErrors::Map(map.clone()),
            other => ApiErrors::List(vec![message_text(other)]),
        }
    }

    /// Messages in payload order.
    pub fn messages(&self) -> Vec<String> {
        match self {
            ApiErrors::List(list) => list.clone(),
            ApiErrors::Map(map) => map.values().map(message_text).collect(),
        }
    }
}

fn message_text(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[derive(Debug, Deserialize, Clone, Copy)]
pub struct Paging {
    pub current: u32,
    pub total: u32,
}

impl Default for Paging {
    fn default() -> Self {
        Self { current: 1, total: 1 }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ApiTeamEntry {
    pub team: ApiTeam,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ApiTeam {
    pub id: i32,
    pub name: String,
    pub code: Option<String>,
    pub country: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ApiFixture {
    pub fixture: ApiFixtureInfo,
    pub league: ApiFixtureLeague,
    pub teams: ApiFixtureTeams,
    pub goals: ApiGoals,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ApiFixtureInfo {
    pub id: i32,
    pub date: String,
    pub status: ApiFixtureStatus,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ApiFixtureStatus {
    pub long: String,
    pub short: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ApiFixtureLeague {
    pub id: i32,
    pub round: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ApiFixtureTeams {
    pub home: ApiTeamRef,
    pub away: ApiTeamRef,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ApiTeamRef {
    pub id: i32,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct ApiGoals {
    pub home: Option<i32>,
    pub away: Option<i32>,
}

/// One entry of the paged `/players` listing.
#[derive(Debug, Deserialize, Clone)]
pub struct ApiSquadEntry {
    pub player: ApiSquadPlayer,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ApiSquadPlayer {
    pub id: i32,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ApiPlayerProfile {
    pub player: ApiProfilePlayer,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ApiProfilePlayer {
    pub id: i32,
    pub name: String,
    pub firstname: Option<String>,
    pub lastname: Option<String>,
    #[serde(default)]
    pub birth: ApiBirth,
    pub position: Option<String>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct ApiBirth {
    pub date: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ApiStandingsEntry {
    pub league: ApiStandingsLeague,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ApiStandingsLeague {
    pub id: i32,
    /// One inner list per group; a single-table league has exactly one.
    #[serde(default)]
    pub standings: Vec<Vec<ApiStanding>>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ApiStanding {
    pub rank: i32,
    pub team: ApiTeamRef,
    pub points: i32,
    pub all: ApiStandingRecord,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ApiStandingRecord {
    pub goals: ApiGoalTotals,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ApiGoalTotals {
    #[serde(rename = "for")]
    pub scored: i32,
    #[serde(rename = "against")]
    pub conceded: i32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ApiLeagueEntry {
    pub league: ApiLeague,
    pub country: ApiCountry,
    #[serde(default)]
    pub seasons: Vec<ApiLeagueSeason>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ApiLeague {
    pub id: i32,
    pub name: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ApiCountry {
    pub name: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ApiLeagueSeason {
    pub year: i32,
    pub start: String,
    pub end: String,
}
