//! Domain records as they are stored locally.
//!
//! Every record carries the provider's natural key (or, for seasons, a
//! locally generated id). Field names match the table columns so the same
//! structs serve as `sqlx` rows and HTTP bodies.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Fixture status after which no sync update may touch the row.
pub const MATCH_FINISHED: &str = "Match Finished";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct League {
    pub id: i32,
    pub name: String,
    pub base_country: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Team {
    pub id: i32,
    pub name: String,
    pub code: Option<String>,
    pub country: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Season {
    pub id: i32,
    pub name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub league_id: i32,
}

impl Season {
    /// The provider keys seasons by the calendar year they start in.
    pub fn start_year(&self) -> i32 {
        self.start_date.year()
    }
}

/// A season before the database has assigned it an id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewSeason {
    pub name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub league_id: i32,
}

/// `2024` -> `"2024/25"`.
pub fn season_name(start_year: i32) -> String {
    format!("{}/{:02}", start_year, (start_year + 1).rem_euclid(100))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Fixture {
    pub id: i32,
    pub season_id: i32,
    pub gameweek: i32,
    pub date: DateTime<Utc>,
    pub home_team_id: i32,
    pub away_team_id: i32,
    pub status: String,
    pub home_goals: i32,
    pub away_goals: i32,
}

impl Fixture {
    pub fn is_finished(&self) -> bool {
        self.status == MATCH_FINISHED
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct TeamSeason {
    pub season_id: i32,
    pub team_id: i32,
    pub points: i32,
    pub rank: i32,
    pub goals_scored: i32,
    pub goals_conceded: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Player {
    pub id: i32,
    pub team_id: i32,
    pub position_code: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub display_name: String,
    pub dob: Option<NaiveDate>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Position {
    Goalkeeper,
    Defender,
    Midfielder,
    Attacker,
}

impl Position {
    /// Anything the provider does not call a keeper, defender or midfielder
    /// is treated as an attacker.
    pub fn from_provider(label: &str) -> Self {
        match label {
            "Goalkeeper" => Position::Goalkeeper,
            "Defender" => Position::Defender,
            "Midfielder" => Position::Midfielder,
            _ => Position::Attacker,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Position::Goalkeeper => "GK",
            Position::Defender => "DEF",
            Position::Midfielder => "MID",
            Position::Attacker => "ATT",
        }
    }
}
