//! Table definitions. Idempotent; there is no versioning.

use sqlx::PgPool;
use tracing::info;

use crate::error::Result;

const TABLES: &[(&str, &str)] = &[
    (
        "leagues",
        r#"
        CREATE TABLE IF NOT EXISTS leagues (
            id integer PRIMARY KEY,
            name varchar NOT NULL,
            base_country varchar NOT NULL
        )
        "#,
    ),
    (
        "teams",
        r#"
        CREATE TABLE IF NOT EXISTS teams (
            id integer PRIMARY KEY,
            name varchar NOT NULL,
            code varchar,
            country varchar NOT NULL
        )
        "#,
    ),
    (
        "seasons",
        r#"
        CREATE TABLE IF NOT EXISTS seasons (
            id integer GENERATED ALWAYS AS IDENTITY PRIMARY KEY,
            name varchar NOT NULL,
            start_date date NOT NULL,
            end_date date NOT NULL,
            league_id integer NOT NULL REFERENCES leagues (id) ON DELETE NO ACTION,
            CONSTRAINT unique_seasons_name_league_id UNIQUE (name, league_id)
        )
        "#,
    ),
    (
        "team_seasons",
        r#"
        CREATE TABLE IF NOT EXISTS team_seasons (
            season_id integer NOT NULL REFERENCES seasons (id) ON DELETE CASCADE,
            team_id integer NOT NULL REFERENCES teams (id) ON DELETE CASCADE,
            points integer NOT NULL,
            rank integer NOT NULL,
            goals_scored integer NOT NULL,
            goals_conceded integer NOT NULL,
            PRIMARY KEY (season_id, team_id)
        )
        "#,
    ),
    (
        "fixtures",
        r#"
        CREATE TABLE IF NOT EXISTS fixtures (
            id integer PRIMARY KEY,
            season_id integer NOT NULL REFERENCES seasons (id) ON DELETE CASCADE,
            gameweek integer NOT NULL,
            date timestamptz NOT NULL,
            home_team_id integer NOT NULL REFERENCES teams (id),
            away_team_id integer NOT NULL REFERENCES teams (id),
            status varchar NOT NULL,
            home_goals integer NOT NULL DEFAULT 0,
            away_goals integer NOT NULL DEFAULT 0,
            CONSTRAINT unique_home_team_id_for_season_gameweek UNIQUE (season_id, gameweek, home_team_id),
            CONSTRAINT unique_away_team_id_for_season_gameweek UNIQUE (season_id, gameweek, away_team_id),
            CONSTRAINT home_team_id_dne_away_team_id CHECK (home_team_id <> away_team_id)
        )
        "#,
    ),
    (
        "players",
        r#"
        CREATE TABLE IF NOT EXISTS players (
            id integer PRIMARY KEY,
            team_id integer NOT NULL REFERENCES teams (id) ON DELETE CASCADE,
            position_code varchar NOT NULL,
            first_name varchar,
            last_name varchar,
            display_name varchar NOT NULL,
            dob date
        )
        "#,
    ),
];

/// Create any missing tables, parents before children.
pub async fn ensure_schema(pool: &PgPool) -> Result<()> {
    for (name, ddl) in TABLES {
        sqlx::query(ddl).execute(pool).await?;
        info!("Ensured table {}", name);
    }
    Ok(())
}
