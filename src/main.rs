use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::{error, info};

use fantasy_sync::config::Config;
use fantasy_sync::store::schema::ensure_schema;
use fantasy_sync::store::{PgStore, SeasonWriter};
use fantasy_sync::{ApiFootball, ApiFootballClient, Reconciler, SeasonSync};

const DB_CONNECT_RETRIES: u32 = 5;

#[derive(Parser)]
#[command(name = "fantasy-sync")]
#[command(about = "Sync API-Football data into the fantasy database", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the REST API.
    Serve,

    /// Create any missing tables.
    InitDb,

    /// Fetch a league from the provider and store it.
    AddLeague { league_id: i32 },

    /// Fetch one season of a league (by start year) and store it.
    AddSeason { league_id: i32, start_year: i32 },

    /// Delete a season together with its fixtures and team seasons.
    DeleteSeason { season_id: i32 },

    /// Delete a league's season by name, e.g. "2024/2025".
    DeleteSeasonByName { league_id: i32, name: String },

    AddTeams { season_id: i32 },

    AddFixtures { season_id: i32 },

    /// Refresh scores and statuses for one gameweek. Finished fixtures are kept.
    UpdateFixtures { season_id: i32, gameweek: i32 },

    /// Store the standings table as team seasons.
    AddStandings { season_id: i32 },

    /// Store squads for every team in the season, or one team with --team.
    AddPlayers {
        season_id: i32,
        #[arg(long)]
        team: Option<i32>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("fantasy_sync=info".parse()?),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;
    info!("Loaded configuration: {:?}", config);

    let store = PgStore::connect_with_retry(&config.database_url, DB_CONNECT_RETRIES).await?;

    if let Err(e) = run(cli.command, &config, store).await {
        error!("Command failed: {:?}", e);
        return Err(e);
    }
    Ok(())
}

async fn run(command: Commands, config: &Config, store: PgStore) -> Result<()> {
    match command {
        Commands::Serve => return serve(config, store).await,
        Commands::InitDb => {
            ensure_schema(store.pool()).await?;
            return Ok(());
        }
        Commands::DeleteSeason { season_id } => {
            let deleted = store.delete_season(season_id).await?;
            info!("Deleted {} season(s) with id={}", deleted, season_id);
            return Ok(());
        }
        Commands::DeleteSeasonByName { league_id, name } => {
            let deleted = store.delete_season_by_name(league_id, &name).await?;
            info!(
                "Deleted {} season(s) named {} for league_id={}",
                deleted, name, league_id
            );
            return Ok(());
        }
        _ => {}
    }

    let client = ApiFootballClient::new(
        config.api_key()?.to_string(),
        config.api_base_url.clone(),
        config.request_limits(),
    )?;
    let sync = SeasonSync::new(store, ApiFootball::new(client))
        .with_reconciler(Reconciler::new(config.call_timeout))
        .with_fan_out(config.max_in_flight);

    match command {
        Commands::AddLeague { league_id } => {
            let count = sync.add_league(league_id).await?;
            info!("add-league: {} inserted", count);
        }
        Commands::AddSeason { league_id, start_year } => match sync.add_season(league_id, start_year).await? {
            Some(season) => info!("add-season: created {} with id={}", season.name, season.id),
            None => info!("add-season: nothing to do"),
        },
        Commands::AddTeams { season_id } => {
            let count = sync.add_teams_for_season(season_id).await?;
            info!("add-teams: {} inserted", count);
        }
        Commands::AddFixtures { season_id } => {
            let count = sync.add_fixtures_for_season(season_id).await?;
            info!("add-fixtures: {} inserted", count);
        }
        Commands::UpdateFixtures { season_id, gameweek } => {
            let count = sync
                .update_fixtures_from_season_gameweek(season_id, gameweek)
                .await?;
            info!("update-fixtures: {} updated", count);
        }
        Commands::AddStandings { season_id } => {
            let count = sync.add_team_seasons_for_season(season_id).await?;
            info!("add-standings: {} inserted", count);
        }
        Commands::AddPlayers { season_id, team } => {
            let count = match team {
                Some(team_id) => sync.add_players_for_team_season(team_id, season_id).await?,
                None => sync.add_all_players_for_season(season_id).await?,
            };
            info!("add-players: {} inserted", count);
        }
        Commands::Serve
        | Commands::InitDb
        | Commands::DeleteSeason { .. }
        | Commands::DeleteSeasonByName { .. } => {}
    }
    Ok(())
}

async fn serve(config: &Config, store: PgStore) -> Result<()> {
    ensure_schema(store.pool()).await?;

    let app = fantasy_sync::http::router(Arc::new(store));
    let addr = format!("0.0.0.0:{}", config.http_port);
    info!("API listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            info!("Shutting down...");
        })
        .await?;
    Ok(())
}
