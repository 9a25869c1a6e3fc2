use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use bracket_engine::config::EngineConfig;
use bracket_engine::models::{
    MatchId, MatchSide, ResultUpdate, SeedingMethod, StageFormat, StageId, Team,
};
use bracket_engine::seeding::generate_seeding_order;
use bracket_engine::storage::JsonlStore;
use bracket_engine::BracketEngine;

#[derive(Parser)]
#[command(name = "bracket-engine")]
#[command(about = "Tournament brackets: seeding, elimination, GSL, round robin and Swiss")]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(long, default_value = "./config.toml")]
    config: String,

    /// Data directory path (overrides the config file)
    #[arg(long)]
    data_dir: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the bracket position order for a bracket size
    SeedOrder {
        /// Bracket size (rounded up to a power of two)
        size: usize,
    },

    /// Seed teams and build a stage's bracket
    Generate {
        /// Stage id
        stage: String,

        /// single_elim, double_elim, gsl, round_robin or swiss
        #[arg(long)]
        format: StageFormat,

        /// JSON file holding an array of teams
        #[arg(long)]
        teams: PathBuf,

        /// Match length (odd)
        #[arg(long)]
        best_of: Option<u32>,

        /// rating, random, manual, balanced or regional
        #[arg(long)]
        seeding: Option<SeedingMethod>,

        /// Fixed RNG seed for random seeding and pairing
        #[arg(long)]
        rng_seed: Option<u64>,

        /// Single elimination: play a third place match
        #[arg(long)]
        third_place: bool,

        /// Double elimination: no bracket reset after the grand final
        #[arg(long)]
        no_reset: bool,

        /// Round robin: add return fixtures
        #[arg(long)]
        double_round_robin: bool,

        /// Round robin: number of teams that qualify
        #[arg(long)]
        advance_count: Option<u32>,
    },

    /// Report a match score
    Report {
        match_id: String,
        team1_score: u32,
        team2_score: u32,

        /// Complete the match even below the win threshold
        #[arg(long)]
        force: bool,

        /// Winner when forcing a tied score (team1 or team2)
        #[arg(long)]
        winner: Option<MatchSide>,
    },

    /// Mark a ready match as live
    Start { match_id: String },

    /// Award a match to one side without play
    Walkover {
        match_id: String,
        /// team1 or team2
        side: MatchSide,
    },

    /// Cancel a match
    Cancel { match_id: String },

    /// Print a stage's full state
    Show { stage: String },

    /// Generate the next Swiss round
    SwissNext {
        stage: String,
        round: u32,

        /// Pair even if the previous round has unfinished matches
        #[arg(long)]
        force: bool,
    },

    /// Print Swiss progress counters
    SwissSummary { stage: String },

    /// Delete a stage's matches and zero its standings
    Reset { stage: String },

    /// Seed the top teams of a completed stage into a new stage
    Advance {
        from: String,
        to: String,

        #[arg(long)]
        format: StageFormat,

        /// Number of teams to take
        #[arg(long)]
        take: usize,
    },

    /// Print final placements
    Placements { stage: String },

    /// List stored stages
    Stages,
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn load_config(cli: &Cli) -> Result<EngineConfig> {
    let path = PathBuf::from(&cli.config);
    let mut config = if path.exists() {
        EngineConfig::from_file(&path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?
    } else {
        tracing::debug!("No config file at {}, using defaults", path.display());
        EngineConfig::default()
    };
    if let Some(dir) = &cli.data_dir {
        config.data_dir = PathBuf::from(dir);
    }
    Ok(config)
}

fn read_teams(path: &PathBuf) -> Result<Vec<Team>> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read teams file {}", path.display()))?;
    serde_json::from_str(&contents)
        .with_context(|| format!("Failed to parse teams file {}", path.display()))
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(cli.json_logs.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!cli.json_logs).then(tracing_subscriber::fmt::layer))
        .init();

    let config = load_config(&cli)?;
    tracing::debug!("Using data directory {}", config.data_dir.display());

    let store = Arc::new(JsonlStore::open(config.data_dir.clone()));
    let engine = BracketEngine::with_config(store, config);

    match cli.command {
        Commands::SeedOrder { size } => {
            let size = bracket_engine::seeding::bracket_size(size);
            print_json(&generate_seeding_order(size))?;
        }

        Commands::Generate {
            stage,
            format,
            teams,
            best_of,
            seeding,
            rng_seed,
            third_place,
            no_reset,
            double_round_robin,
            advance_count,
        } => {
            let teams = read_teams(&teams)?;
            let mut settings = engine.config().stage_settings();
            if let Some(best_of) = best_of {
                settings.best_of = best_of;
            }
            if let Some(method) = seeding {
                settings.seeding = method;
            }
            settings.rng_seed = rng_seed;
            settings.third_place_match |= third_place;
            settings.bracket_reset &= !no_reset;
            settings.double_round_robin = double_round_robin;
            settings.advance_count = advance_count;

            let view = engine.generate_bracket(
                &StageId::from(stage),
                format,
                &teams,
                Some(settings),
            )?;
            print_json(&view)?;
        }

        Commands::Report {
            match_id,
            team1_score,
            team2_score,
            force,
            winner,
        } => {
            let mut update = ResultUpdate::scores(team1_score, team2_score);
            if force {
                update = update.forced();
            }
            if let Some(side) = winner {
                update = update.with_winner(side);
            }
            let result = engine.update_match_result(&MatchId::from(match_id), update)?;
            print_json(&result)?;
        }

        Commands::Start { match_id } => {
            print_json(&engine.start_match(&MatchId::from(match_id))?)?;
        }

        Commands::Walkover { match_id, side } => {
            print_json(&engine.award_walkover(&MatchId::from(match_id), side)?)?;
        }

        Commands::Cancel { match_id } => {
            print_json(&engine.cancel_match(&MatchId::from(match_id))?)?;
        }

        Commands::Show { stage } => {
            print_json(&engine.get_bracket_state(&StageId::from(stage))?)?;
        }

        Commands::SwissNext {
            stage,
            round,
            force,
        } => {
            let round = engine.generate_next_swiss_round(&StageId::from(stage), round, force)?;
            print_json(&round)?;
        }

        Commands::SwissSummary { stage } => {
            print_json(&engine.swiss_summary(&StageId::from(stage))?)?;
        }

        Commands::Reset { stage } => {
            let stage = engine.reset_bracket(&StageId::from(stage))?;
            println!("Stage {} reset to {}", stage.id, stage.status);
        }

        Commands::Advance {
            from,
            to,
            format,
            take,
        } => {
            let view = engine.advance_stage(
                &StageId::from(from),
                &StageId::from(to),
                format,
                take,
                None,
            )?;
            print_json(&view)?;
        }

        Commands::Placements { stage } => {
            print_json(&engine.placements(&StageId::from(stage))?)?;
        }

        Commands::Stages => {
            for stage in engine.list_stages()? {
                println!(
                    "{}\t{}\t{}\tround {}",
                    stage.id, stage.format, stage.status, stage.current_round
                );
            }
        }
    }

    Ok(())
}
