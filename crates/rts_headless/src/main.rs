//! Headless RTS AI match runner.
//!
//! Runs the decision engine against itself without graphics. Logs go to
//! stderr; `run --output` and `batch` write JSON results to disk.
//!
//! # Usage
//!
//! ```bash
//! # Play a single match
//! cargo run -p rts_headless -- run --seed 7 --enemy horde --minutes 15
//!
//! # Run a batch of matches in parallel
//! cargo run -p rts_headless -- batch --count 500 --output results/
//!
//! # Verify determinism
//! cargo run -p rts_headless -- verify --seed 12345 --runs 5
//!
//! # List or export strategy profiles
//! cargo run -p rts_headless -- profiles --race kingdom --export kingdom.ron
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use rts_ai::config::EngineConfig;
use rts_ai::factions::{Race, Team};
use rts_ai::strategy::{StrategyLibrary, StrategyProfile};
use rts_headless::{
    batch::{run_batch, verify_determinism, BatchConfig},
    error::{HeadlessError, Result},
    metrics::team_key,
    runner::{load_library, run_match, MatchConfig, SideConfig},
};

#[derive(Parser)]
#[command(name = "rts_headless")]
#[command(about = "Headless match runner for the RTS AI engine")]
#[command(version)]
struct Cli {
    /// Enable verbose logging to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum RaceArg {
    Kingdom,
    Horde,
}

impl From<RaceArg> for Race {
    fn from(arg: RaceArg) -> Self {
        match arg {
            RaceArg::Kingdom => Race::Kingdom,
            RaceArg::Horde => Race::Horde,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Play a single match
    Run {
        /// Match seed
        #[arg(long, default_value = "0")]
        seed: u64,

        /// Race of the auto-pilot side
        #[arg(long, value_enum, default_value = "kingdom")]
        player: RaceArg,

        /// Race of the bot side
        #[arg(long, value_enum, default_value = "horde")]
        enemy: RaceArg,

        /// Force the auto-pilot's opening strategy
        #[arg(long)]
        player_strategy: Option<String>,

        /// Force the bot's opening strategy
        #[arg(long)]
        enemy_strategy: Option<String>,

        /// Maximum match length in minutes (game time)
        #[arg(long, default_value = "15")]
        minutes: u32,

        /// Directory of strategy profile RON files (built-ins when unset)
        #[arg(long)]
        strategies: Option<PathBuf>,

        /// Engine tuning RON file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Write match metrics as JSON
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Run a batch of matches in parallel
    Batch {
        /// Number of matches to run
        #[arg(short, long, default_value = "100")]
        count: u32,

        /// Maximum parallel matches (0 = auto)
        #[arg(short, long, default_value = "0")]
        parallel: u32,

        /// Output directory for results
        #[arg(short, long, default_value = "results")]
        output: PathBuf,

        /// Starting seed
        #[arg(long, default_value = "0")]
        seed: u64,

        /// Maximum match length in minutes (game time)
        #[arg(long, default_value = "15")]
        minutes: u32,

        /// Directory of strategy profile RON files (built-ins when unset)
        #[arg(long)]
        strategies: Option<PathBuf>,
    },

    /// Verify determinism by running the same seed multiple times
    Verify {
        /// Seed to verify
        #[arg(long, default_value = "12345")]
        seed: u64,

        /// Number of verification runs
        #[arg(short, long, default_value = "5")]
        runs: u32,
    },

    /// List strategy profiles
    Profiles {
        /// Only show one race
        #[arg(long, value_enum)]
        race: Option<RaceArg>,

        /// Directory of strategy profile RON files (built-ins when unset)
        #[arg(long)]
        strategies: Option<PathBuf>,

        /// Write the listed profiles to a RON file
        #[arg(long)]
        export: Option<PathBuf>,
    },
}

fn main() {
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(true),
        )
        .with(tracing_subscriber::filter::LevelFilter::from_level(
            log_level,
        ))
        .init();

    let outcome = match cli.command {
        Commands::Run {
            seed,
            player,
            enemy,
            player_strategy,
            enemy_strategy,
            minutes,
            strategies,
            config,
            output,
        } => {
            let match_config = MatchConfig {
                max_seconds: minutes.saturating_mul(60),
                player: SideConfig {
                    race: player.into(),
                    strategy: player_strategy,
                },
                enemy: SideConfig {
                    race: enemy.into(),
                    strategy: enemy_strategy,
                },
                ..MatchConfig::new(seed)
            };
            cmd_run(
                match_config,
                strategies.as_deref(),
                config.as_deref(),
                output.as_deref(),
            )
        }
        Commands::Batch {
            count,
            parallel,
            output,
            seed,
            minutes,
            strategies,
        } => cmd_batch(count, parallel, output, seed, minutes, strategies.as_deref()),
        Commands::Verify { seed, runs } => cmd_verify(seed, runs),
        Commands::Profiles {
            race,
            strategies,
            export,
        } => cmd_profiles(race.map(Race::from), strategies.as_deref(), export.as_deref()),
    };

    if let Err(e) = outcome {
        tracing::error!(error = %e, "Command failed");
        eprintln!("FATAL: {e}");
        std::process::exit(1);
    }
}

/// Play a single match
fn cmd_run(
    mut config: MatchConfig,
    strategies: Option<&Path>,
    engine: Option<&Path>,
    output: Option<&Path>,
) -> Result<()> {
    let library = Arc::new(load_library(strategies)?);
    if let Some(path) = engine {
        config.engine = EngineConfig::load(path)?;
    }
    tracing::info!(
        seed = config.seed,
        player = ?config.player.race,
        enemy = ?config.enemy.race,
        max_seconds = config.max_seconds,
        "Starting match"
    );

    let start = Instant::now();
    let result = run_match(config, library)?;
    let metrics = &result.metrics;

    eprintln!("\n{}", "=".repeat(50));
    eprintln!("MATCH COMPLETE");
    eprintln!("{}", "=".repeat(50));
    eprintln!(
        "Winner: {} ({})",
        metrics.winner.as_deref().unwrap_or("none"),
        metrics.win_condition
    );
    eprintln!(
        "Game time: {:.0}s in {} ticks ({:.2}s wall clock)",
        metrics.duration_seconds,
        metrics.ticks,
        start.elapsed().as_secs_f64()
    );
    for team in [Team::Player, Team::Enemy] {
        if let Some(stats) = metrics.team(team) {
            eprintln!("\n{}:", team_key(team));
            eprintln!(
                "  Strategy: {} -> {} ({} switches)",
                stats.opening_strategy.as_deref().unwrap_or("-"),
                stats.final_strategy.as_deref().unwrap_or("-"),
                stats.strategy_switches
            );
            eprintln!(
                "  Mined: {} gold, {} lumber",
                stats.gold_mined, stats.lumber_mined
            );
            eprintln!(
                "  Units: {} bought, {} lost",
                stats.total_units_purchased(),
                stats.total_units_lost()
            );
            eprintln!(
                "  Waves: {} launched, {} stalled",
                stats.waves_launched, stats.stalled_waves
            );
        }
    }
    eprintln!("\nFinal state hash: {:016x}", result.final_state_hash);

    if let Some(path) = output {
        let json = serde_json::to_string_pretty(metrics)?;
        std::fs::write(path, json).map_err(|e| HeadlessError::io(path, e))?;
        eprintln!("Metrics saved to: {}", path.display());
    }
    Ok(())
}

/// Run a batch of matches
fn cmd_batch(
    count: u32,
    parallel: u32,
    output: PathBuf,
    seed: u64,
    minutes: u32,
    strategies: Option<&Path>,
) -> Result<()> {
    let library = Arc::new(load_library(strategies)?);
    let num_cpus = std::thread::available_parallelism()
        .map(|p| p.get())
        .unwrap_or(1);

    tracing::info!(
        count = count,
        parallel = parallel,
        seed = seed,
        output = %output.display(),
        cpus_available = num_cpus,
        profiles = library.len(),
        minutes = minutes,
        "Batch configuration"
    );

    std::fs::create_dir_all(&output).map_err(|e| HeadlessError::io(&output, e))?;

    let template = MatchConfig {
        max_seconds: minutes.saturating_mul(60),
        ..MatchConfig::default()
    };
    let config = BatchConfig {
        parallel_games: parallel,
        ..BatchConfig::new(count)
            .with_output(output.clone())
            .with_seed(seed)
            .with_template(template)
    };

    let results = run_batch(config, library);

    let results_path = output.join("batch_results.json");
    results.save(&results_path)?;

    let summary = &results.summary;
    eprintln!("\n{}", "=".repeat(50));
    eprintln!("BATCH COMPLETE");
    eprintln!("{}", "=".repeat(50));
    eprintln!("Matches played: {}", results.games.len());
    if !results.errors.is_empty() {
        eprintln!("Matches FAILED: {}", results.errors.len());
    }
    eprintln!("Duration: {:.1}s", results.duration_seconds);
    eprintln!(
        "Match length: avg {:.0}s, min {:.0}s, max {:.0}s",
        summary.avg_duration_seconds, summary.min_duration_seconds, summary.max_duration_seconds
    );
    eprintln!("\nWin Rates:");
    for (team, rate) in &summary.win_rates {
        eprintln!("  {}: {:.1}%", team, rate * 100.0);
    }
    eprintln!("  draws: {}", summary.draws);

    if !summary.wins_by_strategy.is_empty() {
        let mut by_strategy: Vec<_> = summary.wins_by_strategy.iter().collect();
        by_strategy.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
        eprintln!("\nWins by opening strategy:");
        for (name, wins) in by_strategy {
            eprintln!("  {name}: {wins}");
        }
    }

    if !results.errors.is_empty() {
        eprintln!("\nMATCH FAILURES:");
        for error in results.errors.iter().take(10) {
            eprintln!(
                "  Match {} (seed {}): {}",
                error.game_index, error.seed, error.message
            );
        }
        if results.errors.len() > 10 {
            eprintln!("  ... and {} more failures", results.errors.len() - 10);
        }
    }

    eprintln!("\nResults saved to: {}", results_path.display());
    Ok(())
}

/// Verify determinism
fn cmd_verify(seed: u64, runs: u32) -> Result<()> {
    tracing::info!("Verifying determinism: seed {} ({} runs)", seed, runs);

    let library = Arc::new(StrategyLibrary::builtin());
    let report = verify_determinism(&MatchConfig::new(seed), &library, runs)?;

    if report.is_deterministic() {
        eprintln!("PASS: All {runs} runs produced identical results");
        if let Some(hash) = report.hashes.first() {
            eprintln!("  State hash: {hash:016x}");
        }
        Ok(())
    } else {
        eprintln!("FAIL: Non-determinism detected!");
        for (i, hash) in report.hashes.iter().enumerate() {
            eprintln!("  Run {i}: {hash:016x}");
        }
        std::process::exit(1);
    }
}

/// List or export strategy profiles
fn cmd_profiles(race: Option<Race>, strategies: Option<&Path>, export: Option<&Path>) -> Result<()> {
    let library = load_library(strategies)?;
    let profiles: Vec<&StrategyProfile> = library
        .profiles()
        .iter()
        .filter(|p| race.map_or(true, |r| p.race == r))
        .collect();

    for profile in &profiles {
        println!(
            "{:<24} {:<8} pool={:<5} waves={} fallback={}",
            profile.name,
            format!("{:?}", profile.race),
            profile.in_pool,
            profile.waves.len(),
            profile.fallback.as_deref().unwrap_or("-")
        );
    }

    if let Some(path) = export {
        let ron = ron::ser::to_string_pretty(&profiles, ron::ser::PrettyConfig::default())?;
        std::fs::write(path, ron).map_err(|e| HeadlessError::io(path, e))?;
        eprintln!("Exported {} profiles to: {}", profiles.len(), path.display());
    }
    Ok(())
}
