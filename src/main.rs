//! Strikeout feature pipeline CLI
//!
//! Imports pitch-by-pitch event exports, builds leakage-safe per-game pitcher
//! features and keeps them up to date.

use clap::{Parser, Subcommand};
use strikeout::{Config, Result};

#[derive(Parser)]
#[command(name = "strikeout")]
#[command(about = "Per-pitcher strikeout feature engineering", long_about = None)]
struct Cli {
    /// Config file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Data management commands
    Data {
        #[command(subcommand)]
        action: DataCommands,
    },
    /// Build the feature table for a roster
    Build {
        /// Roster CSV with name,id columns
        #[arg(long)]
        roster: String,
        /// First game date (YYYY-MM-DD), defaults to the earliest stored event
        #[arg(long)]
        start: Option<String>,
        /// Last game date (YYYY-MM-DD), defaults to the latest stored event
        #[arg(long)]
        end: Option<String>,
        /// Output CSV, defaults to data.output_path
        #[arg(long)]
        output: Option<String>,
    },
    /// Add feature rows for games newer than the stored table
    Update {
        /// Roster CSV with name,id columns
        #[arg(long)]
        roster: String,
    },
    /// Show (and optionally save) park strikeout factors
    ParkFactors {
        /// Save as Team_abbr,K_park_factor CSV
        #[arg(long)]
        output: Option<String>,
    },
    /// Show one pitcher's per-game whiff and called-strike numbers
    Games {
        /// Pitcher id
        #[arg(long)]
        pitcher: i64,
        /// Output format
        #[arg(long, default_value = "table")]
        format: OutputFormat,
    },
    /// Initialize a new project with default config
    Init,
}

#[derive(Subcommand)]
enum DataCommands {
    /// Import a pitch-event CSV export
    Import {
        /// CSV file
        file: String,
    },
    /// Show database status
    Status,
}

#[derive(Clone, Debug)]
enum OutputFormat {
    Table,
    Json,
    Csv,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "table" => Ok(OutputFormat::Table),
            "json" => Ok(OutputFormat::Json),
            "csv" => Ok(OutputFormat::Csv),
            _ => Err(format!("Unknown format: {}. Use table, json, or csv.", s)),
        }
    }
}

fn main() {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    // Load or create config
    let config = if std::path::Path::new(&cli.config).exists() {
        match Config::load(&cli.config) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("Error loading config: {}", e);
                std::process::exit(1);
            }
        }
    } else {
        Config::default()
    };

    let result = match cli.command {
        Commands::Data { action } => match action {
            DataCommands::Import { file } => commands::data_import(&config, &file),
            DataCommands::Status => commands::data_status(&config),
        },
        Commands::Build {
            roster,
            start,
            end,
            output,
        } => commands::build(&config, &roster, start, end, output),
        Commands::Update { roster } => commands::update(&config, &roster),
        Commands::ParkFactors { output } => commands::park_factors(&config, output),
        Commands::Games { pitcher, format } => commands::games(&config, pitcher, format),
        Commands::Init => commands::init(&cli.config),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

mod commands {
    use super::*;
    use strikeout::data::{loader, Database};
    use strikeout::features::games::GameAggregator;
    use strikeout::features::park::build_park_factors;
    use strikeout::features::{build_feature_table, TeamNormalizer};
    use strikeout::{parse_date, DateWindow, PitcherId, StrikeoutError};

    pub fn init(config_path: &str) -> Result<()> {
        let config = Config::default();
        config.save(config_path)?;
        println!("Created default config at {}", config_path);

        std::fs::create_dir_all("data/raw")?;
        std::fs::create_dir_all("data/processed")?;
        println!("Created data/raw and data/processed directories");

        println!("\nNext steps:");
        println!("  1. Edit {} to customize settings", config_path);
        println!("  2. Run 'strikeout data import <events.csv>' to load pitch events");
        println!("  3. Run 'strikeout build --roster <roster.csv>' to build features");

        Ok(())
    }

    pub fn data_import(config: &Config, file: &str) -> Result<()> {
        let mut db = Database::open(&config.data.database_path)?;

        let events = loader::read_pitch_events(file)?;
        if events.is_empty() {
            println!("No pitch events found in {}", file);
            return Ok(());
        }

        let teams = TeamNormalizer::from_config(&config.teams);
        teams.warn_unknown(&events);

        let count = db.replace_pitch_events(&events)?;
        println!("Stored {} pitch events in database", count);
        Ok(())
    }

    pub fn data_status(config: &Config) -> Result<()> {
        let db = Database::open(&config.data.database_path)?;
        let stats = db.get_stats()?;

        println!("Database Status");
        println!("───────────────────────────────");
        println!("  Path:      {}", config.data.database_path);
        println!("  Events:    {}", stats.event_count);
        println!("  Pitchers:  {}", stats.pitcher_count);
        println!("  Features:  {}", stats.game_record_count);
        if let Some(range) = stats.event_range {
            println!("  Range:     {}", range);
        }
        if let Some(latest) = stats.latest_game {
            println!("  Latest:    {}", latest);
        }

        Ok(())
    }

    /// Stored event window narrowed by optional CLI bounds
    fn resolve_window(
        db: &Database,
        start: Option<String>,
        end: Option<String>,
    ) -> Result<DateWindow> {
        let stored = db.event_date_range()?.ok_or_else(|| {
            StrikeoutError::Config("No pitch events in database; run 'data import' first".to_string())
        })?;
        let start = match start {
            Some(s) => parse_date(&s)?,
            None => stored.start(),
        };
        let end = match end {
            Some(s) => parse_date(&s)?,
            None => stored.end(),
        };
        DateWindow::new(start, end)
    }

    pub fn build(
        config: &Config,
        roster: &str,
        start: Option<String>,
        end: Option<String>,
        output: Option<String>,
    ) -> Result<()> {
        let mut db = Database::open(&config.data.database_path)?;
        let window = resolve_window(&db, start, end)?;
        let roster = loader::read_roster(roster)?;
        let teams = TeamNormalizer::from_config(&config.teams);

        println!("Building features for {} pitchers, {}", roster.len(), window);
        let events = db.get_pitch_events(Some(window))?;
        let records = build_feature_table(config, &teams, &roster, &events, Some(window))?;

        let output = output.unwrap_or_else(|| config.data.output_path.clone());
        loader::write_feature_table(&output, &records)?;
        db.upsert_game_records(&records)?;

        let misses = records.iter().filter(|r| r.has_join_miss()).count();
        println!("Wrote {} feature rows to {}", records.len(), output);
        if misses > 0 {
            println!("  {} rows have a missing opponent rate or park factor", misses);
        }
        Ok(())
    }

    pub fn update(config: &Config, roster: &str) -> Result<()> {
        let mut db = Database::open(&config.data.database_path)?;
        let window = resolve_window(&db, None, None)?;
        let roster = loader::read_roster(roster)?;
        let teams = TeamNormalizer::from_config(&config.teams);

        // Rebuild over the full history so rolling windows see earlier games
        let events = db.get_pitch_events(Some(window))?;
        let records = build_feature_table(config, &teams, &roster, &events, Some(window))?;

        let latest = db.latest_game_date()?;
        let fresh: Vec<_> = records
            .into_iter()
            .filter(|r| latest.map_or(true, |d| r.game_date >= d))
            .collect();

        if fresh.is_empty() {
            println!("Feature table is up to date");
            return Ok(());
        }

        db.upsert_game_records(&fresh)?;
        let all = db.get_game_records(None)?;
        loader::write_feature_table(&config.data.output_path, &all)?;
        println!(
            "Added {} feature rows; {} rows written to {}",
            fresh.len(),
            all.len(),
            config.data.output_path
        );
        Ok(())
    }

    pub fn park_factors(config: &Config, output: Option<String>) -> Result<()> {
        let db = Database::open(&config.data.database_path)?;
        let teams = TeamNormalizer::from_config(&config.teams);

        let window = db.event_date_range()?;
        let events = db.get_pitch_events(window)?;
        let factors = build_park_factors(&config.park, &events, window, &teams)?;

        println!("{:<6} {:>8}", "Team", "K factor");
        for row in factors.to_rows() {
            println!("{:<6} {:>8.3}", row.team, row.k_park_factor);
        }

        if let Some(path) = output {
            loader::write_park_factors(&path, &factors)?;
            println!("\nSaved {} park factors to {}", factors.len(), path);
        }
        Ok(())
    }

    pub fn games(config: &Config, pitcher: i64, format: OutputFormat) -> Result<()> {
        let db = Database::open(&config.data.database_path)?;
        let teams = TeamNormalizer::from_config(&config.teams);
        let pitcher = PitcherId(pitcher);

        let events: Vec<_> = db
            .get_pitch_events(None)?
            .into_iter()
            .filter(|e| e.pitcher == pitcher)
            .collect();
        if events.is_empty() {
            return Err(StrikeoutError::UnknownPitcher(pitcher));
        }

        let games = GameAggregator::new(&teams, config.aggregation.clone()).aggregate_by_date(&events);

        match format {
            OutputFormat::Table => {
                println!(
                    "{:<10}  {:<3} {:<3} {:>3} {:>2} {:>6} {:>6} {:>6} {:>6}",
                    "Date", "Tm", "Opp", "P", "K", "Whiff", "CSW", "Whf*", "CSW*"
                );
                for g in &games {
                    println!(
                        "{:<10}  {:<3} {:<3} {:>3} {:>2} {:>6.3} {:>6.3} {:>6.3} {:>6.3}",
                        g.game_date,
                        g.pitcher_team,
                        g.opponent_team,
                        g.pitch_count,
                        g.strikeouts,
                        g.whiff_rate,
                        g.csw_pct,
                        g.whiff_rate_expanding,
                        g.csw_pct_expanding
                    );
                }
                println!("\n* career to date, prior games only");
            }
            OutputFormat::Json => {
                let json = serde_json::to_string_pretty(&games)
                    .map_err(|e| StrikeoutError::Parse(e.to_string()))?;
                println!("{}", json);
            }
            OutputFormat::Csv => {
                let mut writer = csv::Writer::from_writer(std::io::stdout());
                for g in &games {
                    writer.serialize(g)?;
                }
                writer.flush()?;
            }
        }

        Ok(())
    }
}
