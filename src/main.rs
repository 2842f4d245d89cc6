//! Football match prediction CLI
//!
//! Imports per-team match logs, then trains and compares outcome classifiers.

use clap::{Parser, Subcommand};
use football::{Config, LabelMode, Result};

#[derive(Parser)]
#[command(name = "football")]
#[command(about = "Football match outcome prediction from rolling team statistics", long_about = None)]
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
    /// Show a team's record from the database
    Team {
        /// Team name (case-insensitive)
        name: String,
    },
    /// Train one model and report its test metrics
    Train {
        /// Predict win vs not-win instead of win/draw/loss
        #[arg(long)]
        binary: bool,
        /// Model name from the config (defaults to training.model)
        #[arg(long)]
        model: Option<String>,
        /// Output format
        #[arg(long, default_value = "table")]
        format: OutputFormat,
    },
    /// Train every configured model and rank them
    Compare {
        /// Predict win vs not-win instead of win/draw/loss
        #[arg(long)]
        binary: bool,
        /// Output format
        #[arg(long, default_value = "table")]
        format: OutputFormat,
    },
    /// Initialize a new project with default config
    Init,
}

#[derive(Subcommand)]
enum DataCommands {
    /// Import match logs from a CSV file
    Import {
        /// CSV file with one row per team per match
        file: String,
    },
    /// Show database status
    Status,
}

#[derive(Clone, Debug)]
enum OutputFormat {
    Table,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "table" => Ok(OutputFormat::Table),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("Unknown format: {}. Use table or json.", s)),
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
        Commands::Team { name } => commands::team(&config, &name),
        Commands::Train {
            binary,
            model,
            format,
        } => commands::train(&config, LabelMode::from_binary_flag(binary), model, format),
        Commands::Compare { binary, format } => {
            commands::compare(&config, LabelMode::from_binary_flag(binary), format)
        }
        Commands::Init => commands::init(&cli.config),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

mod commands {
    use super::*;
    use football::data::import::read_matches_csv;
    use football::data::Database;
    use football::features::TeamStatisticsComputer;
    use football::report;
    use football::training::{ModelRegistry, Pipeline};
    use football::PredictorError;

    pub fn init(config_path: &str) -> Result<()> {
        let config = Config::default();
        config.save(config_path)?;
        println!("Created default config at {}", config_path);

        std::fs::create_dir_all("data")?;
        println!("Created data/ directory");

        println!("\nNext steps:");
        println!("  1. Edit {} to customize settings", config_path);
        println!("  2. Run 'football data import matches.csv' to load match logs");
        println!("  3. Run 'football compare' to rank the models");
        println!("  4. Run 'football train' to train the configured model");

        Ok(())
    }

    pub fn data_import(config: &Config, file: &str) -> Result<()> {
        let mut db = Database::open(&config.data.database_path)?;

        println!("Reading {}...", file);
        let records = read_matches_csv(file)?;
        if records.is_empty() {
            println!("No rows found in {}", file);
            return Ok(());
        }

        let count = db.upsert_matches(&records)?;
        println!("Stored {} match records in database", count);
        Ok(())
    }

    pub fn data_status(config: &Config) -> Result<()> {
        let db = Database::open(&config.data.database_path)?;
        let stats = db.get_stats()?;

        println!("Database Status");
        println!("───────────────────────────────");
        println!("  Path:     {}", config.data.database_path);
        println!("  Teams:    {}", stats.team_count);
        println!("  Matches:  {}", stats.match_count);
        if let (Some(earliest), Some(latest)) = (stats.earliest_match, stats.latest_match) {
            println!("  Range:    {} to {}", earliest, latest);
        }

        Ok(())
    }

    pub fn team(config: &Config, name: &str) -> Result<()> {
        let db = Database::open(&config.data.database_path)?;
        let matches = db.get_team_matches(name)?;
        let team_name = matches
            .first()
            .map(|m| m.team.clone())
            .unwrap_or_else(|| name.to_string());

        let mut computer = TeamStatisticsComputer::new();
        computer.process_matches(&matches);
        let stats = computer
            .get(&team_name)
            .ok_or_else(|| PredictorError::UnknownTeam(name.to_string()))?;

        print!("{}", report::format_team(&team_name, stats));
        Ok(())
    }

    pub fn train(
        config: &Config,
        mode: LabelMode,
        model: Option<String>,
        format: OutputFormat,
    ) -> Result<()> {
        let db = Database::open(&config.data.database_path)?;
        let records = db.get_all_matches()?;

        let pipeline = Pipeline::new(config.clone());
        let registry = ModelRegistry::from_specs(&config.models);
        let model_name = model.unwrap_or_else(|| config.training.model.clone());

        println!("Training {} ({})...", model_name, mode.describe());
        let result = pipeline.train_with(&records, mode, &registry, &model_name)?;

        match format {
            OutputFormat::Table => print!("{}", report::format_training(&result)),
            OutputFormat::Json => println!("{}", report::training_json(&result)?),
        }
        Ok(())
    }

    pub fn compare(config: &Config, mode: LabelMode, format: OutputFormat) -> Result<()> {
        let db = Database::open(&config.data.database_path)?;
        let records = db.get_all_matches()?;

        let pipeline = Pipeline::new(config.clone());
        let result = pipeline.compare_models(&records, mode)?;

        match format {
            OutputFormat::Table => print!("{}", report::format_comparison(&result)),
            OutputFormat::Json => println!("{}", report::comparison_json(&result)?),
        }
        Ok(())
    }
}
