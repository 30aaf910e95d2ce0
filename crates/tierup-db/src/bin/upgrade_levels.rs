//! # Level Upgrade Runner
//!
//! Runs one all-or-nothing upgrade batch over the user table.
//!
//! ## Usage
//! ```bash
//! # Upgrade users in ./tierup.db (or $TIERUP_DATABASE_PATH)
//! cargo run -p tierup-db --bin upgrade-levels
//!
//! # Specify database path, load sample users into an empty table first
//! cargo run -p tierup-db --bin upgrade-levels -- --db ./data/tierup.db --seed
//! ```
//!
//! Notices are written to the log by `LoggingNotifier`.

use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use tierup_core::{LoggingNotifier, StandardUpgradePolicy};
use tierup_db::{app, AppConfig, Database};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Parsed command line.
#[derive(Debug, Default, PartialEq, Eq)]
struct CliArgs {
    db: Option<PathBuf>,
    seed: bool,
    help: bool,
}

/// Parses the arguments after the program name. Unknown flags are ignored.
fn parse_args<I>(args: I) -> Result<CliArgs, String>
where
    I: IntoIterator<Item = String>,
{
    let mut parsed = CliArgs::default();
    let mut args = args.into_iter();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--db" | "-d" => {
                let path = args
                    .next()
                    .ok_or_else(|| format!("{arg} requires a database path"))?;
                parsed.db = Some(path.into());
            }
            "--seed" | "-s" => parsed.seed = true,
            "--help" | "-h" => parsed.help = true,
            _ => {}
        }
    }

    Ok(parsed)
}

fn print_usage() {
    println!("tierup level upgrade runner");
    println!();
    println!("Usage: upgrade-levels [OPTIONS]");
    println!();
    println!("Options:");
    println!("  -d, --db <PATH>    Database file path (default: ./tierup.db)");
    println!("  -s, --seed         Load sample users if the table is empty");
    println!("  -h, --help         Show this help message");
    println!();
    println!("Environment:");
    println!("  TIERUP_DATABASE_PATH, TIERUP_DB_MAX_CONNECTIONS,");
    println!("  TIERUP_MIN_LOGIN_FOR_SILVER, TIERUP_MIN_RECOMMEND_FOR_GOLD, TIERUP_LOG");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Parse command line arguments
    let args = parse_args(env::args().skip(1))?;
    if args.help {
        print_usage();
        return Ok(());
    }

    let mut config = AppConfig::load()?;
    if let Some(path) = args.db {
        config.database_path = path;
    }

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&config.log_filter)?)
        .with_target(true)
        .init();

    info!(
        path = %config.database_path.display(),
        min_login_for_silver = config.thresholds.min_login_for_silver,
        min_recommend_for_gold = config.thresholds.min_recommend_for_gold,
        "Configuration loaded"
    );

    let db = Database::new(config.db_config()).await?;

    let service = app::user_service(
        &db,
        Arc::new(LoggingNotifier::new()),
        Arc::new(StandardUpgradePolicy::with_thresholds(config.thresholds)),
    );

    if args.seed {
        app::seed_sample_users(&db, service.as_ref()).await?;
    }

    let result = service.upgrade_levels().await;
    db.close().await;
    let summary = result?;

    println!(
        "Examined {} user(s), upgraded {}: {}",
        summary.examined,
        summary.upgraded.len(),
        summary.upgraded.join(", ")
    );

    Ok(())
}
