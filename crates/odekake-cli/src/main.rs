use std::path::PathBuf;
use std::sync::Arc;

use chrono::Local;
use clap::{Parser, Subcommand};

use odekake_core::{FacilityTable, StaticHolidayCalendar};
use odekake_resolver::{
    check_all_facilities_closure, check_facility_closure, list_available_facilities, Resolver,
};

#[derive(Debug, Parser)]
#[command(name = "odekake")]
#[command(about = "金沢文化施設の休館情報を確認するコマンドラインツール")]
struct Cli {
    /// Path to the facility rule table.
    #[arg(long, env = "ODEKAKE_FACILITIES_PATH", default_value = "./config/facilities.yaml")]
    facilities: PathBuf,

    /// Skip page fetches and the LLM; answer from rules alone.
    #[arg(long)]
    offline: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Check one facility for one date (e.g. `check 鈴木大拙館 明日`).
    Check {
        facility: String,
        #[arg(default_value = "今日")]
        date: String,
    },
    /// Check every facility for one date.
    CheckAll {
        #[arg(default_value = "今日")]
        date: String,
    },
    /// List the facility set and its metadata.
    List,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let table = Arc::new(FacilityTable::load(&cli.facilities)?);
    tracing::info!(
        facilities = table.len(),
        path = %cli.facilities.display(),
        offline = cli.offline,
        "loaded facility table"
    );
    let holidays = Arc::new(StaticHolidayCalendar::japan_2025());

    let resolver = if cli.offline {
        Resolver::offline(table, holidays)
    } else {
        let config = odekake_core::load_app_config_from_env()?;
        Resolver::from_config(&config, table, holidays)?
    };

    let today = Local::now().date_naive();
    let output = match cli.command {
        Commands::Check { facility, date } => {
            check_facility_closure(&resolver, &facility, &date, today).await
        }
        Commands::CheckAll { date } => {
            check_all_facilities_closure(&resolver, &date, today).await
        }
        Commands::List => list_available_facilities(resolver.table()),
    };
    println!("{output}");

    Ok(())
}
