use anyhow::Result;
use bay_housing_sync::config::{self, HttpSettings, NotionSettings, SearchProfile, DEFAULT_SNAPSHOT_PATH};
use bay_housing_sync::notion::NotionClient;
use bay_housing_sync::runner::{self, NotionTarget, RunOptions};
use bay_housing_sync::scrapers;
use bay_housing_sync::snapshot::SnapshotStore;
use bay_housing_sync::telemetry;
use clap::Parser;
use std::path::PathBuf;
use tracing::{debug, info};

#[derive(Debug, Parser)]
#[command(name = "bay-housing-sync", version)]
#[command(about = "Scrape Bay Area rental portals and sync the shortlist to Notion")]
struct Cli {
    /// Keep at most this many listings after ranking (0 = no limit)
    #[arg(long, default_value_t = 150)]
    max_items: usize,

    /// Fetch and write the snapshot, but skip Notion
    #[arg(long)]
    no_notion: bool,

    #[arg(long, env = "NOTION_DATABASE_ID")]
    notion_db_id: Option<String>,

    #[arg(long, env = "BAY_HOUSING_SNAPSHOT", default_value = DEFAULT_SNAPSHOT_PATH)]
    snapshot: PathBuf,

    /// JSON file with requirements and search sources
    #[arg(long)]
    sources: Option<PathBuf>,

    /// Archive Notion pages whose listing disappeared upstream
    #[arg(long)]
    archive_removed: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let dotenv = config::load_dotenv();
    let cli = Cli::parse();
    telemetry::init();
    if let Some(path) = dotenv {
        debug!("Loaded environment from {}", path.display());
    }

    info!("🏡 Bay Housing Sync");

    let profile = SearchProfile::load(cli.sources.as_deref())?;
    let notion = if cli.no_notion {
        None
    } else {
        let settings =
            NotionSettings::resolve(std::env::var("NOTION_API_TOKEN").ok(), cli.notion_db_id.clone())?;
        let client = NotionClient::new(&settings.token)?;
        Some((client, settings.database_id))
    };

    let sources = scrapers::build_sources(&profile, &HttpSettings::from_env())?;
    let store = SnapshotStore::new(&cli.snapshot);
    let opts = RunOptions {
        max_items: cli.max_items,
        archive_removed: cli.archive_removed,
    };
    let target = notion.as_ref().map(|(client, database_id)| NotionTarget {
        api: client,
        database_id: database_id.as_str(),
    });

    let summary = runner::run(&sources, &profile, &store, target, &opts).await?;

    println!("Raw candidates:   {}", summary.count_raw);
    println!("Unique listings:  {}", summary.count_deduped);
    println!(
        "Quality gate:     {} passed, {} rejected",
        summary.count_quality_pass, summary.count_quality_fail
    );
    println!(
        "Changes:          {} added, {} changed, {} removed",
        summary.diff.added.len(),
        summary.diff.changed.len(),
        summary.diff.removed.len()
    );
    if summary.fetch_errors > 0 {
        println!("Fetch errors:     {}", summary.fetch_errors);
    }
    if let Some(sync) = &summary.sync {
        println!(
            "Notion:           {} created, {} updated, {} unchanged, {} archived, {} failed",
            sync.created, sync.updated, sync.unchanged, sync.archived, sync.failed
        );
    }
    println!("Snapshot:         {}", store.path().display());

    Ok(())
}
