use anyhow::Result;
use bay_housing_sync::config::{self, NotionSettings};
use bay_housing_sync::notion::{NotionCleanup, NotionClient};
use bay_housing_sync::telemetry;
use clap::Parser;
use tracing::{debug, info};

#[derive(Debug, Parser)]
#[command(name = "notion-cleanup", version)]
#[command(about = "Fold legacy URL / Listing ID / Source columns into the consolidated ones")]
struct Cli {
    #[arg(long, env = "NOTION_DATABASE_ID")]
    notion_db_id: Option<String>,

    /// Report planned changes without writing anything
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let dotenv = config::load_dotenv();
    let cli = Cli::parse();
    telemetry::init();
    if let Some(path) = dotenv {
        debug!("Loaded environment from {}", path.display());
    }

    let settings = NotionSettings::resolve(std::env::var("NOTION_API_TOKEN").ok(), cli.notion_db_id)?;
    let client = NotionClient::new(&settings.token)?;

    if cli.dry_run {
        info!("🧪 Dry run, nothing will be written");
    }
    let report = NotionCleanup::new(&client, &settings.database_id, cli.dry_run)
        .run()
        .await?;

    let verb = if cli.dry_run { "Would update" } else { "Updated" };
    println!("Scanned pages: {}", report.scanned);
    println!("{} pages: {}", verb, report.updated);
    if report.failed > 0 {
        println!("Failed pages: {}", report.failed);
    }
    if report.renamed_columns.is_empty() {
        println!("No legacy column renames needed");
    } else {
        let verb = if cli.dry_run { "Would rename" } else { "Renamed" };
        println!("{} legacy columns: {}", verb, report.renamed_columns.join(", "));
    }

    Ok(())
}
