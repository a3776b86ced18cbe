//! deck-vault command line.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{error, info};

use deck_vault::auth::{CredentialProvider, TokenSource};
use deck_vault::config::AppConfig;
use deck_vault::deck::{self, SlideSelector};
use deck_vault::drive::{DriveApi, DriveClient};
use deck_vault::fields::{
    market_prefix, CoordinateExtractor, FieldExtractor, FieldMap, ZoneMarketExtractor, MARKET_KEY,
};
use deck_vault::links::ExtractedLink;
use deck_vault::pipeline::{PipelineConfig, VideoPipeline};
use deck_vault::task::TaskQueue;
use deck_vault::video::YtDlp;
use deck_vault::{logging, organize, report, LinkScope};

#[derive(Debug, Parser)]
#[command(name = "deck-vault", version, about = "File the videos linked from Drive-hosted decks next to them")]
struct Cli {
    /// Parent directory for scratch downloads (overrides DECKVAULT_WORK_DIR)
    #[arg(long, global = true, value_name = "DIR")]
    work_dir: Option<PathBuf>,

    /// Slides scanned for links: `last` or `all` (overrides DECKVAULT_LINK_SCOPE)
    #[arg(long, global = true)]
    link_scope: Option<LinkScope>,

    /// Fail instead of opening the browser consent flow when no token is stored
    #[arg(long, global = true, default_value_t = false)]
    no_browser: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Walk a folder tree and upload the videos each deck links to
    Run {
        /// Drive id of the root folder
        root_id: String,
        /// Print the full run report as JSON
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Process one folder without descending into sub-folders
    RunFolder {
        folder_id: String,
    },
    /// Upload a local deck under `<parent>/<zone>/<market>/`
    Organize {
        #[arg(value_name = "PPTX")]
        path: PathBuf,
        /// Drive id of the folder receiving the zone folders
        #[arg(long)]
        parent: String,
    },
    /// Write a commercial-terms CSV for every deck under a folder tree
    Report {
        root_id: String,
        #[arg(long, short, value_name = "CSV", default_value = "commercial_terms.csv")]
        output: PathBuf,
    },
    /// Print the fields and links of a local deck as JSON
    Links {
        #[arg(value_name = "PPTX")]
        path: PathBuf,
    },
}

#[derive(Serialize)]
struct DeckSummary<'a> {
    deck: String,
    fields: FieldMap,
    coordinates: FieldMap,
    prefix: &'a str,
    links: Vec<ExtractedLink>,
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    logging::init_tracing();
    let _ = rustls::crypto::ring::default_provider().install_default();

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        error!("command failed: {e:#}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = AppConfig::from_env();
    if let Some(work_dir) = cli.work_dir {
        config.work_dir = work_dir;
    }
    if let Some(scope) = cli.link_scope {
        config.link_scope = scope;
    }
    if cli.no_browser {
        config.interactive_auth = false;
    }
    info!(?config, "configuration loaded");

    match cli.command {
        Command::Links { path } => inspect(&config, &path),
        Command::Run { root_id, json } => {
            let pipeline = Arc::new(pipeline(&config).await?);
            let (queue, worker) = TaskQueue::start(pipeline, 1);

            let outcome = queue.submit(root_id).await?.wait().await;
            drop(queue);
            worker.await.context("task worker panicked")?;

            if json {
                println!("{}", serde_json::to_string_pretty(&outcome)?);
            } else {
                println!("{}", outcome.message);
            }
            if !outcome.is_success() {
                bail!("run {} failed", outcome.id);
            }
            Ok(())
        }
        Command::RunFolder { folder_id } => {
            match pipeline(&config).await?.process_folder(&folder_id).await? {
                Some(report) => println!("{}", serde_json::to_string_pretty(&report)?),
                None => println!("folder {folder_id} holds no deck"),
            }
            Ok(())
        }
        Command::Organize { path, parent } => {
            let drive = connect_drive(&config).await?;
            let report = organize::organize_deck(drive.as_ref(), &path, &parent).await?;
            println!(
                "{} -> {} / {} ({:?})",
                path.display(),
                report.zone.as_deref().unwrap_or("-"),
                report.market,
                report.upload
            );
            Ok(())
        }
        Command::Report { root_id, output } => {
            let drive = connect_drive(&config).await?;
            std::fs::create_dir_all(&config.work_dir)?;
            let scratch = tempfile::Builder::new().prefix("report-").tempdir_in(&config.work_dir)?;

            let mut writer = csv::Writer::from_path(&output)
                .with_context(|| format!("cannot create {}", output.display()))?;
            let summary = report::scan_tree(drive.as_ref(), &root_id, scratch.path(), &mut writer).await?;
            println!(
                "wrote {} row(s) to {} ({} incomplete)",
                summary.decks,
                output.display(),
                summary.incomplete
            );
            Ok(())
        }
    }
}

async fn connect_drive(config: &AppConfig) -> Result<Arc<dyn DriveApi>> {
    let tokens: Arc<dyn TokenSource> = Arc::new(CredentialProvider::load(config.oauth()).await?);
    let client = DriveClient::new(config.drive_client(), tokens).context("cannot build Drive client")?;
    Ok(Arc::new(client))
}

async fn pipeline(config: &AppConfig) -> Result<VideoPipeline> {
    let drive = connect_drive(config).await?;
    let video = Arc::new(YtDlp::new(config.ytdlp_program.clone()));
    Ok(VideoPipeline::new(drive, video, PipelineConfig::from(config)))
}

fn inspect(config: &AppConfig, path: &std::path::Path) -> Result<()> {
    if !path.is_file() {
        bail!("{} is not a file", path.display());
    }

    let first = deck::slide_text(path, SlideSelector::First);
    let fields = ZoneMarketExtractor.extract(&first);
    let prefix = market_prefix(fields.value(MARKET_KEY));
    let all_text: String = deck::slides(path).iter().map(|s| s.text()).collect();

    let summary = DeckSummary {
        deck: path.display().to_string(),
        coordinates: CoordinateExtractor.extract(&all_text),
        fields,
        prefix: &prefix,
        links: deck::extract_links(path, &config.parser()),
    };
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
