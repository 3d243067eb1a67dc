use chatcourier::{
    AuthorizationManager, Config, InboundMessage, IngestOutcome, Ingestor, MessageLedger,
    StdinCodeProvider, Uploader,
};
use clap::{Parser, Subcommand};
use mimalloc::MiMalloc;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[derive(Debug, Parser)]
#[command(name = "chatcourier", version, about = "Record chat messages once and export documents to Drive")]
struct Cli {
    /// Configuration file layered over the built-in defaults.
    #[arg(long, default_value = chatcourier::config::DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Read JSON-lines messages from stdin and record the new ones.
    Ingest,
    /// Upload a document into the Drive folder behind `--folder-url`.
    Upload {
        file: PathBuf,
        #[arg(long)]
        folder_url: String,
        /// Name on Drive; defaults to the local file name.
        #[arg(long)]
        name: Option<String>,
    },
    /// Obtain and cache the Drive credential without uploading anything.
    Authorize,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let cfg = Config::load_from(&cli.config)?;

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cfg.basic.loglevel.clone()));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_level(true)
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    info!(
        database_url = %cfg.database.url,
        token_path = %cfg.google.token_path.display(),
        proxy = %cfg.http.proxy.as_ref().map(|u| u.as_str()).unwrap_or("<none>"),
        loglevel = %cfg.basic.loglevel,
    );

    match cli.command {
        Command::Ingest => ingest(&cfg).await?,
        Command::Upload {
            file,
            folder_url,
            name,
        } => {
            let name = match name {
                Some(n) => n,
                None => file
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .ok_or("upload path has no file name")?,
            };
            let content = tokio::fs::read(&file).await?;
            let http = cfg.http.build_client()?;
            let auth = Arc::new(authorization_manager(&cfg, http.clone()));
            let uploader = Uploader::new(auth, http, cfg.google.drive_upload_url.clone());

            let uploaded = uploader.upload(&name, &content, &folder_url).await?;
            match uploaded.web_view_link {
                Some(link) => println!("{link}"),
                None => println!("{}", uploaded.id),
            }
        }
        Command::Authorize => {
            let http = cfg.http.build_client()?;
            let auth = authorization_manager(&cfg, http);
            let cred = auth.authorize().await?;
            println!(
                "authorized ({}); credential cached at {}",
                cred.scope,
                auth.token_path().display()
            );
        }
    }
    Ok(())
}

fn authorization_manager(cfg: &Config, http: reqwest::Client) -> AuthorizationManager {
    AuthorizationManager::new(cfg.google.clone(), http, Arc::new(StdinCodeProvider))
}

async fn ingest(cfg: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let ledger = MessageLedger::connect(&cfg.database.url).await?;
    if let Err(e) = ledger.initialize().await {
        if e.is_fatal() {
            return Err(e.into());
        }
        warn!(error = %e, "continuing with the existing ledger schema");
    }
    let ingestor = Ingestor::new(ledger.clone(), cfg.ingest.today_only);

    let (mut saved, mut seen, mut skipped, mut invalid) = (0usize, 0usize, 0usize, 0usize);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut line_no = 0usize;
    while let Some(line) = lines.next_line().await? {
        line_no += 1;
        if line.trim().is_empty() {
            continue;
        }
        let msg: InboundMessage = match serde_json::from_str(&line) {
            Ok(m) => m,
            Err(e) => {
                warn!(line = line_no, error = %e, "skipping malformed message");
                invalid += 1;
                continue;
            }
        };
        match ingestor.ingest(&msg).await? {
            IngestOutcome::Saved { .. } => saved += 1,
            IngestOutcome::AlreadyProcessed { .. } => seen += 1,
            IngestOutcome::NotToday { .. } => skipped += 1,
        }
    }

    info!(saved, already_processed = seen, not_today = skipped, invalid, "ingest finished");
    println!("saved={saved} already_processed={seen} not_today={skipped} invalid={invalid}");
    ledger.close().await;
    Ok(())
}
