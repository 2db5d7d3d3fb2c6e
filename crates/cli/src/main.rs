//! Command-line client for the directory cache.

mod api_client;

use anyhow::{Context, Result};
use api_client::{ApiClient, FranchiseResponse, ImportJobResponse, StartImportRequest};
use clap::{Args, Parser, Subcommand};
use sha2::{Digest, Sha256};
use std::io::Read;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "dircache")]
#[command(about = "Client for the directory cache API")]
#[command(version)]
struct Cli {
    /// Log HTTP and client activity to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Clone)]
struct ApiArgs {
    /// Server API URL
    #[arg(long, env = "DIRCACHE_SERVER", default_value = "http://127.0.0.1:8080")]
    server: String,

    /// Bearer token; omit when the server runs without one
    #[arg(long, env = "DIRCACHE_TOKEN", hide_env_values = true)]
    token: Option<String>,
}

impl ApiArgs {
    fn client(&self) -> Result<ApiClient> {
        ApiClient::new(&self.server, self.token.as_deref())
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Check server health and version
    Health {
        #[command(flatten)]
        api: ApiArgs,
    },
    /// Refresh job commands
    Import {
        #[command(subcommand)]
        command: ImportCommands,
        #[command(flatten)]
        api: ApiArgs,
    },
    /// Read the cached directory
    Franchises {
        #[command(subcommand)]
        command: FranchiseCommands,
        #[command(flatten)]
        api: ApiArgs,
    },
    /// Look up one outlet in the live directory
    Lookup {
        /// Franchise id
        fid: String,
        /// Outlet id
        oid: String,
        #[command(flatten)]
        api: ApiArgs,
    },
    /// Print the SHA-256 of a token read from stdin, for `api.token_hash`
    HashToken,
}

#[derive(Subcommand)]
enum ImportCommands {
    /// Start a refresh, or report the one already running
    Start {
        /// Name recorded on the job
        #[arg(long)]
        requested_by: Option<String>,
        /// Poll until the job finishes
        #[arg(long, default_value_t = false)]
        wait: bool,
        /// Seconds between polls with --wait
        #[arg(long, default_value_t = 2)]
        poll_interval: u64,
    },
    /// Show one job
    Status {
        /// Job ID
        job_id: String,
    },
    /// List recent jobs
    List {
        #[arg(long)]
        limit: Option<u32>,
    },
}

#[derive(Subcommand)]
enum FranchiseCommands {
    /// One page of cached franchises
    List {
        #[arg(long)]
        page: Option<u32>,
        #[arg(long)]
        per_page: Option<u32>,
        /// latest, oldest, name_asc, name_desc or outlets_desc
        #[arg(long)]
        sort: Option<String>,
    },
    /// Case-insensitive search
    Search {
        query: String,
        #[arg(long)]
        sort: Option<String>,
        #[arg(long)]
        limit: Option<u32>,
    },
    /// Counts over the cache
    Metrics,
}

#[tokio::main]
async fn main() -> Result<()> {
    let Cli { verbose, command } = Cli::parse();

    let level = if verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level)),
        )
        .with_writer(std::io::stderr)
        .init();

    match command {
        Commands::Health { api } => handle_health_command(&api).await,
        Commands::Import { command, api } => handle_import_command(command, &api).await,
        Commands::Franchises { command, api } => handle_franchise_command(command, &api).await,
        Commands::Lookup { fid, oid, api } => handle_lookup_command(&fid, &oid, &api).await,
        Commands::HashToken => handle_hash_token(),
    }
}

async fn handle_health_command(api: &ApiArgs) -> Result<()> {
    let health = api.client()?.health().await?;
    println!("Server: {} ({})", health.status, api.server);
    println!("Version: {}", health.version);
    Ok(())
}

async fn handle_import_command(command: ImportCommands, api: &ApiArgs) -> Result<()> {
    let client = api.client()?;

    match command {
        ImportCommands::Start {
            requested_by,
            wait,
            poll_interval,
        } => {
            let job = client
                .start_import(StartImportRequest {
                    trigger: Some("manual".to_string()),
                    requested_by,
                })
                .await?;
            tracing::debug!(job_id = %job.job_id, status = %job.status, "Start acknowledged");
            println!("Import job: {}", job.job_id);

            if !wait {
                print_job(&job);
                return Ok(());
            }

            let interval = Duration::from_secs(poll_interval.max(1));
            let mut job = job;
            while job.is_running() {
                println!("  processed {}{}", job.processed_count, total_suffix(&job));
                tokio::time::sleep(interval).await;
                job = client.get_import(&job.job_id).await?;
            }
            print_job(&job);
            if job.status == "failed" {
                anyhow::bail!(
                    "import failed: {}",
                    job.error_message.as_deref().unwrap_or("unknown error")
                );
            }
        }
        ImportCommands::Status { job_id } => {
            let job = client.get_import(&job_id).await?;
            print_job(&job);
        }
        ImportCommands::List { limit } => {
            let jobs = client.list_imports(limit).await?;
            if jobs.is_empty() {
                println!("No import jobs found.");
            } else {
                println!(
                    "{:<38} {:<10} {:<8} {:>10} Started",
                    "ID", "Status", "Trigger", "Processed"
                );
                println!("{}", "-".repeat(96));
                for job in jobs {
                    println!(
                        "{:<38} {:<10} {:<8} {:>10} {}",
                        job.job_id, job.status, job.trigger, job.processed_count, job.started_at
                    );
                }
            }
        }
    }

    Ok(())
}

fn total_suffix(job: &ImportJobResponse) -> String {
    job.total_count
        .map(|total| format!(" of {total}"))
        .unwrap_or_default()
}

fn print_job(job: &ImportJobResponse) {
    println!("Import Job");
    println!("  ID: {}", job.job_id);
    println!("  Status: {}", job.status);
    println!("  Trigger: {}", job.trigger);
    if let Some(by) = &job.requested_by {
        println!("  Requested by: {by}");
    }
    println!("  Processed: {}{}", job.processed_count, total_suffix(job));
    println!("  Pages fetched: {}", job.pages_fetched);
    println!("  Started: {}", job.started_at);
    if let Some(finished) = &job.finished_at {
        println!("  Finished: {finished}");
    }
    if let Some(error) = &job.error_message {
        println!("  Error: {error}");
    }
}

async fn handle_franchise_command(command: FranchiseCommands, api: &ApiArgs) -> Result<()> {
    let client = api.client()?;

    match command {
        FranchiseCommands::List {
            page,
            per_page,
            sort,
        } => {
            let result = client
                .list_franchises(page, per_page, sort.as_deref())
                .await?;
            println!(
                "Page {} of {} ({} franchises, sort: {})",
                result.page, result.total_pages, result.total_count, result.sort
            );
            print_franchises(&result.records);
        }
        FranchiseCommands::Search { query, sort, limit } => {
            let result = client
                .search_franchises(&query, sort.as_deref(), limit)
                .await?;
            println!("{} match(es) for {:?}", result.count, result.query);
            print_franchises(&result.records);
        }
        FranchiseCommands::Metrics => {
            let metrics = client.franchise_metrics().await?;
            println!("Franchises: {}", metrics.total_franchises);
            println!("Outlets: {}", metrics.total_outlets);
            println!("Active outlets: {}", metrics.total_active_outlets);
        }
    }

    Ok(())
}

fn print_franchises(records: &[FranchiseResponse]) {
    if records.is_empty() {
        return;
    }
    println!("{:>7} {:<14} {:<36} {:>8}", "Index", "FID", "Name", "Outlets");
    println!("{}", "-".repeat(68));
    for record in records {
        println!(
            "{:>7} {:<14} {:<36} {:>4}/{:<3}",
            record.import_index,
            record.fid.as_deref().unwrap_or("-"),
            record.name.as_deref().unwrap_or("-"),
            record.active_outlet_count,
            record.outlet_count
        );
    }
}

async fn handle_lookup_command(fid: &str, oid: &str, api: &ApiArgs) -> Result<()> {
    match api.client()?.lookup(fid, oid).await? {
        None => anyhow::bail!("directory unavailable, try again later"),
        Some(lookup) if !lookup.found => println!("Outlet {oid} of franchise {fid} not found."),
        Some(lookup) => {
            println!(
                "Franchise: {}",
                lookup.franchise_name.as_deref().unwrap_or("-")
            );
            println!("Outlet: {}", lookup.outlet_name.as_deref().unwrap_or("-"));
        }
    }
    Ok(())
}

fn handle_hash_token() -> Result<()> {
    let mut token = String::new();
    std::io::stdin()
        .read_to_string(&mut token)
        .context("failed to read token from stdin")?;
    let token = token.trim();
    if token.is_empty() {
        anyhow::bail!("no token on stdin");
    }

    let digest = Sha256::digest(token.as_bytes());
    let hex: String = digest.iter().map(|b| format!("{b:02x}")).collect();
    println!("{hex}");
    Ok(())
}
