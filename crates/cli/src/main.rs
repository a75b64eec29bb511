use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use bindex_core::Error;
use bindex_diag::FileSinks;
use bindex_pipeline::{Pipeline, PipelineConfig};
use bindex_remote::{http_client, HttpEnricher, HttpSubmitter, RetryPolicy};
use bindex_source::NdjsonSource;
use clap::{Parser, Subcommand, ValueEnum};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "bindexctl", version, about = "Bulk-load company records into the search index")]
struct Cli {
    /// Output format
    #[arg(short = 'o', long = "output", value_enum, global = true, default_value_t = Output::Human)]
    output: Output,

    /// Serve Prometheus metrics on this host:port
    #[arg(long = "metrics-addr", env = "BINDEX_METRICS_ADDR", global = true)]
    metrics_addr: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum Output { Human, Json }

#[derive(Subcommand, Debug)]
enum Commands {
    /// Enrich, transform and bulk-create every record of a source
    Load(LoadArgs),
    /// Split names into stem and legal-form suffix
    Normalize {
        #[arg(required = true)]
        names: Vec<String>,
    },
}

#[derive(clap::Args, Debug)]
struct LoadArgs {
    /// Newline-delimited JSON export of the company collection
    #[arg(long = "source", env = "BINDEX_SOURCE")]
    source: PathBuf,
    #[arg(long = "es-dest-url", env = "BINDEX_ES_DEST_URL", default_value = "http://localhost:9200")]
    es_dest_url: String,
    #[arg(long = "es-dest-index", env = "BINDEX_ES_DEST_INDEX", default_value = "companies")]
    es_dest_index: String,
    /// Alpha key service endpoint
    #[arg(long = "alphakey-url", env = "BINDEX_ALPHAKEY_URL")]
    alphakey_url: String,
    /// Directory for the diagnostic files
    #[arg(long = "errors-dir", env = "BINDEX_ERRORS_DIR", default_value = "company-errors")]
    errors_dir: PathBuf,
    #[arg(long = "batch-size", env = "BINDEX_BATCH_SIZE", default_value_t = 500)]
    batch_size: usize,
    /// Batches in flight at once
    #[arg(long = "concurrency", env = "BINDEX_CONCURRENCY", default_value_t = 5)]
    concurrency: usize,
    /// Progress reporting interval
    #[arg(long = "tick-ms", env = "BINDEX_TICK_MS", default_value_t = 1000)]
    tick_ms: u64,
    #[arg(long = "fetch-timeout-secs", env = "BINDEX_FETCH_TIMEOUT_SECS", default_value_t = 30)]
    fetch_timeout_secs: u64,
    #[arg(long = "http-timeout-secs", env = "BINDEX_HTTP_TIMEOUT_SECS", default_value_t = 60)]
    http_timeout_secs: u64,
    /// Retries on transport errors (0 disables)
    #[arg(long = "retries", env = "BINDEX_RETRIES", default_value_t = 0)]
    retries: u32,
    #[arg(long = "retry-backoff-ms", env = "BINDEX_RETRY_BACKOFF_MS", default_value_t = 200)]
    retry_backoff_ms: u64,
}

impl LoadArgs {
    fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            batch_size: self.batch_size,
            concurrency: self.concurrency,
            tick: Duration::from_millis(self.tick_ms),
            fetch_timeout: Duration::from_secs(self.fetch_timeout_secs),
            ..Default::default()
        }
        .normalized()
    }

    fn retry(&self) -> RetryPolicy {
        RetryPolicy::new(self.retries, Duration::from_millis(self.retry_backoff_ms))
    }
}

/// Log filter from `BINDEX_LOG`; an unset or unparsable value means `info`.
fn log_filter() -> EnvFilter {
    std::env::var("BINDEX_LOG")
        .ok()
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new("info"))
}

fn install_exporter(addr: Option<&str>) {
    let Some(addr) = addr else { return };
    let sock: SocketAddr = match addr.parse() {
        Ok(sock) => sock,
        Err(_) => {
            warn!(addr, "ignoring metrics address; expected host:port");
            return;
        }
    };
    match metrics_exporter_prometheus::PrometheusBuilder::new().with_http_listener(sock).install() {
        Ok(()) => info!(%sock, "serving Prometheus metrics"),
        Err(e) => warn!(%sock, error = %e, "metrics exporter not installed"),
    }
}

/// Resolves on Ctrl-C. Never resolves where the signal cannot be listened for.
async fn interrupted() {
    if let Err(e) = signal::ctrl_c().await {
        warn!(error = %e, "cannot listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
    warn!("Ctrl-C received; abandoning in-flight batches");
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    tracing_subscriber::fmt().with_env_filter(log_filter()).with_target(true).init();
    install_exporter(cli.metrics_addr.as_deref());

    match cli.command {
        Commands::Load(args) => load(args, cli.output).await,
        Commands::Normalize { names } => normalize(&names, cli.output),
    }
}

async fn load(args: LoadArgs, output: Output) -> Result<()> {
    let cfg = args.pipeline_config();
    info!(
        source = %args.source.display(),
        index = %args.es_dest_index,
        batch_size = cfg.batch_size,
        concurrency = cfg.concurrency,
        "load invoked"
    );

    let sinks = Arc::new(FileSinks::open(&args.errors_dir)?);
    let mut source = NdjsonSource::open(&args.source).await?;
    let http = http_client(Duration::from_secs(args.http_timeout_secs)).context("building HTTP client")?;
    let enricher = HttpEnricher::new(http.clone(), args.alphakey_url.clone(), sinks.clone()).with_retry(args.retry());
    let submitter = HttpSubmitter::new(http, &args.es_dest_url, &args.es_dest_index, sinks.clone()).with_retry(args.retry());
    let pipeline = Pipeline::new(Arc::new(enricher), Arc::new(submitter), sinks.clone(), cfg);

    let outcome = pipeline.run_until(&mut source, interrupted()).await;

    // Units are gone once the run returns; the pipeline holds the remaining sink clones.
    drop(pipeline);
    match Arc::try_unwrap(sinks) {
        Ok(sinks) => sinks.close()?,
        Err(_) => warn!(dir = %args.errors_dir.display(), "diagnostic sinks still in use; leaving them to close on drop"),
    }
    if source.undecodable() > 0 {
        warn!(lines = source.undecodable(), "source lines could not be decoded");
    }

    match outcome {
        Ok(summary) => {
            info!(
                read = summary.totals.read,
                written = summary.totals.written,
                skipped = summary.totals.skipped,
                abandoned = summary.abandoned,
                "final totals"
            );
            info!(index = %args.es_dest_index, "successfully loaded {} index", args.es_dest_index);
            match output {
                Output::Human => println!(
                    "read {} • written {} • skipped {} • batches {} ({} abandoned)",
                    summary.totals.read, summary.totals.written, summary.totals.skipped, summary.batches, summary.abandoned
                ),
                Output::Json => println!("{}", serde_json::to_string_pretty(&summary)?),
            }
            Ok(())
        }
        Err(Error::Cancelled) => std::process::exit(130),
        Err(e) => {
            error!(error = %e, "load failed");
            eprintln!("load error: {}", e);
            std::process::exit(1);
        }
    }
}

fn normalize(names: &[String], output: Output) -> Result<()> {
    #[derive(serde::Serialize)]
    struct Row<'a> { name: &'a str, stem: String, suffix: String }

    let rows: Vec<_> = names
        .iter()
        .map(|name| {
            let (stem, suffix) = bindex_core::normalize(name);
            Row { name, stem, suffix }
        })
        .collect();
    match output {
        Output::Human => {
            println!("{:<40} {:<32} SUFFIX", "NAME", "STEM");
            for r in rows {
                println!("{:<40} {:<32} {:?}", r.name, r.stem, r.suffix);
            }
        }
        Output::Json => println!("{}", serde_json::to_string_pretty(&rows)?),
    }
    Ok(())
}
