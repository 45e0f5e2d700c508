//! CLI binary for billscan.
//!
//! A thin shim over the library crate: `scan` maps flags to an
//! `ExtractorConfig` and ingests receipt images, the other subcommands are
//! plain CRUD over the bill directory.

use anyhow::{Context, Result};
use billscan::pipeline::deserialize::parse_bill;
use billscan::{
    ingest_stream, Bill, BillIngestor, BillScanError, BillStore, ErrorResponse, ExtractorConfig,
    FileBillStore, IngestProgressCallback, IngestStage, ProgressCallback,
};
use clap::{Parser, Subcommand};
use futures::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: one bar for the batch plus a log line per
/// finished upload. Uploads finish out of order, so timings are keyed by
/// the upload label, which is the file's full path.
struct CliProgressCallback {
    bar: ProgressBar,
    start_times: Mutex<HashMap<String, Instant>>,
    rejected: AtomicUsize,
}

impl CliProgressCallback {
    fn new(total: usize) -> Arc<Self> {
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} receipts  \
             ⏱ {elapsed_precise}  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        let bar = ProgressBar::new(total as u64);
        bar.set_style(style);
        bar.set_prefix("Scanning");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
            rejected: AtomicUsize::new(0),
        })
    }

    fn elapsed(&self, upload: &str) -> String {
        let ms = self
            .start_times
            .lock()
            .ok()
            .and_then(|mut times| times.remove(upload))
            .map(|t| t.elapsed().as_millis())
            .unwrap_or(0);
        dim(&format!("{:.1}s", ms as f64 / 1000.0))
    }

    fn finish(&self, total: usize) {
        self.bar.finish_and_clear();
        let failed = self.rejected.load(Ordering::SeqCst);
        let stored = total.saturating_sub(failed);
        if failed == 0 {
            eprintln!("{} {} bills stored", green("✔"), bold(&stored.to_string()));
        } else {
            eprintln!(
                "{} {}/{} bills stored  ({} rejected)",
                if failed == total { red("✘") } else { cyan("⚠") },
                bold(&stored.to_string()),
                total,
                red(&failed.to_string()),
            );
        }
    }
}

impl IngestProgressCallback for CliProgressCallback {
    fn on_stage(&self, upload: &str, stage: IngestStage) {
        if stage == IngestStage::Received {
            if let Ok(mut times) = self.start_times.lock() {
                times.insert(upload.to_string(), Instant::now());
            }
        }
        self.bar.set_message(format!("{upload}: {stage}"));
    }

    fn on_persisted(&self, upload: &str, bill: &Bill) {
        self.bar.println(format!(
            "  {} {:<28}  {:<24}  {:>10}  {}",
            green("✓"),
            upload,
            bill.vendor,
            bill.total_amount,
            self.elapsed(upload),
        ));
        self.bar.inc(1);
    }

    fn on_rejected(&self, upload: &str, stage: IngestStage, error: &BillScanError) {
        self.rejected.fetch_add(1, Ordering::SeqCst);

        // Keep the log tidy; the full message is printed by `scan` anyway.
        let mut msg = error.to_string();
        if msg.chars().count() > 80 {
            msg = msg.chars().take(79).chain(['…']).collect();
        }

        self.bar.println(format!(
            "  {} {:<28}  {}  {}  {}",
            red("✗"),
            upload,
            dim(&stage.to_string()),
            red(&msg),
            self.elapsed(upload),
        ));
        self.bar.inc(1);
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Extract and store bills from receipt photos
  billscan scan lunch.jpg taxi.png

  # Machine-readable results (one JSON object per file)
  billscan --json scan receipts/*.jpg

  # Browse the store
  billscan list
  billscan show 3f2a9c0e6b1d4e8f9a7c5b3d1e0f2a4c

  # Correct a bill by hand, then remove another
  billscan update 3f2a9c0e6b1d4e8f9a7c5b3d1e0f2a4c fixed.json
  billscan delete 0a1b2c3d4e5f60718293a4b5c6d7e8f9

ENVIRONMENT VARIABLES:
  GEMINI_API_KEY          Gemini API key (required by `scan`)
  GEMINI_API_ENDPOINT     generateContent URL (required by `scan`), e.g.
                          https://generativelanguage.googleapis.com/v1beta/models/gemini-2.0-flash:generateContent
  BILLSCAN_STORE_DIR      Directory holding one JSON document per bill
  BILLSCAN_API_TIMEOUT    Vision call timeout in seconds
  BILLSCAN_STORE_TIMEOUT  Store insert timeout in seconds
  BILLSCAN_CONCURRENCY    Receipts processed at once
  RUST_LOG                Overrides the log filter

Only .jpg, .jpeg and .png files up to 5 MiB are accepted.
"#;

/// Extract structured bills from receipt photos with a vision model.
#[derive(Parser, Debug)]
#[command(
    name = "billscan",
    version,
    about = "Extract structured bills from receipt photos with a vision model",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Directory holding the stored bills.
    #[arg(long, global = true, env = "BILLSCAN_STORE_DIR", default_value = "bills")]
    store_dir: PathBuf,

    /// Output JSON instead of human-readable text.
    #[arg(long, global = true, env = "BILLSCAN_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, global = true, env = "BILLSCAN_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "BILLSCAN_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "BILLSCAN_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Extract bills from receipt images and store them.
    Scan(ScanArgs),

    /// List every stored bill.
    List,

    /// Print one stored bill.
    Show {
        id: String,
    },

    /// Replace a stored bill with the contents of a JSON file.
    Update {
        id: String,
        json_file: PathBuf,
    },

    /// Delete a stored bill.
    Delete {
        id: String,
    },
}

#[derive(clap::Args, Debug)]
struct ScanArgs {
    /// Receipt images (.jpg, .jpeg, .png).
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Gemini API key.
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    api_key: String,

    /// Gemini generateContent endpoint URL.
    #[arg(long, env = "GEMINI_API_ENDPOINT")]
    endpoint: String,

    /// Vision call timeout in seconds.
    #[arg(long, env = "BILLSCAN_API_TIMEOUT", default_value_t = 60)]
    api_timeout: u64,

    /// Store insert timeout in seconds.
    #[arg(long, env = "BILLSCAN_STORE_TIMEOUT", default_value_t = 10)]
    store_timeout: u64,

    /// Number of receipts processed at once.
    #[arg(short, long, env = "BILLSCAN_CONCURRENCY", default_value_t = 4)]
    concurrency: usize,

    /// Path to a text file containing a custom extraction prompt.
    #[arg(long, env = "BILLSCAN_PROMPT")]
    prompt: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar already reports every upload, so library INFO logs
    // would only interleave with it.
    let scanning = matches!(cli.command, Command::Scan(_));
    let show_progress = scanning && !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let store = Arc::new(FileBillStore::new(&cli.store_dir));

    match &cli.command {
        Command::Scan(args) => scan(&cli, args, store, show_progress).await,
        Command::List => list(&cli, store.as_ref()).await,
        Command::Show { id } => show(&cli, store.as_ref(), id).await,
        Command::Update { id, json_file } => update(&cli, store.as_ref(), id, json_file).await,
        Command::Delete { id } => delete(&cli, store.as_ref(), id).await,
    }
}

async fn scan(
    cli: &Cli,
    args: &ScanArgs,
    store: Arc<FileBillStore>,
    show_progress: bool,
) -> Result<()> {
    let config = build_config(args).await?;

    let progress = show_progress.then(|| CliProgressCallback::new(args.files.len()));
    let mut ingestor = BillIngestor::new(&config, store).context("Failed to create vision client")?;
    if let Some(ref cb) = progress {
        ingestor = ingestor.with_progress(Arc::clone(cb) as ProgressCallback);
    }

    let total = args.files.len();
    let mut rejected = 0usize;
    let mut outcomes = ingest_stream(&ingestor, args.files.clone());

    while let Some(outcome) = outcomes.next().await {
        let file = outcome.path.display().to_string();
        match outcome.result {
            Ok(bill) => {
                if cli.json {
                    println!("{}", serde_json::json!({ "file": file, "bill": bill }));
                } else if !cli.quiet {
                    println!("{}\t{}\t{}\t{}", bill.id, bill.vendor, bill.total_amount, file);
                }
            }
            Err(e) => {
                rejected += 1;
                if cli.json {
                    println!(
                        "{}",
                        serde_json::json!({ "file": file, "error": ErrorResponse::from(&e) })
                    );
                } else if progress.is_none() {
                    eprintln!("{} {}: {}", red("✗"), file, e);
                }
            }
        }
    }

    if let Some(ref cb) = progress {
        cb.finish(total);
    }

    if rejected > 0 {
        anyhow::bail!("{rejected} of {total} upload(s) rejected");
    }
    Ok(())
}

/// Map scan flags to `ExtractorConfig`.
async fn build_config(args: &ScanArgs) -> Result<ExtractorConfig> {
    let mut builder = ExtractorConfig::builder()
        .api_key(&args.api_key)
        .endpoint(&args.endpoint)
        .api_timeout_secs(args.api_timeout)
        .store_timeout_secs(args.store_timeout)
        .concurrency(args.concurrency);

    if let Some(ref path) = args.prompt {
        let prompt = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read prompt from {:?}", path))?;
        builder = builder.prompt(prompt);
    }

    builder.build().context("Invalid configuration")
}

async fn list(cli: &Cli, store: &dyn BillStore) -> Result<()> {
    let bills = store.find_all().await.context("Failed to list bills")?;

    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&bills).context("Failed to serialise bills")?
        );
        return Ok(());
    }

    for bill in &bills {
        let date = bill
            .date
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "-".into());
        println!(
            "{}  {}  {:<24}  {:>10}",
            bill.id, date, bill.vendor, bill.total_amount
        );
    }
    if !cli.quiet {
        eprintln!("{}", dim(&format!("{} bill(s)", bills.len())));
    }
    Ok(())
}

async fn show(cli: &Cli, store: &dyn BillStore, id: &str) -> Result<()> {
    let bill = store
        .find_by_id(id)
        .await
        .context("Failed to read bill")?
        .with_context(|| format!("No bill with id '{id}'"))?;

    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&bill).context("Failed to serialise bill")?
        );
        return Ok(());
    }

    println!("Id:       {}", bill.id);
    println!("Vendor:   {}", bill.vendor);
    if let Some(date) = bill.date {
        println!("Date:     {}", date.format("%Y-%m-%d %H:%M:%S UTC"));
    }
    println!("Total:    {}", bill.total_amount);
    if let Some(ref method) = bill.payment_method {
        println!("Payment:  {}", method);
    }
    if !bill.line_items.is_empty() {
        println!("Items:");
        for item in &bill.line_items {
            println!(
                "  {:<30} {:>6} × {:>8} = {:>8}",
                item.item_name, item.quantity, item.unit_price, item.total_price
            );
        }
        let sum = bill.line_items_total();
        if sum != bill.total_amount {
            println!("{}", dim(&format!("  (line items add up to {sum})")));
        }
    }
    Ok(())
}

async fn update(cli: &Cli, store: &dyn BillStore, id: &str, json_file: &Path) -> Result<()> {
    let text = tokio::fs::read_to_string(json_file)
        .await
        .with_context(|| format!("Failed to read {:?}", json_file))?;
    let bill = parse_bill(&text).context("Invalid bill document")?;

    if !store.replace(id, &bill).await.context("Failed to update bill")? {
        anyhow::bail!("No bill with id '{id}'");
    }
    if !cli.quiet {
        eprintln!("{} updated {}", green("✔"), bold(id));
    }
    Ok(())
}

async fn delete(cli: &Cli, store: &dyn BillStore, id: &str) -> Result<()> {
    if !store.delete(id).await.context("Failed to delete bill")? {
        anyhow::bail!("No bill with id '{id}'");
    }
    if !cli.quiet {
        eprintln!("{} deleted {}", green("✔"), bold(id));
    }
    Ok(())
}
