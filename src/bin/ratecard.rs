//! CLI binary for ubr-ratecard.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `RateCardConfig` and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;
use ubr_ratecard::pipeline::{document, input};
use ubr_ratecard::{
    extract, run_to_file, DocumentFormat, FailurePolicy, ProgressCallback, RateCardConfig,
    ReplyPolicy, RunProgressCallback,
};

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

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: a live bar plus one log line and the reply
/// text for every block.
struct CliProgressCallback {
    bar: ProgressBar,
    /// Per-block wall-clock start times for elapsed reporting.
    start_times: Mutex<HashMap<usize, Instant>>,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    /// Spinner only; `on_run_start` switches to a counter once the block
    /// count is known.
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0);

        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Reading document…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
            errors: AtomicUsize::new(0),
        })
    }

    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} blocks  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Pricing");
        self.bar.reset_eta();
    }

    fn elapsed_secs(&self, index: usize) -> f64 {
        self.start_times
            .lock()
            .ok()
            .and_then(|mut t| t.remove(&index))
            .map(|t| t.elapsed().as_millis() as f64 / 1000.0)
            .unwrap_or(0.0)
    }
}

impl RunProgressCallback for CliProgressCallback {
    fn on_run_start(&self, total_blocks: usize) {
        self.activate_bar(total_blocks);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Resolving {total_blocks} UBR blocks…"))
        ));
    }

    fn on_block_start(&self, block_id: &str, index: usize, _total: usize) {
        if let Ok(mut t) = self.start_times.lock() {
            t.insert(index, Instant::now());
        }
        self.bar.set_message(block_id.to_string());
    }

    fn on_block_complete(&self, block_id: &str, index: usize, total: usize, reply: &str) {
        let secs = self.elapsed_secs(index);
        self.bar.println(format!(
            "  {} {:<10} {:>3}/{:<3}  {}",
            green("✓"),
            block_id,
            index,
            total,
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.println(reply);
        self.bar.inc(1);
    }

    fn on_block_reused(&self, block_id: &str, index: usize, total: usize) {
        self.bar.println(format!(
            "  {} {:<10} {:>3}/{:<3}  {}",
            cyan("↺"),
            block_id,
            index,
            total,
            dim("from manifest"),
        ));
        self.bar.inc(1);
    }

    fn on_block_error(&self, block_id: &str, index: usize, total: usize, error: &str) {
        let secs = self.elapsed_secs(index);
        self.errors.fetch_add(1, Ordering::SeqCst);

        // Keep the log line to one terminal row.
        let msg = if error.chars().count() > 80 {
            format!("{}\u{2026}", error.chars().take(79).collect::<String>())
        } else {
            error.to_string()
        };

        self.bar.println(format!(
            "  {} {:<10} {:>3}/{:<3}  {}  {}",
            red("✗"),
            block_id,
            index,
            total,
            red(&msg),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_run_complete(&self, total_blocks: usize, success_count: usize) {
        let failed = total_blocks.saturating_sub(success_count);
        self.bar.finish_and_clear();

        if failed == 0 {
            eprintln!(
                "{} {} blocks resolved successfully",
                green("✔"),
                bold(&success_count.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} blocks resolved  ({} failed)",
                if failed == total_blocks {
                    red("✘")
                } else {
                    cyan("⚠")
                },
                bold(&success_count.to_string()),
                total_blocks,
                red(&failed.to_string()),
            );
        }
    }
}

/// Plain console echo used when the progress bar is off: every reply goes
/// to stdout as soon as it is accepted.
struct EchoCallback;

impl RunProgressCallback for EchoCallback {
    fn on_block_complete(&self, _block_id: &str, _index: usize, _total: usize, reply: &str) {
        println!("{reply}\n");
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Resolve every block of UBR.txt into UBR_Complete.txt
  ratecard UBR.txt

  # PDF input, custom output file
  ratecard pricing.pdf -o cards.txt

  # Fixed parameters (skips the decide step)
  ratecard --learners 12 --days 3 UBR.txt

  # Enforce the rate card format and stop at the first bad block
  ratecard --strict --fail-fast UBR.txt

  # Continue an interrupted run
  ratecard --resume UBR.txt

  # List the blocks only (no API key needed)
  ratecard --extract-only --json UBR.txt

OUTPUT:
  Replies are written in document order, separated by one blank line.
  A manifest <output>.manifest.json records every attempted block and is
  what --resume reads.

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  GEMINI_API_KEY          Google Gemini API key
  RATECARD_PROVIDER       Override provider (openai, anthropic, gemini, ollama)
  RATECARD_MODEL          Override model ID
  PDFIUM_LIB_PATH         Path to an existing libpdfium; skips auto-download
  PDFIUM_AUTO_CACHE_DIR   Override the default pdfium cache directory

SETUP:
  1. Put credentials in .env:  OPENAI_API_KEY=sk-...
  2. Run:                      ratecard UBR.txt

  PDFium is downloaded automatically the first time a PDF is read.
"#;

/// Resolve UBR pricing blocks into rate cards using an LLM.
#[derive(Parser, Debug)]
#[command(
    name = "ratecard",
    version,
    about = "Resolve UBR pricing blocks from text or PDF documents into rate cards",
    long_about = "Read a text or PDF document (local file or URL), split it into UBR blocks \
delimited by 'UBR <n>:', send every block to an LLM and write the replies in document order. \
Supports OpenAI, Anthropic, Google Gemini, Azure OpenAI, and any OpenAI-compatible endpoint.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local text/PDF file path or HTTP/HTTPS URL.
    #[arg(env = "RATECARD_INPUT")]
    input: String,

    /// Output file for the assembled replies.
    #[arg(short, long, env = "RATECARD_OUTPUT", default_value = "UBR_Complete.txt")]
    output: PathBuf,

    /// Input format; auto detects PDF by extension or magic bytes.
    #[arg(long, env = "RATECARD_FORMAT", value_enum, default_value = "auto")]
    format: FormatArg,

    /// LLM model ID.
    #[arg(long, env = "RATECARD_MODEL", long_help = "LLM model to use. Default: gpt-5-mini.")]
    model: Option<String>,

    /// LLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(
        long,
        env = "RATECARD_PROVIDER",
        long_help = "LLM provider. Auto-detected from API key env vars if not set.\n\
          Supported: openai, anthropic, gemini, azure, ollama, or any OpenAI-compatible URL."
    )]
    provider: Option<String>,

    /// Credentials file loaded before provider lookup. Default: ./.env when present.
    #[arg(long)]
    env_file: Option<PathBuf>,

    /// Fixed learner count for every rate card.
    #[arg(long, env = "RATECARD_LEARNERS", value_parser = clap::value_parser!(u32).range(1..))]
    learners: Option<u32>,

    /// Fixed day count for every rate card.
    #[arg(long, env = "RATECARD_DAYS", value_parser = clap::value_parser!(u32).range(1..))]
    days: Option<u32>,

    /// Reject replies that are not in the rate card format.
    #[arg(long, env = "RATECARD_STRICT")]
    strict: bool,

    /// Stop at the first failed block.
    #[arg(long, env = "RATECARD_FAIL_FAST")]
    fail_fast: bool,

    /// Reuse completed blocks from the output's manifest.
    #[arg(long)]
    resume: bool,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "RATECARD_PASSWORD")]
    password: Option<String>,

    /// Per-call LLM timeout in seconds (default: none).
    #[arg(long, env = "RATECARD_API_TIMEOUT")]
    api_timeout: Option<u64>,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "RATECARD_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Print the extracted blocks only, no LLM calls.
    #[arg(long)]
    extract_only: bool,

    /// Print JSON (blocks with --extract-only, run stats otherwise) on stdout.
    #[arg(long)]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "RATECARD_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "RATECARD_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "RATECARD_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum FormatArg {
    Auto,
    Text,
    Pdf,
}

impl From<FormatArg> for DocumentFormat {
    fn from(v: FormatArg) -> Self {
        match v {
            FormatArg::Auto => DocumentFormat::Auto,
            FormatArg::Text => DocumentFormat::Text,
            FormatArg::Pdf => DocumentFormat::Pdf,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO-level library logs.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json && !cli.extract_only;
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

    // ── Credentials ──────────────────────────────────────────────────────
    match cli.env_file {
        Some(ref path) => {
            dotenvy::from_path(path)
                .with_context(|| format!("Failed to load env file {}", path.display()))?;
        }
        None => {
            // A missing ./.env is fine.
            dotenvy::dotenv().ok();
        }
    }

    // ── Ensure PDFium engine is available ────────────────────────────────
    if needs_pdfium(&cli.input, cli.format.into()) && !pdfium_auto::is_pdfium_cached() {
        ensure_pdfium(cli.quiet)?;
    }

    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new_dynamic() as Arc<dyn RunProgressCallback>)
    } else if !cli.quiet && !cli.json && !cli.extract_only {
        Some(Arc::new(EchoCallback) as Arc<dyn RunProgressCallback>)
    } else {
        None
    };

    let config = build_config(&cli, progress_cb)?;

    // ── Extract-only mode ────────────────────────────────────────────────
    if cli.extract_only {
        let blocks = extract(&cli.input, &config)
            .await
            .context("Failed to extract blocks")?;

        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&blocks).context("Failed to serialise blocks")?
            );
        } else {
            for block in &blocks {
                println!("{}\n{}\n", bold(&format!("{}:", block.id)), block.body);
            }
            if !cli.quiet {
                eprintln!("{} blocks", blocks.len());
            }
        }
        return Ok(());
    }

    // ── Run ──────────────────────────────────────────────────────────────
    let stats = run_to_file(&cli.input, &cli.output, &config)
        .await
        .context("Run failed")?;

    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&stats).context("Failed to serialise stats")?
        );
    } else if !cli.quiet {
        eprintln!(
            "{}  {}/{} blocks  {}ms  →  {}",
            if stats.failed_blocks == 0 {
                green("✔")
            } else {
                cyan("⚠")
            },
            stats.completed_blocks,
            stats.total_blocks,
            stats.total_duration_ms,
            bold(&cli.output.display().to_string()),
        );
        if stats.reused_blocks > 0 {
            eprintln!("   {} blocks reused from manifest", dim(&stats.reused_blocks.to_string()));
        }
        eprintln!(
            "   {} tokens in  /  {} tokens out  ({})",
            dim(&stats.total_input_tokens.to_string()),
            dim(&stats.total_output_tokens.to_string()),
            config.model_name(),
        );
    }

    Ok(())
}

/// Map CLI args to `RateCardConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<RateCardConfig> {
    let mut builder = RateCardConfig::builder()
        .format(cli.format.into())
        .reply_policy(if cli.strict {
            ReplyPolicy::Strict
        } else {
            ReplyPolicy::PassThrough
        })
        .failure_policy(if cli.fail_fast {
            FailurePolicy::Abort
        } else {
            FailurePolicy::Continue
        })
        .resume(cli.resume)
        .download_timeout_secs(cli.download_timeout);

    if let Some(ref model) = cli.model {
        builder = builder.model(model.clone());
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider.clone());
    }
    if let Some(n) = cli.learners {
        builder = builder.learners(n);
    }
    if let Some(n) = cli.days {
        builder = builder.days(n);
    }
    if let Some(ref pwd) = cli.password {
        builder = builder.password(pwd.clone());
    }
    if let Some(secs) = cli.api_timeout {
        builder = builder.api_timeout_secs(secs);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// Whether reading `input_str` will need the pdfium library.
fn needs_pdfium(input_str: &str, format: DocumentFormat) -> bool {
    match format {
        DocumentFormat::Pdf => true,
        DocumentFormat::Text => false,
        DocumentFormat::Auto if input::is_url(input_str) => {
            input_str.to_ascii_lowercase().ends_with(".pdf")
        }
        DocumentFormat::Auto => matches!(
            document::detect_format(Path::new(input_str), format),
            Ok(DocumentFormat::Pdf)
        ),
    }
}

/// Download pdfium on first use, with a byte-level progress bar.
fn ensure_pdfium(quiet: bool) -> Result<()> {
    if quiet {
        return tokio::task::block_in_place(|| pdfium_auto::ensure_pdfium_library(None))
            .map(|_| ())
            .context("Failed to download PDFium engine");
    }

    let dl_bar = ProgressBar::new(0);
    dl_bar.set_style(
        ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {bytes}/{total_bytes}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS),
    );
    dl_bar.set_prefix("PDF engine");
    dl_bar.set_message("Connecting…");
    dl_bar.enable_steady_tick(Duration::from_millis(80));

    let bar = dl_bar.clone();
    tokio::task::block_in_place(|| {
        pdfium_auto::ensure_pdfium_library(Some(&|downloaded, total| {
            if let Some(t) = total {
                if bar.length().unwrap_or(0) != t {
                    bar.set_length(t);
                }
            }
            bar.set_position(downloaded);
        }))
    })
    .context("Failed to download PDFium engine")?;

    dl_bar.finish_with_message("ready ✓");
    Ok(())
}
