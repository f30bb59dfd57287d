//! CLI binary for edgequake-img2txt.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `RunConfig` and prints the run summary.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_img2txt::{
    run_once, OcrError, PerImageResult, ProgressCallback, RunConfig, RunProgressCallback,
    RunSummary,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::warn;
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

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: a live bar plus one log line per image.
/// Images finish out of order, so lines are printed in completion order.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    /// Spinner until `on_run_start` reports how many images were found.
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Checking API key…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self { bar })
    }

    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} images  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Transcribing");
        self.bar.reset_eta();
    }
}

impl RunProgressCallback for CliProgressCallback {
    fn on_run_start(&self, total: usize) {
        self.activate_bar(total);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Transcribing {total} images…"))
        ));
    }

    fn on_image_complete(&self, completed: usize, total: usize, result: &PerImageResult) {
        let secs = dim(&format!("{:.1}s", result.duration_ms as f64 / 1000.0));
        match &result.error {
            None => self.bar.println(format!(
                "  {} {:>4}/{:<4} {:<24} {}  {}",
                green("✓"),
                completed,
                total,
                result.name,
                dim(result.date.as_deref().unwrap_or("")),
                secs,
            )),
            Some(e) => {
                // Truncate very long error messages to keep output tidy.
                let msg = e.to_string();
                let msg = if msg.chars().count() > 80 {
                    format!("{}\u{2026}", msg.chars().take(79).collect::<String>())
                } else {
                    msg
                };
                self.bar.println(format!(
                    "  {} {:>4}/{:<4} {:<24} {}  {}",
                    red("✗"),
                    completed,
                    total,
                    result.name,
                    red(&msg),
                    secs,
                ));
            }
        }
        self.bar.set_position(completed as u64);
    }

    fn on_run_complete(&self, summary: &RunSummary) {
        self.bar.finish_and_clear();
        let ok = summary.processed_count - summary.failed_count;
        if summary.failed_count == 0 {
            eprintln!("{} {} images transcribed", green("✔"), bold(&ok.to_string()));
        } else {
            eprintln!(
                "{} {}/{} images transcribed  ({} failed)",
                if ok == 0 { red("✘") } else { cyan("⚠") },
                bold(&ok.to_string()),
                summary.processed_count,
                red(&summary.failed_count.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Transcribe every image in the current directory into ./output.txt
  img2txt

  # Transcribe a folder of journal scans, seeding the first date
  img2txt ~/scans/2024 --start-date "Sunday, December 31, 2023"

  # Write the transcript elsewhere, 4 images at a time
  img2txt ~/scans/2024 -o ~/journal-2024.txt -c 4

  # Machine-readable summary and per-image results
  img2txt ~/scans --json > report.json

SUPPORTED IMAGES:
  jpg, jpeg, png, gif, bmp, webp (case-insensitive, top level only)

OUTPUT FORMAT:
  ---
  IMG_0001.jpg
  Monday, January 1, 2024
  <transcription>

  Pages without a date reuse the last date seen (or --start-date).

COST (gpt-4o, default pricing):
  $0.01 per 1K input tokens, $0.03 per 1K output tokens. Every attempt
  is billed, including retries.

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          API key for the recognition service
  RUST_LOG                Override log filter (e.g. edgequake_img2txt=debug)
"#;

/// Transcribe a directory of page images into one dated text file.
#[derive(Parser, Debug)]
#[command(
    name = "img2txt",
    version,
    about = "Transcribe a directory of page images into one dated text file using Vision LLMs",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Directory containing the images.
    #[arg(default_value = ".", env = "IMG2TXT_INPUT_DIR")]
    input_dir: PathBuf,

    /// Transcript file; relative paths are resolved against the input directory.
    #[arg(short, long, env = "IMG2TXT_OUTPUT", default_value = "output.txt")]
    output: PathBuf,

    /// API key (falls back to OPENAI_API_KEY).
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Vision model ID.
    #[arg(long, env = "IMG2TXT_MODEL", default_value = "gpt-4o")]
    model: String,

    /// Base URL of an OpenAI-compatible API.
    #[arg(long, env = "IMG2TXT_BASE_URL", default_value = "https://api.openai.com/v1")]
    base_url: String,

    /// Number of images processed at once.
    #[arg(short, long, env = "IMG2TXT_CONCURRENCY", default_value_t = 10,
          value_parser = clap::value_parser!(u32).range(1..))]
    concurrency: u32,

    /// Date used for leading images that carry no date of their own.
    #[arg(long, env = "IMG2TXT_START_DATE")]
    start_date: Option<String>,

    /// Longest-side cap in pixels applied before upload.
    #[arg(long, env = "IMG2TXT_MAX_DIMENSION", default_value_t = 1500,
          value_parser = clap::value_parser!(u32).range(1..))]
    max_dimension: u32,

    /// Max model output tokens per image.
    #[arg(long, env = "IMG2TXT_MAX_TOKENS", default_value_t = 4096)]
    max_tokens: u32,

    /// Model temperature (0.0–2.0).
    #[arg(long, env = "IMG2TXT_TEMPERATURE", default_value_t = 0.1)]
    temperature: f32,

    /// Per-request timeout in seconds.
    #[arg(long, env = "IMG2TXT_API_TIMEOUT", default_value_t = 120)]
    api_timeout: u64,

    /// Path to a text file containing a custom system prompt.
    #[arg(long, env = "IMG2TXT_SYSTEM_PROMPT")]
    system_prompt: Option<PathBuf>,

    /// Print the run report as JSON on stdout.
    #[arg(long, env = "IMG2TXT_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "IMG2TXT_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "IMG2TXT_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "IMG2TXT_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO logs; verbose mode always shows everything.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
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

    // ── Cancellation on Ctrl-C / SIGTERM ─────────────────────────────────
    let cancel = CancellationToken::new();
    tokio::spawn(cancel_on_signal(cancel.clone()));

    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new_dynamic() as Arc<dyn RunProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, progress_cb).await?;
    let output_path = config.resolved_output_path();

    // ── Run ──────────────────────────────────────────────────────────────
    let report = match run_once(&config, &cancel).await {
        Ok(report) => report,
        Err(OcrError::Cancelled { completed, total }) => {
            eprintln!(
                "{} Cancelled after {completed}/{total} images; no transcript written",
                red("✘")
            );
            std::process::exit(130);
        }
        Err(e) => return Err(e).context("Transcription failed"),
    };

    if cli.json {
        let json = serde_json::to_string_pretty(&report).context("Failed to serialise report")?;
        println!("{json}");
        return Ok(());
    }

    if !cli.quiet {
        print_summary(&report.summary, &output_path);
    }

    Ok(())
}

/// Map CLI args to `RunConfig`.
async fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<RunConfig> {
    let mut builder = RunConfig::builder()
        .input_dir(&cli.input_dir)
        .output_path(&cli.output)
        .model(&cli.model)
        .api_base_url(&cli.base_url)
        .concurrency(cli.concurrency as usize)
        .max_dimension(cli.max_dimension)
        .max_tokens(cli.max_tokens)
        .temperature(cli.temperature)
        .api_timeout_secs(cli.api_timeout);

    if let Some(ref key) = cli.api_key {
        builder = builder.api_key(key);
    }
    if let Some(ref date) = cli.start_date {
        builder = builder.start_date(date);
    }
    if let Some(ref path) = cli.system_prompt {
        let prompt = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read system prompt from {:?}", path))?;
        builder = builder.system_prompt(prompt);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

fn print_summary(summary: &RunSummary, output_path: &std::path::Path) {
    eprintln!(
        "{}  {} images  →  {}",
        if summary.failed_count == 0 {
            green("✔")
        } else {
            cyan("⚠")
        },
        summary.processed_count,
        bold(&output_path.display().to_string()),
    );
    eprintln!(
        "   Total cost: {}   per image: {}",
        bold(&format!("${:.4}", summary.total_cost)),
        dim(&format!("${:.4}", summary.cost_per_image)),
    );
    eprintln!(
        "   Attempts:   {}   per image: {}",
        summary.total_attempts,
        dim(&format!("{:.2}", summary.attempts_per_image)),
    );
    eprintln!(
        "   Time:       {:.1}s   per image: {}",
        summary.total_duration_ms as f64 / 1000.0,
        dim(&format!("{:.1}s", summary.time_per_image_ms / 1000.0)),
    );
}

/// Cancel `token` on the first Ctrl-C (or SIGTERM on Unix).
async fn cancel_on_signal(token: CancellationToken) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = term.recv() => {}
                }
            }
            Err(e) => {
                warn!("SIGTERM handler unavailable: {}", e);
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
    token.cancel();
}
