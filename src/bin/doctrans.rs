//! CLI binary for edgequake-doctrans.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `TranslationConfig` and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_doctrans::{
    clear_all_caches, inspect, translate_file, ConcurrencyMode, OutcomeStatus, ProgressCallback,
    StyleFilter, TranslationConfig, TranslationProgressCallback,
};
use indicatif::{ProgressBar, ProgressStyle};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
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

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() > max_chars {
        let head: String = s.chars().take(max_chars.saturating_sub(1)).collect();
        format!("{head}\u{2026}")
    } else {
        s.to_string()
    }
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: a live bar plus one log line per unit.
/// Units may complete out of order in bounded mode.
struct CliProgressCallback {
    bar: ProgressBar,
    start_times: Mutex<HashMap<usize, Instant>>,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    /// Spinner until `on_run_start` tells us how many units there are.
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
             [{bar:42.green/238}] {pos:>4}/{len} units  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Translating");
        self.bar.reset_eta();
    }

    fn elapsed(&self, unit_id: usize) -> String {
        self.start_times
            .lock()
            .remove(&unit_id)
            .map(|t| format!("{:.1}s", t.elapsed().as_secs_f64()))
            .unwrap_or_default()
    }
}

impl TranslationProgressCallback for CliProgressCallback {
    fn on_run_start(&self, total_units: usize) {
        self.activate_bar(total_units);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Translating {total_units} units…"))
        ));
    }

    fn on_unit_start(&self, unit_id: usize, _total: usize) {
        self.start_times.lock().insert(unit_id, Instant::now());
        self.bar.set_message(format!("unit {unit_id}"));
    }

    fn on_unit_complete(&self, unit_id: usize, total: usize, status: OutcomeStatus) {
        let (mark, note) = match status {
            OutcomeStatus::CachedHit => (cyan("↺"), dim("cached")),
            _ => (green("✓"), dim(&self.elapsed(unit_id))),
        };
        self.bar
            .println(format!("  {mark} Unit {unit_id:>4}/{total:<4}  {note}"));
        self.bar.inc(1);
    }

    fn on_unit_error(&self, unit_id: usize, total: usize, error: &str) {
        self.errors.fetch_add(1, Ordering::SeqCst);
        self.bar.println(format!(
            "  {} Unit {:>4}/{:<4}  {}  {}",
            red("✗"),
            unit_id,
            total,
            red(&truncate(error, 80)),
            dim(&self.elapsed(unit_id)),
        ));
        self.bar.inc(1);
    }

    fn on_run_complete(&self, total_units: usize, success_count: usize) {
        let failed = total_units.saturating_sub(success_count);
        self.bar.finish_and_clear();

        if failed == 0 {
            eprintln!(
                "{} {} units translated",
                green("✔"),
                bold(&success_count.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} units translated  ({} failed)",
                if failed == total_units {
                    red("✘")
                } else {
                    cyan("⚠")
                },
                bold(&success_count.to_string()),
                total_units,
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Translate Normal paragraphs to Spanish → translated_report.json
  doctrans report.json

  # French, headings too, explicit output file
  doctrans -t French --styles "Normal,Heading 1,Heading 2" report.json -o report.fr.json

  # Every style
  doctrans -t German --styles all report.json

  # Ignore cached French translations for this run
  doctrans -t French --clear-cache report.json

  # One request at a time
  doctrans --sequential report.json

  # List what would be translated (no API key needed)
  doctrans --inspect-only report.json

  # Wipe the whole translation cache
  doctrans --clear-all-caches

RE-RUNNING:
  Translations are inserted with the style of their source paragraph, so
  running doctrans over its own output translates everything again and
  appends a second translation below each paragraph.

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  GEMINI_API_KEY          Google Gemini API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL         Override model ID
  DOCTRANS_CACHE_PATH     SQLite cache file
  RUST_LOG                Log filter (overrides -v / -q)

  A .env file in the working directory is loaded first.
"#;

/// Translate styled documents with LLMs, inserting each translation below its source.
#[derive(Parser, Debug)]
#[command(
    name = "doctrans",
    version,
    about = "Translate styled documents with LLMs, inserting each translation below its source",
    long_about = "Translate the paragraphs of a styled-block document (local file or URL) with an \
LLM. Each translation is inserted as a new paragraph right after its source, with the same style \
and run formatting. Translations are cached in SQLite so repeated text is only paid for once.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local document path or HTTP/HTTPS URL.
    #[arg(required_unless_present = "clear_all_caches")]
    input: Option<String>,

    /// Language to translate into.
    #[arg(
        short,
        long,
        env = "DOCTRANS_TARGET_LANGUAGE",
        default_value = "Spanish"
    )]
    target_language: String,

    /// Output file. Default: translated_<input name> next to the input.
    #[arg(short, long, env = "DOCTRANS_OUTPUT")]
    output: Option<PathBuf>,

    /// Styles to translate: "all" or a comma-separated list.
    #[arg(long, env = "DOCTRANS_STYLES", default_value = "Normal",
          value_parser = StyleFilter::parse)]
    styles: StyleFilter,

    /// LLM model ID (e.g. gpt-4.1-nano, gpt-4.1, claude-sonnet-4-20250514).
    #[arg(long, env = "EDGEQUAKE_MODEL", default_value = "gpt-4.1-nano")]
    model: String,

    /// LLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(
        long,
        env = "EDGEQUAKE_LLM_PROVIDER",
        long_help = "LLM provider. Auto-detected from API key env vars if not set.\n\
          Supported: openai, anthropic, gemini, azure, ollama, or any OpenAI-compatible URL."
    )]
    provider: Option<String>,

    /// Maximum concurrent LLM calls.
    #[arg(short = 'c', long, env = "DOCTRANS_MAX_CONCURRENT", default_value_t = 5)]
    max_concurrent: usize,

    /// Translate one unit at a time, in document order.
    #[arg(long, env = "DOCTRANS_SEQUENTIAL", conflicts_with = "max_concurrent")]
    sequential: bool,

    /// Do not read or write the translation cache.
    #[arg(long, env = "DOCTRANS_NO_CACHE")]
    no_cache: bool,

    /// Fail instead of continuing without a cache when it cannot be opened.
    #[arg(long, env = "DOCTRANS_CACHE_REQUIRED", conflicts_with = "no_cache")]
    cache_required: bool,

    /// Drop cached translations for the target language before translating.
    #[arg(long)]
    clear_cache: bool,

    /// Delete every cached translation and exit.
    #[arg(long)]
    clear_all_caches: bool,

    /// SQLite cache file.
    #[arg(long, env = "DOCTRANS_CACHE_PATH")]
    cache_path: Option<PathBuf>,

    /// Path to a text file containing a custom system prompt ({language} is substituted).
    #[arg(long, env = "DOCTRANS_SYSTEM_PROMPT")]
    system_prompt: Option<PathBuf>,

    /// Max LLM output tokens per unit.
    #[arg(long, env = "DOCTRANS_MAX_TOKENS", default_value_t = 4096)]
    max_tokens: usize,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "DOCTRANS_TEMPERATURE", default_value_t = 0.3)]
    temperature: f32,

    /// Retries per unit on transient LLM failure.
    #[arg(long, env = "DOCTRANS_MAX_RETRIES", default_value_t = 3)]
    max_retries: u32,

    /// Exit with an error if any unit failed.
    #[arg(long, env = "DOCTRANS_STRICT")]
    strict: bool,

    /// Print the run report (or the unit list with --inspect-only) as JSON.
    #[arg(long, env = "DOCTRANS_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "DOCTRANS_NO_PROGRESS")]
    no_progress: bool,

    /// List the units that would be translated, no translation.
    #[arg(long)]
    inspect_only: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "DOCTRANS_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "DOCTRANS_QUIET")]
    quiet: bool,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "DOCTRANS_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Per-unit LLM call timeout in seconds.
    #[arg(long, env = "DOCTRANS_API_TIMEOUT", default_value_t = 60)]
    api_timeout: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env before parsing so `env = ...` attributes see its values.
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO-level library logs.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json && !cli.inspect_only;
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

    let progress_cb: Option<ProgressCallback> = if show_progress {
        let cb = CliProgressCallback::new_dynamic();
        Some(cb as Arc<dyn TranslationProgressCallback>)
    } else {
        None
    };

    let cancel = CancellationToken::new();
    let config = build_config(&cli, progress_cb, cancel.clone()).await?;

    // ── Cache maintenance ────────────────────────────────────────────────
    if cli.clear_all_caches {
        let removed = clear_all_caches(&config).context("Failed to clear the cache")?;
        if !cli.quiet {
            eprintln!(
                "{} removed {} cached translations from {}",
                green("✔"),
                removed,
                config.cache_path.display()
            );
        }
        return Ok(());
    }

    let input = cli
        .input
        .as_deref()
        .context("An input document is required")?;

    // ── Inspect-only mode ────────────────────────────────────────────────
    if cli.inspect_only {
        let units = inspect(input, &config)
            .await
            .context("Failed to inspect document")?;

        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&units).context("Failed to serialize units")?
            );
        } else {
            println!("File:    {}", input);
            println!("Styles:  {}", config.style_filter);
            println!("Units:   {}", units.len());
            for u in &units {
                println!(
                    "  {:>4}  {:<14} {}",
                    u.id,
                    truncate(&u.style_name, 14),
                    truncate(&u.source_text.replace('\n', " "), 72)
                );
            }
        }
        return Ok(());
    }

    // ── Ctrl-C: stop issuing new requests, keep what is done ─────────────
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!("{} interrupted, finishing in-flight requests…", cyan("⚠"));
                cancel.cancel();
            }
        });
    }

    // ── Run translation ──────────────────────────────────────────────────
    let run = translate_file(input, cli.output.as_deref(), &config)
        .await
        .context("Translation failed")?;
    let report = &run.report;

    if cli.json {
        let json = serde_json::to_string_pretty(&serde_json::json!({
            "output": run.output_path,
            "report": report,
        }))
        .context("Failed to serialise report")?;
        println!("{json}");
    } else if !cli.quiet {
        eprintln!(
            "{}  {} units: {} cached, {} translated, {} failed  {}ms  →  {}",
            if report.failed == 0 {
                green("✔")
            } else {
                cyan("⚠")
            },
            report.total_units,
            report.cached,
            report.translated,
            report.failed,
            report.duration_ms,
            bold(&run.output_path.display().to_string()),
        );
        eprintln!(
            "   {} API calls  /  {} cache hits  /  {} blocks inserted",
            dim(&report.remote_calls.to_string()),
            dim(&report.cached.to_string()),
            dim(&report.inserted.to_string()),
        );
        eprintln!(
            "   {} API tokens ({} in / {} out)  +  {} cached tokens",
            dim(&report.api_tokens.total().to_string()),
            dim(&report.api_tokens.prompt_tokens.to_string()),
            dim(&report.api_tokens.completion_tokens.to_string()),
            dim(&report.cached_tokens.to_string()),
        );
        if report.cancelled {
            eprintln!("   {}", cyan("run was cancelled; untranslated units were skipped"));
        }
        for failure in &report.failures {
            eprintln!("   {} {}", red("✗"), truncate(&failure.to_string(), 100));
        }
    }

    if cli.strict {
        run.report
            .into_result()
            .context("Some units were not translated")?;
    }

    Ok(())
}

/// Map CLI args to `TranslationConfig`.
async fn build_config(
    cli: &Cli,
    progress: Option<ProgressCallback>,
    cancel: CancellationToken,
) -> Result<TranslationConfig> {
    let concurrency = if cli.sequential {
        ConcurrencyMode::Sequential
    } else {
        ConcurrencyMode::Bounded(cli.max_concurrent)
    };

    let mut builder = TranslationConfig::builder()
        .target_language(&cli.target_language)
        .model(&cli.model)
        .style_filter(cli.styles.clone())
        .use_cache(!cli.no_cache)
        .cache_required(cli.cache_required)
        .clear_cache_first(cli.clear_cache)
        .concurrency(concurrency)
        .max_tokens(cli.max_tokens)
        .temperature(cli.temperature)
        .max_retries(cli.max_retries)
        .download_timeout_secs(cli.download_timeout)
        .api_timeout_secs(cli.api_timeout)
        .cancellation(cancel);

    if let Some(ref name) = cli.provider {
        builder = builder.provider_name(name);
    }
    if let Some(ref path) = cli.cache_path {
        builder = builder.cache_path(path);
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
