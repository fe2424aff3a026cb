//! CLI binary for doc2md.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ConversionConfig` and writes results.

use anyhow::{Context, Result};
use clap::Parser;
use doc2md::convert::write_markdown;
use doc2md::pipeline::input::read_source;
use doc2md::{ConversionConfig, ConversionResult, Converter, SourceDocument};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Convert next to the input (writes relatorio.md)
  doc2md relatorio.docx

  # Convert to a chosen file or directory
  doc2md contrato.pdf -o out/contrato.md
  doc2md contrato.pdf -o out/

  # OCR a photo, print to stdout
  GOOGLE_VISION_API_KEY=... doc2md recibo.jpg --stdout

  # Force the media type of a file without a useful extension
  doc2md upload.bin --media-type image/png --stdout

  # JSON output (markdown + suggested file name + kind)
  doc2md relatorio.docx --json > result.json

SUPPORTED INPUTS:
  .docx                 headings, lists, bold/italic, tables
  .pdf                  embedded text layer; scans get a guidance note
  image/* (png, jpg…)   OCR via Google Cloud Vision (needs an API key)

ENVIRONMENT VARIABLES:
  GOOGLE_VISION_API_KEY   Enables OCR for images
  PDFIUM_LIB_PATH         Path to libpdfium (default: system library search)
  DOC2MD_VISION_ENDPOINT  Override the Vision annotate endpoint
  DOC2MD_OCR_TIMEOUT      OCR request timeout in seconds
  RUST_LOG                Log filter (overrides -v / -q)

A .env file in the working directory is loaded before flags are parsed.
"#;

/// Convert DOCX, PDF and image files to Markdown.
#[derive(Parser, Debug)]
#[command(
    name = "doc2md",
    version,
    about = "Convert DOCX, PDF and image files to Markdown",
    long_about = "Convert DOCX documents, PDFs with a text layer, and images (via OCR) to \
normalised Markdown. Scanned PDFs and images without OCR credentials produce a short \
guidance document instead of failing.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local DOCX, PDF or image file.
    input: PathBuf,

    /// Output file, or an existing directory to write `<name>.md` into.
    /// Default: `<name>.md` next to the input.
    #[arg(short, long, env = "DOC2MD_OUTPUT")]
    output: Option<PathBuf>,

    /// Declared media type; guessed from the extension when omitted.
    #[arg(long, env = "DOC2MD_MEDIA_TYPE")]
    media_type: Option<String>,

    /// Print Markdown to stdout instead of writing a file.
    #[arg(long, conflicts_with = "output")]
    stdout: bool,

    /// Print the result as JSON (markdown, suggested_file_name, kind).
    #[arg(long, env = "DOC2MD_JSON", conflicts_with = "output")]
    json: bool,

    /// Google Cloud Vision API key; OCR is disabled without it.
    #[arg(long, env = "GOOGLE_VISION_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Vision annotate endpoint.
    #[arg(long, env = "DOC2MD_VISION_ENDPOINT", default_value = doc2md::config::DEFAULT_VISION_ENDPOINT)]
    vision_endpoint: String,

    /// OCR request timeout in seconds.
    #[arg(long, env = "DOC2MD_OCR_TIMEOUT", default_value_t = 90)]
    ocr_timeout: u64,

    /// OCR language hint (BCP-47, e.g. pt); repeatable.
    #[arg(long = "language-hint", value_name = "LANG")]
    language_hints: Vec<String>,

    /// Path to the pdfium shared library.
    #[arg(long, env = "PDFIUM_LIB_PATH")]
    pdfium_lib: Option<PathBuf>,

    /// Maximum input size in bytes.
    #[arg(long, env = "DOC2MD_MAX_SIZE", default_value_t = 10 * 1024 * 1024)]
    max_size: u64,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "DOC2MD_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "DOC2MD_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Missing .env is normal; a malformed one is not worth aborting for.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Build config ─────────────────────────────────────────────────────
    let config = build_config(&cli)?;
    tracing::debug!("Configuration: {:?}", config);

    // ── Read input ───────────────────────────────────────────────────────
    let source = read_source(&cli.input, config.max_input_bytes)
        .await
        .with_context(|| format!("Failed to read {}", cli.input.display()))?;
    let source = match cli.media_type {
        Some(ref media_type) => {
            let name = source.declared_name().to_string();
            SourceDocument::new(source.into_bytes(), name, media_type.clone())
        }
        None => source,
    };

    // ── Run conversion ───────────────────────────────────────────────────
    let progress = (!cli.quiet && !cli.json && !cli.stdout).then(|| spinner(source.declared_name()));
    let start = Instant::now();
    let converter = Converter::new(config);
    let outcome = converter.convert(source).await;
    if let Some(ref bar) = progress {
        bar.finish_and_clear();
    }
    let result = outcome.context("Conversion failed")?;

    // ── Deliver ──────────────────────────────────────────────────────────
    if cli.json {
        let json = serde_json::to_string_pretty(&result).context("Failed to serialise output")?;
        println!("{json}");
    } else if cli.stdout {
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        handle
            .write_all(result.markdown.as_bytes())
            .context("Failed to write to stdout")?;
        // Ensure a trailing newline on stdout.
        if !result.markdown.ends_with('\n') {
            handle.write_all(b"\n").ok();
        }
    } else {
        let path = output_path(&cli.input, cli.output.as_deref(), &result);
        write_markdown(&path, &result.markdown)
            .await
            .context("Failed to write Markdown")?;
        if !cli.quiet {
            report(&result, &path, start.elapsed());
        }
    }

    Ok(())
}

/// Map CLI args to `ConversionConfig`.
fn build_config(cli: &Cli) -> Result<ConversionConfig> {
    let mut builder = ConversionConfig::builder()
        .maybe_ocr_api_key(cli.api_key.clone())
        .vision_endpoint(cli.vision_endpoint.clone())
        .ocr_timeout_secs(cli.ocr_timeout)
        .ocr_language_hints(cli.language_hints.iter().cloned())
        .max_input_bytes(cli.max_size);

    if let Some(ref path) = cli.pdfium_lib {
        builder = builder.pdfium_library_path(path.clone());
    }

    builder.build().context("Invalid configuration")
}

/// Where to write the Markdown: `--output` (file or existing directory), or
/// the suggested name next to the input.
fn output_path(input: &Path, output: Option<&Path>, result: &ConversionResult) -> PathBuf {
    match output {
        Some(dir) if dir.is_dir() => dir.join(&result.suggested_file_name),
        Some(file) => file.to_path_buf(),
        None => input
            .parent()
            .unwrap_or_else(|| Path::new(""))
            .join(&result.suggested_file_name),
    }
}

fn spinner(name: &str) -> ProgressBar {
    let bar = ProgressBar::new_spinner();
    bar.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  {elapsed}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]),
    );
    bar.set_prefix("Converting");
    bar.set_message(name.to_string());
    bar.enable_steady_tick(Duration::from_millis(80));
    bar
}

fn report(result: &ConversionResult, path: &Path, elapsed: Duration) {
    let guidance = [
        doc2md::PDF_NO_TEXT_GUIDANCE,
        doc2md::OCR_DISABLED_MESSAGE,
        doc2md::OCR_NO_TEXT_MESSAGE,
    ]
    .contains(&result.markdown.as_str());
    let mark = if guidance { yellow("⚠") } else { green("✔") };
    eprintln!(
        "{}  {:?}  {}  {}ms  →  {}",
        mark,
        result.kind,
        dim(&format!("{} chars", result.markdown.len())),
        elapsed.as_millis(),
        bold(&path.display().to_string()),
    );
    if guidance {
        eprintln!("   {}", dim("no text extracted; the file contains guidance instead"));
    }
}
