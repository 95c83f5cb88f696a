//! CLI binary for texfill.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `GenerationConfig` and prints results.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use texfill::{
    default_engines, extract_schema_from_input, generate_from_input, troubleshooting_hints,
    FillError, GenerationConfig, ValueMap, PDF_FILENAME,
};
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

const AFTER_HELP: &str = r#"EXAMPLES:
  # Discover the fillable fields of a template (needs an API key)
  texfill extract letter.tex

  # Field schema as JSON, e.g. to feed a web form
  texfill extract letter.tex --json > schema.json

  # Fill and compile (no API key needed)
  texfill fill letter.tex -s name="Ada Lovelace" -s city=London -o letter.pdf

  # Values from a JSON object file; -s entries override it
  texfill fill letter.tex --values values.json -s date=2026-08-06

  # Fill a template straight from a URL
  texfill fill https://example.com/templates/invoice.tex -s total=42.00

  # Structured result (engine, attempts, stats) instead of a summary line
  texfill fill letter.tex -s name=Ada --json -o letter.pdf

  # Restrict and reorder the engine chain
  texfill fill letter.tex -s name=Ada --engines pdflatex,tectonic

  # Show which typesetting engines are installed
  texfill engines

TYPESETTING ENGINES (tried in order until one produces a PDF):
  Engine      Notes
  ─────────   ────────────────────────────────────────────────
  tectonic    self-contained, downloads packages on first run
  pdflatex    classic TeX Live engine
  xelatex     Unicode and system fonts
  lualatex    last resort, slowest startup

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          OpenAI API key (extraction only)
  ANTHROPIC_API_KEY       Anthropic API key (extraction only)
  GEMINI_API_KEY          Google Gemini API key (extraction only)
  EDGEQUAKE_LLM_PROVIDER  Override provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL         Override model ID

SETUP:
  1. Install an engine:  cargo install tectonic   (or apt install texlive)
  2. Set API key:        export OPENAI_API_KEY=sk-...   (extract only)
  3. Extract fields:     texfill extract letter.tex
  4. Fill and compile:   texfill fill letter.tex -s name=Ada -o letter.pdf
"#;

/// Fill LaTeX templates with values and compile them to PDF.
#[derive(Parser, Debug)]
#[command(
    name = "texfill",
    version,
    about = "Fill LaTeX templates with values and compile them to PDF",
    long_about = "Extract the fillable fields of a LaTeX template with an LLM, then fill and \
compile it deterministically. Extraction supports OpenAI, Anthropic, Google Gemini, and any \
OpenAI-compatible endpoint; compilation drives tectonic or a local TeX installation.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// LLM model ID for extraction (e.g. gpt-4.1-nano, gpt-4.1).
    #[arg(long, global = true, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// LLM provider for extraction: openai, anthropic, gemini, ollama.
    #[arg(long, global = true, env = "EDGEQUAKE_PROVIDER")]
    provider: Option<String>,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "TEXFILL_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "TEXFILL_QUIET")]
    quiet: bool,

    /// Disable the progress spinner.
    #[arg(long, global = true, env = "TEXFILL_NO_PROGRESS")]
    no_progress: bool,

    /// HTTP download timeout in seconds for URL templates.
    #[arg(long, global = true, env = "TEXFILL_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Extract the fillable-field schema from a template (one LLM call).
    Extract {
        /// Local template path or HTTP/HTTPS URL.
        input: String,

        /// Write the schema to this file instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Output the schema as a JSON array instead of a table.
        #[arg(long, env = "TEXFILL_JSON")]
        json: bool,

        /// Extraction model-call timeout in seconds.
        #[arg(long, env = "TEXFILL_EXTRACTION_TIMEOUT", default_value_t = 45)]
        timeout: u64,

        /// LLM temperature (0.0-2.0).
        #[arg(long, env = "TEXFILL_TEMPERATURE", default_value_t = 0.1)]
        temperature: f32,

        /// Max LLM output tokens for the schema response.
        #[arg(long, env = "TEXFILL_MAX_TOKENS", default_value_t = 2048)]
        max_tokens: usize,
    },

    /// Fill a template with values and compile it to PDF (no LLM).
    Fill {
        /// Local template path or HTTP/HTTPS URL.
        input: String,

        /// Field value as id=value. Repeatable; overrides --values entries.
        #[arg(short = 's', long = "set", value_name = "ID=VALUE")]
        set: Vec<String>,

        /// JSON file with a {"id": "value", ...} object.
        #[arg(long, value_name = "FILE")]
        values: Option<PathBuf>,

        /// Write the PDF here. Default: template name with .pdf extension.
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Print the structured result (engine, attempts, stats) as JSON.
        #[arg(long, env = "TEXFILL_JSON")]
        json: bool,

        /// Comma-separated engine chain override (subset of: tectonic,
        /// pdflatex, xelatex, lualatex), tried in the given order.
        #[arg(long, value_name = "NAMES")]
        engines: Option<String>,

        /// Per-engine compile timeout in seconds.
        #[arg(long, env = "TEXFILL_COMPILE_TIMEOUT", default_value_t = 45)]
        timeout: u64,
    },

    /// List the engine chain and whether each engine is installed.
    Engines,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Suppress INFO-level library logs when the spinner is active; the
    // spinner and the summary line provide the feedback that matters.
    let show_progress = !cli.quiet && !cli.no_progress;
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

    match cli.command {
        Command::Extract {
            ref input,
            ref output,
            json,
            timeout,
            temperature,
            max_tokens,
        } => {
            let config = extract_config(&cli, timeout, temperature, max_tokens)?;
            run_extract(input, output.as_deref(), json, show_progress, &config).await
        }
        Command::Fill {
            ref input,
            ref set,
            ref values,
            ref output,
            json,
            ref engines,
            timeout,
        } => {
            let config = fill_config(&cli, engines.as_deref(), timeout)?;
            let value_map = collect_values(set, values.as_deref()).await?;
            run_fill(
                input,
                &value_map,
                output.as_deref(),
                json,
                show_progress,
                cli.quiet,
                &config,
            )
            .await
        }
        Command::Engines => {
            run_engines();
            Ok(())
        }
    }
}

// ── Subcommand bodies ────────────────────────────────────────────────────────

async fn run_extract(
    input: &str,
    output: Option<&Path>,
    json: bool,
    show_progress: bool,
    config: &GenerationConfig,
) -> Result<()> {
    let bar = show_progress.then(|| spinner("Extracting", "asking the model for fields…"));

    let result = extract_schema_from_input(input, config).await;
    if let Some(ref bar) = bar {
        bar.finish_and_clear();
    }
    let schema = result.context("Extraction failed")?;

    let rendered = if json {
        serde_json::to_string_pretty(&schema).context("Failed to serialise schema")?
    } else {
        let mut table = String::new();
        for field in &schema {
            let default = if field.default.is_empty() {
                String::new()
            } else {
                format!("  {}", dim(&format!("(default: {})", field.default)))
            };
            table.push_str(&format!(
                "  {}  {}{}\n",
                bold(&format!("{:<20}", field.id)),
                field.label,
                default
            ));
        }
        table
    };

    if let Some(path) = output {
        tokio::fs::write(path, &rendered)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;
        eprintln!(
            "{} {} fields → {}",
            green("✔"),
            bold(&schema.len().to_string()),
            path.display()
        );
    } else if json {
        println!("{rendered}");
    } else {
        eprintln!(
            "{} {} fillable fields:",
            green("✔"),
            bold(&schema.len().to_string())
        );
        print!("{rendered}");
    }

    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn run_fill(
    input: &str,
    values: &ValueMap,
    output: Option<&Path>,
    json: bool,
    show_progress: bool,
    quiet: bool,
    config: &GenerationConfig,
) -> Result<()> {
    let bar = show_progress.then(|| spinner("Compiling", "running the engine chain…"));

    let result = generate_from_input(input, values, config).await;
    if let Some(ref bar) = bar {
        bar.finish_and_clear();
    }

    let output_struct = match result {
        Ok(o) => o,
        Err(FillError::CompilationFailed { ref attempts }) => {
            eprintln!("{} all engines failed:", red("✘"));
            for a in attempts {
                eprintln!(
                    "  {} {}  {}",
                    red("✗"),
                    bold(&a.engine),
                    dim(a.error.as_deref().unwrap_or("unknown error"))
                );
            }
            for hint in troubleshooting_hints(attempts) {
                eprintln!("  {} {hint}", cyan("→"));
            }
            bail!("Compilation failed after {} engine attempt(s)", attempts.len());
        }
        Err(e) => return Err(e).context("Generation failed"),
    };

    let path = match output {
        Some(p) => p.to_path_buf(),
        None => default_output_path(input),
    };
    tokio::fs::write(&path, &output_struct.pdf)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))?;

    if json {
        let rendered = serde_json::to_string_pretty(&output_struct)
            .context("Failed to serialise output")?;
        println!("{rendered}");
    } else if !quiet {
        eprintln!(
            "{}  {}  {}ms  →  {}",
            green("✔"),
            output_struct.engine,
            output_struct.stats.duration_ms,
            bold(&path.display().to_string()),
        );
        if output_struct.stats.engines_tried > 1 {
            eprintln!(
                "   {}",
                dim(&format!(
                    "{} engines tried before success",
                    output_struct.stats.engines_tried
                ))
            );
        }
    }

    Ok(())
}

fn run_engines() {
    for engine in default_engines() {
        let (mark, note) = if on_path(&engine.program) {
            (green("✔"), "installed".to_string())
        } else {
            (red("✘"), dim("not found on PATH"))
        };
        println!("  {mark} {:<10} {note}", bold(&engine.name));
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────────

/// Spinner-only progress indicator (no meaningful step count in either mode).
fn spinner(prefix: &str, msg: &str) -> ProgressBar {
    let bar = ProgressBar::new_spinner();
    bar.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]),
    );
    bar.set_prefix(prefix.to_string());
    bar.set_message(msg.to_string());
    bar.enable_steady_tick(Duration::from_millis(80));
    bar
}

/// Merge `--values` file entries with `-s id=value` pairs (pairs win).
async fn collect_values(set: &[String], values_file: Option<&Path>) -> Result<ValueMap> {
    let mut map: ValueMap = HashMap::new();

    if let Some(path) = values_file {
        let text = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read values file {}", path.display()))?;
        let parsed: HashMap<String, String> = serde_json::from_str(&text).with_context(|| {
            format!(
                "{} must contain a JSON object of string values",
                path.display()
            )
        })?;
        map.extend(parsed);
    }

    for pair in set {
        let Some((id, value)) = pair.split_once('=') else {
            bail!("Invalid --set entry '{pair}': expected id=value");
        };
        let id = id.trim();
        if id.is_empty() {
            bail!("Invalid --set entry '{pair}': empty field id");
        }
        map.insert(id.to_string(), value.to_string());
    }

    Ok(map)
}

/// Default PDF path: template file name with a .pdf extension, or
/// `filled.pdf` when the input was a URL.
fn default_output_path(input: &str) -> PathBuf {
    if input.starts_with("http://") || input.starts_with("https://") {
        return PathBuf::from(PDF_FILENAME);
    }
    let path = Path::new(input);
    match path.file_stem() {
        Some(stem) => PathBuf::from(stem).with_extension("pdf"),
        None => PathBuf::from(PDF_FILENAME),
    }
}

/// Check whether `program` resolves to an executable file.
fn on_path(program: &str) -> bool {
    if program.contains(std::path::MAIN_SEPARATOR) {
        return Path::new(program).is_file();
    }
    std::env::var_os("PATH")
        .map(|paths| std::env::split_paths(&paths).any(|dir| dir.join(program).is_file()))
        .unwrap_or(false)
}

/// Map CLI args to a `GenerationConfig` for extraction.
fn extract_config(
    cli: &Cli,
    timeout: u64,
    temperature: f32,
    max_tokens: usize,
) -> Result<GenerationConfig> {
    let mut config = GenerationConfig::builder()
        .temperature(temperature)
        .max_tokens(max_tokens)
        .extraction_timeout_secs(timeout)
        .download_timeout_secs(cli.download_timeout)
        .build()
        .context("Invalid configuration")?;

    // The builder has no setters for these; they pass straight through.
    config.model = cli.model.clone();
    config.provider_name = cli.provider.clone();

    Ok(config)
}

/// Map CLI args to a `GenerationConfig` for filling.
fn fill_config(cli: &Cli, engines: Option<&str>, timeout: u64) -> Result<GenerationConfig> {
    let mut builder = GenerationConfig::builder()
        .compile_timeout_secs(timeout)
        .download_timeout_secs(cli.download_timeout);

    if let Some(names) = engines {
        builder = builder.engines(parse_engines(names)?);
    }

    builder.build().context("Invalid configuration")
}

/// Parse `--engines` into an ordered chain drawn from the known engines.
fn parse_engines(names: &str) -> Result<Vec<texfill::EngineSpec>> {
    let known = default_engines();
    let mut chain = Vec::new();

    for name in names.split(',') {
        let name = name.trim().to_lowercase();
        if name.is_empty() {
            continue;
        }
        match known.iter().find(|e| e.name == name) {
            Some(spec) => chain.push(spec.clone()),
            None => bail!(
                "Unknown engine '{}'. Known engines: {}",
                name,
                known
                    .iter()
                    .map(|e| e.name.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        }
    }

    if chain.is_empty() {
        bail!("--engines selected no engines");
    }

    Ok(chain)
}
