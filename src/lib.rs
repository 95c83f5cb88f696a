//! # texfill
//!
//! Fill LaTeX templates with values and compile them to PDF.
//!
//! ## Why this crate?
//!
//! LaTeX templates mark their variable parts in many ad-hoc ways — command
//! definitions, Jinja-style tokens, angle-bracket markers. Hand-written
//! regexes break on nested braces and raw user input breaks compilation.
//! This crate extracts a clean field schema from a template once (a single
//! LLM call), then fills and compiles it deterministically with no model in
//! the loop: values are LaTeX-escaped, substituted across every supported
//! placeholder convention, and compiled through an ordered chain of external
//! typesetting engines until one produces a PDF.
//!
//! ## Pipeline Overview
//!
//! ```text
//! extract:  template ──▶ LLM ──▶ field schema (id / label / default)
//!
//! fill:     template + values
//!            │
//!            ├─ 1. Inject    escape values, substitute placeholders
//!            ├─ 2. Workspace scratch dir scoped to the request
//!            ├─ 3. Compile   tectonic → pdflatex → xelatex → lualatex
//!            └─ 4. Output    PDF bytes + per-engine attempt log + stats
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use texfill::{extract_schema, generate, complete_values, GenerationConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let template = std::fs::read_to_string("letter.tex")?;
//!
//!     // Once per template: provider auto-detected from OPENAI_API_KEY /
//!     // ANTHROPIC_API_KEY / GEMINI_API_KEY
//!     let config = GenerationConfig::default();
//!     let schema = extract_schema(&template, &config).await?;
//!     for field in &schema {
//!         println!("{}: {}", field.id, field.label);
//!     }
//!
//!     // Once per fill: deterministic, no model call
//!     let values = complete_values(&schema, &Default::default());
//!     let output = generate(&template, &values, &config).await?;
//!     std::fs::write("letter.pdf", &output.pdf)?;
//!     eprintln!("compiled by {} in {}ms", output.engine, output.stats.duration_ms);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `texfill` binary (clap + anyhow + tracing-subscriber) |
//!
//! Disable `cli` when using only the library to avoid pulling in CLI-only deps:
//! ```toml
//! texfill = { version = "0.3", default-features = false }
//! ```
//!
//! ## Engines
//!
//! | Engine | Order | Notes |
//! |--------|-------|-------|
//! | `tectonic` | 1 | Self-contained, fetches packages on demand |
//! | `pdflatex` | 2 | Classic TeX Live engine |
//! | `xelatex`  | 3 | Unicode and system fonts |
//! | `lualatex` | 4 | Last resort, slowest startup |
//!
//! Only extraction needs an API key; filling needs at least one engine on
//! `PATH`. Override the chain with [`GenerationConfig::builder`].

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod generate;
pub mod output;
pub mod pipeline;
pub mod prompts;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{default_engines, EngineSpec, GenerationConfig, GenerationConfigBuilder};
pub use error::{FillError, StructureMarker};
pub use generate::{
    complete_values, extract_schema, extract_schema_from_input, generate, generate_from_input,
    generate_sync, generate_to_file,
};
pub use output::{
    CompilationAttempt, FieldDescriptor, FieldSchema, GenerationOutput, GenerationStats, ValueMap,
    PDF_CONTENT_TYPE, PDF_FILENAME,
};
pub use pipeline::compile::troubleshooting_hints;
