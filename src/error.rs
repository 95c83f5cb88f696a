//! Error types for the texfill library.
//!
//! One fatal error type, [`FillError`], covers the whole pipeline. Individual
//! compiler-engine failures are deliberately NOT errors: the chain records
//! them as [`crate::output::CompilationAttempt`] values and moves on to the
//! next candidate. Only exhaustion of every candidate surfaces here, as
//! [`FillError::CompilationFailed`] carrying the full ordered attempt list so
//! callers can show per-engine diagnostics.
//!
//! Workspace cleanup failures never appear in this enum at all. They are
//! logged as warnings and swallowed: by the time cleanup runs, the PDF (or
//! the terminal error) has already been produced.

use crate::output::CompilationAttempt;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Structural marker a LaTeX document must contain to be compilable.
///
/// Used by [`FillError::MissingStructure`] to name exactly which marker the
/// processed document lost.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StructureMarker {
    /// The `\documentclass` declaration.
    DocumentClass,
    /// The `\begin{document}` body start.
    BeginDocument,
}

impl StructureMarker {
    /// The literal text the marker must appear as in the document.
    pub fn as_text(&self) -> &'static str {
        match self {
            StructureMarker::DocumentClass => "\\documentclass",
            StructureMarker::BeginDocument => "\\begin{document}",
        }
    }
}

impl fmt::Display for StructureMarker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_text())
    }
}

/// All fatal errors returned by the texfill library.
#[derive(Debug, Error)]
pub enum FillError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Template file was not found at the given path.
    #[error("Template file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The input string is not a valid file path or URL.
    #[error("Invalid input '{input}': not a file path or a valid HTTP/HTTPS URL")]
    InvalidInput { input: String },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    // ── Template errors ───────────────────────────────────────────────────
    /// The input has no `\documentclass` declaration at all.
    #[error(
        "Template is not a LaTeX document: no \\documentclass declaration found.\n\
         Check that you supplied LaTeX source, not a rendered PDF or plain text."
    )]
    MalformedTemplate,

    /// The template exceeds the configured size bound.
    #[error(
        "Template is too large: {size} bytes (limit {limit}).\n\
         Split the document or raise max_template_bytes in the configuration."
    )]
    TemplateTooLarge { size: usize, limit: usize },

    // ── Extraction errors ─────────────────────────────────────────────────
    /// The field-extraction model call exceeded its time budget.
    #[error(
        "Field extraction timed out after {secs}s.\n\
         The model may be overloaded; try again or switch to a faster model."
    )]
    ExtractionTimeout { secs: u64 },

    /// The model responded, but no JSON field array could be parsed out.
    ///
    /// Carries both the raw response and the cleaned candidate text so the
    /// failure can be diagnosed without re-running the model.
    #[error(
        "Model output could not be parsed as a field list: {reason}\n\
         Cleaned candidate: {}",
        preview(.cleaned)
    )]
    InvalidModelOutput {
        reason: String,
        raw: String,
        cleaned: String,
    },

    /// Extraction and validation produced an empty schema.
    #[error(
        "No fillable fields were found in the template.\n\
         Mark fields with \\newcommand definitions, {{{{name}}}}, \\VAR{{name}} or <<name>> placeholders."
    )]
    NoFieldsFound,

    // ── Injection errors ──────────────────────────────────────────────────
    /// The processed document lost a required structural marker.
    #[error(
        "Document is missing required structure: '{marker}' not found after substitution.\n\
         A field value may have corrupted the document; check values for raw LaTeX."
    )]
    MissingStructure { marker: StructureMarker },

    // ── Compilation errors ────────────────────────────────────────────────
    /// Every configured engine failed. The ordered attempt list is the
    /// diagnostic record; see [`crate::pipeline::compile::troubleshooting_hints`].
    #[error(
        "PDF compilation failed: all {} engine(s) exhausted.\n\
         Tried: {}\nRun with RUST_LOG=debug for full engine logs.",
        .attempts.len(),
        attempt_summary(.attempts)
    )]
    CompilationFailed { attempts: Vec<CompilationAttempt> },

    /// The engine list in the configuration is empty.
    #[error("No compilation engines configured.\nProvide at least one engine or use the defaults.")]
    NoEnginesConfigured,

    // ── LLM errors ────────────────────────────────────────────────────────
    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// The LLM API returned an error.
    #[error("LLM API error: {message}")]
    ModelApiError { message: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the output PDF file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Truncate diagnostic text so multi-kilobyte model responses do not flood
/// the error message. The full text stays on the variant fields.
fn preview(text: &str) -> String {
    const MAX: usize = 200;
    let trimmed = text.trim();
    if trimmed.chars().count() <= MAX {
        trimmed.to_string()
    } else {
        let cut: String = trimmed.chars().take(MAX).collect();
        format!("{cut}…")
    }
}

/// One-line "name (outcome)" list for the CompilationFailed message.
fn attempt_summary(attempts: &[CompilationAttempt]) -> String {
    if attempts.is_empty() {
        return "(none)".to_string();
    }
    attempts
        .iter()
        .map(|a| {
            let outcome = match &a.error {
                Some(e) => e.as_str(),
                None if a.succeeded => "ok",
                None => "failed",
            };
            format!("{} ({})", a.engine, outcome)
        })
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attempt(engine: &str, succeeded: bool, error: Option<&str>) -> CompilationAttempt {
        CompilationAttempt {
            engine: engine.to_string(),
            command: format!("{engine} document.tex"),
            succeeded,
            error: error.map(str::to_string),
            log_tail: String::new(),
        }
    }

    #[test]
    fn missing_structure_names_marker() {
        let e = FillError::MissingStructure {
            marker: StructureMarker::BeginDocument,
        };
        let msg = e.to_string();
        assert!(msg.contains("\\begin{document}"), "got: {msg}");
    }

    #[test]
    fn compilation_failed_lists_engines() {
        let e = FillError::CompilationFailed {
            attempts: vec![
                attempt("tectonic", false, Some("exit status 1")),
                attempt("pdflatex", false, Some("not found")),
            ],
        };
        let msg = e.to_string();
        assert!(msg.contains("all 2 engine(s)"), "got: {msg}");
        assert!(msg.contains("tectonic (exit status 1)"));
        assert!(msg.contains("pdflatex (not found)"));
    }

    #[test]
    fn invalid_model_output_truncates_preview() {
        let e = FillError::InvalidModelOutput {
            reason: "expected array".into(),
            raw: "x".repeat(5000),
            cleaned: "y".repeat(5000),
        };
        let msg = e.to_string();
        assert!(msg.contains("expected array"));
        assert!(msg.len() < 1000, "preview not truncated: {} bytes", msg.len());
        assert!(msg.contains('…'));
    }

    #[test]
    fn template_too_large_display() {
        let e = FillError::TemplateTooLarge {
            size: 300_000,
            limit: 200_000,
        };
        let msg = e.to_string();
        assert!(msg.contains("300000"));
        assert!(msg.contains("200000"));
    }

    #[test]
    fn no_fields_found_mentions_conventions() {
        let msg = FillError::NoFieldsFound.to_string();
        assert!(msg.contains("\\VAR{name}"), "got: {msg}");
        assert!(msg.contains("<<name>>"));
    }
}
