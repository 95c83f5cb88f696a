//! Compiler chain: drive external typesetting engines until one produces a PDF.
//!
//! The chain is an explicit loop over an immutable ordered candidate list
//! (`pending → trying(i) → success | trying(i+1) | exhausted`). Each engine
//! gets exactly one attempt per request; per-engine failures are recorded,
//! not raised, and only exhaustion of the whole list becomes an error.
//!
//! ## Success criterion
//!
//! A zero exit code alone is not success. Some engines exit 0 after writing
//! only a log, so an attempt succeeds only when the process exited cleanly
//! AND `document.pdf` exists in the workspace. Failed attempts delete any
//! partial artifact so a stale file cannot satisfy the next attempt's check.
//!
//! ## Timeouts
//!
//! Each attempt runs under `tokio::time::timeout` with `kill_on_drop` set,
//! so a hung engine is killed when the timeout fires rather than orphaned.
//! The default budget is generous because tectonic fetches missing packages
//! on first run.

use crate::config::{EngineSpec, GenerationConfig};
use crate::error::FillError;
use crate::output::CompilationAttempt;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tokio::time::{sleep, timeout, Duration};
use tracing::{debug, info, warn};

/// Fixed source filename inside the workspace.
pub const SOURCE_FILENAME: &str = "document.tex";
/// Fixed output artifact every engine is expected to produce.
pub const ARTIFACT_FILENAME: &str = "document.pdf";
/// Compiler log artifact, prefixed into the captured output when present.
pub const LOG_FILENAME: &str = "document.log";

/// Materialise `document` in `workspace` and run the engine chain.
///
/// Returns the PDF bytes and the full ordered attempt list (including the
/// successful attempt) or [`FillError::CompilationFailed`] carrying every
/// attempt when the chain is exhausted.
pub async fn compile(
    workspace: &Path,
    document: &str,
    config: &GenerationConfig,
) -> Result<(Vec<u8>, Vec<CompilationAttempt>), FillError> {
    if config.engines.is_empty() {
        return Err(FillError::NoEnginesConfigured);
    }

    let source_path = workspace.join(SOURCE_FILENAME);
    tokio::fs::write(&source_path, document)
        .await
        .map_err(|e| FillError::Internal(format!("failed to write {SOURCE_FILENAME}: {e}")))?;

    let artifact_path = workspace.join(ARTIFACT_FILENAME);
    let mut attempts: Vec<CompilationAttempt> = Vec::with_capacity(config.engines.len());

    for (i, engine) in config.engines.iter().enumerate() {
        if i > 0 && config.engine_backoff_ms > 0 {
            sleep(Duration::from_millis(config.engine_backoff_ms)).await;
        }

        info!(engine = %engine.name, attempt = i + 1, total = config.engines.len(), "invoking engine");
        let attempt = run_engine(workspace, engine, config).await;

        if attempt.succeeded {
            let pdf = tokio::fs::read(&artifact_path).await.map_err(|e| {
                FillError::Internal(format!("failed to read {ARTIFACT_FILENAME}: {e}"))
            })?;
            info!(engine = %engine.name, pdf_bytes = pdf.len(), "compilation succeeded");
            attempts.push(attempt);
            return Ok((pdf, attempts));
        }

        warn!(
            engine = %engine.name,
            error = attempt.error.as_deref().unwrap_or("unknown"),
            "engine attempt failed"
        );

        // A failed run may still have written a partial PDF; remove it so it
        // cannot satisfy the next attempt's existence check.
        if artifact_path.exists() {
            if let Err(e) = tokio::fs::remove_file(&artifact_path).await {
                debug!(error = %e, "could not remove stale artifact");
            }
        }

        attempts.push(attempt);
    }

    Err(FillError::CompilationFailed { attempts })
}

/// Run one engine to completion (or timeout) and record the attempt.
async fn run_engine(
    workspace: &Path,
    engine: &EngineSpec,
    config: &GenerationConfig,
) -> CompilationAttempt {
    let command = command_line(engine);
    let mut attempt = CompilationAttempt {
        engine: engine.name.clone(),
        command,
        succeeded: false,
        error: None,
        log_tail: String::new(),
    };

    let child = Command::new(&engine.program)
        .args(&engine.args)
        .arg(SOURCE_FILENAME)
        .current_dir(workspace)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn();

    let child = match child {
        Ok(c) => c,
        Err(e) => {
            attempt.error = Some(format!("failed to start: {e}"));
            return attempt;
        }
    };

    let budget = Duration::from_secs(config.compile_timeout_secs);
    let output = match timeout(budget, child.wait_with_output()).await {
        Err(_) => {
            // Dropping the wait future drops the child handle; kill_on_drop
            // reaps the hung process.
            attempt.error = Some(format!(
                "timed out after {}s",
                config.compile_timeout_secs
            ));
            return attempt;
        }
        Ok(Err(e)) => {
            attempt.error = Some(format!("failed to collect output: {e}"));
            return attempt;
        }
        Ok(Ok(o)) => o,
    };

    let mut captured = String::new();
    let log_path = workspace.join(LOG_FILENAME);
    if let Ok(log) = tokio::fs::read_to_string(&log_path).await {
        captured.push_str(&log);
        captured.push('\n');
    }
    captured.push_str(&String::from_utf8_lossy(&output.stdout));
    captured.push_str(&String::from_utf8_lossy(&output.stderr));
    attempt.log_tail = bounded_tail(&captured, config.log_tail_chars);

    let artifact_exists = workspace.join(ARTIFACT_FILENAME).exists();
    match (output.status.success(), artifact_exists) {
        (true, true) => attempt.succeeded = true,
        (true, false) => {
            attempt.error = Some("engine exited cleanly but produced no PDF".into());
        }
        (false, _) => {
            attempt.error = Some(match output.status.code() {
                Some(code) => format!("exit status {code}"),
                None => "terminated by signal".into(),
            });
        }
    }
    attempt
}

/// Render the full command line for attempt records.
fn command_line(engine: &EngineSpec) -> String {
    let mut parts = Vec::with_capacity(engine.args.len() + 2);
    parts.push(engine.program.clone());
    parts.extend(engine.args.iter().cloned());
    parts.push(SOURCE_FILENAME.to_string());
    parts.join(" ")
}

/// Last `max_chars` characters of `s`, char-boundary safe.
fn bounded_tail(s: &str, max_chars: usize) -> String {
    let count = s.chars().count();
    if count <= max_chars {
        s.to_string()
    } else {
        s.chars().skip(count - max_chars).collect()
    }
}

/// Derive ordered troubleshooting hints from a failed attempt list.
///
/// Advisory text only: scans attempt logs for known LaTeX failure
/// signatures. Control flow never depends on the result.
pub fn troubleshooting_hints(attempts: &[CompilationAttempt]) -> Vec<String> {
    let mut hints: Vec<String> = Vec::new();
    let mut push = |hint: &str| {
        if !hints.iter().any(|h| h == hint) {
            hints.push(hint.to_string());
        }
    };

    let all_spawn_failures = !attempts.is_empty()
        && attempts.iter().all(|a| {
            a.error
                .as_deref()
                .is_some_and(|e| e.starts_with("failed to start"))
        });
    if all_spawn_failures {
        push(
            "No typesetting engine could be started. Install tectonic \
             (https://tectonic-typesetting.github.io) or a TeX distribution \
             providing pdflatex.",
        );
    }

    for a in attempts {
        let log = &a.log_tail;
        if log.contains("! Undefined control sequence") {
            push(
                "The document uses an undefined command. A field value may \
                 contain raw LaTeX, or the template needs an extra package.",
            );
        }
        if log.contains("! LaTeX Error: File `") || log.contains("not found.") {
            push(
                "A file or package the template needs is missing. Install the \
                 package or let tectonic fetch it automatically.",
            );
        }
        if log.contains("Emergency stop") {
            push(
                "The engine aborted before producing output, usually a missing \
                 input file or an unreadable preamble.",
            );
        }
        if log.contains("! LaTeX Error:") {
            push("See the log tail of each attempt for the exact LaTeX error line.");
        }
        if a.error.as_deref().is_some_and(|e| e.starts_with("timed out")) {
            push(
                "An engine timed out. First runs of tectonic download packages; \
                 retry once or raise compile_timeout_secs.",
            );
        }
    }

    hints
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attempt(error: Option<&str>, log_tail: &str) -> CompilationAttempt {
        CompilationAttempt {
            engine: "fake".into(),
            command: "fake document.tex".into(),
            succeeded: false,
            error: error.map(str::to_string),
            log_tail: log_tail.into(),
        }
    }

    #[test]
    fn bounded_tail_short_input_unchanged() {
        assert_eq!(bounded_tail("abc", 10), "abc");
    }

    #[test]
    fn bounded_tail_keeps_last_chars() {
        assert_eq!(bounded_tail("abcdefgh", 3), "fgh");
    }

    #[test]
    fn bounded_tail_is_char_boundary_safe() {
        let s = "héllo wörld";
        let tail = bounded_tail(s, 4);
        assert_eq!(tail, "örld");
    }

    #[test]
    fn command_line_includes_source() {
        let e = EngineSpec::new("tectonic", "tectonic", &["--outdir", "."]);
        assert_eq!(command_line(&e), "tectonic --outdir . document.tex");
    }

    #[test]
    fn hints_detect_undefined_control_sequence() {
        let hints = troubleshooting_hints(&[attempt(
            Some("exit status 1"),
            "! Undefined control sequence.\nl.12 \\unknowncmd",
        )]);
        assert!(hints.iter().any(|h| h.contains("undefined command")), "{hints:?}");
    }

    #[test]
    fn hints_detect_all_engines_missing() {
        let hints = troubleshooting_hints(&[
            attempt(Some("failed to start: No such file"), ""),
            attempt(Some("failed to start: No such file"), ""),
        ]);
        assert!(hints.iter().any(|h| h.contains("could be started")), "{hints:?}");
    }

    #[test]
    fn hints_detect_timeout() {
        let hints = troubleshooting_hints(&[attempt(Some("timed out after 45s"), "")]);
        assert!(hints.iter().any(|h| h.contains("timed out")), "{hints:?}");
    }

    #[test]
    fn hints_deduplicate() {
        let a = attempt(Some("exit status 1"), "! LaTeX Error: something");
        let hints = troubleshooting_hints(&[a.clone(), a]);
        let errors: Vec<_> = hints.iter().filter(|h| h.contains("log tail")).collect();
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn no_attempts_no_hints() {
        assert!(troubleshooting_hints(&[]).is_empty());
    }

    #[tokio::test]
    async fn empty_engine_list_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let config = GenerationConfig {
            engines: vec![],
            ..GenerationConfig::default()
        };
        let err = compile(dir.path(), "\\documentclass{article}", &config)
            .await
            .unwrap_err();
        assert!(matches!(err, FillError::NoEnginesConfigured));
    }
}
