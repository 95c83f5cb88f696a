//! Integration tests for the engine fallback chain and the generation path.
//!
//! These tests use `/bin/sh` scripts as stand-in engines, so they exercise
//! the real process-spawning code without needing any TeX installation.
//! Unix-only for that reason; the library itself is platform-neutral.

#![cfg(unix)]

use std::path::PathBuf;
use texfill::pipeline::compile::{compile, ARTIFACT_FILENAME, SOURCE_FILENAME};
use texfill::{generate, EngineSpec, FillError, GenerationConfig, ValueMap};

// ── Test helpers ─────────────────────────────────────────────────────────────

/// A fake engine: `/bin/sh -c <script>` run inside the workspace. The chain
/// appends the source filename, which lands in `$0` and is ignored.
fn sh_engine(name: &str, script: &str) -> EngineSpec {
    EngineSpec::new(name, "/bin/sh", &["-c", script])
}

fn chain_config(engines: Vec<EngineSpec>) -> GenerationConfig {
    GenerationConfig::builder()
        .engines(engines)
        .engine_backoff_ms(0)
        .compile_timeout_secs(5)
        .build()
        .expect("valid config")
}

const MINIMAL_DOC: &str =
    "\\documentclass{article}\n\\begin{document}\nhello\n\\end{document}\n";

// ── Chain ordering and attempt records ───────────────────────────────────────

#[tokio::test]
async fn chain_falls_through_to_first_working_engine() {
    let dir = tempfile::tempdir().unwrap();
    let config = chain_config(vec![
        sh_engine("broken-a", "echo 'boom a' >&2; exit 1"),
        sh_engine("broken-b", "echo 'boom b' >&2; exit 2"),
        sh_engine("working", "echo fakepdf > document.pdf"),
    ]);

    let (pdf, attempts) = compile(dir.path(), MINIMAL_DOC, &config)
        .await
        .expect("third engine should succeed");

    assert_eq!(pdf, b"fakepdf\n");
    assert_eq!(attempts.len(), 3);
    assert_eq!(
        attempts.iter().map(|a| a.succeeded).collect::<Vec<_>>(),
        vec![false, false, true]
    );
    assert_eq!(attempts[0].engine, "broken-a");
    assert_eq!(attempts[1].engine, "broken-b");
    assert_eq!(attempts[2].engine, "working");
    assert_eq!(attempts[0].error.as_deref(), Some("exit status 1"));
    assert_eq!(attempts[1].error.as_deref(), Some("exit status 2"));
    assert!(attempts[2].error.is_none());
}

#[tokio::test]
async fn first_engine_success_skips_the_rest() {
    let dir = tempfile::tempdir().unwrap();
    let marker = dir.path().join("second-ran");
    let config = chain_config(vec![
        sh_engine("working", "echo pdf > document.pdf"),
        sh_engine("never", &format!("touch {}", marker.display())),
    ]);

    let (_, attempts) = compile(dir.path(), MINIMAL_DOC, &config).await.unwrap();

    assert_eq!(attempts.len(), 1);
    assert!(!marker.exists(), "second engine must not run");
}

#[tokio::test]
async fn partial_artifact_from_failed_engine_is_removed() {
    let dir = tempfile::tempdir().unwrap();
    // The first engine writes a PDF but exits non-zero; its artifact must not
    // satisfy the second engine's existence check.
    let config = chain_config(vec![
        sh_engine("liar", "echo stale > document.pdf; exit 1"),
        sh_engine("honest", "echo fresh > document.pdf"),
    ]);

    let (pdf, attempts) = compile(dir.path(), MINIMAL_DOC, &config).await.unwrap();

    assert_eq!(pdf, b"fresh\n", "stale artifact must not leak through");
    assert!(!attempts[0].succeeded);
    assert!(attempts[1].succeeded);
}

#[tokio::test]
async fn clean_exit_without_artifact_is_a_failure() {
    let dir = tempfile::tempdir().unwrap();
    let config = chain_config(vec![sh_engine("log-only", "true")]);

    let err = compile(dir.path(), MINIMAL_DOC, &config).await.unwrap_err();

    let FillError::CompilationFailed { attempts } = err else {
        panic!("expected CompilationFailed");
    };
    assert_eq!(attempts.len(), 1);
    assert_eq!(
        attempts[0].error.as_deref(),
        Some("engine exited cleanly but produced no PDF")
    );
}

#[tokio::test]
async fn exhausted_chain_reports_every_attempt() {
    let dir = tempfile::tempdir().unwrap();
    let config = chain_config(vec![
        sh_engine("a", "exit 1"),
        sh_engine("b", "exit 1"),
        sh_engine("c", "exit 1"),
    ]);

    let err = compile(dir.path(), MINIMAL_DOC, &config).await.unwrap_err();

    let FillError::CompilationFailed { attempts } = err else {
        panic!("expected CompilationFailed");
    };
    assert_eq!(attempts.len(), 3);
    assert!(attempts.iter().all(|a| !a.succeeded));
    for a in &attempts {
        assert!(
            a.command.contains(SOURCE_FILENAME),
            "attempt records the full command line: {}",
            a.command
        );
    }
}

#[tokio::test]
async fn missing_program_records_spawn_failure() {
    let dir = tempfile::tempdir().unwrap();
    let config = chain_config(vec![EngineSpec::new(
        "ghost",
        "/definitely/not/an/engine",
        &[],
    )]);

    let err = compile(dir.path(), MINIMAL_DOC, &config).await.unwrap_err();

    let FillError::CompilationFailed { attempts } = err else {
        panic!("expected CompilationFailed");
    };
    assert!(
        attempts[0]
            .error
            .as_deref()
            .unwrap()
            .starts_with("failed to start"),
        "got: {:?}",
        attempts[0].error
    );
}

#[tokio::test]
async fn hung_engine_is_timed_out() {
    let dir = tempfile::tempdir().unwrap();
    let config = GenerationConfig::builder()
        .engines(vec![
            sh_engine("hung", "sleep 30"),
            sh_engine("working", "echo pdf > document.pdf"),
        ])
        .engine_backoff_ms(0)
        .compile_timeout_secs(1)
        .build()
        .unwrap();

    let (_, attempts) = compile(dir.path(), MINIMAL_DOC, &config)
        .await
        .expect("second engine should rescue the request");

    assert_eq!(attempts.len(), 2);
    assert!(
        attempts[0].error.as_deref().unwrap().starts_with("timed out"),
        "got: {:?}",
        attempts[0].error
    );
    assert!(attempts[1].succeeded);
}

#[tokio::test]
async fn captured_log_includes_engine_stderr() {
    let dir = tempfile::tempdir().unwrap();
    let config = chain_config(vec![sh_engine(
        "noisy",
        "echo '! LaTeX Error: something bad' >&2; exit 1",
    )]);

    let err = compile(dir.path(), MINIMAL_DOC, &config).await.unwrap_err();

    let FillError::CompilationFailed { attempts } = err else {
        panic!("expected CompilationFailed");
    };
    assert!(
        attempts[0].log_tail.contains("! LaTeX Error: something bad"),
        "got: {}",
        attempts[0].log_tail
    );
}

// ── Full generation path ─────────────────────────────────────────────────────

#[tokio::test]
async fn generate_injects_compiles_and_cleans_up() {
    let side = tempfile::tempdir().unwrap();
    let pwd_file = side.path().join("workspace-path");

    // The engine proves injection happened (the value is in the materialised
    // source) and records the workspace path for the cleanup assertion.
    let script = format!(
        "pwd > {} && grep -q 'Ada Lovelace' {} && echo realpdf > document.pdf",
        pwd_file.display(),
        SOURCE_FILENAME
    );
    let config = chain_config(vec![sh_engine("checker", &script)]);

    let template = "\\documentclass{article}\n\\begin{document}\nDear {{name}},\n\\end{document}\n";
    let values: ValueMap = [("name".to_string(), "Ada Lovelace".to_string())].into();

    let output = generate(template, &values, &config)
        .await
        .expect("generation should succeed");

    assert_eq!(output.pdf, b"realpdf\n");
    assert_eq!(output.engine, "checker");
    assert_eq!(output.stats.engines_tried, 1);
    assert!(output.stats.document_bytes > 0);
    assert!(output.stats.pdf_bytes > 0);

    let workspace = PathBuf::from(
        std::fs::read_to_string(&pwd_file)
            .expect("engine should have recorded the workspace path")
            .trim(),
    );
    assert!(
        !workspace.exists(),
        "workspace must be removed after generation: {}",
        workspace.display()
    );
    assert!(
        workspace
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("texfill-")
    );
}

#[tokio::test]
async fn generate_cleans_up_after_compile_failure() {
    let side = tempfile::tempdir().unwrap();
    let pwd_file = side.path().join("workspace-path");

    let script = format!("pwd > {}; exit 1", pwd_file.display());
    let config = chain_config(vec![sh_engine("doomed", &script)]);
    let values = ValueMap::new();

    let err = generate(MINIMAL_DOC, &values, &config).await.unwrap_err();
    assert!(matches!(err, FillError::CompilationFailed { .. }));

    let workspace = PathBuf::from(std::fs::read_to_string(&pwd_file).unwrap().trim());
    assert!(!workspace.exists(), "workspace must be removed on failure");
}

#[tokio::test]
async fn generate_rejects_template_without_body_marker() {
    let config = chain_config(vec![sh_engine("unused", "echo pdf > document.pdf")]);
    let values = ValueMap::new();

    let err = generate("\\documentclass{article}\nno body", &values, &config)
        .await
        .unwrap_err();

    assert!(
        matches!(
            err,
            FillError::MissingStructure {
                marker: texfill::StructureMarker::BeginDocument
            }
        ),
        "got: {err:?}"
    );
}

#[tokio::test]
async fn generate_ignores_values_without_placeholders() {
    let config = chain_config(vec![sh_engine("working", "echo pdf > document.pdf")]);
    let values: ValueMap = [("unknown_field".to_string(), "x".to_string())].into();

    let output = generate(MINIMAL_DOC, &values, &config).await.unwrap();
    assert_eq!(output.pdf, b"pdf\n");
}

#[tokio::test]
async fn artifact_name_matches_what_engines_write() {
    // The scripts above hardcode document.pdf; keep them honest.
    assert_eq!(ARTIFACT_FILENAME, "document.pdf");
    assert_eq!(SOURCE_FILENAME, "document.tex");
}
