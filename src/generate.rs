//! Top-level entry points: schema extraction and PDF generation.
//!
//! Two independent operations share this module because they share provider
//! resolution and configuration:
//!
//! * [`extract_schema`] runs once per template upload and only talks to the
//!   LLM — no workspace, no engines.
//! * [`generate`] runs once per fill request and never talks to the LLM —
//!   injection is deterministic and compilation is external processes.
//!
//! Keeping the two paths separate means a generation request cannot be
//! slowed or failed by model latency, and extraction needs no TeX install.

use crate::config::GenerationConfig;
use crate::error::FillError;
use crate::output::{FieldSchema, GenerationOutput, GenerationStats, ValueMap};
use crate::pipeline::{compile, extract, inject, input, workspace};
use edgequake_llm::{LLMProvider, ProviderFactory};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Extract the fillable-field schema from raw template text.
///
/// This is the extraction entry point for the library.
///
/// # Errors
/// * [`FillError::MalformedTemplate`] / [`FillError::TemplateTooLarge`] —
///   input rejected before any model call
/// * [`FillError::ExtractionTimeout`] — the single model call ran past its budget
/// * [`FillError::InvalidModelOutput`] — response had no parseable field array
/// * [`FillError::NoFieldsFound`] — response parsed but no field survived validation
pub async fn extract_schema(
    template: impl AsRef<str>,
    config: &GenerationConfig,
) -> Result<FieldSchema, FillError> {
    let provider = resolve_provider(config).await?;
    extract::extract_schema(&provider, template.as_ref(), config).await
}

/// Extract the schema from a template given as a local path or HTTP(S) URL.
pub async fn extract_schema_from_input(
    input_str: impl AsRef<str>,
    config: &GenerationConfig,
) -> Result<FieldSchema, FillError> {
    let resolved = input::resolve_template(input_str.as_ref(), config).await?;
    let template = input::read_template(&resolved, config).await?;
    extract_schema(&template, config).await
}

/// Fill a template with `values` and compile it to a PDF.
///
/// This is the generation entry point for the library. The whole request
/// runs inside one scoped workspace that is removed on every exit path.
///
/// Ids in `values` that match no placeholder are ignored; schema ids absent
/// from `values` can be pre-filled with [`complete_values`].
///
/// # Errors
/// * [`FillError::MissingStructure`] — the document lost `\documentclass` or
///   `\begin{document}` (malformed original or a corrupting value)
/// * [`FillError::CompilationFailed`] — every engine failed; the error
///   carries the full ordered attempt list
pub async fn generate(
    template: impl AsRef<str>,
    values: &ValueMap,
    config: &GenerationConfig,
) -> Result<GenerationOutput, FillError> {
    let template = template.as_ref();
    let start = Instant::now();
    info!(template_bytes = template.len(), fields = values.len(), "starting generation");

    // ── Step 1: Escape and substitute values ─────────────────────────────
    let document = inject::inject(template, values)?;
    let document_bytes = document.len();
    debug!(document_bytes, "injection complete");

    // ── Step 2: Compile inside a scoped workspace ────────────────────────
    let (pdf, attempts) = workspace::with_workspace(config, move |ws| async move {
        compile::compile(&ws, &document, config).await
    })
    .await?;

    // ── Step 3: Assemble output ──────────────────────────────────────────
    let engine = attempts
        .last()
        .map(|a| a.engine.clone())
        .unwrap_or_default();
    let stats = GenerationStats {
        template_bytes: template.len(),
        document_bytes,
        pdf_bytes: pdf.len(),
        engines_tried: attempts.len(),
        duration_ms: start.elapsed().as_millis() as u64,
    };
    info!(
        engine = %engine,
        pdf_bytes = stats.pdf_bytes,
        engines_tried = stats.engines_tried,
        duration_ms = stats.duration_ms,
        "generation complete"
    );

    Ok(GenerationOutput {
        pdf,
        engine,
        attempts,
        stats,
    })
}

/// Fill and compile a template given as a local path or HTTP(S) URL.
pub async fn generate_from_input(
    input_str: impl AsRef<str>,
    values: &ValueMap,
    config: &GenerationConfig,
) -> Result<GenerationOutput, FillError> {
    let resolved = input::resolve_template(input_str.as_ref(), config).await?;
    let template = input::read_template(&resolved, config).await?;
    generate(&template, values, config).await
}

/// Generate a PDF and write it directly to a file.
///
/// Uses atomic write (temp file + rename) to prevent partial files.
pub async fn generate_to_file(
    template: impl AsRef<str>,
    values: &ValueMap,
    output_path: impl AsRef<Path>,
    config: &GenerationConfig,
) -> Result<GenerationStats, FillError> {
    let output = generate(template, values, config).await?;
    let path = output_path.as_ref();

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| FillError::OutputWriteFailed {
                    path: path.to_path_buf(),
                    source: e,
                })?;
        }
    }

    let tmp_path = path.with_extension("pdf.tmp");
    tokio::fs::write(&tmp_path, &output.pdf)
        .await
        .map_err(|e| FillError::OutputWriteFailed {
            path: path.to_path_buf(),
            source: e,
        })?;

    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|e| FillError::OutputWriteFailed {
            path: path.to_path_buf(),
            source: e,
        })?;

    Ok(output.stats)
}

/// Synchronous wrapper around [`generate`].
///
/// Creates a temporary tokio runtime internally.
pub fn generate_sync(
    template: impl AsRef<str>,
    values: &ValueMap,
    config: &GenerationConfig,
) -> Result<GenerationOutput, FillError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| FillError::Internal(format!("Failed to create tokio runtime: {e}")))?
        .block_on(generate(template, values, config))
}

/// Complete a user value map against a schema.
///
/// Every schema id ends up present: the user's value if supplied, otherwise
/// the empty string. Ids in `values` that the schema does not know pass
/// through unchanged — the injector ignores them if the template has no
/// matching placeholder.
pub fn complete_values(schema: &FieldSchema, values: &ValueMap) -> ValueMap {
    let mut out = values.clone();
    for field in schema {
        out.entry(field.id.clone()).or_default();
    }
    out
}

// ── Internal helpers ─────────────────────────────────────────────────────

/// Instantiate a named provider with the given model.
fn create_provider(provider_name: &str, model: &str) -> Result<Arc<dyn LLMProvider>, FillError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        FillError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

/// Resolve the LLM provider, from most-specific to least-specific.
///
/// The four-level fallback chain lets library users and CLI users each set
/// exactly as much or as little as they need:
///
/// 1. **Pre-built provider** (`config.provider`) — the caller constructed and
///    configured the provider entirely; we use it as-is. Useful in tests or
///    when the caller needs custom middleware (caching, rate-limiting).
///
/// 2. **Named provider + model** (`config.provider_name`) — the caller named
///    a provider (e.g. `"openai"`) and optional model. We call
///    [`ProviderFactory::create_llm_provider`] which reads the corresponding
///    API key (`OPENAI_API_KEY`, etc.) from the environment.
///
/// 3. **Environment pair** (`EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`) —
///    Both env vars set means the caller chose a provider and model at the
///    execution environment level (Makefile, shell script, CI). Checked before
///    full auto-detection so the model choice is honoured even when multiple
///    API keys are present.
///
/// 4. **Full auto-detection** (`ProviderFactory::from_env`) — the factory
///    scans all known API key variables and picks the first available provider.
///    Convenient for `texfill extract template.tex` with no other configuration.
async fn resolve_provider(config: &GenerationConfig) -> Result<Arc<dyn LLMProvider>, FillError> {
    // 1) User-provided provider takes priority
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    // 2) Provider name + model
    if let Some(ref name) = config.provider_name {
        let model = config.model.as_deref().unwrap_or("gpt-4.1-nano");
        return create_provider(name, model);
    }

    // 3) Auto-detect from environment; honour EDGEQUAKE_LLM_PROVIDER + EDGEQUAKE_MODEL when both set
    if let (Ok(prov), Ok(model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !model.is_empty() {
            return create_provider(&prov, &model);
        }
    }

    // Prefer OpenAI explicitly when an OpenAI API key is present. This ensures
    // users with multiple provider keys (e.g. Gemini + OpenAI) will default
    // to OpenAI unless they explicitly request another provider.
    if let Ok(openai_key) = std::env::var("OPENAI_API_KEY") {
        if !openai_key.is_empty() {
            let model = config.model.as_deref().unwrap_or("gpt-4.1-nano");
            return create_provider("openai", model);
        }
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| FillError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set OPENAI_API_KEY, ANTHROPIC_API_KEY, or configure a provider.\n\
                Error: {}",
                e
            ),
        })?;

    Ok(llm_provider)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::FieldDescriptor;
    use std::collections::HashMap;

    fn schema() -> FieldSchema {
        vec![
            FieldDescriptor {
                id: "name".into(),
                label: "Name".into(),
                default: "Jane".into(),
            },
            FieldDescriptor {
                id: "city".into(),
                label: "City".into(),
                default: String::new(),
            },
        ]
    }

    #[test]
    fn complete_values_fills_missing_ids_with_empty() {
        let values: ValueMap = HashMap::from([("name".to_string(), "Ada".to_string())]);
        let completed = complete_values(&schema(), &values);
        assert_eq!(completed["name"], "Ada");
        assert_eq!(completed["city"], "");
    }

    #[test]
    fn complete_values_keeps_unknown_ids() {
        let values: ValueMap = HashMap::from([("extra".to_string(), "x".to_string())]);
        let completed = complete_values(&schema(), &values);
        assert_eq!(completed["extra"], "x");
        assert_eq!(completed.len(), 3);
    }
}
