//! Field extraction: ask the model for the template's fillable fields.
//!
//! This module is the only place that talks to the LLM. It is intentionally
//! thin — all prompt engineering lives in [`crate::prompts`] so it can be
//! changed without touching timeout or parsing logic here.
//!
//! ## Trust boundary
//!
//! The model's response is free text and is treated as untrusted data. The
//! pipeline is: strip any code fences the model added despite the prompt,
//! locate the first top-level JSON array with a string-aware bracket scan,
//! parse it with serde, then filter and normalise every element. Anything
//! that fails a step is either dropped (single bad element) or surfaced as
//! [`FillError::InvalidModelOutput`] carrying both the raw and cleaned text,
//! so a misbehaving model can be diagnosed from the error alone.
//!
//! No retries here: extraction is a single bounded call. Transient provider
//! errors surface immediately and the user simply re-submits the template.

use crate::config::GenerationConfig;
use crate::error::FillError;
use crate::output::{FieldDescriptor, FieldSchema};
use crate::prompts::{extraction_request, DEFAULT_EXTRACTION_PROMPT};
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider};
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{timeout, Duration};
use tracing::{debug, info};

/// Extract the field schema from a raw template via one model call.
///
/// Fails fast on structurally hopeless input before spending a model call:
/// a template with no `\documentclass` can never compile, and an oversized
/// template would blow the prompt budget.
pub async fn extract_schema(
    provider: &Arc<dyn LLMProvider>,
    template: &str,
    config: &GenerationConfig,
) -> Result<FieldSchema, FillError> {
    precheck(template, config)?;

    let system = config
        .extraction_prompt
        .as_deref()
        .unwrap_or(DEFAULT_EXTRACTION_PROMPT);
    let messages = vec![
        ChatMessage::system(system),
        ChatMessage::user(extraction_request(template)),
    ];
    let options = build_options(config);

    let start = Instant::now();
    let budget = Duration::from_secs(config.extraction_timeout_secs);

    let response = match timeout(budget, provider.chat(&messages, Some(&options))).await {
        Err(_) => {
            return Err(FillError::ExtractionTimeout {
                secs: config.extraction_timeout_secs,
            })
        }
        Ok(Err(e)) => {
            return Err(FillError::ModelApiError {
                message: e.to_string(),
            })
        }
        Ok(Ok(r)) => r,
    };

    debug!(
        input_tokens = response.prompt_tokens,
        output_tokens = response.completion_tokens,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "extraction call complete"
    );

    let schema = parse_model_response(&response.content)?;
    info!(fields = schema.len(), "extracted field schema");
    Ok(schema)
}

/// Reject input that cannot possibly yield a usable schema.
fn precheck(template: &str, config: &GenerationConfig) -> Result<(), FillError> {
    if template.len() > config.max_template_bytes {
        return Err(FillError::TemplateTooLarge {
            size: template.len(),
            limit: config.max_template_bytes,
        });
    }
    if !template.contains("\\documentclass") {
        return Err(FillError::MalformedTemplate);
    }
    Ok(())
}

/// Build `CompletionOptions` from the generation config.
fn build_options(config: &GenerationConfig) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(config.temperature),
        max_tokens: Some(config.max_tokens),
        ..Default::default()
    }
}

/// Turn the raw model response into a validated, normalised schema.
fn parse_model_response(raw: &str) -> Result<FieldSchema, FillError> {
    let cleaned = strip_code_fences(raw);

    let array_text = first_json_array(&cleaned).ok_or_else(|| FillError::InvalidModelOutput {
        reason: "no JSON array found in response".into(),
        raw: raw.to_string(),
        cleaned: cleaned.clone(),
    })?;

    let value: serde_json::Value =
        serde_json::from_str(array_text).map_err(|e| FillError::InvalidModelOutput {
            reason: format!("JSON parse error: {e}"),
            raw: raw.to_string(),
            cleaned: cleaned.clone(),
        })?;

    let items = match value {
        serde_json::Value::Array(items) => items,
        _ => {
            return Err(FillError::InvalidModelOutput {
                reason: "top-level JSON value is not an array".into(),
                raw: raw.to_string(),
                cleaned,
            })
        }
    };

    let mut schema: FieldSchema = Vec::with_capacity(items.len());
    for item in items {
        if let Some(field) = validate_field(&item) {
            if schema.iter().any(|f| f.id == field.id) {
                debug!(id = %field.id, "dropping duplicate field id");
                continue;
            }
            schema.push(field);
        } else {
            debug!(item = %item, "dropping malformed field object");
        }
    }

    if schema.is_empty() {
        return Err(FillError::NoFieldsFound);
    }
    Ok(schema)
}

// ── Response cleanup ─────────────────────────────────────────────────────

static RE_OUTER_FENCES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```(?:json)?\s*\n(.*)\n```\s*$").unwrap());

/// Strip outer code fences the model sometimes adds despite the prompt.
fn strip_code_fences(input: &str) -> String {
    if let Some(caps) = RE_OUTER_FENCES.captures(input.trim()) {
        caps[1].to_string()
    } else {
        input.trim().to_string()
    }
}

/// Locate the first top-level `[...]` in `s`, bracket-matched and aware of
/// JSON string literals so brackets inside strings do not count.
fn first_json_array(s: &str) -> Option<&str> {
    let mut start: Option<usize> = None;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in s.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '[' => {
                if depth == 0 {
                    start = Some(i);
                }
                depth += 1;
            }
            ']' => {
                if depth > 0 {
                    depth -= 1;
                    if depth == 0 {
                        return Some(&s[start?..i + c.len_utf8()]);
                    }
                }
            }
            _ => {}
        }
    }
    None
}

// ── Field validation ─────────────────────────────────────────────────────

/// Validate and normalise one element of the model's array.
///
/// Elements missing a usable `id` or `label` return None and are dropped by
/// the caller; a handful of bad elements must not fail the whole schema.
fn validate_field(item: &serde_json::Value) -> Option<FieldDescriptor> {
    let obj = item.as_object()?;

    let id = normalize_id(obj.get("id")?.as_str()?);
    if id.is_empty() {
        return None;
    }

    let label = obj.get("label")?.as_str()?.trim().to_string();
    if label.is_empty() {
        return None;
    }

    let default = obj
        .get("default")
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .unwrap_or_default();

    Some(FieldDescriptor { id, label, default })
}

/// Normalise a field id: lowercase, keep only `[a-z0-9_]`.
pub(crate) fn normalize_id(raw: &str) -> String {
    raw.to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '_')
        .collect()
}
