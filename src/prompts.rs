//! Prompts for LLM-based field extraction from LaTeX templates.
//!
//! Centralising every prompt here serves two purposes:
//!
//! 1. **Single source of truth** — changing the default behaviour (e.g.
//!    recognising a new placeholder convention) requires editing exactly one
//!    place.
//!
//! 2. **Testability** — unit tests can import and inspect prompts directly
//!    without calling a real model, making prompt regressions easy to catch.
//!
//! Callers can override the default via
//! [`crate::config::GenerationConfig::extraction_prompt`]; the constant here
//! is used only when no override is provided.

/// Default system prompt for extracting fillable fields from a template.
///
/// This prompt is used when `GenerationConfig::extraction_prompt` is `None`.
pub const DEFAULT_EXTRACTION_PROMPT: &str = r#"You are an expert LaTeX analyst. Your task is to find every fillable placeholder field in a LaTeX template and describe it as structured data.

Follow these rules precisely:

1. WHAT COUNTS AS A FIELD
   - \newcommand{\name}{value} definitions whose value is clearly meant to be replaced (names, dates, amounts, addresses)
   - \def\name{value} definitions of the same kind
   - {{name}} double-brace placeholders
   - \VAR{name} placeholders
   - <<name>> double-angle-bracket placeholders

2. WHAT DOES NOT COUNT
   - Formatting commands (\textbf, \section, \hspace and similar)
   - Package options, lengths, counters, colours
   - Commands whose body is LaTeX markup rather than fillable content

3. FIELD OBJECTS
   - "id": the placeholder name, lowercase, letters/digits/underscores only
   - "label": a short human-readable label, e.g. "Client name"
   - "default": the current value from the template, or "" if none

4. OUTPUT FORMAT
   - Output ONLY a JSON array of field objects
   - Keep fields in the order they first appear in the template
   - Do NOT wrap the array in ```json fences
   - Do NOT add commentary or explanations
   - If the template has no fillable fields, output []"#;

/// Build the user message embedding the raw template text.
///
/// The template is fenced with triple quotes so stray braces or brackets in
/// the LaTeX source are not mistaken for part of the instructions.
pub fn extraction_request(template: &str) -> String {
    format!(
        "Extract the fillable fields from this LaTeX template:\n\n\"\"\"\n{}\n\"\"\"",
        template
    )
}
