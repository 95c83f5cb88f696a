//! Value injection: substitute field values into a LaTeX template.
//!
//! ## Why escape before substituting?
//!
//! Field values come from end users and routinely contain characters that are
//! syntax in LaTeX (`&` in company names, `%` in discount text, `_` in file
//! names). Injecting them raw would change document structure or abort the
//! compile. Every value is therefore escaped in a single character-by-character
//! pass before any pattern is touched. A single pass cannot re-escape the
//! output of an earlier replacement, which is what makes the escaping safe to
//! reason about.
//!
//! ## Placeholder conventions
//!
//! Five conventions are recognised per field id, applied in a fixed order so
//! documents mixing conventions behave deterministically:
//!
//! 1. `\newcommand{\id}{body}` — body replaced, definition kept
//! 2. `\def\id{body}` — body replaced, definition kept
//! 3. `{{id}}` — token replaced
//! 4. `\VAR{id}` — token replaced
//! 5. `<<id>>` — token replaced
//!
//! The definition forms keep the `\newcommand`/`\def` wrapper so documents
//! that reference `\id` in the body text keep working; only the stored value
//! changes. Definition bodies are located with a brace-balanced scan rather
//! than a regex, so nested groups like `\textbf{...}` inside an existing
//! default survive correctly.

use crate::error::{FillError, StructureMarker};
use crate::output::ValueMap;
use regex::{NoExpand, Regex};
use tracing::debug;

/// Substitute every recognised placeholder in `template` with the escaped
/// values from `values`, then verify document structure is intact.
///
/// Ids present in `values` but absent from the template are ignored. Fields
/// are processed in sorted id order so the result does not depend on map
/// iteration order.
pub fn inject(template: &str, values: &ValueMap) -> Result<String, FillError> {
    let mut ids: Vec<&String> = values.keys().collect();
    ids.sort();

    let mut doc = template.to_string();
    for id in ids {
        let escaped = escape_latex(&values[id]);
        doc = substitute_field(&doc, id, &escaped);
    }

    verify_structure(&doc)?;
    debug!(fields = values.len(), bytes = doc.len(), "injection complete");
    Ok(doc)
}

/// Escape a user-supplied value for safe inclusion in LaTeX text.
///
/// One pass over the characters; each reserved character maps to its escaped
/// form and everything else passes through unchanged.
pub fn escape_latex(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 16);
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\textbackslash{}"),
            '{' => out.push_str("\\{"),
            '}' => out.push_str("\\}"),
            '$' => out.push_str("\\$"),
            '&' => out.push_str("\\&"),
            '%' => out.push_str("\\%"),
            '#' => out.push_str("\\#"),
            '_' => out.push_str("\\_"),
            '^' => out.push_str("\\^{}"),
            '~' => out.push_str("\\~{}"),
            _ => out.push(c),
        }
    }
    out
}

/// Apply all five placeholder conventions for one field id.
///
/// `escaped` must already be escaped; this function only places it.
fn substitute_field(doc: &str, id: &str, escaped: &str) -> String {
    let eid = regex::escape(id);

    // 1. \newcommand{\id}{body}
    let s = replace_definition_bodies(doc, &format!("\\newcommand{{\\{id}}}"), escaped);
    // 2. \def\id{body}
    let s = replace_definition_bodies(&s, &format!("\\def\\{id}"), escaped);

    // The id is regex-escaped, so these patterns always compile.
    // 3. {{id}}
    let re = Regex::new(&format!(r"\{{\{{\s*{eid}\s*\}}\}}")).expect("escaped id");
    let s = re.replace_all(&s, NoExpand(escaped)).to_string();

    // 4. \VAR{id}
    let re = Regex::new(&format!(r"\\VAR\{{\s*{eid}\s*\}}")).expect("escaped id");
    let s = re.replace_all(&s, NoExpand(escaped)).to_string();

    // 5. <<id>>
    let re = Regex::new(&format!(r"<<\s*{eid}\s*>>")).expect("escaped id");
    re.replace_all(&s, NoExpand(escaped)).to_string()
}

/// Replace the `{body}` group following every occurrence of `head` with
/// `{escaped}`, keeping the head itself.
///
/// The body is found with an escape-aware brace-balanced scan. Occurrences
/// where `head` is a prefix of a longer command name (`\def\name` inside
/// `\def\name_extra`) are skipped because the next significant character is
/// not `{`.
fn replace_definition_bodies(doc: &str, head: &str, escaped: &str) -> String {
    let mut out = String::with_capacity(doc.len());
    let mut rest = doc;

    while let Some(pos) = rest.find(head) {
        let after_head = pos + head.len();
        out.push_str(&rest[..after_head]);
        let tail = &rest[after_head..];

        // Optional spaces/tabs between the head and the body group.
        let ws_len = tail.len() - tail.trim_start_matches([' ', '\t']).len();
        let body_start = &tail[ws_len..];

        match body_span(body_start) {
            Some(span) => {
                out.push_str(&tail[..ws_len]);
                out.push('{');
                out.push_str(escaped);
                out.push('}');
                rest = &body_start[span..];
            }
            None => {
                // Not a definition of this exact id; emit nothing extra and
                // continue scanning after the head.
                rest = tail;
            }
        }
    }

    out.push_str(rest);
    out
}

/// Length of the leading balanced `{...}` group in `s`, or None if `s` does
/// not start with `{` or the group never closes.
///
/// `\X` sequences are skipped as a unit so `\{` and `\}` inside the body do
/// not affect the depth count.
fn body_span(s: &str) -> Option<usize> {
    let bytes = s.as_bytes();
    if bytes.first() != Some(&b'{') {
        return None;
    }
    let mut depth = 0usize;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 1,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i + 1);
                }
            }
            _ => {}
        }
        i += 1;
    }
    None
}

/// Verify the processed document still carries both structural markers.
///
/// Checked after substitution so a field value that corrupted the preamble
/// is caught here rather than as an opaque compile failure.
fn verify_structure(doc: &str) -> Result<(), FillError> {
    for marker in [StructureMarker::DocumentClass, StructureMarker::BeginDocument] {
        if !doc.contains(marker.as_text()) {
            return Err(FillError::MissingStructure { marker });
        }
    }
    Ok(())
}
