//! Output types for schema extraction and PDF generation.
//!
//! Everything here is plain data with serde derives so the transport layer
//! can return it as JSON unchanged. The one exception is the PDF payload
//! itself: [`GenerationOutput::pdf`] is `#[serde(skip)]` because the bytes
//! are delivered as an attachment body, never inline in a JSON payload.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Attachment filename for generated PDFs.
pub const PDF_FILENAME: &str = "filled.pdf";

/// Content type for generated PDFs.
pub const PDF_CONTENT_TYPE: &str = "application/pdf";

/// One fillable field extracted from a template.
///
/// `id` is canonical: lowercase, `[a-z0-9_]+`, unique within a schema.
/// The extractor normalises model output into this form; see
/// [`crate::pipeline::extract`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    /// Canonical field identifier, matching the placeholder in the template.
    pub id: String,
    /// Human-readable label for form rendering.
    pub label: String,
    /// Pre-filled default value. May be empty.
    #[serde(default)]
    pub default: String,
}

/// Ordered field list; insertion order is extraction order.
pub type FieldSchema = Vec<FieldDescriptor>;

/// User-supplied values keyed by field id.
///
/// Ids unknown to the template are ignored during injection; ids absent
/// from the map substitute as the empty string.
pub type ValueMap = HashMap<String, String>;

/// Record of one engine invocation in the compiler chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompilationAttempt {
    /// Engine name, e.g. "tectonic" or "pdflatex".
    pub engine: String,
    /// The full command line that was executed.
    pub command: String,
    /// Whether this attempt produced the output artifact.
    pub succeeded: bool,
    /// Failure description: exit status, timeout, or spawn error.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Last portion of the combined engine log, bounded by configuration.
    pub log_tail: String,
}

/// Result of a successful generation request.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationOutput {
    /// The compiled PDF bytes. Delivered as an attachment, not JSON.
    #[serde(skip)]
    pub pdf: Vec<u8>,
    /// Name of the engine that produced the PDF.
    pub engine: String,
    /// Every attempt made, in order, including the successful one.
    pub attempts: Vec<CompilationAttempt>,
    /// Aggregate statistics for logging and billing.
    pub stats: GenerationStats,
}

/// Aggregate statistics for one generation request.
#[derive(Debug, Clone, Default, Serialize)]
pub struct GenerationStats {
    /// Size of the raw template in bytes.
    pub template_bytes: usize,
    /// Size of the processed document written to the workspace.
    pub document_bytes: usize,
    /// Size of the compiled PDF.
    pub pdf_bytes: usize,
    /// Number of engines tried, including the successful one.
    pub engines_tried: usize,
    /// Wall-clock duration of injection plus compilation.
    pub duration_ms: u64,
}
