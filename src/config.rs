//! Configuration types for template filling and PDF generation.
//!
//! All behaviour is controlled through [`GenerationConfig`], built via its
//! [`GenerationConfigBuilder`]. Keeping every knob in one struct makes it
//! trivial to share configs across concurrent requests, log them, and diff
//! two runs to understand why their outputs differ.
//!
//! # Design choice: builder over constructor
//! A fifteen-field constructor is unreadable and breaks on every new field.
//! The builder lets callers set only what they care about and rely on
//! well-documented defaults for the rest.

use crate::error::FillError;
use edgequake_llm::LLMProvider;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// One candidate typesetting engine in the fallback chain.
///
/// The chain invokes `program` with `args` followed by the source filename,
/// scoped to the workspace directory. Engines are resolved through the host
/// `PATH`, so a missing binary simply records a failed attempt and the chain
/// moves on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineSpec {
    /// Display name used in attempt records and logs.
    pub name: String,
    /// Executable name or path.
    pub program: String,
    /// Arguments placed before the source filename.
    pub args: Vec<String>,
}

impl EngineSpec {
    pub fn new(
        name: impl Into<String>,
        program: impl Into<String>,
        args: &[&str],
    ) -> Self {
        Self {
            name: name.into(),
            program: program.into(),
            args: args.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// The default engine chain, in preference order.
///
/// tectonic comes first because it is self-contained: it fetches missing
/// packages on first run instead of failing on an incomplete TeX Live
/// install. The classic engines follow in decreasing ubiquity. All four run
/// non-interactively and halt on the first error so a broken document fails
/// in seconds rather than waiting on stdin.
pub fn default_engines() -> Vec<EngineSpec> {
    const CLASSIC_ARGS: &[&str] = &[
        "-interaction=nonstopmode",
        "-halt-on-error",
        "-output-directory",
        ".",
    ];
    vec![
        EngineSpec::new("tectonic", "tectonic", &["--outdir", "."]),
        EngineSpec::new("pdflatex", "pdflatex", CLASSIC_ARGS),
        EngineSpec::new("xelatex", "xelatex", CLASSIC_ARGS),
        EngineSpec::new("lualatex", "lualatex", CLASSIC_ARGS),
    ]
}

/// Configuration for schema extraction and PDF generation.
///
/// Built via [`GenerationConfig::builder()`] or using
/// [`GenerationConfig::default()`].
///
/// # Example
/// ```rust
/// use texfill::GenerationConfig;
///
/// let config = GenerationConfig::builder()
///     .model("gpt-4.1-nano")
///     .compile_timeout_secs(60)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct GenerationConfig {
    /// LLM model identifier, e.g. "gpt-4o", "claude-sonnet-4-20250514".
    /// If None, uses provider default.
    pub model: Option<String>,

    /// LLM provider name (e.g. "openai", "anthropic", "ollama").
    /// If None along with `provider`, uses `ProviderFactory::from_env()`.
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Sampling temperature for the extraction call. Default: 0.1.
    ///
    /// Low temperature keeps the model faithful to the placeholders that are
    /// actually in the template. Higher values invent fields that do not
    /// exist, which downstream validation then has to discard.
    pub temperature: f32,

    /// Maximum tokens the model may generate. Default: 2048.
    ///
    /// The response is a JSON array of short objects; 2048 covers templates
    /// with dozens of fields. Setting this too low truncates the array
    /// mid-object and extraction fails with an unparseable response.
    pub max_tokens: usize,

    /// Custom extraction prompt. If None, uses the built-in default.
    pub extraction_prompt: Option<String>,

    /// Time budget for the single extraction call in seconds. Default: 45.
    pub extraction_timeout_secs: u64,

    /// Maximum accepted template size in bytes. Default: 200 KB.
    ///
    /// The whole template is embedded in the extraction prompt, so this
    /// bound caps prompt size as well as memory.
    pub max_template_bytes: usize,

    /// Ordered engine fallback chain. Default: [`default_engines()`].
    pub engines: Vec<EngineSpec>,

    /// Per-engine-attempt timeout in seconds. Default: 45.
    ///
    /// Generous because tectonic downloads missing packages on first run;
    /// a cold cache can take tens of seconds before the actual compile
    /// starts. Subsequent runs finish in single-digit seconds.
    pub compile_timeout_secs: u64,

    /// Pause between engine attempts in milliseconds. Default: 250.
    pub engine_backoff_ms: u64,

    /// Maximum characters of engine log kept per attempt. Default: 3000.
    ///
    /// Engine logs routinely reach hundreds of kilobytes; the useful error
    /// is almost always in the final screenful. The tail keeps attempt
    /// records small enough to return in a failure payload.
    pub log_tail_chars: usize,

    /// Workspace removal retry count. Default: 3.
    pub cleanup_retries: u32,

    /// Delay between workspace removal retries in milliseconds. Default: 50.
    pub cleanup_backoff_ms: u64,

    /// Download timeout for URL template inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            model: None,
            provider_name: None,
            provider: None,
            temperature: 0.1,
            max_tokens: 2048,
            extraction_prompt: None,
            extraction_timeout_secs: 45,
            max_template_bytes: 200 * 1024,
            engines: default_engines(),
            compile_timeout_secs: 45,
            engine_backoff_ms: 250,
            log_tail_chars: 3000,
            cleanup_retries: 3,
            cleanup_backoff_ms: 50,
            download_timeout_secs: 120,
        }
    }
}

impl fmt::Debug for GenerationConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GenerationConfig")
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("extraction_timeout_secs", &self.extraction_timeout_secs)
            .field("max_template_bytes", &self.max_template_bytes)
            .field(
                "engines",
                &self.engines.iter().map(|e| e.name.as_str()).collect::<Vec<_>>(),
            )
            .field("compile_timeout_secs", &self.compile_timeout_secs)
            .field("engine_backoff_ms", &self.engine_backoff_ms)
            .field("log_tail_chars", &self.log_tail_chars)
            .finish()
    }
}

impl GenerationConfig {
    /// Create a new builder for `GenerationConfig`.
    pub fn builder() -> GenerationConfigBuilder {
        GenerationConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`GenerationConfig`].
#[derive(Debug)]
pub struct GenerationConfigBuilder {
    config: GenerationConfig,
}

impl GenerationConfigBuilder {
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n.max(256);
        self
    }

    pub fn extraction_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.extraction_prompt = Some(prompt.into());
        self
    }

    pub fn extraction_timeout_secs(mut self, secs: u64) -> Self {
        self.config.extraction_timeout_secs = secs.max(1);
        self
    }

    pub fn max_template_bytes(mut self, n: usize) -> Self {
        self.config.max_template_bytes = n.max(1024);
        self
    }

    pub fn engines(mut self, engines: Vec<EngineSpec>) -> Self {
        self.config.engines = engines;
        self
    }

    pub fn compile_timeout_secs(mut self, secs: u64) -> Self {
        self.config.compile_timeout_secs = secs.max(1);
        self
    }

    pub fn engine_backoff_ms(mut self, ms: u64) -> Self {
        self.config.engine_backoff_ms = ms;
        self
    }

    pub fn log_tail_chars(mut self, n: usize) -> Self {
        self.config.log_tail_chars = n.max(200);
        self
    }

    pub fn cleanup_retries(mut self, n: u32) -> Self {
        self.config.cleanup_retries = n;
        self
    }

    pub fn cleanup_backoff_ms(mut self, ms: u64) -> Self {
        self.config.cleanup_backoff_ms = ms;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<GenerationConfig, FillError> {
        let c = &self.config;
        if c.engines.is_empty() {
            return Err(FillError::InvalidConfig(
                "Engine chain must contain at least one engine".into(),
            ));
        }
        if let Some(e) = c.engines.iter().find(|e| e.program.trim().is_empty()) {
            return Err(FillError::InvalidConfig(format!(
                "Engine '{}' has an empty program",
                e.name
            )));
        }
        Ok(self.config)
    }
}
