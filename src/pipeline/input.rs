//! Input resolution: normalise a user-supplied path or URL to template text.
//!
//! ## Why download to a temp file?
//!
//! Keeping URL inputs on disk rather than only in memory means the rest of
//! the pipeline handles exactly one representation (a readable local file),
//! and a failed request leaves nothing behind: the `TempDir` inside
//! [`ResolvedTemplate::Downloaded`] cleans up on drop. We sniff for the
//! `\documentclass` declaration up front so callers get a meaningful
//! [`FillError::MalformedTemplate`] instead of a confusing model or compile
//! failure later.

use crate::config::GenerationConfig;
use crate::error::FillError;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, info};

/// How many leading bytes to inspect for the `\documentclass` sniff.
/// Real templates put the declaration within the first few lines; the
/// window only exists so we never load a huge non-template file twice.
const SNIFF_BYTES: usize = 8192;

/// The resolved template — either a local path or a downloaded temp file.
#[derive(Debug)]
pub enum ResolvedTemplate {
    /// Input was already a local file.
    Local(PathBuf),
    /// Input was a URL; template downloaded to a temp directory.
    /// The `TempDir` is kept alive to prevent cleanup until processing completes.
    Downloaded { path: PathBuf, _temp_dir: TempDir },
}

impl ResolvedTemplate {
    /// Get the path to the template file regardless of how it was resolved.
    pub fn path(&self) -> &Path {
        match self {
            ResolvedTemplate::Local(p) => p,
            ResolvedTemplate::Downloaded { path, .. } => path,
        }
    }
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Resolve the input string to a local template file path.
///
/// If the input is a URL, download it to a temporary directory.
/// If the input is a local file, validate it exists and is readable.
pub async fn resolve_template(
    input: &str,
    config: &GenerationConfig,
) -> Result<ResolvedTemplate, FillError> {
    if is_url(input) {
        download_url(input, config).await
    } else if input.contains("://") {
        // Looks like a URL but is not a scheme we fetch.
        Err(FillError::InvalidInput {
            input: input.to_string(),
        })
    } else {
        resolve_local(input)
    }
}

/// Load the resolved template text, enforcing the configured size bound.
pub async fn read_template(
    resolved: &ResolvedTemplate,
    config: &GenerationConfig,
) -> Result<String, FillError> {
    let path = resolved.path();
    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| FillError::Internal(format!("failed to read template: {e}")))?;
    if text.len() > config.max_template_bytes {
        return Err(FillError::TemplateTooLarge {
            size: text.len(),
            limit: config.max_template_bytes,
        });
    }
    Ok(text)
}

/// Resolve a local file path, validating existence and the LaTeX sniff.
fn resolve_local(path_str: &str) -> Result<ResolvedTemplate, FillError> {
    let path = PathBuf::from(path_str);

    if !path.exists() {
        return Err(FillError::FileNotFound { path });
    }

    match std::fs::File::open(&path) {
        Ok(mut f) => {
            use std::io::Read;
            let mut head = vec![0u8; SNIFF_BYTES];
            let n = f.read(&mut head).unwrap_or(0);
            head.truncate(n);
            if !String::from_utf8_lossy(&head).contains("\\documentclass") {
                return Err(FillError::MalformedTemplate);
            }
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(FillError::PermissionDenied { path });
        }
        Err(_) => {
            return Err(FillError::FileNotFound { path });
        }
    }

    debug!("Resolved local template: {}", path.display());
    Ok(ResolvedTemplate::Local(path))
}

/// Download a URL to a temporary directory and return the path.
async fn download_url(url: &str, config: &GenerationConfig) -> Result<ResolvedTemplate, FillError> {
    info!("Downloading template from: {}", url);
    let timeout_secs = config.download_timeout_secs;

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| FillError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            FillError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            FillError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    })?;

    if !response.status().is_success() {
        return Err(FillError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let filename = extract_filename(url);

    let bytes = response.bytes().await.map_err(|e| FillError::DownloadFailed {
        url: url.to_string(),
        reason: e.to_string(),
    })?;

    if bytes.len() > config.max_template_bytes {
        return Err(FillError::TemplateTooLarge {
            size: bytes.len(),
            limit: config.max_template_bytes,
        });
    }
    if !String::from_utf8_lossy(&bytes).contains("\\documentclass") {
        return Err(FillError::MalformedTemplate);
    }

    let temp_dir = TempDir::new().map_err(|e| FillError::Internal(e.to_string()))?;
    let file_path = temp_dir.path().join(&filename);

    tokio::fs::write(&file_path, &bytes)
        .await
        .map_err(|e| FillError::Internal(format!("Failed to write temp file: {e}")))?;

    info!("Downloaded to: {}", file_path.display());

    Ok(ResolvedTemplate::Downloaded {
        path: file_path,
        _temp_dir: temp_dir,
    })
}

/// Extract a reasonable filename from the URL path.
fn extract_filename(url: &str) -> String {
    if let Ok(parsed) = reqwest::Url::parse(url) {
        if let Some(mut segments) = parsed.path_segments() {
            if let Some(last) = segments.next_back() {
                if !last.is_empty() && last.contains('.') {
                    return last.to_string();
                }
            }
        }
    }

    "downloaded.tex".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_url() {
        assert!(is_url("https://example.com/template.tex"));
        assert!(is_url("http://example.com/template.tex"));
        assert!(!is_url("/tmp/template.tex"));
        assert!(!is_url("template.tex"));
        assert!(!is_url(""));
    }

    #[test]
    fn test_extract_filename() {
        assert_eq!(
            extract_filename("https://example.com/invoices/letter.tex"),
            "letter.tex"
        );
        assert_eq!(extract_filename("https://example.com/"), "downloaded.tex");
        assert_eq!(extract_filename("https://example.com/raw"), "downloaded.tex");
    }

    #[tokio::test]
    async fn unsupported_scheme_is_invalid_input() {
        let config = GenerationConfig::default();
        let err = resolve_template("ftp://example.com/letter.tex", &config)
            .await
            .unwrap_err();
        assert!(matches!(err, FillError::InvalidInput { .. }));
    }

    #[test]
    fn missing_file_is_not_found() {
        let err = resolve_local("/definitely/not/here.tex").unwrap_err();
        assert!(matches!(err, FillError::FileNotFound { .. }));
    }

    #[test]
    fn non_latex_file_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, "shopping list\n- eggs\n").unwrap();
        let err = resolve_local(path.to_str().unwrap()).unwrap_err();
        assert!(matches!(err, FillError::MalformedTemplate));
    }

    #[test]
    fn latex_file_resolves() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("letter.tex");
        std::fs::write(
            &path,
            "\\documentclass{article}\n\\begin{document}\nhi\n\\end{document}\n",
        )
        .unwrap();
        let resolved = resolve_local(path.to_str().unwrap()).unwrap();
        assert_eq!(resolved.path(), path);
    }

    #[tokio::test]
    async fn read_template_enforces_size_bound() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("big.tex");
        let content = format!("\\documentclass{{article}}\n{}", "y".repeat(4096));
        std::fs::write(&path, &content).unwrap();

        let config = GenerationConfig::builder()
            .max_template_bytes(1024)
            .build()
            .unwrap();
        let resolved = ResolvedTemplate::Local(path);
        let err = read_template(&resolved, &config).await.unwrap_err();
        assert!(matches!(err, FillError::TemplateTooLarge { .. }));
    }
}
