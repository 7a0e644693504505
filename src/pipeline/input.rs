//! Input resolution: normalise a user-supplied path or URL to a local file.
//!
//! URL inputs are downloaded into a `TempDir` that lives as long as the
//! [`ResolvedInput`], so cleanup happens on drop even on early return. The
//! first non-blank byte is checked to be `{` before returning, so callers get
//! a clear "not a document" error instead of a JSON parser position.

use crate::error::DocTransError;
use std::io::Read;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, info};

/// The resolved input: either a local path or a downloaded temp file.
pub enum ResolvedInput {
    /// Input was already a local file.
    Local(PathBuf),
    /// Input was a URL; the document was downloaded to a temp directory.
    /// The `TempDir` is kept alive to prevent cleanup until processing completes.
    Downloaded { path: PathBuf, _temp_dir: TempDir },
}

impl ResolvedInput {
    /// Get the path to the document regardless of how it was resolved.
    pub fn path(&self) -> &Path {
        match self {
            ResolvedInput::Local(p) => p,
            ResolvedInput::Downloaded { path, .. } => path,
        }
    }
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Resolve the input string to a local document path.
///
/// If the input is a URL, download it to a temporary directory.
/// If the input is a local file, validate it exists and is readable.
pub async fn resolve_input(input: &str, timeout_secs: u64) -> Result<ResolvedInput, DocTransError> {
    if is_url(input) {
        download_url(input, timeout_secs).await
    } else if input.trim().is_empty() {
        Err(DocTransError::InvalidInput {
            input: input.to_string(),
        })
    } else {
        resolve_local(input)
    }
}

/// File name used for the default output: `translated_<input name>`.
pub fn file_name_of(input: &str) -> String {
    if is_url(input) {
        return url_file_name(input);
    }
    Path::new(input)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document.json".to_string())
}

fn resolve_local(path_str: &str) -> Result<ResolvedInput, DocTransError> {
    let path = PathBuf::from(path_str);

    if !path.is_file() {
        return Err(DocTransError::FileNotFound { path });
    }

    match std::fs::File::open(&path) {
        Ok(f) => {
            let mut head = Vec::with_capacity(64);
            if f.take(64).read_to_end(&mut head).is_ok() && !looks_like_document(&head) {
                return Err(DocTransError::DocumentUnreadable {
                    detail: format!("'{}' is not a JSON document", path.display()),
                });
            }
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(DocTransError::PermissionDenied { path });
        }
        Err(_) => {
            return Err(DocTransError::FileNotFound { path });
        }
    }

    debug!("Resolved local document: {}", path.display());
    Ok(ResolvedInput::Local(path))
}

/// Download a URL to a temporary directory and return the path.
async fn download_url(url: &str, timeout_secs: u64) -> Result<ResolvedInput, DocTransError> {
    info!("Downloading document from: {}", url);

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| DocTransError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            DocTransError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            DocTransError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    })?;

    if !response.status().is_success() {
        return Err(DocTransError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| DocTransError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    if !looks_like_document(&bytes) {
        return Err(DocTransError::DocumentUnreadable {
            detail: format!("'{url}' did not return a JSON document"),
        });
    }

    let temp_dir = TempDir::new().map_err(|e| DocTransError::Internal(e.to_string()))?;
    let file_path = temp_dir.path().join(url_file_name(url));

    tokio::fs::write(&file_path, &bytes)
        .await
        .map_err(|e| DocTransError::Internal(format!("Failed to write temp file: {}", e)))?;

    info!("Downloaded to: {}", file_path.display());

    Ok(ResolvedInput::Downloaded {
        path: file_path,
        _temp_dir: temp_dir,
    })
}

/// Last non-empty URL path segment that has an extension.
fn url_file_name(url: &str) -> String {
    if let Ok(parsed) = reqwest::Url::parse(url) {
        if let Some(mut segments) = parsed.path_segments() {
            if let Some(last) = segments.next_back() {
                if !last.is_empty() && last.contains('.') {
                    return last.to_string();
                }
            }
        }
    }

    "downloaded.json".to_string()
}

/// Empty input is let through so the parser reports it.
fn looks_like_document(head: &[u8]) -> bool {
    let head = head.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(head);
    match head.iter().find(|b| !b.is_ascii_whitespace()) {
        Some(b) => *b == b'{',
        None => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_url() {
        assert!(is_url("https://example.com/doc.json"));
        assert!(is_url("http://example.com/doc.json"));
        assert!(!is_url("/tmp/doc.json"));
        assert!(!is_url("doc.json"));
        assert!(!is_url(""));
    }

    #[test]
    fn test_file_name_of() {
        assert_eq!(file_name_of("/tmp/a/report.json"), "report.json");
        assert_eq!(file_name_of("https://example.com/x/report.json?v=2"), "report.json");
        assert_eq!(file_name_of("https://example.com/"), "downloaded.json");
    }

    #[test]
    fn test_looks_like_document() {
        assert!(looks_like_document(b"  \n{\"body\": []}"));
        assert!(looks_like_document(b"\xEF\xBB\xBF{}"));
        assert!(!looks_like_document(b"PK\x03\x04"));
        assert!(!looks_like_document(b"[1,2]"));
    }

    #[tokio::test]
    async fn missing_file() {
        let err = resolve_input("/definitely/not/here.json", 5)
            .await
            .err()
            .unwrap();
        assert!(matches!(err, DocTransError::FileNotFound { .. }));
    }

    #[tokio::test]
    async fn binary_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.docx");
        std::fs::write(&path, b"PK\x03\x04 zipped").unwrap();
        let err = resolve_input(path.to_str().unwrap(), 5).await.err().unwrap();
        assert!(matches!(err, DocTransError::DocumentUnreadable { .. }));
    }

    #[tokio::test]
    async fn json_file_resolves() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.json");
        std::fs::write(&path, b"{\"body\": []}").unwrap();
        let resolved = resolve_input(path.to_str().unwrap(), 5).await.unwrap();
        assert_eq!(resolved.path(), path.as_path());
    }
}
