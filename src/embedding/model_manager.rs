//! Bundled/downloaded embedding model cache directory and integrity check.
//!
//! A single place that knows where model files live on disk and can verify
//! one hasn't been truncated or corrupted before it's loaded into an `ort`
//! session.

use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

/// Default on-disk location for cached embedding models, used when
/// `SPEAKERLINE_MODEL_DIR` isn't set.
pub fn default_cache_dir() -> Option<PathBuf> {
    dirs::data_dir().map(|base| base.join("speakerline").join("models"))
}

pub fn model_path(cache_dir: &Path, file_name: &str) -> PathBuf {
    cache_dir.join(file_name)
}

/// Compares a file's SHA-256 digest against an expected hex string.
pub fn verify_checksum(path: &Path, expected_sha256_hex: &str) -> std::io::Result<bool> {
    let bytes = std::fs::read(path)?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    let digest = hasher.finalize();
    let actual = digest.iter().map(|b| format!("{b:02x}")).collect::<String>();
    Ok(actual.eq_ignore_ascii_case(expected_sha256_hex))
}

/// Streams a model file from a gated URL into `destination`, writing to a
/// `.tmp` sibling first so a crash or interrupted connection never leaves a
/// half-written file at the real path.
#[cfg(feature = "model-download")]
pub async fn download_model(
    url: &str,
    destination: &Path,
    bearer_token: &str,
) -> Result<u64, DownloadError> {
    use futures_util::StreamExt;
    use tokio::io::AsyncWriteExt;

    let temp_path = destination.with_extension("tmp");
    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(3600))
        .build()
        .map_err(|e| DownloadError::Transport(e.to_string()))?;

    let response = client
        .get(url)
        .bearer_auth(bearer_token)
        .send()
        .await
        .map_err(|e| DownloadError::Transport(e.to_string()))?;

    if !response.status().is_success() {
        return Err(DownloadError::Transport(format!("download failed with status {}", response.status())));
    }

    if let Some(parent) = temp_path.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(|e| DownloadError::Io(e.to_string()))?;
    }
    let mut file = tokio::fs::File::create(&temp_path).await.map_err(|e| DownloadError::Io(e.to_string()))?;

    let mut downloaded = 0u64;
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| DownloadError::Transport(e.to_string()))?;
        file.write_all(&chunk).await.map_err(|e| DownloadError::Io(e.to_string()))?;
        downloaded += chunk.len() as u64;
    }
    file.sync_all().await.map_err(|e| DownloadError::Io(e.to_string()))?;
    drop(file);

    tokio::fs::rename(&temp_path, destination).await.map_err(|e| DownloadError::Io(e.to_string()))?;
    Ok(downloaded)
}

#[cfg(feature = "model-download")]
#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    #[error("model download transport error: {0}")]
    Transport(String),

    #[error("model download I/O error: {0}")]
    Io(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn checksum_matches_known_content() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"hello world").unwrap();
        // sha256("hello world")
        let expected = "b94d27b9934d3e08a52e52d7da7dacefbced943ea4226b7a8bc6946a41e6db8";
        assert!(verify_checksum(file.path(), expected).unwrap());
    }

    #[test]
    fn checksum_mismatch_is_detected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"hello world").unwrap();
        assert!(!verify_checksum(file.path(), "0000000000000000000000000000000000000000000000000000000000000000").unwrap());
    }

    #[test]
    fn default_cache_dir_ends_in_expected_segments() {
        if let Some(dir) = default_cache_dir() {
            assert!(dir.ends_with("speakerline/models") || dir.ends_with("speakerline\\models"));
        }
    }

    #[cfg(feature = "model-download")]
    #[tokio::test]
    async fn download_reports_transport_error_for_an_unreachable_url() {
        let dir = tempfile::tempdir().unwrap();
        let destination = dir.path().join("embedding.onnx");
        let result = download_model("http://127.0.0.1:1/does-not-exist", &destination, "token").await;
        assert!(matches!(result, Err(DownloadError::Transport(_))));
        assert!(!destination.exists());
    }
}
