use crate::gemini::{GeminiError, GenerativeApi};
use crate::session::UploadedAsset;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::fs;
use tracing::info;

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("File name is empty after sanitizing")]
    BadFileName,
    #[error("Failed to stage file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Upload failed: {0}")]
    Api(#[from] GeminiError),
}

/// Accepted diagram formats, keyed by file extension.
pub fn mime_for_path(path: &Path) -> Option<&'static str> {
    match path
        .extension()?
        .to_str()?
        .to_ascii_lowercase()
        .as_str()
    {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        _ => None,
    }
}

/// Stages an uploaded diagram locally, relays it to the file API, and returns
/// the resulting asset handle. Runs once per uploaded file; no retries.
pub struct UploadRelay {
    api: Arc<dyn GenerativeApi>,
    staging_dir: PathBuf,
}

impl UploadRelay {
    pub fn new(api: Arc<dyn GenerativeApi>, staging_dir: PathBuf) -> Self {
        Self { api, staging_dir }
    }

    /// Writes `bytes` under the sanitized original name (overwriting any
    /// previous file with that name; staged files are never cleaned up) and
    /// performs the one outbound upload call.
    pub async fn upload(
        &self,
        original_name: &str,
        mime_type: &str,
        bytes: Vec<u8>,
    ) -> Result<UploadedAsset, UploadError> {
        let file_name = sanitize_filename(original_name);
        if file_name.is_empty() {
            return Err(UploadError::BadFileName);
        }

        fs::create_dir_all(&self.staging_dir).await?;
        let staged = self.staging_dir.join(&file_name);
        fs::write(&staged, &bytes).await?;
        info!(
            "Staged '{}' ({} bytes) at {}",
            file_name,
            bytes.len(),
            staged.display()
        );

        let remote = self.api.upload(&file_name, mime_type, bytes).await?;
        info!("Registered '{}' as {} ({})", file_name, remote.uri, remote.name);

        Ok(UploadedAsset {
            local_name: remote.display_name.unwrap_or(file_name),
            mime_type: remote.mime_type.unwrap_or_else(|| mime_type.to_string()),
            remote_uri: remote.uri,
        })
    }
}

fn sanitize_filename(name: &str) -> String {
    name.replace(['/', '\\', '\0', ':', '*', '?', '"', '<', '>', '|'], "_")
        .trim()
        .chars()
        .take(200)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GenerationConfig;
    use crate::gemini::RemoteFile;
    use crate::session::Turn;
    use async_trait::async_trait;

    struct MockApi;

    #[async_trait]
    impl GenerativeApi for MockApi {
        async fn upload(
            &self,
            display_name: &str,
            mime_type: &str,
            _bytes: Vec<u8>,
        ) -> Result<RemoteFile, GeminiError> {
            Ok(RemoteFile {
                name: "files/staged1".to_string(),
                display_name: Some(display_name.to_string()),
                mime_type: Some(mime_type.to_string()),
                uri: "https://generativelanguage.googleapis.com/v1beta/files/staged1".to_string(),
            })
        }

        async fn generate(
            &self,
            _turns: &[Turn],
            _generation: &GenerationConfig,
        ) -> Result<String, GeminiError> {
            unimplemented!("not exercised by upload tests")
        }
    }

    fn relay(dir: &Path) -> UploadRelay {
        UploadRelay::new(Arc::new(MockApi), dir.to_path_buf())
    }

    #[test]
    fn mime_is_inferred_from_extension() {
        assert_eq!(mime_for_path(Path::new("d.png")), Some("image/png"));
        assert_eq!(mime_for_path(Path::new("d.jpg")), Some("image/jpeg"));
        assert_eq!(mime_for_path(Path::new("d.JPEG")), Some("image/jpeg"));
        assert_eq!(mime_for_path(Path::new("d.gif")), None);
        assert_eq!(mime_for_path(Path::new("diagram")), None);
    }

    #[tokio::test]
    async fn stages_bytes_under_original_name() {
        let dir = tempfile::tempdir().unwrap();
        let asset = relay(dir.path())
            .upload("diagram.png", "image/png", b"png-bytes".to_vec())
            .await
            .unwrap();

        assert_eq!(asset.local_name, "diagram.png");
        assert_eq!(asset.mime_type, "image/png");
        assert_eq!(
            asset.remote_uri,
            "https://generativelanguage.googleapis.com/v1beta/files/staged1"
        );
        let staged = std::fs::read(dir.path().join("diagram.png")).unwrap();
        assert_eq!(staged, b"png-bytes");
    }

    #[tokio::test]
    async fn overwrites_existing_staged_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("diagram.png"), b"old").unwrap();

        relay(dir.path())
            .upload("diagram.png", "image/png", b"new".to_vec())
            .await
            .unwrap();

        let staged = std::fs::read(dir.path().join("diagram.png")).unwrap();
        assert_eq!(staged, b"new");
    }

    #[tokio::test]
    async fn sanitizes_path_separators_out_of_the_name() {
        let dir = tempfile::tempdir().unwrap();
        let asset = relay(dir.path())
            .upload("../evil.png", "image/png", b"x".to_vec())
            .await
            .unwrap();

        assert_eq!(asset.local_name, ".._evil.png");
        assert!(dir.path().join(".._evil.png").exists());
    }

    #[tokio::test]
    async fn rejects_names_that_sanitize_to_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let err = relay(dir.path())
            .upload("  ", "image/png", b"x".to_vec())
            .await
            .unwrap_err();
        assert!(matches!(err, UploadError::BadFileName));
    }
}
