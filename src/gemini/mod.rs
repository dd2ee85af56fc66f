use crate::config::GenerationConfig;
use crate::session::{Role, Turn};
use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;
use types::{
    Content, FileData, FileEnvelope, FileMetadata, GenerateContentRequest, GenerateContentResponse,
    GenerationSettings, Part, StartUploadRequest,
};

mod types;

pub use types::RemoteFile;

const BASE_URL: &str = "https://generativelanguage.googleapis.com";
const UPLOAD_URL_HEADER: &str = "x-goog-upload-url";

#[derive(Debug, Error)]
pub enum GeminiError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },
    #[error("upload start did not return an upload URL")]
    MissingUploadUrl,
    #[error("response contained no text candidate")]
    EmptyResponse,
}

/// The two remote operations this tool performs. The session and the upload
/// relay depend on this seam so tests can inject a mock.
#[async_trait]
pub trait GenerativeApi: Send + Sync {
    /// Registers a file with the service and returns its remote handle.
    async fn upload(
        &self,
        display_name: &str,
        mime_type: &str,
        bytes: Vec<u8>,
    ) -> Result<RemoteFile, GeminiError>;

    /// Sends the transcript and returns the model's text reply.
    async fn generate(
        &self,
        turns: &[Turn],
        generation: &GenerationConfig,
    ) -> Result<String, GeminiError>;
}

pub struct Client {
    http: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl Client {
    pub fn new(api_key: &str, model: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            base_url: BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    /// Registers `bytes` with the file API using the resumable upload
    /// protocol: one request to open the session, one to send the bytes and
    /// finalize.
    pub async fn upload_file(
        &self,
        display_name: &str,
        mime_type: &str,
        bytes: Vec<u8>,
    ) -> Result<RemoteFile, GeminiError> {
        let start_url = format!("{}/upload/v1beta/files", self.base_url);
        let response = self
            .http
            .post(&start_url)
            .query(&[("key", self.api_key.as_str())])
            .header("X-Goog-Upload-Protocol", "resumable")
            .header("X-Goog-Upload-Command", "start")
            .header("X-Goog-Upload-Header-Content-Length", bytes.len().to_string())
            .header("X-Goog-Upload-Header-Content-Type", mime_type)
            .json(&StartUploadRequest {
                file: FileMetadata {
                    display_name: display_name.to_string(),
                },
            })
            .send()
            .await?;
        let response = error_for_status(response).await?;

        let upload_url = response
            .headers()
            .get(UPLOAD_URL_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
            .ok_or(GeminiError::MissingUploadUrl)?;

        debug!("Upload session opened for '{}'", display_name);

        let response = self
            .http
            .post(upload_url)
            .header("X-Goog-Upload-Command", "upload, finalize")
            .header("X-Goog-Upload-Offset", "0")
            .body(bytes)
            .send()
            .await?;
        let response = error_for_status(response).await?;

        let envelope: FileEnvelope = response.json().await?;
        Ok(envelope.file)
    }

    pub async fn generate_content(
        &self,
        contents: Vec<Content>,
        generation: &GenerationConfig,
    ) -> Result<String, GeminiError> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        );
        let request = GenerateContentRequest {
            contents,
            generation_config: GenerationSettings::from(generation),
        };

        let response = self
            .http
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&request)
            .send()
            .await?;
        let response = error_for_status(response).await?;

        let parsed: GenerateContentResponse = response.json().await?;
        parsed.into_text().ok_or(GeminiError::EmptyResponse)
    }
}

#[async_trait]
impl GenerativeApi for Client {
    async fn upload(
        &self,
        display_name: &str,
        mime_type: &str,
        bytes: Vec<u8>,
    ) -> Result<RemoteFile, GeminiError> {
        self.upload_file(display_name, mime_type, bytes).await
    }

    async fn generate(
        &self,
        turns: &[Turn],
        generation: &GenerationConfig,
    ) -> Result<String, GeminiError> {
        self.generate_content(contents_from_turns(turns), generation)
            .await
    }
}

fn contents_from_turns(turns: &[Turn]) -> Vec<Content> {
    turns
        .iter()
        .map(|turn| {
            let mut parts = Vec::new();
            if let Some(asset) = &turn.attachment {
                parts.push(Part::File {
                    file_data: FileData {
                        mime_type: asset.mime_type.clone(),
                        file_uri: asset.remote_uri.clone(),
                    },
                });
            }
            if !turn.content.is_empty() {
                parts.push(Part::Text {
                    text: turn.content.clone(),
                });
            }
            Content {
                role: match turn.role {
                    Role::User => "user",
                    Role::Assistant => "model",
                }
                .to_string(),
                parts,
            }
        })
        .collect()
}

async fn error_for_status(response: reqwest::Response) -> Result<reqwest::Response, GeminiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<types::ErrorEnvelope>(&body)
        .map(|envelope| {
            let status_text = envelope.error.status.unwrap_or_default();
            let message = envelope.error.message.unwrap_or_else(|| body.clone());
            if status_text.is_empty() {
                message
            } else {
                format!("{status_text}: {message}")
            }
        })
        .unwrap_or(body);

    Err(GeminiError::Api {
        status: status.as_u16(),
        message,
    })
}
