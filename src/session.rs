use crate::config::GenerationConfig;
use crate::gemini::{GeminiError, GenerativeApi};
use crate::prompt;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

/// One message in the conversation transcript. Immutable once appended.
#[derive(Debug, Clone)]
pub struct Turn {
    pub role: Role,
    pub content: String,
    /// Set only on the seed turn, which carries the uploaded diagram.
    pub attachment: Option<UploadedAsset>,
}

impl Turn {
    fn new(role: Role, content: impl Into<String>, attachment: Option<UploadedAsset>) -> Self {
        Self {
            role,
            content: content.into(),
            attachment,
        }
    }

    fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content, None)
    }

    fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content, None)
    }
}

/// Handle for a diagram registered with the file API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedAsset {
    pub local_name: String,
    pub mime_type: String,
    pub remote_uri: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Uninitialized,
    Seeded,
    Active,
}

/// How the session behaves after seeding: an interactive chat loop, or a
/// single automatic request for the script.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionMode {
    Chat,
    ScriptOnly,
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Chat session is not initialized. Please upload an ER diagram to start.")]
    NotReady,
    #[error("A diagram was already uploaded for this session")]
    AlreadySeeded,
    #[error("Generation failed: {0}")]
    Generation(#[from] GeminiError),
}

/// Owns the transcript and drives the chat-turn protocol.
///
/// The session starts `Uninitialized`, becomes `Seeded` once an uploaded
/// diagram plus the fixed instruction form the first turn, and `Active` with
/// the first exchanged message. Messages are processed strictly in submission
/// order; there is never more than one in-flight call.
pub struct Session {
    api: Arc<dyn GenerativeApi>,
    generation: GenerationConfig,
    mode: SessionMode,
    transcript: Vec<Turn>,
    state: SessionState,
}

impl Session {
    pub fn new(api: Arc<dyn GenerativeApi>, generation: GenerationConfig, mode: SessionMode) -> Self {
        Self {
            api,
            generation,
            mode,
            transcript: Vec::new(),
            state: SessionState::Uninitialized,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn mode(&self) -> SessionMode {
        self.mode
    }

    pub fn transcript(&self) -> &[Turn] {
        &self.transcript
    }

    /// Seeds the session with an uploaded diagram and the fixed instruction.
    ///
    /// A session is seeded at most once; the interface layer constructs a new
    /// session for a new diagram instead of re-seeding.
    pub fn seed(&mut self, asset: UploadedAsset) -> Result<(), SessionError> {
        if self.state != SessionState::Uninitialized {
            return Err(SessionError::AlreadySeeded);
        }

        info!("Seeding session with '{}'", asset.local_name);
        self.transcript.push(Turn::new(
            Role::User,
            prompt::SEED_INSTRUCTION,
            Some(asset),
        ));
        self.state = SessionState::Seeded;
        Ok(())
    }

    /// Forwards the accumulated transcript plus `text` in one blocking call
    /// and returns the assistant's reply.
    ///
    /// The user and assistant turns are appended only after a successful
    /// response, so a failed call leaves the transcript untouched and a manual
    /// retry does not duplicate context.
    pub async fn send_message(&mut self, text: &str) -> Result<String, SessionError> {
        if self.state == SessionState::Uninitialized {
            return Err(SessionError::NotReady);
        }

        let user_turn = Turn::user(text);
        let mut outgoing = self.transcript.clone();
        outgoing.push(user_turn.clone());

        debug!("Sending {} turns to the model", outgoing.len());
        let reply = self.api.generate(&outgoing, &self.generation).await?;

        self.transcript.push(user_turn);
        self.transcript.push(Turn::assistant(reply.clone()));
        self.state = SessionState::Active;

        Ok(reply)
    }

    /// The non-interactive completion path: one fixed follow-up right after
    /// seeding, surfacing the generated script directly.
    pub async fn request_script(&mut self) -> Result<String, SessionError> {
        self.send_message(prompt::SCRIPT_FOLLOW_UP).await
    }
}
