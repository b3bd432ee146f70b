//! # contract: collaborator interfaces for the book pipeline
//!
//! The pipeline talks to three collaborators, each behind a trait so that
//! production code and tests can plug in their own implementation:
//!
//! - [`CompletionClient`]: submits a role-tagged prompt to an LLM and returns
//!   one text completion.
//! - [`BookRenderer`]: turns an ordered [`Book`] into document bytes.
//! - [`ArtifactStore`]: persists snapshots and rendered documents, and serves
//!   them back for download.
//!
//! ## Mocking & Testing
//! - Every trait is annotated for `mockall`; the mocks are exported behind the
//!   default `test-export-mocks` feature so integration tests in other crates
//!   can use them.

use async_trait::async_trait;
use mockall::automock;
use serde::Serialize;

use crate::book::Book;
use crate::render::RenderError;
use crate::storage::{ArtifactKey, StorageError};

/// Error type for completion calls (boxed, so any transport can report its own error).
pub type CompletionError = Box<dyn std::error::Error + Send + Sync>;

/// Role of a single chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
}

/// One role-tagged message of a prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

/// A prompt: a system instruction followed by a user clarifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

impl Prompt {
    pub fn new(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
        }
    }

    /// Message list in the order the upstream expects: system, then user.
    pub fn messages(&self) -> Vec<ChatMessage> {
        vec![
            ChatMessage {
                role: Role::System,
                content: self.system.clone(),
            },
            ChatMessage {
                role: Role::User,
                content: self.user.clone(),
            },
        ]
    }
}

/// Trait for submitting a prompt to an LLM service.
///
/// One call is one upstream request; implementations must not retry.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Submit the prompt and return the completion text.
    async fn complete(&self, prompt: &Prompt) -> Result<String, CompletionError>;
}

/// Trait for rendering a finished book into a document.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
pub trait BookRenderer: Send + Sync {
    /// File extension (without dot) of the produced document.
    fn extension(&self) -> &'static str;

    /// Render the book and return the document bytes.
    fn render(&self, title: &str, book: &Book) -> Result<Vec<u8>, RenderError>;
}

/// Trait for persisting and retrieving generated artifacts.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Write the artifact, replacing any previous content under the same key.
    async fn put(&self, key: &ArtifactKey, content: &[u8]) -> Result<(), StorageError>;

    /// Read a stored artifact.
    async fn get(&self, key: &ArtifactKey) -> Result<Vec<u8>, StorageError>;

    /// Check whether an artifact exists.
    async fn exists(&self, key: &ArtifactKey) -> bool;
}
