//! In-memory book model produced by the fan-out and consumed by the renderer.

use serde::{Deserialize, Serialize};

/// Outcome of one subchapter generation task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubchapterOutcome {
    Generated(String),
    Failed(String),
}

impl SubchapterOutcome {
    pub fn is_generated(&self) -> bool {
        matches!(self, SubchapterOutcome::Generated(_))
    }
}

/// A successfully generated subchapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubchapterResult {
    #[serde(rename = "subchapter")]
    pub name: String,
    pub content: String,
}

/// A chapter with its surviving subchapters in outline order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChapterRecord {
    #[serde(rename = "chapter_title")]
    pub title: String,
    pub subchapters: Vec<SubchapterResult>,
}

impl ChapterRecord {
    /// Assemble a chapter from `(name, outcome)` pairs in launch order,
    /// dropping failed entries.
    pub fn from_outcomes<I>(title: impl Into<String>, outcomes: I) -> Self
    where
        I: IntoIterator<Item = (String, SubchapterOutcome)>,
    {
        let subchapters = outcomes
            .into_iter()
            .filter_map(|(name, outcome)| match outcome {
                SubchapterOutcome::Generated(content) => Some(SubchapterResult { name, content }),
                SubchapterOutcome::Failed(_) => None,
            })
            .collect();
        Self {
            title: title.into(),
            subchapters,
        }
    }

    /// Body text: subchapter contents joined by newlines.
    pub fn body(&self) -> String {
        self.subchapters
            .iter()
            .map(|s| s.content.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Ordered chapters of a generated book.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Book {
    pub chapters: Vec<ChapterRecord>,
}

impl Book {
    pub fn subchapter_count(&self) -> usize {
        self.chapters.iter().map(|c| c.subchapters.len()).sum()
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
