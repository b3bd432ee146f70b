//! Concurrent content generation: the outline request and the two fan-out levels.
//!
//! Both coordinators build every task before awaiting any of them and collect
//! with [`join_all`], whose output slots follow input order. Reassembly
//! therefore depends on launch index only, never on which upstream call
//! finished first.
//!
//! Subchapter failures are absorbed at [`generate_subchapter`]: the error is
//! logged and turned into [`SubchapterOutcome::Failed`], so sibling tasks keep
//! running and nothing propagates to the chapter or book level.

use std::future::Future;
use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::book::{Book, ChapterRecord, SubchapterOutcome};
use crate::contract::{CompletionClient, CompletionError};
use crate::outline::Outline;
use crate::prompts::{outline_prompt, subchapter_prompt};

/// Limit on in-flight subchapter requests, shared by every chapter of one book.
#[derive(Debug, Clone, Default)]
pub struct FanOutLimit {
    permits: Option<Arc<Semaphore>>,
}

impl FanOutLimit {
    pub fn unbounded() -> Self {
        Self { permits: None }
    }

    /// At most `max` requests in flight; zero is treated as one.
    pub fn bounded(max: usize) -> Self {
        Self {
            permits: Some(Arc::new(Semaphore::new(max.max(1)))),
        }
    }

    pub fn from_option(max: Option<usize>) -> Self {
        max.map_or_else(Self::unbounded, Self::bounded)
    }

    async fn run<F: Future>(&self, task: F) -> F::Output {
        // The semaphore is never closed, so acquire only fails if that changes.
        let _permit = match &self.permits {
            Some(permits) => permits.acquire().await.ok(),
            None => None,
        };
        task.await
    }
}

/// A subchapter request that did not produce usable text.
#[derive(Debug, thiserror::Error)]
#[error("generation failed for subchapter '{subchapter}' of chapter '{chapter}': {reason}")]
pub struct SubchapterGenerationFailed {
    pub chapter: String,
    pub subchapter: String,
    pub reason: String,
}

/// Request the raw outline text. Empty replies count as failures.
pub async fn generate_outline<C>(client: &C, book_title: &str) -> Result<String, CompletionError>
where
    C: CompletionClient + ?Sized,
{
    info!(book_title, "[OUTLINE] Requesting outline");
    let raw = client.complete(&outline_prompt(book_title)).await?;
    if raw.trim().is_empty() {
        return Err("LLM returned an empty outline".into());
    }
    debug!(len = raw.len(), "[OUTLINE] Outline received");
    Ok(raw)
}

/// Request the prose of one subchapter. Never fails: errors become
/// [`SubchapterOutcome::Failed`].
pub async fn generate_subchapter<C>(
    client: &C,
    chapter: &str,
    subchapter: &str,
    book_title: &str,
) -> SubchapterOutcome
where
    C: CompletionClient + ?Sized,
{
    let prompt = subchapter_prompt(chapter, subchapter, book_title);
    let reason = match client.complete(&prompt).await {
        Ok(text) if !text.trim().is_empty() => {
            debug!(chapter, subchapter, len = text.len(), "Subchapter generated");
            return SubchapterOutcome::Generated(text);
        }
        Ok(_) => "empty completion".to_string(),
        Err(e) => e.to_string(),
    };
    let failure = SubchapterGenerationFailed {
        chapter: chapter.to_string(),
        subchapter: subchapter.to_string(),
        reason,
    };
    warn!(error = %failure, "Subchapter dropped");
    SubchapterOutcome::Failed(failure.to_string())
}

/// Fan out one request per subchapter, wait for all, keep the successes in
/// outline order. A chapter where everything failed is returned empty.
pub async fn generate_chapter<C>(
    client: &C,
    chapter: &str,
    subchapters: &[String],
    book_title: &str,
    limit: &FanOutLimit,
) -> ChapterRecord
where
    C: CompletionClient + ?Sized,
{
    let tasks = subchapters.iter().map(|subchapter| async move {
        let outcome = limit
            .run(generate_subchapter(client, chapter, subchapter, book_title))
            .await;
        (subchapter.clone(), outcome)
    });
    let outcomes = join_all(tasks).await;

    let record = ChapterRecord::from_outcomes(chapter, outcomes);
    info!(
        chapter,
        requested = subchapters.len(),
        generated = record.subchapters.len(),
        "[CHAPTER] Collected subchapters"
    );
    record
}

/// Fan out one chapter task per outline entry and assemble the book in
/// outline order.
pub async fn generate_book<C>(
    client: &C,
    outline: &Outline,
    book_title: &str,
    limit: &FanOutLimit,
) -> Book
where
    C: CompletionClient + ?Sized,
{
    info!(
        chapters = outline.chapter_count(),
        subchapters = outline.subchapter_count(),
        "[BOOK] Fanning out chapters"
    );
    let tasks = outline.chapters().iter().map(|entry| {
        generate_chapter(client, &entry.name, &entry.subchapters, book_title, limit)
    });
    Book {
        chapters: join_all(tasks).await,
    }
}
