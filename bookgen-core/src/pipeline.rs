//! High-level pipeline: title → outline → chapter fan-out → render → persist.
//!
//! One call of [`run_pipeline`] handles one book request. The request moves
//! through the [`GenerationStage`]s in order and never goes back:
//!
//! `Received → OutlineRequested → OutlineParsed → ChaptersFannedOut →
//! ChaptersCollected → Rendered → Persisted`
//!
//! # Error Handling
//! - Anything failing before the fan-out (blank title, outline request,
//!   outline parse) aborts the request with a [`PipelineError`].
//! - Subchapter failures inside the fan-out are absorbed in
//!   [`crate::generate`]; they only shorten the book. The returned
//!   [`BookArtifact`] carries requested vs. generated counts.
//! - Rendering and storage failures after the fan-out are fatal as well, as is
//!   a PDF that cannot be found in the store after it was written.
//!
//! # Storage Layout
//! With `isolate_requests` on, every artifact of a request lives under the
//! request's UUID; otherwise everything shares the store root, and titles that
//! normalise to the same name overwrite each other.

use std::fmt;
use std::sync::Arc;

use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::contract::{ArtifactStore, BookRenderer, CompletionClient, CompletionError};
use crate::generate::{generate_book, generate_outline, FanOutLimit};
use crate::naming::{artifact_file_name, book_snapshot_name, derive_base_name, OUTLINE_SNAPSHOT};
use crate::outline::{parse_outline, OutlineError};
use crate::render::RenderError;
use crate::storage::{ArtifactKey, StorageError};

/// Request-scoped pipeline settings.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Maximum in-flight subchapter requests per book; `None` is unbounded.
    pub max_concurrent_requests: Option<usize>,
    /// Store each request's artifacts under its own request id.
    pub isolate_requests: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_concurrent_requests: None,
            isolate_requests: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationStage {
    Received,
    OutlineRequested,
    OutlineParsed,
    ChaptersFannedOut,
    ChaptersCollected,
    Rendered,
    Persisted,
}

impl fmt::Display for GenerationStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            GenerationStage::Received => "Received",
            GenerationStage::OutlineRequested => "OutlineRequested",
            GenerationStage::OutlineParsed => "OutlineParsed",
            GenerationStage::ChaptersFannedOut => "ChaptersFannedOut",
            GenerationStage::ChaptersCollected => "ChaptersCollected",
            GenerationStage::Rendered => "Rendered",
            GenerationStage::Persisted => "Persisted",
        };
        f.write_str(name)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("book title must contain at least one usable character")]
    InvalidTitle,

    #[error("failed to generate chapters: {0}")]
    OutlineGenerationFailed(#[source] CompletionError),

    #[error("failed to decode the outline: {0}")]
    OutlineParseError(#[from] OutlineError),

    #[error("failed to render the book: {0}")]
    RenderFailed(#[from] RenderError),

    #[error("failed to store artifact: {0}")]
    StorageFailed(#[from] StorageError),

    #[error("rendered file not found: {0}")]
    ArtifactMissing(String),
}

impl PipelineError {
    /// Last stage the request reached before failing.
    pub fn stage(&self) -> GenerationStage {
        match self {
            PipelineError::InvalidTitle => GenerationStage::Received,
            PipelineError::OutlineGenerationFailed(_) | PipelineError::OutlineParseError(_) => {
                GenerationStage::OutlineRequested
            }
            PipelineError::RenderFailed(_) => GenerationStage::ChaptersCollected,
            PipelineError::StorageFailed(_) | PipelineError::ArtifactMissing(_) => {
                GenerationStage::Rendered
            }
        }
    }
}

/// Result of a completed request.
#[derive(Debug, Clone)]
pub struct BookArtifact {
    pub request_id: Uuid,
    /// Key of the rendered document.
    pub key: ArtifactKey,
    pub chapters: usize,
    pub subchapters_requested: usize,
    pub subchapters_generated: usize,
}

impl BookArtifact {
    /// Handle accepted by the download endpoint.
    pub fn download_path(&self) -> String {
        self.key.download_path()
    }
}

fn enter(stage: GenerationStage) {
    info!(stage = %stage, "[PIPELINE] Stage reached");
}

/// Run one book request end to end.
///
/// Rendering runs on the blocking pool, so the renderer is shared by `Arc`.
pub async fn run_pipeline<C, R, S>(
    client: &C,
    renderer: Arc<R>,
    store: &S,
    config: &PipelineConfig,
    book_title: &str,
) -> Result<BookArtifact, PipelineError>
where
    C: CompletionClient + ?Sized,
    R: BookRenderer + ?Sized + 'static,
    S: ArtifactStore + ?Sized,
{
    let request_id = Uuid::new_v4();
    let span = info_span!("book_request", %request_id, title = book_title);
    async move {
        let result = execute(client, renderer, store, config, book_title, request_id).await;
        if let Err(e) = &result {
            error!(error = %e, stage = %e.stage(), "[PIPELINE] Request failed");
        }
        result
    }
    .instrument(span)
    .await
}

/// Keys of the three artifacts a request writes.
struct RequestKeys {
    outline: ArtifactKey,
    snapshot: ArtifactKey,
    document: ArtifactKey,
}

impl RequestKeys {
    fn derive(
        namespace: Option<String>,
        book_title: &str,
        extension: &str,
    ) -> Result<Self, StorageError> {
        Ok(Self {
            outline: ArtifactKey::new(namespace.clone(), OUTLINE_SNAPSHOT)?,
            snapshot: ArtifactKey::new(namespace.clone(), book_snapshot_name(book_title))?,
            document: ArtifactKey::new(namespace, artifact_file_name(book_title, extension))?,
        })
    }
}

async fn execute<C, R, S>(
    client: &C,
    renderer: Arc<R>,
    store: &S,
    config: &PipelineConfig,
    book_title: &str,
    request_id: Uuid,
) -> Result<BookArtifact, PipelineError>
where
    C: CompletionClient + ?Sized,
    R: BookRenderer + ?Sized + 'static,
    S: ArtifactStore + ?Sized,
{
    enter(GenerationStage::Received);
    let book_title = book_title.trim();
    if derive_base_name(book_title).is_empty() {
        return Err(PipelineError::InvalidTitle);
    }
    let namespace = config.isolate_requests.then(|| request_id.to_string());
    let keys = RequestKeys::derive(namespace, book_title, renderer.extension()).map_err(|e| {
        warn!(error = %e, "[PIPELINE] Title does not yield a usable file name");
        PipelineError::InvalidTitle
    })?;

    // --- Outline ---
    enter(GenerationStage::OutlineRequested);
    let raw_outline = generate_outline(client, book_title)
        .await
        .map_err(PipelineError::OutlineGenerationFailed)?;
    store.put(&keys.outline, raw_outline.as_bytes()).await?;

    let outline = parse_outline(&raw_outline)?;
    enter(GenerationStage::OutlineParsed);
    let subchapters_requested = outline.subchapter_count();

    // --- Fan-out ---
    enter(GenerationStage::ChaptersFannedOut);
    let limit = FanOutLimit::from_option(config.max_concurrent_requests);
    let book = generate_book(client, &outline, book_title, &limit).await;
    enter(GenerationStage::ChaptersCollected);

    let chapters = book.chapters.len();
    let subchapters_generated = book.subchapter_count();
    if subchapters_generated < subchapters_requested {
        warn!(
            requested = subchapters_requested,
            generated = subchapters_generated,
            "[PIPELINE] Some subchapters were dropped"
        );
    }

    let snapshot = book.to_json_pretty().map_err(StorageError::Snapshot)?;
    store.put(&keys.snapshot, snapshot.as_bytes()).await?;

    // --- Render ---
    let title = book_title.to_string();
    let document = tokio::task::spawn_blocking(move || renderer.render(&title, &book))
        .await
        .map_err(RenderError::from)??;
    enter(GenerationStage::Rendered);

    // --- Persist ---
    let key = keys.document;
    store.put(&key, &document).await?;
    if !store.exists(&key).await {
        return Err(PipelineError::ArtifactMissing(key.download_path()));
    }
    enter(GenerationStage::Persisted);

    info!(
        key = %key,
        size = document.len(),
        chapters,
        "[PIPELINE] Book ready"
    );
    Ok(BookArtifact {
        request_id,
        key,
        chapters,
        subchapters_requested,
        subchapters_generated,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::{MockArtifactStore, MockBookRenderer, MockCompletionClient};

    const OUTLINE: &str = r#"{"Intro": ["A", "B"], "Body": ["C"]}"#;

    fn pdf_renderer() -> MockBookRenderer {
        let mut renderer = MockBookRenderer::new();
        renderer.expect_extension().return_const("pdf");
        renderer
            .expect_render()
            .returning(|_, _| Ok(b"%PDF-1.3".to_vec()));
        renderer
    }

    fn accepting_store(exists: bool) -> MockArtifactStore {
        let mut store = MockArtifactStore::new();
        store.expect_put().returning(|_, _| Ok(()));
        store.expect_exists().return_const(exists);
        store
    }

    #[tokio::test]
    async fn blank_title_makes_no_upstream_calls() {
        let mut client = MockCompletionClient::new();
        client.expect_complete().never();
        let mut store = MockArtifactStore::new();
        store.expect_put().never();

        let err = run_pipeline(&client, Arc::new(pdf_renderer()), &store, &PipelineConfig::default(), "   ")
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::InvalidTitle));
    }

    #[tokio::test]
    async fn title_without_usable_characters_fails_before_the_outline() {
        let mut client = MockCompletionClient::new();
        client.expect_complete().never();
        let mut store = MockArtifactStore::new();
        store.expect_put().never();

        let err = run_pipeline(&client, Arc::new(pdf_renderer()), &store, &PipelineConfig::default(), "???")
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::InvalidTitle));
    }

    #[tokio::test]
    async fn control_characters_in_the_title_do_not_reach_the_file_name() {
        let mut client = MockCompletionClient::new();
        client
            .expect_complete()
            .withf(|p| p.system.contains("in JSON format"))
            .returning(|_| Ok(r#"{"Only": ["One"]}"#.to_string()));
        client
            .expect_complete()
            .returning(|_| Ok("Text.".to_string()));
        let config = PipelineConfig {
            isolate_requests: false,
            ..PipelineConfig::default()
        };

        let artifact = run_pipeline(
            &client,
            Arc::new(pdf_renderer()),
            &accepting_store(true),
            &config,
            "A\u{1}\"B\"\0",
        )
        .await
        .unwrap();
        assert_eq!(artifact.download_path(), "A__B__.pdf");
    }

    #[tokio::test]
    async fn outline_failure_skips_the_fan_out() {
        let mut client = MockCompletionClient::new();
        client
            .expect_complete()
            .times(1)
            .returning(|_| Err("upstream unavailable".into()));
        let mut renderer = MockBookRenderer::new();
        renderer.expect_extension().return_const("pdf");
        renderer.expect_render().never();

        let err = run_pipeline(
            &client,
            Arc::new(renderer),
            &accepting_store(true),
            &PipelineConfig::default(),
            "AI Book",
        )
        .await
        .unwrap_err();
        assert!(matches!(err, PipelineError::OutlineGenerationFailed(_)));
        assert!(err.to_string().contains("upstream unavailable"));
    }

    #[tokio::test]
    async fn malformed_outline_is_a_parse_error() {
        let mut client = MockCompletionClient::new();
        client
            .expect_complete()
            .times(1)
            .returning(|_| Ok("{not json".to_string()));

        let err = run_pipeline(
            &client,
            Arc::new(pdf_renderer()),
            &accepting_store(true),
            &PipelineConfig::default(),
            "AI Book",
        )
        .await
        .unwrap_err();
        assert!(matches!(err, PipelineError::OutlineParseError(_)));
    }

    #[tokio::test]
    async fn missing_artifact_after_write_is_reported() {
        let mut client = MockCompletionClient::new();
        client
            .expect_complete()
            .withf(|p| p.system.contains("in JSON format"))
            .times(1)
            .returning(|_| Ok(OUTLINE.to_string()));
        client
            .expect_complete()
            .returning(|_| Ok("Some prose.".to_string()));

        let err = run_pipeline(
            &client,
            Arc::new(pdf_renderer()),
            &accepting_store(false),
            &PipelineConfig::default(),
            "AI Book",
        )
        .await
        .unwrap_err();
        assert!(matches!(err, PipelineError::ArtifactMissing(_)));
    }

    #[tokio::test]
    async fn successful_run_counts_dropped_subchapters() {
        let mut client = MockCompletionClient::new();
        client
            .expect_complete()
            .withf(|p| p.system.contains("in JSON format"))
            .times(1)
            .returning(|_| Ok(OUTLINE.to_string()));
        client
            .expect_complete()
            .withf(|p| p.system.contains("subchapter is 'B'"))
            .times(1)
            .returning(|_| Err("rate limited".into()));
        client
            .expect_complete()
            .times(2)
            .returning(|_| Ok("Some prose.".to_string()));

        let mut store = MockArtifactStore::new();
        store
            .expect_put()
            .times(3)
            .withf(|key, _| key.namespace().is_none())
            .returning(|_, _| Ok(()));
        store.expect_exists().return_const(true);

        let config = PipelineConfig {
            max_concurrent_requests: Some(1),
            isolate_requests: false,
        };
        let artifact = run_pipeline(&client, Arc::new(pdf_renderer()), &store, &config, "AI: What Now?")
            .await
            .unwrap();

        assert_eq!(artifact.download_path(), "AI-_What_Now.pdf");
        assert_eq!(artifact.chapters, 2);
        assert_eq!(artifact.subchapters_requested, 3);
        assert_eq!(artifact.subchapters_generated, 2);
    }

    #[tokio::test]
    async fn isolated_requests_use_the_request_id_namespace() {
        let mut client = MockCompletionClient::new();
        client
            .expect_complete()
            .withf(|p| p.system.contains("in JSON format"))
            .returning(|_| Ok(r#"{"Only": ["One"]}"#.to_string()));
        client
            .expect_complete()
            .returning(|_| Ok("Text.".to_string()));

        let artifact = run_pipeline(
            &client,
            Arc::new(pdf_renderer()),
            &accepting_store(true),
            &PipelineConfig::default(),
            "Solo",
        )
        .await
        .unwrap();
        assert_eq!(
            artifact.key.namespace(),
            Some(artifact.request_id.to_string().as_str())
        );
        assert_eq!(
            artifact.download_path(),
            format!("{}/Solo.pdf", artifact.request_id)
        );
    }

    /// Records the thread it renders on; panics when asked to.
    struct RecordingRenderer {
        render_thread: std::sync::Mutex<Option<std::thread::ThreadId>>,
        panic: bool,
    }

    impl BookRenderer for RecordingRenderer {
        fn extension(&self) -> &'static str {
            "pdf"
        }

        fn render(&self, _title: &str, _book: &crate::Book) -> Result<Vec<u8>, RenderError> {
            *self.render_thread.lock().unwrap() = Some(std::thread::current().id());
            if self.panic {
                panic!("renderer blew up");
            }
            Ok(b"%PDF-1.3".to_vec())
        }
    }

    fn one_chapter_client() -> MockCompletionClient {
        let mut client = MockCompletionClient::new();
        client
            .expect_complete()
            .withf(|p| p.system.contains("in JSON format"))
            .returning(|_| Ok(r#"{"Only": ["One"]}"#.to_string()));
        client
            .expect_complete()
            .returning(|_| Ok("Text.".to_string()));
        client
    }

    #[tokio::test]
    async fn rendering_runs_off_the_request_thread() {
        let renderer = Arc::new(RecordingRenderer {
            render_thread: std::sync::Mutex::new(None),
            panic: false,
        });

        run_pipeline(
            &one_chapter_client(),
            Arc::clone(&renderer),
            &accepting_store(true),
            &PipelineConfig::default(),
            "Blocking",
        )
        .await
        .unwrap();

        let render_thread = renderer.render_thread.lock().unwrap().expect("render ran");
        assert_ne!(render_thread, std::thread::current().id());
    }

    #[tokio::test]
    async fn panicking_renderer_is_a_render_failure() {
        let renderer = Arc::new(RecordingRenderer {
            render_thread: std::sync::Mutex::new(None),
            panic: true,
        });

        let err = run_pipeline(
            &one_chapter_client(),
            renderer,
            &accepting_store(true),
            &PipelineConfig::default(),
            "Doomed",
        )
        .await
        .unwrap_err();
        assert!(matches!(err, PipelineError::RenderFailed(RenderError::Task(_))));
    }

    #[test]
    fn early_failures_report_pre_fan_out_stages() {
        assert_eq!(PipelineError::InvalidTitle.stage(), GenerationStage::Received);
        let parse = parse_outline("{not json").unwrap_err();
        assert_eq!(
            PipelineError::OutlineParseError(parse).stage(),
            GenerationStage::OutlineRequested
        );
        assert_eq!(
            PipelineError::ArtifactMissing("x.pdf".into()).stage(),
            GenerationStage::Rendered
        );
    }

    #[test]
    fn stage_names_match_the_state_machine() {
        assert_eq!(GenerationStage::ChaptersFannedOut.to_string(), "ChaptersFannedOut");
        assert_eq!(GenerationStage::Persisted.to_string(), "Persisted");
    }
}
