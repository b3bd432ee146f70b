#![doc = "bookgen-core: core logic library for bookgen."]

//! This crate holds the book generation pipeline: the outline request, the
//! concurrent chapter/subchapter fan-out, PDF rendering and artifact storage.
//! HTTP serving, configuration files and the concrete LLM client live in the
//! `bookgen` binary crate.
//!
//! # Usage
//! Implement [`contract::CompletionClient`] for an LLM backend, pick a
//! [`contract::BookRenderer`] and an [`contract::ArtifactStore`], then call
//! [`pipeline::run_pipeline`].

pub mod book;
pub mod contract;
pub mod generate;
pub mod naming;
pub mod outline;
pub mod pipeline;
pub mod prompts;
pub mod render;
pub mod storage;

pub use book::{Book, ChapterRecord, SubchapterOutcome, SubchapterResult};
pub use contract::{ArtifactStore, BookRenderer, CompletionClient, CompletionError, Prompt};
pub use outline::{parse_outline, Outline, OutlineError};
pub use pipeline::{run_pipeline, BookArtifact, GenerationStage, PipelineConfig, PipelineError};
