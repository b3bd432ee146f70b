//! bookgen: HTTP service and CLI around the `bookgen-core` pipeline.
//!
//! This crate is glue only. It loads configuration, builds the OpenAI-compatible
//! [`openai::OpenAiClient`], and exposes the pipeline over HTTP ([`server`]) and
//! on the command line ([`cli`]). Generation, rendering and storage live in
//! `bookgen-core`.

pub mod cli;
pub mod load_config;
pub mod openai;
pub mod server;

pub use cli::{run, Cli, Commands};
