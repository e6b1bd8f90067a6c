//! LLM integration for the minitown simulation.
//!
//! A single async entry point to a streaming text-generation endpoint
//! (Ollama-style newline-delimited JSON), plus everything needed to keep
//! its output safe for the engine: template rendering, traditional-Chinese
//! normalization, repetition collapse, structured-output extraction, and a
//! bounded in-memory call log.
//!
//! The cardinal rule of this crate: **the simulation path never sees an
//! error from here**. Every high-level call takes a default value and
//! returns it on timeout, network failure, or parse failure.
//!
//! # Modules
//!
//! - [`client`] -- [`LlmClient`]: streaming generation with timeout and offline mode
//! - [`prompts`] -- embedded prompt templates and `!<INPUT k>!` rendering
//! - [`sanitize`] -- simplified->traditional conversion and repetition collapse
//! - [`extract`] -- fenced/brace JSON extraction with typed defaults
//! - [`log`] -- fixed-capacity ring of call records
//! - [`api`] -- the per-prompt functions the engine calls

pub mod api;
pub mod client;
pub mod error;
pub mod extract;
pub mod log;
pub mod prompts;
pub mod sanitize;

pub use api::{ChatContext, ChatParticipant, MonologueContext};
pub use client::{LlmClient, LlmConfig};
pub use error::LlmError;
pub use log::{CallLog, CallRecord};
