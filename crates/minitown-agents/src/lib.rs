//! Agent logic for the minitown simulation.
//!
//! Everything that happens *to* or *inside* one agent: trait seeding from
//! the MBTI table, persona files, schedule-driven action transitions,
//! portal teleports, the earthquake/recovery behavior set, and the
//! disaster logger that scores the run at the end.
//!
//! # Modules
//!
//! - [`mbti`] -- the 16-type trait table and the disaster cooperation bonus
//! - [`persona`] -- `<base>/<mbti>/1.txt` persona file parsing
//! - [`config`] -- [`DisasterTuning`]: every tuned stochastic constant
//! - [`agent`] -- [`TownAgent`] state and small operations
//! - [`actions`] -- `set_new_action`, teleport, schedule refresh, init
//! - [`disaster`] -- quake reactions, per-step behavior, helping
//! - [`logger`] -- append-only event log and final scoring

pub mod actions;
pub mod agent;
pub mod config;
pub mod disaster;
pub mod error;
pub mod logger;
pub mod mbti;
pub mod persona;

pub use agent::TownAgent;
pub use config::DisasterTuning;
pub use disaster::{HelpIntent, HelpKind, PeerSnapshot};
pub use error::AgentError;
pub use logger::DisasterLogger;
