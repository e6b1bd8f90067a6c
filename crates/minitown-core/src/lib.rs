//! The minitown simulation engine.
//!
//! Drives the whole run: the simulated clock, the phase state machine
//! (Normal -> Earthquake -> Recovery -> PostQuakeDiscussion), social
//! interaction, and the tick loop that fans out per-agent work and
//! yields one frame per tick to the streaming server.
//!
//! # Modules
//!
//! - [`clock`] -- simulated time with phase-sized steps
//! - [`config`] -- run configuration and the [`Services`] aggregate
//! - [`conflict`] -- the MBTI conflict generator with per-location cooldowns
//! - [`phase`] -- the phase state machine
//! - [`social`] -- chat grouping and inner monologues
//! - [`tick`] -- the main loop

pub mod clock;
pub mod config;
pub mod conflict;
pub mod error;
pub mod phase;
pub mod social;
pub mod tick;

use std::sync::Arc;

use minitown_agents::persona::{load_persona, Persona};
use minitown_agents::TownAgent;
use tokio::sync::Mutex;

/// The agent registry shared between the tick engine, the motion loop,
/// and command handlers. Each agent has its own lock so per-agent
/// operations serialize while different agents proceed concurrently.
pub type SharedAgents = Arc<Vec<Arc<Mutex<TownAgent>>>>;

/// Load the persona file for one agent, if present.
pub fn persona_for(services: &config::Services, mbti: &str) -> Option<Persona> {
    load_persona(&services.persona_dir, mbti)
}

pub use config::{Services, SimulationConfig};
pub use error::SimError;
pub use tick::{build_agents, run_simulation, FrameSink, StepGate};
