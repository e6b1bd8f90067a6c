//! Shared type definitions for the minitown simulation.
//!
//! This crate is the single source of truth for the types that cross crate
//! boundaries: the personality and phase enumerations used by the engine,
//! and the wire protocol exchanged with the 3D front end.
//!
//! # Modules
//!
//! - [`enums`] -- Enumeration types (MBTI, phase, mental state, disaster events)
//! - [`wire`] -- Client commands and server frames for the WebSocket protocol

pub mod enums;
pub mod wire;

// Re-export all public types at crate root for convenience.
pub use enums::{DisasterEventKind, MentalState, Mbti, Phase};
pub use wire::{
    ActionInstruction, AgentStateView, BuildingStateView, ClientCommand, EvaluationReport,
    MicroMotion, MotionData, ScoreDetail, ServerFrame, SimulationParams, UpdateData,
};
