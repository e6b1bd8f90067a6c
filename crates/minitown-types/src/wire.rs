//! Wire protocol for the single WebSocket connection.
//!
//! Commands flow client -> server tagged by a `command` field; frames flow
//! server -> client tagged by a `type` field. Field names follow the 3D
//! client's JSON contract exactly (`stepId`, `agentStates`, `fromPortal`,
//! `合作次數`, ...), so these types are the only place renames live.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Parameters of a `start_simulation` command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationParams {
    /// Total simulated duration in minutes.
    pub duration: i64,
    /// Minutes per tick in Normal and PostQuakeDiscussion phases.
    pub step: i64,
    /// Minutes per tick during an earthquake.
    #[serde(default = "default_eq_step")]
    pub eq_step: i64,
    pub year: i32,
    pub month: u32,
    pub day: u32,
    pub hour: u32,
    pub minute: u32,
    /// Agent roster; each entry must be one of the sixteen MBTI tokens.
    pub mbti: Vec<String>,
    /// Canonical locations the client can render.
    pub locations: Vec<String>,
    /// Agent name -> starting location.
    #[serde(default)]
    pub initial_positions: BTreeMap<String, String>,
    /// Whether the scheduled earthquake list is active.
    #[serde(default)]
    pub eq_enabled: bool,
    /// JSON array of `{time: "YYYY-MM-DD-HH-MM", duration, intensity}`.
    #[serde(default)]
    pub eq_json: String,
    #[serde(default)]
    pub use_default_calendar: bool,
    /// Upper bound on concurrent chat groups per tick (clamped to >= 1).
    #[serde(default = "default_max_chat_groups")]
    pub max_chat_groups: usize,
    /// Load schedules from the preset file instead of generating them.
    #[serde(default = "default_use_preset")]
    pub use_preset: bool,
    /// When set, the engine waits for `step_complete` acks between ticks.
    #[serde(default)]
    pub step_sync: bool,
}

fn default_eq_step() -> i64 {
    5
}

fn default_max_chat_groups() -> usize {
    1
}

fn default_use_preset() -> bool {
    true
}

/// A command received from the connected client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum ClientCommand {
    /// Tear down any running simulation and start a new one.
    StartSimulation { params: SimulationParams },
    /// Teleport an agent through a named portal.
    AgentTeleport {
        agent_name: String,
        target_portal_name: String,
    },
    /// Acknowledge a tick frame in step-sync mode.
    StepComplete { step_id: u64 },
    /// Force the motion loop to treat this agent as thinking.
    StartThinking { agent_name: String },
    /// Clear an explicit thinking override.
    StopThinking { agent_name: String },
}

/// Per-agent snapshot inside an `update` frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentStateView {
    pub name: String,
    #[serde(rename = "currentState")]
    pub current_state: String,
    pub location: String,
    pub hp: i32,
    /// Rendered as `"wake ~ sleep"`.
    pub schedule: String,
    pub memory: String,
    #[serde(rename = "weeklySchedule")]
    pub weekly_schedule: BTreeMap<String, String>,
    /// `[label, "HH-MM", target]` triples, in start-time order.
    #[serde(rename = "dailySchedule")]
    pub daily_schedule: Vec<Vec<String>>,
}

/// Per-building snapshot inside an `update` frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildingStateView {
    pub id: String,
    pub integrity: f64,
}

/// One rendering instruction for the client, emitted per agent per tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum ActionInstruction {
    /// The agent crossed a portal since the last frame.
    Teleport {
        agent: String,
        #[serde(rename = "fromPortal")]
        from_portal: String,
        #[serde(rename = "toPortal")]
        to_portal: String,
        #[serde(rename = "finalLocation")]
        final_location: String,
        #[serde(rename = "targetPlace")]
        target_place: String,
    },
    /// The agent is walking toward a destination.
    Move {
        agent: String,
        origin: String,
        destination: String,
        next_step: String,
        action: String,
    },
    /// The agent stays put and performs its action in place.
    Interact { agent: String, action: String },
}

/// Payload of an `update` frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateData {
    #[serde(rename = "mainLog")]
    pub main_log: String,
    #[serde(rename = "historyLog")]
    pub history_log: String,
    #[serde(rename = "agentStates")]
    pub agent_states: BTreeMap<String, AgentStateView>,
    #[serde(rename = "buildingStates")]
    pub building_states: BTreeMap<String, BuildingStateView>,
    #[serde(rename = "llmLog")]
    pub llm_log: String,
    pub status: String,
    #[serde(rename = "agentActions")]
    pub agent_actions: Vec<ActionInstruction>,
    #[serde(rename = "stepId")]
    pub step_id: u64,
}

/// One cosmetic micro-motion hint for a thinking agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MicroMotion {
    pub agent: String,
    /// `wander`, `lookaround`, or `slow_walk_to_temp`.
    pub mode: String,
    pub radius: f64,
    /// Seconds per oscillation.
    pub period: f64,
    pub speed: f64,
    /// Anchor name for `slow_walk_to_temp`.
    #[serde(rename = "tempTarget", skip_serializing_if = "Option::is_none")]
    pub temp_target: Option<String>,
    #[serde(rename = "arriveTolerance", skip_serializing_if = "Option::is_none")]
    pub arrive_tolerance: Option<f64>,
}

/// Payload of a `motion` frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MotionData {
    #[serde(rename = "microMotions")]
    pub micro_motions: Vec<MicroMotion>,
}

/// Final per-agent score block.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreDetail {
    pub loss_score: f64,
    pub response_score: f64,
    pub coop_score: f64,
    pub total_score: f64,
    #[serde(rename = "合作次數")]
    pub cooperation_count: u32,
    pub notes: String,
}

/// Payload of an `evaluation` frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub scores: BTreeMap<String, ScoreDetail>,
    pub text: String,
}

/// A frame sent to the connected client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerFrame {
    Status { message: String },
    Error { message: String },
    Update { data: UpdateData },
    Motion { data: MotionData },
    Evaluation { data: EvaluationReport },
    End { message: String },
}
