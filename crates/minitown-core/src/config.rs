//! Run configuration and the service aggregate.
//!
//! [`SimulationConfig`] is the validated form of the client's
//! `start_simulation` parameters; [`Services`] bundles the process-wide
//! collaborators (LLM client, portal graph, tuning, data paths) that get
//! passed down instead of living as globals.

use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use serde::Deserialize;
use tracing::info;

use minitown_agents::actions::ScheduleMode;
use minitown_agents::DisasterTuning;
use minitown_llm::LlmClient;
use minitown_types::wire::SimulationParams;
use minitown_types::Mbti;
use minitown_world::portal::PortalGraph;

use crate::error::SimError;

/// Process-wide collaborators handed to the engine and the agents.
#[derive(Clone)]
pub struct Services {
    /// The streaming LLM client (shared, internally logged).
    pub llm: Arc<LlmClient>,
    /// The immutable portal graph.
    pub graph: PortalGraph,
    /// Tuned disaster constants.
    pub tuning: Arc<DisasterTuning>,
    /// Path of the preset schedule file.
    pub schedule_file: PathBuf,
    /// Base directory of persona files (`<base>/<mbti>/1.txt`).
    pub persona_dir: PathBuf,
}

impl Services {
    /// Assemble services around an LLM client with default paths.
    pub fn new(llm: Arc<LlmClient>) -> Self {
        Self {
            llm,
            graph: PortalGraph::new(),
            tuning: Arc::new(DisasterTuning::default()),
            schedule_file: PathBuf::from("data/schedules.json"),
            persona_dir: PathBuf::from("agents"),
        }
    }
}

/// One scheduled earthquake.
#[derive(Debug, Clone, PartialEq)]
pub struct QuakeEvent {
    /// Simulated instant the quake starts.
    pub time: NaiveDateTime,
    /// Shaking duration in simulated minutes.
    pub duration: i64,
    /// Intensity in `[0, 1]`.
    pub intensity: f64,
}

/// Raw shape of one entry in the `eq_json` payload.
#[derive(Debug, Deserialize)]
struct RawQuakeEvent {
    time: String,
    duration: i64,
    #[serde(default = "default_intensity")]
    intensity: f64,
}

fn default_intensity() -> f64 {
    0.7
}

/// Validated run configuration.
#[derive(Debug, Clone)]
pub struct SimulationConfig {
    pub start: NaiveDateTime,
    pub duration_minutes: i64,
    pub step_minutes: i64,
    pub eq_step_minutes: i64,
    pub recovery_step_minutes: i64,
    pub roster: Vec<Mbti>,
    pub locations: Vec<String>,
    /// Agent name -> starting location (defaults applied).
    pub initial_positions: Vec<(String, String)>,
    pub eq_enabled: bool,
    /// Time-sorted scheduled quakes.
    pub scheduled_events: Vec<QuakeEvent>,
    pub max_chat_groups: usize,
    pub schedule_mode: ScheduleMode,
    pub step_sync: bool,
}

impl SimulationConfig {
    /// Validate and normalize the client's parameters.
    pub fn from_params(params: &SimulationParams) -> Result<Self, SimError> {
        let date = NaiveDate::from_ymd_opt(params.year, params.month, params.day)
            .ok_or_else(|| SimError::InvalidParams("invalid start date".to_owned()))?;
        let start = date
            .and_hms_opt(params.hour, params.minute, 0)
            .ok_or_else(|| SimError::InvalidParams("invalid start time".to_owned()))?;

        if params.mbti.is_empty() {
            return Err(SimError::InvalidParams("empty agent roster".to_owned()));
        }
        if params.locations.is_empty() {
            return Err(SimError::InvalidParams(
                "no available locations provided".to_owned(),
            ));
        }

        let roster: Vec<Mbti> = params
            .mbti
            .iter()
            .take(16)
            .map(|token| {
                Mbti::from_str(token)
                    .map_err(|err| SimError::InvalidParams(format!("bad roster entry: {err}")))
            })
            .collect::<Result<_, _>>()?;

        let default_home = params
            .locations
            .iter()
            .find(|l| l.starts_with("Apartment"))
            .cloned()
            .unwrap_or_else(|| params.locations[0].clone());
        let initial_positions = roster
            .iter()
            .map(|mbti| {
                let name = mbti.to_string();
                let place = params
                    .initial_positions
                    .get(&name)
                    .cloned()
                    .unwrap_or_else(|| default_home.clone());
                (name, place)
            })
            .collect();

        let mut eq_enabled = params.eq_enabled;
        let mut scheduled_events = Vec::new();
        if eq_enabled {
            match parse_eq_events(&params.eq_json) {
                Ok(events) => scheduled_events = events,
                Err(reason) => {
                    info!(%reason, "disabling earthquakes: bad eq_json");
                    eq_enabled = false;
                }
            }
        }

        Ok(Self {
            start,
            duration_minutes: params.duration.max(1),
            step_minutes: params.step.max(1),
            eq_step_minutes: params.eq_step.max(1),
            recovery_step_minutes: 10,
            roster,
            locations: params.locations.clone(),
            initial_positions,
            eq_enabled,
            scheduled_events,
            max_chat_groups: params.max_chat_groups.max(1),
            schedule_mode: if params.use_preset {
                ScheduleMode::Preset
            } else {
                ScheduleMode::Llm
            },
            step_sync: params.step_sync,
        })
    }

    /// The end of the simulated window.
    pub fn end(&self) -> NaiveDateTime {
        self.start + TimeDelta::minutes(self.duration_minutes)
    }
}

/// Parse the `eq_json` payload into time-sorted quake events.
fn parse_eq_events(raw: &str) -> Result<Vec<QuakeEvent>, String> {
    if raw.trim().is_empty() {
        return Ok(Vec::new());
    }
    let entries: Vec<RawQuakeEvent> =
        serde_json::from_str(raw).map_err(|e| format!("eq_json parse error: {e}"))?;
    let mut events = Vec::with_capacity(entries.len());
    for entry in entries {
        let time = NaiveDateTime::parse_from_str(&entry.time, "%Y-%m-%d-%H-%M")
            .map_err(|e| format!("bad quake time {}: {e}", entry.time))?;
        if entry.duration <= 0 {
            return Err(format!("non-positive quake duration: {}", entry.duration));
        }
        events.push(QuakeEvent {
            time,
            duration: entry.duration,
            intensity: entry.intensity.clamp(0.0, 1.0),
        });
    }
    events.sort_by_key(|e| e.time);
    Ok(events)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn params() -> SimulationParams {
        SimulationParams {
            duration: 1440,
            step: 30,
            eq_step: 5,
            year: 2024,
            month: 11,
            day: 18,
            hour: 3,
            minute: 0,
            mbti: vec!["ISTJ".to_owned(), "enfp".to_owned()],
            locations: vec![
                "Apartment_F1".to_owned(),
                "School".to_owned(),
                "Exterior".to_owned(),
            ],
            initial_positions: BTreeMap::from([("ISTJ".to_owned(), "School".to_owned())]),
            eq_enabled: true,
            eq_json: r#"[{"time":"2024-11-18-03-30","duration":10,"intensity":0.75}]"#.to_owned(),
            use_default_calendar: true,
            max_chat_groups: 0,
            use_preset: true,
            step_sync: false,
        }
    }

    #[test]
    fn config_parses_roster_events_and_positions() {
        let config = SimulationConfig::from_params(&params()).unwrap();
        assert_eq!(config.roster, vec![Mbti::ISTJ, Mbti::ENFP]);
        assert_eq!(config.scheduled_events.len(), 1);
        assert_eq!(config.scheduled_events[0].intensity, 0.75);
        assert_eq!(config.max_chat_groups, 1, "clamped to at least one");
        assert_eq!(
            config.initial_positions,
            vec![
                ("ISTJ".to_owned(), "School".to_owned()),
                ("ENFP".to_owned(), "Apartment_F1".to_owned()),
            ]
        );
        assert_eq!(config.schedule_mode, ScheduleMode::Preset);
    }

    #[test]
    fn bad_eq_json_disables_quakes() {
        let mut p = params();
        p.eq_json = "not json".to_owned();
        let config = SimulationConfig::from_params(&p).unwrap();
        assert!(!config.eq_enabled);
        assert!(config.scheduled_events.is_empty());
    }

    #[test]
    fn empty_roster_is_rejected() {
        let mut p = params();
        p.mbti.clear();
        assert!(matches!(
            SimulationConfig::from_params(&p),
            Err(SimError::InvalidParams(_))
        ));
    }

    #[test]
    fn events_are_sorted_by_time() {
        let mut p = params();
        p.eq_json = r#"[
            {"time":"2024-11-18-09-00","duration":5},
            {"time":"2024-11-18-03-30","duration":10,"intensity":0.9}
        ]"#
        .to_owned();
        let config = SimulationConfig::from_params(&p).unwrap();
        assert!(config.scheduled_events[0].time < config.scheduled_events[1].time);
        assert_eq!(config.scheduled_events[1].intensity, 0.7, "default applied");
    }
}
