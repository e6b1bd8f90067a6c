//! The phase state machine.
//!
//! Normal -> Earthquake -> Recovery -> PostQuakeDiscussion -> Normal,
//! driven once per tick by wall-clock comparisons against the scheduled
//! event list. Phase transitions never depend on LLM success; the model
//! only colors the per-step behavior.

use std::collections::BTreeMap;

use chrono::{NaiveDateTime, TimeDelta};
use futures_util::future::join_all;
use serde_json::json;
use tracing::info;

use minitown_agents::{DisasterLogger, HelpIntent, PeerSnapshot, TownAgent};
use minitown_llm::api;
use minitown_types::{DisasterEventKind, MentalState, Phase};
use minitown_world::portal::PortalGraph;
use minitown_world::resolver;
use minitown_world::Building;

use crate::conflict::{ConflictAgent, ConflictTracker};
use crate::config::{Services, SimulationConfig};
use crate::SharedAgents;

/// Details of the quake in progress.
#[derive(Debug, Clone)]
pub struct QuakeDetails {
    pub intensity: f64,
    pub end_time: NaiveDateTime,
}

/// Mutable state of the phase machine.
#[derive(Debug)]
pub struct SimState {
    pub phase: Phase,
    pub next_event_idx: usize,
    pub quake: Option<QuakeDetails>,
    pub recovery_end: Option<NaiveDateTime>,
    pub discussion_end: Option<NaiveDateTime>,
    pub conflict_tracker: ConflictTracker,
}

impl SimState {
    /// Fresh state in the Normal phase.
    pub fn new() -> Self {
        Self {
            phase: Phase::Normal,
            next_event_idx: 0,
            quake: None,
            recovery_end: None,
            discussion_end: None,
            conflict_tracker: ConflictTracker::new(),
        }
    }
}

impl Default for SimState {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-tick log collection, drained into the frame.
#[derive(Debug, Default)]
pub struct LogBuffers {
    /// Running history lines (capped by the tick engine).
    pub history: Vec<String>,
    /// Disaster-phase event lines for the current tick.
    pub events: Vec<String>,
    /// Location -> serialized dialogue for the current tick.
    pub chats: BTreeMap<String, String>,
}

impl LogBuffers {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Integrity of the building the place belongs to; `None` outdoors.
pub fn building_integrity_of(
    buildings: &BTreeMap<String, Building>,
    graph: PortalGraph,
    place: &str,
) -> Option<f64> {
    if resolver::is_outdoors(place) {
        return None;
    }
    if let Some(building) = buildings.get(place) {
        return Some(building.integrity);
    }
    match graph.canonical_for_portal(place) {
        Some("Exterior") | None => None,
        Some(canonical) => buildings.get(canonical).map(|b| b.integrity),
    }
}

/// Pre- or post-quake building condition report.
fn damage_report(buildings: &BTreeMap<String, Building>, initial: bool) -> String {
    let title = if initial {
        "--- 災前建築狀況評估 ---"
    } else {
        "--- 災後最終損傷報告 ---"
    };
    let mut lines = vec![title.to_owned(), "建築狀況:".to_owned()];
    let mut damaged: Vec<String> = buildings
        .values()
        .filter(|b| b.integrity < 100.0)
        .map(|b| format!("  - {}: 完整度 {:.1}% ({})", b.id, b.integrity, b.status()))
        .collect();
    if damaged.is_empty() {
        lines.push("  所有建築狀況良好。".to_owned());
    } else {
        damaged.sort();
        lines.append(&mut damaged);
    }
    lines.push("----------------------".to_owned());
    lines.join("\n")
}

async fn snapshot_peers(agents: &SharedAgents) -> Vec<PeerSnapshot> {
    let mut peers = Vec::with_capacity(agents.len());
    for handle in agents.iter() {
        peers.push(PeerSnapshot::of(&*handle.lock().await));
    }
    peers
}

/// Advance the phase machine by one tick.
#[allow(clippy::too_many_arguments)]
pub async fn tick_phase(
    services: &Services,
    config: &SimulationConfig,
    state: &mut SimState,
    now: NaiveDateTime,
    agents: &SharedAgents,
    buildings: &mut BTreeMap<String, Building>,
    logger: &mut DisasterLogger,
    logs: &mut LogBuffers,
) {
    if state.phase == Phase::Normal
        && config.eq_enabled
        && state.next_event_idx < config.scheduled_events.len()
    {
        let event = config.scheduled_events[state.next_event_idx].clone();
        if now >= event.time {
            enter_earthquake(services, state, now, &event, agents, buildings, logger, logs).await;
            return;
        }
    }

    if state.phase == Phase::Earthquake {
        run_earthquake_tick(services, state, now, agents, buildings, logger, logs).await;
        return;
    }

    if state.phase == Phase::Recovery {
        run_recovery_tick(services, state, now, agents, logger, logs).await;
        return;
    }

    if state.phase == Phase::PostQuakeDiscussion {
        if let Some(end) = state.discussion_end {
            if now >= end {
                state.phase = Phase::Normal;
                state.discussion_end = None;
                logs.history
                    .push("[EVENT] 災後討論期結束，恢復正常。".to_owned());
                info!("discussion phase over, back to Normal");
            }
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn enter_earthquake(
    services: &Services,
    state: &mut SimState,
    now: NaiveDateTime,
    event: &crate::config::QuakeEvent,
    agents: &SharedAgents,
    buildings: &mut BTreeMap<String, Building>,
    logger: &mut DisasterLogger,
    logs: &mut LogBuffers,
) {
    state.phase = Phase::Earthquake;
    state.quake = Some(QuakeDetails {
        intensity: event.intensity,
        end_time: now + TimeDelta::minutes(event.duration),
    });
    state.next_event_idx += 1;
    logger.set_disaster_start(now);

    info!(intensity = event.intensity, duration = event.duration, "earthquake started");
    logs.history.push(format!(
        "[EVENT] !!! 地震開始 !!! 強度: {:.2}，持續 {} 分鐘。",
        event.intensity, event.duration
    ));
    logs.history.push(damage_report(buildings, true));

    for building in buildings.values_mut() {
        if building.id == "Exterior" {
            continue;
        }
        let mut rng = rand::thread_rng();
        building.apply_damage(event.intensity, &mut rng);
    }

    let hm = now.format("%H-%M").to_string();
    let peers = snapshot_peers(agents).await;
    for handle in agents.iter() {
        let mut agent = handle.lock().await;
        if !agent.is_alive() {
            continue;
        }
        let before = agent.health;
        let was_asleep = agent.is_asleep(&hm);
        agent.interrupt_action();
        agent.reset_disaster_flags();
        let integrity = building_integrity_of(buildings, services.graph, &agent.curr_place);
        {
            let mut rng = rand::thread_rng();
            agent.react_to_earthquake(
                event.intensity,
                integrity,
                &peers,
                &services.tuning,
                &mut rng,
            );
        }
        logger.record(&agent.name, DisasterEventKind::Reaction, now, BTreeMap::new());
        let damage = before - agent.health;
        if damage > 0 {
            logger.record(
                &agent.name,
                DisasterEventKind::Loss,
                now,
                BTreeMap::from([
                    ("value".to_owned(), json!(damage)),
                    ("reason".to_owned(), json!("Initial Impact")),
                ]),
            );
        }
        let line = if was_asleep {
            format!(
                "  {}: 在睡夢中被驚醒！初步反應: {}, HP:{}",
                agent.name, agent.curr_action, agent.health
            )
        } else {
            format!(
                "  {}: 初步反應: {}, HP:{}, 狀態:{}",
                agent.name,
                agent.curr_action,
                agent.health,
                agent.mental_state.as_str()
            )
        };
        logs.events.push(line.clone());
        logs.history.push(line);
    }
}

async fn run_earthquake_tick(
    services: &Services,
    state: &mut SimState,
    now: NaiveDateTime,
    agents: &SharedAgents,
    buildings: &mut BTreeMap<String, Building>,
    logger: &mut DisasterLogger,
    logs: &mut LogBuffers,
) {
    let Some(quake) = state.quake.clone() else {
        state.phase = Phase::Normal;
        return;
    };

    let intensity = quake.intensity;
    let peers = snapshot_peers(agents).await;
    let buildings_view: &BTreeMap<String, Building> = buildings;
    let step_results = join_all(agents.iter().map(|handle| {
        let peers = peers.clone();
        async move {
            let mut agent = handle.lock().await;
            if !agent.is_alive() {
                return (None, None);
            }
            let integrity =
                building_integrity_of(buildings_view, services.graph, &agent.curr_place);
            let (log, help) = agent
                .perform_earthquake_step(
                    &services.llm,
                    services.graph,
                    &peers,
                    integrity,
                    intensity,
                    &services.tuning,
                )
                .await;
            (Some(log), help)
        }
    }))
    .await;

    let mut helps: Vec<HelpIntent> = Vec::new();
    for (log, help) in step_results {
        if let Some(log) = log {
            logs.events.push(format!("  {log}"));
        }
        if let Some(intent) = help {
            helps.push(intent);
        }
    }
    apply_help_intents(agents, &helps, now, services.tuning.injured_hp, logger, logs).await;

    generate_conflicts(state, now, agents, logger, logs).await;

    if now >= quake.end_time {
        state.phase = Phase::Recovery;
        state.recovery_end = Some(now + TimeDelta::minutes(60));
        state.quake = None;
        info!("earthquake over, entering recovery");
        logs.history
            .push(format!("[EVENT] !!! 地震結束 @ {} !!!", now.format("%H:%M")));
        logs.history.push(damage_report(buildings, false));

        // Fold each agent's disaster log into memory, concurrently.
        join_all(agents.iter().map(|handle| async move {
            let (name, mbti, health, entries) = {
                let agent = handle.lock().await;
                if !agent.is_alive() || agent.disaster_experience_log.is_empty() {
                    return;
                }
                (
                    agent.name.clone(),
                    agent.mbti.as_str().to_owned(),
                    agent.health,
                    agent.disaster_experience_log.clone(),
                )
            };
            let summary = api::summarize_disaster(&services.llm, &name, &mbti, health, &entries).await;
            let mut agent = handle.lock().await;
            agent.memory.push_str(&format!("\n[災難記憶] {summary}"));
        }))
        .await;
    }
}

async fn run_recovery_tick(
    services: &Services,
    state: &mut SimState,
    now: NaiveDateTime,
    agents: &SharedAgents,
    logger: &mut DisasterLogger,
    logs: &mut LogBuffers,
) {
    let peers = snapshot_peers(agents).await;
    let step_results = join_all(agents.iter().map(|handle| {
        let peers = peers.clone();
        async move {
            let mut agent = handle.lock().await;
            if !agent.is_alive() {
                return (None, None);
            }
            let (log, help) = agent
                .perform_recovery_step(&services.llm, &peers, &services.tuning)
                .await;
            (Some(log), help)
        }
    }))
    .await;

    let mut helps: Vec<HelpIntent> = Vec::new();
    for (log, help) in step_results {
        if let Some(log) = log {
            logs.events.push(format!("  {log}"));
        }
        if let Some(intent) = help {
            helps.push(intent);
        }
    }
    apply_help_intents(agents, &helps, now, services.tuning.injured_hp, logger, logs).await;

    if let Some(end) = state.recovery_end {
        if now >= end {
            state.phase = Phase::PostQuakeDiscussion;
            state.discussion_end = Some(now + TimeDelta::hours(6));
            state.recovery_end = None;
            info!("recovery over, entering post-quake discussion");
            logs.history
                .push("[EVENT] 恢復階段結束，進入災後討論期。".to_owned());
            for handle in agents.iter() {
                let mut agent = handle.lock().await;
                agent.last_action = "重新評估中".to_owned();
            }
        }
    }
}

/// Apply pending heals after the fan-out joined, charging cooperation
/// events to the helpers.
async fn apply_help_intents(
    agents: &SharedAgents,
    helps: &[HelpIntent],
    now: NaiveDateTime,
    injured_hp: i32,
    logger: &mut DisasterLogger,
    logs: &mut LogBuffers,
) {
    for intent in helps {
        let Some(target_handle) = find_agent(agents, &intent.target).await else {
            continue;
        };
        let mut target = target_handle.lock().await;
        if !target.is_alive() {
            continue;
        }
        let original = target.health;
        let healed = (original + intent.amount).min(100);
        target.health = healed;
        if healed >= injured_hp {
            target.is_injured = false;
            if matches!(target.mental_state, MentalState::Panicked | MentalState::Injured) {
                target.mental_state = MentalState::Alert;
            }
        } else {
            target.is_injured = true;
        }
        let message = format!(
            "{} 協助 {} (+{} HP -> {healed})",
            intent.helper,
            intent.target,
            healed - original
        );
        logs.events.push(format!("  {message}"));
        logger.record(
            &intent.helper,
            DisasterEventKind::Cooperation,
            now,
            BTreeMap::from([
                ("message".to_owned(), json!(message)),
                ("受助者".to_owned(), json!(intent.target)),
                ("原始HP".to_owned(), json!(original)),
                ("治療量".to_owned(), json!(healed - original)),
                ("新HP".to_owned(), json!(healed)),
            ]),
        );
    }
}

/// Generate MBTI conflicts among co-located active agents.
async fn generate_conflicts(
    state: &mut SimState,
    now: NaiveDateTime,
    agents: &SharedAgents,
    logger: &mut DisasterLogger,
    logs: &mut LogBuffers,
) {
    let mut groups: BTreeMap<String, Vec<ConflictAgent>> = BTreeMap::new();
    for handle in agents.iter() {
        let agent = handle.lock().await;
        if !agent.is_alive() || agent.mental_state == MentalState::Unconscious {
            continue;
        }
        groups
            .entry(agent.curr_place.clone())
            .or_default()
            .push(ConflictAgent {
                name: agent.name.clone(),
                mbti: agent.mbti,
                action: agent.curr_action.clone(),
            });
    }

    let events = {
        let mut rng = rand::thread_rng();
        state.conflict_tracker.generate(&groups, now, &mut rng)
    };
    for event in events {
        logs.events.push(format!("  {}", event.text));
        logs.history.push(event.text.clone());
        let details = BTreeMap::from([("message".to_owned(), json!(event.text))]);
        logger.record(
            &event.participants.0,
            DisasterEventKind::Quarrel,
            now,
            details.clone(),
        );
        logger.record(&event.participants.1, DisasterEventKind::Quarrel, now, details);
    }
}

async fn find_agent(
    agents: &SharedAgents,
    name: &str,
) -> Option<std::sync::Arc<tokio::sync::Mutex<TownAgent>>> {
    for handle in agents.iter() {
        if handle.lock().await.name == name {
            return Some(handle.clone());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::QuakeEvent;
    use chrono::NaiveDate;
    use minitown_llm::LlmClient;
    use minitown_types::Mbti;
    use std::sync::Arc;
    use tokio::sync::Mutex;

    fn services() -> Services {
        Services::new(Arc::new(LlmClient::offline()))
    }

    fn locations() -> Vec<String> {
        vec![
            "Apartment_F1".to_owned(),
            "School".to_owned(),
            "Subway".to_owned(),
            "Exterior".to_owned(),
        ]
    }

    fn shared_agents(mbtis: &[Mbti]) -> SharedAgents {
        Arc::new(
            mbtis
                .iter()
                .map(|mbti| {
                    let mut agent = TownAgent::new(*mbti, "Apartment_F1", locations(), None);
                    agent.wake_time = "00-00".to_owned();
                    agent.sleep_time = "00-00".to_owned();
                    Arc::new(Mutex::new(agent))
                })
                .collect(),
        )
    }

    fn buildings() -> BTreeMap<String, Building> {
        locations()
            .into_iter()
            .map(|l| (l.clone(), Building::new(l)))
            .collect()
    }

    fn config_with_quake() -> SimulationConfig {
        let start = NaiveDate::from_ymd_opt(2024, 11, 18)
            .unwrap()
            .and_hms_opt(3, 0, 0)
            .unwrap();
        SimulationConfig {
            start,
            duration_minutes: 1440,
            step_minutes: 30,
            eq_step_minutes: 5,
            recovery_step_minutes: 10,
            roster: vec![Mbti::ESFJ, Mbti::ISTP],
            locations: locations(),
            initial_positions: Vec::new(),
            eq_enabled: true,
            scheduled_events: vec![QuakeEvent {
                time: start + TimeDelta::minutes(30),
                duration: 10,
                intensity: 0.75,
            }],
            max_chat_groups: 1,
            schedule_mode: minitown_agents::actions::ScheduleMode::Preset,
            step_sync: false,
        }
    }

    fn at(config: &SimulationConfig, minutes: i64) -> NaiveDateTime {
        config.start + TimeDelta::minutes(minutes)
    }

    #[tokio::test]
    async fn full_phase_cycle_runs_on_schedule() {
        let services = services();
        let config = config_with_quake();
        let agents = shared_agents(&[Mbti::ESFJ, Mbti::ISTP]);
        let mut buildings = buildings();
        let mut logger = DisasterLogger::new();
        let mut logs = LogBuffers::new();
        let mut state = SimState::new();

        // Before the scheduled time nothing happens.
        tick_phase(&services, &config, &mut state, at(&config, 25), &agents, &mut buildings, &mut logger, &mut logs).await;
        assert_eq!(state.phase, Phase::Normal);

        // At 03:30 the quake triggers and every agent reacts.
        tick_phase(&services, &config, &mut state, at(&config, 30), &agents, &mut buildings, &mut logger, &mut logs).await;
        assert_eq!(state.phase, Phase::Earthquake);
        assert_eq!(state.next_event_idx, 1);
        for handle in agents.iter() {
            let agent = handle.lock().await;
            if agent.is_alive() {
                assert!(!agent.disaster_experience_log.is_empty());
                assert!(logger.events_for(&agent.name).iter().any(|e| e.kind == DisasterEventKind::Reaction));
            }
        }

        // Quake ticks until 03:40, then Recovery.
        tick_phase(&services, &config, &mut state, at(&config, 35), &agents, &mut buildings, &mut logger, &mut logs).await;
        assert_eq!(state.phase, Phase::Earthquake);
        tick_phase(&services, &config, &mut state, at(&config, 40), &agents, &mut buildings, &mut logger, &mut logs).await;
        assert_eq!(state.phase, Phase::Recovery);
        assert_eq!(state.recovery_end, Some(at(&config, 100)));

        // Memories picked up a disaster summary for alive agents.
        for handle in agents.iter() {
            let agent = handle.lock().await;
            if agent.is_alive() {
                assert!(agent.memory.contains("[災難記憶]"));
            }
        }

        // Recovery ends exactly 60 minutes after the quake.
        tick_phase(&services, &config, &mut state, at(&config, 50), &agents, &mut buildings, &mut logger, &mut logs).await;
        assert_eq!(state.phase, Phase::Recovery);
        tick_phase(&services, &config, &mut state, at(&config, 100), &agents, &mut buildings, &mut logger, &mut logs).await;
        assert_eq!(state.phase, Phase::PostQuakeDiscussion);
        assert_eq!(state.discussion_end, Some(at(&config, 460)));
        for handle in agents.iter() {
            assert_eq!(handle.lock().await.last_action, "重新評估中");
        }

        // Discussion lasts six hours.
        tick_phase(&services, &config, &mut state, at(&config, 400), &agents, &mut buildings, &mut logger, &mut logs).await;
        assert_eq!(state.phase, Phase::PostQuakeDiscussion);
        tick_phase(&services, &config, &mut state, at(&config, 460), &agents, &mut buildings, &mut logger, &mut logs).await;
        assert_eq!(state.phase, Phase::Normal);
    }

    #[tokio::test]
    async fn quake_actions_stay_in_disaster_vocabulary() {
        let services = services();
        let config = config_with_quake();
        let agents = shared_agents(&[Mbti::ENTJ, Mbti::INFP, Mbti::ESTP]);
        let mut buildings = buildings();
        let mut logger = DisasterLogger::new();
        let mut logs = LogBuffers::new();
        let mut state = SimState::new();

        tick_phase(&services, &config, &mut state, at(&config, 30), &agents, &mut buildings, &mut logger, &mut logs).await;
        tick_phase(&services, &config, &mut state, at(&config, 35), &agents, &mut buildings, &mut logger, &mut logs).await;

        for handle in agents.iter() {
            let agent = handle.lock().await;
            if agent.is_alive() {
                assert!(
                    minitown_world::activity::is_known_label(&agent.curr_action),
                    "{} has off-vocabulary action {}",
                    agent.name,
                    agent.curr_action
                );
            }
        }
    }

    #[tokio::test]
    async fn help_intents_heal_and_log_cooperation() {
        let services = services();
        let agents = shared_agents(&[Mbti::ESFJ, Mbti::ISTP]);
        {
            let mut hurt = agents[1].lock().await;
            hurt.health = 40;
            hurt.is_injured = true;
        }
        let mut logger = DisasterLogger::new();
        logger.set_disaster_start(at(&config_with_quake(), 0));
        let mut logs = LogBuffers::new();
        let helps = vec![HelpIntent {
            helper: "ESFJ".to_owned(),
            target: "ISTP".to_owned(),
            amount: 20,
            kind: minitown_agents::HelpKind::Heal,
        }];
        apply_help_intents(
            &agents,
            &helps,
            at(&config_with_quake(), 10),
            services.tuning.injured_hp,
            &mut logger,
            &mut logs,
        )
        .await;

        let target = agents[1].lock().await;
        assert_eq!(target.health, 60);
        assert!(!target.is_injured, "60 HP clears the injury flag");
        let events = logger.events_for("ESFJ");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, DisasterEventKind::Cooperation);
        assert_eq!(events[0].details["原始HP"], json!(40));
        assert_eq!(events[0].details["新HP"], json!(60));
    }
}
