//! The tick engine: the main simulation loop.
//!
//! One iteration per tick: advance the phase machine, fan out per-agent
//! updates behind a join barrier, run social interaction, assemble one
//! `update` frame, optionally wait for the client's step acknowledgment,
//! advance the clock by a phase-sized step, and pace with a short sleep.
//!
//! Every agent operation inside the fan-out locks only that agent, so
//! LLM calls run concurrently across agents while per-agent state stays
//! strictly serialized.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use tokio::sync::{mpsc, watch, Mutex};
use tracing::{info, warn};

use minitown_agents::actions::ScheduleMode;
use minitown_agents::{DisasterLogger, TownAgent};
use minitown_llm::api;
use minitown_types::wire::{
    ActionInstruction, AgentStateView, BuildingStateView, ServerFrame, UpdateData,
};
use minitown_types::Phase;
use minitown_world::schedule::get_current_item;
use minitown_world::Building;

use crate::clock::SimClock;
use crate::config::{Services, SimulationConfig};
use crate::error::SimError;
use crate::phase::{self, LogBuffers, SimState};
use crate::{persona_for, social, SharedAgents};

/// Where finished frames go (the server forwards them to the socket).
pub type FrameSink = mpsc::Sender<ServerFrame>;

/// The step-sync gate: the highest acknowledged step id.
#[derive(Debug, Clone)]
pub struct StepGate {
    /// Whether the engine waits for acks at all.
    pub enabled: bool,
    /// Receiver of the highest `step_complete` id seen (-1 initially).
    pub acked: watch::Receiver<i64>,
}

/// Maximum history entries kept for the `historyLog` field.
const HISTORY_CAP: usize = 300;

/// Inter-tick pacing sleep.
const TICK_PACING: Duration = Duration::from_millis(100);

/// Post-quake framing injected into discussion-phase chats.
const DISCUSSION_CONTEXT: &str =
    "（剛剛經歷了一場地震，對話可能會圍繞地震及災後情況展開，請根據性格特點體現不同的關注點。）";

/// Build the agent registry for a run.
///
/// Homes default to the first apartment the client renders; starting
/// places come from `initial_positions`.
pub fn build_agents(services: &Services, config: &SimulationConfig) -> SharedAgents {
    let default_home = config
        .locations
        .iter()
        .find(|l| l.starts_with("Apartment"))
        .or_else(|| config.locations.first())
        .cloned()
        .unwrap_or_default();
    let agents = config
        .roster
        .iter()
        .zip(&config.initial_positions)
        .map(|(mbti, (_, place))| {
            let mut agent = TownAgent::new(
                *mbti,
                default_home.clone(),
                config.locations.clone(),
                persona_for(services, mbti.as_str()),
            );
            agent.curr_place = place.clone();
            agent.target_place = place.clone();
            Arc::new(Mutex::new(agent))
        })
        .collect();
    Arc::new(agents)
}

/// Run one simulation to completion, yielding frames into `frames`.
///
/// Returns `Err(SimError::ClientGone)` when the frame receiver is
/// dropped; other errors have already been reported as an `error` frame.
pub async fn run_simulation(
    services: Services,
    config: SimulationConfig,
    agents: SharedAgents,
    frames: FrameSink,
    mut gate: StepGate,
) -> Result<(), SimError> {
    send(&frames, ServerFrame::Status {
        message: "後端開始初始化代理人...".to_owned(),
    })
    .await?;

    // Initialize every agent concurrently; any failure aborts the run.
    let date = config.start.date();
    let init_results = join_all(agents.iter().map(|handle| {
        let services = services.clone();
        let config = &config;
        async move {
            let mut agent = handle.lock().await;
            agent
                .initialize(&services.llm, date, config.schedule_mode, &services.schedule_file)
                .await
        }
    }))
    .await;
    for result in init_results {
        if let Err(err) = result {
            warn!(%err, "agent initialization failed, aborting run");
            send(&frames, ServerFrame::Error {
                message: format!("代理人初始化失敗: {err}"),
            })
            .await?;
            return Err(SimError::AgentSetup { source: err });
        }
    }

    let mut buildings: BTreeMap<String, Building> = config
        .locations
        .iter()
        .map(|name| (name.clone(), Building::new(name.clone())))
        .collect();
    let mut logger = DisasterLogger::new();
    let mut state = SimState::new();
    let mut clock = SimClock::new(config.start, config.duration_minutes);
    let mut logs = LogBuffers::new();
    let mut step_id: u64 = 0;

    info!(
        start = %config.start,
        duration = config.duration_minutes,
        agents = agents.len(),
        "simulation loop starting"
    );

    while !clock.is_finished() {
        let now = clock.now();
        let hm = clock.hm();

        phase::tick_phase(
            &services, &config, &mut state, now, &agents, &mut buildings, &mut logger, &mut logs,
        )
        .await;

        // Who is up and alive this tick?
        let mut active: Vec<usize> = Vec::new();
        for (idx, handle) in agents.iter().enumerate() {
            let agent = handle.lock().await;
            if agent.is_alive() && !agent.is_asleep(&hm) {
                active.push(idx);
            }
        }
        let all_asleep = active.is_empty() && state.phase == Phase::Normal;

        if !all_asleep && matches!(state.phase, Phase::Normal | Phase::PostQuakeDiscussion) {
            if hm == "03-00" && state.phase == Phase::Normal {
                refresh_schedules(&services, &config, &agents, &clock).await;
            }

            join_all(agents.iter().enumerate().map(|(idx, handle)| {
                let services = &services;
                let hm = hm.clone();
                let is_active = active.contains(&idx);
                async move {
                    let mut agent = handle.lock().await;
                    agent_update(services, &mut agent, is_active, &hm).await;
                }
            }))
            .await;

            if active.len() > 1 {
                let eq_ctx = (state.phase == Phase::PostQuakeDiscussion)
                    .then_some(DISCUSSION_CONTEXT);
                let now_label = format!("{}({})", clock.formatted(), clock.weekday_label());
                social::handle_social_interactions(
                    &services,
                    &agents,
                    &active,
                    &now_label,
                    eq_ctx,
                    config.max_chat_groups,
                    &mut logs,
                )
                .await;
            }
        }

        let agent_actions = generate_action_instructions(&agents).await;
        let frame = assemble_frame(
            &services, &agents, &buildings, &clock, &state, &mut logs, all_asleep, agent_actions,
            step_id,
        )
        .await;
        send(&frames, ServerFrame::Update { data: frame }).await?;

        if gate.enabled {
            wait_for_ack(&mut gate, step_id).await?;
        }

        let step = match state.phase {
            Phase::Normal | Phase::PostQuakeDiscussion => config.step_minutes,
            Phase::Earthquake => config.eq_step_minutes,
            Phase::Recovery => config.recovery_step_minutes,
        };
        clock.advance(step);
        step_id += 1;

        tokio::time::sleep(TICK_PACING).await;
    }

    // Final evaluation and clean end.
    let mut final_hp = BTreeMap::new();
    for handle in agents.iter() {
        let agent = handle.lock().await;
        final_hp.insert(agent.name.clone(), agent.health);
    }
    let report = logger.generate_report(&final_hp);
    info!(agents = report.scores.len(), "simulation finished, sending evaluation");
    send(&frames, ServerFrame::Evaluation { data: report }).await?;
    send(&frames, ServerFrame::End {
        message: "模擬結束".to_owned(),
    })
    .await?;
    Ok(())
}

async fn send(frames: &FrameSink, frame: ServerFrame) -> Result<(), SimError> {
    frames.send(frame).await.map_err(|_| SimError::ClientGone)
}

/// Block until the client acknowledges `step_id`. Stale (lower) ids were
/// already folded into the watch value by the server.
async fn wait_for_ack(gate: &mut StepGate, step_id: u64) -> Result<(), SimError> {
    loop {
        if *gate.acked.borrow() >= step_id as i64 {
            return Ok(());
        }
        if gate.acked.changed().await.is_err() {
            return Err(SimError::ClientGone);
        }
    }
}

/// The 03:00 daily refresh: fold long memories (llm mode) and rebuild
/// every alive agent's schedule for the new day.
async fn refresh_schedules(
    services: &Services,
    config: &SimulationConfig,
    agents: &SharedAgents,
    clock: &SimClock,
) {
    let date = clock.now().date();
    let day_tag = format!("{}-{}", date.format("%Y-%m-%d"), clock.weekday_label());
    join_all(agents.iter().map(|handle| {
        let day_tag = day_tag.clone();
        async move {
            let mut agent = handle.lock().await;
            if !agent.is_alive() {
                return;
            }
            if config.schedule_mode == ScheduleMode::Llm && agent.memory.chars().count() > 2000 {
                agent.enter_thinking();
                let tail: String = {
                    let chars: Vec<char> = agent.memory.chars().collect();
                    chars[chars.len().saturating_sub(1500)..].iter().collect()
                };
                let name = agent.name.clone();
                agent.memory = api::summarize_chat(&services.llm, &tail, &day_tag, &name).await;
                agent.exit_thinking();
            }
            if let Err(err) = agent
                .refresh_daily_schedule(
                    &services.llm,
                    date,
                    config.schedule_mode,
                    &services.schedule_file,
                )
                .await
            {
                warn!(agent = %agent.name, %err, "daily schedule refresh failed, keeping old one");
            }
        }
    }))
    .await;
}

/// One agent's per-tick update.
async fn agent_update(services: &Services, agent: &mut TownAgent, active: bool, hm: &str) {
    if active {
        if ["睡覺", "意識不明", "初始化中"].contains(&agent.last_action.as_str()) {
            let home = agent.home.clone();
            agent
                .set_new_action(&services.llm, services.graph, "醒來", &home)
                .await;
        } else if let Some(item) = get_current_item(&agent.daily_schedule, hm) {
            let (label, target) = (item.label.clone(), item.target.clone());
            agent
                .set_new_action(&services.llm, services.graph, &label, &target)
                .await;
        }
    } else if agent.health <= 0 {
        agent.fall_unconscious();
    } else {
        let home = agent.home.clone();
        agent
            .set_new_action(&services.llm, services.graph, "睡覺", &home)
            .await;
    }
    agent.last_action = agent.curr_action.clone();
}

/// Drain teleports and emit one move/interact instruction per agent.
async fn generate_action_instructions(agents: &SharedAgents) -> Vec<ActionInstruction> {
    let mut instructions = Vec::new();
    for handle in agents.iter() {
        let mut agent = handle.lock().await;
        instructions.extend(agent.drain_sync_events());
        let destination = if agent.target_place.is_empty() {
            agent.curr_place.clone()
        } else {
            agent.target_place.clone()
        };
        if agent.previous_place != destination {
            instructions.push(ActionInstruction::Move {
                agent: agent.name.clone(),
                origin: agent.previous_place.clone(),
                destination,
                next_step: agent.curr_place.clone(),
                action: agent.curr_action.clone(),
            });
        } else {
            instructions.push(ActionInstruction::Interact {
                agent: agent.name.clone(),
                action: agent.curr_action.clone(),
            });
        }
        // The client walks the rest; consider the hop consumed.
        agent.previous_place = agent.curr_place.clone();
    }
    instructions
}

/// Assemble the per-tick `update` frame payload.
#[allow(clippy::too_many_arguments)]
async fn assemble_frame(
    services: &Services,
    agents: &SharedAgents,
    buildings: &BTreeMap<String, Building>,
    clock: &SimClock,
    state: &SimState,
    logs: &mut LogBuffers,
    all_asleep: bool,
    agent_actions: Vec<ActionInstruction>,
    step_id: u64,
) -> UpdateData {
    let mut agent_states = BTreeMap::new();
    let mut activity_lines = Vec::new();
    for handle in agents.iter() {
        let agent = handle.lock().await;
        let mut line = format!(
            "{} 當前活動: {} ({}) --- 所在的地點({})",
            agent.name, agent.curr_action, agent.curr_action_pronunciatio, agent.curr_place
        );
        if agent.curr_action != "聊天" && !agent.current_thought.is_empty() {
            line.push_str(&format!("\n  內心想法: 『{}』", agent.current_thought));
        }
        activity_lines.push(line);
        agent_states.insert(
            agent.name.clone(),
            AgentStateView {
                name: agent.name.clone(),
                current_state: agent.curr_action.clone(),
                location: agent.curr_place.clone(),
                hp: agent.health,
                schedule: agent.schedule_span(),
                memory: agent.memory.clone(),
                weekly_schedule: agent.weekly_schedule.clone(),
                daily_schedule: agent
                    .daily_schedule
                    .iter()
                    .map(|item| item.as_triple())
                    .collect(),
            },
        );
    }

    let mut main_lines = vec![format!(
        "當前時間: {} ({})",
        clock.formatted(),
        clock.weekday_label()
    )];
    match state.phase {
        Phase::Earthquake | Phase::Recovery => {
            main_lines.push(format!("--- {:?} ---", state.phase).to_uppercase());
            main_lines.append(&mut logs.events);
        }
        _ if all_asleep => {
            main_lines.push("所有代理人都在休息中...".to_owned());
        }
        _ => {
            main_lines.extend(activity_lines);
            for (location, dialogue) in std::mem::take(&mut logs.chats) {
                main_lines.push(format!("\n  在 {location} 的聊天內容: {dialogue}"));
            }
        }
    }
    logs.events.clear();
    main_lines.push("-".repeat(60));
    let main_log = main_lines.join("\n");

    logs.history.push(main_log.clone());
    if logs.history.len() > HISTORY_CAP {
        let overflow = logs.history.len() - HISTORY_CAP;
        logs.history.drain(..overflow);
    }

    let building_states = buildings
        .iter()
        .map(|(name, building)| {
            (
                name.clone(),
                BuildingStateView {
                    id: building.id.clone(),
                    integrity: building.integrity,
                },
            )
        })
        .collect();

    UpdateData {
        main_log,
        history_log: logs.history.join("\n\n"),
        agent_states,
        building_states,
        llm_log: services.llm.log().rendered(),
        status: format!("模擬時間: {}", clock.status_time()),
        agent_actions,
        step_id,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use minitown_llm::LlmClient;
    use minitown_types::wire::SimulationParams;
    use std::io::Write;

    fn schedule_file(dir: &std::path::Path) -> std::path::PathBuf {
        let path = dir.join("schedules.json");
        let mut file = std::fs::File::create(&path).unwrap();
        write!(
            file,
            r#"{{
                "ISTJ": {{"weeklySchedule": {{"Monday": "工作"}}, "dailySchedule": [
                    {{"time": "07:00", "action": "起床", "target": "Apartment_F1"}},
                    {{"time": "08:00", "action": "學習", "target": "School"}},
                    {{"time": "20:00", "action": "睡覺", "target": "Apartment_F1"}}
                ]}}
            }}"#
        )
        .unwrap();
        path
    }

    fn run_params(dir: &std::path::Path) -> (Services, SimulationConfig) {
        let params = SimulationParams {
            duration: 1440,
            step: 30,
            eq_step: 5,
            year: 2024,
            month: 11,
            day: 18,
            hour: 3,
            minute: 0,
            mbti: vec!["ISTJ".to_owned()],
            locations: vec![
                "Apartment_F1".to_owned(),
                "School".to_owned(),
                "Exterior".to_owned(),
            ],
            initial_positions: BTreeMap::from([(
                "ISTJ".to_owned(),
                "Apartment_F1".to_owned(),
            )]),
            eq_enabled: false,
            eq_json: String::new(),
            use_default_calendar: true,
            max_chat_groups: 1,
            use_preset: true,
            step_sync: false,
        };
        let config = SimulationConfig::from_params(&params).unwrap();
        let mut services = Services::new(Arc::new(LlmClient::offline()));
        services.schedule_file = schedule_file(dir);
        (services, config)
    }

    fn ungated() -> StepGate {
        let (_tx, rx) = watch::channel(i64::MAX);
        StepGate {
            enabled: false,
            acked: rx,
        }
    }

    /// Drive the whole healthy-day scenario and check the schedule-driven
    /// transitions appear on the stream.
    #[tokio::test(start_paused = true)]
    async fn healthy_day_preset_schedule_transitions() {
        let dir = std::env::temp_dir().join(format!("minitown_tick_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let (services, config) = run_params(&dir);
        let agents = build_agents(&services, &config);
        let (tx, mut rx) = mpsc::channel(4096);

        let sim = run_simulation(services, config, agents, tx, ungated());
        let collector = async {
            let mut frames = Vec::new();
            while let Some(frame) = rx.recv().await {
                frames.push(frame);
            }
            frames
        };
        let (result, frames) = tokio::join!(sim, collector);
        result.unwrap();

        let mut state_at = BTreeMap::new();
        let mut move_to_school = false;
        let mut evaluations = 0;
        let mut ends = 0;
        for frame in &frames {
            match frame {
                ServerFrame::Update { data } => {
                    let agent = &data.agent_states["ISTJ"];
                    // Key the state by the HH-MM embedded in the status line.
                    let hm = data.status.trim_start_matches("模擬時間: ")[..5].to_owned();
                    state_at.entry(hm).or_insert_with(|| {
                        (agent.current_state.clone(), agent.location.clone())
                    });
                    for action in &data.agent_actions {
                        if let ActionInstruction::Move { destination, .. } = action {
                            if destination == "School" {
                                move_to_school = true;
                            }
                        }
                    }
                    assert!(
                        minitown_world::activity::is_known_label(&agent.current_state),
                        "off-vocabulary state {}",
                        agent.current_state
                    );
                }
                ServerFrame::Evaluation { .. } => evaluations += 1,
                ServerFrame::End { .. } => ends += 1,
                _ => {}
            }
        }

        assert_eq!(state_at["07:00"].0, "醒來");
        assert_eq!(state_at["08:00"].0, "學習");
        assert_eq!(state_at["20:00"].0, "睡覺");
        assert_eq!(state_at["20:00"].1, "Apartment_F1");
        assert!(move_to_school, "a move instruction to School was emitted");
        assert_eq!(evaluations, 1);
        assert_eq!(ends, 1);

        std::fs::remove_dir_all(&dir).ok();
    }

    /// Step-sync: without an ack the engine emits exactly one update.
    #[tokio::test(start_paused = true)]
    async fn step_sync_blocks_until_acknowledged() {
        let dir = std::env::temp_dir().join(format!("minitown_gate_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let (services, mut config) = run_params(&dir);
        config.step_sync = true;
        let agents = build_agents(&services, &config);
        let (tx, mut rx) = mpsc::channel(4096);
        let (ack_tx, ack_rx) = watch::channel(-1_i64);
        let gate = StepGate {
            enabled: true,
            acked: ack_rx,
        };

        let sim = tokio::spawn(run_simulation(services, config, agents, tx, gate));

        // Exactly one update frame arrives, then the engine blocks.
        let mut updates = 0;
        loop {
            match tokio::time::timeout(Duration::from_millis(600), rx.recv()).await {
                Ok(Some(ServerFrame::Update { data })) => {
                    assert_eq!(data.step_id, 0);
                    updates += 1;
                }
                Ok(Some(_)) => {}
                Ok(None) => break,
                Err(_) => break,
            }
        }
        assert_eq!(updates, 1);

        // Acknowledge step 0: the next update (step 1) flows.
        ack_tx.send(0).unwrap();
        let mut saw_step_one = false;
        loop {
            match tokio::time::timeout(Duration::from_millis(600), rx.recv()).await {
                Ok(Some(ServerFrame::Update { data })) => {
                    assert_eq!(data.step_id, 1);
                    saw_step_one = true;
                    break;
                }
                Ok(Some(_)) => {}
                _ => break,
            }
        }
        assert!(saw_step_one);

        sim.abort();
        std::fs::remove_dir_all(&dir).ok();
    }
}
