//! Agent action transitions, teleports, and schedule refresh.
//!
//! These are the operations the tick engine drives once per tick per
//! agent. LLM-backed steps run inside the thinking guard so the motion
//! loop animates the agent while the call is in flight.

use std::path::Path;

use chrono::{Datelike, NaiveDate};
use rand::Rng;
use tracing::{debug, info, warn};

use minitown_llm::{api, LlmClient};
use minitown_types::wire::ActionInstruction;
use minitown_world::portal::PortalGraph;
use minitown_world::schedule::{self, add_minutes};
use minitown_world::{activity, resolve_path};

use crate::agent::{TownAgent, ACTION_INITIALIZING, ACTION_UNCONSCIOUS};
use crate::error::AgentError;

/// How an agent's schedules are produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleMode {
    /// Load from the preset schedule file.
    Preset,
    /// Regenerate daily through the LLM.
    Llm,
}

/// Labels that get a canned thought and emoji without an LLM round trip.
const LIGHTWEIGHT: [(&str, &str, &str); 4] = [
    ("睡覺", "😴", "該休息了。"),
    ("醒來", "☀️", "新的一天開始了。"),
    (ACTION_INITIALIZING, "⏳", ""),
    (ACTION_UNCONSCIOUS, "😵", ""),
];

impl TownAgent {
    /// Initialize the agent for a run.
    ///
    /// Preset mode seeds the memory from the persona summary and loads
    /// schedules from the file. Llm mode generates an initial memory
    /// narrative, a weekly schedule, and today's daily schedule; any
    /// generation failure aborts the run.
    pub async fn initialize(
        &mut self,
        llm: &LlmClient,
        date: NaiveDate,
        mode: ScheduleMode,
        schedule_file: &Path,
    ) -> Result<(), AgentError> {
        self.enter_thinking();
        let result = self.initialize_inner(llm, date, mode, schedule_file).await;
        self.exit_thinking();
        result
    }

    async fn initialize_inner(
        &mut self,
        llm: &LlmClient,
        date: NaiveDate,
        mode: ScheduleMode,
        schedule_file: &Path,
    ) -> Result<(), AgentError> {
        match mode {
            ScheduleMode::Preset => {
                self.memory = self.persona_summary.clone();
                self.refresh_daily_schedule(llm, date, mode, schedule_file)
                    .await?;
            }
            ScheduleMode::Llm => {
                let (memory, ok) = api::generate_initial_memory(
                    llm,
                    &self.name,
                    self.mbti.as_str(),
                    &self.persona_summary,
                    &self.home,
                )
                .await;
                if !ok {
                    return Err(AgentError::InitFailed {
                        name: self.name.clone(),
                        reason: "initial memory generation failed".to_owned(),
                    });
                }
                self.memory = memory;

                let (weekly, ok) = api::generate_weekly_schedule(llm, &self.persona_summary).await;
                if !ok {
                    return Err(AgentError::InitFailed {
                        name: self.name.clone(),
                        reason: "weekly schedule generation failed".to_owned(),
                    });
                }
                self.weekly_schedule = weekly;

                self.refresh_daily_schedule(llm, date, mode, schedule_file)
                    .await?;
            }
        }
        info!(agent = %self.name, ?mode, "agent initialized");
        Ok(())
    }

    /// Rebuild today's daily schedule (called at init and at 03:00).
    pub async fn refresh_daily_schedule(
        &mut self,
        llm: &LlmClient,
        date: NaiveDate,
        mode: ScheduleMode,
        schedule_file: &Path,
    ) -> Result<(), AgentError> {
        match mode {
            ScheduleMode::Preset => {
                let preset = schedule::load_preset(schedule_file, &self.name).map_err(|source| {
                    AgentError::Schedule {
                        name: self.name.clone(),
                        source,
                    }
                })?;
                self.weekly_schedule = preset.weekly;
                self.daily_schedule = preset.daily;
                self.wake_time = preset.wake_time;
                self.sleep_time = preset.sleep_time;
            }
            ScheduleMode::Llm => {
                let weekday = date.format("%A").to_string();
                let date_str = date.format("%Y-%m-%d").to_string();
                let goal = self
                    .weekly_schedule
                    .get(&weekday)
                    .cloned()
                    .unwrap_or_else(|| "自由活動".to_owned());

                let raw_tasks =
                    api::generate_hourly_schedule(llm, &self.persona_summary, &date_str, &goal)
                        .await;
                // Normalize labels into the closed vocabulary before storage.
                let tasks: Vec<(String, i64)> = raw_tasks
                    .into_iter()
                    .map(|(label, minutes)| (activity::classify(&label).0.to_owned(), minutes))
                    .collect();

                self.wake_time =
                    api::wake_up_hour(llm, &self.persona_summary, &date_str, &tasks).await;
                self.daily_schedule = schedule::roll_schedule(&self.wake_time, &tasks);

                let total: i64 = tasks.iter().map(|(_, m)| m).sum();
                self.sleep_time = add_minutes(&self.wake_time, total)
                    .or_else(|| add_minutes(&self.wake_time, 16 * 60))
                    .unwrap_or_else(|| "23-00".to_owned());
            }
        }
        debug!(
            agent = %self.name,
            wake = %self.wake_time,
            sleep = %self.sleep_time,
            items = self.daily_schedule.len(),
            weekday = date.weekday().to_string(),
            "daily schedule refreshed"
        );
        Ok(())
    }

    /// Transition to a new action with its destination.
    ///
    /// The raw action is classified into the closed vocabulary first;
    /// sleep-like actions with an unknown destination default home. A
    /// transition to the identical `(action, target)` pair is a no-op.
    pub async fn set_new_action(
        &mut self,
        llm: &LlmClient,
        graph: PortalGraph,
        raw_action: &str,
        destination: &str,
    ) {
        let (label, _) = activity::classify(raw_action);

        let known = !destination.is_empty()
            && (self.available_locations.iter().any(|l| l == destination)
                || graph.is_portal(destination));
        let destination = if known {
            destination.to_owned()
        } else {
            self.default_destination(label)
        };

        if label == self.curr_action && destination == self.target_place {
            return;
        }

        self.interrupt_action();
        self.previous_place = self.curr_place.clone();
        self.curr_action = label.to_owned();
        self.target_place = destination;
        self.curr_place = resolve_path(graph, &self.previous_place, &self.target_place);

        if let Some((_, emoji, thought)) = LIGHTWEIGHT.iter().find(|(l, _, _)| *l == label) {
            self.curr_action_pronunciatio = (*emoji).to_owned();
            self.current_thought = (*thought).to_owned();
            return;
        }

        self.enter_thinking();
        self.current_thought =
            api::generate_action_thought(llm, &self.persona_summary, &self.curr_place, label).await;
        self.curr_action_pronunciatio = self.pronunciatio_for(llm, label).await;
        self.exit_thinking();
    }

    /// Where an activity happens when the schedule names no known place.
    ///
    /// Sleep-like activities go home; meals, study, and work have natural
    /// venues when the run renders them; everything else stays put.
    fn default_destination(&self, label: &str) -> String {
        let preferred = match label {
            "睡覺" | "醒來" | "休息" => Some(self.home.as_str()),
            "吃飯" => Some("Rest"),
            "學習" | "工作" => Some("School"),
            "移動中" => Some("Exterior"),
            _ => None,
        };
        match preferred {
            Some(place)
                if place == self.home
                    || self.available_locations.iter().any(|l| l == place) =>
            {
                place.to_owned()
            }
            _ => self.curr_place.clone(),
        }
    }

    /// The emoji for a label, memoized per agent.
    ///
    /// The classifier answers for every canonical label; only labels the
    /// classifier cannot own (free text that fell back) go to the model.
    pub async fn pronunciatio_for(&mut self, llm: &LlmClient, label: &str) -> String {
        if let Some(cached) = self.pronunciatio_cache.get(label) {
            return cached.clone();
        }
        let emoji = match activity::emoji_for(label) {
            Some(emoji) => emoji.to_owned(),
            None => api::pronunciatio(llm, label).await,
        };
        self.pronunciatio_cache
            .insert(label.to_owned(), emoji.clone());
        emoji
    }

    /// Traverse a portal, updating place and queueing the client event.
    ///
    /// An unknown portal changes nothing except a confused thought. A
    /// one-to-many exit list is sampled uniformly.
    pub fn teleport<R: Rng>(
        &mut self,
        graph: PortalGraph,
        rng: &mut R,
        target_portal: &str,
    ) -> Option<ActionInstruction> {
        let Some(chosen) = graph.choose_exit(target_portal, rng) else {
            warn!(agent = %self.name, portal = target_portal, "teleport to unknown portal");
            self.current_thought = "咦？這扇門好像打不開。".to_owned();
            return None;
        };

        self.previous_place = self.curr_place.clone();

        let canonical = graph.canonical_for_portal(chosen);
        let final_location = [
            canonical.unwrap_or_default(),
            chosen,
            self.home.as_str(),
            "Exterior",
            self.available_locations.first().map_or("", |l| l.as_str()),
        ]
        .into_iter()
        .find(|candidate| {
            !candidate.is_empty() && self.available_locations.iter().any(|l| l == candidate)
        })
        .unwrap_or(chosen)
        .to_owned();

        self.curr_place = final_location.clone();

        let event = ActionInstruction::Teleport {
            agent: self.name.clone(),
            from_portal: target_portal.to_owned(),
            to_portal: chosen.to_owned(),
            final_location,
            target_place: self.target_place.clone(),
        };
        self.sync_events.push(event.clone());
        debug!(agent = %self.name, from = target_portal, to = chosen, "teleported");
        Some(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use minitown_types::Mbti;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn agent() -> TownAgent {
        TownAgent::new(
            Mbti::ISTJ,
            "Apartment_F1",
            vec![
                "Apartment_F1".to_owned(),
                "Apartment_F2".to_owned(),
                "School".to_owned(),
                "Subway".to_owned(),
                "Exterior".to_owned(),
            ],
            None,
        )
    }

    #[tokio::test]
    async fn sleep_without_destination_defaults_home() {
        let mut agent = agent();
        agent.curr_place = "School".to_owned();
        let llm = LlmClient::offline();
        agent
            .set_new_action(&llm, PortalGraph::new(), "睡覺", "不存在的地方")
            .await;
        assert_eq!(agent.curr_action, "睡覺");
        assert_eq!(agent.target_place, "Apartment_F1");
        assert_eq!(agent.curr_action_pronunciatio, "😴");
        assert!(!agent.is_thinking());
    }

    #[tokio::test]
    async fn identical_transition_is_a_noop() {
        let mut agent = agent();
        let llm = LlmClient::offline();
        let graph = PortalGraph::new();
        agent.set_new_action(&llm, graph, "學習", "School").await;
        let place = agent.curr_place.clone();
        let previous = agent.previous_place.clone();
        agent.set_new_action(&llm, graph, "學習", "School").await;
        assert_eq!(agent.curr_place, place);
        assert_eq!(agent.previous_place, previous);
    }

    #[tokio::test]
    async fn action_transition_resolves_path_and_classifies() {
        let mut agent = agent();
        let llm = LlmClient::offline();
        agent
            .set_new_action(&llm, PortalGraph::new(), "在圖書館讀書", "School")
            .await;
        assert_eq!(agent.curr_action, "學習");
        assert_eq!(agent.target_place, "School");
        // Indoor to indoor resolves directly.
        assert_eq!(agent.curr_place, "School");
        assert_eq!(agent.previous_place, "Apartment_F1");
    }

    #[test]
    fn teleport_through_front_door_lands_outside() {
        let mut agent = agent();
        agent.curr_place = "公寓大門_室內".to_owned();
        agent.target_place = "School".to_owned();
        let mut rng = StdRng::seed_from_u64(1);
        let event = agent
            .teleport(PortalGraph::new(), &mut rng, "公寓大門_室內")
            .unwrap();
        match event {
            ActionInstruction::Teleport {
                from_portal,
                to_portal,
                final_location,
                target_place,
                ..
            } => {
                assert_eq!(from_portal, "公寓大門_室內");
                assert_eq!(to_portal, "公寓大門_室外");
                assert_eq!(final_location, "Exterior");
                assert_eq!(target_place, "School");
            }
            other => panic!("unexpected instruction: {other:?}"),
        }
        assert_eq!(agent.curr_place, "Exterior");
        assert_eq!(agent.sync_events.len(), 1);
    }

    #[test]
    fn teleport_one_to_many_balances_exits() {
        let mut agent = agent();
        agent.curr_place = "地鐵左樓梯_室內".to_owned();
        let mut rng = StdRng::seed_from_u64(9);
        let mut left = 0;
        for _ in 0..1000 {
            let event = agent
                .teleport(PortalGraph::new(), &mut rng, "地鐵左樓梯_室內")
                .unwrap();
            if let ActionInstruction::Teleport {
                to_portal,
                final_location,
                ..
            } = event
            {
                assert!(
                    to_portal == "地鐵左入口_室外" || to_portal == "地鐵上入口_室外",
                    "unexpected exit {to_portal}"
                );
                assert_eq!(final_location, "Exterior");
                if to_portal == "地鐵左入口_室外" {
                    left += 1;
                }
            }
            agent.sync_events.clear();
        }
        assert!((400..=600).contains(&left), "left={left}");
    }

    #[test]
    fn teleport_unknown_portal_changes_nothing() {
        let mut agent = agent();
        let before = agent.curr_place.clone();
        let mut rng = StdRng::seed_from_u64(3);
        let event = agent.teleport(PortalGraph::new(), &mut rng, "不存在的門");
        assert!(event.is_none());
        assert_eq!(agent.curr_place, before);
        assert!(agent.sync_events.is_empty());
        assert!(!agent.current_thought.is_empty());
    }

    #[tokio::test]
    async fn preset_initialize_loads_schedule() {
        let dir = std::env::temp_dir().join(format!("minitown_init_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("schedules.json");
        std::fs::write(
            &path,
            r#"{"ISTJ": {"weeklySchedule": {"Monday": "工作"}, "dailySchedule": [
                {"time": "07:00", "action": "起床", "target": "Apartment_F1"},
                {"time": "08:00", "action": "學習", "target": "School"},
                {"time": "20:00", "action": "睡覺", "target": "Apartment_F1"}
            ]}}"#,
        )
        .unwrap();

        let mut agent = agent();
        let llm = LlmClient::offline();
        let date = NaiveDate::from_ymd_opt(2024, 11, 18).unwrap();
        agent
            .initialize(&llm, date, ScheduleMode::Preset, &path)
            .await
            .unwrap();

        assert_eq!(agent.memory, agent.persona_summary);
        assert_eq!(agent.wake_time, "07-00");
        assert_eq!(agent.sleep_time, "21-00");
        assert_eq!(agent.daily_schedule.len(), 3);
        assert!(!agent.is_thinking());

        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn llm_initialize_fails_offline() {
        let mut agent = agent();
        let llm = LlmClient::offline();
        let date = NaiveDate::from_ymd_opt(2024, 11, 18).unwrap();
        let result = agent
            .initialize(&llm, date, ScheduleMode::Llm, Path::new("/nonexistent"))
            .await;
        assert!(matches!(result, Err(AgentError::InitFailed { .. })));
        assert!(!agent.is_thinking(), "thinking depth unwound on failure");
    }
}
