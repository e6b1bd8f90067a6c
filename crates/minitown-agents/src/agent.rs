//! The [`TownAgent`] and its small synchronous operations.
//!
//! The async operations that talk to the LLM live in [`actions`] and
//! [`disaster`]; this module holds the state itself plus everything that
//! needs no I/O: thinking depth, sleep windows, interruption bookkeeping,
//! and the health invariant.
//!
//! [`actions`]: crate::actions
//! [`disaster`]: crate::disaster

use std::collections::BTreeMap;

use minitown_types::wire::ActionInstruction;
use minitown_types::{Mbti, MentalState};
use minitown_world::schedule::{parse_hm, ScheduleItem};

use crate::mbti;
use crate::persona::Persona;

/// Action label for an unconscious agent.
pub const ACTION_UNCONSCIOUS: &str = "意識不明";

/// Action label while waiting for initialization.
pub const ACTION_INITIALIZING: &str = "初始化中";

/// One inhabitant of the town.
///
/// Uniquely named; here the name *is* the MBTI token. All fields are kept
/// public toward the engine crates -- the agent is a registry entry owned
/// by the tick engine, not a self-contained actor.
#[derive(Debug, Clone)]
pub struct TownAgent {
    // --- identity ---
    pub name: String,
    pub mbti: Mbti,
    /// Immutable after construction.
    pub persona_summary: String,
    pub home: String,

    // --- social trait ---
    /// Base cooperation from the MBTI table.
    pub cooperation_base: f64,
    /// Disaster-time additive bonus.
    pub disaster_bonus: f64,

    // --- location ---
    pub curr_place: String,
    pub target_place: String,
    pub previous_place: String,
    /// The canonical locations this run can render.
    pub available_locations: Vec<String>,

    // --- behavior ---
    pub curr_action: String,
    pub last_action: String,
    pub curr_action_pronunciatio: String,
    pub current_thought: String,

    // --- life ---
    pub health: i32,
    pub is_injured: bool,
    pub mental_state: MentalState,

    // --- plans ---
    pub weekly_schedule: BTreeMap<String, String>,
    pub daily_schedule: Vec<ScheduleItem>,
    pub wake_time: String,
    pub sleep_time: String,

    // --- memory ---
    pub memory: String,
    pub disaster_experience_log: Vec<String>,

    // --- runtime ---
    thinking_depth: u32,
    /// Teleports not yet shown to the client; drained at frame time.
    pub sync_events: Vec<ActionInstruction>,
    pub interrupted_action: Option<String>,
    pub quake_has_taken_cover: bool,
    pub quake_evacuation_started: bool,
    pub quake_support_committed: bool,
    pub(crate) pronunciatio_cache: BTreeMap<String, String>,
}

impl TownAgent {
    /// Create an agent at its home with traits seeded from the MBTI table.
    ///
    /// `persona` overrides the built-in personality description when a
    /// persona file was found for this type.
    pub fn new(
        mbti: Mbti,
        home: impl Into<String>,
        available_locations: Vec<String>,
        persona: Option<Persona>,
    ) -> Self {
        let home = home.into();
        let profile = mbti::profile(mbti);
        let description = persona
            .and_then(|p| p.personality)
            .unwrap_or_else(|| profile.description.to_owned());
        let persona_summary = format!("MBTI: {mbti}. 個性: {description}");

        Self {
            name: mbti.to_string(),
            mbti,
            persona_summary,
            home: home.clone(),
            cooperation_base: profile.cooperation,
            disaster_bonus: mbti::disaster_bonus(mbti),
            curr_place: home.clone(),
            target_place: home,
            previous_place: String::new(),
            available_locations,
            curr_action: ACTION_INITIALIZING.to_owned(),
            last_action: ACTION_INITIALIZING.to_owned(),
            curr_action_pronunciatio: "⏳".to_owned(),
            current_thought: String::new(),
            health: 100,
            is_injured: false,
            mental_state: MentalState::Calm,
            weekly_schedule: BTreeMap::new(),
            daily_schedule: Vec::new(),
            wake_time: "07-00".to_owned(),
            sleep_time: "23-00".to_owned(),
            memory: String::new(),
            disaster_experience_log: Vec::new(),
            thinking_depth: 0,
            sync_events: Vec::new(),
            interrupted_action: None,
            quake_has_taken_cover: false,
            quake_evacuation_started: false,
            quake_support_committed: false,
            pronunciatio_cache: BTreeMap::new(),
        }
    }

    /// Effective cooperation inclination during a disaster.
    pub fn cooperation_inclination(&self) -> f64 {
        (self.cooperation_base + self.disaster_bonus).min(1.0)
    }

    /// True when the agent is alive.
    pub fn is_alive(&self) -> bool {
        self.health > 0
    }

    /// Mark a nested reasoning call in flight.
    pub fn enter_thinking(&mut self) {
        self.thinking_depth = self.thinking_depth.saturating_add(1);
    }

    /// Unwind one level of in-flight reasoning.
    pub fn exit_thinking(&mut self) {
        self.thinking_depth = self.thinking_depth.saturating_sub(1);
    }

    /// True while any reasoning call is in flight.
    pub fn is_thinking(&self) -> bool {
        self.thinking_depth > 0
    }

    /// True when `hm` lies outside the `[wake_time, sleep_time)` window,
    /// handling windows that wrap past midnight.
    pub fn is_asleep(&self, hm: &str) -> bool {
        let (Some(wake), Some(sleep), Some(now)) = (
            parse_hm(&self.wake_time),
            parse_hm(&self.sleep_time),
            parse_hm(hm),
        ) else {
            return false;
        };
        if wake == sleep {
            return false;
        }
        let awake = if wake < sleep {
            wake <= now && now < sleep
        } else {
            now >= wake || now < sleep
        };
        !awake
    }

    /// Stash the current action before an interruption, unless it is a
    /// sleep-like state not worth resuming.
    pub fn interrupt_action(&mut self) {
        let skip = ["睡覺", ACTION_UNCONSCIOUS, ACTION_INITIALIZING];
        if skip.contains(&self.curr_action.as_str()) {
            self.interrupted_action = None;
        } else {
            self.interrupted_action = Some(self.curr_action.clone());
        }
    }

    /// Apply damage, clamping health to `[0, 100]` and enforcing the
    /// unconsciousness invariant at zero.
    pub fn apply_damage(&mut self, damage: i32, injured_threshold: i32) {
        self.health = (self.health - damage.max(0)).clamp(0, 100);
        if self.health == 0 {
            self.fall_unconscious();
        } else if self.health < injured_threshold {
            self.is_injured = true;
        }
    }

    /// Enforce `health == 0` consequences.
    pub fn fall_unconscious(&mut self) {
        self.health = 0;
        self.is_injured = true;
        self.mental_state = MentalState::Unconscious;
        self.curr_action = ACTION_UNCONSCIOUS.to_owned();
        self.curr_action_pronunciatio = "😵".to_owned();
        self.current_thought.clear();
    }

    /// Drain the pending teleport notifications for the next frame.
    pub fn drain_sync_events(&mut self) -> Vec<ActionInstruction> {
        std::mem::take(&mut self.sync_events)
    }

    /// Reset the per-disaster one-shots at quake onset.
    pub fn reset_disaster_flags(&mut self) {
        self.quake_has_taken_cover = false;
        self.quake_evacuation_started = false;
        self.quake_support_committed = false;
        self.disaster_experience_log.clear();
    }

    /// The `"wake ~ sleep"` string shown in agent state views.
    pub fn schedule_span(&self) -> String {
        format!("{} ~ {}", self.wake_time, self.sleep_time)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn agent() -> TownAgent {
        TownAgent::new(
            Mbti::ISTJ,
            "Apartment_F1",
            vec![
                "Apartment_F1".to_owned(),
                "School".to_owned(),
                "Exterior".to_owned(),
            ],
            None,
        )
    }

    #[test]
    fn new_agent_starts_at_home_initializing() {
        let agent = agent();
        assert_eq!(agent.name, "ISTJ");
        assert_eq!(agent.curr_place, "Apartment_F1");
        assert_eq!(agent.curr_action, ACTION_INITIALIZING);
        assert_eq!(agent.health, 100);
        assert!(!agent.is_thinking());
    }

    #[test]
    fn thinking_depth_is_reference_counted() {
        let mut agent = agent();
        agent.enter_thinking();
        agent.enter_thinking();
        assert!(agent.is_thinking());
        agent.exit_thinking();
        assert!(agent.is_thinking());
        agent.exit_thinking();
        assert!(!agent.is_thinking());
        // Underflow is clamped.
        agent.exit_thinking();
        assert!(!agent.is_thinking());
    }

    #[test]
    fn is_asleep_handles_plain_window() {
        let mut agent = agent();
        agent.wake_time = "07-00".to_owned();
        agent.sleep_time = "23-00".to_owned();
        assert!(agent.is_asleep("06-59"));
        assert!(!agent.is_asleep("07-00"));
        assert!(!agent.is_asleep("22-59"));
        assert!(agent.is_asleep("23-00"));
    }

    #[test]
    fn is_asleep_handles_wrapping_window() {
        let mut agent = agent();
        agent.wake_time = "22-00".to_owned();
        agent.sleep_time = "14-00".to_owned();
        assert!(!agent.is_asleep("23-30"));
        assert!(!agent.is_asleep("03-00"));
        assert!(agent.is_asleep("15-00"));
    }

    #[test]
    fn zero_health_enforces_unconscious_invariant() {
        let mut agent = agent();
        agent.apply_damage(150, 60);
        assert_eq!(agent.health, 0);
        assert_eq!(agent.curr_action, ACTION_UNCONSCIOUS);
        assert_eq!(agent.mental_state, MentalState::Unconscious);
        assert!(agent.is_injured);
    }

    #[test]
    fn damage_below_threshold_marks_injured() {
        let mut agent = agent();
        agent.apply_damage(45, 60);
        assert_eq!(agent.health, 55);
        assert!(agent.is_injured);
    }

    #[test]
    fn interrupt_skips_sleep_like_actions() {
        let mut agent = agent();
        agent.curr_action = "睡覺".to_owned();
        agent.interrupt_action();
        assert_eq!(agent.interrupted_action, None);
        agent.curr_action = "學習".to_owned();
        agent.interrupt_action();
        assert_eq!(agent.interrupted_action.as_deref(), Some("學習"));
    }

    #[test]
    fn cooperation_inclination_is_capped() {
        let agent = TownAgent::new(Mbti::ENFJ, "Apartment_F1", Vec::new(), None);
        // 0.9 base + 0.40 bonus caps at 1.0.
        assert!((agent.cooperation_inclination() - 1.0).abs() < 1e-9);
    }
}
