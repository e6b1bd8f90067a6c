//! Earthquake and recovery behavior.
//!
//! The reaction at quake onset is pure personality-table logic; the
//! per-step behavior walks a fixed escalation -- take cover, start the
//! subway evacuation, keep moving, then free-form LLM action once safe --
//! with a helping check at every step.
//!
//! Cross-agent effects (healing a peer) are returned as [`HelpIntent`]s
//! rather than applied directly: per-agent state is serialized per tick,
//! so the phase controller applies intents after the fan-out joins.

use rand::Rng;
use tracing::debug;

use minitown_llm::{api, LlmClient};
use minitown_types::MentalState;
use minitown_world::portal::PortalGraph;
use minitown_world::{activity, resolve_path};

use crate::agent::TownAgent;
use crate::config::DisasterTuning;

/// Read-only view of a peer, snapshotted before the per-tick fan-out.
#[derive(Debug, Clone)]
pub struct PeerSnapshot {
    pub name: String,
    pub place: String,
    pub health: i32,
    pub is_injured: bool,
    pub mental_state: MentalState,
}

impl PeerSnapshot {
    /// Snapshot one agent.
    pub fn of(agent: &TownAgent) -> Self {
        Self {
            name: agent.name.clone(),
            place: agent.curr_place.clone(),
            health: agent.health,
            is_injured: agent.is_injured,
            mental_state: agent.mental_state,
        }
    }

    /// True when the peer is alive.
    pub fn is_alive(&self) -> bool {
        self.health > 0
    }
}

/// What kind of help is being offered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HelpKind {
    /// Direct first aid to a hurt peer.
    Heal,
    /// The once-per-disaster "穩定狀態" morale support.
    Stabilize,
}

/// A pending cross-agent heal, applied by the phase controller.
#[derive(Debug, Clone)]
pub struct HelpIntent {
    pub helper: String,
    pub target: String,
    pub amount: i32,
    pub kind: HelpKind,
}

/// Sample an integer damage roll in `[lo, hi]`, tolerating collapsed
/// ranges from small intensities.
fn roll_damage<R: Rng>(rng: &mut R, lo: i32, hi: i32) -> i32 {
    let lo = lo.max(0);
    let hi = hi.max(lo + 1);
    rng.gen_range(lo..=hi)
}

impl TownAgent {
    /// Immediate reaction when the quake hits.
    ///
    /// Applies initial damage from intensity and the current building's
    /// integrity (`None` when outdoors), picks a reaction from the MBTI
    /// table, possibly upgrades it to helping, then enforces the initial
    /// cover step.
    pub fn react_to_earthquake<R: Rng>(
        &mut self,
        intensity: f64,
        building_integrity: Option<f64>,
        peers: &[PeerSnapshot],
        tuning: &DisasterTuning,
        rng: &mut R,
    ) {
        if self.mental_state == MentalState::Unconscious {
            return;
        }

        let damage = match building_integrity {
            Some(integrity) if integrity < tuning.unsafe_integrity => roll_damage(
                rng,
                (intensity * tuning.collapse_damage.0) as i32,
                (intensity * tuning.collapse_damage.1) as i32,
            ),
            Some(_) => {
                if rng.gen::<f64>() < intensity * tuning.indoor_damage_chance {
                    roll_damage(rng, 1, (intensity * tuning.indoor_damage_max) as i32)
                } else {
                    0
                }
            }
            None => {
                if rng.gen::<f64>() < intensity * tuning.outdoor_damage_chance {
                    roll_damage(rng, 1, (intensity * tuning.outdoor_damage_max) as i32)
                } else {
                    0
                }
            }
        };

        let location_context = match building_integrity {
            Some(_) => format!("在 {} 內", self.curr_place),
            None => "在戶外".to_owned(),
        };
        if damage > 0 {
            let before = self.health;
            self.apply_damage(damage, tuning.injured_hp);
            self.disaster_experience_log.push(format!(
                "地震開始：{location_context}，遭受 {damage} 點傷害 (HP: {before} -> {})",
                self.health
            ));
        } else {
            self.disaster_experience_log
                .push(format!("地震開始：{location_context}，未受傷"));
        }

        if self.health == 0 {
            self.disaster_experience_log
                .push("因重傷失去意識。".to_owned());
            return;
        }

        let heavy = intensity >= 0.65;
        let (mut reaction, mut state) = if self.is_injured {
            ("尋找醫療救助", MentalState::Injured)
        } else if heavy {
            if self.mbti.is_extrovert() && self.mbti.has_pair("TJ") {
                ("指揮疏散", MentalState::Focused)
            } else if self.mbti.is_extrovert() && self.mbti.has('F') {
                ("安撫他人", MentalState::Panicked)
            } else if self.mbti.is_introvert() && self.mbti.has('F') {
                ("躲到桌下", MentalState::Frozen)
            } else {
                ("尋找安全出口", MentalState::Alert)
            }
        } else if self.mbti.has('J') {
            ("評估周圍環境", MentalState::Calm)
        } else {
            ("尋找遮蔽物", MentalState::Alert)
        };

        if !self.is_injured {
            let injured_nearby = peers.iter().any(|peer| {
                peer.name != self.name
                    && peer.is_alive()
                    && peer.is_injured
                    && peer.place == self.curr_place
            });
            if injured_nearby {
                let mut probability = tuning.help_probability(self.cooperation_inclination());
                let protective = reaction == "躲到桌下" || reaction == "尋找遮蔽物";
                let unsafe_building =
                    building_integrity.is_some_and(|i| i < tuning.unsafe_integrity);
                if protective && unsafe_building {
                    probability *= tuning.help_unsafe_factor;
                }
                if rng.gen::<f64>() < probability {
                    reaction = "協助受傷的人";
                    state = MentalState::Helping;
                }
            }
        }

        self.mental_state = state;
        self.disaster_experience_log.push(format!(
            "初步反應：{reaction}，精神狀態: {}",
            state.as_str()
        ));

        // Always take cover first; the chosen reaction plays out in the
        // per-step behavior through the mental state.
        self.curr_action = "尋找遮蔽物".to_owned();
        self.curr_action_pronunciatio = activity::emoji_for("尋找遮蔽物")
            .unwrap_or("⚠️")
            .to_owned();
    }

    /// One step of in-quake behavior. Returns a log line and a pending
    /// help intent, if any.
    pub async fn perform_earthquake_step(
        &mut self,
        llm: &LlmClient,
        graph: PortalGraph,
        peers: &[PeerSnapshot],
        building_integrity: Option<f64>,
        intensity: f64,
        tuning: &DisasterTuning,
    ) -> (String, Option<HelpIntent>) {
        if self.mental_state == MentalState::Unconscious {
            return (format!("{} 失去意識，無法行動。", self.name), None);
        }

        let mut notes: Vec<String> = Vec::new();

        // Ongoing shaking damage, worse in damaged buildings.
        let integrity = building_integrity.unwrap_or(100.0);
        {
            let mut rng = rand::thread_rng();
            let chance = intensity * (tuning.ongoing_damage_base + (100.0 - integrity))
                / tuning.ongoing_damage_divisor;
            if rng.gen::<f64>() < chance {
                let cap = ((intensity * tuning.ongoing_damage_max) as i32).max(1);
                let damage = rng.gen_range(0..=cap);
                if damage > 0 {
                    self.apply_damage(damage, tuning.injured_hp);
                    notes.push(format!("受到 {damage} 點輕微傷害 (HP: {})", self.health));
                }
            }
        }
        if self.health == 0 {
            self.disaster_experience_log
                .push("地震中：因重傷失去意識。".to_owned());
            return (format!("{} 因重傷失去意識。", self.name), None);
        }

        if !self.quake_has_taken_cover {
            self.quake_has_taken_cover = true;
            self.curr_action = "躲到桌下".to_owned();
            self.curr_action_pronunciatio =
                activity::emoji_for("躲到桌下").unwrap_or("🥶").to_owned();
            self.current_thought = "先找掩護！".to_owned();
            notes.push("就地尋找掩護".to_owned());
        } else if !self.quake_evacuation_started {
            self.quake_evacuation_started = true;
            self.target_place = "Subway".to_owned();
            self.curr_action = "撤離到地鐵".to_owned();
            self.curr_action_pronunciatio =
                activity::emoji_for("撤離到地鐵").unwrap_or("🚇").to_owned();
            self.advance_toward_subway(graph, &mut notes);
        } else if self.curr_place != "Subway" {
            self.curr_action = "撤離到地鐵".to_owned();
            self.advance_toward_subway(graph, &mut notes);
        } else {
            // Sheltered; let the model choose within the closed vocabulary.
            self.enter_thinking();
            let (raw_action, thought) = api::earthquake_step_action(
                llm,
                &self.persona_summary,
                self.health,
                self.mental_state.as_str(),
                &self.curr_place,
                intensity,
                &self.disaster_experience_log,
            )
            .await;
            self.exit_thinking();
            let (label, emoji) = activity::classify(&raw_action);
            let label = if label == "意識不明" { "在地鐵避難" } else { label };
            self.curr_action = label.to_owned();
            self.curr_action_pronunciatio = activity::emoji_for(label).unwrap_or(emoji).to_owned();
            self.current_thought = thought;
            notes.push(format!("在地鐵中：{label}"));
        }

        let help = {
            let mut rng = rand::thread_rng();
            self.perceive_and_help(peers, tuning, &mut rng)
        };
        if let Some(intent) = &help {
            notes.push(format!("試圖協助 {}", intent.target));
        }

        let note_str = if notes.is_empty() {
            self.curr_action.clone()
        } else {
            notes.join("，")
        };
        self.disaster_experience_log
            .push(format!("地震中：{}，{note_str}。", self.curr_action));
        let log = format!(
            "{} ({}): {} {} {note_str}",
            self.name, self.mbti, self.curr_action, self.curr_action_pronunciatio
        );
        (log, help)
    }

    /// Move one symbolic step toward the Subway, teleporting when
    /// standing on a portal.
    fn advance_toward_subway(&mut self, graph: PortalGraph, notes: &mut Vec<String>) {
        let next = resolve_path(graph, &self.curr_place, "Subway");
        if next == self.curr_place {
            if graph.is_portal(&next) {
                let portal = next;
                let mut rng = rand::thread_rng();
                if self.teleport(graph, &mut rng, &portal).is_some() {
                    notes.push(format!("穿過 {portal} 抵達 {}", self.curr_place));
                }
            }
        } else if next == "Subway" {
            self.previous_place = self.curr_place.clone();
            self.curr_place = "Subway".to_owned();
            notes.push("進入地鐵避難".to_owned());
        } else {
            self.previous_place = self.curr_place.clone();
            self.curr_place = next;
            notes.push(format!("朝地鐵移動，抵達 {}", self.curr_place));
        }
    }

    /// One step of post-quake recovery.
    pub async fn perform_recovery_step(
        &mut self,
        llm: &LlmClient,
        peers: &[PeerSnapshot],
        tuning: &DisasterTuning,
    ) -> (String, Option<HelpIntent>) {
        if self.mental_state == MentalState::Unconscious {
            return (format!("{} 依然昏迷。", self.name), None);
        }

        let mut notes: Vec<String> = Vec::new();

        {
            let mut rng = rand::thread_rng();
            if self.health < 100 && rng.gen::<f64>() < tuning.recovery_heal_chance {
                let heal = rng.gen_range(tuning.recovery_heal_range.0..=tuning.recovery_heal_range.1);
                self.health = (self.health + heal).min(100);
                notes.push(format!("恢復 {heal} 點生命 (HP: {})", self.health));
                if self.health >= tuning.injured_hp && self.is_injured {
                    self.is_injured = false;
                    notes.push("不再受傷".to_owned());
                }
            }
            if self.mental_state != MentalState::Calm && rng.gen::<f64>() < tuning.recovery_calm_chance
            {
                self.mental_state = match self.mental_state {
                    _ if self.is_injured => MentalState::Injured,
                    MentalState::Panicked | MentalState::Frozen => MentalState::Alert,
                    MentalState::Helping | MentalState::Focused => MentalState::Calm,
                    MentalState::Alert if rng.gen::<f64>() < 0.5 => MentalState::Calm,
                    other => other,
                };
                notes.push(format!("精神狀態轉為 {}", self.mental_state.as_str()));
            }
        }

        let mut help = None;
        if self.is_injured {
            let (label, emoji) = activity::classify("尋找醫療資源或休息");
            self.curr_action = label.to_owned();
            self.curr_action_pronunciatio = emoji.to_owned();
        } else {
            help = {
                let mut rng = rand::thread_rng();
                self.perceive_and_help(peers, tuning, &mut rng)
            };
            if let Some(intent) = &help {
                self.curr_action = "協助受傷的人".to_owned();
                self.curr_action_pronunciatio =
                    activity::emoji_for("協助受傷的人").unwrap_or("🤝").to_owned();
                notes.push(format!("照料 {}", intent.target));
            } else {
                self.enter_thinking();
                let raw = api::get_recovery_action(
                    llm,
                    &self.persona_summary,
                    self.mental_state.as_str(),
                    &self.curr_place,
                )
                .await;
                self.exit_thinking();
                let (label, emoji) = activity::classify(&raw);
                let label = if label == "意識不明" { "休息" } else { label };
                self.curr_action = label.to_owned();
                self.curr_action_pronunciatio = activity::emoji_for(label).unwrap_or(emoji).to_owned();
            }
        }
        notes.push(format!("執行 {}", self.curr_action));

        let note_str = notes.join("，");
        self.disaster_experience_log
            .push(format!("災後恢復中：{note_str}。"));
        (format!("{} ({}): {note_str}", self.name, self.mbti), help)
    }

    /// Look for someone to help.
    ///
    /// Prefers the weakest nearby hurt peer; otherwise, at most once per
    /// disaster, offers stabilizing support to a random alive peer.
    pub fn perceive_and_help<R: Rng>(
        &mut self,
        peers: &[PeerSnapshot],
        tuning: &DisasterTuning,
        rng: &mut R,
    ) -> Option<HelpIntent> {
        if !self.is_alive() || self.mental_state == MentalState::Unconscious {
            return None;
        }

        let hurt_nearby = peers
            .iter()
            .filter(|peer| {
                peer.name != self.name
                    && peer.is_alive()
                    && peer.place == self.curr_place
                    && peer.mental_state != MentalState::Unconscious
                    && (peer.health < tuning.help_hp_threshold || peer.is_injured)
            })
            .min_by_key(|peer| peer.health);

        if let Some(target) = hurt_nearby {
            let amount = rng.gen_range(tuning.heal_range.0..=tuning.heal_range.1);
            debug!(helper = %self.name, target = %target.name, amount, "heal intent");
            return Some(HelpIntent {
                helper: self.name.clone(),
                target: target.name.clone(),
                amount,
                kind: HelpKind::Heal,
            });
        }

        if !self.quake_support_committed {
            let alive: Vec<&PeerSnapshot> = peers
                .iter()
                .filter(|peer| peer.name != self.name && peer.is_alive())
                .collect();
            if !alive.is_empty() {
                self.quake_support_committed = true;
                let target = alive[rng.gen_range(0..alive.len())];
                let amount = rng.gen_range(tuning.stabilize_range.0..=tuning.stabilize_range.1);
                return Some(HelpIntent {
                    helper: self.name.clone(),
                    target: target.name.clone(),
                    amount,
                    kind: HelpKind::Stabilize,
                });
            }
        }

        None
    }
}
