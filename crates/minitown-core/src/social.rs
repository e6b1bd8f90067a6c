//! Social interaction: chats between co-located agents and inner
//! monologues for the rest.
//!
//! Runs after the per-agent action updates in Normal and
//! PostQuakeDiscussion ticks. Groups are keyed by location, capped at
//! `max_chat_groups`, and gated by probability; a triggered group puts
//! every member into 聊天, runs one two-person dialogue through the
//! model, and writes the transcript into every member's memory.

use futures_util::future::join_all;
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::BTreeMap;
use tracing::debug;

use minitown_llm::{api, ChatContext, ChatParticipant, MonologueContext};
use minitown_world::activity;

use crate::config::Services;
use crate::phase::LogBuffers;
use crate::SharedAgents;

/// Chance an eligible group actually chats this tick.
const CHAT_PROBABILITY: f64 = 0.6;

/// Chance one non-chatting agent runs an inner monologue.
const MONOLOGUE_PROBABILITY: f64 = 0.3;

/// Characters of trailing memory given to the chat prompt.
const MEMORY_TAIL_CHARS: usize = 300;

/// Trailing slice of a string by characters.
fn tail_chars(text: &str, count: usize) -> String {
    let chars: Vec<char> = text.chars().collect();
    let start = chars.len().saturating_sub(count);
    chars[start..].iter().collect()
}

/// Run one tick of social interaction over the active agents.
///
/// `active` holds indices into `agents`. `eq_ctx` carries the
/// post-disaster framing during the discussion phase.
pub async fn handle_social_interactions(
    services: &Services,
    agents: &SharedAgents,
    active: &[usize],
    now_label: &str,
    eq_ctx: Option<&str>,
    max_chat_groups: usize,
    logs: &mut LogBuffers,
) {
    if active.len() < 2 {
        return;
    }

    // Snapshot names/places/actions for grouping.
    let mut briefs: Vec<(usize, String, String, String)> = Vec::with_capacity(active.len());
    for &idx in active {
        let agent = agents[idx].lock().await;
        briefs.push((
            idx,
            agent.name.clone(),
            agent.curr_place.clone(),
            agent.curr_action.clone(),
        ));
    }

    let mut groups: BTreeMap<String, Vec<usize>> = BTreeMap::new();
    for (idx, _, place, _) in &briefs {
        groups.entry(place.clone()).or_default().push(*idx);
    }

    // Pick the chatting groups: location order, probability gate, cap.
    let selected: Vec<(String, Vec<usize>)> = {
        let mut rng = rand::thread_rng();
        let mut selected = Vec::new();
        for (place, members) in &groups {
            if members.len() < 2 || selected.len() >= max_chat_groups.max(1) {
                continue;
            }
            if rng.gen::<f64>() < CHAT_PROBABILITY {
                selected.push((place.clone(), members.clone()));
            }
        }
        selected
    };

    let mut chatting: Vec<usize> = Vec::new();
    for (_, members) in &selected {
        chatting.extend(members.iter().copied());
    }

    let chat_results = join_all(selected.iter().map(|(place, members)| {
        let place = place.clone();
        let members = members.clone();
        let eq_ctx = eq_ctx.map(str::to_owned);
        async move {
            run_chat_group(services, agents, &place, &members, now_label, eq_ctx).await
        }
    }))
    .await;

    for (place, dialogue) in chat_results.into_iter().flatten() {
        debug!(%place, "chat completed");
        logs.chats.insert(place, dialogue);
    }

    // One inner monologue among the quiet ones.
    let idle: Vec<usize> = active
        .iter()
        .copied()
        .filter(|idx| !chatting.contains(idx))
        .collect();
    let monologue_pick = {
        let mut rng = rand::thread_rng();
        if !idle.is_empty() && rng.gen::<f64>() < MONOLOGUE_PROBABILITY {
            Some(idle[rng.gen_range(0..idle.len())])
        } else {
            None
        }
    };
    if let Some(idx) = monologue_pick {
        run_monologue(services, agents, idx, now_label, eq_ctx).await;
    }
}

/// Run one group's chat; returns `(location, serialized dialogue)`.
async fn run_chat_group(
    services: &Services,
    agents: &SharedAgents,
    place: &str,
    members: &[usize],
    now_label: &str,
    eq_ctx: Option<String>,
) -> Option<(String, String)> {
    // Mark everyone chatting and collect participant data.
    let mut participants: Vec<(usize, ChatParticipant)> = Vec::with_capacity(members.len());
    for &idx in members {
        let mut agent = agents[idx].lock().await;
        let original_action = agent.curr_action.clone();
        if original_action != "聊天" {
            agent.interrupt_action();
        }
        agent.curr_action = "聊天".to_owned();
        agent.curr_action_pronunciatio = activity::emoji_for("聊天").unwrap_or("💬").to_owned();
        agent.enter_thinking();
        participants.push((
            idx,
            ChatParticipant {
                name: agent.name.clone(),
                mbti: agent.mbti.as_str().to_owned(),
                persona: agent.persona_summary.clone(),
                memory: tail_chars(&agent.memory, MEMORY_TAIL_CHARS),
                action: original_action,
            },
        ));
    }

    let (first, second) = {
        let mut rng = rand::thread_rng();
        let mut picks: Vec<usize> = (0..participants.len()).collect();
        picks.shuffle(&mut rng);
        (picks[0], picks[1])
    };

    let ctx = ChatContext {
        location: place.to_owned(),
        now_time: now_label.to_owned(),
        history: Vec::new(),
        eq_ctx,
        first: participants[first].1.clone(),
        second: participants[second].1.clone(),
    };
    let (_, dialogue) = api::double_agents_chat(&services.llm, &ctx).await;

    // Always unwind the thinking flag, dialogue or not.
    let result = if dialogue.is_empty() {
        None
    } else {
        let dialogue_str = dialogue
            .iter()
            .map(|(speaker, line)| format!("[{speaker}]: '{line}'"))
            .collect::<Vec<_>>()
            .join(" ");
        let dialogue_json = serde_json::to_string(&dialogue).unwrap_or_default();
        Some((dialogue_str, dialogue_json))
    };

    for (idx, participant) in &participants {
        let mut agent = agents[*idx].lock().await;
        if let Some((_, json)) = &result {
            let others: Vec<&str> = participants
                .iter()
                .filter(|(_, p)| p.name != participant.name)
                .map(|(_, p)| p.name.as_str())
                .collect();
            agent
                .memory
                .push_str(&format!("\n[聊天記錄] 與 {} 的對話: {json}", others.join("、")));
        }
        agent.exit_thinking();
    }

    result.map(|(dialogue_str, _)| (place.to_owned(), dialogue_str))
}

/// Generate one agent's inner monologue into `current_thought`.
async fn run_monologue(
    services: &Services,
    agents: &SharedAgents,
    idx: usize,
    now_label: &str,
    eq_ctx: Option<&str>,
) {
    let ctx = {
        let mut agent = agents[idx].lock().await;
        agent.enter_thinking();
        MonologueContext {
            name: agent.name.clone(),
            mbti: agent.mbti.as_str().to_owned(),
            persona: agent.persona_summary.clone(),
            location: agent.curr_place.clone(),
            action: agent.curr_action.clone(),
            now_time: now_label.to_owned(),
            memory: tail_chars(&agent.memory, 500),
            eq_ctx: eq_ctx.map(str::to_owned),
        }
    };
    let (_, monologue) = api::generate_inner_monologue(&services.llm, &ctx).await;
    let mut agent = agents[idx].lock().await;
    agent.current_thought = monologue;
    agent.exit_thinking();
}

#[cfg(test)]
mod tests {
    use super::*;
    use minitown_agents::TownAgent;
    use minitown_llm::LlmClient;
    use minitown_types::Mbti;
    use std::sync::Arc;
    use tokio::sync::Mutex;

    fn agents_at(places: &[(&str, Mbti)]) -> SharedAgents {
        Arc::new(
            places
                .iter()
                .map(|(place, mbti)| {
                    let mut agent = TownAgent::new(
                        *mbti,
                        "Apartment_F1",
                        vec![
                            "Apartment_F1".to_owned(),
                            "School".to_owned(),
                            "Exterior".to_owned(),
                        ],
                        None,
                    );
                    agent.curr_place = (*place).to_owned();
                    agent.curr_action = "工作".to_owned();
                    Arc::new(Mutex::new(agent))
                })
                .collect(),
        )
    }

    #[test]
    fn tail_chars_counts_characters_not_bytes() {
        assert_eq!(tail_chars("一二三四五", 3), "三四五");
        assert_eq!(tail_chars("ab", 10), "ab");
    }

    #[tokio::test]
    async fn thinking_flags_unwind_even_with_empty_dialogue() {
        // Offline LLM yields an empty dialogue; the agents must still end
        // up out of the thinking state and back with consistent actions.
        let services = Services::new(Arc::new(LlmClient::offline()));
        let agents = agents_at(&[("School", Mbti::ISTJ), ("School", Mbti::ENFP)]);
        let result = run_chat_group(
            &services,
            &agents,
            "School",
            &[0, 1],
            "2024年11月18日 08點00分(星期一)",
            None,
        )
        .await;
        assert!(result.is_none(), "offline chat produces no transcript");
        for handle in agents.iter() {
            let agent = handle.lock().await;
            assert!(!agent.is_thinking());
            assert_eq!(agent.curr_action, "聊天");
            assert!(!agent.memory.contains("[聊天記錄]"), "no transcript, no memory entry");
        }
    }

    #[tokio::test]
    async fn solo_agents_never_chat() {
        let services = Services::new(Arc::new(LlmClient::offline()));
        let agents = agents_at(&[("School", Mbti::ISTJ), ("Exterior", Mbti::ENFP)]);
        let mut logs = LogBuffers::new();
        // Many rounds: agents at different places form no group of two.
        for _ in 0..20 {
            handle_social_interactions(
                &services,
                &agents,
                &[0, 1],
                "2024年11月18日 08點00分(星期一)",
                None,
                1,
                &mut logs,
            )
            .await;
        }
        assert!(logs.chats.is_empty());
        for handle in agents.iter() {
            let agent = handle.lock().await;
            assert_ne!(agent.curr_action, "聊天");
        }
    }
}
