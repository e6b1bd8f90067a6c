//! MBTI conflict generation during the earthquake.
//!
//! Stress makes personalities grind against each other. Co-located
//! active agents are checked for four friction patterns; each pattern
//! fires probabilistically and then cools down for 5-8 simulated minutes
//! per location, so one shaky corridor does not produce an argument
//! every tick.

use std::collections::BTreeMap;

use chrono::{NaiveDateTime, TimeDelta};
use rand::Rng;

use minitown_types::Mbti;

/// Chance a ready pattern actually fires for a group.
const FIRE_PROBABILITY: f64 = 0.25;

/// Keywords marking an agent as actively talking.
const TALK_KEYWORDS: [&str; 4] = ["聊天", "討論", "安撫", "指揮"];

/// The four friction patterns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ConflictKind {
    /// Sentinels vs Explorers over the evacuation route.
    Route,
    /// Diplomats vs rational thinkers over rescue priority.
    RescuePriority,
    /// Leaders vs contrarians over who is in charge.
    Leadership,
    /// Introverts vs talkative extroverts.
    Communication,
}

/// A generated conflict event.
#[derive(Debug, Clone)]
pub struct ConflictEvent {
    pub location: String,
    pub kind: ConflictKind,
    /// The two agents involved, by name.
    pub participants: (String, String),
    /// Human-readable event line.
    pub text: String,
}

/// Minimal view of one agent for conflict matching.
#[derive(Debug, Clone)]
pub struct ConflictAgent {
    pub name: String,
    pub mbti: Mbti,
    pub action: String,
}

/// Per-(location, kind) cooldown bookkeeping.
#[derive(Debug, Default)]
pub struct ConflictTracker {
    ready_at: BTreeMap<(String, ConflictKind), NaiveDateTime>,
}

impl ConflictTracker {
    /// Create an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Generate conflicts for one earthquake tick.
    ///
    /// `groups` maps a location to its co-located active agents. For each
    /// fired event both participants should be charged a quarrel.
    pub fn generate<R: Rng>(
        &mut self,
        groups: &BTreeMap<String, Vec<ConflictAgent>>,
        now: NaiveDateTime,
        rng: &mut R,
    ) -> Vec<ConflictEvent> {
        let mut events = Vec::new();
        for (location, members) in groups {
            if members.len() < 2 {
                continue;
            }
            for kind in [
                ConflictKind::Route,
                ConflictKind::RescuePriority,
                ConflictKind::Leadership,
                ConflictKind::Communication,
            ] {
                if !self.is_ready(location, kind, now) {
                    continue;
                }
                let Some((first, second)) = match_pair(kind, members) else {
                    continue;
                };
                if rng.gen::<f64>() >= FIRE_PROBABILITY {
                    continue;
                }
                let cooldown = TimeDelta::minutes(rng.gen_range(5..=8));
                self.ready_at
                    .insert((location.clone(), kind), now + cooldown);
                events.push(ConflictEvent {
                    location: location.clone(),
                    kind,
                    participants: (first.name.clone(), second.name.clone()),
                    text: render_event(kind, location, first, second),
                });
            }
        }
        events
    }

    fn is_ready(&self, location: &str, kind: ConflictKind, now: NaiveDateTime) -> bool {
        self.ready_at
            .get(&(location.to_owned(), kind))
            .is_none_or(|ready| now >= *ready)
    }
}

/// Sentinels: xSxJ.
fn is_sentinel(mbti: Mbti) -> bool {
    mbti.has('S') && mbti.has('J')
}

/// Explorers: xSxP.
fn is_explorer(mbti: Mbti) -> bool {
    mbti.has('S') && mbti.has('P')
}

/// Diplomats: xNFx.
fn is_diplomat(mbti: Mbti) -> bool {
    mbti.has('N') && mbti.has('F')
}

/// Rational thinkers: analysts (xNTx) plus pragmatic xSTP.
fn is_rational(mbti: Mbti) -> bool {
    (mbti.has('N') && mbti.has('T')) || (mbti.has('S') && mbti.has('T') && mbti.has('P'))
}

/// Leaders: ENTJ / ESTJ.
fn is_leader(mbti: Mbti) -> bool {
    matches!(mbti, Mbti::ENTJ | Mbti::ESTJ)
}

/// Contrarians: explorers plus ENFP.
fn is_contrarian(mbti: Mbti) -> bool {
    is_explorer(mbti) || mbti == Mbti::ENFP
}

fn is_talkative_extrovert(agent: &ConflictAgent) -> bool {
    agent.mbti.is_extrovert()
        && TALK_KEYWORDS
            .iter()
            .any(|keyword| agent.action.contains(keyword))
}

/// Find one agent from each side of a pattern, distinct people.
fn match_pair(kind: ConflictKind, members: &[ConflictAgent]) -> Option<(&ConflictAgent, &ConflictAgent)> {
    let (first_pred, second_pred): (
        fn(&ConflictAgent) -> bool,
        fn(&ConflictAgent) -> bool,
    ) = match kind {
        ConflictKind::Route => (|a| is_sentinel(a.mbti), |a| is_explorer(a.mbti)),
        ConflictKind::RescuePriority => (|a| is_diplomat(a.mbti), |a| is_rational(a.mbti)),
        ConflictKind::Leadership => (|a| is_leader(a.mbti), |a| is_contrarian(a.mbti)),
        ConflictKind::Communication => (|a| a.mbti.is_introvert(), is_talkative_extrovert),
    };
    let first = members.iter().find(|a| first_pred(a))?;
    let second = members.iter().find(|a| second_pred(a) && a.name != first.name)?;
    Some((first, second))
}

fn render_event(
    kind: ConflictKind,
    location: &str,
    first: &ConflictAgent,
    second: &ConflictAgent,
) -> String {
    let (a, am, b, bm) = (&first.name, first.mbti, &second.name, second.mbti);
    match kind {
        ConflictKind::Route => format!(
            "[衝突] {location}：{a}({am}) 堅持走熟悉路線，{b}({bm}) 想抄捷徑，兩人為撤離路線爭執。"
        ),
        ConflictKind::RescuePriority => format!(
            "[衝突] {location}：{a}({am}) 主張先救傷者，{b}({bm}) 認為先確保出口，救援優先序起了爭執。"
        ),
        ConflictKind::Leadership => format!(
            "[衝突] {location}：{a}({am}) 開始發號施令，{b}({bm}) 不服指揮，場面一度混亂。"
        ),
        ConflictKind::Communication => format!(
            "[衝突] {location}：{b}({bm}) 不停說話，{a}({am}) 被吵得無法思考，兩人起了口角。"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn at(minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 11, 18)
            .unwrap()
            .and_hms_opt(3, minute, 0)
            .unwrap()
    }

    fn agent(name: &str, mbti: Mbti, action: &str) -> ConflictAgent {
        ConflictAgent {
            name: name.to_owned(),
            mbti,
            action: action.to_owned(),
        }
    }

    fn groups(members: Vec<ConflictAgent>) -> BTreeMap<String, Vec<ConflictAgent>> {
        BTreeMap::from([("Subway".to_owned(), members)])
    }

    #[test]
    fn route_conflict_needs_sentinel_and_explorer() {
        let mut tracker = ConflictTracker::new();
        let mut rng = StdRng::seed_from_u64(1);
        let members = groups(vec![
            agent("ISTJ", Mbti::ISTJ, "撤離到地鐵"),
            agent("ESTP", Mbti::ESTP, "撤離到地鐵"),
        ]);
        // Run many rounds well apart so cooldowns never block; the
        // pattern must fire eventually.
        let mut fired = 0;
        for round in 0..200 {
            let events = tracker.generate(&members, at(0) + TimeDelta::minutes(round * 10), &mut rng);
            fired += events
                .iter()
                .filter(|e| e.kind == ConflictKind::Route)
                .count();
        }
        assert!(fired > 0);
    }

    #[test]
    fn no_conflicts_without_matching_sides() {
        let mut tracker = ConflictTracker::new();
        let mut rng = StdRng::seed_from_u64(2);
        // Two diplomats only: no rational thinker, no sentinels, etc.
        let members = groups(vec![
            agent("INFJ", Mbti::INFJ, "安撫他人"),
            agent("INFP", Mbti::INFP, "躲到桌下"),
        ]);
        for round in 0..100 {
            let events = tracker.generate(&members, at(0) + TimeDelta::minutes(round * 10), &mut rng);
            assert!(
                events
                    .iter()
                    .all(|e| e.kind == ConflictKind::Communication),
                "only communication friction is possible here"
            );
            // Even communication needs a talkative extrovert; INFP/INFJ
            // are both introverts, so nothing fires at all.
            assert!(events.is_empty());
        }
    }

    #[test]
    fn cooldown_blocks_immediate_repeat() {
        let mut tracker = ConflictTracker::new();
        // Force firing by trying many seeds at the same instant: after
        // the first fire, the same (location, kind) must stay quiet
        // within the cooldown window.
        let members = groups(vec![
            agent("ENTJ", Mbti::ENTJ, "指揮疏散"),
            agent("ENFP", Mbti::ENFP, "聊天"),
        ]);
        let mut rng = StdRng::seed_from_u64(3);
        let mut first_fire_minute = None;
        for minute in 0..40 {
            let events = tracker.generate(&members, at(minute), &mut rng);
            for event in &events {
                if event.kind == ConflictKind::Leadership {
                    if let Some(previous) = first_fire_minute {
                        assert!(
                            minute - previous >= 5,
                            "leadership refired after {} min",
                            minute - previous
                        );
                    }
                    first_fire_minute = Some(minute);
                }
            }
        }
        assert!(first_fire_minute.is_some(), "pattern never fired in 40 min");
    }

    #[test]
    fn communication_needs_talkative_extrovert() {
        let members = vec![
            agent("ISTP", Mbti::ISTP, "躲到桌下"),
            agent("ESFP", Mbti::ESFP, "安撫他人"),
        ];
        let pair = match_pair(ConflictKind::Communication, &members).unwrap();
        assert_eq!(pair.0.name, "ISTP");
        assert_eq!(pair.1.name, "ESFP");

        let silent = vec![
            agent("ISTP", Mbti::ISTP, "躲到桌下"),
            agent("ESFP", Mbti::ESFP, "躲到桌下"),
        ];
        assert!(match_pair(ConflictKind::Communication, &silent).is_none());
    }
}
