//! Enumeration types for the minitown simulation.
//!
//! The MBTI roster, simulation phases, agent mental states, and the
//! disaster-logger event vocabulary. Everything here serializes to the
//! exact strings the front end and the disaster report use.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// One of the sixteen MBTI personality tokens.
///
/// Agent names in this simulation *are* their MBTI type, so this enum
/// doubles as the agent identity vocabulary. Serialized as the four-letter
/// uppercase token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Mbti {
    ISTJ,
    ISFJ,
    INFJ,
    INTJ,
    ISTP,
    ISFP,
    INFP,
    INTP,
    ESTP,
    ESFP,
    ENFP,
    ENTP,
    ESTJ,
    ESFJ,
    ENFJ,
    ENTJ,
}

impl Mbti {
    /// All sixteen types in the conventional order.
    pub const ALL: [Self; 16] = [
        Self::ISTJ,
        Self::ISFJ,
        Self::INFJ,
        Self::INTJ,
        Self::ISTP,
        Self::ISFP,
        Self::INFP,
        Self::INTP,
        Self::ESTP,
        Self::ESFP,
        Self::ENFP,
        Self::ENTP,
        Self::ESTJ,
        Self::ESFJ,
        Self::ENFJ,
        Self::ENTJ,
    ];

    /// The four-letter token as a static string.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ISTJ => "ISTJ",
            Self::ISFJ => "ISFJ",
            Self::INFJ => "INFJ",
            Self::INTJ => "INTJ",
            Self::ISTP => "ISTP",
            Self::ISFP => "ISFP",
            Self::INFP => "INFP",
            Self::INTP => "INTP",
            Self::ESTP => "ESTP",
            Self::ESFP => "ESFP",
            Self::ENFP => "ENFP",
            Self::ENTP => "ENTP",
            Self::ESTJ => "ESTJ",
            Self::ESFJ => "ESFJ",
            Self::ENFJ => "ENFJ",
            Self::ENTJ => "ENTJ",
        }
    }

    /// True when the first letter is `E`.
    pub fn is_extrovert(self) -> bool {
        self.as_str().starts_with('E')
    }

    /// True when the first letter is `I`.
    pub fn is_introvert(self) -> bool {
        self.as_str().starts_with('I')
    }

    /// True when the token contains the given trait letter.
    pub fn has(self, letter: char) -> bool {
        self.as_str().contains(letter)
    }

    /// True when the token contains the given letter pair in order
    /// (e.g. `"TJ"` matches `ENTJ` and `ESTJ`).
    pub fn has_pair(self, pair: &str) -> bool {
        self.as_str().contains(pair)
    }
}

impl fmt::Display for Mbti {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mbti {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_uppercase();
        Self::ALL
            .into_iter()
            .find(|m| m.as_str() == upper)
            .ok_or_else(|| format!("unknown MBTI token: {s}"))
    }
}

/// The phase of the simulation state machine.
///
/// Normal -> Earthquake -> Recovery -> PostQuakeDiscussion -> Normal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    /// Daily-life scheduling, chats, monologues.
    Normal,
    /// The quake is shaking; agents run disaster steps each tick.
    Earthquake,
    /// 60 simulated minutes of rest, healing, and helping.
    Recovery,
    /// 6 simulated hours where chats carry a disaster context.
    PostQuakeDiscussion,
}

/// An agent's mental state, serialized as the lowercase word the front
/// end displays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MentalState {
    Calm,
    Alert,
    Panicked,
    Frozen,
    Focused,
    Helping,
    Injured,
    Unconscious,
}

impl MentalState {
    /// The wire/report string for this state.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Calm => "calm",
            Self::Alert => "alert",
            Self::Panicked => "panicked",
            Self::Frozen => "frozen",
            Self::Focused => "focused",
            Self::Helping => "helping",
            Self::Injured => "injured",
            Self::Unconscious => "unconscious",
        }
    }
}

/// The kind of an event recorded by the disaster logger.
///
/// Serialized as the Chinese label the scoring report uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DisasterEventKind {
    /// 初始化 -- bookkeeping before the disaster clock starts.
    #[serde(rename = "初始化")]
    Init,
    /// 反應 -- the agent's first reaction to the quake.
    #[serde(rename = "反應")]
    Reaction,
    /// 損失 -- HP lost to damage.
    #[serde(rename = "損失")]
    Loss,
    /// 合作 -- the agent helped a peer.
    #[serde(rename = "合作")]
    Cooperation,
    /// 爭吵 -- the agent was involved in an MBTI conflict.
    #[serde(rename = "爭吵")]
    Quarrel,
}

impl DisasterEventKind {
    /// The report label for this kind.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Init => "初始化",
            Self::Reaction => "反應",
            Self::Loss => "損失",
            Self::Cooperation => "合作",
            Self::Quarrel => "爭吵",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mbti_parses_case_insensitively() {
        assert_eq!("istj".parse::<Mbti>(), Ok(Mbti::ISTJ));
        assert_eq!(" EnFp ".parse::<Mbti>(), Ok(Mbti::ENFP));
        assert!("XXXX".parse::<Mbti>().is_err());
    }

    #[test]
    fn mbti_trait_letters() {
        assert!(Mbti::ENTJ.is_extrovert());
        assert!(Mbti::INFP.is_introvert());
        assert!(Mbti::ENTJ.has_pair("TJ"));
        assert!(!Mbti::ESFP.has_pair("TJ"));
        assert!(Mbti::INFJ.has('F'));
    }

    #[test]
    fn mbti_serializes_as_token() {
        let json = serde_json::to_string(&Mbti::ESFJ).unwrap();
        assert_eq!(json, "\"ESFJ\"");
    }

    #[test]
    fn mental_state_serializes_lowercase() {
        let json = serde_json::to_string(&MentalState::Panicked).unwrap();
        assert_eq!(json, "\"panicked\"");
    }

    #[test]
    fn disaster_kind_serializes_in_chinese() {
        let json = serde_json::to_string(&DisasterEventKind::Cooperation).unwrap();
        assert_eq!(json, "\"合作\"");
        let back: DisasterEventKind = serde_json::from_str("\"爭吵\"").unwrap();
        assert_eq!(back, DisasterEventKind::Quarrel);
    }
}
