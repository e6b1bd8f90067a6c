//! The MBTI trait table.
//!
//! Each of the sixteen types carries a one-line personality description
//! and a base cooperation inclination in `[0, 1]`. On top of the base, a
//! disaster-time bonus rewards traits that historically correlate with
//! prosocial crisis behavior; the four bonus components sum to 0.45.

use minitown_types::Mbti;

/// Personality description and base cooperation for one type.
#[derive(Debug, Clone, Copy)]
pub struct MbtiProfile {
    /// One-line description used as the default persona.
    pub description: &'static str,
    /// Base cooperation inclination.
    pub cooperation: f64,
}

/// Look up the trait profile for a type.
pub fn profile(mbti: Mbti) -> MbtiProfile {
    let (description, cooperation) = match mbti {
        Mbti::ISTJ => ("負責任、嚴謹保守，講求秩序，不傾向主動合作。", 0.2),
        Mbti::ISFJ => ("和善、盡責，重視他人感受，內向使其合作意願中等。", 0.5),
        Mbti::INFJ => ("理想主義且有洞察力，默默關懷他人，合作意願中等偏高。", 0.6),
        Mbti::INTJ => ("獨立戰略思考，講求邏輯，如有助計畫則願合作。", 0.3),
        Mbti::ISTP => ("務實冷靜，喜歡獨立解決問題，合作意願偏低。", 0.4),
        Mbti::ISFP => ("溫和敏感，樂於照顧親近的人，一對一合作尚可。", 0.5),
        Mbti::INFP => ("富同理心且忠於價值觀，若符合信念則樂於助人。", 0.7),
        Mbti::INTP => ("客觀好奇，獨立分析問題，只有在合理時才會合作。", 0.4),
        Mbti::ESTP => ("外向實際，適應力強，危機中會立即行動也可能協助他人。", 0.6),
        Mbti::ESFP => ("活潑友善，喜歡帶動團隊，遇事積極協助他人。", 0.7),
        Mbti::ENFP => ("熱情創意且善社交，傾向群體行動與合作。", 0.8),
        Mbti::ENTP => ("機敏健談，喜歡尋找新奇解決方案，願意與人合作解決問題。", 0.7),
        Mbti::ESTJ => ("務實果斷，擅長組織管理，他們會主導並要求合作。", 0.8),
        Mbti::ESFJ => ("熱心合群，重視團隊和諧，樂於為群體付出合作。", 0.9),
        Mbti::ENFJ => ("有同情心又善於領導，天然會帶領並協助他人。", 0.9),
        Mbti::ENTJ => ("自信領導，邏輯效率並重，會有效組織協調團體行動。", 0.8),
    };
    MbtiProfile {
        description,
        cooperation,
    }
}

/// Disaster-time cooperation bonus for a type.
///
/// Components: diplomat (N+F) 0.15, extrovert 0.15, judging 0.10,
/// introverted intuition (I+N) 0.05 -- a full 0.45 if a type could carry
/// all four.
pub fn disaster_bonus(mbti: Mbti) -> f64 {
    let mut bonus = 0.0;
    if mbti.has('N') && mbti.has('F') {
        bonus += 0.15;
    }
    if mbti.is_extrovert() {
        bonus += 0.15;
    }
    if mbti.has('J') {
        bonus += 0.10;
    }
    if mbti.is_introvert() && mbti.has('N') {
        bonus += 0.05;
    }
    bonus
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_cooperation_is_in_unit_range() {
        for mbti in Mbti::ALL {
            let p = profile(mbti);
            assert!((0.0..=1.0).contains(&p.cooperation), "{mbti}");
            assert!(!p.description.is_empty());
        }
    }

    #[test]
    fn bonus_components_sum_to_forty_five_percent() {
        // No single type carries all four components, but the component
        // table itself must total 0.45.
        assert!((0.15_f64 + 0.15 + 0.10 + 0.05 - 0.45).abs() < f64::EPSILON);
        for mbti in Mbti::ALL {
            assert!(disaster_bonus(mbti) <= 0.45, "{mbti}");
        }
    }

    #[test]
    fn bonus_examples() {
        // ENFJ: diplomat + extrovert + judging.
        assert!((disaster_bonus(Mbti::ENFJ) - 0.40).abs() < 1e-9);
        // INFJ: diplomat + judging + introverted intuition.
        assert!((disaster_bonus(Mbti::INFJ) - 0.30).abs() < 1e-9);
        // ISTP: none.
        assert!(disaster_bonus(Mbti::ISTP).abs() < 1e-9);
    }
}
