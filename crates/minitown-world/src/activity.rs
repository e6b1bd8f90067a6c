//! The closed activity vocabulary and free-text classification.
//!
//! Every string that reaches the front end as an agent's `currentState`
//! comes out of this module. Anything the model produces is classified
//! into one canonical label with a fixed emoji, so the client only ever
//! sees a small stable vocabulary.
//!
//! Classification order:
//! 1. if the text already contains a known emoji, the label that owns it wins
//! 2. prioritized keyword scan (longer keywords first, ASCII lowercased)
//! 3. fall back to `意識不明` / 😵

/// Canonical daily-life labels and their emoji.
const DAILY: [(&str, &str); 10] = [
    ("睡覺", "😴"),
    ("休息", "🛋️"),
    ("吃飯", "🍕"),
    ("聊天", "💬"),
    ("工作", "💼"),
    ("學習", "📚"),
    ("醒來", "☀️"),
    ("意識不明", "😵"),
    ("初始化中", "⏳"),
    ("移動中", "🚶"),
];

/// Disaster-reaction labels and their emoji.
const DISASTER: [(&str, &str); 10] = [
    ("尋找遮蔽物", "⚠️"),
    ("躲到桌下", "🥶"),
    ("尋找安全出口", "🏃"),
    ("指揮疏散", "🧑‍🚒"),
    ("安撫他人", "🤗"),
    ("尋找醫療救助", "🤕"),
    ("協助受傷的人", "🤝"),
    ("評估周圍環境", "🧘"),
    ("撤離到地鐵", "🚇"),
    ("在地鐵避難", "🛟"),
];

/// Keyword table: `(keyword, canonical label)`. Scanned longest keyword
/// first so the more specific phrasing wins. ASCII keywords are matched
/// against the lowercased input.
const KEYWORDS: [(&str, &str); 58] = [
    ("在地鐵避難", "在地鐵避難"),
    ("尋找醫療救助", "尋找醫療救助"),
    ("協助受傷的人", "協助受傷的人"),
    ("評估周圍環境", "評估周圍環境"),
    ("尋找安全出口", "尋找安全出口"),
    ("尋找遮蔽物", "尋找遮蔽物"),
    ("撤離到地鐵", "撤離到地鐵"),
    ("安全出口", "尋找安全出口"),
    ("醫療資源", "尋找醫療救助"),
    ("躲到桌下", "躲到桌下"),
    ("地鐵避難", "在地鐵避難"),
    ("指揮疏散", "指揮疏散"),
    ("unconscious", "意識不明"),
    ("等待初始化", "初始化中"),
    ("意識不明", "意識不明"),
    ("初始化", "初始化中"),
    ("遮蔽", "尋找遮蔽物"),
    ("掩護", "尋找遮蔽物"),
    ("躲避", "躲到桌下"),
    ("疏散", "指揮疏散"),
    ("安撫", "安撫他人"),
    ("安慰", "安撫他人"),
    ("醫療", "尋找醫療救助"),
    ("急救", "尋找醫療救助"),
    ("就醫", "尋找醫療救助"),
    ("協助", "協助受傷的人"),
    ("救援", "協助受傷的人"),
    ("搶救", "協助受傷的人"),
    ("幫助", "協助受傷的人"),
    ("評估", "評估周圍環境"),
    ("撤離", "撤離到地鐵"),
    ("避難", "在地鐵避難"),
    ("警惕", "評估周圍環境"),
    ("警戒", "評估周圍環境"),
    ("睡覺", "睡覺"),
    ("睡眠", "睡覺"),
    ("就寢", "睡覺"),
    ("入睡", "睡覺"),
    ("sleep", "睡覺"),
    ("醒來", "醒來"),
    ("起床", "醒來"),
    ("wake", "醒來"),
    ("早餐", "吃飯"),
    ("午餐", "吃飯"),
    ("晚餐", "吃飯"),
    ("用餐", "吃飯"),
    ("吃飯", "吃飯"),
    ("eat", "吃飯"),
    ("聊天", "聊天"),
    ("交談", "聊天"),
    ("chat", "聊天"),
    ("工作", "工作"),
    ("上班", "工作"),
    ("work", "工作"),
    ("學習", "學習"),
    ("上課", "學習"),
    ("上學", "學習"),
    ("study", "學習"),
];

/// Extra keywords that must rank below everything above.
const WEAK_KEYWORDS: [(&str, &str); 8] = [
    ("讀書", "學習"),
    ("休息", "休息"),
    ("放鬆", "休息"),
    ("rest", "休息"),
    ("移動", "移動中"),
    ("前往", "移動中"),
    ("昏迷", "意識不明"),
    ("發呆", "休息"),
];

/// The fallback when nothing matches.
const FALLBACK: (&str, &str) = ("意識不明", "😵");

/// True when `label` is one of the twenty canonical labels.
pub fn is_known_label(label: &str) -> bool {
    DAILY.iter().chain(DISASTER.iter()).any(|(l, _)| *l == label)
}

/// The fixed emoji for a canonical label, if it is one.
pub fn emoji_for(label: &str) -> Option<&'static str> {
    DAILY
        .iter()
        .chain(DISASTER.iter())
        .find(|(l, _)| *l == label)
        .map(|(_, e)| *e)
}

/// Classify free text into `(canonical label, emoji)`.
pub fn classify(raw: &str) -> (&'static str, &'static str) {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return FALLBACK;
    }

    // 1. A known emoji in the text decides immediately.
    for (label, emoji) in DAILY.iter().chain(DISASTER.iter()) {
        if trimmed.contains(emoji) {
            return (label, emoji);
        }
    }

    // 2. Exact canonical label.
    for (label, emoji) in DAILY.iter().chain(DISASTER.iter()) {
        if trimmed == *label {
            return (label, emoji);
        }
    }

    // 3. Keyword scan; the tables are ordered most-specific first.
    let lowered = trimmed.to_lowercase();
    for (keyword, label) in KEYWORDS.iter().chain(WEAK_KEYWORDS.iter()) {
        if lowered.contains(keyword) {
            let emoji = emoji_for(label).unwrap_or(FALLBACK.1);
            return (label, emoji);
        }
    }

    FALLBACK
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_labels_classify_to_themselves() {
        for (label, emoji) in DAILY.iter().chain(DISASTER.iter()) {
            let (got_label, got_emoji) = classify(label);
            assert_eq!(got_label, *label);
            assert_eq!(got_emoji, *emoji);
        }
    }

    #[test]
    fn emoji_wins_over_keywords() {
        let (label, emoji) = classify("😴 去工作");
        assert_eq!(label, "睡覺");
        assert_eq!(emoji, "😴");
    }

    #[test]
    fn keyword_matching_handles_free_text() {
        assert_eq!(classify("在圖書館讀書準備考試").0, "學習");
        assert_eq!(classify("去餐廳吃飯").0, "吃飯");
        assert_eq!(classify("與朋友交談").0, "聊天");
        assert_eq!(classify("Deep WORK session").0, "工作");
    }

    #[test]
    fn specific_disaster_phrases_beat_generic_words() {
        // "尋找安全出口" contains no 工作/學習 keyword and must classify
        // to the disaster label, not fall back.
        assert_eq!(classify("驚慌地尋找安全出口").0, "尋找安全出口");
        assert_eq!(classify("尋找醫療資源或休息").0, "尋找醫療救助");
        assert_eq!(classify("協助受傷的人脫困").0, "協助受傷的人");
    }

    #[test]
    fn unknown_text_falls_back_unconscious() {
        let (label, emoji) = classify("xyzzy");
        assert_eq!(label, "意識不明");
        assert_eq!(emoji, "😵");
    }

    #[test]
    fn every_label_has_unique_emoji() {
        let mut seen = std::collections::BTreeSet::new();
        for (_, emoji) in DAILY.iter().chain(DISASTER.iter()) {
            assert!(seen.insert(emoji), "duplicate emoji {emoji}");
        }
    }
}
