//! High-level prompt API.
//!
//! One function per prompt template, each with the default the simulation
//! falls back to when the model is unreachable or answers garbage. These
//! are the only LLM entry points the engine crates call.

use std::collections::BTreeMap;

use serde_json::{json, Value};

use crate::client::LlmClient;

/// Days of the week as the weekly-schedule map keys.
const WEEKDAYS: [&str; 7] = [
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
    "Sunday",
];

/// One side of a two-agent chat.
#[derive(Debug, Clone)]
pub struct ChatParticipant {
    pub name: String,
    pub mbti: String,
    pub persona: String,
    /// Trailing slice of the agent's memory.
    pub memory: String,
    pub action: String,
}

/// Context for [`double_agents_chat`].
#[derive(Debug, Clone)]
pub struct ChatContext {
    pub location: String,
    pub now_time: String,
    /// Recent dialogue lines as `[speaker, utterance]` pairs.
    pub history: Vec<(String, String)>,
    /// Disaster framing for post-quake conversations.
    pub eq_ctx: Option<String>,
    pub first: ChatParticipant,
    pub second: ChatParticipant,
}

/// Context for [`generate_inner_monologue`].
#[derive(Debug, Clone)]
pub struct MonologueContext {
    pub name: String,
    pub mbti: String,
    pub persona: String,
    pub location: String,
    pub action: String,
    pub now_time: String,
    pub memory: String,
    pub eq_ctx: Option<String>,
}

/// Generate an agent's initial background memory.
///
/// Returns the text and whether generation actually succeeded (callers
/// abort initialization on failure in llm mode).
pub async fn generate_initial_memory(
    client: &LlmClient,
    name: &str,
    mbti: &str,
    persona: &str,
    home: &str,
) -> (String, bool) {
    let default = "記憶生成失敗，請檢查LLM連線。";
    let out = client
        .generate(
            "generate_initial_memory",
            &[
                name.to_owned(),
                mbti.to_owned(),
                persona.to_owned(),
                home.to_owned(),
            ],
            "僅返回描述代理人背景故事的純文字字串。",
            json!(default),
        )
        .await;
    let text = out.as_str().unwrap_or(default).to_owned();
    let success = text != default;
    (text, success)
}

/// Generate a Monday..Sunday goal map.
pub async fn generate_weekly_schedule(
    client: &LlmClient,
    persona: &str,
) -> (BTreeMap<String, String>, bool) {
    let default: BTreeMap<String, String> = WEEKDAYS
        .iter()
        .map(|day| ((*day).to_owned(), "自由活動".to_owned()))
        .collect();
    let out = client
        .generate(
            "generate_weekly_schedule",
            &[persona.to_owned()],
            "返回一個包含七天（Monday-Sunday）鍵的 JSON 物件。",
            json!(default),
        )
        .await;
    let Some(map) = out.as_object() else {
        return (default, false);
    };
    let schedule: BTreeMap<String, String> = map
        .iter()
        .filter_map(|(day, goal)| Some((day.clone(), goal.as_str()?.to_owned())))
        .collect();
    if schedule.len() == 7 && schedule != default {
        (schedule, true)
    } else {
        (default, false)
    }
}

/// Generate today's `[label, minutes]` activity list.
pub async fn generate_hourly_schedule(
    client: &LlmClient,
    persona: &str,
    date: &str,
    today_goal: &str,
) -> Vec<(String, i64)> {
    let default = json!([["自由活動", 1440]]);
    let out = client
        .generate(
            "generate_schedule",
            &[persona.to_owned(), date.to_owned(), today_goal.to_owned()],
            "返回一個列表，其中每個子列表包含[活動名稱, 持續分鐘數]。",
            default,
        )
        .await;
    parse_duration_list(&out)
}

/// Coerce the model's schedule output into `(label, minutes)` pairs,
/// dropping malformed entries.
fn parse_duration_list(value: &Value) -> Vec<(String, i64)> {
    let Some(items) = value.as_array() else {
        return vec![("自由活動".to_owned(), 1440)];
    };
    let parsed: Vec<(String, i64)> = items
        .iter()
        .filter_map(|item| {
            let pair = item.as_array()?;
            let label = pair.first()?.as_str()?.to_owned();
            let minutes = pair.get(1)?.as_i64().or_else(|| {
                pair.get(1)?.as_str().and_then(|s| s.trim().parse().ok())
            })?;
            if minutes <= 0 {
                return None;
            }
            Some((label, minutes))
        })
        .collect();
    if parsed.is_empty() {
        vec![("自由活動".to_owned(), 1440)]
    } else {
        parsed
    }
}

/// Ask for a wake-up time, normalized to `HH-MM` by regex-free scanning.
pub async fn wake_up_hour(
    client: &LlmClient,
    persona: &str,
    date: &str,
    hourly_schedule: &[(String, i64)],
) -> String {
    let schedule_str = serde_json::to_string(hourly_schedule).unwrap_or_default();
    let default = "07-00".to_owned();
    let out = client
        .generate(
            "wake_up_hour",
            &[persona.to_owned(), date.to_owned(), schedule_str],
            "返回 \"HH:MM\" 或 \"HH-MM\" 格式的時間字串。",
            json!(default),
        )
        .await;
    let raw = out.as_str().unwrap_or(&default);
    normalize_hm(raw).unwrap_or(default)
}

/// Scan free text for the first `HH:MM`/`HH-MM` time and normalize it.
pub fn normalize_hm(text: &str) -> Option<String> {
    let chars: Vec<char> = text.chars().collect();
    for window in chars.windows(5) {
        let (h1, h2, sep, m1, m2) = (window[0], window[1], window[2], window[3], window[4]);
        if !(sep == ':' || sep == '-') {
            continue;
        }
        if !(h1.is_ascii_digit() && h2.is_ascii_digit() && m1.is_ascii_digit() && m2.is_ascii_digit())
        {
            continue;
        }
        let hour = (h1 as u8 - b'0') * 10 + (h2 as u8 - b'0');
        let minute = (m1 as u8 - b'0') * 10 + (m2 as u8 - b'0');
        if hour < 24 && minute < 60 {
            return Some(format!("{hour:02}-{minute:02}"));
        }
    }
    None
}

/// Fetch an emoji for an action label.
///
/// Common labels short-circuit to a fixed emoji without touching the
/// model; everything else makes a one-emoji request.
pub async fn pronunciatio(client: &LlmClient, action: &str) -> String {
    const COMMON: [(&str, &str); 9] = [
        ("睡覺", "😴"),
        ("休息", "🛋️"),
        ("吃飯", "🍕"),
        ("聊天", "💬"),
        ("工作", "💼"),
        ("學習", "📚"),
        ("醒來", "☀️"),
        ("意識不明", "😵"),
        ("初始化", "⏳"),
    ];
    for (key, emoji) in COMMON {
        if action.contains(key) {
            return emoji.to_owned();
        }
    }
    let out = client
        .generate(
            "pronunciatio",
            &[action.to_owned()],
            "只返回一個最適合的 emoji 圖標字串。",
            json!("❓"),
        )
        .await;
    out.as_str().unwrap_or("❓").trim().to_owned()
}

/// Generate a short thought for a newly started action.
pub async fn generate_action_thought(
    client: &LlmClient,
    persona: &str,
    current_place: &str,
    new_action: &str,
) -> String {
    let out = client
        .generate(
            "generate_action_thought",
            &[
                persona.to_owned(),
                current_place.to_owned(),
                new_action.to_owned(),
            ],
            "返回一句約20字的簡短內心想法字串。",
            json!(""),
        )
        .await;
    out.as_str().unwrap_or("").to_owned()
}

/// Ask for the agent's next in-quake action and thought.
pub async fn earthquake_step_action(
    client: &LlmClient,
    persona: &str,
    health: i32,
    mental_state: &str,
    current_place: &str,
    intensity: f64,
    disaster_log: &[String],
) -> (String, String) {
    let default = json!({"action": "保持警惕", "thought": "(恐懼中...)"});
    let out = client
        .generate(
            "earthquake_step_action",
            &[
                persona.to_owned(),
                health.to_string(),
                mental_state.to_owned(),
                current_place.to_owned(),
                format!("{intensity:.2}"),
                disaster_log.join("\n"),
            ],
            "輸出包含 \"action\" 和 \"thought\" 鍵的 JSON 物件。",
            default,
        )
        .await;
    let action = out
        .get("action")
        .and_then(Value::as_str)
        .unwrap_or("保持警惕")
        .to_owned();
    let thought = out
        .get("thought")
        .and_then(Value::as_str)
        .unwrap_or("(恐懼中...)")
        .to_owned();
    (action, thought)
}

/// Run a two-agent conversation; returns `(thought, dialogue)`.
pub async fn double_agents_chat(
    client: &LlmClient,
    ctx: &ChatContext,
) -> (String, Vec<(String, String)>) {
    let default = json!({"thought": "解析錯誤。", "dialogue": []});
    let history: Vec<[&str; 2]> = ctx
        .history
        .iter()
        .map(|(speaker, line)| [speaker.as_str(), line.as_str()])
        .collect();
    let args = vec![
        ctx.location.clone(),
        ctx.first.name.clone(),
        ctx.first.mbti.clone(),
        ctx.first.persona.clone(),
        ctx.first.memory.clone(),
        ctx.second.name.clone(),
        ctx.second.mbti.clone(),
        ctx.second.persona.clone(),
        ctx.second.memory.clone(),
        ctx.now_time.clone(),
        ctx.first.action.clone(),
        ctx.second.action.clone(),
        ctx.eq_ctx.clone().unwrap_or_else(|| "目前一切正常。".to_owned()),
        serde_json::to_string(&history).unwrap_or_default(),
    ];
    let out = client
        .generate(
            "double_chat",
            &args,
            "輸出一個包含 \"thought\" 和 \"dialogue\" 鍵的 JSON 物件。",
            default,
        )
        .await;
    let thought = out
        .get("thought")
        .and_then(Value::as_str)
        .unwrap_or("解析錯誤。")
        .to_owned();
    let dialogue = out
        .get("dialogue")
        .and_then(Value::as_array)
        .map(|lines| {
            lines
                .iter()
                .filter_map(|line| {
                    let pair = line.as_array()?;
                    Some((
                        pair.first()?.as_str()?.to_owned(),
                        pair.get(1)?.as_str()?.to_owned(),
                    ))
                })
                .collect()
        })
        .unwrap_or_default();
    (thought, dialogue)
}

/// Generate a monologue for an idle agent; returns `(thought, monologue)`.
pub async fn generate_inner_monologue(
    client: &LlmClient,
    ctx: &MonologueContext,
) -> (String, String) {
    let default = json!({"thought": "解析錯誤。", "monologue": "（正在思考...）"});
    let out = client
        .generate(
            "inner_monologue",
            &[
                ctx.name.clone(),
                ctx.mbti.clone(),
                ctx.persona.clone(),
                ctx.location.clone(),
                ctx.action.clone(),
                ctx.now_time.clone(),
                ctx.memory.clone(),
                ctx.eq_ctx.clone().unwrap_or_else(|| "目前一切正常。".to_owned()),
            ],
            "輸出一個包含 \"thought\" 和 \"monologue\" 鍵的 JSON 物件。",
            default,
        )
        .await;
    let thought = out
        .get("thought")
        .and_then(Value::as_str)
        .unwrap_or("解析錯誤。")
        .to_owned();
    let monologue = out
        .get("monologue")
        .and_then(Value::as_str)
        .unwrap_or("（正在思考...）")
        .to_owned();
    (thought, monologue)
}

/// Summarize an agent's disaster experience log into a memory sentence.
pub async fn summarize_disaster(
    client: &LlmClient,
    name: &str,
    mbti: &str,
    health: i32,
    experience_log: &[String],
) -> String {
    let log_str = if experience_log.is_empty() {
        "(沒有具體事件記錄)".to_owned()
    } else {
        experience_log.join("\n")
    };
    let out = client
        .generate(
            "summarize_disaster",
            &[
                name.to_owned(),
                mbti.to_owned(),
                health.to_string(),
                log_str,
            ],
            "返回簡短的災後記憶總結字串。",
            json!("經歷了一場地震，現在安全。"),
        )
        .await;
    out.as_str()
        .unwrap_or("經歷了一場地震，現在安全。")
        .to_owned()
}

/// Suggest a recovery-phase action.
pub async fn get_recovery_action(
    client: &LlmClient,
    persona: &str,
    mental_state: &str,
    curr_place: &str,
) -> String {
    let out = client
        .generate(
            "get_recovery_action",
            &[
                persona.to_owned(),
                mental_state.to_owned(),
                curr_place.to_owned(),
            ],
            "返回建議的恢復行動短語字串。",
            json!("原地休息"),
        )
        .await;
    out.as_str().unwrap_or("原地休息").to_owned()
}

/// Fold a day's chat transcript into a memory summary.
pub async fn summarize_chat(
    client: &LlmClient,
    content: &str,
    day_tag: &str,
    name: &str,
) -> String {
    let fallback: String = content.chars().rev().take(200).collect::<Vec<_>>().into_iter().rev().collect();
    let out = client
        .generate(
            "summarize_chat",
            &[content.to_owned(), day_tag.to_owned(), name.to_owned()],
            "返回第一人稱的記憶總結字串。",
            json!(fallback),
        )
        .await;
    out.as_str().unwrap_or(&fallback).to_owned()
}
