//! Prompt templates and rendering.
//!
//! Templates use the `!<INPUT k>!` placeholder convention: rendering
//! replaces each placeholder with the k-th argument. A template may carry
//! a header section separated by the comment block marker; only the part
//! after the marker is sent to the model.

/// Marker separating a template's comment header from its body.
const COMMENT_MARKER: &str = "<commentblockmarker>###</commentblockmarker>";

/// Look up the embedded template for a prompt key.
pub fn template(key: &str) -> Option<&'static str> {
    let body = match key {
        "generate_initial_memory" => GENERATE_INITIAL_MEMORY,
        "generate_weekly_schedule" => GENERATE_WEEKLY_SCHEDULE,
        "generate_schedule" => GENERATE_SCHEDULE,
        "wake_up_hour" => WAKE_UP_HOUR,
        "pronunciatio" => PRONUNCIATIO,
        "generate_action_thought" => GENERATE_ACTION_THOUGHT,
        "double_chat" => DOUBLE_CHAT,
        "inner_monologue" => INNER_MONOLOGUE,
        "earthquake_step_action" => EARTHQUAKE_STEP_ACTION,
        "get_recovery_action" => GET_RECOVERY_ACTION,
        "summarize_disaster" => SUMMARIZE_DISASTER,
        "summarize_chat" => SUMMARIZE_CHAT,
        _ => return None,
    };
    Some(body)
}

/// Render a template by substituting `!<INPUT k>!` placeholders and
/// stripping the comment header if present.
pub fn render(body: &str, args: &[String]) -> String {
    let mut prompt = body.to_owned();
    for (idx, arg) in args.iter().enumerate() {
        prompt = prompt.replace(&format!("!<INPUT {idx}>!"), arg);
    }
    if let Some((_, after)) = prompt.split_once(COMMENT_MARKER) {
        prompt = after.to_owned();
    }
    prompt.trim().to_owned()
}

const GENERATE_INITIAL_MEMORY: &str = r#"變數:
!<INPUT 0>! -- 姓名
!<INPUT 1>! -- MBTI
!<INPUT 2>! -- 個性摘要
!<INPUT 3>! -- 住處
<commentblockmarker>###</commentblockmarker>
你是小鎮居民 !<INPUT 0>!（MBTI: !<INPUT 1>!），住在 !<INPUT 3>!。
個性：!<INPUT 2>!
請以第一人稱寫一段 100 字以內的背景故事，描述你的生活近況與在意的事。"#;

const GENERATE_WEEKLY_SCHEDULE: &str = r#"變數:
!<INPUT 0>! -- 個性摘要
<commentblockmarker>###</commentblockmarker>
個性：!<INPUT 0>!
請為這位居民規劃一週目標，輸出包含 Monday 到 Sunday 七個鍵的 JSON 物件，
每個值是一句當天的主要目標。"#;

const GENERATE_SCHEDULE: &str = r#"變數:
!<INPUT 0>! -- 個性摘要
!<INPUT 1>! -- 日期
!<INPUT 2>! -- 今日目標
<commentblockmarker>###</commentblockmarker>
個性：!<INPUT 0>!
日期：!<INPUT 1>!，今日目標：!<INPUT 2>!
請列出起床後一天的活動安排，輸出一個列表，每個子列表為 [活動名稱, 持續分鐘數]，
總時數不超過 18 小時。"#;

const WAKE_UP_HOUR: &str = r#"變數:
!<INPUT 0>! -- 個性摘要
!<INPUT 1>! -- 日期
!<INPUT 2>! -- 今日活動列表
<commentblockmarker>###</commentblockmarker>
個性：!<INPUT 0>!
日期：!<INPUT 1>!，今日活動：!<INPUT 2>!
這位居民今天幾點起床？"#;

const PRONUNCIATIO: &str = r#"變數:
!<INPUT 0>! -- 行動描述
<commentblockmarker>###</commentblockmarker>
請為「!<INPUT 0>!」這個行動選一個最貼切的 emoji。"#;

const GENERATE_ACTION_THOUGHT: &str = r#"變數:
!<INPUT 0>! -- 個性摘要
!<INPUT 1>! -- 所在地點
!<INPUT 2>! -- 新行動
<commentblockmarker>###</commentblockmarker>
個性：!<INPUT 0>!
你在 !<INPUT 1>!，正要開始「!<INPUT 2>!」。
用一句 20 字以內的話寫出此刻的內心想法。"#;

const DOUBLE_CHAT: &str = r#"變數:
!<INPUT 0>! -- 地點
!<INPUT 1>! -- 甲姓名 / !<INPUT 2>! -- 甲MBTI / !<INPUT 3>! -- 甲個性 / !<INPUT 4>! -- 甲記憶
!<INPUT 5>! -- 乙姓名 / !<INPUT 6>! -- 乙MBTI / !<INPUT 7>! -- 乙個性 / !<INPUT 8>! -- 乙記憶
!<INPUT 9>! -- 時間 / !<INPUT 10>! -- 甲行動 / !<INPUT 11>! -- 乙行動
!<INPUT 12>! -- 情境 / !<INPUT 13>! -- 最近對話
<commentblockmarker>###</commentblockmarker>
地點：!<INPUT 0>!，時間：!<INPUT 9>!。
!<INPUT 1>!（!<INPUT 2>!，!<INPUT 3>!）原本在!<INPUT 10>!，記憶片段：!<INPUT 4>!
!<INPUT 5>!（!<INPUT 6>!，!<INPUT 7>!）原本在!<INPUT 11>!，記憶片段：!<INPUT 8>!
情境：!<INPUT 12>!
最近對話：!<INPUT 13>!
請寫一段 4~8 句的自然對話，輸出包含 "thought" 與 "dialogue" 鍵的 JSON 物件，
dialogue 是 [說話者, 台詞] 的列表。"#;

const INNER_MONOLOGUE: &str = r#"變數:
!<INPUT 0>! -- 姓名 / !<INPUT 1>! -- MBTI / !<INPUT 2>! -- 個性
!<INPUT 3>! -- 地點 / !<INPUT 4>! -- 行動 / !<INPUT 5>! -- 時間
!<INPUT 6>! -- 記憶 / !<INPUT 7>! -- 情境
<commentblockmarker>###</commentblockmarker>
!<INPUT 0>!（!<INPUT 1>!，!<INPUT 2>!）現在 !<INPUT 5>! 在 !<INPUT 3>! !<INPUT 4>!。
記憶片段：!<INPUT 6>!
情境：!<INPUT 7>!
寫出這個人此刻的內心獨白，輸出包含 "thought" 與 "monologue" 鍵的 JSON 物件。"#;

const EARTHQUAKE_STEP_ACTION: &str = r#"變數:
!<INPUT 0>! -- 個性 / !<INPUT 1>! -- 生命值 / !<INPUT 2>! -- 精神狀態
!<INPUT 3>! -- 地點 / !<INPUT 4>! -- 地震強度 / !<INPUT 5>! -- 近期經歷
<commentblockmarker>###</commentblockmarker>
地震仍在持續，強度 !<INPUT 4>!。
你的個性：!<INPUT 0>!，生命值 !<INPUT 1>!，精神狀態 !<INPUT 2>!，位於 !<INPUT 3>!。
近期經歷：
!<INPUT 5>!
接下來一分鐘你會做什麼？輸出包含 "action" 和 "thought" 鍵的 JSON 物件。"#;

const GET_RECOVERY_ACTION: &str = r#"變數:
!<INPUT 0>! -- 個性 / !<INPUT 1>! -- 精神狀態 / !<INPUT 2>! -- 地點
<commentblockmarker>###</commentblockmarker>
地震剛結束。你的個性：!<INPUT 0>!，精神狀態 !<INPUT 1>!，位於 !<INPUT 2>!。
此刻最合適的恢復行動是什麼？回答一個簡短的行動短語。"#;

const SUMMARIZE_DISASTER: &str = r#"變數:
!<INPUT 0>! -- 姓名 / !<INPUT 1>! -- MBTI / !<INPUT 2>! -- 生命值 / !<INPUT 3>! -- 事件記錄
<commentblockmarker>###</commentblockmarker>
!<INPUT 0>!（!<INPUT 1>!）經歷了一場地震，目前生命值 !<INPUT 2>!。
事件記錄：
!<INPUT 3>!
用兩三句話總結這段經歷，作為第一人稱的記憶。"#;

const SUMMARIZE_CHAT: &str = r#"變數:
!<INPUT 0>! -- 對話內容 / !<INPUT 1>! -- 日期 / !<INPUT 2>! -- 姓名
<commentblockmarker>###</commentblockmarker>
以下是 !<INPUT 2>! 在 !<INPUT 1>! 的對話記錄：
!<INPUT 0>!
請以第一人稱把值得記住的部分總結成 100 字以內的記憶。"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_known_keys_resolve() {
        for key in [
            "generate_initial_memory",
            "generate_weekly_schedule",
            "generate_schedule",
            "wake_up_hour",
            "pronunciatio",
            "generate_action_thought",
            "double_chat",
            "inner_monologue",
            "earthquake_step_action",
            "get_recovery_action",
            "summarize_disaster",
            "summarize_chat",
        ] {
            assert!(template(key).is_some(), "missing template: {key}");
        }
        assert!(template("nope").is_none());
    }

    #[test]
    fn render_substitutes_and_strips_header() {
        let body = template("pronunciatio").unwrap();
        let rendered = render(body, &["睡覺".to_owned()]);
        assert!(rendered.contains("睡覺"));
        assert!(!rendered.contains("<commentblockmarker>"));
        assert!(!rendered.contains("!<INPUT"));
        assert!(!rendered.contains("行動描述"), "header must be stripped");
    }

    #[test]
    fn render_handles_repeated_placeholders() {
        let rendered = render(
            "甲：!<INPUT 0>!，再一次：!<INPUT 0>!，乙：!<INPUT 1>!",
            &["A".to_owned(), "B".to_owned()],
        );
        assert_eq!(rendered, "甲：A，再一次：A，乙：B");
    }
}
