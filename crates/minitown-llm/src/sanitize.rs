//! Output sanitation applied to everything the model returns.
//!
//! Two passes, both applied recursively to every string leaf of the
//! parsed output:
//!
//! 1. Simplified -> traditional character normalization, so the engine and
//!    the front end only ever see one script. The mapping is a compact
//!    table covering the character range this simulation's prompts and
//!    labels actually produce.
//! 2. Repetition collapse: streaming models occasionally loop; any block
//!    of up to twelve characters repeated more than six times in a row is
//!    truncated to exactly six repeats.

use serde_json::Value;

/// Longest repeated block the collapse pass looks for, in characters.
const MAX_BLOCK_CHARS: usize = 12;

/// Maximum consecutive repeats kept after collapsing.
const MAX_REPEATS: usize = 6;

/// Map one simplified character to its traditional form, identity for
/// everything else.
fn to_traditional_char(c: char) -> char {
    match c {
        '学' => '學',
        '觉' => '覺',
        '饭' => '飯',
        '话' => '話',
        '说' => '說',
        '记' => '記',
        '忆' => '憶',
        '医' => '醫',
        '疗' => '療',
        '护' => '護',
        '离' => '離',
        '难' => '難',
        '灾' => '災',
        '后' => '後',
        '复' => '復',
        '济' => '濟',
        '让' => '讓',
        '们' => '們',
        '这' => '這',
        '里' => '裡',
        '来' => '來',
        '时' => '時',
        '间' => '間',
        '会' => '會',
        '对' => '對',
        '动' => '動',
        '书' => '書',
        '东' => '東',
        '买' => '買',
        '卖' => '賣',
        '乐' => '樂',
        '习' => '習',
        '乱' => '亂',
        '体' => '體',
        '儿' => '兒',
        '内' => '內',
        '准' => '準',
        '别' => '別',
        '则' => '則',
        '刚' => '剛',
        '务' => '務',
        '况' => '況',
        '冲' => '衝',
        '决' => '決',
        '发' => '發',
        '变' => '變',
        '台' => '臺',
        '叶' => '葉',
        '吓' => '嚇',
        '吗' => '嗎',
        '听' => '聽',
        '员' => '員',
        '问' => '問',
        '响' => '響',
        '园' => '園',
        '图' => '圖',
        '场' => '場',
        '坏' => '壞',
        '块' => '塊',
        '报' => '報',
        '够' => '夠',
        '头' => '頭',
        '奋' => '奮',
        '妈' => '媽',
        '实' => '實',
        '宁' => '寧',
        '帮' => '幫',
        '带' => '帶',
        '干' => '幹',
        '应' => '應',
        '开' => '開',
        '异' => '異',
        '张' => '張',
        '当' => '當',
        '总' => '總',
        '惊' => '驚',
        '愿' => '願',
        '战' => '戰',
        '抢' => '搶',
        '担' => '擔',
        '挤' => '擠',
        '损' => '損',
        '摇' => '搖',
        '据' => '據',
        '无' => '無',
        '显' => '顯',
        '晚' => '晚',
        '暂' => '暫',
        '条' => '條',
        '检' => '檢',
        '楼' => '樓',
        '欢' => '歡',
        '气' => '氣',
        '汇' => '匯',
        '没' => '沒',
        '浅' => '淺',
        '测' => '測',
        '满' => '滿',
        '灭' => '滅',
        '点' => '點',
        '烦' => '煩',
        '状' => '狀',
        '独' => '獨',
        '现' => '現',
        '环' => '環',
        '电' => '電',
        '着' => '著',
        '确' => '確',
        '种' => '種',
        '稳' => '穩',
        '紧' => '緊',
        '终' => '終',
        '经' => '經',
        '继' => '繼',
        '续' => '續',
        '维' => '維',
        '网' => '網',
        '肃' => '肅',
        '脏' => '髒',
        '虑' => '慮',
        '处' => '處',
        '见' => '見',
        '观' => '觀',
        '计' => '計',
        '认' => '認',
        '议' => '議',
        '训' => '訓',
        '识' => '識',
        '诉' => '訴',
        '评' => '評',
        '试' => '試',
        '询' => '詢',
        '该' => '該',
        '语' => '語',
        '调' => '調',
        '谈' => '談',
        '请' => '請',
        '赶' => '趕',
        '车' => '車',
        '转' => '轉',
        '轻' => '輕',
        '边' => '邊',
        '过' => '過',
        '运' => '運',
        '还' => '還',
        '进' => '進',
        '远' => '遠',
        '连' => '連',
        '铁' => '鐵',
        '门' => '門',
        '闹' => '鬧',
        '队' => '隊',
        '阳' => '陽',
        '险' => '險',
        '随' => '隨',
        '静' => '靜',
        '顾' => '顧',
        '顺' => '順',
        '题' => '題',
        '风' => '風',
        '饿' => '餓',
        '马' => '馬',
        '惧' => '懼',
        '梦' => '夢',
        other => other,
    }
}

/// Convert every simplified character in the string to traditional.
pub fn to_traditional(text: &str) -> String {
    text.chars().map(to_traditional_char).collect()
}

/// Collapse pathological repetition loops.
///
/// If any block of `<= 12` characters repeats more than six times
/// consecutively, keep exactly six repeats. Smaller blocks are collapsed
/// first so `"ababab..."` folds on the two-character block rather than a
/// longer window that happens to align.
pub fn collapse_repetition(text: &str) -> String {
    let mut chars: Vec<char> = text.chars().collect();
    for block_len in 1..=MAX_BLOCK_CHARS {
        chars = collapse_block_len(&chars, block_len);
    }
    chars.into_iter().collect()
}

/// Collapse runs of one specific block length.
fn collapse_block_len(chars: &[char], len: usize) -> Vec<char> {
    let mut out = Vec::with_capacity(chars.len());
    let mut i = 0;
    while i < chars.len() {
        if i + len <= chars.len() {
            let block = &chars[i..i + len];
            let mut count = 1;
            while i + (count + 1) * len <= chars.len()
                && chars[i + count * len..i + (count + 1) * len] == *block
            {
                count += 1;
            }
            if count > MAX_REPEATS {
                for _ in 0..MAX_REPEATS {
                    out.extend_from_slice(block);
                }
                i += count * len;
                continue;
            }
        }
        out.push(chars[i]);
        i += 1;
    }
    out
}

/// Apply both passes to one string.
pub fn sanitize_str(text: &str) -> String {
    collapse_repetition(&to_traditional(text))
}

/// Apply both passes recursively to every string leaf of a JSON value.
pub fn sanitize_value(value: &mut Value) {
    match value {
        Value::String(s) => {
            *s = sanitize_str(s);
        }
        Value::Array(items) => {
            for item in items {
                sanitize_value(item);
            }
        }
        Value::Object(map) => {
            for (_, v) in map.iter_mut() {
                sanitize_value(v);
            }
        }
        _ => {}
    }
}
