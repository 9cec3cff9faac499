//! Rough token estimates for context budgeting.

/// Estimate the token count of `text`.
///
/// CJK characters count one token each; everything else counts one token
/// per four bytes, rounded up.
pub fn estimate_text_tokens(text: &str) -> usize {
    let mut cjk = 0;
    let mut other_bytes = 0;
    for ch in text.chars() {
        if is_cjk(ch) {
            cjk += 1;
        } else {
            other_bytes += ch.len_utf8();
        }
    }
    cjk + other_bytes.div_ceil(4)
}

/// Estimate every string found anywhere inside a JSON value.
pub(crate) fn estimate_value_tokens(value: &serde_json::Value) -> usize {
    match value {
        serde_json::Value::String(s) => estimate_text_tokens(s),
        serde_json::Value::Array(items) => items.iter().map(estimate_value_tokens).sum(),
        serde_json::Value::Object(map) => map.values().map(estimate_value_tokens).sum(),
        _ => 0,
    }
}

fn is_cjk(ch: char) -> bool {
    matches!(ch as u32,
        0x3040..=0x30FF     // kana
        | 0x3400..=0x4DBF   // ext A
        | 0x4E00..=0x9FFF   // unified ideographs
        | 0xAC00..=0xD7AF   // hangul
        | 0xF900..=0xFAFF
        | 0xFF00..=0xFFEF)
}
