//! Credential redaction applied before anything reaches the event log or
//! an oracle query.

use std::borrow::Cow;

use serde_json::Value;

pub const REDACTED: &str = "[REDACTED]";
const REDACTED_PEM: &str = "[REDACTED-PEM]";

/// Vendor key prefixes. The token must start at a word boundary and carry
/// at least `MIN_TOKEN_TAIL` characters after the prefix.
const KEY_PREFIXES: &[&str] = &[
    "sk-", "sk_live_", "rk_live_", "xoxb-", "xoxp-", "xoxa-", "xapp-", "ghp_", "gho_", "ghu_",
    "ghs_", "github_pat_", "glpat-", "hf_", "ya29.", "AIza", "AKIA", "ASIA", "GOCSPX-",
    "AGE-SECRET-KEY-", "eyJ",
];

/// Markers whose following value is a secret. Matched case-insensitively;
/// the marker itself is kept.
const VALUE_MARKERS: &[&str] = &[
    "bearer ",
    "authorization: basic ",
    "api_key=",
    "apikey=",
    "access_token=",
    "refresh_token=",
    "id_token=",
    "client_secret=",
    "password=",
    "passwd=",
    "secret=",
    "token=",
    "\"api_key\":\"",
    "\"access_token\":\"",
    "\"refresh_token\":\"",
    "\"token\":\"",
    "\"secret\":\"",
    "\"password\":\"",
    "\"private_key\":\"",
    "\"client_secret\":\"",
];

const MIN_TOKEN_TAIL: usize = 8;

fn is_token_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '+' | '/' | '=' | ':')
}

fn token_end(input: &str, from: usize) -> usize {
    input[from..]
        .char_indices()
        .find(|(_, c)| !is_token_char(*c))
        .map_or(input.len(), |(i, _)| from + i)
}

fn redact_prefixed(text: &mut String, prefix: &str) -> bool {
    let mut modified = false;
    let mut from = 0;
    while let Some(rel) = text[from..].find(prefix) {
        let start = from + rel;
        let at_boundary = text[..start]
            .chars()
            .next_back()
            .is_none_or(|c| !c.is_ascii_alphanumeric() && c != '_' && c != '-');
        let end = token_end(text, start + prefix.len());
        if at_boundary && end - (start + prefix.len()) >= MIN_TOKEN_TAIL {
            text.replace_range(start..end, REDACTED);
            modified = true;
            from = start + REDACTED.len();
        } else {
            from = start + prefix.len();
        }
    }
    modified
}

fn redact_after_marker(text: &mut String, marker: &str) -> bool {
    let mut modified = false;
    let mut from = 0;
    loop {
        let lower = text[from..].to_ascii_lowercase();
        let Some(rel) = lower.find(marker) else {
            break;
        };
        let value_start = from + rel + marker.len();
        let end = token_end(text, value_start);
        if end == value_start || text[value_start..end] == *REDACTED {
            from = value_start;
            continue;
        }
        text.replace_range(value_start..end, REDACTED);
        modified = true;
        from = value_start + REDACTED.len();
    }
    modified
}

fn redact_pem_blocks(text: &mut String) -> bool {
    const BEGIN: &str = "-----BEGIN ";
    let mut modified = false;
    let mut from = 0;
    while let Some(rel) = text[from..].find(BEGIN) {
        let begin = from + rel;
        let label_start = begin + BEGIN.len();
        let Some(label_len) = text[label_start..].find("-----") else {
            break;
        };
        let label = text[label_start..label_start + label_len].to_string();
        let end_marker = format!("-----END {label}-----");
        let Some(end_rel) = text[label_start..].find(&end_marker) else {
            from = label_start;
            continue;
        };
        let end = label_start + end_rel + end_marker.len();
        text.replace_range(begin..end, REDACTED_PEM);
        modified = true;
        from = begin + REDACTED_PEM.len();
    }
    modified
}

/// Replace credential-shaped substrings. Borrows when nothing matched.
pub fn redact(input: &str) -> Cow<'_, str> {
    let mut text = input.to_string();
    let mut modified = redact_pem_blocks(&mut text);
    for marker in VALUE_MARKERS {
        modified |= redact_after_marker(&mut text, marker);
    }
    for prefix in KEY_PREFIXES {
        modified |= redact_prefixed(&mut text, prefix);
    }
    if modified {
        Cow::Owned(text)
    } else {
        Cow::Borrowed(input)
    }
}

/// Redact every string inside a JSON value, keys included.
pub fn redact_value(value: &mut Value) {
    match value {
        Value::String(s) => {
            if let Cow::Owned(clean) = redact(s) {
                *s = clean;
            }
        }
        Value::Array(items) => items.iter_mut().for_each(redact_value),
        Value::Object(map) => {
            let entries = std::mem::take(map);
            for (key, mut inner) in entries {
                redact_value(&mut inner);
                map.insert(redact(&key).into_owned(), inner);
            }
        }
        _ => {}
    }
}

/// Cut to at most `max` characters on a char boundary, marking the cut.
pub fn truncate_chars(input: &str, max: usize) -> Cow<'_, str> {
    match input.char_indices().nth(max) {
        None => Cow::Borrowed(input),
        Some((cut, _)) => Cow::Owned(format!("{}…", &input[..cut])),
    }
}
