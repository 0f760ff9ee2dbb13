use std::fmt::Write;

use crate::fields::{Fields, AUTH_TOKEN, MESSAGE, TIMESTAMP};

/// Labels are padded to this width; values start one column later.
const LABEL_WIDTH: usize = 12;
const SEPARATOR_WIDTH: usize = 59;

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("'{0}' missing from message fields")]
    MissingField(&'static str),
}

/// Render the plaintext body:
///
/// ```text
/// Timestamp:   Jan 02, 2006 15:04:05 UTC
/// Name:        Jane
/// Subject:     Hello
/// -----------------------------------------------------------
/// <message>
/// ```
///
/// Field lines skip `message`, `auth-token` and `timestamp` and follow key
/// order. An absent or empty message yields an empty body.
pub fn render(fields: &Fields) -> Result<String, RenderError> {
    let timestamp = fields
        .get(TIMESTAMP)
        .ok_or(RenderError::MissingField(TIMESTAMP))?;

    let message = match fields.get(MESSAGE) {
        Some(m) if !m.is_empty() => m,
        _ => return Ok(String::new()),
    };

    let mut body = String::new();
    push_line(&mut body, "Timestamp", timestamp);
    for (key, value) in fields {
        if matches!(key.as_str(), MESSAGE | AUTH_TOKEN | TIMESTAMP) {
            continue;
        }
        push_line(&mut body, &capitalize(key), value);
    }
    body.push_str(&"-".repeat(SEPARATOR_WIDTH));
    body.push('\n');
    body.push_str(message);
    body.push('\n');
    Ok(body)
}

fn push_line(body: &mut String, label: &str, value: &str) {
    let label = format!("{}:", label);
    let _ = writeln!(body, "{:<width$} {}", label, value, width = LABEL_WIDTH);
}

/// `first-name` -> `First-Name`
pub fn capitalize(key: &str) -> String {
    key.split('-')
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join("-")
}
