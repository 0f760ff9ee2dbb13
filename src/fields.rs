use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

/// One submission's named string values. Ordered so rendering is stable.
pub type Fields = BTreeMap<String, String>;

pub const AUTH_TOKEN: &str = "auth-token";
pub const MESSAGE: &str = "message";
pub const SUBJECT: &str = "subject";
pub const TIMESTAMP: &str = "timestamp";
pub const EMAIL: &str = "email";

/// Headers carrying this prefix are folded into the request fields.
pub const HEADER_PREFIX: &str = "x-dispatch-";

/// Older clients send the token in this header.
pub const LEGACY_TOKEN_HEADER: &str = "x-auth-token";

pub const TIMESTAMP_FORMAT: &str = "%b %d, %Y %H:%M:%S UTC";

/// Overlay `primary` on top of `secondary`; `primary` wins per key.
pub fn merge(primary: &Fields, secondary: &Fields) -> Fields {
    let mut merged = secondary.clone();
    for (key, value) in primary {
        merged.insert(key.clone(), value.clone());
    }
    merged
}

pub fn lowercase_keys<I>(fields: I) -> Fields
where
    I: IntoIterator<Item = (String, String)>,
{
    fields
        .into_iter()
        .map(|(k, v)| (k.to_lowercase(), v))
        .collect()
}

/// Overwrite `timestamp` with the receipt time; clients never set it.
pub fn stamp(fields: &mut Fields, received: DateTime<Utc>) {
    fields.insert(
        TIMESTAMP.to_string(),
        received.format(TIMESTAMP_FORMAT).to_string(),
    );
}

/// Collect `X-Dispatch-*` headers as lowercased field overrides.
/// Unrelated headers are dropped.
pub fn header_overrides<I, K, V>(headers: I) -> Fields
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    let mut overrides = Fields::new();
    let mut legacy_token = None;

    for (name, value) in headers {
        let name = name.as_ref().to_lowercase();
        let value = value.as_ref();
        if let Some(field) = name.strip_prefix(HEADER_PREFIX) {
            if !field.is_empty() {
                overrides.insert(field.to_string(), value.to_string());
            }
        } else if name == LEGACY_TOKEN_HEADER && !value.is_empty() {
            legacy_token = Some(value.to_string());
        }
    }

    if let Some(token) = legacy_token {
        overrides.entry(AUTH_TOKEN.to_string()).or_insert(token);
    }
    overrides
}
