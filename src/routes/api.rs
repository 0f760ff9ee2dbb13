use std::collections::BTreeMap;

use chrono::Utc;
use rocket::data::{Data, ToByteUnit};
use rocket::http::{ContentType, Status};
use rocket::State;

use super::guards::{Admitted, ClientIp, HeaderFields, ResponseFormat};
use super::response::ApiResponse;
use crate::address;
use crate::dispatch::{Dispatch, DispatchError};
use crate::fields::{self, AUTH_TOKEN, EMAIL};

/// Largest accepted submission, in KiB.
const BODY_LIMIT_KIB: u64 = 64;

// ── Message submission ─────────────────────────────────

#[post("/send", data = "<body>")]
pub async fn send(
    _admitted: Admitted,
    dispatch: &State<Dispatch>,
    client_ip: ClientIp,
    overrides: HeaderFields,
    format: ResponseFormat,
    content_type: Option<&ContentType>,
    body: Data<'_>,
) -> ApiResponse {
    let received = Utc::now();
    let bad_request = |message: String| ApiResponse::error(Status::BadRequest, message, format);

    let bytes = match body.open(BODY_LIMIT_KIB.kibibytes()).into_bytes().await {
        Ok(b) if !b.is_complete() => {
            return bad_request("message format: request body too large".to_string())
        }
        Ok(b) => b.into_inner(),
        Err(e) => return bad_request(format!("message format: {}", e)),
    };
    if bytes.is_empty() {
        return bad_request("request body missing".to_string());
    }

    let submitted = match decode_body(&bytes, content_type) {
        Ok(map) => map,
        Err(e) => return bad_request(format!("message format: {}", e)),
    };

    // Body, then header overrides, then the server-side timestamp.
    let mut request = fields::lowercase_keys(submitted);
    request.extend(overrides.0);
    fields::stamp(&mut request, received);

    if !request.contains_key(AUTH_TOKEN) {
        return bad_request(format!("'{}' missing", AUTH_TOKEN));
    }

    match request.get(EMAIL).map(|e| e.trim().to_string()) {
        Some(email) if email.is_empty() => {
            request.remove(EMAIL);
        }
        Some(email) => match address::format_address(&email) {
            Ok(formatted) => {
                request.insert(EMAIL.to_string(), formatted);
            }
            Err(_) => return bad_request("email address is not valid".to_string()),
        },
        None => {}
    }

    match dispatch.send(&request).await {
        Ok(()) => ApiResponse::success(format),
        Err(e) => {
            match &e {
                DispatchError::AuthNotRecognized => {
                    log::debug!("unrecognized auth-token from {}", client_ip.0)
                }
                other => log::error!("dispatch from {} failed: {}", client_ip.0, other),
            }
            bad_request(e.to_string())
        }
    }
}

/// Form bodies decode as `key=value` pairs; anything else must be a JSON
/// object of strings. Keys come back sorted, so when two keys differ only
/// in case the lowercase spelling is folded last and wins.
pub fn decode_body(
    bytes: &[u8],
    content_type: Option<&ContentType>,
) -> Result<BTreeMap<String, String>, String> {
    if content_type.map(|ct| ct.is_form()).unwrap_or(false) {
        return Ok(url::form_urlencoded::parse(bytes).into_owned().collect());
    }
    serde_json::from_slice(bytes).map_err(|e| e.to_string())
}

pub fn routes() -> Vec<rocket::Route> {
    routes![send]
}
