use rocket::http::Status;
use rocket::request::{FromRequest, Outcome};
use rocket::Request;
use std::sync::Arc;

use crate::fields::{self, Fields};
use crate::rate_limit::Throttle;

/// Client address: first `X-Forwarded-For` hop, else the socket peer.
pub struct ClientIp(pub String);

pub fn client_ip(request: &Request<'_>) -> String {
    // X-Forwarded-For: client, proxy1, proxy2; the leftmost entry is the client
    if let Some(forwarded) = request.headers().get_one("X-Forwarded-For") {
        if let Some(ip) = forwarded.split(',').next() {
            let ip = ip.trim();
            if !ip.is_empty() {
                return ip.to_string();
            }
        }
    }

    request
        .remote()
        .map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for ClientIp {
    type Error = ();

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        Outcome::Success(ClientIp(client_ip(request)))
    }
}

/// Passes only while the client is under the configured send rate.
/// Fails with 429 before the body is read.
pub struct Admitted;

#[rocket::async_trait]
impl<'r> FromRequest<'r> for Admitted {
    type Error = ();

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let throttle = match request.rocket().state::<Arc<Throttle>>() {
            Some(t) => t,
            None => return Outcome::Success(Admitted),
        };

        let ip = client_ip(request);
        if throttle.admit(&ip) {
            Outcome::Success(Admitted)
        } else {
            log::info!("rate limit reached for {} ({})", ip, throttle.rate);
            Outcome::Error((Status::TooManyRequests, ()))
        }
    }
}

/// `X-Dispatch-*` (and `X-Auth-Token`) headers as field overrides.
pub struct HeaderFields(pub Fields);

#[rocket::async_trait]
impl<'r> FromRequest<'r> for HeaderFields {
    type Error = ();

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let headers = request
            .headers()
            .iter()
            .map(|h| (h.name().as_str().to_string(), h.value().to_string()));
        Outcome::Success(HeaderFields(fields::header_overrides(headers)))
    }
}

/// JSON when the client sent JSON or prefers it back, plain text otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseFormat {
    Json,
    Text,
}

impl ResponseFormat {
    pub fn of(request: &Request<'_>) -> Self {
        let sent_json = request.content_type().map(|ct| ct.is_json()).unwrap_or(false);
        let wants_json = request
            .accept()
            .map(|accept| accept.preferred().media_type().is_json())
            .unwrap_or(false);

        if sent_json || wants_json {
            ResponseFormat::Json
        } else {
            ResponseFormat::Text
        }
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for ResponseFormat {
    type Error = ();

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        Outcome::Success(ResponseFormat::of(request))
    }
}
