use std::time::Instant;

use rocket::fairing::{Fairing, Info, Kind};
use rocket::{Data, Request, Response};

use crate::routes::guards::client_ip;

/// One line per request: `<ip> - <METHOD> <path> <status> <latency>`.
pub struct AccessLog;

struct RequestStart(Option<Instant>);

#[rocket::async_trait]
impl Fairing for AccessLog {
    fn info(&self) -> Info {
        Info {
            name: "Access Log",
            kind: Kind::Request | Kind::Response,
        }
    }

    async fn on_request(&self, request: &mut Request<'_>, _data: &mut Data<'_>) {
        request.local_cache(|| RequestStart(Some(Instant::now())));
    }

    async fn on_response<'r>(&self, request: &'r Request<'_>, response: &mut Response<'r>) {
        let latency = request
            .local_cache(|| RequestStart(None))
            .0
            .map(|start| start.elapsed());

        log::info!(
            "{} - {} {} {} {:?}",
            client_ip(request),
            request.method(),
            request.uri().path(),
            response.status().code,
            latency.unwrap_or_default()
        );
    }
}
