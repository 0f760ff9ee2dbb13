#[macro_use]
extern crate rocket;

use std::sync::Arc;

use clap::Parser;
use rocket::figment::Figment;
use rocket::http::Status;
use rocket::{Build, Request, Rocket};

mod access_log;
mod address;
mod boot;
mod config;
mod dispatch;
mod email;
mod fields;
mod rate_limit;
mod render;
mod routes;
mod targets;
mod tasks;


use config::{Cli, Settings};
use dispatch::Dispatch;
use rate_limit::{RateLimit, Throttle};
use routes::guards::ResponseFormat;
use routes::response::ApiResponse;

#[catch(400)]
fn bad_request(req: &Request) -> ApiResponse {
    ApiResponse::error(Status::BadRequest, "bad request", ResponseFormat::of(req))
}

#[catch(404)]
fn not_found(req: &Request) -> ApiResponse {
    ApiResponse::error(Status::NotFound, "page not found", ResponseFormat::of(req))
}

#[catch(429)]
fn too_many_requests(req: &Request) -> ApiResponse {
    ApiResponse::error(
        Status::TooManyRequests,
        "You have reached maximum request limit.",
        ResponseFormat::of(req),
    )
}

#[catch(500)]
fn server_error(req: &Request) -> ApiResponse {
    ApiResponse::error(
        Status::InternalServerError,
        "internal server error",
        ResponseFormat::of(req),
    )
}

/// Assemble the server around an already-built dispatch.
pub fn app(figment: Figment, dispatch: Dispatch, rate: RateLimit) -> Rocket<Build> {
    rocket::custom(figment)
        .manage(dispatch)
        .manage(Arc::new(Throttle::new(rate)))
        .attach(access_log::AccessLog)
        .attach(tasks::BackgroundTasks)
        .mount("/", routes::api::routes())
        .register("/", catchers![bad_request, not_found, too_many_requests, server_error])
}

#[launch]
fn rocket() -> _ {
    let cli = Cli::parse();
    let settings = match Settings::resolve(&cli) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    };

    // Boot: logging, targets, relay. Exits on failure or in --check mode.
    let dispatch = boot::run(&settings);

    let figment = rocket::Config::figment()
        .merge(("address", settings.address))
        .merge(("port", settings.port))
        .merge(("ident", "dispatch"));

    app(figment, dispatch, settings.rate_limit)
}
