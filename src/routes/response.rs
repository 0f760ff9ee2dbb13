use rocket::http::{ContentType, Status};
use rocket::response::{self, Responder};
use rocket::serde::json::Json;
use rocket::Request;
use serde_json::json;

use super::guards::ResponseFormat;

/// Outcome of a request, rendered as JSON or `"<code> <message>"` text.
#[derive(Debug)]
pub struct ApiResponse {
    pub status: Status,
    pub message: String,
    pub format: ResponseFormat,
}

impl ApiResponse {
    pub fn success(format: ResponseFormat) -> Self {
        ApiResponse {
            status: Status::Ok,
            message: "success".to_string(),
            format,
        }
    }

    pub fn error(status: Status, message: impl Into<String>, format: ResponseFormat) -> Self {
        ApiResponse {
            status,
            message: message.into(),
            format,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == Status::Ok
    }
}

impl<'r> Responder<'r, 'static> for ApiResponse {
    fn respond_to(self, req: &'r Request<'_>) -> response::Result<'static> {
        match self.format {
            ResponseFormat::Json => {
                let body = if self.is_success() {
                    json!({"status": "success"})
                } else {
                    json!({"status": "error", "message": self.message})
                };
                (self.status, Json(body)).respond_to(req)
            }
            ResponseFormat::Text => {
                let body = format!("{} {}", self.status.code, self.message);
                (self.status, (ContentType::Plain, body)).respond_to(req)
            }
        }
    }
}
