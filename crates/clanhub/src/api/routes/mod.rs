mod bingo;
mod bounties;
mod clan;
mod system;

pub use bingo::*;
pub use bounties::*;
pub use clan::*;
pub use system::*;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::borrow::Borrow;

use crate::domain::Error;

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status, error_message) = match self.borrow() {
            Error::NotFound(_) => (StatusCode::NOT_FOUND, self.to_string()),
            Error::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            Error::InvalidJson(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            Error::Unauthorized(_) => (StatusCode::UNAUTHORIZED, self.to_string()),
            _ => (
                StatusCode::INTERNAL_SERVER_ERROR,
                String::from("internal server error"),
            ),
        };
        let body = Json(json!({
            "error": error_message,
        }));
        (status, body).into_response()
    }
}
