use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use log::{debug, warn};
use serde_json::json;
use std::sync::Arc;
use thiserror::Error;

use crate::{domain::Operator, startup::AppState};

/// Operator resolved from an `Authorization: Bearer <token>` header
#[derive(Debug, Clone)]
pub struct OperatorAuth {
    pub operator: Operator,
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("missing bearer token")]
    NoAuthHeader,
    #[error("invalid authorization header")]
    InvalidHeader,
    #[error("unknown operator token")]
    UnknownToken,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": self.to_string(),
        }));
        (StatusCode::UNAUTHORIZED, body).into_response()
    }
}

fn bearer_token(parts: &Parts) -> Result<&str, AuthError> {
    let header = parts
        .headers
        .get(AUTHORIZATION)
        .ok_or(AuthError::NoAuthHeader)?;
    let value = header.to_str().map_err(|_| AuthError::InvalidHeader)?;

    value
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or(AuthError::InvalidHeader)
}

impl FromRequestParts<Arc<AppState>> for OperatorAuth {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)?;

        match state.identity.resolve(token).await {
            Some(operator) => {
                debug!("{} {} by {}", parts.method, parts.uri.path(), operator.name);
                Ok(OperatorAuth { operator })
            }
            None => {
                warn!("rejected operator token on {}", parts.uri.path());
                Err(AuthError::UnknownToken)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts(header: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/api/v1/settings");
        if let Some(value) = header {
            builder = builder.header(AUTHORIZATION, value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn test_bearer_token_parsing() {
        assert_eq!(bearer_token(&parts(Some("Bearer abc123"))).unwrap(), "abc123");
        assert!(matches!(
            bearer_token(&parts(None)),
            Err(AuthError::NoAuthHeader)
        ));
        assert!(matches!(
            bearer_token(&parts(Some("Basic abc123"))),
            Err(AuthError::InvalidHeader)
        ));
        assert!(matches!(
            bearer_token(&parts(Some("Bearer  "))),
            Err(AuthError::InvalidHeader)
        ));
    }
}
