use log::{debug, error, info};
use serde::Serialize;

use super::{parse_token_hash, verify_token};
use crate::config::AuthSettings;

/// An authenticated administrator
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Operator {
    pub name: String,
}

/// Resolves bearer tokens to operators
#[async_trait::async_trait]
pub trait Identity: Send + Sync {
    async fn resolve(&self, token: &str) -> Option<Operator>;
}

#[derive(Debug, Clone)]
struct OperatorEntry {
    name: String,
    token_hash: String,
}

/// Operators configured in `auth_settings`, tokens are stored as Argon2 hashes
#[derive(Debug, Clone, Default)]
pub struct OperatorDirectory {
    operators: Vec<OperatorEntry>,
}

impl OperatorDirectory {
    pub fn new(settings: &AuthSettings) -> Self {
        let operators: Vec<OperatorEntry> = settings
            .operators
            .iter()
            .filter(|operator| match parse_token_hash(&operator.token_hash) {
                Ok(_) => true,
                Err(e) => {
                    error!("skipping operator {}: {}", operator.name, e);
                    false
                }
            })
            .map(|operator| OperatorEntry {
                name: operator.name.clone(),
                token_hash: operator.token_hash.clone(),
            })
            .collect();

        info!("{} operator(s) configured", operators.len());
        Self { operators }
    }
}

#[async_trait::async_trait]
impl Identity for OperatorDirectory {
    async fn resolve(&self, token: &str) -> Option<Operator> {
        if token.is_empty() {
            return None;
        }
        let operators = self.operators.clone();
        let token = token.to_string();

        // argon2 verification is cpu heavy, keep it off the async workers
        let found = tokio::task::spawn_blocking(move || {
            operators
                .into_iter()
                .find(|entry| verify_token(&token, &entry.token_hash).unwrap_or(false))
                .map(|entry| Operator { name: entry.name })
        })
        .await
        .unwrap_or_else(|e| {
            error!("token verification task failed: {}", e);
            None
        });

        if found.is_none() {
            debug!("bearer token did not match any operator");
        }
        found
    }
}
