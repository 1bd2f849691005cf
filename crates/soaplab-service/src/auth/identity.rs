use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::models::Identity;

#[derive(Error, Debug)]
pub enum IdentityError {
    #[error("Credential was rejected")]
    Rejected,
    #[error("Identity service error: {0}")]
    Unavailable(String),
}

/// Turns a bearer credential into the identity it belongs to.
#[async_trait]
pub trait IdentityResolver: Clone + Send + Sync + 'static {
    async fn resolve_identity(&self, credential: &str) -> Result<Identity, IdentityError>;
}

/// Resolves access tokens against Supabase Auth (`GET /auth/v1/user`).
#[derive(Clone)]
pub struct SupabaseIdentityResolver {
    client: Client,
    user_endpoint: String,
    anon_key: String,
}

#[derive(Debug, Deserialize)]
struct SupabaseUser {
    id: Uuid,
    email: Option<String>,
}

impl SupabaseIdentityResolver {
    pub fn new(project_url: &str, anon_key: impl Into<String>) -> Self {
        Self::with_client(Client::new(), project_url, anon_key)
    }

    pub fn with_client(client: Client, project_url: &str, anon_key: impl Into<String>) -> Self {
        Self {
            client,
            user_endpoint: format!("{}/auth/v1/user", project_url.trim_end_matches('/')),
            anon_key: anon_key.into(),
        }
    }
}

#[async_trait]
impl IdentityResolver for SupabaseIdentityResolver {
    #[instrument(skip_all)]
    async fn resolve_identity(&self, credential: &str) -> Result<Identity, IdentityError> {
        let response = self
            .client
            .get(&self.user_endpoint)
            .bearer_auth(credential)
            .header("apikey", &self.anon_key)
            .send()
            .await
            .map_err(|err| IdentityError::Unavailable(err.to_string()))?;

        match response.status() {
            status if status.is_success() => {
                let user: SupabaseUser = response
                    .json()
                    .await
                    .map_err(|err| IdentityError::Unavailable(err.to_string()))?;
                debug!(user_id = %user.id, "Resolved identity");
                Ok(Identity {
                    user_id: user.id,
                    email: user.email,
                })
            }
            StatusCode::BAD_REQUEST
            | StatusCode::UNAUTHORIZED
            | StatusCode::FORBIDDEN
            | StatusCode::NOT_FOUND => {
                debug!(status = %response.status(), "Credential rejected by auth service");
                Err(IdentityError::Rejected)
            }
            status => Err(IdentityError::Unavailable(format!(
                "auth service answered {status}"
            ))),
        }
    }
}
