//! Resolving bearer tokens to principals.

use super::{Principal, Role};
use crate::types::{HcpId, PatientId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use medbay_core::environment::Clock;
use sqlx::PgPool;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// Token resolution failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IdentityError {
    /// No identity is known for the token.
    #[error("unknown token")]
    Unknown,
    /// The token's session has expired.
    #[error("session expired")]
    Expired,
    /// The identity backend failed.
    #[error("identity backend failed: {0}")]
    Backend(String),
}

/// Resolves a bearer token to the caller's identity.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Resolve `token`.
    ///
    /// # Errors
    ///
    /// [`IdentityError::Unknown`] or [`IdentityError::Expired`] for rejected
    /// tokens, [`IdentityError::Backend`] when the lookup itself failed.
    async fn resolve(&self, token: &str) -> Result<Principal, IdentityError>;
}

// ============================================================================
// Static tokens
// ============================================================================

/// Fixed tokens from configuration, for development and tests.
#[derive(Debug, Clone, Default)]
pub struct StaticIdentityProvider {
    tokens: HashMap<String, Principal>,
}

impl StaticIdentityProvider {
    /// Empty provider.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a token.
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>, principal: Principal) -> Self {
        self.tokens.insert(token.into(), principal);
        self
    }

    /// Parse `token=role[:id],...`.
    ///
    /// The id is the professional id for `hcp`, the patient id for
    /// `patient`, and the account id for every other role.
    ///
    /// # Errors
    ///
    /// Describes the first malformed entry.
    pub fn parse(entries: &str) -> Result<Self, String> {
        entries.split(',')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .try_fold(Self::new(), |provider, entry| {
                let (token, grant) = entry
                    .split_once('=')
                    .ok_or_else(|| format!("'{entry}' is not token=role[:id]"))?;
                let (role, id) = match grant.split_once(':') {
                    Some((role, id)) => {
                        let id = id
                            .trim()
                            .parse::<i64>()
                            .map_err(|e| format!("'{entry}': bad id: {e}"))?;
                        (role, Some(id))
                    }
                    None => (grant, None),
                };
                let role: Role = role.parse().map_err(|e| format!("'{entry}': {e}"))?;
                Ok(provider.with_token(token.trim(), principal_for(role, id, role.as_str())))
            })
    }

    /// Number of registered tokens.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// Whether no token is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

fn principal_for(role: Role, id: Option<i64>, name: &str) -> Principal {
    Principal {
        role,
        user_id: id.filter(|_| !matches!(role, Role::Hcp | Role::Patient)),
        hcp_id: id.filter(|_| role == Role::Hcp).map(HcpId::new),
        patient_id: id.filter(|_| role == Role::Patient).map(PatientId::new),
        name: name.to_string(),
    }
}

#[async_trait]
impl IdentityProvider for StaticIdentityProvider {
    async fn resolve(&self, token: &str) -> Result<Principal, IdentityError> {
        self.tokens.get(token).cloned().ok_or(IdentityError::Unknown)
    }
}

// ============================================================================
// Session table
// ============================================================================

#[derive(sqlx::FromRow)]
struct SessionRow {
    role: String,
    user_id: Option<i64>,
    hcp_id: Option<i64>,
    patient_id: Option<i64>,
    name: String,
    expires_at: DateTime<Utc>,
}

/// Sessions issued by the login service, read from the `sessions` table.
#[derive(Clone)]
pub struct SessionDirectory {
    pool: PgPool,
    clock: Arc<dyn Clock>,
}

impl SessionDirectory {
    /// Read sessions from `pool`; expiry is judged by `clock`.
    pub fn new(pool: PgPool, clock: Arc<dyn Clock>) -> Self {
        Self { pool, clock }
    }
}

#[async_trait]
impl IdentityProvider for SessionDirectory {
    async fn resolve(&self, token: &str) -> Result<Principal, IdentityError> {
        let row: Option<SessionRow> = sqlx::query_as(
            "SELECT role, user_id, hcp_id, patient_id, name, expires_at
             FROM sessions WHERE token = $1",
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| IdentityError::Backend(e.to_string()))?;

        let row = row.ok_or(IdentityError::Unknown)?;
        if row.expires_at <= self.clock.now() {
            return Err(IdentityError::Expired);
        }

        Ok(Principal {
            role: row
                .role
                .parse()
                .map_err(|e: crate::types::UnknownVariant| IdentityError::Backend(e.to_string()))?,
            user_id: row.user_id,
            hcp_id: row.hcp_id.map(HcpId::new),
            patient_id: row.patient_id.map(PatientId::new),
            name: row.name,
        })
    }
}

// ============================================================================
// Chain
// ============================================================================

/// Tries providers in order; the first one that knows the token decides.
#[derive(Clone, Default)]
pub struct IdentityChain {
    providers: Vec<Arc<dyn IdentityProvider>>,
}

impl IdentityChain {
    /// Empty chain; resolves nothing.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a provider.
    #[must_use]
    pub fn then(mut self, provider: Arc<dyn IdentityProvider>) -> Self {
        self.providers.push(provider);
        self
    }
}

#[async_trait]
impl IdentityProvider for IdentityChain {
    async fn resolve(&self, token: &str) -> Result<Principal, IdentityError> {
        for provider in &self.providers {
            match provider.resolve(token).await {
                Err(IdentityError::Unknown) => {}
                decided => return decided,
            }
        }
        Err(IdentityError::Unknown)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn static_tokens_parse_roles_and_ids() {
        let provider = StaticIdentityProvider::parse("a1=admin, d7=hcp:7, p3=patient:3").unwrap();
        assert_eq!(provider.len(), 3);

        let doctor = provider.resolve("d7").await.unwrap();
        assert_eq!(doctor.role, Role::Hcp);
        assert_eq!(doctor.hcp_id, Some(HcpId::new(7)));
        assert_eq!(doctor.user_id, None);

        let patient = provider.resolve("p3").await.unwrap();
        assert_eq!(patient.patient_id, Some(PatientId::new(3)));

        assert_eq!(provider.resolve("nope").await, Err(IdentityError::Unknown));
    }

    #[test]
    fn malformed_static_tokens_are_rejected() {
        assert!(StaticIdentityProvider::parse("just-a-token").is_err());
        assert!(StaticIdentityProvider::parse("t=janitor").is_err());
        assert!(StaticIdentityProvider::parse("t=hcp:seven").is_err());
        assert!(StaticIdentityProvider::parse("").unwrap().is_empty());
    }

    #[tokio::test]
    async fn chain_falls_through_unknown_tokens_only() {
        let first = StaticIdentityProvider::parse("a=admin").unwrap();
        let second = StaticIdentityProvider::parse("a=patient:1,b=frontdesk").unwrap();
        let chain = IdentityChain::new()
            .then(Arc::new(first))
            .then(Arc::new(second));

        assert_eq!(chain.resolve("a").await.unwrap().role, Role::Admin);
        assert_eq!(chain.resolve("b").await.unwrap().role, Role::FrontDesk);
        assert_eq!(chain.resolve("c").await, Err(IdentityError::Unknown));
    }
}
