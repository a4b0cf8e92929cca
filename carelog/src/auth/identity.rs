//! Identity provider seam
//!
//! Authentication lives outside this crate. The provider only answers
//! "who is making this request", and the answer is captured once into a
//! [`RequestContext`] that is passed explicitly to every operation.

use crate::error::{AppError, Result};
use async_trait::async_trait;

/// Resolves the user behind the current request.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Returns the authenticated user's id, or `None` for anonymous requests
    async fn current_user(&self) -> Result<Option<String>>;
}

/// Provider with a fixed answer, for embedders that authenticate up front.
#[derive(Debug, Clone, Default)]
pub struct StaticIdentity {
    user_id: Option<String>,
}

impl StaticIdentity {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
        }
    }

    pub fn anonymous() -> Self {
        Self { user_id: None }
    }
}

#[async_trait]
impl IdentityProvider for StaticIdentity {
    async fn current_user(&self) -> Result<Option<String>> {
        Ok(self.user_id.clone())
    }
}

/// Identity of one request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestContext {
    user_id: Option<String>,
}

impl RequestContext {
    pub async fn resolve(provider: &dyn IdentityProvider) -> Result<Self> {
        let user_id = provider.current_user().await?;
        Ok(Self { user_id })
    }

    pub fn authenticated(user_id: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
        }
    }

    pub fn anonymous() -> Self {
        Self { user_id: None }
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    /// The user id, or `Unauthenticated` for anonymous requests
    pub fn require_user(&self) -> Result<&str> {
        self.user_id().ok_or(AppError::Unauthenticated)
    }
}
