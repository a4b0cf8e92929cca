//! Authorization guard
//!
//! Role checks backed by the profiles table. Nothing is cached: every call
//! reads the role again.

use super::{Principal, Role};
use crate::auth::RequestContext;
use crate::database::Repository;
use crate::error::{AppError, Result};

#[derive(Clone)]
pub struct AuthGuard {
    repo: Repository,
}

impl AuthGuard {
    pub fn new(repo: Repository) -> Self {
        Self { repo }
    }

    /// Current role of the requester, `None` when anonymous or without a profile
    pub async fn current_role(&self, ctx: &RequestContext) -> Result<Option<Role>> {
        match ctx.user_id() {
            Some(user_id) => self.repo.get_role(user_id).await,
            None => Ok(None),
        }
    }

    /// Require exactly `required`
    pub async fn require_role(&self, ctx: &RequestContext, required: Role) -> Result<Principal> {
        self.check(ctx, |role| role == required, || format!("{} role required", required))
            .await
    }

    /// Require one of `roles`
    pub async fn require_any_role(&self, ctx: &RequestContext, roles: &[Role]) -> Result<Principal> {
        self.check(
            ctx,
            |role| roles.contains(&role),
            || {
                let names: Vec<&str> = roles.iter().map(|r| r.as_str()).collect();
                format!("one of [{}] roles required", names.join(", "))
            },
        )
        .await
    }

    /// Require a role ranked at least `minimum`
    pub async fn require_minimum_role(&self, ctx: &RequestContext, minimum: Role) -> Result<Principal> {
        self.check(
            ctx,
            |role| role.at_least(minimum),
            || format!("minimum {} role required", minimum),
        )
        .await
    }

    async fn check(
        &self,
        ctx: &RequestContext,
        allowed: impl Fn(Role) -> bool,
        describe: impl Fn() -> String,
    ) -> Result<Principal> {
        let role = self.current_role(ctx).await?;

        match (ctx.user_id(), role) {
            (Some(id), Some(role)) if allowed(role) => Ok(Principal {
                id: id.to_string(),
                role,
            }),
            (user, role) => {
                tracing::warn!(
                    "Rejected request from {:?} with role {:?}: {}",
                    user,
                    role,
                    describe()
                );
                Err(AppError::Unauthorized(describe()))
            }
        }
    }
}
