//! Users service
//!
//! Account administration on top of the profiles table. The coarse role
//! gate is followed by record-level checks: staff manage only user and
//! guardian accounts, and only admins touch roles.

use super::require_text;
use crate::auth::{AuthGuard, RequestContext, Role};
use crate::database::{CreateProfileRequest, Profile, ProfileUpdate, Repository};
use crate::error::{AppError, Result};

/// Service for managing accounts and roles
#[derive(Clone)]
pub struct UsersService {
    repo: Repository,
    guard: AuthGuard,
}

impl UsersService {
    pub fn new(repo: Repository, guard: AuthGuard) -> Self {
        Self { repo, guard }
    }

    /// Profile of the requester
    pub async fn current_profile(&self, ctx: &RequestContext) -> Result<Profile> {
        let user_id = ctx.require_user()?;
        self.repo.get_profile(user_id).await
    }

    /// Every account, newest first
    pub async fn list_profiles(&self, ctx: &RequestContext) -> Result<Vec<Profile>> {
        self.guard.require_role(ctx, Role::Admin).await?;
        self.repo.list_profiles().await
    }

    /// Accounts staff may manage
    pub async fn list_users_and_guardians(&self, ctx: &RequestContext) -> Result<Vec<Profile>> {
        self.guard.require_minimum_role(ctx, Role::Staff).await?;
        self.repo
            .list_profiles_with_roles(&[Role::User, Role::Guardian])
            .await
    }

    /// Create an account. Staff may only create user and guardian accounts.
    pub async fn create_user(&self, ctx: &RequestContext, req: CreateProfileRequest) -> Result<Profile> {
        let principal = self.guard.require_minimum_role(ctx, Role::Staff).await?;

        if !req.role.is_bottom_tier() && !principal.is_admin() {
            return Err(AppError::Unauthorized(format!(
                "only admins may create {} accounts",
                req.role
            )));
        }

        let email = validate_email(&req.email)?.to_string();

        tracing::info!("{} creating {} account for {}", principal.id, req.role, email);

        let profile = self
            .repo
            .create_profile(CreateProfileRequest { email, ..req })
            .await?;

        tracing::info!("Account created: {}", profile.user_id);
        Ok(profile)
    }

    /// Edit contact details. Staff may only edit user and guardian profiles.
    pub async fn update_profile(
        &self,
        ctx: &RequestContext,
        user_id: &str,
        update: ProfileUpdate,
    ) -> Result<Profile> {
        let principal = self.guard.require_minimum_role(ctx, Role::Staff).await?;
        let target = self.repo.get_profile(user_id).await?;

        if !principal.is_admin() && !target.role.is_bottom_tier() {
            return Err(AppError::Unauthorized(format!(
                "staff may not edit {} profiles",
                target.role
            )));
        }

        self.repo.update_profile(user_id, &update).await
    }

    /// Change another account's role
    pub async fn change_role(&self, ctx: &RequestContext, user_id: &str, role: Role) -> Result<Profile> {
        let principal = self.guard.require_role(ctx, Role::Admin).await?;

        tracing::info!("{} changing role of {} to {}", principal.id, user_id, role);

        self.repo.set_role(user_id, role).await
    }

    /// Remove an account. Clients linked to it keep existing.
    pub async fn delete_user(&self, ctx: &RequestContext, user_id: &str) -> Result<()> {
        let principal = self.guard.require_role(ctx, Role::Admin).await?;

        if principal.id == user_id {
            return Err(AppError::validation("admins cannot delete their own account"));
        }

        tracing::info!("{} deleting account {}", principal.id, user_id);

        self.repo.delete_profile(user_id).await
    }

    /// Provision the first admin of an empty installation
    pub async fn bootstrap_admin(&self, email: &str, full_name: Option<String>) -> Result<Profile> {
        let email = validate_email(email)?;

        if !self.repo.list_profiles_with_roles(&[Role::Admin]).await?.is_empty() {
            return Err(AppError::Conflict("an admin account already exists".to_string()));
        }

        tracing::info!("Bootstrapping admin account {}", email);

        self.repo
            .create_profile(CreateProfileRequest {
                email: email.to_string(),
                role: Role::Admin,
                full_name,
                phone: None,
                address: None,
            })
            .await
    }
}

fn validate_email(email: &str) -> Result<&str> {
    let email = require_text("email", email)?;
    if !email.contains('@') {
        return Err(AppError::validation(format!("'{}' is not an email address", email)));
    }
    Ok(email)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::test_support::{create_test_repo, guard, login_as};

    async fn create_test_service() -> (UsersService, Repository) {
        let repo = create_test_repo().await;
        (UsersService::new(repo.clone(), guard(&repo)), repo)
    }

    fn account(email: &str, role: Role) -> CreateProfileRequest {
        CreateProfileRequest {
            email: email.to_string(),
            role,
            full_name: None,
            phone: None,
            address: None,
        }
    }

    #[tokio::test]
    async fn test_staff_cannot_promote_to_admin() {
        let (service, repo) = create_test_service().await;
        let staff = login_as(&repo, Role::Staff).await;
        let admin = login_as(&repo, Role::Admin).await;
        let target = login_as(&repo, Role::Staff).await;
        let target_id = target.user_id().unwrap();

        let denied = service.change_role(&staff, target_id, Role::Admin).await;
        assert!(matches!(denied, Err(AppError::Unauthorized(_))));
        assert_eq!(repo.get_role(target_id).await.unwrap(), Some(Role::Staff));

        let promoted = service.change_role(&admin, target_id, Role::Admin).await.unwrap();
        assert_eq!(promoted.role, Role::Admin);
    }

    #[tokio::test]
    async fn test_create_user_respects_rank() {
        let (service, repo) = create_test_service().await;
        let staff = login_as(&repo, Role::Staff).await;
        let admin = login_as(&repo, Role::Admin).await;

        let guardian = service
            .create_user(&staff, account(" parent@example.org ", Role::Guardian))
            .await
            .unwrap();
        assert_eq!(guardian.email, "parent@example.org");

        for role in [Role::Staff, Role::Admin] {
            let result = service
                .create_user(&staff, account(&format!("new-{}@example.org", role), role))
                .await;
            assert!(matches!(result, Err(AppError::Unauthorized(_))));
        }

        let new_admin = service
            .create_user(&admin, account("boss@example.org", Role::Admin))
            .await
            .unwrap();
        assert_eq!(new_admin.role, Role::Admin);

        let guest = login_as(&repo, Role::User).await;
        assert!(service
            .create_user(&guest, account("x@example.org", Role::User))
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_create_user_validates_email() {
        let (service, repo) = create_test_service().await;
        let staff = login_as(&repo, Role::Staff).await;

        let result = service.create_user(&staff, account("not-an-email", Role::User)).await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_staff_edits_only_bottom_tier_profiles() {
        let (service, repo) = create_test_service().await;
        let staff = login_as(&repo, Role::Staff).await;
        let admin = login_as(&repo, Role::Admin).await;
        let user = login_as(&repo, Role::User).await;
        let other_staff = login_as(&repo, Role::Staff).await;

        let update = ProfileUpdate {
            full_name: Some("Renamed".to_string()),
            ..Default::default()
        };

        let edited = service
            .update_profile(&staff, user.user_id().unwrap(), update.clone())
            .await
            .unwrap();
        assert_eq!(edited.full_name.as_deref(), Some("Renamed"));

        for target in [&other_staff, &admin] {
            let result = service
                .update_profile(&staff, target.user_id().unwrap(), update.clone())
                .await;
            assert!(matches!(result, Err(AppError::Unauthorized(_))));
        }

        assert!(service
            .update_profile(&admin, other_staff.user_id().unwrap(), update)
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_listing_is_role_gated() {
        let (service, repo) = create_test_service().await;
        let staff = login_as(&repo, Role::Staff).await;
        let admin = login_as(&repo, Role::Admin).await;
        login_as(&repo, Role::Guardian).await;
        login_as(&repo, Role::User).await;

        assert!(service.list_profiles(&staff).await.is_err());
        assert_eq!(service.list_profiles(&admin).await.unwrap().len(), 4);
        assert_eq!(service.list_users_and_guardians(&staff).await.unwrap().len(), 2);
        assert!(service
            .list_users_and_guardians(&RequestContext::anonymous())
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_delete_user_admin_only() {
        let (service, repo) = create_test_service().await;
        let staff = login_as(&repo, Role::Staff).await;
        let admin = login_as(&repo, Role::Admin).await;
        let user = login_as(&repo, Role::User).await;
        let user_id = user.user_id().unwrap();

        assert!(service.delete_user(&staff, user_id).await.is_err());
        assert!(service
            .delete_user(&admin, admin.user_id().unwrap())
            .await
            .is_err());

        service.delete_user(&admin, user_id).await.unwrap();
        assert!(service.current_profile(&user).await.is_err());
    }

    #[tokio::test]
    async fn test_bootstrap_admin_only_once() {
        let (service, _repo) = create_test_service().await;

        let admin = service
            .bootstrap_admin("root@example.org", Some("Root".to_string()))
            .await
            .unwrap();
        assert_eq!(admin.role, Role::Admin);

        let again = service.bootstrap_admin("other@example.org", None).await;
        assert!(matches!(again, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_current_profile_requires_login() {
        let (service, repo) = create_test_service().await;
        let guardian = login_as(&repo, Role::Guardian).await;

        assert_eq!(service.current_profile(&guardian).await.unwrap().role, Role::Guardian);
        assert!(matches!(
            service.current_profile(&RequestContext::anonymous()).await,
            Err(AppError::Unauthenticated)
        ));
    }
}
