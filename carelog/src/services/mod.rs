//! Services module
//!
//! Business logic services that sit between the UI layer and the repository.
//! Every operation takes the request's [`RequestContext`](crate::auth::RequestContext)
//! and runs its authorization and validation checks before writing anything.

pub mod clients;
pub mod goals;
pub mod logs;
pub mod schedules;
pub mod users;

pub use clients::ClientsService;
pub use goals::{CreateGoalRequest, GoalsService, UpdateGoalRequest};
pub use logs::{CreateLogRequest, GeoInput, LogsService, RevisionView, UpdateLogRequest};
pub use schedules::{CreateScheduleRequest, SchedulesService};
pub use users::UsersService;

use crate::error::{AppError, Result};

/// Trimmed value of a required text field
pub(crate) fn require_text<'a>(field: &str, value: &'a str) -> Result<&'a str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::validation(format!("{} is required", field)));
    }
    Ok(trimmed)
}

/// `None` for missing, empty or whitespace-only input, otherwise the trimmed text
pub(crate) fn blank_to_none(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|s| !s.is_empty())
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::auth::{AuthGuard, RequestContext, Role};
    use crate::database::{create_memory_pool, CreateClientRequest, CreateProfileRequest, Repository};

    pub async fn create_test_repo() -> Repository {
        Repository::new(create_memory_pool().await.unwrap())
    }

    pub fn guard(repo: &Repository) -> AuthGuard {
        AuthGuard::new(repo.clone())
    }

    pub async fn login_as(repo: &Repository, role: Role) -> RequestContext {
        let profile = repo
            .create_profile(CreateProfileRequest {
                email: format!("{}-{}@example.org", role, uuid::Uuid::new_v4()),
                role,
                full_name: Some(format!("Test {}", role)),
                phone: None,
                address: None,
            })
            .await
            .unwrap();

        RequestContext::authenticated(profile.user_id)
    }

    pub async fn add_client(repo: &Repository, guardian: Option<&RequestContext>) -> String {
        let creator = login_as(repo, Role::Staff).await;
        repo.create_client(
            creator.user_id().unwrap(),
            &CreateClientRequest {
                first_name: "Grace".to_string(),
                last_name: "Hopper".to_string(),
                guardian_id: guardian.and_then(|g| g.user_id()).map(str::to_string),
                ..Default::default()
            },
        )
        .await
        .unwrap()
        .id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require_text() {
        assert_eq!(require_text("title", "  Walk  ").unwrap(), "Walk");
        assert!(matches!(require_text("title", " \n "), Err(AppError::Validation(_))));
    }

    #[test]
    fn test_blank_to_none() {
        assert_eq!(blank_to_none(None), None);
        assert_eq!(blank_to_none(Some("   ")), None);
        assert_eq!(blank_to_none(Some(" Park ")), Some("Park"));
    }
}
