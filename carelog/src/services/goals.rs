//! Goals service
//!
//! Client goals with ordered subgoals. A goal whose target date has passed
//! without being completed must carry a reason from the fixed not-met list.

use super::clients::ensure_client_visible;
use super::{blank_to_none, require_text};
use crate::auth::{AuthGuard, RequestContext, Role};
use crate::config::MAX_INITIAL_SUBGOALS;
use crate::database::{
    is_overdue, Goal, GoalDomain, GoalFields, GoalStatus, GoalWithSubgoals, NotMetReason,
    Repository, Subgoal,
};
use crate::error::{AppError, Result};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;

/// Create goal request
#[derive(Debug, Clone, Deserialize)]
pub struct CreateGoalRequest {
    pub client_id: String,
    pub title: String,
    /// One of the fixed domain labels
    pub domain: String,
    /// `in_progress` when omitted
    pub status: Option<String>,
    pub target_date: NaiveDate,
    pub not_met_reason: Option<String>,
    #[serde(default)]
    pub subgoals: Vec<String>,
}

/// Replace a goal's editable fields
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateGoalRequest {
    pub goal_id: String,
    pub title: String,
    pub domain: String,
    pub status: Option<String>,
    pub target_date: NaiveDate,
    pub not_met_reason: Option<String>,
}

/// Service for managing goals and subgoals
#[derive(Clone)]
pub struct GoalsService {
    repo: Repository,
    guard: AuthGuard,
}

impl GoalsService {
    pub fn new(repo: Repository, guard: AuthGuard) -> Self {
        Self { repo, guard }
    }

    /// Create a goal with optional initial subgoals
    pub async fn create_goal(&self, ctx: &RequestContext, req: CreateGoalRequest) -> Result<Goal> {
        let principal = self.guard.require_minimum_role(ctx, Role::Staff).await?;

        let fields = goal_fields(
            &req.title,
            &req.domain,
            req.status.as_deref(),
            req.target_date,
            req.not_met_reason.as_deref(),
            today(),
        )?;

        let subgoals: Vec<String> = req
            .subgoals
            .iter()
            .filter_map(|title| blank_to_none(Some(title.as_str())))
            .map(str::to_string)
            .collect();

        if subgoals.len() > MAX_INITIAL_SUBGOALS {
            return Err(AppError::validation(format!(
                "a goal may start with at most {} subgoals",
                MAX_INITIAL_SUBGOALS
            )));
        }

        let client = self.repo.get_client(&req.client_id).await?;

        tracing::info!("{} creating goal for client {}", principal.id, client.id);

        let goal = self.repo.create_goal(&client.id, &fields, &subgoals).await?;

        tracing::info!("Goal created successfully: {}", goal.id);
        Ok(goal)
    }

    /// Replace a goal's editable fields
    pub async fn update_goal(&self, ctx: &RequestContext, req: UpdateGoalRequest) -> Result<Goal> {
        self.guard.require_minimum_role(ctx, Role::Staff).await?;

        let fields = goal_fields(
            &req.title,
            &req.domain,
            req.status.as_deref(),
            req.target_date,
            req.not_met_reason.as_deref(),
            today(),
        )?;

        self.repo.update_goal(&req.goal_id, &fields).await
    }

    /// Delete a goal and its subgoals
    pub async fn delete_goal(&self, ctx: &RequestContext, goal_id: &str) -> Result<()> {
        let principal = self.guard.require_minimum_role(ctx, Role::Staff).await?;

        tracing::info!("{} deleting goal {}", principal.id, goal_id);

        self.repo.delete_goal(goal_id).await
    }

    /// Goals of a client with their subgoals in order
    pub async fn list_goals(&self, ctx: &RequestContext, client_id: &str) -> Result<Vec<GoalWithSubgoals>> {
        let principal = self.guard.require_minimum_role(ctx, Role::User).await?;
        let client = self.repo.get_client(client_id).await?;
        ensure_client_visible(&principal, &client)?;

        let goals = self.repo.list_goals_for_client(client_id).await?;
        let today = today();

        let mut result = Vec::with_capacity(goals.len());
        for goal in goals {
            let subgoals = self.repo.list_subgoals(&goal.id).await?;
            result.push(GoalWithSubgoals {
                overdue: goal.is_overdue(today),
                goal,
                subgoals,
            });
        }

        Ok(result)
    }

    /// Append a subgoal after the existing ones
    pub async fn add_subgoal(&self, ctx: &RequestContext, goal_id: &str, title: &str) -> Result<Subgoal> {
        self.guard.require_minimum_role(ctx, Role::Staff).await?;

        let title = require_text("subgoal title", title)?;
        let goal = self.repo.get_goal(goal_id).await?;

        self.repo.append_subgoal(&goal.id, title).await
    }

    /// Mark a subgoal done or not done
    pub async fn toggle_subgoal(&self, ctx: &RequestContext, subgoal_id: &str, is_done: bool) -> Result<Subgoal> {
        self.guard.require_minimum_role(ctx, Role::Staff).await?;
        self.repo.set_subgoal_done(subgoal_id, is_done).await
    }

    /// Remove a subgoal; later subgoals move up one place
    pub async fn delete_subgoal(&self, ctx: &RequestContext, subgoal_id: &str) -> Result<()> {
        let principal = self.guard.require_minimum_role(ctx, Role::Staff).await?;

        let removed = self.repo.delete_subgoal(subgoal_id).await?;

        tracing::info!(
            "{} deleted subgoal {} of goal {}",
            principal.id,
            removed.id,
            removed.goal_id
        );
        Ok(())
    }
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

/// Validate goal input against the overdue policy as of `today`
fn goal_fields(
    title: &str,
    domain: &str,
    status: Option<&str>,
    target_date: NaiveDate,
    not_met_reason: Option<&str>,
    today: NaiveDate,
) -> Result<GoalFields> {
    let title = require_text("title", title)?.to_string();
    let domain: GoalDomain = domain.parse()?;
    let status = match blank_to_none(status) {
        Some(status) => status.parse()?,
        None => GoalStatus::InProgress,
    };
    let reason = blank_to_none(not_met_reason)
        .map(str::parse::<NotMetReason>)
        .transpose()?;

    let not_met_reason = if is_overdue(status, target_date, today) {
        match reason {
            Some(reason) => Some(reason),
            None => {
                return Err(AppError::validation(
                    "a reason is required for a goal past its target date",
                ))
            }
        }
    } else {
        None
    };

    Ok(GoalFields {
        title,
        domain,
        status,
        target_date,
        not_met_reason,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::test_support::{add_client, create_test_repo, guard, login_as};
    use chrono::Duration;

    async fn create_test_service() -> (GoalsService, Repository) {
        let repo = create_test_repo().await;
        (GoalsService::new(repo.clone(), guard(&repo)), repo)
    }

    fn request(client_id: &str, target_date: NaiveDate) -> CreateGoalRequest {
        CreateGoalRequest {
            client_id: client_id.to_string(),
            title: "Cook a meal independently".to_string(),
            domain: "Personal development".to_string(),
            status: None,
            target_date,
            not_met_reason: None,
            subgoals: Vec::new(),
        }
    }

    fn days_from_today(days: i64) -> NaiveDate {
        today() + Duration::days(days)
    }

    #[test]
    fn test_reason_kept_only_while_overdue() {
        let today = NaiveDate::from_ymd_opt(2025, 3, 10).unwrap();
        let past = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();

        let overdue = goal_fields("t", "Rights", None, past, Some("Other reasons"), today).unwrap();
        assert_eq!(overdue.not_met_reason, Some(NotMetReason::Other));

        let completed =
            goal_fields("t", "Rights", Some("completed"), past, Some("Other reasons"), today).unwrap();
        assert_eq!(completed.not_met_reason, None);

        let due_today = goal_fields("t", "Rights", None, today, Some("Other reasons"), today).unwrap();
        assert_eq!(due_today.not_met_reason, None);

        assert!(goal_fields("t", "Rights", None, past, None, today).is_err());
        assert!(goal_fields("t", "Rights", None, past, Some("  "), today).is_err());
    }

    #[test]
    fn test_unknown_values_rejected() {
        let today = NaiveDate::from_ymd_opt(2025, 3, 10).unwrap();
        let future = NaiveDate::from_ymd_opt(2025, 4, 1).unwrap();

        for (domain, status, reason) in [
            ("Cooking", None, None),
            ("Rights", Some("paused"), None),
            ("Rights", None, Some("Bored")),
        ] {
            let result = goal_fields("t", domain, status, future, reason, today);
            assert!(matches!(result, Err(AppError::Validation(_))));
        }
    }

    #[tokio::test]
    async fn test_overdue_goal_needs_reason() {
        let (service, repo) = create_test_service().await;
        let staff = login_as(&repo, Role::Staff).await;
        let client_id = add_client(&repo, None).await;

        let without_reason = service
            .create_goal(&staff, request(&client_id, days_from_today(-30)))
            .await;
        assert!(matches!(without_reason, Err(AppError::Validation(_))));
        assert!(repo.list_goals_for_client(&client_id).await.unwrap().is_empty());

        let mut with_reason = request(&client_id, days_from_today(-30));
        with_reason.not_met_reason = Some("Time specific".to_string());
        let goal = service.create_goal(&staff, with_reason).await.unwrap();

        assert_eq!(goal.not_met_reason, Some(NotMetReason::TimeSpecific));
        assert_eq!(goal.domain, GoalDomain::PersonalDevelopment);
        assert_eq!(goal.status, GoalStatus::InProgress);
        assert!(goal.is_overdue(today()));

        let listed = service.list_goals(&staff, &client_id).await.unwrap();
        assert!(listed[0].overdue);
    }

    #[tokio::test]
    async fn test_completing_goal_clears_reason() {
        let (service, repo) = create_test_service().await;
        let staff = login_as(&repo, Role::Staff).await;
        let client_id = add_client(&repo, None).await;

        let mut req = request(&client_id, days_from_today(-30));
        req.not_met_reason = Some("Home instability".to_string());
        let goal = service.create_goal(&staff, req).await.unwrap();

        let updated = service
            .update_goal(
                &staff,
                UpdateGoalRequest {
                    goal_id: goal.id.clone(),
                    title: goal.title.clone(),
                    domain: goal.domain.label().to_string(),
                    status: Some("completed".to_string()),
                    target_date: goal.target_date,
                    not_met_reason: Some("Home instability".to_string()),
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.status, GoalStatus::Completed);
        assert!(updated.not_met_reason.is_none());
        assert!(!updated.is_overdue(today()));
    }

    #[tokio::test]
    async fn test_subgoals_are_ordered() {
        let (service, repo) = create_test_service().await;
        let staff = login_as(&repo, Role::Staff).await;
        let client_id = add_client(&repo, None).await;

        let mut req = request(&client_id, days_from_today(30));
        req.subgoals = vec!["Plan menu".to_string(), "   ".to_string(), "Buy groceries".to_string()];
        let goal = service.create_goal(&staff, req).await.unwrap();

        let added = service.add_subgoal(&staff, &goal.id, " Cook ").await.unwrap();
        assert_eq!(added.order_index, 2);
        assert_eq!(added.title, "Cook");

        let toggled = service.toggle_subgoal(&staff, &added.id, true).await.unwrap();
        assert!(toggled.is_done);

        let goals = service.list_goals(&staff, &client_id).await.unwrap();
        assert_eq!(goals.len(), 1);
        let titles: Vec<(&str, i64)> = goals[0]
            .subgoals
            .iter()
            .map(|s| (s.title.as_str(), s.order_index))
            .collect();
        assert_eq!(
            titles,
            vec![("Plan menu", 0), ("Buy groceries", 1), ("Cook", 2)]
        );
    }

    #[tokio::test]
    async fn test_subgoal_limits_and_missing_rows() {
        let (service, repo) = create_test_service().await;
        let staff = login_as(&repo, Role::Staff).await;
        let client_id = add_client(&repo, None).await;

        let mut too_many = request(&client_id, days_from_today(30));
        too_many.subgoals = (0..=MAX_INITIAL_SUBGOALS).map(|i| format!("step {}", i)).collect();
        assert!(matches!(
            service.create_goal(&staff, too_many).await,
            Err(AppError::Validation(_))
        ));

        assert!(matches!(
            service.toggle_subgoal(&staff, "missing", true).await,
            Err(AppError::NotFound { entity: "Subgoal", .. })
        ));
        assert!(matches!(
            service.add_subgoal(&staff, "missing", "step").await,
            Err(AppError::NotFound { entity: "Goal", .. })
        ));
        assert!(matches!(
            service.create_goal(&staff, request("missing", days_from_today(30))).await,
            Err(AppError::NotFound { entity: "Client", .. })
        ));
    }

    #[tokio::test]
    async fn test_mutations_require_staff() {
        let (service, repo) = create_test_service().await;
        let staff = login_as(&repo, Role::Staff).await;
        let guardian = login_as(&repo, Role::Guardian).await;
        let client_id = add_client(&repo, Some(&guardian)).await;
        let goal = service
            .create_goal(&staff, request(&client_id, days_from_today(30)))
            .await
            .unwrap();

        assert!(matches!(
            service.create_goal(&guardian, request(&client_id, days_from_today(30))).await,
            Err(AppError::Unauthorized(_))
        ));
        assert!(service.add_subgoal(&guardian, &goal.id, "step").await.is_err());
        assert!(service.delete_goal(&guardian, &goal.id).await.is_err());

        assert_eq!(service.list_goals(&guardian, &client_id).await.unwrap().len(), 1);

        service.delete_goal(&staff, &goal.id).await.unwrap();
        assert!(service.list_goals(&staff, &client_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_subgoal_closes_gap() {
        let (service, repo) = create_test_service().await;
        let staff = login_as(&repo, Role::Staff).await;
        let guardian = login_as(&repo, Role::Guardian).await;
        let client_id = add_client(&repo, Some(&guardian)).await;

        let mut req = request(&client_id, days_from_today(30));
        req.subgoals = vec!["Plan".to_string(), "Shop".to_string(), "Cook".to_string()];
        let goal = service.create_goal(&staff, req).await.unwrap();

        let listed = service.list_goals(&staff, &client_id).await.unwrap();
        assert!(!listed[0].overdue);
        let shop = listed[0].subgoals[1].clone();

        assert!(matches!(
            service.delete_subgoal(&guardian, &shop.id).await,
            Err(AppError::Unauthorized(_))
        ));

        service.delete_subgoal(&staff, &shop.id).await.unwrap();
        let added = service.add_subgoal(&staff, &goal.id, "Eat").await.unwrap();
        assert_eq!(added.order_index, 2);

        let goals = service.list_goals(&guardian, &client_id).await.unwrap();
        let order: Vec<(&str, i64)> = goals[0]
            .subgoals
            .iter()
            .map(|s| (s.title.as_str(), s.order_index))
            .collect();
        assert_eq!(order, vec![("Plan", 0), ("Cook", 1), ("Eat", 2)]);

        assert!(matches!(
            service.delete_subgoal(&staff, &shop.id).await,
            Err(AppError::NotFound { entity: "Subgoal", .. })
        ));
    }
}
