//! Schedules service
//!
//! Calendar events. An event is either shared with every account or
//! individual, in which case it lists the clients taking part. Staff manage
//! the calendar; guardians see shared events and those their clients attend.

use super::{blank_to_none, require_text};
use crate::auth::{AuthGuard, RecordScope, RequestContext, Role};
use crate::database::{NewSchedule, Repository, Schedule, ScheduleWithParticipants};
use crate::error::{AppError, Result};
use chrono::{DateTime, Utc};
use serde::Deserialize;

/// Create schedule request
#[derive(Debug, Clone, Deserialize)]
pub struct CreateScheduleRequest {
    pub title: String,
    pub description: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    #[serde(default)]
    pub is_all_users: bool,
    /// Client ids; ignored for shared events
    #[serde(default)]
    pub participant_ids: Vec<String>,
    pub assigned_staff_id: Option<String>,
}

/// Service for managing schedules
#[derive(Clone)]
pub struct SchedulesService {
    repo: Repository,
    guard: AuthGuard,
}

impl SchedulesService {
    pub fn new(repo: Repository, guard: AuthGuard) -> Self {
        Self { repo, guard }
    }

    /// Add an event to the calendar
    pub async fn create_schedule(&self, ctx: &RequestContext, req: CreateScheduleRequest) -> Result<Schedule> {
        let principal = self.guard.require_minimum_role(ctx, Role::Staff).await?;

        let title = require_text("title", &req.title)?.to_string();
        if req.end_time <= req.start_time {
            return Err(AppError::validation("end time must be after start time"));
        }

        let mut participant_ids: Vec<String> = Vec::new();
        if !req.is_all_users {
            for id in req.participant_ids.iter().filter_map(|id| blank_to_none(Some(id.as_str()))) {
                if !participant_ids.iter().any(|seen| seen == id) {
                    participant_ids.push(id.to_string());
                }
            }
            if participant_ids.is_empty() {
                return Err(AppError::validation(
                    "an individual event needs at least one participant",
                ));
            }
            for id in &participant_ids {
                self.repo.get_client(id).await?;
            }
        }

        let assigned_staff_id = blank_to_none(req.assigned_staff_id.as_deref()).map(str::to_string);
        if let Some(staff_id) = &assigned_staff_id {
            self.ensure_staff(staff_id).await?;
        }

        let schedule = self
            .repo
            .create_schedule(
                &principal.id,
                &NewSchedule {
                    title,
                    description: blank_to_none(req.description.as_deref()).map(str::to_string),
                    start_time: req.start_time,
                    end_time: req.end_time,
                    is_all_users: req.is_all_users,
                    assigned_staff_id,
                    participant_ids,
                },
            )
            .await?;

        tracing::info!(
            "Schedule created: {} ({}) by {}",
            schedule.title,
            schedule.id,
            principal.id
        );
        Ok(schedule)
    }

    /// The full calendar with participants
    pub async fn list_schedules(&self, ctx: &RequestContext) -> Result<Vec<ScheduleWithParticipants>> {
        self.guard.require_minimum_role(ctx, Role::Staff).await?;

        let schedules = self.repo.list_schedules().await?;
        self.with_participants(schedules).await
    }

    /// Events the requester takes part in, by start time
    pub async fn my_schedules(&self, ctx: &RequestContext) -> Result<Vec<ScheduleWithParticipants>> {
        let principal = self.guard.require_minimum_role(ctx, Role::User).await?;

        let schedules = match principal.role.scope() {
            RecordScope::All => self.repo.list_schedules().await?,
            RecordScope::LinkedClients => self.repo.list_schedules_for_guardian(&principal.id).await?,
            RecordScope::Own => self.repo.list_shared_schedules().await?,
        };

        self.with_participants(schedules).await
    }

    /// Remove an event; its participant rows go with it
    pub async fn delete_schedule(&self, ctx: &RequestContext, id: &str) -> Result<()> {
        let principal = self.guard.require_minimum_role(ctx, Role::Staff).await?;

        tracing::info!("{} deleting schedule {}", principal.id, id);

        self.repo.delete_schedule(id).await
    }

    async fn with_participants(&self, schedules: Vec<Schedule>) -> Result<Vec<ScheduleWithParticipants>> {
        let mut result = Vec::with_capacity(schedules.len());
        for schedule in schedules {
            let participants = self.repo.list_schedule_participants(&schedule.id).await?;
            result.push(ScheduleWithParticipants { schedule, participants });
        }
        Ok(result)
    }

    async fn ensure_staff(&self, staff_id: &str) -> Result<()> {
        match self.repo.get_role(staff_id).await? {
            Some(role) if role.at_least(Role::Staff) => Ok(()),
            Some(role) => Err(AppError::validation(format!(
                "account {} is a {}, not staff",
                staff_id, role
            ))),
            None => Err(AppError::validation(format!(
                "staff member {} does not exist",
                staff_id
            ))),
        }
    }
}
