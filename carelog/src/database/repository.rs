//! Repository layer for database operations
//!
//! This module provides CRUD operations for all entities.
//! Appends that derive the next version or order index run as a single
//! insert-select guarded by a unique constraint and are retried on conflict.

use super::models::*;
use crate::auth::Role;
use crate::config::{MAX_WRITE_RETRIES, WRITE_RETRY_BACKOFF_MS};
use crate::error::{AppError, Result};
use chrono::Utc;
use sqlx::SqlitePool;
use std::future::Future;
use std::time::Duration;
use uuid::Uuid;

/// Repository for database operations
#[derive(Clone)]
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    // ===== Profiles =====

    /// Create a profile with a fresh user id
    pub async fn create_profile(&self, req: CreateProfileRequest) -> Result<Profile> {
        let user_id = Uuid::new_v4().to_string();
        let now = Utc::now();

        let profile = sqlx::query_as::<_, Profile>(
            r#"
            INSERT INTO profiles (user_id, email, role, full_name, phone, address, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(&user_id)
        .bind(req.email.trim())
        .bind(req.role)
        .bind(&req.full_name)
        .bind(&req.phone)
        .bind(&req.address)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::Conflict(format!("email already registered: {}", req.email.trim()))
            } else {
                AppError::Database(e)
            }
        })?;

        tracing::debug!("Created profile: {} ({})", user_id, profile.role);
        Ok(profile)
    }

    /// Get a profile by user ID
    pub async fn get_profile(&self, user_id: &str) -> Result<Profile> {
        sqlx::query_as::<_, Profile>("SELECT * FROM profiles WHERE user_id = ?")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::not_found("Profile", user_id))
    }

    /// Role lookup backing every authorization check
    pub async fn get_role(&self, user_id: &str) -> Result<Option<Role>> {
        let role = sqlx::query_scalar::<_, Role>("SELECT role FROM profiles WHERE user_id = ?")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(role)
    }

    /// List all profiles, newest first
    pub async fn list_profiles(&self) -> Result<Vec<Profile>> {
        let profiles = sqlx::query_as::<_, Profile>(
            "SELECT * FROM profiles ORDER BY created_at DESC",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(profiles)
    }

    /// List profiles holding any of `roles`, newest first
    pub async fn list_profiles_with_roles(&self, roles: &[Role]) -> Result<Vec<Profile>> {
        if roles.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = vec!["?"; roles.len()].join(", ");
        let sql = format!(
            "SELECT * FROM profiles WHERE role IN ({}) ORDER BY created_at DESC",
            placeholders
        );

        let mut query = sqlx::query_as::<_, Profile>(&sql);
        for role in roles {
            query = query.bind(*role);
        }

        Ok(query.fetch_all(&self.pool).await?)
    }

    /// Update contact details
    pub async fn update_profile(&self, user_id: &str, update: &ProfileUpdate) -> Result<Profile> {
        let profile = sqlx::query_as::<_, Profile>(
            r#"
            UPDATE profiles SET
                full_name = COALESCE(?, full_name),
                phone = COALESCE(?, phone),
                address = COALESCE(?, address),
                updated_at = ?
            WHERE user_id = ?
            RETURNING *
            "#,
        )
        .bind(&update.full_name)
        .bind(&update.phone)
        .bind(&update.address)
        .bind(Utc::now())
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::not_found("Profile", user_id))?;

        tracing::debug!("Updated profile: {}", user_id);
        Ok(profile)
    }

    /// Change a user's role
    pub async fn set_role(&self, user_id: &str, role: Role) -> Result<Profile> {
        let profile = sqlx::query_as::<_, Profile>(
            "UPDATE profiles SET role = ?, updated_at = ? WHERE user_id = ? RETURNING *",
        )
        .bind(role)
        .bind(Utc::now())
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::not_found("Profile", user_id))?;

        tracing::debug!("Set role of {} to {}", user_id, role);
        Ok(profile)
    }

    /// Delete a profile. Linked clients keep existing without a guardian.
    pub async fn delete_profile(&self, user_id: &str) -> Result<()> {
        let rows = sqlx::query("DELETE FROM profiles WHERE user_id = ?")
            .bind(user_id)
            .execute(&self.pool)
            .await?
            .rows_affected();

        if rows == 0 {
            return Err(AppError::not_found("Profile", user_id));
        }

        tracing::debug!("Deleted profile: {}", user_id);
        Ok(())
    }

    // ===== Clients =====

    /// Create a client
    pub async fn create_client(&self, created_by: &str, req: &CreateClientRequest) -> Result<Client> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();

        let client = sqlx::query_as::<_, Client>(
            r#"
            INSERT INTO clients (
                id, first_name, last_name, date_of_birth, phone, email, address, notes,
                guardian_id, created_by, created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(&id)
        .bind(&req.first_name)
        .bind(&req.last_name)
        .bind(req.date_of_birth)
        .bind(&req.phone)
        .bind(&req.email)
        .bind(&req.address)
        .bind(&req.notes)
        .bind(&req.guardian_id)
        .bind(created_by)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        tracing::debug!("Created client: {}", id);
        Ok(client)
    }

    /// Get a client by ID
    pub async fn get_client(&self, id: &str) -> Result<Client> {
        sqlx::query_as::<_, Client>("SELECT * FROM clients WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::not_found("Client", id))
    }

    /// List all clients ordered by name
    pub async fn list_clients(&self) -> Result<Vec<Client>> {
        let clients = sqlx::query_as::<_, Client>(
            "SELECT * FROM clients ORDER BY last_name ASC, first_name ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(clients)
    }

    /// List clients linked to a guardian
    pub async fn list_clients_for_guardian(&self, guardian_id: &str) -> Result<Vec<Client>> {
        let clients = sqlx::query_as::<_, Client>(
            r#"
            SELECT * FROM clients
            WHERE guardian_id = ?
            ORDER BY last_name ASC, first_name ASC
            "#,
        )
        .bind(guardian_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(clients)
    }

    /// Partially update a client
    pub async fn update_client(&self, id: &str, req: &UpdateClientRequest) -> Result<Client> {
        let client = sqlx::query_as::<_, Client>(
            r#"
            UPDATE clients SET
                first_name = COALESCE(?, first_name),
                last_name = COALESCE(?, last_name),
                date_of_birth = COALESCE(?, date_of_birth),
                phone = COALESCE(?, phone),
                email = COALESCE(?, email),
                address = COALESCE(?, address),
                notes = COALESCE(?, notes),
                updated_at = ?
            WHERE id = ?
            RETURNING *
            "#,
        )
        .bind(&req.first_name)
        .bind(&req.last_name)
        .bind(req.date_of_birth)
        .bind(&req.phone)
        .bind(&req.email)
        .bind(&req.address)
        .bind(&req.notes)
        .bind(Utc::now())
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::not_found("Client", id))?;

        tracing::debug!("Updated client: {}", id);
        Ok(client)
    }

    /// Link or unlink a client's guardian
    pub async fn set_client_guardian(&self, id: &str, guardian_id: Option<&str>) -> Result<Client> {
        let client = sqlx::query_as::<_, Client>(
            "UPDATE clients SET guardian_id = ?, updated_at = ? WHERE id = ? RETURNING *",
        )
        .bind(guardian_id)
        .bind(Utc::now())
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::not_found("Client", id))?;

        tracing::debug!("Set guardian of client {} to {:?}", id, guardian_id);
        Ok(client)
    }

    /// Delete a client together with its logs, revisions and goals
    pub async fn delete_client(&self, id: &str) -> Result<()> {
        let rows = sqlx::query("DELETE FROM clients WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?
            .rows_affected();

        if rows == 0 {
            return Err(AppError::not_found("Client", id));
        }

        tracing::debug!("Deleted client: {}", id);
        Ok(())
    }

    // ===== Logs =====

    /// Insert a log. No revision is written for the initial content.
    pub async fn create_log(&self, new_log: &NewLog) -> Result<Log> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();

        let log = sqlx::query_as::<_, Log>(
            r#"
            INSERT INTO log_notes (
                id, client_id, author_id, author_name, content,
                latitude, longitude, place_name, place_address, created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(&id)
        .bind(&new_log.client_id)
        .bind(&new_log.author_id)
        .bind(&new_log.author_name)
        .bind(&new_log.content)
        .bind(new_log.geo.latitude)
        .bind(new_log.geo.longitude)
        .bind(&new_log.geo.place_name)
        .bind(&new_log.geo.place_address)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        tracing::debug!("Created log: {} for client: {}", id, new_log.client_id);
        Ok(log)
    }

    /// Get a log by ID
    pub async fn get_log(&self, id: &str) -> Result<Log> {
        sqlx::query_as::<_, Log>("SELECT * FROM log_notes WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::not_found("Log", id))
    }

    /// List logs for a client, newest first
    pub async fn list_logs_for_client(&self, client_id: &str) -> Result<Vec<Log>> {
        let logs = sqlx::query_as::<_, Log>(
            r#"
            SELECT * FROM log_notes
            WHERE client_id = ?
            ORDER BY created_at DESC
            "#,
        )
        .bind(client_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(logs)
    }

    /// Overwrite a log's content and append the matching revision.
    ///
    /// Both writes commit together. The revision takes the next version
    /// for the log; a concurrent writer that claimed the same version
    /// makes this attempt fail and retry against the new maximum.
    pub async fn update_log_content(
        &self,
        log_id: &str,
        editor_id: &str,
        editor_name: &str,
        content: &str,
    ) -> Result<Revision> {
        with_write_retries("log revision", || {
            self.try_update_log_content(log_id, editor_id, editor_name, content)
        })
        .await
    }

    async fn try_update_log_content(
        &self,
        log_id: &str,
        editor_id: &str,
        editor_name: &str,
        content: &str,
    ) -> Result<Revision> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let rows = sqlx::query("UPDATE log_notes SET content = ?, updated_at = ? WHERE id = ?")
            .bind(content)
            .bind(now)
            .bind(log_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        if rows == 0 {
            return Err(AppError::not_found("Log", log_id));
        }

        let revision = sqlx::query_as::<_, Revision>(
            r#"
            INSERT INTO log_revisions (log_id, version, editor_id, editor_name, content, edited_at)
            SELECT ?, COALESCE(MAX(version), 0) + 1, ?, ?, ?, ?
            FROM log_revisions
            WHERE log_id = ?
            RETURNING *
            "#,
        )
        .bind(log_id)
        .bind(editor_id)
        .bind(editor_name)
        .bind(content)
        .bind(now)
        .bind(log_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::debug!("Log {} now at version {}", log_id, revision.version);
        Ok(revision)
    }

    /// All revisions of a log, most recent first
    pub async fn list_revisions(&self, log_id: &str) -> Result<Vec<Revision>> {
        let revisions = sqlx::query_as::<_, Revision>(
            r#"
            SELECT * FROM log_revisions
            WHERE log_id = ?
            ORDER BY version DESC
            "#,
        )
        .bind(log_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(revisions)
    }

    // ===== Goals =====

    /// Create a goal and its initial subgoals (indexed from 0)
    pub async fn create_goal(
        &self,
        client_id: &str,
        fields: &GoalFields,
        subgoal_titles: &[String],
    ) -> Result<Goal> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let goal = sqlx::query_as::<_, Goal>(
            r#"
            INSERT INTO goals (
                id, client_id, title, domain, status, target_date, not_met_reason,
                created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(&id)
        .bind(client_id)
        .bind(&fields.title)
        .bind(fields.domain)
        .bind(fields.status)
        .bind(fields.target_date)
        .bind(fields.not_met_reason)
        .bind(now)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        for (index, title) in subgoal_titles.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO goal_subgoals (id, goal_id, title, order_index, is_done, created_at)
                VALUES (?, ?, ?, ?, 0, ?)
                "#,
            )
            .bind(Uuid::new_v4().to_string())
            .bind(&id)
            .bind(title)
            .bind(index as i64)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        tracing::debug!(
            "Created goal: {} for client: {} with {} subgoals",
            id,
            client_id,
            subgoal_titles.len()
        );
        Ok(goal)
    }

    /// Get a goal by ID
    pub async fn get_goal(&self, id: &str) -> Result<Goal> {
        sqlx::query_as::<_, Goal>("SELECT * FROM goals WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::not_found("Goal", id))
    }

    /// List goals for a client by target date
    pub async fn list_goals_for_client(&self, client_id: &str) -> Result<Vec<Goal>> {
        let goals = sqlx::query_as::<_, Goal>(
            r#"
            SELECT * FROM goals
            WHERE client_id = ?
            ORDER BY target_date ASC, created_at ASC
            "#,
        )
        .bind(client_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(goals)
    }

    /// Replace a goal's editable columns
    pub async fn update_goal(&self, id: &str, fields: &GoalFields) -> Result<Goal> {
        let goal = sqlx::query_as::<_, Goal>(
            r#"
            UPDATE goals SET
                title = ?,
                domain = ?,
                status = ?,
                target_date = ?,
                not_met_reason = ?,
                updated_at = ?
            WHERE id = ?
            RETURNING *
            "#,
        )
        .bind(&fields.title)
        .bind(fields.domain)
        .bind(fields.status)
        .bind(fields.target_date)
        .bind(fields.not_met_reason)
        .bind(Utc::now())
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::not_found("Goal", id))?;

        tracing::debug!("Updated goal: {}", id);
        Ok(goal)
    }

    /// Delete a goal and its subgoals
    pub async fn delete_goal(&self, id: &str) -> Result<()> {
        let rows = sqlx::query("DELETE FROM goals WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?
            .rows_affected();

        if rows == 0 {
            return Err(AppError::not_found("Goal", id));
        }

        tracing::debug!("Deleted goal: {}", id);
        Ok(())
    }

    // ===== Subgoals =====

    /// Subgoals of a goal in display order
    pub async fn list_subgoals(&self, goal_id: &str) -> Result<Vec<Subgoal>> {
        let subgoals = sqlx::query_as::<_, Subgoal>(
            "SELECT * FROM goal_subgoals WHERE goal_id = ? ORDER BY order_index ASC",
        )
        .bind(goal_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(subgoals)
    }

    /// Append a subgoal after the current last one
    pub async fn append_subgoal(&self, goal_id: &str, title: &str) -> Result<Subgoal> {
        with_write_retries("subgoal order index", || self.try_append_subgoal(goal_id, title)).await
    }

    async fn try_append_subgoal(&self, goal_id: &str, title: &str) -> Result<Subgoal> {
        let id = Uuid::new_v4().to_string();

        let subgoal = sqlx::query_as::<_, Subgoal>(
            r#"
            INSERT INTO goal_subgoals (id, goal_id, title, order_index, is_done, created_at)
            SELECT ?, ?, ?, COALESCE(MAX(order_index), -1) + 1, 0, ?
            FROM goal_subgoals
            WHERE goal_id = ?
            RETURNING *
            "#,
        )
        .bind(&id)
        .bind(goal_id)
        .bind(title)
        .bind(Utc::now())
        .bind(goal_id)
        .fetch_one(&self.pool)
        .await?;

        tracing::debug!("Appended subgoal {} at index {}", id, subgoal.order_index);
        Ok(subgoal)
    }

    /// Set a subgoal's completion flag
    pub async fn set_subgoal_done(&self, id: &str, is_done: bool) -> Result<Subgoal> {
        let subgoal = sqlx::query_as::<_, Subgoal>(
            "UPDATE goal_subgoals SET is_done = ? WHERE id = ? RETURNING *",
        )
        .bind(is_done)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::not_found("Subgoal", id))?;

        tracing::debug!("Marked subgoal {} done={}", id, is_done);
        Ok(subgoal)
    }

    /// Remove a subgoal and close the gap in its goal's order
    pub async fn delete_subgoal(&self, id: &str) -> Result<Subgoal> {
        with_write_retries("subgoal order index", || self.try_delete_subgoal(id)).await
    }

    async fn try_delete_subgoal(&self, id: &str) -> Result<Subgoal> {
        let mut tx = self.pool.begin().await?;

        let removed = sqlx::query_as::<_, Subgoal>("DELETE FROM goal_subgoals WHERE id = ? RETURNING *")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::not_found("Subgoal", id))?;

        let later: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT id FROM goal_subgoals
            WHERE goal_id = ? AND order_index > ?
            ORDER BY order_index ASC
            "#,
        )
        .bind(&removed.goal_id)
        .bind(removed.order_index)
        .fetch_all(&mut *tx)
        .await?;

        // Ascending, so each target index has already been vacated
        for later_id in &later {
            sqlx::query("UPDATE goal_subgoals SET order_index = order_index - 1 WHERE id = ?")
                .bind(later_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        tracing::debug!(
            "Deleted subgoal {} from goal {}, shifted {} later subgoals",
            id,
            removed.goal_id,
            later.len()
        );
        Ok(removed)
    }

    // ===== Schedules =====

    /// Create a schedule and, for individual events, its participants
    pub async fn create_schedule(&self, created_by: &str, new: &NewSchedule) -> Result<Schedule> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let schedule = sqlx::query_as::<_, Schedule>(
            r#"
            INSERT INTO schedules (
                id, title, description, start_time, end_time, is_all_users,
                created_by, assigned_staff_id, created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(&id)
        .bind(&new.title)
        .bind(&new.description)
        .bind(new.start_time)
        .bind(new.end_time)
        .bind(new.is_all_users)
        .bind(created_by)
        .bind(&new.assigned_staff_id)
        .bind(now)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        if !new.is_all_users {
            for client_id in &new.participant_ids {
                sqlx::query(
                    r#"
                    INSERT INTO schedule_participants (id, schedule_id, client_id, created_at)
                    VALUES (?, ?, ?, ?)
                    "#,
                )
                .bind(Uuid::new_v4().to_string())
                .bind(&id)
                .bind(client_id)
                .bind(now)
                .execute(&mut *tx)
                .await?;
            }
        }

        tx.commit().await?;

        tracing::debug!("Created schedule: {}", id);
        Ok(schedule)
    }

    /// Get a schedule by ID
    pub async fn get_schedule(&self, id: &str) -> Result<Schedule> {
        sqlx::query_as::<_, Schedule>("SELECT * FROM schedules WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::not_found("Schedule", id))
    }

    /// Every schedule by start time
    pub async fn list_schedules(&self) -> Result<Vec<Schedule>> {
        let schedules = sqlx::query_as::<_, Schedule>(
            "SELECT * FROM schedules ORDER BY start_time ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(schedules)
    }

    /// Events shared with everyone
    pub async fn list_shared_schedules(&self) -> Result<Vec<Schedule>> {
        let schedules = sqlx::query_as::<_, Schedule>(
            "SELECT * FROM schedules WHERE is_all_users = 1 ORDER BY start_time ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(schedules)
    }

    /// Shared events plus events with a participant linked to the guardian
    pub async fn list_schedules_for_guardian(&self, guardian_id: &str) -> Result<Vec<Schedule>> {
        let schedules = sqlx::query_as::<_, Schedule>(
            r#"
            SELECT s.* FROM schedules s
            WHERE s.is_all_users = 1
               OR EXISTS (
                   SELECT 1 FROM schedule_participants p
                   JOIN clients c ON c.id = p.client_id
                   WHERE p.schedule_id = s.id AND c.guardian_id = ?
               )
            ORDER BY s.start_time ASC
            "#,
        )
        .bind(guardian_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(schedules)
    }

    /// Participants of a schedule
    pub async fn list_schedule_participants(&self, schedule_id: &str) -> Result<Vec<ScheduleParticipant>> {
        let participants = sqlx::query_as::<_, ScheduleParticipant>(
            "SELECT * FROM schedule_participants WHERE schedule_id = ? ORDER BY created_at ASC",
        )
        .bind(schedule_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(participants)
    }

    /// Delete a schedule and its participants
    pub async fn delete_schedule(&self, id: &str) -> Result<()> {
        let rows = sqlx::query("DELETE FROM schedules WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?
            .rows_affected();

        if rows == 0 {
            return Err(AppError::not_found("Schedule", id));
        }

        tracing::debug!("Deleted schedule: {}", id);
        Ok(())
    }
}

// SQLite result codes: BUSY, LOCKED, BUSY_SNAPSHOT, CONSTRAINT_PRIMARYKEY, CONSTRAINT_UNIQUE
const CONFLICT_CODES: &[&str] = &["5", "6", "517", "1555", "2067"];

fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db) => db.is_unique_violation(),
        _ => false,
    }
}

/// Whether an error means another writer got there first
fn is_write_conflict(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db) => {
            db.is_unique_violation()
                || db
                    .code()
                    .map(|code| CONFLICT_CODES.contains(&&*code))
                    .unwrap_or(false)
        }
        _ => false,
    }
}

/// Run `attempt` until it stops hitting write conflicts, up to `MAX_WRITE_RETRIES` times
async fn with_write_retries<T, F, Fut>(what: &str, mut attempt: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut tries: u32 = 0;

    loop {
        tries += 1;

        match attempt().await {
            Err(AppError::Database(err)) if is_write_conflict(&err) => {
                if tries >= MAX_WRITE_RETRIES {
                    tracing::error!("Giving up on {} after {} attempts: {}", what, tries, err);
                    return Err(AppError::Conflict(format!(
                        "{} could not be assigned after {} attempts",
                        what, tries
                    )));
                }

                tracing::warn!("Write conflict on {} (attempt {}): {}", what, tries, err);
                tokio::time::sleep(Duration::from_millis(WRITE_RETRY_BACKOFF_MS * tries as u64))
                    .await;
            }
            other => return other,
        }
    }
}
