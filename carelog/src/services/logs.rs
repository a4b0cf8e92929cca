//! Logs service
//!
//! Notes about clients with an append-only edit history. Creating a log
//! writes no revision; every later edit overwrites the current content and
//! appends exactly one revision in the same transaction.

use super::clients::ensure_client_visible;
use super::{blank_to_none, require_text};
use crate::auth::{AuthGuard, Principal, RequestContext, Role};
use crate::config::{MAX_LATITUDE, MAX_LONGITUDE, MIN_LATITUDE, MIN_LONGITUDE};
use crate::database::{Geolocation, Log, NewLog, Repository, Revision};
use crate::diff::{diff, DiffSegment};
use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};

/// Raw location fields as submitted by a form
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GeoInput {
    pub latitude: Option<String>,
    pub longitude: Option<String>,
    pub place_name: Option<String>,
    pub place_address: Option<String>,
}

impl GeoInput {
    pub fn at(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude: Some(latitude.to_string()),
            longitude: Some(longitude.to_string()),
            ..Default::default()
        }
    }

    /// Validate and normalize. Blank values become `None`.
    pub fn parse(&self) -> Result<Geolocation> {
        Ok(Geolocation {
            latitude: parse_coordinate("latitude", self.latitude.as_deref(), MIN_LATITUDE, MAX_LATITUDE)?,
            longitude: parse_coordinate("longitude", self.longitude.as_deref(), MIN_LONGITUDE, MAX_LONGITUDE)?,
            place_name: blank_to_none(self.place_name.as_deref()).map(str::to_string),
            place_address: blank_to_none(self.place_address.as_deref()).map(str::to_string),
        })
    }
}

fn parse_coordinate(field: &str, raw: Option<&str>, min: f64, max: f64) -> Result<Option<f64>> {
    let Some(text) = blank_to_none(raw) else {
        return Ok(None);
    };

    let value: f64 = text
        .parse()
        .map_err(|_| AppError::validation(format!("{} '{}' is not a number", field, text)))?;

    if !value.is_finite() || value < min || value > max {
        return Err(AppError::validation(format!(
            "{} must be between {} and {}",
            field, min, max
        )));
    }

    Ok(Some(value))
}

/// Create log request
#[derive(Debug, Clone, Deserialize)]
pub struct CreateLogRequest {
    pub client_id: String,
    /// Author display name to record with the log
    pub author_name: String,
    pub content: String,
    #[serde(default)]
    pub geo: GeoInput,
}

/// Update log request
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateLogRequest {
    pub log_id: String,
    /// Editor display name to record with the revision
    pub editor_name: String,
    pub content: String,
}

/// A revision together with what changed since the previous one
#[derive(Debug, Clone, Serialize)]
pub struct RevisionView {
    #[serde(flatten)]
    pub revision: Revision,
    /// `None` for the oldest revision, which has nothing to compare against
    pub changes: Option<Vec<DiffSegment>>,
}

/// Service for managing logs and their revisions
#[derive(Clone)]
pub struct LogsService {
    repo: Repository,
    guard: AuthGuard,
}

impl LogsService {
    pub fn new(repo: Repository, guard: AuthGuard) -> Self {
        Self { repo, guard }
    }

    /// Write a new log about a client
    pub async fn create_log(&self, ctx: &RequestContext, req: CreateLogRequest) -> Result<Log> {
        let principal = self.writer(ctx).await?;

        require_text("content", &req.content)?;
        let author_name = require_text("author name", &req.author_name)?.to_string();
        let geo = req.geo.parse()?;

        let client = self.repo.get_client(&req.client_id).await?;

        tracing::info!("{} creating log for client {}", principal.id, client.id);

        let log = self
            .repo
            .create_log(&NewLog {
                client_id: client.id,
                author_id: principal.id,
                author_name,
                content: req.content,
                geo,
            })
            .await?;

        tracing::info!("Log created successfully: {}", log.id);
        Ok(log)
    }

    /// Replace a log's content and record the edit as a new revision
    pub async fn update_log(&self, ctx: &RequestContext, req: UpdateLogRequest) -> Result<Revision> {
        let principal = self.writer(ctx).await?;

        require_text("content", &req.content)?;
        let editor_name = require_text("editor name", &req.editor_name)?;

        tracing::debug!("{} updating log {}", principal.id, req.log_id);

        let revision = self
            .repo
            .update_log_content(&req.log_id, &principal.id, editor_name, &req.content)
            .await?;

        tracing::info!("Log {} updated to version {}", req.log_id, revision.version);
        Ok(revision)
    }

    /// Get a log the requester may see
    pub async fn get_log(&self, ctx: &RequestContext, log_id: &str) -> Result<Log> {
        let principal = self.guard.require_minimum_role(ctx, Role::User).await?;
        self.visible_log(&principal, log_id).await
    }

    /// Logs about a client, newest first
    pub async fn list_logs_for_client(&self, ctx: &RequestContext, client_id: &str) -> Result<Vec<Log>> {
        let principal = self.guard.require_minimum_role(ctx, Role::User).await?;
        let client = self.repo.get_client(client_id).await?;
        ensure_client_visible(&principal, &client)?;

        self.repo.list_logs_for_client(client_id).await
    }

    /// Edit history of a log, most recent revision first
    pub async fn fetch_revisions(&self, ctx: &RequestContext, log_id: &str) -> Result<Vec<Revision>> {
        let principal = self.guard.require_minimum_role(ctx, Role::User).await?;
        self.visible_log(&principal, log_id).await?;

        self.repo.list_revisions(log_id).await
    }

    /// Edit history with each revision diffed against the one before it
    pub async fn revision_history(&self, ctx: &RequestContext, log_id: &str) -> Result<Vec<RevisionView>> {
        let revisions = self.fetch_revisions(ctx, log_id).await?;

        let views = revisions
            .iter()
            .enumerate()
            .map(|(index, revision)| RevisionView {
                revision: revision.clone(),
                changes: revisions
                    .get(index + 1)
                    .map(|older| diff(&older.content, &revision.content)),
            })
            .collect();

        Ok(views)
    }

    /// Authenticated principal allowed to write logs
    async fn writer(&self, ctx: &RequestContext) -> Result<Principal> {
        ctx.require_user()?;
        self.guard.require_minimum_role(ctx, Role::Staff).await
    }

    async fn visible_log(&self, principal: &Principal, log_id: &str) -> Result<Log> {
        let log = self.repo.get_log(log_id).await?;
        let client = self.repo.get_client(&log.client_id).await?;
        ensure_client_visible(principal, &client)?;
        Ok(log)
    }
}
