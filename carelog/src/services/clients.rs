//! Clients service
//!
//! Care recipients and their guardian links. Reads are filtered by the
//! requester's record scope; writes need at least staff.

use super::{blank_to_none, require_text};
use crate::auth::{AuthGuard, Principal, RecordScope, RequestContext, Role};
use crate::database::{Client, CreateClientRequest, Repository, UpdateClientRequest};
use crate::error::{AppError, Result};

/// Service for managing clients
#[derive(Clone)]
pub struct ClientsService {
    repo: Repository,
    guard: AuthGuard,
}

impl ClientsService {
    pub fn new(repo: Repository, guard: AuthGuard) -> Self {
        Self { repo, guard }
    }

    /// Register a client
    pub async fn create_client(&self, ctx: &RequestContext, mut req: CreateClientRequest) -> Result<Client> {
        let principal = self.guard.require_minimum_role(ctx, Role::Staff).await?;

        req.first_name = require_text("first name", &req.first_name)?.to_string();
        req.last_name = require_text("last name", &req.last_name)?.to_string();
        req.guardian_id = blank_to_none(req.guardian_id.as_deref()).map(str::to_string);

        if let Some(guardian_id) = &req.guardian_id {
            self.ensure_guardian(guardian_id).await?;
        }

        let client = self.repo.create_client(&principal.id, &req).await?;

        tracing::info!(
            "Client created: {} ({}) by {}",
            client.display_name(),
            client.id,
            principal.id
        );
        Ok(client)
    }

    /// Get a client the requester may see
    pub async fn get_client(&self, ctx: &RequestContext, id: &str) -> Result<Client> {
        let principal = self.guard.require_minimum_role(ctx, Role::User).await?;
        let client = self.repo.get_client(id).await?;
        ensure_client_visible(&principal, &client)?;
        Ok(client)
    }

    /// Clients visible to the requester, ordered by name
    pub async fn list_clients(&self, ctx: &RequestContext) -> Result<Vec<Client>> {
        let principal = self.guard.require_minimum_role(ctx, Role::User).await?;

        match principal.role.scope() {
            RecordScope::All => self.repo.list_clients().await,
            RecordScope::LinkedClients => self.repo.list_clients_for_guardian(&principal.id).await,
            RecordScope::Own => Err(AppError::Unauthorized(
                "client records are not visible to this account".to_string(),
            )),
        }
    }

    /// Partially update a client
    pub async fn update_client(
        &self,
        ctx: &RequestContext,
        id: &str,
        mut req: UpdateClientRequest,
    ) -> Result<Client> {
        self.guard.require_minimum_role(ctx, Role::Staff).await?;

        if let Some(first_name) = &req.first_name {
            req.first_name = Some(require_text("first name", first_name)?.to_string());
        }
        if let Some(last_name) = &req.last_name {
            req.last_name = Some(require_text("last name", last_name)?.to_string());
        }

        self.repo.update_client(id, &req).await
    }

    /// Link a client to a guardian, or unlink with `None`
    pub async fn assign_guardian(
        &self,
        ctx: &RequestContext,
        client_id: &str,
        guardian_id: Option<&str>,
    ) -> Result<Client> {
        let principal = self.guard.require_minimum_role(ctx, Role::Staff).await?;
        let guardian_id = blank_to_none(guardian_id);

        if let Some(guardian_id) = guardian_id {
            self.ensure_guardian(guardian_id).await?;
        }

        tracing::info!(
            "{} linking client {} to guardian {:?}",
            principal.id,
            client_id,
            guardian_id
        );

        self.repo.set_client_guardian(client_id, guardian_id).await
    }

    /// Delete a client and everything recorded about them
    pub async fn delete_client(&self, ctx: &RequestContext, id: &str) -> Result<()> {
        let principal = self.guard.require_role(ctx, Role::Admin).await?;

        tracing::info!("{} deleting client {}", principal.id, id);

        self.repo.delete_client(id).await
    }

    async fn ensure_guardian(&self, guardian_id: &str) -> Result<()> {
        match self.repo.get_role(guardian_id).await? {
            Some(Role::Guardian) => Ok(()),
            Some(role) => Err(AppError::validation(format!(
                "account {} is a {}, not a guardian",
                guardian_id, role
            ))),
            None => Err(AppError::validation(format!(
                "guardian {} does not exist",
                guardian_id
            ))),
        }
    }
}

/// Record-level read check for client data
pub(crate) fn ensure_client_visible(principal: &Principal, client: &Client) -> Result<()> {
    let visible = match principal.role.scope() {
        RecordScope::All => true,
        RecordScope::LinkedClients => client.guardian_id.as_deref() == Some(principal.id.as_str()),
        RecordScope::Own => false,
    };

    if visible {
        Ok(())
    } else {
        Err(AppError::Unauthorized(format!(
            "client {} is not visible to this account",
            client.id
        )))
    }
}
