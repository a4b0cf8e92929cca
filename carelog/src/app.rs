//! Application state and initialization
//!
//! This module manages the central application state and lifecycle.
//! All services are initialized here and made available through AppState.

use crate::auth::AuthGuard;
use crate::config::DATABASE_FILE_NAME;
use crate::database::{create_pool, Repository};
use crate::error::Result;
use crate::services::{ClientsService, GoalsService, LogsService, SchedulesService, UsersService};
use std::path::{Path, PathBuf};

/// Central application state holding all services
#[derive(Clone)]
pub struct AppState {
    pub data_dir: PathBuf,
    pub repo: Repository,
    pub guard: AuthGuard,
    pub users: UsersService,
    pub clients: ClientsService,
    pub logs: LogsService,
    pub goals: GoalsService,
    pub schedules: SchedulesService,
}

impl AppState {
    pub fn new(data_dir: PathBuf, repo: Repository) -> Self {
        let guard = AuthGuard::new(repo.clone());

        Self {
            users: UsersService::new(repo.clone(), guard.clone()),
            clients: ClientsService::new(repo.clone(), guard.clone()),
            logs: LogsService::new(repo.clone(), guard.clone()),
            goals: GoalsService::new(repo.clone(), guard.clone()),
            schedules: SchedulesService::new(repo.clone(), guard.clone()),
            data_dir,
            repo,
            guard,
        }
    }

    /// Open (and migrate) the database under `data_dir`
    pub async fn initialize(data_dir: &Path) -> Result<Self> {
        tracing::info!("Initializing application");
        tracing::info!("Data directory: {:?}", data_dir);

        std::fs::create_dir_all(data_dir)?;

        let pool = create_pool(&data_dir.join(DATABASE_FILE_NAME)).await?;
        let state = Self::new(data_dir.to_path_buf(), Repository::new(pool));

        tracing::info!("Application initialized successfully");

        Ok(state)
    }
}
