// Facade tying the session, catalog, install, and job components to one
// event channel and one shared token. Hosts construct this once and keep
// it for the lifetime of the editor.

use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tracing::{info, warn};

use crate::adapters::{AssetImporter, InputExporter};
use crate::catalog::CatalogRegistry;
use crate::config::Config;
use crate::http::ApiClient;
use crate::install::InstallManager;
use crate::jobs::{JobOrchestrator, JobRequest};
use crate::session::SessionManager;
use crate::types::{
    AssetInfo, ClientError, ClientEvent, ClientResult, EntryPointReference, JobDefinition,
    JobHandle, JobInfo, SessionState, Stats,
};

const EVENT_CHANNEL_CAPACITY: usize = 64;

#[derive(Clone)]
pub struct MeshForgeClient {
    session: SessionManager,
    catalog: CatalogRegistry,
    install: InstallManager,
    jobs: JobOrchestrator,
    events: broadcast::Sender<ClientEvent>,
}

impl MeshForgeClient {
    pub fn new(
        config: Config,
        exporter: Arc<dyn InputExporter>,
        importer: Arc<dyn AssetImporter>,
    ) -> Self {
        let config = Arc::new(config);
        let token = Arc::new(RwLock::new(None));
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        let api = ApiClient::new(config.service_url().to_string(), token.clone());
        let session = SessionManager::new(
            api.clone(),
            config.api_key().to_string(),
            token,
            events.clone(),
        );
        let catalog = CatalogRegistry::new(api.clone(), config.clone(), events.clone());
        let install = InstallManager::new(api.clone(), config.clone(), importer.clone(), events.clone());
        let jobs = JobOrchestrator::new(
            api,
            config,
            session.clone(),
            exporter,
            importer,
            events.clone(),
        );

        Self {
            session,
            catalog,
            install,
            jobs,
            events,
        }
    }

    /// New receiver on the shared event channel. Every component publishes
    /// here.
    pub fn subscribe(&self) -> broadcast::Receiver<ClientEvent> {
        self.events.subscribe()
    }

    // ---- session ----

    pub async fn session_state(&self) -> SessionState {
        self.session.state().await
    }

    /// Establishes a session and, on success, refreshes the catalog and
    /// rescans installed packages.
    pub async fn create_session(&self) -> SessionState {
        let state = self.session.create_session().await;
        if state == SessionState::Created {
            if let Err(e) = self.install.load_installed().await {
                warn!("Failed to scan installed packages: {}", e);
            }
            self.catalog.update_job_definition_list().await;
            if let Err(e) = self.catalog.update_asset_list().await {
                warn!("Failed to refresh asset list: {}", e);
            }
        }
        state
    }

    /// Tears down local job state and the catalog, drops the session, and
    /// starts a fresh one.
    pub async fn reset_session(&self) -> SessionState {
        info!("Resetting session");
        self.jobs.clear_jobs().await;
        self.catalog.clear().await;
        self.session.clear().await;
        self.create_session().await
    }

    // ---- catalog ----

    pub async fn update_job_definition_list(&self) {
        self.catalog.update_job_definition_list().await;
    }

    pub async fn update_asset_list(&self) -> ClientResult<()> {
        self.catalog.update_asset_list().await
    }

    pub async fn assets(&self) -> Vec<AssetInfo> {
        self.catalog.assets().await
    }

    pub async fn find_asset(&self, package_id: &str) -> Option<AssetInfo> {
        self.catalog.find_asset(package_id).await
    }

    pub async fn job_definitions(&self) -> Vec<JobDefinition> {
        self.catalog.job_definitions().await
    }

    pub async fn job_definitions_for_type(&self, job_type: &str) -> Vec<JobDefinition> {
        self.catalog.job_definitions_for_type(job_type).await
    }

    pub async fn job_definition_by_id(&self, job_def_id: &str) -> Option<JobDefinition> {
        self.catalog.job_definition_by_id(job_def_id).await
    }

    pub async fn job_definition_latest(
        &self,
        entry_point: &EntryPointReference,
    ) -> Option<JobDefinition> {
        self.catalog.job_definition_latest(entry_point).await
    }

    pub async fn stats(&self) -> Stats {
        self.catalog.stats().await
    }

    pub async fn thumbnail(&self, package_id: &str) -> Option<bytes::Bytes> {
        self.catalog.thumbnail(package_id).await
    }

    pub async fn is_favorite(&self, asset_id: &str) -> bool {
        self.catalog.is_favorite(asset_id).await
    }

    pub async fn favorite_asset(&self, asset_id: &str) -> ClientResult<()> {
        self.catalog.favorite_asset(asset_id).await
    }

    pub async fn unfavorite_asset(&self, asset_id: &str) -> ClientResult<()> {
        self.catalog.unfavorite_asset(asset_id).await
    }

    // ---- packages ----

    pub async fn is_installed(&self, package_id: &str) -> bool {
        self.install.is_installed(package_id).await
    }

    pub async fn installed_packages(&self) -> Vec<String> {
        self.install.installed_packages().await
    }

    /// Installs a catalog package. Unknown package ids are rejected before
    /// any network traffic.
    pub async fn install_package(&self, package_id: &str) -> ClientResult<()> {
        let asset = self
            .catalog
            .find_asset(package_id)
            .await
            .ok_or_else(|| ClientError::NotFound(format!("Unknown package {}", package_id)))?;
        self.install.install(package_id, &asset.name).await
    }

    pub async fn uninstall_package(&self, package_id: &str) -> ClientResult<()> {
        self.install.uninstall(package_id).await
    }

    // ---- jobs ----

    pub async fn execute_job(&self, request: JobRequest) -> ClientResult<JobHandle> {
        self.jobs.execute_job(request).await
    }

    pub async fn execute_for_owner(&self, request: JobRequest) -> ClientResult<Option<JobHandle>> {
        self.jobs.execute_for_owner(request).await
    }

    pub async fn job(&self, handle: JobHandle) -> Option<JobInfo> {
        self.jobs.job(handle).await
    }

    pub async fn jobs(&self) -> Vec<JobInfo> {
        self.jobs.jobs().await
    }

    pub async fn job_progress(&self, handle: JobHandle) -> Option<f64> {
        self.jobs.progress(handle).await
    }

    pub async fn clear_jobs(&self) {
        self.jobs.clear_jobs().await;
    }
}
