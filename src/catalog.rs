// Catalog registry: read-mostly lists of job definitions, packages,
// favorites, and a thumbnail cache. Refreshes are fire-and-forget fetches
// that append independently; a pending-request counter signals when a
// definition refresh has drained.

use bytes::Bytes;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tracing::{info, warn};

use crate::config::Config;
use crate::http::ApiClient;
use crate::types::{
    AssetInfo, AssetVersion, ClientEvent, ClientResult, EntryPointReference, JobDefinition, Stats,
};

#[derive(Default)]
struct CatalogState {
    job_definitions: Vec<JobDefinition>,
    assets: Vec<AssetInfo>,
    favorites: HashSet<String>,
    thumbnails: HashMap<String, Bytes>,
    stats: Stats,
}

/// An asset-version record as returned by the asset and favorites
/// endpoints. Carries enough context to fetch and label the job
/// definitions scoped to it.
struct AssetVersionRecord {
    asset_id: String,
    name: String,
    owner_name: String,
    version: AssetVersion,
    /// file_id -> file_name, used to resolve definition source files.
    files: HashMap<String, String>,
}

#[derive(Clone)]
pub struct CatalogRegistry {
    api: ApiClient,
    config: Arc<Config>,
    events: broadcast::Sender<ClientEvent>,
    inner: Arc<RwLock<CatalogState>>,
    pending: Arc<AtomicUsize>,
}

fn parse_version(value: &Value) -> Option<AssetVersion> {
    let array = value.as_array()?;
    if array.len() != 3 {
        return None;
    }
    Some(AssetVersion::new(
        array[0].as_i64()? as i32,
        array[1].as_i64()? as i32,
        array[2].as_i64()? as i32,
    ))
}

fn string_field(object: &Value, field: &str) -> String {
    object
        .get(field)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

impl CatalogRegistry {
    pub fn new(api: ApiClient, config: Arc<Config>, events: broadcast::Sender<ClientEvent>) -> Self {
        Self {
            api,
            config,
            events,
            inner: Arc::new(RwLock::new(CatalogState::default())),
            pending: Arc::new(AtomicUsize::new(0)),
        }
    }

    // ---- lookups ----

    pub async fn assets(&self) -> Vec<AssetInfo> {
        self.inner.read().await.assets.clone()
    }

    pub async fn find_asset(&self, package_id: &str) -> Option<AssetInfo> {
        let state = self.inner.read().await;
        state
            .assets
            .iter()
            .find(|a| a.package_id == package_id)
            .cloned()
    }

    pub async fn job_definitions(&self) -> Vec<JobDefinition> {
        self.inner.read().await.job_definitions.clone()
    }

    pub async fn job_definitions_for_type(&self, job_type: &str) -> Vec<JobDefinition> {
        let state = self.inner.read().await;
        state
            .job_definitions
            .iter()
            .filter(|d| d.job_type == job_type)
            .cloned()
            .collect()
    }

    pub async fn job_definition_by_id(&self, job_def_id: &str) -> Option<JobDefinition> {
        let state = self.inner.read().await;
        state
            .job_definitions
            .iter()
            .find(|d| d.job_def_id == job_def_id)
            .cloned()
    }

    /// The highest-version definition whose source matches the given entry
    /// point, ignoring the version.
    pub async fn job_definition_latest(
        &self,
        entry_point: &EntryPointReference,
    ) -> Option<JobDefinition> {
        if !entry_point.is_valid() {
            return None;
        }
        let state = self.inner.read().await;
        state
            .job_definitions
            .iter()
            .filter(|d| entry_point.matches(&d.source))
            .max_by_key(|d| d.source.version)
            .cloned()
    }

    pub async fn is_favorite(&self, asset_id: &str) -> bool {
        self.inner.read().await.favorites.contains(asset_id)
    }

    pub async fn stats(&self) -> Stats {
        self.inner.read().await.stats
    }

    pub async fn thumbnail(&self, package_id: &str) -> Option<Bytes> {
        self.inner.read().await.thumbnails.get(package_id).cloned()
    }

    /// Drops all cached catalog data. Thumbnails are kept; they are keyed
    /// by content and stay valid across sessions.
    pub async fn clear(&self) {
        let mut state = self.inner.write().await;
        state.job_definitions.clear();
        state.assets.clear();
        state.favorites.clear();
        state.stats = Stats::default();
    }

    // ---- job definition refresh ----

    /// Clears the definition and favorite lists and issues independent
    /// fetches for every whitelisted job definition, every whitelisted
    /// asset, and the favorites group. Completions append first-wins by
    /// definition id; `JobDefinitionsUpdated` fires once all issued
    /// requests have drained. The list is readable before that, eventually
    /// consistent.
    pub async fn update_job_definition_list(&self) {
        {
            let mut state = self.inner.write().await;
            state.job_definitions.clear();
            state.favorites.clear();
        }

        let job_def_ids: Vec<String> = self.config.job_def_whitelist().to_vec();
        let asset_ids: Vec<String> = self.config.asset_whitelist().to_vec();

        // whitelisted definitions + whitelisted assets + favorites group
        self.pending
            .fetch_add(job_def_ids.len() + asset_ids.len() + 1, Ordering::SeqCst);

        for job_def_id in job_def_ids {
            let this = self.clone();
            tokio::spawn(async move {
                if let Err(e) = this.fetch_job_definition(&job_def_id).await {
                    warn!(job_def_id, "Failed to fetch job definition: {}", e);
                }
                this.finish_pending();
            });
        }

        for asset_id in asset_ids {
            let this = self.clone();
            tokio::spawn(async move {
                if let Err(e) = this.fetch_definitions_for_asset(&asset_id).await {
                    warn!(asset_id, "Failed to fetch asset job definitions: {}", e);
                }
                this.finish_pending();
            });
        }

        let this = self.clone();
        tokio::spawn(async move {
            if let Err(e) = this.fetch_favorites().await {
                warn!("Failed to fetch favorite assets: {}", e);
            }
            this.finish_pending();
        });
    }

    fn finish_pending(&self) {
        if self.pending.fetch_sub(1, Ordering::SeqCst) == 1 {
            let _ = self.events.send(ClientEvent::JobDefinitionsUpdated);
        }
    }

    async fn fetch_job_definition(&self, job_def_id: &str) -> ClientResult<()> {
        let value = self
            .api
            .get_json(&format!("/v1/jobs/definitions/{}", job_def_id))
            .await?;
        if let Some(definition) = self.parse_definition(&value, None) {
            self.add_definition(definition).await;
        }
        Ok(())
    }

    async fn fetch_definitions_for_asset(&self, asset_id: &str) -> ClientResult<()> {
        let value = self.api.get_json(&format!("/v1/assets/{}", asset_id)).await?;
        let Some(first) = value.as_array().and_then(|a| a.first()) else {
            warn!(asset_id, "Asset has no versions");
            return Ok(());
        };
        if let Some(record) = parse_asset_version_record(first) {
            self.fetch_definitions_for_record(&record).await?;
        }
        Ok(())
    }

    async fn fetch_favorites(&self) -> ClientResult<()> {
        let value = self.api.get_json_auth("/v1/assets/g/unreal").await?;
        let records = value.as_array().cloned().unwrap_or_default();

        for record in &records {
            let asset_id = string_field(record, "asset_id");
            if asset_id.is_empty() {
                continue;
            }
            {
                let mut state = self.inner.write().await;
                state.favorites.insert(asset_id);
            }
            if let Some(record) = parse_asset_version_record(record) {
                if let Err(e) = self.fetch_definitions_for_record(&record).await {
                    warn!(asset_id = %record.asset_id, "Failed to fetch favorite definitions: {}", e);
                }
            }
        }

        let _ = self.events.send(ClientEvent::FavoritesUpdated);
        Ok(())
    }

    async fn fetch_definitions_for_record(&self, record: &AssetVersionRecord) -> ClientResult<()> {
        let path = format!(
            "/v1/jobs/definitions/by_asset/{}/versions/{}/{}/{}",
            record.asset_id, record.version.major, record.version.minor, record.version.patch
        );
        let value = self.api.get_json(&path).await?;
        let definitions = value.as_array().cloned().unwrap_or_default();
        for definition in &definitions {
            if let Some(definition) = self.parse_definition(definition, Some(record)) {
                self.add_definition(definition).await;
            }
        }
        Ok(())
    }

    /// Builds a definition from a response object. When `record` is given
    /// the definition's source reference is resolved against the record's
    /// file list; definitions with an unknown source file are dropped.
    fn parse_definition(
        &self,
        value: &Value,
        record: Option<&AssetVersionRecord>,
    ) -> Option<JobDefinition> {
        let job_def_id = string_field(value, "job_def_id");
        if job_def_id.is_empty() {
            warn!("Job definition response missing id");
            return None;
        }

        let schema = value
            .get("params_schema")
            .and_then(|s| s.get("params"))
            .and_then(Value::as_object);
        let parameters = schema.map(crate::params::read_parameters).unwrap_or_default();

        let (source, source_asset_name, source_asset_owner) = match record {
            Some(record) => {
                let source_object = value.get("source")?;
                let file_id = string_field(source_object, "file_id");
                let Some(file_name) = record.files.get(&file_id) else {
                    warn!(job_def_id, "Job definition references unknown source file");
                    return None;
                };
                let source = EntryPointReference {
                    asset_id: string_field(source_object, "asset_id"),
                    version: AssetVersion::new(
                        source_object.get("major").and_then(Value::as_i64).unwrap_or(0) as i32,
                        source_object.get("minor").and_then(Value::as_i64).unwrap_or(0) as i32,
                        source_object.get("patch").and_then(Value::as_i64).unwrap_or(0) as i32,
                    ),
                    file_id,
                    file_name: file_name.clone(),
                    entry_point: string_field(source_object, "entry_point"),
                };
                (source, record.name.clone(), record.owner_name.clone())
            }
            None => (EntryPointReference::default(), String::new(), String::new()),
        };

        Some(JobDefinition {
            job_def_id,
            job_type: string_field(value, "job_type"),
            name: string_field(value, "name"),
            description: string_field(value, "description"),
            parameters,
            source,
            source_asset_name,
            source_asset_owner,
        })
    }

    /// First response for a given definition id wins; later duplicates are
    /// discarded.
    async fn add_definition(&self, definition: JobDefinition) {
        let mut state = self.inner.write().await;
        if state
            .job_definitions
            .iter()
            .any(|d| d.job_def_id == definition.job_def_id)
        {
            return;
        }
        state.job_definitions.push(definition);
    }

    // ---- asset list refresh ----

    /// Fetches the top asset list and replaces the cached list wholesale on
    /// success. Recomputes stats, then kicks off thumbnail downloads for
    /// any uncached thumbnail URL. A fetch error leaves prior data intact.
    pub async fn update_asset_list(&self) -> ClientResult<()> {
        let value = self.api.get_json("/v1/assets/top").await?;
        let records = value.as_array().cloned().unwrap_or_default();

        let mut assets = Vec::with_capacity(records.len());
        for record in &records {
            if let Some(asset) = self.parse_asset(record) {
                assets.push(asset);
            }
        }
        info!(count = assets.len(), "Updated asset list");

        {
            let mut state = self.inner.write().await;
            state.assets = assets;
            state.stats = compute_stats(&state.assets);
        }
        let _ = self.events.send(ClientEvent::AssetListUpdated);

        self.load_thumbnails().await;
        Ok(())
    }

    fn parse_asset(&self, value: &Value) -> Option<AssetInfo> {
        let package_id = string_field(value, "package_id");
        let name = string_field(value, "name");
        if package_id.is_empty() {
            warn!(name, "Skipping package with missing id");
            return None;
        }
        let asset_id = string_field(value, "asset_id");
        let version = parse_version(value.get("version")?)?;
        let contents = value.get("contents")?.as_object()?;

        let digital_asset_count = contents
            .get("files")
            .and_then(Value::as_array)
            .map(|files| {
                files
                    .iter()
                    .filter(|f| self.config.is_importable(&string_field(f, "file_name")))
                    .count()
            })
            .unwrap_or(0);

        let thumbnail_url = contents
            .get("thumbnails")
            .and_then(Value::as_array)
            .and_then(|thumbnails| {
                thumbnails.iter().find_map(|t| {
                    let file_name = string_field(t, "file_name");
                    if !self.config.is_thumbnail_image(&file_name) {
                        return None;
                    }
                    let extension = file_name.rsplit_once('.').map(|(_, e)| e)?;
                    let content_hash = string_field(t, "content_hash");
                    Some(format!(
                        "{}/{}.{}",
                        self.config.images_url(),
                        content_hash,
                        extension
                    ))
                })
            })
            .unwrap_or_default();

        let tags = value
            .get("tags")
            .and_then(Value::as_array)
            .map(|tags| {
                tags.iter()
                    .filter_map(|t| t.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default();

        let package_url = self.config.package_url(&asset_id, &version);

        Some(AssetInfo {
            asset_id,
            package_id,
            name,
            description: string_field(value, "description"),
            org_name: string_field(value, "org_name"),
            version,
            tags,
            thumbnail_url,
            package_url,
            digital_asset_count,
        })
    }

    async fn load_thumbnails(&self) {
        let targets: Vec<(String, String)> = {
            let state = self.inner.read().await;
            state
                .assets
                .iter()
                .filter(|a| {
                    !a.thumbnail_url.is_empty() && !state.thumbnails.contains_key(&a.package_id)
                })
                .map(|a| (a.package_id.clone(), a.thumbnail_url.clone()))
                .collect()
        };

        for (package_id, url) in targets {
            let this = self.clone();
            tokio::spawn(async move {
                match this.api.get_bytes(&url).await {
                    Ok(bytes) => {
                        {
                            let mut state = this.inner.write().await;
                            state.thumbnails.insert(package_id.clone(), bytes);
                        }
                        let _ = this
                            .events
                            .send(ClientEvent::ThumbnailLoaded { package_id });
                    }
                    Err(e) => {
                        warn!(package_id, "Failed to download thumbnail: {}", e);
                    }
                }
            });
        }
    }

    // ---- favorites ----

    pub async fn favorite_asset(&self, asset_id: &str) -> ClientResult<()> {
        self.set_favorite(asset_id, true).await
    }

    pub async fn unfavorite_asset(&self, asset_id: &str) -> ClientResult<()> {
        self.set_favorite(asset_id, false).await
    }

    async fn set_favorite(&self, asset_id: &str, favorite: bool) -> ClientResult<()> {
        let path = format!("/v1/assets/g/unreal/{}/versions/0.0.0", asset_id);
        if favorite {
            self.api
                .post_json_auth(&path, &Value::Object(Default::default()))
                .await?;
        } else {
            self.api.delete_auth(&path).await?;
        }
        self.update_job_definition_list().await;
        Ok(())
    }
}

fn parse_asset_version_record(value: &Value) -> Option<AssetVersionRecord> {
    let asset_id = string_field(value, "asset_id");
    if asset_id.is_empty() {
        return None;
    }
    let version = parse_version(value.get("version")?)?;
    let files = value
        .get("contents")
        .and_then(|c| c.get("files"))
        .and_then(Value::as_array)
        .map(|files| {
            files
                .iter()
                .filter_map(|f| {
                    let file_id = string_field(f, "file_id");
                    let file_name = string_field(f, "file_name");
                    if file_id.is_empty() {
                        None
                    } else {
                        Some((file_id, file_name))
                    }
                })
                .collect()
        })
        .unwrap_or_default();

    Some(AssetVersionRecord {
        asset_id,
        name: string_field(value, "name"),
        owner_name: string_field(value, "owner_name"),
        version,
        files,
    })
}

/// Package and digital-asset totals over the latest version of each asset.
fn compute_stats(assets: &[AssetInfo]) -> Stats {
    let mut latest: HashMap<&str, &AssetInfo> = HashMap::new();
    for asset in assets {
        latest
            .entry(&asset.asset_id)
            .and_modify(|existing| {
                if existing.version < asset.version {
                    *existing = asset;
                }
            })
            .or_insert(asset);
    }

    Stats {
        total_packages: latest.len(),
        total_digital_assets: latest.values().map(|a| a.digital_asset_count).sum(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Environment, EnvironmentConfig, JobConfig, StorageConfig};
    use crate::http::TokenHandle;
    use serde_json::json;
    use std::path::PathBuf;
    use std::time::Duration;

    fn test_config(server_url: &str, job_defs: Vec<String>, assets: Vec<String>) -> Config {
        let env = EnvironmentConfig {
            service_url: server_url.to_string(),
            web_url: "https://meshforge.dev".to_string(),
            images_url: server_url.to_string(),
            api_key: "key".to_string(),
            job_def_whitelist: job_defs,
            asset_whitelist: assets,
        };
        Config {
            environment: Environment::Local,
            production: env.clone(),
            staging: env.clone(),
            local: env,
            jobs: JobConfig {
                timeout_seconds: 120,
                poll_interval_seconds: 1,
            },
            storage: StorageConfig {
                cache_dir: PathBuf::from("/tmp/meshforge"),
                package_install_dir: PathBuf::from("packages"),
                generated_import_dir: PathBuf::from("generated"),
                clean_temp_files: true,
            },
            importable_extensions: vec!["hda".into()],
            image_extensions: vec!["png".into()],
        }
    }

    fn registry(
        server_url: &str,
        job_defs: Vec<String>,
        assets: Vec<String>,
        token: Option<&str>,
    ) -> (CatalogRegistry, broadcast::Receiver<ClientEvent>) {
        let token: TokenHandle = Arc::new(RwLock::new(token.map(str::to_string)));
        let (events, rx) = broadcast::channel(64);
        let api = ApiClient::new(server_url.to_string(), token);
        let config = Arc::new(test_config(server_url, job_defs, assets));
        (CatalogRegistry::new(api, config, events), rx)
    }

    async fn wait_for_refresh(rx: &mut broadcast::Receiver<ClientEvent>) {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                if let Ok(ClientEvent::JobDefinitionsUpdated) = rx.recv().await {
                    break;
                }
            }
        })
        .await
        .expect("definition refresh did not complete");
    }

    fn definition_body(job_def_id: &str) -> String {
        json!({
            "job_def_id": job_def_id,
            "job_type": "houdini::generate_mesh",
            "name": "Rock Generator",
            "description": "Generates rocks",
            "params_schema": {
                "params": {
                    "iterations": {"label": "Iterations", "param_type": "int", "default": 4},
                }
            }
        })
        .to_string()
    }

    #[tokio::test]
    async fn test_whitelisted_definition_fetch() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/v1/jobs/definitions/jobdef_A")
            .with_status(200)
            .with_body(definition_body("jobdef_A"))
            .create_async()
            .await;
        server
            .mock("GET", "/v1/assets/g/unreal")
            .with_status(200)
            .with_body("[]")
            .create_async()
            .await;

        let (registry, mut rx) =
            registry(&server.url(), vec!["jobdef_A".into()], vec![], Some("tok"));
        registry.update_job_definition_list().await;
        wait_for_refresh(&mut rx).await;

        let definition = registry.job_definition_by_id("jobdef_A").await.unwrap();
        assert_eq!(definition.name, "Rock Generator");
        assert_eq!(definition.parameters.parameters.len(), 1);
        assert_eq!(definition.parameters.parameters[0].name, "iterations");
    }

    #[tokio::test]
    async fn test_duplicate_definitions_first_wins() {
        let mut server = mockito::Server::new_async().await;
        // two whitelisted ids resolving to the same definition id
        server
            .mock("GET", "/v1/jobs/definitions/jobdef_A")
            .with_status(200)
            .with_body(definition_body("jobdef_A"))
            .create_async()
            .await;
        server
            .mock("GET", "/v1/jobs/definitions/jobdef_B")
            .with_status(200)
            .with_body(definition_body("jobdef_A"))
            .create_async()
            .await;
        server
            .mock("GET", "/v1/assets/g/unreal")
            .with_status(200)
            .with_body("[]")
            .create_async()
            .await;

        let (registry, mut rx) = registry(
            &server.url(),
            vec!["jobdef_A".into(), "jobdef_B".into()],
            vec![],
            Some("tok"),
        );
        registry.update_job_definition_list().await;
        wait_for_refresh(&mut rx).await;

        assert_eq!(registry.job_definitions().await.len(), 1);
    }

    #[tokio::test]
    async fn test_favorites_marked_and_fetched() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/v1/assets/g/unreal")
            .match_header("authorization", "Bearer tok")
            .with_status(200)
            .with_body(
                json!([{
                    "asset_id": "asset_1",
                    "name": "Rocks",
                    "owner_name": "alice",
                    "version": [1, 2, 0],
                    "contents": {"files": [{"file_id": "file_9", "file_name": "rocks.hda"}]}
                }])
                .to_string(),
            )
            .create_async()
            .await;
        server
            .mock("GET", "/v1/jobs/definitions/by_asset/asset_1/versions/1/2/0")
            .with_status(200)
            .with_body(
                json!([{
                    "job_def_id": "jobdef_F",
                    "job_type": "houdini::generate_mesh",
                    "name": "Rocks",
                    "description": "",
                    "params_schema": {"params": {}},
                    "source": {
                        "asset_id": "asset_1", "major": 1, "minor": 2, "patch": 0,
                        "file_id": "file_9", "entry_point": "main"
                    }
                }])
                .to_string(),
            )
            .create_async()
            .await;

        let (registry, mut rx) = registry(&server.url(), vec![], vec![], Some("tok"));
        registry.update_job_definition_list().await;
        wait_for_refresh(&mut rx).await;

        assert!(registry.is_favorite("asset_1").await);
        let definition = registry.job_definition_by_id("jobdef_F").await.unwrap();
        assert_eq!(definition.source.file_name, "rocks.hda");
        assert_eq!(definition.source_asset_name, "Rocks");
        assert_eq!(definition.source_asset_owner, "alice");
        assert_eq!(definition.source.version, AssetVersion::new(1, 2, 0));
    }

    #[tokio::test]
    async fn test_asset_list_replacement_and_stats() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/v1/assets/top")
            .with_status(200)
            .with_body(
                json!([
                    {
                        "asset_id": "asset_1", "package_id": "pkg_1", "name": "Rocks v1",
                        "description": "", "org_name": "acme", "version": [1, 0, 0],
                        "contents": {"files": [{"file_name": "a.hda"}, {"file_name": "readme.txt"}]}
                    },
                    {
                        "asset_id": "asset_1", "package_id": "pkg_2", "name": "Rocks v2",
                        "description": "", "org_name": "acme", "version": [2, 0, 0],
                        "contents": {"files": [{"file_name": "a.hda"}, {"file_name": "b.hda"}]}
                    },
                    {
                        "asset_id": "asset_2", "package_id": "pkg_3", "name": "Trees",
                        "description": "", "org_name": "acme", "version": [1, 0, 0],
                        "contents": {"files": [{"file_name": "t.hda"}]}
                    }
                ])
                .to_string(),
            )
            .create_async()
            .await;

        let (registry, _rx) = registry(&server.url(), vec![], vec![], None);
        registry.update_asset_list().await.unwrap();

        assert_eq!(registry.assets().await.len(), 3);
        // stats count latest versions only: asset_1 v2 (2 files) + asset_2 (1)
        let stats = registry.stats().await;
        assert_eq!(stats.total_packages, 2);
        assert_eq!(stats.total_digital_assets, 3);

        let asset = registry.find_asset("pkg_2").await.unwrap();
        assert_eq!(asset.digital_asset_count, 2);
        assert_eq!(
            asset.package_url,
            "https://meshforge.dev/package-view/asset_1/versions/2.0.0"
        );
    }

    #[tokio::test]
    async fn test_asset_list_error_keeps_prior_data() {
        let mut server = mockito::Server::new_async().await;
        let ok = server
            .mock("GET", "/v1/assets/top")
            .with_status(200)
            .with_body(
                json!([{
                    "asset_id": "asset_1", "package_id": "pkg_1", "name": "Rocks",
                    "description": "", "org_name": "acme", "version": [1, 0, 0],
                    "contents": {"files": []}
                }])
                .to_string(),
            )
            .expect(1)
            .create_async()
            .await;

        let (registry, _rx) = registry(&server.url(), vec![], vec![], None);
        registry.update_asset_list().await.unwrap();
        ok.remove_async().await;

        server
            .mock("GET", "/v1/assets/top")
            .with_status(500)
            .with_body("boom")
            .create_async()
            .await;

        assert!(registry.update_asset_list().await.is_err());
        assert_eq!(registry.assets().await.len(), 1);
    }

    #[tokio::test]
    async fn test_thumbnail_download_and_cache() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/v1/assets/top")
            .with_status(200)
            .with_body(
                json!([{
                    "asset_id": "asset_1", "package_id": "pkg_1", "name": "Rocks",
                    "description": "", "org_name": "acme", "version": [1, 0, 0],
                    "contents": {
                        "files": [],
                        "thumbnails": [
                            {"file_name": "model.fbx", "content_hash": "zzz"},
                            {"file_name": "preview.png", "content_hash": "abc123"}
                        ]
                    }
                }])
                .to_string(),
            )
            .create_async()
            .await;
        server
            .mock("GET", "/abc123.png")
            .with_status(200)
            .with_body(b"pngbytes".as_slice())
            .create_async()
            .await;

        let (registry, mut rx) = registry(&server.url(), vec![], vec![], None);
        registry.update_asset_list().await.unwrap();

        // first displayable image wins
        let asset = registry.find_asset("pkg_1").await.unwrap();
        assert!(asset.thumbnail_url.ends_with("/abc123.png"));

        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                if let Ok(ClientEvent::ThumbnailLoaded { package_id }) = rx.recv().await {
                    assert_eq!(package_id, "pkg_1");
                    break;
                }
            }
        })
        .await
        .expect("thumbnail did not load");

        let bytes = registry.thumbnail("pkg_1").await.unwrap();
        assert_eq!(bytes.as_ref(), b"pngbytes");
    }

    #[tokio::test]
    async fn test_job_definition_latest_picks_highest_version() {
        let (registry, _rx) = registry("http://127.0.0.1:1", vec![], vec![], None);

        let make = |id: &str, version: AssetVersion| JobDefinition {
            job_def_id: id.to_string(),
            job_type: "houdini::generate_mesh".to_string(),
            name: id.to_string(),
            description: String::new(),
            parameters: Default::default(),
            source: EntryPointReference {
                asset_id: "asset_1".to_string(),
                version,
                file_id: format!("file_{}", id),
                file_name: "rocks.hda".to_string(),
                entry_point: "main".to_string(),
            },
            source_asset_name: "Rocks".to_string(),
            source_asset_owner: "alice".to_string(),
        };

        registry.add_definition(make("old", AssetVersion::new(1, 0, 0))).await;
        registry.add_definition(make("new", AssetVersion::new(1, 4, 0))).await;
        registry.add_definition(make("mid", AssetVersion::new(1, 2, 0))).await;

        let reference = EntryPointReference {
            asset_id: "asset_1".to_string(),
            version: AssetVersion::new(1, 0, 0),
            file_id: String::new(),
            file_name: "rocks.hda".to_string(),
            entry_point: "main".to_string(),
        };
        let latest = registry.job_definition_latest(&reference).await.unwrap();
        assert_eq!(latest.job_def_id, "new");

        let invalid = EntryPointReference::default();
        assert!(registry.job_definition_latest(&invalid).await.is_none());
    }
}
