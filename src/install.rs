// Package installation: downloads a package archive, unpacks it, imports
// its digital assets through the host importer, and tracks what is
// installed on disk via a per-package marker file.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tracing::{info, warn};

use crate::adapters::{AssetImporter, PackageFile};
use crate::config::Config;
use crate::http::ApiClient;
use crate::types::{ClientError, ClientEvent, ClientResult};

const MARKER_FILE: &str = "package_info.json";

/// On-disk marker written into each installed package directory. Its
/// presence is what makes a directory an installed package on rescan.
#[derive(Debug, Serialize, Deserialize)]
struct PackageMarker {
    package_id: String,
}

#[derive(Clone)]
pub struct InstallManager {
    api: ApiClient,
    config: Arc<Config>,
    importer: Arc<dyn AssetImporter>,
    events: broadcast::Sender<ClientEvent>,
    /// package_id -> install directory.
    installed: Arc<RwLock<HashMap<String, PathBuf>>>,
}

impl InstallManager {
    pub fn new(
        api: ApiClient,
        config: Arc<Config>,
        importer: Arc<dyn AssetImporter>,
        events: broadcast::Sender<ClientEvent>,
    ) -> Self {
        Self {
            api,
            config,
            importer,
            events,
            installed: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn is_installed(&self, package_id: &str) -> bool {
        self.installed.read().await.contains_key(package_id)
    }

    pub async fn installed_packages(&self) -> Vec<String> {
        self.installed.read().await.keys().cloned().collect()
    }

    pub async fn install_directory(&self, package_id: &str) -> Option<PathBuf> {
        self.installed.read().await.get(package_id).cloned()
    }

    /// Scans the install root for package directories carrying a marker
    /// file and rebuilds the installed map. Duplicate package ids are
    /// logged and skipped.
    pub async fn load_installed(&self) -> ClientResult<()> {
        let root = &self.config.storage.package_install_dir;
        let mut installed = HashMap::new();

        if root.is_dir() {
            let mut entries = tokio::fs::read_dir(root).await?;
            while let Some(entry) = entries.next_entry().await? {
                let dir = entry.path();
                if !dir.is_dir() {
                    continue;
                }
                let Some(marker) = read_marker(&dir).await else {
                    continue;
                };
                if installed.contains_key(&marker.package_id) {
                    warn!(
                        package_id = marker.package_id,
                        dir = %dir.display(),
                        "Duplicate installed package, skipping"
                    );
                    continue;
                }
                installed.insert(marker.package_id, dir);
            }
        }

        info!(count = installed.len(), "Loaded installed package list");
        *self.installed.write().await = installed;
        Ok(())
    }

    /// Downloads, unpacks, and imports a package. The archive lands in the
    /// cache, importable files are imported into a fresh directory under
    /// the install root, and a marker file records the package id.
    pub async fn install(&self, package_id: &str, package_name: &str) -> ClientResult<()> {
        if self.is_installed(package_id).await {
            return Err(ClientError::AlreadyInstalled(package_id.to_string()));
        }

        let (bytes, _content_type) = self.api.download(package_id).await?;

        let cache_dir = self.config.storage.cache_dir.join("packages");
        tokio::fs::create_dir_all(&cache_dir).await?;
        let archive_path = cache_dir.join(format!("{}.zip", package_id));
        tokio::fs::write(&archive_path, &bytes).await?;

        let unpack_dir = cache_dir.join(package_id);
        let files = unpack_archive(&archive_path, &unpack_dir).await?;

        let importable: Vec<PackageFile> = files
            .into_iter()
            .filter(|f| self.config.is_importable(&f.file_name))
            .collect();
        if importable.is_empty() {
            return Err(ClientError::Import(format!(
                "Package {} contains no importable files",
                package_id
            )));
        }

        let install_dir = unique_path(
            &self.config.storage.package_install_dir.join(package_name),
        );
        tokio::fs::create_dir_all(&install_dir).await?;

        let imported = self
            .importer
            .import_package_files(&importable, &install_dir)
            .await?;
        info!(
            package_id,
            count = imported.len(),
            dir = %install_dir.display(),
            "Installed package"
        );

        let marker = PackageMarker {
            package_id: package_id.to_string(),
        };
        let marker_json = serde_json::to_string_pretty(&marker)
            .map_err(|e| ClientError::Io(std::io::Error::other(e)))?;
        tokio::fs::write(install_dir.join(MARKER_FILE), marker_json).await?;

        if self.config.storage.clean_temp_files {
            let _ = tokio::fs::remove_file(&archive_path).await;
            let _ = tokio::fs::remove_dir_all(&unpack_dir).await;
        }

        self.installed
            .write()
            .await
            .insert(package_id.to_string(), install_dir);
        let _ = self.events.send(ClientEvent::AssetInstalled {
            package_id: package_id.to_string(),
        });
        Ok(())
    }

    /// Removes an installed package: host-side assets first, then the
    /// package directory. If the importer cannot account for the assets it
    /// registered the uninstall aborts with the files left in place.
    pub async fn uninstall(&self, package_id: &str) -> ClientResult<()> {
        let dir = self
            .install_directory(package_id)
            .await
            .ok_or_else(|| ClientError::NotFound(format!("Package {} is not installed", package_id)))?;

        self.importer.remove_imported(&dir).await?;
        tokio::fs::remove_dir_all(&dir).await?;

        self.installed.write().await.remove(package_id);
        info!(package_id, "Uninstalled package");
        let _ = self.events.send(ClientEvent::AssetUninstalled {
            package_id: package_id.to_string(),
        });
        Ok(())
    }
}

async fn read_marker(dir: &Path) -> Option<PackageMarker> {
    let raw = tokio::fs::read(dir.join(MARKER_FILE)).await.ok()?;
    match serde_json::from_slice(&raw) {
        Ok(marker) => Some(marker),
        Err(e) => {
            warn!(dir = %dir.display(), "Unreadable package marker: {}", e);
            None
        }
    }
}

/// First non-existing path among `base`, `base_1`, `base_2`, ...
pub(crate) fn unique_path(base: &Path) -> PathBuf {
    if !base.exists() {
        return base.to_path_buf();
    }
    let mut counter = 1;
    loop {
        let candidate = PathBuf::from(format!("{}_{}", base.display(), counter));
        if !candidate.exists() {
            return candidate;
        }
        counter += 1;
    }
}

/// Extracts every file in the archive under `dest` and lists them. Entry
/// paths are flattened to their file names.
async fn unpack_archive(archive_path: &Path, dest: &Path) -> ClientResult<Vec<PackageFile>> {
    let archive_path = archive_path.to_path_buf();
    let dest = dest.to_path_buf();

    // zip reads are synchronous
    tokio::task::spawn_blocking(move || {
        std::fs::create_dir_all(&dest)?;
        let file = std::fs::File::open(&archive_path)?;
        let mut archive = zip::ZipArchive::new(file)
            .map_err(|e| ClientError::Protocol(format!("Malformed package archive: {}", e)))?;

        let mut files = Vec::new();
        for index in 0..archive.len() {
            let mut entry = archive
                .by_index(index)
                .map_err(|e| ClientError::Protocol(format!("Malformed package archive: {}", e)))?;
            if entry.is_dir() {
                continue;
            }
            let Some(file_name) = entry
                .enclosed_name()
                .and_then(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
            else {
                continue;
            };

            let mut data = Vec::with_capacity(entry.size() as usize);
            entry.read_to_end(&mut data)?;
            let path = dest.join(&file_name);
            std::fs::write(&path, &data)?;
            files.push(PackageFile { path, file_name });
        }
        Ok(files)
    })
    .await
    .map_err(|e| ClientError::Io(std::io::Error::other(e)))?
}
