use anyhow::Result;
use serde::Deserialize;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Which deployment of the service to talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum Environment {
    Production,
    Staging,
    Local,
}

impl Environment {
    fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "staging" => Environment::Staging,
            "local" => Environment::Local,
            _ => Environment::Production,
        }
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Production => write!(f, "production"),
            Environment::Staging => write!(f, "staging"),
            Environment::Local => write!(f, "local"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct EnvironmentConfig {
    pub service_url: String,
    pub web_url: String,
    pub images_url: String,
    pub api_key: String,
    pub job_def_whitelist: Vec<String>,
    pub asset_whitelist: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JobConfig {
    pub timeout_seconds: u64,
    pub poll_interval_seconds: u64,
}

impl JobConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_seconds)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Scratch space for downloads, exports, and result payloads.
    pub cache_dir: PathBuf,
    /// Where installed packages are imported.
    pub package_install_dir: PathBuf,
    /// Parent directory for generated job results.
    pub generated_import_dir: PathBuf,
    /// Delete export/result scratch files once they are no longer needed.
    pub clean_temp_files: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub environment: Environment,
    pub production: EnvironmentConfig,
    pub staging: EnvironmentConfig,
    pub local: EnvironmentConfig,
    pub jobs: JobConfig,
    pub storage: StorageConfig,
    /// File extensions the host can import from a package.
    pub importable_extensions: Vec<String>,
    /// File extensions usable as a thumbnail image.
    pub image_extensions: Vec<String>,
}

fn split_list(raw: String) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let cache_root = dirs::cache_dir()
            .unwrap_or_else(env::temp_dir)
            .join("meshforge");

        Ok(Self {
            environment: Environment::parse(
                &env::var("MESHFORGE_ENVIRONMENT").unwrap_or_else(|_| "production".to_string()),
            ),
            production: EnvironmentConfig {
                service_url: env::var("MESHFORGE_SERVICE_URL")
                    .unwrap_or_else(|_| "https://api.meshforge.dev".to_string()),
                web_url: env::var("MESHFORGE_WEB_URL")
                    .unwrap_or_else(|_| "https://meshforge.dev".to_string()),
                images_url: env::var("MESHFORGE_IMAGES_URL")
                    .unwrap_or_else(|_| "https://images.meshforge.dev".to_string()),
                api_key: env::var("MESHFORGE_API_KEY").unwrap_or_default(),
                job_def_whitelist: split_list(
                    env::var("MESHFORGE_JOB_DEF_WHITELIST").unwrap_or_default(),
                ),
                asset_whitelist: split_list(
                    env::var("MESHFORGE_ASSET_WHITELIST").unwrap_or_default(),
                ),
            },
            staging: EnvironmentConfig {
                service_url: env::var("MESHFORGE_STAGING_SERVICE_URL")
                    .unwrap_or_else(|_| "https://api-staging.meshforge.dev".to_string()),
                web_url: env::var("MESHFORGE_STAGING_WEB_URL")
                    .unwrap_or_else(|_| "https://staging.meshforge.dev".to_string()),
                images_url: env::var("MESHFORGE_STAGING_IMAGES_URL")
                    .unwrap_or_else(|_| "https://images-staging.meshforge.dev".to_string()),
                api_key: env::var("MESHFORGE_STAGING_API_KEY").unwrap_or_default(),
                job_def_whitelist: split_list(
                    env::var("MESHFORGE_STAGING_JOB_DEF_WHITELIST").unwrap_or_default(),
                ),
                asset_whitelist: split_list(
                    env::var("MESHFORGE_STAGING_ASSET_WHITELIST").unwrap_or_default(),
                ),
            },
            local: EnvironmentConfig {
                service_url: env::var("MESHFORGE_LOCAL_SERVICE_URL")
                    .unwrap_or_else(|_| "http://localhost:8080".to_string()),
                web_url: env::var("MESHFORGE_LOCAL_WEB_URL")
                    .unwrap_or_else(|_| "http://localhost:3000".to_string()),
                images_url: env::var("MESHFORGE_LOCAL_IMAGES_URL")
                    .unwrap_or_else(|_| "http://localhost:8081".to_string()),
                api_key: env::var("MESHFORGE_LOCAL_API_KEY").unwrap_or_default(),
                job_def_whitelist: split_list(
                    env::var("MESHFORGE_LOCAL_JOB_DEF_WHITELIST").unwrap_or_default(),
                ),
                asset_whitelist: split_list(
                    env::var("MESHFORGE_LOCAL_ASSET_WHITELIST").unwrap_or_default(),
                ),
            },
            jobs: JobConfig {
                timeout_seconds: env::var("MESHFORGE_JOB_TIMEOUT_SECONDS")
                    .unwrap_or_else(|_| "120".to_string())
                    .parse()?,
                poll_interval_seconds: env::var("MESHFORGE_POLL_INTERVAL_SECONDS")
                    .unwrap_or_else(|_| "1".to_string())
                    .parse()?,
            },
            storage: StorageConfig {
                cache_dir: env::var("MESHFORGE_CACHE_DIR")
                    .map(PathBuf::from)
                    .unwrap_or(cache_root),
                package_install_dir: env::var("MESHFORGE_PACKAGE_INSTALL_DIR")
                    .map(PathBuf::from)
                    .unwrap_or_else(|_| PathBuf::from("Content/MeshForge/Packages")),
                generated_import_dir: env::var("MESHFORGE_GENERATED_IMPORT_DIR")
                    .map(PathBuf::from)
                    .unwrap_or_else(|_| PathBuf::from("Content/MeshForge/Generated")),
                clean_temp_files: env::var("MESHFORGE_CLEAN_TEMP_FILES")
                    .unwrap_or_else(|_| "true".to_string())
                    .parse()?,
            },
            importable_extensions: split_list(
                env::var("MESHFORGE_IMPORTABLE_EXTENSIONS")
                    .unwrap_or_else(|_| "hda,hdalc,hdanc,otl,otllc,otlnc".to_string()),
            ),
            image_extensions: split_list(
                env::var("MESHFORGE_IMAGE_EXTENSIONS")
                    .unwrap_or_else(|_| "png,jpg,jpeg,gif,webp".to_string()),
            ),
        })
    }

    pub fn active(&self) -> &EnvironmentConfig {
        match self.environment {
            Environment::Production => &self.production,
            Environment::Staging => &self.staging,
            Environment::Local => &self.local,
        }
    }

    pub fn service_url(&self) -> &str {
        &self.active().service_url
    }

    pub fn api_key(&self) -> &str {
        &self.active().api_key
    }

    pub fn job_def_whitelist(&self) -> &[String] {
        &self.active().job_def_whitelist
    }

    pub fn asset_whitelist(&self) -> &[String] {
        &self.active().asset_whitelist
    }

    pub fn images_url(&self) -> &str {
        &self.active().images_url
    }

    pub fn package_url(&self, asset_id: &str, version: &crate::types::AssetVersion) -> String {
        format!(
            "{}/package-view/{}/versions/{}",
            self.active().web_url,
            asset_id,
            version
        )
    }

    fn extension_of(file_name: &str) -> Option<&str> {
        file_name.rsplit_once('.').map(|(_, ext)| ext)
    }

    pub fn is_importable(&self, file_name: &str) -> bool {
        Self::extension_of(file_name)
            .map(|ext| {
                self.importable_extensions
                    .iter()
                    .any(|e| e.eq_ignore_ascii_case(ext))
            })
            .unwrap_or(false)
    }

    pub fn is_thumbnail_image(&self, file_name: &str) -> bool {
        Self::extension_of(file_name)
            .map(|ext| {
                self.image_extensions
                    .iter()
                    .any(|e| e.eq_ignore_ascii_case(ext))
            })
            .unwrap_or(false)
    }
}
