// Core type definitions: session/job states, catalog records, events, errors

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::params::ParameterSet;

/// Lifecycle of the authentication session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    None,
    Requesting,
    Created,
    Failed,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionState::None => write!(f, "none"),
            SessionState::Requesting => write!(f, "requesting"),
            SessionState::Created => write!(f, "created"),
            SessionState::Failed => write!(f, "failed"),
        }
    }
}

/// Lifecycle of a single job. The non-failed states form a total order used
/// for progress computation; `Failed` sits outside the ordering and is
/// reachable from any non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobState {
    Invalid,
    Requesting,
    Queued,
    Processing,
    Importing,
    Completed,
    Failed,
}

impl JobState {
    /// Ordinal within the forward ordering. `Failed` has no rank.
    pub fn rank(&self) -> Option<u8> {
        match self {
            JobState::Invalid => Some(0),
            JobState::Requesting => Some(1),
            JobState::Queued => Some(2),
            JobState::Processing => Some(3),
            JobState::Importing => Some(4),
            JobState::Completed => Some(5),
            JobState::Failed => None,
        }
    }

    /// States in which the job is waiting on the remote service.
    pub fn is_waiting(&self) -> bool {
        matches!(self, JobState::Queued | JobState::Processing)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed)
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobState::Invalid => write!(f, "invalid"),
            JobState::Requesting => write!(f, "requesting"),
            JobState::Queued => write!(f, "queued"),
            JobState::Processing => write!(f, "processing"),
            JobState::Importing => write!(f, "importing"),
            JobState::Completed => write!(f, "completed"),
            JobState::Failed => write!(f, "failed"),
        }
    }
}

/// Locally-assigned job identifier, monotonically increasing from 1.
pub type JobHandle = i64;

/// Semantic version of a catalog asset, ordered lexicographically by
/// major/minor/patch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AssetVersion {
    pub major: i32,
    pub minor: i32,
    pub patch: i32,
}

impl AssetVersion {
    pub fn new(major: i32, minor: i32, patch: i32) -> Self {
        Self { major, minor, patch }
    }

    pub fn is_valid(&self) -> bool {
        self.major > 0 || self.minor > 0 || self.patch > 0
    }
}

impl std::fmt::Display for AssetVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Identifies where a job definition came from: a specific entry point inside
/// a specific file of a specific asset version.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntryPointReference {
    pub asset_id: String,
    pub version: AssetVersion,
    pub file_id: String,
    pub file_name: String,
    pub entry_point: String,
}

impl EntryPointReference {
    pub fn is_valid(&self) -> bool {
        !self.asset_id.is_empty() && self.version.is_valid()
    }

    /// Same logical entry point, ignoring the version.
    pub fn matches(&self, other: &EntryPointReference) -> bool {
        self.asset_id == other.asset_id
            && self.file_name == other.file_name
            && self.entry_point == other.entry_point
    }
}

/// Immutable descriptor of a remotely-hosted generation recipe.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobDefinition {
    pub job_def_id: String,
    pub job_type: String,
    pub name: String,
    pub description: String,
    pub parameters: ParameterSet,
    pub source: EntryPointReference,
    pub source_asset_name: String,
    pub source_asset_owner: String,
}

/// Read-only catalog entry for a downloadable package.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetInfo {
    pub asset_id: String,
    pub package_id: String,
    pub name: String,
    pub description: String,
    pub org_name: String,
    pub version: AssetVersion,
    pub tags: Vec<String>,
    pub thumbnail_url: String,
    pub package_url: String,
    pub digital_asset_count: usize,
}

/// Catalog-wide counts over the latest version of each asset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    pub total_packages: usize,
    pub total_digital_assets: usize,
}

/// Snapshot of one in-flight or completed job, as exposed to callers.
#[derive(Debug, Clone)]
pub struct JobInfo {
    pub handle: JobHandle,
    pub job_def_id: String,
    pub state: JobState,
    pub remote_job_id: Option<String>,
    pub import_path: String,
    pub import_directory: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
}

/// Broadcast notifications, delivered over a `tokio::sync::broadcast`
/// channel. Slow subscribers may observe `Lagged` and should re-read the
/// registries.
#[derive(Debug, Clone)]
pub enum ClientEvent {
    SessionStateChanged(SessionState),
    AssetListUpdated,
    JobDefinitionsUpdated,
    FavoritesUpdated,
    ThumbnailLoaded { package_id: String },
    AssetInstalled { package_id: String },
    AssetUninstalled { package_id: String },
    JobStateChanged {
        handle: JobHandle,
        state: JobState,
        message: String,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Malformed response: {0}")]
    Protocol(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Already installed: {0}")]
    AlreadyInstalled(String),

    #[error("Export failed: {0}")]
    Export(String),

    #[error("Import failed: {0}")]
    Import(String),
}

pub type ClientResult<T> = std::result::Result<T, ClientError>;
