// MeshForge client - editor-side session and job orchestration for the
// MeshForge procedural generation service

pub mod adapters;  // Host-injected scene export and asset import traits
pub mod catalog;
pub mod client;
pub mod config;
pub mod http;
pub mod install;
pub mod jobs;
pub mod params;    // Parameter schema codec shared with the service
pub mod session;
pub mod types;

// Re-exports for convenience
pub use adapters::{AssetImporter, InputExporter, InputSource, PackageFile, TransformSpace};
pub use client::MeshForgeClient;
pub use config::Config;
pub use jobs::JobRequest;
pub use params::{copy_parameter_values, Parameter, ParameterSet, ParameterValue};
pub use types::{
    AssetInfo, AssetVersion, ClientError, ClientEvent, ClientResult, EntryPointReference,
    JobDefinition, JobHandle, JobInfo, JobState, SessionState, Stats,
};
