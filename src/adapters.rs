// External collaborator interfaces: scene export and asset import are
// engine-specific and injected by the host application.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::types::ClientResult;

/// Coordinate space used when exporting scene geometry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransformSpace {
    #[default]
    Relative,
    World,
}

/// What a file-kind parameter points at in the host scene. Engine objects
/// are referenced by their host-side path or identifier; the exporter
/// resolves them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum InputSource {
    Mesh { asset_path: String },
    WorldActors { actors: Vec<String> },
    Spline { actor: String },
    Volume { actor: String },
}

/// One file extracted from an installed package, handed to the importer.
#[derive(Debug, Clone)]
pub struct PackageFile {
    pub path: PathBuf,
    pub file_name: String,
}

/// Converts a scene input into a file the service can consume.
#[async_trait]
pub trait InputExporter: Send + Sync {
    /// Exports `source` into a file under `dest_dir` and returns its path.
    async fn export_input(
        &self,
        source: &InputSource,
        origin: [f64; 3],
        transform: TransformSpace,
        dest_dir: &Path,
    ) -> ClientResult<PathBuf>;
}

/// Brings generated or packaged files into the host project.
#[async_trait]
pub trait AssetImporter: Send + Sync {
    /// Imports a generated result file into `dest_dir`, returning the
    /// resolved import directory.
    async fn import_result(&self, file: &Path, dest_dir: &Path) -> ClientResult<String>;

    /// Imports the importable files of an unpacked package, returning the
    /// host-side identifiers of the imported assets.
    async fn import_package_files(
        &self,
        files: &[PackageFile],
        dest_dir: &Path,
    ) -> ClientResult<Vec<String>>;

    /// Removes the assets previously imported under `dir`. Implementations
    /// verify that the removal count matches what they registered and error
    /// on mismatch, in which case the caller aborts before deleting files.
    async fn remove_imported(&self, dir: &Path) -> ClientResult<()>;
}
