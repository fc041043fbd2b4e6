//! Output locations of the build.
//!
//! Only defines WHERE artifacts go. Nothing here touches the filesystem.

use std::path::{Path, PathBuf};

pub const MODEL_TAR_FILE_NAME: &str = "model.tar.gz";
pub const MANIFEST_FILE_NAME: &str = "build-info.json";

/// Joins `source_dir / artifact_base_dir / model.tar.gz` with the host's
/// path rules. `..` and symlinks are left as given.
pub fn model_tar_path(source_dir: &Path, artifact_base_dir: &Path) -> PathBuf {
    source_dir.join(artifact_base_dir).join(MODEL_TAR_FILE_NAME)
}

/// Every path the build writes to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildPaths {
    /// `<source_dir>/<artifact_base_dir>`
    pub artifact_dir: PathBuf,
    /// The packaged model archive
    pub model_tar_file: PathBuf,
    /// JSON manifest written next to the archive
    pub manifest_file: PathBuf,
}

impl BuildPaths {
    pub fn new(source_dir: &Path, artifact_base_dir: &Path) -> Self {
        let artifact_dir = source_dir.join(artifact_base_dir);
        Self {
            model_tar_file: model_tar_path(source_dir, artifact_base_dir),
            manifest_file: artifact_dir.join(MANIFEST_FILE_NAME),
            artifact_dir,
        }
    }
}
