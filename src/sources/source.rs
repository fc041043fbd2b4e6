use anyhow::Result;
use std::path::PathBuf;
use tempfile::TempDir;

use crate::notifier::Notifier;

/// Where the files of a model come from.
pub trait ModelSource {
    /// Short name recorded in the build manifest
    fn name(&self) -> &str;

    /// Makes the model named by `model_id` available as a local directory.
    ///
    /// `model_id` is a hub repository id for remote sources and a filesystem
    /// path for local ones. The returned `TempDir`, when present, owns the
    /// directory and has to be kept alive until the files have been packaged.
    fn fetch_model(&self, model_id: &str, notifier: &Notifier)
        -> Result<(PathBuf, Option<TempDir>)>;
}
