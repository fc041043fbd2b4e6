use anyhow::{anyhow, Result};
use std::path::PathBuf;
use tempfile::TempDir;

use super::ModelSource;
use crate::notifier::Notifier;

/// A model that is already on disk, e.g. checked out by an earlier build phase.
pub struct LocalSource {
    root: Option<PathBuf>,
}

impl LocalSource {
    pub fn new() -> Self {
        Self { root: None }
    }

    /// Resolves relative model ids against `root` instead of the working directory.
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
        }
    }

    fn resolve(&self, model_id: &str) -> PathBuf {
        match &self.root {
            Some(root) => root.join(model_id),
            None => PathBuf::from(model_id),
        }
    }
}

impl Default for LocalSource {
    fn default() -> Self {
        Self::new()
    }
}

impl ModelSource for LocalSource {
    fn name(&self) -> &str {
        "local"
    }

    fn fetch_model(
        &self,
        model_id: &str,
        notifier: &Notifier,
    ) -> Result<(PathBuf, Option<TempDir>)> {
        let model_dir = self.resolve(model_id);

        if !model_dir.exists() {
            return Err(anyhow!(
                "Model directory does not exist: {}",
                model_dir.display()
            ));
        }
        if !model_dir.is_dir() {
            return Err(anyhow!("Path is not a directory: {}", model_dir.display()));
        }

        notifier.info(&format!("Using local model at {}", model_dir.display()));
        Ok((model_dir, None))
    }
}
