//! Build configuration resolved from the CI environment.
//!
//! [`BuildConfig::from_env`] is the only place that touches the process
//! environment. Everything else takes a [`BuildConfig`] value, so path
//! resolution and the build itself can be exercised without mutating env vars.

use anyhow::{anyhow, bail, Result};
use std::path::{Path, PathBuf};

use crate::paths::{model_tar_path, BuildPaths};

pub const SRC_DIR_VAR: &str = "CODEBUILD_SRC_DIR";
pub const ARTIFACT_BASE_DIR_VAR: &str = "ARTIFACT_BASE_DIR";
pub const REPO_ID_VAR: &str = "HF_REPO_ID";
pub const BUILD_ID_VAR: &str = "CODEBUILD_BUILD_ID";
pub const RUN_MODE_VAR: &str = "PYTHON_ENV";
pub const HUB_ENDPOINT_VAR: &str = "HF_ENDPOINT";
pub const HUB_TOKEN_VAR: &str = "HF_TOKEN";

pub const DEFAULT_HUB_ENDPOINT: &str = "https://huggingface.co";
pub const DEFAULT_BUILD_ID: &str = "local";

/// Where and how to reach the model hub.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HubSettings {
    pub endpoint: String,
    pub token: Option<String>,
}

impl Default for HubSettings {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_HUB_ENDPOINT.to_string(),
            token: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildConfig {
    source_dir: PathBuf,
    artifact_base_dir: PathBuf,
    model_id: String,
    build_id: String,
    run_mode: Option<String>,
    hub: HubSettings,
}

impl BuildConfig {
    pub fn new(
        source_dir: impl Into<PathBuf>,
        artifact_base_dir: impl Into<PathBuf>,
        model_id: impl Into<String>,
    ) -> Self {
        Self {
            source_dir: source_dir.into(),
            artifact_base_dir: artifact_base_dir.into(),
            model_id: model_id.into(),
            build_id: DEFAULT_BUILD_ID.to_string(),
            run_mode: None,
            hub: HubSettings::default(),
        }
    }

    pub fn with_model_id(mut self, model_id: impl Into<String>) -> Self {
        self.model_id = model_id.into();
        self
    }

    pub fn with_build_id(mut self, build_id: impl Into<String>) -> Self {
        self.build_id = build_id.into();
        self
    }

    pub fn with_run_mode(mut self, run_mode: impl Into<String>) -> Self {
        self.run_mode = Some(run_mode.into());
        self
    }

    pub fn with_hub(mut self, hub: HubSettings) -> Self {
        self.hub = hub;
        self
    }

    /// Reads the build context from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds a configuration from any variable lookup.
    ///
    /// Required variables must be present and non-empty, and the source
    /// directory must be absolute. The build id falls back to `local`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |name: &str| -> Result<String> {
            match lookup(name) {
                Some(value) if !value.trim().is_empty() => Ok(value),
                Some(_) => Err(anyhow!("Environment variable {} is empty", name)),
                None => Err(anyhow!("Environment variable {} is not set", name)),
            }
        };
        let optional = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let source_dir = PathBuf::from(required(SRC_DIR_VAR)?);
        if !source_dir.is_absolute() {
            bail!(
                "{} must be an absolute path, got: {}",
                SRC_DIR_VAR,
                source_dir.display()
            );
        }

        let mut config = Self::new(
            source_dir,
            required(ARTIFACT_BASE_DIR_VAR)?,
            required(REPO_ID_VAR)?,
        )
        .with_hub(HubSettings {
            endpoint: optional(HUB_ENDPOINT_VAR)
                .map(|endpoint| endpoint.trim_end_matches('/').to_string())
                .unwrap_or_else(|| DEFAULT_HUB_ENDPOINT.to_string()),
            token: optional(HUB_TOKEN_VAR),
        });

        if let Some(build_id) = optional(BUILD_ID_VAR) {
            config = config.with_build_id(build_id);
        }
        if let Some(run_mode) = optional(RUN_MODE_VAR) {
            config = config.with_run_mode(run_mode);
        }

        Ok(config)
    }

    pub fn source_dir(&self) -> &Path {
        &self.source_dir
    }

    pub fn artifact_base_dir(&self) -> &Path {
        &self.artifact_base_dir
    }

    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    pub fn build_id(&self) -> &str {
        &self.build_id
    }

    pub fn run_mode(&self) -> Option<&str> {
        self.run_mode.as_deref()
    }

    pub fn is_test_run(&self) -> bool {
        self.run_mode.as_deref() == Some("test")
    }

    pub fn hub(&self) -> &HubSettings {
        &self.hub
    }

    /// `<source_dir>/<artifact_base_dir>/model.tar.gz`
    pub fn model_tar_file(&self) -> PathBuf {
        model_tar_path(&self.source_dir, &self.artifact_base_dir)
    }

    pub fn paths(&self) -> BuildPaths {
        BuildPaths::new(&self.source_dir, &self.artifact_base_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    fn ci_vars() -> Vec<(&'static str, &'static str)> {
        vec![
            (RUN_MODE_VAR, "test"),
            (BUILD_ID_VAR, "test"),
            (SRC_DIR_VAR, "/work/.test"),
            (ARTIFACT_BASE_DIR_VAR, "out"),
            (REPO_ID_VAR, "sentence-transformers/all-mpnet-base-v2"),
        ]
    }

    #[test]
    fn test_from_lookup_reads_ci_context() {
        let config = BuildConfig::from_lookup(lookup_from(&ci_vars())).unwrap();

        assert_eq!(config.source_dir(), Path::new("/work/.test"));
        assert_eq!(config.artifact_base_dir(), Path::new("out"));
        assert_eq!(config.model_id(), "sentence-transformers/all-mpnet-base-v2");
        assert_eq!(config.build_id(), "test");
        assert_eq!(config.run_mode(), Some("test"));
        assert!(config.is_test_run());
        assert_eq!(config.hub(), &HubSettings::default());
        assert_eq!(
            config.model_tar_file(),
            PathBuf::from("/work/.test/out/model.tar.gz")
        );
    }

    #[test]
    fn test_missing_required_variable_is_named() {
        for missing in [SRC_DIR_VAR, ARTIFACT_BASE_DIR_VAR, REPO_ID_VAR] {
            let vars: Vec<_> = ci_vars()
                .into_iter()
                .filter(|(name, _)| *name != missing)
                .collect();
            let err = BuildConfig::from_lookup(lookup_from(&vars)).unwrap_err();
            assert!(
                err.to_string().contains(missing),
                "error should name {missing}: {err}"
            );
        }
    }

    #[test]
    fn test_empty_required_variable_is_rejected() {
        let mut vars = ci_vars();
        vars.retain(|(name, _)| *name != REPO_ID_VAR);
        vars.push((REPO_ID_VAR, "  "));
        let err = BuildConfig::from_lookup(lookup_from(&vars)).unwrap_err();
        assert!(err.to_string().contains("is empty"));
    }

    #[test]
    fn test_relative_source_dir_is_rejected() {
        let mut vars = ci_vars();
        vars.retain(|(name, _)| *name != SRC_DIR_VAR);
        vars.push((SRC_DIR_VAR, "relative/src"));
        let err = BuildConfig::from_lookup(lookup_from(&vars)).unwrap_err();
        assert!(err.to_string().contains("absolute"));
    }

    #[test]
    fn test_optional_variables_have_defaults() {
        let vars: Vec<_> = ci_vars()
            .into_iter()
            .filter(|(name, _)| *name != BUILD_ID_VAR && *name != RUN_MODE_VAR)
            .collect();
        let config = BuildConfig::from_lookup(lookup_from(&vars)).unwrap();

        assert_eq!(config.build_id(), DEFAULT_BUILD_ID);
        assert_eq!(config.run_mode(), None);
        assert!(!config.is_test_run());
    }

    #[test]
    fn test_hub_settings_from_lookup() {
        let mut vars = ci_vars();
        vars.push((HUB_ENDPOINT_VAR, "http://mirror.internal:8080/"));
        vars.push((HUB_TOKEN_VAR, "hf_secret"));
        let config = BuildConfig::from_lookup(lookup_from(&vars)).unwrap();

        assert_eq!(config.hub().endpoint, "http://mirror.internal:8080");
        assert_eq!(config.hub().token.as_deref(), Some("hf_secret"));
    }

    #[test]
    fn test_tar_path_ignores_model_and_build_id() {
        let base = BuildConfig::new("/work/.test", "out", "org/model-a").with_build_id("b1");
        let other = BuildConfig::new("/work/.test", "out", "org/model-b").with_build_id("b2");
        assert_eq!(base.model_tar_file(), other.model_tar_file());
    }
}
