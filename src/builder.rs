//! The build step end to end.
//!
//! [`ModelBuilder`] takes a [`BuildConfig`], asks its [`ModelSource`] for the
//! model files, packs them into the model tar path and records a
//! [`BuildManifest`] beside the archive.

use anyhow::{Context, Result};
use chrono::Utc;
use std::path::PathBuf;
use std::time::Instant;

use crate::archive::pack_model_dir;
use crate::config::BuildConfig;
use crate::manifest::BuildManifest;
use crate::notifier::Notifier;
use crate::sources::ModelSource;

/// Outcome of a successful build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildReport {
    pub model_tar_file: PathBuf,
    pub manifest_file: PathBuf,
    pub file_count: usize,
    pub bytes: u64,
}

pub struct ModelBuilder<S: ModelSource> {
    source: S,
    notifier: Notifier,
}

impl<S: ModelSource> ModelBuilder<S> {
    pub fn new(source: S, notifier: Notifier) -> Self {
        Self { source, notifier }
    }

    /// Fetches `config.model_id()` and writes `model.tar.gz` plus
    /// `build-info.json` under the artifact directory.
    ///
    /// Any temporary download directory is removed before returning.
    pub fn build(&self, config: &BuildConfig) -> Result<BuildReport> {
        let started = Instant::now();
        let paths = config.paths();

        self.notifier.info(&format!(
            "Building {} (build {}, source {})",
            config.model_id(),
            config.build_id(),
            self.source.name()
        ));
        if config.is_test_run() {
            self.notifier.debug("Running under PYTHON_ENV=test");
        } else if let Some(mode) = config.run_mode() {
            self.notifier.debug(&format!("Run mode: {}", mode));
        }
        self.notifier
            .debug(&format!("Artifact directory: {}", paths.artifact_dir.display()));

        // Held until the manifest is written; dropping it removes hub downloads
        let (model_dir, _temp_dir) = self
            .source
            .fetch_model(config.model_id(), &self.notifier)
            .with_context(|| format!("Failed to fetch model {}", config.model_id()))?;

        self.notifier
            .info(&format!("Packing {}", paths.model_tar_file.display()));
        // Creates the artifact directory and swaps the archive in atomically
        let summary = pack_model_dir(&model_dir, &paths.model_tar_file, &self.notifier)?;

        let manifest = BuildManifest {
            build_id: config.build_id().to_string(),
            model_id: config.model_id().to_string(),
            source: self.source.name().to_string(),
            archive: paths.model_tar_file.clone(),
            files: summary.files,
            bytes: summary.bytes,
            created_at: Utc::now(),
        };
        // Written only after the archive is in place
        manifest.write_to(&paths.manifest_file)?;

        self.notifier.finish(&format!(
            "Packed {} files ({} bytes) into {} in {:.1?}",
            manifest.files.len(),
            manifest.bytes,
            paths.model_tar_file.display(),
            started.elapsed()
        ));

        Ok(BuildReport {
            model_tar_file: paths.model_tar_file,
            manifest_file: paths.manifest_file,
            file_count: manifest.files.len(),
            bytes: manifest.bytes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::list_archive;
    use crate::sources::LocalSource;
    use std::fs;
    use std::path::Path;
    use tempfile::{tempdir, TempDir};

    struct FixtureSource;

    impl ModelSource for FixtureSource {
        fn name(&self) -> &str {
            "fixture"
        }

        fn fetch_model(
            &self,
            _model_id: &str,
            _notifier: &Notifier,
        ) -> Result<(PathBuf, Option<TempDir>)> {
            let temp = TempDir::new()?;
            fs::write(temp.path().join("config.json"), "{}")?;
            fs::write(temp.path().join("pytorch_model.bin"), "weights")?;
            Ok((temp.path().to_path_buf(), Some(temp)))
        }
    }

    #[test]
    fn test_build_writes_archive_at_model_tar_path() {
        let work = tempdir().unwrap();
        let config = BuildConfig::new(work.path().join(".test"), "out", "org/model")
            .with_build_id("test");

        let builder = ModelBuilder::new(FixtureSource, Notifier::silent());
        let report = builder.build(&config).unwrap();

        assert_eq!(report.model_tar_file, config.model_tar_file());
        assert_eq!(
            report.model_tar_file,
            work.path().join(".test").join("out").join("model.tar.gz")
        );
        assert_eq!(report.file_count, 2);
        assert_eq!(report.bytes, 2 + 7);
        assert_eq!(
            list_archive(&report.model_tar_file).unwrap(),
            vec!["config.json", "pytorch_model.bin"]
        );

        let manifest = BuildManifest::read_from(&report.manifest_file).unwrap();
        assert_eq!(manifest.build_id, "test");
        assert_eq!(manifest.model_id, "org/model");
        assert_eq!(manifest.source, "fixture");
        assert_eq!(manifest.archive, report.model_tar_file);
    }

    #[test]
    fn test_build_from_local_source() {
        let work = tempdir().unwrap();
        let model = work.path().join("checkout");
        fs::create_dir_all(model.join("1_Pooling")).unwrap();
        fs::write(model.join("1_Pooling/config.json"), "{}").unwrap();

        let config = BuildConfig::new(work.path(), "dist", model.to_str().unwrap());
        let builder = ModelBuilder::new(LocalSource::new(), Notifier::silent());
        let report = builder.build(&config).unwrap();

        assert!(report.model_tar_file.ends_with(Path::new("dist/model.tar.gz")));
        assert_eq!(
            list_archive(&report.model_tar_file).unwrap(),
            vec!["1_Pooling/config.json"]
        );
        assert!(model.join("1_Pooling/config.json").exists());
    }

    #[test]
    fn test_build_fails_when_source_fails() {
        let work = tempdir().unwrap();
        let config = BuildConfig::new(work.path(), "out", "missing-model");
        let builder = ModelBuilder::new(LocalSource::with_root(work.path()), Notifier::silent());

        let err = builder.build(&config).unwrap_err();
        assert!(format!("{:#}", err).contains("Failed to fetch model missing-model"));
        assert!(!config.model_tar_file().exists());
    }
}
