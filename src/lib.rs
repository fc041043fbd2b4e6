pub mod archive;
pub mod builder;
pub mod config;
pub mod manifest;
pub mod notifier;
pub mod paths;
pub mod sources;

// Re-exports for easy access
pub use builder::{BuildReport, ModelBuilder};
pub use config::{BuildConfig, HubSettings};
pub use manifest::BuildManifest;
pub use notifier::Notifier;
pub use paths::{model_tar_path, BuildPaths, MODEL_TAR_FILE_NAME};
pub use sources::HubSource;
pub use sources::LocalSource;
pub use sources::ModelSource;
