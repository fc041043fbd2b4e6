//! Resolves the model tar path the way CI does: from the process environment.
//!
//! Kept as the only test in this binary because it mutates env vars.

use model_tar::BuildConfig;
use std::env;

#[test]
fn test_model_tar_file_from_ci_environment() {
    let src_dir = env::current_dir().unwrap().join(".test");

    env::set_var("PYTHON_ENV", "test");
    env::set_var("CODEBUILD_BUILD_ID", "test");
    env::set_var("CODEBUILD_SRC_DIR", &src_dir);
    env::set_var("ARTIFACT_BASE_DIR", "out");
    env::set_var("HF_REPO_ID", "sentence-transformers/all-mpnet-base-v2");

    let config = BuildConfig::from_env().unwrap();
    let model_tar_file = config.model_tar_file();

    assert_eq!(
        model_tar_file.to_str().unwrap(),
        src_dir.join("out").join("model.tar.gz").to_str().unwrap()
    );
    assert!(config.is_test_run());

    env::set_var("HF_REPO_ID", "bert-base-uncased");
    env::set_var("CODEBUILD_BUILD_ID", "another-run");
    let changed = BuildConfig::from_env().unwrap();
    assert_eq!(changed.model_tar_file(), model_tar_file);

    env::remove_var("HF_REPO_ID");
    let err = BuildConfig::from_env().unwrap_err();
    assert!(err.to_string().contains("HF_REPO_ID"));
}
