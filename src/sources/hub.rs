use anyhow::{anyhow, Context, Result};
use reqwest::blocking::{Client, Response};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::Url;
use serde::Deserialize;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;

use super::{confine_relative_path, is_repo_metadata, ModelSource, RepoId};
use crate::config::HubSettings;
use crate::notifier::Notifier;

#[derive(Debug, Deserialize)]
struct ModelInfo {
    #[serde(default)]
    sha: Option<String>,
    #[serde(default)]
    siblings: Vec<Sibling>,
}

#[derive(Debug, Deserialize)]
struct Sibling {
    rfilename: String,
}

/// Downloads a model snapshot from a Hugging Face compatible hub.
pub struct HubSource {
    client: Client,
    endpoint: Url,
}

impl HubSource {
    pub fn new() -> Result<Self> {
        Self::with_settings(&HubSettings::default())
    }

    pub fn with_settings(settings: &HubSettings) -> Result<Self> {
        let endpoint = Url::parse(&settings.endpoint)
            .with_context(|| format!("Invalid hub endpoint: {}", settings.endpoint))?;
        if endpoint.cannot_be_a_base() {
            return Err(anyhow!("Invalid hub endpoint: {}", settings.endpoint));
        }

        let mut headers = HeaderMap::new();
        if let Some(token) = &settings.token {
            let mut value = HeaderValue::from_str(&format!("Bearer {}", token))
                .context("Hub token contains characters not allowed in a header")?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let client = Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .default_headers(headers)
            .connect_timeout(Some(Duration::from_secs(30)))
            .timeout(None::<Duration>)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self { client, endpoint })
    }

    fn url_with_segments<'a>(&self, segments: impl IntoIterator<Item = &'a str>) -> Result<Url> {
        let mut url = self.endpoint.clone();
        url.path_segments_mut()
            .map_err(|_| anyhow!("Invalid hub endpoint: {}", self.endpoint))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// `{endpoint}/api/models/{owner}/{name}/revision/{revision}`
    pub fn model_info_url(&self, repo: &RepoId) -> Result<Url> {
        let mut segments = vec!["api", "models"];
        segments.extend(repo.owner.as_deref());
        segments.extend([repo.name.as_str(), "revision", repo.revision.as_str()]);
        self.url_with_segments(segments)
    }

    /// `{endpoint}/{owner}/{name}/resolve/{revision}/{file}`
    pub fn file_url(&self, repo: &RepoId, file: &str) -> Result<Url> {
        let mut segments: Vec<&str> = repo.owner.as_deref().into_iter().collect();
        segments.extend([repo.name.as_str(), "resolve", repo.revision.as_str()]);
        segments.extend(file.split('/').filter(|s| !s.is_empty()));
        self.url_with_segments(segments)
    }

    fn get(&self, url: Url) -> Result<Response> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .with_context(|| format!("Request to {} failed", url))?;

        let status = response.status();
        if !status.is_success() {
            return Err(anyhow!("Hub returned {} for {}", status, url));
        }
        Ok(response)
    }

    fn list_files(&self, repo: &RepoId) -> Result<(Vec<String>, Option<String>)> {
        let info: ModelInfo = self
            .get(self.model_info_url(repo)?)?
            .json()
            .with_context(|| format!("Failed to parse model info for {}", repo))?;

        let files = info
            .siblings
            .into_iter()
            .map(|sibling| sibling.rfilename)
            .filter(|name| !is_repo_metadata(Path::new(name)))
            .collect();
        Ok((files, info.sha))
    }

    fn download_file(
        &self,
        repo: &RepoId,
        file: &str,
        dest_root: &Path,
        notifier: &Notifier,
    ) -> Result<u64> {
        // Remote names are untrusted; keep them under dest_root
        let relative = confine_relative_path(Path::new(file))
            .ok_or_else(|| anyhow!("Hub listed an unusable file name: '{}'", file))?;
        if relative != Path::new(file) {
            notifier.warn(&format!(
                "Hub file '{}' stored as '{}'",
                file,
                relative.display()
            ));
        }
        let dest = dest_root.join(&relative);
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }

        let mut response = self.get(self.file_url(repo, file)?)?;
        let mut out = File::create(&dest)
            .with_context(|| format!("Failed to create file: {}", dest.display()))?;
        let written = response
            .copy_to(&mut out)
            .with_context(|| format!("Failed to download {} from {}", file, repo))?;

        // No gzip negotiation, so Content-Length is the on-disk size
        if let Some(expected) = response.content_length() {
            if expected != written {
                return Err(anyhow!(
                    "Truncated download of {}: got {} of {} bytes",
                    file,
                    written,
                    expected
                ));
            }
        }
        Ok(written)
    }
}

impl ModelSource for HubSource {
    fn name(&self) -> &str {
        "hub"
    }

    fn fetch_model(
        &self,
        model_id: &str,
        notifier: &Notifier,
    ) -> Result<(PathBuf, Option<TempDir>)> {
        let repo = RepoId::parse(model_id)?;
        notifier.info(&format!("Resolving {} on {}", repo, self.endpoint));

        // Unknown repos and revisions fail here, before any download
        let (files, sha) = self.list_files(&repo)?;
        if files.is_empty() {
            return Err(anyhow!("Model {} has no files at revision {}", repo, repo.revision));
        }
        if let Some(sha) = &sha {
            notifier.debug(&format!("{} resolved to commit {}", repo, sha));
        }

        // <tmp>/<repo name>/<files>
        let temp_dir = TempDir::new().context("Failed to create temporary directory")?;
        let model_dir = temp_dir.path().join(&repo.name);
        fs::create_dir_all(&model_dir)
            .with_context(|| format!("Failed to create directory: {}", model_dir.display()))?;

        let total = files.len() as u64;
        let bar = notifier.progress_bar(total, "Downloading model files");
        let mut bytes = 0u64;
        for (i, file) in files.iter().enumerate() {
            notifier.debug(&format!("Downloading {}", file));
            bytes += self.download_file(&repo, file, &model_dir, notifier)?;
            if let Some(bar) = &bar {
                bar.inc(1);
            }
            notifier.progress(i as u64 + 1, total, "Downloaded files");
        }
        if let Some(bar) = bar {
            bar.finish_and_clear();
        }

        notifier.info(&format!(
            "Downloaded {} files ({} bytes) of {}",
            total, bytes, repo
        ));
        Ok((model_dir, Some(temp_dir)))
    }
}
