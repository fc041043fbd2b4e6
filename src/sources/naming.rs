use anyhow::{bail, Result};
use std::fmt;

pub const DEFAULT_REVISION: &str = "main";

/// A hub repository id, `[owner/]name[@revision]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoId {
    pub owner: Option<String>,
    pub name: String,
    pub revision: String,
}

fn check_segment(segment: &str, what: &str, repo_id: &str) -> Result<()> {
    if segment.is_empty() {
        bail!("Invalid model repository id '{}': empty {}", repo_id, what);
    }
    if segment == "." || segment == ".." {
        bail!("Invalid model repository id '{}': {} may not be '{}'", repo_id, what, segment);
    }
    if let Some(bad) = segment
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')))
    {
        bail!(
            "Invalid model repository id '{}': {} contains '{}'",
            repo_id,
            what,
            bad
        );
    }
    Ok(())
}

impl RepoId {
    pub fn parse(repo_id: &str) -> Result<Self> {
        let trimmed = repo_id.trim();
        let (path, revision) = match trimmed.split_once('@') {
            Some((path, revision)) => {
                if revision.is_empty() || revision.contains("..") {
                    bail!("Invalid model repository id '{}': bad revision", repo_id);
                }
                (path, revision.to_string())
            }
            None => (trimmed, DEFAULT_REVISION.to_string()),
        };

        let mut parts = path.split('/');
        let first = parts.next().unwrap_or_default();
        let second = parts.next();
        if parts.next().is_some() {
            bail!(
                "Invalid model repository id '{}': expected at most one '/'",
                repo_id
            );
        }

        let (owner, name) = match second {
            Some(name) => {
                check_segment(first, "owner", repo_id)?;
                (Some(first.to_string()), name)
            }
            None => (None, first),
        };
        check_segment(name, "name", repo_id)?;

        Ok(Self {
            owner,
            name: name.to_string(),
            revision,
        })
    }

    /// `owner/name` or `name`, without the revision
    pub fn path(&self) -> String {
        match &self.owner {
            Some(owner) => format!("{}/{}", owner, self.name),
            None => self.name.clone(),
        }
    }

    pub fn is_default_revision(&self) -> bool {
        self.revision == DEFAULT_REVISION
    }
}

impl fmt::Display for RepoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_default_revision() {
            write!(f, "{}", self.path())
        } else {
            write!(f, "{}@{}", self.path(), self.revision)
        }
    }
}
