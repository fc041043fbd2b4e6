pub mod hub;
pub mod local;
pub mod naming;
pub mod source;

pub use hub::HubSource;
pub use local::LocalSource;
pub use naming::RepoId;
pub use source::ModelSource;

use std::path::{Component, Path, PathBuf};

/// Turns a remote or archive file name into a path that stays inside the
/// directory it is joined onto. `..` pops, roots and prefixes are dropped.
/// Returns `None` when nothing is left.
pub fn confine_relative_path(p: &Path) -> Option<PathBuf> {
    let mut out = PathBuf::new();

    for comp in p.components() {
        match comp {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            Component::Normal(c) => out.push(c),
            Component::RootDir | Component::Prefix(_) => {}
        }
    }

    if out.as_os_str().is_empty() {
        None
    } else {
        Some(out)
    }
}

/// Files the hub keeps for git bookkeeping that never belong in the model archive.
pub fn is_repo_metadata(relative: &Path) -> bool {
    match relative.components().next() {
        Some(Component::Normal(first)) => {
            first == ".git" || relative == Path::new(".gitattributes")
        }
        _ => false,
    }
}
