//! Writing and reading the `model.tar.gz` archive.
//!
//! Entries are stored relative to the archive root (`config.json`, not
//! `all-mpnet-base-v2/config.json`), which is the layout model servers expect
//! when they unpack the tarball into their model directory.

use anyhow::{anyhow, bail, Context, Result};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read};
use std::path::{Path, PathBuf};
use tar_rs as tar;
use tempfile::NamedTempFile;
use walkdir::WalkDir;

use crate::notifier::Notifier;
use crate::paths::MANIFEST_FILE_NAME;
use crate::sources::is_repo_metadata;

/// What ended up in the archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackSummary {
    /// Archive entry names, in the order they were written
    pub files: Vec<String>,
    /// Sum of the uncompressed file sizes
    pub bytes: u64,
}

fn entry_name(relative: &Path) -> Result<String> {
    let parts: Vec<&str> = relative
        .components()
        .map(|c| {
            c.as_os_str()
                .to_str()
                .ok_or_else(|| anyhow!("Non UTF-8 file name in model: {}", relative.display()))
        })
        .collect::<Result<_>>()?;
    Ok(parts.join("/"))
}

/// Directory the archive is written to. A bare file name means the working directory.
fn output_dir(tar_path: &Path) -> &Path {
    tar_path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."))
}

/// Where the build output lives relative to `model_dir`, if it lives inside it.
/// An empty path means the archive is written straight into `model_dir`.
fn output_dir_within(model_dir: &Path, tar_path: &Path) -> Option<PathBuf> {
    let model_dir = fs::canonicalize(model_dir).ok()?;
    let output_dir = fs::canonicalize(output_dir(tar_path)).ok()?;
    output_dir
        .strip_prefix(&model_dir)
        .ok()
        .map(Path::to_path_buf)
}

/// Regular files under `model_dir`, sorted, relative to it. Symlinks are
/// followed so hub cache snapshots pack their blobs, not their links.
///
/// When `tar_path` points inside `model_dir`, earlier build output (the
/// artifact directory, or the archive and manifest themselves) is left out.
fn collect_files(model_dir: &Path, tar_path: &Path) -> Result<Vec<(PathBuf, String)>> {
    let mut skipped: Vec<PathBuf> = Vec::new();
    if let Some(output_rel) = output_dir_within(model_dir, tar_path) {
        if let Some(tar_name) = tar_path.file_name() {
            skipped.push(output_rel.join(tar_name));
        }
        skipped.push(output_rel.join(MANIFEST_FILE_NAME));
        if !output_rel.as_os_str().is_empty() {
            skipped.push(output_rel);
        }
    }

    let mut files = Vec::new();
    let walker = WalkDir::new(model_dir)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| match entry.path().strip_prefix(model_dir) {
            Ok(rel) => !is_repo_metadata(rel) && !skipped.iter().any(|skip| skip == rel),
            Err(_) => true,
        });

    for entry in walker {
        let entry = entry.with_context(|| {
            format!("Failed to walk model directory: {}", model_dir.display())
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = entry.path().strip_prefix(model_dir).with_context(|| {
            format!("{} is outside {}", entry.path().display(), model_dir.display())
        })?;
        files.push((entry.path().to_path_buf(), entry_name(relative)?));
    }
    Ok(files)
}

/// Packs every file of `model_dir` into a gzip-compressed tarball at `tar_path`.
///
/// Parent directories of `tar_path` are created. An existing archive is
/// replaced only once the new one is complete. Fails if the directory holds
/// no files.
pub fn pack_model_dir(
    model_dir: &Path,
    tar_path: &Path,
    notifier: &Notifier,
) -> Result<PackSummary> {
    let files = collect_files(model_dir, tar_path)?;
    if files.is_empty() {
        bail!("No model files found in {}", model_dir.display());
    }
    write_archive(files, tar_path, notifier)
}

fn write_archive(
    files: Vec<(PathBuf, String)>,
    tar_path: &Path,
    notifier: &Notifier,
) -> Result<PackSummary> {
    let output_dir = output_dir(tar_path);
    fs::create_dir_all(output_dir)
        .with_context(|| format!("Failed to create directory: {}", output_dir.display()))?;

    // Staged next to the target so persist is a same-filesystem rename.
    // An early return drops and deletes the staging file.
    let staging = NamedTempFile::new_in(output_dir).with_context(|| {
        format!(
            "Failed to create temporary archive in {}",
            output_dir.display()
        )
    })?;
    let encoder = GzEncoder::new(BufWriter::new(staging), Compression::default());
    let mut builder = tar::Builder::new(encoder);
    builder.mode(tar::HeaderMode::Deterministic);

    let total = files.len() as u64;
    let bar = notifier.progress_bar(total, "Packing model files");
    let mut summary = PackSummary {
        files: Vec::with_capacity(files.len()),
        bytes: 0,
    };

    for (i, (path, name)) in files.into_iter().enumerate() {
        notifier.trace(&format!("Adding {}", name));
        let mut file =
            File::open(&path).with_context(|| format!("Failed to open {}", path.display()))?;
        builder
            .append_file(&name, &mut file)
            .with_context(|| format!("Failed to add {} to archive", name))?;

        summary.bytes += file
            .metadata()
            .with_context(|| format!("Failed to stat {}", path.display()))?
            .len();
        summary.files.push(name);

        if let Some(bar) = &bar {
            bar.inc(1);
        }
        notifier.progress(i as u64 + 1, total, "Packed files");
    }
    if let Some(bar) = bar {
        bar.finish_and_clear();
    }

    let encoder = builder
        .into_inner()
        .with_context(|| format!("Failed to finish archive: {}", tar_path.display()))?;
    let writer = encoder
        .finish()
        .with_context(|| format!("Failed to finish compression: {}", tar_path.display()))?;
    let staging = writer
        .into_inner()
        .map_err(|e| e.into_error())
        .with_context(|| format!("Failed to flush archive: {}", tar_path.display()))?;

    staging
        .persist(tar_path)
        .map_err(|e| e.error)
        .with_context(|| format!("Failed to move archive into place: {}", tar_path.display()))?;

    // NamedTempFile is created 0600
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if let Err(e) = fs::set_permissions(tar_path, fs::Permissions::from_mode(0o644)) {
            notifier.warn(&format!(
                "Failed to set permissions on {}: {}",
                tar_path.display(),
                e
            ));
        }
    }

    Ok(summary)
}

/// Entry names of a plain or gzipped tar archive.
pub fn list_archive(tar_path: &Path) -> Result<Vec<String>> {
    let file = File::open(tar_path)
        .with_context(|| format!("Failed to open tar file: {}", tar_path.display()))?;

    let mut magic_bytes = [0u8; 2];
    BufReader::new(file)
        .read_exact(&mut magic_bytes)
        .context("Failed to read magic bytes from tar file")?;

    let file = File::open(tar_path)?;
    let mut archive: tar::Archive<Box<dyn Read>> = if magic_bytes == [0x1f, 0x8b] {
        tar::Archive::new(Box::new(GzDecoder::new(file)))
    } else {
        tar::Archive::new(Box::new(file))
    };

    let mut names = Vec::new();
    for entry in archive.entries().context("Failed to read tar entries")? {
        let entry = entry.context("Failed to read tar entry")?;
        let path = entry.path().context("Failed to get entry path")?;
        names.push(path.to_string_lossy().into_owned());
    }
    Ok(names)
}
