use crate::error::{PptError, Result};
use flate2::read::GzDecoder;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tar::Archive;
use tempfile::TempDir;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveKind {
    TarGz,
}

impl ArchiveKind {
    /// Detect the archive kind from the file name's suffix chain.
    pub fn detect(path: &Path) -> Result<Self> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_lowercase())
            .unwrap_or_default();

        if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
            Ok(ArchiveKind::TarGz)
        } else {
            Err(PptError::UnsupportedArchive {
                path: path.to_path_buf(),
            })
        }
    }
}

/// Extract `archive_path` and install the first executable member, in archive
/// order, as `<install_dir>/<program_name>`.
///
/// An existing file at the destination is replaced. Extraction happens in a
/// scratch directory next to the archive.
pub fn install_executable(archive_path: &Path, program_name: &str, install_dir: &Path) -> Result<PathBuf> {
    ArchiveKind::detect(archive_path)?;

    tracing::info!(
        "Extracting {}...",
        archive_path.file_name().unwrap_or_default().to_string_lossy()
    );

    let scratch_parent = archive_path.parent().unwrap_or_else(|| Path::new("."));
    let extract_dir = TempDir::new_in(scratch_parent)
        .map_err(|e| PptError::io("Could not create extraction directory", e))?;

    let members = extract_tar_gz(archive_path, extract_dir.path())?;
    tracing::debug!("Extracted {} regular file(s)", members.len());

    let executable = members
        .iter()
        .find(|path| is_executable(path))
        .ok_or_else(|| PptError::NoExecutableFound {
            archive: archive_path.to_path_buf(),
        })?;

    tracing::debug!("Selected executable member: {}", executable.display());

    fs::create_dir_all(install_dir)
        .map_err(|e| PptError::io(format!("Could not create {}", install_dir.display()), e))?;
    let destination = install_dir.join(program_name);
    copy_preserving_metadata(executable, &destination)?;

    tracing::info!("Installed executable to {}", destination.display());
    Ok(destination)
}

/// Unpack every regular-file member and return their paths in archive order.
fn extract_tar_gz(archive_path: &Path, extract_dir: &Path) -> Result<Vec<PathBuf>> {
    let read_err = |e| PptError::io(format!("Could not read archive {}", archive_path.display()), e);

    let file = fs::File::open(archive_path).map_err(read_err)?;
    let mut archive = Archive::new(GzDecoder::new(file));
    archive.set_preserve_mtime(true);

    let mut members = Vec::new();
    for entry in archive.entries().map_err(read_err)? {
        let mut entry = entry.map_err(read_err)?;
        if !entry.header().entry_type().is_file() {
            continue;
        }

        let member_path = entry.path().map_err(read_err)?.into_owned();
        let unpacked = entry.unpack_in(extract_dir).map_err(read_err)?;
        if !unpacked {
            tracing::warn!("Skipping archive member outside extraction directory: {}", member_path.display());
            continue;
        }
        members.push(extract_dir.join(member_path));
    }
    Ok(members)
}

#[cfg(unix)]
pub fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;

    match fs::metadata(path) {
        Ok(metadata) => metadata.is_file() && metadata.permissions().mode() & 0o111 != 0,
        Err(_) => false,
    }
}

#[cfg(not(unix))]
pub fn is_executable(path: &Path) -> bool {
    if !path.is_file() {
        return false;
    }
    let ext = path.extension().and_then(|s| s.to_str()).unwrap_or("");
    matches!(ext.to_lowercase().as_str(), "exe" | "cmd" | "bat")
}

/// Copy with permissions and timestamps, replacing `destination` by rename so
/// a running binary at that path is never truncated in place.
fn copy_preserving_metadata(source: &Path, destination: &Path) -> Result<()> {
    let file_name = destination
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let staging = destination.with_file_name(format!(".{}.ppt-tmp", file_name));
    let _ = fs::remove_file(&staging);

    let placed = write_staging(source, &staging).and_then(|()| {
        fs::rename(&staging, destination).map_err(|e| {
            PptError::io(
                format!("Could not move executable to {}", destination.display()),
                e,
            )
        })
    });
    if placed.is_err() {
        let _ = fs::remove_file(&staging);
    }
    placed
}

/// Times are set through the handle that wrote the contents; the mode is
/// applied last since it may drop write permission.
fn write_staging(source: &Path, staging: &Path) -> Result<()> {
    let write_err = |e| PptError::io(format!("Could not copy to {}", staging.display()), e);

    let metadata = fs::metadata(source)
        .map_err(|e| PptError::io(format!("Could not stat {}", source.display()), e))?;
    let mut reader = fs::File::open(source)
        .map_err(|e| PptError::io(format!("Could not read {}", source.display()), e))?;
    let mut writer = fs::File::create(staging).map_err(write_err)?;
    io::copy(&mut reader, &mut writer).map_err(write_err)?;

    let mut times = fs::FileTimes::new();
    if let Ok(accessed) = metadata.accessed() {
        times = times.set_accessed(accessed);
    }
    if let Ok(modified) = metadata.modified() {
        times = times.set_modified(modified);
    }
    writer.set_times(times).map_err(|e| {
        PptError::io(format!("Could not set timestamps on {}", staging.display()), e)
    })?;
    drop(writer);

    fs::set_permissions(staging, metadata.permissions()).map_err(|e| {
        PptError::io(format!("Could not set permissions on {}", staging.display()), e)
    })?;
    Ok(())
}
