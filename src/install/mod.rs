//! Install, update, uninstall and list.
//!
//! Each command runs one sequential pipeline:
//! release URL -> download -> archive scan -> manifest write.

use crate::archive::{install_executable, ArchiveKind};
use crate::download::ReleaseSource;
use crate::error::{error_chain, PptError, Result};
use crate::manifest::{ManifestStore, UpsertOutcome};
use crate::release_url::{build_download_url, ReleaseUrl};
use crate::report::Reporter;
use crate::types::{ListedPackage, PackageRecord};
use crate::version::is_newer;
use chrono::Utc;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Collaborators shared by every command.
pub struct Context<'a, S: ReleaseSource> {
    pub source: &'a S,
    pub store: &'a ManifestStore,
    pub reporter: &'a dyn Reporter,
    /// Used when neither the command nor the package record names a directory.
    pub install_dir: &'a Path,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallOutcome {
    Installed { record: PackageRecord, path: PathBuf },
    /// The program is already in the manifest; nothing was downloaded.
    AlreadyInstalled { record: PackageRecord },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    Updated {
        name: String,
        from: String,
        to: String,
        path: PathBuf,
    },
    UpToDate {
        name: String,
        current: String,
        latest: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UninstallOutcome {
    pub record: PackageRecord,
    pub binary_path: PathBuf,
    /// False when the binary was already gone from disk.
    pub binary_removed: bool,
}

/// Install the executable published at `url`.
///
/// A program already present in the manifest is refused before any download
/// unless `force` is set, in which case the binary and its record are both
/// replaced.
pub async fn install<S: ReleaseSource>(
    ctx: &Context<'_, S>,
    url: &str,
    install_dir: Option<&Path>,
    force: bool,
) -> Result<InstallOutcome> {
    let release = ReleaseUrl::parse(url)?;
    ArchiveKind::detect(Path::new(&release.asset_filename))?;
    let name = release.program_name().to_string();
    tracing::debug!("Parsed {} (asset {})", release, release.download_url());

    if !force {
        if let Some(existing) = ctx.store.get(&name)? {
            ctx.reporter.warn(&format!(
                "Package '{}' already exists (version {}). Skipping; use `ppt update {}` or `ppt install --force`.",
                name, existing.version, name
            ));
            return Ok(InstallOutcome::AlreadyInstalled { record: existing });
        }
    }

    let install_dir = absolute_dir(install_dir.unwrap_or(ctx.install_dir))?;
    ctx.reporter.info(&format!("Installing {} {}...", name, release.version));

    let path = fetch_and_place(ctx, url, &name, &install_dir).await?;

    let record = PackageRecord {
        name: name.clone(),
        owner: release.owner,
        repo: release.repo,
        version: release.version,
        source_url: release.release_listing_url,
        asset_filename: release.asset_filename,
        install_dir: Some(install_dir.to_string_lossy().to_string()),
        installed_at: Some(Utc::now().to_rfc3339()),
    };

    match ctx.store.upsert(record.clone(), force)? {
        UpsertOutcome::AlreadyExists => {
            // Another invocation recorded the name between our check and write.
            ctx.reporter
                .warn(&format!("Package '{}' already exists. Manifest left unchanged.", name));
            let existing = ctx.store.get(&name)?.unwrap_or(record);
            Ok(InstallOutcome::AlreadyInstalled { record: existing })
        }
        UpsertOutcome::Inserted | UpsertOutcome::Replaced => {
            ctx.reporter
                .info(&format!("Installed {} {} to {}", name, record.version, path.display()));
            Ok(InstallOutcome::Installed { record, path })
        }
    }
}

/// Update `program` when its repository has a strictly newer release.
pub async fn update<S: ReleaseSource>(ctx: &Context<'_, S>, program: &str) -> Result<UpdateOutcome> {
    let record = ctx.store.get(program)?.ok_or_else(|| PptError::NotInstalled {
        program: program.to_string(),
    })?;

    let latest = ctx
        .source
        .latest_tag(&record.source_url, &record.owner, &record.repo)
        .await?;

    if !is_newer(&record.version, &latest)? {
        ctx.reporter.info(&format!(
            "Latest version of {} is {}, nothing to update.",
            program, latest
        ));
        return Ok(UpdateOutcome::UpToDate {
            name: record.name,
            current: record.version,
            latest,
        });
    }

    ctx.reporter
        .info(&format!("Updating {} from {} to {}", program, record.version, latest));

    let url = build_download_url(&record.source_url, &latest, &record.asset_filename);
    let install_dir = record_install_dir(ctx, &record);
    let path = fetch_and_place(ctx, &url, &record.name, &install_dir).await?;

    let from = record.version.clone();
    let updated = PackageRecord {
        version: latest.clone(),
        ..record
    };
    ctx.store.upsert(updated, true)?;

    Ok(UpdateOutcome::Updated {
        name: program.to_string(),
        from,
        to: latest,
        path,
    })
}

/// Update every installed program in manifest order. A failure for one
/// program does not stop the others.
pub async fn update_all<S: ReleaseSource>(ctx: &Context<'_, S>) -> Result<Vec<(String, Result<UpdateOutcome>)>> {
    let names: Vec<String> = ctx.store.load()?.iter().map(|r| r.name.clone()).collect();

    let mut results = Vec::with_capacity(names.len());
    for name in names {
        let result = update(ctx, &name).await;
        if let Err(e) = &result {
            ctx.reporter.warn(&format!("Failed to update {}: {}", name, error_chain(e)));
        }
        results.push((name, result));
    }
    Ok(results)
}

/// Delete the installed binary and drop the manifest entry. A binary that is
/// already gone is only a warning.
pub fn uninstall<S: ReleaseSource>(ctx: &Context<'_, S>, program: &str) -> Result<UninstallOutcome> {
    let record = ctx.store.get(program)?.ok_or_else(|| PptError::NotInstalled {
        program: program.to_string(),
    })?;

    let binary_path = record_install_dir(ctx, &record).join(&record.name);
    let binary_removed = match fs::remove_file(&binary_path) {
        Ok(()) => true,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            let missing = PptError::NotFound {
                path: binary_path.clone(),
            };
            ctx.reporter
                .warn(&format!("Executable {}. Not deleting anything.", missing));
            false
        }
        Err(e) => {
            return Err(PptError::io(
                format!("Could not delete {}", binary_path.display()),
                e,
            ))
        }
    };

    let record = ctx.store.remove(program)?.unwrap_or(record);
    ctx.reporter.info(&format!("Uninstalled {}.", program));

    Ok(UninstallOutcome {
        record,
        binary_path,
        binary_removed,
    })
}

/// Installed programs as `(name, version)` in manifest order.
pub fn list(store: &ManifestStore) -> Result<Vec<ListedPackage>> {
    let manifest = store.load()?;
    tracing::debug!("Loaded {} package(s) from {}", manifest.len(), store.path().display());
    Ok(manifest
        .iter()
        .map(|r| ListedPackage {
            name: r.name.clone(),
            version: r.version.clone(),
        })
        .collect())
}

async fn fetch_and_place<S: ReleaseSource>(
    ctx: &Context<'_, S>,
    url: &str,
    program_name: &str,
    install_dir: &Path,
) -> Result<PathBuf> {
    let scratch = tempfile::Builder::new()
        .prefix("ppt-")
        .tempdir()
        .map_err(|e| PptError::io("Could not create scratch directory", e))?;

    let archive_path = ctx.source.download(url, scratch.path(), ctx.reporter).await?;
    let path = install_executable(&archive_path, program_name, install_dir)?;
    close_scratch(scratch);
    Ok(path)
}

fn close_scratch(scratch: TempDir) {
    let path = scratch.path().to_path_buf();
    if let Err(e) = scratch.close() {
        tracing::debug!("Could not remove scratch directory {}: {}", path.display(), e);
    }
}

fn record_install_dir<S: ReleaseSource>(ctx: &Context<'_, S>, record: &PackageRecord) -> PathBuf {
    record
        .install_dir
        .as_deref()
        .map(PathBuf::from)
        .unwrap_or_else(|| ctx.install_dir.to_path_buf())
}

fn absolute_dir(dir: &Path) -> Result<PathBuf> {
    std::path::absolute(dir).map_err(|e| PptError::io(format!("Could not resolve {}", dir.display()), e))
}
