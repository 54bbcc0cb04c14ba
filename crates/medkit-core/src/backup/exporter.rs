//! Archive export.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::archive::{archive_file_name, compress_dir};
use super::{
    ArchiveManifest, BackupResult, SchemaMapping, MANIFEST_FILE, PHOTOS_DIR, TABLES,
};
use crate::clock::Clock;
use crate::config::BackupConfig;
use crate::db::{medicine_from_row, Store};

/// A written archive.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportedArchive {
    pub path: PathBuf,
    pub file_name: String,
    pub created_at: DateTime<Utc>,
    /// Rows written per store table
    pub row_counts: BTreeMap<String, usize>,
    pub asset_count: usize,
}

/// Writes the whole store plus referenced photos into a single archive.
pub struct BackupExporter<'a> {
    store: &'a dyn Store,
    clock: &'a dyn Clock,
    config: &'a BackupConfig,
}

impl<'a> BackupExporter<'a> {
    pub fn new(store: &'a dyn Store, clock: &'a dyn Clock, config: &'a BackupConfig) -> Self {
        Self {
            store,
            clock,
            config,
        }
    }

    /// Produce `<backups_dir>/<app>_backup_<millis>.zip`.
    ///
    /// The archive is written under a temporary name and renamed once
    /// complete, so a failed export never leaves an archive behind.
    pub async fn export(&self) -> BackupResult<ExportedArchive> {
        let created_at = self.clock.now();
        let mapping = SchemaMapping::current();

        let mut tables = BTreeMap::new();
        let mut row_counts = BTreeMap::new();
        let mut photo_names = BTreeSet::new();
        for table in TABLES {
            let rows = self
                .store
                .query(&format!("SELECT * FROM {} ORDER BY rowid", table.name), &[])
                .await?;
            if table.name == "medicines" {
                photo_names.extend(rows.iter().filter_map(|row| match medicine_from_row(row) {
                    Ok(medicine) => medicine.photo_file_name(),
                    Err(e) => {
                        warn!(row = ?row.get("id"), error = %e, "skipping photo of unreadable medicine");
                        None
                    }
                }));
            }
            row_counts.insert(table.name.to_string(), rows.len());
            tables.insert(
                mapping.table_key(table).to_string(),
                rows.iter().map(|row| mapping.encode_row(table, row)).collect(),
            );
        }

        let staging = tempfile::tempdir()?;
        let asset_paths = self.stage_photos(staging.path(), &photo_names).await?;

        let manifest = ArchiveManifest {
            version: mapping.version(),
            exported_at: created_at.to_rfc3339_opts(SecondsFormat::Millis, true),
            tables,
            asset_paths,
        };
        tokio::fs::write(
            staging.path().join(MANIFEST_FILE),
            serde_json::to_vec_pretty(&manifest)?,
        )
        .await?;

        tokio::fs::create_dir_all(&self.config.backups_dir).await?;
        let file_name = archive_file_name(&self.config.app_name, created_at);
        let path = self.config.backups_dir.join(&file_name);
        let partial = self
            .config
            .backups_dir
            .join(format!(".{}.{}.partial", file_name, Uuid::new_v4()));

        let src = staging.path().to_path_buf();
        let dest = partial.clone();
        let packed = match tokio::task::spawn_blocking(move || compress_dir(&src, &dest)).await {
            Ok(result) => result,
            Err(e) => Err(e.into()),
        };
        if let Err(e) = packed {
            remove_partial(&partial).await;
            return Err(e);
        }
        if let Err(e) = tokio::fs::rename(&partial, &path).await {
            remove_partial(&partial).await;
            return Err(e.into());
        }
        staging.close()?;

        let asset_count = manifest.asset_paths.len();
        info!(
            path = %path.display(),
            tables = row_counts.len(),
            assets = asset_count,
            "exported backup"
        );
        Ok(ExportedArchive {
            path,
            file_name,
            created_at,
            row_counts,
            asset_count,
        })
    }

    /// Copy existing photos into `<staging>/photos`, returning their
    /// archive-relative paths. Missing files are skipped.
    async fn stage_photos(
        &self,
        staging: &Path,
        names: &BTreeSet<String>,
    ) -> BackupResult<Vec<String>> {
        let target = staging.join(PHOTOS_DIR);
        tokio::fs::create_dir_all(&target).await?;

        let mut asset_paths = Vec::new();
        for name in names {
            let source = self.config.photos_dir.join(name);
            if !tokio::fs::try_exists(&source).await.unwrap_or(false) {
                debug!(photo = %name, "photo missing, leaving it out of the archive");
                continue;
            }
            tokio::fs::copy(&source, target.join(name)).await?;
            asset_paths.push(format!("{}/{}", PHOTOS_DIR, name));
        }
        Ok(asset_paths)
    }
}

async fn remove_partial(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!(path = %path.display(), error = %e, "failed to remove partial archive");
        }
    }
}
