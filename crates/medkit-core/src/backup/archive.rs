//! Zip packing and archive discovery.

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::{debug, info};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use super::BackupResult;

const ARCHIVE_MARKER: &str = "_backup_";
const ARCHIVE_EXTENSION: &str = ".zip";

/// `<app>_backup_<millis>.zip`
pub fn archive_file_name(app_name: &str, created_at: DateTime<Utc>) -> String {
    format!(
        "{}{}{}{}",
        app_name,
        ARCHIVE_MARKER,
        created_at.timestamp_millis(),
        ARCHIVE_EXTENSION
    )
}

/// Creation time encoded in an archive file name.
pub fn parse_archive_timestamp(file_name: &str) -> Option<DateTime<Utc>> {
    let stem = file_name.strip_suffix(ARCHIVE_EXTENSION)?;
    let (_, millis) = stem.rsplit_once(ARCHIVE_MARKER)?;
    DateTime::<Utc>::from_timestamp_millis(millis.parse().ok()?)
}

/// A finished archive on disk.
#[derive(Debug, Clone, PartialEq)]
pub struct BackupEntry {
    pub path: PathBuf,
    pub file_name: String,
    pub created_at: DateTime<Utc>,
    pub size_bytes: u64,
}

/// Archives in `dir`, newest first. A missing directory has none.
pub async fn list_backups(dir: &Path) -> BackupResult<Vec<BackupEntry>> {
    let mut read_dir = match tokio::fs::read_dir(dir).await {
        Ok(read_dir) => read_dir,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut entries = Vec::new();
    while let Some(entry) = read_dir.next_entry().await? {
        let file_name = entry.file_name().to_string_lossy().into_owned();
        let Some(created_at) = parse_archive_timestamp(&file_name) else {
            continue;
        };
        let metadata = entry.metadata().await?;
        if !metadata.is_file() {
            continue;
        }
        entries.push(BackupEntry {
            path: entry.path(),
            file_name,
            created_at,
            size_bytes: metadata.len(),
        });
    }

    entries.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| b.file_name.cmp(&a.file_name))
    });
    Ok(entries)
}

pub async fn delete_backup(path: &Path) -> BackupResult<()> {
    tokio::fs::remove_file(path).await?;
    info!(path = %path.display(), "deleted backup");
    Ok(())
}

/// Keep the `keep` newest archives and delete the rest.
///
/// Returns the number of archives removed.
pub async fn prune_backups(dir: &Path, keep: usize) -> BackupResult<usize> {
    let stale: Vec<BackupEntry> = list_backups(dir).await?.into_iter().skip(keep).collect();
    for entry in &stale {
        delete_backup(&entry.path).await?;
    }
    Ok(stale.len())
}

/// Pack the contents of `src` into a zip at `dest`.
pub(crate) fn compress_dir(src: &Path, dest: &Path) -> BackupResult<()> {
    let mut writer = ZipWriter::new(File::create(dest)?);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    add_dir(&mut writer, src, src, options)?;
    writer.finish()?;
    debug!(dest = %dest.display(), "wrote archive");
    Ok(())
}

fn add_dir(
    writer: &mut ZipWriter<File>,
    root: &Path,
    dir: &Path,
    options: SimpleFileOptions,
) -> BackupResult<()> {
    let mut children: Vec<PathBuf> = std::fs::read_dir(dir)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<io::Result<_>>()?;
    children.sort();

    for path in children {
        let name = archive_name(root, &path);
        if path.is_dir() {
            writer.add_directory(format!("{}/", name), options)?;
            add_dir(writer, root, &path, options)?;
        } else {
            writer.start_file(name, options)?;
            io::copy(&mut File::open(&path)?, writer)?;
        }
    }
    Ok(())
}

// Entry names always use forward slashes
fn archive_name(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Unpack `archive` into `dest`. Entries escaping `dest` are rejected.
pub(crate) fn extract_archive(archive: &Path, dest: &Path) -> BackupResult<()> {
    let mut zip = ZipArchive::new(File::open(archive)?)?;
    zip.extract(dest)?;
    debug!(archive = %archive.display(), entries = zip.len(), "extracted archive");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_file_name_round_trip() {
        let at = Utc.timestamp_millis_opt(1_717_171_717_171).unwrap();
        let name = archive_file_name("medkit", at);
        assert_eq!(name, "medkit_backup_1717171717171.zip");
        assert_eq!(parse_archive_timestamp(&name), Some(at));
    }

    #[test]
    fn test_parse_rejects_foreign_names() {
        assert_eq!(parse_archive_timestamp("notes.txt"), None);
        assert_eq!(parse_archive_timestamp("medkit_backup_abc.zip"), None);
        assert_eq!(parse_archive_timestamp(".medkit_backup_1.zip.1234.partial"), None);
    }

    #[test]
    fn test_compress_and_extract() {
        let src = tempfile::tempdir().unwrap();
        std::fs::write(src.path().join("data.json"), b"{}").unwrap();
        std::fs::create_dir(src.path().join("photos")).unwrap();
        std::fs::write(src.path().join("photos").join("a.jpg"), b"jpeg").unwrap();

        let out = tempfile::tempdir().unwrap();
        let zip_path = out.path().join("x.zip");
        compress_dir(src.path(), &zip_path).unwrap();

        let dest = tempfile::tempdir().unwrap();
        extract_archive(&zip_path, dest.path()).unwrap();
        assert_eq!(std::fs::read(dest.path().join("data.json")).unwrap(), b"{}");
        assert_eq!(
            std::fs::read(dest.path().join("photos").join("a.jpg")).unwrap(),
            b"jpeg"
        );
    }

    #[tokio::test]
    async fn test_list_and_prune() {
        let dir = tempfile::tempdir().unwrap();
        for millis in [1_000_i64, 3_000, 2_000] {
            let at = Utc.timestamp_millis_opt(millis).unwrap();
            std::fs::write(dir.path().join(archive_file_name("medkit", at)), b"zip").unwrap();
        }
        std::fs::write(dir.path().join("unrelated.txt"), b"x").unwrap();

        let listed = list_backups(dir.path()).await.unwrap();
        let names: Vec<&str> = listed.iter().map(|e| e.file_name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "medkit_backup_3000.zip",
                "medkit_backup_2000.zip",
                "medkit_backup_1000.zip"
            ]
        );

        assert_eq!(prune_backups(dir.path(), 1).await.unwrap(), 2);
        let remaining = list_backups(dir.path()).await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].file_name, "medkit_backup_3000.zip");
    }

    #[tokio::test]
    async fn test_list_missing_dir_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let listed = list_backups(&dir.path().join("nope")).await.unwrap();
        assert!(listed.is_empty());
    }
}
