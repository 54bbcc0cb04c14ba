//! Archive restore.
//!
//! Restore runs in stages:
//!
//! 1. Unpack the archive and decode every row through the manifest's
//!    [`SchemaMapping`]. Nothing is touched if this fails.
//! 2. Cancel every pending notification.
//! 3. Replace all table contents inside one transaction.
//! 4. Copy bundled photos into the live photo directory.
//! 5. Drop duplicate active reminders.
//! 6. Recreate reminder and expiry notifications.
//!
//! Stages 1 to 4 abort the restore on error. Stage 6 is best effort: each
//! failure is logged and counted in the [`RestoreReport`].

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use chrono::TimeZone;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use super::archive::extract_archive;
use super::{
    ArchiveManifest, BackupError, BackupResult, SchemaMapping, TableSchema, MANIFEST_FILE,
    PHOTOS_DIR, TABLES,
};
use crate::config::BackupConfig;
use crate::db::{medicine_from_row, reminder_from_row, DbResult, Store};
use crate::models::{Medicine, Reminder};
use crate::notification::{BatchOutcome, NotificationScheduler};

/// What a restore did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RestoreReport {
    pub format_version: u32,
    pub exported_at: String,
    /// Rows inserted per store table
    pub rows_restored: BTreeMap<String, usize>,
    pub assets_restored: usize,
    pub duplicates_removed: usize,
    pub reminders_rescheduled: usize,
    pub notifications_requested: usize,
    pub notifications_scheduled: usize,
    /// Reminders or medicines whose notifications could not be recreated
    pub failures: usize,
}

impl RestoreReport {
    fn record(&mut self, outcome: &BatchOutcome) {
        self.notifications_requested += outcome.requested;
        self.notifications_scheduled += outcome.scheduled_count();
    }
}

type DecodedTable = (&'static TableSchema, Vec<Vec<(&'static str, Value)>>);

/// Replaces the store with an archive's contents.
pub struct BackupRestorer<'a, Tz: TimeZone> {
    store: &'a dyn Store,
    scheduler: &'a NotificationScheduler<Tz>,
    config: &'a BackupConfig,
}

impl<'a, Tz: TimeZone> BackupRestorer<'a, Tz> {
    pub fn new(
        store: &'a dyn Store,
        scheduler: &'a NotificationScheduler<Tz>,
        config: &'a BackupConfig,
    ) -> Self {
        Self {
            store,
            scheduler,
            config,
        }
    }

    pub async fn restore(&self, archive: &Path) -> BackupResult<RestoreReport> {
        let unpacked = tempfile::tempdir()?;
        let src = archive.to_path_buf();
        let dest = unpacked.path().to_path_buf();
        tokio::task::spawn_blocking(move || extract_archive(&src, &dest)).await??;

        let manifest_path = unpacked.path().join(MANIFEST_FILE);
        if !tokio::fs::try_exists(&manifest_path).await.unwrap_or(false) {
            return Err(BackupError::InvalidArchive(format!(
                "{} not found",
                MANIFEST_FILE
            )));
        }
        let manifest: ArchiveManifest =
            serde_json::from_slice(&tokio::fs::read(&manifest_path).await?)?;
        let mapping = SchemaMapping::for_version(manifest.version)?;
        let decoded = decode_tables(&manifest, &mapping);

        let mut report = RestoreReport {
            format_version: manifest.version,
            exported_at: manifest.exported_at.clone(),
            ..RestoreReport::default()
        };

        self.scheduler.cancel_all().await?;

        report.rows_restored = match self.reload_tables(&decoded).await {
            Ok(counts) => counts,
            Err(e) => {
                // Store rolled back, but its notifications are already gone
                self.reschedule_retained().await;
                return Err(e);
            }
        };
        report.assets_restored = self.restore_photos(&unpacked.path().join(PHOTOS_DIR)).await?;
        unpacked.close()?;

        let survivors = self.remove_duplicate_reminders(&mut report).await?;
        self.recreate_notifications(&survivors, &mut report).await;

        info!(
            archive = %archive.display(),
            version = report.format_version,
            duplicates = report.duplicates_removed,
            scheduled = report.notifications_scheduled,
            failures = report.failures,
            "restored backup"
        );
        Ok(report)
    }

    /// Wipe and reload every table in one transaction.
    async fn reload_tables(&self, decoded: &[DecodedTable]) -> BackupResult<BTreeMap<String, usize>> {
        self.store.execute("BEGIN IMMEDIATE", &[]).await?;
        match self.write_tables(decoded).await {
            Ok(counts) => {
                self.store.execute("COMMIT", &[]).await?;
                Ok(counts)
            }
            Err(e) => {
                if let Err(rollback) = self.store.execute("ROLLBACK", &[]).await {
                    warn!(error = %rollback, "rollback after failed restore failed");
                }
                Err(e.into())
            }
        }
    }

    async fn write_tables(&self, decoded: &[DecodedTable]) -> DbResult<BTreeMap<String, usize>> {
        for (table, _) in decoded.iter().rev() {
            self.store
                .execute(&format!("DELETE FROM {}", table.name), &[])
                .await?;
        }

        let mut counts = BTreeMap::new();
        for (table, rows) in decoded {
            let mut inserted = 0;
            for row in rows {
                if row.is_empty() {
                    continue;
                }
                let columns: Vec<&str> = row.iter().map(|(name, _)| *name).collect();
                let placeholders: Vec<String> =
                    (1..=row.len()).map(|i| format!("?{}", i)).collect();
                let values: Vec<Value> = row.iter().map(|(_, value)| value.clone()).collect();
                self.store
                    .execute(
                        &format!(
                            "INSERT INTO {} ({}) VALUES ({})",
                            table.name,
                            columns.join(", "),
                            placeholders.join(", ")
                        ),
                        &values,
                    )
                    .await?;
                inserted += 1;
            }
            counts.insert(table.name.to_string(), inserted);
        }
        Ok(counts)
    }

    /// Copy archive photos into the live directory. Existing files with
    /// other names are kept.
    async fn restore_photos(&self, photos: &Path) -> BackupResult<usize> {
        let mut read_dir = match tokio::fs::read_dir(photos).await {
            Ok(read_dir) => read_dir,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };

        tokio::fs::create_dir_all(&self.config.photos_dir).await?;
        let mut copied = 0;
        while let Some(entry) = read_dir.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            let target: PathBuf = self.config.photos_dir.join(entry.file_name());
            tokio::fs::copy(entry.path(), &target).await?;
            copied += 1;
        }
        Ok(copied)
    }

    /// Keep the first inserted active reminder per (member, title) and delete
    /// the rest. Returns the active reminders that remain.
    async fn remove_duplicate_reminders(
        &self,
        report: &mut RestoreReport,
    ) -> BackupResult<Vec<Reminder>> {
        let rows = self
            .store
            .query(
                "SELECT * FROM reminders WHERE active = 1 ORDER BY rowid",
                &[],
            )
            .await?;

        let mut seen = HashSet::new();
        let mut survivors = Vec::new();
        for row in &rows {
            let reminder = match reminder_from_row(row) {
                Ok(reminder) => reminder,
                Err(e) => {
                    warn!(row = ?row.get("id"), error = %e, "skipping unreadable reminder");
                    report.failures += 1;
                    continue;
                }
            };
            if seen.insert(reminder.dedup_key()) {
                survivors.push(reminder);
                continue;
            }

            debug!(reminder_id = reminder.id, title = %reminder.title, "removing duplicate reminder");
            let id = [json!(reminder.id)];
            self.store
                .execute("DELETE FROM reminder_medicines WHERE reminder_id = ?1", &id)
                .await?;
            self.store
                .execute("DELETE FROM intake_logs WHERE reminder_id = ?1", &id)
                .await?;
            self.store
                .execute("DELETE FROM reminders WHERE id = ?1", &id)
                .await?;
            report.duplicates_removed += 1;
        }
        Ok(survivors)
    }

    /// Recreate notifications for whatever the store currently holds.
    async fn reschedule_retained(&self) {
        let rows = match self
            .store
            .query("SELECT * FROM reminders WHERE active = 1 ORDER BY rowid", &[])
            .await
        {
            Ok(rows) => rows,
            Err(e) => {
                warn!(error = %e, "could not reload reminders after failed restore");
                return;
            }
        };
        let reminders: Vec<Reminder> = rows
            .iter()
            .filter_map(|row| reminder_from_row(row).ok())
            .collect();

        let mut report = RestoreReport::default();
        self.recreate_notifications(&reminders, &mut report).await;
        info!(
            reminders = report.reminders_rescheduled,
            scheduled = report.notifications_scheduled,
            failures = report.failures,
            "rescheduled retained data after failed restore"
        );
    }

    async fn recreate_notifications(&self, reminders: &[Reminder], report: &mut RestoreReport) {
        for reminder in reminders {
            let medicines = match self.linked_medicines(reminder.id).await {
                Ok(medicines) => medicines,
                Err(e) => {
                    warn!(reminder_id = reminder.id, error = %e, "could not load reminder medicines");
                    report.failures += 1;
                    continue;
                }
            };
            match self.scheduler.schedule_reminder(reminder, &medicines).await {
                Ok(outcome) => {
                    report.record(&outcome);
                    report.reminders_rescheduled += 1;
                }
                Err(e) => {
                    warn!(reminder_id = reminder.id, error = %e, "could not reschedule reminder");
                    report.failures += 1;
                }
            }
        }

        let rows = match self
            .store
            .query(
                "SELECT * FROM medicines WHERE expiration_date IS NOT NULL ORDER BY id",
                &[],
            )
            .await
        {
            Ok(rows) => rows,
            Err(e) => {
                warn!(error = %e, "could not load medicines for expiry alerts");
                report.failures += 1;
                return;
            }
        };
        for row in &rows {
            match medicine_from_row(row) {
                Ok(medicine) => {
                    let outcome = self.scheduler.schedule_medicine_expiry(&medicine).await;
                    report.record(&outcome);
                }
                Err(e) => {
                    warn!(row = ?row.get("id"), error = %e, "skipping unreadable medicine");
                    report.failures += 1;
                }
            }
        }
    }

    async fn linked_medicines(&self, reminder_id: i64) -> DbResult<Vec<Medicine>> {
        self.store
            .query(
                "SELECT m.* FROM medicines m \
                 JOIN reminder_medicines rm ON rm.medicine_id = m.id \
                 WHERE rm.reminder_id = ?1 ORDER BY m.id",
                &[json!(reminder_id)],
            )
            .await?
            .iter()
            .map(medicine_from_row)
            .collect()
    }
}

fn decode_tables(manifest: &ArchiveManifest, mapping: &SchemaMapping) -> Vec<DecodedTable> {
    TABLES
        .iter()
        .map(|table| {
            let rows = manifest
                .rows(mapping, table)
                .iter()
                .map(|row| mapping.decode_row(table, row))
                .collect();
            (table, rows)
        })
        .collect()
}
