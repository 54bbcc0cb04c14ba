//! Medkit Core Library
//!
//! Local-first household medicine kit: dosing reminders, expiry alerts and
//! backup archives.
//!
//! # Architecture
//!
//! ```text
//!     Reminder / Medicine edits
//!                │
//!                ▼
//!        ┌───────────────┐        ┌──────────────────────────┐
//!        │ SQLite store  │        │  Schedule calculators    │
//!        │ (db, models)  │───────▶│  reminder × day × intake │
//!        └───────┬───────┘        │  expiry −30d … +7d       │
//!                │                └────────────┬─────────────┘
//!                │                             │ descriptors
//!                │                             ▼
//!                │                ┌──────────────────────────┐
//!                │                │  NotificationScheduler   │
//!                │                │  canonical ids, batches  │
//!                │                └────────────┬─────────────┘
//!                │                             │
//!                ▼                             ▼
//!        Backup export/restore       Host notification service
//!        (zip: data.json+photos)        (callback interface)
//! ```
//!
//! # Core Principle
//!
//! **Every notification has exactly one canonical id.** Re-scheduling
//! replaces, cancelling removes, and nothing is ever duplicated.
//!
//! # Modules
//!
//! - [`db`]: SQLite database layer and the generic row [`db::Store`]
//! - [`models`]: Domain types (Reminder, Medicine, Kit, etc.)
//! - [`schedule`]: Pure reminder and expiry schedule calculators
//! - [`notification`]: Notification keys, platform boundary and scheduler
//! - [`backup`]: Archive export and restore
//! - [`config`], [`logging`], [`clock`]: Ambient configuration

pub mod backup;
pub mod clock;
pub mod config;
pub mod db;
pub mod logging;
pub mod models;
pub mod notification;
pub mod schedule;

// Re-export commonly used types
pub use backup::{BackupExporter, BackupRestorer, ExportedArchive, RestoreReport};
pub use clock::{Clock, SystemClock};
pub use config::CoreConfig;
pub use db::{Database, SqliteStore, Store};
pub use models::{FamilyMember, Frequency, IntakeLog, IntakeTime, Kit, Medicine, Reminder};
pub use notification::{
    BatchOutcome, NotificationDescriptor, NotificationKey, NotificationPlatform,
    NotificationScheduler,
};
pub use schedule::{ExpiryScheduleCalculator, ReminderScheduleCalculator};

// UniFFI setup - using proc macros
uniffi::setup_scaffolding!();

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::runtime::Runtime;
use tracing::warn;

use notification::{PlatformError, PlatformResult};

// =========================================================================
// FFI Error Type
// =========================================================================

#[derive(Debug, thiserror::Error, uniffi::Error)]
pub enum MedkitError {
    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Notification permission denied: {0}")]
    PermissionDenied(String),

    #[error("Notification error: {0}")]
    NotificationError(String),

    #[error("Backup error: {0}")]
    BackupError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl From<db::DbError> for MedkitError {
    fn from(e: db::DbError) -> Self {
        match e {
            db::DbError::NotFound(what) => MedkitError::NotFound(what),
            other => MedkitError::DatabaseError(other.to_string()),
        }
    }
}

impl From<schedule::ScheduleError> for MedkitError {
    fn from(e: schedule::ScheduleError) -> Self {
        MedkitError::InvalidInput(e.to_string())
    }
}

impl From<PlatformError> for MedkitError {
    fn from(e: PlatformError) -> Self {
        match e {
            PlatformError::NotFound(id) => MedkitError::NotFound(id),
            PlatformError::PermissionDenied => {
                MedkitError::PermissionDenied("notifications are disabled".into())
            }
            PlatformError::Other(message) => MedkitError::NotificationError(message),
        }
    }
}

impl From<backup::BackupError> for MedkitError {
    fn from(e: backup::BackupError) -> Self {
        MedkitError::BackupError(e.to_string())
    }
}

impl From<config::ConfigError> for MedkitError {
    fn from(e: config::ConfigError) -> Self {
        MedkitError::ConfigError(e.to_string())
    }
}

impl From<std::io::Error> for MedkitError {
    fn from(e: std::io::Error) -> Self {
        MedkitError::BackupError(e.to_string())
    }
}

impl From<uniffi::UnexpectedUniFFICallbackError> for MedkitError {
    fn from(e: uniffi::UnexpectedUniFFICallbackError) -> Self {
        MedkitError::NotificationError(e.reason)
    }
}

// =========================================================================
// Host Notification Service (implemented in Swift/Kotlin)
// =========================================================================

/// OS notification primitives provided by the host app.
#[uniffi::export(callback_interface)]
pub trait HostNotificationCenter: Send + Sync {
    fn check_permission(&self) -> bool;
    fn request_permission(&self) -> bool;
    fn can_schedule_exact_alarms(&self) -> bool;
    fn schedule(&self, notification: FfiNotification) -> Result<(), MedkitError>;
    /// Must fail with `NotFound` for unknown ids.
    fn cancel(&self, id: String) -> Result<(), MedkitError>;
    fn cancel_all(&self) -> Result<(), MedkitError>;
    fn pending(&self) -> Result<Vec<FfiNotification>, MedkitError>;
}

struct HostPlatform {
    host: Box<dyn HostNotificationCenter>,
}

fn platform_error(e: MedkitError) -> PlatformError {
    match e {
        MedkitError::NotFound(id) => PlatformError::NotFound(id),
        MedkitError::PermissionDenied(_) => PlatformError::PermissionDenied,
        other => PlatformError::Other(other.to_string()),
    }
}

#[async_trait]
impl NotificationPlatform for HostPlatform {
    async fn check_permission(&self) -> bool {
        self.host.check_permission()
    }

    async fn request_permission(&self) -> bool {
        self.host.request_permission()
    }

    async fn can_schedule_exact_alarms(&self) -> bool {
        self.host.can_schedule_exact_alarms()
    }

    async fn schedule_notification(&self, notification: &NotificationDescriptor) -> PlatformResult<()> {
        self.host
            .schedule(notification.clone().into())
            .map_err(platform_error)
    }

    async fn cancel_notification(&self, id: &str) -> PlatformResult<()> {
        self.host.cancel(id.to_string()).map_err(platform_error)
    }

    async fn cancel_all_notifications(&self) -> PlatformResult<()> {
        self.host.cancel_all().map_err(platform_error)
    }

    async fn get_trigger_notifications(&self) -> PlatformResult<Vec<NotificationDescriptor>> {
        let pending = self.host.pending().map_err(platform_error)?;
        Ok(pending
            .into_iter()
            .filter_map(|n| match NotificationDescriptor::try_from(n) {
                Ok(descriptor) => Some(descriptor),
                Err(e) => {
                    warn!(error = %e, "ignoring unreadable pending notification");
                    None
                }
            })
            .collect())
    }
}

// =========================================================================
// Factory Functions (exported to FFI)
// =========================================================================

/// Install the stderr log subscriber.
#[uniffi::export]
pub fn init_medkit_logging(level: String) -> Result<(), MedkitError> {
    logging::init_logging(&level).map_err(MedkitError::ConfigError)
}

/// Open or create a database at the given path.
///
/// `config_toml` overrides the default [`CoreConfig`].
#[uniffi::export]
pub fn open_medkit(
    path: String,
    config_toml: Option<String>,
    host: Box<dyn HostNotificationCenter>,
) -> Result<Arc<MedkitCore>, MedkitError> {
    let db = Database::open(&path)?;
    MedkitCore::build(db, parse_config(config_toml)?, host)
}

/// Create an in-memory database (for testing).
#[uniffi::export]
pub fn open_medkit_in_memory(
    config_toml: Option<String>,
    host: Box<dyn HostNotificationCenter>,
) -> Result<Arc<MedkitCore>, MedkitError> {
    let db = Database::open_in_memory()?;
    MedkitCore::build(db, parse_config(config_toml)?, host)
}

fn parse_config(source: Option<String>) -> Result<CoreConfig, MedkitError> {
    match source {
        Some(source) => Ok(CoreConfig::from_toml_str(&source)?),
        None => Ok(CoreConfig::default()),
    }
}

// =========================================================================
// Main API Object
// =========================================================================

/// Store, scheduler and backup pipeline behind one FFI handle.
#[derive(uniffi::Object)]
pub struct MedkitCore {
    store: Arc<SqliteStore>,
    clock: Arc<dyn Clock>,
    scheduler: NotificationScheduler,
    config: CoreConfig,
    runtime: Runtime,
}

impl MedkitCore {
    fn build(
        db: Database,
        config: CoreConfig,
        host: Box<dyn HostNotificationCenter>,
    ) -> Result<Arc<Self>, MedkitError> {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let platform: Arc<dyn NotificationPlatform> = Arc::new(HostPlatform { host });
        let scheduler =
            NotificationScheduler::new(platform, clock.clone(), config.schedule.clone());
        let runtime = tokio::runtime::Builder::new_current_thread().build()?;
        Ok(Arc::new(Self {
            store: Arc::new(SqliteStore::new(db)),
            clock,
            scheduler,
            config,
            runtime,
        }))
    }

    fn reminder_with_medicines(&self, reminder_id: i64) -> Result<(Reminder, Vec<Medicine>), MedkitError> {
        let db = self.store.lock()?;
        let reminder = db
            .get_reminder(reminder_id)?
            .ok_or_else(|| MedkitError::NotFound(format!("reminder {}", reminder_id)))?;
        let medicines = db.medicines_for_reminder(reminder_id)?;
        Ok((reminder, medicines))
    }

    fn medicine(&self, medicine_id: i64) -> Result<Medicine, MedkitError> {
        self.store
            .lock()?
            .get_medicine(medicine_id)?
            .ok_or_else(|| MedkitError::NotFound(format!("medicine {}", medicine_id)))
    }
}

#[uniffi::export]
impl MedkitCore {
    // =========================================================================
    // Permissions
    // =========================================================================

    /// Check the notification permission, asking the user if needed.
    pub fn ensure_permission(&self) -> bool {
        self.runtime.block_on(self.scheduler.ensure_permission())
    }

    // =========================================================================
    // Kits and Family Members
    // =========================================================================

    pub fn create_kit(&self, name: String, description: Option<String>) -> Result<i64, MedkitError> {
        let mut kit = Kit::new(name);
        kit.description = description;
        Ok(self.store.lock()?.insert_kit(&kit)?)
    }

    pub fn create_family_member(&self, name: String) -> Result<i64, MedkitError> {
        Ok(self
            .store
            .lock()?
            .insert_family_member(&FamilyMember::new(name))?)
    }

    // =========================================================================
    // Reminder Operations
    // =========================================================================

    /// Store a reminder, link its medicines and schedule it.
    pub fn create_reminder(&self, reminder: FfiReminder) -> Result<FfiScheduleOutcome, MedkitError> {
        let medicine_ids = reminder.medicine_ids.clone();
        let mut model = Reminder::try_from(reminder)?;
        let medicines = {
            let db = self.store.lock()?;
            model.id = db.insert_reminder(&model)?;
            for medicine_id in &medicine_ids {
                db.link_reminder_medicine(model.id, *medicine_id)?;
            }
            db.medicines_for_reminder(model.id)?
        };

        let outcome = self
            .runtime
            .block_on(self.scheduler.schedule_reminder(&model, &medicines))?;
        Ok(FfiScheduleOutcome::new(model.id, &outcome))
    }

    /// Save edits to a reminder and replace its notifications.
    pub fn update_reminder(&self, reminder: FfiReminder) -> Result<FfiScheduleOutcome, MedkitError> {
        let medicine_ids = reminder.medicine_ids.clone();
        let model = Reminder::try_from(reminder)?;
        let (previous, medicines) = {
            let db = self.store.lock()?;
            let previous = db
                .get_reminder(model.id)?
                .ok_or_else(|| MedkitError::NotFound(format!("reminder {}", model.id)))?;
            db.update_reminder(&model)?;
            db.execute_sql(
                "DELETE FROM reminder_medicines WHERE reminder_id = ?1",
                &[serde_json::json!(model.id)],
            )?;
            for medicine_id in &medicine_ids {
                db.link_reminder_medicine(model.id, *medicine_id)?;
            }
            (previous, db.medicines_for_reminder(model.id)?)
        };

        self.runtime.block_on(async {
            // A frequency change leaves ids the new schedule would not replace
            self.scheduler.cancel_reminder(&previous).await;
            self.scheduler.reschedule_reminder(&model, &medicines).await
        })
        .map(|outcome| FfiScheduleOutcome::new(model.id, &outcome))
        .map_err(Into::into)
    }

    /// Pause or resume a reminder.
    pub fn set_reminder_active(&self, reminder_id: i64, active: bool) -> Result<FfiScheduleOutcome, MedkitError> {
        if !self.store.lock()?.set_reminder_active(reminder_id, active)? {
            return Err(MedkitError::NotFound(format!("reminder {}", reminder_id)));
        }
        let (reminder, medicines) = self.reminder_with_medicines(reminder_id)?;
        let outcome = if active {
            self.runtime
                .block_on(self.scheduler.reschedule_reminder(&reminder, &medicines))?
        } else {
            self.runtime.block_on(self.scheduler.cancel_reminder(&reminder));
            BatchOutcome::default()
        };
        Ok(FfiScheduleOutcome::new(reminder_id, &outcome))
    }

    /// Cancel a reminder's notifications and delete it.
    pub fn delete_reminder(&self, reminder_id: i64) -> Result<(), MedkitError> {
        let (reminder, _) = self.reminder_with_medicines(reminder_id)?;
        self.runtime.block_on(self.scheduler.cancel_reminder(&reminder));
        self.store.lock()?.delete_reminder(reminder_id)?;
        Ok(())
    }

    pub fn list_reminders(&self) -> Result<Vec<FfiReminder>, MedkitError> {
        let db = self.store.lock()?;
        db.list_reminders()?
            .into_iter()
            .map(|reminder| -> Result<FfiReminder, MedkitError> {
                let medicine_ids = db.medicine_ids_for_reminder(reminder.id)?;
                Ok(FfiReminder::from_model(reminder, medicine_ids))
            })
            .collect()
    }

    /// Record a taken dose and drop today's pending alert for that intake.
    ///
    /// Returns whether a pending alert was cancelled.
    pub fn log_intake(
        &self,
        reminder_id: i64,
        medicine_id: Option<i64>,
        intake_index: u32,
    ) -> Result<bool, MedkitError> {
        let today = self.scheduler.today();
        let reminder = self.store.lock()?.get_reminder(reminder_id)?;
        let day_index = match &reminder {
            Some(reminder) => self
                .runtime
                .block_on(self.scheduler.intake_slot_on(reminder, today, intake_index))?,
            None => None,
        };

        let log = IntakeLog {
            id: 0,
            reminder_id,
            medicine_id,
            taken_at: self.clock.now().timestamp_millis(),
            day_index,
            intake_index: Some(intake_index),
        };
        self.store.lock()?.insert_intake_log(&log)?;

        Ok(self
            .runtime
            .block_on(self.scheduler.cancel_intake_on(reminder_id, today, intake_index))?)
    }

    /// Next delivery time of a reminder (epoch millis).
    pub fn next_scheduled_for(&self, reminder_id: i64) -> Result<Option<i64>, MedkitError> {
        let next = self
            .runtime
            .block_on(self.scheduler.next_scheduled_for(reminder_id))?;
        Ok(next.map(|at| at.timestamp_millis()))
    }

    /// Pending notifications of a reminder, earliest first.
    pub fn pending_for_reminder(&self, reminder_id: i64) -> Result<Vec<FfiNotification>, MedkitError> {
        let pending = self
            .runtime
            .block_on(self.scheduler.pending_for_reminder(reminder_id))?;
        Ok(pending.into_iter().map(Into::into).collect())
    }

    // =========================================================================
    // Medicine Operations
    // =========================================================================

    /// Store a medicine and schedule its expiry alerts.
    pub fn add_medicine(&self, medicine: FfiMedicine) -> Result<FfiScheduleOutcome, MedkitError> {
        let mut model = Medicine::from(medicine);
        model.id = self.store.lock()?.insert_medicine(&model)?;
        let outcome = self
            .runtime
            .block_on(self.scheduler.schedule_medicine_expiry(&model));
        Ok(FfiScheduleOutcome::new(model.id, &outcome))
    }

    /// Save edits to a medicine and replace its expiry alerts.
    pub fn update_medicine(&self, medicine: FfiMedicine) -> Result<FfiScheduleOutcome, MedkitError> {
        let updated = Medicine::from(medicine);
        let previous = self.medicine(updated.id)?;
        self.store.lock()?.update_medicine(&updated)?;
        let outcome = self
            .runtime
            .block_on(self.scheduler.reschedule_medicine_expiry(&previous, &updated));
        Ok(FfiScheduleOutcome::new(updated.id, &outcome))
    }

    pub fn delete_medicine(&self, medicine_id: i64) -> Result<(), MedkitError> {
        let medicine = self.medicine(medicine_id)?;
        self.runtime.block_on(
            self.scheduler
                .cancel_medicine_expiry(medicine.id, medicine.kit_id),
        );
        self.store.lock()?.delete_medicine(medicine_id)?;
        Ok(())
    }

    pub fn list_medicines(&self) -> Result<Vec<FfiMedicine>, MedkitError> {
        let medicines = self.store.lock()?.list_medicines()?;
        Ok(medicines.into_iter().map(Into::into).collect())
    }

    // =========================================================================
    // Backup Operations
    // =========================================================================

    /// Write a backup archive into the configured backup directory.
    pub fn export_backup(&self) -> Result<FfiBackup, MedkitError> {
        let exporter = BackupExporter::new(self.store.as_ref(), self.clock.as_ref(), &self.config.backup);
        let exported = self.runtime.block_on(exporter.export())?;
        let size_bytes = std::fs::metadata(&exported.path)?.len();
        Ok(FfiBackup {
            path: exported.path.to_string_lossy().into_owned(),
            file_name: exported.file_name,
            created_at_millis: exported.created_at.timestamp_millis(),
            size_bytes,
        })
    }

    /// Replace all data with an archive's contents and recreate notifications.
    pub fn restore_backup(&self, path: String) -> Result<FfiRestoreReport, MedkitError> {
        let restorer = BackupRestorer::new(self.store.as_ref(), &self.scheduler, &self.config.backup);
        let report = self.runtime.block_on(restorer.restore(&PathBuf::from(path)))?;
        Ok(report.into())
    }

    /// Archives in the backup directory, newest first.
    pub fn list_backups(&self) -> Result<Vec<FfiBackup>, MedkitError> {
        let entries = self
            .runtime
            .block_on(backup::list_backups(&self.config.backup.backups_dir))?;
        Ok(entries.into_iter().map(Into::into).collect())
    }

    pub fn delete_backup(&self, path: String) -> Result<(), MedkitError> {
        Ok(self
            .runtime
            .block_on(backup::delete_backup(&PathBuf::from(path)))?)
    }

    /// Keep the `keep` newest archives, returning how many were deleted.
    pub fn prune_backups(&self, keep: u32) -> Result<u32, MedkitError> {
        let removed = self.runtime.block_on(backup::prune_backups(
            &self.config.backup.backups_dir,
            keep as usize,
        ))?;
        Ok(removed as u32)
    }
}

// =========================================================================
// FFI Types
// =========================================================================

/// FFI-safe notification.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiNotification {
    pub id: String,
    pub title: String,
    pub body: String,
    pub fire_at_millis: i64,
    pub channel_key: String,
    pub critical: bool,
    pub payload: HashMap<String, String>,
}

impl From<NotificationDescriptor> for FfiNotification {
    fn from(descriptor: NotificationDescriptor) -> Self {
        Self {
            id: descriptor.id,
            title: descriptor.title,
            body: descriptor.body,
            fire_at_millis: descriptor.fire_at.timestamp_millis(),
            channel_key: descriptor.channel_key,
            critical: descriptor.critical,
            payload: descriptor.payload.into_iter().collect(),
        }
    }
}

impl TryFrom<FfiNotification> for NotificationDescriptor {
    type Error = MedkitError;

    fn try_from(notification: FfiNotification) -> Result<Self, Self::Error> {
        let fire_at = DateTime::<Utc>::from_timestamp_millis(notification.fire_at_millis)
            .ok_or_else(|| {
                MedkitError::InvalidInput(format!(
                    "fire time out of range: {}",
                    notification.fire_at_millis
                ))
            })?;
        Ok(NotificationDescriptor {
            id: notification.id,
            title: notification.title,
            body: notification.body,
            fire_at,
            payload: notification.payload.into_iter().collect(),
            channel_key: notification.channel_key,
            critical: notification.critical,
        })
    }
}

/// FFI-safe intake time.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiIntakeTime {
    pub hour: u32,
    pub minute: u32,
}

/// FFI-safe reminder.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiReminder {
    /// Zero for a new reminder
    pub id: i64,
    pub family_member_id: Option<i64>,
    pub title: String,
    /// "once", "daily" or "weekly"
    pub frequency: String,
    pub times: Vec<FfiIntakeTime>,
    pub active: bool,
    pub dosage: Option<String>,
    pub description: Option<String>,
    pub medicine_ids: Vec<i64>,
}

impl FfiReminder {
    fn from_model(reminder: Reminder, medicine_ids: Vec<i64>) -> Self {
        Self {
            id: reminder.id,
            family_member_id: reminder.family_member_id,
            title: reminder.title,
            frequency: reminder.frequency.to_string(),
            times: reminder
                .times
                .into_iter()
                .map(|t| FfiIntakeTime {
                    hour: t.hour,
                    minute: t.minute,
                })
                .collect(),
            active: reminder.active,
            dosage: reminder.dosage,
            description: reminder.description,
            medicine_ids,
        }
    }
}

impl TryFrom<FfiReminder> for Reminder {
    type Error = MedkitError;

    fn try_from(reminder: FfiReminder) -> Result<Self, Self::Error> {
        let frequency: Frequency = reminder.frequency.parse().map_err(MedkitError::InvalidInput)?;
        let times = reminder
            .times
            .into_iter()
            .map(|t| IntakeTime::new(t.hour, t.minute))
            .collect();
        let mut model = Reminder::new(reminder.title, frequency, times);
        model.id = reminder.id;
        model.family_member_id = reminder.family_member_id;
        model.active = reminder.active;
        model.dosage = reminder.dosage;
        model.description = reminder.description;
        Ok(model)
    }
}

/// FFI-safe medicine.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiMedicine {
    /// Zero for a new medicine
    pub id: i64,
    pub name: String,
    pub kit_id: i64,
    /// Epoch millis
    pub expiration_date: Option<i64>,
    pub quantity: f64,
    pub unit: String,
    pub photo_path: Option<String>,
}

impl From<Medicine> for FfiMedicine {
    fn from(medicine: Medicine) -> Self {
        Self {
            id: medicine.id,
            name: medicine.name,
            kit_id: medicine.kit_id,
            expiration_date: medicine.expiration_date,
            quantity: medicine.quantity,
            unit: medicine.unit,
            photo_path: medicine.photo_path,
        }
    }
}

impl From<FfiMedicine> for Medicine {
    fn from(medicine: FfiMedicine) -> Self {
        let mut model = Medicine::new(medicine.name, medicine.kit_id);
        model.id = medicine.id;
        model.expiration_date = medicine.expiration_date;
        model.quantity = medicine.quantity;
        model.unit = medicine.unit;
        model.photo_path = medicine.photo_path;
        model
    }
}

/// FFI-safe scheduling result.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiScheduleOutcome {
    /// Reminder or medicine the notifications belong to
    pub target_id: i64,
    pub requested: u32,
    pub scheduled: u32,
}

impl FfiScheduleOutcome {
    fn new(target_id: i64, outcome: &BatchOutcome) -> Self {
        Self {
            target_id,
            requested: outcome.requested as u32,
            scheduled: outcome.scheduled_count() as u32,
        }
    }
}

/// FFI-safe archive entry.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiBackup {
    pub path: String,
    pub file_name: String,
    pub created_at_millis: i64,
    pub size_bytes: u64,
}

impl From<backup::BackupEntry> for FfiBackup {
    fn from(entry: backup::BackupEntry) -> Self {
        Self {
            path: entry.path.to_string_lossy().into_owned(),
            file_name: entry.file_name,
            created_at_millis: entry.created_at.timestamp_millis(),
            size_bytes: entry.size_bytes,
        }
    }
}

/// FFI-safe restore summary.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiRestoreReport {
    pub format_version: u32,
    pub exported_at: String,
    pub rows_restored: u32,
    pub assets_restored: u32,
    pub duplicates_removed: u32,
    pub reminders_rescheduled: u32,
    pub notifications_requested: u32,
    pub notifications_scheduled: u32,
    pub failures: u32,
}

impl From<RestoreReport> for FfiRestoreReport {
    fn from(report: RestoreReport) -> Self {
        Self {
            format_version: report.format_version,
            exported_at: report.exported_at,
            rows_restored: report.rows_restored.values().sum::<usize>() as u32,
            assets_restored: report.assets_restored as u32,
            duplicates_removed: report.duplicates_removed as u32,
            reminders_rescheduled: report.reminders_rescheduled as u32,
            notifications_requested: report.notifications_requested as u32,
            notifications_scheduled: report.notifications_scheduled as u32,
            failures: report.failures as u32,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct TestHost {
        pending: Mutex<BTreeMap<String, FfiNotification>>,
    }

    impl HostNotificationCenter for TestHost {
        fn check_permission(&self) -> bool {
            true
        }

        fn request_permission(&self) -> bool {
            true
        }

        fn can_schedule_exact_alarms(&self) -> bool {
            true
        }

        fn schedule(&self, notification: FfiNotification) -> Result<(), MedkitError> {
            let mut pending = self.pending.lock().unwrap();
            pending.insert(notification.id.clone(), notification);
            Ok(())
        }

        fn cancel(&self, id: String) -> Result<(), MedkitError> {
            match self.pending.lock().unwrap().remove(&id) {
                Some(_) => Ok(()),
                None => Err(MedkitError::NotFound(id)),
            }
        }

        fn cancel_all(&self) -> Result<(), MedkitError> {
            self.pending.lock().unwrap().clear();
            Ok(())
        }

        fn pending(&self) -> Result<Vec<FfiNotification>, MedkitError> {
            Ok(self.pending.lock().unwrap().values().cloned().collect())
        }
    }

    fn core() -> Arc<MedkitCore> {
        open_medkit_in_memory(None, Box::new(TestHost::default())).unwrap()
    }

    #[test]
    fn test_log_intake_records_slot() {
        let core = core();
        let mut reminder = Reminder::new(
            "Iron".into(),
            Frequency::Daily,
            vec![IntakeTime::new(9, 0)],
        );
        let created = chrono::Local::now().date_naive() - chrono::Days::new(3);
        reminder.created_at = created
            .and_hms_opt(12, 0, 0)
            .unwrap()
            .and_local_timezone(chrono::Local)
            .earliest()
            .unwrap()
            .to_rfc3339();
        let reminder_id = core.store.lock().unwrap().insert_reminder(&reminder).unwrap();

        assert!(!core.log_intake(reminder_id, None, 0).unwrap());

        let logs = core.store.lock().unwrap().list_intake_logs(reminder_id).unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].day_index, Some(3));
        assert_eq!(logs[0].intake_index, Some(0));
    }

    #[test]
    fn test_restore_report_exposes_requested_and_scheduled() {
        let mut report = RestoreReport {
            notifications_requested: 7,
            notifications_scheduled: 6,
            ..RestoreReport::default()
        };
        report.rows_restored.insert("reminders".into(), 2);
        report.rows_restored.insert("medicines".into(), 3);

        let ffi = FfiRestoreReport::from(report);
        assert_eq!(ffi.notifications_requested, 7);
        assert_eq!(ffi.notifications_scheduled, 6);
        assert_eq!(ffi.rows_restored, 5);
    }
}
