//! Notification scheduling against the host platform.

use std::sync::Arc;

use chrono::{DateTime, Local, NaiveDate, TimeZone, Utc};
use futures::future::join_all;
use tracing::{debug, info, warn};

use super::{
    NotificationDescriptor, NotificationKey, NotificationPlatform, PlatformError, PlatformResult,
};
use crate::clock::Clock;
use crate::config::ScheduleConfig;
use crate::models::{Frequency, Medicine, Reminder};
use crate::schedule::{ExpiryScheduleCalculator, ReminderScheduleCalculator, ScheduleResult};

/// Result of submitting a batch of notifications.
///
/// Batches are not atomic: failed or skipped instances are simply absent
/// from `scheduled`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchOutcome {
    /// Instances submitted by the caller
    pub requested: usize,
    /// Instances the platform accepted
    pub scheduled: Vec<NotificationDescriptor>,
}

impl BatchOutcome {
    pub fn scheduled_count(&self) -> usize {
        self.scheduled.len()
    }

    pub fn failed_count(&self) -> usize {
        self.requested - self.scheduled.len()
    }

    pub fn is_complete(&self) -> bool {
        self.failed_count() == 0
    }

    /// Fold another batch into this one.
    pub fn merge(&mut self, other: BatchOutcome) {
        self.requested += other.requested;
        self.scheduled.extend(other.scheduled);
    }
}

/// Schedules, cancels and inspects notifications.
///
/// Local times of day are interpreted in `Tz`; the host's local zone by
/// default.
pub struct NotificationScheduler<Tz: TimeZone = Local> {
    platform: Arc<dyn NotificationPlatform>,
    clock: Arc<dyn Clock>,
    tz: Tz,
    reminders: ReminderScheduleCalculator,
    expiry: ExpiryScheduleCalculator,
}

impl NotificationScheduler<Local> {
    /// Scheduler using the host's local time zone.
    pub fn new(
        platform: Arc<dyn NotificationPlatform>,
        clock: Arc<dyn Clock>,
        config: ScheduleConfig,
    ) -> Self {
        Self::with_timezone(platform, clock, config, Local)
    }
}

impl<Tz: TimeZone> NotificationScheduler<Tz> {
    pub fn with_timezone(
        platform: Arc<dyn NotificationPlatform>,
        clock: Arc<dyn Clock>,
        config: ScheduleConfig,
        tz: Tz,
    ) -> Self {
        Self {
            platform,
            clock,
            tz,
            reminders: ReminderScheduleCalculator::new(config.clone()),
            expiry: ExpiryScheduleCalculator::new(config),
        }
    }

    fn now_local(&self) -> DateTime<Tz> {
        self.clock.now().with_timezone(&self.tz)
    }

    pub fn reminder_calculator(&self) -> &ReminderScheduleCalculator {
        &self.reminders
    }

    pub fn expiry_calculator(&self) -> &ExpiryScheduleCalculator {
        &self.expiry
    }

    // =========================================================================
    // Permissions
    // =========================================================================

    /// Check the notification permission, asking the user if it is missing.
    pub async fn ensure_permission(&self) -> bool {
        if self.platform.check_permission().await {
            return true;
        }
        let granted = self.platform.request_permission().await;
        info!(granted, "requested notification permission");
        granted
    }

    pub async fn can_schedule_exact_alarms(&self) -> bool {
        self.platform.can_schedule_exact_alarms().await
    }

    // =========================================================================
    // Primitive operations
    // =========================================================================

    /// Request delivery of one notification.
    ///
    /// Returns false without touching the platform when permission is
    /// missing or `fire_at` is not in the future.
    pub async fn schedule(&self, descriptor: &NotificationDescriptor) -> bool {
        if !self.platform.check_permission().await {
            debug!(id = %descriptor.id, "notification permission missing, not scheduling");
            return false;
        }
        self.submit(descriptor).await
    }

    async fn submit(&self, descriptor: &NotificationDescriptor) -> bool {
        if descriptor.fire_at <= self.clock.now() {
            debug!(id = %descriptor.id, fire_at = %descriptor.fire_at, "skipping notification in the past");
            return false;
        }
        match self.platform.schedule_notification(descriptor).await {
            Ok(()) => true,
            Err(e) => {
                warn!(id = %descriptor.id, error = %e, "failed to schedule notification");
                false
            }
        }
    }

    /// Submit independent notifications concurrently and join them.
    pub async fn schedule_batch(&self, descriptors: Vec<NotificationDescriptor>) -> BatchOutcome {
        let requested = descriptors.len();
        if requested == 0 {
            return BatchOutcome::default();
        }
        if !self.platform.check_permission().await {
            debug!(requested, "notification permission missing, dropping batch");
            return BatchOutcome {
                requested,
                scheduled: Vec::new(),
            };
        }

        let results = join_all(descriptors.iter().map(|d| self.submit(d))).await;
        let scheduled: Vec<NotificationDescriptor> = descriptors
            .into_iter()
            .zip(results)
            .filter_map(|(descriptor, ok)| ok.then_some(descriptor))
            .collect();

        if scheduled.len() < requested {
            debug!(requested, scheduled = scheduled.len(), "batch partially scheduled");
        }
        BatchOutcome {
            requested,
            scheduled,
        }
    }

    /// Cancel one notification. Unknown ids are ignored.
    pub async fn cancel(&self, id: &str) {
        match self.platform.cancel_notification(id).await {
            Ok(()) | Err(PlatformError::NotFound(_)) => {}
            Err(e) => warn!(id, error = %e, "failed to cancel notification"),
        }
    }

    async fn cancel_many(&self, ids: Vec<String>) {
        join_all(ids.iter().map(|id| self.cancel(id))).await;
    }

    /// Cancel every pending notification.
    pub async fn cancel_all(&self) -> PlatformResult<()> {
        self.platform.cancel_all_notifications().await?;
        info!("cancelled all pending notifications");
        Ok(())
    }

    /// Notifications registered and not yet delivered.
    pub async fn list_pending(&self) -> PlatformResult<Vec<NotificationDescriptor>> {
        self.platform.get_trigger_notifications().await
    }

    // =========================================================================
    // Reminders
    // =========================================================================

    /// Schedule every future instance of a reminder. Inactive reminders
    /// schedule nothing.
    pub async fn schedule_reminder(
        &self,
        reminder: &Reminder,
        medicines: &[Medicine],
    ) -> ScheduleResult<BatchOutcome> {
        if !reminder.active {
            return Ok(BatchOutcome::default());
        }
        let descriptors = self
            .reminders
            .calculate(reminder, medicines, &self.now_local())?;
        let outcome = self.schedule_batch(descriptors).await;
        info!(
            reminder_id = reminder.id,
            requested = outcome.requested,
            scheduled = outcome.scheduled_count(),
            "scheduled reminder"
        );
        Ok(outcome)
    }

    /// Cancel every notification a reminder may own.
    pub async fn cancel_reminder(&self, reminder: &Reminder) {
        let mut ids: Vec<String> = self
            .reminders
            .recurring_keys(reminder)
            .iter()
            .map(NotificationKey::to_string)
            .collect();

        // Once-reminders carry a nonce, so they can only be found by scanning
        match self.pending_for_reminder(reminder.id).await {
            Ok(pending) => {
                for descriptor in pending {
                    if !ids.contains(&descriptor.id) {
                        ids.push(descriptor.id);
                    }
                }
            }
            Err(e) => warn!(reminder_id = reminder.id, error = %e, "could not list pending notifications"),
        }

        debug!(reminder_id = reminder.id, count = ids.len(), "cancelling reminder notifications");
        self.cancel_many(ids).await;
    }

    /// Cancel and re-create a reminder's notifications after an edit.
    pub async fn reschedule_reminder(
        &self,
        reminder: &Reminder,
        medicines: &[Medicine],
    ) -> ScheduleResult<BatchOutcome> {
        self.cancel_reminder(reminder).await;
        self.schedule_reminder(reminder, medicines).await
    }

    /// Pending notifications attributed to a reminder, earliest first.
    pub async fn pending_for_reminder(
        &self,
        reminder_id: i64,
    ) -> PlatformResult<Vec<NotificationDescriptor>> {
        let mut pending: Vec<NotificationDescriptor> = self
            .list_pending()
            .await?
            .into_iter()
            .filter(|d| d.reminder_id() == Some(reminder_id))
            .collect();
        pending.sort_by_key(|d| d.fire_at);
        Ok(pending)
    }

    /// Next future delivery time for a reminder.
    pub async fn next_scheduled_for(&self, reminder_id: i64) -> PlatformResult<Option<DateTime<Utc>>> {
        let now = self.clock.now();
        Ok(self
            .pending_for_reminder(reminder_id)
            .await?
            .into_iter()
            .map(|d| d.fire_at)
            .find(|at| *at > now))
    }

    /// Cancel the pending instance for a day/week slot and intake.
    ///
    /// Returns whether a matching notification was found.
    pub async fn cancel_intake(&self, reminder_id: i64, slot: u32, intake: u32) -> PlatformResult<bool> {
        let slot = slot.to_string();
        let intake = intake.to_string();
        let matching: Vec<String> = self
            .pending_for_reminder(reminder_id)
            .await?
            .into_iter()
            .filter(|d| {
                let slot_value = d.payload_value("day").or_else(|| d.payload_value("week"));
                slot_value == Some(slot.as_str()) && d.payload_value("intake") == Some(intake.as_str())
            })
            .map(|d| d.id)
            .collect();

        let found = !matching.is_empty();
        self.cancel_many(matching).await;
        Ok(found)
    }

    /// Cancel the instance of `intake` that fires on local `date`, e.g. once
    /// that dose has been logged.
    pub async fn cancel_intake_on(
        &self,
        reminder_id: i64,
        date: NaiveDate,
        intake: u32,
    ) -> PlatformResult<bool> {
        let matching: Vec<String> = self
            .pending_intake_on(reminder_id, date, intake)
            .await?
            .into_iter()
            .map(|d| d.id)
            .collect();

        let found = !matching.is_empty();
        self.cancel_many(matching).await;
        Ok(found)
    }

    /// Pending instances of `intake` that fire on local `date`.
    pub async fn pending_intake_on(
        &self,
        reminder_id: i64,
        date: NaiveDate,
        intake: u32,
    ) -> PlatformResult<Vec<NotificationDescriptor>> {
        let intake = intake.to_string();
        Ok(self
            .pending_for_reminder(reminder_id)
            .await?
            .into_iter()
            .filter(|d| {
                let intake_matches = match d.payload_value("intake") {
                    Some(value) => value == intake,
                    // Once-reminders have a single intake
                    None => intake == "0",
                };
                intake_matches && d.fire_at.with_timezone(&self.tz).date_naive() == date
            })
            .collect())
    }

    /// Day or week offset of the slot `intake` occupies on local `date`.
    ///
    /// Taken from the pending instance when there is one, otherwise counted
    /// from the reminder's creation date. Once-reminders have no slot.
    pub async fn intake_slot_on(
        &self,
        reminder: &Reminder,
        date: NaiveDate,
        intake: u32,
    ) -> PlatformResult<Option<u32>> {
        if reminder.frequency == Frequency::Once {
            return Ok(None);
        }
        let pending = self.pending_intake_on(reminder.id, date, intake).await?;
        if let Some(slot) = pending.iter().find_map(NotificationDescriptor::slot_index) {
            return Ok(Some(slot));
        }

        let Ok(created) = DateTime::parse_from_rfc3339(&reminder.created_at) else {
            return Ok(None);
        };
        let days = (date - created.with_timezone(&self.tz).date_naive()).num_days();
        let Ok(days) = u32::try_from(days) else {
            return Ok(None);
        };
        Ok(Some(match reminder.frequency {
            Frequency::Weekly => days / 7,
            _ => days,
        }))
    }

    /// Today's date in the scheduler's time zone.
    pub fn today(&self) -> NaiveDate {
        self.now_local().date_naive()
    }

    // =========================================================================
    // Medicine expiry
    // =========================================================================

    /// Schedule expiry warnings and alerts for a medicine.
    pub async fn schedule_medicine_expiry(&self, medicine: &Medicine) -> BatchOutcome {
        let descriptors = self.expiry.calculate(medicine, &self.now_local());
        let outcome = self.schedule_batch(descriptors).await;
        debug!(
            medicine_id = medicine.id,
            requested = outcome.requested,
            scheduled = outcome.scheduled_count(),
            "scheduled expiry alerts"
        );
        outcome
    }

    /// Cancel all 14 possible expiry notifications of a medicine.
    pub async fn cancel_medicine_expiry(&self, medicine_id: i64, kit_id: i64) {
        let ids = NotificationKey::all_expiry_keys(medicine_id, kit_id)
            .iter()
            .map(NotificationKey::to_string)
            .collect();
        self.cancel_many(ids).await;
    }

    /// Replace expiry notifications after a medicine was edited.
    pub async fn reschedule_medicine_expiry(
        &self,
        previous: &Medicine,
        updated: &Medicine,
    ) -> BatchOutcome {
        self.cancel_medicine_expiry(previous.id, previous.kit_id).await;
        if previous.kit_id != updated.kit_id || previous.id != updated.id {
            self.cancel_medicine_expiry(updated.id, updated.kit_id).await;
        }
        self.schedule_medicine_expiry(updated).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::models::{Frequency, IntakeTime};
    use crate::notification::InMemoryPlatform;
    use chrono::Duration;

    fn at(rfc3339: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(rfc3339)
            .unwrap()
            .with_timezone(&Utc)
    }

    fn setup(now: &str) -> (Arc<InMemoryPlatform>, Arc<FixedClock>, NotificationScheduler<Utc>) {
        let platform = Arc::new(InMemoryPlatform::new());
        let clock = Arc::new(FixedClock::new(at(now)));
        let scheduler = NotificationScheduler::with_timezone(
            platform.clone(),
            clock.clone(),
            ScheduleConfig {
                daily_horizon_days: 3,
                weekly_horizon_weeks: 2,
                ..ScheduleConfig::default()
            },
            Utc,
        );
        (platform, clock, scheduler)
    }

    fn descriptor(id_day: u32, fire_at: DateTime<Utc>) -> NotificationDescriptor {
        NotificationDescriptor::new(
            NotificationKey::DailyIntake { reminder_id: 1, day: id_day, intake: 0 },
            "t".into(),
            "b".into(),
            fire_at,
        )
    }

    fn daily_reminder() -> Reminder {
        let mut r = Reminder::new(
            "Pills".into(),
            Frequency::Daily,
            vec![IntakeTime::new(8, 0), IntakeTime::new(20, 0)],
        );
        r.id = 1;
        r
    }

    #[tokio::test]
    async fn test_schedule_rejects_past_and_denied() {
        let (platform, clock, scheduler) = setup("2025-05-10T12:00:00Z");

        assert!(!scheduler.schedule(&descriptor(0, clock.now())).await);
        assert!(!scheduler.schedule(&descriptor(0, clock.now() - Duration::minutes(1))).await);
        assert!(scheduler.schedule(&descriptor(1, clock.now() + Duration::minutes(1))).await);
        assert_eq!(platform.pending_ids(), vec!["reminder-daily-1-day1-intake0"]);

        platform.set_permission(false);
        assert!(!scheduler.schedule(&descriptor(2, clock.now() + Duration::hours(1))).await);
        assert_eq!(platform.pending_ids().len(), 1);
    }

    #[tokio::test]
    async fn test_batch_partial_failure() {
        let (platform, clock, scheduler) = setup("2025-05-10T12:00:00Z");
        platform.fail_on("reminder-daily-1-day1-intake0");

        let batch = (0..3)
            .map(|d| descriptor(d, clock.now() + Duration::days(i64::from(d) + 1)))
            .collect();
        let outcome = scheduler.schedule_batch(batch).await;

        assert_eq!(outcome.requested, 3);
        assert_eq!(outcome.scheduled_count(), 2);
        assert_eq!(outcome.failed_count(), 1);
        assert!(!outcome.is_complete());
        assert_eq!(platform.pending_ids().len(), 2);
    }

    #[tokio::test]
    async fn test_batch_without_permission_schedules_nothing() {
        let (platform, clock, scheduler) = setup("2025-05-10T12:00:00Z");
        platform.set_permission(false);
        let outcome = scheduler
            .schedule_batch(vec![descriptor(0, clock.now() + Duration::hours(1))])
            .await;
        assert_eq!(outcome.requested, 1);
        assert_eq!(outcome.scheduled_count(), 0);
    }

    #[tokio::test]
    async fn test_cancel_unknown_is_noop() {
        let (_, _, scheduler) = setup("2025-05-10T12:00:00Z");
        scheduler.cancel("does-not-exist").await;
        scheduler.cancel_medicine_expiry(1, 1).await;
    }

    #[tokio::test]
    async fn test_reschedule_is_idempotent() {
        let (platform, _, scheduler) = setup("2025-05-10T12:00:00Z");
        let reminder = daily_reminder();

        let first = scheduler.schedule_reminder(&reminder, &[]).await.unwrap();
        let ids_first = platform.pending_ids();
        assert_eq!(first.scheduled_count(), 5);

        let second = scheduler.reschedule_reminder(&reminder, &[]).await.unwrap();
        assert_eq!(second.scheduled_count(), 5);
        assert_eq!(platform.pending_ids(), ids_first);
    }

    #[tokio::test]
    async fn test_cancel_once_reminder_by_scan() {
        let (platform, clock, scheduler) = setup("2025-05-10T12:00:00Z");
        let mut reminder = daily_reminder();
        reminder.frequency = Frequency::Once;
        reminder.times_per_day = 1;

        scheduler.schedule_reminder(&reminder, &[]).await.unwrap();
        assert_eq!(platform.pending_ids().len(), 1);

        // An edit later gets a new nonce; the old id must still be removed
        clock.advance(Duration::minutes(5));
        scheduler.reschedule_reminder(&reminder, &[]).await.unwrap();
        let ids = platform.pending_ids();
        assert_eq!(ids.len(), 1);
        assert_eq!(
            ids[0],
            format!("reminder-once-1-{}", clock.now().timestamp_millis())
        );
    }

    #[tokio::test]
    async fn test_inactive_reminder_schedules_nothing() {
        let (platform, _, scheduler) = setup("2025-05-10T12:00:00Z");
        let mut reminder = daily_reminder();
        reminder.active = false;
        let outcome = scheduler.schedule_reminder(&reminder, &[]).await.unwrap();
        assert_eq!(outcome, BatchOutcome::default());
        assert!(platform.pending_ids().is_empty());
    }

    #[tokio::test]
    async fn test_next_scheduled_and_cancel_intake() {
        let (platform, _, scheduler) = setup("2025-05-10T12:00:00Z");
        let reminder = daily_reminder();
        scheduler.schedule_reminder(&reminder, &[]).await.unwrap();

        assert_eq!(
            scheduler.next_scheduled_for(1).await.unwrap(),
            Some(at("2025-05-10T20:00:00Z"))
        );
        assert_eq!(scheduler.next_scheduled_for(99).await.unwrap(), None);

        assert!(scheduler.cancel_intake(1, 0, 1).await.unwrap());
        assert!(!scheduler.cancel_intake(1, 0, 1).await.unwrap());
        assert_eq!(
            scheduler.next_scheduled_for(1).await.unwrap(),
            Some(at("2025-05-11T08:00:00Z"))
        );

        let tomorrow = NaiveDate::from_ymd_opt(2025, 5, 11).unwrap();
        assert!(scheduler.cancel_intake_on(1, tomorrow, 0).await.unwrap());
        assert!(!platform
            .pending_ids()
            .contains(&"reminder-daily-1-day1-intake0".to_string()));
        assert_eq!(platform.pending_ids().len(), 3);
    }

    #[tokio::test]
    async fn test_intake_slot_from_pending_or_creation_date() {
        let (platform, _, scheduler) = setup("2025-05-10T12:00:00Z");
        let mut reminder = daily_reminder();
        reminder.created_at = "2025-05-07T09:00:00Z".into();
        scheduler.schedule_reminder(&reminder, &[]).await.unwrap();

        let tomorrow = NaiveDate::from_ymd_opt(2025, 5, 11).unwrap();
        assert_eq!(
            scheduler.intake_slot_on(&reminder, tomorrow, 0).await.unwrap(),
            Some(1)
        );

        // Already delivered: fall back to days since creation
        scheduler.cancel_all().await.unwrap();
        assert!(platform.pending_ids().is_empty());
        let today = NaiveDate::from_ymd_opt(2025, 5, 10).unwrap();
        assert_eq!(
            scheduler.intake_slot_on(&reminder, today, 0).await.unwrap(),
            Some(3)
        );

        reminder.frequency = Frequency::Weekly;
        assert_eq!(
            scheduler.intake_slot_on(&reminder, today, 0).await.unwrap(),
            Some(0)
        );
        reminder.created_at = "not a date".into();
        assert_eq!(scheduler.intake_slot_on(&reminder, today, 0).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_medicine_expiry_reschedule_after_kit_move() {
        let (platform, clock, scheduler) = setup("2025-05-10T12:00:00Z");
        let mut medicine = Medicine::new("Syrup".into(), 1);
        medicine.id = 7;
        medicine.expiration_date = Some((clock.now() + Duration::days(60)).timestamp_millis());

        let outcome = scheduler.schedule_medicine_expiry(&medicine).await;
        assert_eq!(outcome.scheduled_count(), 14);

        let mut moved = medicine.clone();
        moved.kit_id = 2;
        scheduler.reschedule_medicine_expiry(&medicine, &moved).await;

        let ids = platform.pending_ids();
        assert_eq!(ids.len(), 14);
        assert!(ids.iter().all(|id| !id.starts_with("medicine-expired-7-1-")));
        assert!(ids.contains(&"medicine-expired-7-2-0d".to_string()));
    }

    #[tokio::test]
    async fn test_ensure_permission_requests_when_missing() {
        let (platform, _, scheduler) = setup("2025-05-10T12:00:00Z");
        platform.set_permission(false);
        assert!(scheduler.ensure_permission().await);
        assert!(scheduler.can_schedule_exact_alarms().await);
    }
}
