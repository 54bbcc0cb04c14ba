//! Intake reminder schedule calculation.

use chrono::{DateTime, TimeZone, Utc};

use super::{add_days, local_instant, ScheduleError, ScheduleResult};
use crate::config::ScheduleConfig;
use crate::models::{Frequency, IntakeTime, Medicine, Reminder};
use crate::notification::{NotificationDescriptor, NotificationKey, CHANNEL_REMINDERS};

/// Expands reminders into the notification instances to request.
#[derive(Debug, Clone)]
pub struct ReminderScheduleCalculator {
    config: ScheduleConfig,
}

impl ReminderScheduleCalculator {
    pub fn new(config: ScheduleConfig) -> Self {
        Self { config }
    }

    /// Future notification instances for a reminder, ordered by slot.
    ///
    /// Slots at or before `now` are dropped, so the first day of a recurring
    /// horizon usually yields fewer than `times_per_day` instances.
    pub fn calculate<Tz: TimeZone>(
        &self,
        reminder: &Reminder,
        medicines: &[Medicine],
        now: &DateTime<Tz>,
    ) -> ScheduleResult<Vec<NotificationDescriptor>> {
        validate(reminder)?;

        let now_utc = now.with_timezone(&Utc);
        let tz = now.timezone();
        let today = now.date_naive();
        let text = IntakeText::new(reminder, medicines);

        let mut descriptors = Vec::new();
        match reminder.frequency {
            Frequency::Once => {
                let time = reminder.times[0];
                let fire_at = local_instant(&tz, today, time.hour, time.minute)
                    .filter(|at| *at > now_utc)
                    .or_else(|| {
                        add_days(today, 1)
                            .and_then(|tomorrow| local_instant(&tz, tomorrow, time.hour, time.minute))
                    });
                if let Some(fire_at) = fire_at {
                    let key = NotificationKey::Once {
                        reminder_id: reminder.id,
                        nonce: now_utc.timestamp_millis(),
                    };
                    descriptors.push(text.descriptor(key, fire_at, None));
                }
            }
            Frequency::Daily => {
                for day in 0..self.config.daily_horizon_days {
                    let Some(date) = add_days(today, day) else { break };
                    for intake in 0..reminder.times_per_day {
                        let time = reminder.times[intake as usize];
                        let Some(fire_at) = local_instant(&tz, date, time.hour, time.minute) else {
                            continue;
                        };
                        if fire_at <= now_utc {
                            continue;
                        }
                        let key = NotificationKey::DailyIntake {
                            reminder_id: reminder.id,
                            day,
                            intake,
                        };
                        descriptors.push(text.descriptor(key, fire_at, Some(("day", day, intake))));
                    }
                }
            }
            Frequency::Weekly => {
                let per_week = reminder.times_per_day;
                'weeks: for week in 0..self.config.weekly_horizon_weeks {
                    for intake in 0..per_week {
                        let Some(offset) = week
                            .checked_mul(7)
                            .and_then(|start| start.checked_add(intake * 7 / per_week))
                        else {
                            break 'weeks;
                        };
                        let Some(date) = add_days(today, offset) else { break 'weeks };
                        let time = reminder.times[intake as usize];
                        let Some(fire_at) = local_instant(&tz, date, time.hour, time.minute) else {
                            continue;
                        };
                        if fire_at <= now_utc {
                            continue;
                        }
                        let key = NotificationKey::WeeklyIntake {
                            reminder_id: reminder.id,
                            week,
                            intake,
                        };
                        descriptors.push(text.descriptor(key, fire_at, Some(("week", week, intake))));
                    }
                }
            }
        }

        Ok(descriptors)
    }

    /// Every recurring key the reminder can own over the configured horizon.
    ///
    /// Once-reminders have no deterministic keys (their id carries a nonce)
    /// and yield an empty list.
    pub fn recurring_keys(&self, reminder: &Reminder) -> Vec<NotificationKey> {
        let intakes = reminder.times_per_day.max(reminder.times.len() as u32);
        match reminder.frequency {
            Frequency::Once => Vec::new(),
            Frequency::Daily => (0..self.config.daily_horizon_days)
                .flat_map(|day| {
                    (0..intakes).map(move |intake| NotificationKey::DailyIntake {
                        reminder_id: reminder.id,
                        day,
                        intake,
                    })
                })
                .collect(),
            Frequency::Weekly => (0..self.config.weekly_horizon_weeks)
                .flat_map(|week| {
                    (0..intakes).map(move |intake| NotificationKey::WeeklyIntake {
                        reminder_id: reminder.id,
                        week,
                        intake,
                    })
                })
                .collect(),
        }
    }
}

fn validate(reminder: &Reminder) -> ScheduleResult<()> {
    for IntakeTime { hour, minute } in &reminder.times {
        if *hour > 23 || *minute > 59 {
            return Err(ScheduleError::InvalidTime {
                hour: *hour,
                minute: *minute,
            });
        }
    }

    let expected = match reminder.frequency {
        Frequency::Once => 1,
        Frequency::Daily | Frequency::Weekly => {
            if reminder.times_per_day == 0 {
                return Err(ScheduleError::NoIntakes {
                    reminder_id: reminder.id,
                });
            }
            reminder.times_per_day
        }
    };
    if reminder.times.len() < expected as usize {
        return Err(ScheduleError::MissingIntakeTimes {
            reminder_id: reminder.id,
            expected,
            found: reminder.times.len(),
        });
    }
    Ok(())
}

/// Shared title/body/payload for one reminder's instances.
struct IntakeText<'a> {
    reminder: &'a Reminder,
    medicine_names: String,
    medicine_ids: String,
}

impl<'a> IntakeText<'a> {
    fn new(reminder: &'a Reminder, medicines: &[Medicine]) -> Self {
        let medicine_names = medicines
            .iter()
            .map(|m| m.name.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        let medicine_ids = format!(
            "[{}]",
            medicines
                .iter()
                .map(|m| m.id.to_string())
                .collect::<Vec<_>>()
                .join(",")
        );
        Self {
            reminder,
            medicine_names,
            medicine_ids,
        }
    }

    /// `slot` is (slot payload name, slot index, intake index) for recurring reminders.
    fn descriptor(
        &self,
        key: NotificationKey,
        fire_at: DateTime<Utc>,
        slot: Option<(&str, u32, u32)>,
    ) -> NotificationDescriptor {
        let mut body = if self.medicine_names.is_empty() {
            "Time to take your medicine".to_string()
        } else {
            format!("Time to take {}", self.medicine_names)
        };
        if let Some(dosage) = self.reminder.dosage.as_deref().filter(|d| !d.is_empty()) {
            body.push_str(&format!(" ({})", dosage));
        }
        if let Some((_, _, intake)) = slot {
            if self.reminder.times_per_day > 1 {
                body.push_str(&format!(
                    " - intake {} of {}",
                    intake + 1,
                    self.reminder.times_per_day
                ));
            }
        }

        let mut descriptor =
            NotificationDescriptor::new(key, self.reminder.title.clone(), body, fire_at);
        descriptor.channel_key = CHANNEL_REMINDERS.to_string();

        let payload = &mut descriptor.payload;
        payload.insert("reminderId".into(), self.reminder.id.to_string());
        payload.insert("medicineIds".into(), self.medicine_ids.clone());
        payload.insert(
            "familyMemberId".into(),
            self.reminder
                .family_member_id
                .map(|id| id.to_string())
                .unwrap_or_default(),
        );
        payload.insert("frequency".into(), self.reminder.frequency.to_string());
        if let Some((name, index, intake)) = slot {
            payload.insert(name.into(), index.to_string());
            payload.insert("intake".into(), intake.to_string());
        }
        descriptor
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn at(rfc3339: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(rfc3339)
            .unwrap()
            .with_timezone(&Utc)
    }

    fn medicine(id: i64, name: &str) -> Medicine {
        let mut m = Medicine::new(name.into(), 1);
        m.id = id;
        m
    }

    fn reminder(id: i64, frequency: Frequency, times: Vec<IntakeTime>) -> Reminder {
        let mut r = Reminder::new("Pills".into(), frequency, times);
        r.id = id;
        r
    }

    fn calculator(days: u32, weeks: u32) -> ReminderScheduleCalculator {
        ReminderScheduleCalculator::new(ScheduleConfig {
            daily_horizon_days: days,
            weekly_horizon_weeks: weeks,
            ..ScheduleConfig::default()
        })
    }

    #[test]
    fn test_weekly_stops_at_end_of_calendar() {
        let start = chrono::NaiveDate::MAX
            .checked_sub_days(chrono::Days::new(10))
            .unwrap();
        let now = Utc.from_utc_datetime(&start.and_hms_opt(0, 0, 0).unwrap());
        let r = reminder(1, Frequency::Weekly, vec![IntakeTime::new(9, 0)]);

        let out = calculator(30, 52).calculate(&r, &[], &now).unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[1].id, "reminder-weekly-1-week1-intake0");
    }

    #[test]
    fn test_once_in_the_past_rolls_to_tomorrow() {
        let now = at("2025-05-10T14:00:00Z");
        let r = reminder(1, Frequency::Once, vec![IntakeTime::new(8, 0)]);

        let out = calculator(30, 12).calculate(&r, &[], &now).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].fire_at, at("2025-05-11T08:00:00Z"));
        assert_eq!(out[0].id, format!("reminder-once-1-{}", now.timestamp_millis()));
        assert_eq!(out[0].payload_value("frequency"), Some("once"));
        assert!(out[0].payload_value("day").is_none());
    }

    #[test]
    fn test_once_later_today_stays_today() {
        let now = at("2025-05-10T07:00:00Z");
        let r = reminder(1, Frequency::Once, vec![IntakeTime::new(8, 0)]);
        let out = calculator(30, 12).calculate(&r, &[], &now).unwrap();
        assert_eq!(out[0].fire_at, at("2025-05-10T08:00:00Z"));
    }

    #[test]
    fn test_once_exactly_now_rolls_forward() {
        let now = at("2025-05-10T08:00:00Z");
        let r = reminder(1, Frequency::Once, vec![IntakeTime::new(8, 0)]);
        let out = calculator(30, 12).calculate(&r, &[], &now).unwrap();
        assert_eq!(out[0].fire_at, at("2025-05-11T08:00:00Z"));
    }

    #[test]
    fn test_daily_midday_skips_past_slots() {
        let now = at("2025-05-10T12:00:00Z");
        let r = reminder(
            2,
            Frequency::Daily,
            vec![IntakeTime::new(8, 0), IntakeTime::new(20, 0)],
        );

        let out = calculator(3, 12).calculate(&r, &[], &now).unwrap();
        let ids: Vec<&str> = out.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(
            ids,
            vec![
                "reminder-daily-2-day0-intake1",
                "reminder-daily-2-day1-intake0",
                "reminder-daily-2-day1-intake1",
                "reminder-daily-2-day2-intake0",
                "reminder-daily-2-day2-intake1",
            ]
        );
        assert!(out.len() <= 6);
        assert_eq!(out[0].fire_at, at("2025-05-10T20:00:00Z"));
        assert_eq!(out[0].payload_value("day"), Some("0"));
        assert_eq!(out[0].payload_value("intake"), Some("1"));
    }

    #[test]
    fn test_weekly_spreads_intakes_over_week() {
        let now = at("2025-05-10T06:00:00Z");
        let r = reminder(
            3,
            Frequency::Weekly,
            vec![IntakeTime::new(9, 0), IntakeTime::new(9, 0)],
        );

        let out = calculator(30, 2).calculate(&r, &[], &now).unwrap();
        let fires: Vec<DateTime<Utc>> = out.iter().map(|d| d.fire_at).collect();
        assert_eq!(
            fires,
            vec![
                at("2025-05-10T09:00:00Z"),
                at("2025-05-13T09:00:00Z"),
                at("2025-05-17T09:00:00Z"),
                at("2025-05-20T09:00:00Z"),
            ]
        );
        assert_eq!(out[3].id, "reminder-weekly-3-week1-intake1");
        assert_eq!(out[3].payload_value("week"), Some("1"));
    }

    #[test]
    fn test_body_and_payload() {
        let now = at("2025-05-10T06:00:00Z");
        let mut r = reminder(
            4,
            Frequency::Daily,
            vec![IntakeTime::new(8, 0), IntakeTime::new(20, 0)],
        );
        r.family_member_id = Some(9);
        r.dosage = Some("2 tablets".into());
        let meds = [medicine(11, "Aspirin"), medicine(12, "Vitamin C")];

        let out = calculator(1, 1).calculate(&r, &meds, &now).unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].title, "Pills");
        assert_eq!(
            out[0].body,
            "Time to take Aspirin, Vitamin C (2 tablets) - intake 1 of 2"
        );
        assert_eq!(out[0].payload_value("medicineIds"), Some("[11,12]"));
        assert_eq!(out[0].payload_value("familyMemberId"), Some("9"));
        assert_eq!(out[0].payload_value("reminderId"), Some("4"));
        assert!(!out[0].critical);
        assert_eq!(out[0].channel_key, CHANNEL_REMINDERS);
    }

    #[test]
    fn test_single_intake_body_has_no_counter() {
        let now = at("2025-05-10T06:00:00Z");
        let r = reminder(5, Frequency::Daily, vec![IntakeTime::new(8, 0)]);
        let out = calculator(1, 1)
            .calculate(&r, &[medicine(1, "Iron")], &now)
            .unwrap();
        assert_eq!(out[0].body, "Time to take Iron");
        assert_eq!(out[0].payload_value("familyMemberId"), Some(""));
    }

    #[test]
    fn test_missing_times_rejected() {
        let mut r = reminder(6, Frequency::Daily, vec![IntakeTime::new(8, 0)]);
        r.times_per_day = 3;
        let err = calculator(1, 1)
            .calculate(&r, &[], &Utc::now())
            .unwrap_err();
        assert_eq!(
            err,
            ScheduleError::MissingIntakeTimes {
                reminder_id: 6,
                expected: 3,
                found: 1
            }
        );

        let once = reminder(7, Frequency::Once, vec![]);
        assert!(calculator(1, 1).calculate(&once, &[], &Utc::now()).is_err());

        let bad = reminder(8, Frequency::Daily, vec![IntakeTime::new(24, 0)]);
        assert!(matches!(
            calculator(1, 1).calculate(&bad, &[], &Utc::now()),
            Err(ScheduleError::InvalidTime { .. })
        ));
    }

    #[test]
    fn test_recurring_keys_cover_horizon() {
        let r = reminder(
            2,
            Frequency::Daily,
            vec![IntakeTime::new(8, 0), IntakeTime::new(20, 0)],
        );
        let calc = calculator(3, 12);
        let keys = calc.recurring_keys(&r);
        assert_eq!(keys.len(), 6);

        // Every generated id is one of the recurring keys
        let now = at("2025-05-10T00:00:00Z") - Duration::hours(1);
        for descriptor in calc.calculate(&r, &[], &now).unwrap() {
            assert!(keys.contains(&descriptor.key().unwrap()));
        }

        let once = reminder(3, Frequency::Once, vec![IntakeTime::new(8, 0)]);
        assert!(calc.recurring_keys(&once).is_empty());
    }
}
