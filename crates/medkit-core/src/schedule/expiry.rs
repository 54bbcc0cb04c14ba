//! Medicine expiry alert calculation.

use chrono::{DateTime, Duration, TimeZone, Utc};

use super::{add_days, local_instant};
use crate::config::ScheduleConfig;
use crate::models::Medicine;
use crate::notification::{
    NotificationDescriptor, NotificationKey, CHANNEL_EXPIRED, CHANNEL_EXPIRY,
    EXPIRY_AFTER_MAX_DAYS, EXPIRY_BEFORE_OFFSETS,
};

/// Produces pre-expiry warnings and post-expiry alerts for a medicine.
#[derive(Debug, Clone)]
pub struct ExpiryScheduleCalculator {
    config: ScheduleConfig,
}

impl ExpiryScheduleCalculator {
    pub fn new(config: ScheduleConfig) -> Self {
        Self { config }
    }

    /// Up to 6 warnings before and 8 alerts after the expiration date.
    ///
    /// Warnings are kept only while still in the future. Alerts are kept
    /// while no more than one day in the past so a late app launch still
    /// produces today's alert.
    pub fn calculate<Tz: TimeZone>(
        &self,
        medicine: &Medicine,
        now: &DateTime<Tz>,
    ) -> Vec<NotificationDescriptor> {
        let Some(expires_at) = medicine.expires_at() else {
            return Vec::new();
        };
        let now_utc = now.with_timezone(&Utc);
        let tz = now.timezone();
        let mut descriptors = Vec::new();

        for &days in EXPIRY_BEFORE_OFFSETS.iter() {
            let fire_at = expires_at - Duration::days(i64::from(days));
            if fire_at <= now_utc {
                continue;
            }
            let key = NotificationKey::ExpiryBefore {
                medicine_id: medicine.id,
                days,
            };
            let mut descriptor = NotificationDescriptor::new(
                key,
                expiring_title(days),
                format!(
                    "{} {} expires in {} {}",
                    urgency_icon(days),
                    medicine.name,
                    days,
                    plural_days(days)
                ),
                fire_at,
            );
            descriptor.channel_key = CHANNEL_EXPIRY.to_string();
            fill_payload(&mut descriptor, medicine, "expiry", days);
            descriptors.push(descriptor);
        }

        let expiry_date = expires_at.with_timezone(&tz).date_naive();
        let cutoff = now_utc - Duration::days(1);
        for days in 0..=EXPIRY_AFTER_MAX_DAYS {
            let Some(fire_at) = add_days(expiry_date, days)
                .and_then(|date| local_instant(&tz, date, self.config.expired_alert_hour, 0))
            else {
                continue;
            };
            if fire_at <= cutoff {
                continue;
            }
            let key = NotificationKey::ExpiryAfter {
                medicine_id: medicine.id,
                kit_id: medicine.kit_id,
                days,
            };
            let body = match days {
                0 => format!("{} expired today. Check your kit and replace it.", medicine.name),
                n => format!(
                    "{} expired {} {} ago. Dispose of it safely.",
                    medicine.name,
                    n,
                    plural_days(n)
                ),
            };
            let mut descriptor =
                NotificationDescriptor::new(key, "Medicine expired".to_string(), body, fire_at);
            descriptor.channel_key = CHANNEL_EXPIRED.to_string();
            descriptor.critical = true;
            fill_payload(&mut descriptor, medicine, "expired", days);
            descriptors.push(descriptor);
        }

        descriptors
    }
}

fn fill_payload(descriptor: &mut NotificationDescriptor, medicine: &Medicine, kind: &str, days: u32) {
    let payload = &mut descriptor.payload;
    payload.insert("medicineId".into(), medicine.id.to_string());
    payload.insert("kitId".into(), medicine.kit_id.to_string());
    payload.insert("medicineName".into(), medicine.name.clone());
    payload.insert("kind".into(), kind.to_string());
    payload.insert("days".into(), days.to_string());
}

fn urgency_icon(days: u32) -> &'static str {
    match days {
        d if d >= 30 => "📅",
        d if d >= 14 => "⏰",
        d if d >= 7 => "⚠️",
        _ => "🚨",
    }
}

fn expiring_title(days: u32) -> String {
    match days {
        1 => "Medicine expires tomorrow".to_string(),
        d if d <= 3 => "Medicine expires very soon".to_string(),
        _ => "Medicine expiring soon".to_string(),
    }
}

fn plural_days(n: u32) -> &'static str {
    if n == 1 {
        "day"
    } else {
        "days"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(rfc3339: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(rfc3339)
            .unwrap()
            .with_timezone(&Utc)
    }

    fn medicine_expiring(at_time: DateTime<Utc>) -> Medicine {
        let mut m = Medicine::new("Amoxicillin".into(), 3);
        m.id = 21;
        m.expiration_date = Some(at_time.timestamp_millis());
        m
    }

    fn calculator() -> ExpiryScheduleCalculator {
        ExpiryScheduleCalculator::new(ScheduleConfig::default())
    }

    #[test]
    fn test_no_expiration_no_alerts() {
        let mut m = medicine_expiring(Utc::now());
        m.expiration_date = None;
        assert!(calculator().calculate(&m, &Utc::now()).is_empty());
    }

    #[test]
    fn test_far_future_expiry_produces_everything() {
        let now = at("2025-01-01T12:00:00Z");
        let m = medicine_expiring(at("2025-06-01T00:00:00Z"));

        let out = calculator().calculate(&m, &now);
        assert_eq!(out.len(), 14);
        assert_eq!(out.iter().filter(|d| d.critical).count(), 8);
        assert_eq!(out[0].id, "medicine-expiry-21-30d");
        assert_eq!(out[0].fire_at, at("2025-05-02T00:00:00Z"));
        assert_eq!(out[6].id, "medicine-expired-21-3-0d");
        assert_eq!(out[6].fire_at, at("2025-06-01T10:00:00Z"));
        assert_eq!(out[13].id, "medicine-expired-21-3-7d");
    }

    #[test]
    fn test_expiring_in_five_days() {
        let now = at("2025-05-10T12:00:00Z");
        let m = medicine_expiring(now + Duration::days(5));

        let out = calculator().calculate(&m, &now);
        let before: Vec<&NotificationDescriptor> =
            out.iter().filter(|d| d.channel_key == CHANNEL_EXPIRY).collect();
        let ids: Vec<&str> = before.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(
            ids,
            vec!["medicine-expiry-21-3d", "medicine-expiry-21-2d", "medicine-expiry-21-1d"]
        );
        assert!(before.iter().all(|d| !d.critical));
        assert!(before.iter().all(|d| d.fire_at > now));
        assert!(before[2].body.starts_with("🚨 Amoxicillin expires in 1 day"));
        assert_eq!(before[2].title, "Medicine expires tomorrow");
    }

    #[test]
    fn test_expired_two_days_ago() {
        let now = at("2025-05-12T00:00:00Z");
        let m = medicine_expiring(at("2025-05-10T00:00:00Z"));

        let out = calculator().calculate(&m, &now);
        assert!(out.iter().all(|d| d.critical));
        assert!(out.iter().all(|d| d.channel_key == CHANNEL_EXPIRED));

        let days: Vec<&str> = out.iter().filter_map(|d| d.payload_value("days")).collect();
        assert_eq!(days, vec!["1", "2", "3", "4", "5", "6", "7"]);
        assert!(!out.iter().any(|d| d.id == "medicine-expired-21-3-0d"));
        assert_eq!(out[1].body, "Amoxicillin expired 2 days ago. Dispose of it safely.");
    }

    #[test]
    fn test_long_expired_produces_nothing() {
        let now = at("2025-08-01T00:00:00Z");
        let m = medicine_expiring(at("2025-05-10T00:00:00Z"));
        assert!(calculator().calculate(&m, &now).is_empty());
    }

    #[test]
    fn test_alert_hour_is_configurable() {
        let calc = ExpiryScheduleCalculator::new(ScheduleConfig {
            expired_alert_hour: 18,
            ..ScheduleConfig::default()
        });
        let now = at("2025-01-01T00:00:00Z");
        let m = medicine_expiring(at("2025-02-01T00:00:00Z"));
        let first_after = calc
            .calculate(&m, &now)
            .into_iter()
            .find(|d| d.critical)
            .unwrap();
        assert_eq!(first_after.fire_at, at("2025-02-01T18:00:00Z"));
    }
}
