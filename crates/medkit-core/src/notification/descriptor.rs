//! Notification descriptors and their deterministic identities.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Channel for intake reminders.
pub const CHANNEL_REMINDERS: &str = "medicine_reminders";
/// Channel for "expires soon" alerts.
pub const CHANNEL_EXPIRY: &str = "medicine_expiry";
/// Channel for "has expired" alerts.
pub const CHANNEL_EXPIRED: &str = "medicine_expired";

/// Days before expiration at which a warning fires.
pub const EXPIRY_BEFORE_OFFSETS: [u32; 6] = [30, 14, 7, 3, 2, 1];
/// Highest day after expiration at which an alert fires (inclusive).
pub const EXPIRY_AFTER_MAX_DAYS: u32 = 7;

/// Logical identity of a notification.
///
/// Re-deriving the same logical notification always yields the same key, so
/// cancel-then-reschedule never leaks duplicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NotificationKey {
    Once { reminder_id: i64, nonce: i64 },
    DailyIntake { reminder_id: i64, day: u32, intake: u32 },
    WeeklyIntake { reminder_id: i64, week: u32, intake: u32 },
    ExpiryBefore { medicine_id: i64, days: u32 },
    ExpiryAfter { medicine_id: i64, kit_id: i64, days: u32 },
}

impl NotificationKey {
    /// Reminder this notification belongs to, if any.
    pub fn reminder_id(&self) -> Option<i64> {
        match self {
            NotificationKey::Once { reminder_id, .. }
            | NotificationKey::DailyIntake { reminder_id, .. }
            | NotificationKey::WeeklyIntake { reminder_id, .. } => Some(*reminder_id),
            _ => None,
        }
    }

    /// Medicine this notification belongs to, if any.
    pub fn medicine_id(&self) -> Option<i64> {
        match self {
            NotificationKey::ExpiryBefore { medicine_id, .. }
            | NotificationKey::ExpiryAfter { medicine_id, .. } => Some(*medicine_id),
            _ => None,
        }
    }

    /// All expiry keys that can exist for a medicine.
    pub fn all_expiry_keys(medicine_id: i64, kit_id: i64) -> Vec<NotificationKey> {
        let before = EXPIRY_BEFORE_OFFSETS
            .iter()
            .map(|&days| NotificationKey::ExpiryBefore { medicine_id, days });
        let after = (0..=EXPIRY_AFTER_MAX_DAYS).map(|days| NotificationKey::ExpiryAfter {
            medicine_id,
            kit_id,
            days,
        });
        before.chain(after).collect()
    }
}

impl fmt::Display for NotificationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotificationKey::Once { reminder_id, nonce } => {
                write!(f, "reminder-once-{}-{}", reminder_id, nonce)
            }
            NotificationKey::DailyIntake { reminder_id, day, intake } => {
                write!(f, "reminder-daily-{}-day{}-intake{}", reminder_id, day, intake)
            }
            NotificationKey::WeeklyIntake { reminder_id, week, intake } => {
                write!(f, "reminder-weekly-{}-week{}-intake{}", reminder_id, week, intake)
            }
            NotificationKey::ExpiryBefore { medicine_id, days } => {
                write!(f, "medicine-expiry-{}-{}d", medicine_id, days)
            }
            NotificationKey::ExpiryAfter { medicine_id, kit_id, days } => {
                write!(f, "medicine-expired-{}-{}-{}d", medicine_id, kit_id, days)
            }
        }
    }
}

/// Error returned when an id string is not a known notification key.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unrecognized notification id: {0}")]
pub struct ParseKeyError(pub String);

impl FromStr for NotificationKey {
    type Err = ParseKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseKeyError(s.to_string());
        let int = |part: &str| part.parse::<i64>().map_err(|_| err());
        let count = |part: &str, prefix: &str| {
            part.strip_prefix(prefix)
                .and_then(|n| n.parse::<u32>().ok())
                .ok_or_else(err)
        };
        let days = |part: &str| {
            part.strip_suffix('d')
                .and_then(|n| n.parse::<u32>().ok())
                .ok_or_else(err)
        };

        if let Some(rest) = s.strip_prefix("reminder-once-") {
            let (reminder_id, nonce) = rest.split_once('-').ok_or_else(err)?;
            return Ok(NotificationKey::Once {
                reminder_id: int(reminder_id)?,
                nonce: int(nonce)?,
            });
        }
        if let Some(rest) = s.strip_prefix("reminder-daily-") {
            let parts: Vec<&str> = rest.split('-').collect();
            if let [reminder_id, day, intake] = parts.as_slice() {
                return Ok(NotificationKey::DailyIntake {
                    reminder_id: int(reminder_id)?,
                    day: count(day, "day")?,
                    intake: count(intake, "intake")?,
                });
            }
            return Err(err());
        }
        if let Some(rest) = s.strip_prefix("reminder-weekly-") {
            let parts: Vec<&str> = rest.split('-').collect();
            if let [reminder_id, week, intake] = parts.as_slice() {
                return Ok(NotificationKey::WeeklyIntake {
                    reminder_id: int(reminder_id)?,
                    week: count(week, "week")?,
                    intake: count(intake, "intake")?,
                });
            }
            return Err(err());
        }
        if let Some(rest) = s.strip_prefix("medicine-expiry-") {
            let (medicine_id, offset) = rest.split_once('-').ok_or_else(err)?;
            return Ok(NotificationKey::ExpiryBefore {
                medicine_id: int(medicine_id)?,
                days: days(offset)?,
            });
        }
        if let Some(rest) = s.strip_prefix("medicine-expired-") {
            let parts: Vec<&str> = rest.split('-').collect();
            if let [medicine_id, kit_id, offset] = parts.as_slice() {
                return Ok(NotificationKey::ExpiryAfter {
                    medicine_id: int(medicine_id)?,
                    kit_id: int(kit_id)?,
                    days: days(offset)?,
                });
            }
        }
        Err(err())
    }
}

/// A single point-in-time alert request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NotificationDescriptor {
    /// Canonical key string
    pub id: String,
    pub title: String,
    pub body: String,
    pub fire_at: DateTime<Utc>,
    /// Attribution data read back from pending notifications
    pub payload: BTreeMap<String, String>,
    pub channel_key: String,
    /// Must survive platform suppression of non-critical alerts
    pub critical: bool,
}

impl NotificationDescriptor {
    pub fn new(key: NotificationKey, title: String, body: String, fire_at: DateTime<Utc>) -> Self {
        Self {
            id: key.to_string(),
            title,
            body,
            fire_at,
            payload: BTreeMap::new(),
            channel_key: CHANNEL_REMINDERS.to_string(),
            critical: false,
        }
    }

    /// Parsed key, if the id follows the canonical scheme.
    pub fn key(&self) -> Option<NotificationKey> {
        self.id.parse().ok()
    }

    /// Payload value by name.
    pub fn payload_value(&self, name: &str) -> Option<&str> {
        self.payload.get(name).map(String::as_str)
    }

    /// Day (daily) or week (weekly) offset of a recurring intake instance.
    pub fn slot_index(&self) -> Option<u32> {
        self.payload_value("day")
            .or_else(|| self.payload_value("week"))?
            .parse()
            .ok()
    }

    /// Reminder id from the payload, falling back to the parsed key.
    pub fn reminder_id(&self) -> Option<i64> {
        self.payload_value("reminderId")
            .and_then(|v| v.parse().ok())
            .or_else(|| self.key().and_then(|k| k.reminder_id()))
    }
}
