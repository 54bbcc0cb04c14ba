//! Reminder models.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// How often a reminder repeats.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Once,
    Daily,
    Weekly,
}

impl Frequency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Frequency::Once => "once",
            Frequency::Daily => "daily",
            Frequency::Weekly => "weekly",
        }
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Frequency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "once" => Ok(Frequency::Once),
            "daily" => Ok(Frequency::Daily),
            "weekly" => Ok(Frequency::Weekly),
            other => Err(format!("Unknown frequency: {}", other)),
        }
    }
}

/// A wall-clock time of day at which a dose is due.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct IntakeTime {
    pub hour: u32,
    pub minute: u32,
}

impl IntakeTime {
    pub fn new(hour: u32, minute: u32) -> Self {
        Self { hour, minute }
    }
}

impl fmt::Display for IntakeTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

/// A user-defined intake schedule for one or more medicines.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Reminder {
    /// Row id - assigned by storage
    pub id: i64,
    /// Owning family member (None = the default profile)
    pub family_member_id: Option<i64>,
    pub title: String,
    pub frequency: Frequency,
    /// Intakes per day (daily) or per week (weekly)
    pub times_per_day: u32,
    /// Configured times of day, indexed by intake
    pub times: Vec<IntakeTime>,
    pub active: bool,
    /// Creation timestamp (RFC 3339)
    pub created_at: String,
    pub dosage: Option<String>,
    pub description: Option<String>,
}

impl Reminder {
    /// Create a new active reminder. The id is set when the row is stored.
    pub fn new(title: String, frequency: Frequency, times: Vec<IntakeTime>) -> Self {
        let times_per_day = match frequency {
            Frequency::Once => 1,
            _ => times.len().max(1) as u32,
        };
        Self {
            id: 0,
            family_member_id: None,
            title,
            frequency,
            times_per_day,
            times,
            active: true,
            created_at: chrono::Utc::now().to_rfc3339(),
            dosage: None,
            description: None,
        }
    }

    /// Key used to collapse duplicates that survive repeated restores.
    pub fn dedup_key(&self) -> (String, String) {
        let member = self
            .family_member_id
            .map(|id| id.to_string())
            .unwrap_or_else(|| "default".to_string());
        (self.title.clone(), member)
    }

    /// Serialize the intake times as stored in the `times` column.
    pub fn times_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.times)
    }
}

/// Many-to-many link between a reminder and a medicine.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReminderMedicine {
    pub reminder_id: i64,
    pub medicine_id: i64,
}

/// A logged dose.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IntakeLog {
    pub id: i64,
    pub reminder_id: i64,
    pub medicine_id: Option<i64>,
    /// When the dose was taken (epoch millis)
    pub taken_at: i64,
    /// Day (daily) or week (weekly) offset of the slot this dose satisfies
    pub day_index: Option<u32>,
    pub intake_index: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frequency_round_trip_str() {
        for freq in [Frequency::Once, Frequency::Daily, Frequency::Weekly] {
            assert_eq!(freq.as_str().parse::<Frequency>().unwrap(), freq);
        }
        assert!("hourly".parse::<Frequency>().is_err());
    }

    #[test]
    fn test_new_reminder_counts_times() {
        let reminder = Reminder::new(
            "Morning pills".into(),
            Frequency::Daily,
            vec![IntakeTime::new(8, 0), IntakeTime::new(20, 0)],
        );
        assert_eq!(reminder.times_per_day, 2);
        assert!(reminder.active);

        let once = Reminder::new("Once".into(), Frequency::Once, vec![IntakeTime::new(8, 0)]);
        assert_eq!(once.times_per_day, 1);
    }

    #[test]
    fn test_dedup_key_uses_default_member() {
        let mut reminder = Reminder::new("Vitamin D".into(), Frequency::Daily, vec![]);
        assert_eq!(reminder.dedup_key(), ("Vitamin D".into(), "default".into()));

        reminder.family_member_id = Some(4);
        assert_eq!(reminder.dedup_key(), ("Vitamin D".into(), "4".into()));
    }

    #[test]
    fn test_times_json_shape() {
        let reminder = Reminder::new("x".into(), Frequency::Daily, vec![IntakeTime::new(7, 30)]);
        assert_eq!(reminder.times_json().unwrap(), r#"[{"hour":7,"minute":30}]"#);
    }
}
