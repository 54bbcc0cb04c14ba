//! Reminder database operations.

use rusqlite::{params, OptionalExtension, Row};

use super::{Database, DbError, DbResult};
use crate::models::{Frequency, IntakeLog, IntakeTime, Reminder};

const REMINDER_COLUMNS: &str = "id, family_member_id, title, frequency, times_per_day, times, \
                                active, created_at, dosage, description";

impl Database {
    /// Insert a reminder. A zero id lets SQLite assign one.
    ///
    /// Returns the stored row id.
    pub fn insert_reminder(&self, reminder: &Reminder) -> DbResult<i64> {
        let times_json = reminder.times_json()?;
        let id = (reminder.id != 0).then_some(reminder.id);

        self.conn.execute(
            r#"
            INSERT INTO reminders (
                id, family_member_id, title, frequency, times_per_day, times,
                active, created_at, dosage, description
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
            params![
                id,
                reminder.family_member_id,
                reminder.title,
                reminder.frequency.as_str(),
                reminder.times_per_day,
                times_json,
                reminder.active,
                reminder.created_at,
                reminder.dosage,
                reminder.description,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Update an existing reminder's schedule and details.
    pub fn update_reminder(&self, reminder: &Reminder) -> DbResult<bool> {
        let times_json = reminder.times_json()?;
        let rows_affected = self.conn.execute(
            r#"
            UPDATE reminders SET
                family_member_id = ?2,
                title = ?3,
                frequency = ?4,
                times_per_day = ?5,
                times = ?6,
                active = ?7,
                dosage = ?8,
                description = ?9
            WHERE id = ?1
            "#,
            params![
                reminder.id,
                reminder.family_member_id,
                reminder.title,
                reminder.frequency.as_str(),
                reminder.times_per_day,
                times_json,
                reminder.active,
                reminder.dosage,
                reminder.description,
            ],
        )?;
        Ok(rows_affected > 0)
    }

    /// Toggle the active flag.
    pub fn set_reminder_active(&self, reminder_id: i64, active: bool) -> DbResult<bool> {
        let rows_affected = self.conn.execute(
            "UPDATE reminders SET active = ?2 WHERE id = ?1",
            params![reminder_id, active],
        )?;
        Ok(rows_affected > 0)
    }

    /// Get a reminder by id.
    pub fn get_reminder(&self, reminder_id: i64) -> DbResult<Option<Reminder>> {
        let sql = format!("SELECT {} FROM reminders WHERE id = ?", REMINDER_COLUMNS);
        self.conn
            .query_row(&sql, [reminder_id], reminder_row)
            .optional()?
            .map(|row| row.try_into())
            .transpose()
    }

    /// List all reminders in creation order.
    pub fn list_reminders(&self) -> DbResult<Vec<Reminder>> {
        let sql = format!(
            "SELECT {} FROM reminders ORDER BY created_at, id",
            REMINDER_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], reminder_row)?;

        let mut reminders = Vec::new();
        for row in rows {
            reminders.push(row?.try_into()?);
        }
        Ok(reminders)
    }

    /// Delete a reminder and its medicine links.
    pub fn delete_reminder(&self, reminder_id: i64) -> DbResult<bool> {
        self.conn.execute(
            "DELETE FROM reminder_medicines WHERE reminder_id = ?",
            [reminder_id],
        )?;
        let rows_affected = self
            .conn
            .execute("DELETE FROM reminders WHERE id = ?", [reminder_id])?;
        Ok(rows_affected > 0)
    }

    /// Link a medicine to a reminder.
    pub fn link_reminder_medicine(&self, reminder_id: i64, medicine_id: i64) -> DbResult<()> {
        self.conn.execute(
            "INSERT OR IGNORE INTO reminder_medicines (reminder_id, medicine_id) VALUES (?1, ?2)",
            params![reminder_id, medicine_id],
        )?;
        Ok(())
    }

    /// Medicine ids linked to a reminder.
    pub fn medicine_ids_for_reminder(&self, reminder_id: i64) -> DbResult<Vec<i64>> {
        let mut stmt = self.conn.prepare(
            "SELECT medicine_id FROM reminder_medicines WHERE reminder_id = ? ORDER BY medicine_id",
        )?;
        let ids = stmt
            .query_map([reminder_id], |row| row.get(0))?
            .collect::<Result<Vec<i64>, _>>()?;
        Ok(ids)
    }

    /// Record a taken dose.
    pub fn insert_intake_log(&self, log: &IntakeLog) -> DbResult<i64> {
        let id = (log.id != 0).then_some(log.id);
        self.conn.execute(
            r#"
            INSERT INTO intake_logs (id, reminder_id, medicine_id, taken_at, day_index, intake_index)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                id,
                log.reminder_id,
                log.medicine_id,
                log.taken_at,
                log.day_index,
                log.intake_index,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Intake log entries for a reminder, newest first.
    pub fn list_intake_logs(&self, reminder_id: i64) -> DbResult<Vec<IntakeLog>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, reminder_id, medicine_id, taken_at, day_index, intake_index
            FROM intake_logs
            WHERE reminder_id = ?
            ORDER BY taken_at DESC
            "#,
        )?;
        let logs = stmt
            .query_map([reminder_id], |row| {
                Ok(IntakeLog {
                    id: row.get(0)?,
                    reminder_id: row.get(1)?,
                    medicine_id: row.get(2)?,
                    taken_at: row.get(3)?,
                    day_index: row.get(4)?,
                    intake_index: row.get(5)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(logs)
    }
}

fn reminder_row(row: &Row<'_>) -> rusqlite::Result<ReminderRow> {
    Ok(ReminderRow {
        id: row.get(0)?,
        family_member_id: row.get(1)?,
        title: row.get(2)?,
        frequency: row.get(3)?,
        times_per_day: row.get(4)?,
        times: row.get(5)?,
        active: row.get(6)?,
        created_at: row.get(7)?,
        dosage: row.get(8)?,
        description: row.get(9)?,
    })
}

/// Intermediate row struct for database mapping.
pub(crate) struct ReminderRow {
    pub id: i64,
    pub family_member_id: Option<i64>,
    pub title: String,
    pub frequency: String,
    pub times_per_day: u32,
    pub times: String,
    pub active: bool,
    pub created_at: String,
    pub dosage: Option<String>,
    pub description: Option<String>,
}

impl TryFrom<ReminderRow> for Reminder {
    type Error = DbError;

    fn try_from(row: ReminderRow) -> Result<Self, Self::Error> {
        let frequency: Frequency = row.frequency.parse().map_err(DbError::Constraint)?;
        let times: Vec<IntakeTime> = serde_json::from_str(&row.times)?;

        Ok(Reminder {
            id: row.id,
            family_member_id: row.family_member_id,
            title: row.title,
            frequency,
            times_per_day: row.times_per_day,
            times,
            active: row.active,
            created_at: row.created_at,
            dosage: row.dosage,
            description: row.description,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Kit, Medicine};

    fn daily_reminder(title: &str) -> Reminder {
        Reminder::new(
            title.into(),
            Frequency::Daily,
            vec![IntakeTime::new(8, 0), IntakeTime::new(20, 0)],
        )
    }

    #[test]
    fn test_insert_and_get_reminder() {
        let db = Database::open_in_memory().unwrap();
        let mut reminder = daily_reminder("Blood pressure");
        reminder.dosage = Some("1 tablet".into());

        let id = db.insert_reminder(&reminder).unwrap();
        let stored = db.get_reminder(id).unwrap().unwrap();

        assert_eq!(stored.title, "Blood pressure");
        assert_eq!(stored.frequency, Frequency::Daily);
        assert_eq!(stored.times, reminder.times);
        assert_eq!(stored.dosage.as_deref(), Some("1 tablet"));
        assert!(stored.active);
    }

    #[test]
    fn test_explicit_id_is_kept() {
        let db = Database::open_in_memory().unwrap();
        let mut reminder = daily_reminder("Vitamins");
        reminder.id = 77;

        assert_eq!(db.insert_reminder(&reminder).unwrap(), 77);
        assert!(db.get_reminder(77).unwrap().is_some());
    }

    #[test]
    fn test_toggle_and_update() {
        let db = Database::open_in_memory().unwrap();
        let id = db.insert_reminder(&daily_reminder("Iron")).unwrap();

        assert!(db.set_reminder_active(id, false).unwrap());
        let mut stored = db.get_reminder(id).unwrap().unwrap();
        assert!(!stored.active);

        stored.times = vec![IntakeTime::new(9, 15)];
        stored.times_per_day = 1;
        assert!(db.update_reminder(&stored).unwrap());
        let updated = db.get_reminder(id).unwrap().unwrap();
        assert_eq!(updated.times, vec![IntakeTime::new(9, 15)]);
    }

    #[test]
    fn test_links_removed_with_reminder() {
        let db = Database::open_in_memory().unwrap();
        let kit_id = db.insert_kit(&Kit::new("Home".into())).unwrap();
        let med_id = db
            .insert_medicine(&Medicine::new("Aspirin".into(), kit_id))
            .unwrap();
        let id = db.insert_reminder(&daily_reminder("Aspirin")).unwrap();

        db.link_reminder_medicine(id, med_id).unwrap();
        db.link_reminder_medicine(id, med_id).unwrap();
        assert_eq!(db.medicine_ids_for_reminder(id).unwrap(), vec![med_id]);

        assert!(db.delete_reminder(id).unwrap());
        assert!(db.medicine_ids_for_reminder(id).unwrap().is_empty());
        assert_eq!(db.count_rows("medicines").unwrap(), 1);
    }

    #[test]
    fn test_intake_logs() {
        let db = Database::open_in_memory().unwrap();
        let id = db.insert_reminder(&daily_reminder("Iron")).unwrap();

        for taken_at in [1_000, 2_000] {
            db.insert_intake_log(&IntakeLog {
                id: 0,
                reminder_id: id,
                medicine_id: None,
                taken_at,
                day_index: Some(0),
                intake_index: Some(1),
            })
            .unwrap();
        }

        let logs = db.list_intake_logs(id).unwrap();
        assert_eq!(logs.len(), 2);
        assert_eq!(logs[0].taken_at, 2_000);
    }
}
