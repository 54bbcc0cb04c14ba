//! Medicine, kit and family member database operations.

use rusqlite::{params, OptionalExtension, Row};

use super::{Database, DbResult};
use crate::models::{FamilyMember, Kit, Medicine};

const MEDICINE_COLUMNS: &str =
    "id, name, kit_id, expiration_date, quantity, unit, photo_path, created_at";

impl Database {
    /// Insert a kit, returning its row id.
    pub fn insert_kit(&self, kit: &Kit) -> DbResult<i64> {
        let id = (kit.id != 0).then_some(kit.id);
        self.conn.execute(
            "INSERT INTO kits (id, name, description, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![id, kit.name, kit.description, kit.created_at],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// List all kits.
    pub fn list_kits(&self) -> DbResult<Vec<Kit>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, description, created_at FROM kits ORDER BY id")?;
        let kits = stmt
            .query_map([], |row| {
                Ok(Kit {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    description: row.get(2)?,
                    created_at: row.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(kits)
    }

    /// Insert a family member, returning its row id.
    pub fn insert_family_member(&self, member: &FamilyMember) -> DbResult<i64> {
        let id = (member.id != 0).then_some(member.id);
        self.conn.execute(
            "INSERT INTO family_members (id, name, created_at) VALUES (?1, ?2, ?3)",
            params![id, member.name, member.created_at],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// List all family members.
    pub fn list_family_members(&self) -> DbResult<Vec<FamilyMember>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, created_at FROM family_members ORDER BY id")?;
        let members = stmt
            .query_map([], |row| {
                Ok(FamilyMember {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    created_at: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(members)
    }

    /// Insert a medicine, returning its row id.
    pub fn insert_medicine(&self, medicine: &Medicine) -> DbResult<i64> {
        let id = (medicine.id != 0).then_some(medicine.id);
        self.conn.execute(
            r#"
            INSERT INTO medicines (
                id, name, kit_id, expiration_date, quantity, unit, photo_path, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
            params![
                id,
                medicine.name,
                medicine.kit_id,
                medicine.expiration_date,
                medicine.quantity,
                medicine.unit,
                medicine.photo_path,
                medicine.created_at,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Update a medicine.
    pub fn update_medicine(&self, medicine: &Medicine) -> DbResult<bool> {
        let rows_affected = self.conn.execute(
            r#"
            UPDATE medicines SET
                name = ?2,
                kit_id = ?3,
                expiration_date = ?4,
                quantity = ?5,
                unit = ?6,
                photo_path = ?7
            WHERE id = ?1
            "#,
            params![
                medicine.id,
                medicine.name,
                medicine.kit_id,
                medicine.expiration_date,
                medicine.quantity,
                medicine.unit,
                medicine.photo_path,
            ],
        )?;
        Ok(rows_affected > 0)
    }

    /// Get a medicine by id.
    pub fn get_medicine(&self, medicine_id: i64) -> DbResult<Option<Medicine>> {
        let sql = format!("SELECT {} FROM medicines WHERE id = ?", MEDICINE_COLUMNS);
        Ok(self
            .conn
            .query_row(&sql, [medicine_id], medicine_from_row)
            .optional()?)
    }

    /// List all medicines.
    pub fn list_medicines(&self) -> DbResult<Vec<Medicine>> {
        let sql = format!("SELECT {} FROM medicines ORDER BY id", MEDICINE_COLUMNS);
        let mut stmt = self.conn.prepare(&sql)?;
        let medicines = stmt
            .query_map([], medicine_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(medicines)
    }

    /// Medicines linked to a reminder.
    pub fn medicines_for_reminder(&self, reminder_id: i64) -> DbResult<Vec<Medicine>> {
        let sql = format!(
            r#"
            SELECT {} FROM medicines
            WHERE id IN (SELECT medicine_id FROM reminder_medicines WHERE reminder_id = ?)
            ORDER BY id
            "#,
            MEDICINE_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let medicines = stmt
            .query_map([reminder_id], medicine_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(medicines)
    }

    /// Delete a medicine.
    pub fn delete_medicine(&self, medicine_id: i64) -> DbResult<bool> {
        let rows_affected = self
            .conn
            .execute("DELETE FROM medicines WHERE id = ?", [medicine_id])?;
        Ok(rows_affected > 0)
    }
}

fn medicine_from_row(row: &Row<'_>) -> rusqlite::Result<Medicine> {
    Ok(Medicine {
        id: row.get(0)?,
        name: row.get(1)?,
        kit_id: row.get(2)?,
        expiration_date: row.get(3)?,
        quantity: row.get(4)?,
        unit: row.get(5)?,
        photo_path: row.get(6)?,
        created_at: row.get(7)?,
    })
}
