//! SQLite schema definition.

/// Complete database schema for medkit.
pub const SCHEMA: &str = r#"
-- Enable foreign keys
PRAGMA foreign_keys = ON;

-- ============================================================================
-- Family Members
-- ============================================================================

CREATE TABLE IF NOT EXISTS family_members (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now'))
);

-- ============================================================================
-- Kits and Medicines
-- ============================================================================

CREATE TABLE IF NOT EXISTS kits (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    description TEXT,
    created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now'))
);

CREATE TABLE IF NOT EXISTS medicines (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    kit_id INTEGER NOT NULL REFERENCES kits(id) ON DELETE CASCADE,
    expiration_date INTEGER,                     -- epoch millis
    quantity REAL NOT NULL DEFAULT 0,
    unit TEXT NOT NULL DEFAULT 'pcs',
    photo_path TEXT,                             -- file name inside the photo dir
    created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now'))
);

CREATE INDEX IF NOT EXISTS idx_medicines_kit ON medicines(kit_id);
CREATE INDEX IF NOT EXISTS idx_medicines_expiration ON medicines(expiration_date);

-- ============================================================================
-- Reminders
-- ============================================================================

CREATE TABLE IF NOT EXISTS reminders (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    family_member_id INTEGER REFERENCES family_members(id) ON DELETE SET NULL,
    title TEXT NOT NULL,
    frequency TEXT NOT NULL CHECK (frequency IN ('once', 'daily', 'weekly')),
    times_per_day INTEGER NOT NULL DEFAULT 1,
    times TEXT NOT NULL DEFAULT '[]',            -- JSON array of {hour, minute}
    active INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now')),
    dosage TEXT,
    description TEXT
);

CREATE INDEX IF NOT EXISTS idx_reminders_active ON reminders(active);

CREATE TABLE IF NOT EXISTS reminder_medicines (
    reminder_id INTEGER NOT NULL REFERENCES reminders(id) ON DELETE CASCADE,
    medicine_id INTEGER NOT NULL REFERENCES medicines(id) ON DELETE CASCADE,
    PRIMARY KEY (reminder_id, medicine_id)
);

CREATE INDEX IF NOT EXISTS idx_reminder_medicines_medicine ON reminder_medicines(medicine_id);

-- ============================================================================
-- Intake Log
-- ============================================================================

CREATE TABLE IF NOT EXISTS intake_logs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    reminder_id INTEGER NOT NULL REFERENCES reminders(id) ON DELETE CASCADE,
    medicine_id INTEGER REFERENCES medicines(id) ON DELETE SET NULL,
    taken_at INTEGER NOT NULL,                   -- epoch millis
    day_index INTEGER,
    intake_index INTEGER
);

CREATE INDEX IF NOT EXISTS idx_intake_logs_reminder ON intake_logs(reminder_id);
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn test_schema_valid() {
        let conn = Connection::open_in_memory().unwrap();
        let result = conn.execute_batch(SCHEMA);
        assert!(result.is_ok(), "Schema should be valid SQL: {:?}", result);
    }

    #[test]
    fn test_frequency_constraint() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(SCHEMA).unwrap();

        let result = conn.execute(
            "INSERT INTO reminders (title, frequency) VALUES ('x', 'hourly')",
            [],
        );
        assert!(result.is_err());

        let result = conn.execute(
            "INSERT INTO reminders (title, frequency) VALUES ('x', 'daily')",
            [],
        );
        assert!(result.is_ok());
    }

    #[test]
    fn test_foreign_keys_enforced() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(SCHEMA).unwrap();

        // Medicine pointing at a missing kit should fail
        let result = conn.execute(
            "INSERT INTO medicines (name, kit_id) VALUES ('Aspirin', 42)",
            [],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_link_rows_cascade() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(SCHEMA).unwrap();

        conn.execute("INSERT INTO kits (id, name) VALUES (1, 'Home')", [])
            .unwrap();
        conn.execute(
            "INSERT INTO medicines (id, name, kit_id) VALUES (1, 'Aspirin', 1)",
            [],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO reminders (id, title, frequency) VALUES (1, 'Pills', 'daily')",
            [],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO reminder_medicines (reminder_id, medicine_id) VALUES (1, 1)",
            [],
        )
        .unwrap();

        conn.execute("DELETE FROM reminders WHERE id = 1", []).unwrap();

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM reminder_medicines", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }
}
