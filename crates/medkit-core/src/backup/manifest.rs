//! Archive manifest and the versioned table schema.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{BackupError, BackupResult};
use crate::db::Row;

/// Manifest file name at the archive root.
pub const MANIFEST_FILE: &str = "data.json";
/// Photo directory inside the archive.
pub const PHOTOS_DIR: &str = "photos";
/// Version written by this build.
pub const CURRENT_FORMAT_VERSION: u32 = 2;

/// The `data.json` document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveManifest {
    #[serde(alias = "formatVersion")]
    pub version: u32,
    #[serde(alias = "exported_at")]
    pub exported_at: String,
    /// Table key (per version) to rows
    pub tables: BTreeMap<String, Vec<Row>>,
    /// Archive-relative paths of bundled photos
    #[serde(default, alias = "asset_paths")]
    pub asset_paths: Vec<String>,
}

impl ArchiveManifest {
    /// Rows of a table, empty when the archive has none.
    pub fn rows(&self, mapping: &SchemaMapping, table: &TableSchema) -> &[Row] {
        self.tables
            .get(mapping.table_key(table))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

/// A stored column and its field name in current archives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Column {
    /// Store column name, also the field name in version 1 archives
    pub name: &'static str,
    /// Field name in version 2 archives
    pub camel: &'static str,
}

const fn col(name: &'static str, camel: &'static str) -> Column {
    Column { name, camel }
}

/// A table and its archive names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableSchema {
    pub name: &'static str,
    pub camel: &'static str,
    pub columns: &'static [Column],
}

/// Every backed-up table, parents before children.
pub const TABLES: &[TableSchema] = &[
    TableSchema {
        name: "family_members",
        camel: "familyMembers",
        columns: &[col("id", "id"), col("name", "name"), col("created_at", "createdAt")],
    },
    TableSchema {
        name: "kits",
        camel: "kits",
        columns: &[
            col("id", "id"),
            col("name", "name"),
            col("description", "description"),
            col("created_at", "createdAt"),
        ],
    },
    TableSchema {
        name: "medicines",
        camel: "medicines",
        columns: &[
            col("id", "id"),
            col("name", "name"),
            col("kit_id", "kitId"),
            col("expiration_date", "expirationDate"),
            col("quantity", "quantity"),
            col("unit", "unit"),
            col("photo_path", "photoPath"),
            col("created_at", "createdAt"),
        ],
    },
    TableSchema {
        name: "reminders",
        camel: "reminders",
        columns: &[
            col("id", "id"),
            col("family_member_id", "familyMemberId"),
            col("title", "title"),
            col("frequency", "frequency"),
            col("times_per_day", "timesPerDay"),
            col("times", "times"),
            col("active", "active"),
            col("created_at", "createdAt"),
            col("dosage", "dosage"),
            col("description", "description"),
        ],
    },
    TableSchema {
        name: "reminder_medicines",
        camel: "reminderMedicines",
        columns: &[col("reminder_id", "reminderId"), col("medicine_id", "medicineId")],
    },
    TableSchema {
        name: "intake_logs",
        camel: "intakeLogs",
        columns: &[
            col("id", "id"),
            col("reminder_id", "reminderId"),
            col("medicine_id", "medicineId"),
            col("taken_at", "takenAt"),
            col("day_index", "dayIndex"),
            col("intake_index", "intakeIndex"),
        ],
    },
];

/// Look up a table by store name.
pub fn table_schema(name: &str) -> Option<&'static TableSchema> {
    TABLES.iter().find(|t| t.name == name)
}

/// Field naming used by one archive version.
///
/// Chosen once per manifest; every row of the archive is mapped through it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchemaMapping {
    version: u32,
}

impl SchemaMapping {
    pub fn for_version(version: u32) -> BackupResult<Self> {
        match version {
            1 | 2 => Ok(Self { version }),
            other => Err(BackupError::UnsupportedVersion(other)),
        }
    }

    /// Mapping for archives written by this build.
    pub fn current() -> Self {
        Self {
            version: CURRENT_FORMAT_VERSION,
        }
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn table_key(&self, table: &TableSchema) -> &'static str {
        if self.version >= 2 {
            table.camel
        } else {
            table.name
        }
    }

    pub fn field_key(&self, column: &Column) -> &'static str {
        if self.version >= 2 {
            column.camel
        } else {
            column.name
        }
    }

    /// Store row to archive row.
    pub fn encode_row(&self, table: &TableSchema, row: &Row) -> Row {
        table
            .columns
            .iter()
            .filter_map(|column| {
                row.get(column.name)
                    .map(|value| (self.field_key(column).to_string(), value.clone()))
            })
            .collect()
    }

    /// Archive row to (store column, value) pairs. Unknown fields are dropped;
    /// absent ones fall back to the column default on insert.
    pub fn decode_row(&self, table: &TableSchema, row: &Row) -> Vec<(&'static str, Value)> {
        table
            .columns
            .iter()
            .filter_map(|column| {
                row.get(self.field_key(column))
                    .map(|value| (column.name, value.clone()))
            })
            .collect()
    }
}
