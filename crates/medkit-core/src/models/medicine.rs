//! Medicine, kit and family member models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A medicine stored in a kit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Medicine {
    /// Row id - assigned by storage
    pub id: i64,
    pub name: String,
    /// Owning kit
    pub kit_id: i64,
    /// Expiration timestamp (epoch millis)
    pub expiration_date: Option<i64>,
    pub quantity: f64,
    pub unit: String,
    /// Photo file name, relative to the photo directory
    pub photo_path: Option<String>,
    /// Creation timestamp (RFC 3339)
    pub created_at: String,
}

impl Medicine {
    /// Create a new medicine in a kit. The id is set when the row is stored.
    pub fn new(name: String, kit_id: i64) -> Self {
        Self {
            id: 0,
            name,
            kit_id,
            expiration_date: None,
            quantity: 0.0,
            unit: "pcs".to_string(),
            photo_path: None,
            created_at: Utc::now().to_rfc3339(),
        }
    }

    /// Expiration as a UTC instant.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expiration_date
            .and_then(DateTime::<Utc>::from_timestamp_millis)
    }

    /// Bare file name of the photo, if any.
    ///
    /// Older rows stored absolute paths; only the final component is kept so
    /// the photo resolves against the current photo directory.
    pub fn photo_file_name(&self) -> Option<String> {
        let raw = self.photo_path.as_deref()?.trim();
        if raw.is_empty() {
            return None;
        }
        std::path::Path::new(raw)
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
    }
}

/// A medicine kit (e.g. "Bathroom cabinet").
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Kit {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub created_at: String,
}

impl Kit {
    pub fn new(name: String) -> Self {
        Self {
            id: 0,
            name,
            description: None,
            created_at: Utc::now().to_rfc3339(),
        }
    }
}

/// A household member a reminder can belong to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FamilyMember {
    pub id: i64,
    pub name: String,
    pub created_at: String,
}

impl FamilyMember {
    pub fn new(name: String) -> Self {
        Self {
            id: 0,
            name,
            created_at: Utc::now().to_rfc3339(),
        }
    }
}
