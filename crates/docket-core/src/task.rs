use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::datetime::parse_stored_date;

pub const DEFAULT_COLOR: &str = "#3788d8";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Task {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,

    pub name: String,

    /// Deadline as stored, `YYYY-MM-DD`. Kept verbatim so records with an
    /// unreadable date survive a load/save cycle untouched.
    pub date: String,

    #[serde(default = "default_color")]
    pub color: String,

    #[serde(default)]
    pub completed: bool,
}

/// The persisted shape without identity, as exchanged by `export`/`import`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LegacyRecord {
    pub name: String,
    pub date: String,
    #[serde(default = "default_color")]
    pub color: String,
    #[serde(default)]
    pub completed: bool,
}

fn default_color() -> String {
    DEFAULT_COLOR.to_string()
}

impl Task {
    pub fn new(name: String, due: NaiveDate, color: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            date: crate::datetime::format_iso(due),
            color,
            completed: false,
        }
    }

    pub fn due_date(&self) -> Option<NaiveDate> {
        parse_stored_date(&self.date)
    }

    pub fn to_legacy(&self) -> LegacyRecord {
        LegacyRecord {
            name: self.name.clone(),
            date: self.date.clone(),
            color: self.color.clone(),
            completed: self.completed,
        }
    }
}

impl From<LegacyRecord> for Task {
    fn from(record: LegacyRecord) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: record.name,
            date: record.date,
            color: record.color,
            completed: record.completed,
        }
    }
}
