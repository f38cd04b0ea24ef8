use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// Quota-limited resources a user can create.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Attendance,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Attendance => "attendance",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "attendance" | "attendance_records" => Some(ResourceKind::Attendance),
            _ => None,
        }
    }
}

impl Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
