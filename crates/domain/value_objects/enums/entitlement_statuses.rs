use std::fmt::Display;

use serde::{Deserialize, Serialize};

#[derive(Default, Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EntitlementStatus {
    #[default]
    Active,
    PastDue,
    Canceled,
}

impl EntitlementStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntitlementStatus::Active => "active",
            EntitlementStatus::PastDue => "past_due",
            EntitlementStatus::Canceled => "canceled",
        }
    }

    /// Unknown values read back from storage are treated as canceled so they never grant access.
    pub fn from_str(value: &str) -> Self {
        match value {
            "active" => EntitlementStatus::Active,
            "past_due" => EntitlementStatus::PastDue,
            _ => EntitlementStatus::Canceled,
        }
    }
}

impl Display for EntitlementStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
