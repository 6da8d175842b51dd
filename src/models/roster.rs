//! Reference data supplied by the roster provider.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: String,
    pub display_name: String,
    pub batch: Option<u32>,
}

impl Student {
    pub fn new(id: impl Into<String>, display_name: impl Into<String>, batch: Option<u32>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            batch,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Subject {
    pub code: String,
    pub display_name: String,
    /// Lab subjects are taught per batch; a batch may only be chosen for them.
    pub is_lab: bool,
}

impl Subject {
    pub fn theory(code: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            display_name: display_name.into(),
            is_lab: false,
        }
    }

    pub fn lab(code: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            display_name: display_name.into(),
            is_lab: true,
        }
    }
}

/// The acting instructor, as resolved by the external auth collaborator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Instructor {
    pub id: String,
    pub display_name: String,
}

impl Instructor {
    pub fn new(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
        }
    }
}
