//! Typed results returned across the service boundary.

use crate::model::AlertRule;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Outcome of a boundary operation. Failures are values, not panics or
/// propagated errors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationResult<T> {
    pub success: bool,
    /// Set when only part of the requested work could be applied.
    pub partial: bool,
    pub message: String,
    pub data: Option<T>,
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl<T> OperationResult<T> {
    pub fn success(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            partial: false,
            message: message.into(),
            data: Some(data),
            error: None,
            timestamp: Utc::now(),
        }
    }

    pub fn partial(message: impl Into<String>, data: T) -> Self {
        Self {
            partial: true,
            ..Self::success(message, data)
        }
    }

    pub fn failure(message: impl Into<String>, error: impl ToString) -> Self {
        Self {
            success: false,
            partial: false,
            message: message.into(),
            data: None,
            error: Some(error.to_string()),
            timestamp: Utc::now(),
        }
    }

    /// Failure that still hands data back to the caller, e.g. the lists a
    /// rejected batch must be corrected against.
    pub fn rejected(message: impl Into<String>, data: T) -> Self {
        Self {
            success: false,
            partial: false,
            message: message.into(),
            data: Some(data),
            error: None,
            timestamp: Utc::now(),
        }
    }

    pub fn is_partial(&self) -> bool {
        self.success && self.partial
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RemovalReport {
    pub requested: usize,
    pub deleted: u64,
    pub missing: Vec<String>,
}

impl RemovalReport {
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty() && self.deleted as usize == self.requested
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MoveReport {
    pub insert_count: usize,
    pub delete_count: u64,
    pub missing: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchReport {
    pub alerts: Vec<AlertRule>,
    pub duplicated_alert_names: Vec<String>,
    pub corrupted_symbols: Vec<String>,
    /// Candidates dropped at creation because no coin matched.
    pub unmatched_symbols: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateOutcome {
    pub matched_count: u64,
    pub modified_count: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnchorSave {
    Created,
    AlreadyExists,
}
