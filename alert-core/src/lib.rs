pub mod config;
pub mod feed;
pub mod ingest;
pub mod matching;
pub mod model;
pub mod outcome;
pub mod report;
pub mod time;

use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AlertError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Feed error: {0}")]
    Feed(String),

    #[error("Notification error: {0}")]
    Notification(String),

    #[error("Collection \"{collection}\": {source}")]
    Collection {
        collection: String,
        source: Box<AlertError>,
    },

    #[error("Other error: {0}")]
    Other(String),
}

impl AlertError {
    /// Attaches the name of the store collection the failing call targeted.
    pub fn in_collection(self, collection: impl Into<String>) -> Self {
        Self::Collection {
            collection: collection.into(),
            source: Box::new(self),
        }
    }
}

pub type Result<T> = std::result::Result<T, AlertError>;

/// Logical lifecycle partition shared by price and VWAP alert rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Collection {
    Working,
    Triggered,
    Archived,
}

impl Collection {
    pub const ALL: [Collection; 3] = [
        Collection::Working,
        Collection::Triggered,
        Collection::Archived,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Working => "working",
            Collection::Triggered => "triggered",
            Collection::Archived => "archived",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Collection {
    type Err = AlertError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "working" => Ok(Collection::Working),
            "triggered" => Ok(Collection::Triggered),
            "archived" => Ok(Collection::Archived),
            "" => Err(AlertError::Validation(
                "Missing collection name".to_string(),
            )),
            other => Err(AlertError::Validation(format!(
                "Invalid collection name: {}",
                other
            ))),
        }
    }
}

/// Candle interval served by the snapshot feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Timeframe {
    M15,
    H1,
    H4,
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Timeframe::M15 => "m15",
            Timeframe::H1 => "h1",
            Timeframe::H4 => "h4",
        };
        f.write_str(name)
    }
}
