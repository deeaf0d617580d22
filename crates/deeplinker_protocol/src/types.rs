//! Core domain types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

// ============================================================================
// Platform
// ============================================================================

/// Client platform a link resolves for.
///
/// Detection only ever yields `Ios`, `Android` or `Other`; `Web` can only come
/// from an explicit override.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Ios,
    Android,
    Web,
    Other,
}

impl Platform {
    pub const ALL: [Platform; 4] = [
        Platform::Ios,
        Platform::Android,
        Platform::Web,
        Platform::Other,
    ];

    /// Get the canonical string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Ios => "ios",
            Platform::Android => "android",
            Platform::Web => "web",
            Platform::Other => "other",
        }
    }

    /// True for platforms that can install an app from a store.
    pub fn is_mobile(&self) -> bool {
        matches!(self, Platform::Ios | Platform::Android)
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown platform: {0}")]
pub struct PlatformParseError(pub String);

impl std::str::FromStr for Platform {
    type Err = PlatformParseError;

    /// Exact, case-sensitive match on the canonical names.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ios" => Ok(Platform::Ios),
            "android" => Ok(Platform::Android),
            "web" => Ok(Platform::Web),
            "other" => Ok(Platform::Other),
            _ => Err(PlatformParseError(s.to_string())),
        }
    }
}

// ============================================================================
// Link Record
// ============================================================================

/// A stored link. Read-only from the resolver's point of view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkRecord {
    /// Unique, case-sensitive identifier.
    pub slug: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ios_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub android_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub web_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_url: Option<String>,
    /// Inactive records resolve as not found.
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl LinkRecord {
    /// Create an active record with no destinations.
    pub fn new(slug: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            slug: slug.into(),
            ios_url: None,
            android_url: None,
            web_url: None,
            fallback_url: None,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_ios_url(mut self, url: impl Into<String>) -> Self {
        self.ios_url = Some(url.into());
        self
    }

    pub fn with_android_url(mut self, url: impl Into<String>) -> Self {
        self.android_url = Some(url.into());
        self
    }

    pub fn with_web_url(mut self, url: impl Into<String>) -> Self {
        self.web_url = Some(url.into());
        self
    }

    pub fn with_fallback_url(mut self, url: impl Into<String>) -> Self {
        self.fallback_url = Some(url.into());
        self
    }

    pub fn inactive(mut self) -> Self {
        self.is_active = false;
        self
    }

    /// True when at least one destination URL is populated.
    pub fn has_destination(&self) -> bool {
        self.ios_url.is_some()
            || self.android_url.is_some()
            || self.web_url.is_some()
            || self.fallback_url.is_some()
    }
}

// ============================================================================
// Resolution
// ============================================================================

/// Outcome of resolving a record for one platform. Never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolutionResult {
    pub destination_url: Option<String>,
    /// Only set for ios/android when the platform's app URL matched and a
    /// store URL is configured.
    pub store_url: Option<String>,
}

impl ResolutionResult {
    pub fn is_empty(&self) -> bool {
        self.destination_url.is_none() && self.store_url.is_none()
    }
}

// ============================================================================
// Recovery Payload
// ============================================================================

/// The single unit carried across the install gap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecoveryPayload {
    pub slug: String,
    pub access_code: String,
}

impl RecoveryPayload {
    pub fn new(slug: impl Into<String>, access_code: impl Into<String>) -> Self {
        Self {
            slug: slug.into(),
            access_code: access_code.into(),
        }
    }
}
