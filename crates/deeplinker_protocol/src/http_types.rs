//! HTTP wire types for the resolution server.
//!
//! All types use serde for JSON serialization. Field names follow the
//! documents Apple and Google expect, not Rust conventions.

use serde::{Deserialize, Serialize};

use crate::defaults::{
    ASSET_LINK_RELATION, PLACEHOLDER_AASA_APP_ID, PLACEHOLDER_ASSET_LINK_FINGERPRINT,
    PLACEHOLDER_ASSET_LINK_PACKAGE,
};

// ============================================================================
// Error / Health
// ============================================================================

/// Error body returned with 404 and 500 responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}

impl HealthResponse {
    pub fn ok() -> Self {
        Self {
            status: "ok".to_string(),
        }
    }
}

// ============================================================================
// Smart Redirect hand-off
// ============================================================================

/// Query parameters carried by the smart-redirect path.
///
/// Every field is optional on the wire; the client state machine decides
/// whether the combination is a valid entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SmartRedirectQuery {
    #[serde(default)]
    pub platform: Option<String>,
    #[serde(default, rename = "appUrl")]
    pub app_url: Option<String>,
    #[serde(default, rename = "storeUrl")]
    pub store_url: Option<String>,
    #[serde(default)]
    pub access_code: Option<String>,
    #[serde(default)]
    pub slug: Option<String>,
}

impl SmartRedirectQuery {
    pub const PLATFORM: &'static str = "platform";
    pub const APP_URL: &'static str = "appUrl";
    pub const STORE_URL: &'static str = "storeUrl";
    pub const ACCESS_CODE: &'static str = "access_code";
    pub const SLUG: &'static str = "slug";

    /// Present parameters in wire order: platform, appUrl, storeUrl,
    /// access_code, slug.
    pub fn pairs(&self) -> Vec<(&'static str, &str)> {
        [
            (Self::PLATFORM, self.platform.as_deref()),
            (Self::APP_URL, self.app_url.as_deref()),
            (Self::STORE_URL, self.store_url.as_deref()),
            (Self::ACCESS_CODE, self.access_code.as_deref()),
            (Self::SLUG, self.slug.as_deref()),
        ]
        .into_iter()
        .filter_map(|(key, value)| value.map(|v| (key, v)))
        .collect()
    }

    /// Build from decoded query pairs. The first occurrence of a key wins.
    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let mut query = Self::default();
        for (key, value) in pairs {
            let slot = match key {
                Self::PLATFORM => &mut query.platform,
                Self::APP_URL => &mut query.app_url,
                Self::STORE_URL => &mut query.store_url,
                Self::ACCESS_CODE => &mut query.access_code,
                Self::SLUG => &mut query.slug,
                _ => continue,
            };
            if slot.is_none() {
                *slot = Some(value.to_string());
            }
        }
        query
    }
}

// ============================================================================
// Well-known manifests
// ============================================================================

/// `/.well-known/apple-app-site-association` document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppSiteAssociation {
    pub applinks: AppLinks,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppLinks {
    pub apps: Vec<String>,
    pub details: Vec<AppSiteDetail>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppSiteDetail {
    #[serde(rename = "appID")]
    pub app_id: String,
    pub paths: Vec<String>,
}

impl AppSiteAssociation {
    /// Every app id gets the same path patterns. With no ids configured a
    /// placeholder entry is emitted so the document shape stays valid.
    pub fn new(app_ids: &[String], paths: &[String]) -> Self {
        let mut ids: Vec<String> = app_ids.to_vec();
        if ids.is_empty() {
            ids.push(PLACEHOLDER_AASA_APP_ID.to_string());
        }
        Self {
            applinks: AppLinks {
                apps: Vec::new(),
                details: ids
                    .into_iter()
                    .map(|app_id| AppSiteDetail {
                        app_id,
                        paths: paths.to_vec(),
                    })
                    .collect(),
            },
        }
    }
}

/// One statement of `/.well-known/assetlinks.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetLinkStatement {
    pub relation: Vec<String>,
    pub target: AssetLink,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetLink {
    pub namespace: String,
    pub package_name: String,
    pub sha256_cert_fingerprints: Vec<String>,
}

impl AssetLinkStatement {
    pub fn android_app(package_name: impl Into<String>, fingerprint: impl Into<String>) -> Self {
        Self {
            relation: vec![ASSET_LINK_RELATION.to_string()],
            target: AssetLink {
                namespace: "android_app".to_string(),
                package_name: package_name.into(),
                sha256_cert_fingerprints: vec![fingerprint.into()],
            },
        }
    }

    pub fn placeholder() -> Self {
        Self::android_app(
            PLACEHOLDER_ASSET_LINK_PACKAGE,
            PLACEHOLDER_ASSET_LINK_FINGERPRINT,
        )
    }
}
