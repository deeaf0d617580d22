//! Deeplinker shared protocol
//!
//! Types shared by the resolution server, the link store and the client-side
//! hand-off state machines.
//!
//! # Request flow
//!
//! ```text
//! GET /d/<slug>  --rewrite-->  GET /l/<slug>  --resolve-->  302 destination
//!                                              \--------->  302 /smart-redirect?...
//! ```
//!
//! The smart-redirect path carries the hand-off state as query parameters
//! (see [`http_types::SmartRedirectQuery`]).

pub mod config;
pub mod defaults;
pub mod http_types;
pub mod paths;
pub mod types;

pub use config::{
    AppConfig, AssetLinkTarget, ConfigError, DeeplinkerConfig, HandoffConfig, RouteConfig,
    ServerConfig, StorageConfig, StoreUrls,
};
pub use http_types::{
    AppSiteAssociation, AppSiteDetail, AppLinks, AssetLink, AssetLinkStatement, ErrorResponse,
    HealthResponse, SmartRedirectQuery,
};
pub use types::{LinkRecord, Platform, PlatformParseError, RecoveryPayload, ResolutionResult};
