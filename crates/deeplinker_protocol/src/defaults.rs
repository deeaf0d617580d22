//! Canonical default values shared across server and clients.

pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:3000";
pub const DEFAULT_PUBLIC_BASE_URL: &str = "http://127.0.0.1:3000";
pub const DEFAULT_CANONICAL_PREFIX: &str = "l";
pub const DEFAULT_SHORT_PREFIX: &str = "d";
pub const DEFAULT_SMART_REDIRECT_PATH: &str = "/smart-redirect";
pub const DEFAULT_APP_SCHEME: &str = "myapp";

pub const DIRECT_REDIRECT_CACHE_CONTROL: &str =
    "public, max-age=60, s-maxage=300, stale-while-revalidate=600";

pub const LINK_NOT_FOUND_MESSAGE: &str = "Link not found";
pub const NO_DESTINATION_MESSAGE: &str = "No valid destination URL found";
pub const INTERNAL_ERROR_MESSAGE: &str = "Internal server error";

/// Relay keys. The slug and access code are stored as two separate entries.
pub const RELAY_ACCESS_CODE_KEY: &str = "deeplinker_access_code";
pub const RELAY_SLUG_KEY: &str = "deeplinker_slug";

pub const DEFAULT_TIME_UNIT_MS: u64 = 1_000;
pub const DEFAULT_COUNTDOWN_START: u32 = 3;
pub const DEFAULT_APP_ATTEMPT_DELAY: u64 = 1;
pub const DEFAULT_STORE_FALLBACK_DELAY: u64 = 3;
pub const DEFAULT_RECOVERY_ATTEMPT_DELAY: u64 = 1;
pub const DEFAULT_RECOVERY_FALLBACK_DELAY: u64 = 2;

/// Manifest entries are read from at most this many configured slots.
pub const MAX_MANIFEST_ENTRIES: usize = 5;
pub const PLACEHOLDER_AASA_APP_ID: &str = "ABCDE12345.com.your.bundle";
pub const PLACEHOLDER_ASSET_LINK_PACKAGE: &str = "com.your.app";
pub const PLACEHOLDER_ASSET_LINK_FINGERPRINT: &str =
    "AA:BB:CC:DD:EE:FF:00:11:22:33:44:55:66:77:88:99:AA:BB:CC:DD:EE:FF:00:11:22:33:44:55:66:77:88:99";
pub const ASSET_LINK_RELATION: &str = "delegate_permission/common.handle_all_urls";
