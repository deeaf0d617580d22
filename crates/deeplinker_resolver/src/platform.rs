//! Platform detection from the User-Agent header.
//!
//! Detection is a substring heuristic with a fixed precedence: the iOS
//! device tokens are checked before `android`, so a UA carrying both
//! classifies as iOS.

use deeplinker_protocol::Platform;

const IOS_TOKENS: [&str; 3] = ["iphone", "ipad", "ipod"];
const ANDROID_TOKEN: &str = "android";

/// Classify a User-Agent string. Never fails; unrecognised input is `Other`.
pub fn detect_platform(user_agent: &str) -> Platform {
    let ua = user_agent.to_lowercase();

    if IOS_TOKENS.iter().any(|token| ua.contains(token)) {
        return Platform::Ios;
    }

    if ua.contains(ANDROID_TOKEN) {
        return Platform::Android;
    }

    Platform::Other
}

/// Accept an explicit `?platform=` override.
///
/// Only `ios`, `android` and `web` (exact, lowercase) are valid. `other` is
/// rejected so an override can express intent but never disable detection.
pub fn validate_platform_override(raw: Option<&str>) -> Option<Platform> {
    match raw?.parse::<Platform>() {
        Ok(Platform::Other) | Err(_) => None,
        Ok(platform) => Some(platform),
    }
}

/// A validated override wins; anything else falls through to detection.
pub fn resolve_platform(override_raw: Option<&str>, user_agent: &str) -> Platform {
    validate_platform_override(override_raw).unwrap_or_else(|| detect_platform(user_agent))
}
