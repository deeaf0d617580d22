//! Destination selection for a link record.
//!
//! # Priority
//!
//! First match wins:
//!
//! 1. ios platform with an `ios_url` (store URL attached when configured)
//! 2. android platform with an `android_url` (store URL attached when configured)
//! 3. `web_url`
//! 4. `fallback_url`
//! 5. nothing
//!
//! A mobile result that carries a store URL is handed to the client-side
//! smart redirect instead of being redirected to directly.

use deeplinker_protocol::{LinkRecord, Platform, ResolutionResult, SmartRedirectQuery, StoreUrls};
use deeplinker_protocol::defaults::{LINK_NOT_FOUND_MESSAGE, NO_DESTINATION_MESSAGE};
use thiserror::Error;
use url::form_urlencoded;

use crate::query::merge_query_params;

/// Resolution failures surfaced to the caller as values.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ResolveError {
    /// No record for the slug, or the record is inactive.
    #[error("{}", LINK_NOT_FOUND_MESSAGE)]
    NotFound,
    /// The record has no URL usable for the platform.
    #[error("{}", NO_DESTINATION_MESSAGE)]
    NoDestination,
}

/// Where the server sends the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RedirectDecision {
    /// Plain 302 to the destination, with the request query merged in.
    Direct { destination: String },
    /// 302 to the smart-redirect flow, which tries the app first.
    Smart {
        platform: Platform,
        app_url: String,
        store_url: String,
    },
}

impl RedirectDecision {
    pub fn is_smart(&self) -> bool {
        matches!(self, RedirectDecision::Smart { .. })
    }

    /// Build the `Location` for this decision.
    ///
    /// `request_url` must be the absolute URL of the inbound request; its
    /// query feeds the merge on the direct path.
    pub fn location(
        &self,
        request_url: &str,
        smart_redirect_path: &str,
        slug: &str,
        access_code: Option<&str>,
    ) -> String {
        match self {
            RedirectDecision::Direct { destination } => {
                merge_query_params(destination, request_url)
            }
            RedirectDecision::Smart {
                platform,
                app_url,
                store_url,
            } => {
                let query = SmartRedirectQuery {
                    platform: Some(platform.as_str().to_string()),
                    app_url: Some(app_url.clone()),
                    store_url: Some(store_url.clone()),
                    access_code: access_code.map(str::to_string),
                    slug: Some(slug.to_string()),
                };
                let encoded = form_urlencoded::Serializer::new(String::new())
                    .extend_pairs(query.pairs())
                    .finish();
                format!("{}?{}", smart_redirect_path, encoded)
            }
        }
    }
}

/// Applies the destination priority policy.
#[derive(Debug, Clone, Default)]
pub struct LinkResolver {
    store_urls: StoreUrls,
}

impl LinkResolver {
    pub fn new(store_urls: StoreUrls) -> Self {
        Self { store_urls }
    }

    /// Pick the destination and, for a matched mobile app URL, the store URL.
    pub fn resolve(&self, link: &LinkRecord, platform: Platform) -> ResolutionResult {
        match (platform, &link.ios_url, &link.android_url) {
            (Platform::Ios, Some(ios_url), _) => ResolutionResult {
                destination_url: Some(ios_url.clone()),
                store_url: self.store_urls.ios.clone(),
            },
            (Platform::Android, _, Some(android_url)) => ResolutionResult {
                destination_url: Some(android_url.clone()),
                store_url: self.store_urls.android.clone(),
            },
            _ => ResolutionResult {
                destination_url: link.web_url.clone().or_else(|| link.fallback_url.clone()),
                store_url: None,
            },
        }
    }

    /// Resolve an optional lookup result into a redirect decision.
    pub fn decide(
        &self,
        link: Option<&LinkRecord>,
        platform: Platform,
    ) -> Result<RedirectDecision, ResolveError> {
        let link = link
            .filter(|link| link.is_active)
            .ok_or(ResolveError::NotFound)?;

        let resolution = self.resolve(link, platform);
        if resolution.is_empty() {
            return Err(ResolveError::NoDestination);
        }

        match (resolution.destination_url, resolution.store_url) {
            (Some(app_url), Some(store_url)) if platform.is_mobile() => Ok(RedirectDecision::Smart {
                platform,
                app_url,
                store_url,
            }),
            (Some(destination), _) => Ok(RedirectDecision::Direct { destination }),
            (None, _) => Err(ResolveError::NoDestination),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const IOS: &str = "myapp://ios";
    const ANDROID: &str = "myapp://android";
    const WEB: &str = "https://example.com/web";
    const FALLBACK: &str = "https://example.com/fallback";
    const APP_STORE: &str = "https://apps.apple.com/app/id1";
    const PLAY_STORE: &str = "https://play.google.com/store/apps/details?id=com.example";

    fn record(mask: u8) -> LinkRecord {
        let mut link = LinkRecord::new("slug");
        if mask & 0b0001 != 0 {
            link = link.with_ios_url(IOS);
        }
        if mask & 0b0010 != 0 {
            link = link.with_android_url(ANDROID);
        }
        if mask & 0b0100 != 0 {
            link = link.with_web_url(WEB);
        }
        if mask & 0b1000 != 0 {
            link = link.with_fallback_url(FALLBACK);
        }
        link
    }

    fn with_stores() -> LinkResolver {
        LinkResolver::new(StoreUrls {
            ios: Some(APP_STORE.to_string()),
            android: Some(PLAY_STORE.to_string()),
        })
    }

    /// Independent statement of the priority policy used by the table test.
    fn expected(mask: u8, platform: Platform) -> (Option<&'static str>, Option<&'static str>) {
        let has = |bit: u8| mask & bit != 0;
        if platform == Platform::Ios && has(0b0001) {
            (Some(IOS), Some(APP_STORE))
        } else if platform == Platform::Android && has(0b0010) {
            (Some(ANDROID), Some(PLAY_STORE))
        } else if has(0b0100) {
            (Some(WEB), None)
        } else if has(0b1000) {
            (Some(FALLBACK), None)
        } else {
            (None, None)
        }
    }

    #[test]
    fn test_priority_table_all_combinations() {
        let resolver = with_stores();
        for mask in 0u8..16 {
            for platform in Platform::ALL {
                let result = resolver.resolve(&record(mask), platform);
                let (destination, store) = expected(mask, platform);
                assert_eq!(
                    result.destination_url.as_deref(),
                    destination,
                    "destination mismatch for mask {:04b} on {}",
                    mask,
                    platform
                );
                assert_eq!(
                    result.store_url.as_deref(),
                    store,
                    "store mismatch for mask {:04b} on {}",
                    mask,
                    platform
                );
            }
        }
    }

    #[test]
    fn test_no_store_configured_means_direct() {
        let resolver = LinkResolver::default();
        let link = LinkRecord::new("hello").with_ios_url("app://hello");

        let result = resolver.resolve(&link, Platform::Ios);
        assert_eq!(result.destination_url.as_deref(), Some("app://hello"));
        assert_eq!(result.store_url, None);

        let decision = resolver.decide(Some(&link), Platform::Ios).unwrap();
        assert_eq!(
            decision,
            RedirectDecision::Direct {
                destination: "app://hello".to_string()
            }
        );
    }

    #[test]
    fn test_store_configured_means_smart() {
        let resolver = with_stores();
        let link = record(0b1111);
        let decision = resolver.decide(Some(&link), Platform::Android).unwrap();
        assert!(decision.is_smart());

        // web never hands off, even with every URL present
        let decision = resolver.decide(Some(&link), Platform::Web).unwrap();
        assert_eq!(
            decision,
            RedirectDecision::Direct {
                destination: WEB.to_string()
            }
        );
    }

    #[test]
    fn test_mobile_without_app_url_is_direct() {
        let resolver = with_stores();
        let link = LinkRecord::new("profile")
            .with_android_url("myapp://profile")
            .with_web_url("https://example.com/profile");
        let decision = resolver.decide(Some(&link), Platform::Ios).unwrap();
        assert_eq!(
            decision,
            RedirectDecision::Direct {
                destination: "https://example.com/profile".to_string()
            }
        );
    }

    #[test]
    fn test_missing_and_inactive_are_not_found() {
        let resolver = with_stores();
        assert_eq!(resolver.decide(None, Platform::Ios), Err(ResolveError::NotFound));

        let inactive = record(0b1111).inactive();
        assert_eq!(
            resolver.decide(Some(&inactive), Platform::Ios),
            Err(ResolveError::NotFound)
        );
    }

    #[test]
    fn test_empty_record_is_no_destination() {
        let resolver = with_stores();
        let empty = LinkRecord::new("empty");
        for platform in Platform::ALL {
            assert_eq!(
                resolver.decide(Some(&empty), platform),
                Err(ResolveError::NoDestination)
            );
        }
        assert_eq!(ResolveError::NoDestination.to_string(), "No valid destination URL found");
        assert_eq!(ResolveError::NotFound.to_string(), "Link not found");
    }

    #[test]
    fn test_smart_location_carries_handoff_state() {
        let decision = RedirectDecision::Smart {
            platform: Platform::Ios,
            app_url: "app://hello".to_string(),
            store_url: APP_STORE.to_string(),
        };
        let location = decision.location(
            "http://localhost/l/hello?access_code=42",
            "/smart-redirect",
            "hello",
            Some("42"),
        );
        assert!(location.starts_with("/smart-redirect?"));

        let query = location.split_once('?').unwrap().1;
        let pairs: Vec<(String, String)> =
            form_urlencoded::parse(query.as_bytes()).into_owned().collect();
        assert_eq!(
            pairs,
            vec![
                ("platform".to_string(), "ios".to_string()),
                ("appUrl".to_string(), "app://hello".to_string()),
                ("storeUrl".to_string(), APP_STORE.to_string()),
                ("access_code".to_string(), "42".to_string()),
                ("slug".to_string(), "hello".to_string()),
            ]
        );
    }

    #[test]
    fn test_direct_location_merges_request_query() {
        let decision = RedirectDecision::Direct {
            destination: "https://example.com/hello?lang=en".to_string(),
        };
        let location = decision.location(
            "http://localhost/l/hello?utm_source=mail",
            "/smart-redirect",
            "hello",
            None,
        );
        assert_eq!(location, "https://example.com/hello?lang=en&utm_source=mail");
    }
}
