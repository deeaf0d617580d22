//! End-to-end checks of the HTTP surface, driven in-process through
//! `tower::ServiceExt::oneshot`.

use std::path::PathBuf;
use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::header::{CACHE_CONTROL, LOCATION, USER_AGENT};
use axum::http::{Request, StatusCode};
use axum::response::Response;
use deeplinker::app;
use deeplinker_handoff::{
    apply_effects, query_from_url, AccessCodeRelay, InMemoryRelay, NavigationKind,
    PostInstallConfig, PostInstallRecovery, RecordingNavigator, SmartRedirectConfig,
    SmartRedirectCoordinator, SmartRedirectPhase,
};
use deeplinker_protocol::defaults::DIRECT_REDIRECT_CACHE_CONTROL;
use deeplinker_protocol::{DeeplinkerConfig, LinkRecord, RecoveryPayload, StoreUrls};
use async_trait::async_trait;
use deeplinker_store::{MemoryLinkStore, ReadLinkStore, StoreError};
use serde_json::Value;
use tower::ServiceExt;

const IOS_STORE: &str = "https://apps.apple.com/app/id123";
const IPHONE_UA: &str =
    "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X) AppleWebKit/605.1.15";

fn config() -> DeeplinkerConfig {
    let mut config = DeeplinkerConfig::default();
    config.stores = StoreUrls {
        ios: Some(IOS_STORE.to_string()),
        android: None,
    };
    config
}

fn links() -> Vec<LinkRecord> {
    let mut retired = LinkRecord::new("retired").with_web_url("https://example.com/old");
    retired.is_active = false;
    vec![
        LinkRecord::new("hello")
            .with_ios_url("myapp://hello")
            .with_android_url("myapp://hello")
            .with_web_url("https://example.com/hello"),
        LinkRecord::new("ios-only").with_ios_url("myapp://settings"),
        retired,
    ]
}

async fn get(uri: &str, user_agent: Option<&str>) -> Response {
    get_with(&config(), uri, user_agent).await
}

async fn get_with(config: &DeeplinkerConfig, uri: &str, user_agent: Option<&str>) -> Response {
    let service = app(config, Arc::new(MemoryLinkStore::with_links(links())));
    let mut request = Request::builder().uri(uri);
    if let Some(ua) = user_agent {
        request = request.header(USER_AGENT, ua);
    }
    service
        .oneshot(request.body(Body::empty()).unwrap())
        .await
        .unwrap()
}

/// A store whose disk has gone away.
struct BrokenStore;

#[async_trait]
impl ReadLinkStore for BrokenStore {
    async fn get(&self, _slug: &str) -> deeplinker_store::Result<Option<LinkRecord>> {
        Err(StoreError::Io {
            path: PathBuf::from("/var/lib/deeplinker/links.json"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "permission denied"),
        })
    }

    async fn list(&self) -> deeplinker_store::Result<Vec<LinkRecord>> {
        Ok(Vec::new())
    }
}

fn location(response: &Response) -> String {
    response.headers()[LOCATION].to_str().unwrap().to_string()
}

async fn json_body(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_direct_redirect_to_web() {
    let response = get("/l/hello?utm_source=mail", None).await;

    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), "https://example.com/hello?utm_source=mail");
    assert_eq!(
        response.headers()[CACHE_CONTROL].to_str().unwrap(),
        DIRECT_REDIRECT_CACHE_CONTROL
    );
}

#[tokio::test]
async fn test_android_without_store_url_goes_direct() {
    let response = get("/l/hello?platform=android", None).await;

    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), "myapp://hello?platform=android");
    assert!(response.headers().contains_key(CACHE_CONTROL));
}

#[tokio::test]
async fn test_ios_without_store_url_goes_direct() {
    let response = get_with(&DeeplinkerConfig::default(), "/l/hello?platform=ios&ref=x", None).await;

    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), "myapp://hello?platform=ios&ref=x");
    assert!(response.headers().contains_key(CACHE_CONTROL));
}

#[tokio::test]
async fn test_ios_user_agent_gets_smart_redirect() {
    let response = get("/l/hello?access_code=42", Some(IPHONE_UA)).await;

    assert_eq!(response.status(), StatusCode::FOUND);
    assert!(!response.headers().contains_key(CACHE_CONTROL));

    let query = query_from_url(&location(&response));
    assert_eq!(query.platform.as_deref(), Some("ios"));
    assert_eq!(query.app_url.as_deref(), Some("myapp://hello"));
    assert_eq!(query.store_url.as_deref(), Some(IOS_STORE));
    assert_eq!(query.access_code.as_deref(), Some("42"));
    assert_eq!(query.slug.as_deref(), Some("hello"));
}

#[tokio::test]
async fn test_smart_redirect_location_is_served() {
    let redirect = get("/l/hello?access_code=42", Some(IPHONE_UA)).await;
    let response = get(&location(&redirect), Some(IPHONE_UA)).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[CACHE_CONTROL].to_str().unwrap(), "no-store");
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let page = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(page.contains("myapp://hello"));
    assert!(page.contains(IOS_STORE));
}

#[tokio::test]
async fn test_smart_redirect_bad_entry_is_400() {
    let response = get("/smart-redirect?platform=ios&appUrl=myapp%3A%2F%2Fhello", None).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        json_body(response).await,
        serde_json::json!({ "error": "Invalid smart redirect entry: missing storeUrl" })
    );
}

#[tokio::test]
async fn test_empty_access_code_is_dropped() {
    let response = get("/l/hello?platform=ios&access_code=", None).await;
    let location = location(&response);

    assert!(location.starts_with("/smart-redirect?"));
    assert!(!location.contains("access_code"));
}

#[tokio::test]
async fn test_short_alias_preserves_query() {
    let response = get("/d/hello?platform=web&ref=abc", None).await;

    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(
        location(&response),
        "https://example.com/hello?platform=web&ref=abc"
    );
}

#[tokio::test]
async fn test_unknown_and_inactive_links_are_404() {
    for uri in ["/l/missing", "/l/retired", "/d/missing"] {
        let response = get(uri, None).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "{}", uri);
        assert_eq!(
            json_body(response).await,
            serde_json::json!({ "error": "Link not found" })
        );
    }
}

#[tokio::test]
async fn test_no_destination_is_404() {
    let response = get("/l/ios-only?platform=web", None).await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(
        json_body(response).await,
        serde_json::json!({ "error": "No valid destination URL found" })
    );
}

#[tokio::test]
async fn test_store_failure_is_opaque_500() {
    let service = app(&config(), Arc::new(BrokenStore));
    let request = Request::builder()
        .uri("/d/hello?platform=web")
        .body(Body::empty())
        .unwrap();
    let response = service.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(!response.headers().contains_key(LOCATION));
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], br#"{"error":"Internal server error"}"#);
}

#[tokio::test]
async fn test_well_known_placeholders() {
    let aasa = json_body(get("/.well-known/apple-app-site-association", None).await).await;
    let detail = &aasa["applinks"]["details"][0];
    assert_eq!(detail["appID"], "ABCDE12345.com.your.bundle");
    assert_eq!(detail["paths"], serde_json::json!(["/l/*", "/d/*"]));

    let statements = json_body(get("/.well-known/assetlinks.json", None).await).await;
    assert_eq!(statements[0]["target"]["namespace"], "android_app");
    assert_eq!(statements[0]["target"]["package_name"], "com.your.app");
}

#[tokio::test]
async fn test_healthz() {
    let response = get("/healthz", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await, serde_json::json!({ "status": "ok" }));
}

/// Server redirect, client hand-off to the store, then recovery on first
/// launch: the app is reopened with the original slug and access code.
#[tokio::test]
async fn test_install_gap_round_trip() {
    let response = get("/l/hello?access_code=42", Some(IPHONE_UA)).await;
    let query = query_from_url(&location(&response));

    let relay = InMemoryRelay::new();
    let mut navigator = RecordingNavigator::new();

    let mut coordinator = SmartRedirectCoordinator::new(SmartRedirectConfig::default());
    let effects = coordinator.enter(&query).unwrap();
    apply_effects(effects, &mut navigator, &relay);
    let effects = coordinator.advance(4);
    apply_effects(effects, &mut navigator, &relay);

    assert_eq!(coordinator.phase(), SmartRedirectPhase::StoreRedirected);
    let kinds: Vec<NavigationKind> = navigator.navigations().iter().map(|n| n.kind).collect();
    assert_eq!(kinds, vec![NavigationKind::AppScheme, NavigationKind::Store]);

    let mut recovery = PostInstallRecovery::new(PostInstallConfig::from_config(&config()));
    let effects = recovery.enter_from_relay(&relay).unwrap();
    apply_effects(effects, &mut navigator, &relay);
    let effects = recovery.advance(1);
    apply_effects(effects, &mut navigator, &relay);

    assert_eq!(
        recovery.payload(),
        Some(&RecoveryPayload::new("hello", "42"))
    );
    let last = navigator.navigations().pop().unwrap();
    assert_eq!(last.kind, NavigationKind::AppScheme);
    assert_eq!(last.url, "myapp://hello?access_code=42");
    assert_eq!(relay.read_and_clear().unwrap(), None);
}
