//! HTTP surface of the resolution service.
//!
//! | Route | Purpose |
//! |-------|---------|
//! | `GET /<canonical>/:slug` | resolve and redirect |
//! | `GET /<short>/:slug` | rewritten to the canonical route before routing |
//! | `GET <smart_redirect_path>` | names the app and store targets of a hand-off; 400 on a bad entry |
//! | `GET /.well-known/apple-app-site-association` | iOS universal links |
//! | `GET /.well-known/assetlinks.json` | Android app links |
//! | `GET /healthz` | liveness |

mod alias;
mod links;
mod smart_redirect;
mod well_known;

use std::sync::Arc;

use axum::extract::Request;
use axum::http::Uri;
use axum::routing::get;
use axum::{Json, Router, ServiceExt};
use deeplinker_handoff::CancellationToken;
use deeplinker_protocol::{
    AppSiteAssociation, AssetLinkStatement, DeeplinkerConfig, HealthResponse, RouteConfig,
};
use deeplinker_resolver::{LinkResolver, RouteAliasRewriter};
use deeplinker_store::ReadLinkStore;
use tokio::net::TcpListener;
use tower::Layer;
use tower_http::trace::TraceLayer;
use tracing::info;

pub use alias::{AliasRewrite, AliasRewriteLayer};
pub use links::LinkError;

/// Shared, read-only state for request handlers.
pub struct AppState {
    pub(crate) store: Arc<dyn ReadLinkStore>,
    pub(crate) resolver: LinkResolver,
    pub(crate) routes: RouteConfig,
    public_base_url: String,
    aasa: AppSiteAssociation,
    asset_links: Vec<AssetLinkStatement>,
}

impl AppState {
    pub fn new(config: &DeeplinkerConfig, store: Arc<dyn ReadLinkStore>) -> Self {
        let asset_links = if config.asset_links().is_empty() {
            vec![AssetLinkStatement::placeholder()]
        } else {
            config
                .asset_links()
                .iter()
                .map(|target| {
                    AssetLinkStatement::android_app(
                        &target.package_name,
                        &target.sha256_cert_fingerprint,
                    )
                })
                .collect()
        };

        Self {
            store,
            resolver: LinkResolver::new(config.stores.clone()),
            routes: config.routes.clone(),
            public_base_url: config
                .server
                .public_base_url
                .trim_end_matches('/')
                .to_string(),
            aasa: AppSiteAssociation::new(config.aasa_app_ids(), &config.routes.manifest_paths()),
            asset_links,
        }
    }

    /// Absolute URL of the inbound request, rebuilt on the public origin.
    pub(crate) fn request_url(&self, uri: &Uri) -> String {
        let path_and_query = uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or_else(|| uri.path());
        format!("{}{}", self.public_base_url, path_and_query)
    }
}

/// Routes without the alias rewrite.
pub fn router(state: Arc<AppState>) -> Router {
    let link_route = format!("/{}/:slug", state.routes.canonical_prefix);
    Router::new()
        .route(&link_route, get(links::resolve_link))
        .route(
            &state.routes.smart_redirect_path,
            get(smart_redirect::smart_redirect),
        )
        .route(
            "/.well-known/apple-app-site-association",
            get(well_known::apple_app_site_association),
        )
        .route("/.well-known/assetlinks.json", get(well_known::asset_links))
        .route("/healthz", get(healthz))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// The full application: the router behind the alias rewrite.
pub fn app(config: &DeeplinkerConfig, store: Arc<dyn ReadLinkStore>) -> AliasRewrite<Router> {
    let state = Arc::new(AppState::new(config, store));
    let rewriter = RouteAliasRewriter::new(
        config.routes.short_prefix.clone(),
        config.routes.canonical_prefix.clone(),
    );
    AliasRewriteLayer::new(rewriter).layer(router(state))
}

/// Serve `app` until `shutdown` is cancelled.
pub async fn serve(
    listener: TcpListener,
    app: AliasRewrite<Router>,
    shutdown: CancellationToken,
) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!("Listening on http://{}", addr);
    }
    axum::serve(listener, ServiceExt::<Request>::into_make_service(app))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
}

async fn healthz() -> Json<HealthResponse> {
    Json(HealthResponse::ok())
}
