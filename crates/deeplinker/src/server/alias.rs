//! Tower middleware applying [`RouteAliasRewriter`] to the request URI.
//!
//! Must wrap the whole `Router`: layers added with `Router::layer` run after
//! route matching and would be too late to change the route.

use std::sync::Arc;
use std::task::{Context, Poll};

use axum::http::uri::PathAndQuery;
use axum::http::{Request, Uri};
use deeplinker_resolver::RouteAliasRewriter;
use std::borrow::Cow;
use tower::{Layer, Service};
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct AliasRewriteLayer {
    rewriter: Arc<RouteAliasRewriter>,
}

impl AliasRewriteLayer {
    pub fn new(rewriter: RouteAliasRewriter) -> Self {
        Self {
            rewriter: Arc::new(rewriter),
        }
    }
}

impl<S> Layer<S> for AliasRewriteLayer {
    type Service = AliasRewrite<S>;

    fn layer(&self, inner: S) -> Self::Service {
        AliasRewrite {
            inner,
            rewriter: self.rewriter.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AliasRewrite<S> {
    inner: S,
    rewriter: Arc<RouteAliasRewriter>,
}

impl<S, B> Service<Request<B>> for AliasRewrite<S>
where
    S: Service<Request<B>>,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = S::Future;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut request: Request<B>) -> Self::Future {
        if let Some(uri) = rewrite_uri(&self.rewriter, request.uri()) {
            *request.uri_mut() = uri;
        }
        self.inner.call(request)
    }
}

/// The rewritten URI, or `None` when the path is not under the alias.
fn rewrite_uri(rewriter: &RouteAliasRewriter, uri: &Uri) -> Option<Uri> {
    let path_and_query = uri.path_and_query()?.as_str();
    let Cow::Owned(rewritten) = rewriter.rewrite_path_and_query(path_and_query) else {
        return None;
    };

    let mut parts = uri.clone().into_parts();
    let rebuilt = PathAndQuery::try_from(rewritten.as_str())
        .ok()
        .and_then(|pq| {
            parts.path_and_query = Some(pq);
            Uri::from_parts(parts).ok()
        });
    match rebuilt {
        Some(new_uri) => {
            debug!(from = %path_and_query, to = %rewritten, "Rewrote alias path");
            Some(new_uri)
        }
        None => {
            warn!("Could not rebuild URI for alias rewrite of {}", path_and_query);
            None
        }
    }
}
