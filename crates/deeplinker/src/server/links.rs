//! `GET /<canonical_prefix>/:slug`

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::header::{CACHE_CONTROL, LOCATION, USER_AGENT};
use axum::http::{HeaderMap, HeaderValue, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Json;
use deeplinker_protocol::defaults::{DIRECT_REDIRECT_CACHE_CONTROL, INTERNAL_ERROR_MESSAGE};
use deeplinker_protocol::ErrorResponse;
use deeplinker_resolver::{first_query_param, resolve_platform, ResolveError};
use deeplinker_store::StoreError;
use thiserror::Error;
use tracing::{error, info};

use super::AppState;

const PLATFORM_PARAM: &str = "platform";
const ACCESS_CODE_PARAM: &str = "access_code";

#[derive(Debug, Error)]
pub enum LinkError {
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    #[error("link lookup failed: {0}")]
    Store(#[from] StoreError),
    #[error("redirect location is not a valid header value: {0}")]
    InvalidLocation(String),
}

impl IntoResponse for LinkError {
    fn into_response(self) -> Response {
        match self {
            LinkError::Resolve(err) => {
                (StatusCode::NOT_FOUND, Json(ErrorResponse::new(err.to_string()))).into_response()
            }
            LinkError::Store(_) | LinkError::InvalidLocation(_) => {
                error!("Error resolving link: {}", self);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ErrorResponse::new(INTERNAL_ERROR_MESSAGE)),
                )
                    .into_response()
            }
        }
    }
}

pub(crate) async fn resolve_link(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
    headers: HeaderMap,
    uri: Uri,
) -> Result<Response, LinkError> {
    let query = uri.query().unwrap_or("");
    let platform_override = first_query_param(query, PLATFORM_PARAM);
    let access_code = first_query_param(query, ACCESS_CODE_PARAM).filter(|code| !code.is_empty());
    let user_agent = headers
        .get(USER_AGENT)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("");
    let platform = resolve_platform(platform_override.as_deref(), user_agent);

    let link = state.store.find_active(&slug).await?;
    let decision = match state.resolver.decide(link.as_ref(), platform) {
        Ok(decision) => decision,
        Err(err) => {
            info!(%slug, %platform, "Link not resolved: {}", err);
            return Err(err.into());
        }
    };

    let request_url = state.request_url(&uri);
    let location = decision.location(
        &request_url,
        &state.routes.smart_redirect_path,
        &slug,
        access_code.as_deref(),
    );
    let smart = decision.is_smart();
    info!(%slug, %platform, smart, "Resolved link");

    let location_value = HeaderValue::try_from(location.as_str())
        .map_err(|_| LinkError::InvalidLocation(location.clone()))?;
    let mut response = (StatusCode::FOUND, [(LOCATION, location_value)]).into_response();
    if !smart {
        response.headers_mut().insert(
            CACHE_CONTROL,
            HeaderValue::from_static(DIRECT_REDIRECT_CACHE_CONTROL),
        );
    }
    Ok(response)
}
