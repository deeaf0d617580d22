//! `GET <smart_redirect_path>`
//!
//! The hand-off itself runs on the client. This route only validates the
//! entry parameters and names the two destinations, so a browser following
//! a smart redirect lands somewhere meaningful.

use axum::http::header::CACHE_CONTROL;
use axum::http::{StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Json;
use deeplinker_handoff::{query_from_url, SmartRedirectEntry};
use deeplinker_protocol::ErrorResponse;
use tracing::info;

const NO_STORE: &str = "no-store";

pub(crate) async fn smart_redirect(uri: Uri) -> Response {
    let query = query_from_url(&uri.to_string());
    match SmartRedirectEntry::from_query(&query) {
        Ok(entry) => {
            let body = format!(
                "Opening the {} app.\n\nApp:   {}\nStore: {}\n",
                entry.platform, entry.app_url, entry.store_url
            );
            (StatusCode::OK, [(CACHE_CONTROL, NO_STORE)], body).into_response()
        }
        Err(err) => {
            info!("Rejected smart redirect entry: {}", err);
            (
                StatusCode::BAD_REQUEST,
                [(CACHE_CONTROL, NO_STORE)],
                Json(ErrorResponse::new(err.to_string())),
            )
                .into_response()
        }
    }
}
