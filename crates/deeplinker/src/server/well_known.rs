use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use deeplinker_protocol::{AppSiteAssociation, AssetLinkStatement};

use super::AppState;

pub(crate) async fn apple_app_site_association(
    State(state): State<Arc<AppState>>,
) -> Json<AppSiteAssociation> {
    Json(state.aasa.clone())
}

pub(crate) async fn asset_links(
    State(state): State<Arc<AppState>>,
) -> Json<Vec<AssetLinkStatement>> {
    Json(state.asset_links.clone())
}
