use axum::{
    Json, Router,
    extract::{Path, State},
    routing::get,
};
use uuid::Uuid;

use crate::{
    dto::catalog::CatalogItem, error::AppError, services::room_service, state::SharedState,
};

/// Routes that surface the upstream catalog to clients.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/rooms/{id}/feed", get(room_feed))
        .route("/catalog/items/{item_id}", get(catalog_item))
}

/// Candidate items for a room, constrained by the room's filter set. The
/// feed is best-effort: provider failures yield an empty list, not an error.
#[utoipa::path(
    get,
    path = "/rooms/{id}/feed",
    tag = "catalog",
    params(("id" = Uuid, Path, description = "Room identifier")),
    responses(
        (status = 200, description = "Candidate items", body = [CatalogItem]),
        (status = 404, description = "Room not found")
    )
)]
pub async fn room_feed(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<CatalogItem>>, AppError> {
    let room = room_service::get_room(&state, id).await?;
    let items = state.catalog().items_for_filters(&room.filters).await;
    Ok(Json(items))
}

/// Look a single catalog item up by its provider id.
#[utoipa::path(
    get,
    path = "/catalog/items/{item_id}",
    tag = "catalog",
    params(("item_id" = u64, Path, description = "Catalog item identifier")),
    responses(
        (status = 200, description = "Item details", body = CatalogItem),
        (status = 404, description = "Unknown item or provider unavailable")
    )
)]
pub async fn catalog_item(
    State(state): State<SharedState>,
    Path(item_id): Path<u64>,
) -> Result<Json<CatalogItem>, AppError> {
    match state.catalog().lookup_item(item_id).await {
        Some(item) => Ok(Json(item)),
        None => Err(AppError::NotFound(format!("no catalog item `{item_id}`"))),
    }
}
