use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, post},
};
use uuid::Uuid;

use crate::{
    dto::favorites::{FavoriteCarList, FavoriteToggled, ToggleFavoriteRequest},
    error::AppResult,
    middleware::auth::AuthUser,
    response::ApiResponse,
    routes::params::Pagination,
    services::favorite_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(toggle_favorite).get(list_favorites))
        .route("/check/{car_id}", get(check_favorite))
}

#[utoipa::path(
    post,
    path = "/api/favorites",
    request_body = ToggleFavoriteRequest,
    responses(
        (status = 200, description = "Favorite toggled", body = ApiResponse<FavoriteToggled>),
        (status = 404, description = "Car not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Favorites"
)]
pub async fn toggle_favorite(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<ToggleFavoriteRequest>,
) -> AppResult<Json<ApiResponse<FavoriteToggled>>> {
    let resp = favorite_service::toggle_favorite(&state.pool, &user, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/favorites",
    params(
        ("page" = Option<i64>, Query, description = "Page number, default 1"),
        ("per_page" = Option<i64>, Query, description = "Items per page, default 20")
    ),
    responses(
        (status = 200, description = "Favorited cars", body = ApiResponse<FavoriteCarList>)
    ),
    security(("bearer_auth" = [])),
    tag = "Favorites"
)]
pub async fn list_favorites(
    State(state): State<AppState>,
    user: AuthUser,
    Query(pagination): Query<Pagination>,
) -> AppResult<Json<ApiResponse<FavoriteCarList>>> {
    let resp = favorite_service::list_favorites(&state.pool, &user, pagination).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/favorites/check/{car_id}",
    params(
        ("car_id" = Uuid, Path, description = "Car ID")
    ),
    responses(
        (status = 200, description = "Favorite status", body = ApiResponse<FavoriteToggled>)
    ),
    security(("bearer_auth" = [])),
    tag = "Favorites"
)]
pub async fn check_favorite(
    State(state): State<AppState>,
    user: AuthUser,
    Path(car_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<FavoriteToggled>>> {
    let resp = favorite_service::check_favorite(&state.pool, &user, car_id).await?;
    Ok(Json(resp))
}
