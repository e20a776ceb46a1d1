use uuid::Uuid;

use crate::{
    audit::log_audit,
    db::DbPool,
    dto::favorites::{FavoriteCarList, FavoriteToggled, ToggleFavoriteRequest},
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{Car, Favorite},
    response::{ApiResponse, Meta},
    routes::params::Pagination,
};

/// Wishlist toggle: first call adds, second removes.
pub async fn toggle_favorite(
    pool: &DbPool,
    user: &AuthUser,
    payload: ToggleFavoriteRequest,
) -> AppResult<ApiResponse<FavoriteToggled>> {
    let car_exists: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM cars WHERE id = $1")
        .bind(payload.car_id)
        .fetch_optional(pool)
        .await?;
    if car_exists.is_none() {
        return Err(AppError::NotFound);
    }

    let existing: Option<Favorite> =
        sqlx::query_as("SELECT * FROM favorites WHERE user_id = $1 AND car_id = $2")
            .bind(user.user_id)
            .bind(payload.car_id)
            .fetch_optional(pool)
            .await?;

    let (is_favorite, message) = if let Some(fav) = existing {
        sqlx::query("DELETE FROM favorites WHERE id = $1")
            .bind(fav.id)
            .execute(pool)
            .await?;
        (false, "Removed from favorites")
    } else {
        sqlx::query(
            r#"
            INSERT INTO favorites (id, user_id, car_id)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user.user_id)
        .bind(payload.car_id)
        .execute(pool)
        .await?;
        (true, "Added to favorites")
    };

    if let Err(err) = log_audit(
        pool,
        Some(user.user_id),
        "favorite_toggle",
        Some("favorites"),
        Some(serde_json::json!({ "car_id": payload.car_id, "is_favorite": is_favorite })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        message,
        FavoriteToggled { is_favorite },
        Some(Meta::empty()),
    ))
}

pub async fn list_favorites(
    pool: &DbPool,
    user: &AuthUser,
    pagination: Pagination,
) -> AppResult<ApiResponse<FavoriteCarList>> {
    let (page, limit, offset) = pagination.normalize();
    let cars = sqlx::query_as::<_, Car>(
        r#"
        SELECT c.*
        FROM favorites f
        JOIN cars c ON c.id = f.car_id
        WHERE f.user_id = $1
        ORDER BY f.created_at DESC
        LIMIT $2 OFFSET $3
        "#,
    )
    .bind(user.user_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    let total: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM favorites WHERE user_id = $1")
        .bind(user.user_id)
        .fetch_one(pool)
        .await?;

    let meta = Meta::new(page, limit, total.0);
    Ok(ApiResponse::success(
        "Favorites",
        FavoriteCarList { items: cars },
        Some(meta),
    ))
}

pub async fn check_favorite(
    pool: &DbPool,
    user: &AuthUser,
    car_id: Uuid,
) -> AppResult<ApiResponse<FavoriteToggled>> {
    let existing: Option<(Uuid,)> =
        sqlx::query_as("SELECT id FROM favorites WHERE user_id = $1 AND car_id = $2")
            .bind(user.user_id)
            .bind(car_id)
            .fetch_optional(pool)
            .await?;

    Ok(ApiResponse::success(
        "Favorite status",
        FavoriteToggled {
            is_favorite: existing.is_some(),
        },
        Some(Meta::empty()),
    ))
}
