use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post},
};
use uuid::Uuid;

use crate::{
    dto::reviews::{CreateReviewRequest, EligibilityResponse, UserReviewList},
    error::AppResult,
    middleware::auth::AuthUser,
    models::Review,
    response::ApiResponse,
    services::review_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_review))
        .route("/user", get(user_reviews))
        .route("/eligibility/{booking_id}", get(eligibility))
}

#[utoipa::path(
    post,
    path = "/api/reviews",
    request_body = CreateReviewRequest,
    responses(
        (status = 201, description = "Review created", body = ApiResponse<Review>),
        (status = 400, description = "Invalid rating or booking not completed"),
        (status = 404, description = "Not the caller's booking"),
        (status = 409, description = "Booking already reviewed")
    ),
    security(("bearer_auth" = [])),
    tag = "Reviews"
)]
pub async fn create_review(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CreateReviewRequest>,
) -> AppResult<Json<ApiResponse<Review>>> {
    let resp = review_service::create_review(&state, &user, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/reviews/user",
    responses(
        (status = 200, description = "The caller's reviews", body = ApiResponse<UserReviewList>)
    ),
    security(("bearer_auth" = [])),
    tag = "Reviews"
)]
pub async fn user_reviews(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<UserReviewList>>> {
    let resp = review_service::list_user_reviews(&state, &user).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/reviews/eligibility/{booking_id}",
    params(
        ("booking_id" = Uuid, Path, description = "Booking ID")
    ),
    responses(
        (status = 200, description = "Whether a review may be written", body = ApiResponse<EligibilityResponse>)
    ),
    security(("bearer_auth" = [])),
    tag = "Reviews"
)]
pub async fn eligibility(
    State(state): State<AppState>,
    user: AuthUser,
    Path(booking_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<EligibilityResponse>>> {
    let resp = review_service::check_eligibility(&state, &user, booking_id).await?;
    Ok(Json(resp))
}
