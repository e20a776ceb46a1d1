use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post, put},
};
use uuid::Uuid;

use crate::{
    dto::bookings::{BookingList, BookingView, UpdateBookingStatusRequest},
    dto::cars::{CreateCarRequest, OwnerCarList, UpdateCarRequest},
    error::AppResult,
    middleware::auth::AuthUser,
    models::Car,
    response::ApiResponse,
    services::{booking_service, car_service},
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/cars", post(add_car).get(list_cars))
        .route("/cars/{id}", put(update_car).delete(delete_car))
        .route("/bookings", get(list_bookings))
        .route("/bookings/{id}/status", put(update_booking_status))
}

#[utoipa::path(
    post,
    path = "/api/owner/cars",
    request_body = CreateCarRequest,
    responses(
        (status = 201, description = "Car listed", body = ApiResponse<Car>),
        (status = 400, description = "Invalid listing or missing profile phone")
    ),
    security(("bearer_auth" = [])),
    tag = "Owner"
)]
pub async fn add_car(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CreateCarRequest>,
) -> AppResult<Json<ApiResponse<Car>>> {
    let resp = car_service::create_car(&state, &user, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/owner/cars",
    responses(
        (status = 200, description = "The caller's cars", body = ApiResponse<OwnerCarList>)
    ),
    security(("bearer_auth" = [])),
    tag = "Owner"
)]
pub async fn list_cars(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<OwnerCarList>>> {
    let resp = car_service::list_owner_cars(&state, &user).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    put,
    path = "/api/owner/cars/{id}",
    params(
        ("id" = Uuid, Path, description = "Car ID")
    ),
    request_body = UpdateCarRequest,
    responses(
        (status = 200, description = "Car updated", body = ApiResponse<Car>),
        (status = 404, description = "Not the caller's car")
    ),
    security(("bearer_auth" = [])),
    tag = "Owner"
)]
pub async fn update_car(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateCarRequest>,
) -> AppResult<Json<ApiResponse<Car>>> {
    let resp = car_service::update_car(&state, &user, id, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    delete,
    path = "/api/owner/cars/{id}",
    params(
        ("id" = Uuid, Path, description = "Car ID")
    ),
    responses(
        (status = 200, description = "Car deleted"),
        (status = 404, description = "Not the caller's car")
    ),
    security(("bearer_auth" = [])),
    tag = "Owner"
)]
pub async fn delete_car(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    let resp = car_service::delete_car(&state, &user, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/owner/bookings",
    responses(
        (status = 200, description = "Bookings on the caller's cars", body = ApiResponse<BookingList>)
    ),
    security(("bearer_auth" = [])),
    tag = "Owner"
)]
pub async fn list_bookings(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<BookingList>>> {
    let resp = booking_service::list_owner_bookings(&state, &user).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    put,
    path = "/api/owner/bookings/{id}/status",
    params(
        ("id" = Uuid, Path, description = "Booking ID")
    ),
    request_body = UpdateBookingStatusRequest,
    responses(
        (status = 200, description = "Status updated", body = ApiResponse<BookingView>),
        (status = 400, description = "Illegal transition"),
        (status = 404, description = "No such booking on the caller's cars"),
        (status = 409, description = "Dates conflict with another booking")
    ),
    security(("bearer_auth" = [])),
    tag = "Owner"
)]
pub async fn update_booking_status(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateBookingStatusRequest>,
) -> AppResult<Json<ApiResponse<BookingView>>> {
    let resp = booking_service::update_status_by_owner(&state, &user, id, payload).await?;
    Ok(Json(resp))
}
