use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, post, put},
};
use uuid::Uuid;

use crate::{
    dto::bookings::{
        AvailabilityResponse, BookingList, BookingView, CreateBookingRequest, TripPhotos,
        UpdateBookingRequest, UploadTripPhotosRequest,
    },
    error::AppResult,
    middleware::auth::AuthUser,
    response::ApiResponse,
    routes::params::AvailabilityQuery,
    services::booking_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_booking).get(list_bookings))
        .route("/check-availability/{car_id}", get(check_availability))
        .route("/{id}", get(get_booking).put(update_booking))
        .route("/{id}/photos", put(upload_trip_photos).get(trip_photos))
}

#[utoipa::path(
    post,
    path = "/api/bookings",
    request_body = CreateBookingRequest,
    responses(
        (status = 201, description = "Booking requested", body = ApiResponse<BookingView>),
        (status = 400, description = "Invalid dates or missing profile phone"),
        (status = 404, description = "Car not found"),
        (status = 409, description = "Dates conflict with an existing booking")
    ),
    security(("bearer_auth" = [])),
    tag = "Bookings"
)]
pub async fn create_booking(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CreateBookingRequest>,
) -> AppResult<Json<ApiResponse<BookingView>>> {
    let resp = booking_service::create_booking(&state, &user, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/bookings",
    responses(
        (status = 200, description = "The caller's bookings", body = ApiResponse<BookingList>)
    ),
    security(("bearer_auth" = [])),
    tag = "Bookings"
)]
pub async fn list_bookings(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<BookingList>>> {
    let resp = booking_service::list_bookings(&state, &user).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/bookings/check-availability/{car_id}",
    params(
        ("car_id" = Uuid, Path, description = "Car ID"),
        ("start_date" = String, Query, description = "RFC 3339 or YYYY-MM-DD"),
        ("end_date" = String, Query, description = "RFC 3339 or YYYY-MM-DD")
    ),
    responses(
        (status = 200, description = "Whether the window is free", body = ApiResponse<AvailabilityResponse>),
        (status = 400, description = "Invalid dates"),
        (status = 404, description = "Car not found")
    ),
    tag = "Bookings"
)]
pub async fn check_availability(
    State(state): State<AppState>,
    Path(car_id): Path<Uuid>,
    Query(query): Query<AvailabilityQuery>,
) -> AppResult<Json<ApiResponse<AvailabilityResponse>>> {
    let resp =
        booking_service::check_availability(&state, car_id, &query.start_date, &query.end_date)
            .await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/bookings/{id}",
    params(
        ("id" = Uuid, Path, description = "Booking ID")
    ),
    responses(
        (status = 200, description = "Booking", body = ApiResponse<BookingView>),
        (status = 404, description = "Not the caller's booking")
    ),
    security(("bearer_auth" = [])),
    tag = "Bookings"
)]
pub async fn get_booking(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<BookingView>>> {
    let resp = booking_service::get_booking(&state, &user, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    put,
    path = "/api/bookings/{id}",
    params(
        ("id" = Uuid, Path, description = "Booking ID")
    ),
    request_body = UpdateBookingRequest,
    responses(
        (status = 200, description = "Booking updated", body = ApiResponse<BookingView>),
        (status = 400, description = "Invalid dates or status"),
        (status = 404, description = "Not the caller's booking"),
        (status = 409, description = "State or date conflict")
    ),
    security(("bearer_auth" = [])),
    tag = "Bookings"
)]
pub async fn update_booking(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateBookingRequest>,
) -> AppResult<Json<ApiResponse<BookingView>>> {
    let resp = booking_service::update_booking(&state, &user, id, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    put,
    path = "/api/bookings/{id}/photos",
    params(
        ("id" = Uuid, Path, description = "Booking ID")
    ),
    request_body = UploadTripPhotosRequest,
    responses(
        (status = 200, description = "Photos stored", body = ApiResponse<TripPhotos>),
        (status = 404, description = "Not a party to this booking")
    ),
    security(("bearer_auth" = [])),
    tag = "Bookings"
)]
pub async fn upload_trip_photos(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UploadTripPhotosRequest>,
) -> AppResult<Json<ApiResponse<TripPhotos>>> {
    let resp = booking_service::upload_trip_photos(&state, &user, id, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/bookings/{id}/photos",
    params(
        ("id" = Uuid, Path, description = "Booking ID")
    ),
    responses(
        (status = 200, description = "Trip photos", body = ApiResponse<TripPhotos>),
        (status = 404, description = "Not a party to this booking")
    ),
    security(("bearer_auth" = [])),
    tag = "Bookings"
)]
pub async fn trip_photos(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<TripPhotos>>> {
    let resp = booking_service::get_trip_photos(&state, &user, id).await?;
    Ok(Json(resp))
}
