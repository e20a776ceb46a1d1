use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::get,
};
use uuid::Uuid;

use crate::{
    dto::bookings::BookingSlotList,
    dto::cars::{CarDetails, CarList, NearbyCarList},
    dto::reviews::ReviewList,
    error::AppResult,
    response::ApiResponse,
    routes::params::{CarQuery, NearbyQuery},
    services::{booking_service, car_service, review_service},
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_cars))
        .route("/nearby", get(nearby_cars))
        .route("/{id}", get(get_car))
        .route("/{id}/reviews", get(car_reviews))
        .route("/{id}/bookings", get(car_bookings))
}

#[utoipa::path(
    get,
    path = "/api/cars",
    params(
        ("page" = Option<i64>, Query, description = "Page number, default 1"),
        ("per_page" = Option<i64>, Query, description = "Items per page, default 20"),
        ("location" = Option<String>, Query, description = "Substring match on location"),
        ("brand" = Option<String>, Query, description = "Substring match on brand"),
        ("model" = Option<String>, Query, description = "Substring match on model"),
        ("fuel_type" = Option<String>, Query, description = "Exact fuel type"),
        ("min_price" = Option<f64>, Query, description = "Minimum price per day"),
        ("max_price" = Option<f64>, Query, description = "Maximum price per day"),
        ("sort_by" = Option<String>, Query, description = "created_at, price_per_day, average_rating"),
        ("sort_order" = Option<String>, Query, description = "asc, desc")
    ),
    responses(
        (status = 200, description = "List cars", body = ApiResponse<CarList>)
    ),
    tag = "Cars"
)]
pub async fn list_cars(
    State(state): State<AppState>,
    Query(query): Query<CarQuery>,
) -> AppResult<Json<ApiResponse<CarList>>> {
    let resp = car_service::list_cars(&state, query).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/cars/nearby",
    params(
        ("lat" = f64, Query, description = "Latitude of the search point"),
        ("lng" = f64, Query, description = "Longitude of the search point"),
        ("radius_km" = Option<f64>, Query, description = "Search radius in km, default 10")
    ),
    responses(
        (status = 200, description = "Cars near a point", body = ApiResponse<NearbyCarList>),
        (status = 400, description = "Invalid coordinates")
    ),
    tag = "Cars"
)]
pub async fn nearby_cars(
    State(state): State<AppState>,
    Query(query): Query<NearbyQuery>,
) -> AppResult<Json<ApiResponse<NearbyCarList>>> {
    let resp = car_service::nearby_cars(&state, query).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/cars/{id}",
    params(
        ("id" = Uuid, Path, description = "Car ID")
    ),
    responses(
        (status = 200, description = "Car with owner and reviews", body = ApiResponse<CarDetails>),
        (status = 404, description = "Car not found")
    ),
    tag = "Cars"
)]
pub async fn get_car(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<CarDetails>>> {
    let resp = car_service::get_car(&state, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/cars/{id}/reviews",
    params(
        ("id" = Uuid, Path, description = "Car ID")
    ),
    responses(
        (status = 200, description = "Reviews for a car", body = ApiResponse<ReviewList>),
        (status = 404, description = "Car not found")
    ),
    tag = "Cars"
)]
pub async fn car_reviews(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<ReviewList>>> {
    let resp = review_service::list_car_reviews(&state, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/cars/{id}/bookings",
    params(
        ("id" = Uuid, Path, description = "Car ID")
    ),
    responses(
        (status = 200, description = "Booked slots for a car", body = ApiResponse<BookingSlotList>),
        (status = 404, description = "Car not found")
    ),
    tag = "Cars"
)]
pub async fn car_bookings(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<BookingSlotList>>> {
    let resp = booking_service::list_car_bookings(&state, id).await?;
    Ok(Json(resp))
}
