use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::ActiveValue::NotSet;
use sea_orm::sea_query::Expr;
use sea_orm::sea_query::extension::postgres::PgExpr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set,
};
use uuid::Uuid;

use crate::{
    audit::log_audit,
    dto::cars::{
        CarDetails, CarList, CarWithOwner, CreateCarRequest, NearbyCar, NearbyCarList,
        OwnerCarList, UpdateCarRequest,
    },
    dto::reviews::ReviewWithAuthor,
    entity::{
        cars::{ActiveModel as CarActive, Column as CarCol, Entity as Cars, Model as CarModel},
        reviews::{Column as ReviewCol, Entity as Reviews},
        users::{Column as UserCol, Entity as Users, Model as UserModel},
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{Car, PublicUser, Review},
    response::{ApiResponse, Meta},
    routes::params::{CarQuery, CarSortBy, NearbyQuery, SortOrder},
    state::AppState,
};

const EARTH_RADIUS_KM: f64 = 6371.0;
const KM_PER_DEGREE_LAT: f64 = 111.0;

pub async fn list_cars(state: &AppState, query: CarQuery) -> AppResult<ApiResponse<CarList>> {
    let (page, limit, offset) = query.pagination.normalize();
    let mut condition = Condition::all();

    if let Some(location) = query.location.as_ref().filter(|s| !s.is_empty()) {
        condition = condition.add(Expr::col(CarCol::Location).ilike(format!("%{location}%")));
    }
    if let Some(brand) = query.brand.as_ref().filter(|s| !s.is_empty()) {
        condition = condition.add(Expr::col(CarCol::Brand).ilike(format!("%{brand}%")));
    }
    if let Some(model) = query.model.as_ref().filter(|s| !s.is_empty()) {
        condition = condition.add(Expr::col(CarCol::Model).ilike(format!("%{model}%")));
    }
    if let Some(fuel_type) = query.fuel_type.as_ref().filter(|s| !s.is_empty()) {
        condition = condition.add(CarCol::FuelType.eq(fuel_type.clone()));
    }
    if let Some(min_price) = query.min_price {
        condition = condition.add(CarCol::PricePerDay.gte(min_price));
    }
    if let Some(max_price) = query.max_price {
        condition = condition.add(CarCol::PricePerDay.lte(max_price));
    }

    let sort_by = query.sort_by.unwrap_or(CarSortBy::CreatedAt);
    let sort_order = query.sort_order.unwrap_or(SortOrder::Desc);
    let sort_col = match sort_by {
        CarSortBy::CreatedAt => CarCol::CreatedAt,
        CarSortBy::PricePerDay => CarCol::PricePerDay,
        CarSortBy::AverageRating => CarCol::AverageRating,
    };

    let mut finder = Cars::find().filter(condition);
    finder = match sort_order {
        SortOrder::Asc => finder.order_by_asc(sort_col),
        SortOrder::Desc => finder.order_by_desc(sort_col),
    };

    let total = finder.clone().count(&state.orm).await? as i64;

    let cars = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?;

    let owner_ids: Vec<Uuid> = cars.iter().map(|c| c.owner_id).collect();
    let owners = Users::find()
        .filter(UserCol::Id.is_in(owner_ids))
        .all(&state.orm)
        .await?;

    let mut items = Vec::with_capacity(cars.len());
    for car in cars {
        let owner = owners
            .iter()
            .find(|u| u.id == car.owner_id)
            .ok_or_else(|| AppError::Internal(anyhow::anyhow!("car without owner")))?;
        items.push(CarWithOwner {
            car: car_from_entity(car),
            owner: public_from_user(owner),
        });
    }

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success("Cars", CarList { items }, Some(meta)))
}

/// Nearby search: a cheap bounding-box prefilter in SQL, exact haversine
/// distance computed here, sorted nearest first.
pub async fn nearby_cars(
    state: &AppState,
    query: NearbyQuery,
) -> AppResult<ApiResponse<NearbyCarList>> {
    if !(-90.0..=90.0).contains(&query.lat) {
        return Err(AppError::BadRequest("lat must be within -90..90".into()));
    }
    if !(-180.0..=180.0).contains(&query.lng) {
        return Err(AppError::BadRequest("lng must be within -180..180".into()));
    }
    let radius_km = query.radius_km.unwrap_or(10.0);
    if !(radius_km > 0.0 && radius_km <= 500.0) {
        return Err(AppError::BadRequest(
            "radius_km must be within 0..500".into(),
        ));
    }

    let lat_delta = radius_km / KM_PER_DEGREE_LAT;
    let lng_delta = radius_km / (KM_PER_DEGREE_LAT * query.lat.to_radians().cos().abs().max(0.01));

    let candidates = sqlx::query_as::<_, Car>(
        r#"
        SELECT * FROM cars
        WHERE latitude IS NOT NULL AND longitude IS NOT NULL
          AND latitude BETWEEN $1 AND $2
          AND longitude BETWEEN $3 AND $4
        "#,
    )
    .bind(query.lat - lat_delta)
    .bind(query.lat + lat_delta)
    .bind(query.lng - lng_delta)
    .bind(query.lng + lng_delta)
    .fetch_all(&state.pool)
    .await?;

    let mut items: Vec<NearbyCar> = candidates
        .into_iter()
        .filter_map(|car| {
            let (lat, lng) = (car.latitude?, car.longitude?);
            let distance_km = haversine_km(query.lat, query.lng, lat, lng);
            (distance_km <= radius_km).then_some(NearbyCar { car, distance_km })
        })
        .collect();
    items.sort_by(|a, b| a.distance_km.total_cmp(&b.distance_km));

    let total = items.len() as i64;
    Ok(ApiResponse::success(
        "Nearby cars",
        NearbyCarList { items },
        Some(Meta::new(1, total, total)),
    ))
}

pub async fn get_car(state: &AppState, id: Uuid) -> AppResult<ApiResponse<CarDetails>> {
    let car = Cars::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;
    let owner = Users::find_by_id(car.owner_id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    let review_rows = Reviews::find()
        .filter(ReviewCol::CarId.eq(car.id))
        .order_by_desc(ReviewCol::CreatedAt)
        .all(&state.orm)
        .await?;
    let author_ids: Vec<Uuid> = review_rows.iter().map(|r| r.user_id).collect();
    let authors = Users::find()
        .filter(UserCol::Id.is_in(author_ids))
        .all(&state.orm)
        .await?;

    let mut reviews = Vec::with_capacity(review_rows.len());
    for row in review_rows {
        let author = authors
            .iter()
            .find(|u| u.id == row.user_id)
            .ok_or_else(|| AppError::Internal(anyhow::anyhow!("review without author")))?;
        reviews.push(ReviewWithAuthor {
            review: Review {
                id: row.id,
                user_id: row.user_id,
                car_id: row.car_id,
                booking_id: row.booking_id,
                rating: row.rating,
                comment: row.comment,
                created_at: row.created_at.with_timezone(&Utc),
            },
            author: public_from_user(author),
        });
    }

    let details = CarDetails {
        car: car_from_entity(car),
        owner: public_from_user(&owner),
        reviews,
    };
    Ok(ApiResponse::success("Car", details, None))
}

pub async fn create_car(
    state: &AppState,
    user: &AuthUser,
    payload: CreateCarRequest,
) -> AppResult<ApiResponse<Car>> {
    let owner = Users::find_by_id(user.user_id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;
    if owner.phone.is_none() {
        return Err(AppError::BadRequest(
            "Add a phone number to your profile before listing a car".into(),
        ));
    }
    if payload.price_per_day <= Decimal::ZERO {
        return Err(AppError::BadRequest(
            "price_per_day must be greater than 0".into(),
        ));
    }
    if payload.seats <= 0 {
        return Err(AppError::BadRequest("seats must be greater than 0".into()));
    }

    let id = Uuid::new_v4();
    let active = CarActive {
        id: Set(id),
        owner_id: Set(user.user_id),
        brand: Set(payload.brand),
        model: Set(payload.model),
        engine: Set(payload.engine),
        fuel_type: Set(payload.fuel_type),
        color: Set(payload.color),
        price_per_day: Set(payload.price_per_day),
        location: Set(payload.location),
        latitude: Set(payload.latitude),
        longitude: Set(payload.longitude),
        transmission: Set(payload.transmission),
        seats: Set(payload.seats),
        image: Set(payload.image),
        average_rating: Set(Decimal::ZERO),
        review_count: Set(0),
        created_at: NotSet,
        updated_at: NotSet,
    };
    let car = active.insert(&state.orm).await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "car_create",
        Some("cars"),
        Some(serde_json::json!({ "car_id": car.id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Car listed",
        car_from_entity(car),
        Some(Meta::empty()),
    ))
}

pub async fn list_owner_cars(
    state: &AppState,
    user: &AuthUser,
) -> AppResult<ApiResponse<OwnerCarList>> {
    let cars = Cars::find()
        .filter(CarCol::OwnerId.eq(user.user_id))
        .order_by_desc(CarCol::CreatedAt)
        .all(&state.orm)
        .await?;

    let total = cars.len() as i64;
    let items = cars.into_iter().map(car_from_entity).collect();
    Ok(ApiResponse::success(
        "Your cars",
        OwnerCarList { items },
        Some(Meta::new(1, total, total)),
    ))
}

pub async fn update_car(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateCarRequest,
) -> AppResult<ApiResponse<Car>> {
    let existing = find_owned_car(state, user, id).await?;

    if let Some(price) = payload.price_per_day {
        if price <= Decimal::ZERO {
            return Err(AppError::BadRequest(
                "price_per_day must be greater than 0".into(),
            ));
        }
    }
    if let Some(seats) = payload.seats {
        if seats <= 0 {
            return Err(AppError::BadRequest("seats must be greater than 0".into()));
        }
    }

    let mut active: CarActive = existing.into();
    if let Some(brand) = payload.brand {
        active.brand = Set(brand);
    }
    if let Some(model) = payload.model {
        active.model = Set(model);
    }
    if let Some(engine) = payload.engine {
        active.engine = Set(engine);
    }
    if let Some(fuel_type) = payload.fuel_type {
        active.fuel_type = Set(fuel_type);
    }
    if let Some(color) = payload.color {
        active.color = Set(color);
    }
    if let Some(price) = payload.price_per_day {
        active.price_per_day = Set(price);
    }
    if let Some(location) = payload.location {
        active.location = Set(location);
    }
    if payload.latitude.is_some() {
        active.latitude = Set(payload.latitude);
    }
    if payload.longitude.is_some() {
        active.longitude = Set(payload.longitude);
    }
    if let Some(transmission) = payload.transmission {
        active.transmission = Set(transmission);
    }
    if let Some(seats) = payload.seats {
        active.seats = Set(seats);
    }
    if payload.image.is_some() {
        active.image = Set(payload.image);
    }
    active.updated_at = Set(Utc::now().into());
    let car = active.update(&state.orm).await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "car_update",
        Some("cars"),
        Some(serde_json::json!({ "car_id": car.id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Car updated",
        car_from_entity(car),
        Some(Meta::empty()),
    ))
}

pub async fn delete_car(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let existing = find_owned_car(state, user, id).await?;
    Cars::delete_by_id(existing.id).exec(&state.orm).await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "car_delete",
        Some("cars"),
        Some(serde_json::json!({ "car_id": id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Car deleted",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}

async fn find_owned_car(state: &AppState, user: &AuthUser, id: Uuid) -> AppResult<CarModel> {
    Cars::find()
        .filter(
            Condition::all()
                .add(CarCol::Id.eq(id))
                .add(CarCol::OwnerId.eq(user.user_id)),
        )
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)
}

fn haversine_km(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lng = (lng2 - lng1).to_radians();
    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lng / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * a.sqrt().atan2((1.0 - a).sqrt())
}

fn public_from_user(model: &UserModel) -> PublicUser {
    PublicUser {
        id: model.id,
        name: model.name.clone(),
        email: model.email.clone(),
        image: model.image.clone(),
    }
}

fn car_from_entity(model: CarModel) -> Car {
    Car {
        id: model.id,
        owner_id: model.owner_id,
        brand: model.brand,
        model: model.model,
        engine: model.engine,
        fuel_type: model.fuel_type,
        color: model.color,
        price_per_day: model.price_per_day,
        location: model.location,
        latitude: model.latitude,
        longitude: model.longitude,
        transmission: model.transmission,
        seats: model.seats,
        image: model.image,
        average_rating: model.average_rating,
        review_count: model.review_count,
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn haversine_matches_known_distances() {
        // Mumbai to Pune, roughly 120 km.
        let d = haversine_km(19.0760, 72.8777, 18.5204, 73.8567);
        assert!((100.0..140.0).contains(&d), "got {d}");

        // Same point is zero.
        assert!(haversine_km(12.97, 77.59, 12.97, 77.59) < 1e-9);
    }

    #[test]
    fn haversine_is_symmetric() {
        let a = haversine_km(28.61, 77.20, 13.08, 80.27);
        let b = haversine_km(13.08, 80.27, 28.61, 77.20);
        assert!((a - b).abs() < 1e-9);
    }
}
