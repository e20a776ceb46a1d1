use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::dto::reviews::ReviewWithAuthor;
use crate::models::{Car, PublicUser};

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateCarRequest {
    pub brand: String,
    pub model: String,
    pub engine: String,
    pub fuel_type: String,
    pub color: String,
    pub price_per_day: Decimal,
    pub location: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub transmission: String,
    pub seats: i32,
    pub image: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateCarRequest {
    pub brand: Option<String>,
    pub model: Option<String>,
    pub engine: Option<String>,
    pub fuel_type: Option<String>,
    pub color: Option<String>,
    pub price_per_day: Option<Decimal>,
    pub location: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub transmission: Option<String>,
    pub seats: Option<i32>,
    pub image: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CarWithOwner {
    pub car: Car,
    pub owner: PublicUser,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CarDetails {
    pub car: Car,
    pub owner: PublicUser,
    pub reviews: Vec<ReviewWithAuthor>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CarList {
    pub items: Vec<CarWithOwner>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OwnerCarList {
    pub items: Vec<Car>,
}

/// A nearby search hit with its great-circle distance from the query point.
#[derive(Debug, Serialize, ToSchema)]
pub struct NearbyCar {
    pub car: Car,
    pub distance_km: f64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct NearbyCarList {
    pub items: Vec<NearbyCar>,
}
