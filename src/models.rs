use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::lifecycle::BookingStatus;

/// Full user row. Never serialized to a response; callers get one of the
/// trimmed views below.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub phone: Option<String>,
    pub image: Option<String>,
    pub id_document_number: Option<String>,
    pub driving_license_number: Option<String>,
    pub is_verified: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The caller's own profile.
#[derive(Debug, Serialize, Deserialize, ToSchema, FromRow)]
pub struct Profile {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub image: Option<String>,
    pub is_verified: bool,
    pub created_at: DateTime<Utc>,
}

/// Public identity embedded in car listings and reviews. No phone, ever.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PublicUser {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub image: Option<String>,
}

/// A booking party as seen by the other side. `phone` is populated only
/// while the booking's status shares contact details.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ContactUser {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub image: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, FromRow)]
pub struct Car {
    pub id: Uuid,
    pub owner_id: Uuid,
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
    pub average_rating: Decimal,
    pub review_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Booking {
    pub id: Uuid,
    pub user_id: Uuid,
    pub car_id: Uuid,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub status: BookingStatus,
    pub total_price: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, FromRow)]
pub struct Review {
    pub id: Uuid,
    pub user_id: Uuid,
    pub car_id: Uuid,
    pub booking_id: Uuid,
    pub rating: i32,
    pub comment: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, FromRow)]
pub struct Favorite {
    pub id: Uuid,
    pub user_id: Uuid,
    pub car_id: Uuid,
    pub created_at: DateTime<Utc>,
}
