use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::{PublicUser, Review};

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateReviewRequest {
    pub car_id: Uuid,
    pub booking_id: Uuid,
    pub rating: i32,
    pub comment: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ReviewWithAuthor {
    pub review: Review,
    pub author: PublicUser,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ReviewList {
    pub items: Vec<ReviewWithAuthor>,
}

/// Compact car reference for "my reviews" listings.
#[derive(Debug, Serialize, ToSchema)]
pub struct ReviewedCar {
    pub id: Uuid,
    pub brand: String,
    pub model: String,
    pub image: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ReviewWithCar {
    pub review: Review,
    pub car: ReviewedCar,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UserReviewList {
    pub items: Vec<ReviewWithCar>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct EligibilityResponse {
    pub eligible: bool,
}
