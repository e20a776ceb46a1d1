use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::Car;

#[derive(Debug, Deserialize, ToSchema)]
pub struct ToggleFavoriteRequest {
    pub car_id: Uuid,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct FavoriteToggled {
    pub is_favorite: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct FavoriteCarList {
    pub items: Vec<Car>,
}
