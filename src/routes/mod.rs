use axum::Router;

use crate::state::AppState;

pub mod auth;
pub mod bookings;
pub mod cars;
pub mod doc;
pub mod favorites;
pub mod health;
pub mod owner;
pub mod params;
pub mod reviews;

// Build the API router without binding state; it will be provided at the top level.
pub fn create_api_router() -> Router<AppState> {
    Router::new()
        .nest("/auth", auth::router())
        .nest("/cars", cars::router())
        .nest("/owner", owner::router())
        .nest("/bookings", bookings::router())
        .nest("/reviews", reviews::router())
        .nest("/favorites", favorites::router())
}
