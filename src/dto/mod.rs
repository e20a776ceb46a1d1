pub mod auth;
pub mod bookings;
pub mod cars;
pub mod favorites;
pub mod reviews;
