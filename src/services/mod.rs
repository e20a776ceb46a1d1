pub mod auth_service;
pub mod booking_service;
pub mod car_service;
pub mod favorite_service;
pub mod review_service;
