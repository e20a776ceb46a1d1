use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::lifecycle::BookingStatus;
use crate::models::{Booking, Car, ContactUser};

/// Dates arrive as strings (RFC 3339 or `YYYY-MM-DD`) and are validated in
/// the service so malformed input yields a 400, not a body-decode error.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateBookingRequest {
    pub car_id: Uuid,
    pub start_date: String,
    pub end_date: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateBookingRequest {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub status: Option<BookingStatus>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateBookingStatusRequest {
    pub status: BookingStatus,
}

/// A booking with both parties attached. Phone numbers on `owner`/`renter`
/// are redacted unless the booking's status shares contacts.
#[derive(Debug, Serialize, ToSchema)]
pub struct BookingView {
    pub booking: Booking,
    pub car: Car,
    pub owner: ContactUser,
    pub renter: ContactUser,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct BookingList {
    pub items: Vec<BookingView>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AvailabilityResponse {
    pub available: bool,
}

/// Public calendar entry for a car: enough to gray out dates, nothing more.
#[derive(Debug, Serialize, ToSchema)]
pub struct BookingSlot {
    pub id: Uuid,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub status: BookingStatus,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct BookingSlotList {
    pub items: Vec<BookingSlot>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PhotoKind {
    Pre,
    Post,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UploadTripPhotosRequest {
    pub kind: PhotoKind,
    pub photos: Vec<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TripPhotos {
    pub pre_trip_photos: Vec<String>,
    pub post_trip_photos: Vec<String>,
}
