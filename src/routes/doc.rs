use utoipa::{
    Modify, OpenApi,
    openapi::{
        self,
        OpenApi as OpenApiSpec,
        security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    },
};
use utoipa_scalar::{Scalar, Servable};

use crate::{
    dto::{
        auth::{AuthResponse, LoginRequest, RegisterRequest, UpdateProfileRequest, VerificationRequest, VerificationStatus},
        bookings::{
            AvailabilityResponse, BookingList, BookingSlot, BookingSlotList, BookingView,
            CreateBookingRequest, PhotoKind, TripPhotos, UpdateBookingRequest,
            UpdateBookingStatusRequest, UploadTripPhotosRequest,
        },
        cars::{CarDetails, CarList, CarWithOwner, CreateCarRequest, NearbyCar, NearbyCarList, OwnerCarList, UpdateCarRequest},
        favorites::{FavoriteCarList, FavoriteToggled, ToggleFavoriteRequest},
        reviews::{CreateReviewRequest, EligibilityResponse, ReviewList, ReviewWithAuthor, ReviewWithCar, ReviewedCar, UserReviewList},
    },
    lifecycle::BookingStatus,
    models::{Booking, Car, ContactUser, Favorite, Profile, PublicUser, Review},
    response::{ApiResponse, Meta},
    routes::{auth, bookings, cars, favorites, health, owner, params, reviews},
};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        auth::register,
        auth::login,
        auth::me,
        auth::update_me,
        auth::submit_verification,
        auth::verification,
        cars::list_cars,
        cars::nearby_cars,
        cars::get_car,
        cars::car_reviews,
        cars::car_bookings,
        owner::add_car,
        owner::list_cars,
        owner::update_car,
        owner::delete_car,
        owner::list_bookings,
        owner::update_booking_status,
        bookings::create_booking,
        bookings::list_bookings,
        bookings::check_availability,
        bookings::get_booking,
        bookings::update_booking,
        bookings::upload_trip_photos,
        bookings::trip_photos,
        reviews::create_review,
        reviews::user_reviews,
        reviews::eligibility,
        favorites::toggle_favorite,
        favorites::list_favorites,
        favorites::check_favorite
    ),
    components(
        schemas(
            Profile,
            PublicUser,
            ContactUser,
            Car,
            Booking,
            BookingStatus,
            Review,
            Favorite,
            RegisterRequest,
            LoginRequest,
            AuthResponse,
            UpdateProfileRequest,
            VerificationRequest,
            VerificationStatus,
            CreateCarRequest,
            UpdateCarRequest,
            CarWithOwner,
            CarDetails,
            CarList,
            OwnerCarList,
            NearbyCar,
            NearbyCarList,
            CreateBookingRequest,
            UpdateBookingRequest,
            UpdateBookingStatusRequest,
            PhotoKind,
            BookingView,
            BookingList,
            BookingSlot,
            BookingSlotList,
            AvailabilityResponse,
            UploadTripPhotosRequest,
            TripPhotos,
            CreateReviewRequest,
            ReviewWithAuthor,
            ReviewList,
            ReviewedCar,
            ReviewWithCar,
            UserReviewList,
            EligibilityResponse,
            ToggleFavoriteRequest,
            FavoriteToggled,
            FavoriteCarList,
            params::Pagination,
            params::CarQuery,
            params::NearbyQuery,
            params::AvailabilityQuery,
            Meta,
            ApiResponse<Car>,
            ApiResponse<CarList>,
            ApiResponse<BookingView>,
            ApiResponse<BookingList>,
            ApiResponse<ReviewList>,
            ApiResponse<AvailabilityResponse>
        )
    ),
    security(
        ("bearer_auth" = [])
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Auth", description = "Authentication and profile endpoints"),
        (name = "Cars", description = "Public car browsing endpoints"),
        (name = "Owner", description = "Owner-side car and booking endpoints"),
        (name = "Bookings", description = "Renter-side booking endpoints"),
        (name = "Reviews", description = "Review endpoints"),
        (name = "Favorites", description = "Favorite endpoints"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}
