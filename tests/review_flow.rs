use carbnb_api::{
    db::{create_orm_conn, create_pool, run_migrations},
    dto::reviews::CreateReviewRequest,
    entity::{
        bookings::ActiveModel as BookingActive,
        cars::{ActiveModel as CarActive, Entity as Cars},
        users::ActiveModel as UserActive,
    },
    error::AppError,
    lifecycle::{BookingStatus, StateModel},
    middleware::auth::AuthUser,
    services::review_service,
    state::AppState,
};
use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use sea_orm::ActiveValue::NotSet;
use sea_orm::{ActiveModelTrait, ConnectionTrait, EntityTrait, Set, Statement};
use uuid::Uuid;

// The scenarios share one database, so they run sequentially from a single
// test entry point, each against freshly truncated tables.
#[tokio::test]
async fn review_flows() -> anyhow::Result<()> {
    // Allow skipping when no DB is configured in the environment.
    let database_url = match std::env::var("TEST_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
    {
        Ok(url) => url,
        Err(_) => {
            eprintln!(
                "Skipping test: set TEST_DATABASE_URL or DATABASE_URL to run integration flow tests."
            );
            return Ok(());
        }
    };

    review_updates_car_aggregate(&database_url).await?;
    rejects_ineligible_reviews(&database_url).await?;
    Ok(())
}

// Reviewing a completed booking folds the rating into the car's cached
// aggregate exactly once.
async fn review_updates_car_aggregate(database_url: &str) -> anyhow::Result<()> {
    let state = setup_state(database_url).await?;

    let owner_id = create_user(&state, "owner@example.com").await?;
    let renter_id = create_user(&state, "renter@example.com").await?;
    // Car that already carries two reviews averaging 4.0.
    let car_id = create_car(&state, owner_id, dec("4.0"), 2).await?;

    let completed = create_booking(&state, renter_id, car_id, BookingStatus::Completed).await?;
    let auth_renter = AuthUser { user_id: renter_id };

    let eligible = review_service::check_eligibility(&state, &auth_renter, completed)
        .await?
        .data
        .unwrap();
    assert!(eligible.eligible);

    let review = review_service::create_review(
        &state,
        &auth_renter,
        CreateReviewRequest {
            car_id,
            booking_id: completed,
            rating: 5,
            comment: "Clean car, smooth pickup".into(),
        },
    )
    .await?
    .data
    .unwrap();
    assert_eq!(review.rating, 5);

    // (4.0 * 2 + 5) / 3 = 4.3 after rounding to one decimal.
    let car = Cars::find_by_id(car_id).one(&state.orm).await?.unwrap();
    assert_eq!(car.average_rating, dec("4.3"));
    assert_eq!(car.review_count, 3);

    // The booking is spent now.
    let eligible = review_service::check_eligibility(&state, &auth_renter, completed)
        .await?
        .data
        .unwrap();
    assert!(!eligible.eligible);

    let err = review_service::create_review(
        &state,
        &auth_renter,
        CreateReviewRequest {
            car_id,
            booking_id: completed,
            rating: 4,
            comment: "Trying again".into(),
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)), "got {err:?}");

    Ok(())
}

async fn rejects_ineligible_reviews(database_url: &str) -> anyhow::Result<()> {
    let state = setup_state(database_url).await?;

    let owner_id = create_user(&state, "owner@example.com").await?;
    let renter_id = create_user(&state, "renter@example.com").await?;
    let stranger_id = create_user(&state, "stranger@example.com").await?;
    let car_id = create_car(&state, owner_id, Decimal::ZERO, 0).await?;
    let other_car_id = create_car(&state, owner_id, Decimal::ZERO, 0).await?;

    let pending = create_booking(&state, renter_id, car_id, BookingStatus::Pending).await?;
    let completed = create_booking(&state, renter_id, car_id, BookingStatus::Completed).await?;
    let auth_renter = AuthUser { user_id: renter_id };
    let auth_stranger = AuthUser {
        user_id: stranger_id,
    };

    // Out-of-range rating.
    let err = review_service::create_review(
        &state,
        &auth_renter,
        CreateReviewRequest {
            car_id,
            booking_id: completed,
            rating: 6,
            comment: "too good".into(),
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)), "got {err:?}");

    // Booking not completed yet.
    let err = review_service::create_review(
        &state,
        &auth_renter,
        CreateReviewRequest {
            car_id,
            booking_id: pending,
            rating: 4,
            comment: "premature".into(),
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)), "got {err:?}");

    // Booking references a different car.
    let err = review_service::create_review(
        &state,
        &auth_renter,
        CreateReviewRequest {
            car_id: other_car_id,
            booking_id: completed,
            rating: 4,
            comment: "wrong car".into(),
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)), "got {err:?}");

    // Someone else's booking reads as not found.
    let err = review_service::create_review(
        &state,
        &auth_stranger,
        CreateReviewRequest {
            car_id,
            booking_id: completed,
            rating: 4,
            comment: "not mine".into(),
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::NotFound), "got {err:?}");

    // Eligibility mirrors the same rules.
    let eligible = review_service::check_eligibility(&state, &auth_renter, pending)
        .await?
        .data
        .unwrap();
    assert!(!eligible.eligible);
    let eligible = review_service::check_eligibility(&state, &auth_stranger, completed)
        .await?
        .data
        .unwrap();
    assert!(!eligible.eligible);

    Ok(())
}

async fn setup_state(database_url: &str) -> anyhow::Result<AppState> {
    let orm = create_orm_conn(database_url).await?;
    run_migrations(&orm).await?;
    let pool = create_pool(database_url).await?;

    // Clean tables between runs
    let backend = orm.get_database_backend();
    orm.execute(Statement::from_string(
        backend,
        "TRUNCATE TABLE reviews, bookings, favorites, audit_logs, cars, users RESTART IDENTITY CASCADE",
    ))
    .await?;

    Ok(AppState {
        pool,
        orm,
        state_model: StateModel::FiveState,
    })
}

async fn create_user(state: &AppState, email: &str) -> anyhow::Result<Uuid> {
    let user = UserActive {
        id: Set(Uuid::new_v4()),
        name: Set(email.split('@').next().unwrap_or("user").to_string()),
        email: Set(email.to_string()),
        password_hash: Set("dummy".into()),
        phone: Set(Some("+91 98765 00000".into())),
        image: Set(None),
        id_document_number: Set(None),
        driving_license_number: Set(None),
        is_verified: Set(false),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    Ok(user.id)
}

async fn create_car(
    state: &AppState,
    owner_id: Uuid,
    average_rating: Decimal,
    review_count: i32,
) -> anyhow::Result<Uuid> {
    let car = CarActive {
        id: Set(Uuid::new_v4()),
        owner_id: Set(owner_id),
        brand: Set("Hyundai".into()),
        model: Set("Creta".into()),
        engine: Set("1.5L diesel".into()),
        fuel_type: Set("diesel".into()),
        color: Set("white".into()),
        price_per_day: Set(dec("3200.00")),
        location: Set("Mumbai".into()),
        latitude: Set(None),
        longitude: Set(None),
        transmission: Set("automatic".into()),
        seats: Set(5),
        image: Set(None),
        average_rating: Set(average_rating),
        review_count: Set(review_count),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    Ok(car.id)
}

async fn create_booking(
    state: &AppState,
    renter_id: Uuid,
    car_id: Uuid,
    status: BookingStatus,
) -> anyhow::Result<Uuid> {
    let booking = BookingActive {
        id: Set(Uuid::new_v4()),
        user_id: Set(renter_id),
        car_id: Set(car_id),
        start_date: Set((Utc::now() - Duration::days(10)).into()),
        end_date: Set((Utc::now() - Duration::days(6)).into()),
        status: Set(status.to_string()),
        total_price: Set(dec("12800.00")),
        pre_trip_photos: Set(None),
        post_trip_photos: Set(None),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    Ok(booking.id)
}

fn dec(s: &str) -> Decimal {
    s.parse().unwrap()
}
