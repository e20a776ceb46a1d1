use carbnb_api::{
    db::{create_orm_conn, create_pool, run_migrations},
    dto::bookings::{CreateBookingRequest, UpdateBookingRequest, UpdateBookingStatusRequest},
    entity::{
        bookings::{ActiveModel as BookingActive, Entity as Bookings},
        cars::ActiveModel as CarActive,
        users::ActiveModel as UserActive,
    },
    error::AppError,
    lifecycle::{BookingStatus, StateModel},
    middleware::auth::AuthUser,
    services::booking_service,
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
async fn booking_flows() -> anyhow::Result<()> {
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

    lifecycle_and_conflict_flow(&database_url).await?;
    rejects_invalid_booking_windows(&database_url).await?;
    auto_complete_sweep_is_idempotent(&database_url).await?;
    Ok(())
}

// Two renters compete for the same window; the owner can approve only one,
// the loser's approval attempt conflicts, and contact details follow the
// booking status.
async fn lifecycle_and_conflict_flow(database_url: &str) -> anyhow::Result<()> {
    let state = setup_state(database_url).await?;

    let owner_id = create_user(&state, "owner@example.com", Some("+91 98765 00001")).await?;
    let renter_a = create_user(&state, "renter.a@example.com", Some("+91 98765 00002")).await?;
    let renter_b = create_user(&state, "renter.b@example.com", Some("+91 98765 00003")).await?;
    let car_id = create_car(&state, owner_id).await?;

    let auth_owner = AuthUser { user_id: owner_id };
    let auth_a = AuthUser { user_id: renter_a };
    let auth_b = AuthUser { user_id: renter_b };

    // Renter A requests 2099-06-01 -> 2099-06-05.
    let booking_a = booking_service::create_booking(
        &state,
        &auth_a,
        CreateBookingRequest {
            car_id,
            start_date: "2099-06-01".into(),
            end_date: "2099-06-05".into(),
        },
    )
    .await?
    .data
    .unwrap();
    assert_eq!(booking_a.booking.status, BookingStatus::Pending);
    // Four rental days at 2000.00.
    assert_eq!(booking_a.booking.total_price, dec("8000.00"));
    // Pending bookings share no phone numbers.
    assert_eq!(booking_a.owner.phone, None);
    assert_eq!(booking_a.renter.phone, None);

    // Renter B's overlapping request is allowed while both are pending.
    let booking_b = booking_service::create_booking(
        &state,
        &auth_b,
        CreateBookingRequest {
            car_id,
            start_date: "2099-06-03".into(),
            end_date: "2099-06-07".into(),
        },
    )
    .await?
    .data
    .unwrap();
    assert_eq!(booking_b.booking.status, BookingStatus::Pending);

    // Owner approves A.
    let approved = booking_service::update_status_by_owner(
        &state,
        &auth_owner,
        booking_a.booking.id,
        UpdateBookingStatusRequest {
            status: BookingStatus::Approved,
        },
    )
    .await?
    .data
    .unwrap();
    assert_eq!(approved.booking.status, BookingStatus::Approved);
    // Approval shares both phone numbers.
    assert_eq!(approved.renter.phone.as_deref(), Some("+91 98765 00002"));
    assert_eq!(approved.owner.phone.as_deref(), Some("+91 98765 00001"));

    // Approving B must now conflict, regardless of request order.
    let err = booking_service::update_status_by_owner(
        &state,
        &auth_owner,
        booking_b.booking.id,
        UpdateBookingStatusRequest {
            status: BookingStatus::Approved,
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)), "got {err:?}");

    // Creating a booking that merely touches the approved window conflicts too.
    let err = booking_service::create_booking(
        &state,
        &auth_b,
        CreateBookingRequest {
            car_id,
            start_date: "2099-06-05".into(),
            end_date: "2099-06-08".into(),
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)), "got {err:?}");

    // Availability mirrors the same predicate.
    let busy = booking_service::check_availability(&state, car_id, "2099-06-04", "2099-06-06")
        .await?
        .data
        .unwrap();
    assert!(!busy.available);
    let free = booking_service::check_availability(&state, car_id, "2099-07-01", "2099-07-03")
        .await?
        .data
        .unwrap();
    assert!(free.available);

    // Renter B cancels; a cancelled booking never exposes either phone.
    let cancelled = booking_service::update_booking(
        &state,
        &auth_b,
        booking_b.booking.id,
        UpdateBookingRequest {
            start_date: None,
            end_date: None,
            status: Some(BookingStatus::Cancelled),
        },
    )
    .await?
    .data
    .unwrap();
    assert_eq!(cancelled.booking.status, BookingStatus::Cancelled);
    assert_eq!(cancelled.owner.phone, None);
    assert_eq!(cancelled.renter.phone, None);

    let reread = booking_service::get_booking(&state, &auth_b, booking_b.booking.id)
        .await?
        .data
        .unwrap();
    assert_eq!(reread.owner.phone, None);
    assert_eq!(reread.renter.phone, None);

    // Cancelled is terminal: the owner cannot revive it.
    let err = booking_service::update_status_by_owner(
        &state,
        &auth_owner,
        booking_b.booking.id,
        UpdateBookingStatusRequest {
            status: BookingStatus::Approved,
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)), "got {err:?}");

    Ok(())
}

async fn rejects_invalid_booking_windows(database_url: &str) -> anyhow::Result<()> {
    let state = setup_state(database_url).await?;
    let owner_id = create_user(&state, "owner@example.com", Some("+91 98765 00001")).await?;
    let renter_id = create_user(&state, "renter@example.com", Some("+91 98765 00002")).await?;
    let car_id = create_car(&state, owner_id).await?;
    let auth = AuthUser { user_id: renter_id };

    for (start, end) in [
        ("2099-06-05", "2099-06-01"), // inverted
        ("2099-06-01", "2099-06-01"), // empty
        ("2001-01-01", "2099-06-01"), // starts in the past
        ("whenever", "2099-06-01"),   // unparseable
    ] {
        let err = booking_service::create_booking(
            &state,
            &auth,
            CreateBookingRequest {
                car_id,
                start_date: start.into(),
                end_date: end.into(),
            },
        )
        .await
        .unwrap_err();
        assert!(
            matches!(err, AppError::BadRequest(_)),
            "{start}..{end} should fail validation, got {err:?}"
        );
    }

    Ok(())
}

async fn auto_complete_sweep_is_idempotent(database_url: &str) -> anyhow::Result<()> {
    let state = setup_state(database_url).await?;
    let owner_id = create_user(&state, "owner@example.com", Some("+91 98765 00001")).await?;
    let renter_id = create_user(&state, "renter@example.com", Some("+91 98765 00002")).await?;
    let car_id = create_car(&state, owner_id).await?;

    // An active rental whose end date has already passed.
    let booking = BookingActive {
        id: Set(Uuid::new_v4()),
        user_id: Set(renter_id),
        car_id: Set(car_id),
        start_date: Set((Utc::now() - Duration::days(5)).into()),
        end_date: Set((Utc::now() - Duration::days(1)).into()),
        status: Set(BookingStatus::Active.to_string()),
        total_price: Set(dec("8000.00")),
        pre_trip_photos: Set(None),
        post_trip_photos: Set(None),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    let swept = booking_service::auto_complete_past_bookings(&state).await?;
    assert_eq!(swept, 1);

    let reloaded = Bookings::find_by_id(booking.id)
        .one(&state.orm)
        .await?
        .unwrap();
    assert_eq!(reloaded.status, BookingStatus::Completed.to_string());

    // A second sweep finds nothing left to flip.
    let swept_again = booking_service::auto_complete_past_bookings(&state).await?;
    assert_eq!(swept_again, 0);

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

async fn create_user(
    state: &AppState,
    email: &str,
    phone: Option<&str>,
) -> anyhow::Result<Uuid> {
    let user = UserActive {
        id: Set(Uuid::new_v4()),
        name: Set(email.split('@').next().unwrap_or("user").to_string()),
        email: Set(email.to_string()),
        password_hash: Set("dummy".into()),
        phone: Set(phone.map(|p| p.to_string())),
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

async fn create_car(state: &AppState, owner_id: Uuid) -> anyhow::Result<Uuid> {
    let car = CarActive {
        id: Set(Uuid::new_v4()),
        owner_id: Set(owner_id),
        brand: Set("Maruti".into()),
        model: Set("Swift".into()),
        engine: Set("1.2L petrol".into()),
        fuel_type: Set("petrol".into()),
        color: Set("red".into()),
        price_per_day: Set(dec("2000.00")),
        location: Set("Pune".into()),
        latitude: Set(Some(18.5204)),
        longitude: Set(Some(73.8567)),
        transmission: Set("manual".into()),
        seats: Set(5),
        image: Set(None),
        average_rating: Set(Decimal::ZERO),
        review_count: Set(0),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    Ok(car.id)
}

fn dec(s: &str) -> Decimal {
    s.parse().unwrap()
}
