use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::ActiveValue::NotSet;
use sea_orm::sea_query::{Expr, LockType};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, EntityTrait, QueryFilter,
    QueryOrder, QuerySelect, Set, TransactionTrait,
};
use uuid::Uuid;

use crate::{
    audit::log_audit,
    dto::bookings::{
        AvailabilityResponse, BookingList, BookingSlot, BookingSlotList, BookingView,
        CreateBookingRequest, PhotoKind, TripPhotos, UpdateBookingRequest,
        UpdateBookingStatusRequest, UploadTripPhotosRequest,
    },
    entity::{
        bookings::{
            ActiveModel as BookingActive, Column as BookingCol, Entity as Bookings,
            Model as BookingModel,
        },
        cars::{Column as CarCol, Entity as Cars, Model as CarModel},
        users::{Column as UserCol, Entity as Users, Model as UserModel},
    },
    error::{AppError, AppResult},
    lifecycle::{BookingStatus, StateModel},
    middleware::auth::AuthUser,
    models::{Booking, Car, ContactUser},
    response::{ApiResponse, Meta},
    state::AppState,
};

pub async fn create_booking(
    state: &AppState,
    user: &AuthUser,
    payload: CreateBookingRequest,
) -> AppResult<ApiResponse<BookingView>> {
    let (start, end) = parse_window(&payload.start_date, &payload.end_date)?;

    let renter = Users::find_by_id(user.user_id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;
    if renter.phone.is_none() {
        return Err(AppError::BadRequest(
            "Add a phone number to your profile before booking".into(),
        ));
    }

    let car = Cars::find_by_id(payload.car_id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    if find_overlapping_blocking(&state.orm, state.state_model, car.id, start, end, None)
        .await?
        .is_some()
    {
        return Err(AppError::Conflict(
            "Car is already booked for the requested dates".into(),
        ));
    }

    let booking = BookingActive {
        id: Set(Uuid::new_v4()),
        user_id: Set(user.user_id),
        car_id: Set(car.id),
        start_date: Set(start.into()),
        end_date: Set(end.into()),
        status: Set(BookingStatus::Pending.to_string()),
        total_price: Set(rental_price(car.price_per_day, start, end)),
        pre_trip_photos: Set(None),
        post_trip_photos: Set(None),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "booking_create",
        Some("bookings"),
        Some(serde_json::json!({ "booking_id": booking.id, "car_id": car.id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    let owner = Users::find_by_id(car.owner_id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    let view = build_view(state.state_model, booking, car, &owner, &renter)?;
    Ok(ApiResponse::success(
        "Booking requested",
        view,
        Some(Meta::empty()),
    ))
}

pub async fn list_bookings(
    state: &AppState,
    user: &AuthUser,
) -> AppResult<ApiResponse<BookingList>> {
    let renter = Users::find_by_id(user.user_id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    let rows = Bookings::find()
        .find_also_related(Cars)
        .filter(BookingCol::UserId.eq(user.user_id))
        .order_by_desc(BookingCol::CreatedAt)
        .all(&state.orm)
        .await?;

    let owner_ids: Vec<Uuid> = rows
        .iter()
        .filter_map(|(_, car)| car.as_ref().map(|c| c.owner_id))
        .collect();
    let owners = Users::find()
        .filter(UserCol::Id.is_in(owner_ids))
        .all(&state.orm)
        .await?;

    let mut items = Vec::with_capacity(rows.len());
    for (booking, car) in rows {
        let car = car.ok_or_else(|| AppError::Internal(anyhow::anyhow!("booking without car")))?;
        let owner = owners
            .iter()
            .find(|u| u.id == car.owner_id)
            .ok_or_else(|| AppError::Internal(anyhow::anyhow!("car without owner")))?;
        items.push(build_view(state.state_model, booking, car, owner, &renter)?);
    }

    let total = items.len() as i64;
    Ok(ApiResponse::success(
        "Bookings",
        BookingList { items },
        Some(Meta::new(1, total, total)),
    ))
}

pub async fn get_booking(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<BookingView>> {
    let booking = Bookings::find()
        .filter(
            Condition::all()
                .add(BookingCol::Id.eq(id))
                .add(BookingCol::UserId.eq(user.user_id)),
        )
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    let (car, owner, renter) = load_parties(&state.orm, &booking).await?;
    let view = build_view(state.state_model, booking, car, &owner, &renter)?;
    Ok(ApiResponse::success("Booking", view, Some(Meta::empty())))
}

/// Renter-side edits: date changes while the booking is still pending, and
/// cancellation. Everything else belongs to the owner path.
pub async fn update_booking(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateBookingRequest,
) -> AppResult<ApiResponse<BookingView>> {
    let model = state.state_model;
    let booking = Bookings::find()
        .filter(
            Condition::all()
                .add(BookingCol::Id.eq(id))
                .add(BookingCol::UserId.eq(user.user_id)),
        )
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;
    let current = parse_status(&booking.status)?;

    if let Some(requested) = payload.status {
        if requested != BookingStatus::Cancelled {
            return Err(AppError::BadRequest(
                "Renters may only cancel a booking".into(),
            ));
        }
        if !model.cancellable(current) {
            return Err(AppError::Conflict(format!(
                "Booking in status {current} can no longer be cancelled"
            )));
        }
    }

    let wants_date_change = payload.start_date.is_some() || payload.end_date.is_some();
    let mut active: BookingActive = booking.clone().into();

    if wants_date_change {
        if current != BookingStatus::Pending {
            return Err(AppError::Conflict(
                "Dates can only be changed while the booking is pending".into(),
            ));
        }
        let start_raw = payload
            .start_date
            .unwrap_or_else(|| booking.start_date.to_rfc3339());
        let end_raw = payload
            .end_date
            .unwrap_or_else(|| booking.end_date.to_rfc3339());
        let (start, end) = parse_window(&start_raw, &end_raw)?;

        if find_overlapping_blocking(&state.orm, model, booking.car_id, start, end, Some(id))
            .await?
            .is_some()
        {
            return Err(AppError::Conflict(
                "Car is already booked for the requested dates".into(),
            ));
        }

        let car = Cars::find_by_id(booking.car_id)
            .one(&state.orm)
            .await?
            .ok_or(AppError::NotFound)?;
        active.start_date = Set(start.into());
        active.end_date = Set(end.into());
        active.total_price = Set(rental_price(car.price_per_day, start, end));
    }

    if payload.status == Some(BookingStatus::Cancelled) {
        active.status = Set(BookingStatus::Cancelled.to_string());
    }
    active.updated_at = Set(Utc::now().into());
    let booking = active.update(&state.orm).await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "booking_update",
        Some("bookings"),
        Some(serde_json::json!({ "booking_id": booking.id, "status": booking.status })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    let (car, owner, renter) = load_parties(&state.orm, &booking).await?;
    let view = build_view(model, booking, car, &owner, &renter)?;
    Ok(ApiResponse::success(
        "Booking updated",
        view,
        Some(Meta::empty()),
    ))
}

/// Owner-side status transition. The car row is locked for the whole
/// decide-and-write sequence so two approvals for the same car cannot both
/// pass the overlap re-check.
pub async fn update_status_by_owner(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateBookingStatusRequest,
) -> AppResult<ApiResponse<BookingView>> {
    let model = state.state_model;
    let target = payload.status;
    if !model.statuses().contains(&target) {
        return Err(AppError::BadRequest("Invalid booking status".into()));
    }

    // Elapsed rentals complete lazily, right before owners touch a booking.
    auto_complete_past_bookings(state).await?;

    let txn = state.orm.begin().await?;

    let probe = Bookings::find_by_id(id)
        .one(&txn)
        .await?
        .ok_or(AppError::NotFound)?;

    let car = Cars::find_by_id(probe.car_id)
        .lock(LockType::Update)
        .one(&txn)
        .await?
        .ok_or(AppError::NotFound)?;
    if car.owner_id != user.user_id {
        return Err(AppError::NotFound);
    }

    // Re-read now that the car lock is held; a racing transition may have
    // committed while we waited.
    let booking = Bookings::find_by_id(id)
        .one(&txn)
        .await?
        .ok_or(AppError::NotFound)?;
    let current = parse_status(&booking.status)?;

    if !model.owner_can_transition(current, target) {
        return Err(AppError::BadRequest(format!(
            "Cannot transition booking from {current} to {target}"
        )));
    }

    if model.is_blocking(target) {
        let conflict = find_overlapping_blocking(
            &txn,
            model,
            booking.car_id,
            booking.start_date.with_timezone(&Utc),
            booking.end_date.with_timezone(&Utc),
            Some(booking.id),
        )
        .await?;
        if conflict.is_some() {
            return Err(AppError::Conflict(
                "Another booking already holds these dates".into(),
            ));
        }
    }

    let mut active: BookingActive = booking.into();
    active.status = Set(target.to_string());
    active.updated_at = Set(Utc::now().into());
    let booking = active.update(&txn).await?;

    txn.commit().await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "booking_status_update",
        Some("bookings"),
        Some(serde_json::json!({ "booking_id": booking.id, "status": booking.status })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    let (car, owner, renter) = load_parties(&state.orm, &booking).await?;
    let view = build_view(model, booking, car, &owner, &renter)?;
    Ok(ApiResponse::success(
        "Booking status updated",
        view,
        Some(Meta::empty()),
    ))
}

pub async fn list_owner_bookings(
    state: &AppState,
    user: &AuthUser,
) -> AppResult<ApiResponse<BookingList>> {
    let owner = Users::find_by_id(user.user_id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    let rows = Bookings::find()
        .find_also_related(Cars)
        .filter(CarCol::OwnerId.eq(user.user_id))
        .order_by_desc(BookingCol::CreatedAt)
        .all(&state.orm)
        .await?;

    let renter_ids: Vec<Uuid> = rows.iter().map(|(b, _)| b.user_id).collect();
    let renters = Users::find()
        .filter(UserCol::Id.is_in(renter_ids))
        .all(&state.orm)
        .await?;

    let mut items = Vec::with_capacity(rows.len());
    for (booking, car) in rows {
        let car = car.ok_or_else(|| AppError::Internal(anyhow::anyhow!("booking without car")))?;
        let renter = renters
            .iter()
            .find(|u| u.id == booking.user_id)
            .ok_or_else(|| AppError::Internal(anyhow::anyhow!("booking without renter")))?;
        items.push(build_view(state.state_model, booking, car, &owner, renter)?);
    }

    let total = items.len() as i64;
    Ok(ApiResponse::success(
        "Bookings",
        BookingList { items },
        Some(Meta::new(1, total, total)),
    ))
}

/// Pure read behind both booking creation and the public availability
/// endpoint: true iff no blocking booking overlaps the window.
pub async fn check_availability(
    state: &AppState,
    car_id: Uuid,
    start_raw: &str,
    end_raw: &str,
) -> AppResult<ApiResponse<AvailabilityResponse>> {
    let start = parse_when(start_raw)
        .ok_or_else(|| AppError::BadRequest("Invalid start date".into()))?;
    let end =
        parse_when(end_raw).ok_or_else(|| AppError::BadRequest("Invalid end date".into()))?;
    if end <= start {
        return Err(AppError::BadRequest(
            "End date must be after start date".into(),
        ));
    }

    Cars::find_by_id(car_id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    let conflict =
        find_overlapping_blocking(&state.orm, state.state_model, car_id, start, end, None).await?;
    Ok(ApiResponse::success(
        "Availability",
        AvailabilityResponse {
            available: conflict.is_none(),
        },
        Some(Meta::empty()),
    ))
}

/// Calendar view for a car's detail page: pending and blocking bookings,
/// dates and status only.
pub async fn list_car_bookings(
    state: &AppState,
    car_id: Uuid,
) -> AppResult<ApiResponse<BookingSlotList>> {
    Cars::find_by_id(car_id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    let mut visible: Vec<String> = vec![BookingStatus::Pending.to_string()];
    visible.extend(state.state_model.blocking().iter().map(|s| s.to_string()));

    let rows = Bookings::find()
        .filter(
            Condition::all()
                .add(BookingCol::CarId.eq(car_id))
                .add(BookingCol::Status.is_in(visible)),
        )
        .order_by_asc(BookingCol::StartDate)
        .all(&state.orm)
        .await?;

    let mut items = Vec::with_capacity(rows.len());
    for row in rows {
        items.push(BookingSlot {
            id: row.id,
            start_date: row.start_date.with_timezone(&Utc),
            end_date: row.end_date.with_timezone(&Utc),
            status: parse_status(&row.status)?,
        });
    }

    Ok(ApiResponse::success(
        "Car bookings",
        BookingSlotList { items },
        Some(Meta::empty()),
    ))
}

/// Flip in-progress bookings whose end date has passed to COMPLETED.
/// Idempotent; called lazily rather than from a scheduler.
pub async fn auto_complete_past_bookings(state: &AppState) -> AppResult<u64> {
    let in_progress = state.state_model.in_progress();
    let now = Utc::now();
    let result = Bookings::update_many()
        .col_expr(
            BookingCol::Status,
            Expr::value(BookingStatus::Completed.to_string()),
        )
        .col_expr(BookingCol::UpdatedAt, Expr::value(now))
        .filter(
            Condition::all()
                .add(BookingCol::Status.eq(in_progress.to_string()))
                .add(BookingCol::EndDate.lt(now)),
        )
        .exec(&state.orm)
        .await?;
    if result.rows_affected > 0 {
        tracing::info!(count = result.rows_affected, "auto-completed past bookings");
    }
    Ok(result.rows_affected)
}

pub async fn upload_trip_photos(
    state: &AppState,
    user: &AuthUser,
    booking_id: Uuid,
    payload: UploadTripPhotosRequest,
) -> AppResult<ApiResponse<TripPhotos>> {
    if payload.photos.is_empty() {
        return Err(AppError::BadRequest("photos must not be empty".into()));
    }
    let booking = find_party_booking(&state.orm, user, booking_id).await?;

    let photos = serde_json::json!(payload.photos);
    let mut active: BookingActive = booking.into();
    match payload.kind {
        PhotoKind::Pre => active.pre_trip_photos = Set(Some(photos)),
        PhotoKind::Post => active.post_trip_photos = Set(Some(photos)),
    }
    active.updated_at = Set(Utc::now().into());
    let booking = active.update(&state.orm).await?;

    Ok(ApiResponse::success(
        "Trip photos saved",
        trip_photos_from_model(&booking)?,
        Some(Meta::empty()),
    ))
}

pub async fn get_trip_photos(
    state: &AppState,
    user: &AuthUser,
    booking_id: Uuid,
) -> AppResult<ApiResponse<TripPhotos>> {
    let booking = find_party_booking(&state.orm, user, booking_id).await?;
    Ok(ApiResponse::success(
        "Trip photos",
        trip_photos_from_model(&booking)?,
        Some(Meta::empty()),
    ))
}

/// A booking visible to either of its parties: the renter, or the owner of
/// the booked car.
async fn find_party_booking<C: ConnectionTrait>(
    conn: &C,
    user: &AuthUser,
    booking_id: Uuid,
) -> AppResult<BookingModel> {
    let booking = Bookings::find_by_id(booking_id)
        .one(conn)
        .await?
        .ok_or(AppError::NotFound)?;
    if booking.user_id == user.user_id {
        return Ok(booking);
    }
    let car = Cars::find_by_id(booking.car_id)
        .one(conn)
        .await?
        .ok_or(AppError::NotFound)?;
    if car.owner_id != user.user_id {
        return Err(AppError::NotFound);
    }
    Ok(booking)
}

async fn find_overlapping_blocking<C: ConnectionTrait>(
    conn: &C,
    model: StateModel,
    car_id: Uuid,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    exclude: Option<Uuid>,
) -> AppResult<Option<BookingModel>> {
    let blocking: Vec<String> = model.blocking().iter().map(|s| s.to_string()).collect();
    // Inclusive comparison on both ends: touching endpoints conflict.
    let mut condition = Condition::all()
        .add(BookingCol::CarId.eq(car_id))
        .add(BookingCol::Status.is_in(blocking))
        .add(BookingCol::StartDate.lte(end))
        .add(BookingCol::EndDate.gte(start));
    if let Some(id) = exclude {
        condition = condition.add(BookingCol::Id.ne(id));
    }
    Ok(Bookings::find().filter(condition).one(conn).await?)
}

async fn load_parties<C: ConnectionTrait>(
    conn: &C,
    booking: &BookingModel,
) -> AppResult<(CarModel, UserModel, UserModel)> {
    let car = Cars::find_by_id(booking.car_id)
        .one(conn)
        .await?
        .ok_or(AppError::NotFound)?;
    let owner = Users::find_by_id(car.owner_id)
        .one(conn)
        .await?
        .ok_or(AppError::NotFound)?;
    let renter = Users::find_by_id(booking.user_id)
        .one(conn)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok((car, owner, renter))
}

/// Assemble the API view, redacting phones unless the status shares
/// contacts. The stored rows are never touched.
fn build_view(
    model: StateModel,
    booking: BookingModel,
    car: CarModel,
    owner: &UserModel,
    renter: &UserModel,
) -> AppResult<BookingView> {
    let booking = booking_from_entity(booking)?;
    let mut owner = contact_from_user(owner);
    let mut renter = contact_from_user(renter);
    if !model.shares_contact(booking.status) {
        owner.phone = None;
        renter.phone = None;
    }
    Ok(BookingView {
        booking,
        car: car_from_entity(car),
        owner,
        renter,
    })
}

fn parse_status(raw: &str) -> AppResult<BookingStatus> {
    raw.parse::<BookingStatus>()
        .map_err(|err| AppError::Internal(anyhow::anyhow!(err)))
}

fn parse_window(start_raw: &str, end_raw: &str) -> AppResult<(DateTime<Utc>, DateTime<Utc>)> {
    let start = parse_when(start_raw)
        .ok_or_else(|| AppError::BadRequest("Invalid start date".into()))?;
    let end =
        parse_when(end_raw).ok_or_else(|| AppError::BadRequest("Invalid end date".into()))?;
    if start.date_naive() < Utc::now().date_naive() {
        return Err(AppError::BadRequest(
            "Start date must not be in the past".into(),
        ));
    }
    if end <= start {
        return Err(AppError::BadRequest(
            "End date must be after start date".into(),
        ));
    }
    Ok((start, end))
}

/// Accept RFC 3339 timestamps or bare dates (midnight UTC).
fn parse_when(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

/// Charge per started day, minimum one.
fn rental_price(price_per_day: Decimal, start: DateTime<Utc>, end: DateTime<Utc>) -> Decimal {
    let secs = (end - start).num_seconds();
    let days = ((secs + 86_399) / 86_400).max(1);
    price_per_day * Decimal::from(days)
}

fn trip_photos_from_model(booking: &BookingModel) -> AppResult<TripPhotos> {
    let decode = |value: &Option<serde_json::Value>| -> AppResult<Vec<String>> {
        match value {
            Some(v) => serde_json::from_value(v.clone())
                .map_err(|err| AppError::Internal(anyhow::anyhow!(err))),
            None => Ok(Vec::new()),
        }
    };
    Ok(TripPhotos {
        pre_trip_photos: decode(&booking.pre_trip_photos)?,
        post_trip_photos: decode(&booking.post_trip_photos)?,
    })
}

fn booking_from_entity(model: BookingModel) -> AppResult<Booking> {
    Ok(Booking {
        id: model.id,
        user_id: model.user_id,
        car_id: model.car_id,
        start_date: model.start_date.with_timezone(&Utc),
        end_date: model.end_date.with_timezone(&Utc),
        status: parse_status(&model.status)?,
        total_price: model.total_price,
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    })
}

fn contact_from_user(model: &UserModel) -> ContactUser {
    ContactUser {
        id: model.id,
        name: model.name.clone(),
        email: model.email.clone(),
        phone: model.phone.clone(),
        image: model.image.clone(),
    }
}

fn car_from_entity(model: CarModel) -> Car {
    Car {
        id: model.id,
        owner_id: model.owner_id,
        brand: model.brand,
        model: model.model,
        engine: model.engine,
        fuel_type: model.fuel_type,
        color: model.color,
        price_per_day: model.price_per_day,
        location: model.location,
        latitude: model.latitude,
        longitude: model.longitude,
        transmission: model.transmission,
        seats: model.seats,
        image: model.image,
        average_rating: model.average_rating,
        review_count: model.review_count,
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[test]
    fn rental_price_charges_per_started_day() {
        let start = "2024-06-01T00:00:00Z".parse::<DateTime<Utc>>().unwrap();
        let four_days = "2024-06-05T00:00:00Z".parse::<DateTime<Utc>>().unwrap();
        assert_eq!(rental_price(dec("100.00"), start, four_days), dec("400.00"));

        // A partial day still bills as a full one.
        let half_day = "2024-06-01T12:00:00Z".parse::<DateTime<Utc>>().unwrap();
        assert_eq!(rental_price(dec("100.00"), start, half_day), dec("100.00"));
        let four_and_a_bit = "2024-06-05T01:00:00Z".parse::<DateTime<Utc>>().unwrap();
        assert_eq!(
            rental_price(dec("100.00"), start, four_and_a_bit),
            dec("500.00")
        );
    }

    #[test]
    fn parse_when_accepts_dates_and_timestamps() {
        assert_eq!(
            parse_when("2024-06-01").unwrap(),
            "2024-06-01T00:00:00Z".parse::<DateTime<Utc>>().unwrap()
        );
        assert!(parse_when("2024-06-01T10:30:00+02:00").is_some());
        assert!(parse_when("June 1st").is_none());
        assert!(parse_when("").is_none());
    }

    #[test]
    fn parse_window_rejects_inverted_and_past_windows() {
        assert!(matches!(
            parse_window("2024-06-05", "2024-06-01"),
            Err(AppError::BadRequest(_))
        ));
        assert!(matches!(
            parse_window("2024-06-01", "2024-06-01"),
            Err(AppError::BadRequest(_))
        ));
        assert!(matches!(
            parse_window("not-a-date", "2999-01-02"),
            Err(AppError::BadRequest(_))
        ));

        let far_future_start = "2999-01-01";
        let far_future_end = "2999-01-05";
        assert!(parse_window(far_future_start, far_future_end).is_ok());
    }
}
