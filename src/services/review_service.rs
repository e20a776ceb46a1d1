use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::ActiveValue::NotSet;
use sea_orm::sea_query::LockType;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, QueryFilter, QueryOrder, QuerySelect,
    Set, TransactionTrait,
};
use uuid::Uuid;

use crate::{
    audit::log_audit,
    dto::reviews::{
        CreateReviewRequest, EligibilityResponse, ReviewList, ReviewWithAuthor, ReviewWithCar,
        ReviewedCar, UserReviewList,
    },
    entity::{
        bookings::{Column as BookingCol, Entity as Bookings},
        cars::{ActiveModel as CarActive, Entity as Cars},
        reviews::{
            ActiveModel as ReviewActive, Column as ReviewCol, Entity as Reviews,
            Model as ReviewModel,
        },
        users::{Column as UserCol, Entity as Users, Model as UserModel},
    },
    error::{AppError, AppResult},
    lifecycle::BookingStatus,
    middleware::auth::AuthUser,
    models::{PublicUser, Review},
    response::{ApiResponse, Meta},
    state::AppState,
};

/// Create a review against a completed, unreviewed booking of the caller's,
/// and fold the rating into the car's cached aggregate in the same
/// transaction.
pub async fn create_review(
    state: &AppState,
    user: &AuthUser,
    payload: CreateReviewRequest,
) -> AppResult<ApiResponse<Review>> {
    if !(1..=5).contains(&payload.rating) {
        return Err(AppError::BadRequest("rating must be between 1 and 5".into()));
    }

    let txn = state.orm.begin().await?;

    let booking = Bookings::find()
        .filter(
            Condition::all()
                .add(BookingCol::Id.eq(payload.booking_id))
                .add(BookingCol::UserId.eq(user.user_id)),
        )
        .one(&txn)
        .await?
        .ok_or(AppError::NotFound)?;

    if booking.car_id != payload.car_id {
        return Err(AppError::BadRequest(
            "Booking does not reference this car".into(),
        ));
    }
    if booking.status != BookingStatus::Completed.to_string() {
        return Err(AppError::BadRequest(
            "Only completed bookings can be reviewed".into(),
        ));
    }

    let already_reviewed = Reviews::find()
        .filter(ReviewCol::BookingId.eq(booking.id))
        .one(&txn)
        .await?
        .is_some();
    if already_reviewed {
        return Err(AppError::Conflict(
            "Booking has already been reviewed".into(),
        ));
    }

    // Lock the car row so concurrent reviews cannot lose aggregate updates.
    let car = Cars::find_by_id(booking.car_id)
        .lock(LockType::Update)
        .one(&txn)
        .await?
        .ok_or(AppError::NotFound)?;

    let review = ReviewActive {
        id: Set(Uuid::new_v4()),
        user_id: Set(user.user_id),
        car_id: Set(car.id),
        booking_id: Set(booking.id),
        rating: Set(payload.rating),
        comment: Set(payload.comment),
        created_at: NotSet,
    }
    .insert(&txn)
    .await?;

    let new_average = next_average(car.average_rating, car.review_count, payload.rating);
    let new_count = car.review_count + 1;
    let mut car_active: CarActive = car.into();
    car_active.average_rating = Set(new_average);
    car_active.review_count = Set(new_count);
    car_active.updated_at = Set(Utc::now().into());
    car_active.update(&txn).await?;

    txn.commit().await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "review_create",
        Some("reviews"),
        Some(serde_json::json!({ "review_id": review.id, "car_id": review.car_id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Review created",
        review_from_entity(review),
        Some(Meta::empty()),
    ))
}

pub async fn list_car_reviews(
    state: &AppState,
    car_id: Uuid,
) -> AppResult<ApiResponse<ReviewList>> {
    Cars::find_by_id(car_id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    let rows = Reviews::find()
        .filter(ReviewCol::CarId.eq(car_id))
        .order_by_desc(ReviewCol::CreatedAt)
        .all(&state.orm)
        .await?;

    let author_ids: Vec<Uuid> = rows.iter().map(|r| r.user_id).collect();
    let authors = Users::find()
        .filter(UserCol::Id.is_in(author_ids))
        .all(&state.orm)
        .await?;

    let mut items = Vec::with_capacity(rows.len());
    for row in rows {
        let author = authors
            .iter()
            .find(|u| u.id == row.user_id)
            .ok_or_else(|| AppError::Internal(anyhow::anyhow!("review without author")))?;
        items.push(ReviewWithAuthor {
            review: review_from_entity(row),
            author: public_from_user(author),
        });
    }

    let total = items.len() as i64;
    Ok(ApiResponse::success(
        "Reviews",
        ReviewList { items },
        Some(Meta::new(1, total, total)),
    ))
}

pub async fn list_user_reviews(
    state: &AppState,
    user: &AuthUser,
) -> AppResult<ApiResponse<UserReviewList>> {
    let rows = Reviews::find()
        .find_also_related(Cars)
        .filter(ReviewCol::UserId.eq(user.user_id))
        .order_by_desc(ReviewCol::CreatedAt)
        .all(&state.orm)
        .await?;

    let mut items = Vec::with_capacity(rows.len());
    for (review, car) in rows {
        let car = car.ok_or_else(|| AppError::Internal(anyhow::anyhow!("review without car")))?;
        items.push(ReviewWithCar {
            review: review_from_entity(review),
            car: ReviewedCar {
                id: car.id,
                brand: car.brand,
                model: car.model,
                image: car.image,
            },
        });
    }

    let total = items.len() as i64;
    Ok(ApiResponse::success(
        "Your reviews",
        UserReviewList { items },
        Some(Meta::new(1, total, total)),
    ))
}

/// True when the booking belongs to the caller, is completed, and has no
/// review yet. A missing booking simply reads as not eligible.
pub async fn check_eligibility(
    state: &AppState,
    user: &AuthUser,
    booking_id: Uuid,
) -> AppResult<ApiResponse<EligibilityResponse>> {
    let booking = Bookings::find()
        .filter(
            Condition::all()
                .add(BookingCol::Id.eq(booking_id))
                .add(BookingCol::UserId.eq(user.user_id))
                .add(BookingCol::Status.eq(BookingStatus::Completed.to_string())),
        )
        .one(&state.orm)
        .await?;

    let eligible = match booking {
        Some(b) => Reviews::find()
            .filter(ReviewCol::BookingId.eq(b.id))
            .one(&state.orm)
            .await?
            .is_none(),
        None => false,
    };

    Ok(ApiResponse::success(
        "Review eligibility",
        EligibilityResponse { eligible },
        Some(Meta::empty()),
    ))
}

/// Running-average update, rounded to one decimal place.
fn next_average(current: Decimal, count: i32, rating: i32) -> Decimal {
    let total = current * Decimal::from(count) + Decimal::from(rating);
    (total / Decimal::from(count + 1)).round_dp(1)
}

fn review_from_entity(model: ReviewModel) -> Review {
    Review {
        id: model.id,
        user_id: model.user_id,
        car_id: model.car_id,
        booking_id: model.booking_id,
        rating: model.rating,
        comment: model.comment,
        created_at: model.created_at.with_timezone(&Utc),
    }
}

fn public_from_user(model: &UserModel) -> PublicUser {
    PublicUser {
        id: model.id,
        name: model.name.clone(),
        email: model.email.clone(),
        image: model.image.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[test]
    fn average_folds_in_new_rating() {
        // (4.0 * 2 + 5) / 3 = 4.333... -> 4.3
        assert_eq!(next_average(dec("4.0"), 2, 5), dec("4.3"));
    }

    #[test]
    fn first_review_sets_the_average() {
        assert_eq!(next_average(Decimal::ZERO, 0, 4), dec("4.0"));
    }

    #[test]
    fn average_rounds_half_up() {
        // (4.0 + 5.0) / 2 = 4.5 stays 4.5; (4.5 * 2 + 4) / 3 = 4.333 -> 4.3
        assert_eq!(next_average(dec("4.0"), 1, 5), dec("4.5"));
        assert_eq!(next_average(dec("4.5"), 2, 4), dec("4.3"));
    }
}
