use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Booking status labels as stored in the database.
///
/// The canonical machine is five states:
/// PENDING -> APPROVED -> ACTIVE -> COMPLETED, with PENDING/APPROVED also
/// cancellable. The legacy four-state machine collapses APPROVED/ACTIVE into
/// CONFIRMED; which labels are legal is decided by [`StateModel`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    Pending,
    Approved,
    Active,
    Confirmed,
    Completed,
    Cancelled,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "PENDING",
            BookingStatus::Approved => "APPROVED",
            BookingStatus::Active => "ACTIVE",
            BookingStatus::Confirmed => "CONFIRMED",
            BookingStatus::Completed => "COMPLETED",
            BookingStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, BookingStatus::Completed | BookingStatus::Cancelled)
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BookingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(BookingStatus::Pending),
            "APPROVED" => Ok(BookingStatus::Approved),
            "ACTIVE" => Ok(BookingStatus::Active),
            "CONFIRMED" => Ok(BookingStatus::Confirmed),
            "COMPLETED" => Ok(BookingStatus::Completed),
            "CANCELLED" => Ok(BookingStatus::Cancelled),
            other => Err(format!("unknown booking status: {other}")),
        }
    }
}

/// Which booking state machine the deployment runs.
///
/// `FiveState` is canonical. `FourState` keeps older deployments working and
/// is deprecated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateModel {
    FiveState,
    FourState,
}

impl StateModel {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "five_state" => Some(StateModel::FiveState),
            "four_state" => Some(StateModel::FourState),
            _ => None,
        }
    }

    /// Statuses a booking may carry under this model.
    pub fn statuses(&self) -> &'static [BookingStatus] {
        match self {
            StateModel::FiveState => &[
                BookingStatus::Pending,
                BookingStatus::Approved,
                BookingStatus::Active,
                BookingStatus::Completed,
                BookingStatus::Cancelled,
            ],
            StateModel::FourState => &[
                BookingStatus::Pending,
                BookingStatus::Confirmed,
                BookingStatus::Completed,
                BookingStatus::Cancelled,
            ],
        }
    }

    /// Statuses that reserve the car's calendar. PENDING never blocks:
    /// competing requests stay open until the owner picks one.
    pub fn blocking(&self) -> &'static [BookingStatus] {
        match self {
            StateModel::FiveState => &[BookingStatus::Approved, BookingStatus::Active],
            StateModel::FourState => &[BookingStatus::Confirmed],
        }
    }

    pub fn is_blocking(&self, status: BookingStatus) -> bool {
        self.blocking().contains(&status)
    }

    /// The in-progress status swept to COMPLETED once its end date passes.
    pub fn in_progress(&self) -> BookingStatus {
        match self {
            StateModel::FiveState => BookingStatus::Active,
            StateModel::FourState => BookingStatus::Confirmed,
        }
    }

    /// Whether either party's phone number is visible on a booking in this
    /// status. CANCELLED never shares contacts.
    pub fn shares_contact(&self, status: BookingStatus) -> bool {
        match self {
            StateModel::FiveState => matches!(
                status,
                BookingStatus::Approved | BookingStatus::Active | BookingStatus::Completed
            ),
            StateModel::FourState => status == BookingStatus::Confirmed,
        }
    }

    /// Owner-initiated transitions: forward along the machine, or cancel
    /// while the booking has not started.
    pub fn owner_can_transition(&self, from: BookingStatus, to: BookingStatus) -> bool {
        if to == BookingStatus::Cancelled {
            return self.cancellable(from);
        }
        match self {
            StateModel::FiveState => matches!(
                (from, to),
                (BookingStatus::Pending, BookingStatus::Approved)
                    | (BookingStatus::Approved, BookingStatus::Active)
                    | (BookingStatus::Active, BookingStatus::Completed)
            ),
            StateModel::FourState => matches!(
                (from, to),
                (BookingStatus::Pending, BookingStatus::Confirmed)
                    | (BookingStatus::Confirmed, BookingStatus::Completed)
            ),
        }
    }

    /// Renters may only cancel, and only before the rental starts.
    pub fn cancellable(&self, from: BookingStatus) -> bool {
        match self {
            StateModel::FiveState => {
                matches!(from, BookingStatus::Pending | BookingStatus::Approved)
            }
            StateModel::FourState => {
                matches!(from, BookingStatus::Pending | BookingStatus::Confirmed)
            }
        }
    }
}

/// Inclusive interval overlap: two booking windows conflict when they share
/// at least one instant, touching endpoints included.
pub fn overlaps(
    a_start: DateTime<Utc>,
    a_end: DateTime<Utc>,
    b_start: DateTime<Utc>,
    b_end: DateTime<Utc>,
) -> bool {
    a_start <= b_end && a_end >= b_start
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn day(d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, d, 0, 0, 0).unwrap()
    }

    #[test]
    fn five_state_happy_path() {
        let m = StateModel::FiveState;
        assert!(m.owner_can_transition(BookingStatus::Pending, BookingStatus::Approved));
        assert!(m.owner_can_transition(BookingStatus::Approved, BookingStatus::Active));
        assert!(m.owner_can_transition(BookingStatus::Active, BookingStatus::Completed));
        assert!(!m.owner_can_transition(BookingStatus::Pending, BookingStatus::Active));
        assert!(!m.owner_can_transition(BookingStatus::Completed, BookingStatus::Active));
    }

    #[test]
    fn cancellation_only_before_rental_starts() {
        let m = StateModel::FiveState;
        assert!(m.cancellable(BookingStatus::Pending));
        assert!(m.cancellable(BookingStatus::Approved));
        assert!(!m.cancellable(BookingStatus::Active));
        assert!(!m.cancellable(BookingStatus::Completed));
        assert!(!m.cancellable(BookingStatus::Cancelled));
    }

    #[test]
    fn cancelled_is_terminal() {
        let m = StateModel::FiveState;
        for to in [
            BookingStatus::Pending,
            BookingStatus::Approved,
            BookingStatus::Active,
            BookingStatus::Completed,
        ] {
            assert!(!m.owner_can_transition(BookingStatus::Cancelled, to));
        }
    }

    #[test]
    fn four_state_uses_confirmed() {
        let m = StateModel::FourState;
        assert!(m.owner_can_transition(BookingStatus::Pending, BookingStatus::Confirmed));
        assert!(m.owner_can_transition(BookingStatus::Confirmed, BookingStatus::Completed));
        assert!(!m.owner_can_transition(BookingStatus::Pending, BookingStatus::Approved));
        assert!(m.is_blocking(BookingStatus::Confirmed));
        assert!(!m.is_blocking(BookingStatus::Approved));
    }

    #[test]
    fn pending_never_blocks() {
        assert!(!StateModel::FiveState.is_blocking(BookingStatus::Pending));
        assert!(!StateModel::FourState.is_blocking(BookingStatus::Pending));
    }

    #[test]
    fn contact_sharing_follows_status() {
        let m = StateModel::FiveState;
        assert!(!m.shares_contact(BookingStatus::Pending));
        assert!(m.shares_contact(BookingStatus::Approved));
        assert!(m.shares_contact(BookingStatus::Active));
        assert!(m.shares_contact(BookingStatus::Completed));
        assert!(!m.shares_contact(BookingStatus::Cancelled));

        let legacy = StateModel::FourState;
        assert!(legacy.shares_contact(BookingStatus::Confirmed));
        assert!(!legacy.shares_contact(BookingStatus::Completed));
        assert!(!legacy.shares_contact(BookingStatus::Cancelled));
    }

    #[test]
    fn status_round_trips_through_strings() {
        for s in StateModel::FiveState.statuses() {
            assert_eq!(*s, s.as_str().parse::<BookingStatus>().unwrap());
        }
        assert!("CONFIRMED".parse::<BookingStatus>().is_ok());
        assert!("SHIPPED".parse::<BookingStatus>().is_err());
    }

    #[test]
    fn touching_endpoints_count_as_overlap() {
        // [1,5] vs [5,9]: shared boundary instant conflicts.
        assert!(overlaps(day(1), day(5), day(5), day(9)));
        assert!(overlaps(day(5), day(9), day(1), day(5)));
        // [1,4] vs [5,9]: disjoint.
        assert!(!overlaps(day(1), day(4), day(5), day(9)));
        // containment
        assert!(overlaps(day(1), day(9), day(3), day(4)));
    }

    #[test]
    fn overlap_matches_shared_instant_oracle() {
        // Sweep random day-granularity interval pairs and compare against a
        // naive "do they share a day" check.
        let mut seed: u64 = 0x9e37_79b9_7f4a_7c15;
        let mut next = || {
            seed ^= seed << 13;
            seed ^= seed >> 7;
            seed ^= seed << 17;
            (seed % 28) as u32 + 1
        };

        for _ in 0..500 {
            let (mut a1, mut a2, mut b1, mut b2) = (next(), next(), next(), next());
            if a1 > a2 {
                std::mem::swap(&mut a1, &mut a2);
            }
            if b1 > b2 {
                std::mem::swap(&mut b1, &mut b2);
            }
            let expected = (a1..=a2).any(|d| (b1..=b2).contains(&d));
            assert_eq!(
                overlaps(day(a1), day(a2), day(b1), day(b2)),
                expected,
                "[{a1},{a2}] vs [{b1},{b2}]"
            );
        }
    }
}
