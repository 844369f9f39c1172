//! Tours, stays, and bookings.
//!
//! Seat and room accounting happens on the caller's transaction:
//! tours use a conditional decrement of `seats_available`, stays lock the
//! stay row and sum the rooms held by overlapping bookings.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};

use kharnak_core::{BookingId, BookingKind, BookingStatus, StayId, TourId, UserId};

use super::{RepositoryError, parse_column};
use crate::models::booking::StayDates;
use crate::models::{Booking, Stay, StayInput, Tour, TourInput};

// =============================================================================
// Tours
// =============================================================================

const TOUR_COLUMNS: &str = "id, title, description, location, start_date, end_date, \
                            price_per_person, total_seats, seats_available, images, created_at";

#[derive(Debug, sqlx::FromRow)]
struct TourRow {
    id: i32,
    title: String,
    description: String,
    location: String,
    start_date: NaiveDate,
    end_date: NaiveDate,
    price_per_person: Decimal,
    total_seats: i32,
    seats_available: i32,
    images: Vec<String>,
    created_at: DateTime<Utc>,
}

impl From<TourRow> for Tour {
    fn from(row: TourRow) -> Self {
        Self {
            id: TourId::new(row.id),
            title: row.title,
            description: row.description,
            location: row.location,
            start_date: row.start_date,
            end_date: row.end_date,
            price_per_person: row.price_per_person,
            total_seats: row.total_seats,
            seats_available: row.seats_available,
            images: row.images,
            created_at: row.created_at,
        }
    }
}

/// Repository for tours.
pub struct TourRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> TourRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// All tours by start date.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_all(&self) -> Result<Vec<Tour>, RepositoryError> {
        let rows = sqlx::query_as::<_, TourRow>(&format!(
            "SELECT {TOUR_COLUMNS} FROM kharnak.tour ORDER BY start_date, id"
        ))
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Get a tour by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_id(&self, id: TourId) -> Result<Option<Tour>, RepositoryError> {
        let row = sqlx::query_as::<_, TourRow>(&format!(
            "SELECT {TOUR_COLUMNS} FROM kharnak.tour WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    /// Insert a tour with every seat available.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the same title already starts
    /// on that date.
    pub async fn create(&self, input: &TourInput) -> Result<Tour, RepositoryError> {
        let row = sqlx::query_as::<_, TourRow>(&format!(
            r"
            INSERT INTO kharnak.tour
                (title, description, location, start_date, end_date, price_per_person,
                 total_seats, seats_available, images)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $7, $8)
            RETURNING {TOUR_COLUMNS}
            "
        ))
        .bind(&input.title)
        .bind(&input.description)
        .bind(&input.location)
        .bind(input.start_date)
        .bind(input.end_date)
        .bind(input.price_per_person)
        .bind(input.total_seats)
        .bind(&input.images)
        .fetch_one(self.pool)
        .await
        .map_err(|e| RepositoryError::from_unique(e, "tour"))?;

        Ok(row.into())
    }

    /// Replace a tour's fields.
    ///
    /// Changing `total_seats` shifts `seats_available` by the same amount;
    /// the update is refused if that would leave fewer seats than are
    /// already booked.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the tour doesn't exist.
    /// Returns `RepositoryError::Conflict` if booked seats exceed the new total.
    pub async fn update(&self, id: TourId, input: &TourInput) -> Result<Tour, RepositoryError> {
        let row = sqlx::query_as::<_, TourRow>(&format!(
            r"
            UPDATE kharnak.tour
            SET title = $2, description = $3, location = $4, start_date = $5, end_date = $6,
                price_per_person = $7, images = $9,
                seats_available = seats_available + ($8 - total_seats),
                total_seats = $8
            WHERE id = $1 AND seats_available + ($8 - total_seats) >= 0
            RETURNING {TOUR_COLUMNS}
            "
        ))
        .bind(id)
        .bind(&input.title)
        .bind(&input.description)
        .bind(&input.location)
        .bind(input.start_date)
        .bind(input.end_date)
        .bind(input.price_per_person)
        .bind(input.total_seats)
        .bind(&input.images)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| RepositoryError::from_unique(e, "tour"))?;

        match row {
            Some(row) => Ok(row.into()),
            None if self.get_by_id(id).await?.is_some() => Err(RepositoryError::Conflict(
                "more seats are booked than the new total".to_owned(),
            )),
            None => Err(RepositoryError::NotFound),
        }
    }

    /// Insert or refresh a tour keyed by title and start date. Used by seeding.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn upsert(&self, input: &TourInput) -> Result<Tour, RepositoryError> {
        let row = sqlx::query_as::<_, TourRow>(&format!(
            r"
            INSERT INTO kharnak.tour
                (title, description, location, start_date, end_date, price_per_person,
                 total_seats, seats_available, images)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $7, $8)
            ON CONFLICT (title, start_date) DO UPDATE
            SET description = EXCLUDED.description, location = EXCLUDED.location,
                end_date = EXCLUDED.end_date, price_per_person = EXCLUDED.price_per_person,
                images = EXCLUDED.images
            RETURNING {TOUR_COLUMNS}
            "
        ))
        .bind(&input.title)
        .bind(&input.description)
        .bind(&input.location)
        .bind(input.start_date)
        .bind(input.end_date)
        .bind(input.price_per_person)
        .bind(input.total_seats)
        .bind(&input.images)
        .fetch_one(self.pool)
        .await?;

        Ok(row.into())
    }

    /// Delete a tour. Existing bookings keep their record without the link.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the tour doesn't exist.
    pub async fn delete(&self, id: TourId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM kharnak.tour WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}

/// Take `guests` seats if that many are still free.
///
/// Returns the updated tour, or `None` when too few seats remain.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn reserve_seats(
    conn: &mut PgConnection,
    id: TourId,
    guests: i32,
) -> Result<Option<Tour>, RepositoryError> {
    let row = sqlx::query_as::<_, TourRow>(&format!(
        r"
        UPDATE kharnak.tour SET seats_available = seats_available - $2
        WHERE id = $1 AND seats_available >= $2
        RETURNING {TOUR_COLUMNS}
        "
    ))
    .bind(id)
    .bind(guests)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(row.map(Into::into))
}

/// Give `guests` seats back, never above the tour's total.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn release_seats(
    conn: &mut PgConnection,
    id: TourId,
    guests: i32,
) -> Result<(), RepositoryError> {
    sqlx::query(
        r"
        UPDATE kharnak.tour SET seats_available = LEAST(total_seats, seats_available + $2)
        WHERE id = $1
        ",
    )
    .bind(id)
    .bind(guests)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

// =============================================================================
// Stays
// =============================================================================

const STAY_COLUMNS: &str = "id, name, location, description, price_per_night, rooms, \
                            max_guests_per_room, images, created_at";

#[derive(Debug, sqlx::FromRow)]
struct StayRow {
    id: i32,
    name: String,
    location: String,
    description: String,
    price_per_night: Decimal,
    rooms: i32,
    max_guests_per_room: i32,
    images: Vec<String>,
    created_at: DateTime<Utc>,
}

impl From<StayRow> for Stay {
    fn from(row: StayRow) -> Self {
        Self {
            id: StayId::new(row.id),
            name: row.name,
            location: row.location,
            description: row.description,
            price_per_night: row.price_per_night,
            rooms: row.rooms,
            max_guests_per_room: row.max_guests_per_room,
            images: row.images,
            created_at: row.created_at,
        }
    }
}

/// Repository for homestays.
pub struct StayRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> StayRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// All stays by name.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_all(&self) -> Result<Vec<Stay>, RepositoryError> {
        let rows = sqlx::query_as::<_, StayRow>(&format!(
            "SELECT {STAY_COLUMNS} FROM kharnak.stay ORDER BY name"
        ))
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Get a stay by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_id(&self, id: StayId) -> Result<Option<Stay>, RepositoryError> {
        let row = sqlx::query_as::<_, StayRow>(&format!(
            "SELECT {STAY_COLUMNS} FROM kharnak.stay WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    /// Insert a stay.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if a stay with this name exists.
    pub async fn create(&self, input: &StayInput) -> Result<Stay, RepositoryError> {
        self.insert(input, false).await
    }

    /// Insert or refresh a stay keyed by name. Used by seeding.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn upsert(&self, input: &StayInput) -> Result<Stay, RepositoryError> {
        self.insert(input, true).await
    }

    async fn insert(&self, input: &StayInput, upsert: bool) -> Result<Stay, RepositoryError> {
        let on_conflict = if upsert {
            r"ON CONFLICT (name) DO UPDATE
              SET location = EXCLUDED.location, description = EXCLUDED.description,
                  price_per_night = EXCLUDED.price_per_night, rooms = EXCLUDED.rooms,
                  max_guests_per_room = EXCLUDED.max_guests_per_room, images = EXCLUDED.images"
        } else {
            ""
        };

        let row = sqlx::query_as::<_, StayRow>(&format!(
            r"
            INSERT INTO kharnak.stay
                (name, location, description, price_per_night, rooms, max_guests_per_room, images)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            {on_conflict}
            RETURNING {STAY_COLUMNS}
            "
        ))
        .bind(&input.name)
        .bind(&input.location)
        .bind(&input.description)
        .bind(input.price_per_night)
        .bind(input.rooms)
        .bind(input.max_guests_per_room)
        .bind(&input.images)
        .fetch_one(self.pool)
        .await
        .map_err(|e| RepositoryError::from_unique(e, "stay"))?;

        Ok(row.into())
    }

    /// Delete a stay.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the stay doesn't exist.
    pub async fn delete(&self, id: StayId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM kharnak.stay WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}

/// Load a stay and lock its row until the transaction ends.
///
/// Concurrent bookings for the same stay serialize on this lock, so the
/// room count read by [`rooms_held`] stays valid until commit.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn lock_stay(conn: &mut PgConnection, id: StayId) -> Result<Option<Stay>, RepositoryError> {
    let row = sqlx::query_as::<_, StayRow>(&format!(
        "SELECT {STAY_COLUMNS} FROM kharnak.stay WHERE id = $1 FOR UPDATE"
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(row.map(Into::into))
}

/// Rooms held by bookings whose nights overlap `dates`.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn rooms_held(
    conn: &mut PgConnection,
    id: StayId,
    dates: StayDates,
) -> Result<i64, RepositoryError> {
    let rooms = sqlx::query_scalar::<_, i64>(
        r"
        SELECT COALESCE(SUM(rooms), 0)::BIGINT FROM kharnak.booking
        WHERE stay_id = $1
          AND status = ANY($4)
          AND check_in < $3
          AND check_out > $2
        ",
    )
    .bind(id)
    .bind(dates.check_in)
    .bind(dates.check_out)
    .bind(capacity_statuses())
    .fetch_one(&mut *conn)
    .await?;

    Ok(rooms)
}

fn capacity_statuses() -> Vec<&'static str> {
    BookingStatus::ALL
        .iter()
        .filter(|s| s.holds_capacity())
        .map(|s| s.as_str())
        .collect()
}

// =============================================================================
// Bookings
// =============================================================================

const BOOKING_COLUMNS: &str = "id, user_id, kind, tour_id, stay_id, check_in, check_out, guests, \
                               rooms, contact_name, contact_phone, notes, amount, status, \
                               gateway_order_id, gateway_payment_id, created_at";

#[derive(Debug, sqlx::FromRow)]
struct BookingRow {
    id: i32,
    user_id: i32,
    kind: String,
    tour_id: Option<i32>,
    stay_id: Option<i32>,
    check_in: Option<NaiveDate>,
    check_out: Option<NaiveDate>,
    guests: i32,
    rooms: i32,
    contact_name: String,
    contact_phone: String,
    notes: Option<String>,
    amount: Decimal,
    status: String,
    gateway_order_id: Option<String>,
    gateway_payment_id: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<BookingRow> for Booking {
    type Error = RepositoryError;

    fn try_from(row: BookingRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: BookingId::new(row.id),
            user_id: UserId::new(row.user_id),
            kind: parse_column("booking kind", &row.kind)?,
            tour_id: row.tour_id.map(TourId::new),
            stay_id: row.stay_id.map(StayId::new),
            check_in: row.check_in,
            check_out: row.check_out,
            guests: row.guests,
            rooms: row.rooms,
            contact_name: row.contact_name,
            contact_phone: row.contact_phone,
            notes: row.notes,
            amount: row.amount,
            status: parse_column("booking status", &row.status)?,
            gateway_order_id: row.gateway_order_id,
            gateway_payment_id: row.gateway_payment_id,
            created_at: row.created_at,
        })
    }
}

/// A booking about to be inserted in `pending` state.
#[derive(Debug, Clone)]
pub struct NewBooking {
    pub user_id: UserId,
    pub kind: BookingKind,
    pub tour_id: Option<TourId>,
    pub stay_id: Option<StayId>,
    pub dates: Option<StayDates>,
    pub guests: i32,
    pub rooms: i32,
    pub contact_name: String,
    pub contact_phone: String,
    pub notes: Option<String>,
    pub amount: Decimal,
}

/// Repository for booking reads and gateway bookkeeping.
pub struct BookingRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> BookingRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// A user's bookings, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_user(&self, user: UserId) -> Result<Vec<Booking>, RepositoryError> {
        let rows = sqlx::query_as::<_, BookingRow>(&format!(
            r"
            SELECT {BOOKING_COLUMNS} FROM kharnak.booking
            WHERE user_id = $1
            ORDER BY created_at DESC, id DESC
            "
        ))
        .bind(user)
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// Every booking, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_all(&self) -> Result<Vec<Booking>, RepositoryError> {
        let rows = sqlx::query_as::<_, BookingRow>(&format!(
            "SELECT {BOOKING_COLUMNS} FROM kharnak.booking ORDER BY created_at DESC, id DESC"
        ))
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// Record the gateway order created for a booking.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the booking doesn't exist.
    pub async fn attach_gateway_order(
        &self,
        id: BookingId,
        gateway_order_id: &str,
    ) -> Result<Booking, RepositoryError> {
        let row = sqlx::query_as::<_, BookingRow>(&format!(
            r"
            UPDATE kharnak.booking SET gateway_order_id = $2
            WHERE id = $1
            RETURNING {BOOKING_COLUMNS}
            "
        ))
        .bind(id)
        .bind(gateway_order_id)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| RepositoryError::from_unique(e, "gateway order"))?
        .ok_or(RepositoryError::NotFound)?;

        row.try_into()
    }
}

/// Insert a pending booking.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the insert fails.
pub async fn insert_booking(
    conn: &mut PgConnection,
    booking: &NewBooking,
) -> Result<Booking, RepositoryError> {
    let row = sqlx::query_as::<_, BookingRow>(&format!(
        r"
        INSERT INTO kharnak.booking
            (user_id, kind, tour_id, stay_id, check_in, check_out, guests, rooms,
             contact_name, contact_phone, notes, amount, status)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
        RETURNING {BOOKING_COLUMNS}
        "
    ))
    .bind(booking.user_id)
    .bind(booking.kind.as_str())
    .bind(booking.tour_id)
    .bind(booking.stay_id)
    .bind(booking.dates.map(|d| d.check_in))
    .bind(booking.dates.map(|d| d.check_out))
    .bind(booking.guests)
    .bind(booking.rooms)
    .bind(&booking.contact_name)
    .bind(&booking.contact_phone)
    .bind(&booking.notes)
    .bind(booking.amount)
    .bind(BookingStatus::Pending.as_str())
    .fetch_one(&mut *conn)
    .await?;

    row.try_into()
}

/// Load a booking and lock its row until the transaction ends.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn lock_booking(
    conn: &mut PgConnection,
    id: BookingId,
) -> Result<Option<Booking>, RepositoryError> {
    let row = sqlx::query_as::<_, BookingRow>(&format!(
        "SELECT {BOOKING_COLUMNS} FROM kharnak.booking WHERE id = $1 FOR UPDATE"
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;

    row.map(TryInto::try_into).transpose()
}

/// Set a booking's status, and its payment id when one is given.
///
/// # Errors
///
/// Returns `RepositoryError::NotFound` if the booking doesn't exist.
pub async fn set_booking_status(
    conn: &mut PgConnection,
    id: BookingId,
    status: BookingStatus,
    gateway_payment_id: Option<&str>,
) -> Result<Booking, RepositoryError> {
    let row = sqlx::query_as::<_, BookingRow>(&format!(
        r"
        UPDATE kharnak.booking
        SET status = $2, gateway_payment_id = COALESCE($3, gateway_payment_id)
        WHERE id = $1
        RETURNING {BOOKING_COLUMNS}
        "
    ))
    .bind(id)
    .bind(status.as_str())
    .bind(gateway_payment_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or(RepositoryError::NotFound)?;

    row.try_into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capacity_statuses() {
        assert_eq!(capacity_statuses(), vec!["pending", "confirmed"]);
    }
}
