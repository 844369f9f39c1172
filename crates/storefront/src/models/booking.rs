//! Tours, homestays, and the bookings made against them.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use kharnak_core::{BookingId, BookingKind, BookingStatus, StayId, TourId, UserId};

use super::{ValidationError, optional_text, require_text};

/// Longest stay accepted in a single booking.
pub const MAX_STAY_NIGHTS: i64 = 30;

/// A scheduled group tour.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Tour {
    pub id: TourId,
    pub title: String,
    pub description: String,
    pub location: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub price_per_person: Decimal,
    pub total_seats: i32,
    pub seats_available: i32,
    pub images: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl Tour {
    /// Whether the tour has already started.
    #[must_use]
    pub fn has_started(&self, today: NaiveDate) -> bool {
        self.start_date <= today
    }
}

/// Payload for creating or replacing a tour.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TourInput {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub location: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub price_per_person: Decimal,
    pub total_seats: i32,
    #[serde(default)]
    pub images: Vec<String>,
}

impl TourInput {
    /// Validate and normalize the payload.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] for blank text, inverted dates, a
    /// non-positive price, or fewer than one seat.
    pub fn validate(self) -> Result<Self, ValidationError> {
        if self.end_date < self.start_date {
            return Err(ValidationError::new("End date must not be before start date"));
        }
        if self.price_per_person <= Decimal::ZERO {
            return Err(ValidationError::new("Price must be greater than zero"));
        }
        if self.total_seats < 1 {
            return Err(ValidationError::new("A tour needs at least one seat"));
        }
        Ok(Self {
            title: require_text(&self.title, "Title")?,
            description: self.description.trim().to_owned(),
            location: require_text(&self.location, "Location")?,
            price_per_person: self.price_per_person.round_dp(2),
            ..self
        })
    }
}

/// A homestay with a fixed number of rooms.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Stay {
    pub id: StayId,
    pub name: String,
    pub location: String,
    pub description: String,
    pub price_per_night: Decimal,
    pub rooms: i32,
    pub max_guests_per_room: i32,
    pub images: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl Stay {
    /// Most guests a single booking can bring.
    #[must_use]
    pub const fn capacity(&self) -> i32 {
        self.rooms.saturating_mul(self.max_guests_per_room)
    }

    /// Rooms needed for `guests`, rounded up.
    #[must_use]
    pub const fn rooms_needed(&self, guests: i32) -> i32 {
        if self.max_guests_per_room <= 0 {
            return guests;
        }
        (guests + self.max_guests_per_room - 1) / self.max_guests_per_room
    }
}

/// Payload for creating a stay.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StayInput {
    pub name: String,
    pub location: String,
    #[serde(default)]
    pub description: String,
    pub price_per_night: Decimal,
    pub rooms: i32,
    pub max_guests_per_room: i32,
    #[serde(default)]
    pub images: Vec<String>,
}

impl StayInput {
    /// Validate and normalize the payload.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] for blank text, a non-positive price,
    /// or non-positive room counts.
    pub fn validate(self) -> Result<Self, ValidationError> {
        if self.price_per_night <= Decimal::ZERO {
            return Err(ValidationError::new("Price must be greater than zero"));
        }
        if self.rooms < 1 || self.max_guests_per_room < 1 {
            return Err(ValidationError::new(
                "Rooms and guests per room must be at least one",
            ));
        }
        Ok(Self {
            name: require_text(&self.name, "Name")?,
            location: require_text(&self.location, "Location")?,
            description: self.description.trim().to_owned(),
            price_per_night: self.price_per_night.round_dp(2),
            ..self
        })
    }
}

/// Check-in/check-out pair, validated against today.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StayDates {
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
}

impl StayDates {
    /// Validate a date range.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] if check-in is in the past, check-out
    /// is not after check-in, or the stay is longer than
    /// [`MAX_STAY_NIGHTS`].
    pub fn new(
        check_in: NaiveDate,
        check_out: NaiveDate,
        today: NaiveDate,
    ) -> Result<Self, ValidationError> {
        if check_in < today {
            return Err(ValidationError::new("Check-in date cannot be in the past"));
        }
        if check_out <= check_in {
            return Err(ValidationError::new("Check-out must be after check-in"));
        }
        let dates = Self {
            check_in,
            check_out,
        };
        if dates.nights() > MAX_STAY_NIGHTS {
            return Err(ValidationError::new(format!(
                "Stays are limited to {MAX_STAY_NIGHTS} nights"
            )));
        }
        Ok(dates)
    }

    /// Number of nights between check-in and check-out.
    #[must_use]
    pub fn nights(&self) -> i64 {
        (self.check_out - self.check_in).num_days()
    }
}

/// Contact details the guest leaves with a booking.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingContact {
    pub contact_name: String,
    pub contact_phone: String,
    #[serde(default)]
    pub notes: Option<String>,
}

impl BookingContact {
    /// Validate the contact details.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] for a blank name or phone.
    pub fn validate(self) -> Result<Self, ValidationError> {
        Ok(Self {
            contact_name: require_text(&self.contact_name, "Contact name")?,
            contact_phone: require_text(&self.contact_phone, "Contact phone")?,
            notes: optional_text(self.notes.as_deref()),
        })
    }
}

/// Payload for `POST /api/booking/create`.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum BookingRequest {
    #[serde(rename_all = "camelCase")]
    Tour {
        tour_id: TourId,
        guests: i32,
        #[serde(flatten)]
        contact: BookingContact,
    },
    #[serde(rename_all = "camelCase")]
    Stay {
        stay_id: StayId,
        check_in: NaiveDate,
        check_out: NaiveDate,
        guests: i32,
        #[serde(flatten)]
        contact: BookingContact,
    },
}

/// A reservation for a tour or a stay.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    pub id: BookingId,
    pub user_id: UserId,
    pub kind: BookingKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tour_id: Option<TourId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stay_id: Option<StayId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub check_in: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub check_out: Option<NaiveDate>,
    pub guests: i32,
    /// Rooms held (stays only, zero for tours).
    pub rooms: i32,
    pub contact_name: String,
    pub contact_phone: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub amount: Decimal,
    pub status: BookingStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gateway_order_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gateway_payment_id: Option<String>,
    pub created_at: DateTime<Utc>,
}
