//! Tour and homestay bookings.
//!
//! Tours hold capacity in `seats_available`, taken with a conditional
//! decrement and handed back when a booking is cancelled. Stays have no
//! counter: capacity is the stay's room count minus the rooms held by
//! pending or confirmed bookings whose nights overlap, read while the stay
//! row is locked.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::{PgConnection, PgPool};
use thiserror::Error;
use tracing::{info, instrument, warn};

use kharnak_core::{BookingId, BookingKind, BookingStatus, Price, StayId, TourId, UserId};

use super::razorpay::{CheckoutSession, PaymentConfirmation, PaymentError, RazorpayClient};
use crate::config::CommerceConfig;
use crate::db::bookings::{self as repo, NewBooking};
use crate::db::{BookingRepository, RepositoryError, TourRepository};
use crate::models::{Booking, BookingContact, BookingRequest, StayDates, ValidationError};

/// Errors from booking operations.
#[derive(Debug, Error)]
pub enum BookingError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("tour not found")]
    TourNotFound,

    #[error("stay not found")]
    StayNotFound,

    #[error("booking not found")]
    BookingNotFound,

    #[error("tour has already started")]
    TourStarted,

    #[error("only {available} seats available")]
    NotEnoughSeats { available: i32 },

    #[error("stay sleeps at most {capacity} guests")]
    TooManyGuests { capacity: i32 },

    #[error("no rooms available for these dates")]
    NoRoomsAvailable,

    #[error("booking is already cancelled")]
    AlreadyCancelled,

    #[error("booking cannot move from {from} to {to}")]
    InvalidTransition { from: BookingStatus, to: BookingStatus },

    #[error(transparent)]
    Payment(#[from] PaymentError),

    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

impl From<sqlx::Error> for BookingError {
    fn from(e: sqlx::Error) -> Self {
        Self::Repository(RepositoryError::Database(e))
    }
}

/// A new booking and, when payments are configured, its gateway session.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedBooking {
    pub booking: Booking,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checkout: Option<CheckoutSession>,
}

/// Booking lifecycle.
#[derive(Clone)]
pub struct BookingService {
    pool: PgPool,
    commerce: CommerceConfig,
    razorpay: Option<RazorpayClient>,
}

impl BookingService {
    #[must_use]
    pub const fn new(
        pool: PgPool,
        commerce: CommerceConfig,
        razorpay: Option<RazorpayClient>,
    ) -> Self {
        Self {
            pool,
            commerce,
            razorpay,
        }
    }

    /// Reserve a tour or stay for `user` as a pending booking.
    ///
    /// # Errors
    ///
    /// Returns `BookingError::Validation` for bad input, the not-found
    /// variants for unknown tours or stays, and `NotEnoughSeats`,
    /// `TooManyGuests` or `NoRoomsAvailable` when capacity is short.
    #[instrument(skip(self, request))]
    pub async fn create(
        &self,
        user: UserId,
        request: BookingRequest,
        today: NaiveDate,
    ) -> Result<CreatedBooking, BookingError> {
        let booking = match request {
            BookingRequest::Tour {
                tour_id,
                guests,
                contact,
            } => self.book_tour(user, tour_id, guests, contact, today).await?,
            BookingRequest::Stay {
                stay_id,
                check_in,
                check_out,
                guests,
                contact,
            } => {
                let dates = StayDates::new(check_in, check_out, today)?;
                self.book_stay(user, stay_id, dates, guests, contact).await?
            }
        };

        info!(booking_id = %booking.id, kind = %booking.kind, amount = %booking.amount, "booking created");

        let Some(gateway) = &self.razorpay else {
            return Ok(CreatedBooking {
                booking,
                checkout: None,
            });
        };

        let price = Price::new(booking.amount, self.commerce.currency);
        let receipt = format!("booking-{}", booking.id);
        let checkout = match gateway.create_order(&price, &receipt).await {
            Ok(checkout) => checkout,
            Err(e) => {
                warn!(booking_id = %booking.id, error = %e, "gateway order failed, cancelling booking");
                self.cancel_unpaid(booking.id).await?;
                return Err(e.into());
            }
        };

        let booking = BookingRepository::new(&self.pool)
            .attach_gateway_order(booking.id, &checkout.order.id)
            .await?;

        Ok(CreatedBooking {
            booking,
            checkout: Some(checkout),
        })
    }

    async fn book_tour(
        &self,
        user: UserId,
        tour_id: TourId,
        guests: i32,
        contact: BookingContact,
        today: NaiveDate,
    ) -> Result<Booking, BookingError> {
        require_guests(guests)?;
        let contact = contact.validate()?;

        let tour = TourRepository::new(&self.pool)
            .get_by_id(tour_id)
            .await?
            .ok_or(BookingError::TourNotFound)?;
        if tour.has_started(today) {
            return Err(BookingError::TourStarted);
        }

        let mut tx = self.pool.begin().await?;
        let tour = repo::reserve_seats(&mut *tx, tour_id, guests)
            .await?
            .ok_or(BookingError::NotEnoughSeats {
                available: tour.seats_available,
            })?;

        let booking = repo::insert_booking(
            &mut *tx,
            &NewBooking {
                user_id: user,
                kind: BookingKind::Tour,
                tour_id: Some(tour.id),
                stay_id: None,
                dates: None,
                guests,
                rooms: 0,
                contact_name: contact.contact_name,
                contact_phone: contact.contact_phone,
                notes: contact.notes,
                amount: tour.price_per_person * Decimal::from(guests),
            },
        )
        .await?;

        tx.commit().await?;
        Ok(booking)
    }

    async fn book_stay(
        &self,
        user: UserId,
        stay_id: StayId,
        dates: StayDates,
        guests: i32,
        contact: BookingContact,
    ) -> Result<Booking, BookingError> {
        require_guests(guests)?;
        let contact = contact.validate()?;

        let mut tx = self.pool.begin().await?;
        let stay = repo::lock_stay(&mut *tx, stay_id)
            .await?
            .ok_or(BookingError::StayNotFound)?;

        if guests > stay.capacity() {
            return Err(BookingError::TooManyGuests {
                capacity: stay.capacity(),
            });
        }
        let rooms = stay.rooms_needed(guests);
        let held = repo::rooms_held(&mut *tx, stay_id, dates).await?;
        if held + i64::from(rooms) > i64::from(stay.rooms) {
            return Err(BookingError::NoRoomsAvailable);
        }

        let booking = repo::insert_booking(
            &mut *tx,
            &NewBooking {
                user_id: user,
                kind: BookingKind::Stay,
                tour_id: None,
                stay_id: Some(stay.id),
                dates: Some(dates),
                guests,
                rooms,
                contact_name: contact.contact_name,
                contact_phone: contact.contact_phone,
                notes: contact.notes,
                amount: stay.price_per_night * Decimal::from(dates.nights()),
            },
        )
        .await?;

        tx.commit().await?;
        Ok(booking)
    }

    /// Reconcile a booking payment reported by the checkout widget.
    ///
    /// Success confirms the booking. A bad signature cancels it and frees
    /// its capacity.
    ///
    /// # Errors
    ///
    /// Returns `BookingError::BookingNotFound` if the booking is missing or
    /// not the user's, `BookingError::InvalidTransition` if it is no longer
    /// pending, and `BookingError::Payment(SignatureMismatch)` after
    /// recording a failed payment.
    #[instrument(skip(self, confirmation))]
    pub async fn verify_payment(
        &self,
        user: UserId,
        booking_id: BookingId,
        confirmation: &PaymentConfirmation,
    ) -> Result<Booking, BookingError> {
        let gateway = self.razorpay.as_ref().ok_or(PaymentError::NotConfigured)?;

        let mut tx = self.pool.begin().await?;
        let booking = repo::lock_booking(&mut *tx, booking_id)
            .await?
            .filter(|b| b.user_id == user)
            .ok_or(BookingError::BookingNotFound)?;

        if booking.status == BookingStatus::Confirmed
            && booking.gateway_payment_id.as_deref() == Some(&*confirmation.payment_id)
        {
            return Ok(booking);
        }
        if booking.status != BookingStatus::Pending {
            return Err(BookingError::InvalidTransition {
                from: booking.status,
                to: BookingStatus::Confirmed,
            });
        }

        let matches_order = booking.gateway_order_id.as_deref() == Some(&*confirmation.order_id);
        if !matches_order || gateway.verify(confirmation).is_err() {
            release_capacity(&mut *tx, &booking).await?;
            repo::set_booking_status(&mut *tx, booking.id, BookingStatus::Cancelled, None).await?;
            tx.commit().await?;
            warn!(booking_id = %booking.id, "booking payment verification failed");
            return Err(PaymentError::SignatureMismatch.into());
        }

        let booking = repo::set_booking_status(
            &mut *tx,
            booking.id,
            BookingStatus::Confirmed,
            Some(&confirmation.payment_id),
        )
        .await?;
        tx.commit().await?;
        info!(booking_id = %booking.id, "booking confirmed");
        Ok(booking)
    }

    /// Cancel one of `user`'s bookings.
    ///
    /// # Errors
    ///
    /// Returns `BookingError::BookingNotFound` for someone else's booking,
    /// `BookingError::AlreadyCancelled`, or `BookingError::InvalidTransition`
    /// for completed bookings.
    #[instrument(skip(self))]
    pub async fn cancel(&self, user: UserId, booking_id: BookingId) -> Result<Booking, BookingError> {
        let mut tx = self.pool.begin().await?;
        let booking = repo::lock_booking(&mut *tx, booking_id)
            .await?
            .filter(|b| b.user_id == user)
            .ok_or(BookingError::BookingNotFound)?;

        let booking = transition(&mut *tx, booking, BookingStatus::Cancelled).await?;
        tx.commit().await?;
        info!(booking_id = %booking.id, "booking cancelled by guest");
        Ok(booking)
    }

    /// Move a booking to a new status (back-office).
    ///
    /// # Errors
    ///
    /// Returns `BookingError::BookingNotFound` or
    /// `BookingError::InvalidTransition`.
    #[instrument(skip(self))]
    pub async fn update_status(
        &self,
        booking_id: BookingId,
        status: BookingStatus,
    ) -> Result<Booking, BookingError> {
        let mut tx = self.pool.begin().await?;
        let booking = repo::lock_booking(&mut *tx, booking_id)
            .await?
            .ok_or(BookingError::BookingNotFound)?;

        if booking.status == status {
            return Ok(booking);
        }
        let booking = transition(&mut *tx, booking, status).await?;
        tx.commit().await?;
        info!(booking_id = %booking.id, status = %status, "booking status changed");
        Ok(booking)
    }

    async fn cancel_unpaid(&self, booking_id: BookingId) -> Result<(), BookingError> {
        let mut tx = self.pool.begin().await?;
        if let Some(booking) = repo::lock_booking(&mut *tx, booking_id).await? {
            transition(&mut *tx, booking, BookingStatus::Cancelled).await?;
        }
        tx.commit().await?;
        Ok(())
    }
}

fn require_guests(guests: i32) -> Result<(), ValidationError> {
    if guests < 1 {
        return Err(ValidationError::new("At least one guest is required"));
    }
    Ok(())
}

async fn transition(
    conn: &mut PgConnection,
    booking: Booking,
    next: BookingStatus,
) -> Result<Booking, BookingError> {
    if booking.status == BookingStatus::Cancelled && next == BookingStatus::Cancelled {
        return Err(BookingError::AlreadyCancelled);
    }
    if !booking.status.can_transition_to(next) {
        return Err(BookingError::InvalidTransition {
            from: booking.status,
            to: next,
        });
    }
    if next == BookingStatus::Cancelled {
        release_capacity(conn, &booking).await?;
    }
    Ok(repo::set_booking_status(conn, booking.id, next, None).await?)
}

/// Hand tour seats back. Stay rooms are freed by the status change alone.
async fn release_capacity(conn: &mut PgConnection, booking: &Booking) -> Result<(), RepositoryError> {
    if booking.kind == BookingKind::Tour
        && booking.status.holds_capacity()
        && let Some(tour_id) = booking.tour_id
    {
        repo::release_seats(conn, tour_id, booking.guests).await?;
    }
    Ok(())
}
