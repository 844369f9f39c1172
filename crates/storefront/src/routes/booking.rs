//! Tour, stay, and booking route handlers.

use axum::{Json, extract::State};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use kharnak_core::BookingId;

use crate::db::{BookingRepository, StayRepository, TourRepository};
use crate::error::{Result, add_breadcrumb};
use crate::middleware::RequireUser;
use crate::models::{Booking, BookingRequest, Stay, Tour};
use crate::routes::{ApiResponse, ok};
use crate::services::booking::CreatedBooking;
use crate::services::razorpay::PaymentConfirmation;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct TourList {
    pub tours: Vec<Tour>,
}

#[derive(Debug, Serialize)]
pub struct StayList {
    pub stays: Vec<Stay>,
}

#[derive(Debug, Serialize)]
pub struct BookingBody {
    pub booking: Booking,
}

#[derive(Debug, Serialize)]
pub struct BookingList {
    pub bookings: Vec<Booking>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyBooking {
    pub booking_id: BookingId,
    #[serde(flatten)]
    pub confirmation: PaymentConfirmation,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelBooking {
    pub booking_id: BookingId,
}

/// All tours by start date.
///
/// GET /api/tour/list
///
/// # Errors
///
/// Returns `AppError::Database` if the query fails.
pub async fn tours(State(state): State<AppState>) -> Result<Json<ApiResponse<TourList>>> {
    let tours = TourRepository::new(state.pool()).list_all().await?;
    Ok(ok(TourList { tours }))
}

/// All homestays.
///
/// GET /api/stay/list
///
/// # Errors
///
/// Returns `AppError::Database` if the query fails.
pub async fn stays(State(state): State<AppState>) -> Result<Json<ApiResponse<StayList>>> {
    let stays = StayRepository::new(state.pool()).list_all().await?;
    Ok(ok(StayList { stays }))
}

/// Book a tour or a stay.
///
/// POST /api/booking/create
///
/// The booking starts `pending`; with online payments configured the
/// response also carries the gateway order to pay.
///
/// # Errors
///
/// Returns `AppError::Booking`, e.g. "Not enough seats available" or
/// "No rooms available for these dates".
#[instrument(skip(state, req))]
pub async fn create(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Json(req): Json<BookingRequest>,
) -> Result<Json<ApiResponse<CreatedBooking>>> {
    let today = Utc::now().date_naive();
    let created = state.bookings().create(user.id, req, today).await?;
    add_breadcrumb("booking", "Booking created", None);
    Ok(ok(created))
}

/// Reconcile a booking payment.
///
/// POST /api/booking/verify
///
/// # Errors
///
/// Returns `AppError::Booking(Payment(SignatureMismatch))` after
/// cancelling the booking.
#[instrument(skip(state, req), fields(booking_id = %req.booking_id))]
pub async fn verify(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Json(req): Json<VerifyBooking>,
) -> Result<Json<ApiResponse<BookingBody>>> {
    let booking = state
        .bookings()
        .verify_payment(user.id, req.booking_id, &req.confirmation)
        .await?;
    Ok(ok(BookingBody { booking }))
}

/// The caller's bookings, newest first.
///
/// POST /api/booking/user
///
/// # Errors
///
/// Returns `AppError::Database` if the query fails.
pub async fn user_bookings(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
) -> Result<Json<ApiResponse<BookingList>>> {
    let bookings = BookingRepository::new(state.pool())
        .list_for_user(user.id)
        .await?;
    Ok(ok(BookingList { bookings }))
}

/// Cancel one of the caller's bookings.
///
/// POST /api/booking/cancel
///
/// # Errors
///
/// Returns `AppError::Booking` if the booking is not the caller's, is
/// already cancelled, or has been completed.
#[instrument(skip(state, req), fields(booking_id = %req.booking_id))]
pub async fn cancel(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Json(req): Json<CancelBooking>,
) -> Result<Json<ApiResponse<BookingBody>>> {
    let booking = state.bookings().cancel(user.id, req.booking_id).await?;
    Ok(ok(BookingBody { booking }))
}
