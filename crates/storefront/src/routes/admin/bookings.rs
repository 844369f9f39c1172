//! Tour, stay, and booking management.

use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use kharnak_core::{BookingId, BookingStatus, StayId, TourId};

use super::IdRequest;
use crate::db::{BookingRepository, StayRepository, TourRepository};
use crate::error::Result;
use crate::middleware::RequireAdmin;
use crate::models::{Booking, Stay, StayInput, Tour, TourInput};
use crate::routes::{ApiResponse, Message, ok};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct UpdateTour {
    pub id: TourId,
    #[serde(flatten)]
    pub tour: TourInput,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateBookingStatus {
    pub booking_id: BookingId,
    pub status: BookingStatus,
}

#[derive(Debug, Serialize)]
pub struct TourBody {
    pub tour: Tour,
}

#[derive(Debug, Serialize)]
pub struct StayBody {
    pub stay: Stay,
}

#[derive(Debug, Serialize)]
pub struct BookingList {
    pub bookings: Vec<Booking>,
}

#[derive(Debug, Serialize)]
pub struct BookingBody {
    pub booking: Booking,
}

/// Schedule a tour. All seats start available.
///
/// POST /api/admin/tour/add
///
/// # Errors
///
/// Returns `AppError::Validation` for inverted dates or a bad price, and
/// `AppError::Database(Conflict)` for a duplicate title and start date.
#[instrument(skip(state, _admin, input), fields(title = %input.title))]
pub async fn add_tour(
    State(state): State<AppState>,
    _admin: RequireAdmin,
    Json(input): Json<TourInput>,
) -> Result<Json<ApiResponse<TourBody>>> {
    let tour = TourRepository::new(state.pool())
        .create(&input.validate()?)
        .await?;
    info!(tour_id = %tour.id, "tour added");
    Ok(ok(TourBody { tour }))
}

/// Replace a tour. Changing the seat total shifts the free seats by the
/// same amount.
///
/// POST /api/admin/tour/update
///
/// # Errors
///
/// Returns `AppError::Database(Conflict)` when the new total is below the
/// seats already booked.
#[instrument(skip(state, _admin, req), fields(tour_id = %req.id))]
pub async fn update_tour(
    State(state): State<AppState>,
    _admin: RequireAdmin,
    Json(req): Json<UpdateTour>,
) -> Result<Json<ApiResponse<TourBody>>> {
    let tour = TourRepository::new(state.pool())
        .update(req.id, &req.tour.validate()?)
        .await?;
    Ok(ok(TourBody { tour }))
}

/// POST /api/admin/tour/remove
///
/// # Errors
///
/// Returns `AppError::Database(NotFound)` for an unknown id.
#[instrument(skip(state, _admin, req), fields(tour_id = %req.id))]
pub async fn remove_tour(
    State(state): State<AppState>,
    _admin: RequireAdmin,
    Json(req): Json<IdRequest<TourId>>,
) -> Result<Json<ApiResponse<Message>>> {
    TourRepository::new(state.pool()).delete(req.id).await?;
    Ok(ok(Message {
        message: "Tour Removed",
    }))
}

/// POST /api/admin/stay/add
///
/// # Errors
///
/// Returns `AppError::Validation` for a bad payload and
/// `AppError::Database(Conflict)` for a duplicate name.
#[instrument(skip(state, _admin, input), fields(name = %input.name))]
pub async fn add_stay(
    State(state): State<AppState>,
    _admin: RequireAdmin,
    Json(input): Json<StayInput>,
) -> Result<Json<ApiResponse<StayBody>>> {
    let stay = StayRepository::new(state.pool())
        .create(&input.validate()?)
        .await?;
    info!(stay_id = %stay.id, "stay added");
    Ok(ok(StayBody { stay }))
}

/// POST /api/admin/stay/remove
///
/// # Errors
///
/// Returns `AppError::Database(NotFound)` for an unknown id.
#[instrument(skip(state, _admin, req), fields(stay_id = %req.id))]
pub async fn remove_stay(
    State(state): State<AppState>,
    _admin: RequireAdmin,
    Json(req): Json<IdRequest<StayId>>,
) -> Result<Json<ApiResponse<Message>>> {
    StayRepository::new(state.pool()).delete(req.id).await?;
    Ok(ok(Message {
        message: "Stay Removed",
    }))
}

/// Every booking, newest first.
///
/// GET /api/admin/booking/list
///
/// # Errors
///
/// Returns `AppError::Database` if the query fails.
pub async fn list(
    State(state): State<AppState>,
    _admin: RequireAdmin,
) -> Result<Json<ApiResponse<BookingList>>> {
    let bookings = BookingRepository::new(state.pool()).list_all().await?;
    Ok(ok(BookingList { bookings }))
}

/// Confirm, complete, or cancel a booking.
///
/// POST /api/admin/booking/status
///
/// # Errors
///
/// Returns `AppError::Booking(InvalidTransition)` for moves the booking
/// lifecycle does not allow.
#[instrument(skip(state, _admin, req), fields(booking_id = %req.booking_id, status = %req.status))]
pub async fn status(
    State(state): State<AppState>,
    _admin: RequireAdmin,
    Json(req): Json<UpdateBookingStatus>,
) -> Result<Json<ApiResponse<BookingBody>>> {
    let booking = state
        .bookings()
        .update_status(req.booking_id, req.status)
        .await?;
    Ok(ok(BookingBody { booking }))
}
