//! Contact form and story route handlers.

use axum::{
    Json,
    extract::{Path, State},
};
use serde::Serialize;
use tracing::{info, instrument};

use crate::db::{ContactRepository, StoryRepository};
use crate::error::{AppError, Result};
use crate::models::{ContactForm, Story};
use crate::routes::{ApiResponse, Message, ok};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct StoryList {
    pub stories: Vec<Story>,
}

#[derive(Debug, Serialize)]
pub struct StoryBody {
    pub story: Story,
}

/// Store a message from the contact form.
///
/// POST /api/contact
///
/// # Errors
///
/// Returns `AppError::Validation` for a blank name, bad email, or an empty
/// or oversized message.
#[instrument(skip(state, form))]
pub async fn contact(
    State(state): State<AppState>,
    Json(form): Json<ContactForm>,
) -> Result<Json<ApiResponse<Message>>> {
    let message = form.validate()?;
    let stored = ContactRepository::new(state.pool()).create(&message).await?;
    info!(message_id = %stored.id, "contact message received");
    Ok(ok(Message {
        message: "Thanks for reaching out, we will get back to you soon",
    }))
}

/// Published stories, newest first.
///
/// GET /api/story/list
///
/// # Errors
///
/// Returns `AppError::Database` if the query fails.
pub async fn stories(State(state): State<AppState>) -> Result<Json<ApiResponse<StoryList>>> {
    let stories = StoryRepository::new(state.pool()).list_all().await?;
    Ok(ok(StoryList { stories }))
}

/// One story by slug.
///
/// GET /api/story/{slug}
///
/// # Errors
///
/// Returns `AppError::NotFound` for an unknown slug.
pub async fn story(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<ApiResponse<StoryBody>>> {
    let story = StoryRepository::new(state.pool())
        .get_by_slug(&slug)
        .await?
        .ok_or_else(|| AppError::NotFound("Story".to_owned()))?;
    Ok(ok(StoryBody { story }))
}
