//! Contact inbox and story publishing.

use axum::{Json, extract::State};
use serde::Serialize;
use tracing::{info, instrument};

use kharnak_core::{ContactMessageId, StoryId};

use super::IdRequest;
use crate::db::{ContactRepository, StoryRepository};
use crate::error::Result;
use crate::middleware::RequireAdmin;
use crate::models::{ContactMessage, Story, StoryInput};
use crate::routes::{ApiResponse, Message, ok};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct MessageList {
    pub messages: Vec<ContactMessage>,
}

#[derive(Debug, Serialize)]
pub struct StoryBody {
    pub story: Story,
}

/// Every contact message, newest first. Listing marks them read.
///
/// GET /api/admin/contact/list
///
/// # Errors
///
/// Returns `AppError::Database` if the query fails.
pub async fn messages(
    State(state): State<AppState>,
    _admin: RequireAdmin,
) -> Result<Json<ApiResponse<MessageList>>> {
    let messages = ContactRepository::new(state.pool())
        .list_and_mark_read()
        .await?;
    Ok(ok(MessageList { messages }))
}

/// POST /api/admin/contact/remove
///
/// # Errors
///
/// Returns `AppError::Database(NotFound)` for an unknown id.
#[instrument(skip(state, _admin, req), fields(message_id = %req.id))]
pub async fn remove_message(
    State(state): State<AppState>,
    _admin: RequireAdmin,
    Json(req): Json<IdRequest<ContactMessageId>>,
) -> Result<Json<ApiResponse<Message>>> {
    ContactRepository::new(state.pool()).delete(req.id).await?;
    Ok(ok(Message {
        message: "Message Removed",
    }))
}

/// Publish a story. The slug is derived from the title.
///
/// POST /api/admin/story/add
///
/// # Errors
///
/// Returns `AppError::Validation` for a blank title or body and
/// `AppError::Database(Conflict)` when the slug is taken.
#[instrument(skip(state, _admin, input), fields(title = %input.title))]
pub async fn add_story(
    State(state): State<AppState>,
    _admin: RequireAdmin,
    Json(input): Json<StoryInput>,
) -> Result<Json<ApiResponse<StoryBody>>> {
    let (slug, input) = input.validate()?;
    let story = StoryRepository::new(state.pool())
        .create(&slug, &input)
        .await?;
    info!(story_id = %story.id, slug = %story.slug, "story published");
    Ok(ok(StoryBody { story }))
}

/// POST /api/admin/story/remove
///
/// # Errors
///
/// Returns `AppError::Database(NotFound)` for an unknown id.
#[instrument(skip(state, _admin, req), fields(story_id = %req.id))]
pub async fn remove_story(
    State(state): State<AppState>,
    _admin: RequireAdmin,
    Json(req): Json<IdRequest<StoryId>>,
) -> Result<Json<ApiResponse<Message>>> {
    StoryRepository::new(state.pool()).delete(req.id).await?;
    Ok(ok(Message {
        message: "Story Removed",
    }))
}
