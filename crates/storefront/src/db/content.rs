//! Contact messages and stories.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use kharnak_core::{ContactMessageId, Email, StoryId};

use super::RepositoryError;
use crate::models::{ContactMessage, NewContactMessage, Story, StoryInput};

#[derive(Debug, sqlx::FromRow)]
struct ContactMessageRow {
    id: i32,
    name: String,
    email: String,
    subject: Option<String>,
    message: String,
    read: bool,
    created_at: DateTime<Utc>,
}

impl TryFrom<ContactMessageRow> for ContactMessage {
    type Error = RepositoryError;

    fn try_from(row: ContactMessageRow) -> Result<Self, Self::Error> {
        let email = Email::parse(&row.email).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid email in database: {e}"))
        })?;

        Ok(Self {
            id: ContactMessageId::new(row.id),
            name: row.name,
            email,
            subject: row.subject,
            message: row.message,
            read: row.read,
            created_at: row.created_at,
        })
    }
}

/// Repository for the contact inbox.
pub struct ContactRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ContactRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Store a contact message.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn create(
        &self,
        message: &NewContactMessage,
    ) -> Result<ContactMessage, RepositoryError> {
        let row = sqlx::query_as::<_, ContactMessageRow>(
            r"
            INSERT INTO kharnak.contact_message (name, email, subject, message)
            VALUES ($1, $2, $3, $4)
            RETURNING id, name, email, subject, message, read, created_at
            ",
        )
        .bind(&message.name)
        .bind(message.email.as_str())
        .bind(&message.subject)
        .bind(&message.message)
        .fetch_one(self.pool)
        .await?;

        row.try_into()
    }

    /// All messages, newest first. Marks them read.
    ///
    /// The returned rows keep the `read` flag they had before this call, so
    /// the back-office can still highlight what was new.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_and_mark_read(&self) -> Result<Vec<ContactMessage>, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let rows = sqlx::query_as::<_, ContactMessageRow>(
            r"
            SELECT id, name, email, subject, message, read, created_at
            FROM kharnak.contact_message
            ORDER BY created_at DESC, id DESC
            ",
        )
        .fetch_all(&mut *tx)
        .await?;

        sqlx::query("UPDATE kharnak.contact_message SET read = TRUE WHERE NOT read")
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// Delete a message.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the message doesn't exist.
    pub async fn delete(&self, id: ContactMessageId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM kharnak.contact_message WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}

const STORY_COLUMNS: &str = "id, slug, title, author, summary, body, cover_image, published_at";

#[derive(Debug, sqlx::FromRow)]
struct StoryRow {
    id: i32,
    slug: String,
    title: String,
    author: Option<String>,
    summary: String,
    body: String,
    cover_image: Option<String>,
    published_at: DateTime<Utc>,
}

impl From<StoryRow> for Story {
    fn from(row: StoryRow) -> Self {
        Self {
            id: StoryId::new(row.id),
            slug: row.slug,
            title: row.title,
            author: row.author,
            summary: row.summary,
            body: row.body,
            cover_image: row.cover_image,
            published_at: row.published_at,
        }
    }
}

/// Repository for published stories.
pub struct StoryRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> StoryRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// All stories, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_all(&self) -> Result<Vec<Story>, RepositoryError> {
        let rows = sqlx::query_as::<_, StoryRow>(&format!(
            "SELECT {STORY_COLUMNS} FROM kharnak.story ORDER BY published_at DESC, id DESC"
        ))
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Get a story by slug.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_slug(&self, slug: &str) -> Result<Option<Story>, RepositoryError> {
        let row = sqlx::query_as::<_, StoryRow>(&format!(
            "SELECT {STORY_COLUMNS} FROM kharnak.story WHERE slug = $1"
        ))
        .bind(slug)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    /// Publish a story under `slug`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the slug is taken.
    pub async fn create(&self, slug: &str, input: &StoryInput) -> Result<Story, RepositoryError> {
        let row = sqlx::query_as::<_, StoryRow>(&format!(
            r"
            INSERT INTO kharnak.story (slug, title, author, summary, body, cover_image)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {STORY_COLUMNS}
            "
        ))
        .bind(slug)
        .bind(&input.title)
        .bind(&input.author)
        .bind(&input.summary)
        .bind(&input.body)
        .bind(&input.cover_image)
        .fetch_one(self.pool)
        .await
        .map_err(|e| RepositoryError::from_unique(e, "story"))?;

        Ok(row.into())
    }

    /// Delete a story.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the story doesn't exist.
    pub async fn delete(&self, id: StoryId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM kharnak.story WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}
