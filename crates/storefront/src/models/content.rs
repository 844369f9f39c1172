//! Contact messages and cultural stories.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use kharnak_core::{ContactMessageId, Email, StoryId};

use super::{ValidationError, optional_text, require_text};

/// Longest contact message accepted.
pub const MAX_MESSAGE_LENGTH: usize = 5000;

/// A message left through the contact form.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactMessage {
    pub id: ContactMessageId,
    pub name: String,
    pub email: Email,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    pub message: String,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

/// Payload for `POST /api/contact`.
#[derive(Debug, Clone, Deserialize)]
pub struct ContactForm {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub subject: Option<String>,
    pub message: String,
}

/// A validated contact form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewContactMessage {
    pub name: String,
    pub email: Email,
    pub subject: Option<String>,
    pub message: String,
}

impl ContactForm {
    /// Validate the form.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] for a blank name or message, an invalid
    /// email, or a message over [`MAX_MESSAGE_LENGTH`] characters.
    pub fn validate(self) -> Result<NewContactMessage, ValidationError> {
        let email = Email::parse(&self.email)
            .map_err(|_| ValidationError::new("Enter a valid email address"))?;
        let message = require_text(&self.message, "Message")?;
        if message.chars().count() > MAX_MESSAGE_LENGTH {
            return Err(ValidationError::new(format!(
                "Message must be at most {MAX_MESSAGE_LENGTH} characters"
            )));
        }
        Ok(NewContactMessage {
            name: require_text(&self.name, "Name")?,
            email,
            subject: optional_text(self.subject.as_deref()),
            message,
        })
    }
}

/// A published story or publication.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Story {
    pub id: StoryId,
    pub slug: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    pub summary: String,
    pub body: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cover_image: Option<String>,
    pub published_at: DateTime<Utc>,
}

/// Payload for adding a story.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoryInput {
    pub title: String,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub summary: String,
    pub body: String,
    #[serde(default)]
    pub cover_image: Option<String>,
}

impl StoryInput {
    /// Validate the payload and derive its slug.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] for a blank title or body, or a title
    /// without any letters or digits.
    pub fn validate(self) -> Result<(String, Self), ValidationError> {
        let title = require_text(&self.title, "Title")?;
        let slug = slugify(&title);
        if slug.is_empty() {
            return Err(ValidationError::new(
                "Title must contain letters or digits",
            ));
        }
        Ok((
            slug,
            Self {
                title,
                author: optional_text(self.author.as_deref()),
                summary: self.summary.trim().to_owned(),
                body: require_text(&self.body, "Body")?,
                cover_image: optional_text(self.cover_image.as_deref()),
            },
        ))
    }
}

/// URL slug: lowercase ASCII alphanumerics separated by single dashes.
#[must_use]
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    for c in title.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Losar in the Changthang!"), "losar-in-the-changthang");
        assert_eq!(slugify("  --Pashmina -- & Goats-- "), "pashmina-goats");
        assert_eq!(slugify("???"), "");
    }

    #[test]
    fn test_contact_form_validate() {
        let form = ContactForm {
            name: " Jigmet ".into(),
            email: "jigmet@example.com".into(),
            subject: Some("  ".into()),
            message: "Are winter tours available?".into(),
        };
        let msg = form.validate().unwrap();
        assert_eq!(msg.name, "Jigmet");
        assert_eq!(msg.subject, None);
    }

    #[test]
    fn test_contact_form_rejects_long_message() {
        let form = ContactForm {
            name: "Jigmet".into(),
            email: "jigmet@example.com".into(),
            subject: None,
            message: "a".repeat(MAX_MESSAGE_LENGTH + 1),
        };
        assert!(form.validate().is_err());
    }

    #[test]
    fn test_story_input_slug() {
        let input = StoryInput {
            title: "Weaving the Nomad Tent".into(),
            author: None,
            summary: String::new(),
            body: "Yak hair is spun in winter.".into(),
            cover_image: None,
        };
        let (slug, story) = input.validate().unwrap();
        assert_eq!(slug, "weaving-the-nomad-tent");
        assert_eq!(story.title, "Weaving the Nomad Tent");
    }
}
