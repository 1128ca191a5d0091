//! Field rules for the three user-supplied submission fields.
//!
//! Validation is pure: it normalises the raw strings and either returns the
//! cleaned triple or the first rule that was broken, naming the field.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use utoipa::ToSchema;

pub const NAME_MAX: usize = 255;
pub const EMAIL_MAX: usize = 255;
pub const MESSAGE_MAX: usize = 5000;

static TAGS: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").expect("tag pattern"));
static WHITESPACE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("whitespace pattern"));
static EMAIL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^[A-Za-z0-9.!#$%&'*+/=?^_`{|}~-]+@[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?(?:\.[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?)+$",
    )
    .expect("email pattern")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Field {
    Name,
    Email,
    Message,
}

impl Field {
    pub fn as_str(&self) -> &'static str {
        match self {
            Field::Name => "name",
            Field::Email => "email",
            Field::Message => "message",
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Field::Name => "Name",
            Field::Email => "Email",
            Field::Message => "Message",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reason {
    Empty,
    TooLong { max: usize },
    InvalidEmail,
    NotText,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidationError {
    pub field: Field,
    pub reason: Reason,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.reason {
            Reason::Empty => write!(f, "{} is required.", self.field.label()),
            Reason::TooLong { max } => write!(f, "{} must be at most {max} characters.", self.field.label()),
            Reason::InvalidEmail => f.write_str("Please enter a valid email address."),
            Reason::NotText => write!(f, "{} must be text.", self.field.label()),
        }
    }
}

impl std::error::Error for ValidationError {}

/// One field as it arrived: absent or null, a string, or some other JSON value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawText<'a> {
    Missing,
    Text(&'a str),
    NotText,
}

impl<'a> From<&'a str> for RawText<'a> {
    fn from(s: &'a str) -> Self {
        RawText::Text(s)
    }
}

impl<'a> RawText<'a> {
    fn text(self, field: Field) -> Result<&'a str, ValidationError> {
        match self {
            RawText::Missing => Ok(""),
            RawText::Text(s) => Ok(s),
            RawText::NotText => Err(ValidationError { field, reason: Reason::NotText }),
        }
    }
}

/// Raw fields as they arrived on the wire.
#[derive(Debug, Clone, Copy)]
pub struct RawFeedback<'a> {
    pub name: RawText<'a>,
    pub email: RawText<'a>,
    pub message: RawText<'a>,
}

/// Normalised fields, guaranteed non-empty and within bounds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidFeedback {
    pub name: String,
    pub email: String,
    pub message: String,
}

/// Single-line text: tags removed, any whitespace run collapsed to one space.
pub fn sanitize_text(raw: &str) -> String {
    let stripped = TAGS.replace_all(raw, "");
    WHITESPACE_RUN.replace_all(&stripped, " ").trim().to_string()
}

/// Multi-line text: tags removed, line breaks kept, outer whitespace trimmed.
pub fn sanitize_textarea(raw: &str) -> String {
    TAGS.replace_all(raw, "").replace("\r\n", "\n").trim().to_string()
}

pub fn is_email(candidate: &str) -> bool {
    EMAIL.is_match(candidate)
}

fn bounded(field: Field, value: String, max: usize) -> Result<String, ValidationError> {
    if value.is_empty() {
        return Err(ValidationError { field, reason: Reason::Empty });
    }
    if value.chars().count() > max {
        return Err(ValidationError { field, reason: Reason::TooLong { max } });
    }
    Ok(value)
}

/// Checks name, email, message in that order and reports the first failure.
pub fn validate(raw: RawFeedback<'_>) -> Result<ValidFeedback, ValidationError> {
    let name = bounded(Field::Name, sanitize_text(raw.name.text(Field::Name)?), NAME_MAX)?;

    let email = bounded(Field::Email, raw.email.text(Field::Email)?.trim().to_string(), EMAIL_MAX)?;
    if !is_email(&email) {
        return Err(ValidationError { field: Field::Email, reason: Reason::InvalidEmail });
    }

    let message = bounded(Field::Message, sanitize_textarea(raw.message.text(Field::Message)?), MESSAGE_MAX)?;

    Ok(ValidFeedback { name, email, message })
}
