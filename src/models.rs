use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

use crate::validation::{RawFeedback, RawText};

pub type Id = i64;

/// One stored feedback record. Rows are never updated after insert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
pub struct Submission {
    #[schema(value_type = i64)]
    pub id: Id,
    pub name: String,
    pub email: String,
    pub message: String,
    pub ip_address: Option<String>,  // resolved source address
    pub user_agent: Option<String>,  // client descriptor
    pub created_at: DateTime<Utc>,
}

/// Insert payload; id and created_at are assigned by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewSubmission {
    pub name: String,
    pub email: String,
    pub message: String,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

/// Body of `POST /api/v1/feedback` as sent by the form.
///
/// Fields are kept as loose JSON so a wrongly typed value still reaches the
/// anti-forgery check and is then reported against its field.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct SubmissionForm {
    #[serde(default)]
    #[schema(value_type = Option<String>)]
    pub name: Option<Value>,
    #[serde(default)]
    #[schema(value_type = Option<String>)]
    pub email: Option<Value>,
    #[serde(default)]
    #[schema(value_type = Option<String>)]
    pub message: Option<Value>,
    #[serde(default)]
    #[schema(value_type = Option<String>)]
    pub nonce: Option<Value>,
}

impl SubmissionForm {
    /// Form-scoped token, if one was sent as a string.
    pub fn nonce(&self) -> Option<&str> {
        self.nonce.as_ref().and_then(Value::as_str)
    }

    pub fn raw(&self) -> RawFeedback<'_> {
        RawFeedback { name: raw_text(&self.name), email: raw_text(&self.email), message: raw_text(&self.message) }
    }
}

fn raw_text(value: &Option<Value>) -> RawText<'_> {
    match value {
        None | Some(Value::Null) => RawText::Missing,
        Some(Value::String(s)) => RawText::Text(s),
        Some(_) => RawText::NotText,
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SubmitResponse {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DeleteResponse {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct BulkDeleteRequest {
    #[schema(value_type = Vec<i64>)]
    pub ids: Vec<Id>,
    #[serde(default)]
    pub nonce: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BulkDeleteResponse {
    pub success: bool,
    pub deleted: u64,
    pub message: String,
}

/// Counters shown above the admin table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct FeedbackStats {
    pub total: i64,
    pub today: i64,
    pub week: i64,
}

/// Everything a rendered form needs to post back to the intake endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct FormBootstrap {
    pub submit_url: String,
    pub nonce: String,
    pub rest_nonce: String,
    pub strings: FormStrings,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct FormStrings {
    pub success: String,
    pub error: String,
    pub required: String,
    pub invalid_email: String,
}

impl Default for FormStrings {
    fn default() -> Self {
        Self {
            success: "Thank you for your feedback!".into(),
            error: "Something went wrong. Please try again.".into(),
            required: "This field is required.".into(),
            invalid_email: "Please enter a valid email address.".into(),
        }
    }
}

/// Admin-side nonces, one per destructive or export action.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AdminNonces {
    pub delete: String,
    pub bulk_delete: String,
    pub export: String,
}
