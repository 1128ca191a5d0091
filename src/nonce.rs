//! Anti-forgery tokens.
//!
//! A nonce is a short-lived HS256 JWT whose `act` claim names the action it
//! was minted for. A token for one action never verifies for another.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

/// Header carrying the secondary, API-scoped token.
pub const NONCE_HEADER: &str = "X-Feedback-Nonce";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Minted for the public submission form.
    FeedbackForm,
    /// Generic API access, accepted as a fallback on intake.
    Api,
    DeleteFeedback,
    BulkDeleteFeedback,
    ExportFeedbackCsv,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::FeedbackForm => "feedback_form",
            Action::Api => "api",
            Action::DeleteFeedback => "delete_feedback",
            Action::BulkDeleteFeedback => "bulk_delete_feedback",
            Action::ExportFeedbackCsv => "export_feedback_csv",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct NonceClaims {
    act: String,
    iat: u64,
    exp: u64,
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum NonceError {
    #[error("nonce missing")] Missing,
    #[error("nonce expired")] Expired,
    #[error("nonce invalid")] Invalid,
    #[error("nonce minted for another action")] WrongAction,
    #[error("nonce could not be signed")] Signing,
}

#[derive(Clone)]
pub struct NonceIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl std::fmt::Debug for NonceIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NonceIssuer").field("ttl", &self.ttl).finish_non_exhaustive()
    }
}

impl NonceIssuer {
    pub fn new(secret: &[u8], ttl: std::time::Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            ttl: Duration::from_std(ttl).unwrap_or_else(|_| Duration::days(1)),
        }
    }

    pub fn issue(&self, action: Action) -> Result<String, NonceError> {
        self.issue_at(action, Utc::now())
    }

    pub fn issue_at(&self, action: Action, now: DateTime<Utc>) -> Result<String, NonceError> {
        let iat = now.timestamp().max(0) as u64;
        let exp = (now + self.ttl).timestamp().max(0) as u64;
        let claims = NonceClaims { act: action.as_str().to_string(), iat, exp };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding).map_err(|_| NonceError::Signing)
    }

    pub fn verify(&self, token: &str, action: Action) -> Result<(), NonceError> {
        if token.trim().is_empty() {
            return Err(NonceError::Missing);
        }
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        let data = decode::<NonceClaims>(token, &self.decoding, &validation).map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => NonceError::Expired,
            _ => NonceError::Invalid,
        })?;
        if data.claims.act != action.as_str() {
            return Err(NonceError::WrongAction);
        }
        Ok(())
    }

    /// Same as [`verify`](Self::verify) for an optional token.
    pub fn verify_opt(&self, token: Option<&str>, action: Action) -> Result<(), NonceError> {
        self.verify(token.ok_or(NonceError::Missing)?, action)
    }

    /// Intake gate: the form-scoped token first, then the API-scoped header
    /// token. Either one passing is enough.
    pub fn verify_submission(&self, primary: Option<&str>, secondary: Option<&str>) -> bool {
        if self.verify_opt(primary, Action::FeedbackForm).is_ok() {
            return true;
        }
        self.verify_opt(secondary, Action::Api).is_ok()
    }
}
