//! Submission intake: security gate, validation, throttle, persist.
//!
//! Each request walks the stages below in order and stops at the first
//! rejection. Nothing is written unless every earlier stage passed.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, error, info, warn};

use crate::client::ClientMeta;
use crate::models::{NewSubmission, Submission, SubmissionForm};
use crate::nonce::NonceIssuer;
use crate::rate_limit::{RateLimitError, SubmissionRateLimiter};
use crate::repo::{with_timeout, FeedbackRepo, RepoError};
use crate::validation::{validate, ValidationError};

pub const THANK_YOU: &str = "Thank you for your feedback!";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntakeStage {
    Received,
    SecurityChecked,
    Validated,
    RateChecked,
    Persisted,
    Responded,
    RejectedAuth,
    RejectedValidation,
    RejectedRate,
    RejectedStorage,
}

impl IntakeStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            IntakeStage::Received => "received",
            IntakeStage::SecurityChecked => "security_checked",
            IntakeStage::Validated => "validated",
            IntakeStage::RateChecked => "rate_checked",
            IntakeStage::Persisted => "persisted",
            IntakeStage::Responded => "responded",
            IntakeStage::RejectedAuth => "rejected_auth",
            IntakeStage::RejectedValidation => "rejected_validation",
            IntakeStage::RejectedRate => "rejected_rate",
            IntakeStage::RejectedStorage => "rejected_storage",
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum IntakeError {
    #[error("anti-forgery check failed")]
    Auth,
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("throttled for {wait_secs}s")]
    RateLimited { wait_secs: u64 },
    #[error("storage: {0}")]
    Storage(#[from] RepoError),
}

impl IntakeError {
    /// Terminal state the request ended in.
    pub fn stage(&self) -> IntakeStage {
        match self {
            IntakeError::Auth => IntakeStage::RejectedAuth,
            IntakeError::Validation(_) => IntakeStage::RejectedValidation,
            IntakeError::RateLimited { .. } => IntakeStage::RejectedRate,
            IntakeError::Storage(_) => IntakeStage::RejectedStorage,
        }
    }
}

impl From<RateLimitError> for IntakeError {
    fn from(e: RateLimitError) -> Self {
        match e {
            RateLimitError::Throttled { wait_secs } => IntakeError::RateLimited { wait_secs },
            RateLimitError::Storage(e) => IntakeError::Storage(e),
        }
    }
}

/// A submission as captured when the request arrived.
#[derive(Debug, Clone, Default)]
pub struct IntakeRequest {
    pub form: SubmissionForm,
    /// API-scoped token from the request header.
    pub header_nonce: Option<String>,
    pub meta: ClientMeta,
}

#[derive(Debug, Clone)]
pub struct Receipt {
    pub submission: Submission,
    pub message: &'static str,
}

#[derive(Clone)]
pub struct IntakeService {
    repo: Arc<dyn FeedbackRepo>,
    nonces: NonceIssuer,
    limiter: SubmissionRateLimiter,
    storage_timeout: Duration,
}

impl IntakeService {
    pub fn new(repo: Arc<dyn FeedbackRepo>, nonces: NonceIssuer, limiter: SubmissionRateLimiter, storage_timeout: Duration) -> Self {
        Self { repo, nonces, limiter, storage_timeout }
    }

    pub async fn submit(&self, req: IntakeRequest) -> Result<Receipt, IntakeError> {
        let source = req.meta.ip_address.clone().unwrap_or_else(|| "-".into());
        let result = self.run(req).await;
        let outcome = match &result {
            Ok(_) => IntakeStage::Responded,
            Err(e) => e.stage(),
        };
        metrics::counter!("feedback_submissions_total", "outcome" => outcome.as_str()).increment(1);
        match &result {
            Ok(r) => info!(id = r.submission.id, %source, "feedback stored"),
            Err(IntakeError::Storage(e)) => error!(%source, "feedback intake storage failure: {e}"),
            Err(e) => warn!(%source, stage = outcome.as_str(), "feedback rejected: {e}"),
        }
        result
    }

    async fn run(&self, req: IntakeRequest) -> Result<Receipt, IntakeError> {
        let IntakeRequest { form, header_nonce, meta } = req;
        let mut stage = IntakeStage::Received;

        if !self.nonces.verify_submission(form.nonce(), header_nonce.as_deref()) {
            return Err(IntakeError::Auth);
        }
        advance(&mut stage, IntakeStage::SecurityChecked);

        let valid = validate(form.raw())?;
        advance(&mut stage, IntakeStage::Validated);

        let check = self.limiter.check(self.repo.as_ref(), meta.ip_address.as_deref(), Utc::now());
        tokio::time::timeout(self.storage_timeout, check)
            .await
            .map_err(|_| RepoError::Timeout)??;
        advance(&mut stage, IntakeStage::RateChecked);

        let new = NewSubmission {
            name: valid.name,
            email: valid.email,
            message: valid.message,
            ip_address: meta.ip_address,
            user_agent: meta.user_agent,
        };
        let submission = with_timeout(self.storage_timeout, self.repo.insert(new)).await?;
        advance(&mut stage, IntakeStage::Persisted);

        advance(&mut stage, IntakeStage::Responded);
        Ok(Receipt { submission, message: THANK_YOU })
    }
}

fn advance(stage: &mut IntakeStage, next: IntakeStage) {
    debug!(from = stage.as_str(), to = next.as_str(), "intake transition");
    *stage = next;
}
