use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::repo::{FeedbackRepo, RepoError};

/// Throttle settings; see `AppConfig` for the env variables.
#[derive(Clone, Debug)]
pub struct RateLimitConfig {
    pub enabled: bool,
    pub window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self { enabled: true, window: Duration::from_secs(30) }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum RateLimitError {
    #[error("Please wait {wait_secs} seconds before submitting another feedback.")]
    Throttled { wait_secs: u64 },
    #[error(transparent)]
    Storage(#[from] RepoError),
}

/// Sliding-window throttle evaluated against stored rows.
///
/// The limiter keeps no counters of its own: a source is throttled while any
/// persisted submission from it is younger than the window. The probe and the
/// later insert are separate statements, so two requests from one address
/// racing each other can both pass; one extra row in that case is accepted.
/// On Postgres the window is measured with the database clock, the same one
/// that stamps `created_at`.
#[derive(Clone, Debug)]
pub struct SubmissionRateLimiter {
    cfg: RateLimitConfig,
}

impl SubmissionRateLimiter {
    pub fn new(cfg: RateLimitConfig) -> Self { Self { cfg } }

    pub async fn check(&self, repo: &dyn FeedbackRepo, source: Option<&str>, now: DateTime<Utc>) -> Result<(), RateLimitError> {
        if !self.cfg.enabled { return Ok(()); }
        // nothing to key on
        let Some(source) = source.filter(|s| !s.is_empty()) else { return Ok(()) };
        let recent = repo.count_recent(source, self.cfg.window, now).await?;
        if recent > 0 {
            return Err(RateLimitError::Throttled { wait_secs: self.cfg.window.as_secs() });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewSubmission;
    use crate::repo::inmem::InMemRepo;

    fn from(ip: &str) -> NewSubmission {
        NewSubmission {
            name: "Ana".into(),
            email: "ana@x.com".into(),
            message: "Great tool".into(),
            ip_address: Some(ip.into()),
            user_agent: None,
        }
    }

    #[tokio::test]
    async fn sliding_window_against_stored_rows() {
        let repo = InMemRepo::new();
        let rl = SubmissionRateLimiter::new(RateLimitConfig::default());
        assert!(rl.check(&repo, Some("1.2.3.4"), Utc::now()).await.is_ok());

        let row = repo.insert(from("1.2.3.4")).await.unwrap();

        let soon = row.created_at + chrono::Duration::seconds(29);
        let err = rl.check(&repo, Some("1.2.3.4"), soon).await.unwrap_err();
        assert!(matches!(err, RateLimitError::Throttled { wait_secs: 30 }));
        assert_eq!(err.to_string(), "Please wait 30 seconds before submitting another feedback.");

        let later = row.created_at + chrono::Duration::seconds(31);
        assert!(rl.check(&repo, Some("1.2.3.4"), later).await.is_ok());
    }

    #[tokio::test]
    async fn other_sources_unaffected() {
        let repo = InMemRepo::new();
        repo.insert(from("1.2.3.4")).await.unwrap();
        let rl = SubmissionRateLimiter::new(RateLimitConfig::default());
        assert!(rl.check(&repo, Some("5.6.7.8"), Utc::now()).await.is_ok());
        assert!(rl.check(&repo, None, Utc::now()).await.is_ok());
    }

    #[tokio::test]
    async fn disabled_limiter_allows_everything() {
        let repo = InMemRepo::new();
        repo.insert(from("1.2.3.4")).await.unwrap();
        let rl = SubmissionRateLimiter::new(RateLimitConfig { enabled: false, ..Default::default() });
        assert!(rl.check(&repo, Some("1.2.3.4"), Utc::now()).await.is_ok());
    }
}
