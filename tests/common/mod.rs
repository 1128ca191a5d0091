#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use actix_web::web;
use feedback_manager::auth::{AuthKeys, Role};
use feedback_manager::intake::IntakeService;
use feedback_manager::nonce::{Action, NonceIssuer};
use feedback_manager::rate_limit::{RateLimitConfig, SubmissionRateLimiter};
use feedback_manager::repo::{inmem::InMemRepo, FeedbackRepo};
use feedback_manager::AppState;

pub const JWT_SECRET: &[u8] = b"test-secret-must-be-32-bytes-long!!";
pub const NONCE_SECRET: &[u8] = b"nonce-secret-must-be-32-bytes-long!";

pub fn nonces() -> NonceIssuer {
    NonceIssuer::new(NONCE_SECRET, Duration::from_secs(3600))
}

pub fn nonce(action: Action) -> String {
    nonces().issue(action).unwrap()
}

pub fn keys() -> web::Data<AuthKeys> {
    web::Data::new(AuthKeys::new(JWT_SECRET))
}

pub fn admin_token() -> String {
    AuthKeys::new(JWT_SECRET).create_jwt("admin", vec![Role::Admin], 1).unwrap()
}

pub fn user_token() -> String {
    AuthKeys::new(JWT_SECRET).create_jwt("user", vec![Role::User], 1).unwrap()
}

pub fn bearer(token: &str) -> (&'static str, String) {
    ("Authorization", format!("Bearer {token}"))
}

pub fn state_with(repo: Arc<dyn FeedbackRepo>, rate_limit: RateLimitConfig) -> web::Data<AppState> {
    let nonces = nonces();
    let timeout = Duration::from_secs(5);
    let intake = IntakeService::new(repo.clone(), nonces.clone(), SubmissionRateLimiter::new(rate_limit), timeout);
    web::Data::new(AppState { repo, intake, nonces, storage_timeout: timeout, metrics: None })
}

pub fn state() -> (web::Data<AppState>, Arc<InMemRepo>) {
    let repo = Arc::new(InMemRepo::new());
    (state_with(repo.clone(), RateLimitConfig::default()), repo)
}
