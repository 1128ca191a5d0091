mod common;

use actix_web::{test, App};
use feedback_manager::configure;
use feedback_manager::nonce::Action;
use feedback_manager::rate_limit::RateLimitConfig;
use feedback_manager::repo::FeedbackRepo;
use feedback_manager::repo::inmem::InMemRepo;
use serde_json::{json, Value};
use std::sync::Arc;

use common::*;

fn ana(nonce: Option<String>) -> Value {
    json!({ "name": "Ana", "email": "ana@x.com", "message": "Great tool", "nonce": nonce })
}

#[actix_web::test]
async fn submit_then_throttled_from_same_address() {
    let (state, repo) = state();
    let app = test::init_service(App::new().app_data(state).app_data(keys()).configure(configure)).await;

    let req = test::TestRequest::post()
        .uri("/api/v1/feedback")
        .insert_header(("Client-IP", "1.2.3.4"))
        .insert_header(("User-Agent", "integration-test"))
        .set_json(ana(Some(nonce(Action::FeedbackForm))))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["message"], "Thank you for your feedback!");

    let rows = repo.export_all().await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].name, "Ana");
    assert_eq!(rows[0].ip_address.as_deref(), Some("1.2.3.4"));
    assert_eq!(rows[0].user_agent.as_deref(), Some("integration-test"));

    // second attempt within the window
    let req = test::TestRequest::post()
        .uri("/api/v1/feedback")
        .insert_header(("Client-IP", "1.2.3.4"))
        .set_json(ana(Some(nonce(Action::FeedbackForm))))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 429);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["code"], "rate_limit");
    assert_eq!(body["message"], "Please wait 30 seconds before submitting another feedback.");
    assert_eq!(repo.export_all().await.unwrap().len(), 1);

    // a different address is unaffected
    let req = test::TestRequest::post()
        .uri("/api/v1/feedback")
        .insert_header(("Client-IP", "5.6.7.8"))
        .set_json(ana(Some(nonce(Action::FeedbackForm))))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 200);
}

#[actix_web::test]
async fn missing_or_wrong_nonce_is_forbidden_and_stores_nothing() {
    let (state, repo) = state();
    let app = test::init_service(App::new().app_data(state).app_data(keys()).configure(configure)).await;

    for token in [None, Some("garbage".to_string()), Some(nonce(Action::DeleteFeedback))] {
        let req = test::TestRequest::post().uri("/api/v1/feedback").set_json(ana(token)).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 403);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["code"], "invalid_nonce");
        assert_eq!(body["message"], "Security check failed. Please refresh the page and try again.");
    }
    assert!(repo.export_all().await.unwrap().is_empty());
}

#[actix_web::test]
async fn nonce_from_other_secret_is_rejected() {
    let (state, _repo) = state();
    let app = test::init_service(App::new().app_data(state).app_data(keys()).configure(configure)).await;
    let foreign = feedback_manager::nonce::NonceIssuer::new(b"some-other-secret-0123456789abcdef", std::time::Duration::from_secs(60))
        .issue(Action::FeedbackForm)
        .unwrap();
    let req = test::TestRequest::post().uri("/api/v1/feedback").set_json(ana(Some(foreign))).to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 403);
}

#[actix_web::test]
async fn invalid_field_reports_which_one() {
    let (state, repo) = state();
    let app = test::init_service(App::new().app_data(state).app_data(keys()).configure(configure)).await;

    let cases = [
        (json!({ "name": "   ", "email": "ana@x.com", "message": "hi" }), "name", "Name is required."),
        (json!({ "name": "Ana", "email": "not-an-email", "message": "hi" }), "email", "Please enter a valid email address."),
        (json!({ "name": "Ana", "email": "ana@x.com", "message": "<b></b>" }), "message", "Message is required."),
        (
            json!({ "name": "Ana", "email": "ana@x.com", "message": "a".repeat(5001) }),
            "message",
            "Message must be at most 5000 characters.",
        ),
    ];
    for (mut payload, field, message) in cases {
        payload["nonce"] = json!(nonce(Action::FeedbackForm));
        let req = test::TestRequest::post().uri("/api/v1/feedback").set_json(&payload).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 400, "payload {payload}");
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["code"], "invalid_field");
        assert_eq!(body["field"], field);
        assert_eq!(body["message"], message);
    }
    assert!(repo.export_all().await.unwrap().is_empty());
}

#[actix_web::test]
async fn api_header_nonce_is_accepted_as_fallback() {
    let (state, repo) = state();
    let app = test::init_service(App::new().app_data(state).app_data(keys()).configure(configure)).await;

    // form-scoped token in the header is not enough
    let req = test::TestRequest::post()
        .uri("/api/v1/feedback")
        .insert_header(("X-Feedback-Nonce", nonce(Action::FeedbackForm)))
        .set_json(ana(None))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 403);

    let req = test::TestRequest::post()
        .uri("/api/v1/feedback")
        .insert_header(("X-Feedback-Nonce", nonce(Action::Api)))
        .set_json(ana(Some("stale".into())))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 200);
    assert_eq!(repo.export_all().await.unwrap().len(), 1);
}

#[actix_web::test]
async fn form_encoded_body_is_sanitized_and_stored() {
    let (state, repo) = state();
    let app = test::init_service(App::new().app_data(state).app_data(keys()).configure(configure)).await;

    let form = [
        ("name", "  Ana   <script>x</script> Silva ".to_string()),
        ("email", " ana@x.com ".to_string()),
        ("message", "line one\r\nline <i>two</i>".to_string()),
        ("nonce", nonce(Action::FeedbackForm)),
    ];
    let req = test::TestRequest::post()
        .uri("/api/v1/feedback")
        .insert_header(("X-Forwarded-For", "9.9.9.9, 10.0.0.1"))
        .set_form(form)
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 200);

    let rows = repo.export_all().await.unwrap();
    assert_eq!(rows[0].name, "Ana x Silva");
    assert_eq!(rows[0].email, "ana@x.com");
    assert_eq!(rows[0].message, "line one\nline two");
    assert_eq!(rows[0].ip_address.as_deref(), Some("9.9.9.9"));
}

#[actix_web::test]
async fn disabled_rate_limit_allows_back_to_back_submissions() {
    let repo = Arc::new(InMemRepo::new());
    let state = state_with(repo.clone(), RateLimitConfig { enabled: false, ..Default::default() });
    let app = test::init_service(App::new().app_data(state).app_data(keys()).configure(configure)).await;
    for _ in 0..3 {
        let req = test::TestRequest::post()
            .uri("/api/v1/feedback")
            .insert_header(("Client-IP", "1.2.3.4"))
            .set_json(ana(Some(nonce(Action::FeedbackForm))))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), 200);
    }
    assert_eq!(repo.export_all().await.unwrap().len(), 3);
}

#[actix_web::test]
async fn form_bootstrap_hands_out_working_nonces() {
    let (state, _repo) = state();
    let app = test::init_service(App::new().app_data(state).app_data(keys()).configure(configure)).await;

    let req = test::TestRequest::get().uri("/api/v1/feedback/form").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.headers().get("cache-control").unwrap(), "no-store");
    let boot: Value = test::read_body_json(resp).await;
    assert_eq!(boot["submit_url"], "/api/v1/feedback");
    assert_eq!(boot["strings"]["success"], "Thank you for your feedback!");

    let req = test::TestRequest::post()
        .uri("/api/v1/feedback")
        .set_json(ana(boot["nonce"].as_str().map(str::to_string)))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 200);
}

#[actix_web::test]
async fn malformed_body_is_bad_request() {
    let (state, _repo) = state();
    let app = test::init_service(App::new().app_data(state).app_data(keys()).configure(configure)).await;
    let req = test::TestRequest::post()
        .uri("/api/v1/feedback")
        .insert_header(("Content-Type", "application/json"))
        .set_payload("{not json")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);
}

#[actix_web::test]
async fn wrongly_typed_fields_still_hit_the_security_gate_first() {
    let (state, repo) = state();
    let app = test::init_service(App::new().app_data(state).app_data(keys()).configure(configure)).await;

    let bodies = [
        json!({ "name": null, "email": "ana@x.com", "message": "hi" }),
        json!({ "name": 123, "email": "ana@x.com", "message": "hi" }),
        json!({ "name": "Ana", "email": ["ana@x.com"], "message": { "text": "hi" } }),
        json!({ "name": "Ana", "email": "ana@x.com", "message": "hi", "nonce": 7 }),
    ];
    for body in bodies {
        let req = test::TestRequest::post().uri("/api/v1/feedback").set_json(&body).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 403, "body {body}");
        let out: Value = test::read_body_json(resp).await;
        assert_eq!(out["code"], "invalid_nonce");
    }
    assert!(repo.export_all().await.unwrap().is_empty());
}

#[actix_web::test]
async fn wrongly_typed_fields_with_valid_nonce_name_the_field() {
    let (state, repo) = state();
    let app = test::init_service(App::new().app_data(state).app_data(keys()).configure(configure)).await;

    let cases = [
        (json!({ "name": null, "email": "ana@x.com", "message": "hi" }), "name", "Name is required."),
        (json!({ "name": 123, "email": "ana@x.com", "message": "hi" }), "name", "Name must be text."),
        (json!({ "name": "Ana", "email": false, "message": "hi" }), "email", "Email must be text."),
        (json!({ "name": "Ana", "email": "ana@x.com", "message": ["hi"] }), "message", "Message must be text."),
    ];
    for (mut payload, field, message) in cases {
        payload["nonce"] = json!(nonce(Action::FeedbackForm));
        let req = test::TestRequest::post().uri("/api/v1/feedback").set_json(&payload).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 400, "payload {payload}");
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["code"], "invalid_field");
        assert_eq!(body["field"], field);
        assert_eq!(body["message"], message);
    }
    assert!(repo.export_all().await.unwrap().is_empty());
}
