use std::sync::Arc;
use std::time::Duration;

use actix_web::{http::header, web, Either, HttpRequest, HttpResponse};
use chrono::Utc;
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Deserialize;
use tracing::{error, info};
use utoipa::IntoParams;

use crate::auth::AdminAuth;
use crate::client::ClientMeta;
use crate::error::ApiError;
use crate::export;
use crate::intake::{IntakeRequest, IntakeService};
use crate::listing::{ListParams, ListQuery};
use crate::models::*;
use crate::nonce::{Action, NonceIssuer, NONCE_HEADER};
use crate::repo::{with_timeout, FeedbackRepo, RepoError};

pub const SUBMIT_PATH: &str = "/api/v1/feedback";

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().error_handler(|err, _| {
        info!("rejected request body: {err}");
        ApiError::BadRequest("Malformed request body.").into()
    }))
    .app_data(web::FormConfig::default().error_handler(|err, _| {
        info!("rejected form body: {err}");
        ApiError::BadRequest("Malformed request body.").into()
    }))
    .app_data(web::PathConfig::default().error_handler(|_, _| ApiError::BadRequest("Invalid feedback ID.").into()))
    .app_data(web::QueryConfig::default().error_handler(|_, _| ApiError::BadRequest("Invalid query parameters.").into()));

    cfg.service(
        web::scope("/api/v1")
            .service(web::resource("/feedback").route(web::post().to(submit_feedback)))
            .service(web::resource("/feedback/form").route(web::get().to(form_bootstrap)))
            // Admin endpoints
            .service(web::resource("/admin/feedback").route(web::get().to(list_feedback)))
            .service(web::resource("/admin/feedback/stats").route(web::get().to(feedback_stats)))
            .service(web::resource("/admin/feedback/export").route(web::get().to(export_feedback)))
            .service(web::resource("/admin/feedback/bulk-delete").route(web::post().to(bulk_delete_feedback)))
            .service(web::resource("/admin/feedback/{id}").route(web::delete().to(delete_feedback)))
            .service(web::resource("/admin/nonces").route(web::get().to(admin_nonces))),
    );
    cfg.route("/metrics", web::get().to(render_metrics));
}

/// Shared handler state, built once in `main` and injected with `web::Data`.
#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<dyn FeedbackRepo>,
    pub intake: IntakeService,
    pub nonces: NonceIssuer,
    pub storage_timeout: Duration,
    pub metrics: Option<PrometheusHandle>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct NonceQuery {
    /// Action-scoped anti-forgery token.
    pub nonce: Option<String>,
}

fn logged(context: &'static str) -> impl FnOnce(RepoError) -> ApiError {
    move |e| {
        error!("{context}: {e}");
        ApiError::from(e)
    }
}

#[utoipa::path(
    get,
    path = "/api/v1/feedback/form",
    responses((status = 200, description = "Form bootstrap: submit URL, nonces and UI strings", body = FormBootstrap))
)]
pub async fn form_bootstrap(data: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let boot = FormBootstrap {
        submit_url: SUBMIT_PATH.to_string(),
        nonce: data.nonces.issue(Action::FeedbackForm)?,
        rest_nonce: data.nonces.issue(Action::Api)?,
        strings: FormStrings::default(),
    };
    Ok(HttpResponse::Ok().insert_header((header::CACHE_CONTROL, "no-store")).json(boot))
}

#[utoipa::path(
    post,
    path = "/api/v1/feedback",
    request_body = SubmissionForm,
    params(("X-Feedback-Nonce" = Option<String>, Header, description = "API-scoped fallback token")),
    responses(
        (status = 200, description = "Feedback stored", body = SubmitResponse),
        (status = 400, description = "A field failed validation", body = ApiErrorBody),
        (status = 403, description = "Anti-forgery check failed", body = ApiErrorBody),
        (status = 429, description = "Submitted too recently from this address", body = ApiErrorBody),
        (status = 500, description = "Storage failure", body = ApiErrorBody)
    )
)]
pub async fn submit_feedback(
    req: HttpRequest,
    data: web::Data<AppState>,
    payload: Either<web::Json<SubmissionForm>, web::Form<SubmissionForm>>,
) -> Result<HttpResponse, ApiError> {
    let form = match payload {
        Either::Left(json) => json.into_inner(),
        Either::Right(form) => form.into_inner(),
    };
    let intake = IntakeRequest {
        form,
        header_nonce: req.headers().get(NONCE_HEADER).and_then(|v| v.to_str().ok()).map(str::to_string),
        meta: ClientMeta::from_request(&req),
    };
    let receipt = data.intake.submit(intake).await?;
    Ok(HttpResponse::Ok().json(SubmitResponse { success: true, message: receipt.message.to_string() }))
}

#[utoipa::path(
    get,
    path = "/api/v1/admin/feedback",
    params(ListParams),
    responses(
        (status = 200, description = "One page of submissions (20 per page)", body = Page),
        (status = 401, description = "Missing or invalid bearer token", body = ApiErrorBody),
        (status = 403, description = "Admins only", body = ApiErrorBody)
    ),
    security(("bearer" = []))
)]
pub async fn list_feedback(_admin: AdminAuth, data: web::Data<AppState>, query: web::Query<ListParams>) -> Result<HttpResponse, ApiError> {
    let query = ListQuery::from(query.into_inner());
    let page = with_timeout(data.storage_timeout, data.repo.list(&query, Utc::now()))
        .await
        .map_err(logged("listing feedback"))?;
    Ok(HttpResponse::Ok().json(page))
}

#[utoipa::path(
    get,
    path = "/api/v1/admin/feedback/stats",
    responses((status = 200, description = "Totals: all time, today, last 7 days", body = FeedbackStats)),
    security(("bearer" = []))
)]
pub async fn feedback_stats(_admin: AdminAuth, data: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let stats = with_timeout(data.storage_timeout, data.repo.stats(Utc::now()))
        .await
        .map_err(logged("feedback stats"))?;
    Ok(HttpResponse::Ok().json(stats))
}

#[utoipa::path(
    get,
    path = "/api/v1/admin/nonces",
    responses((status = 200, description = "Nonces for delete, bulk delete and export", body = AdminNonces)),
    security(("bearer" = []))
)]
pub async fn admin_nonces(_admin: AdminAuth, data: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let nonces = AdminNonces {
        delete: data.nonces.issue(Action::DeleteFeedback)?,
        bulk_delete: data.nonces.issue(Action::BulkDeleteFeedback)?,
        export: data.nonces.issue(Action::ExportFeedbackCsv)?,
    };
    Ok(HttpResponse::Ok().json(nonces))
}

#[utoipa::path(
    delete,
    path = "/api/v1/admin/feedback/{id}",
    params(("id" = i64, Path, description = "Submission id"), NonceQuery),
    responses(
        (status = 200, description = "Deleted", body = DeleteResponse),
        (status = 400, description = "Invalid feedback ID", body = ApiErrorBody),
        (status = 403, description = "Bad nonce or not an admin", body = ApiErrorBody),
        (status = 404, description = "No such submission", body = ApiErrorBody)
    ),
    security(("bearer" = []))
)]
pub async fn delete_feedback(
    admin: AdminAuth,
    data: web::Data<AppState>,
    path: web::Path<Id>,
    query: web::Query<NonceQuery>,
) -> Result<HttpResponse, ApiError> {
    data.nonces.verify_opt(query.nonce.as_deref(), Action::DeleteFeedback)?;
    let id = path.into_inner();
    if id <= 0 {
        return Err(ApiError::BadRequest("Invalid feedback ID."));
    }
    match with_timeout(data.storage_timeout, data.repo.delete(id)).await {
        Ok(()) => {}
        Err(RepoError::NotFound) => return Err(ApiError::NotFound("Failed to delete feedback.")),
        Err(e) => return Err(logged("deleting feedback")(e)),
    }
    metrics::counter!("feedback_deleted_total", "mode" => "single").increment(1);
    info!(id, by = %admin.0.sub, "feedback deleted");
    Ok(HttpResponse::Ok().json(DeleteResponse { success: true, message: "Feedback deleted successfully.".into() }))
}

#[utoipa::path(
    post,
    path = "/api/v1/admin/feedback/bulk-delete",
    request_body = BulkDeleteRequest,
    responses(
        (status = 200, description = "Existing ids removed, unknown ids ignored", body = BulkDeleteResponse),
        (status = 403, description = "Bad nonce or not an admin", body = ApiErrorBody)
    ),
    security(("bearer" = []))
)]
pub async fn bulk_delete_feedback(
    admin: AdminAuth,
    data: web::Data<AppState>,
    payload: web::Json<BulkDeleteRequest>,
) -> Result<HttpResponse, ApiError> {
    let BulkDeleteRequest { mut ids, nonce } = payload.into_inner();
    data.nonces.verify_opt(nonce.as_deref(), Action::BulkDeleteFeedback)?;
    ids.retain(|id| *id > 0);
    ids.sort_unstable();
    ids.dedup();
    let deleted = with_timeout(data.storage_timeout, data.repo.delete_many(&ids))
        .await
        .map_err(logged("bulk deleting feedback"))?;
    metrics::counter!("feedback_deleted_total", "mode" => "bulk").increment(deleted);
    info!(requested = ids.len(), deleted, by = %admin.0.sub, "feedback bulk deleted");
    Ok(HttpResponse::Ok().json(BulkDeleteResponse {
        success: true,
        deleted,
        message: "Selected feedback deleted successfully.".into(),
    }))
}

#[utoipa::path(
    get,
    path = "/api/v1/admin/feedback/export",
    params(NonceQuery),
    responses(
        (status = 200, description = "UTF-8 CSV with BOM, newest first", body = String, content_type = "text/csv"),
        (status = 403, description = "Bad nonce or not an admin", body = ApiErrorBody)
    ),
    security(("bearer" = []))
)]
pub async fn export_feedback(admin: AdminAuth, data: web::Data<AppState>, query: web::Query<NonceQuery>) -> Result<HttpResponse, ApiError> {
    data.nonces.verify_opt(query.nonce.as_deref(), Action::ExportFeedbackCsv)?;
    let rows = with_timeout(data.storage_timeout, data.repo.export_all())
        .await
        .map_err(logged("exporting feedback"))?;
    let body = export::render_csv(&rows).map_err(|e| {
        error!("rendering csv: {e}");
        ApiError::Internal
    })?;
    metrics::counter!("feedback_exports_total").increment(1);
    info!(rows = rows.len(), by = %admin.0.sub, "feedback exported");
    Ok(HttpResponse::Ok()
        .insert_header((header::CONTENT_TYPE, "text/csv; charset=utf-8"))
        .insert_header((header::CONTENT_DISPOSITION, format!("attachment; filename={}", export::file_name(Utc::now()))))
        .body(body))
}

pub async fn render_metrics(data: web::Data<AppState>) -> HttpResponse {
    match &data.metrics {
        Some(handle) => HttpResponse::Ok().content_type("text/plain; version=0.0.4").body(handle.render()),
        None => HttpResponse::NotFound().finish(),
    }
}
