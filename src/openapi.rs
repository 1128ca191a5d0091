use crate::error::ApiErrorBody;
use crate::listing::Page;
use crate::models::{
    AdminNonces, BulkDeleteRequest, BulkDeleteResponse, DeleteResponse, FeedbackStats, FormBootstrap, FormStrings,
    Submission, SubmissionForm, SubmitResponse,
};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::routes::form_bootstrap,
        crate::routes::submit_feedback,
        crate::routes::list_feedback,
        crate::routes::feedback_stats,
        crate::routes::admin_nonces,
        crate::routes::delete_feedback,
        crate::routes::bulk_delete_feedback,
        crate::routes::export_feedback,
    ),
    components(schemas(
        Submission, SubmissionForm, SubmitResponse, ApiErrorBody, Page, FeedbackStats,
        FormBootstrap, FormStrings, AdminNonces, DeleteResponse, BulkDeleteRequest, BulkDeleteResponse
    )),
    modifiers(&BearerAddon),
    tags(
        (name = "feedback", description = "Public submission form"),
        (name = "admin", description = "Listing, deletion and export"),
    )
)]
pub struct ApiDoc;

/// Registers the `bearer` scheme referenced by the admin paths.
pub struct BearerAddon;

impl Modify for BearerAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(HttpBuilder::new().scheme(HttpAuthScheme::Bearer).bearer_format("JWT").build()),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_every_route() {
        let doc = ApiDoc::openapi();
        for path in [
            "/api/v1/feedback",
            "/api/v1/feedback/form",
            "/api/v1/admin/feedback",
            "/api/v1/admin/feedback/stats",
            "/api/v1/admin/feedback/{id}",
            "/api/v1/admin/feedback/bulk-delete",
            "/api/v1/admin/feedback/export",
            "/api/v1/admin/nonces",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
    }
}
