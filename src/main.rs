use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{middleware::Compress, web, App, HttpServer};
use anyhow::Context;
use metrics_exporter_prometheus::PrometheusBuilder;
use sqlx::postgres::PgPoolOptions;
use tracing::{info, warn, Level};
use tracing_actix_web::TracingLogger;
use tracing_subscriber::EnvFilter;
use utoipa::OpenApi; // bring trait into scope for ApiDoc::openapi()
use utoipa_swagger_ui::SwaggerUi;

use feedback_manager::auth::AuthKeys;
use feedback_manager::intake::IntakeService;
use feedback_manager::nonce::NonceIssuer;
use feedback_manager::openapi::ApiDoc;
use feedback_manager::rate_limit::SubmissionRateLimiter;
use feedback_manager::repo::{inmem::InMemRepo, pg::PgRepo, FeedbackRepo};
use feedback_manager::{configure, AppConfig, AppState, SecurityHeaders};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Load .env automatically only in debug builds.
    if cfg!(debug_assertions) {
        let _ = dotenv::dotenv();
    }

    let cfg = match AppConfig::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Invalid configuration: {e}");
            eprintln!("Please copy .env.example to .env and configure it");
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .init();

    info!("Bootstrapping feedback manager");
    info!(
        window_secs = cfg.rate_limit.window.as_secs(),
        enabled = cfg.rate_limit.enabled,
        "Submission rate limit"
    );

    let metrics = match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => Some(handle),
        Err(e) => {
            warn!("Prometheus recorder not installed, /metrics disabled: {e}");
            None
        }
    };

    let repo: Arc<dyn FeedbackRepo> = match cfg.database_url.as_deref() {
        Some(url) => {
            let pool = PgPoolOptions::new()
                .max_connections(5)
                .acquire_timeout(cfg.storage_timeout)
                .connect_lazy(url)
                .context("creating Postgres pool")?;
            let repo = PgRepo::new(pool);
            repo.migrate().await.context("running migrations")?;
            info!("Using Postgres repository backend");
            Arc::new(repo)
        }
        None => match cfg.data_dir.as_deref() {
            Some(dir) => {
                info!(dir = %dir.display(), "Using in-memory repository with JSON snapshot");
                Arc::new(InMemRepo::with_snapshot_dir(dir))
            }
            None => {
                warn!("DATABASE_URL not set; submissions are kept in memory only");
                Arc::new(InMemRepo::new())
            }
        },
    };

    let nonces = NonceIssuer::new(cfg.nonce_secret.as_bytes(), cfg.nonce_ttl);
    let intake = IntakeService::new(
        repo.clone(),
        nonces.clone(),
        SubmissionRateLimiter::new(cfg.rate_limit.clone()),
        cfg.storage_timeout,
    );
    let state = web::Data::new(AppState { repo, intake, nonces, storage_timeout: cfg.storage_timeout, metrics });
    let keys = web::Data::new(AuthKeys::new(cfg.jwt_secret.as_bytes()));

    let openapi = ApiDoc::openapi();
    info!("OpenAPI document generated");

    let frontend_url = cfg.frontend_url.clone();
    let enable_hsts = cfg.enable_hsts;
    let server = HttpServer::new(move || {
        let cors = {
            let mut c = Cors::default()
                // local dev frontends
                .allowed_origin("http://localhost:5173")
                .allowed_origin("http://127.0.0.1:5173")
                .allowed_origin("http://localhost:3000")
                .allowed_origin("http://127.0.0.1:3000")
                .allow_any_header()
                .allowed_methods(["GET", "POST", "DELETE", "OPTIONS"])
                .max_age(3600);
            if let Some(front) = frontend_url.as_deref() {
                c = c.allowed_origin(front);
            }
            c
        };

        App::new()
            .wrap(TracingLogger::default())
            .wrap(Compress::default())
            .wrap(SecurityHeaders::default().with_hsts(enable_hsts))
            .wrap(cors)
            .app_data(state.clone())
            .app_data(keys.clone())
            .configure(configure)
            .service(SwaggerUi::new("/docs").url("/docs/openapi.json", openapi.clone()))
    })
    .bind((cfg.bind_addr.as_str(), cfg.port))
    .with_context(|| format!("binding {}:{}", cfg.bind_addr, cfg.port))?;

    info!("Listening on http://{}:{}", cfg.bind_addr, cfg.port);

    server.run().await?;
    Ok(())
}
