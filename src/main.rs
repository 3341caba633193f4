use axum::{routing::get, routing::post, Router};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::sync::Arc;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing::Dispatch;
use tracing_subscriber::EnvFilter;

use menu_pipeline::app_state::AppState;
use menu_pipeline::config::AppConfig;
use menu_pipeline::db::{self, MenuStore, PgMenuStore};
use menu_pipeline::routes;
use menu_pipeline::services::{
    dispatcher::Dispatcher,
    enrichment::MenuEnricher,
    menu_jobs::MenuJobService,
    openai::{OpenAiClient, OpenAiModels},
    photos::{PhotoSynthesisBatcher, StoredPhotoGenerator},
    pipeline::PipelineExecutor,
    storage::S3Storage,
};

#[tokio::main]
async fn main() {
    // Structured JSON logging. The same dispatcher is handed to the job
    // runner so background jobs log through it explicitly.
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .finish();
    let log = Dispatch::new(subscriber);
    tracing::dispatcher::set_global_default(log.clone())
        .expect("Failed to install tracing subscriber");

    // Load configuration from environment
    let config = AppConfig::from_env().expect("Failed to load configuration from environment");

    tracing::info!("Initializing menu-pipeline server");

    // Initialize Prometheus metrics recorder
    let prometheus_handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("Failed to install Prometheus metrics recorder");
    let prometheus_handle = Arc::new(prometheus_handle);
    describe_metrics();

    tracing::info!("Connecting to PostgreSQL database");
    let db_pool = db::init_pool(&config.database_url)
        .await
        .expect("Failed to connect to database");

    tracing::info!("Running database migrations");
    db::run_migrations(&db_pool)
        .await
        .expect("Failed to run database migrations");

    let store: Arc<dyn MenuStore> = Arc::new(PgMenuStore::new(db_pool));

    tracing::info!("Initializing object storage client");
    let storage = S3Storage::new(
        &config.s3_bucket,
        &config.s3_endpoint,
        &config.s3_region,
        &config.s3_access_key,
        &config.s3_secret_key,
        &config.s3_public_url,
    )
    .expect("Failed to initialize object storage");

    tracing::info!("Initializing OpenAI client");
    let openai = Arc::new(
        OpenAiClient::new(
            config.openai_api_key.clone(),
            config.openai_base_url.clone(),
            OpenAiModels {
                extraction: config.extraction_model.clone(),
                enrichment: config.enrichment_model.clone(),
                image: config.image_model.clone(),
            },
            config.http_timeout(),
        )
        .expect("Failed to initialize OpenAI client"),
    );

    let photos = PhotoSynthesisBatcher::new(
        store.clone(),
        Arc::new(StoredPhotoGenerator::new(openai.clone(), Arc::new(storage))),
    );
    let enricher = MenuEnricher::new(store.clone(), openai.clone(), openai.clone(), photos);
    let executor = Arc::new(PipelineExecutor::new(
        store.clone(),
        openai,
        enricher,
        log.clone(),
    ));
    let dispatcher = Arc::new(Dispatcher::new(
        executor,
        store.clone(),
        &config.pipeline(),
        log,
    ));

    let state = AppState::new(MenuJobService::new(store, dispatcher));

    let app = Router::new()
        .route("/health", get(routes::health::health_check))
        .route(
            "/api/sessions/{session_id}/menus",
            post(routes::menus::create_menus),
        )
        .route(
            "/api/menus/status/{job_id}",
            get(routes::menus::get_menu_status),
        )
        .with_state(state)
        // Prometheus metrics endpoint (separate state)
        .route(
            "/metrics",
            get(routes::metrics::prometheus_metrics).with_state(prometheus_handle),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .layer(RequestBodyLimitLayer::new(64 * 1024));

    tracing::info!(
        max_concurrent_jobs = config.max_concurrent_jobs,
        job_queue_capacity = config.job_queue_capacity,
        "Starting menu-pipeline on {}",
        config.bind_addr
    );

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .expect("Failed to bind to address");

    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app)
        .await
        .expect("Server error");
}

fn describe_metrics() {
    metrics::describe_counter!("menu_jobs_created_total", "Menu jobs created");
    metrics::describe_counter!("menu_jobs_dispatched_total", "Menu jobs admitted to the runner");
    metrics::describe_counter!(
        "menu_jobs_rejected_total",
        "Menu jobs rejected because the queue was full"
    );
    metrics::describe_counter!("menu_jobs_completed_total", "Menu jobs that reached done");
    metrics::describe_counter!("menu_jobs_failed_total", "Menu jobs that reached failed");
    metrics::describe_histogram!(
        "menu_job_duration_seconds",
        "Time from pipeline start to a terminal state"
    );
    metrics::describe_gauge!("menu_jobs_in_flight", "Pipelines currently running");
    metrics::describe_counter!("menu_photos_synthesized_total", "Dish photos generated");
    metrics::describe_counter!("menu_photos_failed_total", "Dish photo generations that failed");
}
