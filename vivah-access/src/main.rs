use axum::{extract::DefaultBodyLimit, middleware, routing::{get, post, put}, Router};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use vivah_access::clock::SystemClock;
use vivah_access::config::AppConfig;
use vivah_access::events::RabbitNotifier;
use vivah_access::routes::{health, interests, messages, photos, privacy};
use vivah_access::services::audit::RabbitAuditSink;
use vivah_access::store::PgStore;
use vivah_access::{AccessEngine, AppState, EngineDeps};
use vivah_shared::clients::db::create_pool;
use vivah_shared::clients::minio::MinioClient;
use vivah_shared::clients::rabbitmq::RabbitMQClient;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    vivah_shared::middleware::init_tracing("vivah-access");

    let config = AppConfig::load()?;
    let port = config.port;

    let db = create_pool(&config.database_url, config.db_pool_size)?;
    let rabbitmq = RabbitMQClient::connect(&config.rabbitmq_url).await?;
    let minio = MinioClient::new(
        &config.minio_endpoint,
        &config.minio_access_key,
        &config.minio_secret_key,
        &config.minio_bucket,
        &config.minio_public_url,
    )
    .await;

    let metrics_handle = vivah_shared::middleware::init_metrics()?;

    let engine = AccessEngine::new(
        EngineDeps {
            store: Arc::new(PgStore::new(db)),
            clock: Arc::new(SystemClock),
            audit_sink: Arc::new(RabbitAuditSink::new(rabbitmq.clone())),
            notifier: Arc::new(RabbitNotifier::new(rabbitmq.clone())),
            storage: Arc::new(minio),
        },
        config.engine_policy(),
    );

    tracing::info!(
        daily_quota = config.daily_interest_quota,
        resend_cooldown_hours = config.resend_cooldown_hours,
        require_photo_approval = config.require_photo_approval,
        "access engine configured"
    );

    let state = Arc::new(AppState { config, engine, rabbitmq, metrics_handle });

    let app = Router::new()
        .route("/health", get(health::health_check))
        .route("/metrics", get(health::metrics))
        // Interests
        .route("/interests", post(interests::send_interest))
        .route("/interests/sent", get(interests::list_sent))
        .route("/interests/received", get(interests::list_received))
        .route("/interests/quota", get(interests::quota))
        .route("/interests/with/:id", get(interests::relationship))
        .route("/interests/:id/respond", put(interests::respond_interest))
        .route("/interests/:id/revoke", post(interests::revoke_interest))
        // Visibility
        .route("/privacy", get(privacy::get_privacy).put(privacy::update_privacy))
        .route("/profiles/:id/access", get(privacy::profile_access))
        // Messaging
        .route("/messages", post(messages::send_message))
        .route("/messages/can/:id", get(messages::can_message))
        // Photos
        .route("/photos", post(photos::upload_photo)
            .layer(DefaultBodyLimit::max(10 * 1024 * 1024)))
        .route("/users/:id/photos", get(photos::list_photos))
        .route("/photos/:id", axum::routing::delete(photos::delete_photo))
        .route("/photos/:id/primary", put(photos::set_primary))
        .route("/photos/:id/moderation", put(photos::moderate_photo))
        .layer(middleware::from_fn(vivah_shared::middleware::metrics_middleware))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = format!("0.0.0.0:{port}");
    tracing::info!(addr = %addr, "vivah-access starting");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
