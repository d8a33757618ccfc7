pub mod clock;
pub mod config;
pub mod events;
pub mod models;
pub mod object_storage;
pub mod routes;
pub mod schema;
pub mod services;
pub mod store;

use std::sync::Arc;

use clock::Clock;
use config::{AppConfig, EnginePolicy};
use events::Notifier;
use object_storage::ObjectStorage;
use services::audit::{AuditLog, AuditSink};
use services::interests::InterestService;
use services::messaging::MessagingGate;
use services::photos::PhotoService;
use services::rate_limiter::RateLimiter;
use services::visibility::VisibilityResolver;
use store::AccessStore;

/// Collaborators the engine is built over. Production wires Postgres, RabbitMQ and MinIO;
/// tests wire the in-memory versions.
pub struct EngineDeps {
    pub store: Arc<dyn AccessStore>,
    pub clock: Arc<dyn Clock>,
    pub audit_sink: Arc<dyn AuditSink>,
    pub notifier: Arc<dyn Notifier>,
    pub storage: Arc<dyn ObjectStorage>,
}

/// Single entry point for every access-controlled action.
pub struct AccessEngine {
    pub interests: InterestService,
    pub rate_limiter: Arc<RateLimiter>,
    pub visibility: Arc<VisibilityResolver>,
    pub messaging: MessagingGate,
    pub photos: PhotoService,
    store: Arc<dyn AccessStore>,
}

impl AccessEngine {
    pub fn new(deps: EngineDeps, policy: EnginePolicy) -> Self {
        let EngineDeps { store, clock, audit_sink, notifier, storage } = deps;
        let audit = AuditLog::new(audit_sink, clock.clone());

        let rate_limiter = Arc::new(RateLimiter::new(
            store.clone(),
            clock.clone(),
            policy.interests.daily_quota,
        ));
        let visibility = Arc::new(VisibilityResolver::new(store.clone(), clock.clone(), audit.clone()));

        Self {
            interests: InterestService::new(
                store.clone(),
                clock.clone(),
                rate_limiter.clone(),
                notifier,
                audit.clone(),
                policy.interests,
            ),
            messaging: MessagingGate::new(store.clone(), clock.clone(), audit.clone(), policy.messaging),
            photos: PhotoService::new(
                store.clone(),
                storage,
                clock,
                visibility.clone(),
                audit,
                policy.photos,
            ),
            rate_limiter,
            visibility,
            store,
        }
    }

    pub fn store(&self) -> &Arc<dyn AccessStore> {
        &self.store
    }
}

pub struct AppState {
    pub config: AppConfig,
    pub engine: AccessEngine,
    pub rabbitmq: vivah_shared::clients::rabbitmq::RabbitMQClient,
    pub metrics_handle: metrics_exporter_prometheus::PrometheusHandle,
}
