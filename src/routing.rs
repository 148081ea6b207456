use std::sync::Arc;

use crate::config::AppConfig;
use crate::connectors::{openai::OpenAiConnector, Connector, ConnectorError};
use crate::core::capability::CapabilityClassifier;
use crate::ratelimit::{InMemoryStore, RateLimitStore, RateLimiter};

/// Shared, read-only per process. Requests never mutate it; the rate limit
/// store carries its own synchronization.
#[derive(Clone)]
pub struct AppState {
    config: Arc<AppConfig>,
    connector: Arc<dyn Connector>,
    classifier: CapabilityClassifier,
    limiter: Arc<RateLimiter>,
}

impl AppState {
    pub fn new(config: AppConfig) -> Result<Self, ConnectorError> {
        let connector = Arc::new(OpenAiConnector::new(&config.upstream)?);
        Ok(Self::with_parts(
            config,
            connector,
            CapabilityClassifier::default(),
            Arc::new(InMemoryStore::new()),
        ))
    }

    pub fn with_parts(
        config: AppConfig,
        connector: Arc<dyn Connector>,
        classifier: CapabilityClassifier,
        store: Arc<dyn RateLimitStore>,
    ) -> Self {
        let limiter = Arc::new(RateLimiter::new(store, &config.rate_limit));
        Self {
            config: Arc::new(config),
            connector,
            classifier,
            limiter,
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn connector(&self) -> Arc<dyn Connector> {
        Arc::clone(&self.connector)
    }

    pub fn classifier(&self) -> &CapabilityClassifier {
        &self.classifier
    }

    pub fn limiter(&self) -> Arc<RateLimiter> {
        Arc::clone(&self.limiter)
    }
}
