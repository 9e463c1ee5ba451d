//! Shared application state

use std::sync::Arc;

use axum::extract::FromRef;
use rpms_common::{
    auth::{IdentityService, JwtManager},
    config::AppConfig,
    db::WorkflowStore,
    errors::{AppError, Result},
    workflow::WorkflowService,
};

use crate::middleware::rate_limit::{create_rate_limiter, GlobalRateLimiter};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub workflow: WorkflowService,
    pub identity: IdentityService,
    pub jwt: Arc<JwtManager>,
    /// `None` when rate limiting is switched off
    pub limiter: Option<Arc<GlobalRateLimiter>>,
}

impl AppState {
    pub fn new(config: Arc<AppConfig>, store: Arc<dyn WorkflowStore>) -> Result<Self> {
        let secret = config
            .auth
            .jwt_secret
            .as_deref()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| AppError::Configuration {
                message: "auth.jwt_secret must be set".to_string(),
            })?;
        let jwt = Arc::new(JwtManager::new(secret, config.auth.jwt_expiration_secs));

        let limiter = config.rate_limit.enabled.then(|| {
            create_rate_limiter(config.rate_limit.requests_per_second, config.rate_limit.burst)
        });

        Ok(Self {
            workflow: WorkflowService::new(store.clone(), config.workflow.clone()),
            identity: IdentityService::new(store, jwt.clone()),
            jwt,
            limiter,
            config,
        })
    }
}

impl FromRef<AppState> for Arc<JwtManager> {
    fn from_ref(state: &AppState) -> Self {
        state.jwt.clone()
    }
}
