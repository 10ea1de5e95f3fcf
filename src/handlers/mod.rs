use std::sync::Arc;

use crate::{
    config::Config,
    error::AppResult,
    services::{
        HttpPortalFactory, JobRegistry, PortalFactory, SiteRegistry, WebhookNotifier,
    },
};

pub mod audit;
pub mod jobs;
pub mod scan;
pub mod status;
pub mod system;

pub use audit::start_audit_batch;
pub use jobs::get_job;
pub use scan::start_range_scan;
pub use status::start_status_refresh;
pub use system::{health_check, openapi_json};

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub sites: Arc<SiteRegistry>,
    pub portals: Arc<dyn PortalFactory>,
    pub jobs: JobRegistry,
    pub notifier: WebhookNotifier,
}

impl AppState {
    /// Wire the HTTP-backed portal factory and webhook notifier from configuration.
    pub fn from_config(config: &Config) -> AppResult<Self> {
        let sites = Arc::new(SiteRegistry::from_config(&config.sites)?);
        let portals = Arc::new(HttpPortalFactory::new(
            sites.clone(),
            config.remote.retry_delay(),
        ));
        let notifier = WebhookNotifier::new(config.notifier.timeout())?
            .with_queue_capacity(config.notifier.queue_capacity);
        Ok(Self {
            sites,
            portals,
            jobs: JobRegistry::new(),
            notifier,
        })
    }
}
