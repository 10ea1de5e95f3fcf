pub mod audit_batch;
pub mod job_registry;
pub mod job_runner;
pub mod navigator;
pub mod notifier;
pub mod page_method;
pub mod portal_client;
pub mod retry;
pub mod scan_orchestrator;
pub mod site_registry;
pub mod status_diff;

pub use audit_batch::run_audit_batch;
pub use job_registry::JobRegistry;
pub use job_runner::{FinishGuard, spawn_job};
pub use navigator::{is_checkpoint, next_checkpoint};
pub use notifier::{EventDispatcher, EventSender, EventSink, WebhookNotifier};
pub use portal_client::{
    CallSettings, HttpPortalFactory, PortalFactory, PrimedSession, RemotePortal, SessionClient,
};
pub use retry::RetryPolicy;
pub use scan_orchestrator::{RangeScan, run_scan};
pub use site_registry::SiteRegistry;
pub use status_diff::run_status_refresh;
