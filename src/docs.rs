use crate::{
    models::{
        AuditBatchRequest, AuditStats, Job, JobAccepted, JobKind, JobStats, Operator, ScanRequest,
        ScanStats, ScanStrategy, StatusItem, StatusRefreshRequest, StatusStats,
    },
    response::ApiResponse,
};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::handlers::system::health_check,
        crate::handlers::scan::start_range_scan,
        crate::handlers::audit::start_audit_batch,
        crate::handlers::status::start_status_refresh,
        crate::handlers::jobs::get_job,
    ),
    components(
        schemas(
            Operator,
            ScanStrategy,
            ScanRequest,
            AuditBatchRequest,
            StatusItem,
            StatusRefreshRequest,
            ScanStats,
            AuditStats,
            StatusStats,
            JobKind,
            JobStats,
            Job,
            JobAccepted,
            ApiResponse<JobAccepted>,
            ApiResponse<Job>,
        )
    ),
    tags(
        (name = "jobs", description = "Background scan, audit and status jobs"),
        (name = "system", description = "Liveness")
    ),
    info(
        title = "Solicitud Scanner API",
        version = "0.1.0",
        description = "Schedules solicitud scans against the Autogeneracion portals and reports results by webhook",
        license(
            name = "CC BY-NC-SA 4.0",
            url = "https://creativecommons.org/licenses/by-nc-sa/4.0/"
        )
    ),
    servers(
        (url = "http://localhost:8080", description = "Local")
    )
)]
pub struct ApiDoc;
