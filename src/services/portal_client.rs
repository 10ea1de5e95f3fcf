use async_trait::async_trait;
use reqwest::{
    Client,
    header::{
        ACCEPT, CONTENT_LENGTH, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue, ORIGIN, REFERER,
    },
};
use serde_json::{Value as JsonValue, json};
use std::{sync::Arc, time::Duration};
use tracing::debug;

use crate::{
    error::{AppError, AppResult},
    models::{
        AuditEntry, AuditFetchResult, FullFetchResult, Operator, PageMethod, SiteDescriptor,
        StatusSnapshot, ValidationResult, normalize_audit_payload,
    },
    services::{
        page_method::{ENC_QUERY_PREFIX, encode_query_token, is_truthy, unwrap_envelope},
        retry::RetryPolicy,
        site_registry::SiteRegistry,
    },
};

const XHR_ACCEPT: &str = "application/json, text/javascript, */*; q=0.01";
const JSON_CONTENT_TYPE: &str = "application/json; charset=UTF-8";

/// Form page URL that was primed with an encrypted query.
///
/// Only `prime` hands these out, and `fetch` sends exactly this URL as the
/// `Referer`, so a loader call can never go out against an unprimed page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrimedSession {
    url: String,
}

impl PrimedSession {
    pub(crate) fn new(url: String) -> Self {
        Self { url }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

/// The four-step page-method protocol of one operator's portal.
///
/// Implementations own one connection pool for their whole lifetime and
/// apply the retry policy to every step.
#[async_trait]
pub trait RemotePortal: Send + Sync {
    fn operator(&self) -> Operator;

    /// `ValidaSolicitud`
    async fn validate(&self, id: i64) -> AppResult<ValidationResult>;

    /// `Encryptar`; returns a `?enc=` query fragment
    async fn encrypt(&self, id: i64) -> AppResult<String>;

    /// GET the form page with the token to establish server-side state
    async fn prime(&self, token: &str) -> AppResult<PrimedSession>;

    /// Zero-length POST to a loader on the primed form page
    async fn fetch(&self, session: &PrimedSession, method: PageMethod) -> AppResult<JsonValue>;

    /// Encrypt, prime and load the full record of an id already known to be valid.
    ///
    /// A malformed `Encryptar` answer yields the warning variant instead of an error.
    async fn full_fetch(&self, id: i64) -> AppResult<FullFetchResult> {
        let enc_query = match self.encrypt(id).await {
            Ok(token) => token,
            Err(AppError::UnexpectedToken(encryptar_raw)) => {
                return Ok(FullFetchResult::Warning {
                    warning: "Encryptar unexpected payload".to_string(),
                    encryptar_raw,
                });
            }
            Err(e) => return Err(e),
        };
        let session = self.prime(&enc_query).await?;
        let data = self.fetch(&session, PageMethod::LoadRecord).await?;
        Ok(FullFetchResult::Loaded {
            enc_query,
            referer_used: session.url,
            data,
        })
    }

    /// Validate, then load the audit trail. `None` when the id is not valid.
    async fn audit_fetch(&self, id: i64) -> AppResult<Option<AuditFetchResult>> {
        if !self.validate(id).await?.valid {
            return Ok(None);
        }
        let token = self.encrypt(id).await?;
        let session = self.prime(&token).await?;
        let audit = self.audit_for_session(&session).await?;
        Ok(Some(AuditFetchResult {
            id,
            referer_used: session.url,
            audit,
        }))
    }

    /// Validate, then read the current status from the record loader.
    ///
    /// The primed session is returned so the audit trail can be loaded
    /// through the same page context.
    async fn status_fetch(&self, id: i64) -> AppResult<Option<(StatusSnapshot, PrimedSession)>> {
        if !self.validate(id).await?.valid {
            return Ok(None);
        }
        let token = self.encrypt(id).await?;
        let session = self.prime(&token).await?;
        let record = self.fetch(&session, PageMethod::LoadRecord).await?;
        Ok(Some((StatusSnapshot::from_record(&record), session)))
    }

    async fn audit_for_session(&self, session: &PrimedSession) -> AppResult<Vec<AuditEntry>> {
        let payload = self.fetch(session, PageMethod::LoadAudit).await?;
        Ok(normalize_audit_payload(payload))
    }
}

/// Per-job timeout and retry budget
#[derive(Debug, Clone, Copy)]
pub struct CallSettings {
    pub timeout: Duration,
    pub retries: u32,
}

impl CallSettings {
    pub fn new(timeout_secs: u64, retries: u32) -> Self {
        Self {
            timeout: Duration::from_secs(timeout_secs),
            retries,
        }
    }
}

/// Opens one portal session per job (or per operator within a batch)
pub trait PortalFactory: Send + Sync {
    fn open(&self, operator: Operator, settings: CallSettings) -> AppResult<Box<dyn RemotePortal>>;
}

/// Factory backed by real HTTP clients
#[derive(Debug, Clone)]
pub struct HttpPortalFactory {
    registry: Arc<SiteRegistry>,
    retry_delay: Duration,
}

impl HttpPortalFactory {
    pub fn new(registry: Arc<SiteRegistry>, retry_delay: Duration) -> Self {
        Self {
            registry,
            retry_delay,
        }
    }
}

impl PortalFactory for HttpPortalFactory {
    fn open(&self, operator: Operator, settings: CallSettings) -> AppResult<Box<dyn RemotePortal>> {
        let site = self.registry.site_for(operator)?;
        let http = self.registry.build_client(operator, settings.timeout)?;
        let retry = RetryPolicy::new(settings.retries, self.retry_delay);
        Ok(Box::new(SessionClient::new(http, site, retry)))
    }
}

/// HTTP implementation of [`RemotePortal`] bound to one site
#[derive(Debug, Clone)]
pub struct SessionClient {
    http: Client,
    site: Arc<SiteDescriptor>,
    retry: RetryPolicy,
}

impl SessionClient {
    pub fn new(http: Client, site: Arc<SiteDescriptor>, retry: RetryPolicy) -> Self {
        Self { http, site, retry }
    }

    fn xhr_headers(&self, referer: &str) -> AppResult<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(XHR_ACCEPT));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(JSON_CONTENT_TYPE));
        headers.insert(
            HeaderName::from_static("x-requested-with"),
            HeaderValue::from_static("XMLHttpRequest"),
        );
        headers.insert(ORIGIN, header_value(self.site.origin())?);
        headers.insert(REFERER, header_value(referer)?);
        Ok(headers)
    }

    /// One POST attempt; non-2xx statuses are transport failures.
    async fn post_once(
        &self,
        url: &str,
        body: Option<&JsonValue>,
        referer: &str,
        label: &str,
    ) -> AppResult<JsonValue> {
        let mut request = self.http.post(url).headers(self.xhr_headers(referer)?);
        request = match body {
            Some(json_body) => request.json(json_body),
            None => request.header(CONTENT_LENGTH, 0).body(Vec::<u8>::new()),
        };

        let response = request
            .send()
            .await
            .map_err(|e| AppError::transport(format!("{} request failed: {}", label, e)))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| AppError::transport(format!("{} failed reading body: {}", label, e)))?;

        if !status.is_success() {
            return Err(AppError::transport(format!(
                "{} returned status {}: {}",
                label,
                status,
                text.chars().take(200).collect::<String>()
            )));
        }

        debug!(len = text.len(), "{} response", label);
        let json: JsonValue = serde_json::from_str(&text).map_err(|e| {
            AppError::protocol(
                "decode",
                format!(
                    "{} returned non-JSON body ({}): {}",
                    label,
                    e,
                    text.chars().take(200).collect::<String>()
                ),
            )
        })?;
        Ok(unwrap_envelope(json))
    }
}

fn header_value(value: &str) -> AppResult<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|e| AppError::config(format!("invalid header value {:?}: {}", value, e)))
}

#[async_trait]
impl RemotePortal for SessionClient {
    fn operator(&self) -> Operator {
        self.site.operator
    }

    async fn validate(&self, id: i64) -> AppResult<ValidationResult> {
        let url = self.site.validate_url();
        let referer = self.site.home_referer();
        let body = json!({"ID_SOLICITUD": id.to_string(), "EMAIL": ""});
        let label = format!("ValidaSolicitud {}", id);

        let raw = self
            .retry
            .execute(|| self.post_once(&url, Some(&body), &referer, &label), &label)
            .await?;

        let valid = is_truthy(&raw);
        debug!(id, valid, operator = %self.site.operator, "validated");
        Ok(ValidationResult { id, valid, raw })
    }

    async fn encrypt(&self, id: i64) -> AppResult<String> {
        let url = self.site.encrypt_url();
        let referer = self.site.home_referer();
        let body = json!({"strParameter": format!("ID_SOLICITUD={}", id)});
        let label = format!("Encryptar {}", id);

        let payload = self
            .retry
            .execute(|| self.post_once(&url, Some(&body), &referer, &label), &label)
            .await?;

        match payload {
            JsonValue::String(token) if token.starts_with(ENC_QUERY_PREFIX) => Ok(token),
            other => Err(AppError::UnexpectedToken(other)),
        }
    }

    async fn prime(&self, token: &str) -> AppResult<PrimedSession> {
        let url = format!("{}{}", self.site.form_page(), encode_query_token(token));
        let label = "WFSolicitud prime";

        self.retry
            .execute(
                || async {
                    let response = self
                        .http
                        .get(&url)
                        .send()
                        .await
                        .map_err(|e| AppError::transport(format!("{} failed: {}", label, e)))?;
                    let status = response.status();
                    if !status.is_success() {
                        return Err(AppError::transport(format!(
                            "{} returned status {}",
                            label, status
                        )));
                    }
                    Ok(())
                },
                label,
            )
            .await?;

        debug!(url = %url, "form primed");
        Ok(PrimedSession::new(url))
    }

    async fn fetch(&self, session: &PrimedSession, method: PageMethod) -> AppResult<JsonValue> {
        let url = self.site.page_method_url(method);
        let label = method.name();
        self.retry
            .execute(|| self.post_once(&url, None, session.url(), label), label)
            .await
    }
}
