use reqwest::{Certificate, Client};
use std::{collections::HashMap, sync::Arc, time::Duration};
use tracing::{info, warn};

use crate::{
    config::{SitesConfig, TransportConfig},
    error::{AppError, AppResult},
    models::{Operator, SiteDescriptor},
};

#[derive(Debug, Clone)]
struct SiteEntry {
    descriptor: Arc<SiteDescriptor>,
    /// Parsed once at startup from `extra_root_cert`
    root_cert: Option<Certificate>,
    accept_invalid_certs: bool,
}

/// Operator → site descriptor lookup, plus the transport each site needs
#[derive(Debug, Clone)]
pub struct SiteRegistry {
    sites: HashMap<Operator, SiteEntry>,
}

impl SiteRegistry {
    /// Build the registry, reading any extra root certificates from disk.
    pub fn from_config(config: &SitesConfig) -> AppResult<Self> {
        let mut sites = HashMap::new();
        for operator in Operator::ALL {
            let site = config.get(operator);
            if !site.enabled {
                info!("operator {} disabled in configuration", operator);
                continue;
            }
            sites.insert(
                operator,
                SiteEntry {
                    descriptor: Arc::new(site.descriptor(operator)),
                    root_cert: load_root_cert(&site.transport)?,
                    accept_invalid_certs: site.transport.accept_invalid_certs,
                },
            );
        }
        Ok(Self { sites })
    }

    /// Descriptor for `operator`; fails if the operator is not served.
    pub fn site_for(&self, operator: Operator) -> AppResult<Arc<SiteDescriptor>> {
        self.sites
            .get(&operator)
            .map(|entry| entry.descriptor.clone())
            .ok_or_else(|| AppError::unknown_operator(operator.as_str()))
    }

    /// Lookup by free-form tag, rejecting unknown names before any remote call.
    pub fn site_for_tag(&self, tag: &str) -> AppResult<Arc<SiteDescriptor>> {
        let operator: Operator = tag.parse()?;
        self.site_for(operator)
    }

    /// Build the HTTP client for one job against `operator`.
    ///
    /// The client keeps a cookie store so the priming GET and the following
    /// loader call share the ASP.NET session.
    pub fn build_client(&self, operator: Operator, timeout: Duration) -> AppResult<Client> {
        let entry = self
            .sites
            .get(&operator)
            .ok_or_else(|| AppError::unknown_operator(operator.as_str()))?;

        let mut builder = Client::builder()
            .timeout(timeout)
            .cookie_store(true)
            .user_agent(entry.descriptor.user_agent.clone());

        if let Some(cert) = &entry.root_cert {
            builder = builder.add_root_certificate(cert.clone());
        }

        if entry.accept_invalid_certs {
            warn!(
                operator = %operator,
                "TLS certificate validation DISABLED for {}",
                entry.descriptor.base_url
            );
            builder = builder.danger_accept_invalid_certs(true);
        }

        builder
            .build()
            .map_err(|e| AppError::Internal(anyhow::anyhow!("failed to build HTTP client: {}", e)))
    }
}

fn load_root_cert(transport: &TransportConfig) -> AppResult<Option<Certificate>> {
    let Some(pem_path) = &transport.extra_root_cert else {
        return Ok(None);
    };
    let pem = std::fs::read(pem_path)
        .map_err(|e| AppError::config(format!("cannot read root certificate {}: {}", pem_path, e)))?;
    let cert = Certificate::from_pem(&pem)
        .map_err(|e| AppError::config(format!("invalid root certificate {}: {}", pem_path, e)))?;
    info!("trusting extra root certificate {}", pem_path);
    Ok(Some(cert))
}
