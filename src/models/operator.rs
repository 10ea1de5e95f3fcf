use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use utoipa::ToSchema;

use crate::error::AppError;

/// Portal operator
///
/// Each variant selects one deployment of the Autogeneracion application.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    /// Energía Caribe Mar (Afinia)
    #[default]
    Afinia,
    /// Air-e
    Aire,
}

impl Operator {
    pub const ALL: [Operator; 2] = [Operator::Afinia, Operator::Aire];

    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Afinia => "afinia",
            Operator::Aire => "aire",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operator {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "afinia" | "energiacaribemar" | "caribemar" => Ok(Operator::Afinia),
            "aire" | "air-e" | "air_e" => Ok(Operator::Aire),
            other => Err(AppError::unknown_operator(other)),
        }
    }
}

/// Fixed URL components needed to address one operator's page methods
///
/// Built once by the site registry and shared read-only afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteDescriptor {
    pub operator: Operator,
    /// Scheme and host, no trailing slash (`https://servicios.energiacaribemar.co`)
    pub base_url: String,
    /// Application root (`/Autogeneracion`)
    pub root_path: String,
    pub user_agent: String,
}

impl SiteDescriptor {
    pub fn new(
        operator: Operator,
        base_url: impl Into<String>,
        root_path: impl Into<String>,
        user_agent: impl Into<String>,
    ) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let root_path = format!("/{}", root_path.into().trim_matches('/'));
        Self {
            operator,
            base_url,
            root_path,
            user_agent: user_agent.into(),
        }
    }

    /// `Origin` header value
    pub fn origin(&self) -> &str {
        &self.base_url
    }

    /// Referer sent with the consultation page methods
    pub fn home_referer(&self) -> String {
        format!("{}{}/", self.base_url, self.root_path)
    }

    /// Consultation page hosting `ValidaSolicitud` and `Encryptar`
    pub fn consulta_page(&self) -> String {
        format!("{}{}/WFConsulta.aspx", self.base_url, self.root_path)
    }

    /// Form page that is primed with the encrypted query and hosts the data loaders
    pub fn form_page(&self) -> String {
        format!("{}{}/form/WFSolicitud.aspx", self.base_url, self.root_path)
    }

    pub fn validate_url(&self) -> String {
        format!("{}/ValidaSolicitud", self.consulta_page())
    }

    pub fn encrypt_url(&self) -> String {
        format!("{}/Encryptar", self.consulta_page())
    }

    pub fn page_method_url(&self, method: PageMethod) -> String {
        format!("{}/{}", self.form_page(), method.name())
    }
}

/// Data loaders exposed by the form page once it has been primed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageMethod {
    /// Full solicitud record (also carries the current status)
    LoadRecord,
    /// Audit trail for the solicitud
    LoadAudit,
}

impl PageMethod {
    pub fn name(&self) -> &'static str {
        match self {
            PageMethod::LoadRecord => "CargarDatosSolicitud",
            PageMethod::LoadAudit => "CargarDatosAuditoria",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn afinia() -> SiteDescriptor {
        SiteDescriptor::new(
            Operator::Afinia,
            "https://servicios.energiacaribemar.co/",
            "Autogeneracion",
            "Mozilla/5.0",
        )
    }

    #[test]
    fn test_operator_parsing() {
        assert_eq!("afinia".parse::<Operator>().unwrap(), Operator::Afinia);
        assert_eq!(" Air-E ".parse::<Operator>().unwrap(), Operator::Aire);
        let err = "electricaribe".parse::<Operator>().unwrap_err();
        assert!(matches!(err, AppError::UnknownOperator(_)));
    }

    #[test]
    fn test_operator_serde_tag() {
        let json = serde_json::to_string(&Operator::Aire).unwrap();
        assert_eq!(json, "\"aire\"");
        assert!(serde_json::from_str::<Operator>("\"bogus\"").is_err());
    }

    #[test]
    fn test_descriptor_urls() {
        let site = afinia();
        assert_eq!(site.origin(), "https://servicios.energiacaribemar.co");
        assert_eq!(
            site.home_referer(),
            "https://servicios.energiacaribemar.co/Autogeneracion/"
        );
        assert_eq!(
            site.validate_url(),
            "https://servicios.energiacaribemar.co/Autogeneracion/WFConsulta.aspx/ValidaSolicitud"
        );
        assert_eq!(
            site.encrypt_url(),
            "https://servicios.energiacaribemar.co/Autogeneracion/WFConsulta.aspx/Encryptar"
        );
        assert_eq!(
            site.page_method_url(PageMethod::LoadAudit),
            "https://servicios.energiacaribemar.co/Autogeneracion/form/WFSolicitud.aspx/CargarDatosAuditoria"
        );
    }
}
