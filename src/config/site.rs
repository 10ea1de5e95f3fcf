use serde::{Deserialize, Serialize};

use crate::models::{Operator, SiteDescriptor};

/// Certificate trust used when talking to one operator
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportConfig {
    /// Skip certificate validation entirely. Logged at warn whenever a client is built.
    #[serde(default)]
    pub accept_invalid_certs: bool,
    /// Extra PEM root to trust (intermediate chains the portal fails to send)
    #[serde(default)]
    pub extra_root_cert: Option<String>,
}

/// One portal deployment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    pub enabled: bool,
    pub base_url: String,
    pub root_path: String,
    pub user_agent: String,
    #[serde(default)]
    pub transport: TransportConfig,
}

impl SiteConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.base_url.is_empty() {
            return Err("base_url must not be empty".to_string());
        }
        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err("base_url must start with http:// or https://".to_string());
        }
        if !self.root_path.starts_with('/') {
            return Err("root_path must start with /".to_string());
        }
        if self.user_agent.trim().is_empty() {
            return Err("user_agent must not be empty".to_string());
        }
        Ok(())
    }

    pub fn descriptor(&self, operator: Operator) -> SiteDescriptor {
        SiteDescriptor::new(
            operator,
            self.base_url.as_str(),
            self.root_path.as_str(),
            self.user_agent.as_str(),
        )
    }
}

/// Per-operator site table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SitesConfig {
    pub afinia: SiteConfig,
    pub aire: SiteConfig,
}

impl Default for SitesConfig {
    fn default() -> Self {
        Self {
            afinia: SiteConfig {
                enabled: true,
                base_url: "https://servicios.energiacaribemar.co".to_string(),
                root_path: "/Autogeneracion".to_string(),
                user_agent: "Mozilla/5.0".to_string(),
                transport: TransportConfig::default(),
            },
            aire: SiteConfig {
                enabled: true,
                base_url: "https://servicios.air-e.com".to_string(),
                root_path: "/Autogeneracion".to_string(),
                user_agent: "Mozilla/5.0".to_string(),
                transport: TransportConfig::default(),
            },
        }
    }
}

impl SitesConfig {
    pub fn get(&self, operator: Operator) -> &SiteConfig {
        match operator {
            Operator::Afinia => &self.afinia,
            Operator::Aire => &self.aire,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        for operator in Operator::ALL {
            self.get(operator)
                .validate()
                .map_err(|e| format!("{}: {}", operator, e))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_sites_are_valid() {
        let sites = SitesConfig::default();
        assert!(sites.validate().is_ok());
        assert!(!sites.afinia.transport.accept_invalid_certs);
        assert_eq!(
            sites.get(Operator::Afinia).base_url,
            "https://servicios.energiacaribemar.co"
        );
    }

    #[test]
    fn test_site_validation() {
        let mut site = SitesConfig::default().aire;
        site.base_url = "servicios.air-e.com".to_string();
        assert!(site.validate().is_err());

        site.base_url = "https://servicios.air-e.com".to_string();
        site.root_path = "Autogeneracion".to_string();
        assert!(site.validate().is_err());
    }

    #[test]
    fn test_descriptor_from_config() {
        let site = SitesConfig::default().aire.descriptor(Operator::Aire);
        assert_eq!(site.operator, Operator::Aire);
        assert_eq!(site.home_referer(), "https://servicios.air-e.com/Autogeneracion/");
    }
}
