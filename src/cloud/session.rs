//! Keystone v2 password session.

use log::{debug, info};
use reqwest::header::HeaderValue;
use serde::Deserialize;
use serde_json::json;

use super::http::build_http;
use super::ResolvedOptions;
use crate::config::Config;
use crate::error::{Error, Result};

/// An issued token and the service catalog that came with it.
#[derive(Debug)]
pub struct Session {
    token: String,
    /// `token` as sent in `X-Auth-Token`.
    header: HeaderValue,
    catalog: Vec<CatalogService>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access: Access,
}

#[derive(Debug, Deserialize)]
struct Access {
    token: Token,
    #[serde(rename = "serviceCatalog", default)]
    service_catalog: Vec<CatalogService>,
}

#[derive(Debug, Deserialize)]
struct Token {
    id: String,
}

#[derive(Debug, Clone, Deserialize)]
struct CatalogService {
    #[serde(rename = "type")]
    service_type: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    endpoints: Vec<CatalogEndpoint>,
}

#[derive(Debug, Clone, Deserialize)]
struct CatalogEndpoint {
    #[serde(default)]
    region: Option<String>,
    #[serde(rename = "publicURL", default)]
    public_url: Option<String>,
    #[serde(rename = "internalURL", default)]
    internal_url: Option<String>,
    #[serde(rename = "adminURL", default)]
    admin_url: Option<String>,
}

impl CatalogEndpoint {
    fn url(&self, endpoint_type: &str) -> Option<&str> {
        match endpoint_type {
            "publicURL" | "public" => self.public_url.as_deref(),
            "internalURL" | "internal" => self.internal_url.as_deref(),
            "adminURL" | "admin" => self.admin_url.as_deref(),
            _ => None,
        }
    }
}

impl Session {
    pub async fn authenticate(config: &Config) -> Result<Self> {
        let http = build_http(config.insecure, config.cacert.as_deref())?;
        let url = format!("{}/tokens", config.auth_url.trim_end_matches('/'));
        debug!("Requesting token from {}", url);

        let body = json!({
            "auth": {
                "tenantName": config.tenant_name,
                "passwordCredentials": {
                    "username": config.username,
                    "password": config.password,
                }
            }
        });
        let resp = http.post(&url).json(&body).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Auth { url, status, body });
        }

        let token: TokenResponse = resp.json().await?;
        let session = Self::from_parts(token.access.token.id, token.access.service_catalog)?;
        info!(
            "Authenticated as {} in tenant {}",
            config.username, config.tenant_name
        );
        Ok(session)
    }

    fn from_parts(token: String, catalog: Vec<CatalogService>) -> Result<Self> {
        let header = HeaderValue::from_str(&token)
            .map_err(|e| Error::Config(format!("token is not a valid header value: {}", e)))?;
        Ok(Self {
            token,
            header,
            catalog,
        })
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub(crate) fn auth_header(&self) -> &HeaderValue {
        &self.header
    }

    /// Resolve the endpoint of `service_type`, unless the options carry an
    /// explicit override.
    pub(crate) fn endpoint_for(
        &self,
        service_type: &str,
        options: &ResolvedOptions,
    ) -> Result<String> {
        if let Some(endpoint) = &options.endpoint {
            return Ok(endpoint.clone());
        }

        self.catalog
            .iter()
            .filter(|service| service.service_type == service_type)
            .filter(|service| match &options.service_name {
                Some(name) => service.name.as_deref() == Some(name.as_str()),
                None => true,
            })
            .flat_map(|service| service.endpoints.iter())
            .filter(|endpoint| match &endpoint.region {
                Some(region) => *region == options.region,
                None => true,
            })
            .find_map(|endpoint| endpoint.url(&options.endpoint_type))
            .map(str::to_string)
            .ok_or_else(|| Error::Catalog {
                service_type: service_type.to_string(),
                region: options.region.clone(),
            })
    }
}
